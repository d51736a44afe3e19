//! Xray server configuration handling.
//!
//! # Architecture
//!
//! ```text
//! JSON text ──parse──> ServerConfig ──validate──> (validated) ──derive──> ClientConfig
//!                          │                          │
//!                   exclusivity of the          every violation
//!                   settings groups             collected with path
//! ```
//!
//! - [`model`]: document types; invalid settings-group combinations fail to
//!   parse.
//! - [`validate`]: aggregating validator.
//! - [`derive`]: verification-client configuration for a validated server.
//! - [`net`]: address predicates shared by the validator.

pub mod derive;
pub mod error;
pub mod model;
pub mod net;
pub mod validate;

pub use derive::{derive_client_config, ClientConfig, ClientParams};
pub use error::{DerivationInvariantViolation, ValidationError, Violation};
pub use model::{InboundSettings, ServerConfig, PROTOCOL_SHADOWSOCKS, PROTOCOL_VLESS};
pub use validate::validate;
