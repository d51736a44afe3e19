//! Error types for server configuration handling.

use std::fmt;
use thiserror::Error;

/// A single rule violation found while validating a server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Location in the document, e.g. `inbounds[0].streamSettings.security`.
    pub path: String,
    /// What is wrong with the value at `path`.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Every violation found in one validation pass.
///
/// Displays as one violation per line.
#[derive(Debug, Clone)]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    pub(crate) fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// The individual violations, in document order.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Number of violations.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Always false for errors produced by the validator.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.violations.iter().map(ToString::to_string).collect();
        f.write_str(&lines.join("\n"))
    }
}

impl std::error::Error for ValidationError {}

/// The validated configuration did not contain what validation guarantees.
///
/// This is a defect in the calling sequence rather than a problem with the
/// user's document: derivation must only ever see validated input.
#[derive(Debug, Clone, Error)]
pub enum DerivationInvariantViolation {
    /// No inbound uses the protocol the verification client speaks.
    #[error("no '{protocol}' inbound in a configuration that passed validation")]
    MissingInbound {
        /// The protocol that was looked up.
        protocol: String,
    },

    /// The matching inbound carries the wrong settings group.
    #[error("inbound '{tag}' uses protocol '{protocol}' but carries {found} settings")]
    SettingsMismatch {
        /// Tag of the offending inbound.
        tag: String,
        /// Protocol that was looked up.
        protocol: String,
        /// Settings group actually present.
        found: &'static str,
    },

    /// The matching inbound has an empty credential field.
    #[error("inbound '{tag}' has an empty {field}")]
    EmptyCredential {
        /// Tag of the offending inbound.
        tag: String,
        /// Name of the empty field.
        field: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_joins_lines() {
        let err = ValidationError::new(vec![
            Violation {
                path: "log.loglevel".to_string(),
                message: "must be set".to_string(),
            },
            Violation {
                path: "inbounds[0].port".to_string(),
                message: "must be 443".to_string(),
            },
        ]);

        assert_eq!(
            err.to_string(),
            "log.loglevel: must be set\ninbounds[0].port: must be 443"
        );
        assert_eq!(err.len(), 2);
    }

    #[test]
    fn test_invariant_display() {
        let err = DerivationInvariantViolation::EmptyCredential {
            tag: "ss-in".to_string(),
            field: "password",
        };
        assert_eq!(err.to_string(), "inbound 'ss-in' has an empty password");
    }
}
