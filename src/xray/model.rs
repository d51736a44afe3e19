//! Server configuration document model.
//!
//! Mirrors the subset of the Xray JSON format that the verifier reads. Fields
//! that the validator has to report on (protocol names, tags, enum-like
//! strings) are kept as plain strings so unknown values survive parsing and
//! show up as violations instead of parse failures.
//!
//! Inbound settings are the exception: the vless field group and the
//! shadowsocks field group are mutually exclusive, and that is enforced while
//! deserializing through [`RawInboundSettings`].

use serde::{Deserialize, Serialize};

/// Protocol name for vless inbounds.
pub const PROTOCOL_VLESS: &str = "vless";

/// Protocol name for shadowsocks inbounds.
pub const PROTOCOL_SHADOWSOCKS: &str = "shadowsocks";

/// Protocol name for wireguard outbounds.
pub const PROTOCOL_WIREGUARD: &str = "wireguard";

/// Top-level server configuration document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Logging section.
    #[serde(default)]
    pub log: LogConfig,

    /// Listening inbounds.
    #[serde(default)]
    pub inbounds: Vec<Inbound>,

    /// Outbounds.
    #[serde(default)]
    pub outbounds: Vec<Outbound>,

    /// Routing section.
    #[serde(default)]
    pub routing: Routing,
}

impl ServerConfig {
    /// Parse a server configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// First inbound using `protocol`, if any.
    pub fn inbound_by_protocol(&self, protocol: &str) -> Option<&Inbound> {
        self.inbounds.iter().find(|inbound| inbound.protocol == protocol)
    }
}

/// `log` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LogConfig {
    /// Log level; empty when absent.
    #[serde(default)]
    pub loglevel: String,
}

/// A single inbound.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inbound {
    /// Protocol name (`vless` or `shadowsocks`).
    #[serde(default)]
    pub protocol: String,

    /// Inbound tag.
    #[serde(default)]
    pub tag: String,

    /// Listening port.
    #[serde(default)]
    pub port: u16,

    /// Listen address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,

    /// Traffic sniffing options.
    #[serde(default)]
    pub sniffing: Sniffing,

    /// Protocol settings, either the vless group or the shadowsocks group.
    pub settings: InboundSettings,

    /// Transport settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_settings: Option<StreamSettings>,
}

/// `sniffing` block of an inbound.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sniffing {
    /// Whether sniffing is on.
    #[serde(default)]
    pub enabled: bool,

    /// Protocols whose sniffed destination overrides the original one.
    #[serde(default)]
    pub dest_override: Vec<String>,
}

/// A vless client entry.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Client {
    /// Client UUID.
    #[serde(default)]
    pub id: String,

    /// Client label.
    #[serde(default)]
    pub email: String,

    /// Flow control mode.
    #[serde(default)]
    pub flow: String,
}

/// Inbound settings, one variant per field group.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(try_from = "RawInboundSettings", into = "RawInboundSettings")]
pub enum InboundSettings {
    /// `clients` + `decryption`.
    Vless {
        /// Accepted clients.
        clients: Vec<Client>,
        /// Decryption mode; empty when absent.
        decryption: String,
    },
    /// `method` + `password` + `network`.
    Shadowsocks {
        /// AEAD cipher.
        method: String,
        /// Shared secret.
        password: String,
        /// Accepted transport networks.
        network: String,
        /// A stray `decryption` key carried next to the shadowsocks group.
        decryption: Option<String>,
    },
}

impl InboundSettings {
    /// Protocol that this field group belongs to.
    pub fn protocol(&self) -> &'static str {
        match self {
            InboundSettings::Vless { .. } => PROTOCOL_VLESS,
            InboundSettings::Shadowsocks { .. } => PROTOCOL_SHADOWSOCKS,
        }
    }
}

/// Flat wire form of inbound settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawInboundSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    clients: Option<Vec<Client>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    decryption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    network: Option<String>,
}

impl TryFrom<RawInboundSettings> for InboundSettings {
    type Error = String;

    fn try_from(raw: RawInboundSettings) -> Result<Self, Self::Error> {
        let has_shadowsocks = raw.method.is_some() || raw.password.is_some() || raw.network.is_some();
        let has_vless = raw.clients.is_some() || (raw.decryption.is_some() && !has_shadowsocks);

        match (has_vless, has_shadowsocks) {
            (true, true) => Err(
                "inbound settings mix the vless group (clients, decryption) with the \
                 shadowsocks group (method, password, network)"
                    .to_string(),
            ),
            (false, false) => Err(
                "inbound settings populate neither the vless group (clients, decryption) \
                 nor the shadowsocks group (method, password, network)"
                    .to_string(),
            ),
            (true, false) => Ok(InboundSettings::Vless {
                clients: raw.clients.unwrap_or_default(),
                decryption: raw.decryption.unwrap_or_default(),
            }),
            (false, true) => Ok(InboundSettings::Shadowsocks {
                method: raw.method.unwrap_or_default(),
                password: raw.password.unwrap_or_default(),
                network: raw.network.unwrap_or_default(),
                decryption: raw.decryption,
            }),
        }
    }
}

impl From<InboundSettings> for RawInboundSettings {
    fn from(settings: InboundSettings) -> Self {
        match settings {
            InboundSettings::Vless { clients, decryption } => RawInboundSettings {
                clients: Some(clients),
                decryption: Some(decryption),
                ..Default::default()
            },
            InboundSettings::Shadowsocks {
                method,
                password,
                network,
                decryption,
            } => RawInboundSettings {
                method: Some(method),
                password: Some(password),
                network: Some(network),
                decryption,
                ..Default::default()
            },
        }
    }
}

/// `streamSettings` block of an inbound.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSettings {
    /// Transport network.
    #[serde(default)]
    pub network: String,

    /// Security layer.
    #[serde(default)]
    pub security: String,

    /// Reality parameters, present when `security` is `reality`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reality_settings: Option<RealitySettings>,
}

/// `realitySettings` block.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealitySettings {
    /// Camouflage destination, `host:443`.
    #[serde(default)]
    pub dest: String,

    /// PROXY protocol version sent to `dest`.
    #[serde(default)]
    pub xver: u32,

    /// Accepted SNI values.
    #[serde(default)]
    pub server_names: Vec<String>,

    /// X25519 private key.
    #[serde(default)]
    pub private_key: String,

    /// Accepted short ids.
    #[serde(default)]
    pub short_ids: Vec<String>,
}

/// A single outbound.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Outbound {
    /// Protocol name.
    #[serde(default)]
    pub protocol: String,

    /// Outbound tag.
    #[serde(default)]
    pub tag: String,

    /// Protocol settings; only wireguard carries any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<WireguardSettings>,
}

/// Wireguard outbound settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireguardSettings {
    /// Local private key.
    #[serde(default)]
    pub secret_key: String,

    /// Interface addresses (IP or CIDR).
    #[serde(default)]
    pub address: Vec<String>,

    /// Remote peers.
    #[serde(default)]
    pub peers: Vec<Peer>,

    /// Interface MTU.
    #[serde(default)]
    pub mtu: u32,

    /// Reserved header bytes.
    #[serde(default)]
    pub reserved: Vec<u8>,

    /// Worker count.
    #[serde(default)]
    pub workers: u32,

    /// Address family selection for the tunnel.
    #[serde(default)]
    pub domain_strategy: String,
}

/// Wireguard peer.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    /// Peer public key.
    #[serde(default)]
    pub public_key: String,

    /// Peer endpoint, `host:port`.
    #[serde(default)]
    pub endpoint: String,
}

/// `routing` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Routing {
    /// Routing rules, evaluated in order.
    #[serde(default)]
    pub rules: Vec<RoutingRule>,

    /// Domain resolution policy.
    #[serde(default)]
    pub domain_strategy: String,
}

/// A routing rule.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRule {
    /// Rule type.
    #[serde(rename = "type", default)]
    pub rule_type: String,

    /// Destination outbound.
    #[serde(default)]
    pub outbound_tag: String,

    /// Sniffed protocols to match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Vec<String>>,

    /// Domains to match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<Vec<String>>,

    /// Destination IPs to match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<Vec<String>>,
}
