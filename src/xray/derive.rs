//! Derivation of the verification-client configuration.
//!
//! The client is a second Xray instance that exposes a local HTTP proxy and
//! forwards everything to the server's shadowsocks inbound. Only validated
//! server configurations are accepted; anything validation should have
//! caught is reported as a [`DerivationInvariantViolation`].

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use super::error::DerivationInvariantViolation;
use super::model::{InboundSettings, ServerConfig};

/// Inputs to client derivation that do not come from the server document.
#[derive(Debug, Clone)]
pub struct ClientParams {
    /// Protocol of the server inbound the client connects to.
    pub server_protocol: String,
    /// Address the client dials to reach the server.
    pub server_address: String,
    /// Port of the client's local HTTP inbound.
    pub local_port: u16,
    /// Client log level.
    pub log_level: String,
}

/// Derived client configuration, serialized as Xray JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientConfig {
    /// Logging section.
    pub log: ClientLog,
    /// The single local HTTP inbound.
    pub inbounds: Vec<ClientInbound>,
    /// The single outbound pointing at the server.
    pub outbounds: Vec<ClientOutbound>,
    /// Routing that sends the extracted network through the outbound.
    pub routing: ClientRouting,
}

/// Client `log` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientLog {
    /// Log level.
    pub loglevel: String,
}

/// Client inbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInbound {
    /// Local listening port.
    pub port: u16,
    /// Always `http`.
    pub protocol: String,
}

/// Client outbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientOutbound {
    /// Server protocol.
    pub protocol: String,
    /// Tag, equal to the server protocol.
    pub tag: String,
    /// Server list.
    pub settings: ClientOutboundSettings,
}

/// Client outbound `settings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientOutboundSettings {
    /// Servers to connect to; always exactly one.
    pub servers: Vec<ClientServer>,
}

/// One server entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientServer {
    /// Server address.
    pub address: String,
    /// Server inbound port.
    pub port: u16,
    /// Cipher.
    pub method: String,
    /// Shared secret.
    pub password: String,
}

/// Client `routing` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRouting {
    /// Rules; always exactly one.
    pub rules: Vec<ClientRule>,
    /// Always `IPIfNonMatch`.
    pub domain_strategy: String,
}

/// Client routing rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRule {
    /// Always `field`.
    #[serde(rename = "type")]
    pub rule_type: String,
    /// Outbound to route to.
    pub outbound_tag: String,
    /// Networks the rule matches.
    pub network: String,
}

/// Build the client configuration for a validated server configuration.
pub fn derive_client_config(
    server: &ServerConfig,
    params: &ClientParams,
) -> Result<ClientConfig, DerivationInvariantViolation> {
    let inbound = server
        .inbound_by_protocol(&params.server_protocol)
        .ok_or_else(|| DerivationInvariantViolation::MissingInbound {
            protocol: params.server_protocol.clone(),
        })?;

    let InboundSettings::Shadowsocks {
        method,
        password,
        network,
        ..
    } = &inbound.settings
    else {
        return Err(DerivationInvariantViolation::SettingsMismatch {
            tag: inbound.tag.clone(),
            protocol: params.server_protocol.clone(),
            found: inbound.settings.protocol(),
        });
    };

    for (field, value) in [("method", method), ("password", password), ("network", network)] {
        if value.is_empty() {
            return Err(DerivationInvariantViolation::EmptyCredential {
                tag: inbound.tag.clone(),
                field,
            });
        }
    }

    debug!(
        "Deriving client config for inbound '{}' on port {}",
        inbound.tag, inbound.port
    );

    Ok(ClientConfig {
        log: ClientLog {
            loglevel: params.log_level.clone(),
        },
        inbounds: vec![ClientInbound {
            port: params.local_port,
            protocol: "http".to_string(),
        }],
        outbounds: vec![ClientOutbound {
            protocol: params.server_protocol.clone(),
            tag: params.server_protocol.clone(),
            settings: ClientOutboundSettings {
                servers: vec![ClientServer {
                    address: params.server_address.clone(),
                    port: inbound.port,
                    method: method.clone(),
                    password: password.clone(),
                }],
            },
        }],
        routing: ClientRouting {
            rules: vec![ClientRule {
                rule_type: "field".to_string(),
                outbound_tag: params.server_protocol.clone(),
                network: network.clone(),
            }],
            domain_strategy: "IPIfNonMatch".to_string(),
        },
    })
}

impl ClientConfig {
    /// Pretty-printed JSON form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the configuration to `path`, replacing any previous file.
    ///
    /// The file is staged next to its destination and renamed into place, so
    /// a reader never sees a partial document.
    pub fn write_atomic(&self, path: &Path) -> std::io::Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let json = self.to_json().map_err(std::io::Error::other)?;
        let mut staged = tempfile::Builder::new()
            .prefix(".client-config-")
            .suffix(".json")
            .tempfile_in(dir)?;
        staged.write_all(json.as_bytes())?;
        staged.write_all(b"\n")?;
        staged.as_file().sync_all()?;
        staged.persist(path).map_err(|e| e.error)?;

        debug!("Wrote client config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params() -> ClientParams {
        ClientParams {
            server_protocol: "shadowsocks".to_string(),
            server_address: "127.0.0.1".to_string(),
            local_port: 10808,
            log_level: "warning".to_string(),
        }
    }

    fn server(inbounds: serde_json::Value) -> ServerConfig {
        serde_json::from_value(json!({ "inbounds": inbounds })).unwrap()
    }

    #[test]
    fn test_derives_server_entry_and_rule() {
        let server = server(json!([{
            "protocol": "shadowsocks",
            "tag": "ss-in",
            "port": 12345,
            "settings": {"method": "m", "password": "p", "network": "tcp,udp"}
        }]));

        let client = derive_client_config(&server, &params()).unwrap();
        let entry = &client.outbounds[0].settings.servers[0];
        assert_eq!(entry.port, 12345);
        assert_eq!(entry.method, "m");
        assert_eq!(entry.password, "p");
        assert_eq!(client.routing.rules[0].network, "tcp,udp");
        assert_eq!(client.routing.rules[0].outbound_tag, "shadowsocks");
    }

    #[test]
    fn test_client_json_shape() {
        let server = server(json!([{
            "protocol": "shadowsocks",
            "tag": "ss-in",
            "port": 8388,
            "settings": {"method": "aes-256-gcm", "password": "0123456789abcdef", "network": "tcp"}
        }]));

        let client = derive_client_config(&server, &params()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&client.to_json().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "log": {"loglevel": "warning"},
                "inbounds": [{"port": 10808, "protocol": "http"}],
                "outbounds": [{
                    "protocol": "shadowsocks",
                    "tag": "shadowsocks",
                    "settings": {"servers": [{
                        "address": "127.0.0.1",
                        "port": 8388,
                        "method": "aes-256-gcm",
                        "password": "0123456789abcdef"
                    }]}
                }],
                "routing": {
                    "rules": [{"type": "field", "outboundTag": "shadowsocks", "network": "tcp"}],
                    "domainStrategy": "IPIfNonMatch"
                }
            })
        );
    }

    #[test]
    fn test_missing_inbound_is_invariant_violation() {
        let server = server(json!([{
            "protocol": "vless",
            "tag": "vless-in",
            "port": 443,
            "settings": {"clients": [], "decryption": "none"}
        }]));

        let err = derive_client_config(&server, &params()).unwrap_err();
        assert!(matches!(
            err,
            DerivationInvariantViolation::MissingInbound { ref protocol } if protocol == "shadowsocks"
        ));
    }

    #[test]
    fn test_mismatched_settings_is_invariant_violation() {
        let server = server(json!([{
            "protocol": "shadowsocks",
            "tag": "odd",
            "port": 8388,
            "settings": {"clients": [], "decryption": "none"}
        }]));

        let err = derive_client_config(&server, &params()).unwrap_err();
        assert!(matches!(
            err,
            DerivationInvariantViolation::SettingsMismatch { found: "vless", .. }
        ));
    }

    #[test]
    fn test_empty_password_is_invariant_violation() {
        let server = server(json!([{
            "protocol": "shadowsocks",
            "tag": "ss-in",
            "port": 8388,
            "settings": {"method": "aes-128-gcm", "password": "", "network": "tcp"}
        }]));

        let err = derive_client_config(&server, &params()).unwrap_err();
        assert_eq!(err.to_string(), "inbound 'ss-in' has an empty password");
    }

    #[test]
    fn test_write_atomic_creates_parent_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("client.json");

        let server = server(json!([{
            "protocol": "shadowsocks",
            "tag": "ss-in",
            "port": 8388,
            "settings": {"method": "aes-128-gcm", "password": "0123456789abcdef", "network": "tcp"}
        }]));
        let mut params = params();
        let first = derive_client_config(&server, &params).unwrap();
        first.write_atomic(&path).unwrap();

        params.local_port = 20808;
        let second = derive_client_config(&server, &params).unwrap();
        second.write_atomic(&path).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["inbounds"][0]["port"], 20808);

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name() != "client.json")
            .collect();
        assert!(leftovers.is_empty());
    }
}
