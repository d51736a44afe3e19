//! Structural and semantic validation of a server configuration.
//!
//! The validator never stops at the first problem. It walks the whole
//! document, records every independent violation with its location, and
//! reports them together so a broken config can be fixed in one pass.

use std::collections::HashSet;

use tracing::debug;
use uuid::Uuid;

use super::error::{ValidationError, Violation};
use super::model::{
    Inbound, InboundSettings, Outbound, RealitySettings, Routing, ServerConfig, Sniffing,
    StreamSettings, WireguardSettings, PROTOCOL_SHADOWSOCKS, PROTOCOL_VLESS, PROTOCOL_WIREGUARD,
};
use super::net::{is_external_ipv4, is_ip_or_cidr, is_valid_domain, parse_endpoint};

/// Accepted `log.loglevel` values.
pub const LOG_LEVELS: &[&str] = &["debug", "info", "warning", "error", "none"];

/// Accepted `sniffing.destOverride` entries.
pub const SNIFF_DEST_OVERRIDES: &[&str] = &["http", "tls", "quic"];

/// Accepted vless client `flow` values.
pub const VLESS_FLOWS: &[&str] = &["", "xtls-rprx-vision"];

/// Accepted shadowsocks AEAD ciphers.
pub const SHADOWSOCKS_METHODS: &[&str] = &["aes-128-gcm", "aes-256-gcm", "chacha20-ietf-poly1305"];

/// Minimum shadowsocks password length in characters.
pub const MIN_PASSWORD_LEN: usize = 16;

/// Accepted shadowsocks `network` values.
pub const SHADOWSOCKS_NETWORKS: &[&str] = &["tcp", "udp", "tcp,udp"];

/// Accepted `streamSettings.network` values.
pub const STREAM_NETWORKS: &[&str] = &["raw", "tcp"];

/// The only accepted `streamSettings.security` value.
pub const STREAM_SECURITY: &str = "reality";

/// Reality destination that is allowed without a matching server name.
pub const REALITY_IP_DEST: &str = "1.1.1.1:443";

/// Accepted inbound protocols.
pub const INBOUND_PROTOCOLS: &[&str] = &[PROTOCOL_VLESS, PROTOCOL_SHADOWSOCKS];

/// Port a vless inbound must listen on.
pub const VLESS_PORT: u16 = 443;

/// Accepted outbound protocols.
pub const OUTBOUND_PROTOCOLS: &[&str] = &["freedom", "blackhole", "dns", PROTOCOL_WIREGUARD];

/// Accepted wireguard MTU range.
pub const WIREGUARD_MTU: std::ops::RangeInclusive<u32> = 1280..=1500;

/// Accepted wireguard `domainStrategy` values.
pub const WIREGUARD_DOMAIN_STRATEGIES: &[&str] =
    &["ForceIP", "ForceIPv4", "ForceIPv4v6", "ForceIPv6", "ForceIPv6v4"];

/// Accepted routing rule types.
pub const RULE_TYPES: &[&str] = &["field"];

/// Accepted `routing.domainStrategy` values.
pub const ROUTING_DOMAIN_STRATEGIES: &[&str] = &["AsIs", "IPIfNonMatch", "IPOnDemand"];

/// Validate `config` for a verification run whose client speaks
/// `required_protocol`.
///
/// Returns every violation found, or `Ok(())` if the document is fit for
/// verification.
pub fn validate(config: &ServerConfig, required_protocol: &str) -> Result<(), ValidationError> {
    let mut v = Collector::default();

    v.one_of("log.loglevel", &config.log.loglevel, LOG_LEVELS);

    if config.inbounds.is_empty() {
        v.push("inbounds", "at least one inbound is required");
    }

    let mut seen_tags = HashSet::new();
    for (i, inbound) in config.inbounds.iter().enumerate() {
        validate_inbound(&mut v, &format!("inbounds[{}]", i), inbound);
        if !inbound.tag.is_empty() && !seen_tags.insert(inbound.tag.as_str()) {
            v.push(
                format!("inbounds[{}].tag", i),
                format!("duplicate inbound tag '{}'", inbound.tag),
            );
        }
    }

    if !config.inbounds.is_empty() && config.inbound_by_protocol(required_protocol).is_none() {
        v.push(
            "inbounds",
            format!(
                "no '{}' inbound found; verification requires one",
                required_protocol
            ),
        );
    }

    for (i, outbound) in config.outbounds.iter().enumerate() {
        validate_outbound(&mut v, &format!("outbounds[{}]", i), outbound);
    }

    validate_routing(&mut v, &config.routing, &config.outbounds);

    v.finish()
}

#[derive(Default)]
struct Collector {
    violations: Vec<Violation>,
}

impl Collector {
    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation {
            path: path.into(),
            message: message.into(),
        });
    }

    fn non_empty(&mut self, path: &str, value: &str) {
        if value.is_empty() {
            self.push(path, "must not be empty");
        }
    }

    fn one_of(&mut self, path: &str, value: &str, allowed: &[&str]) {
        if !allowed.contains(&value) {
            self.push(
                path,
                format!("must be one of {}, got \"{}\"", allowed_set(allowed), value),
            );
        }
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            debug!("Validation found {} violation(s)", self.violations.len());
            Err(ValidationError::new(self.violations))
        }
    }
}

fn allowed_set(allowed: &[&str]) -> String {
    let quoted: Vec<String> = allowed
        .iter()
        .map(|a| if a.is_empty() { "\"\"".to_string() } else { a.to_string() })
        .collect();
    format!("[{}]", quoted.join(", "))
}

fn validate_inbound(v: &mut Collector, path: &str, inbound: &Inbound) {
    v.one_of(&format!("{}.protocol", path), &inbound.protocol, INBOUND_PROTOCOLS);
    v.non_empty(&format!("{}.tag", path), &inbound.tag);

    let group = inbound.settings.protocol();
    if INBOUND_PROTOCOLS.contains(&inbound.protocol.as_str()) && inbound.protocol != group {
        v.push(
            format!("{}.settings", path),
            format!(
                "'{}' inbound carries {} settings",
                inbound.protocol, group
            ),
        );
    }

    validate_sniffing(v, &format!("{}.sniffing", path), &inbound.sniffing);

    let settings_path = format!("{}.settings", path);
    match &inbound.settings {
        InboundSettings::Vless { clients, decryption } => {
            if clients.is_empty() {
                v.push(format!("{}.clients", settings_path), "must not be empty");
            }
            for (j, client) in clients.iter().enumerate() {
                let client_path = format!("{}.clients[{}]", settings_path, j);
                if Uuid::parse_str(&client.id).is_err() {
                    v.push(
                        format!("{}.id", client_path),
                        format!("must be a valid UUID, got \"{}\"", client.id),
                    );
                }
                v.non_empty(&format!("{}.email", client_path), &client.email);
                v.one_of(&format!("{}.flow", client_path), &client.flow, VLESS_FLOWS);
            }
            check_decryption(v, &settings_path, decryption);
        }
        InboundSettings::Shadowsocks {
            method,
            password,
            network,
            decryption,
        } => {
            v.one_of(&format!("{}.method", settings_path), method, SHADOWSOCKS_METHODS);
            if password.chars().count() < MIN_PASSWORD_LEN {
                v.push(
                    format!("{}.password", settings_path),
                    format!(
                        "must be at least {} characters, got {}",
                        MIN_PASSWORD_LEN,
                        password.chars().count()
                    ),
                );
            }
            v.one_of(&format!("{}.network", settings_path), network, SHADOWSOCKS_NETWORKS);
            if let Some(decryption) = decryption {
                check_decryption(v, &settings_path, decryption);
            }
        }
    }

    if inbound.protocol == PROTOCOL_VLESS {
        if inbound.port != VLESS_PORT {
            v.push(
                format!("{}.port", path),
                format!("vless inbound must listen on port {}, got {}", VLESS_PORT, inbound.port),
            );
        }
        let listen = inbound.listen.as_deref().unwrap_or_default();
        if !is_external_ipv4(listen) {
            v.push(
                format!("{}.listen", path),
                format!(
                    "vless inbound must listen on a public IPv4 address, got \"{}\"",
                    listen
                ),
            );
        }
    }

    if let Some(stream) = &inbound.stream_settings {
        validate_stream(v, &format!("{}.streamSettings", path), stream);
    }
}

fn check_decryption(v: &mut Collector, settings_path: &str, decryption: &str) {
    if decryption != "none" {
        v.push(
            format!("{}.decryption", settings_path),
            format!("must be \"none\", got \"{}\"", decryption),
        );
    }
}

fn validate_sniffing(v: &mut Collector, path: &str, sniffing: &Sniffing) {
    if !sniffing.enabled {
        return;
    }
    if sniffing.dest_override.is_empty() {
        v.push(
            format!("{}.destOverride", path),
            "must not be empty when sniffing is enabled",
        );
    }
    for (j, dest) in sniffing.dest_override.iter().enumerate() {
        v.one_of(&format!("{}.destOverride[{}]", path, j), dest, SNIFF_DEST_OVERRIDES);
    }
}

fn validate_stream(v: &mut Collector, path: &str, stream: &StreamSettings) {
    v.one_of(&format!("{}.network", path), &stream.network, STREAM_NETWORKS);

    if stream.security != STREAM_SECURITY {
        v.push(
            format!("{}.security", path),
            format!("must be \"{}\", got \"{}\"", STREAM_SECURITY, stream.security),
        );
    }

    match &stream.reality_settings {
        Some(reality) => validate_reality(v, &format!("{}.realitySettings", path), reality),
        None if stream.security == STREAM_SECURITY => {
            v.push(
                format!("{}.realitySettings", path),
                "required when security is \"reality\"",
            );
        }
        None => {}
    }
}

fn validate_reality(v: &mut Collector, path: &str, reality: &RealitySettings) {
    let ip_dest = reality.dest == REALITY_IP_DEST;
    let dest_domain = if ip_dest {
        None
    } else {
        match reality.dest.strip_suffix(":443") {
            Some(host) if is_valid_domain(host) => Some(host),
            _ => {
                v.push(
                    format!("{}.dest", path),
                    format!(
                        "must be \"{}\" or <domain>:443, got \"{}\"",
                        REALITY_IP_DEST, reality.dest
                    ),
                );
                None
            }
        }
    };

    if reality.xver != 0 {
        v.push(
            format!("{}.xver", path),
            format!("must be 0, got {}", reality.xver),
        );
    }

    if let [name] = reality.server_names.as_slice() {
        let name_path = format!("{}.serverNames[0]", path);
        if name.contains('*') {
            v.push(&name_path, format!("must not contain a wildcard, got \"{}\"", name));
        }
        if ip_dest && !name.is_empty() {
            v.push(
                &name_path,
                format!(
                    "must be empty when dest is \"{}\", got \"{}\"",
                    REALITY_IP_DEST, name
                ),
            );
        }
        if let Some(domain) = dest_domain
            && name != domain
        {
            v.push(
                &name_path,
                format!("must equal the dest domain \"{}\", got \"{}\"", domain, name),
            );
        }
    } else {
        v.push(
            format!("{}.serverNames", path),
            format!(
                "must contain exactly one entry, got {}",
                reality.server_names.len()
            ),
        );
    }

    v.non_empty(&format!("{}.privateKey", path), &reality.private_key);

    match reality.short_ids.as_slice() {
        [id] if id.is_empty() => {}
        [id] => v.push(
            format!("{}.shortIds[0]", path),
            format!("must be the empty string, got \"{}\"", id),
        ),
        ids => v.push(
            format!("{}.shortIds", path),
            format!("must contain exactly one entry, got {}", ids.len()),
        ),
    }
}

fn validate_outbound(v: &mut Collector, path: &str, outbound: &Outbound) {
    let protocol_path = format!("{}.protocol", path);
    if outbound.protocol.is_empty() {
        v.push(&protocol_path, "must not be empty");
    } else {
        v.one_of(&protocol_path, &outbound.protocol, OUTBOUND_PROTOCOLS);
    }
    v.non_empty(&format!("{}.tag", path), &outbound.tag);

    if outbound.protocol == PROTOCOL_WIREGUARD {
        match &outbound.settings {
            Some(settings) => validate_wireguard(v, &format!("{}.settings", path), settings),
            None => v.push(
                format!("{}.settings", path),
                "wireguard outbound requires settings",
            ),
        }
    }
}

fn validate_wireguard(v: &mut Collector, path: &str, wg: &WireguardSettings) {
    v.non_empty(&format!("{}.secretKey", path), &wg.secret_key);

    if wg.address.is_empty() {
        v.push(format!("{}.address", path), "must not be empty");
    }
    for (j, address) in wg.address.iter().enumerate() {
        if !is_ip_or_cidr(address) {
            v.push(
                format!("{}.address[{}]", path, j),
                format!("must be an IP address or CIDR block, got \"{}\"", address),
            );
        }
    }

    if wg.peers.is_empty() {
        v.push(format!("{}.peers", path), "must not be empty");
    }
    for (j, peer) in wg.peers.iter().enumerate() {
        let peer_path = format!("{}.peers[{}]", path, j);
        v.non_empty(&format!("{}.publicKey", peer_path), &peer.public_key);
        if let Err(reason) = parse_endpoint(&peer.endpoint) {
            v.push(format!("{}.endpoint", peer_path), reason);
        }
    }

    if !WIREGUARD_MTU.contains(&wg.mtu) {
        v.push(
            format!("{}.mtu", path),
            format!(
                "must be within {}-{}, got {}",
                WIREGUARD_MTU.start(),
                WIREGUARD_MTU.end(),
                wg.mtu
            ),
        );
    }

    if wg.reserved.is_empty() {
        v.push(format!("{}.reserved", path), "must not be empty");
    }

    if wg.workers < 1 {
        v.push(format!("{}.workers", path), "must be at least 1");
    }

    v.one_of(
        &format!("{}.domainStrategy", path),
        &wg.domain_strategy,
        WIREGUARD_DOMAIN_STRATEGIES,
    );
}

fn validate_routing(v: &mut Collector, routing: &Routing, outbounds: &[Outbound]) {
    if routing.rules.is_empty() {
        v.push("routing.rules", "must not be empty");
    }

    let known_tags: HashSet<&str> = outbounds.iter().map(|o| o.tag.as_str()).collect();

    for (i, rule) in routing.rules.iter().enumerate() {
        let path = format!("routing.rules[{}]", i);
        let type_path = format!("{}.type", path);
        if rule.rule_type.is_empty() {
            v.push(&type_path, "must not be empty");
        } else {
            v.one_of(&type_path, &rule.rule_type, RULE_TYPES);
        }

        let tag_path = format!("{}.outboundTag", path);
        if rule.outbound_tag.is_empty() {
            v.push(&tag_path, "must not be empty");
        } else if !known_tags.contains(rule.outbound_tag.as_str()) {
            v.push(
                &tag_path,
                format!("references unknown outbound '{}'", rule.outbound_tag),
            );
        }
    }

    v.one_of(
        "routing.domainStrategy",
        &routing.domain_strategy,
        ROUTING_DOMAIN_STRATEGIES,
    );
}
