//! Address predicates used by the validator.

use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use ipnet::{IpNet, Ipv4Net};

/// IPv4 blocks that are never reachable from the public internet, beyond the
/// private, loopback, link-local and multicast ranges.
const RESERVED_V4_BLOCKS: &[(Ipv4Addr, u8)] = &[
    (Ipv4Addr::new(0, 0, 0, 0), 8),
    (Ipv4Addr::new(192, 0, 0, 0), 24),
    (Ipv4Addr::new(192, 88, 99, 0), 24),
    (Ipv4Addr::new(198, 18, 0, 0), 15),
    (Ipv4Addr::new(240, 0, 0, 0), 4),
];

/// Whether `listen` is a globally routable IPv4 address.
///
/// Rejects anything that does not parse as IPv4 (including `localhost`),
/// the unspecified address, RFC1918 space, link-local, loopback, multicast
/// and the reserved blocks above.
pub fn is_external_ipv4(listen: &str) -> bool {
    let Ok(addr) = Ipv4Addr::from_str(listen) else {
        return false;
    };

    if addr.is_unspecified()
        || addr.is_private()
        || addr.is_link_local()
        || addr.is_loopback()
        || addr.is_multicast()
        || addr.is_broadcast()
    {
        return false;
    }

    !RESERVED_V4_BLOCKS.iter().any(|&(base, prefix)| {
        Ipv4Net::new(base, prefix)
            .map(|net| net.contains(&addr))
            .unwrap_or(false)
    })
}

/// Whether `name` is a syntactically valid DNS domain name.
///
/// Requires at least two labels, each 1-63 characters of ASCII letters,
/// digits and hyphens, not starting or ending with a hyphen, and a total
/// length of at most 253. The final label may not be all digits so that
/// dotted IPv4 literals are not mistaken for domains.
pub fn is_valid_domain(name: &str) -> bool {
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() || name.len() > 253 {
        return false;
    }

    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    let labels_ok = labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });

    let tld_ok = labels
        .last()
        .is_some_and(|tld| !tld.chars().all(|c| c.is_ascii_digit()));

    labels_ok && tld_ok
}

/// Whether `value` is an IP address or a CIDR block of either family.
pub fn is_ip_or_cidr(value: &str) -> bool {
    IpAddr::from_str(value).is_ok() || IpNet::from_str(value).is_ok()
}

/// Split `host:port` (with `[v6]:port` support) and validate both halves.
///
/// The host must be an IP literal or a valid domain, the port 1-65535.
pub fn parse_endpoint(endpoint: &str) -> Result<(String, u16), String> {
    let (host, port) = if let Some(rest) = endpoint.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| format!("unterminated IPv6 literal in '{}'", endpoint))?;
        let port = rest
            .strip_prefix(':')
            .ok_or_else(|| format!("missing port in '{}'", endpoint))?;
        (host, port)
    } else {
        endpoint
            .rsplit_once(':')
            .ok_or_else(|| format!("missing port in '{}'", endpoint))?
    };

    if IpAddr::from_str(host).is_err() && !is_valid_domain(host) {
        return Err(format!("host '{}' is neither an IP address nor a domain", host));
    }

    let port: u16 = port
        .parse()
        .map_err(|_| format!("invalid port '{}' in '{}'", port, endpoint))?;
    if port == 0 {
        return Err(format!("port must be in 1-65535 in '{}'", endpoint));
    }

    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_ipv4_rejects_non_routable() {
        for addr in [
            "0.0.0.0",
            "127.0.0.1",
            "169.254.1.1",
            "224.0.0.1",
            "192.168.1.1",
            "10.0.0.1",
            "172.16.5.4",
            "192.0.0.8",
            "192.88.99.1",
            "198.19.0.1",
            "240.0.0.1",
            "255.255.255.255",
            "localhost",
            "",
            "::1",
            "not-an-ip",
            " 8.8.8.8",
            "8.8.8.8\n",
        ] {
            assert!(!is_external_ipv4(addr), "{} should not be external", addr);
        }
    }

    #[test]
    fn test_external_ipv4_accepts_public() {
        assert!(is_external_ipv4("8.8.8.8"));
        assert!(is_external_ipv4("1.1.1.1"));
        assert!(is_external_ipv4("203.0.114.7"));
        assert!(is_external_ipv4("198.20.0.1"));
    }

    #[test]
    fn test_valid_domains() {
        assert!(is_valid_domain("www.apple.com"));
        assert!(is_valid_domain("dl.google.com."));
        assert!(is_valid_domain("a-b.example.co"));
    }

    #[test]
    fn test_invalid_domains() {
        assert!(!is_valid_domain(""));
        assert!(!is_valid_domain("localhost"));
        assert!(!is_valid_domain("*.example.com"));
        assert!(!is_valid_domain("-bad.example.com"));
        assert!(!is_valid_domain("bad..example.com"));
        assert!(!is_valid_domain("1.1.1.1"));
        assert!(!is_valid_domain(&format!("{}.com", "a".repeat(64))));
    }

    #[test]
    fn test_ip_or_cidr() {
        assert!(is_ip_or_cidr("172.16.0.2"));
        assert!(is_ip_or_cidr("172.16.0.2/32"));
        assert!(is_ip_or_cidr("2606:4700:110:8a36::1/128"));
        assert!(!is_ip_or_cidr("172.16.0.2/33"));
        assert!(!is_ip_or_cidr("example.com"));
    }

    #[test]
    fn test_parse_endpoint() {
        assert_eq!(
            parse_endpoint("engage.cloudflareclient.com:2408").unwrap(),
            ("engage.cloudflareclient.com".to_string(), 2408)
        );
        assert_eq!(
            parse_endpoint("162.159.192.1:500").unwrap(),
            ("162.159.192.1".to_string(), 500)
        );
        assert_eq!(
            parse_endpoint("[2606:4700:d0::a29f:c001]:2408").unwrap(),
            ("2606:4700:d0::a29f:c001".to_string(), 2408)
        );
    }

    #[test]
    fn test_parse_endpoint_errors() {
        assert!(parse_endpoint("example.com").is_err());
        assert!(parse_endpoint("example.com:0").is_err());
        assert!(parse_endpoint("example.com:70000").is_err());
        assert!(parse_endpoint("bad_host:443").is_err());
        assert!(parse_endpoint("[::1:443").is_err());
    }
}
