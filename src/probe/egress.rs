//! Best-effort summary of an egress-identity response.
//!
//! Identity services disagree on field names (`ip` vs `query`, `org` vs
//! `isp`), and some answer with a bare address. Nothing here is required for
//! a probe to succeed.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

const IP_KEYS: &[&str] = &["ip", "query", "origin", "ip_addr"];
const ORG_KEYS: &[&str] = &["org", "isp", "asn_org", "as"];
const COUNTRY_KEYS: &[&str] = &["country", "country_code", "countryCode", "country_name"];
const CITY_KEYS: &[&str] = &["city"];

/// What the identity service says about the egress address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressInfo {
    /// Public address seen by the service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// Owning organisation or ISP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    /// Country name or code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// City.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

impl EgressInfo {
    /// Extract what can be recognised from a response body.
    pub fn from_body(body: &[u8]) -> Option<Self> {
        if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
            let pick = |keys: &[&str]| {
                keys.iter()
                    .filter_map(|k| map.get(*k))
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .find(|s| !s.is_empty())
                    .map(str::to_string)
            };
            let info = EgressInfo {
                ip: pick(IP_KEYS),
                org: pick(ORG_KEYS),
                country: pick(COUNTRY_KEYS),
                city: pick(CITY_KEYS),
            };
            return (info != EgressInfo::default()).then_some(info);
        }

        let text = std::str::from_utf8(body).ok()?.trim();
        text.parse::<IpAddr>().ok().map(|ip| EgressInfo {
            ip: Some(ip.to_string()),
            ..Default::default()
        })
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        let ip = self.ip.as_deref().unwrap_or("unknown address");
        let details: Vec<&str> = [&self.org, &self.city, &self.country]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .collect();
        if details.is_empty() {
            ip.to_string()
        } else {
            format!("{} ({})", ip, details.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipinfo_shape() {
        let body = br#"{"ip":"203.0.113.9","city":"Frankfurt am Main","country":"DE","org":"AS13335 Cloudflare, Inc."}"#;
        let info = EgressInfo::from_body(body).unwrap();
        assert_eq!(info.ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(
            info.summary(),
            "203.0.113.9 (AS13335 Cloudflare, Inc., Frankfurt am Main, DE)"
        );
    }

    #[test]
    fn test_ip_api_shape() {
        let body = br#"{"status":"success","query":"198.51.100.4","isp":"Hetzner Online GmbH","countryCode":"FI"}"#;
        let info = EgressInfo::from_body(body).unwrap();
        assert_eq!(info.ip.as_deref(), Some("198.51.100.4"));
        assert_eq!(info.org.as_deref(), Some("Hetzner Online GmbH"));
        assert_eq!(info.country.as_deref(), Some("FI"));
        assert!(info.city.is_none());
    }

    #[test]
    fn test_bare_address() {
        let info = EgressInfo::from_body(b"2001:db8::7\n").unwrap();
        assert_eq!(info.summary(), "2001:db8::7");
    }

    #[test]
    fn test_unrecognised_bodies() {
        assert!(EgressInfo::from_body(b"<html>hello</html>").is_none());
        assert!(EgressInfo::from_body(br#"{"hello":"world"}"#).is_none());
        assert!(EgressInfo::from_body(b"").is_none());
    }
}
