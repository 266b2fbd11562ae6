//! Indicator extraction from free-form text.
//!
//! Patterns are tried in a fixed priority order (IPv4, then IPv6, then URL)
//! and the first match of the first matching pattern wins.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static IPV4_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").unwrap());

static IPV6_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:[a-fA-F0-9]{1,4}:){7}[a-fA-F0-9]{1,4}\b").unwrap());

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bhttps?://[^\s/$.?#].[^\s]*\b").unwrap());

/// What kind of artifact an indicator is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Ipv4,
    Ipv6,
    Domain,
    Url,
}

impl std::fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ipv4 => write!(f, "IPv4"),
            Self::Ipv6 => write!(f, "IPv6"),
            Self::Domain => write!(f, "Domain"),
            Self::Url => write!(f, "URL"),
        }
    }
}

/// A concrete threat artifact pulled out of submitted content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    pub kind: IndicatorKind,
    pub value: String,
}

impl Indicator {
    pub fn new(kind: IndicatorKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn is_address(&self) -> bool {
        matches!(self.kind, IndicatorKind::Ipv4 | IndicatorKind::Ipv6)
    }

    /// Reduce a URL indicator to the domain it points at.
    ///
    /// Returns `None` for non-URL indicators and for URLs without a
    /// textual host.
    pub fn to_domain(&self) -> Option<Indicator> {
        if self.kind != IndicatorKind::Url {
            return None;
        }
        let parsed = url::Url::parse(&self.value).ok()?;
        match parsed.host()? {
            url::Host::Domain(host) => Some(Indicator::new(IndicatorKind::Domain, host)),
            url::Host::Ipv4(addr) => Some(Indicator::new(IndicatorKind::Ipv4, addr.to_string())),
            url::Host::Ipv6(addr) => Some(Indicator::new(IndicatorKind::Ipv6, addr.to_string())),
        }
    }
}

/// Extract the highest-priority indicator from `text`.
pub fn extract(text: &str) -> Option<Indicator> {
    let patterns: [(&Lazy<Regex>, IndicatorKind); 3] = [
        (&IPV4_RE, IndicatorKind::Ipv4),
        (&IPV6_RE, IndicatorKind::Ipv6),
        (&URL_RE, IndicatorKind::Url),
    ];

    patterns
        .iter()
        .find_map(|(re, kind)| re.find(text).map(|m| Indicator::new(*kind, m.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn finds_ipv4_in_sentence() {
        let found = extract("suspicious hit from 203.0.113.7 today").unwrap();
        assert_eq!(found, Indicator::new(IndicatorKind::Ipv4, "203.0.113.7"));
    }

    #[test]
    fn finds_ipv6() {
        let found = extract("beacon to 2001:0db8:85a3:0000:0000:8a2e:0370:7334 seen").unwrap();
        assert_eq!(found.kind, IndicatorKind::Ipv6);
        assert_eq!(found.value, "2001:0db8:85a3:0000:0000:8a2e:0370:7334");
    }

    #[test]
    fn finds_url() {
        let found = extract("payload pulled from https://evil.example/stage2.bin").unwrap();
        assert_eq!(found.kind, IndicatorKind::Url);
        assert_eq!(found.value, "https://evil.example/stage2.bin");
    }

    #[test]
    fn ipv4_wins_over_url() {
        let found = extract("see https://evil.example/x then 10.0.0.9").unwrap();
        assert_eq!(found, Indicator::new(IndicatorKind::Ipv4, "10.0.0.9"));
    }

    #[test]
    fn first_ipv4_match_is_used() {
        let found = extract("10.0.0.1 and 10.0.0.2").unwrap();
        assert_eq!(found.value, "10.0.0.1");
    }

    #[test]
    fn nothing_to_find() {
        assert!(extract("all quiet on the perimeter").is_none());
        assert!(extract("").is_none());
    }

    #[test]
    fn url_reduces_to_domain() {
        let url = Indicator::new(IndicatorKind::Url, "https://Evil.Example:8443/path?q=1");
        let domain = url.to_domain().unwrap();
        assert_eq!(domain, Indicator::new(IndicatorKind::Domain, "evil.example"));
    }

    #[test]
    fn address_has_no_domain() {
        let ip = Indicator::new(IndicatorKind::Ipv4, "1.2.3.4");
        assert!(ip.to_domain().is_none());
        assert!(ip.is_address());
    }

    proptest! {
        #[test]
        fn lone_ipv4_is_returned_verbatim(a in 0u8..=255, b in 0u8..=255, c in 0u8..=255, d in 0u8..=255) {
            let ip = format!("{a}.{b}.{c}.{d}");
            let found = extract(&ip).unwrap();
            prop_assert_eq!(found.kind, IndicatorKind::Ipv4);
            prop_assert_eq!(found.value, ip);
        }

        #[test]
        fn ipv4_beats_ipv6(
            a in 0u8..=255, b in 0u8..=255, c in 0u8..=255, d in 0u8..=255,
            groups in proptest::collection::vec(0u16..=0xffff, 8),
            v6_first in any::<bool>(),
        ) {
            let v4 = format!("{a}.{b}.{c}.{d}");
            let v6 = groups.iter().map(|g| format!("{g:x}")).collect::<Vec<_>>().join(":");
            let text = if v6_first {
                format!("{v6} then {v4}")
            } else {
                format!("{v4} then {v6}")
            };
            let found = extract(&text).unwrap();
            prop_assert_eq!(found.kind, IndicatorKind::Ipv4);
            prop_assert_eq!(found.value, v4);
        }
    }
}
