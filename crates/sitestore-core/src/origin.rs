//! Web origins (scheme + host + optional port) used to scope stored state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::StoreError;

const MAX_HOST_LEN: usize = 253;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Origin {
    scheme: String,
    host: String,
    port: Option<u16>,
}

impl Origin {
    /// Parse a bare origin or a full URL. Path, query, fragment and userinfo
    /// are discarded; scheme and host are lowercased; default ports dropped.
    pub fn parse(input: &str) -> Result<Self, StoreError> {
        let invalid = |why: &str| StoreError::InvalidOrigin(format!("{input:?}: {why}"));

        let trimmed = input.trim();
        let (scheme, rest) = trimmed
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme://"))?;
        let scheme = scheme.to_ascii_lowercase();
        let mut chars = scheme.chars();
        let scheme_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !scheme_ok {
            return Err(invalid("bad scheme"));
        }

        let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let authority = &rest[..authority_end];
        let host_port = match authority.rfind('@') {
            Some(at) => &authority[at + 1..],
            None => authority,
        };

        let (host, port_str) = if let Some(stripped) = host_port.strip_prefix('[') {
            let close = stripped.find(']').ok_or_else(|| invalid("unclosed IPv6 bracket"))?;
            let host = &host_port[..close + 2];
            let tail = &stripped[close + 1..];
            let port = match tail {
                "" => None,
                t => Some(t.strip_prefix(':').ok_or_else(|| invalid("junk after IPv6 host"))?),
            };
            (host, port)
        } else {
            match host_port.rsplit_once(':') {
                Some((h, p)) => (h, Some(p)),
                None => (host_port, None),
            }
        };

        let host = host.trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty() {
            return Err(invalid("empty host"));
        }
        if host.len() > MAX_HOST_LEN {
            return Err(invalid("host too long"));
        }
        let host_ok = host.starts_with('[')
            || host
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'));
        if !host_ok {
            return Err(invalid("illegal character in host"));
        }

        let port = match port_str {
            None | Some("") => None,
            Some(p) => Some(p.parse::<u16>().map_err(|_| invalid("bad port"))?),
        };
        let port = port.filter(|p| default_port(&scheme) != Some(*p));

        Ok(Self { scheme, host, port })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Explicit, non-default port.
    pub fn port(&self) -> Option<u16> {
        self.port
    }
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        "ftp" => Some(21),
        _ => None,
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        Ok(())
    }
}

impl FromStr for Origin {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Origin::parse(s)
    }
}

impl TryFrom<&str> for Origin {
    type Error = StoreError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Origin::parse(value)
    }
}

impl Serialize for Origin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Origin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Origin::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Anything the facade accepts where an origin is expected.
pub trait AsOrigin {
    fn to_origin(&self) -> Result<Origin, StoreError>;
}

impl AsOrigin for Origin {
    fn to_origin(&self) -> Result<Origin, StoreError> {
        Ok(self.clone())
    }
}

impl AsOrigin for str {
    fn to_origin(&self) -> Result<Origin, StoreError> {
        Origin::parse(self)
    }
}

impl AsOrigin for String {
    fn to_origin(&self) -> Result<Origin, StoreError> {
        Origin::parse(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_default_port() {
        let o = Origin::parse("HTTPS://News.Example:443/path?q=1#frag").unwrap();
        assert_eq!(o.to_string(), "https://news.example");
        assert_eq!(o.port(), None);
        assert_eq!(o, Origin::parse("https://news.example").unwrap());
    }

    #[test]
    fn keeps_non_default_port() {
        let o = Origin::parse("http://localhost:8080/").unwrap();
        assert_eq!(o.to_string(), "http://localhost:8080");
        assert_eq!(o.port(), Some(8080));
        assert_ne!(o, Origin::parse("http://localhost").unwrap());
    }

    #[test]
    fn drops_userinfo_and_trailing_dot() {
        let o = Origin::parse("https://user:pw@Bank.Example./login").unwrap();
        assert_eq!(o.to_string(), "https://bank.example");
    }

    #[test]
    fn ipv6_hosts() {
        let o = Origin::parse("http://[::1]:3000/x").unwrap();
        assert_eq!(o.host(), "[::1]");
        assert_eq!(o.to_string(), "http://[::1]:3000");
        let plain = Origin::parse("https://[2001:db8::1]").unwrap();
        assert_eq!(plain.port(), None);
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in [
            "news.example",
            "://news.example",
            "https://",
            "https://bad host",
            "https://a.example:99999",
            "1http://a.example",
            "http://[::1",
        ] {
            assert!(
                matches!(Origin::parse(bad), Err(StoreError::InvalidOrigin(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn serde_as_string() {
        let o = Origin::parse("https://a.example:8443").unwrap();
        let json = serde_json::to_string(&o).unwrap();
        assert_eq!(json, "\"https://a.example:8443\"");
        let back: Origin = serde_json::from_str(&json).unwrap();
        assert_eq!(back, o);
    }
}
