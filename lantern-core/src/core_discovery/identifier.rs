//! Identifier types
//!
//! Peers are named by signaling identifiers of the form
//! `user@domain/resource`; directly dialed proxies by `host:port`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::ClassificationError;

/// A validated peer identifier
///
/// Equality is on the exact (trimmed) identifier text, which is what pool
/// membership and the trust gate compare on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerUri(String);

impl PeerUri {
    /// Parse a raw identifier, rejecting anything that is not a legal URI
    pub fn parse(raw: &str) -> Result<Self, ClassificationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ClassificationError::Empty);
        }

        let malformed = |reason: String| ClassificationError::MalformedUri {
            identifier: trimmed.to_string(),
            reason,
        };

        let bytes = trimmed.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            if b == b'%' {
                let escape = bytes.get(i + 1..i + 3);
                match escape {
                    Some([h, l]) if h.is_ascii_hexdigit() && l.is_ascii_hexdigit() => {
                        i += 3;
                        continue;
                    }
                    _ => return Err(malformed(format!("bad escape sequence at index {}", i))),
                }
            }
            if !is_uri_char(b) {
                return Err(malformed(format!(
                    "illegal character {:?} at index {}",
                    char::from(b),
                    i
                )));
            }
            i += 1;
        }

        Ok(PeerUri(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The account part of the identifier, without the resource
    pub fn account(&self) -> &str {
        account_of(&self.0)
    }

    /// The resource part of the identifier, if any
    pub fn resource(&self) -> Option<&str> {
        self.0.split_once('/').map(|(_, resource)| resource)
    }
}

impl fmt::Display for PeerUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PeerUri {
    type Error = ClassificationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PeerUri::parse(&value)
    }
}

impl From<PeerUri> for String {
    fn from(uri: PeerUri) -> Self {
        uri.0
    }
}

impl AsRef<str> for PeerUri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// RFC 3986 unreserved and reserved characters
fn is_uri_char(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'-' | b'.'
                | b'_'
                | b'~'
                | b':'
                | b'/'
                | b'?'
                | b'#'
                | b'['
                | b']'
                | b'@'
                | b'!'
                | b'$'
                | b'&'
                | b'\''
                | b'('
                | b')'
                | b'*'
                | b'+'
                | b','
                | b';'
                | b'='
        )
}

/// Strip the resource from an identifier (`bob@example.com/x` -> `bob@example.com`)
pub fn account_of(identifier: &str) -> &str {
    let trimmed = identifier.trim();
    match trimmed.split_once('/') {
        Some((account, _)) => account,
        None => trimmed,
    }
}

/// A directly dialed proxy endpoint
///
/// Keyed on the identifier it was announced under together with the address
/// it resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectEndpoint {
    id: String,
    host: String,
    port: u16,
}

impl DirectEndpoint {
    pub fn new(id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
        }
    }

    /// Parse a bare `host:port` candidate, splitting on the last `:`
    pub fn parse(raw: &str) -> Result<Self, ClassificationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ClassificationError::Empty);
        }

        let (host, port) = trimmed
            .rsplit_once(':')
            .ok_or_else(|| ClassificationError::MissingPort(trimmed.to_string()))?;

        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(ClassificationError::MissingHost(trimmed.to_string()));
        }
        if port.is_empty() {
            return Err(ClassificationError::MissingPort(trimmed.to_string()));
        }

        let port: u16 = port.parse().map_err(|_| ClassificationError::InvalidPort {
            identifier: trimmed.to_string(),
            port: port.to_string(),
        })?;
        if port == 0 {
            return Err(ClassificationError::InvalidPort {
                identifier: trimmed.to_string(),
                port: "0".to_string(),
            });
        }

        Ok(Self::new(trimmed, host, port))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `true` when this endpoint dials the given address
    pub fn dials(&self, host: &str, port: u16) -> bool {
        self.port == port && self.host.eq_ignore_ascii_case(host)
    }

    /// `host:port`, bracketing IPv6 literals
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for DirectEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_uri_parse() {
        let uri = PeerUri::parse("  alice@example.com/-lan-1 ").unwrap();
        assert_eq!(uri.as_str(), "alice@example.com/-lan-1");
        assert_eq!(uri.account(), "alice@example.com");
        assert_eq!(uri.resource(), Some("-lan-1"));
    }

    #[test]
    fn test_peer_uri_rejects_malformed() {
        assert_eq!(PeerUri::parse("   "), Err(ClassificationError::Empty));
        assert!(PeerUri::parse("alice smith@example.com").is_err());
        assert!(PeerUri::parse("alice@example.com/<res>").is_err());
        assert!(PeerUri::parse("alice@example.com/%zz").is_err());
        assert!(PeerUri::parse("alice@example.com/%2F").is_ok());
    }

    #[test]
    fn test_peer_uri_serde() {
        let uri = PeerUri::parse("alice@example.com/-lan-1").unwrap();
        let json = serde_json::to_string(&uri).unwrap();
        assert_eq!(json, "\"alice@example.com/-lan-1\"");

        let back: PeerUri = serde_json::from_str(&json).unwrap();
        assert_eq!(back, uri);
        assert!(serde_json::from_str::<PeerUri>("\"bad id\"").is_err());
    }

    #[test]
    fn test_account_of() {
        assert_eq!(account_of("bob@example.com/-lan-2"), "bob@example.com");
        assert_eq!(account_of("bob@example.com"), "bob@example.com");
    }

    #[test]
    fn test_direct_endpoint_parse() {
        let ep = DirectEndpoint::parse("10.0.0.5:8080").unwrap();
        assert_eq!(ep.id(), "10.0.0.5:8080");
        assert_eq!(ep.host(), "10.0.0.5");
        assert_eq!(ep.port(), 8080);
        assert_eq!(ep.address(), "10.0.0.5:8080");

        let ep = DirectEndpoint::parse("[::1]:443").unwrap();
        assert_eq!(ep.host(), "::1");
        assert_eq!(ep.address(), "[::1]:443");
    }

    #[test]
    fn test_direct_endpoint_rejects_bad_ports() {
        assert!(matches!(
            DirectEndpoint::parse("proxy.example.com"),
            Err(ClassificationError::MissingPort(_))
        ));
        assert!(matches!(
            DirectEndpoint::parse("proxy.example.com:"),
            Err(ClassificationError::MissingPort(_))
        ));
        assert!(matches!(
            DirectEndpoint::parse("proxy.example.com:http"),
            Err(ClassificationError::InvalidPort { .. })
        ));
        assert!(matches!(
            DirectEndpoint::parse("proxy.example.com:70000"),
            Err(ClassificationError::InvalidPort { .. })
        ));
        assert!(matches!(
            DirectEndpoint::parse(":8080"),
            Err(ClassificationError::MissingHost(_))
        ));
    }

    #[test]
    fn test_direct_endpoint_dials() {
        let ep = DirectEndpoint::new("Proxy.Example.com:80", "Proxy.Example.com", 80);
        assert!(ep.dials("proxy.example.com", 80));
        assert!(!ep.dials("proxy.example.com", 81));
    }
}
