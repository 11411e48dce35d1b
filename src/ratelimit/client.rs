//! Client key derivation.

use std::net::{IpAddr, SocketAddr};

/// A key that identifies the origin of a request for abuse control.
///
/// Keys are the canonical text form of the client's IP address. They are
/// recomputed per request and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientKey(String);

impl ClientKey {
    /// Wrap an already derived key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive a key from request metadata.
    ///
    /// Precedence: the real-IP header, then the first element of the
    /// forwarded-for header, then the socket peer address. Header values that
    /// do not parse as an IP address are skipped.
    pub fn from_request_parts(
        real_ip: Option<&str>,
        forwarded_for: Option<&str>,
        peer: SocketAddr,
    ) -> Self {
        let from_real_ip = real_ip.and_then(parse_ip);
        let from_forwarded = forwarded_for
            .and_then(|value| value.split(',').next())
            .and_then(parse_ip);

        let ip = from_real_ip.or(from_forwarded).unwrap_or_else(|| peer.ip());
        Self::from(ip)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn parse_ip(value: &str) -> Option<IpAddr> {
    value.trim().parse().ok()
}

impl From<IpAddr> for ClientKey {
    fn from(ip: IpAddr) -> Self {
        // Mapped IPv4 addresses share the plain IPv4 counters
        let ip = match ip {
            IpAddr::V6(v6) => v6
                .to_ipv4_mapped()
                .map(IpAddr::V4)
                .unwrap_or(IpAddr::V6(v6)),
            v4 => v4,
        };
        Self(ip.to_string())
    }
}

impl From<&str> for ClientKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl std::fmt::Display for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
