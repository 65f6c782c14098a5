// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! IP prefix addresses as found in `Prefix.net_address`.

use std::net::IpAddr;
use std::str::FromStr;

/// An IP network in CIDR notation.
///
/// A bare address parses as a host prefix (/32 or /128). Host bits are
/// kept as given; [`NetAddress`]'s `Display` is the canonical form used in
/// store lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetAddress {
    addr: IpAddr,
    prefix_len: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid network address: {0}")]
pub struct NetAddressError(String);

impl NetAddress {
    #[must_use]
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    #[must_use]
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// 4 or 6.
    #[must_use]
    pub fn version(&self) -> u8 {
        match self.addr {
            IpAddr::V4(_) => 4,
            IpAddr::V6(_) => 6,
        }
    }

    /// Host prefix: IPv4 /32 or IPv6 /128.
    #[must_use]
    pub fn is_host(&self) -> bool {
        match self.addr {
            IpAddr::V4(_) => self.prefix_len == 32,
            IpAddr::V6(_) => self.prefix_len == 128,
        }
    }
}

impl FromStr for NetAddress {
    type Err = NetAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (addr, len) = match s.split_once('/') {
            Some((addr, len)) => (addr, Some(len)),
            None => (s, None),
        };
        let addr = IpAddr::from_str(addr).map_err(|_| NetAddressError(s.to_string()))?;
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        let prefix_len = match len {
            Some(len) => len.parse::<u8>().map_err(|_| NetAddressError(s.to_string()))?,
            None => max,
        };
        if prefix_len > max {
            return Err(NetAddressError(s.to_string()));
        }
        Ok(Self { addr, prefix_len })
    }
}

impl std::fmt::Display for NetAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_v4() {
        let net: NetAddress = "10.0.0.0/30".parse().unwrap();
        assert_eq!(net.version(), 4);
        assert_eq!(net.prefix_len(), 30);
        assert!(!net.is_host());
    }

    #[test]
    fn test_bare_address_is_host_prefix() {
        let net: NetAddress = "10.1.2.3".parse().unwrap();
        assert!(net.is_host());
        assert_eq!(net.to_string(), "10.1.2.3/32");
    }

    #[test]
    fn test_parse_v6() {
        let net: NetAddress = "2001:db8::1/128".parse().unwrap();
        assert_eq!(net.version(), 6);
        assert!(net.is_host());
    }

    #[test]
    fn test_canonical_display() {
        let net: NetAddress = " 2001:DB8:0::/64 ".parse().unwrap();
        assert_eq!(net.to_string(), "2001:db8::/64");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("not-an-address".parse::<NetAddress>().is_err());
        assert!("10.0.0.0/33".parse::<NetAddress>().is_err());
        assert!("10.0.0.0/x".parse::<NetAddress>().is_err());
    }
}
