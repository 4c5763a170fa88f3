//! IP address handling
//!
//! An [`IpAddress`] holds the network-byte-order binary form of an IPv4 or
//! IPv6 address. Parsing tries the IPv4 grammar first so a dotted quad is
//! never taken for anything else, then falls back to IPv6.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use super::{Error, Family, Result};

/// A validated IP address.
///
/// An address built from raw bytes of the wrong length is *unset*: it
/// reports [`Family::Unspecified`], renders as the empty string and exposes
/// an empty binary view. Every other instance is a valid IPv4 or IPv6
/// address.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpAddress {
    binary: Binary,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Binary {
    Unset,
    V4([u8; 4]),
    V6([u8; 16]),
}

impl IpAddress {
    /// Parse the textual form of an IPv4 or IPv6 address.
    ///
    /// The whole string must be a literal of one family; surrounding
    /// whitespace, ports, brackets and zone ids are rejected.
    ///
    /// # Examples
    /// ```
    /// use netpoint::{Family, IpAddress};
    ///
    /// let ip = IpAddress::parse("0:0:0:0:0:0:0:1").unwrap();
    /// assert_eq!(ip.family(), Family::Ipv6);
    /// assert_eq!(ip.to_text(), "::1");
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        if let Ok(v4) = text.parse::<Ipv4Addr>() {
            return Ok(Self::from(v4));
        }
        if let Ok(v6) = text.parse::<Ipv6Addr>() {
            return Ok(Self::from(v6));
        }
        Err(Error::InvalidAddress(text.to_string()))
    }

    /// Build an address from its binary (network byte order) form.
    ///
    /// 4 bytes give an IPv4 address, 16 bytes an IPv6 address. Any other
    /// length gives an unset address; check [`IpAddress::is_valid`].
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let binary = match bytes.len() {
            4 => {
                let mut octets = [0u8; 4];
                octets.copy_from_slice(bytes);
                Binary::V4(octets)
            }
            16 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(bytes);
                Binary::V6(octets)
            }
            len => {
                tracing::debug!(len, "IP address binary has an unusable length");
                Binary::Unset
            }
        };
        IpAddress { binary }
    }

    /// Check whether `text` is a valid IPv4 or IPv6 literal.
    pub fn is_valid_text(text: &str) -> bool {
        text.parse::<Ipv4Addr>().is_ok() || text.parse::<Ipv6Addr>().is_ok()
    }

    /// Check whether this address holds an IPv4 or IPv6 value.
    pub fn is_valid(&self) -> bool {
        !matches!(self.binary, Binary::Unset)
    }

    /// The family of the address.
    pub fn family(&self) -> Family {
        match self.binary {
            Binary::Unset => Family::Unspecified,
            Binary::V4(_) => Family::Ipv4,
            Binary::V6(_) => Family::Ipv6,
        }
    }

    /// The binary representation in network byte order.
    ///
    /// 4 bytes for IPv4, 16 bytes for IPv6, empty for an unset address.
    pub fn octets(&self) -> &[u8] {
        match &self.binary {
            Binary::Unset => &[],
            Binary::V4(octets) => octets,
            Binary::V6(octets) => octets,
        }
    }

    /// Canonical text form: dotted decimal for IPv4, lowercase hex with
    /// zero compression for IPv6. Empty for an unset address.
    pub fn to_text(&self) -> String {
        self.to_std().map(|ip| ip.to_string()).unwrap_or_default()
    }

    /// Convert to the standard library type, if set.
    pub fn to_std(&self) -> Option<IpAddr> {
        match self.binary {
            Binary::Unset => None,
            Binary::V4(octets) => Some(IpAddr::V4(Ipv4Addr::from(octets))),
            Binary::V6(octets) => Some(IpAddr::V6(Ipv6Addr::from(octets))),
        }
    }

    /// Check whether this is a loopback address. False when unset.
    pub fn is_loopback(&self) -> bool {
        self.to_std().is_some_and(|ip| ip.is_loopback())
    }
}

impl From<Ipv4Addr> for IpAddress {
    fn from(ip: Ipv4Addr) -> Self {
        IpAddress { binary: Binary::V4(ip.octets()) }
    }
}

impl From<Ipv6Addr> for IpAddress {
    fn from(ip: Ipv6Addr) -> Self {
        IpAddress { binary: Binary::V6(ip.octets()) }
    }
}

impl From<IpAddr> for IpAddress {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => v4.into(),
            IpAddr::V6(v6) => v6.into(),
        }
    }
}

impl FromStr for IpAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_std() {
            Some(ip) => write!(f, "{}", ip),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_std() {
            Some(ip) => write!(f, "IpAddress({})", ip),
            None => f.write_str("IpAddress(<unset>)"),
        }
    }
}
