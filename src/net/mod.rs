//! Network addressing for netpoint
//!
//! This module provides the value types a client needs before it dials:
//! validated IP addresses, native socket addresses ready for the kernel,
//! and endpoints describing either a network service or a local IPC peer.
//! Nothing here opens sockets or resolves host names.

use std::fmt;
use std::path::PathBuf;

use crate::syserr::SystemError;

pub mod endpoint;
pub mod ip;
#[cfg(unix)]
pub mod sockaddr;

pub use endpoint::{CommunicationMode, Endpoint};
pub use ip::IpAddress;
#[cfg(unix)]
pub use sockaddr::SocketAddress;

/// Result type for address operations
pub type Result<T> = std::result::Result<T, Error>;

/// Address construction errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid IP address: {0:?}")]
    InvalidAddress(String),

    #[error("IPC path too long ({len} bytes, max {max}): {}", .path.display())]
    PathTooLong { path: PathBuf, len: usize, max: usize },

    #[error("IPC path contains a NUL byte: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Unsupported address family: {0}")]
    UnsupportedFamily(Family),

    #[error(transparent)]
    System(#[from] SystemError),
}

/// A protocol family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Local communication (Unix domain sockets).
    Local,
    /// The IP version 4 Internet protocols.
    Ipv4,
    /// The IP version 6 Internet protocols.
    Ipv6,
    /// No family; reported by an unset IP address.
    Unspecified,
}

impl Family {
    /// Native `AF_*` value of the family.
    #[cfg(unix)]
    pub fn to_native(self) -> libc::c_int {
        match self {
            Family::Local => libc::AF_UNIX,
            Family::Ipv4 => libc::AF_INET,
            Family::Ipv6 => libc::AF_INET6,
            Family::Unspecified => libc::AF_UNSPEC,
        }
    }

    /// Short human readable name of the family.
    pub fn as_str(self) -> &'static str {
        match self {
            Family::Local => "Unix",
            Family::Ipv4 => "IPv4",
            Family::Ipv6 => "IPv6",
            Family::Unspecified => "unspecified",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
