//! Endpoint and address layer.
//!
//! Describes how to reach a service (network host and port, Unix domain
//! socket path or Windows named pipe), parses textual IP addresses and
//! builds the native socket address structures that `connect(2)` and
//! `bind(2)` expect. Failures of platform calls are captured through
//! [`syserr`].

pub mod net;
pub mod syserr;

pub use net::{CommunicationMode, Endpoint, Error, Family, IpAddress, Result};
#[cfg(unix)]
pub use net::SocketAddress;
pub use syserr::{Domain, SystemError};
