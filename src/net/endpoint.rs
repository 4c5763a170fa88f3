//! Communication endpoints
//!
//! An [`Endpoint`] says how to reach a service: a network address and port,
//! or the local IPC mechanism of the target (a Unix domain socket path on
//! Unix, a named pipe on Windows). Exactly one mode is active per value and
//! every constructor validates its fields, so there is no empty endpoint.
//!
//! Supported text forms:
//! - "10.0.0.1:5432" - "10.0.0.1 5432"
//! - "[::1]:5432"    - "[::1] 5432"
//! - "db.local:5432"
//! - "unix:/var/run/postgresql/.s.PGSQL.5432" (Unix)
//! - `\\.\pipe\pgsql` or `\\server\pipe\pgsql` (Windows)
//!
//! Endpoints serialize through the same text form, so they can sit directly
//! in configuration files.

use std::fmt;
#[cfg(unix)]
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use super::{Error, Result};
#[cfg(unix)]
use super::{IpAddress, SocketAddress};

/// Prefix of the Unix domain socket text form.
#[cfg(unix)]
const UDS_PREFIX: &str = "unix:";

/// Server name of a pipe on the local machine.
#[cfg(windows)]
pub const LOCAL_PIPE_SERVER: &str = ".";

/// A communication mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommunicationMode {
    /// A Unix domain socket.
    #[cfg(unix)]
    Uds,
    /// A Windows named pipe.
    #[cfg(windows)]
    Wnp,
    /// A network service.
    Net,
}

/// A communication endpoint identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Endpoint {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Kind {
    Net { address: String, port: u16 },
    #[cfg(unix)]
    Uds { path: PathBuf },
    #[cfg(windows)]
    Wnp { server: String, pipe: String },
}

impl Endpoint {
    /// Create a network endpoint. `address` may be an IP literal or a host
    /// name.
    ///
    /// The address must not be empty, contain whitespace, brackets or
    /// backslashes, or be a word the IPC text forms claim (`unix`), so that
    /// the text form always reads back as the same endpoint.
    pub fn net(address: impl Into<String>, port: u16) -> Result<Self> {
        let address = address.into();
        if address.is_empty() {
            tracing::debug!(port, "endpoint rejected: empty network address");
            return Err(Error::InvalidEndpoint("empty network address".to_string()));
        }
        if address
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '[' | ']' | '\\'))
        {
            tracing::debug!(%address, port, "endpoint rejected: unusable network address");
            return Err(Error::InvalidEndpoint(format!("unusable network address {:?}", address)));
        }
        #[cfg(unix)]
        if UDS_PREFIX.strip_suffix(':') == Some(address.as_str()) {
            tracing::debug!(%address, port, "endpoint rejected: address reads as IPC prefix");
            return Err(Error::InvalidEndpoint(format!("network address {:?} is reserved", address)));
        }
        Ok(Endpoint { kind: Kind::Net { address, port } })
    }

    /// Create a Unix domain socket endpoint.
    #[cfg(unix)]
    pub fn uds(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            tracing::debug!("endpoint rejected: empty socket path");
            return Err(Error::InvalidEndpoint("empty socket path".to_string()));
        }
        Ok(Endpoint { kind: Kind::Uds { path } })
    }

    /// Create an endpoint for a named pipe on the local machine.
    #[cfg(windows)]
    pub fn wnp(pipe: impl Into<String>) -> Result<Self> {
        Self::wnp_on(LOCAL_PIPE_SERVER, pipe)
    }

    /// Create an endpoint for a named pipe on `server`.
    #[cfg(windows)]
    pub fn wnp_on(server: impl Into<String>, pipe: impl Into<String>) -> Result<Self> {
        let server = server.into();
        let pipe = pipe.into();
        if server.is_empty() || pipe.is_empty() || server.contains('\\') {
            tracing::debug!(%server, %pipe, "endpoint rejected: empty pipe identity");
            return Err(Error::InvalidEndpoint("empty pipe server or pipe name".to_string()));
        }
        Ok(Endpoint { kind: Kind::Wnp { server, pipe } })
    }

    /// The communication mode of this endpoint.
    pub fn communication_mode(&self) -> CommunicationMode {
        match self.kind {
            Kind::Net { .. } => CommunicationMode::Net,
            #[cfg(unix)]
            Kind::Uds { .. } => CommunicationMode::Uds,
            #[cfg(windows)]
            Kind::Wnp { .. } => CommunicationMode::Wnp,
        }
    }

    /// Network address of the host, if the mode is [`CommunicationMode::Net`].
    pub fn net_address(&self) -> Option<&str> {
        match &self.kind {
            Kind::Net { address, .. } => Some(address),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Port of the host, if the mode is [`CommunicationMode::Net`].
    pub fn net_port(&self) -> Option<u16> {
        match self.kind {
            Kind::Net { port, .. } => Some(port),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Socket path, if the mode is [`CommunicationMode::Uds`].
    #[cfg(unix)]
    pub fn uds_path(&self) -> Option<&Path> {
        match &self.kind {
            Kind::Uds { path } => Some(path),
            _ => None,
        }
    }

    /// Pipe server name, if the mode is [`CommunicationMode::Wnp`].
    #[cfg(windows)]
    pub fn wnp_server_name(&self) -> Option<&str> {
        match &self.kind {
            Kind::Wnp { server, .. } => Some(server),
            _ => None,
        }
    }

    /// Pipe name, if the mode is [`CommunicationMode::Wnp`].
    #[cfg(windows)]
    pub fn wnp_pipe_name(&self) -> Option<&str> {
        match &self.kind {
            Kind::Wnp { pipe, .. } => Some(pipe),
            _ => None,
        }
    }

    /// Full pipe path (`\\server\pipe\name`), as `CreateFile` takes it.
    #[cfg(windows)]
    pub fn wnp_path(&self) -> Option<String> {
        match &self.kind {
            Kind::Wnp { server, pipe } => Some(format!(r"\\{}\pipe\{}", server, pipe)),
            _ => None,
        }
    }

    /// Build the native socket address to dial.
    ///
    /// The network address must be an IP literal; host names are not
    /// resolved here.
    #[cfg(unix)]
    pub fn socket_address(&self) -> Result<SocketAddress> {
        tracing::trace!(endpoint = %self, "building socket address");
        match &self.kind {
            Kind::Net { address, port } => {
                let ip = IpAddress::parse(address)?;
                SocketAddress::from_ip_port(&ip, *port)
            }
            Kind::Uds { path } => SocketAddress::from_ipc_path(path),
        }
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim_start();

        // IPC payloads are taken verbatim, trailing whitespace included
        #[cfg(unix)]
        if let Some(path) = s.strip_prefix(UDS_PREFIX) {
            return Endpoint::uds(path);
        }

        #[cfg(windows)]
        if let Some(rest) = s.strip_prefix(r"\\") {
            return parse_pipe(rest);
        }

        let s = s.trim_end();
        if s.is_empty() {
            return Err(Error::InvalidEndpoint("empty endpoint".to_string()));
        }

        let (host, port) = split_host_port(s)?;
        Endpoint::net(host, parse_port(port)?)
    }
}

/// Split a network endpoint into host and port parts
fn split_host_port(addr: &str) -> Result<(&str, &str)> {
    // IPv6 addresses in brackets: [::1]:80 or [::1] 80
    if let Some(rest) = addr.strip_prefix('[') {
        let close_bracket = rest
            .find(']')
            .ok_or_else(|| Error::InvalidEndpoint("IPv6 address lacks ']'".to_string()))?;

        let host = &rest[..close_bracket];
        let tail = &rest[close_bracket + 1..];

        if tail.is_empty() {
            return Err(Error::InvalidEndpoint(format!("missing port in {:?}", addr)));
        }

        let port = tail
            .strip_prefix(':')
            .or_else(|| tail.strip_prefix(' '))
            .ok_or_else(|| {
                Error::InvalidEndpoint("IPv6 address has wrong port separator".to_string())
            })?;
        return Ok((host, port.trim()));
    }

    // Space separator
    if let Some((host, port)) = addr.split_once(' ') {
        return Ok((host, port.trim()));
    }

    // Colon separator
    match addr.rfind(':') {
        Some(pos) if addr[..pos].contains(':') => Err(Error::InvalidEndpoint(format!(
            "IPv6 address must be in brackets: {:?}",
            addr
        ))),
        Some(pos) => Ok((&addr[..pos], &addr[pos + 1..])),
        None => Err(Error::InvalidEndpoint(format!("missing port in {:?}", addr))),
    }
}

/// Parse a decimal port number
fn parse_port(port: &str) -> Result<u16> {
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidPort(port.to_string()));
    }
    port.parse().map_err(|_| Error::InvalidPort(port.to_string()))
}

/// Parse `server\pipe\name` (the leading `\\` already stripped)
#[cfg(windows)]
fn parse_pipe(rest: &str) -> Result<Endpoint> {
    let mut parts = rest.splitn(3, '\\');
    let server = parts.next().unwrap_or_default();
    let marker = parts.next().unwrap_or_default();
    let pipe = parts.next().unwrap_or_default();

    if !marker.eq_ignore_ascii_case("pipe") {
        return Err(Error::InvalidEndpoint(format!(r"not a pipe path: \\{}", rest)));
    }
    Endpoint::wnp_on(server, pipe)
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Net { address, port } if address.contains(':') => {
                write!(f, "[{}]:{}", address, port)
            }
            Kind::Net { address, port } => write!(f, "{}:{}", address, port),
            #[cfg(unix)]
            Kind::Uds { path } => write!(f, "{}{}", UDS_PREFIX, path.display()),
            #[cfg(windows)]
            Kind::Wnp { server, pipe } => write!(f, r"\\{}\pipe\{}", server, pipe),
        }
    }
}

impl TryFrom<String> for Endpoint {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// Serializes the text form, failing when that text would not read back
/// as the same endpoint (for example a socket path that is not UTF-8).
impl Serialize for Endpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let text = self.to_string();
        match text.parse::<Endpoint>() {
            Ok(back) if back == *self => serializer.serialize_str(&text),
            _ => Err(serde::ser::Error::custom(format!(
                "endpoint {:?} has no lossless text form",
                self
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    struct Config {
        endpoint: Endpoint,
    }

    #[test]
    fn test_net_endpoint() {
        let endpoint = Endpoint::net("10.0.0.1", 5432).unwrap();
        assert_eq!(endpoint.communication_mode(), CommunicationMode::Net);
        assert_eq!(endpoint.net_address(), Some("10.0.0.1"));
        assert_eq!(endpoint.net_port(), Some(5432));
        #[cfg(unix)]
        assert_eq!(endpoint.uds_path(), None);
        #[cfg(windows)]
        {
            assert_eq!(endpoint.wnp_server_name(), None);
            assert_eq!(endpoint.wnp_pipe_name(), None);
            assert_eq!(endpoint.wnp_path(), None);
        }
    }

    #[test]
    fn test_net_endpoint_empty_address() {
        let err = Endpoint::net("", 5432).unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_uds_endpoint() {
        let endpoint = Endpoint::uds("/tmp/.s.PGSQL.5432").unwrap();
        assert_eq!(endpoint.communication_mode(), CommunicationMode::Uds);
        assert_eq!(endpoint.uds_path(), Some(Path::new("/tmp/.s.PGSQL.5432")));
        assert_eq!(endpoint.net_address(), None);
        assert_eq!(endpoint.net_port(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_uds_endpoint_empty_path() {
        assert!(matches!(Endpoint::uds(""), Err(Error::InvalidEndpoint(_))));
    }

    #[cfg(windows)]
    #[test]
    fn test_wnp_endpoint() {
        let endpoint = Endpoint::wnp("pgsql").unwrap();
        assert_eq!(endpoint.communication_mode(), CommunicationMode::Wnp);
        assert_eq!(endpoint.wnp_server_name(), Some("."));
        assert_eq!(endpoint.wnp_pipe_name(), Some("pgsql"));
        assert_eq!(endpoint.wnp_path().as_deref(), Some(r"\\.\pipe\pgsql"));
        assert_eq!(endpoint.net_address(), None);
        assert_eq!(endpoint.net_port(), None);

        assert!(Endpoint::wnp_on("", "pgsql").is_err());
        assert!(Endpoint::wnp_on("host", "").is_err());
    }

    #[cfg(windows)]
    #[test]
    fn test_parse_pipe() {
        let endpoint: Endpoint = r"\\db01\pipe\pgsql".parse().unwrap();
        assert_eq!(endpoint.wnp_server_name(), Some("db01"));
        assert_eq!(endpoint.wnp_pipe_name(), Some("pgsql"));
        assert!(r"\\db01\share\pgsql".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_parse_ipv4_with_colon() {
        let endpoint: Endpoint = "127.0.0.1:8080".parse().unwrap();
        assert_eq!(endpoint.net_address(), Some("127.0.0.1"));
        assert_eq!(endpoint.net_port(), Some(8080));
    }

    #[test]
    fn test_parse_ipv4_with_space() {
        let endpoint: Endpoint = "127.0.0.1 8080".parse().unwrap();
        assert_eq!(endpoint.net_address(), Some("127.0.0.1"));
        assert_eq!(endpoint.net_port(), Some(8080));
    }

    #[test]
    fn test_parse_ipv6_brackets() {
        let endpoint: Endpoint = "[::1]:8080".parse().unwrap();
        assert_eq!(endpoint.net_address(), Some("::1"));
        assert_eq!(endpoint.net_port(), Some(8080));

        let endpoint: Endpoint = "[fe80::1] 5432".parse().unwrap();
        assert_eq!(endpoint.net_address(), Some("fe80::1"));
        assert_eq!(endpoint.net_port(), Some(5432));
    }

    #[test]
    fn test_parse_hostname() {
        let endpoint: Endpoint = "localhost:80".parse().unwrap();
        assert_eq!(endpoint.net_address(), Some("localhost"));
        assert_eq!(endpoint.net_port(), Some(80));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for text in ["", "   ", "localhost", "::1", "[::1]", "[::1", "[::1]-80", ":80", "[]:80"] {
            assert!(text.parse::<Endpoint>().is_err(), "{:?}", text);
        }
    }

    #[test]
    fn test_parse_port_out_of_range() {
        for text in ["10.0.0.1:65536", "10.0.0.1:-1", "10.0.0.1:+80", "10.0.0.1:http", "10.0.0.1:"] {
            match text.parse::<Endpoint>() {
                Err(Error::InvalidPort(_)) => {}
                other => panic!("unexpected result for {:?}: {:?}", text, other),
            }
        }
        assert_eq!("10.0.0.1:65535".parse::<Endpoint>().unwrap().net_port(), Some(65535));
    }

    #[cfg(unix)]
    #[test]
    fn test_parse_uds() {
        let endpoint: Endpoint = "unix:/var/run/postgresql/.s.PGSQL.5432".parse().unwrap();
        assert_eq!(endpoint.communication_mode(), CommunicationMode::Uds);
        assert_eq!(endpoint.uds_path(), Some(Path::new("/var/run/postgresql/.s.PGSQL.5432")));
        assert!("unix:".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Endpoint::net("10.0.0.1", 5432).unwrap().to_string(), "10.0.0.1:5432");
        assert_eq!(Endpoint::net("::1", 5432).unwrap().to_string(), "[::1]:5432");
        #[cfg(unix)]
        assert_eq!(Endpoint::uds("/tmp/sock").unwrap().to_string(), "unix:/tmp/sock");
    }

    #[test]
    fn test_display_parses_back() {
        for text in ["10.0.0.1:5432", "[2001:db8::1]:6432", "db.local:5432"] {
            let endpoint: Endpoint = text.parse().unwrap();
            assert_eq!(endpoint.to_string(), text);
            assert_eq!(endpoint.to_string().parse::<Endpoint>().unwrap(), endpoint);
        }
    }

    #[test]
    fn test_config_deserialize() {
        let config: Config = toml::from_str(r#"endpoint = "10.0.0.1:5432""#).unwrap();
        assert_eq!(config.endpoint, Endpoint::net("10.0.0.1", 5432).unwrap());

        assert!(toml::from_str::<Config>(r#"endpoint = "10.0.0.1:99999""#).is_err());
        assert!(toml::from_str::<Config>(r#"endpoint = """#).is_err());
    }

    #[test]
    fn test_config_serialize() {
        let config = Config {
            endpoint: Endpoint::net("::1", 5432).unwrap(),
        };
        let text = toml::to_string(&config).unwrap();
        assert_eq!(text.trim(), r#"endpoint = "[::1]:5432""#);
    }

    fn toml_round_trip(endpoint: &Endpoint) -> Endpoint {
        let config = Config { endpoint: endpoint.clone() };
        let text = toml::to_string(&config).unwrap();
        toml::from_str::<Config>(&text).unwrap().endpoint
    }

    #[test]
    fn test_net_rejects_addresses_without_text_form() {
        for address in ["a b", "a\tb", " a", "[::1]", "::1]", "a\\b"] {
            match Endpoint::net(address, 80) {
                Err(Error::InvalidEndpoint(_)) => {}
                other => panic!("unexpected result for {:?}: {:?}", address, other),
            }
        }
        #[cfg(unix)]
        assert!(matches!(Endpoint::net("unix", 80), Err(Error::InvalidEndpoint(_))));
        // Only the exact prefix word is taken
        assert!(Endpoint::net("unixhost", 80).is_ok());
    }

    #[test]
    fn test_text_round_trip() {
        let mut endpoints = vec![
            Endpoint::net("10.0.0.1", 5432).unwrap(),
            Endpoint::net("::1", 0).unwrap(),
            Endpoint::net("db.local", 65535).unwrap(),
            Endpoint::net("unixhost", 80).unwrap(),
        ];
        #[cfg(unix)]
        endpoints.extend([
            Endpoint::uds("/tmp/s ").unwrap(),
            Endpoint::uds(" /tmp/lead").unwrap(),
            Endpoint::uds("/tmp/with space/.s.PGSQL.5432").unwrap(),
            Endpoint::uds("relative:80").unwrap(),
        ]);
        #[cfg(windows)]
        endpoints.extend([
            Endpoint::wnp("pgsql").unwrap(),
            Endpoint::wnp_on("db01", r"nested\pgsql ").unwrap(),
        ]);

        for endpoint in &endpoints {
            let back: Endpoint = endpoint.to_string().parse().unwrap();
            assert_eq!(&back, endpoint);
            assert_eq!(back.communication_mode(), endpoint.communication_mode());
            assert_eq!(&toml_round_trip(endpoint), endpoint);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_uds_keeps_trailing_whitespace() {
        let endpoint: Endpoint = "unix:/tmp/s ".parse().unwrap();
        assert_eq!(endpoint.uds_path(), Some(Path::new("/tmp/s ")));
    }

    #[cfg(unix)]
    #[test]
    fn test_serialize_fails_without_text_form() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let endpoint = Endpoint::uds(OsStr::from_bytes(b"/tmp/\xffsock")).unwrap();
        let config = Config { endpoint };
        assert!(toml::to_string(&config).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_socket_address_from_net() {
        let addr = Endpoint::net("10.0.0.1", 5432).unwrap().socket_address().unwrap();
        assert_eq!(addr.family(), crate::net::Family::Ipv4);
        assert_eq!(addr.port(), Some(5432));
        assert_eq!(addr.to_string(), "10.0.0.1:5432");
    }

    #[cfg(unix)]
    #[test]
    fn test_socket_address_from_uds() {
        let addr = Endpoint::uds("/tmp/.s.PGSQL.5432").unwrap().socket_address().unwrap();
        assert_eq!(addr.family(), crate::net::Family::Local);
        assert_eq!(addr.path(), Some(Path::new("/tmp/.s.PGSQL.5432")));
    }

    #[cfg(unix)]
    #[test]
    fn test_socket_address_hostname_not_resolved() {
        let endpoint = Endpoint::net("localhost", 5432).unwrap();
        assert!(matches!(endpoint.socket_address(), Err(Error::InvalidAddress(_))));
    }
}
