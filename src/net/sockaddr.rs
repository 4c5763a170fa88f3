//! Native socket addresses
//!
//! [`SocketAddress`] owns exactly one of `sockaddr_un`, `sockaddr_in` or
//! `sockaddr_in6`, filled in the way the kernel expects, and hands out a
//! pointer and a length for `connect(2)`/`bind(2)` or a [`socket2::SockAddr`].

use std::ffi::OsStr;
use std::fmt;
use std::mem;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr;
use std::slice;

use super::{Error, Family, IpAddress, Result};

/// Capacity of `sun_path`, terminator included.
pub const IPC_PATH_CAPACITY: usize =
    mem::size_of::<libc::sockaddr_un>() - mem::offset_of!(libc::sockaddr_un, sun_path);

/// Keeps its statements only on targets whose socket addresses begin with
/// a length byte.
macro_rules! with_sa_len {
    ($($stmt:tt)*) => {
        #[cfg(any(
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd",
            target_os = "dragonfly"
        ))]
        {
            $($stmt)*
        }
    };
}

/// A socket address in native layout.
#[derive(Clone, Copy)]
pub struct SocketAddress {
    native: Native,
}

#[derive(Clone, Copy)]
enum Native {
    Local(libc::sockaddr_un),
    V4(libc::sockaddr_in),
    V6(libc::sockaddr_in6),
}

impl SocketAddress {
    /// Create a TCP/IP socket address.
    ///
    /// The port is written in network byte order. An unset `ip` has no
    /// family to build a structure for and is rejected.
    pub fn from_ip_port(ip: &IpAddress, port: u16) -> Result<Self> {
        match ip.to_std() {
            Some(IpAddr::V4(v4)) => Ok(Self::new_v4(v4, port)),
            Some(IpAddr::V6(v6)) => Ok(Self::new_v6(v6, port)),
            None => Err(Error::UnsupportedFamily(Family::Unspecified)),
        }
    }

    /// Create an IPv4 socket address
    pub fn new_v4(ip: Ipv4Addr, port: u16) -> Self {
        // SAFETY: sockaddr_in is plain old data, all zeroes is a valid value.
        let mut addr: libc::sockaddr_in = unsafe { mem::zeroed() };
        with_sa_len! {
            addr.sin_len = mem::size_of::<libc::sockaddr_in>() as u8;
        }
        addr.sin_family = libc::AF_INET as libc::sa_family_t;
        addr.sin_port = port.to_be();
        addr.sin_addr = libc::in_addr {
            s_addr: u32::from_ne_bytes(ip.octets()),
        };
        SocketAddress { native: Native::V4(addr) }
    }

    /// Create an IPv6 socket address with zero flow info and scope id
    pub fn new_v6(ip: Ipv6Addr, port: u16) -> Self {
        // SAFETY: sockaddr_in6 is plain old data, all zeroes is a valid value.
        let mut addr: libc::sockaddr_in6 = unsafe { mem::zeroed() };
        with_sa_len! {
            addr.sin6_len = mem::size_of::<libc::sockaddr_in6>() as u8;
        }
        addr.sin6_family = libc::AF_INET6 as libc::sa_family_t;
        addr.sin6_port = port.to_be();
        addr.sin6_flowinfo = 0;
        addr.sin6_addr.s6_addr = ip.octets();
        addr.sin6_scope_id = 0;
        SocketAddress { native: Native::V6(addr) }
    }

    /// Create a Unix domain socket address.
    ///
    /// The path and its NUL terminator must fit in `sun_path`; longer paths
    /// fail with [`Error::PathTooLong`] instead of being truncated.
    pub fn from_ipc_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = path.as_os_str().as_bytes();

        if bytes.contains(&0) {
            tracing::debug!(path = %path.display(), "IPC path rejected: embedded NUL");
            return Err(Error::InvalidPath(path.to_path_buf()));
        }
        if bytes.len() >= IPC_PATH_CAPACITY {
            tracing::debug!(path = %path.display(), len = bytes.len(), "IPC path rejected: too long");
            return Err(Error::PathTooLong {
                path: path.to_path_buf(),
                len: bytes.len(),
                max: IPC_PATH_CAPACITY - 1,
            });
        }

        // SAFETY: sockaddr_un is plain old data, all zeroes is a valid value.
        let mut addr: libc::sockaddr_un = unsafe { mem::zeroed() };
        addr.sun_family = libc::AF_UNIX as libc::sa_family_t;
        for (dst, src) in addr.sun_path.iter_mut().zip(bytes) {
            *dst = *src as libc::c_char;
        }
        Ok(SocketAddress { native: Native::Local(addr) })
    }

    /// The family of the socket address.
    pub fn family(&self) -> Family {
        match self.native {
            Native::Local(_) => Family::Local,
            Native::V4(_) => Family::Ipv4,
            Native::V6(_) => Family::Ipv6,
        }
    }

    /// Size in bytes of the native structure in use.
    pub fn size(&self) -> usize {
        match self.native {
            Native::Local(_) => mem::size_of::<libc::sockaddr_un>(),
            Native::V4(_) => mem::size_of::<libc::sockaddr_in>(),
            Native::V6(_) => mem::size_of::<libc::sockaddr_in6>(),
        }
    }

    /// [`size`](Self::size) as the `socklen_t` the socket calls take.
    pub fn len(&self) -> libc::socklen_t {
        self.size() as libc::socklen_t
    }

    /// Pointer to the native structure, valid for [`len`](Self::len) bytes
    /// while `self` is alive.
    pub fn as_ptr(&self) -> *const libc::sockaddr {
        match &self.native {
            Native::Local(addr) => (addr as *const libc::sockaddr_un).cast(),
            Native::V4(addr) => (addr as *const libc::sockaddr_in).cast(),
            Native::V6(addr) => (addr as *const libc::sockaddr_in6).cast(),
        }
    }

    /// Read-only byte view of the native structure.
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: the pointer refers to the active, fully initialised
        // structure, which has no implicit padding and spans `size()` bytes.
        unsafe { slice::from_raw_parts(self.as_ptr().cast::<u8>(), self.size()) }
    }

    /// Port number in host byte order, if this is a TCP/IP address.
    pub fn port(&self) -> Option<u16> {
        match &self.native {
            Native::Local(_) => None,
            Native::V4(addr) => Some(u16::from_be(addr.sin_port)),
            Native::V6(addr) => Some(u16::from_be(addr.sin6_port)),
        }
    }

    /// IP address, if this is a TCP/IP address.
    pub fn ip(&self) -> Option<IpAddress> {
        match &self.native {
            Native::Local(_) => None,
            Native::V4(addr) => Some(IpAddress::from_bytes(&addr.sin_addr.s_addr.to_ne_bytes())),
            Native::V6(addr) => Some(IpAddress::from_bytes(&addr.sin6_addr.s6_addr)),
        }
    }

    /// Socket path, if this is a Unix domain socket address.
    pub fn path(&self) -> Option<&Path> {
        match &self.native {
            Native::Local(addr) => {
                // SAFETY: c_char and u8 share size and alignment.
                let raw = unsafe {
                    slice::from_raw_parts(addr.sun_path.as_ptr().cast::<u8>(), addr.sun_path.len())
                };
                let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                Some(Path::new(OsStr::from_bytes(&raw[..end])))
            }
            _ => None,
        }
    }

    /// Convert to standard library SocketAddr if possible
    ///
    /// Returns None for Unix domain sockets
    pub fn to_std(&self) -> Option<SocketAddr> {
        let ip = self.ip()?.to_std()?;
        Some(SocketAddr::new(ip, self.port()?))
    }

    /// Copy into a [`socket2::SockAddr`] for use with [`socket2::Socket`].
    pub fn to_socket2(&self) -> socket2::SockAddr {
        // SAFETY: sockaddr_storage is plain old data, all zeroes is a valid value.
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        let bytes = self.as_bytes();
        debug_assert!(bytes.len() <= mem::size_of::<libc::sockaddr_storage>());
        // SAFETY: sockaddr_storage is large enough for every native layout,
        // and `len` matches the structure copied into it.
        unsafe {
            ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                (&mut storage as *mut libc::sockaddr_storage).cast::<u8>(),
                bytes.len(),
            );
            socket2::SockAddr::new(storage, self.len())
        }
    }
}

impl From<SocketAddr> for SocketAddress {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => SocketAddress::new_v4(*v4.ip(), v4.port()),
            SocketAddr::V6(v6) => SocketAddress::new_v6(*v6.ip(), v6.port()),
        }
    }
}

impl From<&SocketAddress> for socket2::SockAddr {
    fn from(addr: &SocketAddress) -> Self {
        addr.to_socket2()
    }
}

impl PartialEq for SocketAddress {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for SocketAddress {}

impl fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.to_std(), self.path()) {
            (Some(addr), _) => write!(f, "{}", addr),
            (None, Some(path)) => write!(f, "unix:{}", path.display()),
            (None, None) => Ok(()),
        }
    }
}

impl fmt::Debug for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketAddress")
            .field("family", &self.family())
            .field("size", &self.size())
            .field("addr", &format_args!("{}", self))
            .finish()
    }
}
