//! System error reporting
//!
//! Captures the calling thread's last platform error right after a failed
//! system call and either logs it or packages it as a [`SystemError`].
//!
//! Windows keeps socket errors apart from everything else (`WSAGetLastError`
//! vs `GetLastError`), so callers pick the [`Domain`] the failed call belongs
//! to. [`Domain::NETWORK`] names the right one for socket calls on every
//! target.
//!
//! The last-error slot is overwritten by the next platform call, so query it
//! immediately and never keep the code around for later.

use std::fmt;
use std::io;

/// An error domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    /// Generic OS errors (`errno`, `GetLastError`).
    System,
    /// Windows Sockets errors (`WSAGetLastError`).
    #[cfg(windows)]
    Socket,
}

impl Domain {
    /// The domain socket calls report their errors through.
    #[cfg(windows)]
    pub const NETWORK: Domain = Domain::Socket;
    /// The domain socket calls report their errors through.
    #[cfg(not(windows))]
    pub const NETWORK: Domain = Domain::System;

    /// Last error code of this domain for the calling thread.
    pub fn last_error(self) -> i32 {
        match self {
            Domain::System => io::Error::last_os_error().raw_os_error().unwrap_or(0),
            #[cfg(windows)]
            Domain::Socket => {
                // SAFETY: WSAGetLastError only reads thread-local state.
                unsafe { sys::WSAGetLastError() }
            }
        }
    }

    /// Log the last error of this domain. Never fails.
    pub fn report(self, context: &str) {
        self.make_error(context).report();
    }

    /// Capture the last error of this domain as a [`SystemError`].
    pub fn make_error(self, context: &str) -> SystemError {
        SystemError::new(self, context, self.last_error())
    }

    /// Short name of the domain used in messages.
    pub fn name(self) -> &'static str {
        match self {
            Domain::System => "system",
            #[cfg(windows)]
            Domain::Socket => "wsa",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A failed platform call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{context}: {message} ({domain} error {code})")]
pub struct SystemError {
    domain: Domain,
    code: i32,
    context: String,
    message: String,
}

impl SystemError {
    /// Build an error for `code` of `domain`.
    pub fn new(domain: Domain, context: impl Into<String>, code: i32) -> Self {
        SystemError {
            domain,
            code,
            context: context.into(),
            message: describe(code),
        }
    }

    /// Capture the generic last OS error of the calling thread.
    pub fn last(context: impl Into<String>) -> Self {
        Self::new(Domain::System, context, Domain::System.last_error())
    }

    /// Domain the code belongs to.
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Platform error code.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Description of the failed operation.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Platform message for the code.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Write the error to the diagnostic log.
    pub fn report(&self) {
        tracing::error!(
            target: "netpoint::syserr",
            domain = %self.domain,
            code = self.code,
            "{}",
            self
        );
    }
}

impl From<SystemError> for io::Error {
    fn from(err: SystemError) -> Self {
        let kind = io::Error::from_raw_os_error(err.code).kind();
        io::Error::new(kind, err)
    }
}

/// Human readable message for an OS error code.
#[cfg(unix)]
fn describe(code: i32) -> String {
    let mut buf = [0 as libc::c_char; 256];
    // SAFETY: buf is writable for its whole length; strerror_r NUL-terminates
    // on success.
    let rc = unsafe { libc::strerror_r(code, buf.as_mut_ptr(), buf.len()) };
    if rc != 0 {
        return format!("Unknown error {}", code);
    }
    // SAFETY: strerror_r succeeded, so buf holds a NUL-terminated string.
    let msg = unsafe { std::ffi::CStr::from_ptr(buf.as_ptr()) };
    msg.to_string_lossy().into_owned()
}

#[cfg(not(unix))]
fn describe(code: i32) -> String {
    // Strip the " (os error N)" suffix std appends; the code is kept separately.
    let text = io::Error::from_raw_os_error(code).to_string();
    match text.rfind(" (os error ") {
        Some(pos) => text[..pos].to_string(),
        None => text,
    }
}

#[cfg(windows)]
mod sys {
    #[link(name = "ws2_32")]
    extern "system" {
        pub fn WSAGetLastError() -> i32;
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    fn fail_close() {
        // SAFETY: closing an invalid descriptor has no effect besides errno.
        let rc = unsafe { libc::close(-1) };
        assert_eq!(rc, -1);
    }

    #[test]
    fn test_last_error_after_failed_call() {
        fail_close();
        assert_eq!(Domain::System.last_error(), libc::EBADF);
    }

    #[test]
    fn test_network_domain_is_system_on_unix() {
        assert_eq!(Domain::NETWORK, Domain::System);
        fail_close();
        assert_eq!(Domain::NETWORK.last_error(), libc::EBADF);
    }

    #[test]
    fn test_make_error() {
        fail_close();
        let err = Domain::System.make_error("close");
        assert_eq!(err.domain(), Domain::System);
        assert_eq!(err.code(), libc::EBADF);
        assert_eq!(err.context(), "close");
        assert!(!err.message().is_empty());
        assert_eq!(
            err.to_string(),
            format!("close: {} (system error {})", err.message(), libc::EBADF)
        );
    }

    #[test]
    fn test_last() {
        fail_close();
        let err = SystemError::last("close");
        assert_eq!(err.code(), libc::EBADF);
    }

    #[test]
    fn test_describe() {
        let expected = io::Error::from_raw_os_error(libc::ENOENT).to_string();
        assert!(expected.starts_with(&describe(libc::ENOENT)));
    }

    #[test]
    fn test_into_io_error() {
        let err = SystemError::new(Domain::System, "connect", libc::ECONNREFUSED);
        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::ConnectionRefused);
        assert!(io_err.to_string().starts_with("connect: "));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_report_writes_diagnostic_line() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            fail_close();
            Domain::System.report("close(-1)");
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("ERROR"), "{}", output);
        assert!(output.contains("close(-1): "), "{}", output);
        assert!(output.contains(&format!("code={}", libc::EBADF)), "{}", output);
        assert!(output.contains("domain=system"), "{}", output);
    }
}
