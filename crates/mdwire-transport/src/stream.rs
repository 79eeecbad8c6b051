use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::address::DirectorAddress;
use crate::error::{Result, TransportError};

/// A connected director stream. Implements Read + Write.
///
/// Wraps a TCP stream or, on Unix, a Unix domain socket stream.
pub struct MdStream {
    inner: MdStreamInner,
}

enum MdStreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for MdStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            MdStreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            MdStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for MdStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            MdStreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            MdStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            MdStreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            MdStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl MdStream {
    /// Connect to a director (blocking).
    pub fn connect(address: &DirectorAddress) -> Result<Self> {
        let connect_err = |source| TransportError::Connect {
            address: address.to_string(),
            source,
        };

        let stream = match address {
            DirectorAddress::Tcp { .. } => {
                let target = address.socket_target().unwrap_or_default();
                let stream = TcpStream::connect(target.as_str()).map_err(connect_err)?;
                stream.set_nodelay(true).map_err(connect_err)?;
                Self::from_tcp(stream)
            }
            #[cfg(unix)]
            DirectorAddress::Unix(path) => {
                let stream =
                    std::os::unix::net::UnixStream::connect(path).map_err(connect_err)?;
                Self::from_unix(stream)
            }
            #[cfg(not(unix))]
            DirectorAddress::Unix(_) => {
                return Err(connect_err(std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "unix domain sockets are not available on this platform",
                )));
            }
        };

        debug!(%address, "connected to director");
        Ok(stream)
    }

    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: MdStreamInner::Tcp(stream),
        }
    }

    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: MdStreamInner::Unix(stream),
        }
    }

    /// A connected pair of in-process streams, for tests and loopback use.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((Self::from_unix(left), Self::from_unix(right)))
    }

    /// Set read timeout on the underlying stream. `None` blocks indefinitely.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        let result = match &self.inner {
            MdStreamInner::Tcp(stream) => stream.set_read_timeout(timeout),
            #[cfg(unix)]
            MdStreamInner::Unix(stream) => stream.set_read_timeout(timeout),
        };
        result.map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        let result = match &self.inner {
            MdStreamInner::Tcp(stream) => stream.set_write_timeout(timeout),
            #[cfg(unix)]
            MdStreamInner::Unix(stream) => stream.set_write_timeout(timeout),
        };
        result.map_err(Into::into)
    }

    /// Switch non-blocking mode.
    ///
    /// The flag lives on the shared socket, so it applies to every clone.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        let result = match &self.inner {
            MdStreamInner::Tcp(stream) => stream.set_nonblocking(nonblocking),
            #[cfg(unix)]
            MdStreamInner::Unix(stream) => stream.set_nonblocking(nonblocking),
        };
        result.map_err(Into::into)
    }

    /// Enable or disable TCP keepalive. No-op for Unix domain sockets.
    pub fn set_keepalive(&self, enabled: bool) -> Result<()> {
        match &self.inner {
            MdStreamInner::Tcp(stream) => set_tcp_keepalive(stream, enabled),
            #[cfg(unix)]
            MdStreamInner::Unix(_) => Ok(()),
        }
    }

    /// Shut down both halves of the stream.
    ///
    /// Shutting down an already disconnected stream is not an error.
    pub fn shutdown(&self) -> Result<()> {
        let result = match &self.inner {
            MdStreamInner::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            MdStreamInner::Unix(stream) => stream.shutdown(Shutdown::Both),
        };
        match result {
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            other => other.map_err(Into::into),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            MdStreamInner::Tcp(stream) => Ok(Self::from_tcp(stream.try_clone()?)),
            #[cfg(unix)]
            MdStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
        }
    }

    /// Human-readable description of the remote end, for logs.
    pub fn peer_description(&self) -> String {
        match &self.inner {
            MdStreamInner::Tcp(stream) => stream
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "tcp:<disconnected>".to_string()),
            #[cfg(unix)]
            MdStreamInner::Unix(stream) => stream
                .peer_addr()
                .ok()
                .and_then(|addr| addr.as_pathname().map(|p| format!("unix:{}", p.display())))
                .unwrap_or_else(|| "unix:<unnamed>".to_string()),
        }
    }
}

#[cfg(unix)]
fn set_tcp_keepalive(stream: &TcpStream, enabled: bool) -> Result<()> {
    use std::os::fd::AsRawFd;

    let value: libc::c_int = enabled.into();
    // SAFETY: `value` is a valid readable c_int for the provided length, and the
    // descriptor is an open TCP socket owned by `stream` for the duration of the call.
    let rc = unsafe {
        libc::setsockopt(
            stream.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_KEEPALIVE,
            (&value as *const libc::c_int).cast::<libc::c_void>(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };

    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error().into())
    }
}

#[cfg(not(unix))]
fn set_tcp_keepalive(_stream: &TcpStream, _enabled: bool) -> Result<()> {
    Ok(())
}

impl std::fmt::Debug for MdStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.inner {
            MdStreamInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            MdStreamInner::Unix(_) => "unix",
        };
        f.debug_struct("MdStream").field("type", &kind).finish()
    }
}
