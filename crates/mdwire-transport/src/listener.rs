use std::net::TcpListener;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::address::DirectorAddress;
use crate::error::{Result, TransportError};
use crate::stream::MdStream;

/// A bound listener that hands out [`MdStream`]s.
///
/// Clients never need this; it exists so a local stand-in director (tests,
/// scripted fixtures) can accept client connections on the same address forms
/// the client dials.
pub struct MdListener {
    inner: MdListenerInner,
}

enum MdListenerInner {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix {
        listener: std::os::unix::net::UnixListener,
        path: PathBuf,
    },
}

impl MdListener {
    /// Bind and listen. A TCP port of 0 picks an ephemeral port.
    pub fn bind(address: &DirectorAddress) -> Result<Self> {
        let bind_err = |source| TransportError::Bind {
            address: address.to_string(),
            source,
        };

        let inner = match address {
            DirectorAddress::Tcp { .. } => {
                let target = address.socket_target().unwrap_or_default();
                MdListenerInner::Tcp(TcpListener::bind(target.as_str()).map_err(bind_err)?)
            }
            #[cfg(unix)]
            DirectorAddress::Unix(path) => {
                remove_stale_socket(path).map_err(bind_err)?;
                let listener = std::os::unix::net::UnixListener::bind(path).map_err(bind_err)?;
                MdListenerInner::Unix {
                    listener,
                    path: path.clone(),
                }
            }
            #[cfg(not(unix))]
            DirectorAddress::Unix(_) => {
                return Err(bind_err(std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "unix domain sockets are not available on this platform",
                )));
            }
        };

        let listener = Self { inner };
        info!(address = %listener.local_address()?, "listening");
        Ok(listener)
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<MdStream> {
        let stream = match &self.inner {
            MdListenerInner::Tcp(listener) => {
                let (stream, addr) = listener.accept().map_err(TransportError::Accept)?;
                debug!(%addr, "accepted connection");
                MdStream::from_tcp(stream)
            }
            #[cfg(unix)]
            MdListenerInner::Unix { listener, .. } => {
                let (stream, _addr) = listener.accept().map_err(TransportError::Accept)?;
                debug!("accepted connection");
                MdStream::from_unix(stream)
            }
        };
        Ok(stream)
    }

    /// The address clients should dial, with any ephemeral port filled in.
    pub fn local_address(&self) -> Result<DirectorAddress> {
        match &self.inner {
            MdListenerInner::Tcp(listener) => {
                let addr = listener.local_addr()?;
                Ok(DirectorAddress::Tcp {
                    host: addr.ip().to_string(),
                    port: addr.port(),
                })
            }
            #[cfg(unix)]
            MdListenerInner::Unix { path, .. } => Ok(DirectorAddress::Unix(path.clone())),
        }
    }
}

#[cfg(unix)]
fn remove_stale_socket(path: &std::path::Path) -> std::io::Result<()> {
    use std::os::unix::fs::FileTypeExt;

    match std::fs::symlink_metadata(path) {
        Ok(metadata) if metadata.file_type().is_socket() => {
            debug!(?path, "removing stale socket");
            std::fs::remove_file(path)
        }
        Ok(_) => Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "existing path is not a unix socket",
        )),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

impl Drop for MdListener {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let MdListenerInner::Unix { path, .. } = &self.inner {
            debug!(?path, "cleaning up socket file");
            let _ = std::fs::remove_file(path);
        }
    }
}
