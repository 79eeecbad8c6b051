use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::TransportError;

/// Port a message director listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 7199;

const TCP_SCHEME: &str = "tcp://";
const UNIX_SCHEME: &str = "unix:";

/// Where a message director can be reached.
///
/// Accepted forms:
/// - `localhost` (resolves to `127.0.0.1:7199`)
/// - `host` or `host:port`
/// - `[v6addr]` or `[v6addr]:port`
/// - `tcp://host[:port]`
/// - `unix:/path/to/socket`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectorAddress {
    /// A TCP endpoint.
    Tcp { host: String, port: u16 },
    /// A Unix domain socket path.
    Unix(PathBuf),
}

impl DirectorAddress {
    /// A TCP address on the default director port.
    pub fn tcp(host: impl Into<String>) -> Self {
        Self::Tcp {
            host: host.into(),
            port: DEFAULT_PORT,
        }
    }

    /// The `host:port` string handed to the socket resolver.
    pub(crate) fn socket_target(&self) -> Option<String> {
        match self {
            Self::Tcp { host, port } if host.contains(':') => Some(format!("[{host}]:{port}")),
            Self::Tcp { host, port } => Some(format!("{host}:{port}")),
            Self::Unix(_) => None,
        }
    }
}

impl FromStr for DirectorAddress {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        let invalid = || TransportError::InvalidAddress(input.to_string());

        if let Some(path) = input.strip_prefix(UNIX_SCHEME) {
            if path.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }

        let rest = input.strip_prefix(TCP_SCHEME).unwrap_or(input);
        if rest.is_empty() {
            return Err(invalid());
        }

        let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
            let (host, tail) = bracketed.split_once(']').ok_or_else(invalid)?;
            let port = match tail {
                "" => DEFAULT_PORT,
                _ => tail
                    .strip_prefix(':')
                    .and_then(|p| p.parse().ok())
                    .ok_or_else(invalid)?,
            };
            (host, port)
        } else {
            match rest.split_once(':') {
                // A bare IPv6 literal has several colons and no port.
                Some((_, tail)) if tail.contains(':') => (rest, DEFAULT_PORT),
                Some((host, port)) => (host, port.parse().map_err(|_| invalid())?),
                None => (rest, DEFAULT_PORT),
            }
        };

        if host.is_empty() {
            return Err(invalid());
        }

        let host = if host.eq_ignore_ascii_case("localhost") {
            "127.0.0.1"
        } else {
            host
        };

        Ok(Self::Tcp {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for DirectorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { .. } => match self.socket_target() {
                Some(target) => f.write_str(&target),
                None => Ok(()),
            },
            Self::Unix(path) => write!(f, "{UNIX_SCHEME}{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> DirectorAddress {
        input.parse().unwrap()
    }

    #[test]
    fn localhost_resolves_to_loopback_default_port() {
        assert_eq!(
            parse("localhost"),
            DirectorAddress::Tcp {
                host: "127.0.0.1".to_string(),
                port: DEFAULT_PORT
            }
        );
    }

    #[test]
    fn host_with_and_without_port() {
        assert_eq!(parse("director.local"), DirectorAddress::tcp("director.local"));
        assert_eq!(
            parse("10.0.0.5:7100"),
            DirectorAddress::Tcp {
                host: "10.0.0.5".to_string(),
                port: 7100
            }
        );
        assert_eq!(
            parse("tcp://localhost:9000"),
            DirectorAddress::Tcp {
                host: "127.0.0.1".to_string(),
                port: 9000
            }
        );
    }

    #[test]
    fn ipv6_forms() {
        assert_eq!(
            parse("[::1]:7200"),
            DirectorAddress::Tcp {
                host: "::1".to_string(),
                port: 7200
            }
        );
        assert_eq!(parse("::1"), DirectorAddress::tcp("::1"));
        assert_eq!(parse("[::1]").to_string(), "[::1]:7199");
    }

    #[test]
    fn unix_path() {
        assert_eq!(
            parse("unix:/tmp/md.sock"),
            DirectorAddress::Unix(PathBuf::from("/tmp/md.sock"))
        );
        assert_eq!(parse("unix:/tmp/md.sock").to_string(), "unix:/tmp/md.sock");
    }

    #[test]
    fn rejects_malformed_addresses() {
        for input in ["", "unix:", "tcp://", "host:notaport", ":7199", "[::1", "[::1]x"] {
            let result = input.parse::<DirectorAddress>();
            assert!(
                matches!(result, Err(TransportError::InvalidAddress(_))),
                "{input:?} should be rejected"
            );
        }
    }
}
