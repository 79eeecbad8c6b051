use std::time::Duration;

/// Default wait for one `read()`.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Default overall budget for one `expect*` call.
pub const DEFAULT_EXPECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration for a director connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// How long a blocking `read()` waits before reporting a timeout.
    pub read_timeout: Duration,
    /// Write timeout; `None` lets sends block until the stream accepts the bytes.
    /// When it expires, `send` fails with `ClientError::Timeout`.
    pub write_timeout: Option<Duration>,
    /// Total time one `expect`/`expect_multi` call may spend waiting.
    pub expect_timeout: Duration,
    /// Enable TCP keepalive on the director socket.
    pub keepalive: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: None,
            expect_timeout: DEFAULT_EXPECT_TIMEOUT,
            keepalive: true,
        }
    }
}
