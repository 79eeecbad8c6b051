use mdwire_transport::{DirectorAddress, MdStream};
use tracing::info;

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::Result;

/// Connect to a director with default configuration.
///
/// `address` accepts `host`, `host:port`, `tcp://host:port`, `[v6]:port`
/// or `unix:/path/to.sock`.
pub fn connect(address: &str) -> Result<Connection> {
    let address: DirectorAddress = address.parse()?;
    connect_with_config(&address, ConnectionConfig::default())
}

/// Connect with explicit configuration.
pub fn connect_with_config(
    address: &DirectorAddress,
    config: ConnectionConfig,
) -> Result<Connection> {
    let stream = MdStream::connect(address)?;
    let connection = Connection::from_stream(stream, config)?;
    info!(%address, "connected to director");
    Ok(connection)
}
