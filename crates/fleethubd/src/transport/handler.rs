//! Connection handling abstraction for the listener.

use std::net::{SocketAddr, TcpStream};

/// Handles accepted TCP connections.
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection on its own thread. The stream is closed
    /// when it is dropped. Implementations should avoid panicking.
    fn handle(&self, stream: TcpStream, peer: SocketAddr);
}
