use std::io;

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::net::TcpStream;

/// A byte stream the transfer protocol can run over.
///
/// Besides reading and writing, a connection can be asked to hold back
/// partial segments so the preamble and the file body leave together.
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send {
    /// Turns output coalescing on or off. Turning it off flushes whatever
    /// the kernel is holding.
    fn set_coalescing(&self, enabled: bool) -> io::Result<()>;
}

impl Connection for TcpStream {
    #[cfg(target_os = "linux")]
    fn set_coalescing(&self, enabled: bool) -> io::Result<()> {
        socket2::SockRef::from(self).set_cork(enabled)
    }

    #[cfg(not(target_os = "linux"))]
    fn set_coalescing(&self, _enabled: bool) -> io::Result<()> {
        Ok(())
    }
}

// In-memory pipes have no segments to coalesce.
impl Connection for DuplexStream {
    fn set_coalescing(&self, _enabled: bool) -> io::Result<()> {
        Ok(())
    }
}
