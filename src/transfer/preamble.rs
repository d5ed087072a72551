use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::TransferError;

/// Fixed header block sent ahead of the file bytes. It never depends on
/// anything the client sent.
pub const PREAMBLE: &[u8] = b"HTTP/1.1 200 OK\r\n\
Server: solofile\r\n\
Cache-Control: private\r\n\
Connection: close\r\n\
\r\n";

/// Writes the preamble as one logical write and returns its length.
pub async fn write_preamble<W>(out: &mut W) -> Result<usize, TransferError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    out.write_all(PREAMBLE)
        .await
        .map_err(TransferError::Preamble)?;

    Ok(PREAMBLE.len())
}
