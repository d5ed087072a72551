use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::error::TransferError;
use crate::servable::ServableFile;
use crate::transfer::connection::Connection;
use crate::transfer::preamble::write_preamble;

const COPY_BUFFER: usize = 64 * 1024;
const ACK_BUFFER: usize = 4096;

/// Default bound on the acknowledgment read.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-connection knobs for the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSettings {
    /// `None` waits for the acknowledgment indefinitely
    pub ack_timeout: Option<Duration>,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            ack_timeout: Some(DEFAULT_ACK_TIMEOUT),
        }
    }
}

/// What the client did after the file was sent. None of these end the
/// exchange with an error.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Acknowledgment {
    /// Client sent this many bytes
    Received(usize),
    /// Client closed without sending anything
    Closed,
    /// Nothing arrived within the configured timeout
    TimedOut,
    /// The read itself failed; carries the OS error text
    Failed(String),
    /// The exchange never got as far as reading
    #[default]
    Pending,
}

/// Outcome of a completed exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub preamble_bytes: usize,
    pub body_bytes: u64,
    pub ack: Acknowledgment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Preamble,
    Body,
    Acknowledge,
    Done,
}

/// Runs the single-shot exchange for one connection.
pub struct TransferProtocol<'a, C: Connection> {
    conn: &'a mut C,
    file: &'a ServableFile,
    settings: TransferSettings,
    state: TransferState,
}

impl<'a, C: Connection> TransferProtocol<'a, C> {
    pub fn new(conn: &'a mut C, file: &'a ServableFile, settings: TransferSettings) -> Self {
        Self {
            conn,
            file,
            settings,
            state: TransferState::Preamble,
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Drives the exchange to the end. Any write failure aborts at once;
    /// the acknowledgment read never fails the exchange.
    pub async fn run(&mut self) -> Result<TransferReport, TransferError> {
        let mut report = TransferReport::default();

        loop {
            match self.state {
                TransferState::Preamble => {
                    self.coalesce(true);
                    report.preamble_bytes = write_preamble(&mut *self.conn).await?;
                    self.state = TransferState::Body;
                }

                TransferState::Body => {
                    report.body_bytes = self.send_body().await?;
                    self.coalesce(false);
                    self.conn.flush().await.map_err(TransferError::Flush)?;
                    self.state = TransferState::Acknowledge;
                }

                TransferState::Acknowledge => {
                    report.ack = self.await_ack().await;
                    self.state = TransferState::Done;
                }

                TransferState::Done => break,
            }
        }

        Ok(report)
    }

    /// Streams exactly `file.size` bytes. The handle is opened here and
    /// closed when this returns.
    async fn send_body(&mut self) -> Result<u64, TransferError> {
        let file = File::open(&self.file.path)
            .await
            .map_err(TransferError::Open)?;

        let mut reader = BufReader::with_capacity(COPY_BUFFER, file.take(self.file.size));
        let sent = tokio::io::copy_buf(&mut reader, &mut *self.conn)
            .await
            .map_err(TransferError::Body)?;

        if sent != self.file.size {
            return Err(TransferError::ShortTransfer {
                expected: self.file.size,
                sent,
            });
        }

        debug!(bytes = sent, "file body sent");
        Ok(sent)
    }

    async fn await_ack(&mut self) -> Acknowledgment {
        let mut buf = [0u8; ACK_BUFFER];

        let read = self.conn.read(&mut buf);
        let result = match self.settings.ack_timeout {
            Some(limit) => match tokio::time::timeout(limit, read).await {
                Ok(result) => result,
                Err(_) => return Acknowledgment::TimedOut,
            },
            None => read.await,
        };

        match result {
            Ok(0) => Acknowledgment::Closed,
            Ok(n) => {
                debug!(bytes = n, ack = %String::from_utf8_lossy(&buf[..n]), "acknowledgment received");
                Acknowledgment::Received(n)
            }
            Err(e) => Acknowledgment::Failed(e.to_string()),
        }
    }

    fn coalesce(&self, enabled: bool) {
        if let Err(e) = self.conn.set_coalescing(enabled) {
            warn!(enabled, error = %e, "could not toggle output coalescing");
        }
    }
}
