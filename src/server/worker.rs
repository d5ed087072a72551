use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::server::reaper::WorkerOutcome;
use crate::servable::ServableFile;
use crate::transfer::{Acknowledgment, Connection, TransferProtocol, TransferSettings};

/// Handles exactly one accepted connection end to end.
///
/// The worker owns the connection outright. The file handle is opened
/// inside the exchange and closed when it returns, so both are released on
/// every exit path, including an unwinding panic.
pub struct ConnectionWorker<C: Connection> {
    conn: C,
    peer: SocketAddr,
    file: Arc<ServableFile>,
    settings: TransferSettings,
}

impl<C: Connection> ConnectionWorker<C> {
    pub fn new(conn: C, peer: SocketAddr, file: Arc<ServableFile>, settings: TransferSettings) -> Self {
        Self {
            conn,
            peer,
            file,
            settings,
        }
    }

    /// Runs the exchange and closes the connection.
    pub async fn serve(mut self) -> WorkerOutcome {
        let peer = self.peer;
        let result = TransferProtocol::new(&mut self.conn, &self.file, self.settings)
            .run()
            .await;

        let outcome = match result {
            Ok(report) => {
                match &report.ack {
                    Acknowledgment::Received(_) => {}
                    Acknowledgment::Closed => {
                        warn!(%peer, "client closed without acknowledgment");
                    }
                    Acknowledgment::TimedOut => {
                        warn!(%peer, "timed out waiting for acknowledgment");
                    }
                    Acknowledgment::Failed(reason) => {
                        warn!(%peer, error = %reason, "acknowledgment read failed");
                    }
                    Acknowledgment::Pending => {}
                }

                info!(%peer, bytes = report.body_bytes, "file served");
                WorkerOutcome::Completed
            }
            Err(e) => {
                error!(%peer, error = %e, "transfer aborted");
                WorkerOutcome::Aborted
            }
        };

        if let Err(e) = self.conn.shutdown().await {
            debug!(%peer, error = %e, "shutdown after exchange failed");
        }

        outcome
    }
}
