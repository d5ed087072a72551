use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::mime::DEFAULT_MIME_TABLE;
use crate::server::dispatcher::DEFAULT_MAX_WORKERS;
use crate::server::listener::DEFAULT_BACKLOG;
use crate::transfer::TransferSettings;

/// Serve one file to every client that connects.
#[derive(Debug, Clone, Parser)]
#[command(name = "solofile", version)]
pub struct Config {
    /// File to serve; its extension must be listed in the MIME table
    pub file: PathBuf,

    /// Port number, service name, or host:port to listen on
    pub service: String,

    /// MIME table listing the permitted extensions
    #[arg(long, env = "SOLOFILE_MIME_TYPES", default_value = DEFAULT_MIME_TABLE)]
    pub mime_types: PathBuf,

    /// Listen queue length
    #[arg(long, env = "SOLOFILE_BACKLOG", default_value_t = DEFAULT_BACKLOG)]
    pub backlog: u32,

    /// Maximum number of connections served at once
    #[arg(long, env = "SOLOFILE_MAX_WORKERS", default_value_t = DEFAULT_MAX_WORKERS)]
    pub max_workers: usize,

    /// Seconds to wait for the client's acknowledgment; 0 waits forever
    #[arg(long, env = "SOLOFILE_ACK_TIMEOUT_SECS", default_value_t = 30)]
    pub ack_timeout_secs: u64,
}

impl Config {
    /// Parses the process arguments, exiting with a usage message on error.
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn transfer_settings(&self) -> TransferSettings {
        TransferSettings {
            ack_timeout: match self.ack_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}
