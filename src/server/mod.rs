//! Listening socket, accept loop and worker lifecycle.
//!
//! # Architecture
//!
//! - **`listener`**: resolves the service and binds the first candidate address that works
//! - **`dispatcher`**: the accept loop; spawns one worker per connection and never waits on it
//! - **`worker`**: runs the transfer on one connection and closes it
//! - **`reaper`**: tracks in-flight workers and reclaims them as they finish
//!
//! # Dispatcher lifecycle
//!
//! ```text
//!   Binding ──► Listening ──► accept ──► spawn worker ──┐
//!                               ▲                       │
//!                               └───────────────────────┘
//!                               │
//!                               └─ accept error ──► Terminated
//! ```
//!
//! Startup work (MIME table, file validation, bind) happens before the
//! first accept. Any failure there stops the process before a socket is
//! listening.

pub mod dispatcher;
pub mod listener;
pub mod reaper;
pub mod worker;

use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::mime::MimeTable;
use crate::servable::ServableFile;

pub use dispatcher::Dispatcher;

/// Runs every startup check and binds, yielding a dispatcher ready to run.
pub async fn prepare(cfg: &Config) -> Result<Dispatcher> {
    let table = MimeTable::load(&cfg.mime_types)?;
    let file = ServableFile::validate(&cfg.file, &table)?;

    info!(
        file = %file.path.display(),
        extension = %file.extension,
        content_type = table.content_type(&file.extension).unwrap_or("unknown"),
        "file validated"
    );

    let listener = listener::bind(&cfg.service, cfg.backlog).await?;

    Ok(Dispatcher::new(
        listener,
        file,
        cfg.transfer_settings(),
        cfg.max_workers,
    ))
}
