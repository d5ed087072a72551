//! Error types for the server.
//!
//! Startup failures (MIME table, file validation, bind) stop the process
//! before any connection is accepted. Transfer failures only ever end the
//! connection they happened on.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level error for starting and running the server.
#[derive(Debug, Error)]
pub enum Error {
    /// The MIME table could not be loaded
    #[error("cannot load MIME types: {0}")]
    Mime(#[from] MimeLoadError),

    /// The target file is not servable
    #[error("file is not servable: {0}")]
    Validation(#[from] ValidationError),

    /// No listening socket could be created
    #[error("cannot listen: {0}")]
    Bind(#[from] BindError),

    /// accept() failed; the dispatcher cannot continue
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// The worker slot semaphore was closed. The dispatcher never closes
    /// it, so this only surfaces if acquiring a slot fails outright.
    #[error("worker slots closed")]
    SlotsClosed,
}

/// MIME table loading errors.
#[derive(Debug, Error)]
pub enum MimeLoadError {
    /// The table source is absent or cannot be read
    #[error("cannot read {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The source has no first line at all
    #[error("missing extension count line")]
    MissingCount,

    /// The first line is not a decimal count
    #[error("invalid extension count {line:?}")]
    InvalidCount { line: String },

    /// A record line has no extension token
    #[error("line {line_no}: missing extension")]
    MissingExtension { line_no: usize },
}

/// Reasons a file cannot be served. Checked in declaration order.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{}: not found ({source})", .path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: not readable ({source})", .path.display())]
    NotReadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: file name has no extension", .path.display())]
    NoExtension { path: PathBuf },

    #[error("{}: extension {extension:?} is not in the MIME table", .path.display())]
    ExtensionNotAllowed { path: PathBuf, extension: String },
}

/// Listening socket setup errors.
#[derive(Debug, Error)]
pub enum BindError {
    /// The service is neither a port, a known service name nor host:port
    #[error("unknown service {0:?}")]
    UnknownService(String),

    /// Name resolution failed
    #[error("cannot resolve {service:?}: {source}")]
    Resolve {
        service: String,
        #[source]
        source: io::Error,
    },

    /// A socket option could not be applied
    #[error("cannot configure socket for {addr}: {source}")]
    SocketOption {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Every candidate address failed
    #[error("no usable address for {service:?} ({})", describe_last(.last))]
    Exhausted {
        service: String,
        last: Option<io::Error>,
    },
}

/// Failures while running the exchange on one connection.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The worker could not open its own handle to the file
    #[error("cannot open file: {0}")]
    Open(#[source] io::Error),

    #[error("writing preamble: {0}")]
    Preamble(#[source] io::Error),

    #[error("writing file body: {0}")]
    Body(#[source] io::Error),

    /// The copy ended before the recorded file size was reached
    #[error("short transfer: sent {sent} of {expected} bytes")]
    ShortTransfer { expected: u64, sent: u64 },

    #[error("flushing connection: {0}")]
    Flush(#[source] io::Error),
}

fn describe_last(last: &Option<io::Error>) -> String {
    match last {
        Some(err) => format!("last error: {err}"),
        None => "no candidates".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
