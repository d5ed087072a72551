//! The byte-level exchange run on every accepted connection.
//!
//! The server never reads or parses a request. Whatever the client sends
//! before the file goes out is ignored.
//!
//! # Exchange
//!
//! ```text
//!        ┌─────────────┐
//!        │  Preamble   │ ← cork, write the fixed header block
//!        └──────┬──────┘
//!               │
//!               ▼
//!        ┌─────────────┐
//!        │    Body     │ ← stream exactly `size` bytes, uncork, flush
//!        └──────┬──────┘
//!               │
//!               ▼
//!        ┌─────────────┐
//!        │ Acknowledge │ ← one read; any outcome is accepted
//!        └──────┬──────┘
//!               │
//!               ▼
//!             Done       → the worker closes the connection
//! ```
//!
//! A write failure in `Preamble` or `Body` ends the exchange with a
//! [`TransferError`](crate::error::TransferError). Nothing is retried.

pub mod connection;
pub mod preamble;
pub mod protocol;

pub use connection::Connection;
pub use preamble::PREAMBLE;
pub use protocol::{Acknowledgment, TransferProtocol, TransferReport, TransferSettings};
