//! solofile - serve one file over TCP
//!
//! Every client that connects receives the same pre-validated file,
//! preceded by a fixed preamble, on its own isolated worker task.

pub mod config;
pub mod error;
pub mod mime;
pub mod servable;
pub mod server;
pub mod transfer;
