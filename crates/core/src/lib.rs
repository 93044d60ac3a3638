//! Bookhound core library.
//!
//! Request-to-download orchestration for books: confidence matching,
//! source adapters, durable download records, daily rate limiting, and the
//! reconciliation sweeper. The server crate exposes this over HTTP.

pub mod config;
pub mod download;
pub mod matcher;
pub mod orchestrator;
pub mod request;
pub mod source;
pub mod testing;
