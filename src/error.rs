//! Error taxonomy for both flows.
//!
//! Fatal kinds ([`Error::Config`], [`Error::StoreUnavailable`],
//! [`Error::Generation`]) abort their flow; [`Error::Ingest`] and
//! [`Error::Query`] are caught at the call site, logged, and the run
//! continues with the next item or query.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A required setting or secret is missing or invalid. Aborts startup
    /// before any service call is made.
    #[error("configuration error: {0}")]
    Config(String),

    /// The embedded vector store failed its readiness check.
    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),

    /// A single file failed to read, encode, or upload. Isolated to that
    /// item; the batch or sequence keeps going.
    #[error("ingest error: {0}")]
    Ingest(String),

    /// A similarity query failed. The specific query is skipped; remaining
    /// queries still run.
    #[error("query error: {0}")]
    Query(String),

    /// The hosted vision model call failed. Fatal to the extraction flow —
    /// there is no fallback.
    #[error("generation error: {0}")]
    Generation(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
