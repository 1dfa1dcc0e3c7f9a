//! # Medley
//!
//! A multimodal ingest and similarity-search harness for embedded vector
//! stores. Medley stands up an embedded store, recreates a collection with
//! a multimodal vectorizer, batch-ingests local images and videos, and runs
//! a fixed sequence of similarity queries against it. A second, independent
//! flow sends an invoice image to a hosted vision model and prints the raw
//! structured-text response.
//!
//! Medley implements no vector index, embedding model, or query engine of
//! its own: all of that is delegated to external services over their REST
//! protocols. What lives here is the orchestration — configuration, session
//! lifecycle, file discovery and encoding, rate-limited batching, and the
//! per-item/per-query failure isolation that keeps a demo run moving.
//!
//! ## Flows
//!
//! ```text
//! Flow A:  config → store session → collection → ingest → queries → close
//! Flow B:  config → vision client → generate → print
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML settings + env-file secrets |
//! | [`error`] | Error taxonomy |
//! | [`store`] | Store session lifecycle |
//! | [`collection`] | Collection schema management |
//! | [`media`] | Media records and discovery |
//! | [`ingest`] | Batched/sequential ingestion |
//! | [`query`] | Similarity queries |
//! | [`extract`] | Invoice extraction flow |
//! | [`run`] | Flow orchestration |

pub mod collection;
pub mod config;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod media;
pub mod query;
pub mod run;
pub mod store;
