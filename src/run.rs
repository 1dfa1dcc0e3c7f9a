//! Flow orchestration.
//!
//! Flow A is a linear sequence against the store session: recreate the
//! collection, ingest images then videos, run the query sequence. The
//! session is owned here and closed on every exit path, including errors.
//! Flow B never touches the store.

use std::path::Path;

use crate::collection;
use crate::config::{self, Config, Secrets, EMBEDDING_API_KEY, GENAI_API_BASE, GENAI_API_KEY};
use crate::error::Result;
use crate::extract::{ExtractionRequest, VisionClient};
use crate::ingest::{self, IngestReport};
use crate::query;
use crate::store::StoreSession;

/// Which parts of Flow A to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowMode {
    /// Recreate collection, ingest, then query.
    Full,
    /// Recreate collection and ingest only.
    IngestOnly,
    /// Query an existing collection; no recreate, no ingest.
    QueryOnly,
}

/// Flow A entry point. Configuration and readiness failures are fatal;
/// everything downstream is log-and-continue per item or per query.
pub async fn run_flow(config: &Config, mode: FlowMode) -> Result<()> {
    let secrets = Secrets::load(&config.paths.env_path())?;
    let embedding_api_key = secrets.require(EMBEDDING_API_KEY)?;
    config::ensure_dirs(&config.paths)?;

    let mut session = StoreSession::start(
        &config.store,
        &config.paths.backup_dir(),
        &embedding_api_key,
    )
    .await?;

    // Close the session on every exit path, error or not.
    let result = flow_inner(&session, config, mode).await;
    session.close().await;
    result
}

async fn flow_inner(session: &StoreSession, config: &Config, mode: FlowMode) -> Result<()> {
    let class = &config.collection.name;

    if mode != FlowMode::QueryOnly {
        collection::recreate(session, &config.collection).await?;

        let images = ingest::ingest_images(
            session,
            &config.ingest,
            class,
            &config.paths.image_dir(),
        )
        .await?;
        print_report("images", &images);

        let videos = ingest::ingest_videos(session, class, &config.paths.video_dir()).await?;
        print_report("videos", &videos);
    }

    if mode != FlowMode::IngestOnly {
        query::run_sequence(session, &config.query, class, &config.paths.test_dir()).await?;
    }

    println!("\nDone.");
    Ok(())
}

fn print_report(label: &str, report: &IngestReport) {
    println!(
        "ingest {}: {} found, {} uploaded, {} failed",
        label, report.attempted, report.uploaded, report.failed
    );
}

/// Flow B entry point: send one invoice image to the hosted vision model
/// and print its response text as-is. A model failure is fatal to this
/// flow; there is no fallback.
pub async fn run_extract(config: &Config, image: &Path) -> Result<()> {
    let secrets = Secrets::load(&config.paths.env_path())?;
    let api_key = secrets.require(GENAI_API_KEY)?;
    let api_base = secrets.get(GENAI_API_BASE);

    let client = VisionClient::new(&config.extraction, api_key, api_base)?;
    let request = ExtractionRequest::from_image_file(image, &config.extraction.instruction)?;

    let text = client.generate(&request).await?;
    println!("{}", text);
    Ok(())
}
