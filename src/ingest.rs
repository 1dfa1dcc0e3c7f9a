//! Ingestion pipeline: batched images, sequential videos.
//!
//! Images are uploaded through a rate-limited batch endpoint; the cap
//! honors an upstream quota on the embedding service (100 requests per
//! minute by default). Videos are inserted one at a time since payloads
//! are large. Per-item failures are logged and isolated in both paths —
//! the run keeps going and there is no rollback of partial ingests.

use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::IngestConfig;
use crate::error::{Error, Result};
use crate::media::{self, MediaKind, MediaRecord};
use crate::store::StoreSession;

/// How many per-object failure messages are echoed after a batch.
const REPORTED_FAILURES: usize = 5;

/// Outcome counters for one ingestion path.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    /// Files discovered in the source directory.
    pub attempted: usize,
    /// Records accepted by the store.
    pub uploaded: usize,
    /// Files that failed to read/encode or were rejected by the store.
    pub failed: usize,
}

/// Paces submissions so the upstream requests-per-minute cap holds.
/// The pipeline is sequential, so a fixed minimum interval between
/// requests is exact.
pub struct RateLimiter {
    interval: Duration,
    earliest_next: Option<Instant>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            interval: Duration::from_secs_f64(60.0 / f64::from(requests_per_minute.max(1))),
            earliest_next: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn acquire(&mut self) {
        let now = Instant::now();
        if let Some(earliest) = self.earliest_next {
            if earliest > now {
                tokio::time::sleep(earliest - now).await;
            }
        }
        self.earliest_next = Some(Instant::now() + self.interval);
    }
}

/// Batch-ingest every supported image in `dir` into `class`.
///
/// An empty directory is informational, not an error. A file that fails to
/// read is reported and skipped; per-object rejections returned by the
/// store are accumulated and the first five echoed with their messages.
pub async fn ingest_images(
    session: &StoreSession,
    config: &IngestConfig,
    class: &str,
    dir: &Path,
) -> Result<IngestReport> {
    let files = media::discover(dir, MediaKind::Image)?;
    let mut report = IngestReport {
        attempted: files.len(),
        ..Default::default()
    };

    if files.is_empty() {
        println!(
            "[info] put some images into: {} (png/jpg/jpeg/webp)",
            dir.display()
        );
        return Ok(report);
    }

    let mut limiter = RateLimiter::new(config.requests_per_minute);
    let mut pending: Vec<MediaRecord> = Vec::with_capacity(config.batch_size);
    let mut failures: Vec<String> = Vec::new();

    for path in &files {
        println!("Adding image: {}", path.file_name().unwrap_or_default().to_string_lossy());
        match MediaRecord::from_file(path, MediaKind::Image) {
            Ok(record) => pending.push(record),
            Err(e) => {
                eprintln!("[image ingest error] {}: {}", path.display(), e);
                report.failed += 1;
                continue;
            }
        }

        if pending.len() >= config.batch_size {
            flush_batch(session, class, &mut pending, &mut limiter, &mut report, &mut failures)
                .await?;
        }
    }
    flush_batch(session, class, &mut pending, &mut limiter, &mut report, &mut failures).await?;

    if failures.is_empty() {
        println!("Image ingest: no errors");
    } else {
        println!("Failed to import {} image objects", failures.len());
        for message in reported_failures(&failures) {
            println!(" - {}", message);
        }
    }

    Ok(report)
}

async fn flush_batch(
    session: &StoreSession,
    class: &str,
    pending: &mut Vec<MediaRecord>,
    limiter: &mut RateLimiter,
    report: &mut IngestReport,
    failures: &mut Vec<String>,
) -> Result<()> {
    if pending.is_empty() {
        return Ok(());
    }

    let records: Vec<MediaRecord> = pending.drain(..).collect();
    limiter.acquire().await;

    let objects: Vec<serde_json::Value> = records
        .iter()
        .map(|r| json!({ "class": class, "properties": r.to_properties() }))
        .collect();

    let url = session.endpoint("/v1/batch/objects");
    let resp = session
        .http()
        .post(&url)
        .json(&json!({ "objects": objects }))
        .send()
        .await?;

    if !resp.status().is_success() {
        // Whole-batch rejection: every object in it counts as failed.
        let status = resp.status();
        report.failed += records.len();
        for record in &records {
            failures.push(format!(
                "{}: batch request rejected with status {}",
                record.name, status
            ));
        }
        return Ok(());
    }

    let body: serde_json::Value = resp
        .json()
        .await
        .map_err(|e| Error::Ingest(format!("invalid batch response: {}", e)))?;
    let batch_failures = parse_batch_results(&body, &records);
    report.uploaded += records.len().saturating_sub(batch_failures.len());
    report.failed += batch_failures.len().min(records.len());
    failures.extend(batch_failures);

    Ok(())
}

/// The slice of failure messages echoed in the post-batch summary: at most
/// the first [`REPORTED_FAILURES`] entries.
pub fn reported_failures(failures: &[String]) -> &[String] {
    &failures[..failures.len().min(REPORTED_FAILURES)]
}

/// Pull per-object failure messages out of a batch response. The store
/// answers with one result per submitted object, in order; anything whose
/// status is not SUCCESS carries an error message.
pub fn parse_batch_results(body: &serde_json::Value, records: &[MediaRecord]) -> Vec<String> {
    let Some(results) = body.as_array() else {
        return Vec::new();
    };

    let mut failures = Vec::new();
    for (i, result) in results.iter().enumerate() {
        let status = result["result"]["status"].as_str().unwrap_or("SUCCESS");
        if status == "SUCCESS" {
            continue;
        }
        let message = result["result"]["errors"]["error"][0]["message"]
            .as_str()
            .unwrap_or("unknown batch error");
        let name = records
            .get(i)
            .map(|r| r.name.as_str())
            .unwrap_or("unknown object");
        failures.push(format!("{}: {}", name, message));
    }
    failures
}

/// Insert every supported video in `dir` one at a time. No batching: the
/// payloads are large and per-item isolation is the point. Failures are
/// logged and the sequence continues with the next file.
pub async fn ingest_videos(
    session: &StoreSession,
    class: &str,
    dir: &Path,
) -> Result<IngestReport> {
    let files = media::discover(dir, MediaKind::Video)?;
    let mut report = IngestReport {
        attempted: files.len(),
        ..Default::default()
    };

    if files.is_empty() {
        println!(
            "[info] put some videos into: {} (mp4/mov/mkv/webm)",
            dir.display()
        );
        return Ok(report);
    }

    for path in &files {
        println!("Adding video: {}", path.file_name().unwrap_or_default().to_string_lossy());
        let result = async {
            let record = MediaRecord::from_file(path, MediaKind::Video)?;
            insert_object(session, class, &record).await
        }
        .await;

        match result {
            Ok(()) => report.uploaded += 1,
            Err(e) => {
                eprintln!("[video ingest error] {}: {}", path.display(), e);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

async fn insert_object(session: &StoreSession, class: &str, record: &MediaRecord) -> Result<()> {
    let url = session.endpoint("/v1/objects");
    let resp = session
        .http()
        .post(&url)
        .json(&json!({ "class": class, "properties": record.to_properties() }))
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Ingest(format!("insert returned {}: {}", status, body)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> MediaRecord {
        MediaRecord {
            name: name.to_string(),
            path: format!("/src/{}", name),
            payload: "cGF5bG9hZA==".to_string(),
            kind: MediaKind::Image,
        }
    }

    #[test]
    fn rate_limiter_interval_matches_cap() {
        let limiter = RateLimiter::new(100);
        assert_eq!(limiter.interval(), Duration::from_millis(600));

        let limiter = RateLimiter::new(60);
        assert_eq!(limiter.interval(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limiter_paces_consecutive_acquires() {
        let mut limiter = RateLimiter::new(60);

        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;

        // First acquire is immediate; the next two wait one second each.
        assert!(Instant::now() - start >= Duration::from_secs(2));
    }

    #[test]
    fn parse_batch_results_collects_failures_in_order() {
        let records = vec![record("a.png"), record("b.png"), record("c.png")];
        let body = serde_json::json!([
            { "result": { "status": "SUCCESS" } },
            { "result": {
                "status": "FAILED",
                "errors": { "error": [ { "message": "vectorizer quota exceeded" } ] }
            } },
            { "result": { "status": "SUCCESS" } },
        ]);

        let failures = parse_batch_results(&body, &records);
        assert_eq!(failures, vec!["b.png: vectorizer quota exceeded".to_string()]);
    }

    #[test]
    fn parse_batch_results_handles_missing_message() {
        let records = vec![record("a.png")];
        let body = serde_json::json!([{ "result": { "status": "FAILED" } }]);
        let failures = parse_batch_results(&body, &records);
        assert_eq!(failures, vec!["a.png: unknown batch error".to_string()]);
    }

    #[test]
    fn summary_echoes_at_most_five_failure_messages() {
        let failures: Vec<String> = (1..=7).map(|i| format!("object {} rejected", i)).collect();
        let echoed = reported_failures(&failures);
        assert_eq!(echoed.len(), 5);
        assert_eq!(echoed[0], "object 1 rejected");
        assert_eq!(echoed[4], "object 5 rejected");
    }

    #[test]
    fn summary_echoes_short_failure_lists_whole() {
        let failures = vec!["only one".to_string()];
        assert_eq!(reported_failures(&failures), failures.as_slice());
        assert!(reported_failures(&[]).is_empty());
    }

    #[test]
    fn parse_batch_results_tolerates_non_array_body() {
        let records = vec![record("a.png")];
        let failures = parse_batch_results(&serde_json::json!({"ok": true}), &records);
        assert!(failures.is_empty());
    }
}
