//! Vector-store session lifecycle.
//!
//! A [`StoreSession`] owns the embedded store for the duration of one run:
//! it either spawns the store binary as a child process or attaches to an
//! already-running instance, waits for the readiness check, and is closed
//! on every exit path. The embedding API key rides along as a default
//! request header so the store's multimodal vectorizer module can call out.

use reqwest::header::{HeaderMap, HeaderValue};
use std::path::Path;
use std::time::Duration;
use tokio::process::{Child, Command};

use crate::config::StoreConfig;
use crate::error::{Error, Result};

/// Modules the embedded store is launched with.
const ENABLE_MODULES: &str = "backup-filesystem,multi2vec-palm";
/// Header carrying the embedding-service API key on every request.
const API_KEY_HEADER: &str = "X-Palm-Api-Key";

pub struct StoreSession {
    client: reqwest::Client,
    base_url: String,
    child: Option<Child>,
}

impl StoreSession {
    /// Launch or attach to the store and wait until it reports ready.
    ///
    /// Fails with [`Error::StoreUnavailable`] if the readiness check does
    /// not pass within the configured attempts. On that path any spawned
    /// child is killed before returning.
    pub async fn start(
        config: &StoreConfig,
        backup_dir: &Path,
        embedding_api_key: &str,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut key_value = HeaderValue::from_str(embedding_api_key)
            .map_err(|e| Error::Config(format!("invalid embedding API key: {}", e)))?;
        key_value.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        let child = match &config.spawn_command {
            Some(command) => {
                let child = Command::new(command)
                    .args(&config.spawn_args)
                    .env("ENABLE_MODULES", ENABLE_MODULES)
                    .env("BACKUP_FILESYSTEM_PATH", backup_dir)
                    .kill_on_drop(true)
                    .spawn()
                    .map_err(|e| {
                        Error::StoreUnavailable(format!("failed to spawn {}: {}", command, e))
                    })?;
                Some(child)
            }
            None => None,
        };

        let mut session = Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            child,
        };

        if let Err(e) = session
            .wait_ready(config.ready_attempts, config.ready_delay_ms)
            .await
        {
            session.close().await;
            return Err(e);
        }

        Ok(session)
    }

    async fn wait_ready(&self, attempts: u32, delay_ms: u64) -> Result<()> {
        let url = self.endpoint("/v1/.well-known/ready");

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            match self.client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(_) | Err(_) => continue,
            }
        }

        Err(Error::StoreUnavailable(format!(
            "store at {} failed readiness check after {} attempts",
            self.base_url, attempts
        )))
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// The HTTP client carrying the API-key header. Used by the collection,
    /// ingest, and query modules for their REST calls.
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// Release the session. Kills and reaps any spawned store process.
    /// Must be called on every exit path; the orchestrator guarantees this
    /// by running the flow in an inner function and closing afterwards.
    pub async fn close(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                eprintln!("[store] failed to stop embedded process: {}", e);
            }
            let _ = child.wait().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn attach_config(url: &str, attempts: u32) -> StoreConfig {
        StoreConfig {
            url: url.to_string(),
            spawn_command: None,
            spawn_args: Vec::new(),
            ready_attempts: attempts,
            ready_delay_ms: 1,
        }
    }

    #[tokio::test]
    async fn start_passes_api_key_header_on_readiness_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/.well-known/ready"))
            .and(header("X-Palm-Api-Key", "sekrit"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = attach_config(&server.uri(), 3);
        let mut session = StoreSession::start(&config, Path::new("/tmp"), "sekrit")
            .await
            .unwrap();
        session.close().await;
    }

    #[tokio::test]
    async fn readiness_failure_is_store_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/.well-known/ready"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let config = attach_config(&server.uri(), 2);
        let err = StoreSession::start(&config, Path::new("/tmp"), "k")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn readiness_retries_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/.well-known/ready"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/.well-known/ready"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let config = attach_config(&server.uri(), 5);
        let mut session = StoreSession::start(&config, Path::new("/tmp"), "k")
            .await
            .unwrap();
        session.close().await;
    }
}
