use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub paths: PathsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

/// All working directories hang off `base`. One convention only:
/// images under `source/image`, videos under `source/video`.
#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    pub base: PathBuf,
    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,
}

fn default_env_file() -> PathBuf {
    PathBuf::from(".env")
}

impl PathsConfig {
    pub fn image_dir(&self) -> PathBuf {
        self.base.join("source").join("image")
    }

    pub fn video_dir(&self) -> PathBuf {
        self.base.join("source").join("video")
    }

    pub fn test_dir(&self) -> PathBuf {
        self.base.join("test")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.base.join("backups")
    }

    /// Resolve the env file against `base` unless it is already absolute.
    pub fn env_path(&self) -> PathBuf {
        if self.env_file.is_absolute() {
            self.env_file.clone()
        } else {
            self.base.join(&self.env_file)
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Base URL of the store's HTTP API.
    #[serde(default = "default_store_url")]
    pub url: String,
    /// Command to launch the embedded store binary. When unset, the session
    /// attaches to an already-running instance at `url`.
    #[serde(default)]
    pub spawn_command: Option<String>,
    #[serde(default)]
    pub spawn_args: Vec<String>,
    #[serde(default = "default_ready_attempts")]
    pub ready_attempts: u32,
    #[serde(default = "default_ready_delay_ms")]
    pub ready_delay_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            spawn_command: None,
            spawn_args: Vec::new(),
            ready_attempts: default_ready_attempts(),
            ready_delay_ms: default_ready_delay_ms(),
        }
    }
}

fn default_store_url() -> String {
    "http://127.0.0.1:8079".to_string()
}
fn default_ready_attempts() -> u32 {
    30
}
fn default_ready_delay_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    #[serde(default = "default_collection_name")]
    pub name: String,
    #[serde(default = "default_project_id")]
    pub project_id: String,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: u32,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            name: default_collection_name(),
            project_id: default_project_id(),
            location: default_location(),
            model_id: default_model_id(),
            dimensions: default_dimensions(),
        }
    }
}

fn default_collection_name() -> String {
    "Animals".to_string()
}
fn default_project_id() -> String {
    "semi-random-dev".to_string()
}
fn default_location() -> String {
    "us-central1".to_string()
}
fn default_model_id() -> String {
    "multimodalembedding@001".to_string()
}
fn default_dimensions() -> u32 {
    1408
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Upstream quota on the embedding service, not a local correctness
    /// requirement. Enforced by pacing batch submissions.
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

fn default_batch_size() -> usize {
    20
}
fn default_requests_per_minute() -> u32 {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_text_query")]
    pub text_query: String,
    #[serde(default = "default_remote_image_url")]
    pub remote_image_url: String,
    #[serde(default = "default_image_fixture")]
    pub image_fixture: String,
    #[serde(default = "default_video_fixture")]
    pub video_fixture: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            text_query: default_text_query(),
            remote_image_url: default_remote_image_url(),
            image_fixture: default_image_fixture(),
            video_fixture: default_video_fixture(),
        }
    }
}

fn default_limit() -> usize {
    3
}
fn default_fetch_timeout_secs() -> u64 {
    15
}
fn default_text_query() -> String {
    "dog playing with stick".to_string()
}
fn default_remote_image_url() -> String {
    "https://raw.githubusercontent.com/weaviate-tutorials/multimodal-workshop/main/2-multimodal/test/test-meerkat.jpg".to_string()
}
fn default_image_fixture() -> String {
    "test-cat.jpg".to_string()
}
fn default_video_fixture() -> String {
    "test-meerkat.mp4".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_extraction_model")]
    pub model: String,
    #[serde(default = "default_instruction")]
    pub instruction: String,
    #[serde(default = "default_extraction_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: default_extraction_model(),
            instruction: default_instruction(),
            timeout_secs: default_extraction_timeout_secs(),
        }
    }
}

fn default_extraction_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_instruction() -> String {
    "Extract the invoice number, date, vendor, line items, and total from \
     this invoice. Respond with a single JSON object."
        .to_string()
}
fn default_extraction_timeout_secs() -> u64 {
    60
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse config file: {}", e)))?;

    if config.collection.name.trim().is_empty() {
        return Err(Error::Config("collection.name must not be empty".into()));
    }
    if config.ingest.requests_per_minute == 0 {
        return Err(Error::Config(
            "ingest.requests_per_minute must be >= 1".into(),
        ));
    }
    if config.ingest.batch_size == 0 {
        return Err(Error::Config("ingest.batch_size must be >= 1".into()));
    }
    if config.query.limit == 0 {
        return Err(Error::Config("query.limit must be >= 1".into()));
    }
    if config.collection.dimensions == 0 {
        return Err(Error::Config("collection.dimensions must be > 0".into()));
    }

    Ok(config)
}

/// Create the working directories if absent. Called once at startup; a
/// missing base directory is created rather than treated as an error.
pub fn ensure_dirs(paths: &PathsConfig) -> Result<()> {
    for dir in [
        paths.image_dir(),
        paths.video_dir(),
        paths.test_dir(),
        paths.backup_dir(),
    ] {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(())
}

// ============ Secrets ============

/// Secrets read from the local env file. Never stored in the TOML config.
#[derive(Debug, Clone)]
pub struct Secrets {
    vars: HashMap<String, String>,
}

impl Secrets {
    /// Parse a KEY=VALUE env file. Values are trimmed of surrounding
    /// whitespace and matching single or double quotes. Lines starting with
    /// `#` and blank lines are ignored. A missing file yields an empty set
    /// so that process-level environment variables can still satisfy lookups.
    pub fn load(path: &Path) -> Result<Self> {
        let mut vars = HashMap::new();

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let Some((key, value)) = line.split_once('=') else {
                    continue;
                };
                vars.insert(key.trim().to_string(), trim_value(value).to_string());
            }
        }

        Ok(Self { vars })
    }

    /// Look up an optional secret: the env file wins, then the process
    /// environment. Empty-after-trim values count as absent.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match self.vars.get(key) {
            Some(v) => v.clone(),
            None => std::env::var(key).ok().map(|v| trim_value(&v).to_string())?,
        };
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    /// Look up a mandatory secret, failing startup if absent or empty.
    pub fn require(&self, key: &str) -> Result<String> {
        self.get(key).ok_or_else(|| {
            Error::Config(format!(
                "{} missing. Add it to the env file next to the config.",
                key
            ))
        })
    }
}

fn trim_value(raw: &str) -> &str {
    let v = raw.trim();
    let v = v
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(v);
    v.strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(v)
}

/// Env file key for the multimodal embedding service API key (Flow A).
pub const EMBEDDING_API_KEY: &str = "EMBEDDING_API_KEY";
/// Env file key for the hosted vision model API key (Flow B).
pub const GENAI_API_KEY: &str = "GENAI_API_KEY";
/// Optional alternate base URL for the vision model service.
pub const GENAI_API_BASE: &str = "GENAI_API_BASE";
