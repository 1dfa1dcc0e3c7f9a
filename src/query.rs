//! Similarity queries and the demonstration query sequence.
//!
//! Queries go through the store's GraphQL endpoint. Each returns an ordered
//! list of records (most similar first — scoring is entirely the store's)
//! truncated to the request limit, carrying only the requested fields.
//! Per-query failures are logged and the sequence continues; missing local
//! fixtures skip their query with an informational line.

use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use crate::config::QueryConfig;
use crate::error::{Error, Result};
use crate::media;
use crate::store::StoreSession;

/// An ad-hoc similarity lookup, constructed and consumed within one call.
#[derive(Debug, Clone)]
pub enum QueryInput {
    NearText(String),
    /// Base64 image payload.
    NearImage(String),
    /// Base64 video payload.
    NearVideo(String),
}

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub input: QueryInput,
    pub limit: usize,
    pub return_fields: Vec<String>,
}

impl QueryRequest {
    pub fn new(input: QueryInput, limit: usize) -> Self {
        Self {
            input,
            limit,
            return_fields: vec![
                "name".to_string(),
                "path".to_string(),
                "mediaType".to_string(),
            ],
        }
    }

    /// Build the GraphQL request body for this query.
    pub fn graphql_body(&self, class: &str) -> Value {
        let operator = match &self.input {
            QueryInput::NearText(text) => {
                format!("nearText: {{ concepts: [{}] }}", quote(text))
            }
            QueryInput::NearImage(payload) => {
                format!("nearImage: {{ image: {} }}", quote(payload))
            }
            QueryInput::NearVideo(payload) => {
                format!("nearVideo: {{ video: {} }}", quote(payload))
            }
        };

        let query = format!(
            "{{ Get {{ {}(limit: {}, {}) {{ {} }} }} }}",
            class,
            self.limit,
            operator,
            self.return_fields.join(" ")
        );
        serde_json::json!({ "query": query })
    }
}

fn quote(s: &str) -> String {
    // serde_json string serialization doubles as GraphQL string escaping.
    serde_json::to_string(s).unwrap_or_default()
}

/// Run a similarity query and return the matched records.
pub async fn run_query(
    session: &StoreSession,
    class: &str,
    request: &QueryRequest,
) -> Result<Vec<Value>> {
    let body = graphql(session, &request.graphql_body(class)).await?;

    let objects = body["data"]["Get"][class]
        .as_array()
        .cloned()
        .ok_or_else(|| Error::Query("malformed query response".into()))?;
    Ok(objects)
}

/// Count ingested records per media kind.
pub async fn aggregate_by_media_type(
    session: &StoreSession,
    class: &str,
) -> Result<Vec<(String, u64)>> {
    let query = format!(
        "{{ Aggregate {{ {}(groupBy: [\"mediaType\"]) {{ groupedBy {{ value }} meta {{ count }} }} }} }}",
        class
    );
    let body = graphql(session, &serde_json::json!({ "query": query })).await?;

    let groups = body["data"]["Aggregate"][class]
        .as_array()
        .ok_or_else(|| Error::Query("malformed aggregate response".into()))?;

    let mut counts = Vec::new();
    for group in groups {
        let value = group["groupedBy"]["value"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let count = group["meta"]["count"].as_u64().unwrap_or(0);
        counts.push((value, count));
    }
    Ok(counts)
}

async fn graphql(session: &StoreSession, body: &Value) -> Result<Value> {
    let url = session.endpoint("/v1/graphql");
    let resp = session.http().post(&url).json(body).send().await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        return Err(Error::Query(format!("graphql returned {}: {}", status, text)));
    }

    let parsed: Value = resp
        .json()
        .await
        .map_err(|e| Error::Query(format!("invalid graphql response: {}", e)))?;

    if let Some(errors) = parsed.get("errors").and_then(|e| e.as_array()) {
        if !errors.is_empty() {
            let message = errors[0]["message"].as_str().unwrap_or("unknown error");
            return Err(Error::Query(format!("graphql error: {}", message)));
        }
    }
    Ok(parsed)
}

/// Fetch a remote image and encode it for use as a query payload. Bounded
/// by `timeout`; a non-success status is an error.
pub async fn fetch_remote_image(url: &str, timeout: Duration) -> Result<String> {
    use base64::Engine as _;

    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let resp = client.get(url).send().await?.error_for_status()?;
    let bytes = resp.bytes().await?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// The fixed demonstration sequence: aggregate, near-text, near-local-image,
/// near-remote-image, near-local-video.
pub async fn run_sequence(
    session: &StoreSession,
    config: &QueryConfig,
    class: &str,
    test_dir: &Path,
) -> Result<()> {
    match aggregate_by_media_type(session, class).await {
        Ok(groups) => {
            for (value, count) in groups {
                println!("Group: {} -> count: {}", value, count);
            }
        }
        Err(e) => eprintln!("[aggregate error] {}", e),
    }

    println!("\n--- near_text: {} ---", config.text_query);
    let request = QueryRequest::new(QueryInput::NearText(config.text_query.clone()), config.limit);
    print_results(run_query(session, class, &request).await);

    let image_fixture = test_dir.join(&config.image_fixture);
    if image_fixture.exists() {
        println!("\n--- near_image: {} ---", config.image_fixture);
        match media::file_to_base64(&image_fixture) {
            Ok(payload) => {
                let request = QueryRequest::new(QueryInput::NearImage(payload), config.limit);
                print_results(run_query(session, class, &request).await);
            }
            Err(e) => eprintln!("[near_image error] {}", e),
        }
    } else {
        println!(
            "\n[info] skipping local image query, fixture missing: {}",
            image_fixture.display()
        );
    }

    println!("\n--- near_image: remote URL ---");
    let remote = async {
        let payload = fetch_remote_image(
            &config.remote_image_url,
            Duration::from_secs(config.fetch_timeout_secs),
        )
        .await?;
        let request = QueryRequest::new(QueryInput::NearImage(payload), config.limit);
        run_query(session, class, &request).await
    }
    .await;
    match remote {
        Ok(results) => print_objects(&results),
        Err(e) => eprintln!("[near_image URL error] {}", e),
    }

    let video_fixture = test_dir.join(&config.video_fixture);
    if video_fixture.exists() {
        println!("\n--- near_video: {} ---", config.video_fixture);
        let result = async {
            let payload = media::file_to_base64(&video_fixture)?;
            let request = QueryRequest::new(QueryInput::NearVideo(payload), config.limit);
            run_query(session, class, &request).await
        }
        .await;
        match result {
            Ok(results) => print_objects(&results),
            Err(e) => eprintln!("[near_video error] {}", e),
        }
    } else {
        println!(
            "\n[info] skipping local video query, fixture missing: {}",
            video_fixture.display()
        );
    }

    Ok(())
}

fn print_results(results: Result<Vec<Value>>) {
    match results {
        Ok(objects) => print_objects(&objects),
        Err(e) => eprintln!("[query error] {}", e),
    }
}

fn print_objects(objects: &[Value]) {
    for obj in objects {
        match serde_json::to_string_pretty(obj) {
            Ok(pretty) => println!("{}", pretty),
            Err(e) => eprintln!("[print error] {}", e),
        }
    }
}
