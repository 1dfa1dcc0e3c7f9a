//! Collection schema management.
//!
//! Each run drops any pre-existing collection of the configured name and
//! creates a fresh one with the multimodal vectorizer attached. Idempotent
//! with respect to schema, destructive with respect to prior ingested data;
//! there is no migration or incremental-schema path.

use serde_json::json;

use crate::config::CollectionConfig;
use crate::error::{Error, Result};
use crate::store::StoreSession;

const VECTORIZER_MODULE: &str = "multi2vec-palm";

/// Drop the collection if it exists, then create it with the vectorizer
/// configuration (image/video fields, model, dimensionality, project and
/// region of the embedding service).
pub async fn recreate(session: &StoreSession, config: &CollectionConfig) -> Result<()> {
    if exists(session, &config.name).await? {
        delete(session, &config.name).await?;
    }
    create(session, config).await
}

pub async fn exists(session: &StoreSession, name: &str) -> Result<bool> {
    let url = session.endpoint(&format!("/v1/schema/{}", name));
    let resp = session.http().get(&url).send().await?;
    match resp.status() {
        s if s.is_success() => Ok(true),
        reqwest::StatusCode::NOT_FOUND => Ok(false),
        s => Err(Error::StoreUnavailable(format!(
            "schema probe for {} returned {}",
            name, s
        ))),
    }
}

async fn delete(session: &StoreSession, name: &str) -> Result<()> {
    let url = session.endpoint(&format!("/v1/schema/{}", name));
    let resp = session.http().delete(&url).send().await?;
    if !resp.status().is_success() {
        return Err(Error::StoreUnavailable(format!(
            "failed to delete collection {}: {}",
            name,
            resp.status()
        )));
    }
    Ok(())
}

async fn create(session: &StoreSession, config: &CollectionConfig) -> Result<()> {
    let url = session.endpoint("/v1/schema");
    let resp = session
        .http()
        .post(&url)
        .json(&class_definition(config))
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::StoreUnavailable(format!(
            "failed to create collection {}: {} {}",
            config.name, status, body
        )));
    }
    Ok(())
}

/// The class definition sent to the store. The vectorizable fields here
/// must match the fields populated on ingested records, or embedding
/// silently fails for that field.
pub fn class_definition(config: &CollectionConfig) -> serde_json::Value {
    json!({
        "class": config.name,
        "vectorizer": VECTORIZER_MODULE,
        "moduleConfig": {
            VECTORIZER_MODULE: {
                "imageFields": ["image"],
                "videoFields": ["video"],
                "projectId": config.project_id,
                "location": config.location,
                "modelId": config.model_id,
                "dimensions": config.dimensions,
            }
        },
        "properties": [
            { "name": "name", "dataType": ["text"] },
            { "name": "path", "dataType": ["text"] },
            { "name": "image", "dataType": ["blob"] },
            { "name": "video", "dataType": ["blob"] },
            { "name": "mediaType", "dataType": ["text"] },
        ],
    })
}
