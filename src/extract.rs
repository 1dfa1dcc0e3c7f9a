//! Invoice extraction: one image + one instruction → raw model text.
//!
//! Independent of the ingest/search flow. The hosted vision model is asked
//! for JSON-shaped output, but the response is returned verbatim — no
//! parsing, validation, or retry happens here. If the model returns prose
//! or malformed JSON, so does this flow.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// A single image payload plus a natural-language instruction. One-shot.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub instruction: String,
    pub mime_type: String,
    pub payload: String,
}

impl ExtractionRequest {
    /// Load a local image file into a request.
    pub fn from_image_file(path: &Path, instruction: &str) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            Error::Generation(format!("failed to read image {}: {}", path.display(), e))
        })?;

        Ok(Self {
            instruction: instruction.to_string(),
            mime_type: mime_for(path),
            payload: BASE64.encode(bytes),
        })
    }
}

fn mime_for(path: &Path) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
    .to_string()
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    Inline {
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

/// Client for the hosted multimodal model's generateContent endpoint.
pub struct VisionClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl VisionClient {
    /// `api_base` overrides the default service endpoint when set (the
    /// optional alternate base URL from the env file).
    pub fn new(
        config: &ExtractionConfig,
        api_key: String,
        api_base: Option<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    /// Send the image and instruction, return the model's text verbatim.
    pub async fn generate(&self, request: &ExtractionRequest) -> Result<String> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: request.instruction.clone(),
                    },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: request.mime_type.clone(),
                            data: request.payload.clone(),
                        },
                    },
                ],
            }],
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("model request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "model returned {}: {}",
                status, text
            )));
        }

        let parsed: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::Generation(format!("invalid model response: {}", e)))?;

        response_text(&parsed)
    }
}

/// Concatenate the text parts of the first candidate. The model is asked
/// for JSON-shaped output but whatever comes back is passed through.
fn response_text(body: &serde_json::Value) -> Result<String> {
    let parts = body["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| Error::Generation("model response carried no candidates".into()))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join("");

    if text.is_empty() {
        return Err(Error::Generation("model response carried no text".into()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_instruction_then_image() {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: "extract it".into(),
                    },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: "image/jpeg".into(),
                            data: "aW1n".into(),
                        },
                    },
                ],
            }],
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "extract it");
        assert_eq!(
            json["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "image/jpeg"
        );
        assert_eq!(json["contents"][0]["parts"][1]["inline_data"]["data"], "aW1n");
    }

    #[test]
    fn mime_type_follows_extension() {
        assert_eq!(mime_for(Path::new("a.png")), "image/png");
        assert_eq!(mime_for(Path::new("a.WEBP")), "image/webp");
        assert_eq!(mime_for(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(mime_for(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(mime_for(Path::new("noext")), "image/jpeg");
    }

    #[test]
    fn response_text_joins_parts_verbatim() {
        let body = serde_json::json!({
            "candidates": [ { "content": { "parts": [
                { "text": "{\"invoice\":" },
                { "text": " 42}" },
            ] } } ]
        });
        assert_eq!(response_text(&body).unwrap(), "{\"invoice\": 42}");
    }

    #[test]
    fn malformed_json_text_is_still_returned() {
        // No validation happens on the model output.
        let body = serde_json::json!({
            "candidates": [ { "content": { "parts": [ { "text": "not json {" } ] } } ]
        });
        assert_eq!(response_text(&body).unwrap(), "not json {");
    }

    #[test]
    fn missing_candidates_is_generation_error() {
        let err = response_text(&serde_json::json!({})).unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }

    #[test]
    fn request_from_missing_file_is_generation_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ExtractionRequest::from_image_file(&tmp.path().join("inv.jpg"), "x").unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }
}
