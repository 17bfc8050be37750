use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::GeminiConfig;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("Completion request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Completion API error: {0}")]
    Api(String),
    #[error("Completion response contained no text")]
    EmptyResponse,
}

/// Thin client for the Gemini `generateContent` endpoint. Prompts go out
/// verbatim; the first candidate's text comes back unmodified.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/{}:generateContent", API_BASE, config.model),
            api_key: config.api_key.clone(),
        })
    }

    pub async fn complete(&self, prompt: &str) -> Result<String, AiError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Api(format!("{status}: {body}")));
        }

        let body: GenerateContentResponse = response.json().await?;
        extract_text(body)
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

fn extract_text(response: GenerateContentResponse) -> Result<String, AiError> {
    let candidate = response.candidates.into_iter().next().ok_or(AiError::EmptyResponse)?;
    let parts = candidate.content.ok_or(AiError::EmptyResponse)?.parts;

    let text: String = parts.into_iter().map(|part| part.text).collect();
    if text.is_empty() {
        Err(AiError::EmptyResponse)
    } else {
        Ok(text)
    }
}
