use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::keeper::summary::TextGenerator;

/// OpenAI Responses API client.
pub struct Client {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl Client {
    pub fn new(api_key: String, model: String, base_url: String, timeout: Duration) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            api_key,
            model,
            base_url,
            http,
        })
    }

    pub async fn respond(&self, prompt: &str) -> Result<String, Error> {
        let request = ApiRequest {
            model: &self.model,
            input: prompt,
        };

        let response = self
            .http
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        debug!("OpenAI response status: {status}");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!("{status}: {body}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        output_text(&body)
    }
}

#[async_trait]
impl TextGenerator for Client {
    async fn generate(&self, prompt: &str) -> Result<String, Error> {
        self.respond(prompt).await
    }
}

/// Concatenate every `output_text` part of a Responses API body.
fn output_text(body: &str) -> Result<String, Error> {
    let parsed: ApiResponse = serde_json::from_str(body).map_err(|e| Error::Parse(e.to_string()))?;

    let text: String = parsed
        .output
        .iter()
        .flat_map(|item| item.content.iter())
        .filter(|part| part.kind == "output_text")
        .filter_map(|part| part.text.as_deref())
        .collect();

    if text.trim().is_empty() {
        Err(Error::Empty)
    } else {
        Ok(text)
    }
}

#[derive(Debug)]
pub enum Error {
    Http(String),
    Api(String),
    Parse(String),
    Empty,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Api(e) => write!(f, "API error: {e}"),
            Error::Parse(e) => write!(f, "Parse error: {e}"),
            Error::Empty => write!(f, "Empty response"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_text_joins_parts() {
        let body = r#"{
            "id": "resp_1",
            "output": [
                {"type": "reasoning", "summary": []},
                {"type": "message", "role": "assistant", "content": [
                    {"type": "output_text", "text": "Short ", "annotations": []},
                    {"type": "output_text", "text": "summary.", "annotations": []}
                ]}
            ]
        }"#;
        assert_eq!(output_text(body).unwrap(), "Short summary.");
    }

    #[test]
    fn test_output_text_skips_refusals() {
        let body = r#"{"output": [{"type": "message", "content": [
            {"type": "refusal", "refusal": "no"}
        ]}]}"#;
        assert!(matches!(output_text(body), Err(Error::Empty)));
    }

    #[test]
    fn test_output_text_bad_json() {
        assert!(matches!(output_text("not json"), Err(Error::Parse(_))));
    }
}
