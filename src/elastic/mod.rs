//! REST client for the search platform: index administration, bulk writes, search,
//! and the inference / model endpoints the semantic field depends on.

pub mod types;

use std::time::Duration;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::{ApiKey, ElasticConfig};
use types::{Acknowledged, BulkResponse, ErrorBody, ErrorOrString, SearchResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

const SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'/')
    .add(b'?')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+');

fn encode_segment(s: &str) -> String {
    utf8_percent_encode(s, SEGMENT_ENCODE_SET).to_string()
}

/// Errors returned by Elasticsearch REST operations.
#[derive(Debug, thiserror::Error)]
pub enum ElasticError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Elasticsearch error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentStatus {
    Started,
    AlreadyStarted,
}

#[derive(Clone)]
pub struct ElasticClient {
    http: Client,
    base_url: String,
    api_key: ApiKey,
}

impl ElasticClient {
    pub fn new(http: Client, config: &ElasticConfig) -> Self {
        Self {
            http,
            base_url: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: ApiKey::new("test-key"),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .header("Authorization", format!("ApiKey {}", self.api_key.expose()))
            .header("User-Agent", crate::USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        path: &str,
    ) -> Result<T, ElasticError> {
        let response = request.send().await?;
        let response = check_status(response, path).await?;
        Ok(response.json().await?)
    }

    pub async fn index_exists(&self, index: &str) -> Result<bool, ElasticError> {
        let path = format!("/{}", encode_segment(index));
        let response = self.request(Method::HEAD, &path).send().await?;
        match response.status().as_u16() {
            200..=299 => Ok(true),
            404 => Ok(false),
            _ => check_status(response, &path).await.map(|_| true),
        }
    }

    pub async fn delete_index(&self, index: &str) -> Result<(), ElasticError> {
        let path = format!("/{}", encode_segment(index));
        let _: Acknowledged = self
            .send_json(self.request(Method::DELETE, &path), &path)
            .await?;
        Ok(())
    }

    /// Returns whether the cluster acknowledged the creation.
    pub async fn create_index(
        &self,
        index: &str,
        body: &serde_json::Value,
    ) -> Result<bool, ElasticError> {
        let path = format!("/{}", encode_segment(index));
        let ack: Acknowledged = self
            .send_json(self.request(Method::PUT, &path).json(body), &path)
            .await?;
        Ok(ack.acknowledged)
    }

    /// Submits a newline-delimited bulk body. Per-document outcomes are in the response items.
    pub async fn bulk(&self, ndjson: String) -> Result<BulkResponse, ElasticError> {
        let path = "/_bulk";
        let request = self
            .request(Method::POST, path)
            .header("Content-Type", "application/x-ndjson")
            .body(ndjson);
        let response: BulkResponse = self.send_json(request, path).await?;
        debug!(items = response.items.len(), errors = response.errors, "bulk request complete");
        Ok(response)
    }

    pub async fn refresh(&self, index: &str) -> Result<(), ElasticError> {
        let path = format!("/{}/_refresh", encode_segment(index));
        let _: serde_json::Value = self
            .send_json(self.request(Method::POST, &path), &path)
            .await?;
        Ok(())
    }

    pub async fn search(
        &self,
        index: &str,
        body: &serde_json::Value,
    ) -> Result<SearchResponse, ElasticError> {
        let path = format!("/{}/_search", encode_segment(index));
        self.send_json(self.request(Method::POST, &path).json(body), &path)
            .await
    }

    pub async fn inference_exists(&self, inference_id: &str) -> Result<bool, ElasticError> {
        let path = format!("/_inference/{}", encode_segment(inference_id));
        let response = self.request(Method::GET, &path).send().await?;
        match response.status().as_u16() {
            200..=299 => Ok(true),
            404 => Ok(false),
            _ => check_status(response, &path).await.map(|_| true),
        }
    }

    pub async fn put_text_embedding_inference(
        &self,
        inference_id: &str,
        model_id: &str,
    ) -> Result<(), ElasticError> {
        let path = format!("/_inference/text_embedding/{}", encode_segment(inference_id));
        let body = serde_json::json!({
            "service": "elasticsearch",
            "service_settings": {
                "num_allocations": 1,
                "num_threads": 1,
                "model_id": model_id
            }
        });
        let _: serde_json::Value = self
            .send_json(self.request(Method::PUT, &path).json(&body), &path)
            .await?;
        Ok(())
    }

    pub async fn start_deployment(&self, model_id: &str) -> Result<DeploymentStatus, ElasticError> {
        let path = format!(
            "/_ml/trained_models/{}/deployment/_start?wait_for=started",
            encode_segment(model_id)
        );
        let response = self.request(Method::POST, &path).send().await?;
        match check_status(response, &path).await {
            Ok(_) => Ok(DeploymentStatus::Started),
            Err(ElasticError::Api { code, message })
                if code == 409 || message.to_lowercase().contains("already started") =>
            {
                debug!(model_id, "model deployment already started");
                Ok(DeploymentStatus::AlreadyStarted)
            }
            Err(e) => Err(e),
        }
    }
}

async fn check_status(response: Response, path: &str) -> Result<Response, ElasticError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| format!("HTTP {status}"));
    let message = extract_error_message(&body);
    match status.as_u16() {
        404 => Err(ElasticError::NotFound(format!("{path}: {message}"))),
        401 | 403 => {
            warn!(status = %status, "Elasticsearch rejected credentials");
            Err(ElasticError::Unauthorized(message))
        }
        code => Err(ElasticError::Api { code, message }),
    }
}

fn extract_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: Some(ErrorOrString::Cause(cause)),
        }) => cause.to_string(),
        Ok(ErrorBody {
            error: Some(ErrorOrString::Message(message)),
        }) => message,
        _ => body.chars().take(200).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_structured_error_reason() {
        let body = r#"{"error":{"root_cause":[],"type":"resource_already_exists_exception","reason":"index [x] already exists"},"status":400}"#;
        assert_eq!(
            extract_error_message(body),
            "resource_already_exists_exception: index [x] already exists"
        );
    }

    #[test]
    fn extracts_plain_string_error() {
        assert_eq!(extract_error_message(r#"{"error":"boom"}"#), "boom");
    }

    #[test]
    fn falls_back_to_body_snippet() {
        let body = "x".repeat(500);
        assert_eq!(extract_error_message(&body).len(), 200);
    }

    #[test]
    fn segments_are_encoded() {
        assert_eq!(encode_segment("a b/c"), "a%20b%2Fc");
        assert_eq!(encode_segment(".multilingual-e5-small"), ".multilingual-e5-small");
    }
}
