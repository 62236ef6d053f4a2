//! Zero-shot classifier client. The only place that talks to the inference endpoint.
//!
//! The endpoint speaks the Hugging Face zero-shot protocol: a list of texts plus
//! candidate labels in, one ranked label list per text out.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Model the endpoint is expected to serve. Informational; the URL decides.
pub const DEFAULT_MODEL: &str = "valhalla/distilbart-mnli-12-1";

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("expected {expected} classifications, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("classifier call timed out after {0}s")]
    Timeout(u64),

    #[error("classifier worker failed: {0}")]
    Worker(String),
}

/// Ranked labels for one input text, most confident first.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Classification {
    pub labels: Vec<String>,
    #[serde(default)]
    pub scores: Vec<f32>,
}

impl Classification {
    pub fn top_label(&self) -> Option<&str> {
        self.labels.first().map(String::as_str)
    }
}

/// Batch text classifier. Implement this to swap inference backends.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    /// Classifies `texts` against `labels`. Must return exactly one
    /// classification per text, in input order.
    async fn classify(
        &self,
        texts: &[String],
        labels: &[&str],
    ) -> Result<Vec<Classification>, ClassifierError>;
}

#[derive(Debug, Serialize)]
struct ZeroShotRequest<'a> {
    inputs: &'a [String],
    parameters: ZeroShotParameters<'a>,
}

#[derive(Debug, Serialize)]
struct ZeroShotParameters<'a> {
    candidate_labels: &'a [&'a str],
    multi_label: bool,
}

/// A one-text request may come back as a bare object instead of a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ZeroShotResponse {
    Many(Vec<Classification>),
    One(Classification),
}

#[derive(Clone)]
pub struct HttpZeroShotClassifier {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpZeroShotClassifier {
    pub fn new(url: String, api_key: Option<String>) -> Result<Self, ClassifierError> {
        Ok(Self {
            // Deadlines are enforced per batch by the caller.
            client: Client::builder().build()?,
            url,
            api_key,
        })
    }
}

#[async_trait]
impl TextClassifier for HttpZeroShotClassifier {
    async fn classify(
        &self,
        texts: &[String],
        labels: &[&str],
    ) -> Result<Vec<Classification>, ClassifierError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = ZeroShotRequest {
            inputs: texts,
            parameters: ZeroShotParameters {
                candidate_labels: labels,
                multi_label: false,
            },
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let results = match response.json::<ZeroShotResponse>().await? {
            ZeroShotResponse::Many(v) => v,
            ZeroShotResponse::One(c) => vec![c],
        };
        check_length(texts.len(), results.len())?;

        debug!(texts = texts.len(), "zero-shot batch classified");
        Ok(results)
    }
}

fn check_length(expected: usize, actual: usize) -> Result<(), ClassifierError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ClassifierError::LengthMismatch { expected, actual })
    }
}
