//! Zero-shot classification against an NLI inference endpoint.
//!
//! The endpoint speaks the Hugging Face inference protocol:
//! `POST {base}/models/{model}` with `candidate_labels` and a
//! `hypothesis_template`. Sentiment and subject classification are both thin
//! wrappers over the same call, differing only in labels and template.

use crate::config::get_config;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// NLI template used for binary sentiment classification.
const SENTIMENT_TEMPLATE: &str = "The article is {}.";
/// NLI template used for arbitrary subject classification.
const SUBJECTS_TEMPLATE: &str = "The article is about {}.";

/// Errors surfaced while requesting zero-shot classification.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Endpoint responded with an unexpected status code.
    #[error("Unexpected classifier response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the endpoint.
        status: reqwest::StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Endpoint response could not be parsed.
    #[error("Malformed classifier response: {0}")]
    InvalidResponse(String),
}

/// A candidate label with the score the model assigned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelScore {
    /// Candidate label as supplied by the caller.
    pub label: String,
    /// Entailment score in `[0, 1]`.
    pub score: f64,
}

/// HTTP client for a zero-shot NLI classification endpoint.
pub struct ZeroShotClient {
    http: Client,
    base_url: String,
    model: String,
    api_token: Option<String>,
}

#[derive(Deserialize)]
struct ZeroShotResponse {
    labels: Vec<String>,
    scores: Vec<f64>,
}

impl ZeroShotClient {
    /// Construct a client from the configured endpoint, model, and token.
    pub fn new() -> Self {
        let config = get_config();
        Self::with_endpoint(
            config.zero_shot_url.clone(),
            config.zero_shot_model.clone(),
            config.zero_shot_api_token.clone(),
        )
    }

    /// Construct a client against an explicit endpoint and model.
    pub fn with_endpoint(base_url: String, model: String, api_token: Option<String>) -> Self {
        let http = Client::builder()
            .user_agent("eznlp/zero-shot")
            .build()
            .expect("Failed to construct reqwest::Client for classification");
        Self {
            http,
            base_url,
            model,
            api_token,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    /// Classify `text` against arbitrary candidate `labels` using an NLI
    /// `template` containing a `{}` placeholder.
    ///
    /// Results come back in the order the endpoint ranks them (descending
    /// score).
    pub async fn predict(
        &self,
        text: &str,
        labels: &[&str],
        template: &str,
    ) -> Result<Vec<LabelScore>, ClassifyError> {
        let payload = json!({
            "inputs": text,
            "parameters": {
                "candidate_labels": labels,
                "hypothesis_template": template,
            }
        });

        tracing::debug!(model = %self.model, labels = labels.len(), "Requesting zero-shot prediction");

        let mut request = self.http.post(self.endpoint()).json(&payload);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = ClassifyError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Zero-shot request failed");
            return Err(error);
        }

        let body: ZeroShotResponse = response.json().await.map_err(|error| {
            ClassifyError::InvalidResponse(format!("failed to decode response: {error}"))
        })?;

        if body.labels.len() != body.scores.len() {
            return Err(ClassifyError::InvalidResponse(format!(
                "label/score arity mismatch: {} labels, {} scores",
                body.labels.len(),
                body.scores.len()
            )));
        }

        Ok(body
            .labels
            .into_iter()
            .zip(body.scores)
            .map(|(label, score)| LabelScore { label, score })
            .collect())
    }

    /// Determine whether `text` reads positive or negative.
    pub async fn sentiment(&self, text: &str) -> Result<Vec<LabelScore>, ClassifyError> {
        self.predict(text, &["negative", "positive"], SENTIMENT_TEMPLATE)
            .await
    }

    /// Determine how strongly `text` is about each of the given `subjects`.
    pub async fn subjects(
        &self,
        text: &str,
        subjects: &[&str],
    ) -> Result<Vec<LabelScore>, ClassifyError> {
        self.predict(text, subjects, SUBJECTS_TEMPLATE).await
    }
}

impl Default for ZeroShotClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn test_client(base_url: String) -> ZeroShotClient {
        ZeroShotClient::with_endpoint(base_url, "facebook/bart-large-mnli".into(), None)
    }

    #[tokio::test]
    async fn sentiment_sends_nli_template_and_zips_scores() {
        let server = MockServer::start_async().await;
        let client = test_client(server.base_url());

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/models/facebook/bart-large-mnli")
                    .json_body_partial(
                        r#"{"parameters": {"hypothesis_template": "The article is {}."}}"#,
                    );
                then.status(200).json_body(json!({
                    "sequence": "great product",
                    "labels": ["positive", "negative"],
                    "scores": [0.97, 0.03]
                }));
            })
            .await;

        let scores = client.sentiment("great product").await.expect("scores");
        mock.assert();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].label, "positive");
        assert!(scores[0].score > scores[1].score);
    }

    #[tokio::test]
    async fn subjects_passes_caller_labels() {
        let server = MockServer::start_async().await;
        let client = test_client(server.base_url());

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/models/facebook/bart-large-mnli")
                    .json_body_partial(
                        r#"{"parameters": {"candidate_labels": ["wildfires", "energy", "bacon"]}}"#,
                    );
                then.status(200).json_body(json!({
                    "sequence": "utility shutoffs",
                    "labels": ["energy", "wildfires", "bacon"],
                    "scores": [0.8, 0.7, 0.01]
                }));
            })
            .await;

        let scores = client
            .subjects("utility shutoffs", &["wildfires", "energy", "bacon"])
            .await
            .expect("scores");
        mock.assert();
        assert_eq!(scores[0].label, "energy");
    }

    #[tokio::test]
    async fn arity_mismatch_is_invalid_response() {
        let server = MockServer::start_async().await;
        let client = test_client(server.base_url());

        server
            .mock_async(|when, then| {
                when.method(POST).path("/models/facebook/bart-large-mnli");
                then.status(200).json_body(json!({
                    "labels": ["positive"],
                    "scores": [0.5, 0.5]
                }));
            })
            .await;

        let error = client.sentiment("text").await.expect_err("mismatch");
        assert!(matches!(error, ClassifyError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn error_status_surfaces_unchanged() {
        let server = MockServer::start_async().await;
        let client = test_client(server.base_url());

        server
            .mock_async(|when, then| {
                when.method(POST).path("/models/facebook/bart-large-mnli");
                then.status(503).body("model loading");
            })
            .await;

        let error = client.sentiment("text").await.expect_err("status");
        assert!(matches!(
            error,
            ClassifyError::UnexpectedStatus { status, .. } if status.as_u16() == 503
        ));
    }
}
