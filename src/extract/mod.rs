//! Document extraction via a Tika server, plus plain URL fetches.
//!
//! Format detection and parsing are entirely the server's responsibility; this
//! module only ships bytes and returns whatever text the collaborator
//! produced. Extraction failures surface unchanged.

use crate::config::get_config;
use reqwest::Client;
use reqwest::header::ACCEPT;
use std::path::Path;
use thiserror::Error;

/// Errors surfaced while extracting text from a document or URL.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Target file could not be read from disk.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path of the unreadable file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Extraction server rejected the document.
    #[error("Extraction failed ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the extraction server.
        status: reqwest::StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// HTTP client for the Tika document-extraction server.
pub struct ExtractClient {
    http: Client,
    base_url: String,
}

impl ExtractClient {
    /// Construct a client pointed at the configured Tika server.
    pub fn new() -> Self {
        Self::with_base_url(get_config().tika_url.clone())
    }

    /// Construct a client pointed at an explicit Tika base URL.
    pub fn with_base_url(base_url: String) -> Self {
        let http = Client::builder()
            .user_agent("eznlp/extract")
            .build()
            .expect("Failed to construct reqwest::Client for extraction");
        Self { http, base_url }
    }

    fn endpoint(&self) -> String {
        format!("{}/tika", self.base_url.trim_end_matches('/'))
    }

    /// Extract plain text from `target`, treating it as a URL when `is_url` is set.
    ///
    /// Convenience dispatcher over [`Self::from_file`] and [`Self::from_url`].
    pub async fn get_text(&self, target: &str, is_url: bool) -> Result<String, ExtractError> {
        if is_url {
            self.from_url(target).await
        } else {
            self.from_file(Path::new(target)).await
        }
    }

    /// Extract plain text from the file at `path`, regardless of format.
    ///
    /// The file's bytes are handed to the Tika server as-is; anything Tika can
    /// parse (PDF, DOCX, HTML, ...) comes back as text.
    pub async fn from_file(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ExtractError::Io {
            path: path.display().to_string(),
            source,
        })?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Extracting document text");

        let response = self
            .http
            .put(self.endpoint())
            .header(ACCEPT, "text/plain")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = ExtractError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, path = %path.display(), "Extraction failed");
            return Err(error);
        }

        Ok(response.text().await?)
    }

    /// Fetch `url` with a plain GET and return the raw response body as text.
    pub async fn from_url(&self, url: &str) -> Result<String, ExtractError> {
        tracing::debug!(url, "Fetching URL text");
        let response = self.http.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::UnexpectedStatus { status, body });
        }

        Ok(response.text().await?)
    }
}

impl Default for ExtractClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, Method::PUT, MockServer};
    use std::io::Write;

    #[tokio::test]
    async fn extracts_file_through_tika() {
        let server = MockServer::start_async().await;
        let client = ExtractClient::with_base_url(server.base_url());

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"%PDF-1.4 fake binary payload").expect("write");

        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/tika")
                    .header("accept", "text/plain")
                    .body("%PDF-1.4 fake binary payload");
                then.status(200).body("Extracted text.");
            })
            .await;

        let text = client.from_file(file.path()).await.expect("text");
        mock.assert();
        assert_eq!(text, "Extracted text.");
    }

    #[tokio::test]
    async fn surfaces_unsupported_format() {
        let server = MockServer::start_async().await;
        let client = ExtractClient::with_base_url(server.base_url());

        let file = tempfile::NamedTempFile::new().expect("temp file");
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/tika");
                then.status(422).body("Unsupported media type");
            })
            .await;

        let error = client.from_file(file.path()).await.expect_err("error");
        assert!(matches!(
            error,
            ExtractError::UnexpectedStatus { status, .. } if status.as_u16() == 422
        ));
    }

    #[tokio::test]
    async fn fetches_url_body() {
        let server = MockServer::start_async().await;
        let client = ExtractClient::with_base_url(server.base_url());

        server
            .mock_async(|when, then| {
                when.method(GET).path("/article");
                then.status(200).body("<html>hello</html>");
            })
            .await;

        let text = client
            .get_text(&format!("{}/article", server.base_url()), true)
            .await
            .expect("body");
        assert_eq!(text, "<html>hello</html>");
    }

    #[tokio::test]
    async fn missing_file_reports_io_error() {
        let server = MockServer::start_async().await;
        let client = ExtractClient::with_base_url(server.base_url());

        let error = client
            .get_text("/definitely/not/here.pdf", false)
            .await
            .expect_err("io error");
        assert!(matches!(error, ExtractError::Io { .. }));
    }
}
