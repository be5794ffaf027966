use std::pin::Pin;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::Stream;
use futures::TryStreamExt;

use crate::sentiment_parser;

/// Decoded-but-unframed chunks of a streaming response body.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

const ANALYZE_TIMEOUT: Duration = Duration::from_secs(30);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of one text analysis request.
///
/// Immutable; the next request's result supersedes it wholesale. `score`
/// and `error` are mutually exclusive: a delivered body with no parseable
/// score is not an error, the raw text is simply shown instead.
#[derive(Debug, Clone, Default)]
pub struct TextAnalysisResult {
    /// Exact response body text (empty when the request itself failed).
    pub raw: String,
    /// Parsed sentiment score in [0, 5], when the body carried one.
    pub score: Option<f64>,
    /// Transport failure description; never set alongside a delivered body.
    pub error: Option<String>,
}

impl TextAnalysisResult {
    pub fn from_body(raw: String) -> Self {
        let score = sentiment_parser::parse_score(&raw);
        Self {
            raw,
            score,
            error: None,
        }
    }

    pub fn from_error(err: impl ToString) -> Self {
        Self {
            raw: String::new(),
            score: None,
            error: Some(err.to_string()),
        }
    }
}

/// The sentiment backend, as the dashboard sees it.
///
/// `analyze` invocations are independent of each other and of any open
/// stream; the client does not serialize them. The UI keeps one request in
/// flight at a time by disabling its trigger; that is a caller obligation,
/// not a guarantee of this trait.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Single-shot sentiment analysis of `text`.
    async fn analyze(&self, text: &str) -> TextAnalysisResult;

    /// Open the live sentiment stream for `keyword` over `time_window_secs`.
    async fn open_sentiment_stream(
        &self,
        keyword: &str,
        time_window_secs: u64,
    ) -> Result<ChunkStream>;

    /// Best-effort signal that the most recent stream was abandoned.
    /// Failure is the caller's to absorb, never to escalate.
    async fn notify_stop(&self) -> Result<()>;
}

/// HTTP implementation of [`Backend`].
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn analyze(&self, text: &str) -> TextAnalysisResult {
        let url = format!(
            "{}/hello?text={}",
            self.base_url,
            urlencoding::encode(text)
        );
        let response = match self.client.get(&url).timeout(ANALYZE_TIMEOUT).send().await {
            Ok(response) => response,
            Err(err) => return TextAnalysisResult::from_error(err),
        };
        // The body is shown verbatim when it carries no score, so a non-2xx
        // page is handled by that fallback rather than failing here.
        match response.text().await {
            Ok(body) => TextAnalysisResult::from_body(body),
            Err(err) => TextAnalysisResult::from_error(err),
        }
    }

    async fn open_sentiment_stream(
        &self,
        keyword: &str,
        time_window_secs: u64,
    ) -> Result<ChunkStream> {
        let url = format!(
            "{}/sentiment?text={}&timeWindowSec={}",
            self.base_url,
            urlencoding::encode(keyword),
            time_window_secs
        );
        // No request timeout: the body stays open for the whole window.
        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(Box::pin(response.bytes_stream().map_err(anyhow::Error::from)))
    }

    async fn notify_stop(&self) -> Result<()> {
        let url = format!("{}/stopNews", self.base_url);
        self.client.get(&url).timeout(STOP_TIMEOUT).send().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_from_body_with_score() {
        let result = TextAnalysisResult::from_body("Score is:4.2 (positive)".to_string());
        assert_eq!(result.score, Some(4.2));
        assert_eq!(result.raw, "Score is:4.2 (positive)");
        assert!(result.error.is_none());
    }

    #[test]
    fn test_result_from_body_without_score_keeps_raw() {
        let result = TextAnalysisResult::from_body("No dice".to_string());
        assert_eq!(result.score, None);
        assert_eq!(result.raw, "No dice");
        assert!(result.error.is_none());
    }

    #[test]
    fn test_result_from_error() {
        let result = TextAnalysisResult::from_error("connection refused");
        assert_eq!(result.score, None);
        assert!(result.raw.is_empty());
        assert_eq!(result.error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let backend = HttpBackend::new("http://localhost:8080/");
        assert_eq!(backend.base_url, "http://localhost:8080");
    }
}
