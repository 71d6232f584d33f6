use async_trait::async_trait;
use std::time::Duration;
use tokio::time::timeout;

use crate::backoff::RetryPolicy;
use crate::config::Config;
use crate::fetcher::{FetchedPage, PageFetcher};

/// HTTP client for fetching review pages
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout_duration: Duration,
    user_agent: String,
    max_content_size: usize,
    retry: RetryPolicy,
}

impl HttpClient {
    /// Create a new HTTP client with default content limit
    pub fn new(user_agent: String, timeout: Duration, retry: RetryPolicy) -> Result<Self, FetchError> {
        Self::with_content_limit(user_agent, timeout, retry, Config::MAX_CONTENT_SIZE)
    }

    /// Create a new HTTP client with custom content size limit
    pub fn with_content_limit(
        user_agent: String,
        timeout: Duration,
        retry: RetryPolicy,
        max_content_size: usize,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(&user_agent)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(Config::CONNECT_TIMEOUT_SECS))
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_nodelay(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_duration: timeout,
            user_agent,
            max_content_size,
            retry,
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Fetch a URL once (the retry loop lives in the `PageFetcher` impl)
    async fn fetch_once(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = timeout(
            self.timeout_duration,
            self.client
                .get(url)
                .header(
                    "Accept",
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                )
                .header("Accept-Language", "en-US,en;q=0.5")
                .header("Connection", "keep-alive")
                .header("Upgrade-Insecure-Requests", "1")
                .send(),
        )
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(Self::classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        if let Some(content_type) = response
            .headers()
            .get("content-type")
            .and_then(|h| h.to_str().ok())
        {
            let ct = content_type.to_ascii_lowercase();
            if !(ct.contains("text/html") || ct.contains("application/xhtml")) {
                return Err(FetchError::UnsupportedContent(content_type.to_string()));
            }
        }

        if let Some(length) = response.content_length() {
            if length as usize > self.max_content_size {
                return Err(FetchError::ContentTooLarge(length as usize, self.max_content_size));
            }
        }

        let content = timeout(self.timeout_duration, response.text())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(|e| FetchError::BodyError(e.to_string()))?;

        if content.len() > self.max_content_size {
            return Err(FetchError::ContentTooLarge(
                content.len(),
                self.max_content_size,
            ));
        }

        Ok(FetchedPage {
            content,
            status_code: status.as_u16(),
        })
    }

    /// Classify reqwest errors into our FetchError types
    fn classify_error(error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            return FetchError::Timeout;
        }

        let error_msg = error.to_string().to_lowercase();

        if error_msg.contains("connection refused") {
            return FetchError::ConnectionRefused;
        }

        if error_msg.contains("dns") || error_msg.contains("name resolution") {
            return FetchError::DnsError;
        }

        if error_msg.contains("ssl") || error_msg.contains("tls") || error_msg.contains("certificate") {
            return FetchError::SslError;
        }

        FetchError::NetworkError(error.to_string())
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        tracing::debug!(url, "Fetching page");
        let result = self
            .retry
            .run(|_| self.fetch_once(url), FetchError::is_retryable)
            .await;
        if let Err(e) = &result {
            tracing::warn!(url, error = %e, "Fetch failed");
        }
        result
    }
}

/// Errors that can occur during HTTP fetching
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Connection refused - server not accepting connections")]
    ConnectionRefused,

    #[error("DNS resolution failed")]
    DnsError,

    #[error("SSL/TLS error - certificate or encryption issue")]
    SslError,

    #[error("Request timeout")]
    Timeout,

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Unsupported content type: {0}")]
    UnsupportedContent(String),

    #[error("Failed to read response body: {0}")]
    BodyError(String),

    #[error("Content too large: {0} bytes (max: {1} bytes)")]
    ContentTooLarge(usize, usize),
}

impl FetchError {
    /// Check if this error is retryable (transient) or permanent
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout => true,
            FetchError::NetworkError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout")
                    || msg_lower.contains("broken pipe")
                    || msg_lower.contains("connection reset")
                    || msg_lower.contains("temporary")
            }
            // Throttling and server-side hiccups are worth another try
            FetchError::Status(code) => *code == 429 || (500..600).contains(code),
            FetchError::ConnectionRefused => false,
            FetchError::DnsError => false,
            FetchError::SslError => false,
            FetchError::UnsupportedContent(_) => false,
            FetchError::BodyError(_) => false,
            FetchError::ContentTooLarge(_, _) => false,
        }
    }
}
