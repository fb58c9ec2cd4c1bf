//! HTTP client abstraction for testability

use std::time::Duration;

use async_trait::async_trait;

use crate::model::Credentials;

/// A GET request against the Jenkins server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub credentials: Option<Credentials>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            credentials: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }
}

/// HTTP response from a request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Abstraction over HTTP client for dependency injection
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait HttpClient: Send + Sync {
    /// Send a GET request. Transport failures are reported as `Unreachable`.
    async fn get(&self, request: &HttpRequest) -> crate::Result<HttpResponse>;
}

/// Production HTTP client using reqwest
#[derive(Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn with_timeout(timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| crate::MonitorError::Config(format!("Building HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, request: &HttpRequest) -> crate::Result<HttpResponse> {
        tracing::debug!("GET {}", request.url);
        let mut builder = self.client.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(credentials) = &request.credentials {
            builder = builder.basic_auth(&credentials.username, Some(&credentials.api_token));
        }

        let response = builder.send().await.map_err(|e| {
            crate::MonitorError::Unreachable(format!("GET {} failed: {}", request.url, e))
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            crate::MonitorError::Unreachable(format!("Reading response body: {}", e))
        })?;

        tracing::debug!("GET {} -> {} ({} bytes)", request.url, status, body.len());
        Ok(HttpResponse { status, body })
    }
}
