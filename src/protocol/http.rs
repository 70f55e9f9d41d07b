use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::{Error, Result};

/// A fully received HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// The two calls smart HTTP needs. Implementations must only suspend the
/// calling task while waiting on the network.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse>;

    async fn post(&self, url: &str, content_type: &str, body: Vec<u8>) -> Result<HttpResponse>;
}

/// HTTP client for smart-HTTP Git servers
pub struct ReqwestClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestClient {
    pub fn new(config: &Config) -> Result<Self> {
        let timeout = config.http_timeout();
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(timeout)
            .build()
            .map_err(|e| Error::transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }

    fn map_err(&self, url: &str, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::transport(format!("{} timed out after {:?}", url, self.timeout))
        } else if e.is_connect() {
            Error::transport(format!("failed to connect to {}: {}", url, e))
        } else {
            Error::transport(format!("request to {} failed: {}", url, e))
        }
    }

    async fn collect(&self, url: &str, mut response: reqwest::Response) -> Result<HttpResponse> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.map_err(url, e))?
        {
            body.extend_from_slice(&chunk);
        }
        tracing::debug!("{} -> HTTP {} ({} bytes)", url, status, body.len());

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_err(url, e))?;
        self.collect(url, response).await
    }

    async fn post(&self, url: &str, content_type: &str, body: Vec<u8>) -> Result<HttpResponse> {
        tracing::debug!("POST {} ({} bytes)", url, body.len());
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::ACCEPT, "application/x-git-upload-pack-result")
            .body(body)
            .send()
            .await
            .map_err(|e| self.map_err(url, e))?;
        self.collect(url, response).await
    }
}
