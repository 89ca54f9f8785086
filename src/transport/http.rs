use async_trait::async_trait;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, TransportError};
use crate::transport::CreditTransport;
use crate::wire::{ConsumeRequest, ConsumeResponse, UserInfoResponse};

const USER_AGENT: &str = concat!("credit-ledger-rs/", env!("CARGO_PKG_VERSION"));

/// reqwest-backed transport for the platform's credit endpoints.
pub struct HttpTransport {
    client:       reqwest::Client,
    base_url:     String,
    consume_path: String,
    auth_token:   Option<String>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, LedgerError> {
        let config = LedgerConfig {
            base_url: Some(base_url.into()),
            ..Default::default()
        };
        Self::from_config(&config)
    }

    pub fn from_config(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let base_url = config.base_url.clone()
            .ok_or_else(|| LedgerError::BuildError("base_url is required for HttpTransport".to_string()))?;

        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()
            .map_err(|e| LedgerError::BuildError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url:     base_url.trim_end_matches('/').to_string(),
            consume_path: config.consume_path.clone(),
            auth_token:   config.auth_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None        => request,
        }
    }

    /// Reads the body, mapping non-2xx statuses to `TransportError::Status`
    /// with the server's `error` field when it sent one.
    async fn read_body<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, TransportError> {
        let status = response.status();
        let body = response.text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or(body);
            return Err(TransportError::Status { status: status.as_u16(), message });
        }

        serde_json::from_str(&body)
            .map_err(|e| TransportError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl CreditTransport for HttpTransport {
    async fn fetch_user_info(&self, path: &str) -> Result<UserInfoResponse, TransportError> {
        let url = self.url(path);
        tracing::debug!(url = %url, "fetching user info");

        let response = self.authorize(self.client.get(&url))
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Self::read_body(response).await
    }

    async fn consume(&self, request: &ConsumeRequest) -> Result<ConsumeResponse, TransportError> {
        let url = self.url(&self.consume_path);
        tracing::debug!(url = %url, task_type = %request.task_type, "posting credit debit");

        let response = self.authorize(self.client.post(&url))
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Self::read_body(response).await
    }
}
