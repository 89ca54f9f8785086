use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use async_trait::async_trait;
use crate::error::TransportError;
use crate::transport::CreditTransport;
use crate::wire::{ConsumeRequest, ConsumeResponse, UserInfoResponse};

/// A scripted transport for tests and offline demos.
///
/// Responses are programmed per user-info path and in one queue for
/// debits; each call pops the next one. An empty queue answers with a
/// network error. Every call is logged so tests can assert on counts.
#[derive(Default)]
pub struct MockTransport {
    user_info:     Mutex<HashMap<String, VecDeque<Result<UserInfoResponse, TransportError>>>>,
    consume:       Mutex<VecDeque<Result<ConsumeResponse, TransportError>>>,
    user_info_log: Mutex<Vec<String>>,
    consume_log:   Mutex<Vec<ConsumeRequest>>,
    consume_delay: Mutex<Option<Duration>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_info(
        self,
        path:     impl Into<String>,
        response: Result<UserInfoResponse, TransportError>,
    ) -> Self {
        self.push_user_info(path, response);
        self
    }

    pub fn with_consume(self, response: Result<ConsumeResponse, TransportError>) -> Self {
        self.push_consume(response);
        self
    }

    /// Every debit sleeps this long before answering.
    pub fn with_consume_delay(self, delay: Duration) -> Self {
        *lock(&self.consume_delay) = Some(delay);
        self
    }

    pub fn push_user_info(
        &self,
        path:     impl Into<String>,
        response: Result<UserInfoResponse, TransportError>,
    ) {
        lock(&self.user_info)
            .entry(path.into())
            .or_default()
            .push_back(response);
    }

    pub fn push_consume(&self, response: Result<ConsumeResponse, TransportError>) {
        lock(&self.consume).push_back(response);
    }

    /// Number of times fetch_user_info() was invoked, across all paths
    pub fn user_info_calls(&self) -> usize {
        lock(&self.user_info_log).len()
    }

    /// Paths passed to fetch_user_info(), in call order
    pub fn user_info_paths(&self) -> Vec<String> {
        lock(&self.user_info_log).clone()
    }

    /// Number of times consume() was invoked
    pub fn consume_calls(&self) -> usize {
        lock(&self.consume_log).len()
    }

    pub fn consume_requests(&self) -> Vec<ConsumeRequest> {
        lock(&self.consume_log).clone()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl CreditTransport for MockTransport {
    async fn fetch_user_info(&self, path: &str) -> Result<UserInfoResponse, TransportError> {
        lock(&self.user_info_log).push(path.to_string());

        lock(&self.user_info)
            .get_mut(path)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| Err(TransportError::Network(format!(
                "MockTransport: no programmed response for {}", path
            ))))
    }

    async fn consume(&self, request: &ConsumeRequest) -> Result<ConsumeResponse, TransportError> {
        lock(&self.consume_log).push(request.clone());

        let delay = *lock(&self.consume_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        lock(&self.consume)
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network(
                "MockTransport: no more programmed debit responses".to_string()
            )))
    }
}
