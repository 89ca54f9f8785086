use async_trait::async_trait;
use crate::error::TransportError;
use crate::wire::{ConsumeRequest, ConsumeResponse, UserInfoResponse};

mod http;
mod mock;

pub use http::HttpTransport;
pub use mock::MockTransport;

/// The single interface between the ledger and the credit backend.
///
/// # Contract
/// - Must be Send + Sync (shared behind `Arc<dyn CreditTransport>`)
/// - Returns `Ok` for any response body that decodes, including
///   `success: false` bodies; the ledger decides what those mean
/// - Returns `Err(TransportError)` for network failures, non-2xx statuses
///   and bodies that do not decode
/// - Never retries; retry policy belongs to the ledger's refresh cycle
#[async_trait]
pub trait CreditTransport: Send + Sync {
    /// Fetch user and credit info from the given endpoint path.
    async fn fetch_user_info(&self, path: &str) -> Result<UserInfoResponse, TransportError>;

    /// Ask the server to debit credits for one task.
    async fn consume(&self, request: &ConsumeRequest) -> Result<ConsumeResponse, TransportError>;
}
