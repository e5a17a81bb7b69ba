//! The push provider abstraction.

use async_trait::async_trait;

use crate::message::PushMessage;
use crate::ticket::ProviderReceipt;

/// Error type for a whole-batch provider failure.
///
/// Per-message failures are not errors; they come back as error receipts.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("Push provider returned HTTP {0}")]
    HttpStatus(u16),

    /// The call did not finish within the per-chunk timeout.
    #[error("Push provider call timed out after {0} s")]
    Timeout(u64),
}

/// An external push-delivery service.
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Documented maximum number of messages per [`send_batch`](Self::send_batch) call.
    fn max_batch_size(&self) -> usize;

    /// Whether a token has the provider's token format.
    ///
    /// Tokens failing this check are never sent.
    fn is_valid_token(&self, token: &str) -> bool;

    /// Send one batch. On success returns one receipt per input message, in
    /// input order.
    async fn send_batch(&self, messages: &[PushMessage]) -> Result<Vec<ProviderReceipt>, PushError>;
}
