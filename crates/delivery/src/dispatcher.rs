//! Chunked, bounded-concurrency push dispatch.
//!
//! [`Dispatcher::dispatch`] never fails as a whole: every requested token
//! comes back as exactly one [`PushTicket`], synthesized locally when the
//! token was never sent or its chunk failed.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::Instant;

use crate::message::{PushContent, PushMessage};
use crate::provider::{PushError, PushProvider};
use crate::ticket::{FailureKind, ProviderReceipt, PushTicket};

/// Default number of chunks in flight at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Default per-chunk provider timeout.
pub const DEFAULT_CHUNK_TIMEOUT: Duration = Duration::from_secs(30);

const DEADLINE_ELAPSED: &str = "dispatch deadline elapsed";

// ---------------------------------------------------------------------------
// Config / result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Worker pool size for chunk sends.
    pub max_concurrency: usize,
    /// Upper bound on a single provider call.
    pub chunk_timeout: Duration,
    /// Chunks not started within this long after dispatch begins are
    /// skipped. `None` means no deadline.
    pub deadline: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            chunk_timeout: DEFAULT_CHUNK_TIMEOUT,
            deadline: None,
        }
    }
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Default)]
pub struct DeliveryResult {
    pub success: usize,
    /// `requested - success`.
    pub failed: usize,
    /// One per requested token, in no particular order.
    pub tickets: Vec<PushTicket>,
    /// Number of provider calls actually made.
    pub provider_calls: usize,
}

impl DeliveryResult {
    /// Whether at least one provider call was made.
    pub fn attempted(&self) -> bool {
        self.provider_calls > 0
    }
}

struct ChunkOutcome {
    called: bool,
    tickets: Vec<PushTicket>,
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Dispatcher {
    provider: Arc<dyn PushProvider>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(provider: Arc<dyn PushProvider>, config: DispatchConfig) -> Self {
        Self { provider, config }
    }

    /// Send `content` to every token.
    pub async fn dispatch(&self, content: &PushContent, tokens: &[String]) -> DeliveryResult {
        let deadline = self.config.deadline.map(|d| Instant::now() + d);

        let mut tickets = Vec::with_capacity(tokens.len());
        let mut valid = Vec::with_capacity(tokens.len());
        for token in tokens {
            if self.provider.is_valid_token(token) {
                valid.push(token.clone());
            } else {
                tickets.push(PushTicket::failed(
                    token.clone(),
                    FailureKind::InvalidFormat,
                    "invalid push token format",
                ));
            }
        }
        if !tickets.is_empty() {
            tracing::info!(invalid = tickets.len(), "Skipping push tokens with invalid format");
        }

        let batch_size = self.provider.max_batch_size().max(1);
        let chunks: Vec<Vec<String>> = valid.chunks(batch_size).map(<[String]>::to_vec).collect();
        let chunk_count = chunks.len();

        let outcomes: Vec<ChunkOutcome> = stream::iter(chunks.into_iter().enumerate())
            .map(|(index, chunk)| self.send_chunk(index, chunk, content, deadline))
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut provider_calls = 0;
        for outcome in outcomes {
            if outcome.called {
                provider_calls += 1;
            }
            tickets.extend(outcome.tickets);
        }

        let success = tickets.iter().filter(|t| t.is_ok()).count();
        tracing::debug!(
            requested = tokens.len(),
            chunks = chunk_count,
            provider_calls,
            success,
            "Dispatch finished"
        );

        DeliveryResult {
            success,
            failed: tokens.len().saturating_sub(success),
            tickets,
            provider_calls,
        }
    }

    async fn send_chunk(
        &self,
        index: usize,
        tokens: Vec<String>,
        content: &PushContent,
        deadline: Option<Instant>,
    ) -> ChunkOutcome {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            tracing::warn!(chunk = index, chunk_size = tokens.len(), "Dispatch deadline elapsed before chunk start");
            return ChunkOutcome {
                called: false,
                tickets: synthesize(tokens, DEADLINE_ELAPSED),
            };
        }

        let messages: Vec<PushMessage> = tokens.iter().map(|t| PushMessage::new(t, content)).collect();
        let result = match tokio::time::timeout(self.config.chunk_timeout, self.provider.send_batch(&messages)).await {
            Ok(result) => result,
            Err(_) => Err(PushError::Timeout(self.config.chunk_timeout.as_secs())),
        };

        let tickets = match result {
            Ok(receipts) => correlate(index, tokens, receipts),
            Err(e) => {
                tracing::warn!(chunk = index, chunk_size = tokens.len(), error = %e, "Push chunk failed");
                synthesize(tokens, &format!("transport error: {e}"))
            }
        };

        ChunkOutcome {
            called: true,
            tickets,
        }
    }
}

/// Pair receipts with tokens by position. Missing receipts become errors;
/// surplus receipts are dropped.
fn correlate(index: usize, tokens: Vec<String>, receipts: Vec<ProviderReceipt>) -> Vec<PushTicket> {
    if receipts.len() != tokens.len() {
        tracing::warn!(
            chunk = index,
            chunk_size = tokens.len(),
            receipts = receipts.len(),
            "Provider receipt count does not match chunk size"
        );
    }

    let mut receipts = receipts.into_iter();
    tokens
        .into_iter()
        .map(|token| match receipts.next() {
            Some(receipt) => receipt.into_ticket(token),
            None => PushTicket::failed(token, FailureKind::Provider, "provider returned no receipt"),
        })
        .collect()
}

fn synthesize(tokens: Vec<String>, message: &str) -> Vec<PushTicket> {
    tokens
        .into_iter()
        .map(|token| PushTicket::failed(token, FailureKind::Transport, message))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::testing::ScriptedProvider;

    fn content() -> PushContent {
        PushContent {
            title: "Parade".into(),
            body: "Starts at noon".into(),
            data: serde_json::json!({}),
        }
    }

    fn tokens(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("tok-{i}")).collect()
    }

    fn dispatcher(provider: &Arc<ScriptedProvider>, config: DispatchConfig) -> Dispatcher {
        Dispatcher::new(provider.clone(), config)
    }

    fn ticket_counts(result: &DeliveryResult) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for t in &result.tickets {
            *counts.entry(t.token.clone()).or_insert(0) += 1;
        }
        counts
    }

    #[tokio::test]
    async fn chunks_by_provider_batch_size() {
        for (m, b) in [(0, 3), (1, 3), (3, 3), (7, 3), (250, 100), (100, 100)] {
            let provider = Arc::new(ScriptedProvider::new(b));
            let result = dispatcher(&provider, DispatchConfig::default())
                .dispatch(&content(), &tokens(m))
                .await;

            let calls = provider.calls();
            assert_eq!(calls.len(), m.div_ceil(b), "M={m} B={b}");
            assert!(calls.iter().all(|c| c.len() <= b));
            assert_eq!(result.provider_calls, calls.len());
            assert_eq!(result.success, m);
            assert_eq!(result.failed, 0);
        }
    }

    #[tokio::test]
    async fn every_token_gets_exactly_one_ticket() {
        let all = tokens(23);
        let provider = Arc::new(
            ScriptedProvider::new(5)
                .with_transport_failure_for("tok-7")
                .with_unregistered("tok-20"),
        );
        let mut input = all.clone();
        input.push("not a token".into());

        let result = dispatcher(&provider, DispatchConfig::default())
            .dispatch(&content(), &input)
            .await;

        let counts = ticket_counts(&result);
        assert_eq!(counts.len(), input.len());
        assert!(counts.values().all(|&c| c == 1));
        assert_eq!(result.tickets.len(), input.len());

        // tok-5..tok-9 share a chunk with tok-7; tok-20 and the malformed one fail alone.
        assert_eq!(result.success, 23 - 5 - 1);
        assert_eq!(result.failed, input.len() - result.success);
    }

    #[tokio::test]
    async fn transport_failure_synthesizes_error_per_token() {
        let provider = Arc::new(ScriptedProvider::new(10).with_transport_failure_for("tok-0"));
        let result = dispatcher(&provider, DispatchConfig::default())
            .dispatch(&content(), &tokens(4))
            .await;

        assert!(result.attempted());
        assert_eq!(result.success, 0);
        assert_eq!(result.failed, 4);
        for t in &result.tickets {
            assert_eq!(t.failure, Some(FailureKind::Transport));
            assert!(t.error.as_deref().unwrap().starts_with("transport error"));
            assert!(!t.is_permanently_invalid());
        }
    }

    #[tokio::test]
    async fn invalid_format_never_reaches_provider() {
        let provider = Arc::new(ScriptedProvider::new(10));
        let input = vec!["".to_string(), "has space".to_string()];
        let result = dispatcher(&provider, DispatchConfig::default())
            .dispatch(&content(), &input)
            .await;

        assert!(provider.calls().is_empty());
        assert!(!result.attempted());
        assert_eq!(result.failed, 2);
        assert!(result.tickets.iter().all(|t| t.failure == Some(FailureKind::InvalidFormat)));
        assert!(result.tickets.iter().all(PushTicket::is_permanently_invalid));
    }

    #[tokio::test]
    async fn missing_receipts_become_errors() {
        let provider = Arc::new(ScriptedProvider::new(10).with_receipt_limit(2));
        let result = dispatcher(&provider, DispatchConfig::default())
            .dispatch(&content(), &tokens(5))
            .await;

        assert_eq!(result.tickets.len(), 5);
        assert_eq!(result.success, 2);
        assert_eq!(
            result
                .tickets
                .iter()
                .filter(|t| t.error.as_deref() == Some("provider returned no receipt"))
                .count(),
            3
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_chunk_times_out_as_transport_failure() {
        let provider = Arc::new(ScriptedProvider::new(10).with_delay(Duration::from_secs(60)));
        let config = DispatchConfig {
            chunk_timeout: Duration::from_secs(5),
            ..DispatchConfig::default()
        };
        let result = dispatcher(&provider, config).dispatch(&content(), &tokens(3)).await;

        assert_eq!(result.provider_calls, 1);
        assert_eq!(result.success, 0);
        assert!(result
            .tickets
            .iter()
            .all(|t| t.error.as_deref() == Some("transport error: Push provider call timed out after 5 s")));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_skips_chunks_not_yet_started() {
        let provider = Arc::new(ScriptedProvider::new(1).with_delay(Duration::from_secs(10)));
        let config = DispatchConfig {
            max_concurrency: 1,
            chunk_timeout: Duration::from_secs(60),
            deadline: Some(Duration::from_secs(15)),
        };
        let result = dispatcher(&provider, config).dispatch(&content(), &tokens(4)).await;

        // Chunks start at t=0 and t=10; the rest would start after t=15.
        assert_eq!(provider.calls().len(), 2);
        assert_eq!(result.provider_calls, 2);
        assert_eq!(result.success, 2);
        assert_eq!(result.tickets.len(), 4);
        assert_eq!(
            result
                .tickets
                .iter()
                .filter(|t| t.error.as_deref() == Some(DEADLINE_ELAPSED))
                .count(),
            2
        );
    }

    #[tokio::test(start_paused = true)]
    async fn chunks_run_concurrently_up_to_pool_size() {
        let provider = Arc::new(ScriptedProvider::new(1).with_delay(Duration::from_secs(10)));
        let config = DispatchConfig {
            max_concurrency: 4,
            chunk_timeout: Duration::from_secs(60),
            deadline: None,
        };
        let started = Instant::now();
        let result = dispatcher(&provider, config).dispatch(&content(), &tokens(8)).await;

        assert_eq!(result.success, 8);
        // Two waves of four.
        assert_eq!(started.elapsed(), Duration::from_secs(20));
        assert_eq!(provider.max_in_flight(), 4);
    }

    #[tokio::test]
    async fn duplicate_tokens_are_not_deduplicated() {
        let provider = Arc::new(ScriptedProvider::new(10));
        let input = vec!["tok-a".to_string(), "tok-a".to_string()];
        let result = dispatcher(&provider, DispatchConfig::default())
            .dispatch(&content(), &input)
            .await;
        assert_eq!(result.tickets.len(), 2);
        assert_eq!(result.success, 2);
    }
}
