//! A scripted in-process [`PushProvider`] for tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::message::PushMessage;
use crate::provider::{PushError, PushProvider};
use crate::ticket::{ProviderReceipt, DEVICE_NOT_REGISTERED};

/// Records every call and answers from a fixed script.
///
/// - tokens registered with [`with_unregistered`](Self::with_unregistered)
///   get a `DeviceNotRegistered` receipt;
/// - a chunk containing a token registered with
///   [`with_transport_failure_for`](Self::with_transport_failure_for) fails
///   as a whole with HTTP 503;
/// - everything else is `ok`.
///
/// A token is well-formed when it is non-empty and has no whitespace.
pub struct ScriptedProvider {
    batch_size: usize,
    delay: Option<Duration>,
    receipt_limit: Option<usize>,
    unregistered: HashSet<String>,
    failing: HashSet<String>,
    calls: Mutex<Vec<Vec<String>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            delay: None,
            receipt_limit: None,
            unregistered: HashSet::new(),
            failing: HashSet::new(),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_unregistered(mut self, token: &str) -> Self {
        self.unregistered.insert(token.to_string());
        self
    }

    pub fn with_transport_failure_for(mut self, token: &str) -> Self {
        self.failing.insert(token.to_string());
        self
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Return at most `n` receipts per call.
    pub fn with_receipt_limit(mut self, n: usize) -> Self {
        self.receipt_limit = Some(n);
        self
    }

    /// Tokens of every call made so far, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Highest number of concurrent calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushProvider for ScriptedProvider {
    fn max_batch_size(&self) -> usize {
        self.batch_size
    }

    fn is_valid_token(&self, token: &str) -> bool {
        !token.is_empty() && !token.contains(char::is_whitespace)
    }

    async fn send_batch(&self, messages: &[PushMessage]) -> Result<Vec<ProviderReceipt>, PushError> {
        let tokens: Vec<String> = messages.iter().map(|m| m.to.clone()).collect();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(tokens.clone());
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if tokens.iter().any(|t| self.failing.contains(t)) {
            return Err(PushError::HttpStatus(503));
        }

        let mut receipts: Vec<ProviderReceipt> = tokens
            .iter()
            .map(|t| {
                if self.unregistered.contains(t) {
                    ProviderReceipt::error(DEVICE_NOT_REGISTERED, "device not registered")
                } else {
                    ProviderReceipt::ok()
                }
            })
            .collect();
        if let Some(limit) = self.receipt_limit {
            receipts.truncate(limit);
        }
        Ok(receipts)
    }
}
