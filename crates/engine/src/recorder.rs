//! Persisting delivery outcomes.

use std::collections::HashMap;
use std::sync::Arc;

use beacon_core::status::NotificationStatus;
use beacon_core::types::DbId;
use beacon_db::models::notification::CreateDelivery;
use beacon_delivery::DeliveryResult;

use crate::audience::Endpoint;
use crate::error::{EngineError, PersistenceContext};
use crate::store::NotificationStore;

/// Failure reason stored when no provider call could be made.
pub const DISPATCH_NOT_RUN: &str = "dispatch could not run";

/// What the recorder did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    pub status: NotificationStatus,
    pub delivery_count: i32,
    pub recorded: u64,
    pub deactivated: usize,
}

#[derive(Clone)]
pub struct DeliveryRecorder {
    store: Arc<dyn NotificationStore>,
}

impl DeliveryRecorder {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    /// Record the tickets of a dispatched notification that is `sending`.
    ///
    /// Deactivation is best effort. The status update runs even when the
    /// delivery insert fails, so the row never stays `sending`; the insert
    /// error is still returned.
    pub async fn record(
        &self,
        notification_id: DbId,
        endpoints: &[Endpoint],
        result: &DeliveryResult,
    ) -> Result<RecordOutcome, EngineError> {
        let deactivated = self.deactivate_invalid(notification_id, result).await;

        let owners: HashMap<&str, DbId> = endpoints.iter().map(|e| (e.token.as_str(), e.owner_id)).collect();
        let rows: Vec<CreateDelivery> = result
            .tickets
            .iter()
            .filter_map(|ticket| {
                let Some(owner_id) = owners.get(ticket.token.as_str()) else {
                    tracing::warn!(notification_id, token = %ticket.token, "Ticket for unknown endpoint, not recorded");
                    return None;
                };
                Some(CreateDelivery {
                    owner_id: *owner_id,
                    device_token: ticket.token.clone(),
                    status: ticket.status.as_str().to_string(),
                    error: ticket.error.clone(),
                })
            })
            .collect();

        let inserted = self.store.insert_deliveries(notification_id, &rows).await;
        if let Err(e) = &inserted {
            tracing::error!(notification_id, error = %e, "Failed to persist delivery rows");
        }

        let delivery_count = i32::try_from(result.success).unwrap_or(i32::MAX);
        let status = if result.attempted() {
            self.store
                .mark_sent(notification_id, delivery_count)
                .await
                .for_notification(notification_id)?;
            NotificationStatus::Sent
        } else {
            self.store
                .mark_failed(notification_id, delivery_count, DISPATCH_NOT_RUN)
                .await
                .for_notification(notification_id)?;
            NotificationStatus::Failed
        };

        let recorded = inserted.for_notification(notification_id)?;
        tracing::info!(
            notification_id,
            status = status.as_str(),
            delivery_count,
            failed = result.failed,
            deactivated,
            "Recorded deliveries"
        );

        Ok(RecordOutcome {
            status,
            delivery_count,
            recorded,
            deactivated,
        })
    }

    async fn deactivate_invalid(&self, notification_id: DbId, result: &DeliveryResult) -> usize {
        let mut deactivated = 0;
        for ticket in result.tickets.iter().filter(|t| t.is_permanently_invalid()) {
            match self.store.deactivate_device(&ticket.token).await {
                Ok(true) => deactivated += 1,
                Ok(false) => {
                    tracing::warn!(notification_id, token = %ticket.token, "Cannot deactivate unknown device token");
                }
                Err(e) => {
                    tracing::warn!(notification_id, token = %ticket.token, error = %e, "Device deactivation failed");
                }
            }
        }
        deactivated
    }
}
