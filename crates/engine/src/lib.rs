//! Notification targeting, quota and delivery orchestration.
//!
//! The engine is storage-agnostic: everything it reads or writes goes
//! through [`NotificationStore`]. [`PgStore`] backs it with the `beacon-db`
//! repositories; the in-memory store (feature `test-support`) backs tests.

pub mod audience;
pub mod engine;
pub mod error;
pub mod quota;
pub mod recorder;
pub mod store;

pub use audience::{Audience, AudienceBreakdown, AudienceFilter, AudienceResolver, AudienceTarget, Endpoint};
pub use engine::{Estimate, EstimateRequest, NotificationEngine, SendOutcome, SendRequest, SenderContext};
pub use error::EngineError;
pub use quota::QuotaTracker;
pub use recorder::{DeliveryRecorder, RecordOutcome};
pub use store::postgres::PgStore;
pub use store::{NotificationStore, StoreError, StoreResult};
