//! Push delivery for Beacon notifications.
//!
//! - [`PushProvider`]: the seam to an external push service, one call per
//!   batch of messages.
//! - [`ExpoPushProvider`]: HTTP implementation against the Expo push API.
//! - [`Dispatcher`]: format-validates tokens, chunks them to the provider's
//!   batch size, sends chunks over a bounded worker pool and returns exactly
//!   one [`PushTicket`] per requested token.

pub mod dispatcher;
pub mod expo;
pub mod message;
pub mod provider;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod ticket;

pub use dispatcher::{DeliveryResult, DispatchConfig, Dispatcher};
pub use expo::{ExpoConfig, ExpoPushProvider};
pub use message::{PushContent, PushMessage};
pub use provider::{PushError, PushProvider};
pub use ticket::{FailureKind, ProviderReceipt, PushTicket};
