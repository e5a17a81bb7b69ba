//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods
//! that accept `&PgPool` as the first argument.

pub mod business_repo;
pub mod device_token_repo;
pub mod notification_delivery_repo;
pub mod notification_repo;
pub mod profile_repo;
pub mod quota_repo;
pub mod subscription_repo;
pub mod town_repo;

pub use business_repo::BusinessRepo;
pub use device_token_repo::DeviceTokenRepo;
pub use notification_delivery_repo::NotificationDeliveryRepo;
pub use notification_repo::NotificationRepo;
pub use profile_repo::ProfileRepo;
pub use quota_repo::QuotaRepo;
pub use subscription_repo::SubscriptionRepo;
pub use town_repo::TownRepo;
