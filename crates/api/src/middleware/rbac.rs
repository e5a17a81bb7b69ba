//! Role-based access control for sending.
//!
//! | Role             | Targets                  | Categories                       | Scope          |
//! |------------------|--------------------------|----------------------------------|----------------|
//! | `admin`          | any                      | any                              | any            |
//! | `town_admin`     | `TOWN`, `SEGMENT`        | all but `business_update`/`promotion` | own town  |
//! | `business_owner` | `BUSINESS_SUBSCRIBERS`   | `business_update`, `promotion`   | own business   |
//!
//! Any other role cannot send or estimate.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use beacon_core::category::NotificationCategory;
use beacon_core::error::CoreError;
use beacon_core::roles::{ROLE_ADMIN, ROLE_BUSINESS_OWNER, ROLE_TOWN_ADMIN};
use beacon_core::target::TargetType;
use beacon_core::types::DbId;
use beacon_engine::AudienceTarget;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Requires `admin`, `town_admin` or `business_owner`. Rejects with 403
/// Forbidden otherwise.
pub struct RequireSender(pub AuthUser);

impl FromRequestParts<AppState> for RequireSender {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if ![ROLE_ADMIN, ROLE_TOWN_ADMIN, ROLE_BUSINESS_OWNER].contains(&user.role.as_str()) {
            return Err(AppError::Core(CoreError::Forbidden(
                "Role cannot send notifications".into(),
            )));
        }
        Ok(RequireSender(user))
    }
}

fn forbidden(msg: &str) -> CoreError {
    CoreError::Forbidden(msg.to_string())
}

/// Check a send request against the sender's role.
///
/// `town_id` is the requested town, if any.
pub fn authorize_send(
    user: &AuthUser,
    category: NotificationCategory,
    target_type: TargetType,
    town_id: Option<DbId>,
) -> Result<(), CoreError> {
    match user.role.as_str() {
        ROLE_ADMIN => Ok(()),
        ROLE_TOWN_ADMIN => {
            if target_type == TargetType::BusinessSubscribers {
                return Err(forbidden("Town admins cannot target business subscribers"));
            }
            if category.is_business() {
                return Err(forbidden("Town admins cannot send business notification types"));
            }
            let own = user.town_id.ok_or_else(|| forbidden("Town admin has no town"))?;
            if town_id.is_some_and(|t| t != own) {
                return Err(forbidden("Town admins can only send to their own town"));
            }
            Ok(())
        }
        ROLE_BUSINESS_OWNER => {
            if target_type != TargetType::BusinessSubscribers {
                return Err(forbidden("Business owners can only target their subscribers"));
            }
            if !category.is_business() {
                return Err(forbidden("Business owners can only send business updates and promotions"));
            }
            if user.business_id.is_none() {
                return Err(forbidden("Business owner has no business"));
            }
            Ok(())
        }
        _ => Err(forbidden("Role cannot send notifications")),
    }
}

/// Check an audience estimate against the sender's role.
pub fn authorize_estimate(user: &AuthUser, target: &AudienceTarget) -> Result<(), CoreError> {
    match (user.role.as_str(), target) {
        (ROLE_ADMIN, _) => Ok(()),
        (ROLE_TOWN_ADMIN, AudienceTarget::Town { town_id } | AudienceTarget::Segment { town_id, .. })
            if user.town_id == Some(*town_id) =>
        {
            Ok(())
        }
        (ROLE_BUSINESS_OWNER, AudienceTarget::BusinessSubscribers { business_id })
            if user.business_id == Some(*business_id) =>
        {
            Ok(())
        }
        _ => Err(forbidden("Not allowed to estimate this audience")),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn user(role: &str, business_id: Option<DbId>, town_id: Option<DbId>) -> AuthUser {
        AuthUser {
            user_id: 1,
            role: role.into(),
            business_id,
            town_id,
        }
    }

    #[test]
    fn admin_may_send_anything() {
        let admin = user(ROLE_ADMIN, None, None);
        for category in NotificationCategory::ALL {
            for target in [TargetType::Town, TargetType::Segment, TargetType::BusinessSubscribers] {
                assert!(authorize_send(&admin, category, target, Some(9)).is_ok());
            }
        }
    }

    #[test]
    fn town_admin_limited_to_own_town_and_civic_types() {
        let admin = user(ROLE_TOWN_ADMIN, None, Some(3));
        assert!(authorize_send(&admin, NotificationCategory::WeatherAlert, TargetType::Town, None).is_ok());
        assert!(authorize_send(&admin, NotificationCategory::EmergencyAlert, TargetType::Segment, Some(3)).is_ok());
        assert_matches!(
            authorize_send(&admin, NotificationCategory::Event, TargetType::Town, Some(4)),
            Err(CoreError::Forbidden(_))
        );
        assert_matches!(
            authorize_send(&admin, NotificationCategory::Promotion, TargetType::Town, Some(3)),
            Err(CoreError::Forbidden(_))
        );
        assert_matches!(
            authorize_send(&admin, NotificationCategory::Event, TargetType::BusinessSubscribers, None),
            Err(CoreError::Forbidden(_))
        );
    }

    #[test]
    fn business_owner_limited_to_subscribers() {
        let owner = user(ROLE_BUSINESS_OWNER, Some(5), Some(3));
        assert!(authorize_send(&owner, NotificationCategory::Promotion, TargetType::BusinessSubscribers, None).is_ok());
        assert!(authorize_send(&owner, NotificationCategory::BusinessUpdate, TargetType::BusinessSubscribers, None).is_ok());
        assert_matches!(
            authorize_send(&owner, NotificationCategory::TownAlert, TargetType::BusinessSubscribers, None),
            Err(CoreError::Forbidden(_))
        );
        assert_matches!(
            authorize_send(&owner, NotificationCategory::Promotion, TargetType::Town, Some(3)),
            Err(CoreError::Forbidden(_))
        );
    }

    #[test]
    fn business_owner_without_business_is_rejected() {
        let owner = user(ROLE_BUSINESS_OWNER, None, None);
        assert!(authorize_send(&owner, NotificationCategory::Promotion, TargetType::BusinessSubscribers, None).is_err());
    }

    #[test]
    fn other_roles_cannot_send() {
        let resident = user("resident", None, Some(3));
        assert!(authorize_send(&resident, NotificationCategory::Event, TargetType::Town, Some(3)).is_err());
    }

    #[test]
    fn estimate_scoped_to_own_subject() {
        let owner = user(ROLE_BUSINESS_OWNER, Some(5), Some(3));
        assert!(authorize_estimate(&owner, &AudienceTarget::BusinessSubscribers { business_id: 5 }).is_ok());
        assert!(authorize_estimate(&owner, &AudienceTarget::BusinessSubscribers { business_id: 6 }).is_err());
        assert!(authorize_estimate(&owner, &AudienceTarget::Town { town_id: 3 }).is_err());

        let town_admin = user(ROLE_TOWN_ADMIN, None, Some(3));
        assert!(authorize_estimate(&town_admin, &AudienceTarget::Town { town_id: 3 }).is_ok());
        assert!(authorize_estimate(&town_admin, &AudienceTarget::Town { town_id: 4 }).is_err());
    }
}
