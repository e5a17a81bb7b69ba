//! Notification category tags and their mapping onto preference flags.
//!
//! The mapping from a category tag to the preference flag a recipient must
//! have enabled is an explicit table. Business-scoped tags resolve through the
//! sending business's [`BusinessType`]; a business label that is not in the
//! table has no business type and therefore no flag to check.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// NotificationCategory
// ---------------------------------------------------------------------------

/// The declared category (`type`) of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    TownAlert,
    WeatherAlert,
    Event,
    EmergencyAlert,
    BusinessUpdate,
    Promotion,
}

impl NotificationCategory {
    pub const ALL: [NotificationCategory; 6] = [
        Self::TownAlert,
        Self::WeatherAlert,
        Self::Event,
        Self::EmergencyAlert,
        Self::BusinessUpdate,
        Self::Promotion,
    ];

    /// Stable string form stored in `notifications.category`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TownAlert => "town_alert",
            Self::WeatherAlert => "weather_alert",
            Self::Event => "event",
            Self::EmergencyAlert => "emergency_alert",
            Self::BusinessUpdate => "business_update",
            Self::Promotion => "promotion",
        }
    }

    /// Whether the category is sent on behalf of a business.
    pub fn is_business(self) -> bool {
        matches!(self, Self::BusinessUpdate | Self::Promotion)
    }

    /// Emergency alerts are never counted against a monthly quota.
    pub fn requires_quota(self) -> bool {
        self != Self::EmergencyAlert
    }

    /// Quiet hours suppress every category except emergency alerts.
    pub fn bypasses_quiet_hours(self) -> bool {
        self == Self::EmergencyAlert
    }

    /// The preference flag a recipient must have enabled for this category.
    ///
    /// `business_type` is the sending business's type, if it has one. Returns
    /// `None` when no per-category flag applies.
    pub fn preference_flag(self, business_type: Option<BusinessType>) -> Option<PreferenceFlag> {
        match self {
            Self::TownAlert => Some(PreferenceFlag::TownAlerts),
            Self::WeatherAlert => Some(PreferenceFlag::WeatherAlerts),
            Self::Event => Some(PreferenceFlag::Events),
            Self::EmergencyAlert => Some(PreferenceFlag::EmergencyAlerts),
            Self::BusinessUpdate | Self::Promotion => business_type.map(PreferenceFlag::Business),
        }
    }
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown notification type '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// BusinessType
// ---------------------------------------------------------------------------

/// Business types a recipient can opt in or out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessType {
    Lodging,
    Restaurant,
    Attraction,
    Service,
}

/// Free-text business labels and the business type each maps to.
///
/// Labels are compared after [`normalize_label`].
const BUSINESS_TYPE_LABELS: &[(&str, BusinessType)] = &[
    ("lodging", BusinessType::Lodging),
    ("hotel", BusinessType::Lodging),
    ("motel", BusinessType::Lodging),
    ("inn", BusinessType::Lodging),
    ("bed_and_breakfast", BusinessType::Lodging),
    ("campground", BusinessType::Lodging),
    ("restaurant", BusinessType::Restaurant),
    ("cafe", BusinessType::Restaurant),
    ("bar", BusinessType::Restaurant),
    ("bakery", BusinessType::Restaurant),
    ("food", BusinessType::Restaurant),
    ("attraction", BusinessType::Attraction),
    ("museum", BusinessType::Attraction),
    ("park", BusinessType::Attraction),
    ("tour", BusinessType::Attraction),
    ("gallery", BusinessType::Attraction),
    ("service", BusinessType::Service),
    ("shop", BusinessType::Service),
    ("retail", BusinessType::Service),
    ("repair", BusinessType::Service),
    ("salon", BusinessType::Service),
];

/// Lowercase, trim, and fold spaces/hyphens to underscores.
fn normalize_label(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// Map a business's free-text category label to a [`BusinessType`].
///
/// Returns `None` for labels that are not in the table.
pub fn business_type_for_label(label: &str) -> Option<BusinessType> {
    let normalized = normalize_label(label);
    BUSINESS_TYPE_LABELS
        .iter()
        .find(|(known, _)| *known == normalized)
        .map(|(_, business_type)| *business_type)
}

// ---------------------------------------------------------------------------
// PreferenceFlag
// ---------------------------------------------------------------------------

/// A single boolean inside a [`PreferenceRecord`](crate::preferences::PreferenceRecord).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceFlag {
    TownAlerts,
    WeatherAlerts,
    Events,
    EmergencyAlerts,
    Business(BusinessType),
}
