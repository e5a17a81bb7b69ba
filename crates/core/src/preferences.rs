//! Per-user notification preference record and legacy-shape migration.
//!
//! Stored preference blobs come from several generations of clients: a bare
//! boolean (the original global toggle), flat top-level category booleans,
//! and the current nested shape. [`resolve_preferences`] migrates any of them
//! field by field into a fully populated [`PreferenceRecord`]: a value is used
//! only when it has the expected type, otherwise the documented default is
//! substituted. It never fails.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::category::{BusinessType, PreferenceFlag};
use crate::quiet_hours::{format_hhmm, is_within_window, parse_hhmm};

/// Version stamped on every record produced by [`resolve_preferences`].
pub const PREFERENCES_VERSION: u32 = 2;

/// Default quiet-hours window start.
pub const DEFAULT_QUIET_START: &str = "22:00";

/// Default quiet-hours window end.
pub const DEFAULT_QUIET_END: &str = "08:00";

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

/// A fully populated preference record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceRecord {
    pub version: u32,
    pub global_enabled: bool,
    pub categories: CategoryPreferences,
    pub business_types: BusinessTypePreferences,
    pub quiet_hours: QuietHoursPreference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPreferences {
    pub town_alerts: bool,
    pub weather_alerts: bool,
    pub events: bool,
    pub emergency_alerts: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessTypePreferences {
    pub lodging: bool,
    pub restaurant: bool,
    pub attraction: bool,
    pub service: bool,
}

/// Quiet hours as local `HH:MM` strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuietHoursPreference {
    pub enabled: bool,
    pub start: String,
    pub end: String,
}

impl Default for PreferenceRecord {
    fn default() -> Self {
        Self {
            version: PREFERENCES_VERSION,
            global_enabled: true,
            categories: CategoryPreferences::default(),
            business_types: BusinessTypePreferences::default(),
            quiet_hours: QuietHoursPreference::default(),
        }
    }
}

impl Default for CategoryPreferences {
    fn default() -> Self {
        Self {
            town_alerts: true,
            weather_alerts: true,
            events: true,
            emergency_alerts: true,
        }
    }
}

impl Default for BusinessTypePreferences {
    fn default() -> Self {
        Self {
            lodging: true,
            restaurant: true,
            attraction: true,
            service: true,
        }
    }
}

impl Default for QuietHoursPreference {
    fn default() -> Self {
        Self {
            enabled: false,
            start: DEFAULT_QUIET_START.to_string(),
            end: DEFAULT_QUIET_END.to_string(),
        }
    }
}

impl PreferenceRecord {
    /// Whether the given flag is enabled. `None` means no per-category flag
    /// applies, which is always allowed.
    pub fn allows(&self, flag: Option<PreferenceFlag>) -> bool {
        let Some(flag) = flag else {
            return true;
        };
        match flag {
            PreferenceFlag::TownAlerts => self.categories.town_alerts,
            PreferenceFlag::WeatherAlerts => self.categories.weather_alerts,
            PreferenceFlag::Events => self.categories.events,
            PreferenceFlag::EmergencyAlerts => self.categories.emergency_alerts,
            PreferenceFlag::Business(business_type) => match business_type {
                BusinessType::Lodging => self.business_types.lodging,
                BusinessType::Restaurant => self.business_types.restaurant,
                BusinessType::Attraction => self.business_types.attraction,
                BusinessType::Service => self.business_types.service,
            },
        }
    }
}

impl QuietHoursPreference {
    /// Whether the window blocks delivery at the given local minute-of-day.
    pub fn blocks_at(&self, minute_of_day: u16) -> bool {
        if !self.enabled {
            return false;
        }
        let (Some(start), Some(end)) = (parse_hhmm(&self.start), parse_hhmm(&self.end)) else {
            return false;
        };
        is_within_window(start, end, minute_of_day)
    }
}

// ---------------------------------------------------------------------------
// Migration
// ---------------------------------------------------------------------------

/// Resolve a stored (possibly legacy or malformed) blob into a full record.
pub fn resolve_preferences(raw: Option<&Value>) -> PreferenceRecord {
    let defaults = PreferenceRecord::default();
    match raw {
        Some(Value::Bool(enabled)) => PreferenceRecord {
            global_enabled: *enabled,
            ..defaults
        },
        Some(Value::Object(obj)) => resolve_object(obj, defaults),
        _ => defaults,
    }
}

fn resolve_object(obj: &Map<String, Value>, defaults: PreferenceRecord) -> PreferenceRecord {
    let global_enabled = bool_field(obj, "globalEnabled")
        .or_else(|| bool_field(obj, "enabled"))
        .unwrap_or(defaults.global_enabled);

    let nested_categories = obj.get("categories").and_then(Value::as_object);
    // v1 clients stored category toggles at the top level.
    let category = |key: &str, default: bool| {
        nested_categories
            .and_then(|c| bool_field(c, key))
            .or_else(|| bool_field(obj, key))
            .unwrap_or(default)
    };
    let categories = CategoryPreferences {
        town_alerts: category("townAlerts", defaults.categories.town_alerts),
        weather_alerts: category("weatherAlerts", defaults.categories.weather_alerts),
        events: category("events", defaults.categories.events),
        emergency_alerts: category("emergencyAlerts", defaults.categories.emergency_alerts),
    };

    let nested_types = obj.get("businessTypes").and_then(Value::as_object);
    let business_type = |key: &str, default: bool| {
        nested_types
            .and_then(|t| bool_field(t, key))
            .unwrap_or(default)
    };
    let business_types = BusinessTypePreferences {
        lodging: business_type("lodging", defaults.business_types.lodging),
        restaurant: business_type("restaurant", defaults.business_types.restaurant),
        attraction: business_type("attraction", defaults.business_types.attraction),
        service: business_type("service", defaults.business_types.service),
    };

    let quiet = obj.get("quietHours").and_then(Value::as_object);
    let quiet_hours = QuietHoursPreference {
        enabled: quiet
            .and_then(|q| bool_field(q, "enabled"))
            .unwrap_or(defaults.quiet_hours.enabled),
        start: quiet
            .and_then(|q| time_field(q, "start"))
            .unwrap_or(defaults.quiet_hours.start),
        end: quiet
            .and_then(|q| time_field(q, "end"))
            .unwrap_or(defaults.quiet_hours.end),
    };

    PreferenceRecord {
        version: PREFERENCES_VERSION,
        global_enabled,
        categories,
        business_types,
        quiet_hours,
    }
}

fn bool_field(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    obj.get(key).and_then(Value::as_bool)
}

/// A valid `HH:MM` string, re-formatted with zero padding.
fn time_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .and_then(parse_hhmm)
        .map(format_hhmm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve(value: Value) -> PreferenceRecord {
        resolve_preferences(Some(&value))
    }

    #[test]
    fn null_and_missing_resolve_to_defaults() {
        assert_eq!(resolve_preferences(None), PreferenceRecord::default());
        assert_eq!(resolve(Value::Null), PreferenceRecord::default());
        assert_eq!(resolve(json!({})), PreferenceRecord::default());
    }

    #[test]
    fn non_object_shapes_resolve_to_defaults() {
        for raw in [json!(42), json!("yes"), json!([true, false])] {
            assert_eq!(resolve(raw), PreferenceRecord::default());
        }
    }

    #[test]
    fn bare_boolean_is_the_legacy_global_toggle() {
        let record = resolve(json!(false));
        assert!(!record.global_enabled);
        assert_eq!(record.categories, CategoryPreferences::default());
        assert_eq!(record.version, PREFERENCES_VERSION);
    }

    #[test]
    fn fully_shaped_record_is_preserved() {
        let stored = PreferenceRecord {
            version: PREFERENCES_VERSION,
            global_enabled: true,
            categories: CategoryPreferences {
                town_alerts: false,
                weather_alerts: true,
                events: false,
                emergency_alerts: true,
            },
            business_types: BusinessTypePreferences {
                lodging: false,
                restaurant: true,
                attraction: false,
                service: true,
            },
            quiet_hours: QuietHoursPreference {
                enabled: true,
                start: "21:30".into(),
                end: "07:15".into(),
            },
        };
        let raw = serde_json::to_value(&stored).unwrap();
        assert_eq!(resolve(raw), stored);
    }

    #[test]
    fn missing_quiet_hours_end_keeps_other_fields() {
        let record = resolve(json!({
            "globalEnabled": true,
            "categories": { "townAlerts": false, "events": false },
            "quietHours": { "enabled": true, "start": "23:00" }
        }));
        assert!(!record.categories.town_alerts);
        assert!(!record.categories.events);
        assert!(record.categories.weather_alerts);
        assert!(record.quiet_hours.enabled);
        assert_eq!(record.quiet_hours.start, "23:00");
        assert_eq!(record.quiet_hours.end, DEFAULT_QUIET_END);
    }

    #[test]
    fn wrong_typed_fields_fall_back_individually() {
        let record = resolve(json!({
            "globalEnabled": "no",
            "categories": { "townAlerts": 0, "weatherAlerts": false },
            "businessTypes": "all",
            "quietHours": { "enabled": "true", "start": 2200, "end": "25:00" }
        }));
        assert!(record.global_enabled);
        assert!(record.categories.town_alerts);
        assert!(!record.categories.weather_alerts);
        assert_eq!(record.business_types, BusinessTypePreferences::default());
        assert_eq!(record.quiet_hours, QuietHoursPreference::default());
    }

    #[test]
    fn flat_v1_category_keys_are_migrated() {
        let record = resolve(json!({ "enabled": true, "weatherAlerts": false, "events": false }));
        assert!(record.global_enabled);
        assert!(!record.categories.weather_alerts);
        assert!(!record.categories.events);
        assert!(record.categories.town_alerts);
    }

    #[test]
    fn nested_category_wins_over_flat_key() {
        let record = resolve(json!({ "events": false, "categories": { "events": true } }));
        assert!(record.categories.events);
    }

    #[test]
    fn quiet_hours_times_are_zero_padded() {
        let record = resolve(json!({ "quietHours": { "enabled": true, "start": "9:00", "end": "7:05" } }));
        assert_eq!(record.quiet_hours.start, "09:00");
        assert_eq!(record.quiet_hours.end, "07:05");
    }

    #[test]
    fn resolution_is_idempotent() {
        let once = resolve(json!({ "categories": { "events": false }, "quietHours": { "enabled": true } }));
        let twice = resolve(serde_json::to_value(&once).unwrap());
        assert_eq!(once, twice);
    }

    #[test]
    fn allows_checks_the_mapped_flag() {
        let mut record = PreferenceRecord::default();
        record.categories.events = false;
        record.business_types.restaurant = false;
        assert!(!record.allows(Some(PreferenceFlag::Events)));
        assert!(record.allows(Some(PreferenceFlag::TownAlerts)));
        assert!(!record.allows(Some(PreferenceFlag::Business(BusinessType::Restaurant))));
        assert!(record.allows(Some(PreferenceFlag::Business(BusinessType::Lodging))));
        assert!(record.allows(None));
    }

    #[test]
    fn disabled_quiet_hours_never_block() {
        let quiet = QuietHoursPreference {
            enabled: false,
            start: "00:00".into(),
            end: "23:59".into(),
        };
        assert!(!quiet.blocks_at(600));
    }

    #[test]
    fn enabled_quiet_hours_use_the_window() {
        let quiet = QuietHoursPreference {
            enabled: true,
            start: "22:00".into(),
            end: "06:00".into(),
        };
        assert!(quiet.blocks_at(23 * 60));
        assert!(quiet.blocks_at(5 * 60 + 59));
        assert!(!quiet.blocks_at(6 * 60));
    }
}
