//! Audience targeting modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// How a notification's audience is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetType {
    /// Every profile in a town, filtered by preferences.
    Town,
    /// Active subscribers of the sending business, no preference filtering.
    BusinessSubscribers,
    /// A named, town-scoped segment.
    Segment,
}

impl TargetType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Town => "TOWN",
            Self::BusinessSubscribers => "BUSINESS_SUBSCRIBERS",
            Self::Segment => "SEGMENT",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TOWN" => Ok(Self::Town),
            "BUSINESS_SUBSCRIBERS" => Ok(Self::BusinessSubscribers),
            "SEGMENT" => Ok(Self::Segment),
            other => Err(CoreError::Validation(format!("Unknown target type '{other}'"))),
        }
    }
}
