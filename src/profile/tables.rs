//! The eight fixed profile tables and the tools that manage them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::ProfileError;

/// Fields present on every profile table.
pub const COMMON_FIELDS: [&str; 7] = [
    "id",
    "content",
    "keywords",
    "source_app",
    "privacy_level",
    "created_time",
    "updated_time",
];

/// A profile table.
///
/// Variant order is the canonical fetch order; `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileTable {
    Memory,
    Viewpoint,
    Insight,
    Goal,
    Preference,
    Methodology,
    Focus,
    Prediction,
}

impl ProfileTable {
    pub const ALL: [ProfileTable; 8] = [
        ProfileTable::Memory,
        ProfileTable::Viewpoint,
        ProfileTable::Insight,
        ProfileTable::Goal,
        ProfileTable::Preference,
        ProfileTable::Methodology,
        ProfileTable::Focus,
        ProfileTable::Prediction,
    ];

    /// SQL table name (also the wire name).
    pub fn as_str(self) -> &'static str {
        match self {
            ProfileTable::Memory => "memory",
            ProfileTable::Viewpoint => "viewpoint",
            ProfileTable::Insight => "insight",
            ProfileTable::Goal => "goal",
            ProfileTable::Preference => "preference",
            ProfileTable::Methodology => "methodology",
            ProfileTable::Focus => "focus",
            ProfileTable::Prediction => "prediction",
        }
    }

    /// Name of the `manage_*` tool serving this table.
    pub fn tool_name(self) -> &'static str {
        match self {
            ProfileTable::Memory => "manage_memories",
            ProfileTable::Viewpoint => "manage_viewpoints",
            ProfileTable::Insight => "manage_insights",
            ProfileTable::Goal => "manage_goals",
            ProfileTable::Preference => "manage_preferences",
            ProfileTable::Methodology => "manage_methodologies",
            ProfileTable::Focus => "manage_focuses",
            ProfileTable::Prediction => "manage_predictions",
        }
    }

    /// Human-readable label shown above the table.
    pub fn description(self) -> &'static str {
        match self {
            ProfileTable::Memory => "Memories",
            ProfileTable::Viewpoint => "Viewpoints",
            ProfileTable::Insight => "Insights",
            ProfileTable::Goal => "Goals",
            ProfileTable::Preference => "Preferences",
            ProfileTable::Methodology => "Methodologies",
            ProfileTable::Focus => "Focuses",
            ProfileTable::Prediction => "Predictions",
        }
    }

    /// Columns only this table carries.
    pub fn specific_fields(self) -> &'static [&'static str] {
        match self {
            ProfileTable::Memory => &[
                "memory_type",
                "importance",
                "related_people",
                "location",
                "memory_date",
                "reference_urls",
            ],
            ProfileTable::Viewpoint => &["source_people", "related_event", "reference_urls"],
            ProfileTable::Insight => &["source_people", "reference_urls"],
            ProfileTable::Goal => &["type", "deadline", "status"],
            ProfileTable::Preference => &["context"],
            ProfileTable::Methodology => &["type", "effectiveness", "use_cases", "reference_urls"],
            ProfileTable::Focus => &["priority", "status", "context", "deadline"],
            ProfileTable::Prediction => {
                &["timeframe", "basis", "verification_status", "reference_urls"]
            }
        }
    }

    /// Common fields followed by the table-specific ones.
    pub fn fields(self) -> Vec<&'static str> {
        COMMON_FIELDS
            .iter()
            .chain(self.specific_fields())
            .copied()
            .collect()
    }

    pub fn parse(name: &str) -> Result<Self, ProfileError> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == name)
            .ok_or_else(|| ProfileError::UnknownTable {
                name: name.to_string(),
            })
    }
}

impl FromStr for ProfileTable {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ProfileTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
