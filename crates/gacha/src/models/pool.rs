//! Pool category model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A banner type with its own independent pull history
///
/// The remote API addresses categories by a numeric `type_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PoolCategory {
    Standard,
    Targeted,
    Armory,
    Beginner,
    MysteryBox,
}

/// Error returned when a pool category id or name is not recognised
#[derive(Debug, thiserror::Error)]
#[error("unknown pool category: {0}")]
pub struct UnknownPoolCategory(pub String);

impl PoolCategory {
    /// Every known category, in sync order
    pub const ALL: [PoolCategory; 5] = [
        PoolCategory::Standard,
        PoolCategory::Targeted,
        PoolCategory::Armory,
        PoolCategory::Beginner,
        PoolCategory::MysteryBox,
    ];

    /// Numeric id used by the remote API and the local database
    pub fn id(self) -> i64 {
        match self {
            PoolCategory::Standard => 1,
            PoolCategory::Targeted => 3,
            PoolCategory::Armory => 4,
            PoolCategory::Beginner => 5,
            PoolCategory::MysteryBox => 8,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.id() == id)
    }

    /// Human-readable name for summaries
    pub fn name(self) -> &'static str {
        match self {
            PoolCategory::Standard => "Standard",
            PoolCategory::Targeted => "Targeted",
            PoolCategory::Armory => "Armory",
            PoolCategory::Beginner => "Beginner",
            PoolCategory::MysteryBox => "Mystery Box",
        }
    }

    /// Short name accepted on the command line
    pub fn slug(self) -> &'static str {
        match self {
            PoolCategory::Standard => "standard",
            PoolCategory::Targeted => "targeted",
            PoolCategory::Armory => "armory",
            PoolCategory::Beginner => "beginner",
            PoolCategory::MysteryBox => "mystery-box",
        }
    }
}

impl fmt::Display for PoolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i64> for PoolCategory {
    type Error = UnknownPoolCategory;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        Self::from_id(id).ok_or_else(|| UnknownPoolCategory(id.to_string()))
    }
}

impl FromStr for PoolCategory {
    type Err = UnknownPoolCategory;

    /// Accepts either the slug (`armory`) or the numeric id (`4`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<i64>() {
            return Self::try_from(id);
        }
        Self::ALL
            .into_iter()
            .find(|c| c.slug().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownPoolCategory(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        for (i, a) in PoolCategory::ALL.iter().enumerate() {
            for b in &PoolCategory::ALL[i + 1..] {
                assert_ne!(a.id(), b.id());
            }
        }
    }

    #[test]
    fn test_from_id() {
        assert_eq!(PoolCategory::from_id(4), Some(PoolCategory::Armory));
        assert_eq!(PoolCategory::from_id(2), None);
        assert!(PoolCategory::try_from(99).is_err());
    }

    #[test]
    fn test_parse_slug_and_id() {
        assert_eq!("mystery-box".parse::<PoolCategory>().unwrap(), PoolCategory::MysteryBox);
        assert_eq!("Standard".parse::<PoolCategory>().unwrap(), PoolCategory::Standard);
        assert_eq!("3".parse::<PoolCategory>().unwrap(), PoolCategory::Targeted);
        assert!("limited".parse::<PoolCategory>().is_err());
    }

    #[test]
    fn test_display_uses_name() {
        assert_eq!(PoolCategory::MysteryBox.to_string(), "Mystery Box");
    }
}
