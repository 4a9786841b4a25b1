//! Draft/published lifecycle stage.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Which lifecycle copy of a resource a lookup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// The single mutable in-progress version.
    Draft,
    /// An immutable snapshot copied from the draft at publish time.
    Published,
}

impl Default for Stage {
    fn default() -> Self {
        Stage::Published
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Draft => "draft",
            Stage::Published => "published",
        })
    }
}

impl FromStr for Stage {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Stage::Draft),
            "published" => Ok(Stage::Published),
            other => Err(ValidationError::new(format!(
                "stage must be 'draft' or 'published', got '{other}'."
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Draft".parse::<Stage>().unwrap(), Stage::Draft);
        assert_eq!(" PUBLISHED ".parse::<Stage>().unwrap(), Stage::Published);
        assert!("live".parse::<Stage>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Stage::Draft).unwrap(), "\"draft\"");
    }
}
