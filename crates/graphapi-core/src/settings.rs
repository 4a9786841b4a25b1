//! Layout-settings validation seam.
//!
//! The layout engine owns the authoritative option schema; this crate
//! only depends on it through [`SettingsValidator`]. The composer and
//! the layout-set store take the validator as a trait object so tests
//! can swap in a failing implementation.

use serde_json::Value;

use crate::canonical::canonical_json;
use crate::error::ValidationError;

/// An opaque layout-engine options map.
pub type SettingsMap = serde_json::Map<String, Value>;

/// Keys injected by the graph-type composer, forbidden from direct
/// editing on a layout set.
pub const RESERVED_SETTING_KEYS: [&str; 2] = ["type_icon_map", "edge_type_overrides"];

/// Maximum number of keys in one settings map.
pub const MAX_SETTINGS_ENTRIES: usize = 1024;
/// Maximum canonical-JSON size of one settings map, in bytes.
pub const MAX_SETTINGS_BYTES: usize = 512_000;

/// Validates a merged settings map against the layout engine's schema.
pub trait SettingsValidator: Send + Sync {
    /// Returns the validated (possibly normalized) map, or the reason
    /// the engine would refuse it.
    fn validate(&self, settings: &SettingsMap) -> Result<SettingsMap, ValidationError>;
}

/// Structural validator for ELK-style option maps.
///
/// Checks key shapes and size bounds. Reserved keys are accepted here
/// because the composer injects them after merging; the layout-set
/// contract rejects them earlier, at edit time.
#[derive(Debug, Default, Clone, Copy)]
pub struct ElkSettingsValidator;

impl SettingsValidator for ElkSettingsValidator {
    fn validate(&self, settings: &SettingsMap) -> Result<SettingsMap, ValidationError> {
        if settings.len() > MAX_SETTINGS_ENTRIES {
            return Err(ValidationError::new(format!(
                "settings exceed max size {MAX_SETTINGS_ENTRIES} keys."
            )));
        }
        for key in settings.keys() {
            if !RESERVED_SETTING_KEYS.contains(&key.as_str()) {
                check_setting_key(key)?;
            }
        }
        let canonical_bytes = canonical_json(&Value::Object(settings.clone())).len();
        if canonical_bytes > MAX_SETTINGS_BYTES {
            return Err(ValidationError::new(format!(
                "settings exceed max size {MAX_SETTINGS_BYTES} bytes."
            )));
        }
        Ok(settings.clone())
    }
}

/// Checks a layout setting key: `^[A-Za-z0-9][A-Za-z0-9._:-]{0,127}$`.
pub fn check_setting_key(key: &str) -> Result<(), ValidationError> {
    let mut chars = key.chars();
    let head_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphanumeric());
    let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '-'));
    if key.len() > 128 || !head_ok || !tail_ok {
        return Err(ValidationError::new(format!(
            "Invalid setting key '{key}'. Use ^[A-Za-z0-9][A-Za-z0-9._:-]{{0,127}}$."
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(pairs: &[(&str, Value)]) -> SettingsMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn accepts_dotted_elk_option_keys() {
        let map = settings(&[
            ("elk.algorithm", json!("layered")),
            ("org.eclipse.elk.direction", json!("DOWN")),
            ("spacing.nodeNode", json!(40)),
        ]);
        assert_eq!(ElkSettingsValidator.validate(&map).unwrap(), map);
    }

    #[test]
    fn accepts_reserved_keys_injected_by_composer() {
        let map = settings(&[
            ("elk.algorithm", json!("layered")),
            ("type_icon_map", json!({"router": "mdi:router"})),
            ("edge_type_overrides", json!({})),
        ]);
        assert!(ElkSettingsValidator.validate(&map).is_ok());
    }

    #[test]
    fn rejects_malformed_keys() {
        for bad in ["", ".leading", "has space", "bad!key"] {
            let map = settings(&[(bad, json!(1))]);
            assert!(ElkSettingsValidator.validate(&map).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn rejects_oversized_maps() {
        let map: SettingsMap = (0..=MAX_SETTINGS_ENTRIES)
            .map(|i| (format!("key{i}"), json!(i)))
            .collect();
        assert!(ElkSettingsValidator.validate(&map).is_err());
    }
}
