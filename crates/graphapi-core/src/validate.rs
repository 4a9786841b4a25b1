//! Identifier, key, and name normalization rules.
//!
//! Every externally supplied token is trimmed, lowercased where the
//! contract demands it, and checked against the pattern the wire format
//! documents. Normalization happens once at the contract boundary; the
//! stores and composer only ever see normalized values.

use crate::error::ValidationError;

/// Minimum length of a node/link type key.
pub const MIN_TYPE_KEY_LENGTH: usize = 2;
/// Maximum length of a node/link type key.
pub const MAX_TYPE_KEY_LENGTH: usize = 64;
/// Maximum length of a display name.
pub const MAX_NAME_LENGTH: usize = 120;

/// Normalizes a resource identifier: trimmed, lowercased, and matching
/// `^[a-z0-9][a-z0-9_-]{1,63}$`. `field` names the offending field in the
/// error message.
pub fn normalize_id(value: &str, field: &str) -> Result<String, ValidationError> {
    let normalized = value.trim().to_ascii_lowercase();
    let mut chars = normalized.chars();
    let head_ok = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit());
    let tail_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if !(2..=64).contains(&normalized.len()) || !head_ok || !tail_ok {
        return Err(ValidationError::new(format!(
            "{field} must match ^[a-z0-9][a-z0-9_-]{{1,63}}$"
        )));
    }
    Ok(normalized)
}

/// Normalizes a node/link type key: trimmed, lowercased, no spaces,
/// length 2-64, matching `^[a-z][a-z0-9_-]*$`.
pub fn normalize_type_key(value: &str) -> Result<String, ValidationError> {
    let key = value.trim().to_ascii_lowercase();
    if key.contains(' ') {
        return Err(ValidationError::new(format!(
            "Invalid type key '{value}'. Spaces are not allowed."
        )));
    }
    if !(MIN_TYPE_KEY_LENGTH..=MAX_TYPE_KEY_LENGTH).contains(&key.len()) {
        return Err(ValidationError::new(format!(
            "Invalid type key '{value}'. Length must be {MIN_TYPE_KEY_LENGTH}-{MAX_TYPE_KEY_LENGTH}."
        )));
    }
    let mut chars = key.chars();
    let head_ok = matches!(chars.next(), Some(c) if c.is_ascii_lowercase());
    let tail_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if !head_ok || !tail_ok {
        return Err(ValidationError::new(format!(
            "Invalid type key '{value}'. Use ^[a-z][a-z0-9_-]*$."
        )));
    }
    Ok(key)
}

/// Normalizes an iconify-style icon name: `<pack>:<icon>`, lowercased.
///
/// The pack segment matches `[a-z0-9]+(-[a-z0-9]+)*`, the icon segment
/// `[a-z0-9]+([-_][a-z0-9]+)*`.
pub fn normalize_iconify_name(value: &str) -> Result<String, ValidationError> {
    let icon_name = value.trim().to_ascii_lowercase();
    let invalid = || {
        ValidationError::new(format!(
            "Invalid iconify value '{value}'. Use <pack>:<icon> (e.g. iconoir:airplay-solid)."
        ))
    };

    let (pack, icon) = icon_name.split_once(':').ok_or_else(invalid)?;
    if !segmented_token_ok(pack, &['-']) || !segmented_token_ok(icon, &['-', '_']) {
        return Err(invalid());
    }
    Ok(icon_name)
}

/// Checks a token made of `[a-z0-9]+` groups joined by single separator
/// characters, with no leading/trailing/adjacent separators.
fn segmented_token_ok(token: &str, separators: &[char]) -> bool {
    if token.is_empty() {
        return false;
    }
    let mut prev_was_separator = true;
    for c in token.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            prev_was_separator = false;
        } else if separators.contains(&c) {
            if prev_was_separator {
                return false;
            }
            prev_was_separator = true;
        } else {
            return false;
        }
    }
    !prev_was_separator
}

/// Normalizes a checksum string: trimmed, lowercased, `^[a-f0-9]{64}$`.
pub fn normalize_checksum(value: &str) -> Result<String, ValidationError> {
    let normalized = value.trim().to_ascii_lowercase();
    let hex_ok = normalized
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
    if normalized.len() != 64 || !hex_ok {
        return Err(ValidationError::new("checksum must match ^[a-f0-9]{64}$"));
    }
    Ok(normalized)
}

/// Normalizes a display name: trimmed, non-empty, at most 120 characters.
pub fn normalize_name(value: &str) -> Result<String, ValidationError> {
    let text = value.trim().to_string();
    if text.is_empty() {
        return Err(ValidationError::new("name must not be empty."));
    }
    if text.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::new(format!(
            "name exceeds max length {MAX_NAME_LENGTH}."
        )));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_lowercased_and_trimmed() {
        assert_eq!(normalize_id("  Telecom-Core ", "iconSetId").unwrap(), "telecom-core");
    }

    #[test]
    fn id_rejects_bad_shapes() {
        for bad in ["", "a", "-leading", "has space", "UPPER!", &"x".repeat(65)] {
            assert!(normalize_id(bad, "iconSetId").is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn type_key_enforces_length_and_pattern() {
        assert_eq!(normalize_type_key(" Router ").unwrap(), "router");
        assert!(normalize_type_key("r").is_err());
        assert!(normalize_type_key("9router").is_err());
        assert!(normalize_type_key("rou ter").is_err());
    }

    #[test]
    fn iconify_name_accepts_pack_and_icon_segments() {
        assert_eq!(
            normalize_iconify_name("MDI:Router-Wireless").unwrap(),
            "mdi:router-wireless"
        );
        assert_eq!(
            normalize_iconify_name("iconoir:airplay_solid").unwrap(),
            "iconoir:airplay_solid"
        );
    }

    #[test]
    fn iconify_name_rejects_malformed_values() {
        for bad in ["router", "mdi:", ":router", "mdi::router", "m di:router", "mdi:-router"] {
            assert!(normalize_iconify_name(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn checksum_must_be_64_hex_chars() {
        let ok = "a".repeat(64);
        assert_eq!(normalize_checksum(&ok).unwrap(), ok);
        assert!(normalize_checksum("deadbeef").is_err());
        assert!(normalize_checksum(&"g".repeat(64)).is_err());
    }

    #[test]
    fn name_must_be_non_empty_after_trim() {
        assert_eq!(normalize_name("  Default  ").unwrap(), "Default");
        assert!(normalize_name("   ").is_err());
        assert!(normalize_name(&"n".repeat(121)).is_err());
    }
}
