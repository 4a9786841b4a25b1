//! Render-theme bundle contract.
//!
//! A theme is user CSS plus a map of managed variables. Each variable
//! compiles to a `--light-X`/`--dark-X`/`--X: light-dark(...)` triple in
//! a `:root` block prepended to the CSS body; consumers only ever see
//! the derived `renderCss`. The body must not re-declare a managed
//! variable, since that would silently shadow the compiled triple.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::canonical::checksum_of;
use crate::error::ValidationError;
use crate::validate::{normalize_id, normalize_name};
use crate::SCHEMA_VERSION;

/// Maximum length of a theme's CSS body.
pub const MAX_CSS_BODY_LENGTH: usize = 500_000;

/// Kind of value a theme variable carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeValueType {
    #[default]
    Color,
    Float,
}

/// One managed theme variable with light/dark values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeVariable {
    #[serde(default)]
    pub value_type: ThemeValueType,
    pub light_value: String,
    pub dark_value: String,
}

impl ThemeVariable {
    fn validated(&self) -> Result<Self, ValidationError> {
        let light_value = self.light_value.trim().to_string();
        let dark_value = self.dark_value.trim().to_string();
        if light_value.is_empty() || dark_value.is_empty() {
            return Err(ValidationError::new(
                "lightValue and darkValue must not be empty.",
            ));
        }
        if self.value_type == ThemeValueType::Float {
            for value in [&light_value, &dark_value] {
                let parsed: Result<f64, _> = value.parse();
                if !matches!(parsed, Ok(number) if number.is_finite()) {
                    return Err(ValidationError::new(
                        "float variables require parseable numbers.",
                    ));
                }
            }
        }
        Ok(ThemeVariable {
            value_type: self.value_type,
            light_value,
            dark_value,
        })
    }
}

/// Normalizes a variable key: leading dashes stripped, lowercased,
/// `_` replaced with `-`, matching `^[a-z][a-z0-9-]*$`.
pub fn normalize_variable_key(value: &str) -> Result<String, ValidationError> {
    let key = value
        .trim()
        .trim_start_matches('-')
        .to_ascii_lowercase()
        .replace('_', "-");
    let mut chars = key.chars();
    let head_ok = matches!(chars.next(), Some(c) if c.is_ascii_lowercase());
    let tail_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !head_ok || !tail_ok {
        return Err(ValidationError::new(format!(
            "Invalid theme variable key '{value}'. Use ^[a-z][a-z0-9-]*$."
        )));
    }
    Ok(key)
}

/// Compiles the derived render CSS: a `:root` block with one triple per
/// variable in sorted key order, followed by the body. With no
/// variables the body passes through untouched.
pub fn compile_render_css(
    css_body: &str,
    variables: &BTreeMap<String, ThemeVariable>,
) -> String {
    if variables.is_empty() {
        return css_body.to_string();
    }
    let mut css = String::from(":root {\n  color-scheme: light dark;\n");
    for (key, variable) in variables {
        css.push_str(&format!("  --light-{key}: {};\n", variable.light_value));
        css.push_str(&format!("  --dark-{key}: {};\n", variable.dark_value));
        css.push_str(&format!(
            "  --{key}: light-dark(var(--light-{key}), var(--dark-{key}));\n"
        ));
    }
    css.push_str("}\n\n");
    css.push_str(css_body);
    css
}

fn check_body_does_not_shadow(
    css_body: &str,
    variables: &BTreeMap<String, ThemeVariable>,
) -> Result<(), ValidationError> {
    for key in variables.keys() {
        let declaration = format!("--{key}");
        let mut rest = css_body;
        while let Some(index) = rest.find(&declaration) {
            let after = &rest[index + declaration.len()..];
            let next = after.trim_start().chars().next();
            if next == Some(':') {
                return Err(ValidationError::new(format!(
                    "cssBody must not declare managed theme variable '--{key}'."
                )));
            }
            rest = &rest[index + declaration.len()..];
        }
    }
    Ok(())
}

/// A fully-resolved theme snapshot (draft or published).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeBundle {
    pub schema_version: String,
    pub theme_id: String,
    pub version: u32,
    pub name: String,
    pub css_body: String,
    pub variables: BTreeMap<String, ThemeVariable>,
    pub render_css: String,
    pub updated_at: DateTime<Utc>,
    pub checksum: String,
}

impl ThemeBundle {
    /// Builds a validated bundle at `version`, compiling `renderCss` and
    /// recomputing the checksum. The checksum covers the editable fields
    /// only; `renderCss` is derived and never a hash input.
    pub fn build(
        theme_id: &str,
        version: u32,
        name: &str,
        css_body: &str,
        variables: &BTreeMap<String, ThemeVariable>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let theme_id = normalize_id(theme_id, "themeId")?;
        let name = normalize_name(name)?;
        if css_body.trim().is_empty() {
            return Err(ValidationError::new("cssBody must not be empty."));
        }
        if css_body.len() > MAX_CSS_BODY_LENGTH {
            return Err(ValidationError::new(format!(
                "cssBody exceeds max length {MAX_CSS_BODY_LENGTH}."
            )));
        }
        let mut normalized = BTreeMap::new();
        for (key, variable) in variables {
            let key = normalize_variable_key(key)?;
            if normalized.insert(key.clone(), variable.validated()?).is_some() {
                return Err(ValidationError::new(format!(
                    "Duplicate theme variable key '{key}' after normalization."
                )));
            }
        }
        check_body_does_not_shadow(css_body, &normalized)?;
        let render_css = compile_render_css(css_body, &normalized);
        let checksum = checksum_of(&checksum_payload(
            &theme_id, version, &name, css_body, &normalized,
        ));
        Ok(ThemeBundle {
            schema_version: SCHEMA_VERSION.to_string(),
            theme_id,
            version,
            name,
            css_body: css_body.to_string(),
            variables: normalized,
            render_css,
            updated_at,
            checksum,
        })
    }

    /// Recomputes the checksum from the bundle's current fields.
    pub fn expected_checksum(&self) -> String {
        checksum_of(&checksum_payload(
            &self.theme_id,
            self.version,
            &self.name,
            &self.css_body,
            &self.variables,
        ))
    }
}

fn checksum_payload(
    theme_id: &str,
    version: u32,
    name: &str,
    css_body: &str,
    variables: &BTreeMap<String, ThemeVariable>,
) -> Value {
    json!({
        "schemaVersion": SCHEMA_VERSION,
        "themeId": theme_id,
        "themeVersion": version,
        "name": name,
        "cssBody": css_body,
        "variables": variables,
    })
}

/// Request body for creating a theme.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateThemeRequest {
    pub theme_id: String,
    pub name: String,
    pub css_body: String,
    #[serde(default)]
    pub variables: BTreeMap<String, ThemeVariable>,
}

/// Request body for replacing a theme's draft.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateThemeRequest {
    pub name: String,
    pub css_body: String,
    #[serde(default)]
    pub variables: BTreeMap<String, ThemeVariable>,
}
