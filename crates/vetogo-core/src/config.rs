//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::format::Locale;

/// Minimum volume (mL) below which dilution is advised, when the catalog is silent.
pub const DEFAULT_MIN_VOLUME_ML: f64 = 0.1;

/// How a dose per kg is compared against a variant ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CeilingRule {
    /// Warn when the dose reaches the ceiling (`>=`)
    AtOrAbove,
    /// Warn only past the ceiling (`>`)
    Above,
}

impl CeilingRule {
    /// Whether `dose_per_kg` breaches `ceiling` under this rule.
    pub fn breached(&self, dose_per_kg: f64, ceiling: f64) -> bool {
        match self {
            CeilingRule::AtOrAbove => dose_per_kg >= ceiling,
            CeilingRule::Above => dose_per_kg > ceiling,
        }
    }
}

/// Tunables shared by the evaluator, formatter and controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Dilution threshold used when a drug has no `min_volume_ml`
    pub default_min_volume_ml: f64,
    /// Display locale
    pub locale: Locale,
    /// Max-dose comparison
    pub ceiling_rule: CeilingRule,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_min_volume_ml: DEFAULT_MIN_VOLUME_ML,
            locale: Locale::Fr,
            ceiling_rule: CeilingRule::AtOrAbove,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration; missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_min_volume_ml, 0.1);
        assert_eq!(config.locale, Locale::Fr);
        assert_eq!(config.ceiling_rule, CeilingRule::AtOrAbove);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{"locale": "en"}"#).unwrap();
        assert_eq!(config.locale, Locale::En);
        assert_eq!(config.default_min_volume_ml, 0.1);

        let config = EngineConfig::from_json(r#"{"ceiling_rule": "above"}"#).unwrap();
        assert_eq!(config.ceiling_rule, CeilingRule::Above);
    }

    #[test]
    fn test_ceiling_rules() {
        assert!(CeilingRule::AtOrAbove.breached(2.0, 2.0));
        assert!(!CeilingRule::Above.breached(2.0, 2.0));
        assert!(CeilingRule::Above.breached(2.1, 2.0));
        assert!(!CeilingRule::AtOrAbove.breached(1.9, 2.0));
    }
}
