//! Discrete age-label ↔ weight lookup over the reference table.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::WeightAgeEntry;

/// Age table errors.
#[derive(Error, Debug)]
pub enum AgeTableError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Age table is empty")]
    Empty,

    #[error("Invalid reference weight for {label}: {weight_kg}")]
    InvalidWeight { label: String, weight_kg: f64 },
}

pub type AgeTableResult<T> = Result<T, AgeTableError>;

/// Built-in reference weights (label, kg), youngest first.
const DEFAULT_TABLE: &[(&str, f64)] = &[
    ("Naissance", 3.0),
    ("3 mois", 6.0),
    ("6 mois", 7.5),
    ("9 mois", 9.0),
    ("10 mois", 10.0),
    ("1 an", 10.0),
    ("2 ans", 12.0),
    ("3 ans", 14.0),
    ("4 ans", 16.0),
    ("5 ans", 18.0),
    ("6 ans", 20.0),
    ("7 ans", 22.0),
    ("8 ans", 24.0),
    ("9 ans", 26.0),
    ("10 ans", 30.0),
    ("11 ans", 34.0),
    ("12 ans", 38.0),
    ("13 ans", 42.0),
    ("14 ans", 46.0),
    ("15 ans", 50.0),
];

/// Ordered, immutable age/weight reference table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgeWeightTable {
    entries: Vec<WeightAgeEntry>,
}

impl Default for AgeWeightTable {
    fn default() -> Self {
        Self {
            entries: DEFAULT_TABLE
                .iter()
                .map(|(label, kg)| WeightAgeEntry::new(*label, *kg))
                .collect(),
        }
    }
}

impl AgeWeightTable {
    /// Build a table from entries, keeping their order.
    pub fn new(entries: Vec<WeightAgeEntry>) -> AgeTableResult<Self> {
        if entries.is_empty() {
            return Err(AgeTableError::Empty);
        }
        if let Some(bad) = entries
            .iter()
            .find(|e| !e.weight_kg.is_finite() || e.weight_kg <= 0.0)
        {
            return Err(AgeTableError::InvalidWeight {
                label: bad.label.clone(),
                weight_kg: bad.weight_kg,
            });
        }
        Ok(Self { entries })
    }

    /// Parse `[{"label": "...", "weight_kg": 7.5}, ...]`.
    pub fn from_json(json: &str) -> AgeTableResult<Self> {
        let entries: Vec<WeightAgeEntry> = serde_json::from_str(json)?;
        Self::new(entries)
    }

    pub fn entries(&self) -> &[WeightAgeEntry] {
        &self.entries
    }

    /// Labels in table order, for an age picker.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.label.as_str())
    }

    /// Exact, case-insensitive label lookup.
    pub fn weight_for_age(&self, label: &str) -> Option<f64> {
        let wanted = label.trim().to_lowercase();
        self.entries
            .iter()
            .find(|e| e.label.to_lowercase() == wanted)
            .map(|e| e.weight_kg)
    }

    /// Nearest label by absolute weight difference; ties go to the earliest entry.
    pub fn age_for_weight(&self, weight_kg: f64) -> Option<&str> {
        if !weight_kg.is_finite() {
            return None;
        }

        let mut best: Option<(&WeightAgeEntry, f64)> = None;
        for entry in &self.entries {
            let diff = (entry.weight_kg - weight_kg).abs();
            match best {
                Some((_, smallest)) if diff >= smallest => {}
                _ => best = Some((entry, diff)),
            }
        }
        best.map(|(entry, _)| entry.label.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_for_age_exact() {
        let table = AgeWeightTable::default();

        assert_eq!(table.weight_for_age("6 mois"), Some(7.5));
        assert_eq!(table.weight_for_age("6 MOIS"), Some(7.5));
        assert_eq!(table.weight_for_age("naissance"), Some(3.0));
        assert_eq!(table.weight_for_age("6 months"), None);
        assert_eq!(table.weight_for_age(""), None);
    }

    #[test]
    fn test_age_for_weight_nearest() {
        let table = AgeWeightTable::default();

        // |8 - 7.5| = 0.5 beats |8 - 9| = 1
        assert_eq!(table.age_for_weight(8.0), Some("6 mois"));
        assert_eq!(table.age_for_weight(1.0), Some("Naissance"));
        assert_eq!(table.age_for_weight(80.0), Some("15 ans"));
        assert_eq!(table.age_for_weight(f64::NAN), None);
    }

    #[test]
    fn test_age_for_weight_ties_keep_earliest() {
        let table = AgeWeightTable::default();

        // "10 mois" and "1 an" both weigh 10 kg
        assert_eq!(table.age_for_weight(10.0), Some("10 mois"));
        // 8.25 is equidistant from 7.5 and 9.0
        assert_eq!(table.age_for_weight(8.25), Some("6 mois"));
    }

    #[test]
    fn test_custom_table_validation() {
        assert!(matches!(AgeWeightTable::new(vec![]), Err(AgeTableError::Empty)));
        assert!(matches!(
            AgeWeightTable::new(vec![WeightAgeEntry::new("x", 0.0)]),
            Err(AgeTableError::InvalidWeight { .. })
        ));

        let table =
            AgeWeightTable::from_json(r#"[{"label": "Chiot", "weight_kg": 2}, {"label": "Adulte", "weight_kg": 25}]"#)
                .unwrap();
        assert_eq!(table.labels().collect::<Vec<_>>(), vec!["Chiot", "Adulte"]);
        assert_eq!(table.age_for_weight(12.0), Some("Chiot"));
    }
}
