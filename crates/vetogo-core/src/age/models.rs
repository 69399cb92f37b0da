//! Continuous age ↔ weight estimation models.

use serde::{Deserialize, Serialize};

/// Upper bound on estimated weights (kg).
const MAX_WEIGHT_KG: f64 = 50.0;
/// Lower bound on estimated weights (kg).
const MIN_WEIGHT_KG: f64 = 1.0;
/// Oldest age covered by the models (months).
const MAX_MONTHS: f64 = 180.0;

/// Reference points (months, kg) for table interpolation.
const TABLE_POINTS: &[(f64, f64)] = &[
    (0.0, 3.0),
    (3.0, 6.0),
    (6.0, 7.5),
    (9.0, 9.0),
    (12.0, 10.0),
    (24.0, 12.0),
    (36.0, 14.0),
    (48.0, 16.0),
    (60.0, 18.0),
    (72.0, 20.0),
    (84.0, 22.0),
    (96.0, 24.0),
    (108.0, 26.0),
    (120.0, 30.0),
    (132.0, 34.0),
    (144.0, 38.0),
    (156.0, 42.0),
    (168.0, 46.0),
    (180.0, 50.0),
];

/// Weight estimation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightModel {
    /// Linear interpolation over reference points
    Table,
    /// APLS formulas
    Apls,
}

impl WeightModel {
    /// Estimated weight (kg, clamped to 1–50) for an age in months.
    pub fn estimate_weight(&self, months: f64) -> f64 {
        let weight = match self {
            WeightModel::Table => interpolate_weight(months),
            WeightModel::Apls => apls_weight(months),
        };
        weight.clamp(MIN_WEIGHT_KG, MAX_WEIGHT_KG)
    }

    /// Estimated age in whole months for a weight.
    pub fn estimate_months(&self, weight_kg: f64) -> u32 {
        let w = weight_kg.clamp(MIN_WEIGHT_KG, MAX_WEIGHT_KG);
        let months = match self {
            WeightModel::Table => interpolate_months(w),
            WeightModel::Apls => {
                if w < 10.0 {
                    (w - 3.0) / 7.0 * 12.0
                } else if w <= 20.0 {
                    (w - 8.0) / 2.0 * 12.0
                } else {
                    (w - 7.0) / 3.0 * 12.0
                }
            }
        };
        months.round().max(0.0) as u32
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn interpolate_weight(months: f64) -> f64 {
    let m = months.clamp(0.0, MAX_MONTHS);
    for pair in TABLE_POINTS.windows(2) {
        let ((m1, w1), (m2, w2)) = (pair[0], pair[1]);
        if m >= m1 && m <= m2 {
            let t = (m - m1) / (m2 - m1);
            return round_one_decimal(w1 + t * (w2 - w1));
        }
    }
    MAX_WEIGHT_KG
}

fn interpolate_months(weight_kg: f64) -> f64 {
    for pair in TABLE_POINTS.windows(2) {
        let ((m1, w1), (m2, w2)) = (pair[0], pair[1]);
        if weight_kg >= w1 && weight_kg <= w2 {
            let t = (weight_kg - w1) / (w2 - w1);
            return m1 + t * (m2 - m1);
        }
    }
    if weight_kg < TABLE_POINTS[0].1 {
        0.0
    } else {
        MAX_MONTHS
    }
}

fn apls_weight(months: f64) -> f64 {
    let years = months.clamp(0.0, MAX_MONTHS) / 12.0;
    if years < 1.0 {
        round_one_decimal(3.0 + 7.0 * years)
    } else if years <= 6.0 {
        (2.0 * years + 8.0).round()
    } else {
        (3.0 * years + 7.0).round()
    }
}

/// Parse an age label into months: `"Nouveau-né"` → 0, `"6 mois"` → 6, `"2 ans"` → 24.
///
/// The number may appear anywhere in the label (`"bébé 6 mois"`). A month
/// reading wins over a year reading. Values that overflow give `None`.
pub fn age_label_to_months(label: &str) -> Option<u32> {
    let lower = label.trim().to_lowercase();
    if lower.contains("nouveau") || lower.contains("naissance") {
        return Some(0);
    }

    if let Some(months) = number_before(&lower, "moi") {
        return Some(months);
    }
    number_before(&lower, "an").and_then(|years| years.checked_mul(12))
}

/// First digit run followed (after optional spaces) by `unit`.
fn number_before(text: &str, unit: &str) -> Option<u32> {
    let mut rest = text;
    while let Some(start) = rest.find(|c: char| c.is_ascii_digit()) {
        let tail = &rest[start..];
        let len = tail.find(|c: char| !c.is_ascii_digit()).unwrap_or(tail.len());
        let (digits, after) = tail.split_at(len);
        if after.trim_start().starts_with(unit) {
            return digits.parse().ok();
        }
        rest = after;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parsing() {
        assert_eq!(age_label_to_months("Nouveau-né"), Some(0));
        assert_eq!(age_label_to_months("Naissance"), Some(0));
        assert_eq!(age_label_to_months("6 mois"), Some(6));
        assert_eq!(age_label_to_months("1 an"), Some(12));
        assert_eq!(age_label_to_months("2 ans"), Some(24));
        assert_eq!(age_label_to_months("10mois"), Some(10));
        assert_eq!(age_label_to_months("adulte"), None);
        assert_eq!(age_label_to_months("3 semaines"), None);
    }

    #[test]
    fn test_label_number_anywhere() {
        assert_eq!(age_label_to_months("bébé 6 mois"), Some(6));
        assert_eq!(age_label_to_months("enfant de 3 ans"), Some(36));
        assert_eq!(age_label_to_months("1 an et 6 mois"), Some(6));
    }

    #[test]
    fn test_label_overflow_is_rejected() {
        assert_eq!(age_label_to_months("999999999 ans"), None);
        assert_eq!(age_label_to_months("99999999999 mois"), None);
        assert_eq!(age_label_to_months("357913942 ans"), None);
        assert_eq!(age_label_to_months("357913941 mois"), Some(357_913_941));
    }

    #[test]
    fn test_table_interpolation() {
        let model = WeightModel::Table;

        assert_eq!(model.estimate_weight(6.0), 7.5);
        assert_eq!(model.estimate_weight(18.0), 11.0);
        assert_eq!(model.estimate_weight(0.0), 3.0);
        assert_eq!(model.estimate_weight(400.0), 50.0);
        assert_eq!(model.estimate_weight(-5.0), 3.0);
    }

    #[test]
    fn test_apls_formulas() {
        let model = WeightModel::Apls;

        assert_eq!(model.estimate_weight(6.0), 6.5);
        assert_eq!(model.estimate_weight(24.0), 12.0);
        assert_eq!(model.estimate_weight(120.0), 37.0);
    }

    #[test]
    fn test_inverse_estimation() {
        assert_eq!(WeightModel::Table.estimate_months(7.5), 6);
        assert_eq!(WeightModel::Table.estimate_months(12.0), 24);
        assert_eq!(WeightModel::Table.estimate_months(100.0), 180);
        assert_eq!(WeightModel::Apls.estimate_months(12.0), 24);
        assert_eq!(WeightModel::Apls.estimate_months(1.0), 0);
    }
}
