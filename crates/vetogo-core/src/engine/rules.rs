//! Rule-based dosing for protocol flows.
//!
//! Order of application:
//! 1. a weight-band override (inclusive bounds) wins outright
//! 2. the rule basis gives a raw dose (mg/kg × weight, or a fixed dose)
//! 3. absolute clamps: `min_dose_mg`, then `max_dose_mg`
//! 4. rounding to `rounding_step_mg`, never down to zero
//!
//! A `range` basis is informative only and yields no number.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DoseError, DoseResult};

/// Note shown for a range rule without its own note.
const RANGE_NOTE: &str = "Voir protocole pour l'intervalle";
/// Note shown for a rule with no usable basis.
const UNDEFINED_NOTE: &str = "Règle non définie";

/// Ceftriaxone ceiling for children (mg).
pub const CEFTRIAXONE_CHILD_MAX_MG: f64 = 1000.0;
/// Ceftriaxone ceiling for adolescents (mg).
pub const CEFTRIAXONE_TEEN_MAX_MG: f64 = 2000.0;
const TEEN_LABELS: &[&str] = &["12 ans", "13 ans", "14 ans", "15 ans"];

/// How a rule derives its raw dose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoseBasis {
    MgPerKg,
    /// `min_dose_mg` is the dose
    Fixed,
    /// Interval described in the protocol text
    Range,
}

/// A protocol dosing rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DosingRule {
    pub basis: DoseBasis,
    #[serde(default)]
    pub mg_per_kg: Option<f64>,
    /// Dose is per administration rather than per day
    #[serde(default)]
    pub per_dose: bool,
    #[serde(default)]
    pub min_dose_mg: Option<f64>,
    #[serde(default)]
    pub max_dose_mg: Option<f64>,
    #[serde(default)]
    pub max_daily_mg_per_kg: Option<f64>,
    #[serde(default)]
    pub rounding_step_mg: Option<f64>,
    #[serde(default, rename = "frequency_text")]
    pub frequency: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default, rename = "notes")]
    pub note: Option<String>,
}

impl DosingRule {
    /// A per-dose mg/kg rule.
    pub fn mg_per_kg(rate: f64) -> Self {
        Self {
            basis: DoseBasis::MgPerKg,
            mg_per_kg: Some(rate),
            per_dose: true,
            min_dose_mg: None,
            max_dose_mg: None,
            max_daily_mg_per_kg: None,
            rounding_step_mg: None,
            frequency: None,
            route: None,
            note: None,
        }
    }

    pub fn with_max_dose_mg(mut self, max_dose_mg: f64) -> Self {
        self.max_dose_mg = Some(max_dose_mg);
        self
    }

    pub fn with_rounding_step(mut self, step_mg: f64) -> Self {
        self.rounding_step_mg = Some(step_mg);
        self
    }
}

/// A fixed dose for a weight band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightOverride {
    pub min_kg: f64,
    pub max_kg: f64,
    pub dose_mg: f64,
    #[serde(default)]
    pub note: Option<String>,
}

impl WeightOverride {
    pub fn contains(&self, weight_kg: f64) -> bool {
        weight_kg >= self.min_kg && weight_kg <= self.max_kg
    }
}

/// Where a rule dose came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoseSource {
    Override,
    Rule,
}

/// Result of applying a rule to a weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDose {
    /// Dose in mg; `None` for range rules and undefined rules
    pub dose_mg: Option<f64>,
    pub source: DoseSource,
    /// `max_daily_mg_per_kg × weight`, when the rule has one
    pub max_daily_mg: Option<f64>,
    pub route: Option<String>,
    pub frequency: Option<String>,
    pub note: Option<String>,
}

/// Round to the nearest multiple of `step`; a positive value never becomes zero.
pub fn round_to_step(value: f64, step: Option<f64>) -> f64 {
    let step = match step {
        Some(step) if step.is_finite() && step > 0.0 => step,
        _ => return value,
    };
    let rounded = (value / step).round() * step;
    if value > 0.0 && rounded == 0.0 {
        step
    } else {
        rounded
    }
}

/// Apply a rule (and its weight-band overrides) to a patient weight.
pub fn compute_rule_dose(weight_kg: f64, rule: &DosingRule, overrides: &[WeightOverride]) -> DoseResult<RuleDose> {
    if !weight_kg.is_finite() || weight_kg <= 0.0 {
        return Err(DoseError::InvalidWeight);
    }

    if let Some(band) = overrides.iter().find(|o| o.contains(weight_kg)) {
        debug!(weight_kg, dose_mg = band.dose_mg, "weight band override");
        return Ok(RuleDose {
            dose_mg: Some(band.dose_mg),
            source: DoseSource::Override,
            max_daily_mg: None,
            route: rule.route.clone(),
            frequency: rule.frequency.clone(),
            note: band.note.clone().or_else(|| rule.note.clone()),
        });
    }

    let positive = |v: Option<f64>| v.filter(|x| x.is_finite() && *x > 0.0);
    let raw = match (rule.basis, positive(rule.mg_per_kg), positive(rule.min_dose_mg)) {
        (DoseBasis::MgPerKg, Some(rate), _) => weight_kg * rate,
        (DoseBasis::Fixed, _, Some(fixed)) => fixed,
        (DoseBasis::Range, _, _) => return Ok(informative(rule, RANGE_NOTE)),
        _ => return Ok(informative(rule, UNDEFINED_NOTE)),
    };

    let mut dose = raw;
    if let Some(min) = positive(rule.min_dose_mg) {
        dose = dose.max(min);
    }
    if let Some(max) = positive(rule.max_dose_mg) {
        dose = dose.min(max);
    }
    let dose = round_to_step(dose, rule.rounding_step_mg);

    Ok(RuleDose {
        dose_mg: Some(dose),
        source: DoseSource::Rule,
        max_daily_mg: positive(rule.max_daily_mg_per_kg).map(|per_kg| per_kg * weight_kg),
        route: rule.route.clone(),
        frequency: rule.frequency.clone(),
        note: rule.note.clone(),
    })
}

fn informative(rule: &DosingRule, fallback: &str) -> RuleDose {
    RuleDose {
        dose_mg: None,
        source: DoseSource::Rule,
        max_daily_mg: None,
        route: rule.route.clone(),
        frequency: rule.frequency.clone(),
        note: Some(rule.note.clone().unwrap_or_else(|| fallback.to_string())),
    }
}

/// Ceftriaxone ceiling by age label: 2 g for adolescents, 1 g otherwise.
pub fn ceftriaxone_max_mg(age_label: Option<&str>) -> f64 {
    match age_label.map(str::trim) {
        Some(label) if TEEN_LABELS.contains(&label) => CEFTRIAXONE_TEEN_MAX_MG,
        _ => CEFTRIAXONE_CHILD_MAX_MG,
    }
}
