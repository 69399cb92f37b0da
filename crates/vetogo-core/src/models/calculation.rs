//! Calculation and guardrail result models.

use serde::{Deserialize, Serialize};

use crate::audit;
use crate::units::TimeBasis;

/// Injectable volume, or an explicit marker that it is withheld.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "ml", rename_all = "snake_case")]
pub enum Volume {
    /// Volume in mL (mL per time unit for infusion rates)
    Computed(f64),
    /// Withheld until the user confirms a variable concentration
    Pending,
}

impl Volume {
    /// The computed volume, if any.
    pub fn value(&self) -> Option<f64> {
        match self {
            Volume::Computed(ml) => Some(*ml),
            Volume::Pending => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Volume::Pending)
    }
}

/// The figures for one dose point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseFigures {
    /// Dose per kg as listed in the catalog
    pub dose_per_kg: f64,
    /// Canonical dose unit ("mg", "µg", "UI", "mL")
    pub dose_unit: String,
    /// Time basis for infusion rates
    pub per_time: Option<TimeBasis>,
    /// Dose for this patient, in `dose_unit`
    pub total_dose: f64,
    pub volume: Volume,
    /// Arithmetic used, for display and audit only
    pub expression: String,
}

/// Output of the dose calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalculationResult {
    Single(DoseFigures),
    /// Independent figures for both ends of a range; never averaged
    Range { min: DoseFigures, max: DoseFigures },
}

impl CalculationResult {
    /// All dose points in this result (one, or min then max).
    pub fn figures(&self) -> Vec<&DoseFigures> {
        match self {
            CalculationResult::Single(figures) => vec![figures],
            CalculationResult::Range { min, max } => vec![min, max],
        }
    }

    /// Whether any volume is withheld pending confirmation.
    pub fn has_pending_volume(&self) -> bool {
        self.figures().iter().any(|f| f.volume.is_pending())
    }

    /// SHA-256 over the canonical JSON of this result.
    pub fn audit_digest(&self) -> Result<String, serde_json::Error> {
        audit::digest_json(self)
    }
}

/// Safety evaluation of a calculation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailOutcome {
    /// Volume strictly between zero and the minimum threshold
    pub dilution_warning: bool,
    /// Dose per kg reached the variant ceiling
    pub max_dose_warning: bool,
    /// Contraindications, surfaced regardless of the numbers
    pub blocking_alerts: Vec<String>,
    /// Drug and variant warning texts
    pub warnings: Vec<String>,
    pub dilution_hint: Option<String>,
    /// Threshold actually applied
    pub min_volume_ml: f64,
    /// Ceiling actually applied
    pub max_per_kg: Option<f64>,
    /// Volume withheld because the concentration is not confirmed
    pub concentration_unconfirmed: bool,
    pub requires_confirmation: bool,
}
