//! Dosing engine.
//!
//! Pipeline: Variant Resolution → Dose Calculation → Guardrail Evaluation
//!
//! Every stage is a pure function of its inputs. The mutable form state
//! (confirmation acknowledgments, selected variants) lives in the controller.

mod calculator;
mod confirmation;
mod guardrails;
mod rules;
mod variants;

pub use calculator::*;
pub use confirmation::*;
pub use guardrails::*;
pub use rules::*;
pub use variants::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::EngineConfig;
use crate::models::{CalculationResult, DosageVariant, DrugRecord, GuardrailOutcome, Species};

/// Calculation errors. Values, not panics: a failed card still renders.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DoseError {
    #[error("Weight must be a positive number of kg")]
    InvalidWeight,

    #[error("Invalid catalog data: {0}")]
    InvalidCatalogData(String),

    #[error("Unit {dose_unit} cannot be divided by a {concentration_unit}/mL concentration")]
    UnitIncompatible {
        dose_unit: String,
        concentration_unit: String,
    },

    #[error("No usable dose rate for variant {0}")]
    MissingDoseRate(String),
}

pub type DoseResult<T> = Result<T, DoseError>;

/// One variant after calculation and guardrail evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantEvaluation {
    /// Catalog key of the variant
    pub variant: String,
    pub label: String,
    pub species_match: SpeciesMatch,
    pub result: DoseResult<CalculationResult>,
    pub outcome: GuardrailOutcome,
}

impl VariantEvaluation {
    /// Whether the card must hold the volume behind an acknowledgment.
    pub fn requires_confirmation(&self) -> bool {
        self.outcome.requires_confirmation
    }
}

/// Stateless front door over the three engine stages.
pub struct DosingEngine {
    resolver: VariantResolver,
    calculator: DoseCalculator,
    evaluator: GuardrailEvaluator,
}

impl Default for DosingEngine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl DosingEngine {
    /// Create an engine with the given configuration.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            resolver: VariantResolver::new(),
            calculator: DoseCalculator::new(),
            evaluator: GuardrailEvaluator::from_config(config),
        }
    }

    /// Evaluate one variant for a patient.
    ///
    /// A missing weight yields `InvalidWeight`; blocking alerts are still
    /// reported in the outcome.
    pub fn evaluate_variant(
        &self,
        drug: &DrugRecord,
        variant: &DosageVariant,
        species: Option<Species>,
        weight_kg: Option<f64>,
        concentration_confirmed: bool,
    ) -> VariantEvaluation {
        let result = match weight_kg {
            Some(weight) => self
                .calculator
                .compute(variant, weight, &drug.concentration, concentration_confirmed),
            None => Err(DoseError::InvalidWeight),
        };
        let outcome = match &result {
            Ok(calculation) => self.evaluator.evaluate(calculation, &drug.guardrails, variant),
            Err(_) => self.evaluator.evaluate_failure(&drug.guardrails, variant),
        };

        VariantEvaluation {
            variant: variant.name.clone(),
            label: variant.label(),
            species_match: SpeciesMatch::classify(variant.species, species),
            result,
            outcome,
        }
    }

    /// Evaluate every variant of a drug, best species match first.
    pub fn evaluate_drug(
        &self,
        drug: &DrugRecord,
        species: Option<Species>,
        weight_kg: Option<f64>,
        concentration_confirmed: bool,
    ) -> Vec<VariantEvaluation> {
        let evaluations: Vec<VariantEvaluation> = self
            .resolver
            .resolve(drug, species)
            .into_iter()
            .map(|variant| self.evaluate_variant(drug, variant, species, weight_kg, concentration_confirmed))
            .collect();

        debug!(
            drug = %drug.id,
            variants = evaluations.len(),
            failed = evaluations.iter().filter(|e| e.result.is_err()).count(),
            "drug evaluated"
        );
        evaluations
    }

    pub fn resolver(&self) -> &VariantResolver {
        &self.resolver
    }

    pub fn calculator(&self) -> &DoseCalculator {
        &self.calculator
    }

    pub fn evaluator(&self) -> &GuardrailEvaluator {
        &self.evaluator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Concentration, DosingModel, SpeciesTag};
    use crate::units::{CanonicalUnit, DoseUnit};

    fn mass(name: &str, rate: f64, species: Option<SpeciesTag>) -> DosageVariant {
        let mut v = DosageVariant::new(
            name,
            DosingModel::MassPerKg {
                rate,
                unit: DoseUnit::new(CanonicalUnit::milligram()),
            },
        );
        v.species = species;
        v
    }

    fn adrenaline() -> DrugRecord {
        let mut drug = DrugRecord::new("adrenaline", "Adrénaline", Concentration::mg_per_ml(1.0));
        drug.variants = vec![
            mass("feline", 0.02, Some(SpeciesTag::Only(Species::Feline))),
            mass("common", 0.01, Some(SpeciesTag::Both)),
        ];
        drug
    }

    #[test]
    fn test_evaluate_drug_orders_by_species() {
        let engine = DosingEngine::default();
        let evaluations = engine.evaluate_drug(&adrenaline(), Some(Species::Feline), Some(4.0), false);

        assert_eq!(evaluations.len(), 2);
        assert_eq!(evaluations[0].variant, "feline");
        assert_eq!(evaluations[0].species_match, SpeciesMatch::Target);
        assert_eq!(evaluations[1].species_match, SpeciesMatch::Both);
    }

    #[test]
    fn test_missing_weight_still_reports_alerts() {
        let mut drug = adrenaline();
        drug.guardrails.blocking_alerts = vec!["Contre-indiqué chez le chat".into()];

        let engine = DosingEngine::default();
        let evaluations = engine.evaluate_drug(&drug, Some(Species::Canine), None, false);

        for evaluation in &evaluations {
            assert_eq!(evaluation.result, Err(DoseError::InvalidWeight));
            assert_eq!(evaluation.outcome.blocking_alerts, vec!["Contre-indiqué chez le chat".to_string()]);
            assert!(!evaluation.outcome.dilution_warning);
        }
    }

    #[test]
    fn test_one_failing_variant_does_not_hide_the_others() {
        let mut drug = adrenaline();
        drug.variants[0].model = None;

        let engine = DosingEngine::default();
        let evaluations = engine.evaluate_drug(&drug, Some(Species::Canine), Some(20.0), false);

        let common = evaluations.iter().find(|e| e.variant == "common").unwrap();
        let feline = evaluations.iter().find(|e| e.variant == "feline").unwrap();
        assert!(common.result.is_ok());
        assert_eq!(feline.result, Err(DoseError::MissingDoseRate("feline".into())));
    }

    #[test]
    fn test_error_messages() {
        let err = DoseError::UnitIncompatible {
            dose_unit: "UI".into(),
            concentration_unit: "mg".into(),
        };
        assert_eq!(err.to_string(), "Unit UI cannot be divided by a mg/mL concentration");
    }
}
