//! Safety guardrail evaluation.
//!
//! Checks applied to every dose point of a result:
//! - dilution: `0 < volume < min_volume_ml` (strict on both ends)
//! - ceiling: `dose_per_kg` against the variant's `max_per_kg`
//!
//! A range result triggers a check if either end does.

use tracing::debug;

use crate::config::{CeilingRule, EngineConfig, DEFAULT_MIN_VOLUME_ML};
use crate::models::{CalculationResult, DosageVariant, GuardrailOutcome, SafetyGuardrails};

/// Derives warnings and the confirmation requirement from a result.
#[derive(Debug, Clone)]
pub struct GuardrailEvaluator {
    default_min_volume_ml: f64,
    ceiling_rule: CeilingRule,
}

impl Default for GuardrailEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_VOLUME_ML, CeilingRule::AtOrAbove)
    }
}

impl GuardrailEvaluator {
    pub fn new(default_min_volume_ml: f64, ceiling_rule: CeilingRule) -> Self {
        Self {
            default_min_volume_ml,
            ceiling_rule,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.default_min_volume_ml, config.ceiling_rule)
    }

    /// Dilution threshold for a drug: its own value when usable, else the default.
    ///
    /// A catalog value of zero is honoured and turns the dilution check off.
    pub fn min_volume_for(&self, guardrails: &SafetyGuardrails) -> f64 {
        match guardrails.min_volume_ml {
            Some(ml) if ml.is_finite() && ml >= 0.0 => ml,
            _ => self.default_min_volume_ml,
        }
    }

    /// Evaluate a successful calculation.
    pub fn evaluate(
        &self,
        result: &CalculationResult,
        guardrails: &SafetyGuardrails,
        variant: &DosageVariant,
    ) -> GuardrailOutcome {
        let mut outcome = self.evaluate_failure(guardrails, variant);
        let figures = result.figures();

        outcome.dilution_warning = figures.iter().any(|f| match f.volume.value() {
            Some(ml) => ml > 0.0 && ml < outcome.min_volume_ml,
            None => false,
        });
        outcome.max_dose_warning = match variant.max_per_kg {
            Some(ceiling) if ceiling.is_finite() => figures
                .iter()
                .any(|f| self.ceiling_rule.breached(f.dose_per_kg, ceiling)),
            _ => false,
        };
        outcome.concentration_unconfirmed = result.has_pending_volume();
        outcome.requires_confirmation =
            outcome.dilution_warning || outcome.max_dose_warning || outcome.concentration_unconfirmed;

        if outcome.requires_confirmation {
            debug!(
                variant = %variant.name,
                dilution = outcome.dilution_warning,
                max_dose = outcome.max_dose_warning,
                unconfirmed = outcome.concentration_unconfirmed,
                "guardrail triggered"
            );
        }
        outcome
    }

    /// Outcome for a variant whose calculation failed: texts and alerts only.
    pub fn evaluate_failure(&self, guardrails: &SafetyGuardrails, variant: &DosageVariant) -> GuardrailOutcome {
        let warnings = guardrails
            .warning_message
            .iter()
            .chain(variant.warning.iter())
            .cloned()
            .collect();

        GuardrailOutcome {
            dilution_warning: false,
            max_dose_warning: false,
            blocking_alerts: guardrails.blocking_alerts.clone(),
            warnings,
            dilution_hint: guardrails.dilution_hint.clone(),
            min_volume_ml: self.min_volume_for(guardrails),
            max_per_kg: variant.max_per_kg,
            concentration_unconfirmed: false,
            requires_confirmation: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DoseFigures, DosingModel, Volume};

    fn figures(dose_per_kg: f64, volume: Volume) -> DoseFigures {
        DoseFigures {
            dose_per_kg,
            dose_unit: "mg".into(),
            per_time: None,
            total_dose: 0.0,
            volume,
            expression: String::new(),
        }
    }

    fn single(dose_per_kg: f64, volume: Volume) -> CalculationResult {
        CalculationResult::Single(figures(dose_per_kg, volume))
    }

    fn variant(max_per_kg: Option<f64>) -> DosageVariant {
        let mut v = DosageVariant::new(
            "common",
            DosingModel::VolumePerKg {
                rate: 1.0,
                per_time: None,
            },
        );
        v.max_per_kg = max_per_kg;
        v
    }

    #[test]
    fn test_dilution_threshold_is_strict() {
        let evaluator = GuardrailEvaluator::default();
        let guardrails = SafetyGuardrails::default();

        let at = evaluator.evaluate(&single(0.01, Volume::Computed(0.1)), &guardrails, &variant(None));
        assert!(!at.dilution_warning);
        assert!(!at.requires_confirmation);

        let below = evaluator.evaluate(&single(0.01, Volume::Computed(0.03)), &guardrails, &variant(None));
        assert!(below.dilution_warning);
        assert!(below.requires_confirmation);

        let zero = evaluator.evaluate(&single(0.01, Volume::Computed(0.0)), &guardrails, &variant(None));
        assert!(!zero.dilution_warning);
    }

    #[test]
    fn test_catalog_threshold_overrides_default() {
        let evaluator = GuardrailEvaluator::default();
        let guardrails = SafetyGuardrails {
            min_volume_ml: Some(0.5),
            ..Default::default()
        };

        let outcome = evaluator.evaluate(&single(0.1, Volume::Computed(0.3)), &guardrails, &variant(None));
        assert!(outcome.dilution_warning);
        assert_eq!(outcome.min_volume_ml, 0.5);

        let unusable = SafetyGuardrails {
            min_volume_ml: Some(-1.0),
            ..Default::default()
        };
        assert_eq!(evaluator.min_volume_for(&unusable), 0.1);
        assert_eq!(evaluator.min_volume_for(&SafetyGuardrails::default()), 0.1);
    }

    #[test]
    fn test_zero_threshold_disables_dilution() {
        let evaluator = GuardrailEvaluator::default();
        let guardrails = SafetyGuardrails {
            min_volume_ml: Some(0.0),
            ..Default::default()
        };

        let outcome = evaluator.evaluate(&single(0.01, Volume::Computed(0.01)), &guardrails, &variant(None));
        assert_eq!(outcome.min_volume_ml, 0.0);
        assert!(!outcome.dilution_warning);
        assert!(!outcome.requires_confirmation);
    }

    #[test]
    fn test_ceiling_at_or_above() {
        let evaluator = GuardrailEvaluator::default();
        let guardrails = SafetyGuardrails::default();

        let at = evaluator.evaluate(&single(2.0, Volume::Computed(5.0)), &guardrails, &variant(Some(2.0)));
        assert!(at.max_dose_warning);
        assert!(at.requires_confirmation);

        let under = evaluator.evaluate(&single(1.9, Volume::Computed(5.0)), &guardrails, &variant(Some(2.0)));
        assert!(!under.max_dose_warning);

        let strict = GuardrailEvaluator::new(0.1, CeilingRule::Above);
        let at = strict.evaluate(&single(2.0, Volume::Computed(5.0)), &guardrails, &variant(Some(2.0)));
        assert!(!at.max_dose_warning);
    }

    #[test]
    fn test_range_triggers_on_either_side() {
        let evaluator = GuardrailEvaluator::default();
        let result = CalculationResult::Range {
            min: figures(0.5, Volume::Computed(0.05)),
            max: figures(1.0, Volume::Computed(0.5)),
        };

        let outcome = evaluator.evaluate(&result, &SafetyGuardrails::default(), &variant(Some(1.0)));
        assert!(outcome.dilution_warning);
        assert!(outcome.max_dose_warning);
    }

    #[test]
    fn test_pending_volume_requires_confirmation() {
        let evaluator = GuardrailEvaluator::default();
        let outcome = evaluator.evaluate(
            &single(0.5, Volume::Pending),
            &SafetyGuardrails::default(),
            &variant(None),
        );

        assert!(outcome.concentration_unconfirmed);
        assert!(!outcome.dilution_warning);
        assert!(outcome.requires_confirmation);
    }

    #[test]
    fn test_blocking_alerts_always_surfaced() {
        let evaluator = GuardrailEvaluator::default();
        let guardrails = SafetyGuardrails {
            blocking_alerts: vec!["Toxique chez le chat".into()],
            warning_message: Some("Bradycardie possible".into()),
            ..Default::default()
        };
        let mut v = variant(None);
        v.warning = Some("IV lent".into());

        let ok = evaluator.evaluate(&single(1.0, Volume::Computed(10.0)), &guardrails, &v);
        assert_eq!(ok.blocking_alerts, vec!["Toxique chez le chat".to_string()]);
        assert_eq!(ok.warnings, vec!["Bradycardie possible".to_string(), "IV lent".to_string()]);
        assert!(!ok.requires_confirmation);

        let failed = evaluator.evaluate_failure(&guardrails, &v);
        assert_eq!(failed.blocking_alerts, ok.blocking_alerts);
        assert!(!failed.requires_confirmation);
    }
}
