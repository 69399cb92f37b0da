//! Weight-based dose and volume calculation.
//!
//! Models:
//! - mass per kg: `total = rate × weight`, `volume = total × factor / concentration`
//! - count per kg: same shape, units must be identical (UI with UI)
//! - volume per kg: `volume = rate × weight`, no concentration step
//! - fixed range: the matching formula applied to each end independently

use tracing::{debug, warn};

use crate::format::per_kg_unit_label;
use crate::models::{
    CalculationResult, Concentration, DosageVariant, DoseFigures, DosingModel, Volume,
};
use crate::units::{DoseUnit, TimeBasis, UnitError, UnitFamily, UnitNormalizer};

use super::{DoseError, DoseResult};

/// Pure dose calculator.
pub struct DoseCalculator {
    normalizer: UnitNormalizer,
}

impl Default for DoseCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl DoseCalculator {
    /// Create a calculator with the default unit table.
    pub fn new() -> Self {
        Self {
            normalizer: UnitNormalizer::new(),
        }
    }

    /// Create a calculator with a custom normalizer.
    pub fn with_normalizer(normalizer: UnitNormalizer) -> Self {
        Self { normalizer }
    }

    pub fn normalizer(&self) -> &UnitNormalizer {
        &self.normalizer
    }

    /// Compute the dose and volume for one variant.
    ///
    /// `confirmed` releases the volume of a variable concentration; it is
    /// ignored for fixed concentrations.
    pub fn compute(
        &self,
        variant: &DosageVariant,
        weight_kg: f64,
        concentration: &Concentration,
        confirmed: bool,
    ) -> DoseResult<CalculationResult> {
        if !weight_kg.is_finite() || weight_kg <= 0.0 {
            return Err(DoseError::InvalidWeight);
        }
        if !concentration.value.is_finite() || concentration.value <= 0.0 {
            return Err(DoseError::InvalidCatalogData(format!(
                "concentration must be positive, got {}",
                concentration.value
            )));
        }

        let model = variant
            .model
            .as_ref()
            .ok_or_else(|| DoseError::MissingDoseRate(variant.name.clone()))?;
        let release_volume = confirmed || !concentration.variable;

        let result = match model {
            DosingModel::MassPerKg { rate, unit } | DosingModel::CountPerKg { rate, unit } => {
                let rate = usable_rate(*rate, variant)?;
                CalculationResult::Single(self.divided(rate, unit, weight_kg, concentration, release_volume)?)
            }
            DosingModel::VolumePerKg { rate, per_time } => {
                let rate = usable_rate(*rate, variant)?;
                CalculationResult::Single(volume_direct(rate, *per_time, weight_kg))
            }
            DosingModel::FixedRange {
                family,
                min,
                max,
                unit,
            } => {
                let min = usable_rate(*min, variant)?;
                let max = usable_rate(*max, variant)?;
                let point = |rate: f64| -> DoseResult<DoseFigures> {
                    match family {
                        UnitFamily::Volume => Ok(volume_direct(rate, unit.per_time, weight_kg)),
                        UnitFamily::Mass | UnitFamily::Count => {
                            self.divided(rate, unit, weight_kg, concentration, release_volume)
                        }
                    }
                };
                CalculationResult::Range {
                    min: point(min)?,
                    max: point(max)?,
                }
            }
        };

        debug!(
            variant = %variant.name,
            weight_kg,
            pending = result.has_pending_volume(),
            "dose computed"
        );
        Ok(result)
    }

    /// Mass or count dose divided by the concentration.
    fn divided(
        &self,
        rate: f64,
        unit: &DoseUnit,
        weight_kg: f64,
        concentration: &Concentration,
        release_volume: bool,
    ) -> DoseResult<DoseFigures> {
        let conversion = self
            .normalizer
            .check_compatible(&unit.unit, &concentration.unit)
            .map_err(|e| match e {
                UnitError::Incompatible {
                    dose_unit,
                    concentration_unit,
                    ..
                } => DoseError::UnitIncompatible {
                    dose_unit,
                    concentration_unit,
                },
                UnitError::Unknown(token) => DoseError::InvalidCatalogData(format!("unknown unit {}", token)),
            })?;
        if conversion.family == UnitFamily::Volume {
            warn!(dose_unit = %unit.unit, "volume dose reached the concentration step");
            return Err(DoseError::UnitIncompatible {
                dose_unit: unit.unit.token.clone(),
                concentration_unit: concentration.unit.token.clone(),
            });
        }

        let total_dose = rate * weight_kg;
        let rate_label = per_kg_unit_label(&unit.unit.token, unit.per_time);
        let scaled = if conversion.factor == 1.0 {
            format!("{} kg × {} {}", weight_kg, rate, rate_label)
        } else {
            format!("{} kg × {} {} × {}", weight_kg, rate, rate_label, conversion.factor)
        };

        let (volume, expression) = if release_volume {
            let volume = total_dose * conversion.factor / concentration.value;
            let expression = format!(
                "Vol = ({}) / {} {}/mL",
                scaled, concentration.value, concentration.unit.token
            );
            (Volume::Computed(volume), expression)
        } else {
            (Volume::Pending, format!("Dose = {}", scaled))
        };

        Ok(DoseFigures {
            dose_per_kg: rate,
            dose_unit: unit.unit.token.clone(),
            per_time: unit.per_time,
            total_dose,
            volume,
            expression,
        })
    }
}

/// Volume-per-kg dose: the total is the volume.
fn volume_direct(rate: f64, per_time: Option<TimeBasis>, weight_kg: f64) -> DoseFigures {
    let volume = rate * weight_kg;
    DoseFigures {
        dose_per_kg: rate,
        dose_unit: "mL".to_string(),
        per_time,
        total_dose: volume,
        volume: Volume::Computed(volume),
        expression: format!(
            "Vol = {} kg × {} {}",
            weight_kg,
            rate,
            per_kg_unit_label("mL", per_time)
        ),
    }
}

/// Reject zero, negative and non-finite rates as "no data".
fn usable_rate(rate: f64, variant: &DosageVariant) -> DoseResult<f64> {
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(DoseError::MissingDoseRate(variant.name.clone()))
    }
}
