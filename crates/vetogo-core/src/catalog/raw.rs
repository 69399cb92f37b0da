//! Wire format of the drug catalog and its conversion into validated records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::models::{
    Concentration, DosageVariant, DosingModel, DrugRecord, SafetyGuardrails, Species, SpeciesTag,
};
use crate::units::{CanonicalUnit, DoseUnit, UnitFamily, UnitNormalizer};

use super::{CatalogError, CatalogResult};

/// Unit assumed for `dose_amount_kg` when neither the variant nor the drug names one.
const FALLBACK_AMOUNT_UNIT: &str = "UI";

/// Catalog provenance block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogMeta {
    pub version: Option<String>,
    pub last_updated: Option<String>,
    pub source: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCatalog {
    #[serde(default)]
    pub meta: CatalogMeta,
    #[serde(default)]
    pub species_config: BTreeMap<String, RawSpeciesConfig>,
    pub drugs: Vec<RawCategory>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSpeciesConfig {
    pub display_name: Option<String>,
    #[serde(default)]
    pub forbidden_drugs: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCategory {
    pub category_name: Option<String>,
    pub items: Vec<RawDrug>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawDrug {
    pub id: String,
    pub name: String,
    pub concentration_label: Option<String>,
    pub concentration_mg_ml: f64,
    pub unit_type: Option<String>,
    #[serde(default)]
    pub requires_concentration_confirmation: Option<bool>,
    #[serde(default)]
    pub usual_concentrations: Vec<String>,
    pub concentration_warning: Option<String>,
    #[serde(default)]
    pub is_high_alert: bool,
    #[serde(default)]
    pub routes: Vec<String>,
    /// Variants keyed by name; key order is catalog order
    #[serde(default)]
    pub dosage: Map<String, Value>,
    pub safety_guardrails: Option<RawGuardrails>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawDosage {
    pub dose_mg_kg: Option<f64>,
    pub range_mg_kg: Option<Vec<f64>>,
    pub dose_amount_kg: Option<f64>,
    pub unit: Option<String>,
    pub range: Option<Vec<f64>>,
    pub dose_ml_kg: Option<f64>,
    pub range_ml_kg: Option<Vec<f64>>,
    pub max_dose_mg_kg: Option<f64>,
    pub species: Option<String>,
    pub route: Option<String>,
    pub condition: Option<String>,
    pub frequency: Option<String>,
    pub note: Option<String>,
    pub instruction: Option<String>,
    pub warning_msg: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawGuardrails {
    pub min_volume_ml: Option<f64>,
    #[serde(default)]
    pub blocking_alerts: Vec<String>,
    #[serde(default)]
    pub contraindications: Vec<String>,
    pub warning_msg: Option<String>,
    pub dilution_hint: Option<String>,
    pub note: Option<String>,
}

impl RawDrug {
    /// Validate and convert into an immutable record.
    pub(crate) fn into_record(self, category: Option<&str>, normalizer: &UnitNormalizer) -> CatalogResult<DrugRecord> {
        if self.id.trim().is_empty() {
            return Err(CatalogError::InvalidDrug("drug with an empty id".into()));
        }
        if !self.concentration_mg_ml.is_finite() || self.concentration_mg_ml <= 0.0 {
            return Err(CatalogError::InvalidConcentration {
                drug: self.id,
                value: self.concentration_mg_ml,
            });
        }

        let unit_type = self.unit_type.as_deref().unwrap_or("mg");
        let concentration_unit = normalizer.normalize(unit_type).map_err(|_| CatalogError::UnknownUnit {
            drug: self.id.clone(),
            unit: unit_type.to_string(),
        })?;
        let variable = self.requires_concentration_confirmation.unwrap_or(false)
            || self
                .concentration_label
                .as_deref()
                .is_some_and(|label| label.to_lowercase().contains("variable"));

        let concentration = Concentration {
            value: self.concentration_mg_ml,
            unit: concentration_unit,
            variable,
        };
        let mut record = DrugRecord::new(self.id.clone(), self.name, concentration);
        if let Some(label) = self.concentration_label {
            record.concentration_label = label;
        }
        record.category = category.map(str::to_string);
        record.usual_concentrations = self.usual_concentrations;
        record.concentration_warning = self.concentration_warning;
        record.routes = self.routes;
        record.high_alert = self.is_high_alert;

        for (key, value) in &self.dosage {
            let raw = RawDosage::deserialize(value).map_err(|e| CatalogError::InvalidDose {
                drug: self.id.clone(),
                variant: key.clone(),
                reason: e.to_string(),
            })?;
            record
                .variants
                .push(raw.into_variant(&self.id, key, self.unit_type.as_deref(), normalizer)?);
        }

        if let Some(raw) = self.safety_guardrails {
            record.guardrails = raw.into_guardrails();
        }
        Ok(record)
    }
}

impl RawDosage {
    fn into_variant(
        self,
        drug: &str,
        key: &str,
        unit_type: Option<&str>,
        normalizer: &UnitNormalizer,
    ) -> CatalogResult<DosageVariant> {
        let invalid = |reason: String| CatalogError::InvalidDose {
            drug: drug.to_string(),
            variant: key.to_string(),
            reason,
        };
        let parse_unit = |label: &str| {
            normalizer.parse_dose_unit(label).map_err(|_| CatalogError::UnknownUnit {
                drug: drug.to_string(),
                unit: label.to_string(),
            })
        };

        for (field, value) in [
            ("dose_mg_kg", self.dose_mg_kg),
            ("dose_amount_kg", self.dose_amount_kg),
            ("dose_ml_kg", self.dose_ml_kg),
            ("max_dose_mg_kg", self.max_dose_mg_kg),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(invalid(format!("{} must not be negative, got {}", field, v)));
                }
            }
        }

        let amount_label = self.unit.as_deref().or(unit_type).unwrap_or(FALLBACK_AMOUNT_UNIT);

        // zero counts as not given
        let model = if let Some(rate) = self.dose_mg_kg.filter(|v| *v > 0.0) {
            Some(DosingModel::MassPerKg {
                rate,
                unit: DoseUnit::new(CanonicalUnit::milligram()),
            })
        } else if let Some(rate) = self.dose_amount_kg.filter(|v| *v > 0.0) {
            let unit = parse_unit(amount_label)?;
            Some(match unit.unit.family {
                UnitFamily::Mass => DosingModel::MassPerKg { rate, unit },
                UnitFamily::Count => DosingModel::CountPerKg { rate, unit },
                UnitFamily::Volume => DosingModel::VolumePerKg {
                    rate,
                    per_time: unit.per_time,
                },
            })
        } else if let Some(rate) = self.dose_ml_kg.filter(|v| *v > 0.0) {
            Some(DosingModel::VolumePerKg { rate, per_time: None })
        } else if let Some(range) = &self.range_mg_kg {
            let (min, max) = range_pair(range).map_err(invalid)?;
            Some(DosingModel::FixedRange {
                family: UnitFamily::Mass,
                min,
                max,
                unit: DoseUnit::new(CanonicalUnit::milligram()),
            })
        } else if let (Some(range), Some(label)) = (&self.range, self.unit.as_deref()) {
            let (min, max) = range_pair(range).map_err(invalid)?;
            let unit = parse_unit(label)?;
            Some(DosingModel::FixedRange {
                family: unit.unit.family,
                min,
                max,
                unit,
            })
        } else if let Some(range) = &self.range_ml_kg {
            let (min, max) = range_pair(range).map_err(invalid)?;
            Some(DosingModel::FixedRange {
                family: UnitFamily::Volume,
                min,
                max,
                unit: DoseUnit::new(CanonicalUnit::millilitre()),
            })
        } else {
            warn!(drug, variant = key, "variant has no numeric dose");
            None
        };

        let species = match self.species.as_deref() {
            Some(explicit) => species_tag(explicit),
            None => species_tag(key),
        };

        Ok(DosageVariant {
            name: key.to_string(),
            model,
            species,
            route: self.route,
            condition: self.condition,
            max_per_kg: self.max_dose_mg_kg,
            note: self.note,
            frequency: self.frequency,
            instruction: self.instruction,
            warning: self.warning_msg,
        })
    }
}

impl RawGuardrails {
    fn into_guardrails(self) -> SafetyGuardrails {
        let mut blocking_alerts = self.blocking_alerts;
        blocking_alerts.extend(self.contraindications);
        SafetyGuardrails {
            min_volume_ml: self.min_volume_ml,
            blocking_alerts,
            warning_message: self.warning_msg,
            dilution_hint: self.dilution_hint,
            note: self.note,
        }
    }
}

/// Species scope from a variant key or explicit tag.
///
/// `canine`, `canine_*` → canine only; `feline`, `feline_*` → feline only;
/// `common`/`both` → every species; anything else is untagged.
pub(crate) fn species_tag(key: &str) -> Option<SpeciesTag> {
    let lower = key.trim().to_lowercase();
    for species in [Species::Canine, Species::Feline] {
        if lower == species.key() || lower.starts_with(&format!("{}_", species.key())) {
            return Some(SpeciesTag::Only(species));
        }
    }
    match lower.as_str() {
        "common" | "both" => Some(SpeciesTag::Both),
        _ => None,
    }
}

fn range_pair(range: &[f64]) -> Result<(f64, f64), String> {
    match range {
        [min, max] if min.is_finite() && max.is_finite() && *min >= 0.0 && min <= max => Ok((*min, *max)),
        _ => Err(format!("range must be [min, max] with 0 <= min <= max, got {:?}", range)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::TimeBasis;

    fn drug(json: &str) -> CatalogResult<DrugRecord> {
        let raw: RawDrug = serde_json::from_str(json).unwrap();
        raw.into_record(Some("TEST"), &UnitNormalizer::new())
    }

    #[test]
    fn test_species_tags_from_keys() {
        assert_eq!(species_tag("canine"), Some(SpeciesTag::Only(Species::Canine)));
        assert_eq!(species_tag("feline_cri"), Some(SpeciesTag::Only(Species::Feline)));
        assert_eq!(species_tag("common"), Some(SpeciesTag::Both));
        assert_eq!(species_tag("it_override"), None);
    }

    #[test]
    fn test_mass_dose_takes_precedence_over_range() {
        let record = drug(
            r#"{"id": "ketamine", "name": "Kétamine", "concentration_label": "100 mg/mL",
                "concentration_mg_ml": 100, "dosage": {"common": {"dose_mg_kg": 5.0, "range_mg_kg": [2.0, 10.0]}}}"#,
        )
        .unwrap();

        assert_eq!(
            record.variants[0].model,
            Some(DosingModel::MassPerKg {
                rate: 5.0,
                unit: DoseUnit::new(CanonicalUnit::milligram()),
            })
        );
        assert_eq!(record.category.as_deref(), Some("TEST"));
    }

    #[test]
    fn test_amount_dose_follows_unit_family() {
        let record = drug(
            r#"{"id": "kcl", "name": "KCl", "concentration_mg_ml": 2, "unit_type": "mEq",
                "dosage": {"common": {"dose_amount_kg": 0.5, "unit": "mEq/kg/h (MAX)"}}}"#,
        )
        .unwrap();

        match &record.variants[0].model {
            Some(DosingModel::CountPerKg { rate, unit }) => {
                assert_eq!(*rate, 0.5);
                assert_eq!(unit.unit.token, "mEq");
                assert_eq!(unit.per_time, Some(TimeBasis::PerHour));
            }
            other => panic!("unexpected model {:?}", other),
        }
        assert_eq!(record.concentration.unit.token, "mEq");
    }

    #[test]
    fn test_variants_keep_catalog_order() {
        let record = drug(
            r#"{"id": "x", "name": "X", "concentration_mg_ml": 1,
                "dosage": {"it_override": {"dose_mg_kg": 0.02}, "common": {"dose_mg_kg": 0.01}, "feline": {"dose_ml_kg": 1}}}"#,
        )
        .unwrap();

        let names: Vec<&str> = record.variants.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["it_override", "common", "feline"]);
    }

    #[test]
    fn test_variable_concentration_detection() {
        let record = drug(
            r#"{"id": "pheno", "name": "Phénobarbital", "concentration_label": "Variable (ex: 200 mg/mL)",
                "concentration_mg_ml": 200, "dosage": {}}"#,
        )
        .unwrap();
        assert!(record.requires_concentration_confirmation());

        let record = drug(
            r#"{"id": "k", "name": "K", "concentration_mg_ml": 1, "requires_concentration_confirmation": true, "dosage": {}}"#,
        )
        .unwrap();
        assert!(record.requires_concentration_confirmation());
    }

    #[test]
    fn test_guardrails_merge_contraindications() {
        let record = drug(
            r#"{"id": "atropine", "name": "Atropine", "concentration_mg_ml": 0.54, "dosage": {},
                "safety_guardrails": {"contraindications": ["Glaucome"], "min_volume_ml": null}}"#,
        )
        .unwrap();

        assert_eq!(record.guardrails.blocking_alerts, vec!["Glaucome".to_string()]);
        assert_eq!(record.guardrails.min_volume_ml, None);
    }

    #[test]
    fn test_rejections() {
        assert!(matches!(
            drug(r#"{"id": "a", "name": "A", "concentration_mg_ml": 0, "dosage": {}}"#),
            Err(CatalogError::InvalidConcentration { .. })
        ));
        assert!(matches!(
            drug(r#"{"id": "a", "name": "A", "concentration_mg_ml": 1, "unit_type": "furlong", "dosage": {}}"#),
            Err(CatalogError::UnknownUnit { .. })
        ));
        assert!(matches!(
            drug(r#"{"id": "a", "name": "A", "concentration_mg_ml": 1, "dosage": {"common": {"dose_mg_kg": -1}}}"#),
            Err(CatalogError::InvalidDose { .. })
        ));
        assert!(matches!(
            drug(r#"{"id": "a", "name": "A", "concentration_mg_ml": 1, "dosage": {"common": {"range_mg_kg": [2, 1]}}}"#),
            Err(CatalogError::InvalidDose { .. })
        ));
    }

    #[test]
    fn test_variant_without_dose_is_kept() {
        let record = drug(
            r#"{"id": "a", "name": "A", "concentration_mg_ml": 1, "dosage": {"common": {"note": "Voir protocole"}}}"#,
        )
        .unwrap();

        assert_eq!(record.variants.len(), 1);
        assert!(record.variants[0].model.is_none());
        assert_eq!(record.variants[0].note.as_deref(), Some("Voir protocole"));
    }
}
