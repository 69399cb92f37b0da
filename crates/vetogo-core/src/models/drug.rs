//! Drug catalog models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::units::{CanonicalUnit, DoseUnit, TimeBasis, UnitFamily};

/// Patient species handled by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    Canine,
    Feline,
}

impl Species {
    /// Catalog key for this species.
    pub fn key(&self) -> &'static str {
        match self {
            Species::Canine => "canine",
            Species::Feline => "feline",
        }
    }

    /// French display label.
    pub fn display_name(&self) -> &'static str {
        match self {
            Species::Canine => "Chien",
            Species::Feline => "Chat",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Species {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "canine" | "chien" | "dog" => Ok(Species::Canine),
            "feline" | "chat" | "cat" => Ok(Species::Feline),
            other => Err(format!("unknown species: {}", other)),
        }
    }
}

/// Species scope of a dosage variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeciesTag {
    /// Applies to one species only
    Only(Species),
    /// Applies to every species
    Both,
}

/// The dosing model of a variant, decided once at catalog validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum DosingModel {
    /// Mass per kg (mg/kg, µg/kg/min), divided by the concentration
    MassPerKg { rate: f64, unit: DoseUnit },
    /// Administration volume per kg (mL/kg), no division
    VolumePerKg {
        rate: f64,
        per_time: Option<TimeBasis>,
    },
    /// Count per kg (UI/kg, mEq/kg), divided by a same-unit concentration
    CountPerKg { rate: f64, unit: DoseUnit },
    /// A [min, max] per-kg pair in one of the three families
    FixedRange {
        family: UnitFamily,
        min: f64,
        max: f64,
        unit: DoseUnit,
    },
}

impl DosingModel {
    /// Family of the dose unit.
    pub fn family(&self) -> UnitFamily {
        match self {
            DosingModel::MassPerKg { .. } => UnitFamily::Mass,
            DosingModel::VolumePerKg { .. } => UnitFamily::Volume,
            DosingModel::CountPerKg { .. } => UnitFamily::Count,
            DosingModel::FixedRange { family, .. } => *family,
        }
    }
}

/// One named dosing definition for a drug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DosageVariant {
    /// Catalog key (e.g., "canine", "common", "status_epilepticus")
    pub name: String,
    /// Dosing model; `None` when the catalog gives no usable numeric dose
    pub model: Option<DosingModel>,
    /// Species scope; untagged variants behave like `Both`
    pub species: Option<SpeciesTag>,
    /// Route label (e.g., "IV lent")
    pub route: Option<String>,
    /// Clinical condition label
    pub condition: Option<String>,
    /// Per-kg ceiling, in the variant's own dose unit
    pub max_per_kg: Option<f64>,
    pub note: Option<String>,
    pub frequency: Option<String>,
    pub instruction: Option<String>,
    /// Variant-level warning text
    pub warning: Option<String>,
}

impl DosageVariant {
    /// Create a variant with only a name and model.
    pub fn new(name: impl Into<String>, model: DosingModel) -> Self {
        Self {
            name: name.into(),
            model: Some(model),
            species: None,
            route: None,
            condition: None,
            max_per_kg: None,
            note: None,
            frequency: None,
            instruction: None,
            warning: None,
        }
    }

    /// Short label combining route and condition, falling back to the name.
    pub fn label(&self) -> String {
        match (&self.route, &self.condition) {
            (Some(route), Some(condition)) => format!("{} ({})", condition, route),
            (None, Some(condition)) => condition.clone(),
            (Some(route), None) => format!("{} ({})", self.name, route),
            (None, None) => self.name.clone(),
        }
    }
}

/// Stock concentration of the available preparation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concentration {
    /// Amount of active substance per mL
    pub value: f64,
    /// Numerator unit (mg, UI, mEq…)
    pub unit: CanonicalUnit,
    /// Whether the preparation varies and the user must confirm it
    pub variable: bool,
}

impl Concentration {
    /// A fixed mg/mL concentration.
    pub fn mg_per_ml(value: f64) -> Self {
        Self {
            value,
            unit: CanonicalUnit::milligram(),
            variable: false,
        }
    }
}

/// Drug-level safety configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SafetyGuardrails {
    /// Volume below which dilution is advised; engine default when `None`
    pub min_volume_ml: Option<f64>,
    /// Categorical contraindications, always surfaced
    pub blocking_alerts: Vec<String>,
    pub warning_message: Option<String>,
    pub dilution_hint: Option<String>,
    pub note: Option<String>,
}

/// A drug as supplied by the catalog. Immutable once validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugRecord {
    /// Catalog identifier (e.g., "adrenaline")
    pub id: String,
    /// Display name
    pub name: String,
    /// Catalog category heading
    pub category: Option<String>,
    pub concentration: Concentration,
    /// Human label for the concentration (e.g., "1 mg/mL", "Variable")
    pub concentration_label: String,
    /// Commonly stocked concentrations, for display
    pub usual_concentrations: Vec<String>,
    pub concentration_warning: Option<String>,
    pub routes: Vec<String>,
    pub high_alert: bool,
    /// Variants in catalog order
    pub variants: Vec<DosageVariant>,
    pub guardrails: SafetyGuardrails,
}

impl DrugRecord {
    /// Create a drug with required fields.
    pub fn new(id: impl Into<String>, name: impl Into<String>, concentration: Concentration) -> Self {
        let concentration_label = format!("{} {}/mL", concentration.value, concentration.unit);
        Self {
            id: id.into(),
            name: name.into(),
            category: None,
            concentration,
            concentration_label,
            usual_concentrations: Vec::new(),
            concentration_warning: None,
            routes: Vec::new(),
            high_alert: false,
            variants: Vec::new(),
            guardrails: SafetyGuardrails::default(),
        }
    }

    /// Look up a variant by catalog key.
    pub fn variant(&self, name: &str) -> Option<&DosageVariant> {
        self.variants.iter().find(|v| v.name == name)
    }

    /// Whether the volume must wait for an explicit concentration confirmation.
    pub fn requires_concentration_confirmation(&self) -> bool {
        self.concentration.variable
    }
}
