//! Unit token normalizer.
//!
//! Handles:
//! - Spelling variants (mcg→µg, cc→mL, IU→UI, meq→mEq)
//! - Catalog dose labels (`UI/kg`, `µg/kg/min`, `mEq/kg/h (MAX)`)
//! - Dimensional compatibility between a dose unit and a concentration unit

use std::collections::HashMap;

use tracing::warn;

use super::{CanonicalUnit, Conversion, DoseUnit, TimeBasis, UnitError, UnitFamily, UnitResult};

/// Normalizer for dose and concentration unit labels.
pub struct UnitNormalizer {
    /// Unit table: lowercase spelling → canonical unit
    units: HashMap<String, CanonicalUnit>,
    /// Per-time suffixes: lowercase spelling → basis
    time_suffixes: HashMap<String, TimeBasis>,
}

impl Default for UnitNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitNormalizer {
    /// Create a new normalizer with default mappings.
    pub fn new() -> Self {
        Self {
            units: Self::default_units(),
            time_suffixes: Self::default_time_suffixes(),
        }
    }

    /// Canonicalize a bare unit token (`MG`, `mcg`, `IU`, `cc`).
    pub fn normalize(&self, token: &str) -> UnitResult<CanonicalUnit> {
        let key = token.trim().to_lowercase();
        self.units
            .get(&key)
            .cloned()
            .ok_or_else(|| UnitError::Unknown(token.trim().to_string()))
    }

    /// Parse a catalog dose label into its base unit and optional time basis.
    ///
    /// `"µg/kg/min"` → (µg, per minute); `"UI/kg"` → (UI, none).
    /// Parenthesised annotations such as `(MAX)` are dropped.
    pub fn parse_dose_unit(&self, label: &str) -> UnitResult<DoseUnit> {
        let stripped = match label.find('(') {
            Some(idx) => &label[..idx],
            None => label,
        };

        let mut segments = stripped.split('/').map(str::trim).filter(|s| !s.is_empty());
        let head = segments
            .next()
            .ok_or_else(|| UnitError::Unknown(label.to_string()))?;
        let unit = self.normalize(head)?;

        let mut per_time = None;
        for segment in segments {
            let lower = segment.to_lowercase();
            if lower == "kg" {
                continue;
            }
            match self.time_suffixes.get(&lower) {
                Some(basis) => per_time = Some(*basis),
                None => return Err(UnitError::Unknown(label.to_string())),
            }
        }

        Ok(DoseUnit { unit, per_time })
    }

    /// Check whether a dose unit can be divided by a concentration unit.
    pub fn compatible(&self, dose_unit: &CanonicalUnit, concentration_unit: &CanonicalUnit) -> bool {
        self.check_compatible(dose_unit, concentration_unit).is_ok()
    }

    /// Resolve the conversion from a dose unit into a concentration's numerator unit.
    ///
    /// Mass units convert through their mg factor. Count units are atomic:
    /// UI only matches UI, mEq only matches mEq.
    pub fn check_compatible(
        &self,
        dose_unit: &CanonicalUnit,
        concentration_unit: &CanonicalUnit,
    ) -> UnitResult<Conversion> {
        let compatible = match (dose_unit.family, concentration_unit.family) {
            (UnitFamily::Mass, UnitFamily::Mass) | (UnitFamily::Volume, UnitFamily::Volume) => true,
            (UnitFamily::Count, UnitFamily::Count) => dose_unit.token == concentration_unit.token,
            _ => false,
        };

        if !compatible {
            warn!(
                dose_unit = %dose_unit.token,
                concentration_unit = %concentration_unit.token,
                "refusing incompatible unit pair"
            );
            return Err(UnitError::Incompatible {
                dose_unit: dose_unit.token.clone(),
                dose_family: dose_unit.family,
                concentration_unit: concentration_unit.token.clone(),
                concentration_family: concentration_unit.family,
            });
        }

        Ok(Conversion {
            family: dose_unit.family,
            factor: dose_unit.to_base / concentration_unit.to_base,
        })
    }

    /// Add a custom unit spelling.
    pub fn add_unit(&mut self, spelling: &str, unit: CanonicalUnit) {
        self.units.insert(spelling.to_lowercase(), unit);
    }

    /// Default unit table.
    fn default_units() -> HashMap<String, CanonicalUnit> {
        let mut map = HashMap::new();

        // Mass (base: mg)
        let gram = CanonicalUnit::new("g", UnitFamily::Mass, 1000.0);
        let milligram = CanonicalUnit::new("mg", UnitFamily::Mass, 1.0);
        let microgram = CanonicalUnit::new("µg", UnitFamily::Mass, 0.001);
        let nanogram = CanonicalUnit::new("ng", UnitFamily::Mass, 0.000_001);
        for spelling in ["g", "gram", "grams", "gramme", "grammes"] {
            map.insert(spelling.into(), gram.clone());
        }
        for spelling in ["mg", "milligram", "milligrams", "milligramme", "milligrammes"] {
            map.insert(spelling.into(), milligram.clone());
        }
        for spelling in ["µg", "μg", "ug", "mcg", "microgram", "micrograms", "microgramme", "microgrammes", "gamma"] {
            map.insert(spelling.into(), microgram.clone());
        }
        map.insert("ng".into(), nanogram);

        // Count (atomic, no cross-conversion)
        let ui = CanonicalUnit::new("UI", UnitFamily::Count, 1.0);
        let meq = CanonicalUnit::new("mEq", UnitFamily::Count, 1.0);
        let mmol = CanonicalUnit::new("mmol", UnitFamily::Count, 1.0);
        for spelling in ["ui", "iu", "u", "unit", "units", "unité", "unités"] {
            map.insert(spelling.into(), ui.clone());
        }
        for spelling in ["meq", "méq"] {
            map.insert(spelling.into(), meq.clone());
        }
        map.insert("mmol".into(), mmol);

        // Volume (base: mL)
        let millilitre = CanonicalUnit::new("mL", UnitFamily::Volume, 1.0);
        let litre = CanonicalUnit::new("L", UnitFamily::Volume, 1000.0);
        for spelling in ["ml", "cc", "millilitre", "millilitres", "milliliter", "milliliters"] {
            map.insert(spelling.into(), millilitre.clone());
        }
        for spelling in ["l", "litre", "litres", "liter", "liters"] {
            map.insert(spelling.into(), litre.clone());
        }

        map
    }

    /// Default per-time suffixes.
    fn default_time_suffixes() -> HashMap<String, TimeBasis> {
        let mut map = HashMap::new();
        for spelling in ["h", "hr", "hour", "heure"] {
            map.insert(spelling.into(), TimeBasis::PerHour);
        }
        for spelling in ["min", "minute"] {
            map.insert(spelling.into(), TimeBasis::PerMinute);
        }
        map.insert("j".into(), TimeBasis::PerDay);
        map.insert("day".into(), TimeBasis::PerDay);
        map
    }
}
