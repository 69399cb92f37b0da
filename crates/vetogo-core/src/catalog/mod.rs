//! Drug catalog loading, validation and lookup.
//!
//! The catalog is parsed once, validated entry by entry, and then frozen.
//! A catalog with any invalid drug is rejected as a whole.

mod raw;
mod search;

pub use raw::CatalogMeta;
pub use search::*;

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::audit;
use crate::models::{DrugRecord, Species};
use crate::units::UnitNormalizer;

use raw::RawCatalog;

/// Catalog errors.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid drug: {0}")]
    InvalidDrug(String),

    #[error("Invalid concentration for {drug}: {value}")]
    InvalidConcentration { drug: String, value: f64 },

    #[error("Invalid dose for {drug}/{variant}: {reason}")]
    InvalidDose {
        drug: String,
        variant: String,
        reason: String,
    },

    #[error("Unknown unit for {drug}: {unit}")]
    UnknownUnit { drug: String, unit: String },

    #[error("Duplicate drug id: {0}")]
    DuplicateDrug(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Per-species catalog settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesProfile {
    pub species: Species,
    pub display_name: String,
    /// Drug ids never offered for this species
    pub forbidden_drugs: Vec<String>,
}

/// A validated, immutable drug catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    meta: CatalogMeta,
    profiles: Vec<SpeciesProfile>,
    drugs: Vec<DrugRecord>,
    index: HashMap<String, usize>,
    fingerprint: String,
}

impl Catalog {
    /// Parse and validate a catalog document.
    pub fn from_json(json: &str) -> CatalogResult<Self> {
        Self::from_json_with(json, &UnitNormalizer::new())
    }

    /// Parse with a custom unit normalizer.
    pub fn from_json_with(json: &str, normalizer: &UnitNormalizer) -> CatalogResult<Self> {
        let raw: RawCatalog = serde_json::from_str(json)?;

        let mut profiles = Vec::new();
        for (key, config) in raw.species_config {
            match key.parse::<Species>() {
                Ok(species) => profiles.push(SpeciesProfile {
                    species,
                    display_name: config
                        .display_name
                        .unwrap_or_else(|| species.display_name().to_string()),
                    forbidden_drugs: config.forbidden_drugs,
                }),
                Err(_) => warn!(species = %key, "ignoring unknown species in catalog"),
            }
        }

        let mut drugs = Vec::new();
        let mut index = HashMap::new();
        for category in raw.drugs {
            for item in category.items {
                let record = item.into_record(category.category_name.as_deref(), normalizer)?;
                if index.insert(record.id.clone(), drugs.len()).is_some() {
                    return Err(CatalogError::DuplicateDrug(record.id));
                }
                drugs.push(record);
            }
        }

        let fingerprint = audit::hash_data(json.as_bytes());
        info!(
            drugs = drugs.len(),
            version = raw.meta.version.as_deref().unwrap_or("unknown"),
            fingerprint = %&fingerprint[..12],
            "catalog loaded"
        );

        Ok(Self {
            meta: raw.meta,
            profiles,
            drugs,
            index,
            fingerprint,
        })
    }

    /// Read and validate a catalog file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> CatalogResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn meta(&self) -> &CatalogMeta {
        &self.meta
    }

    /// All drugs in catalog order.
    pub fn drugs(&self) -> &[DrugRecord] {
        &self.drugs
    }

    pub fn len(&self) -> usize {
        self.drugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drugs.is_empty()
    }

    /// Look up a drug by id.
    pub fn get(&self, id: &str) -> Option<&DrugRecord> {
        self.index.get(id).map(|&i| &self.drugs[i])
    }

    /// SHA-256 of the source document.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Category names in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for name in self.drugs.iter().filter_map(|d| d.category.as_deref()) {
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        seen
    }

    pub fn species_profile(&self, species: Species) -> Option<&SpeciesProfile> {
        self.profiles.iter().find(|p| p.species == species)
    }

    /// Whether a drug must never be offered for a species.
    pub fn is_forbidden(&self, drug_id: &str, species: Species) -> bool {
        self.species_profile(species)
            .is_some_and(|p| p.forbidden_drugs.iter().any(|f| f == drug_id))
    }

    /// Drugs that may be offered for a species, in catalog order.
    pub fn available_for(&self, species: Option<Species>) -> impl Iterator<Item = &DrugRecord> {
        self.drugs
            .iter()
            .filter(move |d| species.map_or(true, |s| !self.is_forbidden(&d.id, s)))
    }

    /// Fuzzy search over names and ids, best first; ties keep catalog order.
    ///
    /// An empty query lists the available drugs.
    pub fn search(&self, query: &str, species: Option<Species>, limit: usize) -> Vec<SearchHit> {
        let query = query.trim().to_lowercase();

        let mut hits: Vec<SearchHit> = self
            .available_for(species)
            .filter_map(|drug| {
                let score = if query.is_empty() {
                    1.0
                } else {
                    score_drug(drug, &query)
                };
                (score >= MIN_SEARCH_SCORE).then(|| SearchHit {
                    drug_id: drug.id.clone(),
                    name: drug.name.clone(),
                    category: drug.category.clone(),
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "meta": {"version": "6.0.0"},
        "species_config": {
            "canine": {"display_name": "Chien", "forbidden_drugs": []},
            "feline": {"display_name": "Chat", "forbidden_drugs": ["paracetamol"]}
        },
        "drugs": [
            {"category_name": "CPR", "items": [
                {"id": "adrenaline", "name": "Adrénaline", "concentration_mg_ml": 1,
                 "dosage": {"common": {"dose_mg_kg": 0.01}}}
            ]},
            {"category_name": "ANALGÉSIE", "items": [
                {"id": "paracetamol", "name": "Paracétamol", "concentration_mg_ml": 10,
                 "dosage": {"canine": {"dose_mg_kg": 10}}},
                {"id": "ketamine", "name": "Kétamine", "concentration_mg_ml": 100,
                 "dosage": {"common": {"dose_mg_kg": 0.5}}}
            ]}
        ]
    }"#;

    #[test]
    fn test_load_and_lookup() {
        let catalog = Catalog::from_json(CATALOG).unwrap();

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.meta().version.as_deref(), Some("6.0.0"));
        assert_eq!(catalog.get("ketamine").unwrap().name, "Kétamine");
        assert!(catalog.get("morphine").is_none());
        assert_eq!(catalog.categories(), vec!["CPR", "ANALGÉSIE"]);
        assert_eq!(catalog.fingerprint().len(), 64);
    }

    #[test]
    fn test_forbidden_drugs_filtered() {
        let catalog = Catalog::from_json(CATALOG).unwrap();

        assert!(catalog.is_forbidden("paracetamol", Species::Feline));
        assert!(!catalog.is_forbidden("paracetamol", Species::Canine));

        let feline: Vec<&str> = catalog.available_for(Some(Species::Feline)).map(|d| d.id.as_str()).collect();
        assert_eq!(feline, vec!["adrenaline", "ketamine"]);
        assert_eq!(catalog.available_for(None).count(), 3);
    }

    #[test]
    fn test_search() {
        let catalog = Catalog::from_json(CATALOG).unwrap();

        let hits = catalog.search("keta", None, 10);
        assert_eq!(hits[0].drug_id, "ketamine");

        assert!(catalog.search("paracetamol", Some(Species::Feline), 10).is_empty());
        assert_eq!(catalog.search("", Some(Species::Canine), 2).len(), 2);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let json = r#"{"drugs": [{"category_name": "A", "items": [
            {"id": "x", "name": "X", "concentration_mg_ml": 1},
            {"id": "x", "name": "X bis", "concentration_mg_ml": 2}
        ]}]}"#;

        assert!(matches!(Catalog::from_json(json), Err(CatalogError::DuplicateDrug(id)) if id == "x"));
    }

    #[test]
    fn test_one_bad_drug_rejects_the_catalog() {
        let json = r#"{"drugs": [{"category_name": "A", "items": [
            {"id": "x", "name": "X", "concentration_mg_ml": 1},
            {"id": "y", "name": "Y", "concentration_mg_ml": -2}
        ]}]}"#;

        assert!(matches!(
            Catalog::from_json(json),
            Err(CatalogError::InvalidConcentration { .. })
        ));
        assert!(matches!(Catalog::from_json("{"), Err(CatalogError::Json(_))));
    }
}
