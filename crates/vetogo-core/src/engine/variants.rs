//! Species-aware variant ordering.
//!
//! Ranking:
//! - variant for the active species: 0
//! - variant for every species (or untagged): 1
//! - variant for another species: 2
//!
//! Ties keep catalog order. Nothing is filtered out: cross-species entries
//! stay available as reference data.

use serde::{Deserialize, Serialize};

use crate::models::{DosageVariant, DrugRecord, Species, SpeciesTag};

/// How a variant's species tag relates to the active species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeciesMatch {
    Target,
    Both,
    Other,
}

impl SpeciesMatch {
    /// Classify a variant tag against the active species.
    pub fn classify(tag: Option<SpeciesTag>, active: Option<Species>) -> Self {
        match (tag, active) {
            (Some(SpeciesTag::Only(species)), Some(active)) if species == active => SpeciesMatch::Target,
            (Some(SpeciesTag::Only(_)), Some(_)) => SpeciesMatch::Other,
            _ => SpeciesMatch::Both,
        }
    }

    /// Sort key (lower is evaluated first).
    pub fn rank(&self) -> u8 {
        match self {
            SpeciesMatch::Target => 0,
            SpeciesMatch::Both => 1,
            SpeciesMatch::Other => 2,
        }
    }
}

/// Orders a drug's variants for the active species.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariantResolver;

impl VariantResolver {
    pub fn new() -> Self {
        Self
    }

    /// All variants, best species match first.
    pub fn resolve<'d>(&self, drug: &'d DrugRecord, active: Option<Species>) -> Vec<&'d DosageVariant> {
        let mut ordered: Vec<&DosageVariant> = drug.variants.iter().collect();
        // sort_by_key is stable, so equal ranks keep catalog order
        ordered.sort_by_key(|v| SpeciesMatch::classify(v.species, active).rank());
        ordered
    }

    /// The variant shown by default.
    pub fn primary<'d>(&self, drug: &'d DrugRecord, active: Option<Species>) -> Option<&'d DosageVariant> {
        self.resolve(drug, active).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Concentration, DosingModel};

    fn variant(name: &str, tag: Option<SpeciesTag>) -> DosageVariant {
        let mut v = DosageVariant::new(
            name,
            DosingModel::VolumePerKg {
                rate: 1.0,
                per_time: None,
            },
        );
        v.species = tag;
        v
    }

    fn drug_with(variants: Vec<DosageVariant>) -> DrugRecord {
        let mut drug = DrugRecord::new("test", "Test", Concentration::mg_per_ml(1.0));
        drug.variants = variants;
        drug
    }

    fn names(variants: &[&DosageVariant]) -> Vec<String> {
        variants.iter().map(|v| v.name.clone()).collect()
    }

    #[test]
    fn test_target_species_first() {
        let drug = drug_with(vec![
            variant("feline", Some(SpeciesTag::Only(Species::Feline))),
            variant("common", Some(SpeciesTag::Both)),
            variant("canine", Some(SpeciesTag::Only(Species::Canine))),
        ]);
        let resolver = VariantResolver::new();

        let canine = resolver.resolve(&drug, Some(Species::Canine));
        assert_eq!(names(&canine), vec!["canine", "common", "feline"]);

        let feline = resolver.resolve(&drug, Some(Species::Feline));
        assert_eq!(names(&feline), vec!["feline", "common", "canine"]);
    }

    #[test]
    fn test_ties_keep_catalog_order() {
        let drug = drug_with(vec![
            variant("iv", Some(SpeciesTag::Both)),
            variant("untagged", None),
            variant("im", Some(SpeciesTag::Both)),
        ]);
        let resolver = VariantResolver::new();

        let ordered = resolver.resolve(&drug, Some(Species::Canine));
        assert_eq!(names(&ordered), vec!["iv", "untagged", "im"]);
    }

    #[test]
    fn test_nothing_is_discarded() {
        let drug = drug_with(vec![
            variant("feline_only", Some(SpeciesTag::Only(Species::Feline))),
        ]);
        let resolver = VariantResolver::new();

        let ordered = resolver.resolve(&drug, Some(Species::Canine));
        assert_eq!(ordered.len(), 1);
        assert_eq!(
            resolver.primary(&drug, Some(Species::Canine)).map(|v| v.name.as_str()),
            Some("feline_only")
        );
    }

    #[test]
    fn test_no_active_species_keeps_order() {
        let drug = drug_with(vec![
            variant("feline", Some(SpeciesTag::Only(Species::Feline))),
            variant("canine", Some(SpeciesTag::Only(Species::Canine))),
        ]);

        let ordered = VariantResolver::new().resolve(&drug, None);
        assert_eq!(names(&ordered), vec!["feline", "canine"]);
    }

    #[test]
    fn test_species_match_classification() {
        let canine = Some(SpeciesTag::Only(Species::Canine));

        assert_eq!(SpeciesMatch::classify(canine, Some(Species::Canine)), SpeciesMatch::Target);
        assert_eq!(SpeciesMatch::classify(canine, Some(Species::Feline)), SpeciesMatch::Other);
        assert_eq!(SpeciesMatch::classify(None, Some(Species::Feline)), SpeciesMatch::Both);
        assert_eq!(SpeciesMatch::classify(canine, None), SpeciesMatch::Both);
    }

    #[test]
    fn test_empty_drug_has_no_primary() {
        let drug = drug_with(vec![]);
        assert!(VariantResolver::new().primary(&drug, Some(Species::Canine)).is_none());
    }
}
