//! Fuzzy drug search for the drug picker.
//!
//! Scoring:
//! - substring of the name or id: 1.0
//! - otherwise the best fuzzy similarity against the name, each name word and the id

use serde::{Deserialize, Serialize};
use strsim::{jaro_winkler, normalized_levenshtein};

use crate::models::DrugRecord;

/// Minimum score to be listed.
pub const MIN_SEARCH_SCORE: f64 = 0.70;

/// A search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub drug_id: String,
    pub name: String,
    pub category: Option<String>,
    pub score: f64,
}

/// Score a drug against a lowercase query (0.0 - 1.0).
pub(crate) fn score_drug(drug: &DrugRecord, query: &str) -> f64 {
    let name = drug.name.to_lowercase();
    let id = drug.id.to_lowercase();

    if name.contains(query) || id.contains(query) {
        return 1.0;
    }

    let words = name
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| fuzzy_match(query, w));

    words
        .chain([fuzzy_match(query, &name), fuzzy_match(query, &id)])
        .fold(0.0, f64::max)
}

/// Compute fuzzy string similarity using combined metrics.
fn fuzzy_match(a: &str, b: &str) -> f64 {
    // Jaro-Winkler favours shared prefixes; Levenshtein the overall shape
    let jw = jaro_winkler(a, b);
    let lev = normalized_levenshtein(a, b);
    jw * 0.6 + lev * 0.4
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Concentration;

    fn drug(id: &str, name: &str) -> DrugRecord {
        DrugRecord::new(id, name, Concentration::mg_per_ml(1.0))
    }

    #[test]
    fn test_substring_is_full_score() {
        let d = drug("epinephrine_low_conc", "Adrénaline (Épinéphrine)");
        assert_eq!(score_drug(&d, "adrénaline"), 1.0);
        assert_eq!(score_drug(&d, "epinephrine"), 1.0);
    }

    #[test]
    fn test_typo_scores_high() {
        let d = drug("ketamine", "Kétamine");
        assert!(score_drug(&d, "ketamne") >= MIN_SEARCH_SCORE);
    }

    #[test]
    fn test_unrelated_scores_low() {
        let d = drug("atropine_sulfate", "Sulfate d'Atropine");
        assert!(score_drug(&d, "insuline") < MIN_SEARCH_SCORE);
    }
}
