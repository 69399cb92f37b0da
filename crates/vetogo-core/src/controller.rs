//! Form controller: owns the patient context and the open drug cards.
//!
//! Every input change re-runs the pure pipeline for each card and returns
//! only the cards whose view changed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::age::AgeWeightTable;
use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::engine::{
    ConfirmationError, ConfirmationGate, ConfirmationInputs, ConfirmationState, DosingEngine,
    VariantEvaluation,
};
use crate::models::{DrugRecord, PatientContext, Species};

/// Controller errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    #[error("Unknown drug: {0}")]
    UnknownDrug(String),

    #[error("Unknown card: {0}")]
    UnknownCard(Uuid),

    #[error("Unknown variant {variant} for {drug}")]
    UnknownVariant { drug: String, variant: String },

    #[error("{drug} must not be given to a {species}")]
    ForbiddenDrug { drug: String, species: Species },

    #[error("Confirmation error: {0}")]
    Confirmation(#[from] ConfirmationError),
}

pub type ControllerResult<T> = Result<T, ControllerError>;

/// Everything the presentation layer needs to render one card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardView {
    pub card_id: Uuid,
    pub drug_id: String,
    pub drug_name: String,
    pub concentration_label: String,
    pub high_alert: bool,
    /// The drug is forbidden for the active species
    pub forbidden: bool,
    pub requires_concentration_confirmation: bool,
    pub concentration_confirmed: bool,
    /// Variant currently displayed (user choice or primary)
    pub selected_variant: Option<String>,
    /// Every variant, best species match first
    pub variants: Vec<VariantEvaluation>,
    pub confirmation: ConfirmationState,
    /// Whether the selected variant's volume may be shown
    pub volume_visible: bool,
}

impl CardView {
    /// Evaluation of the displayed variant.
    pub fn selected(&self) -> Option<&VariantEvaluation> {
        let name = self.selected_variant.as_deref()?;
        self.variants.iter().find(|v| v.variant == name)
    }
}

/// A card whose view changed after an input change.
#[derive(Debug, Clone, PartialEq)]
pub struct CardUpdate {
    pub card_id: Uuid,
    pub view: CardView,
}

struct Card {
    id: Uuid,
    drug_id: String,
    selected_variant: Option<String>,
    concentration_confirmed: bool,
    gate: ConfirmationGate,
    last_view: Option<CardView>,
}

/// Recompute-on-change controller behind the dosing form.
pub struct RecomputeController {
    catalog: Arc<Catalog>,
    table: AgeWeightTable,
    engine: DosingEngine,
    config: EngineConfig,
    patient: PatientContext,
    cards: Vec<Card>,
}

impl RecomputeController {
    /// Create a controller with the built-in age table.
    pub fn new(catalog: Arc<Catalog>, config: EngineConfig) -> Self {
        Self::with_age_table(catalog, config, AgeWeightTable::default())
    }

    pub fn with_age_table(catalog: Arc<Catalog>, config: EngineConfig, table: AgeWeightTable) -> Self {
        Self {
            engine: DosingEngine::new(&config),
            catalog,
            table,
            config,
            patient: PatientContext::default(),
            cards: Vec::new(),
        }
    }

    pub fn patient(&self) -> &PatientContext {
        &self.patient
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn age_table(&self) -> &AgeWeightTable {
        &self.table
    }

    // =====================================================================
    // Patient inputs
    // =====================================================================

    pub fn set_species(&mut self, species: Option<Species>) -> Vec<CardUpdate> {
        self.patient.species = species;
        self.recompute_all()
    }

    /// Set the weight; an age is derived only when none is set yet.
    ///
    /// Weights the calculator would reject never derive an age.
    pub fn set_weight(&mut self, weight_kg: Option<f64>) -> Vec<CardUpdate> {
        self.patient.weight_kg = weight_kg;
        if self.patient.age_label.is_none() {
            let usable = weight_kg.filter(|w| w.is_finite() && *w > 0.0);
            if let Some(label) = usable.and_then(|w| self.table.age_for_weight(w)) {
                debug!(age = label, "age derived from weight");
                self.patient.age_label = Some(label.to_string());
            }
        }
        self.recompute_all()
    }

    /// Set the weight from form text.
    ///
    /// Empty text clears the weight. Text that does not parse yet (`"10,"`,
    /// `"abc"`) leaves the current weight and the cards untouched.
    pub fn set_weight_text(&mut self, text: &str) -> Vec<CardUpdate> {
        if text.trim().is_empty() {
            return self.set_weight(None);
        }
        match parse_weight_input(text) {
            Some(weight_kg) => self.set_weight(Some(weight_kg)),
            None => {
                debug!(text, "incomplete weight input ignored");
                Vec::new()
            }
        }
    }

    /// Set the age; the weight always follows the reference table.
    ///
    /// An unknown label clears the weight. Clearing the age keeps it.
    pub fn set_age(&mut self, label: Option<&str>) -> Vec<CardUpdate> {
        match label {
            Some(label) => {
                self.patient.weight_kg = self.table.weight_for_age(label);
                self.patient.age_label = Some(label.to_string());
            }
            None => self.patient.age_label = None,
        }
        self.recompute_all()
    }

    // =====================================================================
    // Cards
    // =====================================================================

    /// Open a card for a drug and render it.
    pub fn add_card(&mut self, drug_id: &str) -> ControllerResult<CardView> {
        let drug = self
            .catalog
            .get(drug_id)
            .ok_or_else(|| ControllerError::UnknownDrug(drug_id.to_string()))?;
        if let Some(species) = self.patient.species {
            if self.catalog.is_forbidden(drug_id, species) {
                return Err(ControllerError::ForbiddenDrug {
                    drug: drug.name.clone(),
                    species,
                });
            }
        }

        let mut card = Card {
            id: Uuid::new_v4(),
            drug_id: drug_id.to_string(),
            selected_variant: None,
            concentration_confirmed: false,
            gate: ConfirmationGate::new(),
            last_view: None,
        };
        let view = self.render(&mut card)?;
        card.last_view = Some(view.clone());
        info!(card = %card.id, drug = drug_id, "card opened");
        self.cards.push(card);
        Ok(view)
    }

    pub fn remove_card(&mut self, card_id: Uuid) -> ControllerResult<()> {
        let index = self.card_index(card_id)?;
        self.cards.remove(index);
        Ok(())
    }

    /// Display a specific variant instead of the primary one.
    pub fn select_variant(&mut self, card_id: Uuid, variant: &str) -> ControllerResult<Option<CardUpdate>> {
        let index = self.card_index(card_id)?;
        let drug = self.drug(&self.cards[index].drug_id)?;
        if drug.variant(variant).is_none() {
            return Err(ControllerError::UnknownVariant {
                drug: drug.id.clone(),
                variant: variant.to_string(),
            });
        }
        self.cards[index].selected_variant = Some(variant.to_string());
        self.recompute_card(index)
    }

    /// Record whether the user checked the stocked concentration.
    pub fn set_concentration_confirmed(&mut self, card_id: Uuid, confirmed: bool) -> ControllerResult<Option<CardUpdate>> {
        let index = self.card_index(card_id)?;
        self.cards[index].concentration_confirmed = confirmed;
        self.recompute_card(index)
    }

    /// Acknowledge the warning on a card's displayed variant.
    pub fn acknowledge(&mut self, card_id: Uuid) -> ControllerResult<CardUpdate> {
        let index = self.card_index(card_id)?;
        let state = self.cards[index].gate.acknowledge()?;
        info!(card = %card_id, ?state, "warning acknowledged");

        match self.recompute_card(index)? {
            Some(update) => Ok(update),
            None => {
                let view = self.cards[index]
                    .last_view
                    .clone()
                    .ok_or(ControllerError::UnknownCard(card_id))?;
                Ok(CardUpdate { card_id, view })
            }
        }
    }

    pub fn card(&self, card_id: Uuid) -> Option<&CardView> {
        self.cards
            .iter()
            .find(|c| c.id == card_id)
            .and_then(|c| c.last_view.as_ref())
    }

    /// Current views in the order the cards were opened.
    pub fn cards(&self) -> Vec<&CardView> {
        self.cards.iter().filter_map(|c| c.last_view.as_ref()).collect()
    }

    // =====================================================================
    // Recompute
    // =====================================================================

    fn recompute_all(&mut self) -> Vec<CardUpdate> {
        let mut updates = Vec::new();
        for index in 0..self.cards.len() {
            // cards only reference drugs checked at add time
            if let Ok(Some(update)) = self.recompute_card(index) {
                updates.push(update);
            }
        }
        debug!(cards = self.cards.len(), changed = updates.len(), "form recomputed");
        updates
    }

    fn recompute_card(&mut self, index: usize) -> ControllerResult<Option<CardUpdate>> {
        let mut card = self.cards.remove(index);
        let rendered = self.render(&mut card);
        let update = match rendered {
            Ok(view) if card.last_view.as_ref() != Some(&view) => {
                card.last_view = Some(view.clone());
                Ok(Some(CardUpdate { card_id: card.id, view }))
            }
            Ok(_) => Ok(None),
            Err(e) => Err(e),
        };
        self.cards.insert(index, card);
        update
    }

    fn render(&self, card: &mut Card) -> ControllerResult<CardView> {
        let drug = self.drug(&card.drug_id)?;
        let species = self.patient.species;
        let weight_kg = self.patient.weight_kg;

        let variants = self
            .engine
            .evaluate_drug(drug, species, weight_kg, card.concentration_confirmed);
        let selected = card
            .selected_variant
            .as_deref()
            .and_then(|name| variants.iter().find(|v| v.variant == name))
            .or_else(|| variants.first());
        let selected_variant = selected.map(|v| v.variant.clone());
        let requires_confirmation = selected.is_some_and(|v| v.requires_confirmation());

        let inputs = ConfirmationInputs {
            weight_kg,
            species,
            variant: selected_variant.clone().unwrap_or_default(),
            concentration_confirmed: card.concentration_confirmed,
        };
        let confirmation = card.gate.sync(inputs, requires_confirmation);

        Ok(CardView {
            card_id: card.id,
            drug_id: drug.id.clone(),
            drug_name: drug.name.clone(),
            concentration_label: drug.concentration_label.clone(),
            high_alert: drug.high_alert,
            forbidden: species.is_some_and(|s| self.catalog.is_forbidden(&drug.id, s)),
            requires_concentration_confirmation: drug.requires_concentration_confirmation(),
            concentration_confirmed: card.concentration_confirmed,
            selected_variant,
            variants,
            confirmation,
            volume_visible: card.gate.volume_visible(),
        })
    }

    fn drug(&self, drug_id: &str) -> ControllerResult<&DrugRecord> {
        self.catalog
            .get(drug_id)
            .ok_or_else(|| ControllerError::UnknownDrug(drug_id.to_string()))
    }

    fn card_index(&self, card_id: Uuid) -> ControllerResult<usize> {
        self.cards
            .iter()
            .position(|c| c.id == card_id)
            .ok_or(ControllerError::UnknownCard(card_id))
    }
}

/// Parse a weight typed in the form (`"12,5"`, `"7.5"`).
///
/// Returns `None` for empty text, a trailing separator still being typed,
/// or anything that is not a number.
pub fn parse_weight_input(text: &str) -> Option<f64> {
    let normalized = text.trim().replace(',', ".");
    if normalized.is_empty() || normalized.ends_with('.') {
        return None;
    }
    normalized.parse::<f64>().ok().filter(|w| w.is_finite())
}
