//! VetoGo Core Library
//!
//! Weight-based emergency dose calculator for dogs and cats.
//!
//! # Architecture
//!
//! ```text
//!   Catalog JSON ──▶ Catalog (validated once, frozen)
//!                         │
//!   Form input ──▶ RecomputeController (species, weight, age, cards)
//!                         │
//!          ┌──────────────▼──────────────┐
//!          │ VariantResolver             │  best species match first
//!          │ DoseCalculator              │  pure, typed failures
//!          │ GuardrailEvaluator          │  dilution, ceiling, alerts
//!          └──────────────┬──────────────┘
//!                         │
//!               ConfirmationGate (per card)
//!                         │
//!                   CardView ──▶ ResultFormatter
//! ```
//!
//! # Core Principle
//!
//! **A volume is never shown without a trustworthy basis.** Incompatible
//! units produce no number, an unconfirmed variable concentration produces
//! `Volume::Pending`, and a triggered guardrail hides the volume until the
//! user acknowledges it.
//!
//! # Modules
//!
//! - [`units`]: unit canonicalization and compatibility
//! - [`models`]: domain types (DrugRecord, DosageVariant, CalculationResult, ...)
//! - [`catalog`]: catalog loading, validation and search
//! - [`engine`]: variant resolution, dose calculation, guardrails, confirmation
//! - [`age`]: age/weight reference table and estimation models
//! - [`controller`]: recompute-on-change form controller
//! - [`format`]: locale-aware display

pub mod age;
pub mod audit;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod engine;
pub mod format;
pub mod models;
pub mod units;

// Re-export commonly used types
pub use age::{AgeWeightTable, WeightModel};
pub use catalog::{Catalog, CatalogError, SearchHit};
pub use config::{CeilingRule, EngineConfig};
pub use controller::{CardUpdate, CardView, ControllerError, RecomputeController};
pub use engine::{
    ConfirmationGate, ConfirmationState, DoseCalculator, DoseError, DosingEngine, DosingRule, GuardrailEvaluator,
    RuleDose, VariantEvaluation, VariantResolver, WeightOverride,
};
pub use format::{Locale, ResultFormatter};
pub use models::{
    CalculationResult, Concentration, DosageVariant, DosingModel, DoseFigures, DrugRecord,
    GuardrailOutcome, PatientContext, SafetyGuardrails, Species, Volume,
};
pub use units::UnitNormalizer;

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use uuid::Uuid;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum VetogoError {
    #[error("Catalog error: {0}")]
    CatalogError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("State error: {0}")]
    StateError(String),
}

impl From<CatalogError> for VetogoError {
    fn from(e: CatalogError) -> Self {
        VetogoError::CatalogError(e.to_string())
    }
}

impl From<age::AgeTableError> for VetogoError {
    fn from(e: age::AgeTableError) -> Self {
        VetogoError::InvalidInput(e.to_string())
    }
}

impl From<ControllerError> for VetogoError {
    fn from(e: ControllerError) -> Self {
        match e {
            ControllerError::UnknownDrug(_) | ControllerError::UnknownCard(_) | ControllerError::UnknownVariant { .. } => {
                VetogoError::NotFound(e.to_string())
            }
            ControllerError::ForbiddenDrug { .. } => VetogoError::InvalidInput(e.to_string()),
            ControllerError::Confirmation(_) => VetogoError::StateError(e.to_string()),
        }
    }
}

impl From<DoseError> for VetogoError {
    fn from(e: DoseError) -> Self {
        VetogoError::InvalidInput(e.to_string())
    }
}

impl From<serde_json::Error> for VetogoError {
    fn from(e: serde_json::Error) -> Self {
        VetogoError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for VetogoError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        VetogoError::StateError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Load a catalog with the default configuration.
#[uniffi::export]
pub fn load_catalog(json: String) -> Result<Arc<DosingCore>, VetogoError> {
    DosingCore::build(&json, EngineConfig::default())
}

/// Load a catalog with a JSON engine configuration.
#[uniffi::export]
pub fn load_catalog_with_config(json: String, config_json: String) -> Result<Arc<DosingCore>, VetogoError> {
    let config = EngineConfig::from_json(&config_json)?;
    DosingCore::build(&json, config)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Loaded catalog plus a stateless engine.
#[derive(uniffi::Object)]
pub struct DosingCore {
    catalog: Arc<Catalog>,
    engine: DosingEngine,
    config: EngineConfig,
    formatter: ResultFormatter,
}

impl DosingCore {
    fn build(json: &str, config: EngineConfig) -> Result<Arc<Self>, VetogoError> {
        let catalog = Catalog::from_json(json)?;
        Ok(Arc::new(Self {
            catalog: Arc::new(catalog),
            engine: DosingEngine::new(&config),
            formatter: ResultFormatter::new(config.locale),
            config,
        }))
    }
}

#[uniffi::export]
impl DosingCore {
    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// SHA-256 of the loaded catalog document.
    pub fn catalog_fingerprint(&self) -> String {
        self.catalog.fingerprint().to_string()
    }

    pub fn catalog_version(&self) -> Option<String> {
        self.catalog.meta().version.clone()
    }

    /// Fuzzy search, excluding drugs forbidden for the species.
    pub fn search_drugs(
        &self,
        query: String,
        species: Option<String>,
        limit: u32,
    ) -> Result<Vec<FfiDrugSummary>, VetogoError> {
        let species = parse_species(species.as_deref())?;
        Ok(self
            .catalog
            .search(&query, species, limit as usize)
            .into_iter()
            .filter_map(|hit| {
                self.catalog
                    .get(&hit.drug_id)
                    .map(|drug| FfiDrugSummary::from_drug(drug, Some(hit.score)))
            })
            .collect())
    }

    /// Get a drug by id.
    pub fn get_drug(&self, drug_id: String) -> Option<FfiDrugSummary> {
        self.catalog.get(&drug_id).map(|d| FfiDrugSummary::from_drug(d, None))
    }

    // =========================================================================
    // Calculation Operations
    // =========================================================================

    /// Evaluate every variant of a drug, best species match first.
    pub fn compute_drug(
        &self,
        drug_id: String,
        species: Option<String>,
        weight_kg: Option<f64>,
        concentration_confirmed: bool,
    ) -> Result<Vec<FfiVariantResult>, VetogoError> {
        let species = parse_species(species.as_deref())?;
        let drug = self
            .catalog
            .get(&drug_id)
            .ok_or_else(|| VetogoError::NotFound(drug_id.clone()))?;

        Ok(self
            .engine
            .evaluate_drug(drug, species, weight_kg, concentration_confirmed)
            .iter()
            .map(|e| FfiVariantResult::build(drug, e, &self.formatter, true))
            .collect())
    }

    /// Start a form session over this catalog.
    pub fn new_session(&self) -> Arc<FormSession> {
        Arc::new(FormSession {
            controller: Mutex::new(RecomputeController::new(self.catalog.clone(), self.config.clone())),
            formatter: self.formatter,
        })
    }
}

/// Stateful form: patient inputs plus open cards.
#[derive(uniffi::Object)]
pub struct FormSession {
    controller: Mutex<RecomputeController>,
    formatter: ResultFormatter,
}

#[uniffi::export]
impl FormSession {
    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Set the species; returns the cards that changed.
    pub fn set_species(&self, species: Option<String>) -> Result<Vec<FfiCard>, VetogoError> {
        let species = parse_species(species.as_deref())?;
        let mut controller = self.controller.lock()?;
        let updates = controller.set_species(species);
        Ok(self.render_updates(&controller, updates))
    }

    pub fn set_weight(&self, weight_kg: Option<f64>) -> Result<Vec<FfiCard>, VetogoError> {
        let mut controller = self.controller.lock()?;
        let updates = controller.set_weight(weight_kg);
        Ok(self.render_updates(&controller, updates))
    }

    /// Set the weight from form text (`"12,5"`).
    ///
    /// Empty text clears the weight; text still being typed keeps it.
    pub fn set_weight_text(&self, text: String) -> Result<Vec<FfiCard>, VetogoError> {
        let mut controller = self.controller.lock()?;
        let updates = controller.set_weight_text(&text);
        Ok(self.render_updates(&controller, updates))
    }

    pub fn set_age(&self, age_label: Option<String>) -> Result<Vec<FfiCard>, VetogoError> {
        let mut controller = self.controller.lock()?;
        let updates = controller.set_age(age_label.as_deref());
        Ok(self.render_updates(&controller, updates))
    }

    pub fn patient(&self) -> Result<FfiPatient, VetogoError> {
        let controller = self.controller.lock()?;
        let patient = controller.patient();
        Ok(FfiPatient {
            species: patient.species.map(|s| s.key().to_string()),
            weight_kg: patient.weight_kg,
            age_label: patient.age_label.clone(),
        })
    }

    // =========================================================================
    // Card Operations
    // =========================================================================

    pub fn add_card(&self, drug_id: String) -> Result<FfiCard, VetogoError> {
        let mut controller = self.controller.lock()?;
        let view = controller.add_card(&drug_id)?;
        self.render_card(&controller, &view)
    }

    pub fn remove_card(&self, card_id: String) -> Result<(), VetogoError> {
        let card_id = parse_card_id(&card_id)?;
        let mut controller = self.controller.lock()?;
        controller.remove_card(card_id)?;
        Ok(())
    }

    pub fn select_variant(&self, card_id: String, variant: String) -> Result<Option<FfiCard>, VetogoError> {
        let card_id = parse_card_id(&card_id)?;
        let mut controller = self.controller.lock()?;
        let update = controller.select_variant(card_id, &variant)?;
        update.map(|u| self.render_card(&controller, &u.view)).transpose()
    }

    pub fn set_concentration_confirmed(&self, card_id: String, confirmed: bool) -> Result<Option<FfiCard>, VetogoError> {
        let card_id = parse_card_id(&card_id)?;
        let mut controller = self.controller.lock()?;
        let update = controller.set_concentration_confirmed(card_id, confirmed)?;
        update.map(|u| self.render_card(&controller, &u.view)).transpose()
    }

    /// Acknowledge the warning on a card.
    pub fn acknowledge(&self, card_id: String) -> Result<FfiCard, VetogoError> {
        let card_id = parse_card_id(&card_id)?;
        let mut controller = self.controller.lock()?;
        let update = controller.acknowledge(card_id)?;
        self.render_card(&controller, &update.view)
    }

    /// All open cards.
    pub fn cards(&self) -> Result<Vec<FfiCard>, VetogoError> {
        let controller = self.controller.lock()?;
        controller
            .cards()
            .into_iter()
            .map(|view| self.render_card(&controller, view))
            .collect()
    }
}

impl FormSession {
    fn render_updates(&self, controller: &RecomputeController, updates: Vec<CardUpdate>) -> Vec<FfiCard> {
        updates
            .iter()
            .filter_map(|u| self.render_card(controller, &u.view).ok())
            .collect()
    }

    fn render_card(&self, controller: &RecomputeController, view: &CardView) -> Result<FfiCard, VetogoError> {
        let drug = controller
            .catalog()
            .get(&view.drug_id)
            .ok_or_else(|| VetogoError::NotFound(view.drug_id.clone()))?;

        let variants = view
            .variants
            .iter()
            .map(|e| {
                // a guarded volume is shown only once its own card gate has released it
                let is_selected = view.selected_variant.as_deref() == Some(e.variant.as_str());
                let show_volume = !e.outcome.requires_confirmation || (is_selected && view.volume_visible);
                FfiVariantResult::build(drug, e, &self.formatter, show_volume)
            })
            .collect();

        Ok(FfiCard {
            card_id: view.card_id.to_string(),
            drug_id: view.drug_id.clone(),
            drug_name: view.drug_name.clone(),
            concentration_label: view.concentration_label.clone(),
            high_alert: view.high_alert,
            forbidden: view.forbidden,
            requires_concentration_confirmation: view.requires_concentration_confirmation,
            concentration_confirmed: view.concentration_confirmed,
            selected_variant: view.selected_variant.clone(),
            variants,
            confirmation: format!("{:?}", view.confirmation),
            volume_visible: view.volume_visible,
        })
    }
}

// =========================================================================
// Age / Weight / Formatting Helpers (exported to FFI)
// =========================================================================

/// Reference weight for an age label from the built-in table.
#[uniffi::export]
pub fn weight_for_age(label: String) -> Option<f64> {
    AgeWeightTable::default().weight_for_age(&label)
}

/// Nearest age label for a weight from the built-in table.
#[uniffi::export]
pub fn age_for_weight(weight_kg: f64) -> Option<String> {
    AgeWeightTable::default().age_for_weight(weight_kg).map(str::to_string)
}

/// Age labels for the picker, youngest first.
#[uniffi::export]
pub fn age_labels() -> Vec<String> {
    AgeWeightTable::default().labels().map(str::to_string).collect()
}

#[uniffi::export]
pub fn age_label_to_months(label: String) -> Option<u32> {
    age::age_label_to_months(&label)
}

/// Continuous weight estimate; `model` is `"table"` or `"apls"`.
#[uniffi::export]
pub fn estimate_weight(months: f64, model: String) -> Result<f64, VetogoError> {
    Ok(parse_model(&model)?.estimate_weight(months))
}

#[uniffi::export]
pub fn estimate_age_months(weight_kg: f64, model: String) -> Result<u32, VetogoError> {
    Ok(parse_model(&model)?.estimate_months(weight_kg))
}

/// Format a value with the precision bands; `locale` is `"fr"` or `"en"`.
#[uniffi::export]
pub fn format_value(value: f64, locale: String) -> Result<String, VetogoError> {
    let locale: Locale = serde_json::from_value(serde_json::Value::String(locale.to_lowercase()))?;
    Ok(ResultFormatter::new(locale).format_value(value))
}

#[uniffi::export]
pub fn parse_weight_input(text: String) -> Option<f64> {
    controller::parse_weight_input(&text)
}

/// Apply a protocol rule (JSON) and its weight-band overrides (JSON array).
#[uniffi::export]
pub fn compute_rule_dose(weight_kg: f64, rule_json: String, overrides_json: String) -> Result<FfiRuleDose, VetogoError> {
    let rule: DosingRule = serde_json::from_str(&rule_json)?;
    let overrides: Vec<WeightOverride> = if overrides_json.trim().is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(&overrides_json)?
    };
    Ok(engine::compute_rule_dose(weight_kg, &rule, &overrides)?.into())
}

/// Ceftriaxone ceiling (mg) for an age label.
#[uniffi::export]
pub fn ceftriaxone_max_mg(age_label: Option<String>) -> f64 {
    engine::ceftriaxone_max_mg(age_label.as_deref())
}

fn parse_species(species: Option<&str>) -> Result<Option<Species>, VetogoError> {
    species
        .map(|s| s.parse::<Species>().map_err(VetogoError::InvalidInput))
        .transpose()
}

fn parse_model(model: &str) -> Result<WeightModel, VetogoError> {
    match model.trim().to_lowercase().as_str() {
        "table" => Ok(WeightModel::Table),
        "apls" => Ok(WeightModel::Apls),
        other => Err(VetogoError::InvalidInput(format!("unknown weight model: {}", other))),
    }
}

fn parse_card_id(card_id: &str) -> Result<Uuid, VetogoError> {
    Uuid::parse_str(card_id).map_err(|e| VetogoError::InvalidInput(format!("card id {}: {}", card_id, e)))
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe drug summary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDrugSummary {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub concentration_label: String,
    pub usual_concentrations: Vec<String>,
    pub concentration_warning: Option<String>,
    pub requires_concentration_confirmation: bool,
    pub routes: Vec<String>,
    pub high_alert: bool,
    pub variant_count: u32,
    /// Search score, when produced by a search
    pub score: Option<f64>,
}

impl FfiDrugSummary {
    fn from_drug(drug: &DrugRecord, score: Option<f64>) -> Self {
        Self {
            id: drug.id.clone(),
            name: drug.name.clone(),
            category: drug.category.clone(),
            concentration_label: drug.concentration_label.clone(),
            usual_concentrations: drug.usual_concentrations.clone(),
            concentration_warning: drug.concentration_warning.clone(),
            requires_concentration_confirmation: drug.requires_concentration_confirmation(),
            routes: drug.routes.clone(),
            high_alert: drug.high_alert,
            variant_count: drug.variants.len() as u32,
            score,
        }
    }
}

/// FFI-safe dose point, raw and formatted.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDoseFigures {
    pub dose_per_kg: f64,
    pub dose_per_kg_label: String,
    pub total_dose: f64,
    pub total_dose_label: String,
    /// `None` while pending or hidden behind a confirmation
    pub volume_ml: Option<f64>,
    pub volume_label: Option<String>,
    pub expression: String,
}

impl FfiDoseFigures {
    fn build(figures: &DoseFigures, formatter: &ResultFormatter, show_volume: bool) -> Self {
        Self {
            dose_per_kg: figures.dose_per_kg,
            dose_per_kg_label: formatter.format_dose_per_kg(figures),
            total_dose: figures.total_dose,
            total_dose_label: formatter.format_total_dose(figures),
            volume_ml: figures.volume.value().filter(|_| show_volume),
            volume_label: formatter
                .format_volume_with_unit(figures)
                .filter(|_| show_volume),
            expression: figures.expression.clone(),
        }
    }
}

/// FFI-safe variant evaluation.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVariantResult {
    pub variant: String,
    pub label: String,
    pub species_match: String,
    pub route: Option<String>,
    pub frequency: Option<String>,
    pub note: Option<String>,
    pub instruction: Option<String>,
    /// Calculation failure, if any
    pub error: Option<String>,
    pub is_range: bool,
    /// One entry, or min then max
    pub figures: Vec<FfiDoseFigures>,
    pub dilution_warning: bool,
    pub max_dose_warning: bool,
    pub concentration_unconfirmed: bool,
    pub requires_confirmation: bool,
    pub blocking_alerts: Vec<String>,
    pub warnings: Vec<String>,
    pub dilution_hint: Option<String>,
    pub min_volume_ml: f64,
    pub max_per_kg: Option<f64>,
}

impl FfiVariantResult {
    fn build(drug: &DrugRecord, evaluation: &VariantEvaluation, formatter: &ResultFormatter, show_volume: bool) -> Self {
        let variant = drug.variant(&evaluation.variant);
        let (error, is_range, figures) = match &evaluation.result {
            Ok(result) => (
                None,
                matches!(result, CalculationResult::Range { .. }),
                result
                    .figures()
                    .into_iter()
                    .map(|f| FfiDoseFigures::build(f, formatter, show_volume))
                    .collect(),
            ),
            Err(e) => (Some(e.to_string()), false, Vec::new()),
        };
        let outcome = &evaluation.outcome;

        Self {
            variant: evaluation.variant.clone(),
            label: evaluation.label.clone(),
            species_match: format!("{:?}", evaluation.species_match),
            route: variant.and_then(|v| v.route.clone()),
            frequency: variant.and_then(|v| v.frequency.clone()),
            note: variant.and_then(|v| v.note.clone()),
            instruction: variant.and_then(|v| v.instruction.clone()),
            error,
            is_range,
            figures,
            dilution_warning: outcome.dilution_warning,
            max_dose_warning: outcome.max_dose_warning,
            concentration_unconfirmed: outcome.concentration_unconfirmed,
            requires_confirmation: outcome.requires_confirmation,
            blocking_alerts: outcome.blocking_alerts.clone(),
            warnings: outcome.warnings.clone(),
            dilution_hint: outcome.dilution_hint.clone(),
            min_volume_ml: outcome.min_volume_ml,
            max_per_kg: outcome.max_per_kg,
        }
    }
}

/// FFI-safe card.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCard {
    pub card_id: String,
    pub drug_id: String,
    pub drug_name: String,
    pub concentration_label: String,
    pub high_alert: bool,
    pub forbidden: bool,
    pub requires_concentration_confirmation: bool,
    pub concentration_confirmed: bool,
    pub selected_variant: Option<String>,
    pub variants: Vec<FfiVariantResult>,
    pub confirmation: String,
    pub volume_visible: bool,
}

/// FFI-safe patient context.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub species: Option<String>,
    pub weight_kg: Option<f64>,
    pub age_label: Option<String>,
}

/// FFI-safe rule dose.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRuleDose {
    pub dose_mg: Option<f64>,
    pub source: String,
    pub max_daily_mg: Option<f64>,
    pub route: Option<String>,
    pub frequency: Option<String>,
    pub note: Option<String>,
}

impl From<RuleDose> for FfiRuleDose {
    fn from(dose: RuleDose) -> Self {
        Self {
            dose_mg: dose.dose_mg,
            source: format!("{:?}", dose.source),
            max_daily_mg: dose.max_daily_mg,
            route: dose.route,
            frequency: dose.frequency,
            note: dose.note,
        }
    }
}
