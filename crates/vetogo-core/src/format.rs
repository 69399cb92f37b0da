//! Display formatting for computed results.
//!
//! Rules:
//! - below 1: two decimals (`0,03`)
//! - from 1 to under 10: one decimal (`2,5`)
//! - 10 and above: nearest integer (`12`)
//!
//! Formatting never feeds back into calculation state.

use serde::{Deserialize, Serialize};

use crate::models::{DoseFigures, Volume};
use crate::units::TimeBasis;

/// Placeholder for values that must not be shown as numbers.
pub const NO_VALUE: &str = "—";

/// Display locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    /// Decimal comma
    Fr,
    /// Decimal point
    En,
}

impl Locale {
    pub fn decimal_separator(&self) -> char {
        match self {
            Locale::Fr => ',',
            Locale::En => '.',
        }
    }
}

/// Locale-aware formatter.
#[derive(Debug, Clone, Copy)]
pub struct ResultFormatter {
    locale: Locale,
}

impl ResultFormatter {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Format a computed value with the magnitude-banded precision.
    pub fn format_value(&self, value: f64) -> String {
        if !value.is_finite() {
            return NO_VALUE.to_string();
        }
        let magnitude = value.abs();
        let text = if magnitude < 1.0 {
            format!("{:.2}", value)
        } else if magnitude < 10.0 {
            format!("{:.1}", value)
        } else {
            format!("{:.0}", value.round())
        };
        self.localize(text)
    }

    /// Format a catalog rate as written (`0,01`, `2,5`).
    pub fn format_rate(&self, value: f64) -> String {
        if !value.is_finite() {
            return NO_VALUE.to_string();
        }
        self.localize(value.to_string())
    }

    /// Format a volume; `None` when it is withheld.
    pub fn format_volume(&self, volume: &Volume) -> Option<String> {
        volume.value().map(|ml| self.format_value(ml))
    }

    /// `"0,2 mg"`, `"15 UI"`, or the volume for volume-direct doses.
    pub fn format_total_dose(&self, figures: &DoseFigures) -> String {
        format!(
            "{} {}",
            self.format_value(figures.total_dose),
            rate_unit_label(&figures.dose_unit, figures.per_time)
        )
    }

    /// `"0,01 mg/kg"`.
    pub fn format_dose_per_kg(&self, figures: &DoseFigures) -> String {
        format!(
            "{} {}",
            self.format_rate(figures.dose_per_kg),
            per_kg_unit_label(&figures.dose_unit, figures.per_time)
        )
    }

    /// `"0,2 mL"`, or `None` when pending.
    pub fn format_volume_with_unit(&self, figures: &DoseFigures) -> Option<String> {
        self.format_volume(&figures.volume)
            .map(|text| format!("{} {}", text, volume_unit_label(figures.per_time)))
    }

    fn localize(&self, text: String) -> String {
        match self.locale.decimal_separator() {
            '.' => text,
            sep => text.replace('.', &sep.to_string()),
        }
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(Locale::Fr)
    }
}

/// `"mg/kg"`, `"µg/kg/min"`.
pub fn per_kg_unit_label(dose_unit: &str, per_time: Option<TimeBasis>) -> String {
    format!("{}/kg{}", dose_unit, per_time.map(|t| t.suffix()).unwrap_or(""))
}

/// `"mg"`, `"mg/h"`.
pub fn rate_unit_label(dose_unit: &str, per_time: Option<TimeBasis>) -> String {
    format!("{}{}", dose_unit, per_time.map(|t| t.suffix()).unwrap_or(""))
}

/// `"mL"`, `"mL/h"`.
pub fn volume_unit_label(per_time: Option<TimeBasis>) -> String {
    rate_unit_label("mL", per_time)
}
