//! Per-card confirmation state machine.
//!
//! ```text
//! NotRequired ──guardrail fires──▶ PendingConfirmation ──acknowledge──▶ Confirmed
//!      ▲                                                                    │
//!      └──────────────────────── inputs change ─────────────────────────────┘
//! ```
//!
//! An acknowledgment covers one exact set of inputs. Any change to weight,
//! species, selected variant or the concentration flag discards it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::Species;

/// Confirmation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfirmationError {
    #[error("Nothing to acknowledge: card is {0:?}")]
    NotPending(ConfirmationState),
}

pub type ConfirmationResult<T> = Result<T, ConfirmationError>;

/// Where a card stands with respect to user acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationState {
    NotRequired,
    PendingConfirmation,
    Confirmed,
}

/// The inputs an acknowledgment is bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationInputs {
    pub weight_kg: Option<f64>,
    pub species: Option<Species>,
    pub variant: String,
    pub concentration_confirmed: bool,
}

/// Confirmation gate owned by one card.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationGate {
    state: ConfirmationState,
    inputs: Option<ConfirmationInputs>,
    acknowledged_at: Option<DateTime<Utc>>,
}

impl Default for ConfirmationGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfirmationGate {
    pub fn new() -> Self {
        Self {
            state: ConfirmationState::NotRequired,
            inputs: None,
            acknowledged_at: None,
        }
    }

    pub fn state(&self) -> ConfirmationState {
        self.state
    }

    /// When the current acknowledgment was given.
    pub fn acknowledged_at(&self) -> Option<DateTime<Utc>> {
        self.acknowledged_at
    }

    /// Whether the volume may be shown.
    pub fn volume_visible(&self) -> bool {
        matches!(self.state, ConfirmationState::NotRequired | ConfirmationState::Confirmed)
    }

    /// Bring the gate in line with freshly computed inputs and outcome.
    pub fn sync(&mut self, inputs: ConfirmationInputs, requires_confirmation: bool) -> ConfirmationState {
        let implied = if requires_confirmation {
            ConfirmationState::PendingConfirmation
        } else {
            ConfirmationState::NotRequired
        };

        if self.inputs.as_ref() != Some(&inputs) {
            if self.state == ConfirmationState::Confirmed {
                debug!(variant = %inputs.variant, "inputs changed, acknowledgment discarded");
            }
            self.state = implied;
            self.acknowledged_at = None;
            self.inputs = Some(inputs);
            return self.state;
        }

        self.state = match (self.state, requires_confirmation) {
            (_, false) => ConfirmationState::NotRequired,
            (ConfirmationState::NotRequired, true) => ConfirmationState::PendingConfirmation,
            (current, true) => current,
        };
        if self.state != ConfirmationState::Confirmed {
            self.acknowledged_at = None;
        }
        self.state
    }

    /// Record the user's acknowledgment of the current warning.
    pub fn acknowledge(&mut self) -> ConfirmationResult<ConfirmationState> {
        if self.state != ConfirmationState::PendingConfirmation {
            return Err(ConfirmationError::NotPending(self.state));
        }
        self.state = ConfirmationState::Confirmed;
        self.acknowledged_at = Some(Utc::now());
        Ok(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(weight_kg: f64) -> ConfirmationInputs {
        ConfirmationInputs {
            weight_kg: Some(weight_kg),
            species: Some(Species::Canine),
            variant: "common".into(),
            concentration_confirmed: false,
        }
    }

    #[test]
    fn test_starts_not_required() {
        let gate = ConfirmationGate::new();
        assert_eq!(gate.state(), ConfirmationState::NotRequired);
        assert!(gate.volume_visible());
    }

    #[test]
    fn test_pending_then_confirmed() {
        let mut gate = ConfirmationGate::new();

        assert_eq!(gate.sync(inputs(3.0), true), ConfirmationState::PendingConfirmation);
        assert!(!gate.volume_visible());

        assert_eq!(gate.acknowledge(), Ok(ConfirmationState::Confirmed));
        assert!(gate.volume_visible());
        assert!(gate.acknowledged_at().is_some());

        // same inputs, still triggering: acknowledgment holds
        assert_eq!(gate.sync(inputs(3.0), true), ConfirmationState::Confirmed);
    }

    #[test]
    fn test_confirmed_is_not_sticky_across_input_change() {
        let mut gate = ConfirmationGate::new();
        gate.sync(inputs(3.0), true);
        gate.acknowledge().unwrap();

        assert_eq!(gate.sync(inputs(2.5), true), ConfirmationState::PendingConfirmation);
        assert!(gate.acknowledged_at().is_none());
        assert!(!gate.volume_visible());
    }

    #[test]
    fn test_input_change_clearing_the_guardrail() {
        let mut gate = ConfirmationGate::new();
        gate.sync(inputs(3.0), true);
        gate.acknowledge().unwrap();

        assert_eq!(gate.sync(inputs(20.0), false), ConfirmationState::NotRequired);
        assert!(gate.volume_visible());
    }

    #[test]
    fn test_variant_change_resets() {
        let mut gate = ConfirmationGate::new();
        gate.sync(inputs(3.0), true);
        gate.acknowledge().unwrap();

        let mut other = inputs(3.0);
        other.variant = "feline".into();
        assert_eq!(gate.sync(other, true), ConfirmationState::PendingConfirmation);
    }

    #[test]
    fn test_acknowledge_only_from_pending() {
        let mut gate = ConfirmationGate::new();
        assert_eq!(
            gate.acknowledge(),
            Err(ConfirmationError::NotPending(ConfirmationState::NotRequired))
        );

        gate.sync(inputs(3.0), true);
        gate.acknowledge().unwrap();
        assert_eq!(
            gate.acknowledge(),
            Err(ConfirmationError::NotPending(ConfirmationState::Confirmed))
        );
    }
}
