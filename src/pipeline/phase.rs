//! Request lifecycle state machine.
//!
//! ```text
//! Received → SecurityChecked → RateChecked → Handled ─┐
//!     │             │               │                 ├→ Logged → Responded
//!     └─────────────┴───────────────┴──→ Rejected ────┘
//! ```
//!
//! Requests that match no route skip the guard: `Received → Handled`.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPhase {
    Received,
    SecurityChecked,
    RateChecked,
    Handled,
    Rejected,
    Logged,
    Responded,
}

impl RequestPhase {
    pub fn can_advance_to(self, next: RequestPhase) -> bool {
        use RequestPhase::*;
        matches!(
            (self, next),
            (Received, SecurityChecked | Handled | Rejected)
                | (SecurityChecked, RateChecked | Rejected)
                | (RateChecked, Handled | Rejected)
                | (Handled | Rejected, Logged)
                | (Logged, Responded)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == RequestPhase::Responded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal request phase transition {from:?} -> {to:?}")]
pub struct PhaseError {
    pub from: RequestPhase,
    pub to: RequestPhase,
}

/// Phases visited by one request, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseTrail {
    phases: Vec<RequestPhase>,
}

impl PhaseTrail {
    pub fn new() -> Self {
        Self {
            phases: vec![RequestPhase::Received],
        }
    }

    pub fn current(&self) -> RequestPhase {
        *self.phases.last().unwrap_or(&RequestPhase::Received)
    }

    pub fn advance(&mut self, next: RequestPhase) -> Result<(), PhaseError> {
        let from = self.current();
        if !from.can_advance_to(next) {
            return Err(PhaseError { from, to: next });
        }
        self.phases.push(next);
        Ok(())
    }

    /// Route to `Rejected` from wherever the request stopped. No-op when the
    /// request already finished handling or was rejected.
    pub fn reject(&mut self) {
        if self.current().can_advance_to(RequestPhase::Rejected) {
            self.phases.push(RequestPhase::Rejected);
        }
    }

    pub fn phases(&self) -> &[RequestPhase] {
        &self.phases
    }
}

impl Default for PhaseTrail {
    fn default() -> Self {
        Self::new()
    }
}
