//! Selection capture state machine: Idle → Pending → Armed → Idle.
//! Pending: pointer released, waiting out the debounce.
//! Armed: translate affordance shown for a captured selection.

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SelectionState {
    Idle,
    Pending,
    Armed,
}

impl std::fmt::Display for SelectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionState::Idle => write!(f, "Idle"),
            SelectionState::Pending => write!(f, "Pending"),
            SelectionState::Armed => write!(f, "Armed"),
        }
    }
}

impl SelectionState {
    /// Returns whether transitioning from `self` to `next` is valid.
    pub fn can_transition_to(self, next: SelectionState) -> bool {
        matches!(
            (self, next),
            (SelectionState::Idle, SelectionState::Pending)
                | (SelectionState::Pending, SelectionState::Pending) // new release restarts debounce
                | (SelectionState::Pending, SelectionState::Armed)
                | (SelectionState::Armed, SelectionState::Pending) // release elsewhere
                // Dismissal, empty or suppressed selection
                | (_, SelectionState::Idle)
        )
    }
}

/// Text captured at the end of the debounce, copied by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingSelection {
    pub text: String,
    /// Modifier held on release: capture without showing the affordance.
    pub suppressed: bool,
}

/// State holder with a watch channel for observers.
pub struct SelectionMachine {
    state: RwLock<SelectionState>,
    state_tx: watch::Sender<SelectionState>,
    state_rx: watch::Receiver<SelectionState>,
}

impl Default for SelectionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionMachine {
    pub fn new() -> Self {
        let (state_tx, state_rx) = watch::channel(SelectionState::Idle);
        Self {
            state: RwLock::new(SelectionState::Idle),
            state_tx,
            state_rx,
        }
    }

    pub fn current(&self) -> SelectionState {
        *self.state.read()
    }

    /// Attempt a state transition. Returns Ok(new_state) or Err with reason.
    pub fn transition(&self, next: SelectionState) -> Result<SelectionState, String> {
        let mut state = self.state.write();
        let current = *state;
        if !current.can_transition_to(next) {
            let msg = format!("invalid transition: {} -> {}", current, next);
            warn!("{}", msg);
            return Err(msg);
        }
        *state = next;
        let _ = self.state_tx.send(next);
        if current != next {
            info!(from = %current, to = %next, "selection_transition");
        }
        Ok(next)
    }

    /// Back to Idle from any state.
    pub fn reset(&self) {
        let mut state = self.state.write();
        let prev = *state;
        *state = SelectionState::Idle;
        let _ = self.state_tx.send(SelectionState::Idle);
        if prev != SelectionState::Idle {
            info!(from = %prev, "selection_reset");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SelectionState> {
        self.state_rx.clone()
    }
}
