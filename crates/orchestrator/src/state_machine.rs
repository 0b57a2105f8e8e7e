use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    PlanReady,
    Generating,
    Materialized,
    Validating,
    Retry,
    Succeeded,
    Exhausted,
    /// Generator broke its output contract or the workspace could not be
    /// updated; nothing further is attempted
    Aborted,
}

impl LoopState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlanReady => "plan_ready",
            Self::Generating => "generating",
            Self::Materialized => "materialized",
            Self::Validating => "validating",
            Self::Retry => "retry",
            Self::Succeeded => "succeeded",
            Self::Exhausted => "exhausted",
            Self::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Exhausted | Self::Aborted)
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the current state of one repair loop and rejects transitions the
/// loop must never take.
#[derive(Debug)]
pub struct LoopStateMachine {
    state: LoopState,
}

impl Default for LoopStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopStateMachine {
    pub fn new() -> Self {
        Self {
            state: LoopState::PlanReady,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn transition(&mut self, to: LoopState) -> Result<()> {
        Self::validate_transition(&self.state, &to)?;
        self.state = to;
        Ok(())
    }

    pub fn validate_transition(from: &LoopState, to: &LoopState) -> Result<()> {
        if Self::allowed_transitions(from).contains(to) {
            Ok(())
        } else {
            Err(OrchestratorError::InvalidTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }

    fn allowed_transitions(from: &LoopState) -> Vec<LoopState> {
        match from {
            LoopState::PlanReady => vec![LoopState::Generating],
            LoopState::Generating => vec![
                LoopState::Materialized,
                LoopState::Retry,
                LoopState::Exhausted,
                LoopState::Aborted,
            ],
            LoopState::Materialized => vec![LoopState::Validating],
            LoopState::Validating => vec![
                LoopState::Succeeded,
                LoopState::Retry,
                LoopState::Exhausted,
                LoopState::Aborted,
            ],
            LoopState::Retry => vec![LoopState::Generating],
            LoopState::Succeeded | LoopState::Exhausted | LoopState::Aborted => vec![],
        }
    }

    pub fn can_transition(from: &LoopState, to: &LoopState) -> bool {
        Self::validate_transition(from, to).is_ok()
    }
}
