//! Request State Management and Stage Tracking
//!
//! - `StageState`: the discrete stages of one build request
//! - `RequestState`: current stage, completed stages and failure detail
//!
//! Stages run in a fixed linear order. The only optional stage is the native
//! interpreter build; any stage may fail.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Stage enumeration - discrete states in the build request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageState {
    /// Clone and release checkout
    Staging,

    /// Compatibility edits to the cloned tree
    Patching,

    /// Bytecode cross-compiler build
    BytecodeCompiler,

    /// Host-native interpreter build (optional)
    NativeInterpreter,

    /// Runtime package installation
    Packages,

    /// Firmware image build, including frozen-module harvesting
    FirmwareImage,

    /// Artifact copy to the destination
    Publishing,

    /// Request completed successfully
    Completed,

    /// Request failed, nothing was published
    Failed,
}

impl StageState {
    /// Get the human-readable name for this stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageState::Staging => "staging",
            StageState::Patching => "patching",
            StageState::BytecodeCompiler => "bytecode-compiler",
            StageState::NativeInterpreter => "native-interpreter",
            StageState::Packages => "packages",
            StageState::FirmwareImage => "firmware-image",
            StageState::Publishing => "publishing",
            StageState::Completed => "completed",
            StageState::Failed => "failed",
        }
    }

    /// Get all valid transitions FROM this stage.
    pub fn valid_next_phases(&self) -> Vec<StageState> {
        match self {
            StageState::Staging => vec![StageState::Patching, StageState::Failed],
            StageState::Patching => vec![StageState::BytecodeCompiler, StageState::Failed],
            StageState::BytecodeCompiler => vec![
                StageState::NativeInterpreter,
                StageState::Packages,
                StageState::Failed,
            ],
            StageState::NativeInterpreter => vec![StageState::Packages, StageState::Failed],
            StageState::Packages => vec![StageState::FirmwareImage, StageState::Failed],
            StageState::FirmwareImage => vec![StageState::Publishing, StageState::Failed],
            StageState::Publishing => vec![StageState::Completed, StageState::Failed],
            StageState::Completed => vec![],
            StageState::Failed => vec![],
        }
    }

    /// Check if a transition to the given stage is valid.
    pub fn can_transition_to(&self, next: StageState) -> bool {
        self.valid_next_phases().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StageState::Completed | StageState::Failed)
    }
}

/// Progress of one build request.
#[derive(Debug, Clone)]
pub struct RequestState {
    /// Current stage
    pub phase: StageState,

    /// Stages finished successfully, in order
    pub completed: Vec<StageState>,

    /// Error message if the request failed
    pub error: Option<String>,

    /// Request start timestamp
    pub start_time: SystemTime,

    /// Last stage update timestamp
    pub last_update_time: SystemTime,
}

impl RequestState {
    /// Create a new request state, positioned on the first stage.
    pub fn new() -> Self {
        let now = SystemTime::now();
        RequestState {
            phase: StageState::Staging,
            completed: Vec::new(),
            error: None,
            start_time: now,
            last_update_time: now,
        }
    }

    /// Finish the current stage and move to `next_phase`.
    pub fn transition_to(&mut self, next_phase: StageState) -> Result<(), String> {
        if !self.phase.can_transition_to(next_phase) {
            return Err(format!(
                "Invalid stage transition: {} -> {}",
                self.phase.as_str(),
                next_phase.as_str()
            ));
        }
        self.completed.push(self.phase);
        self.phase = next_phase;
        self.last_update_time = SystemTime::now();
        Ok(())
    }

    /// Record an error and mark the request as failed.
    pub fn record_error(&mut self, error: String) {
        self.error = Some(error);
        self.phase = StageState::Failed;
        self.last_update_time = SystemTime::now();
    }

    /// Names of the completed stages
    pub fn completed_names(&self) -> Vec<String> {
        self.completed.iter().map(|s| s.as_str().to_string()).collect()
    }

    /// Get time elapsed since request start.
    pub fn elapsed_since_start(&self) -> Result<std::time::Duration, std::time::SystemTimeError> {
        self.start_time.elapsed()
    }
}

impl Default for RequestState {
    fn default() -> Self {
        Self::new()
    }
}
