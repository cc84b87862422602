//! Session state machine
//!
//! Explicit reducer over the save/execute lifecycle: coordinators emit
//! [`SessionAction`]s, the state folds them. Every failure action drops
//! the busy flags, so the session can never wedge in a loading state.

use serde_json::Value;

/// What the session is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    /// Persist in flight (including the overwrite prompt)
    Saving,
    /// Execution dispatched, output pending or streaming
    Executing,
}

/// Output of the most recent execution. One cell, overwritten wholesale
/// per run; streamed chunks accumulate into the `Stream` buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutput {
    /// Final result of a buffered execution
    Buffered(Value),
    /// Accumulated chunks of a streaming execution
    Stream(String),
    /// Terminal failure with no usable partial output
    Error(String),
}

impl ExecutionOutput {
    /// Rendered form for display
    pub fn render(&self) -> String {
        match self {
            Self::Buffered(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            Self::Stream(text) => text.clone(),
            Self::Error(message) => message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    SaveRequested,
    /// Overwrite approved; persisting proceeds
    SaveConfirmed,
    SaveDone,
    SaveFailed(String),
    ExecuteRequested,
    ChunkReceived(String),
    /// `Some` carries a buffered result; `None` closes a streamed run
    ExecuteDone(Option<Value>),
    ExecuteFailed(String),
    OutputCleared,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub executing: bool,
    pub last_output: Option<ExecutionOutput>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, action: SessionAction) {
        match action {
            SessionAction::SaveRequested | SessionAction::SaveConfirmed => {
                self.phase = SessionPhase::Saving;
            }
            SessionAction::SaveDone => {
                self.phase = SessionPhase::Idle;
            }
            SessionAction::SaveFailed(_) => {
                self.phase = SessionPhase::Idle;
                self.executing = false;
            }
            SessionAction::ExecuteRequested => {
                self.phase = SessionPhase::Executing;
                self.executing = true;
                self.last_output = None;
            }
            SessionAction::ChunkReceived(chunk) => match &mut self.last_output {
                Some(ExecutionOutput::Stream(buffer)) => buffer.push_str(&chunk),
                _ => self.last_output = Some(ExecutionOutput::Stream(chunk)),
            },
            SessionAction::ExecuteDone(result) => {
                self.phase = SessionPhase::Idle;
                self.executing = false;
                if let Some(value) = result {
                    self.last_output = Some(ExecutionOutput::Buffered(value));
                }
                // None: a streamed run ended, accumulated output stands
            }
            SessionAction::ExecuteFailed(message) => {
                self.phase = SessionPhase::Idle;
                self.executing = false;
                // A mid-stream failure keeps the partial buffer
                match &self.last_output {
                    Some(ExecutionOutput::Stream(buffer)) if !buffer.is_empty() => {}
                    _ => self.last_output = Some(ExecutionOutput::Error(message)),
                }
            }
            SessionAction::OutputCleared => {
                self.last_output = None;
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.executing || self.phase != SessionPhase::Idle
    }
}
