//! xflow - save and execute xgen canvas workflows

pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod graph;
pub mod hash;
pub mod notify;
pub mod session;
pub mod storage;
pub mod validate;

pub use api::{
    Ack, ChunkStream, ExecuteRequest, HttpWorkflowService, MockWorkflowService, StreamEvent,
    WorkflowService,
};
pub use config::FlowConfig;
pub use coordinator::{ConfirmGate, ExecuteOptions, PresetGate, PromptGate, WorkflowCoordinator};
pub use error::{FixSuggestion, FlowError, Result};
pub use graph::{is_streaming_workflow, WorkflowGraph};
pub use notify::{Notifier, RecordingNotifier, TermNotifier};
pub use session::{ExecutionOutput, SessionAction, SessionState};
pub use storage::WorkspaceStore;
