//! Save and execution coordinators
//!
//! [`WorkflowCoordinator`] owns the orchestration the canvas page used to
//! do by hand: validate, derive the content id, gate overwrites, persist,
//! classify, dispatch, and fold the resulting [`SessionAction`]s into the
//! session state. Backends, prompts and notifications are all trait seams,
//! so the whole flow is testable without a server or a terminal.
//!
//! Ordering on the save path: duplicate check, then overwrite gate, then
//! persist. The execute path persists unconditionally (no gate), then
//! dispatches buffered or streaming based solely on the graph shape.

use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use colored::Colorize;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::api::{Ack, ExecuteRequest, StreamEvent, WorkflowService};
use crate::error::{FlowError, Result};
use crate::graph::{self, WorkflowGraph};
use crate::hash;
use crate::notify::Notifier;
use crate::session::{SessionAction, SessionState};
use crate::validate::{validate_workflow_name, workflow_filename};

// ============================================================================
// OVERWRITE GATE
// ============================================================================

/// Decision seam for the "overwrite existing workflow?" prompt
#[async_trait]
pub trait ConfirmGate: Send + Sync {
    /// `true` approves overwriting the stored workflow named `name`
    async fn confirm_overwrite(&self, name: &str) -> bool;
}

/// Interactive terminal prompt (y/N, defaults to no)
#[derive(Debug, Default)]
pub struct PromptGate;

#[async_trait]
impl ConfirmGate for PromptGate {
    async fn confirm_overwrite(&self, name: &str) -> bool {
        print!(
            "{} Workflow '{}' already exists. Overwrite? [y/N] ",
            "?".yellow().bold(),
            name
        );
        let _ = io::stdout().flush();
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

/// Scripted gate for tests: fixed answer, records what it was asked
#[derive(Debug)]
pub struct PresetGate {
    answer: bool,
    prompts: Mutex<Vec<String>>,
}

impl PresetGate {
    pub fn allow() -> Self {
        Self {
            answer: true,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn deny() -> Self {
        Self {
            answer: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Names this gate was asked to confirm, in order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConfirmGate for PresetGate {
    async fn confirm_overwrite(&self, name: &str) -> bool {
        self.prompts.lock().unwrap().push(name.to_string());
        self.answer
    }
}

// ============================================================================
// COORDINATOR
// ============================================================================

/// Options for one execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Free-text input passed to the workflow's entry node
    pub input: String,
    /// Correlation id; defaults server-side when `None`
    pub interaction_id: Option<String>,
    /// Knowledge-base collections made available to retrieval nodes
    pub collections: Vec<String>,
}

pub struct WorkflowCoordinator {
    service: Arc<dyn WorkflowService>,
    notifier: Arc<dyn Notifier>,
    gate: Arc<dyn ConfirmGate>,
    state: Mutex<SessionState>,
}

impl WorkflowCoordinator {
    pub fn new(
        service: Arc<dyn WorkflowService>,
        notifier: Arc<dyn Notifier>,
        gate: Arc<dyn ConfirmGate>,
    ) -> Self {
        Self {
            service,
            notifier,
            gate,
            state: Mutex::new(SessionState::new()),
        }
    }

    /// Snapshot of the session state
    pub fn state(&self) -> SessionState {
        self.state.lock().unwrap().clone()
    }

    fn dispatch(&self, action: SessionAction) {
        self.state.lock().unwrap().apply(action);
    }

    /// Save `graph` under `name`.
    ///
    /// Empty graphs are rejected before any network traffic. A stored
    /// workflow with the same filename routes through the overwrite gate;
    /// a declined gate is a `NameConflict` and nothing is persisted. If
    /// the duplicate check itself fails, the save proceeds with a warning
    /// rather than blocking the user on a listing endpoint.
    pub async fn save(&self, graph: &WorkflowGraph, name: &str) -> Result<Ack> {
        let name = validate_workflow_name(name)?;
        if graph.is_empty() {
            return Err(FlowError::validation("Cannot save an empty workflow"));
        }

        self.dispatch(SessionAction::SaveRequested);
        self.notifier.loading("Saving workflow...");

        let workflow_id = hash::workflow_id(graph);
        let payload = graph.to_payload(&workflow_id, name);

        match self.service.list_workflows().await {
            Ok(listing) => {
                if listing.iter().any(|f| *f == workflow_filename(name)) {
                    tracing::debug!(workflow_name = name, "duplicate found, prompting");
                    if !self.gate.confirm_overwrite(name).await {
                        self.dispatch(SessionAction::SaveFailed("overwrite declined".into()));
                        return Err(FlowError::NameConflict {
                            name: name.to_string(),
                        });
                    }
                    self.dispatch(SessionAction::SaveConfirmed);
                }
            }
            Err(err) => {
                // Listing being down must not block the save
                tracing::warn!(error = %err, "duplicate check failed, saving anyway");
                self.notifier
                    .warn("Could not check for existing workflows, saving anyway");
            }
        }

        match self.service.save_workflow(name, payload).await {
            Ok(ack) => {
                self.dispatch(SessionAction::SaveDone);
                let message = ack
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("Workflow '{}' saved", name));
                self.notifier.success(&message);
                tracing::info!(workflow_name = name, %workflow_id, "workflow saved");
                Ok(ack)
            }
            Err(err) => {
                self.dispatch(SessionAction::SaveFailed(err.to_string()));
                self.notifier.error(&err.to_string());
                Err(err)
            }
        }
    }

    /// Execute `graph` under `name`.
    ///
    /// Persists first so the backend always runs the graph as drawn, then
    /// dispatches to the streaming or buffered endpoint depending on
    /// whether an end node has a streaming output port. The final output
    /// lands in the session state; streamed chunks also go to the
    /// notifier's chunk sink as they arrive.
    pub async fn execute(
        &self,
        graph: &WorkflowGraph,
        name: &str,
        options: ExecuteOptions,
        cancel: CancellationToken,
    ) -> Result<()> {
        let name = validate_workflow_name(name)?;
        if graph.is_empty() {
            return Err(FlowError::validation("Cannot execute an empty workflow"));
        }

        self.dispatch(SessionAction::ExecuteRequested);
        self.notifier.loading("Executing workflow...");

        let workflow_id = hash::workflow_id(graph);
        let payload = graph.to_payload(&workflow_id, name);
        if let Err(err) = self.service.save_workflow(name, payload).await {
            return self.fail_execution(err);
        }

        let mut request = ExecuteRequest::new(name, &workflow_id)
            .with_input(options.input)
            .with_collections(options.collections);
        if let Some(id) = options.interaction_id {
            request = request.with_interaction_id(id);
        }

        let streaming = graph::is_streaming_workflow(graph);
        tracing::debug!(workflow_name = name, %workflow_id, streaming, "dispatching");
        if streaming {
            self.run_streaming(request, cancel).await
        } else {
            self.run_buffered(request).await
        }
    }

    async fn run_buffered(&self, request: ExecuteRequest) -> Result<()> {
        match self.service.execute_by_id(request).await {
            Ok(result) => {
                self.dispatch(SessionAction::ExecuteDone(Some(result)));
                self.notifier.success("Workflow executed successfully");
                Ok(())
            }
            Err(err) => self.fail_execution(err),
        }
    }

    async fn run_streaming(
        &self,
        request: ExecuteRequest,
        cancel: CancellationToken,
    ) -> Result<()> {
        let mut stream = match self.service.execute_by_id_stream(request, cancel).await {
            Ok(stream) => stream,
            Err(err) => return self.fail_execution(err),
        };

        while let Some(event) = stream.next().await {
            match event {
                Ok(StreamEvent::Chunk(content)) => {
                    self.notifier.chunk(&content);
                    self.dispatch(SessionAction::ChunkReceived(content));
                }
                Ok(StreamEvent::End) => {
                    return self.finish_streaming();
                }
                Err(err) => return self.fail_execution(err),
            }
        }
        // Channel closed without an explicit end event
        self.finish_streaming()
    }

    fn finish_streaming(&self) -> Result<()> {
        self.dispatch(SessionAction::ExecuteDone(None));
        self.notifier.success("Workflow executed successfully");
        Ok(())
    }

    fn fail_execution(&self, err: FlowError) -> Result<()> {
        self.dispatch(SessionAction::ExecuteFailed(err.to_string()));
        self.notifier.error(&err.to_string());
        Err(err)
    }
}
