//! Local workflow workspace store
//!
//! Persists the "current workflow" (name + graph state) between sessions,
//! the way the canvas kept it in browser local storage. Reads and writes
//! degrade gracefully: a corrupt or unreadable store yields defaults with a
//! warning, never an error. Writes are last-write-wins; there is no lock,
//! so two processes sharing a store directory can race.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::graph::WorkflowGraph;

/// Default name for an unsaved workflow
pub const DEFAULT_WORKFLOW_NAME: &str = "Workflow";

const NAME_FILE: &str = "workflow_name";
const STATE_FILE: &str = "workflow_state.json";

/// File-backed store for the current workflow name and graph
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    dir: PathBuf,
}

impl WorkspaceStore {
    /// Store rooted at the platform data dir (`~/.local/share/xflow`)
    pub fn default_location() -> Self {
        let dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("xflow");
        Self { dir }
    }

    /// Store rooted at an explicit directory (tests, --workspace flag)
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Current workflow name, or the default if none is stored
    pub fn workflow_name(&self) -> String {
        match fs::read_to_string(self.dir.join(NAME_FILE)) {
            Ok(name) => {
                let trimmed = name.trim();
                if trimmed.is_empty() {
                    DEFAULT_WORKFLOW_NAME.to_string()
                } else {
                    trimmed.to_string()
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                DEFAULT_WORKFLOW_NAME.to_string()
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to read workflow name, using default");
                DEFAULT_WORKFLOW_NAME.to_string()
            }
        }
    }

    /// Persist the workflow name (trimmed; empty falls back to the default)
    pub fn save_workflow_name(&self, name: &str) {
        let trimmed = name.trim();
        let to_save = if trimmed.is_empty() {
            DEFAULT_WORKFLOW_NAME
        } else {
            trimmed
        };
        if let Err(err) = self.write_file(NAME_FILE, to_save.as_bytes()) {
            tracing::warn!(error = %err, "failed to save workflow name");
        }
    }

    /// Reset the name back to the default
    pub fn reset_workflow_name(&self) {
        self.remove_file(NAME_FILE);
    }

    /// Stored graph state, if any
    pub fn workflow_state(&self) -> Option<WorkflowGraph> {
        let raw = match fs::read_to_string(self.dir.join(STATE_FILE)) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read workflow state");
                return None;
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => WorkflowGraph::ensure_valid(&value),
            Err(err) => {
                tracing::warn!(error = %err, "stored workflow state is not valid JSON");
                None
            }
        }
    }

    /// Persist the graph state. Empty graphs are skipped so an accidental
    /// clear does not overwrite real work.
    pub fn save_workflow_state(&self, graph: &WorkflowGraph) {
        if graph.nodes.is_empty() && graph.edges.is_empty() {
            tracing::debug!("skipping save of empty workflow state");
            return;
        }
        let json = match serde_json::to_string(graph) {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize workflow state");
                return;
            }
        };
        if let Err(err) = self.write_file(STATE_FILE, json.as_bytes()) {
            tracing::warn!(error = %err, "failed to save workflow state");
        } else {
            tracing::debug!(
                nodes = graph.nodes.len(),
                edges = graph.edges.len(),
                "workflow state saved"
            );
        }
    }

    /// Remove the stored graph state
    pub fn clear_workflow_state(&self) {
        self.remove_file(STATE_FILE);
    }

    /// Start a fresh workflow: clear state and reset the name
    pub fn start_new_workflow(&self) {
        self.clear_workflow_state();
        self.reset_workflow_name();
        tracing::debug!("workspace reset for new workflow");
    }

    fn write_file(&self, file: &str, contents: &[u8]) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(file), contents)
    }

    fn remove_file(&self, file: &str) {
        match fs::remove_file(self.dir.join(file)) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => tracing::warn!(error = %err, file, "failed to remove store file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, NodeData, Position};
    use tempfile::TempDir;

    fn store() -> (TempDir, WorkspaceStore) {
        let dir = TempDir::new().unwrap();
        let store = WorkspaceStore::at(dir.path());
        (dir, store)
    }

    fn one_node_graph() -> WorkflowGraph {
        WorkflowGraph {
            nodes: vec![Node {
                id: "n1".into(),
                data: NodeData::new("llm/chat", "llmnode"),
                position: Position::default(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn name_defaults_when_missing() {
        let (_dir, store) = store();
        assert_eq!(store.workflow_name(), DEFAULT_WORKFLOW_NAME);
    }

    #[test]
    fn name_roundtrip_trims() {
        let (_dir, store) = store();
        store.save_workflow_name("  My Flow  ");
        assert_eq!(store.workflow_name(), "My Flow");

        store.save_workflow_name("   ");
        assert_eq!(store.workflow_name(), DEFAULT_WORKFLOW_NAME);
    }

    #[test]
    fn state_roundtrip() {
        let (_dir, store) = store();
        assert!(store.workflow_state().is_none());

        let graph = one_node_graph();
        store.save_workflow_state(&graph);
        assert_eq!(store.workflow_state().unwrap(), graph);
    }

    #[test]
    fn empty_state_save_is_skipped() {
        let (_dir, store) = store();
        let graph = one_node_graph();
        store.save_workflow_state(&graph);

        // An empty graph must not clobber the stored one
        store.save_workflow_state(&WorkflowGraph::new());
        assert_eq!(store.workflow_state().unwrap(), graph);
    }

    #[test]
    fn corrupt_state_yields_none() {
        let (dir, store) = store();
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(dir.path().join(STATE_FILE), "{not json").unwrap();
        assert!(store.workflow_state().is_none());
    }

    #[test]
    fn start_new_workflow_clears_everything() {
        let (_dir, store) = store();
        store.save_workflow_name("Keep");
        store.save_workflow_state(&one_node_graph());

        store.start_new_workflow();
        assert_eq!(store.workflow_name(), DEFAULT_WORKFLOW_NAME);
        assert!(store.workflow_state().is_none());
    }
}
