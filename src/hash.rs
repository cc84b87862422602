//! Content-derived workflow ids
//!
//! Identical graph content must map to the same id across sessions, so the
//! hash runs over a canonical serialization: the viewport and node
//! positions are stripped (panning the canvas is not a content change) and
//! object keys are emitted sorted.

use serde_json::Value;
use sha1::{Digest, Sha1};

use crate::graph::WorkflowGraph;

/// Prefix for all derived workflow ids
const WORKFLOW_ID_PREFIX: &str = "workflow_";

/// Derive the stable id for a graph: `workflow_<sha1hex>`.
pub fn workflow_id(graph: &WorkflowGraph) -> String {
    let canonical = canonical_json(graph);
    format!("{}{}", WORKFLOW_ID_PREFIX, sha1_hex(canonical.as_bytes()))
}

/// SHA-1 digest as lowercase hex
pub fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher
        .finalize()
        .iter()
        .fold(String::with_capacity(40), |mut acc, byte| {
            use std::fmt::Write;
            let _ = write!(acc, "{:02x}", byte);
            acc
        })
}

/// Canonical serialization for hashing.
///
/// serde_json's default map is ordered by key, so serializing through
/// `Value` yields a deterministic byte sequence.
fn canonical_json(graph: &WorkflowGraph) -> String {
    let mut value = serde_json::to_value(graph).unwrap_or(Value::Null);
    if let Some(obj) = value.as_object_mut() {
        obj.remove("view");
        if let Some(nodes) = obj.get_mut("nodes").and_then(Value::as_array_mut) {
            for node in nodes {
                if let Some(node_obj) = node.as_object_mut() {
                    node_obj.remove("position");
                }
            }
        }
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, NodeData, Port, Position, ViewState};

    fn sample_graph() -> WorkflowGraph {
        let mut data = NodeData::new("endnode/print", "endnode");
        data.inputs.push(Port::new("p1").streaming());
        WorkflowGraph {
            nodes: vec![Node {
                id: "n1".into(),
                data,
                position: Position { x: 100.0, y: 50.0 },
            }],
            ..Default::default()
        }
    }

    #[test]
    fn id_has_prefix_and_sha1_length() {
        let id = workflow_id(&sample_graph());
        assert!(id.starts_with("workflow_"));
        assert_eq!(id.len(), "workflow_".len() + 40);
    }

    #[test]
    fn hashing_is_idempotent() {
        let graph = sample_graph();
        assert_eq!(workflow_id(&graph), workflow_id(&graph));
        assert_eq!(workflow_id(&graph), workflow_id(&graph.clone()));
    }

    #[test]
    fn view_and_position_changes_do_not_change_id() {
        let graph = sample_graph();
        let id = workflow_id(&graph);

        let mut moved = graph.clone();
        moved.nodes[0].position = Position { x: -3.0, y: 999.0 };
        moved.view = ViewState {
            x: 42.0,
            y: 42.0,
            scale: 0.5,
        };
        assert_eq!(workflow_id(&moved), id);
    }

    #[test]
    fn content_changes_change_id() {
        let graph = sample_graph();
        let id = workflow_id(&graph);

        let mut changed = graph.clone();
        changed.nodes[0].data.function_id = "llmnode".into();
        assert_ne!(workflow_id(&changed), id);
    }

    #[test]
    fn sha1_hex_known_vector() {
        // sha1("abc")
        assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn empty_graph_hashes() {
        let id = workflow_id(&WorkflowGraph::new());
        assert!(id.starts_with("workflow_"));
    }
}
