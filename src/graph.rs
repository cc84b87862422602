//! Workflow graph model
//!
//! Mirrors the canvas JSON wire format: nodes carry a `data` block with
//! function id, ports and parameters; edges connect node ports; `view` is
//! the canvas viewport. `workflow_id` and `workflow_name` are *not* part of
//! the graph - they are derived and merged in at save/execute time.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Function id that marks a terminal/output node
pub const ENDNODE_FUNCTION_ID: &str = "endnode";

/// Canvas viewport
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        }
    }
}

/// Node position on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Input or output port on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub port_type: String,
    /// `true` on an endnode input marks the workflow as streaming-capable
    #[serde(default, skip_serializing_if = "is_false")]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub multi: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Port {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            port_type: String::new(),
            stream: false,
            required: false,
            multi: false,
        }
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// User-editable parameter on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

/// Payload of a canvas node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    pub id: String,
    #[serde(default)]
    pub node_name: String,
    #[serde(default)]
    pub function_id: String,
    #[serde(default)]
    pub inputs: Vec<Port>,
    #[serde(default)]
    pub outputs: Vec<Port>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl NodeData {
    pub fn new(id: impl Into<String>, function_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_name: String::new(),
            function_id: function_id.into(),
            inputs: vec![],
            outputs: vec![],
            parameters: vec![],
        }
    }
}

/// A node placed on the canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub data: NodeData,
    #[serde(default)]
    pub position: Position,
}

/// One end of an edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeConnection {
    pub node_id: String,
    pub port_id: String,
    #[serde(default)]
    pub port_type: String,
}

/// Connects a source node's output port to a target node's input port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: EdgeConnection,
    pub target: EdgeConnection,
}

/// The user-authored workflow graph
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkflowGraph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub view: ViewState,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// A graph with no nodes cannot be saved or executed
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Parse a graph from arbitrary JSON, normalizing missing fields.
    ///
    /// Absent nodes/edges become empty vecs; a missing or partial `view`
    /// falls back to the default viewport.
    pub fn ensure_valid(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        let nodes = value
            .get("nodes")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        let edges = value
            .get("edges")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        let view = value
            .get("view")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        Some(Self { nodes, edges, view })
    }

    /// Serialize with `workflow_id` / `workflow_name` merged in, as the
    /// backend expects on save and execute.
    pub fn to_payload(&self, workflow_id: &str, workflow_name: &str) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(obj) = value.as_object_mut() {
            obj.insert("workflow_id".into(), Value::String(workflow_id.into()));
            obj.insert("workflow_name".into(), Value::String(workflow_name.into()));
        }
        value
    }
}

/// True iff the graph terminates in a streaming-capable output node.
///
/// A workflow is streaming when any `endnode` declares an input port with
/// `stream: true`. A workflow with zero endnodes is non-streaming.
pub fn is_streaming_workflow(graph: &WorkflowGraph) -> bool {
    graph
        .nodes
        .iter()
        .filter(|node| node.data.function_id == ENDNODE_FUNCTION_ID)
        .any(|node| node.data.inputs.iter().any(|port| port.stream))
}

/// Streaming check over a raw JSON graph (e.g. loaded from disk) without
/// requiring a full typed parse.
pub fn is_streaming_value(value: &Value) -> bool {
    let Some(nodes) = value.get("nodes").and_then(Value::as_array) else {
        return false;
    };
    nodes
        .iter()
        .filter(|node| {
            node.pointer("/data/functionId").and_then(Value::as_str) == Some(ENDNODE_FUNCTION_ID)
        })
        .any(|node| {
            node.pointer("/data/inputs")
                .and_then(Value::as_array)
                .map(|inputs| {
                    inputs
                        .iter()
                        .any(|port| port.get("stream").and_then(Value::as_bool) == Some(true))
                })
                .unwrap_or(false)
        })
}
