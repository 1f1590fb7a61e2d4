pub mod apply;
pub mod codegen;
pub mod graph;
pub mod ops;
pub mod parse;
pub mod rules;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use apply::{apply_operations, ApplyOutcome, ApplyReport};
pub use codegen::{generate_react_code, EXPORT_FILENAME};
pub use graph::{Canvas, CanvasStore, SubscriptionId};
pub use ops::{Operation, OperationError, OperationRecord};
pub use parse::{parse_response, ParsedResponse};

// --- Types (matching the canvas wire format) ---

pub type NodeId = String;

/// Property bag of a node. Keys are defined per component kind.
pub type Props = serde_json::Map<String, serde_json::Value>;

/// The component kinds a canvas node can have.
///
/// Only the four named kinds can be created. `Other` keeps foreign type names
/// that arrive from a client intact so the generator can still report them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ComponentKind {
    Button,
    Input,
    Text,
    Card,
    Other(String),
}

impl ComponentKind {
    pub const CREATABLE: [ComponentKind; 4] = [
        ComponentKind::Button,
        ComponentKind::Input,
        ComponentKind::Text,
        ComponentKind::Card,
    ];

    /// Case-insensitive lookup of a creatable kind. Returns None for anything else.
    pub fn parse_creatable(name: &str) -> Option<ComponentKind> {
        match name.trim().to_ascii_lowercase().as_str() {
            "button" => Some(ComponentKind::Button),
            "input" => Some(ComponentKind::Input),
            "text" => Some(ComponentKind::Text),
            "card" => Some(ComponentKind::Card),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ComponentKind::Button => "Button",
            ComponentKind::Input => "Input",
            ComponentKind::Text => "Text",
            ComponentKind::Card => "Card",
            ComponentKind::Other(name) => name,
        }
    }
}

impl From<String> for ComponentKind {
    fn from(name: String) -> Self {
        ComponentKind::parse_creatable(&name).unwrap_or(ComponentKind::Other(name))
    }
}

impl From<ComponentKind> for String {
    fn from(kind: ComponentKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A component instance on the canvas. Matches ReactFlow's Node structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub props: Props,
}

impl Node {
    /// String prop with the kind's default as fallback.
    pub fn prop_str(&self, key: &str) -> String {
        match self.props.get(key) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => default_prop(&self.kind, key)
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            Some(other) => other.to_string(),
        }
    }
}

/// A parent → child containment edge. Matches ReactFlow's Edge structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    #[serde(default)]
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
}

impl Edge {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            id: make_edge_id(source, target),
            source: source.to_string(),
            target: target.to_string(),
        }
    }
}

// --- Defaults ---

/// Default props seeded into a freshly created node.
pub fn default_props(kind: &ComponentKind) -> Props {
    let pairs: &[(&str, &str)] = match kind {
        ComponentKind::Button => &[("label", "Click me"), ("color", "blue"), ("size", "md")],
        ComponentKind::Input => &[("placeholder", "Enter text..."), ("type", "text")],
        ComponentKind::Text => &[("content", "Text"), ("variant", "body"), ("fontSize", "16px")],
        ComponentKind::Card => &[("title", "Card Title"), ("padding", "16px")],
        ComponentKind::Other(_) => &[],
    };
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect()
}

/// Default value of a single prop, if the kind mandates it.
pub fn default_prop(kind: &ComponentKind, key: &str) -> Option<serde_json::Value> {
    default_props(kind).remove(key)
}

// --- Ids ---

/// Numeric suffix of a `node-N` id.
pub fn node_id_number(id: &str) -> Option<u64> {
    id.strip_prefix("node-").and_then(|s| s.parse::<u64>().ok())
}

/// Lowest counter value that cannot collide with any existing `node-N` id.
pub fn next_node_counter(nodes: &[Node]) -> u64 {
    nodes
        .iter()
        .filter_map(|n| node_id_number(&n.id))
        .max()
        .unwrap_or(0)
        .saturating_add(1)
}

/// Generate an edge ID from source and target node IDs.
pub fn make_edge_id(source: &str, target: &str) -> String {
    format!("edge-{}-{}", source, target)
}
