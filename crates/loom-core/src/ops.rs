//! Canvas operations and their validation at the parse boundary.
//!
//! Assistant output is untrusted, so records are first read into the loose
//! [`OperationRecord`] (every field optional, unknown fields ignored) and only
//! then promoted to the tagged [`Operation`]. A record that fails promotion is
//! dropped on its own; the rest of the batch is unaffected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ComponentKind, NodeId, Position, Props};

/// A single validated canvas mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Operation {
    #[serde(rename_all = "camelCase")]
    Add {
        node_type: ComponentKind,
        props: Props,
        position: Position,
    },
    #[serde(rename_all = "camelCase")]
    Update { node_id: NodeId, props: Props },
    #[serde(rename_all = "camelCase")]
    Delete { node_id: NodeId },
    #[serde(rename_all = "camelCase")]
    Connect { source_id: NodeId, target_id: NodeId },
}

impl Operation {
    pub fn action(&self) -> &'static str {
        match self {
            Operation::Add { .. } => "add",
            Operation::Update { .. } => "update",
            Operation::Delete { .. } => "delete",
            Operation::Connect { .. } => "connect",
        }
    }
}

/// The operation record as the assistant is asked to write it.
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecord {
    /// One of "add", "update", "delete", "connect"
    #[serde(default)]
    pub action: Option<String>,
    /// Component type for "add": Button, Input, Text or Card
    #[serde(default)]
    pub node_type: Option<String>,
    /// Target node for "update" and "delete"
    #[serde(default)]
    pub node_id: Option<String>,
    /// Props to set; merged into the node's existing props
    #[serde(default)]
    #[schemars(with = "Option<std::collections::BTreeMap<String, serde_json::Value>>")]
    pub props: Option<serde_json::Value>,
    /// Canvas position for "add", e.g. {"x": 200, "y": 100}
    #[serde(default)]
    #[schemars(with = "Option<Position>")]
    pub position: Option<serde_json::Value>,
    /// Parent node for "connect"
    #[serde(default)]
    pub source_id: Option<String>,
    /// Child node for "connect"
    #[serde(default)]
    pub target_id: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    #[error("record is not an object: {0}")]
    NotAnObject(String),

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("malformed position: {0}")]
    InvalidPosition(String),

    #[error("props must be an object, got: {0}")]
    InvalidProps(String),
}

impl OperationRecord {
    /// Read one array element. Anything that is not an object is rejected.
    pub fn from_value(value: serde_json::Value) -> Result<Self, OperationError> {
        if !value.is_object() {
            return Err(OperationError::NotAnObject(value.to_string()));
        }
        serde_json::from_value(value).map_err(|e| OperationError::Malformed(e.to_string()))
    }
}

impl TryFrom<OperationRecord> for Operation {
    type Error = OperationError;

    fn try_from(record: OperationRecord) -> Result<Self, Self::Error> {
        let action = record
            .action
            .as_deref()
            .map(|a| a.trim().to_ascii_lowercase())
            .ok_or(OperationError::MissingField("action"))?;

        match action.as_str() {
            "add" => {
                let raw_type = non_empty(record.node_type).ok_or(OperationError::MissingField("nodeType"))?;
                let node_type = ComponentKind::parse_creatable(&raw_type)
                    .ok_or(OperationError::UnknownNodeType(raw_type))?;
                let position = record
                    .position
                    .ok_or(OperationError::MissingField("position"))
                    .and_then(|p| coerce_position(&p))?;
                let props = match record.props {
                    Some(p) => coerce_props(p)?,
                    None => Props::new(),
                };
                Ok(Operation::Add { node_type, props, position })
            }
            "update" => {
                let node_id = non_empty(record.node_id).ok_or(OperationError::MissingField("nodeId"))?;
                let props = record
                    .props
                    .ok_or(OperationError::MissingField("props"))
                    .and_then(coerce_props)?;
                Ok(Operation::Update { node_id, props })
            }
            "delete" => {
                let node_id = non_empty(record.node_id).ok_or(OperationError::MissingField("nodeId"))?;
                Ok(Operation::Delete { node_id })
            }
            "connect" => {
                let source_id = non_empty(record.source_id).ok_or(OperationError::MissingField("sourceId"))?;
                let target_id = non_empty(record.target_id).ok_or(OperationError::MissingField("targetId"))?;
                Ok(Operation::Connect { source_id, target_id })
            }
            _ => Err(OperationError::UnknownAction(action)),
        }
    }
}

impl TryFrom<serde_json::Value> for Operation {
    type Error = OperationError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        OperationRecord::from_value(value)?.try_into()
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn coerce_number(value: Option<&serde_json::Value>) -> Option<f64> {
    match value? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn coerce_position(value: &serde_json::Value) -> Result<Position, OperationError> {
    let x = coerce_number(value.get("x"));
    let y = coerce_number(value.get("y"));
    match (x, y) {
        (Some(x), Some(y)) => Ok(Position { x, y }),
        _ => Err(OperationError::InvalidPosition(value.to_string())),
    }
}

fn coerce_props(value: serde_json::Value) -> Result<Props, OperationError> {
    match value {
        serde_json::Value::Object(map) => Ok(map),
        serde_json::Value::Null => Ok(Props::new()),
        other => Err(OperationError::InvalidProps(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn add_record_is_promoted() {
        let op = Operation::try_from(json!({
            "action": "ADD",
            "nodeType": "button",
            "props": {"label": "Go"},
            "position": {"x": 1, "y": "2"},
            "comment": "ignored"
        }))
        .unwrap();

        let Operation::Add { node_type, props, position } = op else {
            panic!("expected add");
        };
        assert_eq!(node_type, ComponentKind::Button);
        assert_eq!(props.get("label"), Some(&json!("Go")));
        assert_eq!(position, Position::new(1.0, 2.0));
    }

    #[test]
    fn missing_fields_are_reported() {
        assert_eq!(
            Operation::try_from(json!({"action": "add", "nodeType": "Card"})),
            Err(OperationError::MissingField("position"))
        );
        assert_eq!(
            Operation::try_from(json!({"action": "update", "nodeId": "node-1"})),
            Err(OperationError::MissingField("props"))
        );
        assert_eq!(
            Operation::try_from(json!({"action": "delete", "nodeId": "  "})),
            Err(OperationError::MissingField("nodeId"))
        );
        assert_eq!(
            Operation::try_from(json!({"nodeId": "node-1"})),
            Err(OperationError::MissingField("action"))
        );
    }

    #[test]
    fn unknown_values_are_rejected() {
        assert_eq!(
            Operation::try_from(json!({"action": "add", "nodeType": "Slider", "position": {"x": 0, "y": 0}})),
            Err(OperationError::UnknownNodeType("Slider".to_string()))
        );
        assert_eq!(
            Operation::try_from(json!({"action": "rename"})),
            Err(OperationError::UnknownAction("rename".to_string()))
        );
        assert!(matches!(
            Operation::try_from(json!("add a button")),
            Err(OperationError::NotAnObject(_))
        ));
        assert!(matches!(
            Operation::try_from(json!({"action": "add", "nodeType": "Card", "position": {"x": "left", "y": 0}})),
            Err(OperationError::InvalidPosition(_))
        ));
    }

    #[test]
    fn serializes_in_wire_shape() {
        let op = Operation::Connect {
            source_id: "node-1".to_string(),
            target_id: "node-2".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"action": "connect", "sourceId": "node-1", "targetId": "node-2"})
        );
    }
}
