//! Applies validated operations to a [`CanvasStore`], in order.
//!
//! Operations that reference nodes which do not exist are skipped, never
//! fatal. Later operations see the effects of earlier ones in the same batch.

use tracing::{debug, warn};

use crate::graph::CanvasStore;
use crate::ops::Operation;
use crate::NodeId;

/// Outcome of applying a single operation
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied { message: String, node_id: Option<NodeId> },
    Skipped { reason: String },
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub outcomes: Vec<ApplyOutcome>,
    /// Ids of nodes created by `add` operations, in creation order.
    pub created: Vec<NodeId>,
}

impl ApplyReport {
    pub fn applied(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_applied()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.applied()
    }
}

pub fn apply_operations(store: &mut CanvasStore, operations: &[Operation]) -> ApplyReport {
    let mut report = ApplyReport::default();
    for operation in operations {
        let outcome = apply_operation(store, operation);
        match (&outcome, operation) {
            (ApplyOutcome::Skipped { reason }, _) => {
                warn!("skipped {} operation: {}", operation.action(), reason);
            }
            (ApplyOutcome::Applied { node_id: Some(id), .. }, Operation::Add { .. }) => {
                report.created.push(id.clone());
            }
            _ => {}
        }
        report.outcomes.push(outcome);
    }
    debug!(
        "applied {} of {} operations",
        report.applied(),
        report.outcomes.len()
    );
    report
}

fn apply_operation(store: &mut CanvasStore, operation: &Operation) -> ApplyOutcome {
    match operation {
        Operation::Add { node_type, props, position } => {
            let id = store.add_node(node_type.clone(), *position);
            if !props.is_empty() {
                store.update_node_data(&id, props);
            }
            ApplyOutcome::Applied {
                message: format!("Added {} {}", node_type, id),
                node_id: Some(id),
            }
        }
        Operation::Update { node_id, props } => {
            if !store.snapshot().contains(node_id) {
                return ApplyOutcome::Skipped {
                    reason: format!("node {} not found", node_id),
                };
            }
            let changed = store.update_node_data(node_id, props);
            ApplyOutcome::Applied {
                message: if changed {
                    format!("Updated {}", node_id)
                } else {
                    format!("{} already up to date", node_id)
                },
                node_id: Some(node_id.clone()),
            }
        }
        Operation::Delete { node_id } => {
            if store.delete_node(node_id) {
                ApplyOutcome::Applied {
                    message: format!("Deleted {}", node_id),
                    node_id: Some(node_id.clone()),
                }
            } else {
                ApplyOutcome::Skipped {
                    reason: format!("node {} not found", node_id),
                }
            }
        }
        Operation::Connect { source_id, target_id } => match store.connect(source_id, target_id) {
            Some(edge_id) => ApplyOutcome::Applied {
                message: format!("Connected {} -> {} ({})", source_id, target_id, edge_id),
                node_id: None,
            },
            None => ApplyOutcome::Skipped {
                reason: connect_skip_reason(store, source_id, target_id),
            },
        },
    }
}

fn connect_skip_reason(store: &CanvasStore, source: &str, target: &str) -> String {
    let canvas = store.snapshot();
    if !canvas.contains(source) {
        format!("node {} not found", source)
    } else if !canvas.contains(target) {
        format!("node {} not found", target)
    } else if source == target {
        format!("cannot connect {} to itself", source)
    } else if canvas.edges.iter().any(|e| e.source == source && e.target == target) {
        format!("{} is already connected to {}", source, target)
    } else {
        format!("connecting {} -> {} would create a cycle", source, target)
    }
}
