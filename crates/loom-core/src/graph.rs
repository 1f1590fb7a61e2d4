//! The canvas store: nodes, edges and the selection pointer.
//!
//! Every effective mutation replaces the current [`Canvas`] snapshot with a new
//! one and notifies subscribers, so consumers can detect change by pointer
//! identity or by [`CanvasStore::revision`]. Mutations that reference a missing
//! id are silent no-ops: ids arrive from free-text parsing and may be stale.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{default_prop, default_props, next_node_counter, ComponentKind, Edge, Node, NodeId, Position, Props};

/// An immutable view of the canvas at one revision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Canvas {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<NodeId>,
}

impl Canvas {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop edges whose endpoints are not both present.
    pub fn prune_dangling_edges(&mut self) {
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        self.edges
            .retain(|e| ids.contains(e.source.as_str()) && ids.contains(e.target.as_str()));
    }

    /// True if `to` is reachable from `from` by following edges.
    fn reaches(&self, from: &str, to: &str) -> bool {
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            children.entry(edge.source.as_str()).or_default().push(edge.target.as_str());
        }
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(next) = children.get(current) {
                stack.extend(next.iter().copied());
            }
        }
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&Arc<Canvas>) + Send>;

/// Owner of the live canvas. Pass it by reference to whatever needs to mutate it.
pub struct CanvasStore {
    current: Arc<Canvas>,
    next_id: u64,
    revision: u64,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl Default for CanvasStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CanvasStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanvasStore")
            .field("current", &self.current)
            .field("next_id", &self.next_id)
            .field("revision", &self.revision)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl CanvasStore {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Canvas::default()),
            next_id: 1,
            revision: 0,
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Adopt an existing canvas. Dangling edges and stale selection are dropped,
    /// and the id counter starts past every `node-N` id already in use.
    pub fn from_canvas(mut canvas: Canvas) -> Self {
        canvas.prune_dangling_edges();
        if let Some(sel) = &canvas.selected {
            if !canvas.contains(sel) {
                canvas.selected = None;
            }
        }
        let next_id = next_node_counter(&canvas.nodes);
        Self {
            current: Arc::new(canvas),
            next_id,
            ..Self::new()
        }
    }

    pub fn snapshot(&self) -> Arc<Canvas> {
        Arc::clone(&self.current)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn node_count(&self) -> usize {
        self.current.nodes.len()
    }

    pub fn selected(&self) -> Option<&str> {
        self.current.selected.as_deref()
    }

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&Arc<Canvas>) + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sid, _)| *sid != id);
        self.observers.len() != before
    }

    fn commit(&mut self, next: Canvas) {
        self.current = Arc::new(next);
        self.revision += 1;
        let snapshot = Arc::clone(&self.current);
        for (_, observer) in &mut self.observers {
            observer(&snapshot);
        }
    }

    /// Create a node with the kind's default props and return its fresh id.
    pub fn add_node(&mut self, kind: ComponentKind, position: Position) -> NodeId {
        let id = format!("node-{}", self.next_id);
        self.next_id = self.next_id.saturating_add(1);

        let mut next = (*self.current).clone();
        next.nodes.push(Node {
            id: id.clone(),
            props: default_props(&kind),
            kind,
            position,
        });
        debug!("added {}", id);
        self.commit(next);
        id
    }

    /// Shallow-merge `partial` into the node's props. A `null` value restores
    /// the kind's default for that key, or removes the key if none exists.
    pub fn update_node_data(&mut self, id: &str, partial: &Props) -> bool {
        let Some(index) = self.current.nodes.iter().position(|n| n.id == id) else {
            return false;
        };

        let mut next = (*self.current).clone();
        let node = &mut next.nodes[index];
        for (key, value) in partial {
            if value.is_null() {
                match default_prop(&node.kind, key) {
                    Some(default) => {
                        node.props.insert(key.clone(), default);
                    }
                    None => {
                        node.props.remove(key);
                    }
                }
            } else {
                node.props.insert(key.clone(), value.clone());
            }
        }

        if next.nodes[index] == self.current.nodes[index] {
            return false;
        }
        self.commit(next);
        true
    }

    pub fn move_node(&mut self, id: &str, position: Position) -> bool {
        let Some(index) = self.current.nodes.iter().position(|n| n.id == id) else {
            return false;
        };
        if self.current.nodes[index].position == position {
            return false;
        }
        let mut next = (*self.current).clone();
        next.nodes[index].position = position;
        self.commit(next);
        true
    }

    /// Remove the node, every edge touching it, and the selection if it pointed here.
    pub fn delete_node(&mut self, id: &str) -> bool {
        if !self.current.contains(id) {
            return false;
        }
        let mut next = (*self.current).clone();
        next.nodes.retain(|n| n.id != id);
        next.edges.retain(|e| e.source != id && e.target != id);
        if next.selected.as_deref() == Some(id) {
            next.selected = None;
        }
        debug!("deleted {}", id);
        self.commit(next);
        true
    }

    /// Point the selection at `id`, or clear it with `None`. Unknown ids are ignored.
    pub fn select(&mut self, id: Option<&str>) -> bool {
        if let Some(id) = id {
            if !self.current.contains(id) {
                return false;
            }
        }
        if self.current.selected.as_deref() == id {
            return false;
        }
        let mut next = (*self.current).clone();
        next.selected = id.map(str::to_string);
        self.commit(next);
        true
    }

    /// Add a parent → child edge. Returns the edge id, or None when either end
    /// is missing, the edge is a self-loop or a duplicate, or it would close a cycle.
    pub fn connect(&mut self, source: &str, target: &str) -> Option<String> {
        if source == target || !self.current.contains(source) || !self.current.contains(target) {
            return None;
        }
        if self
            .current
            .edges
            .iter()
            .any(|e| e.source == source && e.target == target)
        {
            return None;
        }
        if self.current.reaches(target, source) {
            debug!("refusing {} -> {}: would create a cycle", source, target);
            return None;
        }

        let edge = Edge::new(source, target);
        let edge_id = edge.id.clone();
        let mut next = (*self.current).clone();
        next.edges.push(edge);
        self.commit(next);
        Some(edge_id)
    }

    pub fn disconnect(&mut self, source: &str, target: &str) -> bool {
        if !self
            .current
            .edges
            .iter()
            .any(|e| e.source == source && e.target == target)
        {
            return false;
        }
        let mut next = (*self.current).clone();
        next.edges.retain(|e| !(e.source == source && e.target == target));
        self.commit(next);
        true
    }

    /// Empty the canvas. The id counter keeps running so ids are never reissued.
    pub fn clear(&mut self) {
        if self.current.nodes.is_empty() && self.current.edges.is_empty() && self.current.selected.is_none() {
            return;
        }
        self.commit(Canvas::default());
    }
}
