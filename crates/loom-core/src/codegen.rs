//! React + Tailwind markup generation from a canvas graph.
//!
//! Pure and deterministic: the same nodes and edges always produce the same
//! text. Edges are parent → child; only Cards render their children inline.

use std::collections::{HashMap, HashSet};

use crate::{ComponentKind, Edge, Node};

/// Fixed filename of the exported artifact.
pub const EXPORT_FILENAME: &str = "GeneratedComponent.tsx";

const EMPTY_CANVAS: &str = "// Add components to the canvas to generate code\n";
const ROOT_INDENT: &str = "      ";

pub fn generate_react_code(nodes: &[Node], edges: &[Edge]) -> String {
    if nodes.is_empty() {
        return EMPTY_CANVAS.to_string();
    }

    let mut generator = Generator::new(nodes, edges);

    let has_parent: HashSet<&str> = edges.iter().map(|e| e.target.as_str()).collect();
    let mut blocks = Vec::new();
    for node in nodes.iter().filter(|n| !has_parent.contains(n.id.as_str())) {
        if let Some(block) = generator.emit(node, ROOT_INDENT) {
            blocks.push(block);
        }
    }
    // Cycle members and children of non-Card parents are not reachable from a
    // root through a Card; emit them in collection order so nothing is dropped.
    for node in nodes {
        if let Some(block) = generator.emit(node, ROOT_INDENT) {
            blocks.push(block);
        }
    }

    let mut code = String::from("import React from 'react';\n\n");
    code.push_str("export default function GeneratedComponent() {\n");
    code.push_str("  return (\n");
    code.push_str("    <div className=\"p-8 max-w-4xl mx-auto\">\n");
    code.push_str(&blocks.join("\n"));
    code.push_str("\n    </div>\n");
    code.push_str("  );\n");
    code.push_str("}\n");
    code
}

struct Generator<'a> {
    by_id: HashMap<&'a str, &'a Node>,
    children: HashMap<&'a str, Vec<&'a str>>,
    emitted: HashSet<&'a str>,
}

impl<'a> Generator<'a> {
    fn new(nodes: &'a [Node], edges: &'a [Edge]) -> Self {
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in edges {
            children
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
        }
        Self {
            by_id: nodes.iter().map(|n| (n.id.as_str(), n)).collect(),
            children,
            emitted: HashSet::new(),
        }
    }

    /// Markup for `node` and, for Cards, its children. None if already emitted.
    fn emit(&mut self, node: &'a Node, indent: &str) -> Option<String> {
        if !self.emitted.insert(node.id.as_str()) {
            return None;
        }

        let markup = match &node.kind {
            ComponentKind::Button => {
                let (px, py) = match node.prop_str("size").as_str() {
                    "sm" => ("3", "1"),
                    "lg" => ("6", "3"),
                    _ => ("4", "2"),
                };
                let color = escape_attr(&node.prop_str("color"));
                format!(
                    "{indent}<button className=\"px-{px} py-{py} bg-{color}-500 hover:bg-{color}-600 text-white rounded\">\n{indent}  {label}\n{indent}</button>",
                    label = escape_text(&node.prop_str("label")),
                )
            }
            ComponentKind::Input => {
                let input_type = stated_str(node, "type")
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "text".to_string());
                let placeholder = stated_str(node, "placeholder").unwrap_or_default();
                format!(
                    "{indent}<input\n{indent}  type=\"{}\"\n{indent}  placeholder=\"{}\"\n{indent}  className=\"px-3 py-2 border border-gray-300 rounded focus:outline-none focus:border-blue-500\"\n{indent}/>",
                    escape_attr(&input_type),
                    escape_attr(&placeholder),
                )
            }
            ComponentKind::Text => {
                let variant = node.prop_str("variant");
                let (tag, class) = match variant.as_str() {
                    "h1" => ("h1", "text-3xl font-bold"),
                    "h2" => ("h2", "text-2xl font-bold"),
                    "h3" => ("h3", "text-xl font-bold"),
                    "small" => ("p", "text-sm text-gray-600"),
                    _ => ("p", "text-base"),
                };
                format!(
                    "{indent}<{tag} className=\"{class}\">{}</{tag}>",
                    escape_text(&node.prop_str("content"))
                )
            }
            ComponentKind::Card => self.emit_card(node, indent),
            ComponentKind::Other(name) => {
                format!("{indent}<div>{{/* {} */}}</div>", name.replace("*/", "* /"))
            }
        };
        Some(markup)
    }

    fn emit_card(&mut self, node: &'a Node, indent: &str) -> String {
        let mut out = format!("{indent}<div className=\"border border-gray-300 rounded-lg p-4\">\n");
        out.push_str(&format!(
            "{indent}  <h3 className=\"font-bold text-lg mb-2\">{}</h3>\n",
            escape_text(&node.prop_str("title"))
        ));

        let child_indent = format!("{indent}  ");
        let child_ids = self.children.get(node.id.as_str()).cloned().unwrap_or_default();
        let mut rendered = 0;
        for child_id in child_ids {
            let Some(&child) = self.by_id.get(child_id) else {
                continue;
            };
            if let Some(block) = self.emit(child, &child_indent) {
                out.push_str(&block);
                out.push('\n');
                rendered += 1;
            }
        }
        if rendered == 0 {
            out.push_str(&format!("{indent}  <p className=\"text-gray-600\">Card content</p>\n"));
        }

        out.push_str(indent);
        out.push_str("</div>");
        out
    }
}

/// A prop the node actually carries, stringified; absent or null is None.
fn stated_str(node: &Node, key: &str) -> Option<String> {
    match node.props.get(key) {
        Some(serde_json::Value::Null) | None => None,
        Some(_) => Some(node.prop_str(key)),
    }
}

/// Escape a string for use as JSX element text.
fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '{' => out.push_str("&#123;"),
            '}' => out.push_str("&#125;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape a string for a double-quoted JSX attribute.
fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}
