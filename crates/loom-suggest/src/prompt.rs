use loom_core::rules::INSTRUCTION_FORMAT;
use loom_core::OperationRecord;
use once_cell::sync::Lazy;

use crate::BuilderContext;

/// Persona used when the client does not send its own system prompt.
pub const DEFAULT_PERSONA: &str = "You are an AI assistant that helps build React UIs visually.";

static OPERATION_SCHEMA: Lazy<String> = Lazy::new(|| {
    serde_json::to_string_pretty(&schemars::schema_for!(OperationRecord)).unwrap_or_default()
});

/// Convert the canvas snapshot to a compact text block for LLM consumption.
pub fn serialize_canvas(context: Option<&BuilderContext>) -> String {
    let mut out = String::from("Current canvas state:\n");

    let Some(context) = context.filter(|c| !c.nodes.is_empty()) else {
        out.push_str("- Canvas is empty\n");
        return out;
    };

    out.push_str(&format!("- {} components:\n", context.nodes.len()));
    for node in &context.nodes {
        out.push_str("  ");
        out.push_str(&node.id);
        out.push(' ');
        out.push_str(node.kind.as_str());
        out.push(' ');
        out.push_str(&serde_json::Value::Object(node.props.clone()).to_string());
        if let Some(p) = node.position {
            out.push_str(&format!(" at ({}, {})", p.x, p.y));
        }
        out.push('\n');
    }

    if !context.edges.is_empty() {
        out.push_str("- Connections (parent -> child):\n");
        for edge in &context.edges {
            out.push_str(&format!("  {} -> {}\n", edge.source, edge.target));
        }
    }
    out
}

/// Full system prompt: persona, canvas state, then the operation protocol.
pub fn system_prompt(base: Option<&str>, context: Option<&BuilderContext>) -> String {
    let persona = base.map(str::trim).filter(|b| !b.is_empty()).unwrap_or(DEFAULT_PERSONA);

    let mut out = String::with_capacity(persona.len() + INSTRUCTION_FORMAT.len() + OPERATION_SCHEMA.len() + 512);
    out.push_str(persona);
    out.push_str("\n\n");
    out.push_str(&serialize_canvas(context));
    out.push('\n');
    out.push_str(INSTRUCTION_FORMAT);
    if !OPERATION_SCHEMA.is_empty() {
        out.push_str("\n\nEach operation record follows this JSON schema:\n");
        out.push_str(&OPERATION_SCHEMA);
    }
    out.push_str("\n\nBe concise and helpful!");
    out
}
