//! Shell session: owns the canvas, the conversation, and the code view.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Result};
use loom_core::graph::CanvasStore;
use loom_core::parse::extract_code_block;
use loom_core::{apply_operations, generate_react_code, parse_response, ApplyOutcome, ComponentKind, Position, Props};
use loom_suggest::{BuilderContext, ChatMessage, ChatRequest, ChatResponse};
use tracing::{debug, error, info};

pub const CHAT_ERROR_REPLY: &str =
    "Sorry, I encountered an error. Please make sure the server is running and try again.";

pub const HELP: &str = "\
Type a message to ask the assistant to change the canvas, or use a command:
  :add <Type> [x y]            add a Button, Input, Text or Card
  :set <id> key=value ...      update props (value `null` restores the default)
  :delete <id>                 remove a node and its connections
  :connect <parent> <child>    nest a node inside a Card
  :disconnect <parent> <child> remove a connection
  :move <id> <x> <y>           reposition a node
  :select [id]                 select a node, or clear the selection
  :apply <text>                apply assistant text locally, without the server
  :nodes                       list the canvas
  :code                        show the generated code
  :export [path]               write the code to a file
  :save <path>                 write the canvas as JSON
  :load <path>                 replace the canvas with a saved one
  :clear                       empty the canvas
  :help                        show this help
  :quit                        leave";

/// A parsed shell line.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Chat(String),
    Add { kind: ComponentKind, position: Option<Position> },
    Set { id: String, props: Props },
    Delete(String),
    Connect(String, String),
    Disconnect(String, String),
    Move { id: String, position: Position },
    Select(Option<String>),
    Apply(String),
    Nodes,
    Code,
    Export(Option<PathBuf>),
    Save(PathBuf),
    Load(PathBuf),
    Clear,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<ReplCommand> {
    let line = line.trim();
    let Some(command) = line.strip_prefix(':') else {
        return Ok(ReplCommand::Chat(line.to_string()));
    };

    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(n, r)| (n, r.trim()))
        .unwrap_or((command, ""));
    let args: Vec<&str> = rest.split_whitespace().collect();

    let id_pair = |usage: &str| -> Result<(String, String)> {
        match args.as_slice() {
            [a, b] => Ok((a.to_string(), b.to_string())),
            _ => bail!("usage: {}", usage),
        }
    };

    Ok(match name {
        "add" => {
            let kind = args
                .first()
                .and_then(|t| ComponentKind::parse_creatable(t))
                .ok_or_else(|| anyhow!("usage: :add <Button|Input|Text|Card> [x y]"))?;
            let position = match args.get(1..) {
                Some([x, y]) => Some(parse_position(x, y)?),
                Some([]) | None => None,
                _ => bail!("usage: :add <Button|Input|Text|Card> [x y]"),
            };
            ReplCommand::Add { kind, position }
        }
        "set" => {
            let Some((id, pairs)) = args.split_first() else {
                bail!("usage: :set <id> key=value ...");
            };
            if pairs.is_empty() {
                bail!("usage: :set <id> key=value ...");
            }
            let mut props = Props::new();
            for pair in pairs {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| anyhow!("expected key=value, got {:?}", pair))?;
                props.insert(key.to_string(), parse_value(value));
            }
            ReplCommand::Set { id: id.to_string(), props }
        }
        "delete" => match args.as_slice() {
            [id] => ReplCommand::Delete(id.to_string()),
            _ => bail!("usage: :delete <id>"),
        },
        "connect" => {
            let (parent, child) = id_pair(":connect <parent> <child>")?;
            ReplCommand::Connect(parent, child)
        }
        "disconnect" => {
            let (parent, child) = id_pair(":disconnect <parent> <child>")?;
            ReplCommand::Disconnect(parent, child)
        }
        "move" => match args.as_slice() {
            [id, x, y] => ReplCommand::Move {
                id: id.to_string(),
                position: parse_position(x, y)?,
            },
            _ => bail!("usage: :move <id> <x> <y>"),
        },
        "select" => ReplCommand::Select(args.first().map(|id| id.to_string())),
        "apply" if !rest.is_empty() => ReplCommand::Apply(rest.replace("\\n", "\n")),
        "apply" => bail!("usage: :apply <assistant text>"),
        "nodes" => ReplCommand::Nodes,
        "code" => ReplCommand::Code,
        "export" => ReplCommand::Export(args.first().map(PathBuf::from)),
        "save" => match args.as_slice() {
            [path] => ReplCommand::Save(PathBuf::from(path)),
            _ => bail!("usage: :save <path>"),
        },
        "load" => match args.as_slice() {
            [path] => ReplCommand::Load(PathBuf::from(path)),
            _ => bail!("usage: :load <path>"),
        },
        "clear" => ReplCommand::Clear,
        "help" | "h" | "?" => ReplCommand::Help,
        "quit" | "q" | "exit" => ReplCommand::Quit,
        other => bail!("unknown command :{} (try :help)", other),
    })
}

fn parse_position(x: &str, y: &str) -> Result<Position> {
    let x: f64 = x.parse().with_context(|| format!("invalid x coordinate {:?}", x))?;
    let y: f64 = y.parse().with_context(|| format!("invalid y coordinate {:?}", y))?;
    Ok(Position::new(x, y))
}

/// JSON literals (numbers, booleans, null, quoted strings) are taken as-is;
/// anything else is a plain string.
fn parse_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

pub struct Session {
    store: CanvasStore,
    generated: Arc<Mutex<String>>,
    code_override: Arc<Mutex<Option<String>>>,
    history: Vec<ChatMessage>,
    http: reqwest::Client,
    server: String,
    export_path: PathBuf,
}

impl Session {
    pub fn new(server: &str, export_path: PathBuf) -> Self {
        let mut session = Self {
            store: CanvasStore::new(),
            generated: Arc::new(Mutex::new(String::new())),
            code_override: Arc::new(Mutex::new(None)),
            history: Vec::new(),
            http: reqwest::Client::new(),
            server: server.trim_end_matches('/').to_string(),
            export_path,
        };
        session.adopt(CanvasStore::new());
        session
    }

    /// Make `store` the session's canvas, regenerating code on every change.
    fn adopt(&mut self, mut store: CanvasStore) {
        let canvas = store.snapshot();
        if let Ok(mut code) = self.generated.lock() {
            *code = generate_react_code(&canvas.nodes, &canvas.edges);
        }
        if let Ok(mut over) = self.code_override.lock() {
            *over = None;
        }

        let (code, over) = (Arc::clone(&self.generated), Arc::clone(&self.code_override));
        store.subscribe(move |canvas| {
            if let Ok(mut code) = code.lock() {
                *code = generate_react_code(&canvas.nodes, &canvas.edges);
            }
            if let Ok(mut over) = over.lock() {
                *over = None;
            }
        });
        self.store = store;
    }

    /// Code shown to the user: a code block from the last reply, if the canvas
    /// has not changed since, else the generated component.
    pub fn current_code(&self) -> String {
        if let Some(code) = self.code_override.lock().ok().and_then(|o| o.clone()) {
            return code;
        }
        self.generated.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Run one command. Returns false when the shell should exit.
    pub async fn execute(&mut self, command: ReplCommand) -> Result<bool> {
        match command {
            ReplCommand::Chat(text) if text.is_empty() => {}
            ReplCommand::Chat(text) => {
                let reply = self.chat(&text).await;
                println!("{}", reply);
            }
            ReplCommand::Apply(text) => println!("{}", self.apply_reply(&text)),
            ReplCommand::Add { kind, position } => {
                let position = position.unwrap_or_else(|| self.next_free_position());
                let id = self.store.add_node(kind.clone(), position);
                println!("added {} {}", kind, id);
            }
            ReplCommand::Set { id, props } => {
                if !self.store.snapshot().contains(&id) {
                    bail!("no node {}", id);
                }
                self.store.update_node_data(&id, &props);
                println!("updated {}", id);
            }
            ReplCommand::Delete(id) => {
                if !self.store.delete_node(&id) {
                    bail!("no node {}", id);
                }
                println!("deleted {}", id);
            }
            ReplCommand::Connect(parent, child) => match self.store.connect(&parent, &child) {
                Some(edge) => println!("connected {}", edge),
                None => bail!("cannot connect {} -> {} (unknown node, duplicate, or cycle)", parent, child),
            },
            ReplCommand::Disconnect(parent, child) => {
                if !self.store.disconnect(&parent, &child) {
                    bail!("{} is not connected to {}", parent, child);
                }
                println!("disconnected {} -> {}", parent, child);
            }
            ReplCommand::Move { id, position } => {
                if !self.store.snapshot().contains(&id) {
                    bail!("no node {}", id);
                }
                self.store.move_node(&id, position);
                println!("moved {} to ({}, {})", id, position.x, position.y);
            }
            ReplCommand::Select(id) => {
                if let Some(id) = &id {
                    if !self.store.snapshot().contains(id) {
                        bail!("no node {}", id);
                    }
                }
                self.store.select(id.as_deref());
                match id {
                    Some(id) => println!("selected {}", id),
                    None => println!("selection cleared"),
                }
            }
            ReplCommand::Nodes => println!("{}", self.describe_canvas()),
            ReplCommand::Code => println!("{}", self.current_code()),
            ReplCommand::Export(path) => {
                let path = path.unwrap_or_else(|| self.export_path.clone());
                self.export(&path).await?;
                println!("wrote {}", path.display());
            }
            ReplCommand::Save(path) => {
                self.save(&path).await?;
                println!("saved canvas to {}", path.display());
            }
            ReplCommand::Load(path) => {
                self.load(&path).await?;
                println!("loaded {} nodes from {}", self.store.node_count(), path.display());
            }
            ReplCommand::Clear => {
                self.store.clear();
                println!("canvas cleared");
            }
            ReplCommand::Help => println!("{}", HELP),
            ReplCommand::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Send the conversation upstream and apply the reply. Failures are
    /// answered with a fixed apology, which also enters the history.
    async fn chat(&mut self, text: &str) -> String {
        self.history.push(ChatMessage::user(text));

        match self.request_completion().await {
            Ok(response) => {
                debug!(
                    "{}: {} input / {} output tokens",
                    response.model, response.usage.input_tokens, response.usage.output_tokens
                );
                self.history.push(ChatMessage::assistant(response.content.clone()));
                self.apply_reply(&response.content)
            }
            Err(e) => {
                error!("chat error: {:#}", e);
                self.history.push(ChatMessage::assistant(CHAT_ERROR_REPLY));
                CHAT_ERROR_REPLY.to_string()
            }
        }
    }

    async fn request_completion(&self) -> Result<ChatResponse> {
        let request = ChatRequest {
            messages: Some(self.history.clone()),
            builder_context: Some(BuilderContext::from_canvas(&self.store.snapshot())),
            system_prompt: None,
        };

        let url = format!("{}/api/chat", self.server);
        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("POST {}", url))?
            .error_for_status()?;
        Ok(response.json::<ChatResponse>().await?)
    }

    /// Parse assistant text, apply its operations, and pick up any code block.
    /// Returns the text to display.
    pub fn apply_reply(&mut self, content: &str) -> String {
        let parsed = parse_response(content);
        let report = apply_operations(&mut self.store, &parsed.operations);
        if !parsed.operations.is_empty() {
            info!(
                "applied {} of {} operations",
                report.applied(),
                parsed.operations.len()
            );
        }

        if let Some(code) = extract_code_block(content) {
            if let Ok(mut over) = self.code_override.lock() {
                *over = Some(code);
            }
        }

        let mut out = parsed.message;
        for outcome in &report.outcomes {
            let line = match outcome {
                ApplyOutcome::Applied { message, .. } => format!("  ✓ {}", message),
                ApplyOutcome::Skipped { reason } => format!("  ✗ skipped: {}", reason),
            };
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&line);
        }
        out
    }

    async fn export(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, self.current_code())
            .await
            .with_context(|| format!("writing {}", path.display()))
    }

    async fn save(&self, path: &Path) -> Result<()> {
        let context = BuilderContext::from_canvas(&self.store.snapshot());
        let json = serde_json::to_string_pretty(&context)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("writing {}", path.display()))
    }

    /// Replace the canvas with a saved one. New ids continue past the loaded ones.
    async fn load(&mut self, path: &Path) -> Result<()> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let context: BuilderContext =
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        self.adopt(CanvasStore::from_canvas(context.into_canvas()));
        Ok(())
    }

    fn next_free_position(&self) -> Position {
        let canvas = self.store.snapshot();
        let y = canvas
            .nodes
            .iter()
            .map(|n| n.position.y)
            .fold(None, |max: Option<f64>, y| Some(max.map_or(y, |m| m.max(y))))
            .map_or(100.0, |max| max + 100.0);
        Position::new(200.0, y)
    }

    pub fn describe_canvas(&self) -> String {
        let canvas = self.store.snapshot();
        if canvas.is_empty() {
            return "(canvas is empty)".to_string();
        }
        let mut out = String::new();
        for node in &canvas.nodes {
            let marker = if canvas.selected.as_deref() == Some(node.id.as_str()) { "*" } else { " " };
            out.push_str(&format!(
                "{}{} {} ({}, {}) {}\n",
                marker,
                node.id,
                node.kind,
                node.position.x,
                node.position.y,
                serde_json::Value::Object(node.props.clone())
            ));
        }
        for edge in &canvas.edges {
            out.push_str(&format!("  {} -> {}\n", edge.source, edge.target));
        }
        out.trim_end().to_string()
    }

    pub fn revision(&self) -> u64 {
        self.store.revision()
    }
}
