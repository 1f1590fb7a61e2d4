//! Instruction parser: assistant text → canvas operations.
//!
//! A fenced ```json block holding an array of operation records is
//! authoritative. Without one (or when it does not parse) the text is read as
//! free-form instructions, line by line, with deliberately permissive keyword
//! matching. Neither path ever fails the whole message.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::{ComponentKind, Operation, Position, Props};

/// Column and vertical stacking used for components inferred from prose.
pub const STACK_X: f64 = 200.0;
pub const STACK_START_Y: f64 = 100.0;
pub const STACK_STEP_Y: f64 = 100.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    /// Text to show the user; the structured block is removed from it.
    pub message: String,
    pub operations: Vec<Operation>,
}

static RE_STRUCTURED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```json\s*(\[.*?\])\s*```").expect("Invalid regex pattern for structured block")
});

static RE_CODE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:jsx|tsx|typescript|javascript)\r?\n(.*?)```")
        .expect("Invalid regex pattern for code block")
});

static RE_VERB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:add|adds|adding|create|creates|creating)\b").expect("Invalid regex pattern for verbs")
});

static RE_QUOTED_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""[^"]*"|“[^”]*”"#).expect("Invalid regex pattern for quoted spans"));

/// Keyword patterns in claim order: earlier kinds win overlapping matches, so
/// "text field" is an Input and never also a Text.
static KEYWORDS: Lazy<Vec<(ComponentKind, Regex)>> = Lazy::new(|| {
    [
        (ComponentKind::Input, r"\b(?:text[ -]?fields?|text[ -]?box(?:es)?|text[ -]?inputs?|inputs?|fields?)\b"),
        (ComponentKind::Button, r"\bbuttons?\b"),
        (ComponentKind::Card, r"\bcards?\b"),
        (ComponentKind::Text, r"\b(?:headings?|titles?|labels?|text|paragraphs?)\b"),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("Invalid regex pattern for keyword")))
    .collect()
});

/// Parse one assistant message into a display message and ordered operations.
pub fn parse_response(content: &str) -> ParsedResponse {
    if let Some(parsed) = parse_structured_block(content) {
        return parsed;
    }

    let operations = parse_natural_language(content);
    if !operations.is_empty() {
        debug!("inferred {} operations from prose", operations.len());
    }
    ParsedResponse {
        message: content.to_string(),
        operations,
    }
}

/// First fenced jsx/tsx/typescript/javascript block, for replies that answer
/// with code instead of canvas operations.
pub fn extract_code_block(content: &str) -> Option<String> {
    RE_CODE_BLOCK
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|code| !code.is_empty())
}

fn parse_structured_block(content: &str) -> Option<ParsedResponse> {
    let captures = RE_STRUCTURED_BLOCK.captures(content)?;
    let block = captures.get(0)?;
    let array = captures.get(1)?.as_str();

    let records: Vec<serde_json::Value> = match serde_json::from_str(array) {
        Ok(records) => records,
        Err(e) => {
            debug!("structured block is not a JSON array, falling back to prose: {}", e);
            return None;
        }
    };

    let total = records.len();
    let operations: Vec<Operation> = records
        .into_iter()
        .enumerate()
        .filter_map(|(i, record)| match Operation::try_from(record) {
            Ok(op) => Some(op),
            Err(e) => {
                debug!("dropping operation #{}: {}", i, e);
                None
            }
        })
        .collect();
    debug!("structured block: kept {} of {} operations", operations.len(), total);

    let mut message = String::with_capacity(content.len());
    message.push_str(&content[..block.start()]);
    message.push_str(&content[block.end()..]);

    Some(ParsedResponse {
        message: message.trim().to_string(),
        operations,
    })
}

// --- Prose ---

#[derive(Debug)]
struct Mention {
    kind: ComponentKind,
    /// Byte range of the keyword itself.
    start: usize,
    end: usize,
}

fn parse_natural_language(content: &str) -> Vec<Operation> {
    let mut operations = Vec::new();
    let mut y = STACK_START_Y;

    for line in content.lines() {
        // ASCII lowering keeps byte offsets aligned with `line`, so extracted
        // labels can be sliced from the original casing.
        let lower = line.to_ascii_lowercase();
        if !RE_VERB.is_match(&lower) {
            continue;
        }

        let mentions = find_mentions(&lower);
        for (i, mention) in mentions.iter().enumerate() {
            let start = clause_start(&lower, mentions[..i].last().map_or(0, |m| m.end), mention.start);
            let end = clause_end(&lower, mention.end, mentions.get(i + 1).map_or(lower.len(), |m| m.start));

            let clause = Clause {
                line,
                lower: &lower,
                start,
                keyword_start: mention.start,
                keyword_end: mention.end,
                end,
            };
            let props = build_props(&mention.kind, &clause);
            operations.push(Operation::Add {
                node_type: mention.kind.clone(),
                props,
                position: Position::new(STACK_X, y),
            });
            y += STACK_STEP_Y;
        }
    }

    operations
}

fn find_mentions(lower: &str) -> Vec<Mention> {
    let quoted: Vec<(usize, usize)> = RE_QUOTED_SPAN
        .find_iter(lower)
        .map(|m| (m.start(), m.end()))
        .collect();
    let overlaps = |spans: &[(usize, usize)], s: usize, e: usize| spans.iter().any(|&(a, b)| s < b && a < e);

    let mut claimed: Vec<(usize, usize)> = Vec::new();
    let mut mentions = Vec::new();
    for (kind, re) in KEYWORDS.iter() {
        for m in re.find_iter(lower) {
            let (s, e) = (m.start(), m.end());
            if overlaps(&quoted, s, e) || overlaps(&claimed, s, e) {
                continue;
            }
            // "a button with (the) text Go": the word describes the button, it is not a Text
            if *kind == ComponentKind::Text && describes_another(lower, s) {
                continue;
            }
            claimed.push((s, e));
            mentions.push(Mention { kind: kind.clone(), start: s, end: e });
        }
    }
    mentions.sort_by_key(|m| m.start);
    mentions
}

/// Whether the keyword at `pos` follows "with" or "its", allowing one article between.
fn describes_another(lower: &str, pos: usize) -> bool {
    let mut words = lower[..pos].split_whitespace().rev();
    let mut previous = words.next();
    if matches!(previous, Some("the" | "a" | "some")) {
        previous = words.next();
    }
    matches!(previous, Some("with" | "its"))
}

const CLAUSE_BREAKS: [&str; 5] = [" and ", ",", ";", ". ", " then "];

/// Start of the clause owning a keyword: after the previous keyword, and after
/// the last clause break between the two.
fn clause_start(lower: &str, floor: usize, keyword_start: usize) -> usize {
    let window = &lower[floor..keyword_start];
    CLAUSE_BREAKS
        .iter()
        .filter_map(|b| window.rfind(b).map(|i| floor + i + b.len()))
        .max()
        .unwrap_or(floor)
}

/// End of the clause owning a keyword: before the next keyword, and before the
/// first clause break between the two.
fn clause_end(lower: &str, keyword_end: usize, ceiling: usize) -> usize {
    let window = &lower[keyword_end..ceiling];
    CLAUSE_BREAKS
        .iter()
        .filter_map(|b| window.find(b).map(|i| keyword_end + i))
        .min()
        .unwrap_or(ceiling)
}

/// The stretch of one line that describes a single component.
struct Clause<'a> {
    line: &'a str,
    lower: &'a str,
    start: usize,
    keyword_start: usize,
    keyword_end: usize,
    end: usize,
}

impl Clause<'_> {
    fn lower(&self) -> &str {
        &self.lower[self.start..self.end]
    }

    fn keyword(&self) -> &str {
        &self.lower[self.keyword_start..self.keyword_end]
    }

    fn has_word(&self, word: &str) -> bool {
        find_word(self.lower(), word).is_some()
    }

    fn has_any(&self, words: &[&str]) -> bool {
        words.iter().any(|w| self.has_word(w))
    }

    /// Label text for the component: a quoted string, then text after a cue
    /// word, then whatever trails the keyword.
    fn label(&self, cues: &[&str]) -> Option<String> {
        self.quoted(self.keyword_end, self.end)
            .or_else(|| self.quoted(self.start, self.keyword_start))
            .or_else(|| self.after_cue(cues))
            .or_else(|| self.trailing())
    }

    fn quoted(&self, from: usize, to: usize) -> Option<String> {
        let window = &self.line[from..to];
        for (open, close) in [('"', '"'), ('“', '”'), ('\'', '\'')] {
            let mut search = 0;
            while let Some(rel) = window[search..].find(open) {
                let start = search + rel;
                // an apostrophe inside a word does not open a quote
                let opens = open != '\'' || window[..start].chars().next_back().map_or(true, char::is_whitespace);
                let body = start + open.len_utf8();
                if opens {
                    if let Some(len) = window[body..].find(close) {
                        let text = window[body..body + len].trim();
                        if !text.is_empty() {
                            return Some(text.to_string());
                        }
                    }
                }
                search = body;
            }
        }
        None
    }

    fn after_cue(&self, cues: &[&str]) -> Option<String> {
        let post = &self.lower[self.keyword_end..self.end];
        let (pos, cue) = cues
            .iter()
            .filter_map(|cue| find_word(post, cue).map(|pos| (pos, *cue)))
            .min_by_key(|(pos, cue)| (*pos, usize::MAX - cue.len()))?;
        self.value_at(self.keyword_end + pos + cue.len())
    }

    fn trailing(&self) -> Option<String> {
        let post = &self.lower[self.keyword_end..self.end];
        let mut offset = post.len() - post.trim_start().len();
        let mut first = post.split_whitespace().next()?;
        // "heading 2 Welcome": the level marker is not part of the text
        if matches!(first, "1" | "2" | "3" | "h1" | "h2" | "h3") {
            let skip = post[offset..].find(first).unwrap_or(0) + first.len();
            offset += skip;
            let rest = &post[offset..];
            offset += rest.len() - rest.trim_start().len();
            first = rest.split_whitespace().next()?;
        }
        if STOP_WORDS.contains(&first) {
            return None;
        }
        self.value_at(self.keyword_end + offset)
    }

    /// Read a label starting at `pos`, up to the first boundary phrase.
    fn value_at(&self, pos: usize) -> Option<String> {
        let rest_lower = &self.lower[pos..self.end];
        let lead = rest_lower.len() - rest_lower.trim_start().len();
        let start = pos + lead;
        if start >= self.end {
            return None;
        }
        if let Some(text) = self.quoted(start, self.end) {
            if self.line[start..].starts_with(['"', '\'', '“']) {
                return Some(text);
            }
        }
        let window = &self.lower[start..self.end];
        let stop = VALUE_BOUNDARIES
            .iter()
            .filter_map(|b| window.find(b))
            .min()
            .unwrap_or(window.len());
        let text = self.line[start..start + stop]
            .trim()
            .trim_matches(|c: char| matches!(c, '"' | '\'' | '“' | '”' | '.' | '!' | '?' | ':'))
            .trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

const STOP_WORDS: [&str; 20] = [
    "and", "a", "an", "the", "to", "in", "on", "at", "with", "that", "which", "below", "above", "under",
    "into", "inside", "then", "please", "here", "there",
];

const VALUE_BOUNDARIES: [&str; 12] = [
    " and ", ",", ";", ". ", "!", "?", " then ", " with ", " that ", " below", " above", " inside",
];

const BUTTON_CUES: [&str; 10] = [
    "that says", "saying", "labelled", "labeled", "with label", "with the text", "with text", "called", "named",
    "reading",
];
const INPUT_CUES: [&str; 7] = ["placeholder", "labelled", "labeled", "for", "called", "named", "saying"];
const TEXT_CUES: [&str; 10] = [
    "that says", "saying", "titled", "reading", "with content", "with text", "labelled", "labeled", "called",
    "named",
];
const CARD_CUES: [&str; 7] = ["with the title", "with title", "titled", "called", "named", "labelled", "labeled"];

fn build_props(kind: &ComponentKind, clause: &Clause<'_>) -> Props {
    let mut props = Props::new();
    let mut set = |key: &str, value: String| {
        props.insert(key.to_string(), serde_json::Value::String(value));
    };

    match kind {
        ComponentKind::Button => {
            set("label", clause.label(&BUTTON_CUES).unwrap_or_else(|| "Button".to_string()));
            let color = ["green", "red", "gray", "grey", "blue"]
                .into_iter()
                .find(|c| clause.has_word(c))
                .map(|c| if c == "grey" { "gray" } else { c })
                .unwrap_or("blue");
            set("color", color.to_string());
            let size = if clause.has_any(&["small", "tiny"]) {
                "sm"
            } else if clause.has_any(&["large", "big"]) {
                "lg"
            } else {
                "md"
            };
            set("size", size.to_string());
        }
        ComponentKind::Input => {
            set("placeholder", clause.label(&INPUT_CUES).unwrap_or_else(|| "Enter text...".to_string()));
            let input_type = if clause.lower().contains("password") {
                "password"
            } else if clause.lower().contains("email") || clause.lower().contains("e-mail") {
                "email"
            } else if clause.has_any(&["number", "numeric"]) {
                "number"
            } else {
                "text"
            };
            set("type", input_type.to_string());
        }
        ComponentKind::Text => {
            set("content", clause.label(&TEXT_CUES).unwrap_or_else(|| "Text".to_string()));
            set("variant", text_variant(clause).to_string());
        }
        ComponentKind::Card => {
            set("title", clause.label(&CARD_CUES).unwrap_or_else(|| "Card".to_string()));
            set("padding", "16px".to_string());
        }
        ComponentKind::Other(_) => {}
    }
    props
}

fn text_variant(clause: &Clause<'_>) -> &'static str {
    let lower = clause.lower();
    if clause.has_word("h1") || lower.contains("heading 1") {
        "h1"
    } else if clause.has_word("h2") || lower.contains("heading 2") {
        "h2"
    } else if clause.has_word("h3") || lower.contains("heading 3") {
        "h3"
    } else if clause.has_word("small") {
        "small"
    } else if clause.keyword().starts_with("title") {
        "h1"
    } else if clause.keyword().starts_with("heading") {
        "h2"
    } else {
        "body"
    }
}

/// Byte offset of `needle` in `hay` where it is not glued to other word characters.
fn find_word(hay: &str, needle: &str) -> Option<usize> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    hay.match_indices(needle).map(|(i, _)| i).find(|&i| {
        let before = hay[..i].chars().next_back().map_or(true, |c| !is_word(c));
        let after = hay[i + needle.len()..].chars().next().map_or(true, |c| !is_word(c));
        before && after
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn adds(parsed: &ParsedResponse) -> Vec<(ComponentKind, Props, Position)> {
        parsed
            .operations
            .iter()
            .map(|op| match op {
                Operation::Add { node_type, props, position } => (node_type.clone(), props.clone(), *position),
                other => panic!("expected add, got {other:?}"),
            })
            .collect()
    }

    #[test]
    fn structured_block_is_authoritative() {
        let input = "Add it\n```json\n[{\"action\":\"add\",\"nodeType\":\"Button\",\"props\":{\"label\":\"Go\",\"color\":\"green\"},\"position\":{\"x\":1,\"y\":2}}]\n```";
        let parsed = parse_response(input);

        assert_eq!(parsed.message, "Add it");
        let ops = adds(&parsed);
        assert_eq!(ops.len(), 1);
        let (kind, props, position) = &ops[0];
        assert_eq!(*kind, ComponentKind::Button);
        assert_eq!(props.get("label"), Some(&json!("Go")));
        assert_eq!(props.get("color"), Some(&json!("green")));
        assert_eq!(*position, Position::new(1.0, 2.0));
    }

    #[test]
    fn invalid_records_are_dropped_individually() {
        let input = "Done.\n```JSON\n[\n  {\"action\": \"delete\", \"nodeId\": \"node-1\"},\n  {\"action\": \"add\", \"nodeType\": \"Slider\", \"position\": {\"x\": 0, \"y\": 0}},\n  {\"action\": \"update\"},\n  42,\n  {\"action\": \"connect\", \"sourceId\": \"node-2\", \"targetId\": \"node-3\"}\n]\n```\nAnything else?";
        let parsed = parse_response(input);

        assert_eq!(
            parsed.operations,
            vec![
                Operation::Delete { node_id: "node-1".to_string() },
                Operation::Connect {
                    source_id: "node-2".to_string(),
                    target_id: "node-3".to_string()
                },
            ]
        );
        assert_eq!(parsed.message, "Done.\n\nAnything else?");
    }

    #[test]
    fn empty_block_suppresses_prose_fallback() {
        let parsed = parse_response("I could add a button, but nothing changes.\n```json\n[]\n```");
        assert!(parsed.operations.is_empty());
        assert_eq!(parsed.message, "I could add a button, but nothing changes.");
    }

    #[test]
    fn malformed_block_falls_back_to_prose() {
        let input = "I'll add a card titled Profile\n```json\n[{\"action\": \"add\",]\n```";
        let parsed = parse_response(input);

        assert_eq!(parsed.message, input);
        let ops = adds(&parsed);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].0, ComponentKind::Card);
        assert_eq!(ops[0].1.get("title"), Some(&json!("Profile")));
    }

    #[test]
    fn one_line_can_add_several_components() {
        let parsed = parse_response("add a green button saying Go and add a heading titled Welcome");
        let ops = adds(&parsed);
        assert_eq!(ops.len(), 2);

        let (kind, props, first) = &ops[0];
        assert_eq!(*kind, ComponentKind::Button);
        assert_eq!(props.get("color"), Some(&json!("green")));
        assert_eq!(props.get("label"), Some(&json!("Go")));

        let (kind, props, second) = &ops[1];
        assert_eq!(*kind, ComponentKind::Text);
        assert_eq!(props.get("content"), Some(&json!("Welcome")));
        assert_eq!(props.get("variant"), Some(&json!("h2")));

        assert!(second.y > first.y);
        assert_eq!(first.y, STACK_START_Y);
        assert_eq!(second.y, STACK_START_Y + STACK_STEP_Y);
    }

    #[test]
    fn input_modifiers_and_placeholders() {
        let parsed = parse_response(
            "Create an email input with placeholder \"you@example.com\"\nAlso add a password field for Password",
        );
        let ops = adds(&parsed);
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].1.get("type"), Some(&json!("email")));
        assert_eq!(ops[0].1.get("placeholder"), Some(&json!("you@example.com")));
        assert_eq!(ops[1].1.get("type"), Some(&json!("password")));
    }

    #[test]
    fn text_field_is_not_also_a_text() {
        let parsed = parse_response("add a text field labeled Name");
        let ops = adds(&parsed);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].0, ComponentKind::Input);
        assert_eq!(ops[0].1.get("placeholder"), Some(&json!("Name")));
    }

    #[test]
    fn button_with_the_text_keeps_its_label() {
        let parsed = parse_response("add a button with the text Go");
        let ops = adds(&parsed);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].0, ComponentKind::Button);
        assert_eq!(ops[0].1.get("label"), Some(&json!("Go")));
    }

    #[test]
    fn text_input_is_one_input() {
        let parsed = parse_response("add a text input for Name");
        let ops = adds(&parsed);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].0, ComponentKind::Input);
        assert_eq!(ops[0].1.get("placeholder"), Some(&json!("Name")));
        assert_eq!(ops[0].1.get("type"), Some(&json!("text")));
    }

    #[test]
    fn button_with_text_is_one_button() {
        let parsed = parse_response("add a large red button with text Sign In");
        let ops = adds(&parsed);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].1.get("label"), Some(&json!("Sign In")));
        assert_eq!(ops[0].1.get("color"), Some(&json!("red")));
        assert_eq!(ops[0].1.get("size"), Some(&json!("lg")));
    }

    #[test]
    fn quoted_label_before_keyword() {
        let parsed = parse_response("Please add a \"Submit\" button");
        let ops = adds(&parsed);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].1.get("label"), Some(&json!("Submit")));
    }

    #[test]
    fn text_variants() {
        let parsed = parse_response("add an h1 text saying Hi\nadd a small text saying fine print\nadd a title Welcome");
        let variants: Vec<_> = adds(&parsed).into_iter().map(|(_, p, _)| p["variant"].clone()).collect();
        assert_eq!(variants, vec![json!("h1"), json!("small"), json!("h1")]);
    }

    #[test]
    fn defaults_when_nothing_is_named() {
        let parsed = parse_response("create a button and a card");
        let ops = adds(&parsed);
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].1.get("label"), Some(&json!("Button")));
        assert_eq!(ops[0].1.get("color"), Some(&json!("blue")));
        assert_eq!(ops[1].1.get("title"), Some(&json!("Card")));
    }

    #[test]
    fn lines_without_verbs_are_ignored() {
        let input = "Your button looks great.\nThe address field is fine.";
        let parsed = parse_response(input);
        assert!(parsed.operations.is_empty());
        assert_eq!(parsed.message, input);
    }

    #[test]
    fn code_block_extraction() {
        let content = "Here you go:\n```tsx\nexport default function A() {}\n```\n";
        assert_eq!(extract_code_block(content), Some("export default function A() {}".to_string()));
        assert_eq!(extract_code_block("```json\n[]\n```"), None);
    }
}
