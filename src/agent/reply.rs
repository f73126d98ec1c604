//! Turning model text into a [`ModelReply`].
//!
//! Parsing never fails: strict JSON is tried first, then JSON5, and
//! anything still unreadable becomes an explanation with no commands.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

static CODE_FENCE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)```").ok());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyFormat {
    Strict,
    Permissive,
    /// Not JSON at all; the raw text became the explanation
    Degraded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelReply {
    pub explanation: String,
    /// Raw, unvalidated command values
    pub commands: Vec<Value>,
    pub follow_up: Option<String>,
    pub format: ReplyFormat,
}

impl ModelReply {
    pub fn degraded(text: &str) -> Self {
        Self {
            explanation: text.trim().to_string(),
            commands: Vec::new(),
            follow_up: None,
            format: ReplyFormat::Degraded,
        }
    }

    /// Serialized command list, as stored in chat history.
    pub fn commands_json(&self) -> Option<String> {
        if self.commands.is_empty() {
            None
        } else {
            serde_json::to_string_pretty(&self.commands).ok()
        }
    }
}

pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(ref re) = *CODE_FENCE {
        if let Some(inner) = re.captures(trimmed).and_then(|c| c.get(1)) {
            return inner.as_str().trim();
        }
    }
    trimmed
}

fn parse_value(text: &str) -> Option<(Value, ReplyFormat)> {
    if let Ok(v) = serde_json::from_str::<Value>(text) {
        return Some((v, ReplyFormat::Strict));
    }
    if let Ok(v) = json5::from_str::<Value>(text) {
        return Some((v, ReplyFormat::Permissive));
    }
    None
}

/// The outermost `{ ... }` span, for replies with prose around the JSON.
fn embedded_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

pub fn parse_reply(text: &str) -> ModelReply {
    let body = strip_code_fences(text);

    let parsed = parse_value(body).or_else(|| embedded_object(body).and_then(parse_value));
    let Some((value, format)) = parsed else {
        debug!("Model reply is not JSON, treating it as plain text");
        return ModelReply::degraded(text);
    };

    match value {
        Value::Object(mut obj) => {
            let explanation = match obj.remove("explanation") {
                Some(Value::String(s)) => s,
                Some(other) if !other.is_null() => other.to_string(),
                _ => String::new(),
            };
            let follow_up = match obj.remove("follow_up") {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
                _ => None,
            };
            let commands = match obj.remove("commands") {
                Some(Value::Array(items)) => items,
                Some(Value::Object(single)) => vec![Value::Object(single)],
                Some(_) => Vec::new(),
                // A lone command object without the envelope
                None if obj.contains_key("command") => vec![Value::Object(obj)],
                None => Vec::new(),
            };
            ModelReply {
                explanation,
                commands,
                follow_up,
                format,
            }
        }
        Value::Array(items) => ModelReply {
            explanation: String::new(),
            commands: items,
            follow_up: None,
            format,
        },
        _ => ModelReply::degraded(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strict_envelope() {
        let reply = parse_reply(
            r#"{"explanation": "A red cube", "commands": [{"command": "create_object", "type": "CUBE"}]}"#,
        );
        assert_eq!(reply.format, ReplyFormat::Strict);
        assert_eq!(reply.explanation, "A red cube");
        assert_eq!(reply.commands.len(), 1);
        assert_eq!(reply.follow_up, None);
    }

    #[test]
    fn fenced_json5_with_trailing_commas() {
        let text = "Here you go:\n```json\n{'explanation': 'two things', 'commands': [{'command': 'delete_object', 'name': 'A',},],}\n```\n";
        let reply = parse_reply(text);
        assert_eq!(reply.format, ReplyFormat::Permissive);
        assert_eq!(reply.explanation, "two things");
        assert_eq!(reply.commands[0], json!({"command": "delete_object", "name": "A"}));
    }

    #[test]
    fn plain_text_degrades() {
        let reply = parse_reply("Sorry, I can't help with that.");
        assert_eq!(reply.format, ReplyFormat::Degraded);
        assert_eq!(reply.explanation, "Sorry, I can't help with that.");
        assert!(reply.commands.is_empty());
    }

    #[test]
    fn bare_array_is_the_command_list() {
        let reply = parse_reply(r#"[{"command": "delete_object", "name": "everything"}]"#);
        assert_eq!(reply.commands.len(), 1);
        assert!(reply.explanation.is_empty());
    }

    #[test]
    fn prose_around_json_is_ignored() {
        let reply = parse_reply(
            r#"Sure! {"explanation": "ok", "commands": [], "follow_up": "Add a light?"} Enjoy."#,
        );
        assert_eq!(reply.explanation, "ok");
        assert_eq!(reply.follow_up.as_deref(), Some("Add a light?"));
    }

    #[test]
    fn lone_command_object() {
        let reply = parse_reply(r#"{"command": "create_object", "type": "PLANE"}"#);
        assert_eq!(reply.commands.len(), 1);
        assert_eq!(reply.commands[0]["type"], "PLANE");
    }

    #[test]
    fn commands_json_is_none_when_empty() {
        assert!(ModelReply::degraded("x").commands_json().is_none());
    }
}
