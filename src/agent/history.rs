use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::providers::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TurnRole {
    User,
    Assistant,
    /// Offline Dreamer reply; sent to the model as an assistant turn
    Dreamer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
    /// Serialized command batch produced with this turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            commands: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_commands(mut self, commands: Option<String>) -> Self {
        self.commands = commands;
        self
    }

    /// The message this turn contributes to a model request.
    pub fn to_message(&self) -> Message {
        match self.role {
            TurnRole::User => Message::user(&self.content),
            TurnRole::Assistant | TurnRole::Dreamer => match self.commands {
                Some(ref commands) => Message::assistant(format!(
                    "{}\n\nCommands:\n{}",
                    self.content, commands
                )),
                None => Message::assistant(&self.content),
            },
        }
    }
}

/// Append-only chat log, cleared wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatHistory {
    turns: Vec<ChatTurn>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> &[ChatTurn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) -> usize {
        let count = self.turns.len();
        self.turns.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::providers::Role;

    #[test]
    fn recent_keeps_latest_turns() {
        let mut history = ChatHistory::new();
        for i in 0..5 {
            history.push(ChatTurn::new(TurnRole::User, format!("m{}", i)));
        }
        let recent: Vec<&str> = history.recent(2).iter().map(|t| t.content.as_str()).collect();
        assert_eq!(recent, vec!["m3", "m4"]);
        assert_eq!(history.recent(50).len(), 5);

        assert_eq!(history.clear(), 5);
        assert!(history.is_empty());
    }

    #[test]
    fn dreamer_turns_become_assistant_messages() {
        let turn = ChatTurn::new(TurnRole::Dreamer, "A calm grove")
            .with_commands(Some("[]".to_string()));
        let msg = turn.to_message();
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.content.starts_with("A calm grove"));
        assert!(msg.content.contains("Commands:"));
    }

    #[test]
    fn serializes_roles_uppercase() {
        let turn = ChatTurn::new(TurnRole::Assistant, "ok");
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "ASSISTANT");
        assert!(json.get("commands").is_none());
    }
}
