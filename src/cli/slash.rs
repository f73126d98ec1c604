//! Slash commands available inside the interactive chat.

/// A slash command definition.
pub struct SlashCommand {
    pub name: &'static str,
    pub description: &'static str,
    pub aliases: &'static [&'static str],
    pub usage: &'static str,
}

impl SlashCommand {
    /// Whether `word` (with its leading slash) names this command.
    pub fn matches(&self, word: &str) -> bool {
        let Some(bare) = word.strip_prefix('/') else {
            return false;
        };
        self.name == bare || self.aliases.contains(&bare)
    }

    /// Format as a help line, e.g. "  /help, /h, /?       - Show this help"
    fn help_line(&self) -> String {
        let mut names = format!("/{}", self.name);
        for alias in self.aliases {
            names.push_str(&format!(", /{}", alias));
        }
        if !self.usage.is_empty() {
            names.push_str(&format!(" {}", self.usage));
        }
        format!("  {:<22}- {}", names, self.description)
    }
}

pub const COMMANDS: &[SlashCommand] = &[
    SlashCommand {
        name: "help",
        description: "Show available commands",
        aliases: &["h", "?"],
        usage: "",
    },
    SlashCommand {
        name: "quit",
        description: "Exit chat",
        aliases: &["exit", "q"],
        usage: "",
    },
    SlashCommand {
        name: "dreamer",
        description: "Toggle offline Dreamer mode",
        aliases: &[],
        usage: "[on|off]",
    },
    SlashCommand {
        name: "scene",
        description: "Describe the current scene",
        aliases: &[],
        usage: "",
    },
    SlashCommand {
        name: "undo",
        description: "Revert the last batch",
        aliases: &[],
        usage: "",
    },
    SlashCommand {
        name: "execute",
        description: "Run the last generated batch again",
        aliases: &["run"],
        usage: "",
    },
    SlashCommand {
        name: "copy",
        description: "Print the last commands, explanation or result",
        aliases: &[],
        usage: "[commands|explanation|result]",
    },
    SlashCommand {
        name: "history",
        description: "Show recent chat turns",
        aliases: &[],
        usage: "[n]",
    },
    SlashCommand {
        name: "clear",
        description: "Clear chat history",
        aliases: &[],
        usage: "",
    },
    SlashCommand {
        name: "clear-scene",
        description: "Delete every object in the scene",
        aliases: &[],
        usage: "",
    },
    SlashCommand {
        name: "model",
        description: "Show or switch the model",
        aliases: &[],
        usage: "[name]",
    },
    SlashCommand {
        name: "detail",
        description: "Set snapshot detail",
        aliases: &[],
        usage: "<full|low>",
    },
    SlashCommand {
        name: "key",
        description: "Set the API key (literal or key file)",
        aliases: &[],
        usage: "<key|path>",
    },
];

/// Look up a command by name or alias, e.g. "/q".
pub fn find(word: &str) -> Option<&'static SlashCommand> {
    COMMANDS.iter().find(|cmd| cmd.matches(word))
}

pub fn format_help_text() -> String {
    let mut lines = vec!["Commands:".to_string()];
    for cmd in COMMANDS {
        lines.push(cmd.help_line());
    }
    lines.join("\n")
}
