//! CLI subcommand: `scenegpt copy`
//!
//! Prints the last generated batch, its explanation or the execution
//! report so it can be piped to a clipboard tool.

use anyhow::Result;
use clap::{Args, ValueEnum};

use super::open_session;
use crate::config::Config;
use crate::session::Session;

#[derive(Args)]
pub struct CopyArgs {
    /// What to print
    #[arg(value_enum, default_value_t = CopyTarget::Commands)]
    pub target: CopyTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CopyTarget {
    /// Last generated commands as JSON
    Commands,
    /// Explanation that came with the last batch
    Explanation,
    /// Last execution report
    Result,
}

pub async fn run(args: CopyArgs, config: Config) -> Result<()> {
    let (session, _lock) = open_session(&config)?;
    println!("{}", copy_text(&session, args.target));
    Ok(())
}

pub(crate) fn copy_text(session: &Session, target: CopyTarget) -> String {
    match target {
        CopyTarget::Commands => session
            .last_commands_text()
            .unwrap_or_else(|| "No commands generated yet.".to_string()),
        CopyTarget::Explanation => {
            or_placeholder(session.last_explanation(), "No explanation yet.")
        }
        CopyTarget::Result => {
            or_placeholder(session.last_result_text(), "No execution result yet.")
        }
    }
}

fn or_placeholder(text: &str, placeholder: &str) -> String {
    if text.is_empty() {
        placeholder.to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ClientSettings, ModelClient, RateLimiter};
    use crate::session::SessionState;
    use std::time::Duration;

    fn session_with(state: SessionState) -> Session {
        let settings = ClientSettings {
            model: "test-model".into(),
            max_tokens: 256,
            temperature: 0.0,
            timeout: Duration::from_secs(5),
            max_retries: 0,
            retry_backoff: Duration::from_millis(1),
        };
        let client = ModelClient::new(None, RateLimiter::default(), settings);
        Session::new(Config::default(), client, state)
    }

    #[test]
    fn empty_session_prints_placeholders() {
        let session = session_with(SessionState::default());
        assert_eq!(
            copy_text(&session, CopyTarget::Commands),
            "No commands generated yet."
        );
        assert_eq!(
            copy_text(&session, CopyTarget::Explanation),
            "No explanation yet."
        );
        assert_eq!(
            copy_text(&session, CopyTarget::Result),
            "No execution result yet."
        );
    }

    #[tokio::test]
    async fn explanation_follows_the_last_batch() {
        let mut session = session_with(SessionState::default());
        session.send_chat_message("a rock", true).await.unwrap();

        let explanation = copy_text(&session, CopyTarget::Explanation);
        assert!(explanation.starts_with("I dream of"), "{}", explanation);
        assert!(copy_text(&session, CopyTarget::Commands).contains("create_composite_object"));
    }
}
