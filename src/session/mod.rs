//! The session context: everything one user's editing session needs,
//! passed explicitly instead of living in process-wide state.
//!
//! It owns the scene, the chat history, the model client (and with it the
//! rate limiter and API key state) and the last generated batch. Each
//! public method corresponds to one user action.

mod state;

pub use state::SessionState;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::agent::{
    ChatHistory, ChatTurn, ModelClient, ModelError, ModelReply, OpenAIProvider, PromptComposer,
    TurnRole,
};
use crate::command::{BatchResult, Executor};
use crate::config::{Config, Credentials, read_key_source};
use crate::dreamer::{Dreamer, DreamerError};
use crate::iteration::IterationStep;
use crate::scene::{MemoryScene, Scene, SceneSnapshot, SnapshotDetail, snapshot};

/// Result of one prompt round trip.
#[derive(Debug, Clone)]
pub struct Generation {
    pub reply: ModelReply,
    /// Present when the batch was executed
    pub batch: Option<BatchResult>,
}

impl Generation {
    pub fn status(&self) -> String {
        let mut text = if self.reply.explanation.is_empty() {
            format!("Received {} command(s).", self.reply.commands.len())
        } else {
            self.reply.explanation.clone()
        };
        if let Some(ref batch) = self.batch {
            text.push('\n');
            text.push_str(&batch.summary());
        }
        text
    }
}

pub struct Session {
    config: Config,
    client: ModelClient,
    composer: PromptComposer,
    dreamer: Dreamer,
    detail: SnapshotDetail,
    state: SessionState,
    /// Where `save` writes; `None` keeps the session in memory only
    state_path: Option<PathBuf>,
}

impl Session {
    pub fn new(config: Config, client: ModelClient, state: SessionState) -> Self {
        let composer = PromptComposer {
            max_snapshot_tokens: config.scene.max_snapshot_tokens,
            max_history_turns: config.agent.max_history_turns,
            placement_extent: config.scene.placement_extent,
        };
        let detail = config.scene.snapshot_detail;
        Self {
            config,
            client,
            composer,
            dreamer: Dreamer::new(),
            detail,
            state,
            state_path: None,
        }
    }

    /// Load persisted state and build the model client from config.
    pub fn open(config: Config) -> Result<Self> {
        let path = config.paths.session_file();
        let state = SessionState::load(&path)?;
        let mut client = ModelClient::from_config(&config)?;
        client.restore_requests(&state.recent_requests);
        let mut session = Self::new(config, client, state);
        session.state_path = Some(path);
        Ok(session)
    }

    /// Persist the state, including the rate window, so limits hold
    /// across CLI runs.
    pub fn save(&mut self) -> Result<()> {
        self.state.recent_requests = self.client.recent_requests();
        match self.state_path {
            Some(ref path) => self.state.save(path),
            None => Ok(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn has_api_key(&self) -> bool {
        self.client.has_api_key()
    }

    pub fn model(&self) -> &str {
        &self.client.settings().model
    }

    pub fn detail(&self) -> SnapshotDetail {
        self.detail
    }

    pub fn set_model(&mut self, model: &str) {
        self.client.set_model(model);
        info!("Using model: {}", model);
    }

    pub fn set_detail(&mut self, detail: SnapshotDetail) {
        self.detail = detail;
    }

    pub fn scene(&self) -> &MemoryScene {
        &self.state.scene
    }

    pub fn history(&self) -> &ChatHistory {
        &self.state.history
    }

    pub fn snapshot(&self, detail: SnapshotDetail) -> SceneSnapshot {
        snapshot::read(&self.state.scene, detail)
    }

    /// Ask the model for a batch and store it as the last generated batch.
    ///
    /// History is only extended when the request succeeds.
    pub async fn generate(&mut self, prompt: &str) -> Result<ModelReply, ModelError> {
        let snapshot = self.snapshot(self.detail);
        let payload = self
            .composer
            .compose(prompt, &snapshot, self.state.history.turns());

        let reply = self.client.generate(&payload).await?;
        info!(
            "Generated {} command(s) for prompt ({} chars)",
            reply.commands.len(),
            prompt.len()
        );

        self.state.history.push(ChatTurn::new(TurnRole::User, prompt));
        self.state.history.push(
            ChatTurn::new(TurnRole::Assistant, reply_text(&reply))
                .with_commands(reply.commands_json()),
        );
        self.state.last_commands = reply.commands.clone();
        self.state.last_explanation = reply.explanation.clone();
        Ok(reply)
    }

    /// Run the last generated batch against the scene.
    pub fn execute(&mut self) -> BatchResult {
        let extent = self.config.scene.placement_extent;
        let batch = Executor::new(&mut self.state.scene)
            .with_placement_extent(extent)
            .execute_raw(&self.state.last_commands);
        self.state.last_result = batch.report();
        batch
    }

    pub async fn generate_and_execute(&mut self, prompt: &str) -> Result<Generation, ModelError> {
        let reply = self.generate(prompt).await?;
        let batch = self.execute();
        Ok(Generation {
            reply,
            batch: Some(batch),
        })
    }

    /// Send a chat message. In dreamer mode the reply comes from the
    /// offline Dreamer instead of the model.
    pub async fn send_chat_message(&mut self, message: &str, dreamer: bool) -> Result<String> {
        if dreamer {
            return self.dream(message).map_err(anyhow::Error::from);
        }
        let generation = self.generate_and_execute(message).await?;
        Ok(generation.status())
    }

    fn dream(&mut self, message: &str) -> Result<String, DreamerError> {
        let vision = self.dreamer.process_request(message)?;
        let scene = &self.state.scene;
        let commands: Vec<Value> = self
            .dreamer
            .vision_to_commands(&vision, |name| scene.contains(name))
            .iter()
            .map(|c| c.to_value())
            .collect();

        let description = vision.describe();
        let commands_json = if commands.is_empty() {
            None
        } else {
            serde_json::to_string_pretty(&commands).ok()
        };

        self.state.history.push(ChatTurn::new(TurnRole::User, message));
        self.state.history.push(
            ChatTurn::new(TurnRole::Dreamer, description.clone()).with_commands(commands_json),
        );
        self.state.last_commands = commands;
        self.state.last_explanation = description.clone();

        let batch = self.execute();
        Ok(format!("{}\n{}", description, batch.summary()))
    }

    pub fn clear_history(&mut self) -> usize {
        let count = self.state.history.clear();
        info!("Cleared {} chat turn(s)", count);
        count
    }

    /// Remove every primitive, as one undoable step.
    pub fn clear_scene(&mut self) -> usize {
        let scene = &mut self.state.scene;
        scene.push_undo("SceneGPT: before clear");
        let count = scene.clear();
        scene.push_undo("SceneGPT: after clear");
        count
    }

    /// Revert the most recent batch of this run.
    pub fn undo(&mut self) -> Option<String> {
        self.state.scene.undo()
    }

    /// Last generated batch as pretty JSON, for the copy action.
    pub fn last_commands_text(&self) -> Option<String> {
        if self.state.last_commands.is_empty() {
            return None;
        }
        serde_json::to_string_pretty(&self.state.last_commands).ok()
    }

    /// Explanation that came with the last batch.
    pub fn last_explanation(&self) -> &str {
        &self.state.last_explanation
    }

    pub fn last_result_text(&self) -> &str {
        &self.state.last_result
    }

    pub fn has_pending_batch(&self) -> bool {
        !self.state.last_commands.is_empty()
    }

    /// Store a new API key (literal or key file) and start using it.
    pub fn configure_key(&mut self, source: &str) -> Result<()> {
        let key = read_key_source(source)?;
        Credentials::new(&key).save(&self.config.paths.credentials_file())?;

        let provider = OpenAIProvider::new(
            &key,
            &self.config.openai_base_url(),
            self.client.settings().timeout,
        )?;
        self.client.set_provider(Box::new(provider));
        Ok(())
    }
}

fn reply_text(reply: &ModelReply) -> String {
    match reply.follow_up {
        Some(ref follow_up) if !reply.explanation.is_empty() => {
            format!("{}\n\n{}", reply.explanation, follow_up)
        }
        Some(ref follow_up) => follow_up.clone(),
        None => reply.explanation.clone(),
    }
}

#[async_trait]
impl IterationStep for Session {
    fn snapshot(&self) -> SceneSnapshot {
        Session::snapshot(self, self.detail)
    }

    async fn run_round(&mut self, prompt: &str) -> Result<String> {
        let generation = self.generate_and_execute(prompt).await?;
        if let Some(ref batch) = generation.batch {
            if batch.failed > 0 {
                warn!("{} command(s) failed in this round", batch.failed);
            }
        }
        Ok(generation.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ClientSettings, MockModelProvider, RateLimiter};
    use crate::paths::Paths;
    use std::time::Duration;

    fn settings() -> ClientSettings {
        ClientSettings {
            model: "test-model".into(),
            max_tokens: 256,
            temperature: 0.0,
            timeout: Duration::from_secs(5),
            max_retries: 0,
            retry_backoff: Duration::from_millis(1),
        }
    }

    fn session_with(mock: Option<MockModelProvider>) -> Session {
        let provider = mock.map(|m| Box::new(m) as Box<dyn crate::agent::ModelProvider>);
        let client = ModelClient::new(provider, RateLimiter::default(), settings());
        Session::new(Config::default(), client, SessionState::default())
    }

    fn replying(text: &'static str) -> MockModelProvider {
        let mut mock = MockModelProvider::new();
        mock.expect_complete().returning(move |_| Ok(text.to_string()));
        mock
    }

    #[tokio::test]
    async fn generate_then_execute() {
        let mut session = session_with(Some(replying(
            r#"{"explanation": "A red cube", "commands": [
                {"command": "create_object", "type": "CUBE", "name": "RedCube", "location": [0, 0, 0]},
                {"command": "set_material", "obj_name": "RedCube", "color": [1, 0, 0]}
            ]}"#,
        )));

        let reply = session.generate("add a red cube").await.unwrap();
        assert_eq!(reply.commands.len(), 2);
        // Generation alone does not touch the scene
        assert!(!session.scene().contains("RedCube"));
        assert_eq!(session.history().len(), 2);

        let batch = session.execute();
        assert!(batch.is_success());
        let cube = session.scene().get("RedCube").unwrap();
        assert_eq!(cube.material.as_ref().unwrap().base_color, [1.0, 0.0, 0.0]);
        assert!(session.last_result_text().contains("successfully"));
        assert!(session.last_commands_text().unwrap().contains("set_material"));
    }

    #[tokio::test]
    async fn failed_request_leaves_history_and_scene_intact() {
        let mut mock = MockModelProvider::new();
        mock.expect_complete().returning(|_| {
            Err(ModelError::Auth {
                status: 401,
                message: "bad key".into(),
            })
        });
        let mut session = session_with(Some(mock));

        let err = session.generate_and_execute("anything").await.unwrap_err();
        assert!(matches!(err, ModelError::Auth { .. }));
        assert!(session.history().is_empty());
        assert!(session.scene().is_empty());
    }

    #[tokio::test]
    async fn no_key_is_reported() {
        let mut session = session_with(None);
        assert!(!session.has_api_key());
        assert_eq!(
            session.generate("hi").await.unwrap_err(),
            ModelError::NoApiKey
        );
    }

    #[tokio::test]
    async fn plain_text_reply_is_an_empty_batch() {
        let mut session = session_with(Some(replying("I am not sure what you mean.")));
        let generation = session.generate_and_execute("??").await.unwrap();

        assert_eq!(generation.reply.explanation, "I am not sure what you mean.");
        let batch = generation.batch.unwrap();
        assert!(batch.is_success());
        assert_eq!(batch.total(), 0);
        assert!(session.last_commands_text().is_none());
    }

    #[tokio::test]
    async fn dreamer_chat_builds_composites_offline() {
        let mut session = session_with(None);
        let status = session
            .send_chat_message("a tree and a rock", true)
            .await
            .unwrap();

        assert!(status.contains("I dream of"));
        assert!(session.scene().contains("Tree_trunk"));
        assert!(session.scene().contains("Rock_base"));
        assert_eq!(session.history().turns()[1].role, TurnRole::Dreamer);

        // A second dream avoids the names already in the scene
        session.send_chat_message("a rock", true).await.unwrap();
        assert!(session.scene().contains("Rock2_base"));
    }

    #[tokio::test]
    async fn iteration_rounds_use_the_session() {
        use crate::iteration::{IterationDriver, IterationOutcome};

        let mut session = session_with(Some(replying(
            r#"{"explanation": "more", "commands": [{"command": "create_object", "type": "SPHERE"}]}"#,
        )));
        let outcome = IterationDriver::new(2, Duration::from_millis(1))
            .run(&mut session, |_| {})
            .await;

        assert_eq!(outcome, IterationOutcome::Completed { rounds: 2 });
        assert_eq!(session.scene().len(), 2);
        assert_eq!(session.history().len(), 4);
    }

    #[test]
    fn clear_history_and_scene() {
        let mut session = session_with(None);
        session.state.history.push(ChatTurn::new(TurnRole::User, "x"));
        session
            .state
            .scene
            .insert(crate::scene::ScenePrimitive::new(
                "A",
                crate::scene::PrimitiveKind::Cube,
                [0.0; 3],
            ))
            .unwrap();

        assert_eq!(session.clear_history(), 1);
        assert_eq!(session.clear_scene(), 1);
        assert!(session.scene().is_empty());
        assert!(session.undo().is_some());
        assert!(session.scene().contains("A"));
    }

    #[test]
    fn configure_key_persists_and_enables_client() {
        let tmp = tempfile::tempdir().unwrap();
        let client = ModelClient::new(None, RateLimiter::default(), settings());
        let config = Config {
            paths: Paths::under(tmp.path()),
            ..Config::default()
        };
        let mut session = Session::new(config, client, SessionState::default());

        session.configure_key("sk-test-123").unwrap();
        assert!(session.has_api_key());

        let creds = Credentials::load(&session.config().paths.credentials_file())
            .unwrap()
            .unwrap();
        assert_eq!(creds.openai_api_key, "sk-test-123");
    }

    #[test]
    fn open_and_save_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            paths: Paths::under(tmp.path()),
            ..Config::default()
        };

        let mut session = Session::open(config.clone()).unwrap();
        session.state.history.push(ChatTurn::new(TurnRole::User, "hello"));
        session.save().unwrap();

        let reopened = Session::open(config).unwrap();
        assert_eq!(reopened.history().len(), 1);
    }

    #[tokio::test]
    async fn rate_window_is_shared_across_runs() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config {
            paths: Paths::under(tmp.path()),
            ..Config::default()
        };
        config.rate_limit.max_requests = 1;

        let mut mock = MockModelProvider::new();
        mock.expect_complete()
            .times(1)
            .returning(|_| Ok(r#"{"explanation": "ok", "commands": []}"#.into()));
        let mut first = Session::open(config.clone()).unwrap();
        first.client.set_provider(Box::new(mock));
        first.generate("a cube").await.unwrap();
        first.save().unwrap();
        assert_eq!(first.state.recent_requests.len(), 1);

        // The next run sees the request made by the first one
        let mut second = Session::open(config).unwrap();
        second
            .client
            .set_provider(Box::new(MockModelProvider::new()));
        let err = second.generate("a sphere").await.unwrap_err();
        assert!(matches!(err, ModelError::RateLimited { max: 1, .. }), "{}", err);
    }
}
