//! Prompt assembly for scene generation.
//!
//! Builds the system instruction block (command vocabulary, safety rules,
//! output contract, scene snapshot, placement guidance) and combines it
//! with recent chat turns and the new user request.

use once_cell::sync::Lazy;
use tiktoken_rs::CoreBPE;
use tracing::debug;

use super::history::ChatTurn;
use super::providers::Message;
use crate::scene::SceneSnapshot;
use crate::scene::placement::EXCLUSION_RADIUS;

static BPE: Lazy<Option<CoreBPE>> = Lazy::new(|| tiktoken_rs::cl100k_base().ok());

/// cl100k token count, or a length estimate if the encoder is unavailable.
pub fn count_tokens(text: &str) -> usize {
    match *BPE {
        Some(ref bpe) => bpe.encode_with_special_tokens(text).len(),
        None => text.len().div_ceil(4),
    }
}

/// Build the system prompt around an already serialized snapshot.
#[allow(clippy::vec_init_then_push)] // clearer with explicit pushes for multi-section content
pub fn build_system_prompt(snapshot_json: &str, placement_extent: f32) -> String {
    let mut lines = Vec::new();

    lines.push(
        "You are a 3D scene assistant. You edit the user's scene by emitting commands \
         from a fixed vocabulary; the host applies them in order."
            .to_string(),
    );
    lines.push(String::new());

    lines.push("## Commands".to_string());
    lines.push(
        "- create_object: {\"command\": \"create_object\", \
         \"type\": CUBE|SPHERE|CONE|CYLINDER|PLANE, \"name\"?: string, \
         \"location\"?: [x,y,z], \"rotation\"?: [x,y,z] (radians), \
         \"scale\"?: [x,y,z], \"color\"?: [r,g,b] (0-1)}"
            .to_string(),
    );
    lines.push(
        "- set_material: {\"command\": \"set_material\", \"obj_name\": string, \
         \"color\"?: [r,g,b], \"metallic\"?: 0-1, \"roughness\"?: 0-1, \
         \"material_name\"?: string}"
            .to_string(),
    );
    lines.push(
        "- modify_object: {\"command\": \"modify_object\", \"name\": string, \"location\"?, \
         \"rotation\"?, \"scale\"?, \"visible\"?: bool}"
            .to_string(),
    );
    lines.push(
        "- delete_object: {\"command\": \"delete_object\", \"name\": string}. \
         The name \"everything\" deletes every object."
            .to_string(),
    );
    lines.push(
        "- create_composite_object: {\"command\": \"create_composite_object\", \"name\": string, \
         \"location\"?: [x,y,z], \"parts\": [{\"type\", \"name\"?, \"offset\"?: [x,y,z], \
         \"rotation\"?, \"scale\"?, \"color\"?}]}. Parts are named <name>_<part>."
            .to_string(),
    );
    lines.push(String::new());

    lines.push("## Rules".to_string());
    lines.push("Only use the commands listed above; nothing else will run.".to_string());
    lines.push(
        "Only reference objects that exist in the scene or that you create earlier \
         in the same list."
            .to_string(),
    );
    lines.push(
        "Do not delete \"everything\" unless the user explicitly asks to clear the scene."
            .to_string(),
    );
    lines.push(String::new());

    lines.push("## Output".to_string());
    lines.push("Reply with a single JSON object and nothing else:".to_string());
    lines.push(
        "{\"explanation\": \"<one or two sentences>\", \"commands\": [ ... ]}".to_string(),
    );
    lines.push(
        "If the request needs no scene changes, return an empty commands list.".to_string(),
    );
    lines.push(String::new());

    lines.push("## Placement".to_string());
    lines.push(format!(
        "Keep new objects within {extent} units of the origin on X and Y and at least \
         {radius} units away from existing objects unless the user wants them touching. \
         Omit location to let the host choose a free spot.",
        extent = placement_extent,
        radius = EXCLUSION_RADIUS
    ));
    lines.push(String::new());

    lines.push("## Current Scene".to_string());
    lines.push(snapshot_json.to_string());

    lines.join("\n")
}

/// Follow-up request used by each iteration round.
pub fn build_iteration_prompt(snapshot: &SceneSnapshot) -> String {
    format!(
        "{} Suggest and add one or two objects that complement the existing scene. \
         Do not modify or delete existing objects.",
        snapshot.describe()
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptPayload {
    pub messages: Vec<Message>,
    pub snapshot_tokens: usize,
    pub omitted_objects: Option<usize>,
    pub history_turns: usize,
}

#[derive(Debug, Clone)]
pub struct PromptComposer {
    pub max_snapshot_tokens: usize,
    pub max_history_turns: usize,
    pub placement_extent: f32,
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self {
            max_snapshot_tokens: 2000,
            max_history_turns: 20,
            placement_extent: 10.0,
        }
    }
}

impl PromptComposer {
    pub fn compose(
        &self,
        user_prompt: &str,
        scene: &SceneSnapshot,
        history: &[ChatTurn],
    ) -> PromptPayload {
        let (snapshot, snapshot_json, snapshot_tokens) = self.fit_snapshot(scene);

        let mut messages = Vec::with_capacity(history.len().min(self.max_history_turns) + 2);
        messages.push(Message::system(build_system_prompt(
            &snapshot_json,
            self.placement_extent,
        )));

        let start = history.len().saturating_sub(self.max_history_turns);
        let recent = &history[start..];
        messages.extend(recent.iter().map(ChatTurn::to_message));
        messages.push(Message::user(user_prompt));

        debug!(
            "Composed prompt: {} message(s), snapshot {} tokens, {} history turn(s)",
            messages.len(),
            snapshot_tokens,
            recent.len()
        );

        PromptPayload {
            messages,
            snapshot_tokens,
            omitted_objects: snapshot.omitted_objects,
            history_turns: recent.len(),
        }
    }

    /// Largest object prefix whose serialization fits the token budget.
    fn fit_snapshot(&self, scene: &SceneSnapshot) -> (SceneSnapshot, String, usize) {
        let json = scene.to_json();
        let tokens = count_tokens(&json);
        if tokens <= self.max_snapshot_tokens {
            return (scene.clone(), json, tokens);
        }

        let mut lo = 0usize;
        let mut hi = scene.objects.len();
        while lo < hi {
            let mid = (lo + hi).div_ceil(2);
            if count_tokens(&scene.truncated(mid).to_json()) <= self.max_snapshot_tokens {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }

        let cut = scene.truncated(lo);
        let json = cut.to_json();
        let tokens = count_tokens(&json);
        debug!(
            "Snapshot over budget, kept {} of {} objects",
            lo,
            scene.objects.len()
        );
        (cut, json, tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::history::TurnRole;
    use crate::agent::providers::Role;
    use crate::scene::snapshot::{self, SnapshotDetail};
    use crate::scene::{MemoryScene, PrimitiveKind, Scene, ScenePrimitive};

    fn scene_with(n: usize) -> SceneSnapshot {
        let mut scene = MemoryScene::default();
        for i in 0..n {
            scene
                .insert(ScenePrimitive::new(
                    format!("Object{}", i),
                    PrimitiveKind::Cube,
                    [i as f32, 0.0, 0.0],
                ))
                .unwrap();
        }
        snapshot::read(&scene, SnapshotDetail::Full)
    }

    #[test]
    fn payload_order_is_system_history_user() {
        let history = vec![
            ChatTurn::new(TurnRole::User, "add a cube"),
            ChatTurn::new(TurnRole::Assistant, "added"),
        ];
        let payload = PromptComposer::default().compose("make it red", &scene_with(1), &history);

        let roles: Vec<Role> = payload.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(payload.messages[3].content, "make it red");
        assert!(payload.messages[0].content.contains("\"Object0\""));
        assert!(payload.messages[0].content.contains("\"explanation\""));
        assert_eq!(payload.omitted_objects, None);
    }

    #[test]
    fn history_is_capped_to_most_recent() {
        let history: Vec<ChatTurn> = (0..30)
            .map(|i| ChatTurn::new(TurnRole::User, format!("turn {}", i)))
            .collect();
        let composer = PromptComposer {
            max_history_turns: 4,
            ..PromptComposer::default()
        };
        let payload = composer.compose("next", &scene_with(0), &history);

        assert_eq!(payload.history_turns, 4);
        assert_eq!(payload.messages.len(), 6);
        assert_eq!(payload.messages[1].content, "turn 26");
    }

    #[test]
    fn large_snapshots_are_truncated_with_marker() {
        let composer = PromptComposer {
            max_snapshot_tokens: 300,
            ..PromptComposer::default()
        };
        let payload = composer.compose("hi", &scene_with(200), &[]);

        let omitted = payload.omitted_objects.unwrap();
        assert!(omitted > 0 && omitted < 200);
        assert!(payload.snapshot_tokens <= 300);
        assert!(payload.messages[0].content.contains("omitted_objects"));
    }

    #[test]
    fn iteration_prompt_includes_tally() {
        let prompt = build_iteration_prompt(&scene_with(2));
        assert!(prompt.starts_with("The scene currently contains: 2 CUBE(s)."));
    }

    #[test]
    fn token_count_is_nonzero_for_text() {
        assert!(count_tokens("hello world") > 0);
        assert_eq!(count_tokens(""), 0);
    }
}
