//! In-memory host scene.
//!
//! Objects are kept in insertion order and addressed by name. Undo
//! checkpoints store a full copy of the object list, which is fine at the
//! scene sizes a prompt-driven session produces. Checkpoints are pushed in
//! before/after pairs around one undoable step, and only the newest
//! `MAX_UNDO_STEPS` checkpoints are kept.

use serde::{Deserialize, Serialize};

use super::{CameraSummary, ExecutionError, LightSummary, Scene, ScenePrimitive};

pub const MAX_UNDO_STEPS: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UndoStep {
    label: String,
    objects: Vec<ScenePrimitive>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryScene {
    #[serde(default)]
    objects: Vec<ScenePrimitive>,

    #[serde(default)]
    cameras: Vec<CameraSummary>,

    #[serde(default)]
    lights: Vec<LightSummary>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    undo_steps: Vec<UndoStep>,
}

impl Default for MemoryScene {
    /// A fresh scene: no meshes, one camera, one point light.
    fn default() -> Self {
        Self {
            objects: Vec::new(),
            cameras: vec![CameraSummary {
                name: "Camera".into(),
                lens: 50.0,
                location: [7.36, -6.93, 4.96],
            }],
            lights: vec![LightSummary {
                name: "Light".into(),
                light_type: "POINT".into(),
                energy: 1000.0,
                location: [4.08, 1.01, 5.9],
            }],
            undo_steps: Vec::new(),
        }
    }
}

impl MemoryScene {
    /// A scene with no camera and no light.
    pub fn empty() -> Self {
        Self {
            objects: Vec::new(),
            cameras: Vec::new(),
            lights: Vec::new(),
            undo_steps: Vec::new(),
        }
    }

    /// Labels of the recorded undo checkpoints, oldest first.
    pub fn undo_labels(&self) -> Vec<&str> {
        self.undo_steps.iter().map(|s| s.label.as_str()).collect()
    }

    /// Revert the latest step by restoring its "before" checkpoint.
    ///
    /// The before/after pair is dropped together, so repeated calls walk
    /// back one step at a time. Returns the label of the "after" checkpoint
    /// that was undone, or `None` when there is nothing to go back to.
    pub fn undo(&mut self) -> Option<String> {
        if self.undo_steps.len() < 2 {
            return None;
        }
        let after = self.undo_steps.pop()?;
        let before = self.undo_steps.pop()?;
        self.objects = before.objects;
        Some(after.label)
    }
}

impl Scene for MemoryScene {
    fn objects(&self) -> Vec<&ScenePrimitive> {
        self.objects.iter().collect()
    }

    fn get(&self, name: &str) -> Option<&ScenePrimitive> {
        self.objects.iter().find(|o| o.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut ScenePrimitive> {
        self.objects.iter_mut().find(|o| o.name == name)
    }

    fn insert(&mut self, primitive: ScenePrimitive) -> Result<(), ExecutionError> {
        if self.contains(&primitive.name) {
            return Err(ExecutionError::DuplicateName(primitive.name));
        }
        self.objects.push(primitive);
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Option<ScenePrimitive> {
        let idx = self.objects.iter().position(|o| o.name == name)?;
        Some(self.objects.remove(idx))
    }

    fn clear(&mut self) -> usize {
        let count = self.objects.len();
        self.objects.clear();
        count
    }

    fn cameras(&self) -> Vec<CameraSummary> {
        self.cameras.clone()
    }

    fn lights(&self) -> Vec<LightSummary> {
        self.lights.clone()
    }

    fn push_undo(&mut self, label: &str) {
        self.undo_steps.push(UndoStep {
            label: label.to_string(),
            objects: self.objects.clone(),
        });
        if self.undo_steps.len() > MAX_UNDO_STEPS {
            // Keep pairs aligned: trim an even number from the front
            let excess = self.undo_steps.len() - MAX_UNDO_STEPS;
            let excess = (excess + excess % 2).min(self.undo_steps.len());
            self.undo_steps.drain(..excess);
        }
    }

    fn len(&self) -> usize {
        self.objects.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::PrimitiveKind;

    #[test]
    fn insert_rejects_duplicate_names() {
        let mut scene = MemoryScene::empty();
        scene
            .insert(ScenePrimitive::new("A", PrimitiveKind::Cube, [0.0; 3]))
            .unwrap();
        let err = scene
            .insert(ScenePrimitive::new("A", PrimitiveKind::Sphere, [1.0; 3]))
            .unwrap_err();
        assert_eq!(err, ExecutionError::DuplicateName("A".into()));
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn remove_and_clear() {
        let mut scene = MemoryScene::default();
        for name in ["A", "B", "C"] {
            scene
                .insert(ScenePrimitive::new(name, PrimitiveKind::Cube, [0.0; 3]))
                .unwrap();
        }
        assert!(scene.remove("B").is_some());
        assert!(scene.remove("B").is_none());
        assert_eq!(scene.clear(), 2);
        assert!(scene.is_empty());
        // Cameras and lights are not primitives
        assert_eq!(scene.cameras().len(), 1);
        assert_eq!(scene.lights().len(), 1);
    }

    #[test]
    fn undo_restores_previous_checkpoint() {
        let mut scene = MemoryScene::empty();
        scene.push_undo("Before batch");
        scene
            .insert(ScenePrimitive::new("A", PrimitiveKind::Cube, [0.0; 3]))
            .unwrap();
        scene.push_undo("After batch");

        assert_eq!(scene.undo().as_deref(), Some("After batch"));
        assert!(scene.is_empty());
        assert_eq!(scene.undo(), None);
    }

    #[test]
    fn each_undo_reverts_exactly_one_step() {
        let mut scene = MemoryScene::empty();
        for name in ["A", "B"] {
            scene.push_undo("before");
            scene
                .insert(ScenePrimitive::new(name, PrimitiveKind::Cube, [0.0; 3]))
                .unwrap();
            scene.push_undo("after");
        }

        assert!(scene.undo().is_some());
        assert!(scene.contains("A"));
        assert!(!scene.contains("B"));

        assert!(scene.undo().is_some());
        assert!(scene.is_empty());
        assert_eq!(scene.undo(), None);
    }

    #[test]
    fn undo_history_survives_serde() {
        let mut scene = MemoryScene::default();
        scene.push_undo("before");
        scene
            .insert(ScenePrimitive::new("A", PrimitiveKind::Cone, [1.0, 2.0, 3.0]))
            .unwrap();
        scene.push_undo("after");

        let json = serde_json::to_string(&scene).unwrap();
        let mut restored: MemoryScene = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.get("A").unwrap().location, [1.0, 2.0, 3.0]);
        assert_eq!(restored.undo_labels(), vec!["before", "after"]);
        assert_eq!(restored.undo().as_deref(), Some("after"));
        assert!(restored.is_empty());
    }

    #[test]
    fn undo_history_is_bounded() {
        let mut scene = MemoryScene::empty();
        for i in 0..MAX_UNDO_STEPS / 2 + 3 {
            scene.push_undo(&format!("before {}", i));
            scene.push_undo(&format!("after {}", i));
        }
        let labels = scene.undo_labels();
        assert_eq!(labels.len(), MAX_UNDO_STEPS);
        assert_eq!(labels[0], "before 3");
        assert_eq!(labels[1], "after 3");
    }

    #[test]
    fn legacy_state_without_undo_loads() {
        let restored: MemoryScene = serde_json::from_str(r#"{"objects": []}"#).unwrap();
        assert!(restored.undo_labels().is_empty());
        assert!(restored.cameras().is_empty());
    }
}
