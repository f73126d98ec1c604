//! Applies validated command batches to a host scene.
//!
//! A batch runs in list order and every item is attempted; a failing item
//! is recorded and the next one runs. The whole batch sits between two
//! undo checkpoints so the host can revert it in one step.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{
    Command, CompositeObject, CreateObject, DeleteTarget, ModifyObject, SetMaterial,
    ValidationError, validate_all,
};
use crate::scene::placement::random_position;
use crate::scene::{ExecutionError, MaterialSpec, Rgb, Scene, ScenePrimitive, Vec3};

pub const UNDO_BEFORE: &str = "SceneGPT: before batch";
pub const UNDO_AFTER: &str = "SceneGPT: after batch";

const DEFAULT_COLOR: Rgb = [0.8, 0.8, 0.8];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("invalid command: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Execution(#[from] ExecutionError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemResult {
    pub index: usize,
    pub label: String,
    /// Status message on success
    pub outcome: Result<String, CommandError>,
}

impl ItemResult {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    pub items: Vec<ItemResult>,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchResult {
    fn push(&mut self, item: ItemResult) {
        if item.is_ok() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.items.push(item);
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemResult> {
        self.items.iter().filter(|i| !i.is_ok())
    }

    /// Status text for the whole batch.
    pub fn summary(&self) -> String {
        if self.items.is_empty() {
            return "No commands to execute.".to_string();
        }
        if self.failed == 0 {
            return format!("Executed {} command(s) successfully.", self.succeeded);
        }

        let mut text = format!(
            "Executed {} of {} command(s); {} failed:",
            self.succeeded,
            self.total(),
            self.failed
        );
        for item in self.failures() {
            if let Err(ref e) = item.outcome {
                text.push_str(&format!("\n  #{} {}: {}", item.index + 1, item.label, e));
            }
        }
        text
    }

    /// One line per item, in execution order.
    pub fn report(&self) -> String {
        let mut lines: Vec<String> = self
            .items
            .iter()
            .map(|item| match item.outcome {
                Ok(ref msg) => format!("[ok]   {}", msg),
                Err(ref e) => format!("[fail] {}: {}", item.label, e),
            })
            .collect();
        lines.push(self.summary());
        lines.join("\n")
    }
}

type ProgressFn<'a> = Box<dyn FnMut(usize, usize) + 'a>;

pub struct Executor<'a> {
    scene: &'a mut dyn Scene,
    placement_extent: f32,
    progress: Option<ProgressFn<'a>>,
}

impl<'a> Executor<'a> {
    pub fn new(scene: &'a mut dyn Scene) -> Self {
        Self {
            scene,
            placement_extent: 10.0,
            progress: None,
        }
    }

    /// Half-width of the square used for automatic placement.
    pub fn with_placement_extent(mut self, extent: f32) -> Self {
        self.placement_extent = extent;
        self
    }

    /// Called with `(completed, total)` after each item.
    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: FnMut(usize, usize) + 'a,
    {
        self.progress = Some(Box::new(f));
        self
    }

    pub fn execute(&mut self, batch: &[Command]) -> BatchResult {
        self.run(batch.iter().cloned().map(Ok).collect())
    }

    /// Validate each raw value, then execute. Items that fail validation
    /// are recorded as failures in their original position.
    pub fn execute_raw(&mut self, raw: &[Value]) -> BatchResult {
        self.run(validate_all(raw))
    }

    fn run(&mut self, items: Vec<Result<Command, ValidationError>>) -> BatchResult {
        let mut result = BatchResult::default();
        let total = items.len();
        if total == 0 {
            debug!("Empty batch, nothing to execute");
            return result;
        }

        self.scene.push_undo(UNDO_BEFORE);

        for (index, item) in items.into_iter().enumerate() {
            let (label, outcome) = match item {
                Ok(cmd) => {
                    let label = cmd.to_string();
                    let outcome = self.apply(&cmd).map_err(CommandError::from);
                    (label, outcome)
                }
                Err(e) => ("<invalid>".to_string(), Err(CommandError::from(e))),
            };

            match outcome {
                Ok(ref msg) => debug!("#{} {}: {}", index + 1, label, msg),
                Err(ref e) => warn!("#{} {} failed: {}", index + 1, label, e),
            }

            result.push(ItemResult {
                index,
                label,
                outcome,
            });

            if let Some(ref mut progress) = self.progress {
                progress(index + 1, total);
            }
        }

        self.scene.push_undo(UNDO_AFTER);

        info!(
            "Batch finished: {} succeeded, {} failed",
            result.succeeded, result.failed
        );
        result
    }

    /// Apply one command to the scene.
    pub fn apply(&mut self, cmd: &Command) -> Result<String, ExecutionError> {
        match cmd {
            Command::CreateObject(c) => self.create_object(c),
            Command::SetMaterial(c) => self.set_material(c),
            Command::ModifyObject(c) => self.modify_object(c),
            Command::DeleteObject(c) => self.delete_object(&c.target),
            Command::CreateCompositeObject(c) => self.create_composite(c),
        }
    }

    fn auto_location(&self) -> Vec3 {
        let occupied: Vec<Vec3> = self.scene.objects().iter().map(|o| o.location).collect();
        let placement = random_position(&occupied, self.placement_extent);
        if !placement.clear {
            debug!(
                "No clear spot after {} attempts, overlapping at {:?}",
                placement.attempts, placement.location
            );
        }
        placement.location
    }

    fn create_object(&mut self, c: &CreateObject) -> Result<String, ExecutionError> {
        let name = match c.name {
            Some(ref name) if self.scene.contains(name) => {
                return Err(ExecutionError::DuplicateName(name.clone()));
            }
            Some(ref name) => name.clone(),
            None => self.scene.unique_name(c.kind.default_name()),
        };
        let location = c.location.unwrap_or_else(|| self.auto_location());

        let mut primitive = ScenePrimitive::new(name.clone(), c.kind, location);
        if let Some(rotation) = c.rotation {
            primitive.rotation = rotation;
        }
        if let Some(scale) = c.scale {
            primitive.scale = scale;
        }
        if let Some(color) = c.color {
            primitive.material = Some(MaterialSpec::new(
                format!("{}_Material", name),
                clamp_rgb(color),
            ));
        }
        self.scene.insert(primitive)?;

        Ok(format!(
            "Created {} '{}' at {}",
            c.kind,
            name,
            fmt_vec3(location)
        ))
    }

    fn set_material(&mut self, c: &SetMaterial) -> Result<String, ExecutionError> {
        let obj = self
            .scene
            .get_mut(&c.obj_name)
            .ok_or_else(|| ExecutionError::ObjectNotFound(c.obj_name.clone()))?;

        // Unspecified properties carry over from the material being replaced
        let previous = obj.material.take();
        let base = previous.unwrap_or_else(|| MaterialSpec::new("", DEFAULT_COLOR));
        let material = MaterialSpec {
            name: c
                .material_name
                .clone()
                .unwrap_or_else(|| format!("{}_Material", c.obj_name)),
            base_color: c.color.map(clamp_rgb).unwrap_or(base.base_color),
            metallic: c.metallic.map(clamp_unit).unwrap_or(base.metallic),
            roughness: c.roughness.map(clamp_unit).unwrap_or(base.roughness),
        };
        let summary = format!(
            "Set material '{}' on '{}' (color {}, metallic {:.2}, roughness {:.2})",
            material.name,
            c.obj_name,
            fmt_vec3(material.base_color),
            material.metallic,
            material.roughness
        );
        obj.material = Some(material);
        Ok(summary)
    }

    fn modify_object(&mut self, c: &ModifyObject) -> Result<String, ExecutionError> {
        let obj = self
            .scene
            .get_mut(&c.name)
            .ok_or_else(|| ExecutionError::ObjectNotFound(c.name.clone()))?;

        let mut changed = Vec::new();
        if let Some(location) = c.location {
            obj.location = location;
            changed.push("location");
        }
        if let Some(rotation) = c.rotation {
            obj.rotation = rotation;
            changed.push("rotation");
        }
        if let Some(scale) = c.scale {
            obj.scale = scale;
            changed.push("scale");
        }
        if let Some(visible) = c.visible {
            obj.visible = visible;
            changed.push("visibility");
        }

        if changed.is_empty() {
            Ok(format!("Nothing to change on '{}'", c.name))
        } else {
            Ok(format!("Modified '{}' ({})", c.name, changed.join(", ")))
        }
    }

    fn delete_object(&mut self, target: &DeleteTarget) -> Result<String, ExecutionError> {
        match target {
            DeleteTarget::Everything => {
                let count = self.scene.clear();
                Ok(format!("Deleted {} object(s)", count))
            }
            DeleteTarget::Named(name) => {
                self.scene
                    .remove(name)
                    .ok_or_else(|| ExecutionError::ObjectNotFound(name.clone()))?;
                Ok(format!("Deleted '{}'", name))
            }
        }
    }

    fn create_composite(&mut self, c: &CompositeObject) -> Result<String, ExecutionError> {
        let origin = c.location.unwrap_or_else(|| self.auto_location());

        let names: Vec<String> = c
            .parts
            .iter()
            .enumerate()
            .map(|(i, part)| {
                let suffix = match part.name {
                    Some(ref n) => n.clone(),
                    None => format!("{}{}", part.kind.default_name(), i + 1),
                };
                format!("{}_{}", c.name, suffix)
            })
            .collect();

        // All-or-nothing for the parts of one composite
        for (i, name) in names.iter().enumerate() {
            if self.scene.contains(name) || names[..i].contains(name) {
                return Err(ExecutionError::DuplicateName(name.clone()));
            }
        }

        for (part, name) in c.parts.iter().zip(&names) {
            let offset = part.offset.unwrap_or([0.0; 3]);
            let location = [
                origin[0] + offset[0],
                origin[1] + offset[1],
                origin[2] + offset[2],
            ];
            let mut primitive = ScenePrimitive::new(name.clone(), part.kind, location);
            if let Some(rotation) = part.rotation {
                primitive.rotation = rotation;
            }
            if let Some(scale) = part.scale {
                primitive.scale = scale;
            }
            if let Some(color) = part.color {
                primitive.material = Some(MaterialSpec::new(
                format!("{}_Material", name),
                clamp_rgb(color),
            ));
            }
            self.scene.insert(primitive)?;
        }

        Ok(format!(
            "Created composite '{}' with {} part(s) at {}",
            c.name,
            names.len(),
            fmt_vec3(origin)
        ))
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

fn clamp_rgb(c: Rgb) -> Rgb {
    [clamp_unit(c[0]), clamp_unit(c[1]), clamp_unit(c[2])]
}

fn fmt_vec3(v: Vec3) -> String {
    format!("({:.2}, {:.2}, {:.2})", v[0], v[1], v[2])
}
