//! Scene data model and the host boundary.
//!
//! The host 3D application owns the scene graph. The core only talks to it
//! through the [`Scene`] trait; [`MemoryScene`] is the in-process host used
//! by the CLI and by tests.

mod memory;
pub mod placement;
pub mod snapshot;

pub use memory::MemoryScene;
pub use snapshot::{SceneSnapshot, SnapshotDetail};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub type Vec3 = [f32; 3];
pub type Rgb = [f32; 3];

/// Mesh primitive types a command may create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrimitiveKind {
    Cube,
    Sphere,
    Cone,
    Cylinder,
    Plane,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 5] = [
        Self::Cube,
        Self::Sphere,
        Self::Cone,
        Self::Cylinder,
        Self::Plane,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cube => "CUBE",
            Self::Sphere => "SPHERE",
            Self::Cone => "CONE",
            Self::Cylinder => "CYLINDER",
            Self::Plane => "PLANE",
        }
    }

    /// Base name given to unnamed objects of this kind.
    pub fn default_name(&self) -> &'static str {
        match self {
            Self::Cube => "Cube",
            Self::Sphere => "Sphere",
            Self::Cone => "Cone",
            Self::Cylinder => "Cylinder",
            Self::Plane => "Plane",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown primitive type '{0}'")]
pub struct UnknownKind(pub String);

impl FromStr for PrimitiveKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        // UV_SPHERE / ICO_SPHERE are common model spellings of the same thing
        let normalized = match upper.as_str() {
            "UV_SPHERE" | "ICO_SPHERE" => "SPHERE",
            other => other,
        };
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// Material in the first slot of a primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    pub name: String,
    pub base_color: Rgb,
    pub metallic: f32,
    pub roughness: f32,
}

impl MaterialSpec {
    pub fn new(name: impl Into<String>, base_color: Rgb) -> Self {
        Self {
            name: name.into(),
            base_color,
            metallic: 0.0,
            roughness: 0.5,
        }
    }
}

/// One mesh object in the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenePrimitive {
    pub name: String,
    pub kind: PrimitiveKind,
    pub location: Vec3,
    /// Euler angles in radians
    pub rotation: Vec3,
    pub scale: Vec3,
    pub visible: bool,
    #[serde(default)]
    pub material: Option<MaterialSpec>,
}

impl ScenePrimitive {
    pub fn new(name: impl Into<String>, kind: PrimitiveKind, location: Vec3) -> Self {
        Self {
            name: name.into(),
            kind,
            location,
            rotation: [0.0; 3],
            scale: [1.0; 3],
            visible: true,
            material: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSummary {
    pub name: String,
    pub lens: f32,
    pub location: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub light_type: String,
    pub energy: f32,
    pub location: Vec3,
}

/// A mutation the host rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("object '{0}' not found")]
    ObjectNotFound(String),

    #[error("an object named '{0}' already exists")]
    DuplicateName(String),
}

/// Host scene boundary.
///
/// Implementations own the objects; callers get borrowed views or clones.
pub trait Scene {
    /// All primitives in insertion order.
    fn objects(&self) -> Vec<&ScenePrimitive>;

    fn get(&self, name: &str) -> Option<&ScenePrimitive>;

    fn get_mut(&mut self, name: &str) -> Option<&mut ScenePrimitive>;

    /// Add a primitive; names are unique within a scene.
    fn insert(&mut self, primitive: ScenePrimitive) -> Result<(), ExecutionError>;

    fn remove(&mut self, name: &str) -> Option<ScenePrimitive>;

    /// Remove every primitive, returning how many were removed.
    fn clear(&mut self) -> usize;

    fn cameras(&self) -> Vec<CameraSummary>;

    fn lights(&self) -> Vec<LightSummary>;

    /// Record an undo checkpoint with a user-visible label. Callers push
    /// one checkpoint before and one after each undoable step.
    fn push_undo(&mut self, label: &str);

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn len(&self) -> usize {
        self.objects().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First free name of the form `base`, `base.001`, `base.002`, ...
    fn unique_name(&self, base: &str) -> String {
        if !self.contains(base) {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{}.{:03}", base, i))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }
}
