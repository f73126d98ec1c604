//! Point-in-time, read-only serialization of scene state used as model
//! context. Recomputed for every request; never cached or diffed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

use super::{CameraSummary, LightSummary, PrimitiveKind, Rgb, Scene, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotDetail {
    /// Transforms, visibility and material introspection
    #[default]
    Full,
    /// Names, types and locations only
    Low,
}

impl SnapshotDetail {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Error)]
#[error("invalid snapshot detail '{0}' (expected \"full\" or \"low\")")]
pub struct InvalidDetail(String);

impl FromStr for SnapshotDetail {
    type Err = InvalidDetail;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "low" => Ok(Self::Low),
            _ => Err(InvalidDetail(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PrimitiveKind,
    pub location: Vec3,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    /// Material name; absent at low detail and for unmaterialed objects
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialEntry {
    pub name: String,
    /// Objects using this material
    pub users: Vec<String>,
    pub base_color: Rgb,
    pub metallic: f32,
    pub roughness: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub objects: Vec<ObjectEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<MaterialEntry>,
    pub cameras: Vec<CameraSummary>,
    pub lights: Vec<LightSummary>,
    /// Set when the object list was cut to fit the prompt budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub omitted_objects: Option<usize>,
}

/// Read the scene at the requested level of detail.
pub fn read(scene: &dyn Scene, detail: SnapshotDetail) -> SceneSnapshot {
    let full = detail == SnapshotDetail::Full;
    let mut snapshot = SceneSnapshot {
        cameras: scene.cameras(),
        lights: scene.lights(),
        ..SceneSnapshot::default()
    };

    for obj in scene.objects() {
        let material = match obj.material {
            Some(ref mat) if full => Some(register_material(
                &mut snapshot.materials,
                &obj.name,
                &mat.name,
                mat.base_color,
                mat.metallic,
                mat.roughness,
            )),
            _ => None,
        };

        snapshot.objects.push(ObjectEntry {
            name: obj.name.clone(),
            kind: obj.kind,
            location: obj.location,
            rotation: full.then_some(obj.rotation),
            scale: full.then_some(obj.scale),
            visible: full.then_some(obj.visible),
            material,
        });
    }

    snapshot
}

/// Add `user` to the entry with identical properties, or start a new
/// entry. Objects own their materials, so two of them may carry the same
/// name with different colors; later variants get a `.001`-style suffix.
/// Returns the entry name the object should reference.
fn register_material(
    materials: &mut Vec<MaterialEntry>,
    user: &str,
    name: &str,
    base_color: Rgb,
    metallic: f32,
    roughness: f32,
) -> String {
    let same_name = |entry: &MaterialEntry| {
        entry.name == name
            || entry
                .name
                .strip_prefix(name)
                .and_then(|rest| rest.strip_prefix('.'))
                .is_some_and(|n| n.len() == 3 && n.bytes().all(|b| b.is_ascii_digit()))
    };

    if let Some(entry) = materials.iter_mut().find(|m| {
        same_name(m)
            && m.base_color == base_color
            && m.metallic == metallic
            && m.roughness == roughness
    }) {
        entry.users.push(user.to_string());
        return entry.name.clone();
    }

    let mut n = materials.iter().filter(|m| same_name(m)).count();
    let mut entry_name = name.to_string();
    while materials.iter().any(|m| m.name == entry_name) {
        entry_name = format!("{}.{:03}", name, n);
        n += 1;
    }
    materials.push(MaterialEntry {
        name: entry_name.clone(),
        users: vec![user.to_string()],
        base_color,
        metallic,
        roughness,
    });
    entry_name
}

impl SceneSnapshot {
    pub fn find(&self, name: &str) -> Option<&ObjectEntry> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// Object count per primitive type, in a stable order.
    pub fn kind_tally(&self) -> BTreeMap<PrimitiveKind, usize> {
        let mut tally = BTreeMap::new();
        for obj in &self.objects {
            *tally.entry(obj.kind).or_insert(0) += 1;
        }
        tally
    }

    /// One-line description such as
    /// "The scene currently contains: 2 CUBE(s), 1 SPHERE(s)."
    pub fn describe(&self) -> String {
        let tally = self.kind_tally();
        if tally.is_empty() {
            return "The scene currently contains no objects.".to_string();
        }
        let parts: Vec<String> = tally
            .iter()
            .map(|(kind, count)| format!("{} {}(s)", count, kind))
            .collect();
        format!("The scene currently contains: {}.", parts.join(", "))
    }

    /// Keep the first `max_objects` objects and drop materials no kept
    /// object uses.
    pub fn truncated(&self, max_objects: usize) -> SceneSnapshot {
        if self.objects.len() <= max_objects {
            return self.clone();
        }

        let objects: Vec<ObjectEntry> = self.objects[..max_objects].to_vec();
        let materials = self
            .materials
            .iter()
            .filter(|m| m.users.iter().any(|u| objects.iter().any(|o| &o.name == u)))
            .cloned()
            .collect();

        SceneSnapshot {
            omitted_objects: Some(
                self.objects.len() - max_objects + self.omitted_objects.unwrap_or(0),
            ),
            objects,
            materials,
            cameras: self.cameras.clone(),
            lights: self.lights.clone(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
