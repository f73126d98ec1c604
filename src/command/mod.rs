//! Scene-mutation command vocabulary.
//!
//! Model output is parsed into raw JSON values, turned into [`Command`]s by
//! [`validate`], and applied by the [`Executor`]. A command is validated
//! once, executed once, and then dropped.

mod executor;
mod validate;

pub use executor::{BatchResult, CommandError, Executor, ItemResult};
pub use validate::{ValidationError, validate, validate_all};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::scene::{PrimitiveKind, Rgb, Vec3};

/// Name that `delete_object` treats as "every primitive in the scene".
pub const DELETE_ALL_SENTINEL: &str = "everything";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    CreateObject(CreateObject),
    SetMaterial(SetMaterial),
    ModifyObject(ModifyObject),
    DeleteObject(DeleteObject),
    CreateCompositeObject(CompositeObject),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateObject {
    #[serde(rename = "type")]
    pub kind: PrimitiveKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetMaterial {
    pub obj_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metallic: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roughness: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModifyObject {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteObject {
    #[serde(rename = "name")]
    pub target: DeleteTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum DeleteTarget {
    /// The reserved `"everything"` sentinel
    Everything,
    Named(String),
}

impl From<String> for DeleteTarget {
    fn from(name: String) -> Self {
        if name == DELETE_ALL_SENTINEL {
            Self::Everything
        } else {
            Self::Named(name)
        }
    }
}

impl From<DeleteTarget> for String {
    fn from(target: DeleteTarget) -> Self {
        match target {
            DeleteTarget::Everything => DELETE_ALL_SENTINEL.to_string(),
            DeleteTarget::Named(name) => name,
        }
    }
}

/// Several primitives created together and named `<name>_<part>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeObject {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Vec3>,
    pub parts: Vec<CompositePart>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositePart {
    #[serde(rename = "type")]
    pub kind: PrimitiveKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Offset from the composite's location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateObject(_) => "create_object",
            Self::SetMaterial(_) => "set_material",
            Self::ModifyObject(_) => "modify_object",
            Self::DeleteObject(_) => "delete_object",
            Self::CreateCompositeObject(_) => "create_composite_object",
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateObject(c) => match c.name {
                Some(ref name) => write!(f, "create_object({} '{}')", c.kind, name),
                None => write!(f, "create_object({})", c.kind),
            },
            Self::SetMaterial(c) => write!(f, "set_material('{}')", c.obj_name),
            Self::ModifyObject(c) => write!(f, "modify_object('{}')", c.name),
            Self::DeleteObject(c) => match c.target {
                DeleteTarget::Everything => write!(f, "delete_object(everything)"),
                DeleteTarget::Named(ref name) => write!(f, "delete_object('{}')", name),
            },
            Self::CreateCompositeObject(c) => write!(
                f,
                "create_composite_object('{}', {} parts)",
                c.name,
                c.parts.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_in_command_field_shape() {
        let cmd = Command::CreateObject(CreateObject {
            kind: PrimitiveKind::Cube,
            name: Some("X".into()),
            location: Some([0.0, 0.0, 0.0]),
            rotation: None,
            scale: None,
            color: None,
        });
        assert_eq!(
            cmd.to_value(),
            json!({"command": "create_object", "type": "CUBE", "name": "X", "location": [0.0, 0.0, 0.0]})
        );
    }

    #[test]
    fn serialized_commands_validate_back() {
        let cmd = Command::DeleteObject(DeleteObject {
            target: DeleteTarget::Everything,
        });
        let value = cmd.to_value();
        assert_eq!(value, json!({"command": "delete_object", "name": "everything"}));
        assert_eq!(validate(&value).unwrap(), cmd);
    }

    #[test]
    fn display_labels() {
        let cmd = Command::SetMaterial(SetMaterial {
            obj_name: "Ball".into(),
            color: None,
            metallic: None,
            roughness: None,
            material_name: None,
        });
        assert_eq!(cmd.to_string(), "set_material('Ball')");
        assert_eq!(cmd.name(), "set_material");
    }
}
