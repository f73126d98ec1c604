//! Structural validation of raw model output.
//!
//! Two input shapes are accepted:
//! - `{"command": "create_object", "type": "CUBE", ...}`
//! - `{"create_object": {"type": "CUBE", ...}}`
//!
//! Only types and required fields are checked here. Whether a referenced
//! object exists is decided at execution time.

use serde_json::{Map, Value};
use thiserror::Error;

use super::{
    Command, CompositeObject, CompositePart, CreateObject, DeleteObject, DeleteTarget,
    ModifyObject, SetMaterial,
};
use crate::scene::{PrimitiveKind, Vec3};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("command must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("missing command name")]
    MissingCommand,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("{command}: missing required field '{field}'")]
    MissingField {
        command: &'static str,
        field: String,
    },

    #[error("{command}: invalid '{field}': {reason}")]
    InvalidField {
        command: &'static str,
        field: String,
        reason: String,
    },
}

impl ValidationError {
    /// The offending field, when the error is about one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField { field, .. } | Self::InvalidField { field, .. } => Some(field),
            _ => None,
        }
    }
}

type Params = Map<String, Value>;

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Validate one raw command.
pub fn validate(raw: &Value) -> Result<Command, ValidationError> {
    let obj = raw
        .as_object()
        .ok_or(ValidationError::NotAnObject(json_kind(raw)))?;

    let (name, params) = split_shape(obj)?;

    match name.as_str() {
        "create_object" => create_object(&params).map(Command::CreateObject),
        "set_material" => set_material(&params).map(Command::SetMaterial),
        "modify_object" => modify_object(&params).map(Command::ModifyObject),
        "delete_object" => delete_object(&params).map(Command::DeleteObject),
        "create_composite_object" => {
            composite_object(&params).map(Command::CreateCompositeObject)
        }
        _ => Err(ValidationError::UnknownCommand(name)),
    }
}

/// Validate every item, keeping per-item results in order.
pub fn validate_all(raw: &[Value]) -> Vec<Result<Command, ValidationError>> {
    raw.iter().map(validate).collect()
}

fn split_shape(obj: &Params) -> Result<(String, Params), ValidationError> {
    if let Some(name) = obj.get("command") {
        let name = name.as_str().ok_or(ValidationError::MissingCommand)?;
        let mut params = obj.clone();
        params.remove("command");
        return Ok((name.trim().to_string(), params));
    }

    // Nested shape: exactly one key whose value holds the parameters
    if obj.len() == 1 {
        if let Some((name, Value::Object(params))) = obj.iter().next() {
            return Ok((name.trim().to_string(), params.clone()));
        }
    }

    Err(ValidationError::MissingCommand)
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn invalid(command: &'static str, field: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidField {
        command,
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn required_str(
    params: &Params,
    command: &'static str,
    field: &str,
) -> Result<String, ValidationError> {
    match params.get(field) {
        None | Some(Value::Null) => Err(ValidationError::MissingField {
            command,
            field: field.to_string(),
        }),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err(invalid(command, field, "must not be empty")),
        Some(other) => Err(invalid(
            command,
            field,
            format!("expected a string, got {}", json_kind(other)),
        )),
    }
}

fn optional_str(
    params: &Params,
    command: &'static str,
    field: &str,
) -> Result<Option<String>, ValidationError> {
    match params.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => required_str(params, command, field).map(Some),
    }
}

fn optional_f32(
    params: &Params,
    command: &'static str,
    field: &str,
) -> Result<Option<f32>, ValidationError> {
    match params.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(|v| Some(v as f32))
            .ok_or_else(|| invalid(command, field, "not a finite number")),
        Some(other) => Err(invalid(
            command,
            field,
            format!("expected a number, got {}", json_kind(other)),
        )),
    }
}

fn optional_bool(
    params: &Params,
    command: &'static str,
    field: &str,
) -> Result<Option<bool>, ValidationError> {
    match params.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(invalid(
            command,
            field,
            format!("expected a boolean, got {}", json_kind(other)),
        )),
    }
}

/// Exactly three numbers.
fn optional_triple(
    params: &Params,
    command: &'static str,
    field: &str,
) -> Result<Option<Vec3>, ValidationError> {
    let items = match params.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(invalid(
                command,
                field,
                format!("expected 3 numbers, got {}", json_kind(other)),
            ));
        }
    };

    if items.len() != 3 {
        return Err(invalid(
            command,
            field,
            format!("expected exactly 3 numbers, got {}", items.len()),
        ));
    }

    let mut out = [0.0f32; 3];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = item
            .as_f64()
            .ok_or_else(|| invalid(command, field, "all 3 values must be numbers"))?
            as f32;
    }
    Ok(Some(out))
}

fn required_kind(
    params: &Params,
    command: &'static str,
    field: &str,
) -> Result<PrimitiveKind, ValidationError> {
    let raw = required_str(params, command, field)?;
    raw.parse::<PrimitiveKind>().map_err(|_| {
        let allowed: Vec<&str> = PrimitiveKind::ALL.iter().map(|k| k.as_str()).collect();
        invalid(
            command,
            field,
            format!("unknown type '{}' (allowed: {})", raw, allowed.join(", ")),
        )
    })
}

// ---------------------------------------------------------------------------
// Per-command rules
// ---------------------------------------------------------------------------

fn create_object(params: &Params) -> Result<CreateObject, ValidationError> {
    const CMD: &str = "create_object";
    Ok(CreateObject {
        kind: required_kind(params, CMD, "type")?,
        name: optional_str(params, CMD, "name")?,
        location: optional_triple(params, CMD, "location")?,
        rotation: optional_triple(params, CMD, "rotation")?,
        scale: optional_triple(params, CMD, "scale")?,
        color: optional_triple(params, CMD, "color")?,
    })
}

fn set_material(params: &Params) -> Result<SetMaterial, ValidationError> {
    const CMD: &str = "set_material";
    Ok(SetMaterial {
        obj_name: required_str(params, CMD, "obj_name")?,
        color: optional_triple(params, CMD, "color")?,
        metallic: optional_f32(params, CMD, "metallic")?,
        roughness: optional_f32(params, CMD, "roughness")?,
        material_name: optional_str(params, CMD, "material_name")?,
    })
}

fn modify_object(params: &Params) -> Result<ModifyObject, ValidationError> {
    const CMD: &str = "modify_object";
    Ok(ModifyObject {
        name: required_str(params, CMD, "name")?,
        location: optional_triple(params, CMD, "location")?,
        rotation: optional_triple(params, CMD, "rotation")?,
        scale: optional_triple(params, CMD, "scale")?,
        visible: optional_bool(params, CMD, "visible")?,
    })
}

fn delete_object(params: &Params) -> Result<DeleteObject, ValidationError> {
    const CMD: &str = "delete_object";
    Ok(DeleteObject {
        target: DeleteTarget::from(required_str(params, CMD, "name")?),
    })
}

fn composite_object(params: &Params) -> Result<CompositeObject, ValidationError> {
    const CMD: &str = "create_composite_object";
    let name = required_str(params, CMD, "name")?;
    let location = optional_triple(params, CMD, "location")?;

    let parts = match params.get("parts") {
        None | Some(Value::Null) => {
            return Err(ValidationError::MissingField {
                command: CMD,
                field: "parts".into(),
            });
        }
        Some(Value::Array(parts)) if parts.is_empty() => {
            return Err(invalid(CMD, "parts", "needs at least one part"));
        }
        Some(Value::Array(parts)) => parts,
        Some(other) => {
            return Err(invalid(
                CMD,
                "parts",
                format!("expected an array, got {}", json_kind(other)),
            ));
        }
    };

    let mut out = Vec::with_capacity(parts.len());
    for (i, part) in parts.iter().enumerate() {
        let Some(part) = part.as_object() else {
            return Err(invalid(CMD, &format!("parts[{}]", i), "expected an object"));
        };
        let field = |f: &str| format!("parts[{}].{}", i, f);
        // Re-key the part so errors name the full path
        let keyed: Params = part
            .iter()
            .map(|(k, v)| (field(k), v.clone()))
            .collect();

        out.push(CompositePart {
            kind: required_kind(&keyed, CMD, &field("type"))?,
            name: optional_str(&keyed, CMD, &field("name"))?,
            offset: optional_triple(&keyed, CMD, &field("offset"))?,
            rotation: optional_triple(&keyed, CMD, &field("rotation"))?,
            scale: optional_triple(&keyed, CMD, &field("scale"))?,
            color: optional_triple(&keyed, CMD, &field("color"))?,
        });
    }

    Ok(CompositeObject {
        name,
        location,
        parts: out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_both_shapes() {
        let flat = validate(&json!({"command": "create_object", "type": "CUBE", "name": "X"})).unwrap();
        let nested = validate(&json!({"create_object": {"type": "CUBE", "name": "X"}})).unwrap();
        assert_eq!(flat, nested);
    }

    #[test]
    fn create_object_requires_type() {
        let err = validate(&json!({"command": "create_object", "name": "X"})).unwrap_err();
        assert_eq!(err.field(), Some("type"));
        assert!(matches!(err, ValidationError::MissingField { .. }));
    }

    #[test]
    fn unknown_type_names_the_value() {
        let err = validate(&json!({"command": "create_object", "type": "TORUS"})).unwrap_err();
        assert_eq!(err.field(), Some("type"));
        assert!(err.to_string().contains("TORUS"), "{}", err);
    }

    #[test]
    fn set_material_color_must_be_three_numbers() {
        let err = validate(&json!({"set_material": {"obj_name": "A", "color": [1, 0]}})).unwrap_err();
        assert_eq!(err.field(), Some("color"));

        let err = validate(&json!({"set_material": {"obj_name": "A", "color": [1, 0, 0, 1]}})).unwrap_err();
        assert_eq!(err.field(), Some("color"));

        let err = validate(&json!({"set_material": {"obj_name": "A", "color": ["r", 0, 0]}})).unwrap_err();
        assert_eq!(err.field(), Some("color"));

        let ok = validate(&json!({"set_material": {"obj_name": "A", "color": [1, 0, 0]}})).unwrap();
        match ok {
            Command::SetMaterial(m) => assert_eq!(m.color, Some([1.0, 0.0, 0.0])),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn set_material_requires_obj_name() {
        let err = validate(&json!({"command": "set_material", "color": [1, 0, 0]})).unwrap_err();
        assert_eq!(err.field(), Some("obj_name"));
    }

    #[test]
    fn modify_and_delete_require_name() {
        let err = validate(&json!({"command": "modify_object", "location": [0, 0, 1]})).unwrap_err();
        assert_eq!(err.field(), Some("name"));

        let err = validate(&json!({"command": "delete_object"})).unwrap_err();
        assert_eq!(err.field(), Some("name"));

        let err = validate(&json!({"command": "modify_object", "name": "A", "visible": "yes"})).unwrap_err();
        assert_eq!(err.field(), Some("visible"));
    }

    #[test]
    fn everything_is_passed_through_as_sentinel() {
        let cmd = validate(&json!({"command": "delete_object", "name": "everything"})).unwrap();
        assert_eq!(
            cmd,
            Command::DeleteObject(DeleteObject {
                target: DeleteTarget::Everything
            })
        );
    }

    #[test]
    fn composite_errors_name_the_part_field() {
        let err = validate(&json!({
            "command": "create_composite_object",
            "name": "Tree",
            "parts": [{"type": "CYLINDER"}, {"type": "BLOB"}]
        }))
        .unwrap_err();
        assert_eq!(err.field(), Some("parts[1].type"));

        let err = validate(&json!({"command": "create_composite_object", "name": "Tree", "parts": []})).unwrap_err();
        assert_eq!(err.field(), Some("parts"));
    }

    #[test]
    fn rejects_unknown_and_shapeless_input() {
        assert_eq!(
            validate(&json!({"command": "explode"})).unwrap_err(),
            ValidationError::UnknownCommand("explode".into())
        );
        assert_eq!(
            validate(&json!({"type": "CUBE", "name": "X"})).unwrap_err(),
            ValidationError::MissingCommand
        );
        assert_eq!(
            validate(&json!("create_object")).unwrap_err(),
            ValidationError::NotAnObject("a string")
        );
    }

    #[test]
    fn validate_all_keeps_order() {
        let results = validate_all(&[
            json!({"command": "delete_object", "name": "A"}),
            json!({"command": "delete_object"}),
        ]);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }
}
