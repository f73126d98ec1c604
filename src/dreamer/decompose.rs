//! Fixed breakdown of known objects into primitive forms.
//!
//! Each entry has a primary form standing on the ground plane and
//! secondary forms attached relative to it. Unknown objects fall back to
//! a single unit cube.

use crate::command::CompositePart;
use crate::scene::{PrimitiveKind, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dims {
    /// Cylinders and cones
    Round { radius: f32, height: f32 },
    Ball { radius: f32 },
    Box { width: f32, depth: f32, height: f32 },
    Flat { size: f32 },
}

impl Dims {
    pub fn height(&self) -> f32 {
        match *self {
            Dims::Round { height, .. } => height,
            Dims::Ball { radius } => radius * 2.0,
            Dims::Box { height, .. } => height,
            Dims::Flat { .. } => 0.0,
        }
    }

    /// Scale applied to the host's unit primitive (radius 1, depth 2).
    pub fn scale(&self) -> Vec3 {
        match *self {
            Dims::Round { radius, height } => [radius, radius, height / 2.0],
            Dims::Ball { radius } => [radius; 3],
            Dims::Box {
                width,
                depth,
                height,
            } => [width / 2.0, depth / 2.0, height / 2.0],
            Dims::Flat { size } => [size, size, 1.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attach {
    /// Sits on top of the primary form
    Top,
    /// Either side of the primary form along X
    Sides,
    /// At the base of the primary form
    Base,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    pub kind: PrimitiveKind,
    pub name: &'static str,
    pub dims: Dims,
    pub color: [f32; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    pub object: String,
    pub primary: Form,
    pub secondary: Vec<(Form, Attach)>,
    /// Surface details the primitive vocabulary cannot express
    pub details: Vec<&'static str>,
}

impl Decomposition {
    /// Parts for a composite object, offsets relative to its ground point.
    pub fn parts(&self) -> Vec<CompositePart> {
        let primary_height = self.primary.dims.height();
        let primary_center = primary_height / 2.0;
        let primary_width = match self.primary.dims {
            Dims::Round { radius, .. } | Dims::Ball { radius } => radius,
            Dims::Box { width, .. } => width / 2.0,
            Dims::Flat { size } => size,
        };

        let mut parts = vec![part(&self.primary, None, [0.0, 0.0, primary_center])];

        for (form, attach) in &self.secondary {
            let half = form.dims.height() / 2.0;
            match attach {
                Attach::Top => {
                    parts.push(part(form, None, [0.0, 0.0, primary_height + half]));
                }
                Attach::Base => {
                    parts.push(part(form, None, [0.0, 0.0, half]));
                }
                Attach::Sides => {
                    for (side, x) in [("left", -primary_width), ("right", primary_width)] {
                        parts.push(part(form, Some(side), [x, 0.0, half]));
                    }
                }
            }
        }
        parts
    }
}

fn part(form: &Form, side: Option<&str>, offset: Vec3) -> CompositePart {
    let name = match side {
        Some(side) => format!("{}_{}", form.name, side),
        None => form.name.to_string(),
    };
    CompositePart {
        kind: form.kind,
        name: Some(name),
        offset: Some(offset),
        rotation: None,
        scale: Some(form.dims.scale()),
        color: Some(form.color),
    }
}

const BARK: [f32; 3] = [0.36, 0.25, 0.2];
const LEAF: [f32; 3] = [0.2, 0.55, 0.2];
const STONE: [f32; 3] = [0.5, 0.5, 0.5];
const CONCRETE: [f32; 3] = [0.7, 0.7, 0.68];
const GLASS: [f32; 3] = [0.6, 0.8, 0.9];
const METAL: [f32; 3] = [0.3, 0.3, 0.35];
const SKIN: [f32; 3] = [0.85, 0.7, 0.6];
const WOOD: [f32; 3] = [0.55, 0.4, 0.25];

fn form(kind: PrimitiveKind, name: &'static str, dims: Dims, color: [f32; 3]) -> Form {
    Form {
        kind,
        name,
        dims,
        color,
    }
}

/// Object names the table knows, as they may appear in a prompt.
pub const KNOWN_OBJECTS: &[&str] = &[
    "tall_tree",
    "small_tree",
    "tree",
    "bush",
    "rock",
    "grass",
    "mushroom",
    "building",
    "car",
    "person",
    "lamp_post",
    "bench",
    "crystal",
    "portal",
];

pub fn decompose(object: &str) -> Decomposition {
    use PrimitiveKind::*;

    let (primary, secondary, details): (Form, Vec<(Form, Attach)>, Vec<&'static str>) = match object
    {
        "tall_tree" => (
            form(Cylinder, "trunk", Dims::Round { radius: 0.3, height: 5.0 }, BARK),
            vec![(form(Sphere, "crown", Dims::Ball { radius: 2.0 }, LEAF), Attach::Top)],
            vec!["bark_texture", "leaves", "branches"],
        ),
        "small_tree" => (
            form(Cylinder, "trunk", Dims::Round { radius: 0.2, height: 2.5 }, BARK),
            vec![(form(Sphere, "foliage", Dims::Ball { radius: 1.2 }, LEAF), Attach::Top)],
            vec!["bark_texture", "leaf_particles"],
        ),
        "tree" => (
            form(Cylinder, "trunk", Dims::Round { radius: 0.3, height: 3.0 }, BARK),
            vec![(
                form(Cone, "foliage", Dims::Round { radius: 1.5, height: 2.0 }, LEAF),
                Attach::Top,
            )],
            vec!["bark_texture"],
        ),
        "bush" => (
            form(Sphere, "foliage", Dims::Ball { radius: 0.8 }, LEAF),
            vec![],
            vec!["leaf_texture"],
        ),
        "rock" => (
            form(Sphere, "base", Dims::Ball { radius: 0.5 }, STONE),
            vec![],
            vec!["rock_texture", "displacement"],
        ),
        "grass" => (
            form(Plane, "blade", Dims::Flat { size: 0.1 }, LEAF),
            vec![],
            vec!["transparency", "wind_motion"],
        ),
        "mushroom" => (
            form(Cylinder, "stem", Dims::Round { radius: 0.05, height: 0.3 }, [0.9, 0.88, 0.8]),
            vec![(
                form(Sphere, "cap", Dims::Ball { radius: 0.2 }, [0.8, 0.1, 0.1]),
                Attach::Top,
            )],
            vec!["spots", "glow"],
        ),
        "building" => (
            form(
                Cube,
                "main",
                Dims::Box { width: 2.0, depth: 2.0, height: 4.0 },
                CONCRETE,
            ),
            vec![(
                form(Cube, "door", Dims::Box { width: 0.6, depth: 2.1, height: 1.2 }, WOOD),
                Attach::Base,
            )],
            vec!["glass", "reflection"],
        ),
        "car" => (
            form(Cube, "body", Dims::Box { width: 1.5, depth: 0.8, height: 0.5 }, [0.7, 0.1, 0.1]),
            vec![(
                form(Cylinder, "wheel", Dims::Round { radius: 0.2, height: 0.4 }, METAL),
                Attach::Sides,
            )],
            vec!["metal", "glass"],
        ),
        "person" => (
            form(Cylinder, "body", Dims::Round { radius: 0.2, height: 1.7 }, [0.2, 0.3, 0.6]),
            vec![(form(Sphere, "head", Dims::Ball { radius: 0.15 }, SKIN), Attach::Top)],
            vec!["clothing", "face"],
        ),
        "lamp_post" => (
            form(Cylinder, "pole", Dims::Round { radius: 0.1, height: 3.0 }, METAL),
            vec![(
                form(Sphere, "lamp", Dims::Ball { radius: 0.25 }, [1.0, 0.95, 0.7]),
                Attach::Top,
            )],
            vec!["emission"],
        ),
        "bench" => (
            form(Cube, "seat", Dims::Box { width: 1.5, depth: 0.5, height: 0.1 }, WOOD),
            vec![(
                form(Cube, "leg", Dims::Box { width: 0.1, depth: 0.5, height: 0.45 }, METAL),
                Attach::Sides,
            )],
            vec!["wood_grain"],
        ),
        "crystal" => (
            form(Cone, "shard", Dims::Round { radius: 0.3, height: 1.2 }, [0.6, 0.4, 0.9]),
            vec![],
            vec!["refraction", "glow"],
        ),
        "portal" => (
            form(Cylinder, "ring", Dims::Round { radius: 1.2, height: 0.2 }, [0.3, 0.1, 0.6]),
            vec![(form(Plane, "surface", Dims::Flat { size: 1.0 }, GLASS), Attach::Base)],
            vec!["swirl", "emission"],
        ),
        _ => (
            form(Cube, "body", Dims::Box { width: 1.0, depth: 1.0, height: 1.0 }, [0.8, 0.8, 0.8]),
            vec![],
            vec!["basic_texture"],
        ),
    };

    Decomposition {
        object: object.to_string(),
        primary,
        secondary,
        details,
    }
}

/// Known objects mentioned in `prompt`, in order of first mention.
///
/// Multi-word names match with spaces, underscores or hyphens, and a
/// trailing plural `s` is ignored.
pub fn identify_objects(prompt: &str) -> Vec<String> {
    let words: Vec<String> = prompt
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect();

    let singular = |w: &str| -> String {
        match w.strip_suffix('s') {
            Some(stem) if !stem.is_empty() && KNOWN_OBJECTS.iter().any(|k| k.ends_with(stem)) => {
                stem.to_string()
            }
            _ => w.to_string(),
        }
    };

    let mut found = Vec::new();
    let mut i = 0;
    while i < words.len() {
        // Two-word names first so "tall tree" is not read as "tree"
        if i + 1 < words.len() {
            let pair = format!("{}_{}", words[i], singular(&words[i + 1]));
            if KNOWN_OBJECTS.contains(&pair.as_str()) {
                found.push(pair);
                i += 2;
                continue;
            }
        }
        let word = singular(&words[i]);
        if KNOWN_OBJECTS.contains(&word.as_str()) {
            found.push(word);
        }
        i += 1;
    }
    found
}
