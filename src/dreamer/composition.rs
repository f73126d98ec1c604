//! Scene-wide layout for a vision: atmosphere, composition, dream effects
//! and the fixed spatial relationships between known objects.

use serde::Serialize;

use super::pick;
use crate::scene::Vec3;
use crate::scene::placement::random_position;

const TIMES_OF_DAY: &[&str] = &["dawn", "dusk", "night", "eternal twilight", "timeless void"];
const WEATHER: &[&str] = &["misty", "foggy", "crystal clear", "ethereal mist", "cosmic dust"];
const LIGHTING: &[&str] = &["moonlight", "starlight", "aurora", "bioluminescence", "ethereal glow"];
const PATTERNS: &[&str] = &["natural", "geometric", "spiral", "fractal", "random", "symmetrical"];
const DENSITIES: &[&str] = &["sparse", "medium", "dense"];
const CLUSTERING: &[&str] = &["natural", "geometric", "random"];
const SYMMETRIES: &[&str] = &["none", "radial", "bilateral", "fractal"];
const DEPTHS: &[&str] = &["infinite", "layered", "foggy", "crystal clear", "ethereal"];
const FOCAL_KINDS: &[&str] = &["portal", "crystal", "light_source", "void"];
const GRAVITY: &[&str] = &["normal", "reversed", "variable", "none"];
const TIME_FLOW: &[&str] = &["normal", "slow", "fast", "variable"];

fn between(low: f32, high: f32) -> f32 {
    low + rand::random::<f32>() * (high - low)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lighting {
    pub kind: &'static str,
    /// 0.3 to 1.0
    pub intensity: f32,
    /// Kelvin, 2000 to 10000
    pub color_temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Atmosphere {
    pub time_of_day: &'static str,
    pub weather: &'static str,
    pub lighting: Lighting,
}

impl Atmosphere {
    pub fn random() -> Self {
        Self {
            time_of_day: pick(TIMES_OF_DAY),
            weather: pick(WEATHER),
            lighting: Lighting {
                kind: pick(LIGHTING),
                intensity: between(0.3, 1.0),
                color_temperature: between(2000.0, 10000.0),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FocalPoint {
    pub kind: &'static str,
    pub position: Vec3,
    pub influence_radius: f32,
}

/// Horizontal band of the scene and the object kinds that belong in it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layer {
    pub name: &'static str,
    /// Height band; `low == high` for the ground plane
    pub low: f32,
    pub high: f32,
    #[serde(skip)]
    pub kinds: &'static [&'static str],
}

impl Layer {
    fn random_set() -> Vec<Layer> {
        let ground = between(-0.5, 0.5);
        vec![
            Layer {
                name: "ground",
                low: ground,
                high: ground,
                kinds: &["rock", "mushroom", "grass", "crystal", "portal"],
            },
            Layer {
                name: "mid",
                low: between(0.5, 2.0),
                high: between(2.0, 4.0),
                kinds: &["bush", "small_tree"],
            },
            Layer {
                name: "canopy",
                low: between(3.0, 6.0),
                high: between(6.0, 12.0),
                kinds: &["tree", "tall_tree"],
            },
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Composition {
    pub layers: Vec<Layer>,
    pub pattern: &'static str,
    pub density: &'static str,
    pub clustering: &'static str,
    pub symmetry: &'static str,
    pub depth: &'static str,
    pub focal_point: Option<FocalPoint>,
}

impl Composition {
    pub fn random() -> Self {
        let focal_point = rand::random::<bool>().then(|| FocalPoint {
            kind: pick(FOCAL_KINDS),
            position: [between(-5.0, 5.0), between(-5.0, 5.0), between(0.0, 5.0)],
            influence_radius: between(2.0, 8.0),
        });
        Self {
            layers: Layer::random_set(),
            pattern: pick(PATTERNS),
            density: pick(DENSITIES),
            clustering: pick(CLUSTERING),
            symmetry: pick(SYMMETRIES),
            depth: pick(DEPTHS),
            focal_point,
        }
    }

    /// Layer an object of kind `object` belongs to, if any.
    pub fn layer_of(&self, object: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.kinds.contains(&object))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DreamEffects {
    pub gravity: &'static str,
    pub time_flow: &'static str,
    /// 0.0 to 0.8
    pub reality_distortion: f32,
}

impl DreamEffects {
    pub fn random() -> Self {
        Self {
            gravity: pick(GRAVITY),
            time_flow: pick(TIME_FLOW),
            reality_distortion: between(0.0, 0.8),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Relationship {
    /// `object` stands within `max_distance` of the nearest `anchor`
    Near {
        object: &'static str,
        anchor: &'static str,
        max_distance: f32,
    },
    /// Groups of `min..=max` objects, `spacing` apart edge to edge
    Cluster {
        object: &'static str,
        min: usize,
        max: usize,
        spacing: f32,
    },
}

pub const RELATIONSHIPS: &[Relationship] = &[
    Relationship::Near {
        object: "mushroom",
        anchor: "tree",
        max_distance: 0.8,
    },
    Relationship::Cluster {
        object: "rock",
        min: 2,
        max: 5,
        spacing: 0.3,
    },
];

/// Rock base radius from the decomposition table.
const ROCK_RADIUS: f32 = 0.5;

/// Anchors match by suffix so "tall_tree" and "small_tree" count as trees.
fn is_kind(object: &str, kind: &str) -> bool {
    object == kind || object.ends_with(&format!("_{}", kind))
}

fn around(center: Vec3, low: f32, high: f32) -> Vec3 {
    let angle = rand::random::<f32>() * std::f32::consts::TAU;
    let distance = between(low, high);
    [
        center[0] + angle.cos() * distance,
        center[1] + angle.sin() * distance,
        0.0,
    ]
}

/// Ground positions for `objects`, in order.
///
/// Related objects are placed relative to each other; everything else goes
/// through free-spot sampling within `extent`. Anchors are placed first so
/// a mushroom named before its tree still ends up beside it.
pub fn arrange(objects: &[String], extent: f32) -> Vec<Vec3> {
    let mut locations: Vec<Option<Vec3>> = vec![None; objects.len()];
    let mut occupied: Vec<Vec3> = Vec::new();

    let related = |name: &str| {
        RELATIONSHIPS.iter().any(|r| match *r {
            Relationship::Near { object, .. } => object == name,
            Relationship::Cluster { object, min, .. } => {
                object == name && objects.iter().filter(|o| o.as_str() == object).count() >= min
            }
        })
    };

    for (i, name) in objects.iter().enumerate() {
        if !related(name) {
            let location = random_position(&occupied, extent).location;
            occupied.push(location);
            locations[i] = Some(location);
        }
    }

    for relationship in RELATIONSHIPS {
        match *relationship {
            Relationship::Near {
                object,
                anchor,
                max_distance,
            } => {
                let anchors: Vec<Vec3> = objects
                    .iter()
                    .zip(&locations)
                    .filter(|(o, _)| is_kind(o, anchor))
                    .filter_map(|(_, l)| *l)
                    .collect();
                for (i, name) in objects.iter().enumerate() {
                    if name.as_str() != object {
                        continue;
                    }
                    let location = if anchors.is_empty() {
                        random_position(&occupied, extent).location
                    } else {
                        let center = anchors[rand::random::<u64>() as usize % anchors.len()];
                        around(center, max_distance * 0.6, max_distance)
                    };
                    occupied.push(location);
                    locations[i] = Some(location);
                }
            }
            Relationship::Cluster {
                object,
                min,
                max,
                spacing,
            } => {
                let members: Vec<usize> = objects
                    .iter()
                    .enumerate()
                    .filter(|(_, o)| o.as_str() == object)
                    .map(|(i, _)| i)
                    .collect();
                if members.len() < min {
                    continue;
                }
                for group in members.chunks(max) {
                    let center = random_position(&occupied, extent).location;
                    occupied.push(center);
                    locations[group[0]] = Some(center);
                    let ring = ROCK_RADIUS * 2.0 + spacing;
                    for (k, &i) in group.iter().enumerate().skip(1) {
                        let angle = k as f32 / (group.len() - 1) as f32 * std::f32::consts::TAU;
                        let location = [
                            center[0] + angle.cos() * ring,
                            center[1] + angle.sin() * ring,
                            0.0,
                        ];
                        occupied.push(location);
                        locations[i] = Some(location);
                    }
                }
            }
        }
    }

    locations
        .into_iter()
        .map(|l| l.unwrap_or([0.0; 3]))
        .collect()
}
