//! Offline "Dreamer" mode.
//!
//! Produces a randomized scene outline (a [`Vision`]) from a prompt
//! without calling the model: mood words, an atmosphere, a composition and
//! dream effects drawn at random, plus a primitive breakdown for every
//! known object the prompt mentions. Objects are laid out following the
//! fixed relationships in [`RELATIONSHIPS`].

mod composition;
mod decompose;

pub use composition::{
    Atmosphere, Composition, DreamEffects, FocalPoint, Layer, Lighting, RELATIONSHIPS,
    Relationship, arrange,
};
pub use decompose::{Attach, Decomposition, Dims, Form, KNOWN_OBJECTS, decompose, identify_objects};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::command::{Command, CompositeObject};
use crate::scene::Vec3;

const EMOTIONS: &[&str] = &[
    "joy", "melancholy", "rage", "serenity", "wonder", "dread", "love", "longing",
];
const TONES: &[&str] = &["hopeful", "tragic", "mysterious", "whimsical", "dark", "light"];
const FORMS: &[&str] = &["organic", "geometric", "fluid", "rigid", "amorphous", "crystalline"];
const MOODS: &[&str] = &["dreamy", "nightmarish", "peaceful", "chaotic", "serene", "turbulent"];
const SETTINGS: &[&str] = &["void", "cosmos", "abyss", "heaven", "twilight", "liminal"];

/// Objects in a vision are spread over this half-width.
const VISION_EXTENT: f32 = 6.0;

#[derive(Debug, Error, PartialEq)]
pub enum DreamerError {
    #[error("Dreamer needs a non-empty prompt")]
    EmptyPrompt,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub emotion: &'static str,
    /// 0.3 to 1.0
    pub intensity: f32,
    pub tone: &'static str,
    pub form: &'static str,
    pub mood: &'static str,
    pub setting: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisionObject {
    pub decomposition: Decomposition,
    pub location: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vision {
    pub prompt: String,
    pub insights: Insights,
    pub atmosphere: Atmosphere,
    pub composition: Composition,
    pub effects: DreamEffects,
    pub objects: Vec<VisionObject>,
}

fn pick(options: &'static [&'static str]) -> &'static str {
    let idx = (rand::random::<u64>() % options.len() as u64) as usize;
    options[idx]
}

fn title_case(object: &str) -> String {
    object
        .split('_')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("")
}

#[derive(Debug, Default)]
pub struct Dreamer;

impl Dreamer {
    pub fn new() -> Self {
        Self
    }

    pub fn process_request(&self, prompt: &str) -> Result<Vision, DreamerError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(DreamerError::EmptyPrompt);
        }

        let insights = Insights {
            emotion: pick(EMOTIONS),
            intensity: 0.3 + rand::random::<f32>() * 0.7,
            tone: pick(TONES),
            form: pick(FORMS),
            mood: pick(MOODS),
            setting: pick(SETTINGS),
        };

        let names = identify_objects(prompt);
        let objects = names
            .iter()
            .zip(arrange(&names, VISION_EXTENT))
            .map(|(name, location)| VisionObject {
                decomposition: decompose(name),
                location,
            })
            .collect::<Vec<_>>();

        let composition = Composition::random();
        debug!(
            "Dreamer vision: tone={}, form={}, pattern={}, {} object(s)",
            insights.tone,
            insights.form,
            composition.pattern,
            objects.len()
        );

        Ok(Vision {
            prompt: prompt.to_string(),
            insights,
            atmosphere: Atmosphere::random(),
            composition,
            effects: DreamEffects::random(),
            objects,
        })
    }

    /// One composite command per object. `is_taken` reports names already
    /// used in the target scene; colliding names get a numeric suffix.
    pub fn vision_to_commands<F>(&self, vision: &Vision, is_taken: F) -> Vec<Command>
    where
        F: Fn(&str) -> bool,
    {
        let mut used: Vec<String> = Vec::new();
        vision
            .objects
            .iter()
            .map(|obj| {
                let base = title_case(&obj.decomposition.object);
                let mut name = base.clone();
                let mut n = 2;
                let clashes = |candidate: &str, used: &[String]| {
                    used.iter().any(|u| u == candidate)
                        || obj
                            .decomposition
                            .parts()
                            .iter()
                            .filter_map(|p| p.name.as_deref())
                            .any(|part| is_taken(&format!("{}_{}", candidate, part)))
                };
                while clashes(&name, &used) {
                    name = format!("{}{}", base, n);
                    n += 1;
                }
                used.push(name.clone());

                Command::CreateCompositeObject(CompositeObject {
                    name,
                    location: Some(obj.location),
                    parts: obj.decomposition.parts(),
                })
            })
            .collect()
    }
}

impl Vision {
    /// Chat-ready description of the vision.
    pub fn describe(&self) -> String {
        let i = &self.insights;
        let mut text = format!(
            "I dream of a {} {} scene set in a {}: {}, full of {} (intensity {:.1}).",
            i.tone, i.form, i.setting, i.mood, i.emotion, i.intensity
        );

        let a = &self.atmosphere;
        let c = &self.composition;
        text.push_str(&format!(
            "\nIt is {} under {} {} ({:.0}K), the air {}. A {} {} layout with {} symmetry \
             and {} depth.",
            a.time_of_day,
            if a.lighting.intensity > 0.65 { "bright" } else { "dim" },
            a.lighting.kind,
            a.lighting.color_temperature,
            a.weather,
            c.density,
            c.pattern,
            c.symmetry,
            c.depth
        ));
        if let Some(ref focal) = c.focal_point {
            text.push_str(&format!(
                " Everything turns toward a {} at ({:.1}, {:.1}, {:.1}).",
                focal.kind.replace('_', " "),
                focal.position[0],
                focal.position[1],
                focal.position[2]
            ));
        }
        let e = &self.effects;
        text.push_str(&format!(
            "\nGravity is {}, time flows {}, reality bends by {:.0}%.",
            e.gravity,
            e.time_flow,
            e.reality_distortion * 100.0
        ));

        if self.objects.is_empty() {
            text.push_str(
                "\nNothing I recognize to build yet; \
                 try naming trees, rocks, mushrooms and the like.",
            );
            return text;
        }

        for obj in &self.objects {
            let d = &obj.decomposition;
            let secondary: Vec<String> = d
                .secondary
                .iter()
                .map(|(f, _)| format!("{} {}", f.kind, f.name))
                .collect();
            text.push_str(&format!(
                "\n- {}: {} {}",
                d.object.replace('_', " "),
                d.primary.kind,
                d.primary.name
            ));
            if !secondary.is_empty() {
                text.push_str(&format!(" with {}", secondary.join(", ")));
            }
            if !d.details.is_empty() {
                text.push_str(&format!(" ({})", d.details.join(", ")));
            }
            if let Some(layer) = self.composition.layer_of(&d.object) {
                text.push_str(&format!(", {} layer", layer.name));
            }
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_prompt() {
        assert_eq!(
            Dreamer::new().process_request("   ").unwrap_err(),
            DreamerError::EmptyPrompt
        );
    }

    #[test]
    fn insights_come_from_the_word_lists() {
        let vision = Dreamer::new().process_request("a forest").unwrap();
        let i = &vision.insights;
        assert!(TONES.contains(&i.tone));
        assert!(FORMS.contains(&i.form));
        assert!(MOODS.contains(&i.mood));
        assert!((0.3..=1.0).contains(&i.intensity));
        assert!(vision.objects.is_empty());
        assert!(vision.describe().contains("Nothing I recognize"));
    }

    #[test]
    fn vision_carries_layout_and_effects() {
        let vision = Dreamer::new()
            .process_request("mushrooms under a tall tree")
            .unwrap();
        assert_eq!(vision.objects.len(), 2);
        assert!((0.0..=0.8).contains(&vision.effects.reality_distortion));

        let mushroom = vision.objects[0].location;
        let tree = vision.objects[1].location;
        let gap = ((mushroom[0] - tree[0]).powi(2) + (mushroom[1] - tree[1]).powi(2)).sqrt();
        assert!(gap <= 0.8 + 1e-4, "mushroom {} away from the tree", gap);

        let text = vision.describe();
        assert!(text.contains(vision.composition.pattern), "{}", text);
        assert!(text.contains(vision.atmosphere.time_of_day), "{}", text);
        assert!(text.contains(&format!("Gravity is {}", vision.effects.gravity)), "{}", text);
        assert!(text.contains("(spots, glow), ground layer"), "{}", text);
    }

    #[test]
    fn vision_becomes_composite_commands() {
        let dreamer = Dreamer::new();
        let vision = dreamer
            .process_request("a tree next to a mushroom and another tree")
            .unwrap();
        assert_eq!(vision.objects.len(), 3);

        let commands = dreamer.vision_to_commands(&vision, |_| false);
        let names: Vec<String> = commands
            .iter()
            .map(|c| match c {
                Command::CreateCompositeObject(c) => c.name.clone(),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(names, vec!["Tree", "Mushroom", "Tree2"]);

        let text = vision.describe();
        assert!(text.contains("- tree: CYLINDER trunk with CONE foliage"), "{}", text);
    }

    #[test]
    fn avoids_names_taken_in_the_scene() {
        let dreamer = Dreamer::new();
        let vision = dreamer.process_request("a rock").unwrap();
        let commands = dreamer.vision_to_commands(&vision, |name| name == "Rock_base");
        match &commands[0] {
            Command::CreateCompositeObject(c) => assert_eq!(c.name, "Rock2"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn title_cases_object_names() {
        assert_eq!(title_case("lamp_post"), "LampPost");
        assert_eq!(title_case("rock"), "Rock");
    }
}
