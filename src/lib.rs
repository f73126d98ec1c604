//! SceneGPT - natural-language prompts in, validated 3D scene edits out
//!
//! This crate provides:
//! - Scene model, snapshots and collision-avoiding placement
//! - Command schema, validation and batch execution with undo checkpoints
//! - Model client with rate limiting, retries and tolerant reply parsing
//! - Offline "Dreamer" decomposition of prompts into composite objects
//! - Timer-driven iteration rounds and a persisted editing session

pub mod agent;
pub mod cli;
pub mod command;
pub mod concurrency;
pub mod config;
pub mod dreamer;
pub mod iteration;
pub mod paths;
pub mod scene;
pub mod session;

pub use config::Config;
