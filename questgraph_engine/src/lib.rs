#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
//! Quest stage graphs and world object graphs built from decoded game records.

pub const QUESTGRAPH_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod analysis;
pub mod config;
pub mod diagnostics;
pub mod dialogue;
pub mod loader;
pub mod objects;
pub mod quest;

pub use analysis::{AnalysisOutput, analyze};
pub use config::{AnalysisConfig, load_config, try_load_config};
pub use diagnostics::{Diagnostic, Diagnostics};
pub use loader::{load_records, save_output};
pub use objects::{EdgeWeight, LeveledLists, ObjectGraphBuilder, ObjectKind, ObjectRegistry, QuestObject};
pub use quest::{HitOrigin, Quest, QuestGraphBuilder, QuestStage};
