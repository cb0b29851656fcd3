#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
//! Structural analysis of embedded game scripts.
//!
//! Script source is parsed into a control-flow tree whose blocks carry the
//! conditions needed to reach them. Conditions are translated into structured
//! [`Requirement`]s, journal and function calls can be located together with
//! the requirements in force at the call site, and the [`flow`] pass folds
//! single-assignment guard variables out of those requirement sets.

pub mod flow;
pub mod parse;
pub mod requirement;
pub mod search;
pub mod translate;
pub mod tree;

pub use flow::resolve_variables;
pub use requirement::{Operator, Requirement, RequirementKind, RequirementSet};
pub use search::{ArgPattern, CallPattern, CallSite, JournalCall};
pub use translate::{ConditionTranslator, Scope, TranslateError};
pub use tree::{BlockId, BlockType, ScriptBlock, ScriptTree, VariableAssignment, VariableScope, VariableType};

/// Identifier used for the player in scoped conditions.
pub const PLAYER: &str = "player";
