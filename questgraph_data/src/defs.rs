use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Record identifier as written by the decoder. Ids are compared case-insensitively downstream.
pub type Id = String;

/// Every record the analysis consumes, as produced by the binary decoder.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GameRecords {
    #[serde(default)]
    pub dialogues: Vec<DialogueTopic>,
    #[serde(default)]
    pub scripts: Vec<ScriptRecord>,
    #[serde(default)]
    pub actors: Vec<ActorRecord>,
    #[serde(default)]
    pub cells: Vec<CellRecord>,
    #[serde(default)]
    pub leveled_lists: Vec<LeveledListRecord>,
    /// Scripts the game runs globally from startup.
    #[serde(default)]
    pub start_scripts: Vec<Id>,
}

/// The flavour of a dialogue topic.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum DialogueKind {
    #[default]
    Topic,
    Voice,
    Greeting,
    Persuasion,
    Journal,
}

/// A dialogue topic and its responses. For `Journal` topics the id is the quest id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueTopic {
    pub id: Id,
    #[serde(default)]
    pub kind: DialogueKind,
    #[serde(default)]
    pub infos: Vec<DialogueInfo>,
}

/// Gender filter on a dialogue response.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Numeric value used by the game's `GetPCSex`-style comparisons.
    pub fn value(self) -> f64 {
        match self {
            Gender::Male => 0.0,
            Gender::Female => 1.0,
        }
    }
}

/// One response inside a dialogue topic, or one journal entry inside a quest.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DialogueInfo {
    pub id: Id,
    /// Journal index; only meaningful for journal topics.
    pub journal_index: Option<i32>,
    #[serde(default)]
    pub text: String,
    /// Result script text run when the response is chosen.
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub restart: bool,
    /// Marks the journal entry that carries the quest's display name.
    #[serde(default)]
    pub quest_name: bool,
    pub actor: Option<Id>,
    pub race: Option<Id>,
    pub class: Option<Id>,
    pub faction: Option<Id>,
    pub rank: Option<i32>,
    pub cell: Option<String>,
    pub pc_faction: Option<Id>,
    pub pc_rank: Option<i32>,
    #[serde(default)]
    pub disposition: i32,
    pub gender: Option<Gender>,
    #[serde(default)]
    pub conditions: Vec<DialogueCondition>,
}

/// What a dialogue condition descriptor compares against.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DialogueConditionKind {
    Function,
    Global,
    Local,
    Journal,
    Item,
    Dead,
    NotId,
    NotFaction,
    NotClass,
    NotRace,
    NotCell,
    NotLocal,
}

/// Raw comparison operator code (`0` = equal through `5` = less-or-equal).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOperator {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

/// A raw condition-variable descriptor from a dialogue response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueCondition {
    pub kind: DialogueConditionKind,
    pub operator: ConditionOperator,
    /// Function name, variable name or record id, depending on `kind`.
    pub name: String,
    #[serde(default)]
    pub value: f64,
}

/// Script source, already stripped of line comments by the decoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptRecord {
    pub id: Id,
    #[serde(default)]
    pub text: String,
}

/// Which record type an actor-like record came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ActorKind {
    #[default]
    Npc,
    Creature,
    Container,
}

/// An NPC, creature or container.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ActorRecord {
    pub id: Id,
    #[serde(default)]
    pub kind: ActorKind,
    pub script: Option<Id>,
    /// Carried item id -> count.
    #[serde(default)]
    pub inventory: BTreeMap<Id, i32>,
}

/// A reference placed in a cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellReference {
    pub object: Id,
    #[serde(default)]
    pub deleted: bool,
}

/// A cell: interior cells are keyed by name, exterior cells by grid.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CellRecord {
    #[serde(default)]
    pub name: String,
    pub grid: Option<(i32, i32)>,
    #[serde(default)]
    pub references: Vec<CellReference>,
}

impl CellRecord {
    /// Unique key for the cell: its name, or its grid coordinates for unnamed exteriors.
    pub fn key(&self) -> String {
        match (self.name.is_empty(), self.grid) {
            (false, _) | (true, None) => self.name.clone(),
            (true, Some((x, y))) => format!("{x},{y}"),
        }
    }
}

/// Leveled list flavour.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum LeveledKind {
    #[default]
    Item,
    Creature,
}

/// A leveled item or creature list.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LeveledListRecord {
    pub id: Id,
    #[serde(default)]
    pub kind: LeveledKind,
    #[serde(default)]
    pub members: Vec<Id>,
}
