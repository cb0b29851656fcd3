//! Quest stages, their reachability conditions and the stage transition graph.
//!
//! Building is two-pass. First every journal entry becomes a stage and every
//! journal update found in scripts or dialogue results is attached to its
//! stage as one OR-branch of requirements. Only once all branches are known
//! are transitions inferred, since both linking rules look at other stages.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use questgraph_data::{DialogueKind, DialogueTopic};
use questgraph_script::{Operator, PLAYER, RequirementKind, RequirementSet, ScriptTree, resolve_variables};

use crate::diagnostics::{Diagnostic, Diagnostics};

/// Where a journal update was found.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HitOrigin {
    Script(String),
    Dialogue { topic: String, info: String },
}

impl fmt::Display for HitOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Script(id) => write!(f, "script '{id}'"),
            Self::Dialogue { topic, info } => write!(f, "dialogue '{topic}' response {info}"),
        }
    }
}

/// One journal index of one quest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestStage {
    pub quest: String,
    pub index: i32,
    pub text: String,
    pub finished: bool,
    pub restart: bool,
    /// Independently sufficient requirement groups; the stage is reachable
    /// when every requirement of any one group holds.
    pub branches: Vec<RequirementSet>,
    /// Origin of each branch, parallel to `branches`.
    pub origins: Vec<HitOrigin>,
    /// Indexes of the stages that can follow this one.
    pub next: BTreeSet<i32>,
}

impl QuestStage {
    fn new(quest: &str, index: i32) -> Self {
        Self {
            quest: quest.to_string(),
            index,
            text: String::new(),
            finished: false,
            restart: false,
            branches: Vec::new(),
            origins: Vec::new(),
            next: BTreeSet::new(),
        }
    }

    /// Add a branch unless an identical one is already recorded.
    pub fn add_branch(&mut self, requirements: RequirementSet, origin: HitOrigin) -> bool {
        if self
            .branches
            .iter()
            .any(|b| b.as_slice() == requirements.as_slice())
        {
            return false;
        }
        self.branches.push(requirements);
        self.origins.push(origin);
        true
    }

    /// True when some branch depends on an earlier dialogue choice.
    pub fn has_choice(&self) -> bool {
        self.branches
            .iter()
            .flat_map(|b| b.iter())
            .any(|r| r.kind == RequirementKind::Choice)
    }

    /// True when some branch requires `quest` to have reached journal `index`,
    /// either exactly (`==`) or as a lower bound (`>=`).
    fn requires_index(&self, quest: &str, index: i32) -> bool {
        self.branches.iter().flat_map(|b| b.iter()).any(|r| {
            r.kind == RequirementKind::Journal
                && matches!(r.operator, Operator::Equal | Operator::GreaterOrEqual)
                && r.variable.as_deref().is_some_and(|v| v.eq_ignore_ascii_case(quest))
                && r.value == Some(f64::from(index))
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub id: String,
    pub name: Option<String>,
    pub stages: BTreeMap<i32, QuestStage>,
    /// Objects that can start the quest; only filled for quests with two or more stages.
    pub givers: BTreeSet<String>,
}

impl Quest {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    /// The stage with the lowest index.
    pub fn first_stage(&self) -> Option<&QuestStage> {
        self.stages.values().next()
    }

    fn link_stages(&mut self) {
        let indexes: Vec<i32> = self.stages.keys().copied().collect();
        let mut edges: Vec<(i32, i32)> = Vec::new();

        for (position, &index) in indexes.iter().enumerate() {
            // a choice-gated stage continues from the nearest earlier stage that isn't itself choice-gated
            if self.stages[&index].has_choice()
                && let Some(&from) = indexes[..position]
                    .iter()
                    .rev()
                    .find(|i| !self.stages[*i].has_choice())
            {
                edges.push((from, index));
            }
            for &later in &indexes[position + 1..] {
                if self.stages[&later].requires_index(&self.id, index) {
                    edges.push((index, later));
                }
            }
        }

        for (from, to) in edges {
            if let Some(stage) = self.stages.get_mut(&from) {
                stage.next.insert(to);
            }
        }
    }

    fn infer_givers(&mut self, player: &str) {
        if self.stages.len() < 2 {
            return;
        }
        let Some(first) = self.first_stage() else {
            return;
        };
        let givers: BTreeSet<String> = first
            .branches
            .iter()
            .flat_map(|b| b.iter())
            .filter_map(|r| r.object_reference())
            .filter(|o| !o.eq_ignore_ascii_case(player))
            .map(str::to_ascii_lowercase)
            .collect();
        self.givers = givers;
    }
}

/// Assembles quests from journal topics and journal-update hits.
#[derive(Debug, Clone)]
pub struct QuestGraphBuilder {
    quests: BTreeMap<String, Quest>,
    diagnostics: Diagnostics,
    player: String,
}

impl Default for QuestGraphBuilder {
    fn default() -> Self {
        Self {
            quests: BTreeMap::new(),
            diagnostics: Diagnostics::new(),
            player: PLAYER.to_string(),
        }
    }
}

impl QuestGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `player` as the player's object id when inferring givers.
    #[must_use]
    pub fn with_player(mut self, player: &str) -> Self {
        self.player = player.to_ascii_lowercase();
        self
    }

    /// Register the stages of a journal topic. Other topic kinds are ignored.
    ///
    /// Returns the number of stages added.
    pub fn add_journal(&mut self, topic: &DialogueTopic) -> usize {
        if topic.kind != DialogueKind::Journal {
            return 0;
        }
        let id = topic.id.to_ascii_lowercase();
        let quest = self.quests.entry(id.clone()).or_insert_with(|| Quest::new(&id));
        let mut added = 0;
        for info in &topic.infos {
            if info.quest_name {
                quest.name = Some(info.text.clone());
                continue;
            }
            let Some(index) = info.journal_index else {
                debug!("journal entry {} of '{id}' has no index", info.id);
                continue;
            };
            let stage = quest.stages.entry(index).or_insert_with(|| {
                added += 1;
                QuestStage::new(&id, index)
            });
            stage.text.clone_from(&info.text);
            stage.finished = info.finished;
            stage.restart = info.restart;
        }
        added
    }

    /// Attach a resolved requirement set to stage `index` of `quest`.
    ///
    /// Hits for unknown quests or stages are dropped with a diagnostic.
    pub fn add_hit(&mut self, quest: &str, index: i32, requirements: RequirementSet, origin: HitOrigin) -> bool {
        let quest = quest.to_ascii_lowercase();
        let Some(stage) = self.quests.get_mut(&quest).and_then(|q| q.stages.get_mut(&index)) else {
            self.diagnostics.push(Diagnostic::MissingStage {
                quest,
                index,
                origin: origin.to_string(),
            });
            return false;
        };
        stage.add_branch(requirements, origin)
    }

    /// Attach every journal update in `tree` to its stage.
    ///
    /// Each call's path requirements go through the variable-flow pass first.
    /// Returns the number of branches added.
    pub fn collect(&mut self, tree: &ScriptTree, origin: &HitOrigin) -> usize {
        let mut added = 0;
        for call in tree.find_journal_calls() {
            let resolved = resolve_variables(&call.site.requirements, tree);
            debug!("{origin}: journal {} {} requires {resolved}", call.quest, call.index);
            if self.add_hit(&call.quest, call.index, resolved, origin.clone()) {
                added += 1;
            }
        }
        added
    }

    pub fn quest(&self, id: &str) -> Option<&Quest> {
        self.quests.get(&id.to_ascii_lowercase())
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Link stages, infer givers and hand over the finished quests.
    pub fn build(mut self) -> (BTreeMap<String, Quest>, Diagnostics) {
        let mut edges = 0;
        for quest in self.quests.values_mut() {
            quest.link_stages();
            quest.infer_givers(&self.player);
            edges += quest.stages.values().map(|s| s.next.len()).sum::<usize>();
        }
        info!("{} quests built with {edges} stage transitions", self.quests.len());
        (self.quests, self.diagnostics)
    }
}
