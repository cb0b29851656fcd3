//! World object graph: who owns, carries, runs or references what.
//!
//! Objects are keyed by lower-cased id in a single [`ObjectRegistry`]. Edges
//! are weighted with how many copies an owner holds, so [`QuestObject::total`]
//! can estimate how many instances of an object exist in the world.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use variantly::Variantly;

use questgraph_data::{ActorRecord, CellRecord, LeveledListRecord};
use questgraph_script::{PLAYER, RequirementKind, ScriptTree};

use crate::quest::{HitOrigin, Quest};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Variantly)]
#[serde(rename_all = "camelCase")]
pub enum ObjectKind {
    #[default]
    Object,
    Owner,
    Dialogue,
    Script,
    Local,
}

/// Accumulated weight of one `contains` edge.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeWeight {
    /// Raw number of copies.
    pub count: u32,
    /// Copies weighted by their chance of being present.
    pub normalized: f64,
    /// Highest chance seen for this edge.
    pub chance: f64,
}

impl EdgeWeight {
    fn add(&mut self, count: u32, chance: f64) {
        self.count += count;
        self.normalized += f64::from(count) * chance;
        self.chance = self.chance.max(chance);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestObject {
    pub id: String,
    pub kind: ObjectKind,
    /// `(quest, stage index)` pairs whose requirements mention this object.
    pub involved: BTreeSet<(String, i32)>,
    /// Quests this object is a giver for.
    pub starts: BTreeSet<String>,
    pub contains: BTreeMap<String, EdgeWeight>,
    pub linked_from: BTreeMap<String, EdgeWeight>,
    /// Number of placed references in the world.
    pub positions: u32,
    /// Estimated number of instances, placed or carried.
    pub total: f64,
}

/// Every known object, keyed by lower-cased id.
#[derive(Debug, Clone, Default)]
pub struct ObjectRegistry {
    objects: BTreeMap<String, QuestObject>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` or update its kind.
    ///
    /// A generic [`ObjectKind::Object`] registration only replaces `Owner`;
    /// every other kind replaces whatever was there.
    pub fn register(&mut self, id: &str, kind: ObjectKind) -> &mut QuestObject {
        let key = id.to_ascii_lowercase();
        let object = self.objects.entry(key.clone()).or_insert_with(|| QuestObject {
            id: key,
            kind,
            ..QuestObject::default()
        });
        match kind {
            ObjectKind::Object if object.kind.is_owner() => object.kind = ObjectKind::Object,
            ObjectKind::Object => {},
            other => object.kind = other,
        }
        object
    }

    fn entry(&mut self, id: &str) -> &mut QuestObject {
        let key = id.to_ascii_lowercase();
        self.objects.entry(key.clone()).or_insert_with(|| QuestObject {
            id: key,
            ..QuestObject::default()
        })
    }

    pub fn involve(&mut self, id: &str, quest: &str, index: i32) {
        self.entry(id).involved.insert((quest.to_ascii_lowercase(), index));
    }

    pub fn mark_giver(&mut self, id: &str, quest: &str) {
        self.entry(id).starts.insert(quest.to_ascii_lowercase());
    }

    /// Add `count` copies of `target` to `owner`, each present with `chance`.
    ///
    /// Both ends are created as generic objects if unknown.
    pub fn link(&mut self, owner: &str, target: &str, count: u32, chance: f64) {
        let owner_key = owner.to_ascii_lowercase();
        let target_key = target.to_ascii_lowercase();
        self.entry(&owner_key)
            .contains
            .entry(target_key.clone())
            .or_default()
            .add(count, chance);
        self.entry(&target_key)
            .linked_from
            .entry(owner_key)
            .or_default()
            .add(count, chance);
    }

    /// Count `count` more placed references of `id`, without touching its kind.
    pub fn add_positions(&mut self, id: &str, count: u32) {
        self.entry(id).positions += count;
    }

    /// One-hop instance estimate: own placements plus what placed owners carry.
    pub fn compute_totals(&mut self) {
        let totals: Vec<(String, f64)> = self
            .objects
            .values()
            .map(|object| {
                let carried: f64 = object
                    .linked_from
                    .iter()
                    .filter_map(|(source, weight)| {
                        let source = self.objects.get(source)?;
                        (source.kind.is_owner() || source.kind.is_object())
                            .then(|| f64::from(source.positions) * weight.normalized)
                    })
                    .sum();
                (object.id.clone(), f64::from(object.positions) + carried)
            })
            .collect();
        for (id, total) in totals {
            if let Some(object) = self.objects.get_mut(&id) {
                object.total = total;
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&QuestObject> {
        self.objects.get(&id.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn into_objects(self) -> BTreeMap<String, QuestObject> {
        self.objects
    }
}

/// Expands leveled lists into their flat member sets.
#[derive(Debug, Clone, Default)]
pub struct LeveledLists {
    lists: BTreeMap<String, Vec<String>>,
    flattened: BTreeMap<String, BTreeSet<String>>,
}

impl LeveledLists {
    pub fn new(records: &[LeveledListRecord]) -> Self {
        Self {
            lists: records
                .iter()
                .map(|r| {
                    let members = r.members.iter().map(|m| m.to_ascii_lowercase()).collect();
                    (r.id.to_ascii_lowercase(), members)
                })
                .collect(),
            flattened: BTreeMap::new(),
        }
    }

    pub fn is_list(&self, id: &str) -> bool {
        self.lists.contains_key(&id.to_ascii_lowercase())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.lists.keys().map(String::as_str)
    }

    /// Non-list members reachable from `id`; `id` itself when it isn't a list.
    ///
    /// Each result is the complete reachable set, so only finished results are
    /// memoised. Lists already on the walk are skipped, which ends cycles.
    pub fn flatten(&mut self, id: &str) -> BTreeSet<String> {
        let key = id.to_ascii_lowercase();
        if let Some(done) = self.flattened.get(&key) {
            return done.clone();
        }
        if !self.lists.contains_key(&key) {
            return BTreeSet::from([key]);
        }
        let mut flat = BTreeSet::new();
        let mut walked = BTreeSet::from([key.clone()]);
        let mut pending = vec![key.clone()];
        while let Some(list) = pending.pop() {
            for member in self.lists.get(&list).into_iter().flatten() {
                if let Some(done) = self.flattened.get(member) {
                    flat.extend(done.iter().cloned());
                } else if self.lists.contains_key(member) {
                    if walked.insert(member.clone()) {
                        pending.push(member.clone());
                    }
                } else {
                    flat.insert(member.clone());
                }
            }
        }
        self.flattened.insert(key, flat.clone());
        flat
    }
}

/// Fills an [`ObjectRegistry`] from quests, scripts and world records.
#[derive(Debug, Clone)]
pub struct ObjectGraphBuilder {
    registry: ObjectRegistry,
    leveled: LeveledLists,
    player: String,
}

impl ObjectGraphBuilder {
    pub fn new(leveled: &[LeveledListRecord]) -> Self {
        Self {
            registry: ObjectRegistry::new(),
            leveled: LeveledLists::new(leveled),
            player: PLAYER.to_string(),
        }
    }

    #[must_use]
    pub fn with_player(mut self, player: &str) -> Self {
        self.player = player.to_ascii_lowercase();
        self
    }

    fn is_player(&self, id: &str) -> bool {
        id.eq_ignore_ascii_case(&self.player)
    }

    /// Objects, actors, items and scripts mentioned by stage requirements.
    pub fn add_quests<'q>(&mut self, quests: impl IntoIterator<Item = &'q Quest>) {
        for quest in quests {
            for stage in quest.stages.values() {
                for origin in &stage.origins {
                    if let HitOrigin::Script(script) = origin {
                        self.registry.register(script, ObjectKind::Script);
                        self.registry.involve(script, &quest.id, stage.index);
                    }
                }
                for requirement in stage.branches.iter().flat_map(|b| b.iter()) {
                    if let Some(object) = requirement.object_reference()
                        && !self.is_player(object)
                    {
                        let kind = if requirement.kind == RequirementKind::Actor {
                            ObjectKind::Dialogue
                        } else {
                            ObjectKind::Object
                        };
                        self.registry.register(object, kind);
                        self.registry.involve(object, &quest.id, stage.index);
                    }
                    if matches!(requirement.kind, RequirementKind::Item | RequirementKind::ActorItem)
                        && let Some(item) = &requirement.variable
                    {
                        self.registry.register(item, ObjectKind::Object);
                        self.registry.involve(item, &quest.id, stage.index);
                    }
                    if requirement.kind == RequirementKind::LocalVariable
                        && let (Some(script), Some(variable)) = (&requirement.script, &requirement.variable)
                    {
                        let id = format!("{script}.{variable}");
                        self.registry.register(&id, ObjectKind::Local);
                        self.registry.involve(&id, &quest.id, stage.index);
                    }
                }
            }
            for giver in &quest.givers {
                self.registry.mark_giver(giver, &quest.id);
            }
        }
    }

    /// Leveled lists own their flattened members, one copy each.
    pub fn add_leveled_lists(&mut self) {
        let ids: Vec<String> = self.leveled.ids().map(str::to_string).collect();
        for id in ids {
            self.registry.register(&id, ObjectKind::Owner);
            for member in self.leveled.flatten(&id) {
                self.registry.link(&id, &member, 1, 1.0);
            }
        }
    }

    /// Actors own their inventory and are linked to the script they run.
    ///
    /// Inventory leveled lists are expanded to one copy of each distinct member.
    pub fn add_actors(&mut self, actors: &[ActorRecord]) {
        for actor in actors {
            self.registry.register(&actor.id, ObjectKind::Owner);
            if let Some(script) = &actor.script {
                self.registry.register(script, ObjectKind::Script);
                self.registry.link(&actor.id, script, 1, 1.0);
            }
            for (item, count) in &actor.inventory {
                if self.leveled.is_list(item) {
                    for member in self.leveled.flatten(item) {
                        self.registry.link(&actor.id, &member, 1, 1.0);
                    }
                } else {
                    self.registry.register(item, ObjectKind::Object);
                    self.registry.link(&actor.id, item, count.unsigned_abs(), 1.0);
                }
            }
        }
    }

    /// Script locals, keyed `script.variable`.
    pub fn add_scripts<'t>(&mut self, trees: impl IntoIterator<Item = &'t ScriptTree>) {
        for tree in trees {
            let Some(script) = tree.script() else {
                continue;
            };
            self.registry.register(script, ObjectKind::Script);
            for block in tree.blocks() {
                for local in block.locals.keys() {
                    let id = format!("{script}.{local}");
                    self.registry.register(&id, ObjectKind::Local);
                    self.registry.link(script, &id, 1, 1.0);
                }
            }
        }
    }

    /// Placed references; deleted ones are skipped.
    pub fn add_cells(&mut self, cells: &[CellRecord]) {
        for cell in cells {
            let mut placed = 0;
            for reference in cell.references.iter().filter(|r| !r.deleted) {
                self.registry.add_positions(&reference.object, 1);
                placed += 1;
            }
            debug!("cell '{}': {placed} references", cell.key());
        }
    }

    /// Compute totals and hand over the objects.
    pub fn finish(mut self) -> BTreeMap<String, QuestObject> {
        self.registry.compute_totals();
        info!("{} objects in the object graph", self.registry.len());
        self.registry.into_objects()
    }
}
