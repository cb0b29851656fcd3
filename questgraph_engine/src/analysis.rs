//! Runs every pass over a set of records in dependency order.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use questgraph_data::{DialogueKind, GameRecords};
use questgraph_script::{ConditionTranslator, ScriptTree};

use crate::config::AnalysisConfig;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::dialogue::info_requirements;
use crate::objects::{ObjectGraphBuilder, QuestObject};
use crate::quest::{HitOrigin, Quest, QuestGraphBuilder};

/// Everything one analysis run produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub quests: BTreeMap<String, Quest>,
    pub objects: BTreeMap<String, QuestObject>,
    pub diagnostics: Diagnostics,
}

/// Parse every script, keyed by lower-cased record id.
pub fn parse_scripts(records: &GameRecords, translator: &mut ConditionTranslator) -> BTreeMap<String, ScriptTree> {
    records
        .scripts
        .iter()
        .map(|script| (script.id.to_ascii_lowercase(), ScriptTree::parse(&script.text, translator)))
        .collect()
}

/// Copies of `originals` with `StartScript` targets inlined, and the number of grafts made.
///
/// Targets always come from the un-inlined trees, so `depth` bounds the nesting.
pub fn inline_scripts(originals: &BTreeMap<String, ScriptTree>, depth: usize) -> (BTreeMap<String, ScriptTree>, usize) {
    let mut trees = originals.clone();
    let grafts: usize = trees
        .values_mut()
        .map(|tree| tree.inline_start_scripts(|id| originals.get(id), depth))
        .sum();
    (trees, grafts)
}

fn check_script_references(
    records: &GameRecords,
    config: &AnalysisConfig,
    trees: &BTreeMap<String, ScriptTree>,
    diagnostics: &mut Diagnostics,
) {
    for actor in &records.actors {
        if let Some(script) = &actor.script
            && !trees.contains_key(&script.to_ascii_lowercase())
        {
            diagnostics.push(Diagnostic::MissingScript {
                script: script.to_ascii_lowercase(),
                referrer: format!("actor '{}'", actor.id),
            });
        }
    }
    for script in records.start_scripts.iter().chain(&config.start_scripts) {
        if !trees.contains_key(&script.to_ascii_lowercase()) {
            diagnostics.push(Diagnostic::MissingScript {
                script: script.to_ascii_lowercase(),
                referrer: "start scripts".to_string(),
            });
        }
    }
}

/// Build the quest graph and the object graph from `records`.
///
/// Never fails; anything that could not be understood is reported in
/// [`AnalysisOutput::diagnostics`].
pub fn analyze(records: &GameRecords, config: &AnalysisConfig) -> AnalysisOutput {
    let mut translator = ConditionTranslator::with_globals(&config.globals);
    let mut diagnostics = Diagnostics::new();

    let originals = parse_scripts(records, &mut translator);
    let (trees, inlined) = inline_scripts(&originals, config.inline_depth);
    info!("{} scripts parsed, {inlined} StartScript calls inlined", trees.len());
    check_script_references(records, config, &trees, &mut diagnostics);

    let mut quests = QuestGraphBuilder::new().with_player(&config.player_id);
    for topic in records.dialogues.iter().filter(|t| t.kind == DialogueKind::Journal) {
        quests.add_journal(topic);
    }

    let mut hits = 0;
    for (id, tree) in &trees {
        hits += quests.collect(tree, &HitOrigin::Script(id.clone()));
    }

    if config.dialogue_results {
        for topic in &records.dialogues {
            for info in &topic.infos {
                let Some(result) = info.result.as_deref().filter(|r| !r.trim().is_empty()) else {
                    continue;
                };
                let requirements = info_requirements(topic, info);
                let mut tree = ScriptTree::parse_dialogue(&info.id, result, requirements, &mut translator);
                tree.inline_start_scripts(|id| originals.get(id), config.inline_depth);
                let origin = HitOrigin::Dialogue {
                    topic: topic.id.to_ascii_lowercase(),
                    info: info.id.clone(),
                };
                hits += quests.collect(&tree, &origin);
            }
        }
    }
    debug!("{hits} journal updates attached to stages");

    let (quests, quest_diagnostics) = quests.build();
    diagnostics.extend(quest_diagnostics);
    for command in translator.unrecognized() {
        diagnostics.push(Diagnostic::UnrecognizedCommand {
            command: command.clone(),
        });
    }
    for text in translator.failed() {
        diagnostics.push(Diagnostic::UntranslatedCondition { text: text.clone() });
    }

    let mut objects = ObjectGraphBuilder::new(&records.leveled_lists).with_player(&config.player_id);
    objects.add_quests(quests.values());
    objects.add_leveled_lists();
    objects.add_actors(&records.actors);
    objects.add_scripts(originals.values());
    objects.add_cells(&records.cells);
    let objects = objects.finish();

    info!(
        "analysis finished: {} quests, {} objects, {} diagnostics",
        quests.len(),
        objects.len(),
        diagnostics.len()
    );
    AnalysisOutput {
        quests,
        objects,
        diagnostics,
    }
}
