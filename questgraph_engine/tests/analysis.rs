use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use questgraph_data::{DialogueInfo, DialogueKind, DialogueTopic, GameRecords, LeveledListRecord, ScriptRecord};
use questgraph_engine::objects::LeveledLists;
use questgraph_engine::{
    AnalysisConfig, Diagnostic, HitOrigin, ObjectKind, QuestGraphBuilder, analyze, load_config, load_records,
    save_output, try_load_config,
};
use questgraph_script::{Operator, Requirement, RequirementKind, RequirementSet};

fn fixture() -> GameRecords {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/lost_ring.ron");
    load_records(&path).expect("load fixture records")
}

fn journal(id: &str, indexes: &[i32]) -> DialogueTopic {
    DialogueTopic {
        id: id.into(),
        kind: DialogueKind::Journal,
        infos: indexes
            .iter()
            .map(|i| DialogueInfo {
                id: format!("{id}-{i}"),
                journal_index: Some(*i),
                ..DialogueInfo::default()
            })
            .collect(),
    }
}

fn speaker(actor: &str) -> RequirementSet {
    [Requirement::new(RequirementKind::Actor, Operator::Equal).with_object(actor)]
        .into_iter()
        .collect()
}

#[test]
fn stage_links_follow_journal_requirements() {
    let mut builder = QuestGraphBuilder::new();
    builder.add_journal(&journal("q", &[0, 10, 20]));
    let at_ten: RequirementSet = [Requirement::new(RequirementKind::Journal, Operator::Equal)
        .with_variable("q")
        .with_object("player")
        .with_value(10.0)]
    .into_iter()
    .collect();
    builder.add_hit("q", 20, at_ten, HitOrigin::Script("s".into()));

    let (quests, diagnostics) = builder.build();
    assert!(diagnostics.is_empty());
    let stages = &quests["q"].stages;
    assert_eq!(stages[&10].next, BTreeSet::from([20]));
    assert!(stages[&0].next.is_empty());
    assert!(stages[&20].next.is_empty());
}

#[test]
fn single_stage_quests_have_no_givers() {
    let mut builder = QuestGraphBuilder::new();
    builder.add_journal(&journal("solo", &[10]));
    builder.add_journal(&journal("duo", &[10, 20]));
    builder.add_hit("solo", 10, speaker("fargoth"), HitOrigin::Script("s".into()));
    builder.add_hit("duo", 10, speaker("fargoth"), HitOrigin::Script("s".into()));
    builder.add_hit("duo", 20, speaker("caius"), HitOrigin::Script("s".into()));

    let (quests, _) = builder.build();
    assert!(quests["solo"].givers.is_empty());
    assert_eq!(quests["duo"].givers, BTreeSet::from(["fargoth".to_string()]));
}

#[test]
fn player_is_never_a_giver() {
    let mut builder = QuestGraphBuilder::new().with_player("PlayerSaveGame");
    builder.add_journal(&journal("q", &[10, 20]));
    builder.add_hit("q", 10, speaker("playersavegame"), HitOrigin::Script("s".into()));
    let (quests, _) = builder.build();
    assert!(quests["q"].givers.is_empty());
}

#[test]
fn leveled_list_cycles_terminate() {
    let mut lists = LeveledLists::new(&[
        LeveledListRecord {
            id: "a".into(),
            members: vec!["b".into(), "dagger".into()],
            ..LeveledListRecord::default()
        },
        LeveledListRecord {
            id: "b".into(),
            members: vec!["a".into(), "sword".into()],
            ..LeveledListRecord::default()
        },
        LeveledListRecord {
            id: "self".into(),
            members: vec!["self".into()],
            ..LeveledListRecord::default()
        },
    ]);
    let both = BTreeSet::from(["dagger".to_string(), "sword".to_string()]);
    assert_eq!(lists.flatten("a"), both);
    assert_eq!(lists.flatten("b"), both);
    assert!(lists.flatten("self").is_empty());
}

#[test]
fn fixture_quest_graph() {
    let output = analyze(&fixture(), &AnalysisConfig::default());
    let quest = &output.quests["ms_lostring"];
    assert_eq!(quest.name.as_deref(), Some("The Lost Ring"));
    assert_eq!(quest.stages.keys().copied().collect::<Vec<_>>(), vec![10, 50, 100]);
    assert!(quest.stages[&100].finished);

    let ten = &quest.stages[&10];
    assert_eq!(ten.branches.len(), 1);
    assert!(matches!(&ten.origins[0], HitOrigin::Dialogue { topic, info } if topic == "lost ring" && info == "t1"));
    assert_eq!(ten.next, BTreeSet::from([50]));

    let fifty = &quest.stages[&50];
    let kinds: Vec<RequirementKind> = fifty.branches[0].iter().map(|r| r.kind.clone()).collect();
    assert_eq!(kinds, vec![RequirementKind::Journal, RequirementKind::Activated]);

    assert_eq!(quest.givers, BTreeSet::from(["fargoth".to_string()]));
}

#[test]
fn fixture_diagnostics() {
    let output = analyze(&fixture(), &AnalysisConfig::default());
    assert!(output.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::MissingStage { quest, index: 999, .. } if quest == "ms_lostring"
    )));
    assert!(output.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::MissingScript { script, .. } if script == "fargothscript"
    )));
    assert_eq!(output.diagnostics.missing_references(), 2);
}

#[test]
fn fixture_object_graph() {
    let output = analyze(&fixture(), &AnalysisConfig::default());
    let objects = &output.objects;

    let fargoth = &objects["fargoth"];
    assert_eq!(fargoth.kind, ObjectKind::Owner);
    assert!(fargoth.starts.contains("ms_lostring"));
    assert!(fargoth.involved.contains(&("ms_lostring".to_string(), 10)));
    assert_eq!(fargoth.positions, 1);

    let ring = &objects["ring_lost_unique"];
    assert!(ring.involved.contains(&("ms_lostring".to_string(), 100)));
    assert!((ring.total - 1.0).abs() < f64::EPSILON);

    // 25 carried by fargoth, one from the chest's leveled loot
    assert!((objects["gold_001"].total - 26.0).abs() < f64::EPSILON);

    assert_eq!(objects["ringchestscript"].kind, ObjectKind::Script);
    assert_eq!(objects["ringchestscript.doonce"].kind, ObjectKind::Local);
    assert_eq!(objects["chest_ring"].positions, 1);
}

#[test]
fn dialogue_results_can_be_switched_off() {
    let config = AnalysisConfig {
        dialogue_results: false,
        ..AnalysisConfig::default()
    };
    let output = analyze(&fixture(), &config);
    let quest = &output.quests["ms_lostring"];
    assert!(quest.stages[&10].branches.is_empty());
    assert!(quest.givers.is_empty());
}

#[test]
fn config_round_trip_through_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("questgraph.toml");
    fs::write(&path, "inline_depth = 0\nplayer_id = \"PlayerRef\"\nstart_scripts = [\"Main\"]\n").unwrap();

    let config = try_load_config(&path).unwrap();
    assert_eq!(config.inline_depth, 0);
    assert_eq!(config.player_id, "PlayerRef");
    assert_eq!(config.start_scripts, vec!["Main".to_string()]);

    fs::write(&path, "inline_depth = \"lots\"").unwrap();
    assert!(try_load_config(&path).is_err());
    assert_eq!(load_config(&path), AnalysisConfig::default());
}

#[test]
fn output_is_written_as_ron() {
    let output = analyze(&fixture(), &AnalysisConfig::default());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.ron");
    save_output(&output, &path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let reloaded: questgraph_engine::AnalysisOutput = ron::from_str(&text).unwrap();
    assert_eq!(reloaded.quests, output.quests);
    assert_eq!(reloaded.objects, output.objects);
    assert_eq!(reloaded.diagnostics, output.diagnostics);
}

#[test]
fn unreadable_records_report_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.ron");
    fs::write(&path, "( dialogues: [ oops ] )").unwrap();
    let err = load_records(&path).unwrap_err();
    assert!(format!("{err:#}").contains("broken.ron"));
}

#[test]
fn surviving_locals_are_involved_in_their_stage() {
    let records = GameRecords {
        dialogues: vec![journal("q", &[10])],
        scripts: vec![ScriptRecord {
            id: "s".into(),
            text: "begin s\nshort flag\nif ( flag == 3 )\n    Journal q 10\nendif\nend s".into(),
        }],
        ..GameRecords::default()
    };
    let output = analyze(&records, &AnalysisConfig::default());
    let branch = &output.quests["q"].stages[&10].branches[0];
    assert!(branch.iter().any(|r| r.kind == RequirementKind::LocalVariable && r.script.as_deref() == Some("s")));

    let flag = &output.objects["s.flag"];
    assert_eq!(flag.kind, ObjectKind::Local);
    assert!(flag.involved.contains(&("q".to_string(), 10)));
}
