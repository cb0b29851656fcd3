use std::collections::HashSet;
use std::fmt;

use crate::*;

/// Validation error for malformed or missing references in decoded records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    DuplicateId { kind: &'static str, id: String },
    MissingReference { kind: &'static str, id: String, context: String },
    InvalidValue { context: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::DuplicateId { kind, id } => {
                write!(f, "duplicate {kind} id '{id}'")
            },
            ValidationError::MissingReference { kind, id, context } => {
                write!(f, "missing {kind} '{id}' ({context})")
            },
            ValidationError::InvalidValue { context } => {
                write!(f, "invalid value ({context})")
            },
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate cross-references and basic invariants in a set of decoded records.
///
/// Ids are compared case-insensitively, the way the game resolves them.
///
/// ```
/// use questgraph_data::{ActorRecord, GameRecords, ScriptRecord, validate_records};
///
/// let records = GameRecords {
///     scripts: vec![ScriptRecord { id: "fargothScript".into(), text: String::new() }],
///     actors: vec![ActorRecord {
///         id: "fargoth".into(),
///         script: Some("FargothScript".into()),
///         ..ActorRecord::default()
///     }],
///     ..GameRecords::default()
/// };
/// assert!(validate_records(&records).is_empty());
/// ```
pub fn validate_records(records: &GameRecords) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut dialogues = HashSet::new();
    let mut scripts = HashSet::new();
    let mut actors = HashSet::new();
    let mut lists = HashSet::new();

    track_ids(
        "dialogue",
        records.dialogues.iter().map(|d| d.id.as_str()),
        &mut dialogues,
        &mut errors,
    );
    track_ids(
        "script",
        records.scripts.iter().map(|s| s.id.as_str()),
        &mut scripts,
        &mut errors,
    );
    track_ids("actor", records.actors.iter().map(|a| a.id.as_str()), &mut actors, &mut errors);
    track_ids(
        "leveled list",
        records.leveled_lists.iter().map(|l| l.id.as_str()),
        &mut lists,
        &mut errors,
    );

    for actor in &records.actors {
        if let Some(script) = &actor.script {
            check_ref("script", script, &scripts, format!("actor '{}'", actor.id), &mut errors);
        }
        for (item, count) in &actor.inventory {
            if *count == 0 {
                errors.push(ValidationError::InvalidValue {
                    context: format!("actor '{}' carries zero of '{item}'", actor.id),
                });
            }
        }
    }

    for start in &records.start_scripts {
        check_ref("script", start, &scripts, "start scripts".to_string(), &mut errors);
    }

    for topic in &records.dialogues {
        if topic.kind != DialogueKind::Journal {
            continue;
        }
        for info in &topic.infos {
            if info.journal_index.is_none() && !info.quest_name {
                errors.push(ValidationError::InvalidValue {
                    context: format!("journal '{}' entry '{}' has no index", topic.id, info.id),
                });
            }
        }
    }

    for list in &records.leveled_lists {
        if list.members.iter().any(|m| m.eq_ignore_ascii_case(&list.id)) {
            errors.push(ValidationError::InvalidValue {
                context: format!("leveled list '{}' contains itself", list.id),
            });
        }
    }

    errors
}

fn track_ids<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a str>,
    set: &mut HashSet<String>,
    errors: &mut Vec<ValidationError>,
) {
    for id in ids {
        if !set.insert(id.to_ascii_lowercase()) {
            errors.push(ValidationError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
}

fn check_ref(kind: &'static str, id: &str, set: &HashSet<String>, context: String, errors: &mut Vec<ValidationError>) {
    if !set.contains(&id.to_ascii_lowercase()) {
        errors.push(ValidationError::MissingReference {
            kind,
            id: id.to_string(),
            context,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(id: &str) -> ScriptRecord {
        ScriptRecord {
            id: id.to_string(),
            text: format!("begin {id}\nend"),
        }
    }

    fn journal(id: &str, indexes: &[Option<i32>]) -> DialogueTopic {
        DialogueTopic {
            id: id.to_string(),
            kind: DialogueKind::Journal,
            infos: indexes
                .iter()
                .enumerate()
                .map(|(n, index)| DialogueInfo {
                    id: format!("{id}-{n}"),
                    journal_index: *index,
                    ..DialogueInfo::default()
                })
                .collect(),
        }
    }

    #[test]
    fn duplicate_ids_are_reported_case_insensitively() {
        let records = GameRecords {
            scripts: vec![script("Same"), script("same")],
            ..GameRecords::default()
        };

        let errors = validate_records(&records);
        assert!(
            errors
                .iter()
                .any(|err| matches!(err, ValidationError::DuplicateId { kind, id } if *kind == "script" && id == "same"))
        );
    }

    #[test]
    fn missing_script_references_are_reported() {
        let records = GameRecords {
            actors: vec![ActorRecord {
                id: "guard".into(),
                script: Some("guardScript".into()),
                ..ActorRecord::default()
            }],
            start_scripts: vec!["mainScript".into()],
            ..GameRecords::default()
        };

        let errors = validate_records(&records);
        assert!(errors.iter().any(|err| matches!(err, ValidationError::MissingReference { kind, id, .. } if *kind == "script" && id == "guardScript")));
        assert!(errors.iter().any(|err| matches!(err, ValidationError::MissingReference { id, context, .. } if id == "mainScript" && context == "start scripts")));
    }

    #[test]
    fn journal_entries_need_an_index() {
        let records = GameRecords {
            dialogues: vec![journal("MS_Quest", &[Some(10), None])],
            ..GameRecords::default()
        };

        let errors = validate_records(&records);
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], ValidationError::InvalidValue { context } if context.contains("MS_Quest-1")));
    }

    #[test]
    fn self_referencing_leveled_list_is_reported() {
        let records = GameRecords {
            leveled_lists: vec![LeveledListRecord {
                id: "l_loot".into(),
                kind: LeveledKind::Item,
                members: vec!["gold_001".into(), "L_Loot".into()],
            }],
            ..GameRecords::default()
        };

        let errors = validate_records(&records);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("contains itself"));
    }
}
