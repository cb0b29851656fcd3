//! Non-fatal findings collected while analysing records.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// One thing the analysis could not fully understand. None of these stop a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
pub enum Diagnostic {
    #[error("unrecognized command '{command}' treated as a local variable")]
    UnrecognizedCommand { command: String },
    #[error("condition kept as raw text: {text}")]
    UntranslatedCondition { text: String },
    #[error("journal update {quest} {index} from {origin} has no matching stage")]
    MissingStage { quest: String, index: i32, origin: String },
    #[error("script '{script}' referenced by {referrer} does not exist")]
    MissingScript { script: String, referrer: String },
}

impl Diagnostic {
    /// Missing cross-references are worth a warning; translation gaps are routine.
    pub fn log(&self) {
        match self {
            Self::MissingStage { .. } | Self::MissingScript { .. } => warn!("{self}"),
            Self::UnrecognizedCommand { .. } | Self::UntranslatedCondition { .. } => debug!("{self}"),
        }
    }
}

/// Accumulated diagnostics of one analysis run, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `diagnostic` unless an identical one is already present.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if !self.0.contains(&diagnostic) {
            self.0.push(diagnostic);
        }
    }

    pub fn extend(&mut self, other: Diagnostics) {
        for diagnostic in other.0 {
            self.push(diagnostic);
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Count of diagnostics that point at broken cross-references.
    pub fn missing_references(&self) -> usize {
        self.0
            .iter()
            .filter(|d| matches!(d, Diagnostic::MissingStage { .. } | Diagnostic::MissingScript { .. }))
            .count()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_collapsed() {
        let mut diagnostics = Diagnostics::new();
        let unknown = Diagnostic::UnrecognizedCommand { command: "foo".into() };
        diagnostics.push(unknown.clone());
        diagnostics.push(unknown);
        diagnostics.push(Diagnostic::MissingStage {
            quest: "q".into(),
            index: 10,
            origin: "script s".into(),
        });
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.missing_references(), 1);
    }

    #[test]
    fn messages_name_the_reference() {
        let d = Diagnostic::MissingScript {
            script: "ghost".into(),
            referrer: "start scripts".into(),
        };
        assert_eq!(d.to_string(), "script 'ghost' referenced by start scripts does not exist");
    }

    #[test]
    fn serializes_as_tagged_list() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::UntranslatedCondition { text: "x + 1 > 2".into() });
        let json = serde_json::to_value(&diagnostics).unwrap();
        assert_eq!(json[0]["untranslatedCondition"]["text"], "x + 1 > 2");
    }
}
