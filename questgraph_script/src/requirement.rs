//! module: requirement
//!
//! A [`Requirement`] is one structured condition that gates a code path or a
//! quest stage. [`RequirementSet`] is the ordered, duplicate-free conjunction
//! of requirements collected for one block path or one analysis hit.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::PLAYER;
use crate::tree::BlockId;

/// Comparison applied between a condition's operand and its value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl Operator {
    /// Parse a script comparison symbol (`==`, `!=`, `>`, `>=`, `<`, `<=`, and the lenient `=`).
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol.trim() {
            "==" | "=" => Some(Self::Equal),
            "!=" => Some(Self::NotEqual),
            ">" => Some(Self::Greater),
            ">=" => Some(Self::GreaterOrEqual),
            "<" => Some(Self::Less),
            "<=" => Some(Self::LessOrEqual),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
        }
    }

    /// The operator that holds exactly when `self` does not.
    pub fn negate(self) -> Self {
        match self {
            Self::Equal => Self::NotEqual,
            Self::NotEqual => Self::Equal,
            Self::Greater => Self::LessOrEqual,
            Self::LessOrEqual => Self::Greater,
            Self::GreaterOrEqual => Self::Less,
            Self::Less => Self::GreaterOrEqual,
        }
    }

    /// Evaluate `lhs <op> rhs`.
    #[allow(clippy::float_cmp)]
    pub fn test(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Equal => lhs == rhs,
            Self::NotEqual => lhs != rhs,
            Self::Greater => lhs > rhs,
            Self::GreaterOrEqual => lhs >= rhs,
            Self::Less => lhs < rhs,
            Self::LessOrEqual => lhs <= rhs,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// What a requirement tests. Keys are stable strings so external tools can
/// add their own kinds; anything unknown round-trips through `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequirementKind {
    Activated,
    Actor,
    ActorItem,
    Attribute,
    Cell,
    Choice,
    Class,
    Dead,
    Disabled,
    Disposition,
    Distance,
    Faction,
    Gender,
    GlobalVariable,
    Health,
    Item,
    Journal,
    Level,
    LocalVariable,
    Race,
    Rank,
    Reputation,
    Skill,
    Spell,
    Topic,
    Unknown,
    Custom(String),
}

impl RequirementKind {
    pub fn as_key(&self) -> &str {
        match self {
            Self::Activated => "activated",
            Self::Actor => "actor",
            Self::ActorItem => "actorItem",
            Self::Attribute => "attribute",
            Self::Cell => "cell",
            Self::Choice => "choice",
            Self::Class => "class",
            Self::Dead => "dead",
            Self::Disabled => "disabled",
            Self::Disposition => "disposition",
            Self::Distance => "distance",
            Self::Faction => "faction",
            Self::Gender => "gender",
            Self::GlobalVariable => "global",
            Self::Health => "health",
            Self::Item => "item",
            Self::Journal => "journal",
            Self::Level => "level",
            Self::LocalVariable => "local",
            Self::Race => "race",
            Self::Rank => "rank",
            Self::Reputation => "reputation",
            Self::Skill => "skill",
            Self::Spell => "spell",
            Self::Topic => "topic",
            Self::Unknown => "unknown",
            Self::Custom(key) => key,
        }
    }

    pub fn from_key(key: &str) -> Self {
        match key {
            "activated" => Self::Activated,
            "actor" => Self::Actor,
            "actorItem" => Self::ActorItem,
            "attribute" => Self::Attribute,
            "cell" => Self::Cell,
            "choice" => Self::Choice,
            "class" => Self::Class,
            "dead" => Self::Dead,
            "disabled" => Self::Disabled,
            "disposition" => Self::Disposition,
            "distance" => Self::Distance,
            "faction" => Self::Faction,
            "gender" => Self::Gender,
            "global" => Self::GlobalVariable,
            "health" => Self::Health,
            "item" => Self::Item,
            "journal" => Self::Journal,
            "level" => Self::Level,
            "local" => Self::LocalVariable,
            "race" => Self::Race,
            "rank" => Self::Rank,
            "reputation" => Self::Reputation,
            "skill" => Self::Skill,
            "spell" => Self::Spell,
            "topic" => Self::Topic,
            "unknown" => Self::Unknown,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for RequirementKind {
    fn from(key: String) -> Self {
        Self::from_key(&key)
    }
}

impl From<RequirementKind> for String {
    fn from(kind: RequirementKind) -> Self {
        kind.as_key().to_string()
    }
}

impl fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

/// One semantic condition.
///
/// `variable` names the operand (a variable, a quest id, an item id...),
/// `object` the actor the condition is scoped to (`"player"` for the player),
/// `value`/`text` the numeric or textual comparand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requirement {
    pub kind: RequirementKind,
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    /// Untranslated source text; only set when translation failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl Requirement {
    pub fn new(kind: RequirementKind, operator: Operator) -> Self {
        Self {
            kind,
            operator,
            value: None,
            text: None,
            variable: None,
            object: None,
            attribute: None,
            skill: None,
            script: None,
            raw: None,
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = Some(variable.into());
        self
    }

    #[must_use]
    pub fn with_object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    #[must_use]
    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    /// True when the condition is scoped to the player.
    pub fn is_player(&self) -> bool {
        self.object.as_deref().is_some_and(|o| o.eq_ignore_ascii_case(PLAYER))
    }

    /// The non-player object this requirement is scoped to, if any.
    pub fn object_reference(&self) -> Option<&str> {
        self.object.as_deref().filter(|_| !self.is_player())
    }

    /// Whether `candidate` passes this requirement's numeric test.
    ///
    /// Returns `None` when the requirement has no numeric comparand.
    pub fn test_value(&self, candidate: f64) -> Option<bool> {
        self.value.map(|value| self.operator.test(candidate, value))
    }

    /// Copy of this requirement with the operator inverted.
    #[must_use]
    pub fn negated(&self) -> Self {
        let mut negated = self.clone();
        negated.operator = self.operator.negate();
        negated
    }

    /// True for local-variable requirements on `name` (case-insensitive).
    pub fn is_local_on(&self, name: &str) -> bool {
        self.kind == RequirementKind::LocalVariable
            && self.variable.as_deref().is_some_and(|v| v.eq_ignore_ascii_case(name))
    }
}

/// Structural equality over every field except `raw`.
impl PartialEq for Requirement {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.operator == other.operator
            && self.value == other.value
            && self.text == other.text
            && self.variable == other.variable
            && self.object == other.object
            && self.attribute == other.attribute
            && self.skill == other.skill
            && self.script == other.script
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(raw) = &self.raw {
            return write!(f, "?{{{raw}}}");
        }
        if let Some(object) = &self.object {
            write!(f, "{object}->")?;
        }
        write!(f, "{}", self.kind)?;
        if let Some(variable) = &self.variable {
            write!(f, "({variable})")?;
        }
        if let Some(index) = self.attribute.or(self.skill) {
            write!(f, "[{index}]")?;
        }
        write!(f, " {}", self.operator)?;
        match (&self.value, &self.text) {
            (Some(value), _) => write!(f, " {value}"),
            (None, Some(text)) => write!(f, " \"{text}\""),
            (None, None) => Ok(()),
        }
    }
}

/// Ordered conjunction of requirements without structural duplicates.
///
/// `block` points back at the script block the set was collected from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequirementSet {
    items: Vec<Requirement>,
    #[serde(skip)]
    pub block: Option<BlockId>,
}

impl PartialEq for RequirementSet {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl RequirementSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty set collected from `block`.
    pub fn for_block(block: BlockId) -> Self {
        Self {
            items: Vec::new(),
            block: Some(block),
        }
    }

    /// Append `requirement` unless an equal one is already present.
    ///
    /// Returns true if the set changed.
    pub fn insert(&mut self, requirement: Requirement) -> bool {
        if self.items.contains(&requirement) {
            return false;
        }
        self.items.push(requirement);
        true
    }

    /// Insert at `position` unless an equal requirement is already present.
    pub fn insert_at(&mut self, position: usize, requirement: Requirement) -> bool {
        if self.items.contains(&requirement) {
            return false;
        }
        let position = position.min(self.items.len());
        self.items.insert(position, requirement);
        true
    }

    /// Copy every requirement of `other` into this set, keeping order and skipping duplicates.
    pub fn extend_from(&mut self, other: &RequirementSet) {
        for requirement in &other.items {
            self.insert(requirement.clone());
        }
    }

    pub fn remove(&mut self, position: usize) -> Requirement {
        self.items.remove(position)
    }

    pub fn retain(&mut self, keep: impl FnMut(&Requirement) -> bool) {
        self.items.retain(keep);
    }

    pub fn contains(&self, requirement: &Requirement) -> bool {
        self.items.contains(requirement)
    }

    pub fn get(&self, position: usize) -> Option<&Requirement> {
        self.items.get(position)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Requirement> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Requirement] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a> IntoIterator for &'a RequirementSet {
    type Item = &'a Requirement;
    type IntoIter = std::slice::Iter<'a, Requirement>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl FromIterator<Requirement> for RequirementSet {
    fn from_iter<I: IntoIterator<Item = Requirement>>(iter: I) -> Self {
        let mut set = Self::new();
        for requirement in iter {
            set.insert(requirement);
        }
        set
    }
}

impl fmt::Display for RequirementSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.items.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", parts.join(" && "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(name: &str, operator: Operator, value: f64) -> Requirement {
        Requirement::new(RequirementKind::LocalVariable, operator)
            .with_variable(name)
            .with_value(value)
    }

    #[test]
    fn negation_is_an_involution() {
        for op in [
            Operator::Equal,
            Operator::NotEqual,
            Operator::Greater,
            Operator::GreaterOrEqual,
            Operator::Less,
            Operator::LessOrEqual,
        ] {
            assert_eq!(op.negate().negate(), op);
            for lhs in [-1.0, 0.0, 1.0, 2.0] {
                assert_ne!(op.test(lhs, 1.0), op.negate().test(lhs, 1.0));
            }
        }
    }

    #[test]
    fn symbols_round_trip() {
        assert_eq!(Operator::from_symbol(">="), Some(Operator::GreaterOrEqual));
        assert_eq!(Operator::from_symbol("="), Some(Operator::Equal));
        assert_eq!(Operator::from_symbol("<>"), None);
        assert_eq!(Operator::from_symbol(Operator::Less.symbol()), Some(Operator::Less));
    }

    #[test]
    fn kind_keys_round_trip() {
        assert_eq!(RequirementKind::from_key("journal"), RequirementKind::Journal);
        assert_eq!(RequirementKind::from_key("local"), RequirementKind::LocalVariable);
        let custom = RequirementKind::from_key("onpcequip");
        assert_eq!(custom, RequirementKind::Custom("onpcequip".into()));
        assert_eq!(custom.as_key(), "onpcequip");
    }

    #[test]
    fn equality_ignores_raw_text() {
        let a = local("doonce", Operator::Equal, 1.0);
        let mut b = a.clone();
        b.raw = Some("doOnce == 1".into());
        assert_eq!(a, b);
        assert_ne!(a, local("doonce", Operator::Equal, 0.0));
    }

    #[test]
    fn inserting_twice_is_a_no_op() {
        let mut once = RequirementSet::new();
        once.insert(local("doonce", Operator::Equal, 1.0));

        let mut twice = RequirementSet::new();
        assert!(twice.insert(local("doonce", Operator::Equal, 1.0)));
        assert!(!twice.insert(local("doonce", Operator::Equal, 1.0)));

        assert_eq!(once, twice);
        assert_eq!(twice.len(), 1);
    }

    #[test]
    fn extend_keeps_order_and_skips_duplicates() {
        let mut left: RequirementSet = [local("a", Operator::Equal, 1.0), local("b", Operator::Equal, 1.0)]
            .into_iter()
            .collect();
        let right: RequirementSet = [local("b", Operator::Equal, 1.0), local("c", Operator::Less, 3.0)]
            .into_iter()
            .collect();
        left.extend_from(&right);
        let names: Vec<_> = left.iter().filter_map(|r| r.variable.as_deref()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn player_scope_is_case_insensitive() {
        let r = Requirement::new(RequirementKind::Item, Operator::Greater).with_object("Player");
        assert!(r.is_player());
        assert_eq!(r.object_reference(), None);
        let r = Requirement::new(RequirementKind::Disposition, Operator::Greater).with_object("fargoth");
        assert_eq!(r.object_reference(), Some("fargoth"));
    }

    #[test]
    fn test_value_needs_a_numeric_comparand() {
        let r = local("x", Operator::Greater, 1.0);
        assert_eq!(r.test_value(2.0), Some(true));
        assert_eq!(r.test_value(1.0), Some(false));
        let r = Requirement::new(RequirementKind::Cell, Operator::Equal).with_text("balmora");
        assert_eq!(r.test_value(1.0), None);
    }

    #[test]
    fn set_serializes_as_plain_array() {
        let set: RequirementSet = [local("x", Operator::Equal, 1.0)].into_iter().collect();
        let json = serde_json::to_value(&set).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["kind"], "local");
        assert_eq!(json[0]["operator"], "equal");
    }

    #[test]
    fn equality_ignores_origin_block() {
        let mut collected = RequirementSet::for_block(BlockId(3));
        collected.insert(local("x", Operator::Equal, 1.0));
        let json = serde_json::to_string(&collected).unwrap();
        let reloaded: RequirementSet = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded.block, None);
        assert_eq!(reloaded, collected);
    }
}
