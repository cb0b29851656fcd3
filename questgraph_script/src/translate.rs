//! Condition text to [`Requirement`] translation.
//!
//! A single pattern splits a condition such as
//! `"fargoth"->GetItemCount "gold_001" >= 100` into scope object, command,
//! argument, operator and value. The command is looked up in a closed table
//! of known functions; names that are not functions are treated as variables.

use std::collections::{BTreeSet, HashMap, HashSet};

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use crate::PLAYER;
use crate::requirement::{Operator, Requirement, RequirementKind};

/// Errors produced while translating a single condition.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TranslateError {
    #[error("empty condition")]
    Empty,
    #[error("object variable '{object}.{variable}' has no command")]
    ObjectVariable { object: String, variable: String },
    #[error("unparsed condition: {0}")]
    Unparsed(String),
}

/// Names visible while translating one condition.
#[derive(Debug, Default, Clone, Copy)]
pub struct Scope<'a> {
    /// Script owning the condition; attached to local-variable requirements.
    pub script: Option<&'a str>,
    /// Local variables declared in the enclosing blocks (lower-cased).
    pub locals: Option<&'a BTreeSet<String>>,
}

impl<'a> Scope<'a> {
    pub fn new(script: Option<&'a str>, locals: &'a BTreeSet<String>) -> Self {
        Self {
            script,
            locals: Some(locals),
        }
    }

    fn is_local(&self, name: &str) -> bool {
        self.locals.is_some_and(|locals| locals.contains(name))
    }
}

#[derive(Debug, Clone)]
struct CommandInfo {
    kind: RequirementKind,
    /// Alternate kind when the command is applied to an explicit non-player actor.
    on_actor: Option<RequirementKind>,
    attribute: Option<u8>,
    skill: Option<u8>,
}

impl CommandInfo {
    fn plain(kind: RequirementKind) -> Self {
        Self {
            kind,
            on_actor: None,
            attribute: None,
            skill: None,
        }
    }
}

/// Attribute names in game index order.
pub const ATTRIBUTES: [&str; 8] = [
    "strength",
    "intelligence",
    "willpower",
    "agility",
    "speed",
    "endurance",
    "personality",
    "luck",
];

/// Skill names in game index order.
pub const SKILLS: [&str; 27] = [
    "block",
    "armorer",
    "mediumarmor",
    "heavyarmor",
    "bluntweapon",
    "longblade",
    "axe",
    "spear",
    "athletics",
    "enchant",
    "destruction",
    "alteration",
    "illusion",
    "conjuration",
    "mysticism",
    "restoration",
    "alchemy",
    "unarmored",
    "security",
    "sneak",
    "acrobatics",
    "lightarmor",
    "shortblade",
    "marksman",
    "mercantile",
    "speechcraft",
    "handtohand",
];

/// Index of an attribute by lower-case name.
pub fn attribute_index(name: &str) -> Option<u8> {
    ATTRIBUTES.iter().position(|a| *a == name).and_then(|i| u8::try_from(i).ok())
}

/// Index of a skill by lower-case name.
pub fn skill_index(name: &str) -> Option<u8> {
    SKILLS.iter().position(|s| *s == name).and_then(|i| u8::try_from(i).ok())
}

lazy_static! {
    static ref CONDITION: Regex = Regex::new(
        r#"(?x)
        ^\s*
        (?: (?P<scope>"[^"]+"|[\w'\-]+) \s*->\s* )?
        (?P<command>[A-Za-z_]\w*)
        (?: \s*,?\s* (?P<arg>"[^"]*"|[A-Za-z_][\w'\.\-]*) )?
        \s*
        (?: (?P<op>==|!=|>=|<=|>|<|=) \s* (?P<value>"[^"]*"|-?\d+(?:\.\d+)?|-?\.\d+|[A-Za-z_][\w\.]*) )?
        \s*$"#
    )
    .expect("valid condition pattern");
    static ref OBJECT_VARIABLE: Regex = Regex::new(
        r#"(?x)
        ^\s*
        (?P<object>"[^"]+"|[\w'\-]+) \s*\.\s* (?P<variable>[A-Za-z_]\w*)
        \s*
        (?: (?P<op>==|!=|>=|<=|>|<|=) \s* (?P<value>"[^"]*"|-?\d+(?:\.\d+)?|-?\.\d+|[A-Za-z_][\w\.]*) )?
        \s*$"#
    )
    .expect("valid object variable pattern");
    static ref COMMANDS: HashMap<String, CommandInfo> = build_command_table();
    /// Functions that only make sense when applied to the player.
    static ref PLAYER_ONLY: HashSet<&'static str> = [
        "getjournalindex",
        "getpccell",
        "getpcrank",
        "getpcfacrep",
        "getpccrimelevel",
        "getpcsleep",
        "getpcinjail",
        "getpctraveling",
        "getpcjumping",
        "getpcrunning",
        "getpcsneaking",
        "getpcvisionbonus",
        "pcexpelled",
        "pcget3rdperson",
        "getbuttonpressed",
        "cellchanged",
    ]
    .into_iter()
    .collect();
}

fn build_command_table() -> HashMap<String, CommandInfo> {
    use RequirementKind as K;

    let mut table = HashMap::new();
    table.insert("getjournalindex".to_string(), CommandInfo::plain(K::Journal));
    table.insert(
        "getitemcount".to_string(),
        CommandInfo {
            on_actor: Some(K::ActorItem),
            ..CommandInfo::plain(K::Item)
        },
    );
    table.insert("getdeadcount".to_string(), CommandInfo::plain(K::Dead));
    table.insert("getdisposition".to_string(), CommandInfo::plain(K::Disposition));
    table.insert("getreputation".to_string(), CommandInfo::plain(K::Reputation));
    table.insert("getpcfacrep".to_string(), CommandInfo::plain(K::Reputation));
    table.insert("getlevel".to_string(), CommandInfo::plain(K::Level));
    table.insert("getpcrank".to_string(), CommandInfo::plain(K::Rank));
    table.insert("samefaction".to_string(), CommandInfo::plain(K::Faction));
    table.insert("getrace".to_string(), CommandInfo::plain(K::Race));
    table.insert("getpccell".to_string(), CommandInfo::plain(K::Cell));
    table.insert("onactivate".to_string(), CommandInfo::plain(K::Activated));
    table.insert("getspell".to_string(), CommandInfo::plain(K::Spell));
    table.insert("getspelleffects".to_string(), CommandInfo::plain(K::Spell));
    table.insert("gethealth".to_string(), CommandInfo::plain(K::Health));
    table.insert("gethealthgetratio".to_string(), CommandInfo::plain(K::Health));
    table.insert("getdistance".to_string(), CommandInfo::plain(K::Distance));
    table.insert("getdisabled".to_string(), CommandInfo::plain(K::Disabled));
    for name in [
        "getpccrimelevel",
        "getpcsleep",
        "getpcinjail",
        "getpctraveling",
        "getpcjumping",
        "getpcrunning",
        "getpcsneaking",
        "getpcvisionbonus",
        "pcexpelled",
        "pcget3rdperson",
        "getbuttonpressed",
        "cellchanged",
        "ondeath",
        "onmurder",
        "onknockout",
        "onpcadd",
        "onpcdrop",
        "onpcequip",
        "onpchitme",
        "onrepair",
        "onpcsoulgemuse",
        "getdetected",
        "getlocked",
        "getcurrentaipackage",
        "getaipackagedone",
        "getstandingpc",
        "getstandingactor",
        "getmagicka",
        "getfatigue",
        "getsecondspassed",
        "getattacked",
        "getweapondrawn",
        "getspellreadied",
        "getcurrenttime",
        "scriptrunning",
        "random",
        "getrandompercent",
    ] {
        table.insert(name.to_string(), CommandInfo::plain(K::Custom(name.to_string())));
    }
    for (index, attribute) in ATTRIBUTES.iter().enumerate() {
        table.insert(
            format!("get{attribute}"),
            CommandInfo {
                attribute: u8::try_from(index).ok(),
                ..CommandInfo::plain(K::Attribute)
            },
        );
    }
    for (index, skill) in SKILLS.iter().enumerate() {
        table.insert(
            format!("get{skill}"),
            CommandInfo {
                skill: u8::try_from(index).ok(),
                ..CommandInfo::plain(K::Skill)
            },
        );
    }
    table
}

/// Translates condition text into requirements, accumulating diagnostics.
///
/// The translator is a value: every script analysis run owns one, and the
/// names it could not resolve are read back through [`Self::unrecognized`].
#[derive(Debug, Default, Clone)]
pub struct ConditionTranslator {
    globals: BTreeSet<String>,
    unrecognized: BTreeSet<String>,
    failed: Vec<String>,
}

impl ConditionTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translator that knows the given global variable names.
    pub fn with_globals<I, S>(globals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            globals: globals.into_iter().map(|g| g.as_ref().to_ascii_lowercase()).collect(),
            ..Self::default()
        }
    }

    /// Command names that were neither functions nor declared variables.
    pub fn unrecognized(&self) -> &BTreeSet<String> {
        &self.unrecognized
    }

    /// Condition texts that could not be translated at all.
    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    /// Translate one condition expression.
    ///
    /// # Errors
    /// Returns an error when the text is empty, is an `object.variable`
    /// comparison with no command, or does not match the condition shape.
    pub fn translate(&mut self, text: &str, scope: Scope<'_>) -> Result<Requirement, TranslateError> {
        let text = strip_parens(text);
        if text.is_empty() {
            return Err(TranslateError::Empty);
        }
        if let Some(caps) = OBJECT_VARIABLE.captures(text) {
            return Err(TranslateError::ObjectVariable {
                object: unquote(&caps["object"]).to_ascii_lowercase(),
                variable: caps["variable"].to_ascii_lowercase(),
            });
        }
        let caps = CONDITION
            .captures(text)
            .ok_or_else(|| TranslateError::Unparsed(text.to_string()))?;

        let command = caps["command"].to_ascii_lowercase();
        let scope_object = caps.name("scope").map(|m| unquote(m.as_str()).to_ascii_lowercase());
        let argument = caps.name("arg").map(|m| unquote(m.as_str()).to_ascii_lowercase());
        let operator = match caps.name("op") {
            Some(op) => Operator::from_symbol(op.as_str()).ok_or_else(|| TranslateError::Unparsed(text.to_string()))?,
            None => Operator::Greater,
        };

        let mut requirement = if let Some(info) = COMMANDS.get(command.as_str()) {
            let on_actor = scope_object.as_deref().is_some_and(|s| s != PLAYER);
            let kind = match (&info.on_actor, on_actor) {
                (Some(kind), true) => kind.clone(),
                _ => info.kind.clone(),
            };
            let mut requirement = Requirement::new(kind, operator);
            requirement.attribute = info.attribute;
            requirement.skill = info.skill;
            requirement.variable = argument;
            requirement
        } else if scope.is_local(&command) {
            let mut requirement = Requirement::new(RequirementKind::LocalVariable, operator).with_variable(&command);
            requirement.script = scope.script.map(str::to_ascii_lowercase);
            requirement
        } else if self.globals.contains(&command) {
            Requirement::new(RequirementKind::GlobalVariable, operator).with_variable(&command)
        } else {
            debug!("unrecognized command '{command}' in condition '{text}'");
            self.unrecognized.insert(command.clone());
            let mut requirement = Requirement::new(RequirementKind::LocalVariable, operator).with_variable(&command);
            requirement.script = scope.script.map(str::to_ascii_lowercase);
            requirement
        };

        requirement.object = match scope_object {
            Some(object) => Some(object),
            None if PLAYER_ONLY.contains(command.as_str()) => Some(PLAYER.to_string()),
            None => None,
        };

        match caps.name("value") {
            Some(value) => set_comparand(&mut requirement, value.as_str()),
            None if caps.name("op").is_none() => requirement.value = Some(0.0),
            None => {},
        }
        Ok(requirement)
    }

    /// Translate, falling back to an opaque requirement that keeps the source text.
    pub fn translate_or_raw(&mut self, text: &str, scope: Scope<'_>) -> Requirement {
        match self.translate(text, scope) {
            Ok(requirement) => requirement,
            Err(err) => {
                debug!("keeping condition as raw text ({err})");
                self.failed.push(text.trim().to_string());
                opaque(text)
            },
        }
    }
}

/// Requirement preserving untranslatable condition text.
///
/// `object.variable` comparisons keep their object, variable and comparison so
/// they still compare structurally; anything else is kept as text only.
pub fn opaque(text: &str) -> Requirement {
    let trimmed = strip_parens(text);
    let mut requirement = if let Some(caps) = OBJECT_VARIABLE.captures(trimmed) {
        let operator = caps
            .name("op")
            .and_then(|op| Operator::from_symbol(op.as_str()))
            .unwrap_or(Operator::Greater);
        let mut requirement = Requirement::new(RequirementKind::Unknown, operator)
            .with_object(unquote(&caps["object"]).to_ascii_lowercase())
            .with_variable(caps["variable"].to_ascii_lowercase());
        match caps.name("value") {
            Some(value) => set_comparand(&mut requirement, value.as_str()),
            None => requirement.value = Some(0.0),
        }
        requirement
    } else {
        Requirement::new(RequirementKind::Unknown, Operator::Equal).with_text(trimmed)
    };
    requirement.raw = Some(text.trim().to_string());
    requirement
}

fn set_comparand(requirement: &mut Requirement, value: &str) {
    match value.parse::<f64>() {
        Ok(number) => requirement.value = Some(number),
        Err(_) => requirement.text = Some(unquote(value).to_ascii_lowercase()),
    }
}

/// Remove balanced outer parentheses and surrounding whitespace.
pub(crate) fn strip_parens(text: &str) -> &str {
    let mut t = text.trim();
    while t.starts_with('(') && t.ends_with(')') && wraps_whole(t) {
        t = t[1..t.len() - 1].trim();
    }
    t
}

/// True when the opening parenthesis at the start closes at the very end.
fn wraps_whole(t: &str) -> bool {
    let mut depth = 0usize;
    let mut in_quote = false;
    for (i, ch) in t.char_indices() {
        match ch {
            '"' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == t.len() - 1;
                }
            },
            _ => {},
        }
    }
    false
}

pub(crate) fn unquote(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(s).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translate(text: &str) -> Requirement {
        ConditionTranslator::new().translate(text, Scope::default()).unwrap()
    }

    #[test]
    fn journal_index_is_player_scoped() {
        let r = translate(r#"GetJournalIndex "MS_FargothRing" >= 100"#);
        assert_eq!(r.kind, RequirementKind::Journal);
        assert_eq!(r.operator, Operator::GreaterOrEqual);
        assert_eq!(r.variable.as_deref(), Some("ms_fargothring"));
        assert_eq!(r.value, Some(100.0));
        assert!(r.is_player());
    }

    #[test]
    fn scoped_item_count_uses_actor_kind() {
        let r = translate(r#""fargoth"->GetItemCount "ring_keley" > 0"#);
        assert_eq!(r.kind, RequirementKind::ActorItem);
        assert_eq!(r.object.as_deref(), Some("fargoth"));
        assert_eq!(r.variable.as_deref(), Some("ring_keley"));

        let r = translate(r#"player->GetItemCount, "gold_001" >= 500"#);
        assert_eq!(r.kind, RequirementKind::Item);
        assert!(r.is_player());
        assert_eq!(r.value, Some(500.0));
    }

    #[test]
    fn skills_and_attributes_carry_indexes() {
        let r = translate("player->GetSpeechcraft >= 40");
        assert_eq!(r.kind, RequirementKind::Skill);
        assert_eq!(r.skill, Some(25));
        let r = translate("GetStrength < 30");
        assert_eq!(r.kind, RequirementKind::Attribute);
        assert_eq!(r.attribute, Some(0));
        assert_eq!(r.object, None);
    }

    #[test]
    fn missing_operator_is_an_existence_check() {
        let r = translate(r#"GetPCCell "Balmora, Council Club""#);
        assert_eq!(r.kind, RequirementKind::Cell);
        assert_eq!(r.operator, Operator::Greater);
        assert_eq!(r.value, Some(0.0));
        assert!(r.is_player());
    }

    #[test]
    fn outer_parentheses_are_ignored() {
        let r = translate("( ( OnActivate == 1 ) )");
        assert_eq!(r.kind, RequirementKind::Activated);
        assert_eq!(r.value, Some(1.0));
        assert_eq!(strip_parens("(a) == (b)"), "(a) == (b)");
    }

    #[test]
    fn declared_locals_and_globals_are_resolved() {
        let locals: BTreeSet<String> = ["doonce".to_string()].into_iter().collect();
        let mut translator = ConditionTranslator::with_globals(["GameHour"]);
        let r = translator
            .translate("doOnce == 0", Scope::new(Some("MyScript"), &locals))
            .unwrap();
        assert_eq!(r.kind, RequirementKind::LocalVariable);
        assert_eq!(r.script.as_deref(), Some("myscript"));
        let r = translator.translate("GameHour > 20", Scope::default()).unwrap();
        assert_eq!(r.kind, RequirementKind::GlobalVariable);
        assert!(translator.unrecognized().is_empty());
    }

    #[test]
    fn unknown_names_become_local_variables_and_are_recorded() {
        let mut translator = ConditionTranslator::new();
        let r = translator.translate("mysteryFlag != 2", Scope::default()).unwrap();
        assert_eq!(r.kind, RequirementKind::LocalVariable);
        assert_eq!(r.variable.as_deref(), Some("mysteryflag"));
        assert!(translator.unrecognized().contains("mysteryflag"));
    }

    #[test]
    fn object_variables_are_kept_opaque() {
        let mut translator = ConditionTranslator::new();
        let err = translator.translate(r#""caius".talked == 1"#, Scope::default()).unwrap_err();
        assert_eq!(
            err,
            TranslateError::ObjectVariable {
                object: "caius".into(),
                variable: "talked".into()
            }
        );
        let r = translator.translate_or_raw(r#""caius".talked == 1"#, Scope::default());
        assert_eq!(r.kind, RequirementKind::Unknown);
        assert_eq!(r.object.as_deref(), Some("caius"));
        assert_eq!(r.value, Some(1.0));
        assert!(r.raw.is_some());
        assert_eq!(translator.failed().len(), 1);
    }

    #[test]
    fn garbage_is_kept_as_text() {
        let mut translator = ConditionTranslator::new();
        let r = translator.translate_or_raw("((x + 3) * 2 > 1", Scope::default());
        assert_eq!(r.kind, RequirementKind::Unknown);
        assert!(r.text.is_some());
        assert_eq!(r.raw.as_deref(), Some("((x + 3) * 2 > 1"));
    }

    #[test]
    fn index_tables() {
        assert_eq!(attribute_index("luck"), Some(7));
        assert_eq!(skill_index("handtohand"), Some(26));
        assert_eq!(skill_index("cooking"), None);
    }
}
