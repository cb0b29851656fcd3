//! Line-oriented structural parser for script source.
//!
//! Each nesting level is scanned with a small state machine: at most one label
//! is open at a time, and only labels of that same family (`if`/`endif`,
//! `while`/`endwhile`, `begin`/`end`) move its nesting counter. Everything
//! collected inside a closed label is parsed recursively as the child's level.
//! Lines that don't fit the current state are kept as plain statement text,
//! so parsing never fails.

use lazy_static::lazy_static;
use regex::Regex;

use crate::requirement::{Requirement, RequirementSet};
use crate::translate::{ConditionTranslator, Scope, unquote};
use crate::tree::{BlockId, BlockType, ScriptTree, VariableType};

lazy_static! {
    static ref LABEL: Regex =
        Regex::new(r"(?i)^(begin|_dialog_|elseif|else|endif|endwhile|end|if|while)\b\s*(.*)$").expect("valid label pattern");
    static ref DECLARATION: Regex =
        Regex::new(r"(?i)^(short|long|float)\s+([A-Za-z_]\w*)\s*$").expect("valid declaration pattern");
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Label {
    Begin,
    Dialog,
    If,
    ElseIf,
    Else,
    EndIf,
    While,
    EndWhile,
    End,
}

/// Labels that open and close each other.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Family {
    Begin,
    If,
    While,
}

impl Label {
    fn from_word(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "begin" => Some(Self::Begin),
            "_dialog_" => Some(Self::Dialog),
            "if" => Some(Self::If),
            "elseif" => Some(Self::ElseIf),
            "else" => Some(Self::Else),
            "endif" => Some(Self::EndIf),
            "while" => Some(Self::While),
            "endwhile" => Some(Self::EndWhile),
            "end" => Some(Self::End),
            _ => None,
        }
    }

    fn opens(self) -> Option<Family> {
        match self {
            Self::Begin | Self::Dialog => Some(Family::Begin),
            Self::If => Some(Family::If),
            Self::While => Some(Family::While),
            _ => None,
        }
    }

    fn closes(self) -> Option<Family> {
        match self {
            Self::End => Some(Family::Begin),
            Self::EndIf => Some(Family::If),
            Self::EndWhile => Some(Family::While),
            _ => None,
        }
    }
}

enum Line<'a> {
    Label(Label, &'a str),
    Declaration(VariableType, String),
    Statement(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    if let Some(caps) = LABEL.captures(line)
        && let Some(label) = Label::from_word(&caps[1])
    {
        let rest = caps.get(2).map_or("", |m| m.as_str());
        return Line::Label(label, rest.trim());
    }
    if let Some(caps) = DECLARATION.captures(line)
        && let Some(kind) = VariableType::from_keyword(&caps[1])
    {
        return Line::Declaration(kind, caps[2].to_ascii_lowercase());
    }
    Line::Statement(line)
}

/// Cut a `;` comment, ignoring semicolons inside quotes.
fn strip_comment(line: &str) -> &str {
    let mut in_quote = false;
    for (i, ch) in line.char_indices() {
        match ch {
            '"' => in_quote = !in_quote,
            ';' if !in_quote => return &line[..i],
            _ => {},
        }
    }
    line
}

fn source_lines(source: &str) -> Vec<&str> {
    source
        .lines()
        .map(|line| strip_comment(line).trim())
        .filter(|line| !line.is_empty())
        .collect()
}

/// One branch of an open label: its direct requirements and collected inner lines.
struct Branch<'a> {
    kind: BlockType,
    requirements: RequirementSet,
    label: Option<String>,
    script: Option<String>,
    lines: Vec<&'a str>,
}

impl<'a> Branch<'a> {
    fn new(kind: BlockType, requirements: RequirementSet, label: Option<String>) -> Self {
        Self {
            kind,
            requirements,
            label,
            script: None,
            lines: Vec::new(),
        }
    }
}

/// The label currently open at one nesting level.
struct OpenLabel<'a> {
    family: Family,
    /// Same-family labels opened inside and not yet closed.
    nesting: usize,
    /// Conditions of the `if`/`elseif` branches seen so far.
    chain: Vec<Requirement>,
    done: Vec<Branch<'a>>,
    current: Branch<'a>,
}

impl<'a> OpenLabel<'a> {
    fn new(family: Family, first: Branch<'a>) -> Self {
        Self {
            family,
            nesting: 0,
            chain: Vec::new(),
            done: Vec::new(),
            current: first,
        }
    }

    fn conditional(kind: BlockType, family: Family, requirement: Requirement, label: &str) -> Self {
        let mut requirements = RequirementSet::new();
        requirements.insert(requirement.clone());
        let mut open = Self::new(family, Branch::new(kind, requirements, Some(label.to_string())));
        open.chain.push(requirement);
        open
    }

    /// Start an `elseif` (with a condition) or `else` (without) branch.
    ///
    /// Every earlier branch condition is negated onto the new branch.
    fn next_branch(&mut self, requirement: Option<Requirement>, label: &str) {
        let mut requirements = RequirementSet::new();
        for previous in &self.chain {
            requirements.insert(previous.negated());
        }
        if let Some(requirement) = requirement {
            requirements.insert(requirement.clone());
            self.chain.push(requirement);
        }
        let branch = Branch::new(BlockType::Conditional, requirements, Some(label.to_string()));
        let finished = std::mem::replace(&mut self.current, branch);
        self.done.push(finished);
    }
}

struct Parser<'t> {
    tree: ScriptTree,
    translator: &'t mut ConditionTranslator,
}

impl Parser<'_> {
    fn translate(&mut self, parent: BlockId, condition: &str) -> Requirement {
        let locals = self.tree.visible_locals(parent);
        let script = self
            .tree
            .block(parent)
            .script
            .clone()
            .or_else(|| self.tree.script().map(str::to_string));
        self.translator
            .translate_or_raw(condition, Scope::new(script.as_deref(), &locals))
    }

    fn flush(&mut self, parent: BlockId, pending: &mut Vec<&str>) {
        if pending.is_empty() {
            return;
        }
        let id = self.tree.push_block(BlockType::Sequential, Some(parent), RequirementSet::new());
        self.tree.block_mut(id).lines = pending.drain(..).map(str::to_string).collect();
    }

    fn close(&mut self, parent: BlockId, open: OpenLabel<'_>) {
        let OpenLabel { mut done, current, .. } = open;
        done.push(current);
        for branch in done {
            let id = self.tree.push_block(branch.kind, Some(parent), branch.requirements);
            let block = self.tree.block_mut(id);
            block.label = branch.label;
            if branch.script.is_some() {
                block.script = branch.script;
            }
            self.parse_level(id, &branch.lines);
        }
    }

    fn parse_level<'a>(&mut self, parent: BlockId, lines: &[&'a str]) {
        let mut pending: Vec<&'a str> = Vec::new();
        let mut open: Option<OpenLabel<'a>> = None;

        for &line in lines {
            let classified = classify(line);
            if let Some(state) = open.as_mut() {
                match classified {
                    Line::Label(label, _) if label.opens() == Some(state.family) => {
                        state.nesting += 1;
                        state.current.lines.push(line);
                    },
                    Line::Label(label, _) if label.closes() == Some(state.family) => {
                        if state.nesting == 0 {
                            if let Some(finished) = open.take() {
                                self.close(parent, finished);
                            }
                        } else {
                            state.nesting -= 1;
                            state.current.lines.push(line);
                        }
                    },
                    Line::Label(Label::ElseIf, condition) if state.family == Family::If && state.nesting == 0 => {
                        let requirement = self.translate(parent, condition);
                        state.next_branch(Some(requirement), condition);
                    },
                    Line::Label(Label::Else, _) if state.family == Family::If && state.nesting == 0 => {
                        state.next_branch(None, "else");
                    },
                    _ => state.current.lines.push(line),
                }
                continue;
            }

            match classified {
                Line::Label(label @ (Label::Begin | Label::Dialog), name) => {
                    self.flush(parent, &mut pending);
                    let name = unquote(name.split_whitespace().next().unwrap_or_default()).to_ascii_lowercase();
                    let mut branch = Branch::new(BlockType::Begin, RequirementSet::new(), Some(name.clone()));
                    if label == Label::Begin && !name.is_empty() {
                        if self.tree.script().is_none() {
                            self.tree.set_script(name.clone());
                        }
                        branch.script = Some(name);
                    }
                    open = Some(OpenLabel::new(Family::Begin, branch));
                },
                Line::Label(Label::If, condition) => {
                    self.flush(parent, &mut pending);
                    let requirement = self.translate(parent, condition);
                    open = Some(OpenLabel::conditional(BlockType::Conditional, Family::If, requirement, condition));
                },
                Line::Label(Label::While, condition) => {
                    self.flush(parent, &mut pending);
                    let requirement = self.translate(parent, condition);
                    open = Some(OpenLabel::conditional(BlockType::Loop, Family::While, requirement, condition));
                },
                // continuation or closing label with nothing open
                Line::Label(..) => pending.push(line),
                Line::Declaration(kind, name) => {
                    self.tree.block_mut(parent).locals.insert(name, kind);
                },
                Line::Statement(text) => pending.push(text),
            }
        }

        if let Some(unclosed) = open {
            self.close(parent, unclosed);
        }
        self.flush(parent, &mut pending);
    }
}

impl ScriptTree {
    /// Parse script source into a control-flow tree.
    ///
    /// The script id is taken from the first `begin` label. Conditions are
    /// translated with `translator`, which accumulates anything it could not
    /// recognize.
    pub fn parse(source: &str, translator: &mut ConditionTranslator) -> ScriptTree {
        let lines = source_lines(source);
        let mut parser = Parser {
            tree: ScriptTree::empty(None),
            translator,
        };
        let root = parser.tree.root();
        parser.parse_level(root, &lines);
        parser.tree.propagate_script();
        parser.tree
    }

    /// Parse a dialogue result as a `_dialog_` block whose root carries the
    /// dialogue's own filter requirements.
    pub fn parse_dialogue(
        info_id: &str,
        result: &str,
        requirements: RequirementSet,
        translator: &mut ConditionTranslator,
    ) -> ScriptTree {
        let source = format!("_dialog_ {info_id}\n{result}\nend");
        let mut tree = Self::parse(&source, translator);
        let root = tree.root();
        let mut requirements = requirements;
        requirements.block = Some(root);
        tree.block_mut(root).requirements = requirements;
        tree
    }
}
