//! Finding assignments and calls inside a parsed [`ScriptTree`].
//!
//! Every hit carries the block it was found in and the requirements on the
//! path to that block, which is what the quest and object builders consume.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::Write as _;
use std::ops::Range;

use lazy_static::lazy_static;
use log::{debug, trace, warn};
use regex::Regex;

use crate::requirement::RequirementSet;
use crate::translate::{strip_parens, unquote};
use crate::tree::{BlockId, ScriptTree, VariableAssignment, VariableScope};

lazy_static! {
    static ref ASSIGNMENT: Regex =
        Regex::new(r"(?i)^set\s+([A-Za-z_]\w*)\s+to\s+(.+)$").expect("valid assignment pattern");
}

/// Shape of one positional call argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgPattern {
    /// Any quoted string or bare identifier.
    Any,
    /// This exact identifier, quoted or bare (case-insensitive).
    Literal(String),
    /// An integer or decimal number.
    Number,
}

impl ArgPattern {
    fn token(&self) -> String {
        match self {
            Self::Any => r#""[^"]*"|[\w\-'\.]+"#.to_string(),
            Self::Literal(text) => {
                let escaped = regex::escape(text);
                format!(r#""{escaped}"|{escaped}\b"#)
            },
            Self::Number => r"-?\d+(?:\.\d+)?".to_string(),
        }
    }
}

/// Describes the calls to look for: one or more function names, an optional
/// required scope object and the leading arguments.
///
/// ```
/// use questgraph_script::{ArgPattern, CallPattern};
///
/// let pattern = CallPattern::new("Journal").or("SetJournalIndex").arg(ArgPattern::Any).arg(ArgPattern::Number);
/// assert_eq!(pattern.functions().len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallPattern {
    functions: Vec<String>,
    scope: Option<String>,
    args: Vec<ArgPattern>,
}

impl CallPattern {
    pub fn new(function: &str) -> Self {
        Self {
            functions: vec![function.to_ascii_lowercase()],
            ..Self::default()
        }
    }

    /// Also accept `function` as the call name.
    #[must_use]
    pub fn or(mut self, function: &str) -> Self {
        self.functions.push(function.to_ascii_lowercase());
        self
    }

    /// Only match calls explicitly applied to `object` (`object->Function`).
    #[must_use]
    pub fn scoped(mut self, object: &str) -> Self {
        self.scope = Some(object.to_ascii_lowercase());
        self
    }

    #[must_use]
    pub fn arg(mut self, arg: ArgPattern) -> Self {
        self.args.push(arg);
        self
    }

    pub fn functions(&self) -> &[String] {
        &self.functions
    }

    fn regex(&self) -> Result<Regex, regex::Error> {
        let names: Vec<String> = self.functions.iter().map(|f| regex::escape(f)).collect();
        let mut pattern = format!(
            r#"(?i)(?:^|[\s,;(])(?:(?P<scope>"[^"]+"|[\w\-']+)\s*->\s*)?(?P<function>{})\b"#,
            names.join("|")
        );
        for (index, arg) in self.args.iter().enumerate() {
            let _ = write!(pattern, r"(?:\s*,\s*|\s+)(?P<a{index}>{})", arg.token());
        }
        Regex::new(&pattern)
    }
}

/// One matched call.
#[derive(Debug, Clone)]
pub struct CallSite {
    /// Function name as matched, lower-cased.
    pub function: String,
    /// Explicit scope object, lower-cased and unquoted.
    pub scope: Option<String>,
    /// Captured arguments, unquoted, in pattern order.
    pub args: Vec<String>,
    pub block: BlockId,
    pub script: Option<String>,
    /// Requirements on the path to the call's block.
    pub requirements: RequirementSet,
    pub line: String,
}

/// A `Journal`/`SetJournalIndex` call.
#[derive(Debug, Clone)]
pub struct JournalCall {
    /// Quest id, lower-cased.
    pub quest: String,
    pub index: i32,
    pub site: CallSite,
}

impl ScriptTree {
    /// Collect every `set NAME to VALUE` statement.
    pub(crate) fn find_variables(&self) -> BTreeMap<String, Vec<VariableAssignment>> {
        let mut found: BTreeMap<String, Vec<VariableAssignment>> = BTreeMap::new();
        for block in self.blocks() {
            for line in &block.lines {
                let Some(caps) = ASSIGNMENT.captures(line) else {
                    continue;
                };
                let name = caps[1].to_ascii_lowercase();
                let text = caps[2].trim().to_string();
                let value = strip_parens(&text).parse::<f64>().ok();
                let scope = if self.is_local(block.id, &name) {
                    VariableScope::Local
                } else {
                    VariableScope::Global
                };
                found.entry(name.clone()).or_default().push(VariableAssignment {
                    name,
                    script: block.script.clone(),
                    text,
                    value,
                    scope,
                    block: block.id,
                    requirements: self.path_requirements(block.id),
                });
            }
        }
        found
    }

    /// Every call in the tree matching `pattern`.
    pub fn find_calls(&self, pattern: &CallPattern) -> Vec<CallSite> {
        self.find_calls_in(pattern, 0..self.len())
    }

    fn find_calls_in(&self, pattern: &CallPattern, range: Range<usize>) -> Vec<CallSite> {
        let regex = match pattern.regex() {
            Ok(regex) => regex,
            Err(err) => {
                warn!("invalid call pattern {:?}: {err}", pattern.functions);
                return Vec::new();
            },
        };
        let mut sites = Vec::new();
        for id in range.map(BlockId) {
            let Some(block) = self.get(id) else {
                break;
            };
            for line in &block.lines {
                for caps in regex.captures_iter(line) {
                    let scope = caps.name("scope").map(|m| unquote(m.as_str()).to_ascii_lowercase());
                    if pattern.scope.is_some() && scope != pattern.scope {
                        continue;
                    }
                    let args = (0..pattern.args.len())
                        .filter_map(|i| caps.name(&format!("a{i}")))
                        .map(|m| unquote(m.as_str()).to_string())
                        .collect();
                    sites.push(CallSite {
                        function: caps["function"].to_ascii_lowercase(),
                        scope,
                        args,
                        block: id,
                        script: block.script.clone(),
                        requirements: self.path_requirements(id),
                        line: line.clone(),
                    });
                }
            }
        }
        sites
    }

    /// Every journal update with a literal quest id and index.
    pub fn find_journal_calls(&self) -> Vec<JournalCall> {
        let pattern = CallPattern::new("journal")
            .or("setjournalindex")
            .arg(ArgPattern::Any)
            .arg(ArgPattern::Number);
        self.find_calls(&pattern)
            .into_iter()
            .filter_map(|site| {
                let quest = site.args.first()?.to_ascii_lowercase();
                let Ok(index) = site.args.get(1)?.parse::<i32>() else {
                    debug!("non-integer journal index in '{}'", site.line);
                    return None;
                };
                Some(JournalCall { quest, index, site })
            })
            .collect()
    }

    /// Graft the trees of scripts started with `StartScript` under their call blocks.
    ///
    /// `lookup` resolves a lower-cased script id. Grafted blocks are searched
    /// again, up to `max_depth` levels; a block inlines each target once.
    /// Returns the number of grafts made.
    pub fn inline_start_scripts<'s>(
        &mut self,
        lookup: impl Fn(&str) -> Option<&'s ScriptTree>,
        max_depth: usize,
    ) -> usize {
        let pattern = CallPattern::new("startscript").arg(ArgPattern::Any);
        let mut visited: BTreeSet<(BlockId, String)> = BTreeSet::new();
        let mut queue: VecDeque<(Range<usize>, usize)> = VecDeque::from([(0..self.len(), 0)]);
        let mut grafted = 0;

        while let Some((range, depth)) = queue.pop_front() {
            if depth >= max_depth {
                debug!("start script inlining stopped at depth {depth}");
                continue;
            }
            let targets: Vec<(BlockId, String)> = self
                .find_calls_in(&pattern, range)
                .into_iter()
                .filter_map(|site| Some((site.block, site.args.first()?.to_ascii_lowercase())))
                .collect();
            for (block, target) in targets {
                if !visited.insert((block, target.clone())) {
                    continue;
                }
                if self.block(block).script.as_deref() == Some(target.as_str()) {
                    continue;
                }
                let Some(callee) = lookup(&target) else {
                    debug!("StartScript target '{target}' not found");
                    continue;
                };
                let range = self.graft(block, callee);
                trace!("inlined '{target}' at block {} as {:?}", block.0, range);
                grafted += 1;
                queue.push_back((range, depth + 1));
            }
        }
        grafted
    }
}
