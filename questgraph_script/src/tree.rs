//! Control-flow tree of a parsed script.
//!
//! Blocks live in an arena owned by [`ScriptTree`]; parents and children are
//! referenced by [`BlockId`], so a block never owns its parent. The
//! requirements needed to reach a block are the concatenation of the direct
//! requirements on its root-to-block path and are recomputed on every query.

use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use serde::{Deserialize, Serialize};
use variantly::Variantly;

use crate::requirement::RequirementSet;

/// Index of a block inside its [`ScriptTree`]; unique per parse.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub usize);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Variantly)]
pub enum BlockType {
    Sequential,
    Begin,
    Conditional,
    Loop,
}

/// Declared type of a script local.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VariableType {
    Short,
    Long,
    Float,
}

impl VariableType {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "short" => Some(Self::Short),
            "long" => Some(Self::Long),
            "float" => Some(Self::Float),
            _ => None,
        }
    }
}

/// Whether an assigned variable was declared by an enclosing block.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Variantly)]
#[serde(rename_all = "camelCase")]
pub enum VariableScope {
    Local,
    Global,
}

/// One node of the control-flow tree.
#[derive(Debug, Clone)]
pub struct ScriptBlock {
    pub id: BlockId,
    pub kind: BlockType,
    /// Owning script (lower-cased).
    pub script: Option<String>,
    pub parent: Option<BlockId>,
    pub children: Vec<BlockId>,
    /// Conditions that must hold to enter this block from its parent.
    pub requirements: RequirementSet,
    /// Locals declared directly in this block (lower-cased name -> type).
    pub locals: BTreeMap<String, VariableType>,
    /// Statement lines of a sequential block.
    pub lines: Vec<String>,
    /// Label text the block was opened with (`begin` name or condition).
    pub label: Option<String>,
}

/// A `set NAME to VALUE` statement and the conditions in force where it runs.
#[derive(Debug, Clone)]
pub struct VariableAssignment {
    pub name: String,
    pub script: Option<String>,
    /// Right-hand side as written.
    pub text: String,
    pub value: Option<f64>,
    pub scope: VariableScope,
    pub block: BlockId,
    pub requirements: RequirementSet,
}

/// Arena-backed control-flow tree for one script or dialogue result.
#[derive(Debug, Clone)]
pub struct ScriptTree {
    blocks: Vec<ScriptBlock>,
    script: Option<String>,
    variables: OnceCell<BTreeMap<String, Vec<VariableAssignment>>>,
}

impl ScriptTree {
    /// A tree holding only an empty sequential root.
    pub fn empty(script: Option<String>) -> Self {
        let mut tree = Self {
            blocks: Vec::new(),
            script: script.clone(),
            variables: OnceCell::new(),
        };
        let root = tree.push_block(BlockType::Sequential, None, RequirementSet::new());
        tree.block_mut(root).script = script;
        tree
    }

    pub fn root(&self) -> BlockId {
        BlockId(0)
    }

    /// Script id taken from the `begin` label, lower-cased.
    pub fn script(&self) -> Option<&str> {
        self.script.as_deref()
    }

    pub(crate) fn set_script(&mut self, script: String) {
        self.script = Some(script);
    }

    pub fn block(&self, id: BlockId) -> &ScriptBlock {
        &self.blocks[id.0]
    }

    pub fn get(&self, id: BlockId) -> Option<&ScriptBlock> {
        self.blocks.get(id.0)
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> &mut ScriptBlock {
        &mut self.blocks[id.0]
    }

    pub fn blocks(&self) -> impl Iterator<Item = &ScriptBlock> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.len() <= 1
    }

    /// Create a block under `parent` and return its id.
    pub(crate) fn push_block(&mut self, kind: BlockType, parent: Option<BlockId>, requirements: RequirementSet) -> BlockId {
        let id = BlockId(self.blocks.len());
        let mut requirements = requirements;
        requirements.block = Some(id);
        let script = parent.and_then(|p| self.blocks[p.0].script.clone());
        self.blocks.push(ScriptBlock {
            id,
            kind,
            script,
            parent,
            children: Vec::new(),
            requirements,
            locals: BTreeMap::new(),
            lines: Vec::new(),
            label: None,
        });
        if let Some(parent) = parent {
            self.blocks[parent.0].children.push(id);
        }
        self.variables.take();
        id
    }

    /// Block ids from the root down to `id`, inclusive.
    pub fn path(&self, id: BlockId) -> Vec<BlockId> {
        let mut path = vec![id];
        let mut current = self.blocks[id.0].parent;
        while let Some(parent) = current {
            path.push(parent);
            current = self.blocks[parent.0].parent;
        }
        path.reverse();
        path
    }

    /// Every requirement on the path from the root to `id`.
    pub fn path_requirements(&self, id: BlockId) -> RequirementSet {
        let mut set = RequirementSet::for_block(id);
        for block in self.path(id) {
            set.extend_from(&self.blocks[block.0].requirements);
        }
        set
    }

    /// Names of locals declared in `id` or any of its ancestors.
    pub fn visible_locals(&self, id: BlockId) -> BTreeSet<String> {
        self.path(id)
            .into_iter()
            .flat_map(|b| self.blocks[b.0].locals.keys().cloned())
            .collect()
    }

    pub fn is_local(&self, id: BlockId, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.path(id).into_iter().any(|b| self.blocks[b.0].locals.contains_key(&name))
    }

    /// Nesting depth of `id` (the root is 0).
    pub fn depth(&self, id: BlockId) -> usize {
        self.path(id).len() - 1
    }

    /// Every `set` statement in the tree, keyed by lower-cased variable name.
    ///
    /// Built on first use and discarded whenever the tree grows.
    pub fn variables(&self) -> &BTreeMap<String, Vec<VariableAssignment>> {
        self.variables.get_or_init(|| self.find_variables())
    }

    /// Assignments to `name` (case-insensitive).
    pub fn assignments(&self, name: &str) -> &[VariableAssignment] {
        self.variables()
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Copy `other` into this tree as a new child of `at`.
    ///
    /// Returns the index range of the copied blocks; the first one is the copy of `other`'s root.
    pub fn graft(&mut self, at: BlockId, other: &ScriptTree) -> Range<usize> {
        let offset = self.blocks.len();
        let shift = |id: BlockId| BlockId(id.0 + offset);
        for block in &other.blocks {
            let mut copy = block.clone();
            copy.id = shift(block.id);
            copy.parent = Some(block.parent.map_or(at, shift));
            copy.children = block.children.iter().copied().map(shift).collect();
            copy.requirements.block = Some(copy.id);
            if copy.script.is_none() {
                copy.script = other.script.clone();
            }
            self.blocks.push(copy);
        }
        self.blocks[at.0].children.push(BlockId(offset));
        self.variables.take();
        offset..self.blocks.len()
    }

    /// Give every block without an owning script the tree's script id.
    pub(crate) fn propagate_script(&mut self) {
        if let Some(script) = &self.script {
            for block in &mut self.blocks {
                if block.script.is_none() {
                    block.script = Some(script.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirement::{Operator, Requirement, RequirementKind};

    fn cond(name: &str) -> RequirementSet {
        [Requirement::new(RequirementKind::LocalVariable, Operator::Equal)
            .with_variable(name)
            .with_value(1.0)]
        .into_iter()
        .collect()
    }

    #[test]
    fn path_requirements_concatenate_from_the_root() {
        let mut tree = ScriptTree::empty(Some("test".into()));
        let root = tree.root();
        let outer = tree.push_block(BlockType::Conditional, Some(root), cond("a"));
        let inner = tree.push_block(BlockType::Conditional, Some(outer), cond("b"));
        let leaf = tree.push_block(BlockType::Sequential, Some(inner), RequirementSet::new());

        let path = tree.path_requirements(leaf);
        let names: Vec<_> = path.iter().filter_map(|r| r.variable.as_deref()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(path.block, Some(leaf));
        assert_eq!(tree.depth(leaf), 3);
        assert_eq!(tree.block(inner).parent, Some(outer));
    }

    #[test]
    fn locals_are_visible_below_their_declaration() {
        let mut tree = ScriptTree::empty(None);
        let root = tree.root();
        let begin = tree.push_block(BlockType::Begin, Some(root), RequirementSet::new());
        tree.block_mut(begin).locals.insert("doonce".into(), VariableType::Short);
        let child = tree.push_block(BlockType::Conditional, Some(begin), cond("x"));

        assert!(tree.is_local(child, "doOnce"));
        assert!(!tree.is_local(root, "doonce"));
        assert!(tree.visible_locals(child).contains("doonce"));
    }

    #[test]
    fn graft_reindexes_copied_blocks() {
        let mut callee = ScriptTree::empty(Some("callee".into()));
        let callee_root = callee.root();
        callee.push_block(BlockType::Begin, Some(callee_root), RequirementSet::new());

        let mut caller = ScriptTree::empty(Some("caller".into()));
        let caller_root = caller.root();
        let site = caller.push_block(BlockType::Conditional, Some(caller_root), cond("go"));

        let range = caller.graft(site, &callee);
        assert_eq!(range, 2..4);
        let grafted_root = BlockId(range.start);
        assert_eq!(caller.block(grafted_root).parent, Some(site));
        assert_eq!(caller.block(BlockId(3)).parent, Some(grafted_root));
        assert_eq!(caller.block(BlockId(3)).script.as_deref(), Some("callee"));
        assert!(caller.block(site).children.contains(&grafted_root));
        assert_eq!(caller.path_requirements(BlockId(3)).len(), 1);
    }
}
