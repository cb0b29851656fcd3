//! Single-assignment substitution over requirement sets.
//!
//! Guard variables such as `doOnce` show up as local-variable requirements on
//! journal calls. When a variable is assigned exactly once in the tree, the
//! requirement says less about the call than the conditions in force where
//! the assignment runs, so those conditions are substituted for it. This is
//! an approximation, not a data-flow analysis: loops, ordering and
//! assignments from other scripts are ignored.

use log::trace;

use crate::requirement::{Requirement, RequirementKind, RequirementSet};
use crate::tree::{ScriptTree, VariableAssignment};

/// Only unscoped local-variable requirements are candidates.
fn eligible(requirement: &Requirement) -> bool {
    requirement.kind == RequirementKind::LocalVariable
        && requirement.object.is_none()
        && requirement.variable.is_some()
        && requirement.value.is_some()
}

/// The one assignment to the requirement's variable, if there is exactly one.
fn single_assignment<'t>(requirement: &Requirement, tree: &'t ScriptTree) -> Option<&'t VariableAssignment> {
    let name = requirement.variable.as_deref()?;
    let mut candidates = tree.assignments(name).iter().filter(|assignment| {
        match (&requirement.script, &assignment.script) {
            (Some(wanted), Some(owner)) => wanted == owner,
            _ => true,
        }
    });
    let first = candidates.next()?;
    if candidates.next().is_some() {
        return None;
    }
    Some(first)
}

/// Fold single-assignment local variables out of `requirements`.
///
/// Scans back to front and restarts after every change, so requirements
/// spliced in from an assignment's path are themselves candidates. Each
/// distinct requirement is considered once.
///
/// * an assignment in the set's own block whose value fails the test drops
///   the requirement (the `doOnce` guard idiom);
/// * an assignment in another block whose value passes the test replaces the
///   requirement with that block's path requirements, minus any on the same
///   variable;
/// * anything else is left as is.
pub fn resolve_variables(requirements: &RequirementSet, tree: &ScriptTree) -> RequirementSet {
    let mut resolved = requirements.clone();
    let mut processed: Vec<Requirement> = Vec::new();

    'scan: loop {
        for position in (0..resolved.len()).rev() {
            let Some(requirement) = resolved.get(position) else {
                continue;
            };
            if !eligible(requirement) || processed.contains(requirement) {
                continue;
            }
            let requirement = requirement.clone();
            processed.push(requirement.clone());

            let Some(assignment) = single_assignment(&requirement, tree) else {
                continue;
            };
            let Some(passes) = assignment.value.and_then(|value| requirement.test_value(value)) else {
                continue;
            };

            if Some(assignment.block) == resolved.block {
                if !passes {
                    trace!("dropping same-block guard {requirement}");
                    resolved.remove(position);
                    continue 'scan;
                }
            } else if passes {
                trace!("substituting {requirement} with {}", assignment.requirements);
                resolved.remove(position);
                let mut at = position;
                for inherited in &assignment.requirements {
                    if inherited.is_local_on(&assignment.name) {
                        continue;
                    }
                    if resolved.insert_at(at, inherited.clone()) {
                        at += 1;
                    }
                }
                continue 'scan;
            }
        }
        break;
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirement::Operator;
    use crate::translate::ConditionTranslator;

    fn parse(source: &str) -> ScriptTree {
        ScriptTree::parse(source, &mut ConditionTranslator::new())
    }

    fn journal_requirements(tree: &ScriptTree) -> RequirementSet {
        let call = tree.find_journal_calls().into_iter().next().unwrap();
        resolve_variables(&call.site.requirements, tree)
    }

    #[test]
    fn single_assignment_is_replaced_by_its_path() {
        let tree = parse(
            "begin t\nshort doOnce\nif ( OnActivate == 1 )\nset doOnce to 1\nendif\nif ( doOnce == 1 )\nJournal q 10\nendif\nend",
        );
        let resolved = journal_requirements(&tree);
        assert!(resolved.iter().all(|r| !r.is_local_on("doonce")));
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved.get(0).unwrap().kind, RequirementKind::Activated);
    }

    #[test]
    fn same_block_guard_is_dropped() {
        let tree = parse("begin t\nshort doOnce\nif ( doOnce == 0 )\nJournal q 10\nset doOnce to 1\nendif\nend");
        assert!(journal_requirements(&tree).is_empty());
    }

    #[test]
    fn multiple_assignments_are_left_alone() {
        let tree = parse(
            "begin t\nshort state\nset state to 1\nif ( OnActivate == 1 )\nset state to 2\nendif\nif ( state == 2 )\nJournal q 10\nendif\nend",
        );
        let resolved = journal_requirements(&tree);
        assert_eq!(resolved.len(), 1);
        assert!(resolved.get(0).unwrap().is_local_on("state"));
    }

    #[test]
    fn failing_assignment_elsewhere_is_kept() {
        let tree = parse("begin t\nshort flag\nset flag to 0\nif ( flag == 1 )\nJournal q 10\nendif\nend");
        let resolved = journal_requirements(&tree);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved.get(0).unwrap().operator, Operator::Equal);
    }

    #[test]
    fn spliced_requirements_are_resolved_in_turn() {
        let tree = parse(
            "begin t\nshort a\nshort b\nif ( GetDisabled == 0 )\nset a to 1\nendif\nif ( a == 1 )\nset b to 1\nendif\nif ( b == 1 )\nJournal q 10\nendif\nend",
        );
        let resolved = journal_requirements(&tree);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved.get(0).unwrap().kind, RequirementKind::Disabled);
    }

    #[test]
    fn scoped_requirements_are_not_candidates() {
        let tree = parse("begin t\nset flag to 1\nif ( \"fargoth\"->flag == 1 )\nJournal q 10\nendif\nend");
        let resolved = journal_requirements(&tree);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved.get(0).unwrap().object.as_deref(), Some("fargoth"));
    }
}
