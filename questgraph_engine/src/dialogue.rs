//! Dialogue filters as requirements.
//!
//! A dialogue response is only available when its speaker filters and
//! condition descriptors hold. Those are mapped onto the same [`Requirement`]
//! model the script translator produces, so dialogue-sourced and
//! script-sourced hits can be compared and merged.

use questgraph_data::{
    ConditionOperator, DialogueCondition, DialogueConditionKind, DialogueInfo, DialogueKind, DialogueTopic,
};
use questgraph_script::translate::{attribute_index, skill_index};
use questgraph_script::{Operator, PLAYER, Requirement, RequirementKind, RequirementSet};

/// Map the decoder's operator code onto a requirement operator.
pub fn operator_from_def(operator: ConditionOperator) -> Operator {
    match operator {
        ConditionOperator::Equal => Operator::Equal,
        ConditionOperator::NotEqual => Operator::NotEqual,
        ConditionOperator::Greater => Operator::Greater,
        ConditionOperator::GreaterOrEqual => Operator::GreaterOrEqual,
        ConditionOperator::Less => Operator::Less,
        ConditionOperator::LessOrEqual => Operator::LessOrEqual,
    }
}

fn lower(id: &str) -> String {
    id.to_ascii_lowercase()
}

/// Every requirement that gates `info` inside `topic`, in filter order.
pub fn info_requirements(topic: &DialogueTopic, info: &DialogueInfo) -> RequirementSet {
    let mut set = RequirementSet::new();
    let speaker = info.actor.as_deref().map(lower);

    if topic.kind == DialogueKind::Topic {
        set.insert(Requirement::new(RequirementKind::Topic, Operator::Equal).with_variable(lower(&topic.id)));
    }
    if let Some(actor) = &speaker {
        set.insert(Requirement::new(RequirementKind::Actor, Operator::Equal).with_object(actor.clone()));
    }
    if let Some(race) = &info.race {
        set.insert(Requirement::new(RequirementKind::Race, Operator::Equal).with_text(lower(race)));
    }
    if let Some(class) = &info.class {
        set.insert(Requirement::new(RequirementKind::Class, Operator::Equal).with_text(lower(class)));
    }
    if let Some(faction) = &info.faction {
        set.insert(Requirement::new(RequirementKind::Faction, Operator::Equal).with_text(lower(faction)));
        if let Some(rank) = info.rank {
            set.insert(
                Requirement::new(RequirementKind::Rank, Operator::GreaterOrEqual)
                    .with_variable(lower(faction))
                    .with_value(f64::from(rank)),
            );
        }
    }
    if let Some(cell) = &info.cell {
        set.insert(Requirement::new(RequirementKind::Cell, Operator::Equal).with_text(lower(cell)));
    }
    if let Some(faction) = &info.pc_faction {
        set.insert(
            Requirement::new(RequirementKind::Faction, Operator::Equal)
                .with_text(lower(faction))
                .with_object(PLAYER),
        );
        if let Some(rank) = info.pc_rank {
            set.insert(
                Requirement::new(RequirementKind::Rank, Operator::GreaterOrEqual)
                    .with_variable(lower(faction))
                    .with_object(PLAYER)
                    .with_value(f64::from(rank)),
            );
        }
    }
    if info.disposition > 0 {
        let mut requirement =
            Requirement::new(RequirementKind::Disposition, Operator::GreaterOrEqual).with_value(f64::from(info.disposition));
        requirement.object.clone_from(&speaker);
        set.insert(requirement);
    }
    if let Some(gender) = info.gender {
        set.insert(Requirement::new(RequirementKind::Gender, Operator::Equal).with_value(gender.value()));
    }

    for condition in &info.conditions {
        set.insert(condition_requirement(condition, speaker.as_deref()));
    }
    set
}

/// Translate one condition descriptor.
///
/// `speaker` scopes local-variable descriptors, which read the speaker's script.
pub fn condition_requirement(condition: &DialogueCondition, speaker: Option<&str>) -> Requirement {
    use DialogueConditionKind as C;

    let name = lower(condition.name.trim());
    let operator = operator_from_def(condition.operator);
    let compare = |kind: RequirementKind| Requirement::new(kind, operator).with_value(condition.value);
    let not = |kind: RequirementKind| Requirement::new(kind, Operator::NotEqual);

    match condition.kind {
        C::Function => function_requirement(&name, operator, condition.value),
        C::Global => compare(RequirementKind::GlobalVariable).with_variable(name),
        C::Local => {
            let mut requirement = compare(RequirementKind::LocalVariable).with_variable(name);
            requirement.object = speaker.map(str::to_string);
            requirement
        },
        C::Journal => compare(RequirementKind::Journal).with_variable(name).with_object(PLAYER),
        C::Item => compare(RequirementKind::Item).with_variable(name).with_object(PLAYER),
        C::Dead => compare(RequirementKind::Dead).with_variable(name),
        C::NotId => not(RequirementKind::Actor).with_variable(name),
        C::NotFaction => not(RequirementKind::Faction).with_text(name),
        C::NotClass => not(RequirementKind::Class).with_text(name),
        C::NotRace => not(RequirementKind::Race).with_text(name),
        C::NotCell => not(RequirementKind::Cell).with_text(name),
        C::NotLocal => {
            let mut requirement = not(RequirementKind::LocalVariable)
                .with_variable(name)
                .with_value(condition.value);
            requirement.object = speaker.map(str::to_string);
            requirement
        },
    }
}

/// Function descriptors: `choice`, `pc<skill>`, `pc<attribute>` and friends.
fn function_requirement(name: &str, operator: Operator, value: f64) -> Requirement {
    let base = |kind: RequirementKind| Requirement::new(kind, operator).with_value(value);
    let player = |kind: RequirementKind| base(kind).with_object(PLAYER);

    if name == "choice" {
        return base(RequirementKind::Choice);
    }
    if let Some(stat) = name.strip_prefix("pc") {
        if let Some(index) = skill_index(stat) {
            let mut requirement = player(RequirementKind::Skill);
            requirement.skill = Some(index);
            return requirement;
        }
        if let Some(index) = attribute_index(stat) {
            let mut requirement = player(RequirementKind::Attribute);
            requirement.attribute = Some(index);
            return requirement;
        }
        match stat {
            "level" => return player(RequirementKind::Level),
            "reputation" => return player(RequirementKind::Reputation),
            "sex" | "gender" => return player(RequirementKind::Gender),
            "health" | "healthpercent" => return player(RequirementKind::Health),
            _ => {},
        }
    }
    match name {
        "reputation" => base(RequirementKind::Reputation),
        "level" => base(RequirementKind::Level),
        "healthpercent" => base(RequirementKind::Health),
        "samefaction" => base(RequirementKind::Faction),
        _ => base(RequirementKind::Custom(name.to_string())),
    }
}
