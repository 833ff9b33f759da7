//! The for-each-group state machines.
//!
//! All four algorithms run in a single forward pass over the population.
//! `group-by` preserves the order in which distinct keys were first
//! encountered; the starting/ending variants split the population into
//! consecutive runs and carry no grouping key.

use crate::context::{Context, Focus, GroupState};
use crate::error::EngineError;
use crate::expr::Expression;
use crate::instruct::sort::{self, SortKey};
use crate::instruct::{GroupAlgorithm, Instruction};
use std::collections::HashMap;
use std::sync::Arc;
use weft_model::{AtomicValue, Collation, Item, Pattern, Receiver, Sequence, SourceNode};

struct Group<N> {
    key: Option<AtomicValue>,
    items: Vec<Item<N>>,
}

pub(crate) fn process_groups<N: SourceNode>(
    ctx: &mut Context<'_, '_, N>,
    select: &Arc<dyn Expression<N>>,
    algorithm: &GroupAlgorithm<N>,
    sort_keys: &[SortKey<N>],
    body: &Instruction<N>,
    out: &mut dyn Receiver,
) -> Result<(), EngineError> {
    let population = select.evaluate(ctx)?;
    let mut groups = match algorithm {
        GroupAlgorithm::By { key, collation } => group_by(ctx, &population, key, collation)?,
        GroupAlgorithm::Adjacent { key, collation } => {
            group_adjacent(ctx, &population, key, collation)?
        }
        GroupAlgorithm::StartingWith(pattern) => group_starting_with(&population, pattern),
        GroupAlgorithm::EndingWith(pattern) => group_ending_with(&population, pattern),
    };

    // Trailing sort keys reorder the groups, not their members; each key is
    // evaluated with the group's initial item as the focus and the group's
    // registers (current-group, current-grouping-key) in place.
    if !sort_keys.is_empty() {
        let size = groups.len();
        let saved = ctx.frame.group.take();
        let mut decorated = Vec::with_capacity(size);
        let mut failure = None;
        for (i, group) in groups.into_iter().enumerate() {
            let Some(initial) = group.items.first().cloned() else {
                continue;
            };
            ctx.frame.group = Some(GroupState {
                items: Sequence::from_items(group.items.clone()),
                key: group.key.clone(),
            });
            let focus = Focus {
                item: initial,
                position: i + 1,
                size,
            };
            match ctx.with_focus(focus, |c| sort::evaluate_keys(c, sort_keys)) {
                Ok(values) => decorated.push((group, values)),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        ctx.frame.group = saved;
        if let Some(err) = failure {
            return Err(err);
        }
        decorated.sort_by(|a, b| sort::compare_chains(&a.1, &b.1, sort_keys));
        groups = decorated.into_iter().map(|(g, _)| g).collect();
    }

    let count = groups.len();
    let saved_rule = ctx.frame.current_rule.take();
    let saved_group = ctx.frame.group.take();
    let mut result = Ok(());
    for (i, group) in groups.into_iter().enumerate() {
        let Some(initial) = group.items.first().cloned() else {
            continue;
        };
        ctx.frame.group = Some(GroupState {
            items: Sequence::from_items(group.items),
            key: group.key,
        });
        let focus = Focus {
            item: initial,
            position: i + 1,
            size: count,
        };
        result = ctx.with_focus(focus, |c| body.process(c, out));
        if result.is_err() {
            break;
        }
    }
    ctx.frame.group = saved_group;
    ctx.frame.current_rule = saved_rule;
    result
}

/// The grouping key of the focus item as a single atomic value.
fn grouping_key<N: SourceNode>(
    ctx: &Context<'_, '_, N>,
    key: &Arc<dyn Expression<N>>,
) -> Result<AtomicValue, EngineError> {
    let sequence = key.evaluate(ctx)?;
    Ok(match sequence.items() {
        [Item::Atomic(a)] => a.clone(),
        _ => AtomicValue::String(sequence.string_join(" ")),
    })
}

fn group_by<N: SourceNode>(
    ctx: &mut Context<'_, '_, N>,
    population: &Sequence<N>,
    key: &Arc<dyn Expression<N>>,
    collation: &Arc<dyn Collation>,
) -> Result<Vec<Group<N>>, EngineError> {
    let size = population.len();
    let mut order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Group<N>> = HashMap::new();

    for (i, item) in population.iter().enumerate() {
        let focus = Focus {
            item: item.clone(),
            position: i + 1,
            size,
        };
        let atom = ctx.with_focus(focus, |c| grouping_key(c, key))?;
        let canonical = collation.key(&atom.string_value());
        match buckets.get_mut(&canonical) {
            Some(group) => group.items.push(item.clone()),
            None => {
                order.push(canonical.clone());
                buckets.insert(
                    canonical,
                    Group {
                        key: Some(atom),
                        items: vec![item.clone()],
                    },
                );
            }
        }
    }

    Ok(order
        .into_iter()
        .filter_map(|k| buckets.remove(&k))
        .collect())
}

fn group_adjacent<N: SourceNode>(
    ctx: &mut Context<'_, '_, N>,
    population: &Sequence<N>,
    key: &Arc<dyn Expression<N>>,
    collation: &Arc<dyn Collation>,
) -> Result<Vec<Group<N>>, EngineError> {
    let size = population.len();
    let mut groups: Vec<(String, Group<N>)> = Vec::new();

    for (i, item) in population.iter().enumerate() {
        let focus = Focus {
            item: item.clone(),
            position: i + 1,
            size,
        };
        let atom = ctx.with_focus(focus, |c| grouping_key(c, key))?;
        let canonical = collation.key(&atom.string_value());
        match groups.last_mut() {
            Some((last, group)) if *last == canonical => group.items.push(item.clone()),
            _ => groups.push((
                canonical,
                Group {
                    key: Some(atom),
                    items: vec![item.clone()],
                },
            )),
        }
    }

    Ok(groups.into_iter().map(|(_, g)| g).collect())
}

fn group_starting_with<N: SourceNode>(
    population: &Sequence<N>,
    pattern: &Arc<dyn Pattern<N>>,
) -> Vec<Group<N>> {
    let mut groups: Vec<Group<N>> = Vec::new();
    for item in population.iter() {
        if pattern.matches(item) || groups.is_empty() {
            groups.push(Group {
                key: None,
                items: vec![item.clone()],
            });
        } else if let Some(last) = groups.last_mut() {
            last.items.push(item.clone());
        }
    }
    groups
}

fn group_ending_with<N: SourceNode>(
    population: &Sequence<N>,
    pattern: &Arc<dyn Pattern<N>>,
) -> Vec<Group<N>> {
    let mut groups: Vec<Group<N>> = Vec::new();
    let mut current: Vec<Item<N>> = Vec::new();
    for item in population.iter() {
        current.push(item.clone());
        if pattern.matches(item) {
            groups.push(Group {
                key: None,
                items: std::mem::take(&mut current),
            });
        }
    }
    if !current.is_empty() {
        groups.push(Group {
            key: None,
            items: current,
        });
    }
    groups
}
