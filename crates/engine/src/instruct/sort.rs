//! Stable multi-key sorting for apply-templates, for-each, and group
//! reordering.

use crate::context::{Context, Focus};
use crate::error::EngineError;
use crate::expr::Expression;
use std::cmp::Ordering;
use std::sync::Arc;
use weft_model::{Collation, Item, Sequence, SourceNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// One sort-key specification in a comparator chain.
#[derive(Debug, Clone)]
pub struct SortKey<N> {
    pub select: Arc<dyn Expression<N>>,
    pub order: SortOrder,
    /// Compare numerically (`data-type="number"`) instead of by collation.
    pub numeric: bool,
    pub collation: Arc<dyn Collation>,
}

impl<N: SourceNode> SortKey<N> {
    pub fn text(select: Arc<dyn Expression<N>>, collation: Arc<dyn Collation>) -> Self {
        SortKey {
            select,
            order: SortOrder::Ascending,
            numeric: false,
            collation,
        }
    }

    pub fn number(select: Arc<dyn Expression<N>>) -> Self {
        SortKey {
            select,
            order: SortOrder::Ascending,
            numeric: true,
            collation: Arc::new(weft_model::CodepointCollation),
        }
    }

    pub fn descending(mut self) -> Self {
        self.order = SortOrder::Descending;
        self
    }
}

pub(crate) enum SortValue {
    Text(String),
    Number(f64),
}

/// Decorate-sort-undecorate: keys are evaluated once per item (with that
/// item as the focus), then compared through the key chain. The underlying
/// sort is stable, so equal items keep sequence order.
pub(crate) fn sorted<N: SourceNode>(
    ctx: &mut Context<'_, '_, N>,
    sequence: Sequence<N>,
    keys: &[SortKey<N>],
) -> Result<Sequence<N>, EngineError> {
    if keys.is_empty() {
        return Ok(sequence);
    }

    let size = sequence.len();
    let mut decorated: Vec<(Item<N>, Vec<SortValue>)> = Vec::with_capacity(size);
    for (i, item) in sequence.iter().enumerate() {
        let focus = Focus {
            item: item.clone(),
            position: i + 1,
            size,
        };
        let values = ctx.with_focus(focus, |c| evaluate_keys(c, keys))?;
        decorated.push((item.clone(), values));
    }

    decorated.sort_by(|a, b| compare_chains(&a.1, &b.1, keys));

    Ok(decorated.into_iter().map(|(item, _)| item).collect())
}

pub(crate) fn evaluate_keys<N: SourceNode>(
    ctx: &Context<'_, '_, N>,
    keys: &[SortKey<N>],
) -> Result<Vec<SortValue>, EngineError> {
    keys.iter()
        .map(|key| {
            let value = key.select.evaluate(ctx)?.string_join(" ");
            Ok(if key.numeric {
                SortValue::Number(value.trim().parse::<f64>().unwrap_or(f64::NAN))
            } else {
                SortValue::Text(value)
            })
        })
        .collect()
}

pub(crate) fn compare_chains<N: SourceNode>(
    a: &[SortValue],
    b: &[SortValue],
    keys: &[SortKey<N>],
) -> Ordering {
    for (i, (va, vb)) in a.iter().zip(b.iter()).enumerate() {
        let cmp = match (va, vb) {
            (SortValue::Text(ta), SortValue::Text(tb)) => keys[i].collation.compare(ta, tb),
            (SortValue::Number(na), SortValue::Number(nb)) => compare_numbers(*na, *nb),
            // Mixed key kinds cannot arise from one specification.
            _ => Ordering::Equal,
        };
        if cmp != Ordering::Equal {
            return match keys[i].order {
                SortOrder::Ascending => cmp,
                SortOrder::Descending => cmp.reverse(),
            };
        }
    }
    Ordering::Equal
}

// NaN sorts before every number, matching the XSLT rule for sort keys.
fn compare_numbers(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}
