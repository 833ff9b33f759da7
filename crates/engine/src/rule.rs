//! Template rules: a pattern bound to a template at a precedence/priority.

use crate::template::Template;
use std::cmp::Ordering;
use std::sync::Arc;
use weft_model::{Pattern, SourceNode};

/// One template rule within a mode.
///
/// Rules reference (never own) their template: several rules produced from
/// one union pattern share the same compiled template. The `rank` is
/// precomputed when the owning mode is built, so that run-time comparison of
/// two rules is a single integer comparison instead of a
/// precedence-then-priority cascade.
#[derive(Debug)]
pub struct Rule<N> {
    pub(crate) pattern: Arc<dyn Pattern<N>>,
    pub(crate) action: Arc<Template<N>>,
    pub(crate) precedence: i32,
    pub(crate) min_import_precedence: i32,
    pub(crate) priority: f64,
    pub(crate) sequence: u32,
    pub(crate) rank: i32,
}

impl<N: SourceNode> Rule<N> {
    pub fn pattern(&self) -> &Arc<dyn Pattern<N>> {
        &self.pattern
    }

    pub fn action(&self) -> &Arc<Template<N>> {
        &self.action
    }

    /// Import precedence of the declaring module; higher wins.
    pub fn precedence(&self) -> i32 {
        self.precedence
    }

    /// Lowest import precedence visible to `apply-imports` from this rule.
    pub fn min_import_precedence(&self) -> i32 {
        self.min_import_precedence
    }

    pub fn priority(&self) -> f64 {
        self.priority
    }

    /// Declaration order within the stylesheet; the final tie-break.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Compares two rules on (precedence, priority), via the precomputed
    /// rank. `Greater` means `self` beats `other`. Declaration order is
    /// deliberately not part of the rank; equal ranks are the ambiguous case
    /// the recovery policy arbitrates.
    pub fn compare_rank(&self, other: &Rule<N>) -> Ordering {
        self.rank.cmp(&other.rank)
    }

    /// The ordering used at build time to allocate ranks.
    pub(crate) fn compare_precedence_priority(&self, other: &Rule<N>) -> Ordering {
        self.precedence.cmp(&other.precedence).then_with(|| {
            self.priority
                .partial_cmp(&other.priority)
                .unwrap_or(Ordering::Equal)
        })
    }
}
