//! Modes: per-mode rule sets and the rule-resolution algorithm.
//!
//! A mode owns the template rules active for one `mode` name (or the
//! unnamed mode). Rules are indexed into per-kind chains so that lookup
//! only evaluates patterns that could possibly match the item at hand, and
//! each chain is kept in rank order so the search can stop as soon as no
//! better candidate can follow.
//!
//! Modes are built once and immutable afterwards; a compiled stylesheet's
//! modes are shared read-only across every transformation run.

use crate::builtin::BuiltInRuleSet;
use crate::context::{Context, Focus};
use crate::controller::Controller;
use crate::error::EngineError;
use crate::params::ParameterSet;
use crate::rule::Rule;
use crate::tailcall::TailCall;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use weft_model::{Item, KindTest, NodeKind, QName, Receiver, Sequence, SourceNode};

/// Policy for the ambiguous-rule-match condition: two rules of equal
/// precedence and priority matching the same item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryPolicy {
    /// Pick the rule declared last; no report.
    RecoverSilently,
    /// Pick the rule declared last and report a recoverable error.
    #[default]
    RecoverWithWarnings,
    /// Treat the ambiguity as a fatal error.
    DoNotRecover,
}

type Chain<N> = Vec<Arc<Rule<N>>>;

#[derive(Debug)]
struct Chains<N> {
    document: Chain<N>,
    named_elements: HashMap<QName, Chain<N>>,
    unnamed_element: Chain<N>,
    named_attributes: HashMap<QName, Chain<N>>,
    unnamed_attribute: Chain<N>,
    text: Chain<N>,
    comment: Chain<N>,
    processing_instruction: Chain<N>,
    namespace: Chain<N>,
    atomic: Chain<N>,
    generic: Chain<N>,
}

impl<N> Chains<N> {
    fn new() -> Self {
        Chains {
            document: Vec::new(),
            named_elements: HashMap::new(),
            unnamed_element: Vec::new(),
            named_attributes: HashMap::new(),
            unnamed_attribute: Vec::new(),
            text: Vec::new(),
            comment: Vec::new(),
            processing_instruction: Vec::new(),
            namespace: Vec::new(),
            atomic: Vec::new(),
            generic: Vec::new(),
        }
    }
}

/// A collection of template rules for one mode name.
#[derive(Debug)]
pub struct Mode<N> {
    name: Option<QName>,
    builtin: BuiltInRuleSet,
    streamable: bool,
    recovery: RecoveryPolicy,
    chains: Chains<N>,
}

impl<N: SourceNode> Mode<N> {
    /// Builds a mode from its rules, allocating ranks and sorting the
    /// candidate chains. Rejects, for a streamable mode, any rule whose
    /// template is not declared streamable.
    pub(crate) fn build(
        name: Option<QName>,
        builtin: BuiltInRuleSet,
        streamable: bool,
        recovery: RecoveryPolicy,
        mut rules: Vec<Rule<N>>,
    ) -> Result<Self, EngineError> {
        if streamable {
            for rule in &rules {
                if !rule.action().declared_streamable() {
                    return Err(EngineError::NotStreamable {
                        mode: describe_mode(&name),
                        template: rule.action().describe(),
                    });
                }
            }
        }

        // Allocate ranks: sort by (precedence, priority) ascending; equal
        // pairs share a rank so that run-time comparison sees them as tied.
        let mut order: Vec<usize> = (0..rules.len()).collect();
        order.sort_by(|&a, &b| rules[a].compare_precedence_priority(&rules[b]));
        let mut rank = 0;
        for (i, &idx) in order.iter().enumerate() {
            if i > 0 {
                let prev = order[i - 1];
                if rules[idx].compare_precedence_priority(&rules[prev]) != Ordering::Equal {
                    rank += 1;
                }
            }
            rules[idx].rank = rank;
        }

        let mut chains = Chains::new();
        for rule in rules {
            let kind = rule.pattern().kind_test();
            let rule = Arc::new(rule);
            match kind {
                KindTest::Document => chains.document.push(rule),
                KindTest::Element(Some(name)) => {
                    chains.named_elements.entry(name).or_default().push(rule)
                }
                KindTest::Element(None) => chains.unnamed_element.push(rule),
                KindTest::Attribute(Some(name)) => {
                    chains.named_attributes.entry(name).or_default().push(rule)
                }
                KindTest::Attribute(None) => chains.unnamed_attribute.push(rule),
                KindTest::Text => chains.text.push(rule),
                KindTest::Comment => chains.comment.push(rule),
                KindTest::ProcessingInstruction => chains.processing_instruction.push(rule),
                KindTest::Namespace => chains.namespace.push(rule),
                KindTest::Atomic => chains.atomic.push(rule),
                KindTest::Anything => chains.generic.push(rule),
            }
        }

        // Highest rank first; among equals, the later declaration first.
        let sort_chain = |chain: &mut Chain<N>| {
            chain.sort_by(|a, b| b.rank.cmp(&a.rank).then(b.sequence.cmp(&a.sequence)));
        };
        sort_chain(&mut chains.document);
        chains.named_elements.values_mut().for_each(sort_chain);
        sort_chain(&mut chains.unnamed_element);
        chains.named_attributes.values_mut().for_each(sort_chain);
        sort_chain(&mut chains.unnamed_attribute);
        sort_chain(&mut chains.text);
        sort_chain(&mut chains.comment);
        sort_chain(&mut chains.processing_instruction);
        sort_chain(&mut chains.namespace);
        sort_chain(&mut chains.atomic);
        sort_chain(&mut chains.generic);

        Ok(Mode {
            name,
            builtin,
            streamable,
            recovery,
            chains,
        })
    }

    /// The mode name; `None` for the unnamed mode.
    pub fn name(&self) -> Option<&QName> {
        self.name.as_ref()
    }

    pub fn builtin_rule_set(&self) -> BuiltInRuleSet {
        self.builtin
    }

    pub fn is_streamable(&self) -> bool {
        self.streamable
    }

    pub fn recovery_policy(&self) -> RecoveryPolicy {
        self.recovery
    }

    /// Resolves the best-matching rule for `item`, or `None` when no rule
    /// matches (the caller falls back to the built-in rule set).
    pub fn rule_for(
        &self,
        item: &Item<N>,
        controller: &Controller<'_, N>,
    ) -> Result<Option<&Arc<Rule<N>>>, EngineError> {
        self.rule_filtered(item, controller, None)
    }

    /// Rule resolution restricted to import precedence within
    /// `[min, max]`; this is the apply-imports lookup.
    pub fn rule_within(
        &self,
        item: &Item<N>,
        min: i32,
        max: i32,
        controller: &Controller<'_, N>,
    ) -> Result<Option<&Arc<Rule<N>>>, EngineError> {
        let filter = move |r: &Rule<N>| r.precedence() >= min && r.precedence() <= max;
        self.rule_filtered(item, controller, Some(&filter))
    }

    /// The rule immediately after `current` in the total order, for the same
    /// item; this is the next-match lookup.
    pub fn next_match_rule(
        &self,
        item: &Item<N>,
        current: &Rule<N>,
        controller: &Controller<'_, N>,
    ) -> Result<Option<&Arc<Rule<N>>>, EngineError> {
        let filter = move |r: &Rule<N>| match r.compare_rank(current) {
            Ordering::Less => true,
            Ordering::Equal => r.sequence() < current.sequence(),
            Ordering::Greater => false,
        };
        self.rule_filtered(item, controller, Some(&filter))
    }

    fn rule_filtered<'m>(
        &'m self,
        item: &Item<N>,
        controller: &Controller<'_, N>,
        filter: Option<&dyn Fn(&Rule<N>) -> bool>,
    ) -> Result<Option<&'m Arc<Rule<N>>>, EngineError> {
        let mut best: Option<&Arc<Rule<N>>> = None;

        if let Item::Node(node) = item {
            let (named, unnamed) = match node.node_kind() {
                NodeKind::Document => (None, &self.chains.document),
                NodeKind::Element => (
                    node.name().and_then(|n| self.chains.named_elements.get(&n)),
                    &self.chains.unnamed_element,
                ),
                NodeKind::Attribute => (
                    node.name()
                        .and_then(|n| self.chains.named_attributes.get(&n)),
                    &self.chains.unnamed_attribute,
                ),
                NodeKind::Text => (None, &self.chains.text),
                NodeKind::Comment => (None, &self.chains.comment),
                NodeKind::ProcessingInstruction => (None, &self.chains.processing_instruction),
                NodeKind::Namespace => (None, &self.chains.namespace),
            };
            if let Some(chain) = named {
                best = self.search_chain(chain, item, best, controller, filter)?;
            }
            best = self.search_chain(unnamed, item, best, controller, filter)?;
        } else {
            best = self.search_chain(&self.chains.atomic, item, best, controller, filter)?;
        }

        best = self.search_chain(&self.chains.generic, item, best, controller, filter)?;
        Ok(best)
    }

    /// Walks one rank-ordered chain, carrying the best rule found so far
    /// across chains. Stops as soon as the chain can no longer improve on
    /// the current best.
    fn search_chain<'m>(
        &self,
        chain: &'m [Arc<Rule<N>>],
        item: &Item<N>,
        mut best: Option<&'m Arc<Rule<N>>>,
        controller: &Controller<'_, N>,
        filter: Option<&dyn Fn(&Rule<N>) -> bool>,
    ) -> Result<Option<&'m Arc<Rule<N>>>, EngineError> {
        for rule in chain {
            if let Some(f) = filter {
                if !f(rule) {
                    continue;
                }
            }
            match best {
                Some(found) => match rule.compare_rank(found) {
                    Ordering::Less => break,
                    Ordering::Equal => {
                        if rule.pattern().matches(item) {
                            self.report_ambiguity(item, found, rule, controller)?;
                            if rule.sequence() > found.sequence() {
                                best = Some(rule);
                            }
                            break;
                        }
                    }
                    Ordering::Greater => {
                        if rule.pattern().matches(item) {
                            best = Some(rule);
                        }
                    }
                },
                None => {
                    if rule.pattern().matches(item) {
                        best = Some(rule);
                        if self.recovery == RecoveryPolicy::RecoverSilently {
                            // Rules in a chain are in rank order; the first
                            // match is the winner when not checking ties.
                            break;
                        }
                    }
                }
            }
        }
        Ok(best)
    }

    fn report_ambiguity(
        &self,
        item: &Item<N>,
        first: &Arc<Rule<N>>,
        second: &Arc<Rule<N>>,
        controller: &Controller<'_, N>,
    ) -> Result<(), EngineError> {
        // Two chain entries for the same declaration (a union pattern
        // registered under several kind tests) are not a conflict.
        if Arc::ptr_eq(first.action(), second.action()) && first.sequence() == second.sequence() {
            return Ok(());
        }
        let error = EngineError::AmbiguousRuleMatch {
            item: item.describe(),
            first: first.pattern().description(),
            second: second.pattern().description(),
        };
        match self.recovery {
            RecoveryPolicy::RecoverSilently => Ok(()),
            RecoveryPolicy::RecoverWithWarnings => controller.recoverable(error),
            RecoveryPolicy::DoNotRecover => Err(error),
        }
    }

    /// Processes a sequence of items under this mode: per item, resolve the
    /// winning rule (or fall back to the built-in rule set), open a major
    /// frame, and invoke the template. The final item's invocation is
    /// returned as a [`TailCall`] for the caller's drain loop; earlier
    /// invocations are drained in-loop.
    pub fn apply_templates(
        mode: &Arc<Mode<N>>,
        ctx: &Context<'_, '_, N>,
        sequence: &Sequence<N>,
        params: Arc<ParameterSet<N>>,
        tunnel: Arc<ParameterSet<N>>,
        out: &mut dyn Receiver,
    ) -> Result<Option<TailCall<N>>, EngineError> {
        let mut pending: Option<TailCall<N>> = None;
        let size = sequence.len();
        for (i, item) in sequence.iter().enumerate() {
            // Drain the previous item's call before moving the focus on.
            if let Some(tc) = pending.take() {
                tc.process(ctx.controller(), out)?;
            }
            let focus = Focus {
                item: item.clone(),
                position: i + 1,
                size,
            };
            match mode.rule_for(item, ctx.controller())? {
                Some(rule) => {
                    pending = Some(TailCall::to_rule(
                        Arc::clone(rule),
                        Arc::clone(mode),
                        focus,
                        Arc::clone(&params),
                        Arc::clone(&tunnel),
                        ctx.globals_chain.clone(),
                    ));
                }
                None => {
                    log::trace!(
                        "no rule matches {} in {}; applying built-in rules",
                        item.describe(),
                        describe_mode(&mode.name)
                    );
                    mode.builtin.apply(mode, ctx, &focus, &tunnel, out)?;
                }
            }
        }
        Ok(pending)
    }
}

pub(crate) fn describe_mode(name: &Option<QName>) -> String {
    match name {
        Some(n) => format!("mode '{}'", n),
        None => "the unnamed mode".to_string(),
    }
}
