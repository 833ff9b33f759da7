//! The expression contract consumed by the instruction engine.
//!
//! The expression *language* (XPath parsing, typing, optimization) lives
//! outside this crate; instructions hold compiled expressions only through
//! the [`Expression`] trait. The implementations here are the small stock of
//! expressions the engine itself needs (built-in rules, default selects) and
//! the combinators tests are written against.

use crate::context::Context;
use crate::error::EngineError;
use std::fmt;
use std::sync::Arc;
use weft_model::{AtomicValue, Item, Sequence, SourceNode};

/// A compiled expression, evaluated against the dynamic context.
pub trait Expression<N: SourceNode>: fmt::Debug + Send + Sync {
    fn evaluate(&self, ctx: &Context<'_, '_, N>) -> Result<Sequence<N>, EngineError>;
}

/// The context item as a singleton sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextItem;

impl<N: SourceNode> Expression<N> for ContextItem {
    fn evaluate(&self, ctx: &Context<'_, '_, N>) -> Result<Sequence<N>, EngineError> {
        Ok(Sequence::one(ctx.item()?.clone()))
    }
}

/// The child axis of the context node, in document order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Children;

impl<N: SourceNode> Expression<N> for Children {
    fn evaluate(&self, ctx: &Context<'_, '_, N>) -> Result<Sequence<N>, EngineError> {
        match ctx.item()? {
            Item::Node(n) => Ok(Sequence::from_nodes(n.children())),
            Item::Atomic(a) => Err(EngineError::type_error(format!(
                "cannot select children of atomic value \"{}\"",
                a.string_value()
            ))),
        }
    }
}

/// A fixed sequence of atomic values.
#[derive(Debug, Clone)]
pub struct Literal(pub Vec<AtomicValue>);

impl Literal {
    pub fn string(s: impl Into<String>) -> Self {
        Literal(vec![AtomicValue::String(s.into())])
    }

    pub fn integer(i: i64) -> Self {
        Literal(vec![AtomicValue::Integer(i)])
    }

    pub fn boolean(b: bool) -> Self {
        Literal(vec![AtomicValue::Boolean(b)])
    }
}

impl<N: SourceNode> Expression<N> for Literal {
    fn evaluate(&self, _ctx: &Context<'_, '_, N>) -> Result<Sequence<N>, EngineError> {
        Ok(self.0.iter().cloned().map(Item::Atomic).collect())
    }
}

/// The 1-based position of the context item in the current focus.
#[derive(Debug, Clone, Copy, Default)]
pub struct Position;

impl<N: SourceNode> Expression<N> for Position {
    fn evaluate(&self, ctx: &Context<'_, '_, N>) -> Result<Sequence<N>, EngineError> {
        Ok(Sequence::integer(ctx.focus()?.position as i64))
    }
}

/// The size of the current focus sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct Last;

impl<N: SourceNode> Expression<N> for Last {
    fn evaluate(&self, ctx: &Context<'_, '_, N>) -> Result<Sequence<N>, EngineError> {
        Ok(Sequence::integer(ctx.focus()?.size as i64))
    }
}

/// A reference to a local variable or parameter slot.
#[derive(Debug, Clone)]
pub struct LocalRef {
    pub slot: usize,
}

impl LocalRef {
    pub fn new(slot: usize) -> Self {
        LocalRef { slot }
    }
}

impl<N: SourceNode> Expression<N> for LocalRef {
    fn evaluate(&self, ctx: &Context<'_, '_, N>) -> Result<Sequence<N>, EngineError> {
        Ok(ctx.local(self.slot))
    }
}

/// A reference to a global variable slot, evaluated lazily via the bindery.
#[derive(Debug, Clone)]
pub struct GlobalRef {
    pub slot: usize,
}

impl GlobalRef {
    pub fn new(slot: usize) -> Self {
        GlobalRef { slot }
    }
}

impl<N: SourceNode> Expression<N> for GlobalRef {
    fn evaluate(&self, ctx: &Context<'_, '_, N>) -> Result<Sequence<N>, EngineError> {
        ctx.controller().bindery().value(self.slot, ctx)
    }
}

/// The current group established by the innermost `for-each-group`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentGroup;

impl<N: SourceNode> Expression<N> for CurrentGroup {
    fn evaluate(&self, ctx: &Context<'_, '_, N>) -> Result<Sequence<N>, EngineError> {
        Ok(ctx.current_group().unwrap_or_else(Sequence::empty))
    }
}

/// The current grouping key, or the empty sequence when grouping by
/// position (`group-starting-with`/`group-ending-with`).
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentGroupingKey;

impl<N: SourceNode> Expression<N> for CurrentGroupingKey {
    fn evaluate(&self, ctx: &Context<'_, '_, N>) -> Result<Sequence<N>, EngineError> {
        Ok(match ctx.current_grouping_key() {
            Some(key) => Sequence::one(Item::Atomic(key)),
            None => Sequence::empty(),
        })
    }
}

/// An expression backed by a function. Stands in for arbitrary compiled
/// expressions in tests and built-ins.
pub struct Compute<N: SourceNode> {
    description: String,
    #[allow(clippy::type_complexity)]
    f: Box<dyn Fn(&Context<'_, '_, N>) -> Result<Sequence<N>, EngineError> + Send + Sync>,
}

impl<N: SourceNode> Compute<N> {
    pub fn new(
        description: impl Into<String>,
        f: impl Fn(&Context<'_, '_, N>) -> Result<Sequence<N>, EngineError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Compute {
            description: description.into(),
            f: Box::new(f),
        })
    }
}

impl<N: SourceNode> fmt::Debug for Compute<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Compute({})", self.description)
    }
}

impl<N: SourceNode> Expression<N> for Compute<N> {
    fn evaluate(&self, ctx: &Context<'_, '_, N>) -> Result<Sequence<N>, EngineError> {
        (self.f)(ctx)
    }
}
