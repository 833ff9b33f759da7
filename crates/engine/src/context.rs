//! Dynamic evaluation context: major and minor frames.
//!
//! A *major frame* is opened per template invocation or apply-templates call
//! and owns the local variable slots, the parameter sets, the current
//! template rule, and the current mode. A *minor frame* is just a focus
//! override on top of the enclosing major frame; it is realized here as a
//! save/restore of [`Context::focus`] rather than a separate allocation.
//!
//! Frames are strictly LIFO. Nothing borrowed from a frame survives the call
//! chain that created it; the only state that escapes upward is a
//! [`TailCall`](crate::tailcall::TailCall), which *owns* its resume state.

use crate::controller::Controller;
use crate::error::EngineError;
use crate::mode::Mode;
use crate::params::ParameterSet;
use crate::rule::Rule;
use std::sync::Arc;
use weft_model::{AtomicValue, Item, Sequence, SourceNode};

/// The focus of evaluation: current item, 1-based position, focus size.
#[derive(Debug, Clone)]
pub struct Focus<N> {
    pub item: Item<N>,
    pub position: usize,
    pub size: usize,
}

impl<N: SourceNode> Focus<N> {
    pub fn singleton(item: Item<N>) -> Self {
        Focus {
            item,
            position: 1,
            size: 1,
        }
    }
}

/// Group registers set by `for-each-group` for the duration of one group's
/// processing.
#[derive(Debug, Clone)]
pub(crate) struct GroupState<N> {
    pub(crate) items: Sequence<N>,
    pub(crate) key: Option<AtomicValue>,
}

/// A major context frame.
#[derive(Debug)]
pub struct MajorFrame<N> {
    pub(crate) slots: Vec<Sequence<N>>,
    pub(crate) local_params: Arc<ParameterSet<N>>,
    pub(crate) tunnel_params: Arc<ParameterSet<N>>,
    pub(crate) current_rule: Option<Arc<Rule<N>>>,
    pub(crate) mode: Option<Arc<Mode<N>>>,
    pub(crate) group: Option<GroupState<N>>,
}

impl<N: SourceNode> MajorFrame<N> {
    pub(crate) fn new(
        slot_count: usize,
        local_params: Arc<ParameterSet<N>>,
        tunnel_params: Arc<ParameterSet<N>>,
        current_rule: Option<Arc<Rule<N>>>,
        mode: Option<Arc<Mode<N>>>,
    ) -> Self {
        MajorFrame {
            slots: vec![Sequence::empty(); slot_count],
            local_params,
            tunnel_params,
            current_rule,
            mode,
            group: None,
        }
    }

    /// The frame established by a controller entry point, before any
    /// template has been invoked.
    pub(crate) fn initial(mode: Option<Arc<Mode<N>>>) -> Self {
        MajorFrame::new(0, ParameterSet::empty(), ParameterSet::empty(), None, mode)
    }
}

/// The dynamic context threaded through instruction evaluation: run-shared
/// state by reference, the owning major frame, and the current focus.
pub struct Context<'c, 'e, N: SourceNode> {
    pub(crate) controller: &'c Controller<'e, N>,
    pub(crate) frame: MajorFrame<N>,
    pub(crate) focus: Option<Focus<N>>,
    pub(crate) globals_chain: Vec<usize>,
}

impl<'c, 'e, N: SourceNode> Context<'c, 'e, N> {
    pub(crate) fn new(
        controller: &'c Controller<'e, N>,
        frame: MajorFrame<N>,
        focus: Option<Focus<N>>,
    ) -> Self {
        Context {
            controller,
            frame,
            focus,
            globals_chain: Vec::new(),
        }
    }

    pub fn controller(&self) -> &'c Controller<'e, N> {
        self.controller
    }

    /// The current focus, or an error when no context item is established
    /// (e.g. a named-template entry point invoked without one).
    pub fn focus(&self) -> Result<&Focus<N>, EngineError> {
        self.focus
            .as_ref()
            .ok_or(EngineError::NoContextItem("expression evaluation"))
    }

    pub fn item(&self) -> Result<&Item<N>, EngineError> {
        Ok(&self.focus()?.item)
    }

    /// Reads a local variable slot. Unset slots read as the empty sequence.
    pub fn local(&self, slot: usize) -> Sequence<N> {
        self.frame
            .slots
            .get(slot)
            .cloned()
            .unwrap_or_else(Sequence::empty)
    }

    /// Writes a local variable slot. The slot array grows on demand; the
    /// template's declared frame size is a pre-sizing hint, not a bound.
    pub(crate) fn set_slot(&mut self, slot: usize, value: Sequence<N>) {
        if slot >= self.frame.slots.len() {
            self.frame.slots.resize(slot + 1, Sequence::empty());
        }
        self.frame.slots[slot] = value;
    }

    pub fn current_rule(&self) -> Option<&Arc<Rule<N>>> {
        self.frame.current_rule.as_ref()
    }

    pub fn current_mode(&self) -> Option<&Arc<Mode<N>>> {
        self.frame.mode.as_ref()
    }

    pub fn current_group(&self) -> Option<Sequence<N>> {
        self.frame.group.as_ref().map(|g| g.items.clone())
    }

    pub fn current_grouping_key(&self) -> Option<AtomicValue> {
        self.frame.group.as_ref().and_then(|g| g.key.clone())
    }

    pub fn tunnel_params(&self) -> &Arc<ParameterSet<N>> {
        &self.frame.tunnel_params
    }

    /// Runs `f` in a minor frame: the given focus overrides the current one,
    /// everything else is shared with this frame.
    pub(crate) fn with_focus<R>(&mut self, focus: Focus<N>, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = self.focus.replace(focus);
        let result = f(self);
        self.focus = saved;
        result
    }
}
