//! The bindery: per-run storage for lazily evaluated global variables.

use crate::context::{Context, MajorFrame};
use crate::error::EngineError;
use std::sync::Mutex;
use std::sync::PoisonError;
use weft_model::{Sequence, SourceNode};

#[derive(Debug, Clone)]
enum GlobalSlot<N> {
    Unevaluated,
    /// Evaluation in progress somewhere in this run.
    Busy,
    Ready(Sequence<N>),
}

/// Global-variable value store, owned by exactly one controller/run.
///
/// Values are computed on first reference. Each evaluation carries an
/// explicit in-progress chain (threaded through the context, including
/// across tail-call bounces), so a circular definition is detected and
/// reported with the full dependency chain rather than by exhausting the
/// native stack. A slot found `Busy` but absent from the caller's own chain
/// can only mean another worker of a parallel fork is computing it; the
/// value is pure, so it is simply recomputed independently.
#[derive(Debug)]
pub struct Bindery<N> {
    slots: Vec<Mutex<GlobalSlot<N>>>,
}

impl<N: SourceNode> Bindery<N> {
    pub(crate) fn new(slot_count: usize) -> Self {
        Bindery {
            slots: (0..slot_count)
                .map(|_| Mutex::new(GlobalSlot::Unevaluated))
                .collect(),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// The value of global variable `slot`, computing it on first use.
    pub fn value(
        &self,
        slot: usize,
        ctx: &Context<'_, '_, N>,
    ) -> Result<Sequence<N>, EngineError> {
        let executable = ctx.controller().executable();
        let decl = executable.globals().get(slot).ok_or_else(|| {
            EngineError::static_error(format!("undefined global variable slot {slot}"))
        })?;

        if ctx.globals_chain.contains(&slot) {
            return Err(self.circularity_error(slot, ctx));
        }

        {
            let guard = self.lock(slot);
            match &*guard {
                GlobalSlot::Ready(value) => return Ok(value.clone()),
                GlobalSlot::Busy | GlobalSlot::Unevaluated => {}
            }
        }
        *self.lock(slot) = GlobalSlot::Busy;

        let mut sub = Context::new(
            ctx.controller(),
            MajorFrame::initial(None),
            ctx.controller().global_focus(),
        );
        sub.globals_chain = ctx.globals_chain.clone();
        sub.globals_chain.push(slot);

        match decl.init.evaluate(&sub) {
            Ok(value) => {
                *self.lock(slot) = GlobalSlot::Ready(value.clone());
                Ok(value)
            }
            Err(err) => {
                *self.lock(slot) = GlobalSlot::Unevaluated;
                Err(err)
            }
        }
    }

    fn lock(&self, slot: usize) -> std::sync::MutexGuard<'_, GlobalSlot<N>> {
        self.slots[slot]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn circularity_error(&self, slot: usize, ctx: &Context<'_, '_, N>) -> EngineError {
        let globals = ctx.controller().executable().globals();
        let mut names: Vec<String> = ctx
            .globals_chain
            .iter()
            .map(|&s| {
                globals
                    .get(s)
                    .map(|d| format!("${}", d.name))
                    .unwrap_or_else(|| format!("slot {s}"))
            })
            .collect();
        names.push(
            globals
                .get(slot)
                .map(|d| format!("${}", d.name))
                .unwrap_or_else(|| format!("slot {slot}")),
        );
        EngineError::CircularGlobalVariable {
            chain: names.join(" -> "),
        }
    }
}
