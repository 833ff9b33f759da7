//! The opt-in parallel apply-templates fork (`parallel` feature).
//!
//! Each item is processed by a worker into a private event buffer over the
//! shared immutable compiled structures; buffers are then merged into the
//! caller's receiver in original sequence order, so worker completion order
//! never leaks into the output.

use crate::context::{Context, Focus, MajorFrame};
use crate::error::EngineError;
use crate::mode::Mode;
use crate::params::ParameterSet;
use crate::tailcall::TailCall;
use rayon::prelude::*;
use std::sync::Arc;
use weft_model::{EventBuffer, Receiver, Sequence, SourceNode};

pub(crate) fn apply_templates_parallel<N: SourceNode>(
    ctx: &Context<'_, '_, N>,
    mode: &Arc<Mode<N>>,
    sequence: &Sequence<N>,
    params: Arc<ParameterSet<N>>,
    tunnel: Arc<ParameterSet<N>>,
    thread_hint: usize,
    out: &mut dyn Receiver,
) -> Result<Option<TailCall<N>>, EngineError> {
    let threads = thread_hint.clamp(1, num_cpus::get());
    let pool = match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool,
        Err(err) => {
            log::warn!("falling back to sequential apply-templates: {err}");
            return Mode::apply_templates(mode, ctx, sequence, params, tunnel, out);
        }
    };
    log::debug!(
        "forking apply-templates over {} items on {} threads",
        sequence.len(),
        threads
    );

    let size = sequence.len();
    let controller = ctx.controller();
    let chain = &ctx.globals_chain;
    let buffers: Result<Vec<EventBuffer>, EngineError> = pool.install(|| {
        sequence
            .items()
            .par_iter()
            .enumerate()
            .map(|(i, item)| {
                let mut buffer = EventBuffer::new();
                let focus = Focus {
                    item: item.clone(),
                    position: i + 1,
                    size,
                };
                match mode.rule_for(item, controller)? {
                    Some(rule) => {
                        TailCall::to_rule(
                            Arc::clone(rule),
                            Arc::clone(mode),
                            focus,
                            Arc::clone(&params),
                            Arc::clone(&tunnel),
                            chain.clone(),
                        )
                        .process(controller, &mut buffer)?;
                    }
                    None => {
                        let mut worker_ctx = Context::new(
                            controller,
                            MajorFrame::initial(Some(Arc::clone(mode))),
                            None,
                        );
                        worker_ctx.globals_chain = chain.clone();
                        mode.builtin_rule_set()
                            .apply(mode, &worker_ctx, &focus, &tunnel, &mut buffer)?;
                    }
                }
                Ok(buffer)
            })
            .collect()
    });

    for buffer in buffers? {
        buffer.replay(out)?;
    }
    Ok(None)
}
