//! The trampoline: deferred template calls returned up the call chain.
//!
//! A template call in tail position is packaged as a [`TailCall`] and
//! *returned* instead of invoked. `Option<TailCall>` is the `Done | Pending`
//! sum: `None` means evaluation completed, `Some` carries the next bounce.
//! Every call site that may receive one either drains it with
//! [`TailCall::process`] or, when itself in tail position, passes it up.
//! This keeps native stack depth constant regardless of how deep the
//! recursive template chain runs.

use crate::context::{Context, Focus, MajorFrame};
use crate::controller::Controller;
use crate::error::EngineError;
use crate::mode::Mode;
use crate::params::ParameterSet;
use crate::rule::Rule;
use crate::template::Template;
use std::sync::Arc;
use weft_model::{Receiver, SourceNode};

/// An owned, resumable template call: the callee plus everything needed to
/// open its major frame.
#[derive(Debug)]
pub struct TailCall<N> {
    template: Arc<Template<N>>,
    rule: Option<Arc<Rule<N>>>,
    mode: Option<Arc<Mode<N>>>,
    focus: Option<Focus<N>>,
    params: Arc<ParameterSet<N>>,
    tunnel: Arc<ParameterSet<N>>,
    globals_chain: Vec<usize>,
}

impl<N: SourceNode> TailCall<N> {
    pub(crate) fn new(
        template: Arc<Template<N>>,
        rule: Option<Arc<Rule<N>>>,
        mode: Option<Arc<Mode<N>>>,
        focus: Option<Focus<N>>,
        params: Arc<ParameterSet<N>>,
        tunnel: Arc<ParameterSet<N>>,
        globals_chain: Vec<usize>,
    ) -> Self {
        TailCall {
            template,
            rule,
            mode,
            focus,
            params,
            tunnel,
            globals_chain,
        }
    }

    /// A call that installs `rule` as the current template rule and invokes
    /// its template.
    pub(crate) fn to_rule(
        rule: Arc<Rule<N>>,
        mode: Arc<Mode<N>>,
        focus: Focus<N>,
        params: Arc<ParameterSet<N>>,
        tunnel: Arc<ParameterSet<N>>,
        globals_chain: Vec<usize>,
    ) -> Self {
        TailCall {
            template: rule.action().clone(),
            rule: Some(rule),
            mode: Some(mode),
            focus: Some(focus),
            params,
            tunnel,
            globals_chain,
        }
    }

    /// Performs one bounce: opens the callee's frame and runs its body,
    /// returning whatever tail call the body itself left behind.
    pub fn process_leaving_tail(
        self,
        controller: &Controller<'_, N>,
        out: &mut dyn Receiver,
    ) -> Result<Option<TailCall<N>>, EngineError> {
        let TailCall {
            template,
            rule,
            mode,
            focus,
            params,
            tunnel,
            globals_chain,
        } = self;
        let frame = MajorFrame::new(template.stack_frame_size(), params, tunnel, rule, mode);
        let mut ctx = Context::new(controller, frame, focus);
        ctx.globals_chain = globals_chain;
        template.apply_leaving_tail(&mut ctx, out)
    }

    /// The drain loop: bounces until the chain is exhausted.
    pub fn process(
        self,
        controller: &Controller<'_, N>,
        out: &mut dyn Receiver,
    ) -> Result<(), EngineError> {
        let mut tc = Some(self);
        while let Some(call) = tc {
            tc = call.process_leaving_tail(controller, out)?;
        }
        Ok(())
    }
}
