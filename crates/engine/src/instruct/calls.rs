//! The template-call instructions: apply-templates, call-template,
//! apply-imports, next-match.
//!
//! The four variants share one capability set — assemble parameters,
//! resolve a callee, package the invocation as a [`TailCall`] — provided
//! here as free functions rather than an inheritance chain.

use crate::context::Context;
use crate::error::EngineError;
use crate::expr::{Children, Expression};
use crate::instruct::sort::{self, SortKey};
use crate::instruct::ModeRef;
use crate::mode::Mode;
use crate::params::{ParameterSet, WithParam};
use crate::tailcall::TailCall;
use std::sync::Arc;
use weft_model::{QName, Receiver, SourceNode};

/// Evaluates the non-tunnel (`tunnel == false`) or tunnel with-params of a
/// call site into a fresh parameter set.
pub(crate) fn assemble_params<N: SourceNode>(
    ctx: &Context<'_, '_, N>,
    params: &[WithParam<N>],
    tunnel: bool,
) -> Result<Arc<ParameterSet<N>>, EngineError> {
    let mut entries = Vec::new();
    for param in params.iter().filter(|p| p.tunnel == tunnel) {
        entries.push((param.name.clone(), param.select.evaluate(ctx)?));
    }
    Ok(Arc::new(ParameterSet::from_entries(entries)))
}

/// The tunnel set for a call: the caller's tunnel parameters, implicitly
/// re-passed, extended by any explicit tunnel with-params at this site.
pub(crate) fn assemble_tunnel<N: SourceNode>(
    ctx: &Context<'_, '_, N>,
    params: &[WithParam<N>],
) -> Result<Arc<ParameterSet<N>>, EngineError> {
    let mut extra = Vec::new();
    for param in params.iter().filter(|p| p.tunnel) {
        extra.push((param.name.clone(), param.select.evaluate(ctx)?));
    }
    Ok(ParameterSet::extended(ctx.tunnel_params(), extra))
}

fn resolve_mode<N: SourceNode>(
    ctx: &Context<'_, '_, N>,
    mode_ref: &ModeRef,
) -> Result<Arc<Mode<N>>, EngineError> {
    let executable = ctx.controller().executable();
    match mode_ref {
        ModeRef::Unnamed => Ok(Arc::clone(executable.unnamed_mode())),
        ModeRef::Named(name) => executable
            .mode(Some(name))
            .cloned()
            .ok_or_else(|| EngineError::UnknownMode(name.to_string())),
        ModeRef::Current => Ok(ctx
            .current_mode()
            .cloned()
            .unwrap_or_else(|| Arc::clone(executable.unnamed_mode()))),
    }
}

pub(crate) fn apply_templates<N: SourceNode>(
    ctx: &mut Context<'_, '_, N>,
    select: Option<&Arc<dyn Expression<N>>>,
    mode_ref: &ModeRef,
    sort_keys: &[SortKey<N>],
    params: &[WithParam<N>],
    threads: Option<usize>,
    out: &mut dyn Receiver,
) -> Result<Option<TailCall<N>>, EngineError> {
    let sequence = match select {
        Some(expr) => expr.evaluate(ctx)?,
        None => Children.evaluate(ctx)?,
    };
    // An empty selection invokes nothing and produces nothing.
    if sequence.is_empty() {
        return Ok(None);
    }
    let sequence = sort::sorted(ctx, sequence, sort_keys)?;
    let mode = resolve_mode(ctx, mode_ref)?;
    let local = assemble_params(ctx, params, false)?;
    let tunnel = assemble_tunnel(ctx, params)?;

    #[cfg(feature = "parallel")]
    if let Some(thread_hint) = threads {
        return super::parallel::apply_templates_parallel(
            ctx,
            &mode,
            &sequence,
            local,
            tunnel,
            thread_hint,
            out,
        );
    }
    #[cfg(not(feature = "parallel"))]
    if threads.is_some() {
        log::debug!("thread hint ignored: engine built without the 'parallel' feature");
    }

    Mode::apply_templates(&mode, ctx, &sequence, local, tunnel, out)
}

pub(crate) fn apply_imports<N: SourceNode>(
    ctx: &mut Context<'_, '_, N>,
    params: &[WithParam<N>],
    out: &mut dyn Receiver,
) -> Result<Option<TailCall<N>>, EngineError> {
    let current = ctx
        .current_rule()
        .cloned()
        .ok_or(EngineError::NoCurrentTemplateRule)?;
    let focus = ctx.focus()?.clone();
    let mode = resolve_mode(ctx, &ModeRef::Current)?;
    let local = assemble_params(ctx, params, false)?;
    let tunnel = assemble_tunnel(ctx, params)?;

    // Fall through to rules of strictly lower import precedence than the
    // module that declared the current rule.
    let min = current.min_import_precedence();
    let max = current.precedence() - 1;
    let next = mode
        .rule_within(&focus.item, min, max, ctx.controller())?
        .cloned();
    match next {
        Some(rule) => Ok(Some(TailCall::to_rule(
            rule,
            Arc::clone(&mode),
            focus,
            local,
            tunnel,
            ctx.globals_chain.clone(),
        ))),
        None => {
            mode.builtin_rule_set()
                .apply(&mode, ctx, &focus, &tunnel, out)?;
            Ok(None)
        }
    }
}

pub(crate) fn next_match<N: SourceNode>(
    ctx: &mut Context<'_, '_, N>,
    params: &[WithParam<N>],
    out: &mut dyn Receiver,
) -> Result<Option<TailCall<N>>, EngineError> {
    let current = ctx
        .current_rule()
        .cloned()
        .ok_or(EngineError::NoCurrentTemplateRule)?;
    let focus = ctx.focus()?.clone();
    let mode = resolve_mode(ctx, &ModeRef::Current)?;
    let local = assemble_params(ctx, params, false)?;
    let tunnel = assemble_tunnel(ctx, params)?;

    let next = mode
        .next_match_rule(&focus.item, &current, ctx.controller())?
        .cloned();
    match next {
        Some(rule) => Ok(Some(TailCall::to_rule(
            rule,
            Arc::clone(&mode),
            focus,
            local,
            tunnel,
            ctx.globals_chain.clone(),
        ))),
        None => {
            mode.builtin_rule_set()
                .apply(&mode, ctx, &focus, &tunnel, out)?;
            Ok(None)
        }
    }
}

pub(crate) fn call_template<N: SourceNode>(
    ctx: &mut Context<'_, '_, N>,
    name: &QName,
    params: &[WithParam<N>],
    _out: &mut dyn Receiver,
) -> Result<Option<TailCall<N>>, EngineError> {
    let template = ctx
        .controller()
        .executable()
        .named_template(name)
        .cloned()
        .ok_or_else(|| EngineError::UnknownTemplate(name.to_string()))?;
    let local = assemble_params(ctx, params, false)?;
    let tunnel = assemble_tunnel(ctx, params)?;

    // call-template leaves the focus, the mode, and the current template
    // rule of the caller in place.
    Ok(Some(TailCall::new(
        template,
        ctx.current_rule().cloned(),
        ctx.current_mode().cloned(),
        ctx.focus.clone(),
        local,
        tunnel,
        ctx.globals_chain.clone(),
    )))
}
