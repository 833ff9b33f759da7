//! The instruction-execution engine.
//!
//! Instructions form a tagged-variant tree; every variant implements the
//! same evaluation contract against a context and a receiver:
//!
//! - [`Instruction::process`] runs to completion, draining any tail call;
//! - [`Instruction::process_leaving_tail`] runs eagerly but *returns* a
//!   final template call instead of invoking it, when this instruction sits
//!   in tail position.
//!
//! Tail position propagates structurally: a sequence forwards the
//! leaving-tail contract only to its last member, `if`/`choose` forward it
//! into the taken branch, and loop bodies and content constructors always
//! drain. There is no laziness anywhere else in this layer; output events
//! are pushed to the receiver as instructions execute.

pub(crate) mod calls;
pub(crate) mod copy;
pub(crate) mod group;
#[cfg(feature = "parallel")]
mod parallel;
pub(crate) mod sort;

use crate::context::{Context, Focus};
use crate::error::EngineError;
use crate::expr::Expression;
use crate::params::WithParam;
use crate::tailcall::TailCall;
use std::sync::Arc;
use weft_model::{Collation, EventBuffer, Pattern, QName, Receiver, SourceNode};

pub use sort::{SortKey, SortOrder};

/// Which mode an `apply-templates` dispatches into.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModeRef {
    #[default]
    Unnamed,
    Named(QName),
    /// Inherit the mode of the calling template (`mode="#current"`).
    Current,
}

/// One of the four grouping algorithms of `for-each-group`.
#[derive(Debug, Clone)]
pub enum GroupAlgorithm<N> {
    /// Full key-based grouping, preserving first-occurrence order of keys.
    By {
        key: Arc<dyn Expression<N>>,
        collation: Arc<dyn Collation>,
    },
    /// Collapse runs of adjacent items with equal keys.
    Adjacent {
        key: Arc<dyn Expression<N>>,
        collation: Arc<dyn Collation>,
    },
    /// A new group starts at each item matching the pattern.
    StartingWith(Arc<dyn Pattern<N>>),
    /// A group ends at each item matching the pattern.
    EndingWith(Arc<dyn Pattern<N>>),
}

/// A compiled instruction tree node.
#[derive(Debug, Clone)]
pub enum Instruction<N> {
    /// A block of instructions executed in order.
    Sequence(Vec<Instruction<N>>),
    /// Literal text.
    Text(String),
    /// The string value of a selected sequence.
    ValueOf {
        select: Arc<dyn Expression<N>>,
        separator: Option<String>,
    },
    Element {
        name: QName,
        content: Box<Instruction<N>>,
    },
    Attribute {
        name: QName,
        content: Box<Instruction<N>>,
    },
    Comment {
        content: Box<Instruction<N>>,
    },
    ProcessingInstruction {
        target: String,
        content: Box<Instruction<N>>,
    },
    /// Shallow-copies the context item, running `content` inside it.
    Copy {
        content: Box<Instruction<N>>,
    },
    /// Deep-copies the selected sequence.
    CopyOf {
        select: Arc<dyn Expression<N>>,
    },
    If {
        test: Arc<dyn Expression<N>>,
        then: Box<Instruction<N>>,
    },
    Choose {
        branches: Vec<(Arc<dyn Expression<N>>, Instruction<N>)>,
        otherwise: Option<Box<Instruction<N>>>,
    },
    ForEach {
        select: Arc<dyn Expression<N>>,
        sort: Vec<SortKey<N>>,
        body: Box<Instruction<N>>,
    },
    ForEachGroup {
        select: Arc<dyn Expression<N>>,
        algorithm: GroupAlgorithm<N>,
        sort: Vec<SortKey<N>>,
        body: Box<Instruction<N>>,
    },
    ApplyTemplates {
        /// Default: the children of the context node.
        select: Option<Arc<dyn Expression<N>>>,
        mode: ModeRef,
        sort: Vec<SortKey<N>>,
        params: Vec<WithParam<N>>,
        /// Worker-thread hint; honored only with the `parallel` feature.
        threads: Option<usize>,
    },
    ApplyImports {
        params: Vec<WithParam<N>>,
    },
    NextMatch {
        params: Vec<WithParam<N>>,
    },
    CallTemplate {
        name: QName,
        params: Vec<WithParam<N>>,
    },
    LocalVariable {
        name: QName,
        slot: usize,
        select: Arc<dyn Expression<N>>,
    },
    Message {
        select: Arc<dyn Expression<N>>,
        terminate: bool,
        code: Option<String>,
    },
}

impl<N: SourceNode> Instruction<N> {
    /// A convenience for the common apply-templates-to-children form.
    pub fn apply_templates_children() -> Self {
        Instruction::ApplyTemplates {
            select: None,
            mode: ModeRef::Current,
            sort: Vec::new(),
            params: Vec::new(),
            threads: None,
        }
    }

    /// Runs this instruction to completion, draining any tail call.
    pub fn process(
        &self,
        ctx: &mut Context<'_, '_, N>,
        out: &mut dyn Receiver,
    ) -> Result<(), EngineError> {
        if let Some(tc) = self.process_leaving_tail(ctx, out)? {
            tc.process(ctx.controller(), out)?;
        }
        Ok(())
    }

    /// Runs this instruction, returning the final template call (if this
    /// instruction is a template call in tail position) for the caller's
    /// drain loop.
    pub fn process_leaving_tail(
        &self,
        ctx: &mut Context<'_, '_, N>,
        out: &mut dyn Receiver,
    ) -> Result<Option<TailCall<N>>, EngineError> {
        match self {
            Instruction::Sequence(instructions) => {
                let Some((last, init)) = instructions.split_last() else {
                    return Ok(None);
                };
                for instruction in init {
                    instruction.process(ctx, out)?;
                }
                last.process_leaving_tail(ctx, out)
            }

            Instruction::Text(text) => {
                out.characters(text)?;
                Ok(None)
            }

            Instruction::ValueOf { select, separator } => {
                let sequence = select.evaluate(ctx)?;
                let text = sequence.string_join(separator.as_deref().unwrap_or(" "));
                if !text.is_empty() {
                    out.characters(&text)?;
                }
                Ok(None)
            }

            Instruction::Element { name, content } => {
                out.start_element(name)?;
                content.process(ctx, out)?;
                out.end_element()?;
                Ok(None)
            }

            Instruction::Attribute { name, content } => {
                let text = capture_text(content, ctx)?;
                out.attribute(name, &text)?;
                Ok(None)
            }

            Instruction::Comment { content } => {
                let text = capture_text(content, ctx)?;
                out.comment(&text)?;
                Ok(None)
            }

            Instruction::ProcessingInstruction { target, content } => {
                let text = capture_text(content, ctx)?;
                out.processing_instruction(target, &text)?;
                Ok(None)
            }

            Instruction::Copy { content } => {
                copy::shallow_copy(ctx, content, out)?;
                Ok(None)
            }

            Instruction::CopyOf { select } => {
                let sequence = select.evaluate(ctx)?;
                for item in sequence.iter() {
                    copy::deep_copy_item(item, out)?;
                }
                Ok(None)
            }

            Instruction::If { test, then } => {
                if test.evaluate(ctx)?.effective_boolean() {
                    then.process_leaving_tail(ctx, out)
                } else {
                    Ok(None)
                }
            }

            Instruction::Choose {
                branches,
                otherwise,
            } => {
                for (test, body) in branches {
                    if test.evaluate(ctx)?.effective_boolean() {
                        return body.process_leaving_tail(ctx, out);
                    }
                }
                match otherwise {
                    Some(body) => body.process_leaving_tail(ctx, out),
                    None => Ok(None),
                }
            }

            Instruction::ForEach { select, sort, body } => {
                let sequence = select.evaluate(ctx)?;
                let sequence = sort::sorted(ctx, sequence, sort)?;
                // Within for-each there is no current template rule.
                let saved_rule = ctx.frame.current_rule.take();
                let size = sequence.len();
                let mut result = Ok(());
                for (i, item) in sequence.iter().enumerate() {
                    let focus = Focus {
                        item: item.clone(),
                        position: i + 1,
                        size,
                    };
                    result = ctx.with_focus(focus, |c| body.process(c, out));
                    if result.is_err() {
                        break;
                    }
                }
                ctx.frame.current_rule = saved_rule;
                result?;
                Ok(None)
            }

            Instruction::ForEachGroup {
                select,
                algorithm,
                sort,
                body,
            } => {
                group::process_groups(ctx, select, algorithm, sort, body, out)?;
                Ok(None)
            }

            Instruction::ApplyTemplates {
                select,
                mode,
                sort,
                params,
                threads,
            } => calls::apply_templates(ctx, select.as_ref(), mode, sort, params, *threads, out),

            Instruction::ApplyImports { params } => calls::apply_imports(ctx, params, out),

            Instruction::NextMatch { params } => calls::next_match(ctx, params, out),

            Instruction::CallTemplate { name, params } => {
                calls::call_template(ctx, name, params, out)
            }

            Instruction::LocalVariable { slot, select, .. } => {
                let value = select.evaluate(ctx)?;
                ctx.set_slot(*slot, value);
                Ok(None)
            }

            Instruction::Message {
                select,
                terminate,
                code,
            } => {
                let text = select.evaluate(ctx)?.string_join(" ");
                ctx.controller().emit_message(&text, *terminate);
                if *terminate {
                    Err(EngineError::terminated(text, code.clone()))
                } else {
                    Ok(None)
                }
            }
        }
    }
}

/// Runs `content` into a private buffer and returns its character content;
/// used by the constructors whose value is text (attribute, comment, PI).
fn capture_text<N: SourceNode>(
    content: &Instruction<N>,
    ctx: &mut Context<'_, '_, N>,
) -> Result<String, EngineError> {
    let mut buffer = EventBuffer::new();
    content.process(ctx, &mut buffer)?;
    Ok(buffer.text())
}
