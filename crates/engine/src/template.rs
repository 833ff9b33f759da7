//! Compiled templates: an instruction body plus invocation metadata.

use crate::context::Context;
use crate::error::EngineError;
use crate::expr::Expression;
use crate::instruct::Instruction;
use crate::tailcall::TailCall;
use std::sync::Arc;
use weft_model::{QName, Receiver, Sequence, SourceNode};

/// Occurrence indicator of a declared sequence type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OccurrenceIndicator {
    ExactlyOne,
    ZeroOrOne,
    #[default]
    ZeroOrMore,
    OneOrMore,
}

/// A declared result type (`as="..."`), carried as invocation metadata.
/// Enforcement belongs to the compiler front-end; the engine exposes it so
/// callers can reason about a template's declared result.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceType {
    pub item_type: String,
    pub occurrence: OccurrenceIndicator,
}

/// A parameter declared by a template.
#[derive(Debug)]
pub struct TemplateParam<N> {
    pub name: QName,
    pub required: bool,
    pub tunnel: bool,
    pub default: Option<Arc<dyn Expression<N>>>,
    pub slot: usize,
}

/// The compiled executable body of a template rule or named template.
#[derive(Debug)]
pub struct Template<N> {
    name: Option<QName>,
    params: Vec<TemplateParam<N>>,
    body: Instruction<N>,
    required_type: Option<SequenceType>,
    stack_frame_size: usize,
    declared_streamable: bool,
}

impl<N: SourceNode> Template<N> {
    pub fn builder() -> TemplateBuilder<N> {
        TemplateBuilder::new()
    }

    pub fn name(&self) -> Option<&QName> {
        self.name.as_ref()
    }

    pub fn params(&self) -> &[TemplateParam<N>] {
        &self.params
    }

    pub fn required_type(&self) -> Option<&SequenceType> {
        self.required_type.as_ref()
    }

    pub fn stack_frame_size(&self) -> usize {
        self.stack_frame_size
    }

    pub fn declared_streamable(&self) -> bool {
        self.declared_streamable
    }

    /// True if any declared parameter is required.
    pub fn has_required_params(&self) -> bool {
        self.params.iter().any(|p| p.required)
    }

    pub(crate) fn describe(&self) -> String {
        match &self.name {
            Some(n) => format!("'{}'", n),
            None => "(match template)".to_string(),
        }
    }

    /// Executes the template body against a freshly opened major frame,
    /// returning the final template call (if any) for the caller's drain
    /// loop instead of invoking it recursively.
    pub(crate) fn apply_leaving_tail(
        &self,
        ctx: &mut Context<'_, '_, N>,
        out: &mut dyn Receiver,
    ) -> Result<Option<TailCall<N>>, EngineError> {
        self.bind_params(ctx)?;
        self.body.process_leaving_tail(ctx, out)
    }

    fn bind_params(&self, ctx: &mut Context<'_, '_, N>) -> Result<(), EngineError> {
        for param in &self.params {
            let supplied = if param.tunnel {
                ctx.frame.tunnel_params.get(&param.name).cloned()
            } else {
                ctx.frame.local_params.get(&param.name).cloned()
            };
            let value = match supplied {
                Some(v) => v,
                None => match &param.default {
                    Some(expr) => expr.evaluate(ctx)?,
                    None if param.required => {
                        return Err(EngineError::RequiredParamMissing {
                            template: self.describe(),
                            param: param.name.to_string(),
                        });
                    }
                    None => Sequence::empty(),
                },
            };
            ctx.set_slot(param.slot, value);
        }
        Ok(())
    }
}

/// Assembles a [`Template`]. Parameters take the leading frame slots in
/// declaration order; `local_slots` reserves room for the body's variables.
#[derive(Debug)]
pub struct TemplateBuilder<N> {
    name: Option<QName>,
    params: Vec<TemplateParam<N>>,
    required_type: Option<SequenceType>,
    local_slots: usize,
    streamable: bool,
    body: Option<Instruction<N>>,
}

impl<N: SourceNode> TemplateBuilder<N> {
    pub fn new() -> Self {
        TemplateBuilder {
            name: None,
            params: Vec::new(),
            required_type: None,
            local_slots: 0,
            streamable: false,
            body: None,
        }
    }

    pub fn named(mut self, name: impl Into<QName>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn param(mut self, name: impl Into<QName>, required: bool) -> Self {
        let slot = self.params.len();
        self.params.push(TemplateParam {
            name: name.into(),
            required,
            tunnel: false,
            default: None,
            slot,
        });
        self
    }

    pub fn defaulted_param(
        mut self,
        name: impl Into<QName>,
        default: Arc<dyn Expression<N>>,
    ) -> Self {
        let slot = self.params.len();
        self.params.push(TemplateParam {
            name: name.into(),
            required: false,
            tunnel: false,
            default: Some(default),
            slot,
        });
        self
    }

    pub fn tunnel_param(mut self, name: impl Into<QName>, required: bool) -> Self {
        let slot = self.params.len();
        self.params.push(TemplateParam {
            name: name.into(),
            required,
            tunnel: true,
            default: None,
            slot,
        });
        self
    }

    /// Reserves local variable slots beyond the parameter slots.
    pub fn local_slots(mut self, count: usize) -> Self {
        self.local_slots = count;
        self
    }

    pub fn required_type(mut self, required_type: SequenceType) -> Self {
        self.required_type = Some(required_type);
        self
    }

    pub fn streamable(mut self, streamable: bool) -> Self {
        self.streamable = streamable;
        self
    }

    pub fn body(mut self, body: Instruction<N>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn build(self) -> Arc<Template<N>> {
        let stack_frame_size = self.params.len() + self.local_slots;
        Arc::new(Template {
            name: self.name,
            params: self.params,
            body: self.body.unwrap_or_else(|| Instruction::Sequence(Vec::new())),
            required_type: self.required_type,
            stack_frame_size,
            declared_streamable: self.streamable,
        })
    }
}

impl<N: SourceNode> Default for TemplateBuilder<N> {
    fn default() -> Self {
        Self::new()
    }
}
