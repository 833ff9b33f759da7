//! Built-in rule sets: the default action when no template rule matches.

use crate::context::{Context, Focus};
use crate::error::EngineError;
use crate::instruct::copy;
use crate::mode::Mode;
use crate::params::ParameterSet;
use std::sync::Arc;
use weft_model::{Item, NodeKind, Receiver, Sequence, SourceNode};

/// The family of built-in rule sets. `TextOnlyCopy` is the traditional
/// default: recurse through document and element nodes, copy the string
/// value of text and attribute nodes, drop everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuiltInRuleSet {
    #[default]
    TextOnlyCopy,
    ShallowCopy,
    DeepCopy,
    ShallowSkip,
    DeepSkip,
    /// No fallback: an unmatched item is a dynamic error.
    Fail,
}

impl BuiltInRuleSet {
    /// Applies the default action for `focus.item`. Tunnel parameters are
    /// re-passed unchanged into any recursive apply-templates; ordinary
    /// parameters are not.
    pub(crate) fn apply<N: SourceNode>(
        self,
        mode: &Arc<Mode<N>>,
        ctx: &Context<'_, '_, N>,
        focus: &Focus<N>,
        tunnel: &Arc<ParameterSet<N>>,
        out: &mut dyn Receiver,
    ) -> Result<(), EngineError> {
        match self {
            BuiltInRuleSet::TextOnlyCopy => match &focus.item {
                Item::Node(n) => match n.node_kind() {
                    NodeKind::Document | NodeKind::Element => {
                        apply_to_children(mode, ctx, n, tunnel, out)
                    }
                    NodeKind::Text | NodeKind::Attribute => {
                        out.characters(&n.string_value())?;
                        Ok(())
                    }
                    _ => Ok(()),
                },
                Item::Atomic(a) => {
                    out.characters(&a.string_value())?;
                    Ok(())
                }
            },
            BuiltInRuleSet::ShallowSkip => match &focus.item {
                Item::Node(n) => match n.node_kind() {
                    NodeKind::Document | NodeKind::Element => {
                        apply_to_children(mode, ctx, n, tunnel, out)
                    }
                    _ => Ok(()),
                },
                Item::Atomic(_) => Ok(()),
            },
            BuiltInRuleSet::ShallowCopy => match &focus.item {
                Item::Node(n) => match n.node_kind() {
                    NodeKind::Document => apply_to_children(mode, ctx, n, tunnel, out),
                    NodeKind::Element => {
                        let name = n
                            .name()
                            .ok_or_else(|| EngineError::type_error("element node has no name"))?;
                        out.start_element(&name)?;
                        for attr in n.attributes() {
                            if let Some(attr_name) = attr.name() {
                                out.attribute(&attr_name, &attr.string_value())?;
                            }
                        }
                        apply_to_children(mode, ctx, n, tunnel, out)?;
                        out.end_element()?;
                        Ok(())
                    }
                    _ => {
                        copy::copy_leaf_node(n, out)?;
                        Ok(())
                    }
                },
                Item::Atomic(a) => {
                    out.characters(&a.string_value())?;
                    Ok(())
                }
            },
            BuiltInRuleSet::DeepCopy => {
                copy::deep_copy_item(&focus.item, out)?;
                Ok(())
            }
            BuiltInRuleSet::DeepSkip => Ok(()),
            BuiltInRuleSet::Fail => Err(EngineError::dynamic(
                "XTDE0555",
                format!(
                    "no template rule matches {} and the mode does not recover",
                    focus.item.describe()
                ),
            )),
        }
    }
}

fn apply_to_children<N: SourceNode>(
    mode: &Arc<Mode<N>>,
    ctx: &Context<'_, '_, N>,
    node: &N,
    tunnel: &Arc<ParameterSet<N>>,
    out: &mut dyn Receiver,
) -> Result<(), EngineError> {
    let children = Sequence::from_nodes(node.children());
    let tc = Mode::apply_templates(
        mode,
        ctx,
        &children,
        ParameterSet::empty(),
        Arc::clone(tunnel),
        out,
    )?;
    if let Some(tc) = tc {
        tc.process(ctx.controller(), out)?;
    }
    Ok(())
}
