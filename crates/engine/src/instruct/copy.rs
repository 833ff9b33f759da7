//! Shallow and deep node copying into the output receiver.

use crate::context::Context;
use crate::error::EngineError;
use crate::instruct::Instruction;
use weft_model::{Item, NodeKind, Receiver, ReceiverError, SourceNode};

/// Shallow-copies the context item, executing `content` inside it (for an
/// element, between its start and end events).
pub(crate) fn shallow_copy<N: SourceNode>(
    ctx: &mut Context<'_, '_, N>,
    content: &Instruction<N>,
    out: &mut dyn Receiver,
) -> Result<(), EngineError> {
    let item = ctx.item()?.clone();
    match &item {
        Item::Atomic(a) => {
            out.characters(&a.string_value())?;
            Ok(())
        }
        Item::Node(n) => match n.node_kind() {
            NodeKind::Document => content.process(ctx, out),
            NodeKind::Element => {
                let name = n
                    .name()
                    .ok_or_else(|| EngineError::type_error("element node has no name"))?;
                out.start_element(&name)?;
                content.process(ctx, out)?;
                out.end_element()?;
                Ok(())
            }
            _ => {
                copy_leaf_node(n, out)?;
                Ok(())
            }
        },
    }
}

/// Deep-copies one item.
pub(crate) fn deep_copy_item<N: SourceNode>(
    item: &Item<N>,
    out: &mut dyn Receiver,
) -> Result<(), ReceiverError> {
    match item {
        Item::Atomic(a) => out.characters(&a.string_value()),
        Item::Node(n) => deep_copy_node(n, out),
    }
}

/// Deep-copies a node subtree. Recursion here is bounded by document
/// depth, not by template recursion depth.
pub(crate) fn deep_copy_node<N: SourceNode>(
    node: &N,
    out: &mut dyn Receiver,
) -> Result<(), ReceiverError> {
    match node.node_kind() {
        NodeKind::Document => {
            for child in node.children() {
                deep_copy_node(&child, out)?;
            }
            Ok(())
        }
        NodeKind::Element => {
            let name = node
                .name()
                .ok_or_else(|| ReceiverError::Malformed("element node has no name".into()))?;
            out.start_element(&name)?;
            for attr in node.attributes() {
                if let Some(attr_name) = attr.name() {
                    out.attribute(&attr_name, &attr.string_value())?;
                }
            }
            for child in node.children() {
                deep_copy_node(&child, out)?;
            }
            out.end_element()
        }
        _ => copy_leaf_node(node, out),
    }
}

/// Copies a childless node (text, attribute, comment, PI, namespace).
pub(crate) fn copy_leaf_node<N: SourceNode>(
    node: &N,
    out: &mut dyn Receiver,
) -> Result<(), ReceiverError> {
    match node.node_kind() {
        NodeKind::Text => out.characters(&node.string_value()),
        NodeKind::Attribute => match node.name() {
            Some(name) => out.attribute(&name, &node.string_value()),
            None => Ok(()),
        },
        NodeKind::Comment => out.comment(&node.string_value()),
        NodeKind::ProcessingInstruction => {
            let target = node.name().map(|n| n.local).unwrap_or_default();
            out.processing_instruction(&target, &node.string_value())
        }
        NodeKind::Namespace => {
            let prefix = node.name().map(|n| n.local).unwrap_or_default();
            out.namespace(&prefix, &node.string_value())
        }
        NodeKind::Document | NodeKind::Element => Ok(()),
    }
}
