//! The core abstraction for a navigable, read-only source tree.

use crate::qname::QName;
use std::fmt;
use std::hash::Hash;

/// The kind of a node in the source tree, aligned with the XDM node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
    Namespace,
}

/// The universal contract for a node in a read-only, hierarchical source.
///
/// The rule-resolution and execution engines are written exclusively against
/// this trait, allowing them to operate on any tree model that implements it.
///
/// A node value is a *handle*: implementations are expected to be small,
/// cheaply cloneable references into a shared tree (an arena index plus an
/// `Arc` to the arena, say). Handles must be owner-like (`'static`) and
/// thread-shareable so that compiled rule tables holding patterns over them
/// can be reused across concurrent transformation runs.
pub trait SourceNode:
    fmt::Debug + Clone + PartialEq + Eq + Hash + PartialOrd + Ord + Send + Sync + 'static
{
    /// The kind of the node (Element, Text, Attribute, etc.).
    fn node_kind(&self) -> NodeKind;

    /// The qualified name of the node. Returns `None` for node kinds that do
    /// not have names, such as text, comment, or document nodes. For a
    /// processing-instruction this is its target.
    fn name(&self) -> Option<QName>;

    /// The string value of the node.
    /// - For a text node, its content.
    /// - For an element or document, the concatenation of the string values
    ///   of all descendant text nodes.
    /// - For an attribute, its value.
    /// - For a comment or processing instruction, its content.
    fn string_value(&self) -> String;

    /// An iterator over the attribute nodes of this node.
    /// Empty for non-element nodes.
    fn attributes(&self) -> Box<dyn Iterator<Item = Self>>;

    /// An iterator over the child nodes of this node.
    /// Empty for leaf nodes (text, attributes).
    fn children(&self) -> Box<dyn Iterator<Item = Self>>;

    /// The parent node. `None` for the document node or detached attributes.
    fn parent(&self) -> Option<Self>;
}

// Mock tree - publicly available so downstream crates can build source trees
// in their own tests without depending on a concrete document model.
pub mod mock {
    use super::*;
    use std::cmp::Ordering;
    use std::hash::Hasher;
    use std::sync::Arc;

    #[derive(Debug)]
    struct MockNodeData {
        kind: NodeKind,
        name: Option<QName>,
        value: String,
        children: Vec<usize>,
        attributes: Vec<usize>,
        parent: Option<usize>,
    }

    /// An in-memory tree built programmatically through [`MockTreeBuilder`].
    #[derive(Debug)]
    pub struct MockTree {
        nodes: Vec<MockNodeData>,
    }

    /// The document node of a tree.
    pub fn root_of(tree: &Arc<MockTree>) -> MockNode {
        MockNode {
            tree: Arc::clone(tree),
            id: 0,
        }
    }

    impl MockTree {
        /// The document node of the tree.
        pub fn root(self: Arc<Self>) -> MockNode {
            MockNode { tree: self, id: 0 }
        }
    }

    /// A handle to a node in a [`MockTree`]. Cloning is an `Arc` bump.
    #[derive(Debug, Clone)]
    pub struct MockNode {
        tree: Arc<MockTree>,
        id: usize,
    }

    // Identity is the node id; handles are only ever compared within one
    // tree.
    impl PartialEq for MockNode {
        fn eq(&self, other: &Self) -> bool {
            self.id == other.id
        }
    }
    impl Eq for MockNode {}

    impl PartialOrd for MockNode {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }
    impl Ord for MockNode {
        fn cmp(&self, other: &Self) -> Ordering {
            self.id.cmp(&other.id)
        }
    }

    impl Hash for MockNode {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.id.hash(state);
        }
    }

    impl MockNode {
        fn data(&self) -> &MockNodeData {
            &self.nodes()[self.id]
        }

        fn nodes(&self) -> &Vec<MockNodeData> {
            &self.tree.nodes
        }

        fn at(&self, id: usize) -> MockNode {
            MockNode {
                tree: Arc::clone(&self.tree),
                id,
            }
        }
    }

    impl SourceNode for MockNode {
        fn node_kind(&self) -> NodeKind {
            self.data().kind
        }

        fn name(&self) -> Option<QName> {
            self.data().name.clone()
        }

        fn string_value(&self) -> String {
            match self.data().kind {
                // Only descendant text nodes contribute to the string value
                // of a document or element node.
                NodeKind::Document | NodeKind::Element => {
                    let mut s = String::new();
                    for child in self.children() {
                        match child.node_kind() {
                            NodeKind::Text | NodeKind::Document | NodeKind::Element => {
                                s.push_str(&child.string_value())
                            }
                            _ => {}
                        }
                    }
                    s
                }
                _ => self.data().value.clone(),
            }
        }

        fn attributes(&self) -> Box<dyn Iterator<Item = Self>> {
            let this = self.clone();
            let ids = self.data().attributes.clone();
            Box::new(ids.into_iter().map(move |id| this.at(id)))
        }

        fn children(&self) -> Box<dyn Iterator<Item = Self>> {
            let this = self.clone();
            let ids = self.data().children.clone();
            Box::new(ids.into_iter().map(move |id| this.at(id)))
        }

        fn parent(&self) -> Option<Self> {
            self.data().parent.map(|id| self.at(id))
        }
    }

    /// Builds a [`MockTree`] with a cursor-style API:
    ///
    /// ```
    /// use weft_model::node::mock::MockTreeBuilder;
    ///
    /// let tree = MockTreeBuilder::new()
    ///     .start_element("doc")
    ///     .start_element("para")
    ///     .attribute("id", "p1")
    ///     .text("Hello")
    ///     .end_element()
    ///     .end_element()
    ///     .build();
    /// let root = tree.root();
    /// ```
    #[derive(Debug)]
    pub struct MockTreeBuilder {
        nodes: Vec<MockNodeData>,
        open: Vec<usize>,
    }

    impl MockTreeBuilder {
        pub fn new() -> Self {
            MockTreeBuilder {
                nodes: vec![MockNodeData {
                    kind: NodeKind::Document,
                    name: None,
                    value: String::new(),
                    children: Vec::new(),
                    attributes: Vec::new(),
                    parent: None,
                }],
                open: vec![0],
            }
        }

        fn push(&mut self, data: MockNodeData) -> usize {
            let id = self.nodes.len();
            self.nodes.push(data);
            id
        }

        fn current(&self) -> usize {
            *self.open.last().expect("builder has no open node")
        }

        pub fn start_element(mut self, name: &str) -> Self {
            let parent = self.current();
            let id = self.push(MockNodeData {
                kind: NodeKind::Element,
                name: Some(QName::from(name)),
                value: String::new(),
                children: Vec::new(),
                attributes: Vec::new(),
                parent: Some(parent),
            });
            self.nodes[parent].children.push(id);
            self.open.push(id);
            self
        }

        pub fn end_element(mut self) -> Self {
            self.open.pop();
            self
        }

        pub fn attribute(mut self, name: &str, value: &str) -> Self {
            let parent = self.current();
            let id = self.push(MockNodeData {
                kind: NodeKind::Attribute,
                name: Some(QName::from(name)),
                value: value.to_string(),
                children: Vec::new(),
                attributes: Vec::new(),
                parent: Some(parent),
            });
            self.nodes[parent].attributes.push(id);
            self
        }

        pub fn text(mut self, content: &str) -> Self {
            let parent = self.current();
            let id = self.push(MockNodeData {
                kind: NodeKind::Text,
                name: None,
                value: content.to_string(),
                children: Vec::new(),
                attributes: Vec::new(),
                parent: Some(parent),
            });
            self.nodes[parent].children.push(id);
            self
        }

        pub fn comment(mut self, content: &str) -> Self {
            let parent = self.current();
            let id = self.push(MockNodeData {
                kind: NodeKind::Comment,
                name: None,
                value: content.to_string(),
                children: Vec::new(),
                attributes: Vec::new(),
                parent: Some(parent),
            });
            self.nodes[parent].children.push(id);
            self
        }

        pub fn processing_instruction(mut self, target: &str, content: &str) -> Self {
            let parent = self.current();
            let id = self.push(MockNodeData {
                kind: NodeKind::ProcessingInstruction,
                name: Some(QName::local(target)),
                value: content.to_string(),
                children: Vec::new(),
                attributes: Vec::new(),
                parent: Some(parent),
            });
            self.nodes[parent].children.push(id);
            self
        }

        pub fn build(self) -> Arc<MockTree> {
            Arc::new(MockTree { nodes: self.nodes })
        }
    }

    impl Default for MockTreeBuilder {
        fn default() -> Self {
            Self::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockTreeBuilder;
    use super::*;

    fn sample() -> std::sync::Arc<mock::MockTree> {
        MockTreeBuilder::new()
            .start_element("doc")
            .start_element("para")
            .attribute("id", "p1")
            .text("Hello")
            .end_element()
            .comment(" note ")
            .start_element("para")
            .text("World")
            .end_element()
            .end_element()
            .build()
    }

    #[test]
    fn navigation_and_string_values() {
        let tree = sample();
        let root = tree.root();
        assert_eq!(root.node_kind(), NodeKind::Document);
        assert_eq!(root.string_value(), "HelloWorld");

        let doc = root.children().next().unwrap();
        assert_eq!(doc.name(), Some(QName::local("doc")));
        assert_eq!(doc.children().count(), 3);

        let para = doc.children().next().unwrap();
        assert_eq!(para.string_value(), "Hello");
        assert_eq!(para.parent(), Some(doc.clone()));

        let id = para.attributes().next().unwrap();
        assert_eq!(id.node_kind(), NodeKind::Attribute);
        assert_eq!(id.string_value(), "p1");
    }
}
