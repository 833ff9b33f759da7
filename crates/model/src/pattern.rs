//! The pattern contract used by template rules.
//!
//! A pattern is a predicate over items. The pattern *grammar* is outside
//! this workspace; the engine only needs to test applicability, read the
//! default priority a pattern contributes to its rule, and learn which
//! candidate chain a rule should be indexed under.

use crate::item::Item;
use crate::node::{NodeKind, SourceNode};
use crate::qname::QName;
use std::fmt;

/// Identifies the candidate chain a pattern's rules belong to, so that rule
/// lookup only tests patterns that could possibly match the item at hand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KindTest {
    Document,
    /// An element test, optionally restricted to one name.
    Element(Option<QName>),
    /// An attribute test, optionally restricted to one name.
    Attribute(Option<QName>),
    Text,
    Comment,
    ProcessingInstruction,
    Namespace,
    /// Matches atomic values only.
    Atomic,
    /// May match anything; such rules are consulted for every item.
    Anything,
}

/// A predicate over items used to test rule applicability.
pub trait Pattern<N: SourceNode>: fmt::Debug + Send + Sync {
    /// Does this pattern match the given item?
    fn matches(&self, item: &Item<N>) -> bool;

    /// The default priority this pattern contributes when the rule declares
    /// none. Conventions follow the XSLT defaults: a bare kind test is -0.5,
    /// a name test is 0.0, anything more selective is 0.5.
    fn default_priority(&self) -> f64 {
        0.5
    }

    /// The candidate chain this pattern's rules should be indexed under.
    fn kind_test(&self) -> KindTest {
        KindTest::Anything
    }

    /// A rendering of the pattern for diagnostics.
    fn description(&self) -> String {
        format!("{:?}", self)
    }
}

/// Matches every node (but no atomic value). Priority -0.5.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyNodePattern;

impl<N: SourceNode> Pattern<N> for AnyNodePattern {
    fn matches(&self, item: &Item<N>) -> bool {
        item.is_node()
    }

    fn default_priority(&self) -> f64 {
        -0.5
    }

    fn description(&self) -> String {
        "node()".to_string()
    }
}

/// Matches all nodes of one kind. Priority -0.5.
#[derive(Debug, Clone, Copy)]
pub struct KindPattern(pub NodeKind);

impl<N: SourceNode> Pattern<N> for KindPattern {
    fn matches(&self, item: &Item<N>) -> bool {
        item.as_node().is_some_and(|n| n.node_kind() == self.0)
    }

    fn default_priority(&self) -> f64 {
        -0.5
    }

    fn kind_test(&self) -> KindTest {
        match self.0 {
            NodeKind::Document => KindTest::Document,
            NodeKind::Element => KindTest::Element(None),
            NodeKind::Attribute => KindTest::Attribute(None),
            NodeKind::Text => KindTest::Text,
            NodeKind::Comment => KindTest::Comment,
            NodeKind::ProcessingInstruction => KindTest::ProcessingInstruction,
            NodeKind::Namespace => KindTest::Namespace,
        }
    }

    fn description(&self) -> String {
        match self.0 {
            NodeKind::Document => "/".to_string(),
            NodeKind::Text => "text()".to_string(),
            NodeKind::Comment => "comment()".to_string(),
            NodeKind::ProcessingInstruction => "processing-instruction()".to_string(),
            kind => format!("{:?}()", kind).to_lowercase(),
        }
    }
}

/// Matches elements or attributes with a specific name. Priority 0.0.
#[derive(Debug, Clone)]
pub struct NamePattern {
    pub kind: NodeKind,
    pub name: QName,
}

impl NamePattern {
    pub fn element(name: impl Into<QName>) -> Self {
        NamePattern {
            kind: NodeKind::Element,
            name: name.into(),
        }
    }

    pub fn attribute(name: impl Into<QName>) -> Self {
        NamePattern {
            kind: NodeKind::Attribute,
            name: name.into(),
        }
    }
}

impl From<&str> for NamePattern {
    fn from(name: &str) -> Self {
        NamePattern::element(QName::from(name))
    }
}

impl<N: SourceNode> Pattern<N> for NamePattern {
    fn matches(&self, item: &Item<N>) -> bool {
        item.as_node()
            .is_some_and(|n| n.node_kind() == self.kind && n.name().as_ref() == Some(&self.name))
    }

    fn default_priority(&self) -> f64 {
        0.0
    }

    fn kind_test(&self) -> KindTest {
        match self.kind {
            NodeKind::Attribute => KindTest::Attribute(Some(self.name.clone())),
            _ => KindTest::Element(Some(self.name.clone())),
        }
    }

    fn description(&self) -> String {
        match self.kind {
            NodeKind::Attribute => format!("@{}", self.name),
            _ => self.name.to_string(),
        }
    }
}

/// An arbitrary predicate with an explicit priority and chain placement.
/// Stands in for compiled path patterns, which are produced elsewhere.
pub struct PredicatePattern<N> {
    description: String,
    priority: f64,
    kind: KindTest,
    predicate: Box<dyn Fn(&Item<N>) -> bool + Send + Sync>,
}

impl<N: SourceNode> PredicatePattern<N> {
    pub fn new(
        description: impl Into<String>,
        priority: f64,
        kind: KindTest,
        predicate: impl Fn(&Item<N>) -> bool + Send + Sync + 'static,
    ) -> Self {
        PredicatePattern {
            description: description.into(),
            priority,
            kind,
            predicate: Box::new(predicate),
        }
    }
}

impl<N> fmt::Debug for PredicatePattern<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicatePattern")
            .field("description", &self.description)
            .field("priority", &self.priority)
            .finish()
    }
}

impl<N: SourceNode> Pattern<N> for PredicatePattern<N> {
    fn matches(&self, item: &Item<N>) -> bool {
        (self.predicate)(item)
    }

    fn default_priority(&self) -> f64 {
        self.priority
    }

    fn kind_test(&self) -> KindTest {
        self.kind.clone()
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}
