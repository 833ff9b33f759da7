//! Items and sequences: the value model threaded through evaluation.

use crate::node::SourceNode;
use std::fmt;
use std::sync::Arc;

/// An atomic (non-node) value.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomicValue {
    String(String),
    Boolean(bool),
    Integer(i64),
    Double(f64),
}

impl AtomicValue {
    pub fn string_value(&self) -> String {
        match self {
            AtomicValue::String(s) => s.clone(),
            AtomicValue::Boolean(b) => b.to_string(),
            AtomicValue::Integer(i) => i.to_string(),
            AtomicValue::Double(d) => {
                if d.is_nan() {
                    "NaN".to_string()
                } else if d.is_infinite() {
                    if *d > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
                } else if d.fract() == 0.0 && d.abs() < 1e15 {
                    format!("{}", *d as i64)
                } else {
                    d.to_string()
                }
            }
        }
    }

    /// Numeric interpretation; non-numeric strings become NaN.
    pub fn to_double(&self) -> f64 {
        match self {
            AtomicValue::String(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
            AtomicValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            AtomicValue::Integer(i) => *i as f64,
            AtomicValue::Double(d) => *d,
        }
    }

    pub fn to_integer(&self) -> Option<i64> {
        match self {
            AtomicValue::Integer(i) => Some(*i),
            AtomicValue::Double(d) if d.fract() == 0.0 => Some(*d as i64),
            AtomicValue::String(s) => s.trim().parse::<i64>().ok(),
            AtomicValue::Boolean(_) => None,
            AtomicValue::Double(_) => None,
        }
    }
}

impl fmt::Display for AtomicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.string_value())
    }
}

/// A single item in a sequence: a source node or an atomic value.
#[derive(Debug, Clone, PartialEq)]
pub enum Item<N> {
    Node(N),
    Atomic(AtomicValue),
}

impl<N: SourceNode> Item<N> {
    pub fn string_value(&self) -> String {
        match self {
            Item::Node(n) => n.string_value(),
            Item::Atomic(a) => a.string_value(),
        }
    }

    pub fn as_node(&self) -> Option<&N> {
        match self {
            Item::Node(n) => Some(n),
            Item::Atomic(_) => None,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Item::Node(_))
    }

    /// A short description of the item for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Item::Node(n) => match n.name() {
                Some(name) => format!("{:?} node {}", n.node_kind(), name),
                None => format!("{:?} node", n.node_kind()),
            },
            Item::Atomic(a) => format!("atomic value \"{}\"", a.string_value()),
        }
    }
}

impl<N> From<AtomicValue> for Item<N> {
    fn from(value: AtomicValue) -> Self {
        Item::Atomic(value)
    }
}

/// An immutable, cheaply cloneable sequence of items.
///
/// Sequences are shared (`Arc`-backed) because they flow into parameter
/// sets, variable slots, and tail calls, all of which may outlive the
/// expression evaluation that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence<N>(Arc<[Item<N>]>);

impl<N: SourceNode> Sequence<N> {
    pub fn empty() -> Self {
        Sequence(Arc::from(Vec::new()))
    }

    pub fn one(item: Item<N>) -> Self {
        Sequence(Arc::from(vec![item]))
    }

    pub fn node(node: N) -> Self {
        Sequence::one(Item::Node(node))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Sequence::one(Item::Atomic(AtomicValue::String(s.into())))
    }

    pub fn integer(i: i64) -> Self {
        Sequence::one(Item::Atomic(AtomicValue::Integer(i)))
    }

    pub fn boolean(b: bool) -> Self {
        Sequence::one(Item::Atomic(AtomicValue::Boolean(b)))
    }

    pub fn from_items(items: Vec<Item<N>>) -> Self {
        Sequence(Arc::from(items))
    }

    pub fn from_nodes(nodes: impl IntoIterator<Item = N>) -> Self {
        Sequence(Arc::from(
            nodes.into_iter().map(Item::Node).collect::<Vec<_>>(),
        ))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn items(&self) -> &[Item<N>] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item<N>> {
        self.0.iter()
    }

    pub fn first(&self) -> Option<&Item<N>> {
        self.0.first()
    }

    /// The string values of all items joined with `separator`.
    pub fn string_join(&self, separator: &str) -> String {
        self.0
            .iter()
            .map(Item::string_value)
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// The effective boolean value, following the XDM rules: an empty
    /// sequence is false; a sequence whose first item is a node is true; a
    /// singleton atomic is judged by its type.
    pub fn effective_boolean(&self) -> bool {
        match self.0.first() {
            None => false,
            Some(Item::Node(_)) => true,
            Some(Item::Atomic(a)) => {
                if self.0.len() > 1 {
                    return true;
                }
                match a {
                    AtomicValue::Boolean(b) => *b,
                    AtomicValue::String(s) => !s.is_empty(),
                    AtomicValue::Integer(i) => *i != 0,
                    AtomicValue::Double(d) => *d != 0.0 && !d.is_nan(),
                }
            }
        }
    }

    /// The integer value of a singleton numeric sequence, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self.0.as_ref() {
            [Item::Atomic(a)] => a.to_integer(),
            _ => None,
        }
    }
}

impl<N: SourceNode> FromIterator<Item<N>> for Sequence<N> {
    fn from_iter<T: IntoIterator<Item = Item<N>>>(iter: T) -> Self {
        Sequence(Arc::from(iter.into_iter().collect::<Vec<_>>()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::mock::{MockNode, MockTreeBuilder};

    fn root() -> MockNode {
        MockTreeBuilder::new()
            .start_element("a")
            .text("x")
            .end_element()
            .build()
            .root()
    }

    #[test]
    fn effective_boolean_rules() {
        assert!(!Sequence::<MockNode>::empty().effective_boolean());
        assert!(Sequence::<MockNode>::boolean(true).effective_boolean());
        assert!(!Sequence::<MockNode>::boolean(false).effective_boolean());
        assert!(!Sequence::<MockNode>::string("").effective_boolean());
        assert!(Sequence::<MockNode>::string("x").effective_boolean());
        assert!(!Sequence::<MockNode>::integer(0).effective_boolean());
        assert!(Sequence::node(root()).effective_boolean());
    }

    #[test]
    fn string_join_and_numeric_views() {
        let seq = Sequence::<MockNode>::from_items(vec![
            Item::Atomic(AtomicValue::Integer(1)),
            Item::Atomic(AtomicValue::String("two".into())),
        ]);
        assert_eq!(seq.string_join(" "), "1 two");
        assert_eq!(Sequence::<MockNode>::integer(7).as_integer(), Some(7));
        assert_eq!(AtomicValue::Double(3.0).string_value(), "3");
    }
}
