//! # weft-model
//!
//! The data-model layer of the weft transformation engine: everything the
//! execution core consumes from the outside world, expressed as traits, plus
//! the item/sequence value model shared by every crate in the workspace.
//!
//! The engine is written exclusively against these abstractions, so it can
//! drive any source tree (an XML arena, a database projection, a test
//! fixture) and push its results into any sink (a serializer, an event
//! recorder, a validator chain).
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SourceNode`] | Read-only navigable node in a source tree |
//! | [`Item`] | A node or an atomic value; the unit of processing |
//! | [`Sequence`] | Immutable shared sequence of items |
//! | [`Pattern`] | Predicate over items used for rule applicability |
//! | [`Receiver`] | Push-style sink for result events |
//! | [`Collation`] | String comparison used by sorting and grouping |
//!
//! ## Modules
//!
//! - [`node`]: node kinds, the [`SourceNode`] trait, and a public mock tree
//! - [`item`]: atomic values, items, sequences
//! - [`pattern`]: the [`Pattern`] trait and stock pattern implementations
//! - [`receiver`]: output events, the [`Receiver`] trait, buffering sinks
//! - [`collation`]: string collations for sort keys and grouping comparers

pub mod collation;
pub mod item;
pub mod node;
pub mod pattern;
pub mod receiver;

mod qname;

pub use collation::{CaseBlindCollation, CodepointCollation, Collation};
pub use item::{AtomicValue, Item, Sequence};
pub use node::{NodeKind, SourceNode};
pub use pattern::{AnyNodePattern, KindPattern, KindTest, NamePattern, Pattern, PredicatePattern};
pub use qname::QName;
pub use receiver::{EventBuffer, NullReceiver, OutputEvent, Receiver, ReceiverError, TraceReceiver};
