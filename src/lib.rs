//! # weft
//!
//! An XSLT-style transformation core: pattern-driven template-rule
//! resolution, a tail-call-safe instruction interpreter, and streaming
//! push-based output.
//!
//! The workspace splits into two layers, re-exported here:
//!
//! - [`weft_model`]: what the engine consumes from the outside world —
//!   source-tree navigation ([`SourceNode`]), rule patterns ([`Pattern`]),
//!   output sinks ([`Receiver`]), collations — plus the item/sequence value
//!   model.
//! - [`weft_engine`]: the execution core — modes and rules, templates, the
//!   tail-call trampoline, context frames, the bindery, and the
//!   [`Controller`] driving one end-to-end run.
//!
//! ## Quick start
//!
//! ```
//! use std::sync::Arc;
//! use weft::{Controller, Executable, Instruction, NamePattern, Template};
//! use weft::node::mock::MockTreeBuilder;
//! use weft::EventBuffer;
//!
//! // Compile: one rule matching <para> elements.
//! let mut builder = Executable::builder();
//! builder.rule(
//!     None,
//!     Arc::new(NamePattern::element("para")),
//!     1,
//!     None,
//!     Template::builder()
//!         .body(Instruction::Element {
//!             name: "p".into(),
//!             content: Box::new(Instruction::apply_templates_children()),
//!         })
//!         .build(),
//! );
//! let executable = builder.build()?;
//!
//! // Run: unmatched nodes fall back to the built-in rules.
//! let tree = MockTreeBuilder::new()
//!     .start_element("doc")
//!     .start_element("para")
//!     .text("Hello")
//!     .end_element()
//!     .end_element()
//!     .build();
//! let mut out = EventBuffer::new();
//! Controller::new(&executable).transform(tree.root(), &mut out)?;
//! assert_eq!(out.text(), "Hello");
//! # Ok::<(), weft::EngineError>(())
//! ```

pub use weft_engine::{
    BuiltInRuleSet, Context, Controller, EngineError, ErrorListener, Executable,
    ExecutableBuilder, Expression, Focus, GlobalDeclaration, GroupAlgorithm, Instruction,
    MessageListener, Mode, ModeOptions, ModeRef, OccurrenceIndicator, ParameterSet,
    RecoveryPolicy, Rule, RunState, SequenceType, SortKey, SortOrder, StandardErrorListener,
    StandardMessageListener, TailCall, Template, TemplateBuilder, TemplateParam, WithParam,
};
pub use weft_engine::{bindery, expr};
pub use weft_model::{
    AnyNodePattern, AtomicValue, CaseBlindCollation, CodepointCollation, Collation, EventBuffer,
    Item, KindPattern, KindTest, NamePattern, NodeKind, NullReceiver, OutputEvent, Pattern,
    PredicatePattern, QName, Receiver, ReceiverError, Sequence, SourceNode, TraceReceiver,
};
pub use weft_model::node;
