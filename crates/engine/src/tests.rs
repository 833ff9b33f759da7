#![allow(clippy::too_many_lines)]

use crate::test_helpers::{CollectingListener, seq, text, transform_to_text, value_of_context};

mod mode_tests {
    use super::*;
    use crate::{
        BuiltInRuleSet, Controller, EngineError, Executable, Instruction, ModeOptions,
        RecoveryPolicy, Template,
    };
    use std::sync::Arc;
    use weft_model::node::mock::{MockNode, MockTreeBuilder};
    use weft_model::{EventBuffer, KindPattern, NamePattern, NodeKind};

    fn para_doc() -> MockNode {
        MockTreeBuilder::new()
            .start_element("doc")
            .start_element("para")
            .text("Hello")
            .end_element()
            .end_element()
            .build()
            .root()
    }

    #[test]
    fn higher_precedence_wins_regardless_of_priority() {
        let mut builder = Executable::builder();
        builder.rule(
            None,
            Arc::new(NamePattern::element("para")),
            1,
            Some(10.0),
            Template::builder().body(text("low-precedence")).build(),
        );
        builder.rule(
            None,
            Arc::new(NamePattern::element("para")),
            2,
            Some(-5.0),
            Template::builder().body(text("high-precedence")).build(),
        );
        let executable = builder.build().expect("build");

        let output = transform_to_text(&executable, para_doc()).expect("transform");
        assert_eq!(output, "high-precedence");
    }

    #[test]
    fn higher_priority_wins_within_equal_precedence() {
        let mut builder = Executable::builder();
        builder.rule(
            None,
            Arc::new(NamePattern::element("para")),
            1,
            Some(1.0),
            Template::builder().body(text("one")).build(),
        );
        builder.rule(
            None,
            Arc::new(NamePattern::element("para")),
            1,
            Some(2.0),
            Template::builder().body(text("two")).build(),
        );
        let executable = builder.build().expect("build");

        assert_eq!(
            transform_to_text(&executable, para_doc()).expect("transform"),
            "two"
        );
    }

    #[test]
    fn equal_rank_last_declared_wins_and_is_reported() {
        let mut builder = Executable::builder();
        builder.rule(
            None,
            Arc::new(NamePattern::element("para")),
            1,
            None,
            Template::builder().body(text("first")).build(),
        );
        builder.rule(
            None,
            Arc::new(NamePattern::element("para")),
            1,
            None,
            Template::builder().body(text("second")).build(),
        );
        let executable = builder.build().expect("build");

        let listener = CollectingListener::new();
        let mut controller =
            Controller::new(&executable).with_error_listener(Box::new(listener.clone()));
        let mut out = EventBuffer::new();
        controller.transform(para_doc(), &mut out).expect("run");

        assert_eq!(out.text(), "second");
        assert_eq!(listener.recoverable_count(), 1);
        assert!(listener.recoverable_errors()[0].contains("Ambiguous rule match"));
    }

    #[test]
    fn silent_policy_suppresses_ambiguity_report() {
        let mut builder = Executable::builder();
        builder.recovery_policy(RecoveryPolicy::RecoverSilently);
        builder.rule(
            None,
            Arc::new(NamePattern::element("para")),
            1,
            None,
            Template::builder().body(text("first")).build(),
        );
        builder.rule(
            None,
            Arc::new(NamePattern::element("para")),
            1,
            None,
            Template::builder().body(text("second")).build(),
        );
        let executable = builder.build().expect("build");

        let listener = CollectingListener::new();
        let mut controller =
            Controller::new(&executable).with_error_listener(Box::new(listener.clone()));
        let mut out = EventBuffer::new();
        controller.transform(para_doc(), &mut out).expect("run");

        assert_eq!(out.text(), "second");
        assert_eq!(listener.recoverable_count(), 0);
    }

    #[test]
    fn strict_policy_raises_ambiguity_as_fatal() {
        let mut builder = Executable::builder();
        builder.recovery_policy(RecoveryPolicy::DoNotRecover);
        builder.rule(
            None,
            Arc::new(NamePattern::element("para")),
            1,
            None,
            Template::builder().body(text("first")).build(),
        );
        builder.rule(
            None,
            Arc::new(NamePattern::element("para")),
            1,
            None,
            Template::builder().body(text("second")).build(),
        );
        let executable = builder.build().expect("build");

        let err = transform_to_text(&executable, para_doc()).expect_err("must fail");
        assert!(matches!(err, EngineError::AmbiguousRuleMatch { .. }));
        assert_eq!(err.code(), Some("XTRE0540"));
    }

    #[test]
    fn unmatched_nodes_fall_back_to_builtin_rules() {
        // No rules at all: text-only-copy recurses elements and copies text.
        let executable = Executable::builder().build().expect("build");
        assert_eq!(
            transform_to_text(&executable, para_doc()).expect("transform"),
            "Hello"
        );
    }

    #[test]
    fn deep_skip_builtin_produces_nothing() {
        let mut builder = Executable::builder();
        builder.mode_options(
            None,
            ModeOptions {
                builtin: BuiltInRuleSet::DeepSkip,
                ..ModeOptions::default()
            },
        );
        let executable = builder.build().expect("build");
        assert_eq!(
            transform_to_text(&executable, para_doc()).expect("transform"),
            ""
        );
    }

    #[test]
    fn fail_builtin_raises_on_unmatched_item() {
        let mut builder = Executable::builder();
        builder.mode_options(
            None,
            ModeOptions {
                builtin: BuiltInRuleSet::Fail,
                ..ModeOptions::default()
            },
        );
        let executable = builder.build().expect("build");
        let err = transform_to_text(&executable, para_doc()).expect_err("must fail");
        assert_eq!(err.code(), Some("XTDE0555"));
    }

    #[test]
    fn atomic_items_fall_back_to_text_output() {
        use weft_model::{AtomicValue, Item, Sequence};

        let executable = Executable::builder().build().expect("build");
        let mut controller = Controller::new(&executable);
        let mut out = EventBuffer::new();
        controller
            .apply_templates(
                Sequence::<MockNode>::from_items(vec![
                    Item::Atomic(AtomicValue::String("ab".into())),
                    Item::Atomic(AtomicValue::Integer(7)),
                ]),
                None,
                &mut out,
            )
            .expect("run");
        assert_eq!(out.text(), "ab7");
    }

    #[test]
    fn atomic_items_can_match_rules_in_the_atomic_chain() {
        use weft_model::{AtomicValue, Item, KindTest, PredicatePattern, Sequence};

        let mut builder = Executable::builder();
        builder.rule(
            None,
            Arc::new(PredicatePattern::new(
                ".[. instance of xs:integer]",
                0.0,
                KindTest::Atomic,
                |item: &Item<MockNode>| matches!(item, Item::Atomic(AtomicValue::Integer(_))),
            )),
            1,
            None,
            Template::builder()
                .body(super::seq(vec![text("int:"), value_of_context()]))
                .build(),
        );
        let executable = builder.build().expect("build");

        let mut controller = Controller::new(&executable);
        let mut out = EventBuffer::new();
        controller
            .apply_templates(
                Sequence::from_items(vec![
                    Item::Atomic(AtomicValue::Integer(5)),
                    Item::Atomic(AtomicValue::String("x".into())),
                ]),
                None,
                &mut out,
            )
            .expect("run");
        assert_eq!(out.text(), "int:5x");
    }

    #[test]
    fn next_match_walks_the_rule_order() {
        let mut builder = Executable::builder();
        builder.rule(
            None,
            Arc::new(NamePattern::element("para")),
            1,
            Some(1.0),
            Template::builder().body(text("C")).build(),
        );
        builder.rule(
            None,
            Arc::new(NamePattern::element("para")),
            1,
            Some(2.0),
            Template::builder()
                .body(seq(vec![
                    text("B"),
                    Instruction::NextMatch { params: vec![] },
                ]))
                .build(),
        );
        builder.rule(
            None,
            Arc::new(NamePattern::element("para")),
            1,
            Some(3.0),
            Template::builder()
                .body(seq(vec![
                    text("A"),
                    Instruction::NextMatch { params: vec![] },
                ]))
                .build(),
        );
        let executable = builder.build().expect("build");

        assert_eq!(
            transform_to_text(&executable, para_doc()).expect("transform"),
            "ABC"
        );
    }

    #[test]
    fn next_match_without_current_rule_is_fatal() {
        let mut builder = Executable::<MockNode>::builder();
        builder.named_template(
            Template::builder()
                .named("start")
                .body(Instruction::NextMatch { params: vec![] })
                .build(),
        );
        let executable = builder.build().expect("build");

        let mut controller = Controller::new(&executable);
        let mut out = EventBuffer::new();
        let err = controller
            .call_template(&"start".into(), None, &mut out)
            .expect_err("must fail");
        assert!(matches!(err, EngineError::NoCurrentTemplateRule));
        assert_eq!(err.code(), Some("XTDE0560"));
    }

    #[test]
    fn streamable_mode_rejects_non_streamable_template() {
        let mut builder = Executable::<MockNode>::builder();
        builder.mode_options(
            None,
            ModeOptions {
                streamable: true,
                ..ModeOptions::default()
            },
        );
        builder.rule(
            None,
            Arc::new(KindPattern(NodeKind::Text)),
            1,
            None,
            Template::builder().body(value_of_context()).build(),
        );
        let err = builder.build().expect_err("must fail");
        assert!(matches!(err, EngineError::NotStreamable { .. }));
    }

    #[test]
    fn unknown_initial_mode_is_a_static_error() {
        let executable = Executable::<MockNode>::builder().build().expect("build");
        let mut controller = Controller::new(&executable);
        let err = controller
            .set_initial_mode(Some("missing".into()))
            .expect_err("must fail");
        assert!(matches!(err, EngineError::UnknownMode(_)));
    }
}

mod template_tests {
    use super::*;
    use crate::expr::Literal;
    use crate::{Controller, EngineError, Executable, Instruction, Template};
    use std::sync::Arc;
    use weft_model::EventBuffer;
    use weft_model::node::mock::MockNode;

    #[test]
    fn required_parameter_must_be_supplied() {
        let mut builder = Executable::<MockNode>::builder();
        builder.named_template(
            Template::builder()
                .named("needs-arg")
                .param("arg", true)
                .body(text("never"))
                .build(),
        );
        let executable = builder.build().expect("build");

        let mut controller = Controller::new(&executable);
        let mut out = EventBuffer::new();
        let err = controller
            .call_template(&"needs-arg".into(), None, &mut out)
            .expect_err("must fail");
        assert!(matches!(err, EngineError::RequiredParamMissing { .. }));
        assert_eq!(err.code(), Some("XTDE0700"));
    }

    #[test]
    fn defaulted_parameter_fills_in() {
        let mut builder = Executable::<MockNode>::builder();
        builder.named_template(
            Template::builder()
                .named("greet")
                .defaulted_param("who", Arc::new(Literal::string("world")))
                .body(Instruction::ValueOf {
                    select: Arc::new(crate::expr::LocalRef::new(0)),
                    separator: None,
                })
                .build(),
        );
        let executable = builder.build().expect("build");

        let mut controller = Controller::new(&executable);
        let mut out = EventBuffer::new();
        controller
            .call_template(&"greet".into(), None, &mut out)
            .expect("run");
        assert_eq!(out.text(), "world");
    }
}

mod bindery_tests {
    use super::*;
    use crate::expr::{Compute, GlobalRef};
    use crate::{Controller, EngineError, Executable, Instruction, Template};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use weft_model::node::mock::MockTreeBuilder;
    use weft_model::{EventBuffer, NamePattern, Sequence};

    #[test]
    fn globals_are_evaluated_once_and_cached() {
        let evaluations = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&evaluations);

        let mut builder = Executable::builder();
        let slot = builder.global(
            "answer",
            Compute::new("counted literal", move |_ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Sequence::integer(42))
            }),
        );
        builder.rule(
            None,
            Arc::new(NamePattern::element("doc")),
            1,
            None,
            Template::builder()
                .body(seq(vec![
                    Instruction::ValueOf {
                        select: Arc::new(GlobalRef::new(slot)),
                        separator: None,
                    },
                    Instruction::ValueOf {
                        select: Arc::new(GlobalRef::new(slot)),
                        separator: None,
                    },
                ]))
                .build(),
        );
        let executable = builder.build().expect("build");

        let root = MockTreeBuilder::new()
            .start_element("doc")
            .end_element()
            .build()
            .root();
        assert_eq!(
            transform_to_text(&executable, root).expect("transform"),
            "4242"
        );
        assert_eq!(evaluations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn circular_globals_report_the_full_chain() {
        let mut builder = Executable::builder();
        // Slot numbers are allocated in declaration order: a=0, b=1.
        builder.global("a", Arc::new(GlobalRef::new(1)));
        builder.global("b", Arc::new(GlobalRef::new(0)));
        builder.rule(
            None,
            Arc::new(NamePattern::element("doc")),
            1,
            None,
            Template::builder()
                .body(Instruction::ValueOf {
                    select: Arc::new(GlobalRef::new(0)),
                    separator: None,
                })
                .build(),
        );
        let executable = builder.build().expect("build");

        let root = MockTreeBuilder::new()
            .start_element("doc")
            .end_element()
            .build()
            .root();
        let mut controller = Controller::new(&executable);
        let mut out = EventBuffer::new();
        let err = controller.transform(root, &mut out).expect_err("must fail");
        match err {
            EngineError::CircularGlobalVariable { chain } => {
                assert_eq!(chain, "$a -> $b -> $a");
            }
            other => panic!("expected circularity, got {other}"),
        }
    }
}

mod grouping_unit_tests {
    use super::*;
    use crate::expr::{Compute, CurrentGroupingKey};
    use crate::{Executable, GroupAlgorithm, Instruction, Template};
    use std::sync::Arc;
    use weft_model::node::mock::{MockNode, MockTreeBuilder};
    use weft_model::{CaseBlindCollation, NamePattern, Sequence, SourceNode};

    #[test]
    fn group_adjacent_collapses_equal_runs_case_blind() {
        let mut builder = Executable::<MockNode>::builder();
        builder.rule(
            None,
            Arc::new(NamePattern::element("doc")),
            1,
            None,
            Template::builder()
                .body(Instruction::ForEachGroup {
                    select: Arc::new(crate::expr::Children),
                    algorithm: GroupAlgorithm::Adjacent {
                        key: Compute::new("@k", |ctx| {
                            let item = ctx.item()?;
                            let node: &MockNode = item.as_node().expect("node");
                            let key = node
                                .attributes()
                                .find(|a| {
                                    a.name().is_some_and(|n| n.local == "k")
                                })
                                .map(|a| a.string_value())
                                .unwrap_or_default();
                            Ok(Sequence::string(key))
                        }),
                        collation: Arc::new(CaseBlindCollation),
                    },
                    sort: vec![],
                    body: Box::new(seq(vec![
                        Instruction::ValueOf {
                            select: Arc::new(CurrentGroupingKey),
                            separator: None,
                        },
                        Instruction::ValueOf {
                            select: Compute::new("count(current-group())", |ctx| {
                                let n = ctx.current_group().map(|g| g.len()).unwrap_or(0);
                                Ok(Sequence::integer(n as i64))
                            }),
                            separator: None,
                        },
                        text(";"),
                    ])),
                })
                .build(),
        );
        let executable = builder.build().expect("build");

        let root = MockTreeBuilder::new()
            .start_element("doc")
            .start_element("item")
            .attribute("k", "a")
            .end_element()
            .start_element("item")
            .attribute("k", "A")
            .end_element()
            .start_element("item")
            .attribute("k", "b")
            .end_element()
            .end_element()
            .build()
            .root();

        let output = transform_to_text(&executable, root).expect("transform");
        // The first occurrence's key is reported for the collapsed run.
        assert_eq!(output, "a2;b1;");
    }
}
