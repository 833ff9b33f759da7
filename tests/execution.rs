//! Execution-control behavior: tail-call stack boundedness, tunnel
//! parameter transparency, and termination reporting.

use std::sync::Arc;
use weft::expr::{Compute, Literal, LocalRef};
use weft::node::mock::{MockNode, MockTreeBuilder};
use weft::{
    Controller, EngineError, EventBuffer, Executable, Instruction, ModeRef, NamePattern, Sequence,
    Template, WithParam,
};
use weft_engine::test_helpers::{CollectingListener, seq, text, transform_to_text};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn element_only(name: &str) -> MockNode {
    MockTreeBuilder::new()
        .start_element(name)
        .end_element()
        .build()
        .root()
}

#[test]
fn deep_tail_recursion_completes_in_constant_stack() {
    init_logging();
    const DEPTH: i64 = 100_000;

    let mut builder = Executable::builder();
    builder.named_template(
        Template::builder()
            .named("countdown")
            .param("n", true)
            .body(Instruction::Choose {
                branches: vec![(
                    Compute::new("$n > 0", |ctx| {
                        Ok(Sequence::boolean(
                            ctx.local(0).as_integer().unwrap_or(0) > 0,
                        ))
                    }),
                    Instruction::CallTemplate {
                        name: "countdown".into(),
                        params: vec![WithParam::new(
                            "n",
                            Compute::new("$n - 1", |ctx| {
                                Ok(Sequence::integer(
                                    ctx.local(0).as_integer().unwrap_or(0) - 1,
                                ))
                            }),
                        )],
                    },
                )],
                otherwise: Some(Box::new(text("done"))),
            })
            .build(),
    );
    builder.rule(
        None,
        Arc::new(NamePattern::element("doc")),
        1,
        None,
        Template::builder()
            .body(Instruction::CallTemplate {
                name: "countdown".into(),
                params: vec![WithParam::new("n", Arc::new(Literal::integer(DEPTH)))],
            })
            .build(),
    );
    let executable = builder.build().expect("build");

    assert_eq!(
        transform_to_text(&executable, element_only("doc")).expect("transform"),
        "done"
    );
}

#[test]
fn tunnel_parameters_pass_through_unaware_intermediates() {
    // doc sets a tunnel parameter; mid neither declares nor mentions it;
    // leaf declares it as a tunnel parameter and reads it.
    let mut builder = Executable::builder();
    builder.rule(
        None,
        Arc::new(NamePattern::element("doc")),
        1,
        None,
        Template::builder()
            .body(Instruction::ApplyTemplates {
                select: None,
                mode: ModeRef::Current,
                sort: vec![],
                params: vec![WithParam::tunnel("secret", Arc::new(Literal::string("s3cr3t")))],
                threads: None,
            })
            .build(),
    );
    builder.rule(
        None,
        Arc::new(NamePattern::element("mid")),
        1,
        None,
        Template::builder()
            .body(Instruction::apply_templates_children())
            .build(),
    );
    builder.rule(
        None,
        Arc::new(NamePattern::element("leaf")),
        1,
        None,
        Template::builder()
            .tunnel_param("secret", true)
            .body(seq(vec![
                Instruction::ValueOf {
                    select: Arc::new(LocalRef::new(0)),
                    separator: None,
                },
                Instruction::CallTemplate {
                    name: "undeclared".into(),
                    params: vec![],
                },
            ]))
            .build(),
    );
    // A called template that declares `secret` as an ordinary (non-tunnel)
    // parameter must NOT see the tunnel value.
    builder.named_template(
        Template::builder()
            .named("undeclared")
            .defaulted_param("secret", Arc::new(Literal::string("|fallback")))
            .body(Instruction::ValueOf {
                select: Arc::new(LocalRef::new(0)),
                separator: None,
            })
            .build(),
    );
    let executable = builder.build().expect("build");

    let root = MockTreeBuilder::new()
        .start_element("doc")
        .start_element("mid")
        .start_element("leaf")
        .end_element()
        .end_element()
        .end_element()
        .build()
        .root();

    assert_eq!(
        transform_to_text(&executable, root).expect("transform"),
        "s3cr3t|fallback"
    );
}

#[test]
fn tunnel_parameter_reaches_a_declaring_called_template() {
    // call-template re-passes the tunnel set implicitly; a callee that
    // declares the tunnel parameter sees it.
    let mut builder = Executable::builder();
    builder.rule(
        None,
        Arc::new(NamePattern::element("doc")),
        1,
        None,
        Template::builder()
            .body(Instruction::ApplyTemplates {
                select: None,
                mode: ModeRef::Current,
                sort: vec![],
                params: vec![WithParam::tunnel("depth", Arc::new(Literal::string("7")))],
                threads: None,
            })
            .build(),
    );
    builder.rule(
        None,
        Arc::new(NamePattern::element("leaf")),
        1,
        None,
        Template::builder()
            .body(Instruction::CallTemplate {
                name: "reader".into(),
                params: vec![],
            })
            .build(),
    );
    builder.named_template(
        Template::builder()
            .named("reader")
            .tunnel_param("depth", false)
            .body(Instruction::ValueOf {
                select: Arc::new(LocalRef::new(0)),
                separator: None,
            })
            .build(),
    );
    let executable = builder.build().expect("build");

    let root = MockTreeBuilder::new()
        .start_element("doc")
        .start_element("leaf")
        .end_element()
        .end_element()
        .build()
        .root();

    assert_eq!(transform_to_text(&executable, root).expect("transform"), "7");
}

#[test]
fn termination_is_reported_exactly_once() {
    init_logging();
    // The terminating message is raised three template layers deep; the
    // fatal report must reach the listener once, not once per layer.
    let mut builder = Executable::builder();
    builder.rule(
        None,
        Arc::new(NamePattern::element("doc")),
        1,
        None,
        Template::builder()
            .body(Instruction::apply_templates_children())
            .build(),
    );
    builder.rule(
        None,
        Arc::new(NamePattern::element("mid")),
        1,
        None,
        Template::builder()
            .body(Instruction::apply_templates_children())
            .build(),
    );
    builder.rule(
        None,
        Arc::new(NamePattern::element("leaf")),
        1,
        None,
        Template::builder()
            .body(Instruction::Message {
                select: Arc::new(Literal::string("stop the presses")),
                terminate: true,
                code: None,
            })
            .build(),
    );
    let executable = builder.build().expect("build");

    let root = MockTreeBuilder::new()
        .start_element("doc")
        .start_element("mid")
        .start_element("leaf")
        .end_element()
        .end_element()
        .end_element()
        .build()
        .root();

    let listener = CollectingListener::new();
    let mut controller = Controller::new(&executable)
        .with_error_listener(Box::new(listener.clone()))
        .with_message_listener(Box::new(listener.clone()));
    let mut out = EventBuffer::new();
    let err = controller.transform(root, &mut out).expect_err("must fail");

    assert!(matches!(err, EngineError::Terminated { .. }));
    assert_eq!(err.code(), Some("XTMM9000"));
    assert_eq!(listener.fatal_count(), 1);
    assert_eq!(listener.messages(), vec!["stop the presses".to_string()]);
}

#[test]
fn non_terminating_message_continues_the_run() {
    let mut builder = Executable::builder();
    builder.rule(
        None,
        Arc::new(NamePattern::element("doc")),
        1,
        None,
        Template::builder()
            .body(seq(vec![
                Instruction::Message {
                    select: Arc::new(Literal::string("progress note")),
                    terminate: false,
                    code: None,
                },
                text("after"),
            ]))
            .build(),
    );
    let executable = builder.build().expect("build");

    let listener = CollectingListener::new();
    let mut controller = Controller::new(&executable)
        .with_error_listener(Box::new(listener.clone()))
        .with_message_listener(Box::new(listener.clone()));
    let mut out = EventBuffer::new();
    controller
        .transform(element_only("doc"), &mut out)
        .expect("run");

    assert_eq!(out.text(), "after");
    assert_eq!(listener.messages(), vec!["progress note".to_string()]);
    assert_eq!(listener.fatal_count(), 0);
    assert_eq!(controller.run_state().messages_emitted(), 1);
}
