//! for-each-group behavior across the four grouping algorithms.

use std::sync::Arc;
use weft::expr::{Children, Compute, CurrentGroup, CurrentGroupingKey};
use weft::node::mock::{MockNode, MockTreeBuilder};
use weft::{
    CodepointCollation, Executable, GroupAlgorithm, Instruction, NamePattern, Sequence, SortKey,
    SourceNode, Template,
};
use weft_engine::test_helpers::{seq, text, transform_to_text, value_of_context};

/// `@k` of the context node.
fn attribute_k() -> Arc<Compute<MockNode>> {
    Compute::new("@k", |ctx| {
        let item = ctx.item()?;
        let key = item
            .as_node()
            .and_then(|n: &MockNode| {
                n.attributes()
                    .find(|a| a.name().is_some_and(|name| name.local == "k"))
            })
            .map(|a| a.string_value())
            .unwrap_or_default();
        Ok(Sequence::string(key))
    })
}

/// Emits `key:members;` for each group.
fn group_report_body() -> Instruction<MockNode> {
    seq(vec![
        Instruction::ValueOf {
            select: Arc::new(CurrentGroupingKey),
            separator: None,
        },
        text(":"),
        Instruction::ForEach {
            select: Arc::new(CurrentGroup),
            sort: vec![],
            body: Box::new(value_of_context()),
        },
        text(";"),
    ])
}

fn grouping_executable(
    algorithm: GroupAlgorithm<MockNode>,
    sort: Vec<SortKey<MockNode>>,
) -> Executable<MockNode> {
    let mut builder = Executable::builder();
    builder.rule(
        None,
        Arc::new(NamePattern::element("doc")),
        1,
        None,
        Template::builder()
            .body(Instruction::ForEachGroup {
                select: Arc::new(Children),
                algorithm,
                sort,
                body: Box::new(group_report_body()),
            })
            .build(),
    );
    builder.build().expect("build")
}

fn keyed_items() -> MockNode {
    // a(k=1) b(k=2) c(k=1) d(k=3)
    MockTreeBuilder::new()
        .start_element("doc")
        .start_element("item")
        .attribute("k", "1")
        .text("a")
        .end_element()
        .start_element("item")
        .attribute("k", "2")
        .text("b")
        .end_element()
        .start_element("item")
        .attribute("k", "1")
        .text("c")
        .end_element()
        .start_element("item")
        .attribute("k", "3")
        .text("d")
        .end_element()
        .end_element()
        .build()
        .root()
}

#[test]
fn group_by_preserves_first_occurrence_order() {
    let executable = grouping_executable(
        GroupAlgorithm::By {
            key: attribute_k(),
            collation: Arc::new(CodepointCollation),
        },
        vec![],
    );

    assert_eq!(
        transform_to_text(&executable, keyed_items()).expect("transform"),
        "1:ac;2:b;3:d;"
    );
}

#[test]
fn trailing_sort_keys_reorder_groups_not_members() {
    let executable = grouping_executable(
        GroupAlgorithm::By {
            key: attribute_k(),
            collation: Arc::new(CodepointCollation),
        },
        vec![SortKey::text(
            Arc::new(CurrentGroupingKey),
            Arc::new(CodepointCollation),
        )
        .descending()],
    );

    assert_eq!(
        transform_to_text(&executable, keyed_items()).expect("transform"),
        "3:d;2:b;1:ac;"
    );
}

#[test]
fn group_adjacent_only_collapses_consecutive_keys() {
    let executable = grouping_executable(
        GroupAlgorithm::Adjacent {
            key: attribute_k(),
            collation: Arc::new(CodepointCollation),
        },
        vec![],
    );

    // Unlike group-by, the second k=1 run starts a new group.
    assert_eq!(
        transform_to_text(&executable, keyed_items()).expect("transform"),
        "1:a;2:b;1:c;3:d;"
    );
}

#[test]
fn group_starting_with_splits_at_header_items() {
    let executable = grouping_executable(
        GroupAlgorithm::StartingWith(Arc::new(NamePattern::element("h"))),
        vec![],
    );

    let root = MockTreeBuilder::new()
        .start_element("doc")
        .start_element("h")
        .text("H1")
        .end_element()
        .start_element("p")
        .text("a")
        .end_element()
        .start_element("p")
        .text("b")
        .end_element()
        .start_element("h")
        .text("H2")
        .end_element()
        .start_element("p")
        .text("c")
        .end_element()
        .end_element()
        .build()
        .root();

    // Positional grouping has no grouping key.
    assert_eq!(
        transform_to_text(&executable, root).expect("transform"),
        ":H1ab;:H2c;"
    );
}

#[test]
fn group_ending_with_closes_at_trailer_items() {
    let executable = grouping_executable(
        GroupAlgorithm::EndingWith(Arc::new(NamePattern::element("end"))),
        vec![],
    );

    let root = MockTreeBuilder::new()
        .start_element("doc")
        .start_element("p")
        .text("a")
        .end_element()
        .start_element("p")
        .text("b")
        .end_element()
        .start_element("end")
        .text("|")
        .end_element()
        .start_element("p")
        .text("c")
        .end_element()
        .end_element()
        .build()
        .root();

    // The trailing run without a closing item still forms a final group.
    assert_eq!(
        transform_to_text(&executable, root).expect("transform"),
        ":ab|;:c;"
    );
}
