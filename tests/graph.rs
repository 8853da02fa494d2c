//! Tests for graph loading, flow indexing and input classification.
mod common;
use common::*;
use kumiki::error::{ParseError, ResolveError};
use kumiki::graph::{FlowEdge, FlowIndex, InputRef, NodeGraph, UnitKind};
use serde_json::json;

#[test]
fn test_graph_from_json() {
    let graph = NodeGraph::from_json(&graph_json()).expect("Failed to parse graph");
    assert_eq!(graph.package, "lobby");
    assert_eq!(graph.handlers.len(), 1);

    let join = &graph.handlers[0];
    assert_eq!(join.event, "join");
    assert_eq!(join.nodes[0].kind, "format");
    let permissions = join.permissions.as_ref().expect("permissions should parse");
    assert_eq!(permissions.allowed_players, vec!["alice", "bob"]);
    assert!(!permissions.host_only);

    let double = graph.function("Double").expect("Double should parse");
    assert_eq!(double.returns, "int");
    assert!(double.has_return());
}

#[test]
fn test_condition_is_an_alias_for_label() {
    let edge: FlowEdge =
        serde_json::from_value(json!({ "from": "a", "to": "b", "condition": "true" }))
            .expect("Failed to parse edge");
    assert_eq!(edge, FlowEdge::labeled("a", "b", "true"));
}

#[test]
fn test_invalid_graph_json() {
    assert!(matches!(
        NodeGraph::from_json("{ not json"),
        Err(ParseError::Graph(_))
    ));
    assert!(matches!(
        NodeGraph::from_json(r#"{"handlers": [{"nodes": []}]}"#),
        Err(ParseError::Graph(_))
    ));
}

#[test]
fn test_fragments_are_ordered_by_kind() {
    let mut graph = NodeGraph::from_json(&graph_json()).unwrap();
    graph.filters.push(kumiki::graph::FilterDefinition {
        name: "HideScores".to_string(),
        ..Default::default()
    });

    let fragments = graph.fragments();
    let kinds: Vec<(UnitKind, &str)> = fragments.iter().map(|f| (f.kind, f.name)).collect();
    assert_eq!(
        kinds,
        vec![
            (UnitKind::Handler, "OnJoin"),
            (UnitKind::Filter, "HideScores"),
            (UnitKind::Function, "Double"),
        ]
    );
    assert_eq!(fragments[2].returns, Some("int"));
    assert_eq!(fragments[0].location(), "handler 'OnJoin'");
}

#[test]
fn test_flow_index_navigation() {
    let graph = decision_graph();
    let index = FlowIndex::new(&graph.handlers[0].flow);

    assert_eq!(index.start(), Some("check"));
    assert_eq!(index.next("check"), Some("decide"));
    assert_eq!(index.labeled("decide", "true"), Some("big"));
    assert_eq!(index.labeled("decide", "false"), Some("small"));
    assert_eq!(index.unlabeled("decide"), None);
    assert_eq!(index.outgoing("decide").len(), 2);
    assert!(index.outgoing("end").is_empty());

    assert_eq!(index.join_point("big", "small"), Some("end"));
    assert!(index.reachable("check").contains("small"));
    assert_eq!(index.bfs("decide"), vec!["decide", "big", "small", "end"]);
    assert_eq!(index.bfs_avoiding("decide", &["small"]), vec!["decide", "big", "end"]);
}

#[test]
fn test_flow_index_join_before_end() {
    let flow = vec![
        FlowEdge::new("start", "d"),
        FlowEdge::labeled("d", "a", "true"),
        FlowEdge::labeled("d", "b", "false"),
        FlowEdge::new("a", "after"),
        FlowEdge::new("b", "extra"),
        FlowEdge::new("extra", "after"),
        FlowEdge::new("after", "end"),
    ];
    let index = FlowIndex::new(&flow);
    assert_eq!(index.join_point("a", "b"), Some("after"));
}

#[test]
fn test_flow_index_join_past_an_early_exit() {
    let graph = nested_exit_graph(false);
    let index = FlowIndex::new(&graph.handlers[0].flow);

    // One arm of `d2` reaches `end` first; the arms of `d1` still meet at `j`.
    assert_eq!(index.join_point("d2", "y"), Some("j"));
    assert_eq!(index.join_point("y", "d2"), Some("j"));
    assert_eq!(index.join_point_within("end", "z", &["d2"]), Some("end"));
    assert_eq!(index.join_point_within("end", "z", &["j"]), None);
    assert_eq!(
        index.bfs_bounded("d1", &["j"]),
        vec!["d1", "d2", "y", "end", "z", "j"]
    );
}

#[test]
fn test_input_classification() {
    let param = json!("param:score");
    assert_eq!(InputRef::classify(&param), Ok(InputRef::Param("score")));

    let node = json!("node:ns:inner:value");
    assert_eq!(
        InputRef::classify(&node),
        Ok(InputRef::Node {
            node: "ns:inner",
            port: "value"
        })
    );

    let view = json!("view:leader");
    assert_eq!(InputRef::classify(&view), Ok(InputRef::View("leader")));

    let text = json!("just text");
    assert!(InputRef::classify(&text).unwrap().is_literal());
    let number = json!(42);
    assert_eq!(InputRef::classify(&number), Ok(InputRef::Literal(&number)));

    for malformed in ["param:", "node:", "node:id", "node::port", "view:"] {
        let value = json!(malformed);
        assert!(
            matches!(
                InputRef::classify(&value),
                Err(ResolveError::MalformedReference(_))
            ),
            "'{}' should be malformed",
            malformed
        );
    }
}
