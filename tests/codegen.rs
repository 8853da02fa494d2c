//! Tests for lowering graphs to the statement IR.
mod common;
use common::*;
use kumiki::codegen::{Ambient, BinOp, Expr, FailReason, Literal, Program, Stmt, WaitKind};
use kumiki::error::ResolveError;
use kumiki::graph::{FlowEdge, Node, NodeGraph, Permissions};
use kumiki::instrument::TraceKind;
use kumiki::prelude::*;
use std::sync::Arc;

fn generate(graph: NodeGraph) -> Program {
    Compiler::builder(graph)
        .build()
        .generate()
        .expect("Failed to generate")
}

fn log_stmt(unit: &str, message: Expr) -> Stmt {
    Stmt::Expr(Expr::helper("log_message", vec![Expr::str(unit), message]))
}

#[test]
fn test_empty_handler() {
    let program = generate(empty_graph());
    assert_eq!(program.units.len(), 1);

    let unit = &program.units[0];
    assert_eq!(unit.kind, UnitKind::Handler);
    assert_eq!(unit.ident, "on_test");
    assert_eq!(unit.event.as_deref(), Some("OnTest"));
    assert!(unit.body.is_empty());
    assert!(!unit.cancellable);
    assert_eq!(program.placeholders, 0);
    assert_eq!(program.package, "game");
    assert_eq!(program.state_type, "State");
}

#[test]
fn test_decision_becomes_if_else() {
    let program = generate(decision_graph());
    let unit = program.unit("OnScore").expect("OnScore should be generated");
    assert_eq!(unit.event.as_deref(), Some("score"));

    let expected = vec![
        Stmt::Let {
            name: "check_result".to_string(),
            mutable: false,
            value: Expr::binary(BinOp::Gt, Expr::var("points"), Expr::int(10)),
        },
        Stmt::If {
            condition: Expr::var("check_result"),
            then: vec![log_stmt("OnScore", Expr::str("big score"))],
            otherwise: vec![log_stmt("OnScore", Expr::str("small score"))],
        },
    ];
    assert_eq!(unit.body, expected);
}

#[test]
fn test_arms_stop_at_their_join() {
    let graph = graph_of(vec![handler(
        "OnJoinArms",
        vec![
            Node::new("d", "branch").with_input("condition", true),
            Node::new("a", "log").with_input("message", "a"),
            Node::new("b", "log").with_input("message", "b"),
            Node::new("after", "log").with_input("message", "after"),
        ],
        vec![
            FlowEdge::new("start", "d"),
            FlowEdge::labeled("d", "a", "true"),
            FlowEdge::labeled("d", "b", "false"),
            FlowEdge::new("a", "after"),
            FlowEdge::new("b", "after"),
            FlowEdge::new("after", "end"),
        ],
    )]);
    let program = generate(graph);
    let body = &program.units[0].body;

    assert_eq!(body.len(), 2);
    match &body[0] {
        Stmt::If { then, otherwise, .. } => {
            assert_eq!(then, &vec![log_stmt("OnJoinArms", Expr::str("a"))]);
            assert_eq!(otherwise, &vec![log_stmt("OnJoinArms", Expr::str("b"))]);
        }
        other => panic!("Expected an if, got {:?}", other),
    }
    assert_eq!(body[1], log_stmt("OnJoinArms", Expr::str("after")));
}

#[test]
fn test_host_only_permission_guards_the_body() {
    let mut graph = empty_graph();
    graph.handlers[0].permissions = Some(Permissions {
        host_only: true,
        ..Default::default()
    });
    let program = generate(graph);

    let is_host = Expr::Ambient(Ambient::Session)
        .method("is_host", vec![Expr::Ambient(Ambient::Sender)]);
    assert_eq!(
        program.units[0].body,
        vec![Stmt::If {
            condition: Expr::not(is_host),
            then: vec![Stmt::Fail(FailReason::NotHost)],
            otherwise: vec![],
        }]
    );
}

#[test]
fn test_player_param_and_allow_list() {
    let mut graph = empty_graph();
    graph.handlers[0].parameters = vec![param("target", "string")];
    graph.handlers[0].permissions = Some(Permissions {
        player_param: Some("target".to_string()),
        allowed_players: vec!["alice".to_string()],
        ..Default::default()
    });
    let body = generate(graph).units[0].body.clone();

    assert_eq!(body.len(), 2);
    match &body[0] {
        Stmt::If {
            condition: Expr::Binary { op, .. },
            then,
            ..
        } => {
            assert_eq!(*op, BinOp::Ne);
            assert_eq!(then, &vec![Stmt::Fail(FailReason::NotPermitted)]);
        }
        other => panic!("Expected a sender check, got {:?}", other),
    }
    match &body[1] {
        Stmt::If { condition, .. } => assert_eq!(
            condition,
            &Expr::not(Expr::InList {
                needle: Box::new(Expr::Ambient(Ambient::Sender)),
                list: vec![Literal::Str("alice".to_string())],
            })
        ),
        other => panic!("Expected an allow-list check, got {:?}", other),
    }
}

#[test]
fn test_unknown_player_param_is_reported() {
    let mut graph = empty_graph();
    graph.handlers[0].permissions = Some(Permissions {
        player_param: Some("nobody".to_string()),
        ..Default::default()
    });
    let result = Compiler::builder(graph).build().generate();
    match result.err().unwrap() {
        CompileError::Generate(GenerateError::Resolve { source, .. }) => {
            assert_eq!(source, ResolveError::UnknownParameter("nobody".to_string()));
        }
        other => panic!("Expected UnknownParameter, got {:?}", other),
    }
}

#[test]
fn test_reference_to_ghost_node() {
    let graph = graph_of(vec![handler(
        "OnGhost",
        vec![Node::new("say", "log").with_input("message", "node:ghost:value")],
        chain(&["say"]),
    )]);

    let compiler = Compiler::builder(graph).build();
    assert!(compiler.validate().is_ok(), "References are resolved during generation");

    match compiler.generate().err().unwrap() {
        CompileError::Generate(GenerateError::Resolve { unit, node, source }) => {
            assert_eq!(unit, "handler 'OnGhost'");
            assert_eq!(node, "say");
            assert_eq!(source, ResolveError::UnknownNode("ghost".to_string()));
        }
        other => panic!("Expected a resolve error, got {:?}", other),
    }
}

#[test]
fn test_forward_reference_is_rejected() {
    let graph = graph_of(vec![handler(
        "OnForward",
        vec![
            Node::new("first", "log").with_input("message", "node:later:result"),
            Node::new("later", "toString").with_input("value", 1),
        ],
        chain(&["first", "later"]),
    )]);

    match Compiler::builder(graph).build().generate().err().unwrap() {
        CompileError::Generate(GenerateError::Resolve { node, source, .. }) => {
            assert_eq!(node, "first");
            assert!(matches!(source, ResolveError::UnproducedOutput { .. }));
        }
        other => panic!("Expected UnproducedOutput, got {:?}", other),
    }
}

#[test]
fn test_loop_variables_are_out_of_scope_after_the_loop() {
    let mut graph = loop_graph();
    let h = &mut graph.handlers[0];
    h.nodes.push(Node::new("shout", "toString").with_input("value", "node:each:item"));
    h.nodes[2] = Node::new("done", "log").with_input("message", "node:shout:result");
    h.flow = vec![
        FlowEdge::new("start", "each"),
        FlowEdge::labeled("each", "shout", "body"),
        FlowEdge::new("shout", "each"),
        FlowEdge::labeled("each", "done", "done"),
        FlowEdge::new("done", "end"),
    ];
    // `say` is no longer wired into the flow.
    h.nodes.remove(1);

    match Compiler::builder(graph).build().generate().err().unwrap() {
        CompileError::Generate(GenerateError::Resolve { node, source, .. }) => {
            assert_eq!(node, "done");
            assert_eq!(
                source,
                ResolveError::UnproducedOutput {
                    node: "shout".to_string(),
                    port: "result".to_string(),
                }
            );
        }
        other => panic!("Expected an out-of-scope error, got {:?}", other),
    }
}

#[test]
fn test_custom_kind_without_emitter_becomes_placeholder() {
    let graph = graph_of(vec![handler(
        "OnMystery",
        vec![
            Node::new("m", "mystery").with_input("value", 1),
            Node::new("say", "toString").with_input("value", "node:m:value"),
        ],
        chain(&["m", "say"]),
    )]);

    let program = Compiler::builder(graph)
        .with_registry(Arc::new(registry_with_placeholder()))
        .build()
        .generate()
        .expect("Placeholders are not errors");

    assert_eq!(program.placeholders, 1);
    let body = &program.units[0].body;
    assert_eq!(
        body[0],
        Stmt::Placeholder {
            node: "m".to_string(),
            kind: "mystery".to_string(),
        }
    );
    assert_eq!(
        body[1],
        Stmt::Let {
            name: "m_value".to_string(),
            mutable: false,
            value: Expr::Lit(Literal::Null),
        }
    );
    assert_eq!(body.len(), 3);
}

#[test]
fn test_labelled_loop() {
    let program = generate(loop_graph());
    let body = &program.units[0].body;

    assert_eq!(
        body[0],
        Stmt::ForEach {
            item: "each_item".to_string(),
            index: "each_index".to_string(),
            iter: Expr::var("names"),
            mutable: false,
            body: vec![log_stmt("OnAnnounce", Expr::var("each_item"))],
        }
    );
    assert_eq!(body[1], log_stmt("OnAnnounce", Expr::str("finished")));
    assert_eq!(body.len(), 2);
}

#[test]
fn test_single_edge_loop_takes_the_rest_of_the_chain() {
    let graph = graph_of(vec![handler(
        "OnRepeat",
        vec![
            Node::new("rep", "repeat").with_input("count", 3),
            Node::new("say", "log").with_input("message", "node:rep:index"),
        ],
        chain(&["rep", "say"]),
    )]);
    let program = generate(graph);

    assert_eq!(
        program.units[0].body,
        vec![Stmt::Repeat {
            index: "rep_index".to_string(),
            count: Expr::int(3),
            body: vec![log_stmt("OnRepeat", Expr::var("rep_index"))],
        }]
    );
}

#[test]
fn test_for_each_where_skips_non_matching_items() {
    let graph = graph_of(vec![handler(
        "OnReady",
        vec![
            Node::new("ready", "forEachWhere")
                .with_input("path", "players")
                .with_input("field", "ready")
                .with_input("equals", true),
            Node::new("say", "log").with_input("message", "ready"),
        ],
        chain(&["ready", "say"]),
    )]);
    let program = Compiler::builder(graph)
        .with_schema(game_schema())
        .build()
        .generate()
        .expect("Failed to generate");

    match &program.units[0].body[0] {
        Stmt::ForEach { body, .. } => match &body[0] {
            Stmt::If { then, .. } => assert_eq!(then, &vec![Stmt::Continue]),
            other => panic!("Expected a filter, got {:?}", other),
        },
        other => panic!("Expected a loop, got {:?}", other),
    }
}

#[test]
fn test_untyped_state_access_without_schema() {
    let program = generate(state_graph());
    let body = &program.units[0].body;

    let keys = Expr::Slice(vec![Expr::helper("path_field", vec![Expr::str("round")])]);
    let read = Expr::helper("state_get", vec![Expr::Ambient(Ambient::State), keys]).try_();
    assert_eq!(
        body[0],
        Stmt::Let {
            name: "bump_current".to_string(),
            mutable: false,
            value: read,
        }
    );
    assert!(matches!(&body[1], Stmt::Let { name, .. } if name == "bump_value"));
}

#[test]
fn test_typed_state_access_with_schema() {
    let program = Compiler::builder(state_graph())
        .with_schema(game_schema())
        .build()
        .generate()
        .expect("Failed to generate");
    assert_eq!(program.state_type, "GameState");
    assert!(program.schema.is_some());

    let body = &program.units[0].body;
    assert_eq!(
        body[0],
        Stmt::Let {
            name: "bump_current".to_string(),
            mutable: false,
            value: Expr::Ambient(Ambient::State)
                .method("get_round", vec![])
                .owned(),
        }
    );
    assert_eq!(
        body[1],
        Stmt::Let {
            name: "bump_value".to_string(),
            mutable: false,
            value: Expr::binary(BinOp::Add, Expr::var("bump_current"), Expr::int(1)),
        }
    );
}

#[test]
fn test_unknown_schema_field_is_reported() {
    let graph = graph_of(vec![handler(
        "OnBad",
        vec![Node::new("get", "getState").with_input("path", "players[0].health")],
        chain(&["get"]),
    )]);
    let result = Compiler::builder(graph)
        .with_schema(game_schema())
        .build()
        .generate();
    match result.err().unwrap() {
        CompileError::Generate(GenerateError::Resolve { source, .. }) => {
            assert!(matches!(source, ResolveError::UnknownField { .. }));
        }
        other => panic!("Expected UnknownField, got {:?}", other),
    }
}

#[test]
fn test_path_must_be_literal() {
    let mut graph = graph_of(vec![handler(
        "OnDynamicPath",
        vec![Node::new("get", "getState").with_input("path", "param:where")],
        chain(&["get"]),
    )]);
    graph.handlers[0].parameters = vec![param("where", "string")];
    match Compiler::builder(graph).build().generate().err().unwrap() {
        CompileError::Generate(GenerateError::LiteralRequired { port, .. }) => {
            assert_eq!(port, "path");
        }
        other => panic!("Expected LiteralRequired, got {:?}", other),
    }
}

#[test]
fn test_format_fills_named_placeholders() {
    let graph = NodeGraph::from_json(&graph_json()).unwrap();
    let program = generate(graph);
    let unit = program.unit("OnJoin").unwrap();

    assert!(unit.body.contains(&Stmt::Let {
        name: "greet_result".to_string(),
        mutable: false,
        value: Expr::Format {
            template: "welcome {}".to_string(),
            args: vec![Expr::var("nickname")],
        },
    }));
}

#[test]
fn test_function_returns_value() {
    let graph = NodeGraph::from_json(&graph_json()).unwrap();
    let program = generate(graph);
    let double = program.unit("Double").unwrap();

    assert_eq!(double.kind, UnitKind::Function);
    assert_eq!(double.returns, Some(ValueType::Int));
    assert_eq!(double.params[0].name, "n");
    assert_eq!(
        double.body.last(),
        Some(&Stmt::Return(Some(Expr::var("times_result"))))
    );
}

#[test]
fn test_waits_make_callers_cancellable() {
    let program = generate(waiting_graph());

    let pause = program.unit("Pause").unwrap();
    assert!(pause.cancellable);
    assert_eq!(
        pause.body,
        vec![Stmt::Wait {
            node: "sleep".to_string(),
            kind: WaitKind::Duration(Expr::int(1000)),
        }]
    );

    let countdown = program.unit("OnCountdown").unwrap();
    assert!(countdown.cancellable);
    assert_eq!(
        countdown.body[0],
        Stmt::Expr(
            Expr::Call {
                function: "pause".to_string(),
                args: vec![],
                cancellable: true,
            }
            .try_()
        )
    );
}

#[test]
fn test_tracing_wraps_every_node() {
    let program = Compiler::builder(decision_graph())
        .with_tracing(true)
        .build()
        .generate()
        .expect("Failed to generate");
    let unit = &program.units[0];
    assert!(unit.traced);
    assert!(program.tracing);

    let kinds: Vec<(TraceKind, &str)> = unit
        .body
        .iter()
        .filter_map(|s| match s {
            Stmt::Trace(point) => Some((point.kind, point.node.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            (TraceKind::NodeStart, "check"),
            (TraceKind::NodeEnd, "check"),
            (TraceKind::NodeStart, "decide"),
            (TraceKind::NodeEnd, "decide"),
        ]
    );

    match unit.body.last() {
        Some(Stmt::If { then, .. }) => {
            let first = then.first();
            let last = then.last();
            assert!(
                matches!(first, Some(Stmt::Trace(p)) if p.kind == TraceKind::NodeStart && p.node == "big")
            );
            assert!(
                matches!(last, Some(Stmt::Trace(p)) if p.kind == TraceKind::NodeEnd && p.node == "big")
            );
        }
        other => panic!("Expected the branch last, got {:?}", other),
    }
}

#[test]
fn test_wait_is_traced_around() {
    let program = Compiler::builder(waiting_graph())
        .with_tracing(true)
        .build()
        .generate()
        .unwrap();
    let pause = program.unit("Pause").unwrap();
    let kinds: Vec<TraceKind> = pause
        .body
        .iter()
        .filter_map(|s| match s {
            Stmt::Trace(point) => Some(point.kind),
            _ => None,
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            TraceKind::NodeStart,
            TraceKind::NodeWait,
            TraceKind::NodeResume,
            TraceKind::NodeEnd,
        ]
    );
}

#[test]
fn test_variable_names_are_unique() {
    let graph = graph_of(vec![handler(
        "OnNames",
        vec![
            Node::new("for", "toString").with_input("value", 1),
            Node::new("p", "constant").with_input("value", 2),
            Node::new("P", "constant").with_input("value", 3),
        ],
        chain(&["for", "p", "P"]),
    )]);
    let program = generate(graph);
    let names: Vec<&str> = program.units[0]
        .body
        .iter()
        .filter_map(|s| match s {
            Stmt::Let { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["for_result", "p_value", "p_value_1"]);
}

#[test]
fn test_nested_early_exit_rejoins_outer_arms() {
    let log = |text: &str| log_stmt("OnNested", Expr::str(text));
    let nested = Stmt::If {
        condition: Expr::Lit(Literal::Bool(false)),
        then: vec![Stmt::Return(None)],
        otherwise: vec![log("z")],
    };

    let program = generate(nested_exit_graph(false));
    assert_eq!(
        program.units[0].body,
        vec![
            Stmt::If {
                condition: Expr::Lit(Literal::Bool(true)),
                then: vec![nested.clone()],
                otherwise: vec![log("y")],
            },
            log("j"),
        ]
    );

    // Swapping the outer labels only swaps the arms.
    let program = generate(nested_exit_graph(true));
    assert_eq!(
        program.units[0].body,
        vec![
            Stmt::If {
                condition: Expr::Lit(Literal::Bool(true)),
                then: vec![log("y")],
                otherwise: vec![nested],
            },
            log("j"),
        ]
    );
}

#[test]
fn test_decision_inside_loop_body_joins_at_the_loop() {
    let mut graph = loop_graph();
    let h = &mut graph.handlers[0];
    h.nodes = vec![
        Node::new("each", "forEach").with_input("collection", "param:names"),
        Node::new("d", "branch").with_input("condition", true),
        Node::new("x", "log").with_input("message", "x"),
        Node::new("y", "log").with_input("message", "y"),
        Node::new("done", "log").with_input("message", "finished"),
    ];
    h.flow = vec![
        FlowEdge::new("start", "each"),
        FlowEdge::labeled("each", "d", "body"),
        FlowEdge::labeled("d", "x", "true"),
        FlowEdge::labeled("d", "y", "false"),
        FlowEdge::new("x", "each"),
        FlowEdge::new("y", "each"),
        FlowEdge::labeled("each", "done", "done"),
        FlowEdge::new("done", "end"),
    ];

    let program = generate(graph);
    let body = &program.units[0].body;
    assert_eq!(body.len(), 2);
    match &body[0] {
        Stmt::ForEach { body, .. } => assert_eq!(
            body,
            &vec![Stmt::If {
                condition: Expr::Lit(Literal::Bool(true)),
                then: vec![log_stmt("OnAnnounce", Expr::str("x"))],
                otherwise: vec![log_stmt("OnAnnounce", Expr::str("y"))],
            }]
        ),
        other => panic!("Expected a loop, got {:?}", other),
    }
    assert_eq!(body[1], log_stmt("OnAnnounce", Expr::str("finished")));
}

#[test]
fn test_index_past_i64_range_is_rejected() {
    let graph = graph_of(vec![handler(
        "OnHuge",
        vec![Node::new("get", "getState").with_input("path", "items[9223372036854775808]")],
        chain(&["get"]),
    )]);
    match Compiler::builder(graph).build().generate().err().unwrap() {
        CompileError::Generate(GenerateError::Resolve { node, source, .. }) => {
            assert_eq!(node, "get");
            assert_eq!(
                source,
                ResolveError::IndexOverflow {
                    field: "items".to_string(),
                    index: 9_223_372_036_854_775_808,
                }
            );
        }
        other => panic!("Expected an index overflow, got {:?}", other),
    }

    // The largest position still compiles.
    let graph = graph_of(vec![handler(
        "OnLargest",
        vec![Node::new("get", "getState").with_input("path", "items[9223372036854775807]")],
        chain(&["get"]),
    )]);
    assert!(Compiler::builder(graph).build().generate().is_ok());
}
