//! Common test utilities for building graphs, schemas and registries.
use kumiki::graph::{EventHandler, FlowEdge, FunctionDefinition, Node, NodeGraph, Parameter};
use kumiki::prelude::*;
use serde_json::json;

/// A schema with a root `GameState` holding a keyed array of `Player`s.
#[allow(dead_code)]
pub const GAME_SCHEMA: &str = r#"{
    "package": "game",
    "root": "GameState",
    "types": [
        {
            "name": "GameState",
            "id": 1,
            "fields": [
                { "name": "round", "type": "int" },
                { "name": "phase", "type": "string" },
                { "name": "players", "type": "[]Player", "key": "id" },
                { "name": "scores", "type": "map[string]int" },
                { "name": "winner", "type": "string", "optional": true }
            ]
        },
        {
            "name": "Player",
            "fields": [
                { "name": "id", "type": "string", "key": true },
                { "name": "name", "type": "string" },
                { "name": "score", "type": "int" },
                { "name": "ready", "type": "bool" }
            ]
        }
    ]
}"#;

/// The schema behind [`GAME_SCHEMA`], checked.
#[allow(dead_code)]
pub fn game_schema() -> SchemaContext {
    SchemaContext::from_json(GAME_SCHEMA).expect("Game schema should load")
}

#[allow(dead_code)]
pub fn param(name: &str, ty: &str) -> Parameter {
    Parameter {
        name: name.to_string(),
        ty: ty.to_string(),
    }
}

/// Flow edges `start -> ids[0] -> ... -> ids[n] -> end`.
#[allow(dead_code)]
pub fn chain(ids: &[&str]) -> Vec<FlowEdge> {
    let mut points = vec!["start"];
    points.extend_from_slice(ids);
    points.push("end");
    points
        .windows(2)
        .map(|pair| FlowEdge::new(pair[0], pair[1]))
        .collect()
}

#[allow(dead_code)]
pub fn handler(name: &str, nodes: Vec<Node>, flow: Vec<FlowEdge>) -> EventHandler {
    EventHandler {
        name: name.to_string(),
        nodes,
        flow,
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn function(
    name: &str,
    parameters: Vec<Parameter>,
    returns: &str,
    nodes: Vec<Node>,
    flow: Vec<FlowEdge>,
) -> FunctionDefinition {
    FunctionDefinition {
        name: name.to_string(),
        parameters,
        returns: returns.to_string(),
        nodes,
        flow,
    }
}

/// A graph made of the given handlers.
#[allow(dead_code)]
pub fn graph_of(handlers: Vec<EventHandler>) -> NodeGraph {
    NodeGraph {
        package: "game".to_string(),
        handlers,
        ..Default::default()
    }
}

/// A handler `OnTest` with no nodes at all.
#[allow(dead_code)]
pub fn empty_graph() -> NodeGraph {
    graph_of(vec![handler("OnTest", vec![], vec![])])
}

/// `OnScore(points: int)`: compares `points` with 10 and logs one of two
/// messages.
///
/// Logic: `start -> check -> decide -(true)-> big / -(false)-> small -> end`
#[allow(dead_code)]
pub fn decision_graph() -> NodeGraph {
    let mut h = handler(
        "OnScore",
        vec![
            Node::new("check", "greaterThan")
                .with_input("a", "param:points")
                .with_input("b", 10),
            Node::new("decide", "branch").with_input("condition", "node:check:result"),
            Node::new("big", "log").with_input("message", "big score"),
            Node::new("small", "log").with_input("message", "small score"),
        ],
        vec![
            FlowEdge::new("start", "check"),
            FlowEdge::new("check", "decide"),
            FlowEdge::labeled("decide", "big", "true"),
            FlowEdge::labeled("decide", "small", "false"),
            FlowEdge::new("big", "end"),
            FlowEdge::new("small", "end"),
        ],
    );
    h.event = "score".to_string();
    h.parameters = vec![param("points", "int")];
    graph_of(vec![h])
}

/// `d1` leads to a nested decision whose `true` arm leaves the handler
/// while its `false` arm rejoins the outer arms at `j`.
#[allow(dead_code)]
pub fn nested_exit_graph(swap_outer: bool) -> NodeGraph {
    let (to_nested, to_y) = if swap_outer {
        ("false", "true")
    } else {
        ("true", "false")
    };
    graph_of(vec![handler(
        "OnNested",
        vec![
            Node::new("d1", "branch").with_input("condition", true),
            Node::new("d2", "branch").with_input("condition", false),
            Node::new("y", "log").with_input("message", "y"),
            Node::new("z", "log").with_input("message", "z"),
            Node::new("j", "log").with_input("message", "j"),
        ],
        vec![
            FlowEdge::new("start", "d1"),
            FlowEdge::labeled("d1", "d2", to_nested),
            FlowEdge::labeled("d1", "y", to_y),
            FlowEdge::labeled("d2", "end", "true"),
            FlowEdge::labeled("d2", "z", "false"),
            FlowEdge::new("y", "j"),
            FlowEdge::new("z", "j"),
            FlowEdge::new("j", "end"),
        ],
    )])
}

/// `OnAnnounce(names: []string)`: logs every name in a labelled loop.
#[allow(dead_code)]
pub fn loop_graph() -> NodeGraph {
    let mut h = handler(
        "OnAnnounce",
        vec![
            Node::new("each", "forEach").with_input("collection", "param:names"),
            Node::new("say", "log").with_input("message", "node:each:item"),
            Node::new("done", "log").with_input("message", "finished"),
        ],
        vec![
            FlowEdge::new("start", "each"),
            FlowEdge::labeled("each", "say", "body"),
            FlowEdge::new("say", "each"),
            FlowEdge::labeled("each", "done", "done"),
            FlowEdge::new("done", "end"),
        ],
    );
    h.parameters = vec![param("names", "[]string")];
    graph_of(vec![h])
}

/// A graph whose single handler reads and writes typed state through
/// [`GAME_SCHEMA`].
#[allow(dead_code)]
pub fn state_graph() -> NodeGraph {
    graph_of(vec![handler(
        "OnNextRound",
        vec![
            Node::new("bump", "incrementState").with_input("path", "round"),
            Node::new("phase", "setState")
                .with_input("path", "phase")
                .with_input("value", "playing"),
        ],
        chain(&["bump", "phase"]),
    )])
}

/// A graph with a handler that waits and a function that calls it.
#[allow(dead_code)]
pub fn waiting_graph() -> NodeGraph {
    let mut graph = graph_of(vec![handler(
        "OnCountdown",
        vec![
            Node::new("pause", "callFunction").with_input("function", "Pause"),
            Node::new("go", "broadcast").with_input("event", "go"),
        ],
        chain(&["pause", "go"]),
    )]);
    graph.functions.push(function(
        "Pause",
        vec![],
        "",
        vec![Node::new("sleep", "wait").with_input("duration", 1000)],
        chain(&["sleep"]),
    ));
    graph
}

/// A registry with a `mystery` kind that has no emitter.
#[allow(dead_code)]
pub fn registry_with_placeholder() -> Registry {
    let registry = Registry::new();
    registry
        .register(
            NodeDefinition::new("mystery", NodeCategory::Custom)
                .input("value", ValueType::Int)
                .output("value", ValueType::Int),
        )
        .expect("mystery should register");
    registry
}

/// Renders a graph for one target, panicking on any error.
#[allow(dead_code)]
pub fn render(graph: NodeGraph, target: Target) -> String {
    Compiler::builder(graph)
        .with_target(target)
        .build()
        .compile()
        .expect("Failed to compile")
}

#[allow(dead_code)]
pub fn graph_json() -> String {
    json!({
        "version": 1,
        "package": "lobby",
        "handlers": [{
            "name": "OnJoin",
            "event": "join",
            "permissions": { "allowedPlayers": ["alice", "bob"] },
            "parameters": [{ "name": "nickname", "type": "string" }],
            "nodes": [
                { "id": "greet", "type": "format", "inputs": {
                    "template": "welcome {who}",
                    "who": "param:nickname"
                }},
                { "id": "tell", "type": "broadcast", "inputs": {
                    "event": "joined",
                    "payload": "node:greet:result"
                }}
            ],
            "flow": [
                { "from": "start", "to": "greet" },
                { "from": "greet", "to": "tell" },
                { "from": "tell", "to": "end" }
            ]
        }],
        "functions": [{
            "name": "Double",
            "parameters": [{ "name": "n", "type": "int" }],
            "returnType": "int",
            "nodes": [
                { "id": "times", "type": "multiply", "inputs": { "a": "param:n", "b": 2 } },
                { "id": "out", "type": "return", "inputs": { "value": "node:times:result" } }
            ],
            "flow": [
                { "from": "start", "to": "times" },
                { "from": "times", "to": "out" }
            ]
        }]
    })
    .to_string()
}
