//! Tests for the Rust and JavaScript printers.
mod common;
use common::*;
use kumiki::graph::{FilterDefinition, NodeGraph, Permissions};
use kumiki::naming::{ident, to_camel_case, to_pascal_case, to_snake_case};
use kumiki::prelude::*;
use std::sync::Arc;

fn typed(graph: NodeGraph, target: Target) -> String {
    Compiler::builder(graph)
        .with_schema(game_schema())
        .build()
        .compile_to(target)
        .expect("Failed to compile")
}

fn with_filter(mut graph: NodeGraph) -> NodeGraph {
    graph.filters.push(FilterDefinition {
        name: "HideAll".to_string(),
        ..Default::default()
    });
    graph
}

#[test]
fn test_rust_empty_handler() {
    let source = render(empty_graph(), Target::Rust);
    assert!(source.starts_with("// Code generated by kumiki. DO NOT EDIT.\n// Package: game\n"));
    assert!(source.contains("use kumiki_runtime::prelude::*;"));
    assert!(source.contains("/// Handles the `OnTest` event."));
    assert!(source.contains(
        "pub fn on_test(session: &mut Session, state: &mut State, sender: &str) -> Result<(), HandlerError> {\n    Ok(())\n}"
    ));
    assert!(!source.contains("pub struct"));
}

#[test]
fn test_rust_decision() {
    let source = render(decision_graph(), Target::Rust);
    assert!(source.contains(
        "pub fn on_score(session: &mut Session, state: &mut State, sender: &str, points: i64)"
    ));
    assert!(source.contains("    let check_result = points > 10;\n"));
    assert!(source.contains("    if check_result {\n"));
    assert!(source.contains("        log_message(\"OnScore\", \"big score\");\n"));
    assert!(source.contains("    } else {\n"));
    assert!(source.contains("        log_message(\"OnScore\", \"small score\");\n"));
}

#[test]
fn test_rust_host_only_guard() {
    let mut graph = empty_graph();
    graph.handlers[0].permissions = Some(Permissions {
        host_only: true,
        ..Default::default()
    });
    let source = render(graph, Target::Rust);
    assert!(source.contains("return Err(HandlerError::NotHost);"), "{}", source);
}

#[test]
fn test_placeholder_is_printed_in_both_targets() {
    let mut graph = empty_graph();
    graph.handlers[0].nodes = vec![kumiki::graph::Node::new("m", "mystery").with_input("value", 1)];
    graph.handlers[0].flow = chain(&["m"]);

    let compiler = Compiler::builder(graph)
        .with_registry(Arc::new(registry_with_placeholder()))
        .build();
    let comment = "// NOT IMPLEMENTED: node 'm' of kind 'mystery' has no emitter";
    for target in [Target::Rust, Target::JavaScript] {
        let source = compiler.compile_to(target).expect("Failed to compile");
        assert!(source.contains(comment), "{}: {}", target, source);
    }
}

#[test]
fn test_rust_waits_are_async_and_cancellable() {
    let source = render(waiting_graph(), Target::Rust);
    assert!(source.contains(
        "pub async fn on_countdown(session: &mut Session, state: &mut State, sender: &str, cancel: &CancellationToken) -> Result<(), HandlerError> {"
    ));
    assert!(source.contains("pause(session, state, sender, cancel).await?;"));
    assert!(source.contains("tokio::select! {"));
    assert!(source.contains("_ = cancel.cancelled() => return Err(HandlerError::Cancelled),"));
    assert!(source.contains("std::time::Duration::from_millis(1000i64.max(0) as u64)"));
}

#[test]
fn test_rust_format_and_function() {
    let source = compile_json(Target::Rust);
    assert!(source.contains("format!(\"welcome {}\", nickname)"), "{}", source);
    assert!(source.contains(
        "pub fn double(session: &mut Session, state: &mut State, sender: &str, n: i64) -> Result<i64, HandlerError> {"
    ));
    assert!(source.contains("return Ok(times_result);"));
    assert!(source.contains("/// Function `Double`."));
}

#[test]
fn test_rust_types_from_schema() {
    let source = typed(state_graph(), Target::Rust);
    assert!(source.contains("/// Schema type `GameState` (id 1)."));
    assert!(source.contains("#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]"));
    assert!(source.contains("pub struct GameState {"));
    assert!(source.contains("pub struct Player {"));
    assert!(source.contains("pub fn find_players_by_id(&self, key: &str)"));
    assert!(source.contains("pub fn set_scores_key(&mut self"));
    assert!(source.contains("    #[serde(default)]\n    pub winner: "));
    assert!(source.contains("state: &mut GameState"));
}

#[test]
fn test_types_can_be_turned_off() {
    let source = Compiler::builder(state_graph())
        .with_schema(game_schema())
        .with_types(false)
        .build()
        .compile()
        .expect("Failed to compile");
    assert!(!source.contains("pub struct GameState {"));
    // Access stays typed.
    assert!(source.contains("state: &mut GameState"));
}

#[test]
fn test_rust_filter_registry() {
    let source = render(with_filter(empty_graph()), Target::Rust);
    assert!(source.contains("pub type FilterFn = fn(&State, &str) -> Result<State, HandlerError>;"));
    assert!(source.contains("pub struct FilterRegistry {"));
    assert!(source.contains("pub const FILTERS: &[(&str, FilterFn)] = &[(\"HideAll\", hide_all as FilterFn)];"));
    assert!(source.contains("pub fn hide_all(state: &State, viewer: &str) -> Result<State, HandlerError> {"));
    assert!(source.contains("let mut __filtered = state.clone();"));
    assert!(source.contains("Ok(__filtered)"));

    let plain = render(empty_graph(), Target::Rust);
    assert!(!plain.contains("FilterRegistry"));
}

#[test]
fn test_rust_tracing_preamble() {
    let source = Compiler::builder(decision_graph())
        .with_tracing(true)
        .build()
        .compile()
        .expect("Failed to compile");
    assert!(source.contains("pub trait TraceSink: Send + Sync {"));
    assert!(source.contains("pub static TRACE_HUB: TraceHub = TraceHub::new();"));
    assert!(source.contains("let mut __trace = TraceScope::begin(&TRACE_HUB, session.id(), \"OnScore\");"));
    assert!(source.contains("__trace.node_start(\"check\");"));
    assert!(source.contains("__trace.finish(&__result);"));

    let untraced = render(decision_graph(), Target::Rust);
    assert!(!untraced.contains("TraceScope"));
}

#[test]
fn test_javascript_handler() {
    let source = render(decision_graph(), Target::JavaScript);
    assert!(source.starts_with("// Code generated by kumiki. DO NOT EDIT.\n"));
    assert!(source.contains("import * as rt from \"kumiki-runtime\";"));
    assert!(source.contains("/** Handles the `score` event. */"));
    assert!(source.contains("export function onScore(session, state, sender, points) {"));
    assert!(source.contains("try {"));
    assert!(source.contains("const check_result = points > 10;"), "{}", source);
    assert!(source.contains("if (check_result) {"));
    assert!(source.contains("rt.logMessage(\"OnScore\", \"big score\");"));
    assert!(source.contains("return { ok: true };"));
    assert!(source.contains("} catch (error) {"));
    assert!(source.contains("if (error instanceof rt.HandlerError) {"));
    assert!(source.contains("return { ok: false, error: error.message };"));
}

#[test]
fn test_javascript_waits_and_functions() {
    let source = render(waiting_graph(), Target::JavaScript);
    assert!(source.contains("export async function onCountdown(session, state, sender, signal) {"));
    assert!(source.contains("await pause(session, state, sender, signal)"));
    assert!(source.contains("await rt.sleepOrCancel(1000, signal);"));
    assert!(source.contains("/** Function `Pause`. */"));
}

#[test]
fn test_javascript_types_and_filters() {
    let source = typed(with_filter(state_graph()), Target::JavaScript);
    assert!(source.contains("/** Schema type `GameState`. */"));
    assert!(source.contains("export class GameState {"));
    assert!(source.contains("constructor(data = {}) {"));
    assert!(source.contains("export class FilterRegistry {"));
    assert!(source.contains("export function hideAll(state, viewer) {"));
    assert!(source.contains("const __filtered = rt.clone(state);"));
    assert!(source.contains("export const FILTERS = { \"HideAll\": hideAll };"));
}

#[test]
fn test_target_parsing() {
    assert_eq!("rust".parse::<Target>().unwrap(), Target::Rust);
    assert_eq!("RS".parse::<Target>().unwrap(), Target::Rust);
    assert_eq!("js".parse::<Target>().unwrap(), Target::JavaScript);
    assert_eq!("ts".parse::<Target>().unwrap(), Target::JavaScript);
    match "cobol".parse::<Target>().err().unwrap() {
        ParseError::UnknownTarget(name) => assert_eq!(name, "cobol"),
        other => panic!("Expected UnknownTarget, got {:?}", other),
    }
    assert_eq!(Target::Rust.extension(), "rs");
    assert_eq!(Target::JavaScript.extension(), "js");
    assert_eq!(Target::JavaScript.to_string(), "javascript");
    assert_eq!(Target::Rust.backend().target(), Target::Rust);
}

#[test]
fn test_identifier_conversions() {
    assert_eq!(to_snake_case("OnPlayerJoin"), "on_player_join");
    assert_eq!(to_snake_case("HTTPServer"), "http_server");
    assert_eq!(to_snake_case("on-player join"), "on_player_join");
    assert_eq!(to_camel_case("get_players_at"), "getPlayersAt");
    assert_eq!(to_pascal_case("player_state"), "PlayerState");
    assert_eq!(ident("type"), "type_");
    assert_eq!(ident("state"), "state_");
    assert_eq!(ident("2fast"), "n_2fast");
    assert_eq!(ident(""), "value");
}

fn compile_json(target: Target) -> String {
    Compiler::from_json(&graph_json(), None)
        .expect("Failed to parse")
        .build()
        .compile_to(target)
        .expect("Failed to compile")
}
