//! Tests for the tiered node type registry.
use kumiki::codegen::{BinOp, EmitContext, Expr};
use kumiki::graph::Node;
use kumiki::prelude::*;
use kumiki::registry::{BuiltinKind, Emitter, FlowShape, RegistryTier};
use std::sync::Arc;

fn emit_triple(ctx: &mut EmitContext<'_>, node: &Node) -> Result<(), GenerateError> {
    let value = ctx.input(node, "value")?;
    let tripled = Expr::binary(BinOp::Mul, value, Expr::int(3));
    ctx.declare(node, "result", ValueType::Int, tripled);
    Ok(())
}

fn triple() -> NodeDefinition {
    NodeDefinition::new("triple", NodeCategory::Custom)
        .input("value", ValueType::Int)
        .output("result", ValueType::Int)
        .behavior(emit_triple)
}

#[test]
fn test_new_registry_has_builtins_and_core() {
    let registry = Registry::new();
    assert_eq!(registry.tier_of("branch"), Some(RegistryTier::Builtin));
    assert_eq!(registry.tier_of("forEach"), Some(RegistryTier::Builtin));
    assert_eq!(registry.tier_of("add"), Some(RegistryTier::Core));
    assert_eq!(registry.tier_of("setState"), Some(RegistryTier::Core));
    assert_eq!(registry.tier_of("broadcast"), Some(RegistryTier::Core));
    assert_eq!(registry.tier_of("triple"), None);

    let branch = registry.lookup("branch").expect("branch should exist");
    assert_eq!(branch.shape, FlowShape::Decision);
    assert!(matches!(branch.emitter, Emitter::Builtin(BuiltinKind::Branch)));

    let builtins_only = Registry::with_builtins();
    assert!(builtins_only.contains("repeat"));
    assert!(!builtins_only.contains("add"));
    assert!(builtins_only.len() < registry.len());
}

#[test]
fn test_register_custom_kind() {
    let registry = Registry::new();
    let before = registry.len();
    registry.register(triple()).expect("Failed to register");

    assert_eq!(registry.len(), before + 1);
    assert_eq!(registry.tier_of("triple"), Some(RegistryTier::Custom));
    let def = registry.lookup("triple").unwrap();
    assert!(def.has_emitter());
    assert_eq!(def.category, NodeCategory::Custom);
    assert_eq!(def.shape, FlowShape::Linear);
    assert!(def.input_spec("value").is_some_and(|p| p.required));
    assert_eq!(def.output_spec("result").map(|p| &p.ty), Some(&ValueType::Int));
}

#[test]
fn test_duplicates_are_rejected_in_every_tier() {
    let registry = Registry::new();
    registry.register(triple()).unwrap();

    let cases = [
        ("branch", "builtin"),
        ("multiply", "core"),
        ("triple", "custom"),
    ];
    for (kind, expected_tier) in cases {
        let result = registry.register(NodeDefinition::new(kind, NodeCategory::Custom));
        match result.err().unwrap() {
            RegistryError::Duplicate { kind: k, tier } => {
                assert_eq!(k, kind);
                assert_eq!(tier, expected_tier);
            }
            other => panic!("Expected Duplicate for '{}', got {:?}", kind, other),
        }
    }

    assert_eq!(
        registry.register(NodeDefinition::new("", NodeCategory::Custom)),
        Err(RegistryError::EmptyKind)
    );
}

#[test]
fn test_definition_without_emitter_is_still_known() {
    let registry = Registry::new();
    registry
        .register(NodeDefinition::new("mystery", NodeCategory::Custom))
        .unwrap();
    let def = registry.lookup("mystery").expect("mystery should be registered");
    assert!(!def.has_emitter());
    assert!(matches!(def.emitter, Emitter::Missing));
}

#[test]
fn test_kinds_are_sorted_by_tier_then_name() {
    let registry = Registry::new();
    registry.register(triple()).unwrap();
    registry
        .register(NodeDefinition::new("alpha", NodeCategory::Custom))
        .unwrap();

    let kinds = registry.kinds();
    assert_eq!(kinds.len(), registry.len());
    let mut sorted = kinds.clone();
    sorted.sort();
    assert_eq!(kinds, sorted);

    let custom: Vec<&str> = kinds
        .iter()
        .filter(|(tier, _)| *tier == RegistryTier::Custom)
        .map(|(_, kind)| kind.as_str())
        .collect();
    assert_eq!(custom, vec!["alpha", "triple"]);
    assert_eq!(kinds.first().map(|(tier, _)| *tier), Some(RegistryTier::Builtin));
}

#[test]
fn test_concurrent_register_and_lookup() {
    let registry = Arc::new(Registry::new());

    std::thread::scope(|scope| {
        for worker in 0..8 {
            let registry = Arc::clone(&registry);
            scope.spawn(move || {
                for i in 0..50 {
                    let kind = format!("custom_{}_{}", worker, i);
                    registry
                        .register(NodeDefinition::new(kind.as_str(), NodeCategory::Custom))
                        .expect("Unique names should register");
                    assert!(registry.lookup(&kind).is_some());
                    assert!(registry.lookup("add").is_some());
                }
            });
        }
    });

    assert_eq!(
        registry
            .kinds()
            .iter()
            .filter(|(tier, _)| *tier == RegistryTier::Custom)
            .count(),
        400
    );
}

#[test]
fn test_racing_duplicate_registration_has_one_winner() {
    let registry = Registry::new();
    let winners: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    registry
                        .register(NodeDefinition::new("contested", NodeCategory::Custom))
                        .is_ok() as usize
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });
    assert_eq!(winners, 1);
}

#[test]
fn test_custom_behavior_is_used_by_the_generator() {
    let registry = Arc::new(Registry::new());
    registry.register(triple()).unwrap();

    let mut graph = kumiki::graph::NodeGraph::default();
    graph.handlers.push(kumiki::graph::EventHandler {
        name: "OnTriple".to_string(),
        parameters: vec![kumiki::graph::Parameter {
            name: "x".to_string(),
            ty: "int".to_string(),
        }],
        nodes: vec![Node::new("t", "triple").with_input("value", "param:x")],
        flow: vec![
            kumiki::graph::FlowEdge::new("start", "t"),
            kumiki::graph::FlowEdge::new("t", "end"),
        ],
        ..Default::default()
    });

    let source = Compiler::builder(graph)
        .with_registry(registry)
        .build()
        .compile()
        .expect("Failed to compile");
    assert!(source.contains("let t_result = x * 3;"), "{}", source);
}
