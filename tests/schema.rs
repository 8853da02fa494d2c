//! Tests for schema loading, accessor naming and path resolution.
mod common;
use common::*;
use kumiki::error::{ParseError, ResolveError};
use kumiki::path::ParsedPath;
use kumiki::schema::{AccessorFamily, SchemaContext, ValueType};

#[test]
fn test_value_type_spellings() {
    assert_eq!(ValueType::parse("int"), Some(ValueType::Int));
    assert_eq!(ValueType::parse("number"), Some(ValueType::Float));
    assert_eq!(ValueType::parse("boolean"), Some(ValueType::Bool));
    assert_eq!(ValueType::parse(""), Some(ValueType::Any));
    assert_eq!(
        ValueType::parse("[]Player"),
        Some(ValueType::Array(Box::new(ValueType::Record("Player".into()))))
    );
    assert_eq!(
        ValueType::parse("map[string][]int"),
        Some(ValueType::Map(Box::new(ValueType::Array(Box::new(ValueType::Int)))))
    );
    assert_eq!(ValueType::parse("not a type"), None);
    assert_eq!(ValueType::parse_lenient("not a type"), ValueType::Any);
    assert_eq!(
        ValueType::parse("map[string][]int").map(|t| t.to_string()),
        Some("map[string][]int".to_string())
    );
}

#[test]
fn test_schema_loads_with_root_and_package() {
    let schema = game_schema();
    assert_eq!(schema.package(), "game");
    assert_eq!(schema.root(), "GameState");
    assert_eq!(schema.types().len(), 2);

    let player = schema.type_info("Player").expect("Player should exist");
    assert_eq!(player.identity.as_deref(), Some("id"));

    let players = schema.field("GameState", "players").expect("players should exist");
    assert_eq!(players.key_field.as_deref(), Some("id"));
    let winner = schema.field("GameState", "winner").expect("winner should exist");
    assert!(winner.optional);
}

#[test]
fn test_accessor_families() {
    let schema = game_schema();

    let round = &schema.field("GameState", "round").unwrap().accessors;
    assert_eq!(round.names(), vec!["get_round", "set_round"]);

    match &schema.field("GameState", "players").unwrap().accessors {
        AccessorFamily::Array {
            getter,
            append,
            remove_at,
            length,
            keyed,
            ..
        } => {
            assert_eq!(getter, "get_players");
            assert_eq!(append, "append_players");
            assert_eq!(remove_at, "remove_players_at");
            assert_eq!(length, "players_len");
            let keyed = keyed.as_ref().expect("players should be keyed");
            assert_eq!(keyed.find, "find_players_by_id");
            assert_eq!(keyed.find_mut, "find_players_by_id_mut");
            assert_eq!(keyed.update, "update_players_by_id");
        }
        other => panic!("Expected an array family, got {:?}", other),
    }

    match &schema.field("GameState", "scores").unwrap().accessors {
        AccessorFamily::Map {
            set_key,
            delete_key,
            get_by_key,
            ..
        } => {
            assert_eq!(set_key, "set_scores_key");
            assert_eq!(delete_key, "delete_scores_key");
            assert_eq!(get_by_key, "get_scores_by_key");
        }
        other => panic!("Expected a map family, got {:?}", other),
    }
}

#[test]
fn test_array_key_defaults_to_element_identity() {
    let schema = SchemaContext::from_json(
        r#"{"types": [
            {"name": "Room", "fields": [{"name": "seats", "type": "[]Seat"}]},
            {"name": "Seat", "fields": [{"name": "number", "type": "int", "key": true}]}
        ]}"#,
    )
    .expect("Failed to load schema");
    assert_eq!(schema.root(), "Room");
    let seats = schema.field("Room", "seats").unwrap();
    assert_eq!(seats.key_field.as_deref(), Some("number"));
}

#[test]
fn test_schema_errors() {
    let missing = r#"{"types": [{"name": "A", "fields": [{"name": "b", "type": "[]Missing"}]}]}"#;
    match SchemaContext::from_json(missing).err().unwrap() {
        ParseError::FieldType { type_name, spelling } => {
            assert_eq!(type_name, "A");
            assert_eq!(spelling, "[]Missing");
        }
        other => panic!("Expected FieldType, got {:?}", other),
    }

    assert!(matches!(
        SchemaContext::from_json(r#"{"types": [{"name": "A"}, {"name": "A"}]}"#),
        Err(ParseError::Schema(_))
    ));
    assert!(matches!(
        SchemaContext::from_json(r#"{"root": "Nope", "types": [{"name": "A"}]}"#),
        Err(ParseError::Schema(_))
    ));
    assert!(matches!(
        SchemaContext::from_json(r#"{"types": []}"#),
        Err(ParseError::Schema(_))
    ));
    assert!(matches!(
        SchemaContext::from_json("not json"),
        Err(ParseError::Schema(_))
    ));

    let bad_key = r#"{"types": [
        {"name": "A", "fields": [{"name": "items", "type": "[]B", "key": "missing"}]},
        {"name": "B", "fields": [{"name": "id", "type": "string"}]}
    ]}"#;
    assert!(matches!(
        SchemaContext::from_json(bad_key),
        Err(ParseError::Schema(_))
    ));
}

#[test]
fn test_resolve_paths() {
    let schema = game_schema();

    let path = ParsedPath::parse("players[0].score").unwrap();
    let resolved = schema.resolve_from_root(&path).expect("Failed to resolve");
    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[0].owner, "GameState");
    assert_eq!(resolved[0].value_type, ValueType::Record("Player".into()));
    assert_eq!(resolved[1].owner, "Player");
    assert_eq!(resolved[1].value_type, ValueType::Int);

    let keyed = ParsedPath::parse("players[pid:id].name").unwrap();
    let resolved = schema.resolve_from_root(&keyed).expect("Failed to resolve");
    assert_eq!(resolved[1].value_type, ValueType::String);

    let map = ParsedPath::parse("scores[who]").unwrap();
    let resolved = schema.resolve_from_root(&map).expect("Failed to resolve");
    assert_eq!(resolved[0].value_type, ValueType::Int);
}

#[test]
fn test_resolve_errors() {
    let schema = game_schema();

    let unknown = ParsedPath::parse("players[0].health").unwrap();
    match schema.resolve_from_root(&unknown).err().unwrap() {
        ResolveError::UnknownField { type_name, field } => {
            assert_eq!(type_name, "Player");
            assert_eq!(field, "health");
        }
        other => panic!("Expected UnknownField, got {:?}", other),
    }

    let wrong_key = ParsedPath::parse("players[pid:name]").unwrap();
    assert!(matches!(
        schema.resolve_from_root(&wrong_key),
        Err(ResolveError::MissingKeyField { .. })
    ));

    let scalar_index = ParsedPath::parse("round[0]").unwrap();
    assert!(matches!(
        schema.resolve_from_root(&scalar_index),
        Err(ResolveError::InvalidIndex { .. })
    ));

    let through_scalar = ParsedPath::parse("round.value").unwrap();
    assert!(matches!(
        schema.resolve_from_root(&through_scalar),
        Err(ResolveError::UnknownField { .. })
    ));

    assert!(matches!(
        schema.type_info("Ghost"),
        Err(ResolveError::UnknownType(_))
    ));
}
