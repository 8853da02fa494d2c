//! Tests for the field path grammar.
use kumiki::error::PathError;
use kumiki::path::{IndexKind, ParsedPath};

#[test]
fn test_parse_plain_fields() {
    let path = ParsedPath::parse("settings.rules.maxPlayers").expect("Failed to parse");
    assert_eq!(path.len(), 3);
    assert!(path.segments.iter().all(|s| s.index.is_none()));
    assert_eq!(path.last().map(|s| s.field.as_str()), Some("maxPlayers"));
}

#[test]
fn test_parse_index_kinds() {
    let path = ParsedPath::parse("players[0].hands[i].cards[pid:id]").expect("Failed to parse");
    assert_eq!(path.segments[0].index, IndexKind::Literal(0));
    assert_eq!(path.segments[1].index, IndexKind::Variable("i".to_string()));
    assert_eq!(
        path.segments[2].index,
        IndexKind::KeyLookup {
            variable: "pid".to_string(),
            key_field: "id".to_string(),
        }
    );
    assert_eq!(path.variables(), vec!["i", "pid"]);
}

#[test]
fn test_printing_reproduces_the_input() {
    let inputs = [
        "round",
        "players[0].score",
        "players[index].score",
        "players[pid:id].hand[3]",
        "scores[007]",
        "a.b.c.d",
    ];
    for input in inputs {
        let path: ParsedPath = input.parse().expect("Failed to parse");
        assert_eq!(path.to_string(), input, "round trip of '{}'", input);
    }
}

#[test]
fn test_non_canonical_number_stays_a_variable() {
    let path = ParsedPath::parse("scores[007]").expect("Failed to parse");
    assert_eq!(path.segments[0].index, IndexKind::Variable("007".to_string()));
}

#[test]
fn test_malformed_paths_are_rejected() {
    assert_eq!(ParsedPath::parse(""), Err(PathError::Empty));

    match ParsedPath::parse("players..score").err().unwrap() {
        PathError::EmptySegment { position, .. } => assert_eq!(position, 1),
        other => panic!("Expected EmptySegment, got {:?}", other),
    }

    assert!(matches!(
        ParsedPath::parse("players[0.score"),
        Err(PathError::UnbalancedBracket { .. })
    ));
    assert!(matches!(
        ParsedPath::parse("players0].score"),
        Err(PathError::UnbalancedBracket { .. })
    ));
    assert!(matches!(
        ParsedPath::parse("players[0]x.score"),
        Err(PathError::UnbalancedBracket { .. })
    ));
    assert!(matches!(
        ParsedPath::parse("players[].score"),
        Err(PathError::EmptyIndex { .. })
    ));
    assert!(matches!(
        ParsedPath::parse("players[a[0]].score"),
        Err(PathError::NestedIndex { .. })
    ));
    assert!(matches!(
        ParsedPath::parse("players[0][1].score"),
        Err(PathError::NestedIndex { .. })
    ));
    assert!(matches!(
        ParsedPath::parse("grid[i][j]"),
        Err(PathError::NestedIndex { .. })
    ));
    assert!(matches!(
        ParsedPath::parse("players[:id]"),
        Err(PathError::InvalidKeyLookup { .. })
    ));
    assert!(matches!(
        ParsedPath::parse("players[pid:id:x]"),
        Err(PathError::InvalidKeyLookup { .. })
    ));
}

#[test]
fn test_dots_inside_brackets_do_not_split() {
    let path = ParsedPath::parse("scores[player.name]").expect("Failed to parse");
    assert_eq!(path.len(), 1);
    assert_eq!(
        path.segments[0].index,
        IndexKind::Variable("player.name".to_string())
    );
}
