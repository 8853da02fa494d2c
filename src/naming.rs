//! Identifier helpers shared by the generator and the target printers.

/// Words that cannot be used as bare identifiers in either target.
const RESERVED: &[&str] = &[
    // Rust
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod",
    "move", "mut", "pub", "ref", "return", "self", "static", "struct", "super", "trait",
    "true", "type", "unsafe", "use", "where", "while", "yield", "box", "try",
    // JavaScript
    "arguments", "case", "catch", "class", "debugger", "default", "delete", "do", "eval",
    "export", "extends", "finally", "function", "import", "instanceof", "new", "null",
    "switch", "this", "throw", "typeof", "var", "void", "with",
    // Names the generated code already uses
    "state", "session", "sender", "viewer", "cancel", "signal", "rt", "views",
];

/// Converts `OnPlayerJoin`, `on-player join` or `HTTPServer` to snake case.
pub fn to_snake_case(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_alphanumeric() {
            if c.is_ascii_uppercase() {
                let prev = i.checked_sub(1).map(|p| chars[p]);
                let next = chars.get(i + 1).copied();
                let boundary = match prev {
                    Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                    Some(p) if p.is_ascii_uppercase() => {
                        next.is_some_and(|n| n.is_ascii_lowercase())
                    }
                    _ => false,
                };
                if boundary && !out.ends_with('_') && !out.is_empty() {
                    out.push('_');
                }
                out.push(c.to_ascii_lowercase());
            } else {
                out.push(c);
            }
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }

    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Converts any spelling to lower camel case (`get_players_at` -> `getPlayersAt`).
pub fn to_camel_case(input: &str) -> String {
    let snake = to_snake_case(input);
    let mut out = String::with_capacity(snake.len());
    let mut upper_next = false;
    for c in snake.chars() {
        if c == '_' {
            upper_next = !out.is_empty();
            continue;
        }
        if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Converts any spelling to upper camel case (`player_state` -> `PlayerState`).
pub fn to_pascal_case(input: &str) -> String {
    let camel = to_camel_case(input);
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Produces a snake-case identifier that is legal in both targets.
pub fn ident(input: &str) -> String {
    let mut name = to_snake_case(input);
    if name.is_empty() {
        name.push_str("value");
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, "n_");
    }
    if is_reserved(&name) {
        name.push('_');
    }
    name
}

pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}
