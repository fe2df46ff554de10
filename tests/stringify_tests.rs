use serde_json::json;
use sorrel_lang::{parse, stringify, Ast};

fn ast(v: serde_json::Value) -> Ast {
    Ast::from_json(&v)
}

/// stringify . parse must be the identity on ASTs
fn assert_round_trip(source: &str) {
    let parsed = parse(source).unwrap();
    let rendered = stringify(&parsed);
    let reparsed = parse(&rendered)
        .unwrap_or_else(|e| panic!("stringify({:?}) produced unparseable {:?}: {}", source, rendered, e));
    assert_eq!(parsed, reparsed, "round trip changed the AST for {:?}", source);
}

#[test]
fn test_round_trips() {
    for source in [
        ".name",
        ".a.b.\"c d\"",
        ".",
        "get()",
        "true",
        "null",
        "-3.5",
        "\"a\\nb\"",
        "1 + 2 * 3",
        "(1 + 2) * 3",
        "1 - 2 - 3",
        "2 ^ 3 ^ 2",
        "-.x",
        "not .active",
        ".x not in [1, 2]",
        ".a and .b or not .c",
        "{ name: .name, \"full name\": 1 }",
        "{}",
        "[1, 2, 3]",
        "[]",
        "sort(.age, \"desc\") | map(.name)",
        "/^a+$/i",
        ".a | .b | .c",
        "(.a | .b) == 1",
        "filter(. > 2) | sum()",
        "if(.age >= 18, \"adult\", \"minor\")",
    ] {
        assert_round_trip(source);
    }
}

// ============================================================================
// Canonical output forms
// ============================================================================

#[test]
fn test_whitespace_is_minimized() {
    assert_eq!(stringify(&parse("1 + 2 * 3").unwrap()), "1+2*3");
    assert_eq!(stringify(&parse(" .a | sum( ) ").unwrap()), ".a|sum()");
    assert_eq!(
        stringify(&parse("{ a: 1, \"b c\": 2 }").unwrap()),
        "{a:1,\"b c\":2}"
    );
}

#[test]
fn test_word_operators_keep_spaces() {
    assert_eq!(stringify(&parse(".a and .b").unwrap()), ".a and .b");
    assert_eq!(
        stringify(&parse(".x not in [1, 2]").unwrap()),
        ".x not in [1,2]"
    );
}

#[test]
fn test_parentheses_only_where_precedence_requires() {
    assert_eq!(stringify(&parse("(1 + 2) * 3").unwrap()), "(1+2)*3");
    assert_eq!(stringify(&parse("1 + (2 * 3)").unwrap()), "1+2*3");
    assert_eq!(stringify(&parse("1 - (2 + 3)").unwrap()), "1-(2+3)");
    assert_eq!(stringify(&parse("(2 ^ 3) ^ 2").unwrap()), "(2^3)^2");
    assert_eq!(stringify(&parse("2 ^ (3 ^ 2)").unwrap()), "2^3^2");
}

#[test]
fn test_bare_identifier_renders_in_dotted_form() {
    assert_eq!(stringify(&parse("name").unwrap()), ".name");
}

#[test]
fn test_quoted_segments_only_when_needed() {
    assert_eq!(
        stringify(&parse(r#"."first name".last"#).unwrap()),
        r#"."first name".last"#
    );
}

#[test]
fn test_empty_path_renders_as_a_call() {
    assert_eq!(stringify(&parse(".").unwrap()), "get()");
}

#[test]
fn test_numeric_path_keys_fall_back_to_call_form() {
    // Only the structured form can spell numeric keys
    let path = ast(json!(["get", "items", 0]));
    let rendered = stringify(&path);
    assert_eq!(rendered, "get(\"items\",0)");
    assert_eq!(parse(&rendered).unwrap(), path);
}

#[test]
fn test_structured_literals_render_as_construction_syntax() {
    assert_eq!(stringify(&ast(json!(["add", 1, 2]))), "1+2");
    assert_eq!(stringify(&ast(json!({"a": ["get", "x"]}))), "{a:.x}");
    assert_eq!(stringify(&ast(json!(["array", 1, 2]))), "[1,2]");
}

#[test]
fn test_negated_literal_round_trips() {
    let source = "1--3";
    let parsed = parse(source).unwrap();
    assert_eq!(parsed, ast(json!(["subtract", 1.0, -3.0])));
    assert_eq!(stringify(&parsed), source);
}
