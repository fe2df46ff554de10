use serde_json::json;
use sorrel_lang::{query, Error, EvalError, Value};

fn doc(v: serde_json::Value) -> Value {
    Value::from_json(v)
}

fn run(source: &str, data: serde_json::Value) -> Value {
    query(&doc(data), source).unwrap()
}

fn run_err(source: &str, data: serde_json::Value) -> Error {
    query(&doc(data), source).unwrap_err()
}

fn assert_type_error(err: Error, op: &str) {
    match err {
        Error::Eval(EvalError::Type { op: actual, .. }) => assert_eq!(actual, op),
        other => panic!("expected a type error in '{}', got {:?}", op, other),
    }
}

// ============================================================================
// Collection transforms
// ============================================================================

#[test]
fn test_map() {
    assert_eq!(run("map(. * 2)", json!([1, 2, 3])), doc(json!([2, 4, 6])));
}

#[test]
fn test_map_over_objects() {
    let data = json!([{"n": 1}, {"n": 2}]);
    assert_eq!(run("map(.n + 10)", data), doc(json!([11, 12])));
}

#[test]
fn test_filter_keeps_truthy_results() {
    // null, false and 0 are falsy; empty strings/arrays/objects are truthy
    let data = json!([0, 1, "", null, false, [], {}, 2]);
    assert_eq!(run("filter(.)", data), doc(json!([1, "", [], {}, 2])));
}

#[test]
fn test_sort_numbers() {
    assert_eq!(run("sort()", json!([3, 1, 2])), doc(json!([1, 2, 3])));
}

#[test]
fn test_sort_strings() {
    assert_eq!(
        run("sort()", json!(["banana", "apple", "cherry"])),
        doc(json!(["apple", "banana", "cherry"]))
    );
}

#[test]
fn test_sort_descending() {
    assert_eq!(
        run(r#"sort(get(), "desc")"#, json!([3, 1, 2])),
        doc(json!([3, 2, 1]))
    );
}

#[test]
fn test_sort_by_path_descending() {
    let data = json!([{"a": 1}, {"a": 3}, {"a": 2}]);
    assert_eq!(
        run(r#"sort(.a, "desc") | map(.a)"#, data),
        doc(json!([3, 2, 1]))
    );
}

#[test]
fn test_sort_rejects_unknown_direction() {
    let err = run_err(r#"sort(.a, "up")"#, json!([]));
    assert!(matches!(err, Error::Compile(_)));
}

#[test]
fn test_reverse() {
    assert_eq!(run("reverse()", json!([1, 2, 3])), doc(json!([3, 2, 1])));
}

#[test]
fn test_pick_on_object() {
    let data = json!({"a": 1, "b": {"c": 2}, "d": 3});
    assert_eq!(
        run("pick(.a, .b.c)", data),
        doc(json!({"a": 1, "c": 2}))
    );
}

#[test]
fn test_pick_keys_by_last_segment() {
    let data = json!({"user": {"name": "Joe"}});
    assert_eq!(run("pick(.user.name)", data), doc(json!({"name": "Joe"})));
}

#[test]
fn test_pick_absent_path_gives_null() {
    assert_eq!(run("pick(.missing)", json!({"a": 1})), doc(json!({"missing": null})));
}

#[test]
fn test_pick_maps_over_arrays() {
    let data = json!([
        {"name": "Joe", "age": 32, "city": "NYC"},
        {"name": "Ann", "age": 28}
    ]);
    assert_eq!(
        run("pick(.name, .age)", data),
        doc(json!([
            {"name": "Joe", "age": 32},
            {"name": "Ann", "age": 28}
        ]))
    );
}

#[test]
fn test_key_by_first_occurrence_wins() {
    let data = json!([
        {"id": "a", "v": 1},
        {"id": "b", "v": 2},
        {"id": "a", "v": 3}
    ]);
    assert_eq!(
        run("keyBy(.id)", data),
        doc(json!({
            "a": {"id": "a", "v": 1},
            "b": {"id": "b", "v": 2}
        }))
    );
}

#[test]
fn test_group_by_stringifies_keys() {
    let data = json!([{"n": 1}, {"n": 2}, {"n": 1}]);
    assert_eq!(
        run("groupBy(.n)", data),
        doc(json!({"1": [{"n": 1}, {"n": 1}], "2": [{"n": 2}]}))
    );
}

#[test]
fn test_flatten_one_level() {
    let data = json!([[1, 2], [3, [4]], 5]);
    assert_eq!(run("flatten()", data), doc(json!([1, 2, 3, [4], 5])));
}

#[test]
fn test_join_with_default_separator() {
    assert_eq!(run("join()", json!(["a", "b", "c"])), doc(json!("abc")));
}

#[test]
fn test_join_converts_non_strings() {
    assert_eq!(
        run(r#"join("-")"#, json!([1, "a", true, null])),
        doc(json!("1-a-true-null"))
    );
}

#[test]
fn test_uniq_preserves_first_occurrence() {
    assert_eq!(run("uniq()", json!([3, 1, 3, 2, 1])), doc(json!([3, 1, 2])));
}

#[test]
fn test_uniq_compares_by_value() {
    let data = json!([{"a": 1}, {"a": 1}, {"a": 2}]);
    assert_eq!(run("uniq()", data), doc(json!([{"a": 1}, {"a": 2}])));
}

#[test]
fn test_uniq_by_path() {
    let data = json!([
        {"g": 1, "v": "first"},
        {"g": 1, "v": "second"},
        {"g": 2, "v": "third"}
    ]);
    assert_eq!(
        run("uniqBy(.g) | map(.v)", data),
        doc(json!(["first", "third"]))
    );
}

#[test]
fn test_limit() {
    assert_eq!(run("limit(2)", json!([1, 2, 3])), doc(json!([1, 2])));
    assert_eq!(run("limit(0)", json!([1, 2, 3])), doc(json!([])));
    assert_eq!(run("limit(10)", json!([1])), doc(json!([1])));
}

#[test]
fn test_size() {
    assert_eq!(run("size()", json!([1, 2, 3])), doc(json!(3.0)));
    assert_eq!(run("size()", json!({"a": 1, "b": 2})), doc(json!(2.0)));
    // Codepoints, not bytes
    assert_eq!(run("size()", json!("héllo")), doc(json!(5.0)));
    assert_type_error(run_err("size()", json!(true)), "size");
}

#[test]
fn test_keys_and_values_in_declared_order() {
    let data = json!({"b": 2, "a": 1});
    assert_eq!(run("keys()", data.clone()), doc(json!(["b", "a"])));
    assert_eq!(run("values()", data), doc(json!([2, 1])));
}

#[test]
fn test_numeric_folds() {
    assert_eq!(run("sum()", json!([1, 2, 3])), doc(json!(6.0)));
    assert_eq!(run("prod()", json!([2, 3, 4])), doc(json!(24.0)));
    assert_eq!(run("average()", json!([1, 2, 3])), doc(json!(2.0)));
    assert_eq!(run("min()", json!([3, 1, 2])), doc(json!(1.0)));
    assert_eq!(run("max()", json!([3, 1, 2])), doc(json!(3.0)));
}

#[test]
fn test_fold_identities_on_empty_arrays() {
    assert_eq!(run("sum()", json!([])), doc(json!(0.0)));
    assert_eq!(run("prod()", json!([])), doc(json!(1.0)));
    assert_eq!(run("min()", json!([])), Value::Null);
    assert_eq!(run("max()", json!([])), Value::Null);
}

#[test]
fn test_fold_rejects_non_numeric_elements() {
    assert_type_error(run_err("sum()", json!([1, "x"])), "sum");
}

#[test]
fn test_collection_builtins_require_arrays() {
    assert_type_error(run_err("filter(.)", json!({"a": 1})), "filter");
    assert_type_error(run_err("sort()", json!("abc")), "sort");
    assert_type_error(run_err("flatten()", json!(null)), "flatten");
}

// ============================================================================
// Strings
// ============================================================================

#[test]
fn test_split_on_whitespace_runs() {
    assert_eq!(
        run("split(.)", json!("  a b \t c\n")),
        doc(json!(["a", "b", "c"]))
    );
}

#[test]
fn test_split_with_separator() {
    assert_eq!(
        run(r#"split(., ",")"#, json!("a,b,,c")),
        doc(json!(["a", "b", "", "c"]))
    );
}

#[test]
fn test_split_with_empty_separator_yields_codepoints() {
    assert_eq!(
        run(r#"split(., "")"#, json!("héi")),
        doc(json!(["h", "é", "i"]))
    );
}

#[test]
fn test_split_requires_a_string() {
    assert_type_error(run_err("split(.)", json!(42)), "split");
}

#[test]
fn test_substring() {
    assert_eq!(run("substring(., 1, 3)", json!("hello")), doc(json!("el")));
    assert_eq!(run("substring(., 2)", json!("hello")), doc(json!("llo")));
}

#[test]
fn test_substring_clamps_and_swaps_bounds() {
    assert_eq!(run("substring(., -2, 2)", json!("hello")), doc(json!("he")));
    assert_eq!(run("substring(., 1, 99)", json!("hello")), doc(json!("ello")));
    assert_eq!(run("substring(., 3, 1)", json!("hello")), doc(json!("el")));
}

#[test]
fn test_substring_counts_codepoints() {
    assert_eq!(run("substring(., 1, 3)", json!("héllo")), doc(json!("él")));
}

// ============================================================================
// Arithmetic
// ============================================================================

#[test]
fn test_arithmetic_operators() {
    assert_eq!(run(".a + .b", json!({"a": 2, "b": 3})), doc(json!(5.0)));
    assert_eq!(run(".a - .b", json!({"a": 2, "b": 3})), doc(json!(-1.0)));
    assert_eq!(run(".a * .b", json!({"a": 2, "b": 3})), doc(json!(6.0)));
    assert_eq!(run(".a / .b", json!({"a": 3, "b": 2})), doc(json!(1.5)));
    assert_eq!(run(".a % .b", json!({"a": 7, "b": 3})), doc(json!(1.0)));
    assert_eq!(run(".a ^ .b", json!({"a": 2, "b": 10})), doc(json!(1024.0)));
}

#[test]
fn test_division_follows_double_semantics() {
    let result = run("1 / 0", json!(null));
    assert!(result.as_number().unwrap().is_infinite());
}

#[test]
fn test_abs() {
    assert_eq!(run("abs(.n)", json!({"n": -5})), doc(json!(5.0)));
    assert_eq!(run("abs(.n)", json!({"n": 5})), doc(json!(5.0)));
}

#[test]
fn test_round_default_digits() {
    assert_eq!(run("round(.n)", json!({"n": 2.4})), doc(json!(2.0)));
    assert_eq!(run("round(.n)", json!({"n": 2.5})), doc(json!(3.0)));
    assert_eq!(run("round(.n)", json!({"n": -2.5})), doc(json!(-3.0)));
}

#[test]
fn test_arithmetic_requires_numbers() {
    assert_type_error(run_err(".a + .b", json!({"a": "x", "b": 1})), "add");
}

// ============================================================================
// Comparison and logic
// ============================================================================

#[test]
fn test_equality_is_by_value() {
    assert_eq!(run(".a == .b", json!({"a": {"x": 1, "y": [2]}, "b": {"y": [2], "x": 1}})), doc(json!(true)));
    assert_eq!(run(".a != .b", json!({"a": 1, "b": 1})), doc(json!(false)));
    // A number never equals a string
    assert_eq!(run(r#".a == "1""#, json!({"a": 1})), doc(json!(false)));
}

#[test]
fn test_ordering_numbers_and_strings() {
    assert_eq!(run("2 > 1", json!(null)), doc(json!(true)));
    assert_eq!(run("2 >= 2", json!(null)), doc(json!(true)));
    assert_eq!(run(r#""b" > "a""#, json!(null)), doc(json!(true)));
    assert_eq!(run(r#""a" <= "a""#, json!(null)), doc(json!(true)));
}

#[test]
fn test_mixed_type_ordering_is_false() {
    assert_eq!(run(r#"1 < "a""#, json!(null)), doc(json!(false)));
    assert_eq!(run(r#"1 > "a""#, json!(null)), doc(json!(false)));
    assert_eq!(run(".a < .b", json!({"a": [1], "b": [2]})), doc(json!(false)));
}

#[test]
fn test_logic_operates_on_truthiness() {
    assert_eq!(run(r#"1 and """#, json!(null)), doc(json!(true)));
    assert_eq!(run("1 and 0", json!(null)), doc(json!(false)));
    assert_eq!(run("0 or false", json!(null)), doc(json!(false)));
    assert_eq!(run("0 or .a", json!({"a": "x"})), doc(json!(true)));
    assert_eq!(run("not 0", json!(null)), doc(json!(true)));
    assert_eq!(run("not {}", json!(null)), doc(json!(false)));
}

#[test]
fn test_logic_is_eager() {
    // Both sides always evaluate, so a failing right side fails the query
    // even when the left side already decides the result
    assert!(query(&doc(json!({})), r#"true or split(.x, ",")"#).is_err());
}

// ============================================================================
// Conditional, membership, regex
// ============================================================================

#[test]
fn test_if_selects_by_truthiness() {
    let q = r#"if(.age >= 18, "adult", "minor")"#;
    assert_eq!(run(q, json!({"age": 32})), doc(json!("adult")));
    assert_eq!(run(q, json!({"age": 12})), doc(json!("minor")));
}

#[test]
fn test_exists_distinguishes_null_from_absent() {
    assert_eq!(run("exists(.a)", json!({"a": null})), doc(json!(true)));
    assert_eq!(run("exists(.a)", json!({})), doc(json!(false)));
}

#[test]
fn test_exists_on_nested_paths() {
    assert_eq!(run("exists(.a.b)", json!({"a": {"b": 1}})), doc(json!(true)));
    assert_eq!(run("exists(.a.b)", json!({})), doc(json!(false)));
    // The parent must be an object
    assert_eq!(run("exists(.a.b)", json!({"a": 5})), doc(json!(false)));
    assert_eq!(run("exists(.a.b)", json!({"a": [1, 2]})), doc(json!(false)));
}

#[test]
fn test_in_and_not_in() {
    assert_eq!(run(".x in [1, 2, 3]", json!({"x": 2})), doc(json!(true)));
    assert_eq!(run(".x in [1, 2, 3]", json!({"x": 9})), doc(json!(false)));
    assert_eq!(run(".x not in [1, 2, 3]", json!({"x": 9})), doc(json!(true)));
}

#[test]
fn test_in_compares_by_value() {
    let data = json!({"x": {"a": 1}, "allowed": [{"a": 1}]});
    assert_eq!(run(".x in .allowed", data), doc(json!(true)));
}

#[test]
fn test_regex_match() {
    assert_eq!(
        run(r#"regex(.name, "^jo", "i")"#, json!({"name": "Joe"})),
        doc(json!(true))
    );
    assert_eq!(
        run(r#"regex(.name, "^jo")"#, json!({"name": "Joe"})),
        doc(json!(false))
    );
}

#[test]
fn test_regex_literal_matches_the_input() {
    assert_eq!(run("filter(/^a/)", json!(["ax", "bx", "ab"])), doc(json!(["ax", "ab"])));
}

#[test]
fn test_regex_non_string_target_is_false() {
    assert_eq!(run(r#"regex(.n, "1")"#, json!({"n": 1})), doc(json!(false)));
}

#[test]
fn test_regex_rejects_unknown_flags() {
    let err = run_err(r#"regex(.a, "x", "g")"#, json!({}));
    assert!(matches!(err, Error::Compile(_)));
}

#[test]
fn test_regex_rejects_bad_patterns_at_compile_time() {
    let err = run_err(r#"regex(.a, "(unclosed")"#, json!({}));
    assert!(matches!(err, Error::Compile(_)));
}

// ============================================================================
// Conversions
// ============================================================================

#[test]
fn test_number_conversion() {
    assert_eq!(run("number(.s)", json!({"s": "12.5"})), doc(json!(12.5)));
    assert_eq!(run("number(.s)", json!({"s": " 42 "})), doc(json!(42.0)));
    assert_eq!(run("number(.s)", json!({"s": "abc"})), Value::Null);
    assert_eq!(run("number(.n)", json!({"n": 7})), doc(json!(7.0)));
    assert_eq!(run("number(.b)", json!({"b": true})), Value::Null);
}

#[test]
fn test_string_conversion() {
    assert_eq!(run("string(.x)", json!({"x": null})), doc(json!("null")));
    assert_eq!(run("string(.x)", json!({"x": true})), doc(json!("true")));
    assert_eq!(run("string(.x)", json!({"x": 3})), doc(json!("3")));
    assert_eq!(run("string(.x)", json!({"x": 3.5})), doc(json!("3.5")));
    assert_eq!(run("string(.x)", json!({"x": "s"})), doc(json!("s")));
}

#[test]
fn test_string_conversion_uses_canonical_json_for_composites() {
    assert_eq!(
        run("string(.)", json!({"a": 1, "b": [true, null]})),
        doc(json!(r#"{"a":1,"b":[true,null]}"#))
    );
}
