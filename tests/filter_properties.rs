// tests/filter_properties.rs

use aipsql::ast::{FilterGroup, Operator};
use aipsql::{compile, FilterOptions, IdentifierPolicy, Renderer, Value};

fn predicates(filter: &str) -> Vec<(String, Operator)> {
    compile(filter, &FilterOptions::new())
        .unwrap_or_else(|e| panic!("Failed to compile {}: {}", filter, e))
        .groups
        .iter()
        .flat_map(|g: &FilterGroup| g.predicates.iter())
        .map(|p| (p.column.clone(), p.operator()))
        .collect()
}

fn conditions(filter: &str) -> (String, Vec<Value>) {
    let fragment = compile(filter, &FilterOptions::new())
        .unwrap()
        .to_sql(&Renderer::unqualified())
        .unwrap();
    (fragment.sql, fragment.args)
}

// ============================================================================
// Ordering and Combinators
// ============================================================================

#[test]
fn test_field_order_is_preserved() {
    let test_cases = vec![
        "a = 1 AND b = 2 AND c = 3",
        "a = 1 OR b = 2 AND c = 3",
        "NOT a = 1 OR b:\"x\" AND c != null",
    ];

    for filter in test_cases {
        let columns: Vec<String> = predicates(filter).into_iter().map(|(c, _)| c).collect();
        assert_eq!(columns, vec!["a", "b", "c"], "Failed for filter: {}", filter);
    }
}

#[test]
fn test_and_or_differ_only_in_combinator() {
    let (and_sql, and_args) = conditions("status = 1 AND status = 2");
    let (or_sql, or_args) = conditions("status = 1 OR status = 2");
    assert_eq!(and_sql, r#"("status" = $1 AND "status" = $2)"#);
    assert_eq!(or_sql, r#"("status" = $1 OR "status" = $2)"#);
    assert_eq!(and_args, or_args);
}

// ============================================================================
// Negation
// ============================================================================

#[test]
fn test_negation_matches_complement() {
    let test_cases = vec![
        ("NOT field > 1", "field <= 1"),
        ("NOT field >= 1", "field < 1"),
        ("NOT field < 1", "field >= 1"),
        ("NOT field <= 1", "field > 1"),
        ("NOT field = 1", "field != 1"),
        ("NOT field != 1", "field = 1"),
        ("NOT (NOT field = 1)", "field = 1"),
        ("NOT field = null", "field != null"),
    ];

    for (negated, plain) in test_cases {
        assert_eq!(
            conditions(negated),
            conditions(plain),
            "Failed for filter: {}",
            negated
        );
    }
}

// ============================================================================
// Wildcards and Nulls
// ============================================================================

#[test]
fn test_wildcards_become_like() {
    let test_cases = vec![
        (r#"name = "ab*""#, r#"("name" LIKE $1)"#, "ab%"),
        (r#"name = "*ab*""#, r#"("name" LIKE $1)"#, "%ab%"),
        (r#"name != "a*b""#, r#"("name" NOT LIKE $1)"#, "a%b"),
        (r#"name = "a\*b""#, r#"("name" = $1)"#, "a*b"),
        (r#"name = "ab""#, r#"("name" = $1)"#, "ab"),
    ];

    for (filter, sql, arg) in test_cases {
        assert_eq!(
            conditions(filter),
            (sql.to_string(), vec![Value::from(arg)]),
            "Failed for filter: {}",
            filter
        );
    }
}

#[test]
fn test_null_comparisons_take_no_argument() {
    assert_eq!(
        conditions("field = null"),
        (r#"("field" IS NULL)"#.to_string(), vec![])
    );
    assert_eq!(
        conditions("NOT field = null"),
        (r#"("field" IS NOT NULL)"#.to_string(), vec![])
    );
}

#[test]
fn test_array_membership() {
    let options = FilterOptions::new().identifier("vars", IdentifierPolicy::new().array());
    let renderer = Renderer::unqualified().array_columns(options.array_columns());
    let test_cases = vec![
        (r#"vars:"a""#, r#"($1 = ANY("vars"))"#),
        (r#"-(vars:"a")"#, r#"($1 != ALL("vars"))"#),
        (r#"NOT vars:"a""#, r#"($1 != ALL("vars"))"#),
    ];

    for (filter, expected) in test_cases {
        let fragment = compile(filter, &options).unwrap().to_sql(&renderer).unwrap();
        assert_eq!(fragment.sql, expected, "Failed for filter: {}", filter);
        assert_eq!(fragment.args, vec![Value::from("a")]);
    }
}

// ============================================================================
// Idempotence
// ============================================================================

#[test]
fn test_compiling_twice_gives_the_same_result() {
    let filters = vec![
        "(a = 1 AND b = null) OR c > 2",
        r#"-(x:"y") AND z = 2020-01-01T00:00:00Z"#,
        "n = 1 OR n = 2 OR n = 3",
    ];
    let options = FilterOptions::new();

    for filter in filters {
        let first = compile(filter, &options).unwrap();
        let second = compile(filter, &options).unwrap();
        assert_eq!(first, second, "Failed for filter: {}", filter);
        assert_eq!(
            first.to_sql(&Renderer::unqualified()),
            second.to_sql(&Renderer::unqualified())
        );
    }
}
