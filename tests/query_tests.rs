// tests/query_tests.rs

use aipsql::ast::LiteralKind;
use aipsql::{
    FilterOptions, IdentifierPolicy, Model, NamedArgs, QueryError, QuerySet, SubQuery, Value,
};
use chrono::{TimeZone, Utc};

const SIMPLE_SELECT: &str = r#"SELECT "simpleModel3"."id", "simpleModel3"."num", "simpleModel3"."non_nullable", "simpleModel3"."nullable" FROM "simple_model_3" "simpleModel3""#;
const PROTO_SELECT: &str = r#"SELECT "protoModel4"."id", "protoModel4"."nullable_int", "protoModel4"."nullable_bool", "protoModel4"."bool", "protoModel4"."timestamp", "protoModel4"."status", "protoModel4"."strs" FROM "proto_model_4" "protoModel4""#;

fn simple_model() -> Model {
    Model::new("simpleModel3", "simple_model_3")
        .columns(["id", "num", "non_nullable", "nullable"])
        .default_order_by("id")
}

fn proto_model() -> Model {
    Model::new("protoModel4", "proto_model_4")
        .columns(["id", "nullable_int", "nullable_bool", "bool", "timestamp", "status"])
        .array_column("strs")
}

fn proto_options() -> FilterOptions {
    FilterOptions::new()
        .identifier("bool", IdentifierPolicy::new().accept_bool())
        .identifier(
            "timestamp",
            IdentifierPolicy::new()
                .accept(LiteralKind::Timestamp)
                .accept(LiteralKind::Null),
        )
        .identifier(
            "status",
            IdentifierPolicy::enumeration([
                ("STATUS_UNSPECIFIED", 0),
                ("STATUS_OK", 1),
                ("STATUS_ERROR", 2),
            ]),
        )
        .identifier(
            "strs",
            IdentifierPolicy::new().accept(LiteralKind::String).array(),
        )
        .allow(["id", "nullable_bool", "bool", "timestamp", "status", "strs"])
}

/// Compile `filter` against the simple model and return the full SELECT.
fn simple_query(filter: &str) -> (String, Vec<Value>) {
    let model = simple_model();
    let fragment = QuerySet::new(&model)
        .aip160(filter, &FilterOptions::new())
        .unwrap_or_else(|e| panic!("Failed to compile {}: {}", filter, e))
        .all_query()
        .unwrap();
    (fragment.sql, fragment.args)
}

// ============================================================================
// AIP-160 Against a Plain Model
// ============================================================================

#[test]
fn test_aip160_simple_queries() {
    let s = |v: &str| Value::from(v);
    let test_cases = vec![
        (
            r#"non_nullable = "String""#,
            r#"("simpleModel3"."non_nullable" = $1)"#,
            vec![s("String")],
        ),
        (
            r#"non_nullable = "String" AND nullable = null"#,
            r#"("simpleModel3"."non_nullable" = $1 AND "simpleModel3"."nullable" IS NULL)"#,
            vec![s("String")],
        ),
        (
            r#"NOT non_nullable = "String" AND nullable = null"#,
            r#"("simpleModel3"."non_nullable" != $1 AND "simpleModel3"."nullable" IS NULL)"#,
            vec![s("String")],
        ),
        (
            r#"NOT (non_nullable = "String" AND nullable = null)"#,
            r#"("simpleModel3"."non_nullable" != $1 AND "simpleModel3"."nullable" IS NOT NULL)"#,
            vec![s("String")],
        ),
        (
            r#"-(non_nullable = "String" AND nullable = null) OR nullable = null"#,
            r#"("simpleModel3"."non_nullable" != $1 AND "simpleModel3"."nullable" IS NOT NULL) OR ("simpleModel3"."nullable" IS NULL)"#,
            vec![s("String")],
        ),
        (
            r#"(NOT non_nullable = "String" OR nullable = null) OR nullable = "String""#,
            r#"("simpleModel3"."non_nullable" != $1 OR "simpleModel3"."nullable" IS NULL) OR ("simpleModel3"."nullable" = $2)"#,
            vec![s("String"), s("String")],
        ),
        (
            r#"(non_nullable = "String" AND nullable = null) OR num = 99999"#,
            r#"("simpleModel3"."non_nullable" = $1 AND "simpleModel3"."nullable" IS NULL) OR ("simpleModel3"."num" = $2)"#,
            vec![s("String"), Value::Int(99999)],
        ),
        (
            r#"(non_nullable = "String" AND num > 1337) OR id = 1"#,
            r#"("simpleModel3"."non_nullable" = $1 AND "simpleModel3"."num" > $2) OR ("simpleModel3"."id" = $3)"#,
            vec![s("String"), Value::Int(1337), Value::Int(1)],
        ),
        (
            r#"(non_nullable = "String" OR num > 1337) OR id = 1"#,
            r#"("simpleModel3"."non_nullable" = $1 OR "simpleModel3"."num" > $2) OR ("simpleModel3"."id" = $3)"#,
            vec![s("String"), Value::Int(1337), Value::Int(1)],
        ),
        (
            r#"(non_nullable = "String" OR num > 1337) OR id = 1 AND nullable = null OR (num = 1337 AND id = 2 OR nullable = null)"#,
            r#"("simpleModel3"."non_nullable" = $1 OR "simpleModel3"."num" > $2) OR ("simpleModel3"."id" = $3) AND ("simpleModel3"."nullable" IS NULL) OR ("simpleModel3"."num" = $4 AND "simpleModel3"."id" = $5 OR "simpleModel3"."nullable" IS NULL)"#,
            vec![
                s("String"),
                Value::Int(1337),
                Value::Int(1),
                Value::Int(1337),
                Value::Int(2),
            ],
        ),
        (
            "bool = true AND bool_2 = true",
            r#"("simpleModel3"."bool" = $1 AND "simpleModel3"."bool_2" = $2)"#,
            vec![Value::Bool(true), Value::Bool(true)],
        ),
    ];

    for (filter, where_clause, args) in test_cases {
        let (sql, actual_args) = simple_query(filter);
        assert_eq!(
            sql,
            format!(
                r#"{} WHERE {} ORDER BY "simpleModel3"."id" ASC"#,
                SIMPLE_SELECT, where_clause
            ),
            "Failed for filter: {}",
            filter
        );
        assert_eq!(actual_args, args, "Failed for filter: {}", filter);
    }
}

#[test]
fn test_aip160_acceptable_identifiers() {
    let model = simple_model();
    let options = FilterOptions::new().allow(["non_nullable"]);

    let fragment = QuerySet::new(&model)
        .aip160(r#"non_nullable = "String""#, &options)
        .unwrap()
        .all_query()
        .unwrap();
    assert_eq!(fragment.args, vec![Value::from("String")]);

    let err = QuerySet::new(&model)
        .aip160(r#"invalid = "String""#, &options)
        .unwrap_err();
    assert_eq!(err.to_string(), "identifier invalid is not allowed");
}

#[test]
fn test_aip160_with_preset_filter() {
    let model = simple_model();
    let fragment = QuerySet::new(&model)
        .aip160(r#"non_nullable = "String""#, &FilterOptions::new())
        .unwrap()
        .filter(["id=:id"])
        .unwrap()
        .args(NamedArgs::new().with("id", 1))
        .all_query()
        .unwrap();

    assert_eq!(
        fragment.sql,
        format!(
            r#"{} WHERE ("simpleModel3"."non_nullable" = $1) AND ("simpleModel3"."id" = $2) ORDER BY "simpleModel3"."id" ASC"#,
            SIMPLE_SELECT
        )
    );
    assert_eq!(fragment.args, vec![Value::from("String"), Value::Int(1)]);
}

#[test]
fn test_compiled_or_does_not_leak() {
    let model = simple_model();
    let fragment = QuerySet::new(&model)
        .filter(["id=:id"])
        .unwrap()
        .arg("id", 7)
        .aip160("(num = 1) OR num = 2", &FilterOptions::new())
        .unwrap()
        .count_query()
        .unwrap();

    assert_eq!(
        fragment.sql,
        r#"SELECT COUNT(*) FROM "simple_model_3" "simpleModel3" WHERE ("simpleModel3"."id" = $1) AND (("simpleModel3"."num" = $2) OR ("simpleModel3"."num" = $3))"#
    );
    assert_eq!(fragment.args, vec![Value::Int(7), Value::Int(1), Value::Int(2)]);
}

// ============================================================================
// AIP-160 With Identifier Policies
// ============================================================================

#[test]
fn test_aip160_proto_policies() {
    let model = proto_model();
    let options = proto_options();
    let ts = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();

    let test_cases = vec![
        (
            "(bool = true AND timestamp = null) AND status = 1".to_string(),
            r#"("protoModel4"."bool" = $1 AND "protoModel4"."timestamp" IS NULL) AND ("protoModel4"."status" = $2)"#,
            vec![Value::Bool(true), Value::Int(1)],
        ),
        (
            "(timestamp = 2020-01-01T00:00:00Z OR timestamp = null) AND status = 1".to_string(),
            r#"("protoModel4"."timestamp" = $1 OR "protoModel4"."timestamp" IS NULL) AND ("protoModel4"."status" = $2)"#,
            vec![Value::Timestamp(ts), Value::Int(1)],
        ),
        (
            r#"status = "OK""#.to_string(),
            r#"("protoModel4"."status" = $1)"#,
            vec![Value::Int(1)],
        ),
        (
            r#"status = "status_ok""#.to_string(),
            r#"("protoModel4"."status" = $1)"#,
            vec![Value::Int(1)],
        ),
        (
            "status = 0".to_string(),
            r#"("protoModel4"."status" = $1)"#,
            vec![Value::Int(0)],
        ),
        (
            (1..=6)
                .map(|n| format!("status = {}", n.min(2)))
                .collect::<Vec<_>>()
                .join(" OR "),
            r#"("protoModel4"."status" = $1 OR "protoModel4"."status" = $2 OR "protoModel4"."status" = $3 OR "protoModel4"."status" = $4 OR "protoModel4"."status" = $5 OR "protoModel4"."status" = $6)"#,
            vec![
                Value::Int(1),
                Value::Int(2),
                Value::Int(2),
                Value::Int(2),
                Value::Int(2),
                Value::Int(2),
            ],
        ),
        (
            r#"strs:"a""#.to_string(),
            r#"($1 = ANY("protoModel4"."strs"))"#,
            vec![Value::from("a")],
        ),
        (
            r#"-(strs:"a")"#.to_string(),
            r#"($1 != ALL("protoModel4"."strs"))"#,
            vec![Value::from("a")],
        ),
    ];

    for (filter, where_clause, args) in test_cases {
        let fragment = QuerySet::new(&model)
            .aip160(&filter, &options)
            .unwrap_or_else(|e| panic!("Failed to compile {}: {}", filter, e))
            .all_query()
            .unwrap();
        assert_eq!(
            fragment.sql,
            format!("{} WHERE {}", PROTO_SELECT, where_clause),
            "Failed for filter: {}",
            filter
        );
        assert_eq!(fragment.args, args, "Failed for filter: {}", filter);
    }
}

#[test]
fn test_aip160_proto_errors() {
    let model = proto_model();
    let options = proto_options();
    let test_cases = vec![
        ("non_existent = 1", "identifier non_existent is not allowed"),
        ("nullable_int = 1", "identifier nullable_int is not allowed"),
        ("bool = null", "type NULL is not accepted for identifier bool"),
        (r#"status = "invalid""#, "type STRING is not accepted for identifier status"),
        ("status = 99", "value 99 is not accepted for identifier status"),
    ];

    for (filter, expected) in test_cases {
        let err = QuerySet::new(&model).aip160(filter, &options).unwrap_err();
        assert!(matches!(err, QueryError::Compile(_)), "Failed for filter: {}", filter);
        assert_eq!(err.to_string(), expected, "Failed for filter: {}", filter);
    }
}

// ============================================================================
// Hand-Written Filters
// ============================================================================

#[test]
fn test_filter_hints() {
    let model = simple_model();
    let fragment = QuerySet::new(&model)
        .filter(["num__gte=:min", "num__lt__or=:max", "nullable__null=true"])
        .unwrap()
        .filter_or_inner_or(["non_nullable__ilike=%:q%", "id__in=:ids"])
        .unwrap()
        .args(
            NamedArgs::new()
                .with("min", 1)
                .with("max", 10)
                .with("q", "abc")
                .with("ids", vec![1, 2, 3]),
        )
        .reset_order_by()
        .all_query()
        .unwrap();

    assert_eq!(
        fragment.sql,
        format!(
            r#"{} WHERE ("simpleModel3"."num" >= $1 OR "simpleModel3"."num" < $2 AND "simpleModel3"."nullable" IS NULL) OR ("simpleModel3"."non_nullable" ILIKE '%' || $3 || '%' OR "simpleModel3"."id" = ANY($4)) ORDER BY "simpleModel3"."id" ASC"#,
            SIMPLE_SELECT
        )
    );
    assert_eq!(
        fragment.args,
        vec![
            Value::Int(1),
            Value::Int(10),
            Value::from("abc"),
            Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        ]
    );
}

#[test]
fn test_filter_group_variants() {
    let model = simple_model();
    let other = Model::new("other", "others");
    let fragment = QuerySet::new(&model)
        .filter_inner_or(["num=:a", "num=:b"])
        .unwrap()
        .filter_or(["id=:c", "nullable__notnull=true"])
        .unwrap()
        .args(NamedArgs::new().with("a", 1).with("b", 2).with("c", 3))
        .left_join(&model, &other, "id", "ref_id")
        .include(["id"])
        .order_by(["id"])
        .all_query()
        .unwrap();

    assert_eq!(
        fragment.sql,
        r#"SELECT "simpleModel3"."id" FROM "simple_model_3" "simpleModel3" LEFT JOIN "others" "other" ON "simpleModel3"."id" = "other"."ref_id" WHERE ("simpleModel3"."num" = $1 OR "simpleModel3"."num" = $2) OR ("simpleModel3"."id" = $3 AND "simpleModel3"."nullable" IS NOT NULL) ORDER BY "simpleModel3"."id" ASC"#
    );
}

#[test]
fn test_filter_syntax_errors() {
    let model = simple_model();
    let test_cases = vec![
        ("id", "invalid filter: id"),
        ("id=:a=:b", "invalid filter: id=:a=:b"),
        ("id__between=:x", "invalid operator hint __between in filter id__between=:x"),
    ];

    for (filter, expected) in test_cases {
        let err = QuerySet::new(&model).filter([filter]).unwrap_err();
        assert_eq!(err.to_string(), expected, "Failed for filter: {}", filter);
    }
}

#[test]
fn test_unknown_argument() {
    let model = simple_model();
    let err = QuerySet::new(&model)
        .filter(["id=:missing"])
        .unwrap()
        .all_query()
        .unwrap_err();
    assert_eq!(err.to_string(), "no argument named :missing");
}

#[test]
fn test_subquery_argument() {
    let model = simple_model();
    let other = Model::new("other", "others").columns(["ref_id"]);
    let sub = QuerySet::new(&other)
        .filter(["ref_id__gt=:min"])
        .unwrap()
        .arg("min", 100)
        .include(["ref_id"])
        .sub_query()
        .unwrap();
    assert_eq!(
        sub,
        SubQuery {
            sql: r#"SELECT "other"."ref_id" FROM "others" "other" WHERE ("other"."ref_id" > $1)"#
                .to_string(),
            args: vec![Value::Int(100)],
        }
    );

    let fragment = QuerySet::new(&model)
        .filter(["num=:num", "id__in=:sub"])
        .unwrap()
        .arg("num", 5)
        .arg("sub", sub)
        .reset_order_by()
        .count_query()
        .unwrap();
    assert_eq!(
        fragment.sql,
        r#"SELECT COUNT(*) FROM "simple_model_3" "simpleModel3" WHERE ("simpleModel3"."num" = $2 AND "simpleModel3"."id" IN (SELECT "other"."ref_id" FROM "others" "other" WHERE ("other"."ref_id" > $1)))"#
    );
    assert_eq!(fragment.args, vec![Value::Int(100), Value::Int(5)]);
}

// ============================================================================
// Statement Shapes
// ============================================================================

#[test]
fn test_select_shaping() {
    let model = simple_model();
    let other = Model::new("other", "others");
    let fragment = QuerySet::new(&model)
        .exclude(["nullable"])
        .inner_join(&model, &other, "id", "ref_id")
        .order_by(["-num", "other.ref_id"])
        .limit(10)
        .offset(20)
        .all_query()
        .unwrap();

    assert_eq!(
        fragment.sql,
        r#"SELECT "simpleModel3"."id", "simpleModel3"."num", "simpleModel3"."non_nullable" FROM "simple_model_3" "simpleModel3" INNER JOIN "others" "other" ON "simpleModel3"."id" = "other"."ref_id" ORDER BY "simpleModel3"."num" DESC, "other"."ref_id" ASC LIMIT 10 OFFSET 20"#
    );
    assert!(fragment.args.is_empty());
}

#[test]
fn test_get_query_limits_to_one() {
    let model = simple_model();
    let fragment = QuerySet::new(&model)
        .filter(["id=:id"])
        .unwrap()
        .arg("id", 3)
        .limit(50)
        .get_query()
        .unwrap();
    assert!(fragment.sql.ends_with(r#"ORDER BY "simpleModel3"."id" ASC LIMIT 1"#));
}

#[test]
fn test_delete_query() {
    let model = simple_model();
    let fragment = QuerySet::new(&model)
        .aip160("num > 5", &FilterOptions::new())
        .unwrap()
        .delete_query()
        .unwrap();
    assert_eq!(fragment.sql, r#"DELETE FROM "simple_model_3" WHERE ("num" > $1)"#);
    assert_eq!(fragment.args, vec![Value::Int(5)]);

    assert_eq!(QuerySet::new(&model).delete_query(), Err(QueryError::NoFilter));
}

#[test]
fn test_update_query() {
    let model = simple_model();
    let fragment = QuerySet::new(&model)
        .filter(["id=:id"])
        .unwrap()
        .arg("id", 1)
        .update_query(&[("num", Value::Int(2)), ("nullable", Value::Null)])
        .unwrap();

    assert_eq!(
        fragment.sql,
        r#"UPDATE "simple_model_3" SET "num" = $2, "nullable" = $3 WHERE ("id" = $1) RETURNING "id", "num", "non_nullable", "nullable""#
    );
    assert_eq!(fragment.args, vec![Value::Int(1), Value::Int(2), Value::Null]);

    let err = QuerySet::new(&model)
        .update_query(&[("num", Value::Int(2))])
        .unwrap_err();
    assert_eq!(err.to_string(), "No filter statement found");
}

#[test]
fn test_create_query() {
    let model = simple_model();
    let fragment = QuerySet::new(&model)
        .create_query(&[("num", Value::Int(2)), ("non_nullable", Value::from("x"))])
        .unwrap();

    assert_eq!(
        fragment.sql,
        r#"INSERT INTO "simple_model_3" ("num", "non_nullable") VALUES ($1, $2) RETURNING "id", "num", "non_nullable", "nullable""#
    );
    assert_eq!(fragment.args, vec![Value::Int(2), Value::from("x")]);
    assert_eq!(QuerySet::new(&model).create_query(&[]), Err(QueryError::NoValues));
}
