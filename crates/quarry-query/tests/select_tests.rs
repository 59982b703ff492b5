//! SELECT translation across dialects

mod common;

use common::{compile, sql, translator};
use insta::{assert_json_snapshot, assert_snapshot};
use quarry_query::expr::{Expr, ExprType, JoinType, Query, QueryMethod};
use quarry_query::render::QueryParameter;
use quarry_query::sql::SqlValue;
use quarry_query::{DialectKind, TranslateError};
use test_case::test_case;

fn names_over_three() -> Expr {
    Query::table("Person")
        .filter(Expr::lambda1("p", |p| p.member("id").gt(3)))
        .select(Expr::lambda1("p", |p| p.member("name")))
        .into_expr()
}

// ============================================================================
// Projection and filtering
// ============================================================================

#[test]
fn test_filter_and_project() {
    assert_snapshot!(sql(DialectKind::Ansi, &names_over_three()), @r"
    SELECT t1.name
    FROM people AS t1
    WHERE t1.id > 3
    ");
}

#[test]
fn test_oracle_omits_table_alias_keyword() {
    assert_snapshot!(sql(DialectKind::Oracle, &names_over_three()), @r"
    SELECT t1.name
    FROM people t1
    WHERE t1.id > 3
    ");
}

#[test]
fn test_whole_entity_projects_every_column() {
    let query = translator()
        .translate(&Query::table("Person").into_expr())
        .unwrap();
    let rendered = quarry_query::render(&query.statement, &common::renderer(DialectKind::Ansi)).unwrap();

    assert_eq!(rendered.sql, "SELECT t1.id, t1.name, t1.age\nFROM people AS t1");
    assert_eq!(query.accessor.unwrap().indices(), vec![0, 1, 2]);
}

#[test]
fn test_constructed_projection() {
    let expr = Query::table("Person")
        .select(Expr::lambda1("p", |p| {
            Expr::new_object(vec![("id", p.clone().member("id")), ("name", p.member("name"))])
        }))
        .into_expr();
    assert_eq!(
        sql(DialectKind::PostgreSql, &expr),
        "SELECT t1.id, t1.name\nFROM people AS t1"
    );
}

#[test_case(DialectKind::Ansi, "SELECT t1.id > 3\nFROM people AS t1" ; "ansi")]
#[test_case(DialectKind::PostgreSql, "SELECT t1.id > 3\nFROM people AS t1" ; "postgresql")]
#[test_case(DialectKind::Oracle, "SELECT CASE WHEN t1.id > 3 THEN 1 ELSE 0 END\nFROM people t1" ; "oracle")]
#[test_case(DialectKind::SqlServer, "SELECT CASE WHEN t1.id > 3 THEN 1 ELSE 0 END\nFROM people AS t1" ; "sql server")]
fn test_predicate_column(kind: DialectKind, expected: &str) {
    let expr = Query::table("Person")
        .select(Expr::lambda1("p", |p| p.member("id").gt(3)))
        .into_expr();
    assert_eq!(sql(kind, &expr), expected);
}

#[test_case(DialectKind::Ansi, "t1.name || '!'" ; "ansi")]
#[test_case(DialectKind::SqlServer, "t1.name + '!'" ; "sql server")]
fn test_concatenation(kind: DialectKind, expected: &str) {
    let expr = Query::table("Person")
        .select(Expr::lambda1("p", |p| p.member("name").concat("!")))
        .into_expr();
    assert_eq!(sql(kind, &expr), format!("SELECT {expected}\nFROM people AS t1"));
}

// ============================================================================
// Parameters
// ============================================================================

#[test_case(DialectKind::Ansi, "?" ; "ansi")]
#[test_case(DialectKind::Oracle, ":min" ; "oracle")]
#[test_case(DialectKind::SqlServer, "@min" ; "sql server")]
#[test_case(DialectKind::PostgreSql, "$1" ; "postgresql")]
#[test_case(DialectKind::Sqlite, ":min" ; "sqlite")]
fn test_parameter_placeholders(kind: DialectKind, placeholder: &str) {
    let expr = Query::table("Person")
        .filter(Expr::lambda1("p", |p| p.member("id").gt(Expr::query_param("min", 3))))
        .select(Expr::lambda1("p", |p| p.member("name")))
        .into_expr();
    let rendered = compile(kind, &expr);

    assert!(rendered.sql.ends_with(&format!("WHERE t1.id > {placeholder}")), "{}", rendered.sql);
    assert_eq!(
        rendered.params,
        vec![QueryParameter {
            name: "min".to_string(),
            value: SqlValue::Int(3),
        }]
    );
}

fn two_bounds(low: i64, high: i64) -> Expr {
    Query::table("Person")
        .filter(Expr::lambda1("p", |p| {
            p.clone()
                .member("id")
                .gt(Expr::query_param("x", low))
                .and(p.member("age").lt(Expr::query_param("x", high)))
        }))
        .into_expr()
}

#[test_case(DialectKind::Ansi, "WHERE t1.id > ? AND t1.age < ?", "x" ; "ansi")]
#[test_case(DialectKind::Oracle, "WHERE t1.id > :x AND t1.age < :x_1", "x_1" ; "oracle")]
#[test_case(DialectKind::SqlServer, "WHERE t1.id > @x AND t1.age < @x_1", "x_1" ; "sql server")]
#[test_case(DialectKind::PostgreSql, "WHERE t1.id > $1 AND t1.age < $2", "x_1" ; "postgresql")]
fn test_same_name_different_values_bind_separately(kind: DialectKind, filter: &str, second: &str) {
    let rendered = compile(kind, &two_bounds(5, 6));

    assert!(rendered.sql.ends_with(filter), "{}", rendered.sql);
    assert_eq!(
        rendered.params,
        vec![
            QueryParameter {
                name: "x".to_string(),
                value: SqlValue::Int(5),
            },
            QueryParameter {
                name: second.to_string(),
                value: SqlValue::Int(6),
            },
        ]
    );
}

#[test]
fn test_rendered_query_snapshot() {
    assert_json_snapshot!(compile(DialectKind::Oracle, &two_bounds(5, 6)), @r#"
    {
      "sql": "SELECT t1.id, t1.name, t1.age\nFROM people t1\nWHERE t1.id > :x AND t1.age < :x_1",
      "params": [
        {
          "name": "x",
          "value": {
            "Int": 5
          }
        },
        {
          "name": "x_1",
          "value": {
            "Int": 6
          }
        }
      ]
    }
    "#);
}

#[test]
fn test_same_name_same_value_shares_binding() {
    let rendered = compile(DialectKind::PostgreSql, &two_bounds(5, 5));

    assert!(rendered.sql.ends_with("WHERE t1.id > $1 AND t1.age < $1"), "{}", rendered.sql);
    assert_eq!(rendered.params.len(), 1);
}

#[test]
fn test_inline_parameters() {
    let expr = Query::table("Person")
        .filter(Expr::lambda1("p", |p| p.member("name").equals(Expr::query_param("n", "O'Brien"))))
        .into_expr();
    let renderer = common::renderer(DialectKind::SqlServer).with_inline_parameters(true);
    let compiled = translator().compile(&expr, &renderer).unwrap();

    assert!(compiled.rendered.sql.ends_with("WHERE t1.name = 'O''Brien'"));
    assert!(compiled.rendered.params.is_empty());
}

// ============================================================================
// Paging
// ============================================================================

fn paged() -> Expr {
    Query::table("Person")
        .order_by(Expr::lambda1("p", |p| p.member("name")))
        .skip(5)
        .take(10)
        .select(Expr::lambda1("p", |p| p.member("name")))
        .into_expr()
}

#[test_case(DialectKind::Ansi, "\nOFFSET 5 ROWS\nFETCH NEXT 10 ROWS ONLY" ; "ansi")]
#[test_case(DialectKind::Oracle, "\nOFFSET 5 ROWS\nFETCH NEXT 10 ROWS ONLY" ; "oracle")]
#[test_case(DialectKind::SqlServer, "\nOFFSET 5 ROWS\nFETCH NEXT 10 ROWS ONLY" ; "sql server")]
#[test_case(DialectKind::PostgreSql, "\nLIMIT 10\nOFFSET 5" ; "postgresql")]
#[test_case(DialectKind::Sqlite, "\nLIMIT 10\nOFFSET 5" ; "sqlite")]
fn test_paging_style(kind: DialectKind, paging: &str) {
    let sql = sql(kind, &paged());
    assert!(sql.ends_with(&format!("ORDER BY t1.name{paging}")), "{sql}");
}

#[test]
fn test_sql_server_top() {
    let expr = Query::table("Person")
        .order_by_descending(Expr::lambda1("p", |p| p.member("id")))
        .take(3)
        .select(Expr::lambda1("p", |p| p.member("name")))
        .into_expr();
    assert_snapshot!(sql(DialectKind::SqlServer, &expr), @r"
    SELECT TOP (3) t1.name
    FROM people AS t1
    ORDER BY t1.id DESC
    ");
}

#[test]
fn test_filter_after_take_wraps_query() {
    let expr = Query::table("Person")
        .take(10)
        .filter(Expr::lambda1("p", |p| p.member("id").gt(3)))
        .into_expr();
    let sql = sql(DialectKind::PostgreSql, &expr);

    assert!(sql.contains("FROM (SELECT"), "{sql}");
    assert!(sql.contains("LIMIT 10)"), "{sql}");
    assert!(sql.ends_with("WHERE t2.id > 3"), "{sql}");
}

// ============================================================================
// Joins, grouping and subqueries
// ============================================================================

#[test]
fn test_inner_join() {
    let expr = Query::table("Person")
        .join(
            Query::table("Pet"),
            JoinType::Inner,
            Expr::lambda2("p", "pet", |p, pet| p.member("id").equals(pet.member("owner_id"))),
            Expr::lambda2("p", "pet", |p, pet| {
                Expr::new_object(vec![("owner", p.member("name")), ("pet", pet.member("name"))])
            }),
        )
        .into_expr();
    assert_snapshot!(sql(DialectKind::Ansi, &expr), @r"
    SELECT t1.name, t2.name
    FROM people AS t1
    INNER JOIN pets AS t2 ON t1.id = t2.owner_id
    ");
}

#[test]
fn test_group_by_with_having() {
    let expr = Query::table("Person")
        .group_by(Expr::lambda1("p", |p| p.member("age")))
        .filter(Expr::lambda1("g", |g| Expr::function("count", vec![g]).gt(1)))
        .select(Expr::lambda1("g", |g| {
            Expr::new_object(vec![
                ("age", g.clone().member("key")),
                ("people", Expr::function("count", vec![g])),
            ])
        }))
        .into_expr();
    let sql = sql(DialectKind::Ansi, &expr);

    assert!(sql.starts_with("SELECT t1.age, COUNT(*)\nFROM people AS t1"), "{sql}");
    assert!(sql.contains("\nGROUP BY t1.age\nHAVING COUNT(*) > 1"), "{sql}");
}

#[test]
fn test_exists_subquery() {
    let expr = Query::table("Person")
        .filter(Expr::lambda1("p", |p| {
            Query::table("Pet").any(Some(Expr::lambda1("pet", |pet| {
                pet.member("owner_id").equals(p.member("id"))
            })))
        }))
        .select(Expr::lambda1("p", |p| p.member("name")))
        .into_expr();
    let sql = sql(DialectKind::Ansi, &expr);

    assert!(sql.contains("\nWHERE EXISTS(SELECT"), "{sql}");
    assert!(sql.contains("FROM pets AS t2 WHERE t2.owner_id = t1.id)"), "{sql}");
}

#[test]
fn test_in_subquery() {
    let expr = Query::table("Person")
        .filter(Expr::lambda1("p", |p| {
            Query::table("Pet")
                .select(Expr::lambda1("pet", |pet| pet.member("owner_id")))
                .contains(p.member("id"))
        }))
        .select(Expr::lambda1("p", |p| p.member("name")))
        .into_expr();
    let sql = sql(DialectKind::Sqlite, &expr);

    assert!(
        sql.ends_with("WHERE t1.id IN (SELECT t2.owner_id FROM pets AS t2)"),
        "{sql}"
    );
}

#[test]
fn test_scalar_select_uses_fake_table() {
    let expr = Query::scalar(Expr::value(1)).into_expr();
    assert_eq!(sql(DialectKind::Oracle, &expr), "SELECT 1\nFROM sys.dual");
    assert_eq!(sql(DialectKind::Sqlite, &expr), "SELECT 1");
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unrecognized_shape() {
    let err = translator()
        .translate(&Query::table("Person").filter(Expr::value(true)).into_expr())
        .unwrap_err();
    let TranslateError::UnsupportedExpressionShape { tried, .. } = err else {
        panic!("expected an unsupported shape, got {err:?}");
    };
    assert!(tried.contains(&"filter"));
}

#[test]
fn test_distinct_without_source_is_unsupported() {
    let distinct = Expr::call(QueryMethod::Distinct, vec![], ExprType::Unit);
    let err = translator().translate(&distinct).unwrap_err();
    let TranslateError::UnsupportedExpressionShape { expr, tried } = err else {
        panic!("expected an unsupported shape, got {err:?}");
    };
    assert_eq!(*expr, distinct);
    assert!(tried.contains(&"distinct"));
}

#[test]
fn test_unknown_entity() {
    let err = translator()
        .translate(&Query::table("Invoice").into_expr())
        .unwrap_err();
    assert_eq!(
        err,
        TranslateError::UnknownEntity {
            entity: "Invoice".to_string()
        }
    );
}

#[test]
fn test_unknown_function() {
    let expr = Query::table("Person")
        .select(Expr::lambda1("p", |p| Expr::function("soundex", vec![p.member("name")])))
        .into_expr();
    assert_eq!(
        translator().translate(&expr).unwrap_err(),
        TranslateError::UnknownFunction {
            function: "soundex".to_string()
        }
    );
}

// ============================================================================
// Shape keys
// ============================================================================

#[test]
fn test_shape_key_is_stable() {
    let first = translator().translate(&names_over_three()).unwrap();
    let second = translator().translate(&names_over_three()).unwrap();
    let other = translator()
        .translate(&Query::table("Person").into_expr())
        .unwrap();

    assert_eq!(first.shape_key().unwrap(), second.shape_key().unwrap());
    assert_ne!(first.shape_key().unwrap(), other.shape_key().unwrap());
}
