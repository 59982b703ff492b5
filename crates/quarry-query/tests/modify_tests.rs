//! UPDATE, DELETE, INSERT and upsert statements

mod common;

use common::{renderer, sql, translator};
use quarry_query::expr::{Expr, Query};
use quarry_query::{DialectKind, QueryError, RenderError, TranslateError};
use test_case::test_case;

fn rename_first() -> Expr {
    Query::table("Person")
        .filter(Expr::lambda1("p", |p| p.member("id").equals(1)))
        .update(Expr::lambda1("p", |p| {
            Expr::member_init("Person", vec![("name", p.member("name").concat("!"))])
        }))
}

fn delete_first() -> Expr {
    Query::table("Person")
        .filter(Expr::lambda1("p", |p| p.member("id").equals(1)))
        .delete()
}

// ============================================================================
// UPDATE and DELETE
// ============================================================================

#[test_case(DialectKind::Ansi, "UPDATE people AS t1\nSET name = t1.name || '!'\nWHERE t1.id = 1" ; "ansi")]
#[test_case(DialectKind::Oracle, "UPDATE people t1\nSET name = t1.name || '!'\nWHERE t1.id = 1" ; "oracle")]
#[test_case(DialectKind::SqlServer, "UPDATE t1\nSET name = t1.name + '!'\nFROM people AS t1\nWHERE t1.id = 1" ; "sql server")]
#[test_case(DialectKind::Sqlite, "UPDATE people AS t1\nSET name = t1.name || '!'\nWHERE t1.id = 1" ; "sqlite")]
fn test_update(kind: DialectKind, expected: &str) {
    assert_eq!(sql(kind, &rename_first()), expected);
}

#[test_case(DialectKind::PostgreSql, "DELETE FROM people AS t1\nWHERE t1.id = 1" ; "postgresql")]
#[test_case(DialectKind::SqlServer, "DELETE t1\nFROM people AS t1\nWHERE t1.id = 1" ; "sql server")]
fn test_delete(kind: DialectKind, expected: &str) {
    assert_eq!(sql(kind, &delete_first()), expected);
}

#[test]
fn test_update_of_paged_source_is_rejected() {
    let expr = Query::table("Person").take(1).update(Expr::lambda1("p", |p| {
        Expr::member_init("Person", vec![("name", p.member("name"))])
    }));
    let err = translator().translate(&expr).unwrap_err();
    assert!(
        matches!(err, TranslateError::TranslationNotImplemented { .. }),
        "{err}"
    );
}

#[test]
fn test_update_of_unknown_member() {
    let expr = Query::table("Person").update(Expr::lambda1("p", |p| {
        Expr::member_init("Person", vec![("nickname", p.member("name"))])
    }));
    let err = translator().translate(&expr).unwrap_err();
    assert!(
        matches!(&err, TranslateError::UnknownMember { member, .. } if member == "nickname"),
        "{err}"
    );
}

// ============================================================================
// Output
// ============================================================================

fn rename_with_output(old_values: bool) -> Expr {
    Query::table("Person").update_with_output(
        Expr::lambda1("p", |p| {
            Expr::member_init("Person", vec![("name", p.member("name").concat("!"))])
        }),
        Expr::lambda2("old", "new", move |old, new| {
            let mut members = vec![("renamed", new.member("name"))];
            if old_values {
                members.insert(0, ("previous", old.member("name")));
            }
            Expr::new_object(members)
        }),
    )
}

#[test]
fn test_update_output_clause() {
    let sql = sql(DialectKind::SqlServer, &rename_with_output(true));
    assert!(sql.starts_with("UPDATE t1\nSET name = t1.name + '!'\nOUTPUT DELETED.name AS "), "{sql}");
    assert!(sql.contains(", INSERTED.name AS "), "{sql}");
    assert!(sql.ends_with("\nFROM people AS t1"), "{sql}");
}

#[test_case(DialectKind::PostgreSql ; "postgresql")]
#[test_case(DialectKind::Sqlite ; "sqlite")]
fn test_update_returning_clause(kind: DialectKind) {
    let sql = sql(kind, &rename_with_output(false));
    assert_eq!(
        sql,
        "UPDATE people AS t1\nSET name = t1.name || '!'\nRETURNING t1.name AS name"
    );
}

#[test]
fn test_returning_rejects_old_values() {
    let err = translator()
        .compile(&rename_with_output(true), &renderer(DialectKind::PostgreSql))
        .unwrap_err();
    assert_eq!(
        err,
        QueryError::Render(RenderError::Unsupported {
            feature: "old values in RETURNING".to_string(),
            dialect: "postgresql".to_string(),
        })
    );
}

#[test_case(DialectKind::Ansi ; "ansi")]
#[test_case(DialectKind::Oracle ; "oracle")]
fn test_output_unsupported(kind: DialectKind) {
    let err = translator()
        .compile(&rename_with_output(false), &renderer(kind))
        .unwrap_err();
    assert!(matches!(err, QueryError::Render(RenderError::Unsupported { .. })));
}

#[test]
fn test_update_output_reads_rows() {
    let query = translator().translate(&rename_with_output(true)).unwrap();
    assert_eq!(query.accessor.unwrap().indices(), vec![0, 1]);
}

// ============================================================================
// INSERT
// ============================================================================

#[test]
fn test_insert_skips_identity() {
    let expr = Query::insert(
        "Pet",
        Expr::lambda(
            &[],
            Expr::member_init(
                "Pet",
                vec![
                    ("id", Expr::value(99)),
                    ("owner_id", Expr::value(1)),
                    ("name", Expr::value("Rex")),
                ],
            ),
        ),
    );
    assert_eq!(
        sql(DialectKind::Ansi, &expr),
        "INSERT INTO pets (owner_id, name)\nVALUES (1, 'Rex')"
    );
}

#[test]
fn test_insert_from_query() {
    let expr = Query::table("Person")
        .filter(Expr::lambda1("p", |p| p.member("id").gt(3)))
        .insert_into(
            "Pet",
            Expr::lambda1("p", |p| {
                Expr::member_init(
                    "Pet",
                    vec![("owner_id", p.clone().member("id")), ("name", p.member("name"))],
                )
            }),
        );
    assert_eq!(
        sql(DialectKind::PostgreSql, &expr),
        "INSERT INTO pets (owner_id, name)\nSELECT t1.id, t1.name\nFROM people AS t1\nWHERE t1.id > 3"
    );
}

// ============================================================================
// Upsert
// ============================================================================

fn upsert(update: Expr) -> Expr {
    Query::insert_or_update(
        "Person",
        Expr::lambda(
            &[],
            Expr::member_init("Person", vec![("id", Expr::value(1)), ("name", Expr::value("x"))]),
        ),
        update,
    )
}

#[test_case(DialectKind::PostgreSql ; "postgresql")]
#[test_case(DialectKind::Sqlite ; "sqlite")]
fn test_upsert_on_conflict(kind: DialectKind) {
    let expr = upsert(Expr::lambda1("p", |p| {
        Expr::member_init("Person", vec![("name", p.member("name").concat("!"))])
    }));
    assert_eq!(
        sql(kind, &expr),
        "INSERT INTO people (id, name)\nVALUES (1, 'x')\nON CONFLICT (id) DO UPDATE SET name = people.name || '!'"
    );
}

#[test]
fn test_upsert_without_updates_does_nothing() {
    let expr = upsert(Expr::lambda1("p", |p| {
        Expr::member_init("Person", vec![("id", p.member("id"))])
    }));
    assert!(sql(DialectKind::PostgreSql, &expr).ends_with("ON CONFLICT (id) DO NOTHING"));
}

#[test]
fn test_upsert_falls_back_to_merge() {
    let expr = upsert(Expr::lambda1("p", |p| {
        Expr::member_init("Person", vec![("name", p.member("name"))])
    }));
    let sql = sql(DialectKind::SqlServer, &expr);

    assert!(sql.starts_with("MERGE INTO people AS Target\nUSING (VALUES (1, 'x')) AS Source (id, name)"), "{sql}");
    assert!(sql.ends_with(";"), "{sql}");
}
