use super::*;
use crate::expr::{Expr, ExprType, Query};
use crate::mapping::{ColumnMapping, ObjectName};
use crate::sequence::standard_registry;
use crate::sql::{ColumnRef, SqlValue};

fn schema() -> MappingSchema {
    MappingSchema::new()
        .with_table(
            TableMapping::new("Person", ObjectName::new("people"))
                .with_column(ColumnMapping::new("id", ExprType::Int).primary_key(1))
                .with_column(ColumnMapping::new("name", ExprType::Text))
                .with_column(ColumnMapping::new("age", ExprType::Int).nullable()),
        )
        .with_standard_functions()
}

fn builder() -> ExpressionBuilder {
    ExpressionBuilder::new(
        standard_registry(),
        Arc::new(schema()),
        TranslateOptions::default(),
    )
}

fn build(b: &mut ExpressionBuilder, expr: impl Into<Expr>) -> ContextId {
    b.build_sequence(&expr.into()).unwrap()
}

// ============================================================================
// Finalization
// ============================================================================

#[test]
fn test_result_statement_is_memoized() {
    let mut b = builder();
    let id = build(
        &mut b,
        Query::table("Person").select(Expr::lambda1("p", |p| p.member("name"))),
    );
    let context = b.context(id);
    context.build_expression(&mut b, None, 0, false).unwrap();

    let first = context.get_result_statement(&mut b).unwrap();
    let second = context.get_result_statement(&mut b).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.as_select().unwrap().columns.len(), 1);
    assert_eq!(second.as_select().unwrap().columns.len(), 1);
}

#[test]
fn test_frozen_query_rejects_columns() {
    let mut b = builder();
    let id = build(&mut b, Query::table("Person"));
    let context = b.context(id);
    context.get_result_statement(&mut b).unwrap();

    let err = context.build_expression(&mut b, None, 0, false).unwrap_err();
    assert!(matches!(err, TranslateError::ContextFrozen { .. }));
    assert!(b.is_frozen(context.query_id()));
}

// ============================================================================
// Columns
// ============================================================================

#[test]
fn test_equal_expressions_share_a_column() {
    let mut b = builder();
    let sum = || Expr::query_param("x", 5).plus(1);
    let id = build(
        &mut b,
        Query::scalar(Expr::new_object(vec![("a", sum()), ("b", sum())])),
    );
    let context = b.context(id);

    let accessor = context.build_expression(&mut b, None, 0, false).unwrap();
    assert_eq!(accessor.indices(), vec![0, 0]);
    assert_eq!(b.query(context.query_id()).columns.len(), 1);
}

#[test]
fn test_scalar_select_without_columns_projects_one() {
    let mut b = builder();
    let id = build(
        &mut b,
        Query::scalar(Expr::new_object(vec![("a", Expr::value(7))])),
    );
    let context = b.context(id);

    let accessor = context.build_expression(&mut b, None, 0, false).unwrap();
    let statement = context.get_result_statement(&mut b).unwrap();

    assert_eq!(
        accessor,
        ResultAccessor::Object {
            type_name: None,
            members: vec![("a".to_string(), ResultAccessor::Value(SqlValue::Int(7)))],
        }
    );
    let columns = &statement.as_select().unwrap().columns;
    assert_eq!(columns.len(), 1);
    assert_eq!(columns[0].expr, SqlExpr::Value(SqlValue::Int(1)));
}

#[test]
fn test_scalar_select_rejects_conversion() {
    let mut b = builder();
    let id = build(&mut b, Query::scalar(Expr::value(1)));
    let context = b.context(id);

    let err = context
        .convert_to_sql(&mut b, None, 0, ConvertFlags::Field)
        .unwrap_err();
    match err {
        TranslateError::TranslationNotImplemented { context, .. } => {
            assert_eq!(context, "ScalarSelect#0");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_entity_key_columns() {
    let mut b = builder();
    let id = build(&mut b, Query::table("Person"));
    let context = b.context(id);

    let infos = context
        .convert_to_sql(&mut b, None, 0, ConvertFlags::Key)
        .unwrap();
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].member.as_deref(), Some("id"));
}

#[test]
fn test_unknown_member() {
    let mut b = builder();
    let id = build(&mut b, Query::table("Person"));
    let context = b.context(id);

    let err = context
        .convert_to_sql(&mut b, Some(&Expr::param("p").member("email")), 0, ConvertFlags::Field)
        .unwrap_err();
    assert_eq!(
        err,
        TranslateError::UnknownMember {
            entity: "Person".to_string(),
            member: "email".to_string(),
            context: "Table#0".to_string(),
        }
    );
}

// ============================================================================
// Scopes and index translation
// ============================================================================

#[test]
fn test_parent_index_through_subquery() {
    let mut b = builder();
    let table = build(&mut b, Query::table("Person"));
    let wrapper = b.wrap_in_subquery(table).unwrap();
    let table_ctx = b.context(table);

    let infos = table_ctx
        .convert_to_index(&mut b, Some(&Expr::param("p").member("name")), 0, ConvertFlags::Field)
        .unwrap();
    let inner = infos[0].index.unwrap();
    let outer = table_ctx.convert_to_parent_index(&mut b, inner, table).unwrap();

    let wrapper_query = b.context(wrapper).query_id();
    assert_eq!(
        b.query(wrapper_query).columns[outer].expr,
        SqlExpr::Column(ColumnRef {
            table: "t2".to_string(),
            name: "name".to_string(),
            nullable: false,
        })
    );
    assert_eq!(b.context_path(table), "SubQuery#1 > Table#0");
}

#[test]
fn test_duplicate_lambda_parameters() {
    let mut b = builder();
    let table = build(&mut b, Query::table("Person"));
    let lambda = Expr::lambda(&["p", "p"], Expr::param("p").member("id"));

    let err = b
        .with_lambda(&lambda, &[table, table], |b, body| b.convert_expr(body))
        .unwrap_err();
    assert!(matches!(
        err,
        TranslateError::AmbiguousColumnReference { candidates: 2, .. }
    ));
}

#[test]
fn test_unbound_parameter() {
    let mut b = builder();
    let err = b.convert_expr(&Expr::param("q").member("id")).unwrap_err();
    assert!(matches!(err, TranslateError::UnboundParameter { ref name, .. } if name == "q"));
}

#[test]
fn test_entity_in_scalar_position_is_ambiguous() {
    let mut b = builder();
    let table = build(&mut b, Query::table("Person"));

    let err = b
        .with_scope(vec![("p".to_string(), table)], |b| b.convert_expr(&Expr::param("p")))
        .unwrap_err();
    assert!(matches!(
        err,
        TranslateError::AmbiguousColumnReference { candidates: 3, .. }
    ));
}
