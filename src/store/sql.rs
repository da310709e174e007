//! Bounded SQL front-end for the embedded store.
//!
//! Supports the statement shapes the persistence layer actually issues:
//! single-table CREATE TABLE / INSERT / SELECT / UPDATE / DELETE with `?`
//! placeholders. Placeholders are bound to the caller's parameter slice in
//! textual order during conversion.

use crate::core::{DbError, Result, Row, Value};
use sqlparser::ast as sql_ast;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::cmp::Ordering;

#[derive(Debug, Clone)]
pub(crate) enum Stmt {
    CreateTable {
        table: String,
        columns: Vec<String>,
        if_not_exists: bool,
    },
    Insert {
        table: String,
        columns: Option<Vec<String>>,
        rows: Vec<Row>,
    },
    Select {
        table: String,
        projection: Projection,
        selection: Option<Expr>,
        order_by: Option<OrderSpec>,
        limit: Option<usize>,
    },
    Update {
        table: String,
        assignments: Vec<(String, Value)>,
        selection: Option<Expr>,
    },
    Delete {
        table: String,
        selection: Option<Expr>,
    },
}

#[derive(Debug, Clone)]
pub(crate) enum Projection {
    All,
    Columns(Vec<String>),
}

#[derive(Debug, Clone)]
pub(crate) struct OrderSpec {
    pub column: String,
    pub descending: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Column(String),
    Literal(Value),
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl Expr {
    /// Evaluate against one row. Comparisons involving NULL are false.
    pub(crate) fn eval(&self, columns: &[String], row: &Row) -> Result<Value> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Column(name) => {
                let idx = columns.iter().position(|c| c == name).ok_or_else(|| {
                    DbError::ColumnNotFound(name.clone(), "<row>".to_string())
                })?;
                Ok(row.get(idx).cloned().unwrap_or(Value::Null))
            }
            Expr::BinaryOp { left, op, right } => {
                let lhs = left.eval(columns, row)?;
                let rhs = right.eval(columns, row)?;
                match op {
                    BinaryOp::And => Ok(Value::Boolean(as_bool(&lhs) && as_bool(&rhs))),
                    BinaryOp::Or => Ok(Value::Boolean(as_bool(&lhs) || as_bool(&rhs))),
                    BinaryOp::Eq => Ok(Value::Boolean(
                        !lhs.is_null() && !rhs.is_null() && lhs == rhs,
                    )),
                    BinaryOp::NotEq => Ok(Value::Boolean(
                        !lhs.is_null() && !rhs.is_null() && lhs != rhs,
                    )),
                    BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                        if lhs.is_null() || rhs.is_null() {
                            return Ok(Value::Boolean(false));
                        }
                        let ord = lhs.compare(&rhs)?;
                        let matched = match op {
                            BinaryOp::Lt => ord == Ordering::Less,
                            BinaryOp::LtEq => ord != Ordering::Greater,
                            BinaryOp::Gt => ord == Ordering::Greater,
                            BinaryOp::GtEq => ord != Ordering::Less,
                            _ => unreachable!(),
                        };
                        Ok(Value::Boolean(matched))
                    }
                }
            }
        }
    }

    pub(crate) fn matches(&self, columns: &[String], row: &Row) -> Result<bool> {
        Ok(as_bool(&self.eval(columns, row)?))
    }
}

fn as_bool(value: &Value) -> bool {
    match value {
        Value::Boolean(b) => *b,
        Value::Null => false,
        Value::Integer(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::Text(s) => !s.is_empty(),
    }
}

/// Sequential `?` placeholder supply.
struct ParamBinder<'a> {
    params: std::slice::Iter<'a, Value>,
}

impl<'a> ParamBinder<'a> {
    fn new(params: &'a [Value]) -> Self {
        Self {
            params: params.iter(),
        }
    }

    fn next(&mut self) -> Result<Value> {
        self.params
            .next()
            .cloned()
            .ok_or_else(|| DbError::ParseError("Not enough parameters for placeholders".into()))
    }
}

/// Parse a single statement and bind its placeholders.
pub(crate) fn parse(sql: &str, params: &[Value]) -> Result<Stmt> {
    let mut statements = Parser::parse_sql(&GenericDialect {}, sql)
        .map_err(|e| DbError::ParseError(e.to_string()))?;
    if statements.len() != 1 {
        return Err(DbError::UnsupportedOperation(
            "Exactly one statement per submission supported".into(),
        ));
    }
    let mut binder = ParamBinder::new(params);
    convert_statement(statements.remove(0), &mut binder)
}

fn convert_statement(stmt: sql_ast::Statement, binder: &mut ParamBinder) -> Result<Stmt> {
    match stmt {
        sql_ast::Statement::CreateTable(create) => {
            let table = extract_table_name(&create.name)?;
            let columns = create
                .columns
                .into_iter()
                .map(|col| col.name.value)
                .collect();
            Ok(Stmt::CreateTable {
                table,
                columns,
                if_not_exists: create.if_not_exists,
            })
        }
        sql_ast::Statement::Insert(insert) => convert_insert(insert, binder),
        sql_ast::Statement::Query(query) => convert_query(*query, binder),
        sql_ast::Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => convert_update(table, assignments, selection, binder),
        sql_ast::Statement::Delete(delete) => convert_delete(delete, binder),
        other => Err(DbError::UnsupportedOperation(format!(
            "Statement type not supported: {:?}",
            other
        ))),
    }
}

fn convert_insert(insert: sql_ast::Insert, binder: &mut ParamBinder) -> Result<Stmt> {
    let table = insert.table.to_string();

    let columns = if insert.columns.is_empty() {
        None
    } else {
        Some(insert.columns.into_iter().map(|id| id.value).collect())
    };

    let source = insert
        .source
        .ok_or_else(|| DbError::UnsupportedOperation("INSERT requires VALUES".into()))?;
    let sql_ast::SetExpr::Values(values) = *source.body else {
        return Err(DbError::UnsupportedOperation(
            "Only VALUES clause supported in INSERT".into(),
        ));
    };

    let rows = values
        .rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|expr| convert_scalar(expr, binder))
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Stmt::Insert {
        table,
        columns,
        rows,
    })
}

fn convert_query(query: sql_ast::Query, binder: &mut ParamBinder) -> Result<Stmt> {
    let sql_ast::SetExpr::Select(select) = *query.body else {
        return Err(DbError::UnsupportedOperation(
            "Only SELECT queries supported".into(),
        ));
    };

    if select.from.len() != 1 || !select.from[0].joins.is_empty() {
        return Err(DbError::UnsupportedOperation(
            "Only single-table SELECT supported".into(),
        ));
    }
    let table = match &select.from[0].relation {
        sql_ast::TableFactor::Table { name, .. } => extract_table_name(name)?,
        _ => {
            return Err(DbError::UnsupportedOperation(
                "Complex table references not supported".into(),
            ))
        }
    };

    let mut projected = Vec::new();
    let mut wildcard = false;
    for item in select.projection {
        match item {
            sql_ast::SelectItem::Wildcard(_) => wildcard = true,
            sql_ast::SelectItem::UnnamedExpr(sql_ast::Expr::Identifier(ident)) => {
                projected.push(ident.value);
            }
            other => {
                return Err(DbError::UnsupportedOperation(format!(
                    "Unsupported select item: {:?}",
                    other
                )))
            }
        }
    }
    let projection = if wildcard {
        Projection::All
    } else {
        Projection::Columns(projected)
    };

    let selection = select
        .selection
        .map(|expr| convert_expr(expr, binder))
        .transpose()?;

    let order_by = convert_order_by(query.order_by)?;
    let limit = convert_limit_clause(&query.limit_clause)?;

    Ok(Stmt::Select {
        table,
        projection,
        selection,
        order_by,
        limit,
    })
}

fn convert_update(
    table: sql_ast::TableWithJoins,
    assignments: Vec<sql_ast::Assignment>,
    selection: Option<sql_ast::Expr>,
    binder: &mut ParamBinder,
) -> Result<Stmt> {
    let table = match table.relation {
        sql_ast::TableFactor::Table { name, .. } => extract_table_name(&name)?,
        _ => {
            return Err(DbError::UnsupportedOperation(
                "Complex table references not supported in UPDATE".into(),
            ))
        }
    };

    let assignments = assignments
        .into_iter()
        .map(|assign| {
            let column = match assign.target {
                sql_ast::AssignmentTarget::ColumnName(col_name) => {
                    if col_name.0.len() == 1 {
                        col_name.0[0].to_string()
                    } else {
                        return Err(DbError::UnsupportedOperation(
                            "Qualified column names not supported in UPDATE".into(),
                        ));
                    }
                }
                _ => {
                    return Err(DbError::UnsupportedOperation(
                        "Only simple column names supported in UPDATE".into(),
                    ))
                }
            };
            let value = convert_scalar(assign.value, binder)?;
            Ok((column, value))
        })
        .collect::<Result<Vec<_>>>()?;

    let selection = selection
        .map(|expr| convert_expr(expr, binder))
        .transpose()?;

    Ok(Stmt::Update {
        table,
        assignments,
        selection,
    })
}

fn convert_delete(delete: sql_ast::Delete, binder: &mut ParamBinder) -> Result<Stmt> {
    let tables = match delete.from {
        sql_ast::FromTable::WithFromKeyword(tables) => tables,
        sql_ast::FromTable::WithoutKeyword(tables) => tables,
    };
    if tables.is_empty() {
        return Err(DbError::ParseError("DELETE requires a table".into()));
    }
    let table = match &tables[0].relation {
        sql_ast::TableFactor::Table { name, .. } => extract_table_name(name)?,
        _ => {
            return Err(DbError::UnsupportedOperation(
                "Complex table references not supported in DELETE".into(),
            ))
        }
    };

    let selection = delete
        .selection
        .map(|expr| convert_expr(expr, binder))
        .transpose()?;

    Ok(Stmt::Delete { table, selection })
}

fn convert_order_by(order_by: Option<sql_ast::OrderBy>) -> Result<Option<OrderSpec>> {
    let Some(order_by) = order_by else {
        return Ok(None);
    };

    let exprs = match order_by.kind {
        sql_ast::OrderByKind::Expressions(exprs) => exprs,
        sql_ast::OrderByKind::All(_) => {
            return Err(DbError::UnsupportedOperation(
                "ORDER BY ALL not supported".into(),
            ))
        }
    };
    if exprs.len() != 1 {
        return Err(DbError::UnsupportedOperation(
            "Only single-column ORDER BY supported".into(),
        ));
    }
    let order = exprs.into_iter().next().unwrap();
    let column = match order.expr {
        sql_ast::Expr::Identifier(ident) => ident.value,
        other => {
            return Err(DbError::UnsupportedOperation(format!(
                "Only column ORDER BY supported, got: {:?}",
                other
            )))
        }
    };
    let descending = order.options.asc.map(|asc| !asc).unwrap_or(false);

    Ok(Some(OrderSpec { column, descending }))
}

fn convert_limit_clause(limit_clause: &Option<sql_ast::LimitClause>) -> Result<Option<usize>> {
    let Some(clause) = limit_clause else {
        return Ok(None);
    };

    match clause {
        sql_ast::LimitClause::LimitOffset { limit, .. } => match limit {
            Some(sql_ast::Expr::Value(value_with_span)) => {
                extract_limit_number(&value_with_span.value)
            }
            Some(_) => Err(DbError::UnsupportedOperation(
                "Only numeric LIMIT supported".into(),
            )),
            None => Ok(None),
        },
        sql_ast::LimitClause::OffsetCommaLimit { limit, .. } => match limit {
            sql_ast::Expr::Value(value_with_span) => {
                extract_limit_number(&value_with_span.value)
            }
            _ => Err(DbError::UnsupportedOperation(
                "Only numeric LIMIT supported".into(),
            )),
        },
    }
}

fn extract_limit_number(value: &sql_ast::Value) -> Result<Option<usize>> {
    match value {
        sql_ast::Value::Number(n, _) => n
            .parse::<usize>()
            .map(Some)
            .map_err(|_| DbError::ParseError(format!("Invalid LIMIT value: {}", n))),
        other => Err(DbError::UnsupportedOperation(format!(
            "Only numeric LIMIT supported, got: {:?}",
            other
        ))),
    }
}

fn convert_expr(expr: sql_ast::Expr, binder: &mut ParamBinder) -> Result<Expr> {
    match expr {
        sql_ast::Expr::Identifier(ident) => Ok(Expr::Column(ident.value)),
        sql_ast::Expr::Value(val) => Ok(Expr::Literal(convert_value(&val.value, binder)?)),
        sql_ast::Expr::Nested(inner) => convert_expr(*inner, binder),
        sql_ast::Expr::BinaryOp { left, op, right } => Ok(Expr::BinaryOp {
            left: Box::new(convert_expr(*left, binder)?),
            op: convert_binary_op(&op)?,
            right: Box::new(convert_expr(*right, binder)?),
        }),
        other => Err(DbError::UnsupportedOperation(format!(
            "Unsupported expression: {:?}",
            other
        ))),
    }
}

/// A literal or placeholder, as allowed in VALUES and SET positions.
fn convert_scalar(expr: sql_ast::Expr, binder: &mut ParamBinder) -> Result<Value> {
    match expr {
        sql_ast::Expr::Value(val) => convert_value(&val.value, binder),
        sql_ast::Expr::UnaryOp {
            op: sql_ast::UnaryOperator::Minus,
            expr,
        } => match convert_scalar(*expr, binder)? {
            Value::Integer(i) => Ok(Value::Integer(-i)),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(DbError::TypeMismatch(format!(
                "Cannot negate {}",
                other.type_name()
            ))),
        },
        other => Err(DbError::UnsupportedOperation(format!(
            "Only literals and placeholders supported here, got: {:?}",
            other
        ))),
    }
}

fn convert_value(val: &sql_ast::Value, binder: &mut ParamBinder) -> Result<Value> {
    match val {
        sql_ast::Value::Placeholder(_) => binder.next(),
        sql_ast::Value::Number(n, _) => {
            if let Ok(i) = n.parse::<i64>() {
                Ok(Value::Integer(i))
            } else if let Ok(f) = n.parse::<f64>() {
                Ok(Value::Float(f))
            } else {
                Err(DbError::TypeMismatch(format!("Invalid number: {}", n)))
            }
        }
        sql_ast::Value::SingleQuotedString(s) | sql_ast::Value::DoubleQuotedString(s) => {
            Ok(Value::Text(s.clone()))
        }
        sql_ast::Value::Boolean(b) => Ok(Value::Boolean(*b)),
        sql_ast::Value::Null => Ok(Value::Null),
        other => Err(DbError::UnsupportedOperation(format!(
            "Unsupported value: {:?}",
            other
        ))),
    }
}

fn convert_binary_op(op: &sql_ast::BinaryOperator) -> Result<BinaryOp> {
    use sql_ast::BinaryOperator as SqlOp;
    match op {
        SqlOp::Eq => Ok(BinaryOp::Eq),
        SqlOp::NotEq => Ok(BinaryOp::NotEq),
        SqlOp::Lt => Ok(BinaryOp::Lt),
        SqlOp::LtEq => Ok(BinaryOp::LtEq),
        SqlOp::Gt => Ok(BinaryOp::Gt),
        SqlOp::GtEq => Ok(BinaryOp::GtEq),
        SqlOp::And => Ok(BinaryOp::And),
        SqlOp::Or => Ok(BinaryOp::Or),
        other => Err(DbError::UnsupportedOperation(format!(
            "Unsupported binary operator: {:?}",
            other
        ))),
    }
}

fn extract_table_name(name: &sql_ast::ObjectName) -> Result<String> {
    name.0
        .last()
        .map(|ident| ident.to_string())
        .ok_or_else(|| DbError::ParseError("Invalid table name".into()))
}
