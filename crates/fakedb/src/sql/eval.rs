//! Executes parsed statements against an in-memory [`Dataset`].

use super::parser::{
    BinaryOp, Delete, Expr, Insert, Select, SelectItem, Statement, UnaryOp, Update, parse,
};
use crate::dataset::{Dataset, Record, Table};
use fakedb_core::Value;
use fakedb_core::error::{Error, QueryErrorKind, Result};
use regex::Regex;
use std::cmp::Ordering;

/// Rows produced by a query, laid out by column position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Build a result set from records.
    ///
    /// Column names come from the first record. Each later record is laid
    /// out by looking its values up by name; missing columns are NULL.
    pub fn from_records(records: &[Record]) -> Self {
        let Some(first) = records.first() else {
            return Self::default();
        };
        let columns: Vec<String> = first.iter().map(|(name, _)| name.clone()).collect();
        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|col| {
                        record
                            .iter()
                            .find(|(name, _)| name == col)
                            .map_or(Value::Null, |(_, v)| v.clone())
                    })
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| self.columns.iter().cloned().zip(row.iter().cloned()).collect())
            .collect()
    }
}

/// What running a statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlOutput {
    Rows(ResultSet),
    Mutation {
        rows_affected: u64,
        last_insert_id: Option<i64>,
    },
}

/// Parse and run `sql` against `dataset`.
pub fn run(sql: &str, dataset: &mut Dataset) -> Result<SqlOutput> {
    let stmt = parse(sql)?;
    execute(&stmt, dataset).map_err(|err| match err {
        Error::Query(mut q) if q.sql.is_none() => {
            q.sql = Some(sql.to_string());
            Error::Query(q)
        }
        other => other,
    })
}

/// Output column names `sql` would produce, or `None` if it is not a SELECT.
///
/// Nothing is evaluated, so `?` placeholders bound to NULL are fine.
pub fn describe(sql: &str, dataset: &Dataset) -> Result<Option<Vec<String>>> {
    match parse(sql)? {
        Statement::Select(select) => {
            let columns = select
                .from
                .as_ref()
                .and_then(|name| dataset.table(name))
                .map_or(&[][..], Table::columns);
            Ok(Some(output_names(&select, columns)))
        }
        _ => Ok(None),
    }
}

/// Run an already parsed statement.
pub fn execute(stmt: &Statement, dataset: &mut Dataset) -> Result<SqlOutput> {
    match stmt {
        Statement::Select(select) => run_select(select, dataset).map(SqlOutput::Rows),
        Statement::Insert(insert) => run_insert(insert, dataset),
        Statement::Update(update) => run_update(update, dataset),
        Statement::Delete(delete) => run_delete(delete, dataset),
    }
}

fn run_select(select: &Select, dataset: &Dataset) -> Result<ResultSet> {
    let no_columns: &[String] = &[];
    let (columns, source): (&[String], Vec<&[Value]>) = match &select.from {
        Some(name) => match dataset.table(name) {
            Some(table) => (
                table.columns(),
                table.rows().iter().map(Vec::as_slice).collect(),
            ),
            None => {
                tracing::trace!(table = %name, "SELECT from missing table yields no rows");
                return Ok(ResultSet::new(output_names(select, no_columns), Vec::new()));
            }
        },
        None => (no_columns, vec![&[][..]]),
    };

    let mut matched = Vec::with_capacity(source.len());
    for row in source {
        let keep = match &select.filter {
            Some(filter) => truthy(&eval(filter, &Scope::new(columns, row))?),
            None => true,
        };
        if keep {
            matched.push(row);
        }
    }

    let names = output_names(select, columns);
    let aggregate = select.projection.iter().any(|item| match item {
        SelectItem::Expr { expr, .. } => expr.contains_aggregate(),
        SelectItem::Wildcard => false,
    });

    if aggregate {
        let nulls = vec![Value::Null; columns.len()];
        let first = matched.first().copied().unwrap_or(nulls.as_slice());
        let scope = Scope {
            group: Some(matched.as_slice()),
            ..Scope::new(columns, first)
        };
        let row = project(select, &scope)?;
        return Ok(ResultSet::new(names, vec![row]));
    }

    let mut produced: Vec<(Vec<Value>, Vec<Value>)> = Vec::with_capacity(matched.len());
    for row in matched {
        let scope = Scope::new(columns, row);
        let projected = project(select, &scope)?;
        let mut keys = Vec::with_capacity(select.order_by.len());
        for order in &select.order_by {
            let with_output = Scope {
                output: Some((names.as_slice(), projected.as_slice())),
                ..Scope::new(columns, row)
            };
            keys.push(eval(&order.expr, &with_output)?);
        }
        produced.push((keys, projected));
    }

    if !select.order_by.is_empty() {
        produced.sort_by(|(a, _), (b, _)| {
            for (i, order) in select.order_by.iter().enumerate() {
                let ord = order_values(&a[i], &b[i]);
                let ord = if order.descending { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }

    let mut rows: Vec<Vec<Value>> = produced.into_iter().map(|(_, row)| row).collect();
    if select.distinct {
        let mut unique: Vec<Vec<Value>> = Vec::with_capacity(rows.len());
        for row in rows {
            if !unique.contains(&row) {
                unique.push(row);
            }
        }
        rows = unique;
    }

    let offset = select.offset.map_or(0, |o| o as usize);
    let rows: Vec<Vec<Value>> = match select.limit {
        Some(limit) => rows.into_iter().skip(offset).take(limit as usize).collect(),
        None => rows.into_iter().skip(offset).collect(),
    };

    Ok(ResultSet::new(names, rows))
}

fn output_names(select: &Select, columns: &[String]) -> Vec<String> {
    let mut names = Vec::new();
    for (i, item) in select.projection.iter().enumerate() {
        match item {
            SelectItem::Wildcard => names.extend(columns.iter().cloned()),
            SelectItem::Expr {
                alias: Some(alias), ..
            } => names.push(alias.clone()),
            SelectItem::Expr { expr, alias: None } => names.push(match expr {
                Expr::Column(name) => name.clone(),
                Expr::Count(None) => "COUNT(*)".to_string(),
                Expr::Count(Some(arg)) => match arg.as_ref() {
                    Expr::Column(name) => format!("COUNT({})", name),
                    _ => format!("col{}", i),
                },
                Expr::Literal(value) => value.to_string(),
                _ => format!("col{}", i),
            }),
        }
    }
    names
}

fn project(select: &Select, scope: &Scope<'_>) -> Result<Vec<Value>> {
    let mut out = Vec::new();
    for item in &select.projection {
        match item {
            SelectItem::Wildcard => out.extend(scope.row.iter().cloned()),
            SelectItem::Expr { expr, .. } => out.push(eval(expr, scope)?),
        }
    }
    Ok(out)
}

fn run_insert(insert: &Insert, dataset: &mut Dataset) -> Result<SqlOutput> {
    let table = dataset.table_or_create(&insert.table);
    let columns: Vec<String> = match &insert.columns {
        Some(cols) => cols.clone(),
        None if table.columns().is_empty() => {
            return Err(Error::query(
                QueryErrorKind::NotFound,
                None,
                format!(
                    "table {} has no columns; name them in the INSERT",
                    insert.table
                ),
            ));
        }
        None => table.columns().to_vec(),
    };

    let mut last_insert_id = None;
    for exprs in &insert.rows {
        if exprs.len() != columns.len() {
            return Err(Error::query(
                QueryErrorKind::Syntax,
                None,
                format!(
                    "{} values for {} columns",
                    exprs.len(),
                    columns.len()
                ),
            ));
        }
        let empty = Scope::new(&[], &[]);
        let mut record: Record = Vec::with_capacity(columns.len() + 1);
        for (col, expr) in columns.iter().zip(exprs) {
            record.push((col.clone(), eval(expr, &empty)?));
        }

        match record
            .iter()
            .position(|(col, _)| col.eq_ignore_ascii_case("id"))
        {
            Some(pos) if record[pos].1.is_null() => {
                record[pos].1 = Value::BigInt(next_id(table)?);
            }
            Some(_) => {}
            None => {
                if let Some(idx) = table.column_index("id") {
                    let name = table.columns()[idx].clone();
                    record.push((name, Value::BigInt(next_id(table)?)));
                }
            }
        }

        let row = table.insert_record(&record);
        let id = table
            .column_index("id")
            .and_then(|idx| table.rows()[row][idx].as_i64());
        last_insert_id = Some(id.unwrap_or(table.len() as i64));
    }

    tracing::trace!(
        table = %insert.table,
        rows = insert.rows.len(),
        last_insert_id = ?last_insert_id,
        "Inserted rows"
    );
    Ok(SqlOutput::Mutation {
        rows_affected: insert.rows.len() as u64,
        last_insert_id,
    })
}

/// One past the largest integer id in the table.
fn next_id(table: &Table) -> Result<i64> {
    let max = table
        .column_index("id")
        .and_then(|idx| {
            table
                .rows()
                .iter()
                .filter_map(|row| row[idx].as_i64())
                .max()
        })
        .unwrap_or(0);
    max.checked_add(1).ok_or_else(|| {
        Error::query(
            QueryErrorKind::Database,
            None,
            "no id left after the largest id in the table",
        )
    })
}

fn run_update(update: &Update, dataset: &mut Dataset) -> Result<SqlOutput> {
    let Some(table) = dataset.table_mut(&update.table) else {
        return Ok(SqlOutput::Mutation {
            rows_affected: 0,
            last_insert_id: None,
        });
    };

    let targets: Vec<usize> = update
        .assignments
        .iter()
        .map(|(col, _)| table.ensure_column(col))
        .collect();
    let columns = table.columns().to_vec();

    let mut affected = 0u64;
    for row in table.rows_mut().iter_mut() {
        let scope = Scope::new(&columns, row);
        if let Some(filter) = &update.filter {
            if !truthy(&eval(filter, &scope)?) {
                continue;
            }
        }
        let mut values = Vec::with_capacity(update.assignments.len());
        for (_, expr) in &update.assignments {
            values.push(eval(expr, &scope)?);
        }
        for (pos, value) in targets.iter().zip(values) {
            row[*pos] = value;
        }
        affected += 1;
    }

    Ok(SqlOutput::Mutation {
        rows_affected: affected,
        last_insert_id: None,
    })
}

fn run_delete(delete: &Delete, dataset: &mut Dataset) -> Result<SqlOutput> {
    let Some(table) = dataset.table_mut(&delete.table) else {
        return Ok(SqlOutput::Mutation {
            rows_affected: 0,
            last_insert_id: None,
        });
    };

    let columns = table.columns().to_vec();
    let mut keep = Vec::with_capacity(table.len());
    for row in table.rows() {
        let doomed = match &delete.filter {
            Some(filter) => truthy(&eval(filter, &Scope::new(&columns, row))?),
            None => true,
        };
        keep.push(!doomed);
    }

    let before = table.len();
    let mut flags = keep.into_iter();
    table.rows_mut().retain(|_| flags.next().unwrap_or(true));

    Ok(SqlOutput::Mutation {
        rows_affected: (before - table.len()) as u64,
        last_insert_id: None,
    })
}

/// Column bindings visible to an expression.
struct Scope<'a> {
    columns: &'a [String],
    row: &'a [Value],
    /// Output columns, for ORDER BY on a select alias.
    output: Option<(&'a [String], &'a [Value])>,
    /// Rows an aggregate folds over.
    group: Option<&'a [&'a [Value]]>,
}

impl<'a> Scope<'a> {
    fn new(columns: &'a [String], row: &'a [Value]) -> Self {
        Self {
            columns,
            row,
            output: None,
            group: None,
        }
    }

    fn resolve(&self, name: &str) -> Result<Value> {
        if let Some(idx) = self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)) {
            return Ok(self.row.get(idx).cloned().unwrap_or(Value::Null));
        }
        if let Some((names, values)) = self.output {
            if let Some(idx) = names.iter().position(|c| c.eq_ignore_ascii_case(name)) {
                return Ok(values.get(idx).cloned().unwrap_or(Value::Null));
            }
        }
        Err(Error::query(
            QueryErrorKind::NotFound,
            None,
            format!("no such column: {}", name),
        ))
    }
}

fn eval(expr: &Expr, scope: &Scope<'_>) -> Result<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Column(name) => scope.resolve(name),
        Expr::Count(arg) => {
            let Some(group) = scope.group else {
                return Err(Error::query(
                    QueryErrorKind::Syntax,
                    None,
                    "COUNT() is only allowed in the select list",
                ));
            };
            let count = match arg {
                None => group.len(),
                Some(arg) => {
                    let mut n = 0;
                    for row in group {
                        if !eval(arg, &Scope::new(scope.columns, row))?.is_null() {
                            n += 1;
                        }
                    }
                    n
                }
            };
            Ok(Value::BigInt(count as i64))
        }
        Expr::Unary { op, expr } => {
            let value = eval(expr, scope)?;
            match op {
                UnaryOp::Not => Ok(truth(&value).map_or(Value::Null, |b| Value::Bool(!b))),
                UnaryOp::Neg => match value {
                    Value::Null => Ok(Value::Null),
                    Value::Double(v) => Ok(Value::Double(-v)),
                    other => match numeric(&other) {
                        Some(Value::BigInt(v)) => Ok(Value::BigInt(v.wrapping_neg())),
                        Some(Value::Double(v)) => Ok(Value::Double(-v)),
                        _ => Err(type_error("-", &other, &other)),
                    },
                },
            }
        }
        Expr::Binary { op, left, right } => {
            let l = eval(left, scope)?;
            let r = eval(right, scope)?;
            binary(*op, &l, &r)
        }
        Expr::IsNull { expr, negated } => {
            let is_null = eval(expr, scope)?.is_null();
            Ok(Value::Bool(is_null != *negated))
        }
        Expr::InList {
            expr,
            list,
            negated,
        } => {
            let needle = eval(expr, scope)?;
            if needle.is_null() {
                return Ok(Value::Null);
            }
            let mut saw_null = false;
            for item in list {
                let candidate = eval(item, scope)?;
                if candidate.is_null() {
                    saw_null = true;
                } else if compare(&needle, &candidate) == Some(Ordering::Equal) {
                    return Ok(Value::Bool(!*negated));
                }
            }
            Ok(if saw_null {
                Value::Null
            } else {
                Value::Bool(*negated)
            })
        }
        Expr::Like {
            expr,
            pattern,
            negated,
        } => {
            let value = eval(expr, scope)?;
            let pattern = eval(pattern, scope)?;
            if value.is_null() || pattern.is_null() {
                return Ok(Value::Null);
            }
            let matched = like_regex(&pattern.to_string())?.is_match(&value.to_string());
            Ok(Value::Bool(matched != *negated))
        }
    }
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    match op {
        BinaryOp::And => Ok(match (truth(l), truth(r)) {
            (Some(false), _) | (_, Some(false)) => Value::Bool(false),
            (Some(true), Some(true)) => Value::Bool(true),
            _ => Value::Null,
        }),
        BinaryOp::Or => Ok(match (truth(l), truth(r)) {
            (Some(true), _) | (_, Some(true)) => Value::Bool(true),
            (Some(false), Some(false)) => Value::Bool(false),
            _ => Value::Null,
        }),
        BinaryOp::Eq
        | BinaryOp::NotEq
        | BinaryOp::Lt
        | BinaryOp::LtEq
        | BinaryOp::Gt
        | BinaryOp::GtEq => {
            if l.is_null() || r.is_null() {
                return Ok(Value::Null);
            }
            let result = match compare(l, r) {
                Some(ord) => match op {
                    BinaryOp::Eq => ord == Ordering::Equal,
                    BinaryOp::NotEq => ord != Ordering::Equal,
                    BinaryOp::Lt => ord == Ordering::Less,
                    BinaryOp::LtEq => ord != Ordering::Greater,
                    BinaryOp::Gt => ord == Ordering::Greater,
                    _ => ord != Ordering::Less,
                },
                // Incomparable types are simply unequal.
                None => op == BinaryOp::NotEq,
            };
            Ok(Value::Bool(result))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => arithmetic(op, l, r),
    }
}

fn arithmetic(op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    let symbol = match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        _ => "/",
    };
    let (Some(a), Some(b)) = (numeric(l), numeric(r)) else {
        return Err(type_error(symbol, l, r));
    };
    Ok(match (a, b) {
        (Value::BigInt(x), Value::BigInt(y)) => {
            let out = match op {
                BinaryOp::Add => x.checked_add(y),
                BinaryOp::Sub => x.checked_sub(y),
                BinaryOp::Mul => x.checked_mul(y),
                _ => x.checked_div(y),
            };
            // Division by zero (and overflow) is NULL, as in SQLite.
            out.map_or(Value::Null, Value::BigInt)
        }
        (a, b) => {
            let x = a.as_f64().unwrap_or_default();
            let y = b.as_f64().unwrap_or_default();
            match op {
                BinaryOp::Add => Value::Double(x + y),
                BinaryOp::Sub => Value::Double(x - y),
                BinaryOp::Mul => Value::Double(x * y),
                _ if y == 0.0 => Value::Null,
                _ => Value::Double(x / y),
            }
        }
    })
}

fn type_error(op: &str, l: &Value, r: &Value) -> Error {
    Error::query(
        QueryErrorKind::Database,
        None,
        format!(
            "cannot apply '{}' to {} and {}",
            op,
            l.type_name(),
            r.type_name()
        ),
    )
}

/// Normalize to `BigInt` or `Double`, parsing numeric text.
fn numeric(value: &Value) -> Option<Value> {
    match value {
        Value::Double(v) => Some(Value::Double(*v)),
        Value::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .map(Value::BigInt)
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(Value::Double))
        }
        other => other.as_i64().map(Value::BigInt),
    }
}

/// Compare with numeric coercion of text, so `id = '1'` matches an integer id.
fn compare(l: &Value, r: &Value) -> Option<Ordering> {
    l.sql_cmp(r).or_else(|| match (l, r) {
        (Value::Text(_), _) | (_, Value::Text(_)) => numeric(l)?.sql_cmp(&numeric(r)?),
        _ => None,
    })
}

/// Total order for ORDER BY: NULLs first, incomparable values tie.
fn order_values(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => compare(a, b).unwrap_or(Ordering::Equal),
    }
}

fn truth(value: &Value) -> Option<bool> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(*b),
        Value::Double(v) => Some(*v != 0.0),
        Value::Text(_) => Some(numeric(value).and_then(|n| n.as_f64()).is_some_and(|v| v != 0.0)),
        other => Some(other.as_i64().is_some_and(|v| v != 0)),
    }
}

fn truthy(value: &Value) -> bool {
    truth(value) == Some(true)
}

/// Translate a LIKE pattern (`%`, `_`) into an anchored, case-insensitive regex.
fn like_regex(pattern: &str) -> Result<Regex> {
    let mut body = String::with_capacity(pattern.len() + 8);
    for ch in pattern.chars() {
        match ch {
            '%' => body.push_str(".*"),
            '_' => body.push('.'),
            other => body.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    Regex::new(&format!("(?is)^{}$", body)).map_err(|e| {
        Error::query(
            QueryErrorKind::Syntax,
            None,
            format!("invalid LIKE pattern '{}': {}", pattern, e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Dataset {
        Dataset::from_json_str(
            r#"{"users": {"columns": ["id", "name", "age"], "rows": [
                [1, "alice", 30],
                [2, "bob", 17],
                [3, "carol", null],
                [4, "Alan", 45]
            ]}}"#,
        )
        .unwrap()
    }

    fn rows(sql: &str, ds: &mut Dataset) -> ResultSet {
        match run(sql, ds).unwrap() {
            SqlOutput::Rows(rs) => rs,
            other => panic!("expected rows, got {other:?}"),
        }
    }

    fn mutation(sql: &str, ds: &mut Dataset) -> (u64, Option<i64>) {
        match run(sql, ds).unwrap() {
            SqlOutput::Mutation {
                rows_affected,
                last_insert_id,
            } => (rows_affected, last_insert_id),
            other => panic!("expected mutation, got {other:?}"),
        }
    }

    #[test]
    fn select_star_keeps_table_order() {
        let mut ds = seeded();
        let rs = rows("SELECT * FROM users", &mut ds);
        assert_eq!(rs.columns, vec!["id", "name", "age"]);
        assert_eq!(rs.len(), 4);
        assert_eq!(rs.rows[1][1], Value::from("bob"));
    }

    #[test]
    fn where_with_three_valued_logic() {
        let mut ds = seeded();
        let rs = rows("SELECT name FROM users WHERE age > 18", &mut ds);
        assert_eq!(
            rs.rows,
            vec![vec![Value::from("alice")], vec![Value::from("Alan")]]
        );

        let rs = rows("SELECT id FROM users WHERE NOT (age > 18)", &mut ds);
        assert_eq!(rs.rows, vec![vec![Value::BigInt(2)]]);

        let rs = rows("SELECT id FROM users WHERE age IS NULL", &mut ds);
        assert_eq!(rs.rows, vec![vec![Value::BigInt(3)]]);
    }

    #[test]
    fn like_in_and_text_coercion() {
        let mut ds = seeded();
        let rs = rows("SELECT id FROM users WHERE name LIKE 'a%'", &mut ds);
        assert_eq!(rs.rows, vec![vec![Value::BigInt(1)], vec![Value::BigInt(4)]]);

        let rs = rows("SELECT id FROM users WHERE id IN (2, 3) AND name NOT LIKE 'c_rol'", &mut ds);
        assert_eq!(rs.rows, vec![vec![Value::BigInt(2)]]);

        let rs = rows(r#"SELECT name FROM users WHERE id = "4""#, &mut ds);
        assert_eq!(rs.rows, vec![vec![Value::from("Alan")]]);
    }

    #[test]
    fn order_limit_offset_distinct() {
        let mut ds = seeded();
        let rs = rows(
            "SELECT name AS n FROM users ORDER BY age DESC LIMIT 2 OFFSET 1",
            &mut ds,
        );
        assert_eq!(rs.columns, vec!["n"]);
        assert_eq!(
            rs.rows,
            vec![vec![Value::from("alice")], vec![Value::from("bob")]]
        );

        assert!(run("SELECT name FROM users ORDER BY nope", &mut ds).is_err());

        mutation("INSERT INTO tags (t) VALUES ('x'), ('y'), ('x')", &mut ds);
        let rs = rows("SELECT DISTINCT t FROM tags ORDER BY t", &mut ds);
        assert_eq!(rs.rows, vec![vec![Value::from("x")], vec![Value::from("y")]]);
    }

    #[test]
    fn order_by_select_alias() {
        let mut ds = seeded();
        let rs = rows("SELECT id, age * 2 AS doubled FROM users ORDER BY doubled", &mut ds);
        let ids: Vec<Value> = rs.rows.iter().map(|r| r[0].clone()).collect();
        assert_eq!(
            ids,
            vec![
                Value::BigInt(3),
                Value::BigInt(2),
                Value::BigInt(1),
                Value::BigInt(4)
            ]
        );
    }

    #[test]
    fn count_aggregates() {
        let mut ds = seeded();
        let rs = rows("SELECT COUNT(*), COUNT(age) FROM users", &mut ds);
        assert_eq!(rs.columns, vec!["COUNT(*)", "COUNT(age)"]);
        assert_eq!(rs.rows, vec![vec![Value::BigInt(4), Value::BigInt(3)]]);

        let rs = rows("SELECT COUNT(*) AS n FROM users WHERE age > 100", &mut ds);
        assert_eq!(rs.rows, vec![vec![Value::BigInt(0)]]);

        assert!(run("SELECT id FROM users WHERE COUNT(*) > 1", &mut ds).is_err());
    }

    #[test]
    fn select_without_from_and_missing_table() {
        let mut ds = Dataset::new();
        let rs = rows("SELECT 1", &mut ds);
        assert_eq!(rs.columns, vec!["1"]);
        assert_eq!(rs.rows, vec![vec![Value::BigInt(1)]]);

        let rs = rows("SELECT id, name FROM ghosts", &mut ds);
        assert_eq!(rs.columns, vec!["id", "name"]);
        assert!(rs.is_empty());
    }

    #[test]
    fn insert_assigns_ids() {
        let mut ds = seeded();
        let (n, id) = mutation("INSERT INTO users (name, age) VALUES ('dave', 20)", &mut ds);
        assert_eq!((n, id), (1, Some(5)));

        let (n, id) = mutation(
            "INSERT INTO users (id, name) VALUES (NULL, 'erin'), (40, 'frank')",
            &mut ds,
        );
        assert_eq!((n, id), (2, Some(40)));
        let rs = rows("SELECT id FROM users WHERE name = 'erin'", &mut ds);
        assert_eq!(rs.rows, vec![vec![Value::BigInt(6)]]);

        // without an id column the row count stands in for the rowid
        let (_, id) = mutation("INSERT INTO logs (msg) VALUES ('a')", &mut ds);
        assert_eq!(id, Some(1));
        let (_, id) = mutation("INSERT INTO logs VALUES ('b')", &mut ds);
        assert_eq!(id, Some(2));
    }

    #[test]
    fn insert_errors() {
        let mut ds = Dataset::new();
        assert!(run("INSERT INTO empty VALUES (1)", &mut ds).is_err());
        let err = run("INSERT INTO t (a, b) VALUES (1)", &mut ds).unwrap_err();
        assert_eq!(err.sql(), Some("INSERT INTO t (a, b) VALUES (1)"));
    }

    #[test]
    fn describe_reports_select_columns() {
        let ds = seeded();
        assert_eq!(
            describe("SELECT * FROM users", &ds).unwrap(),
            Some(vec!["id".to_string(), "name".to_string(), "age".to_string()])
        );
        assert_eq!(
            describe("SELECT name AS who, COUNT(*) FROM nowhere WHERE id = NULL", &ds).unwrap(),
            Some(vec!["who".to_string(), "COUNT(*)".to_string()])
        );
        assert_eq!(describe("DELETE FROM users", &ds).unwrap(), None);
        assert!(describe("SELEC name", &ds).is_err());
    }

    #[test]
    fn insert_after_largest_id_is_an_error() {
        let mut ds = Dataset::from_json_str(
            r#"{"t": {"columns": ["id", "v"], "rows": [[9223372036854775807, 1]]}}"#,
        )
        .unwrap();
        let err = run("INSERT INTO t (v) VALUES (2)", &mut ds).unwrap_err();
        assert!(matches!(
            &err,
            Error::Query(q) if q.kind == QueryErrorKind::Database
        ));
        assert_eq!(ds.table("t").unwrap().len(), 1);

        // an explicit id still goes in
        let (n, id) = mutation("INSERT INTO t (id, v) VALUES (-1, 3)", &mut ds);
        assert_eq!((n, id), (1, Some(-1)));
    }

    #[test]
    fn update_and_delete_count_rows() {
        let mut ds = seeded();
        let (n, id) = mutation("UPDATE users SET age = age + 1 WHERE age >= 30", &mut ds);
        assert_eq!((n, id), (2, None));
        let rs = rows("SELECT age FROM users WHERE id = 1", &mut ds);
        assert_eq!(rs.rows, vec![vec![Value::BigInt(31)]]);

        let (n, _) = mutation("DELETE FROM users WHERE age IS NULL OR age < 18", &mut ds);
        assert_eq!(n, 2);
        assert_eq!(rows("SELECT * FROM users", &mut ds).len(), 2);

        assert_eq!(mutation("DELETE FROM nowhere", &mut ds), (0, None));
        assert_eq!(mutation("UPDATE nowhere SET a = 1", &mut ds), (0, None));
        assert_eq!(mutation("DELETE FROM users", &mut ds), (2, None));
    }

    #[test]
    fn arithmetic_edge_cases() {
        let mut ds = Dataset::new();
        let rs = rows("SELECT 7 / 2, 7.0 / 2, 1 / 0, NULL + 1, -(3)", &mut ds);
        assert_eq!(
            rs.rows[0],
            vec![
                Value::BigInt(3),
                Value::Double(3.5),
                Value::Null,
                Value::Null,
                Value::BigInt(-3)
            ]
        );
        assert!(run("SELECT 'a' + 1", &mut ds).is_err());
    }

    #[test]
    fn unknown_column_is_an_error() {
        let mut ds = seeded();
        let err = run("SELECT * FROM users WHERE nope = 1", &mut ds).unwrap_err();
        assert!(err.to_string().contains("no such column: nope"));
    }

    #[test]
    fn result_set_from_records_uses_first_record_columns() {
        let records = vec![
            vec![
                ("b".to_string(), Value::BigInt(1)),
                ("a".to_string(), Value::from("x")),
            ],
            vec![("a".to_string(), Value::from("y"))],
        ];
        let rs = ResultSet::from_records(&records);
        assert_eq!(rs.columns, vec!["b", "a"]);
        assert_eq!(rs.rows[1], vec![Value::Null, Value::from("y")]);
        assert_eq!(rs.records()[0], records[0]);
        assert!(ResultSet::from_records(&[]).is_empty());
    }
}
