//! Recursive-descent parser producing [`Statement`]s.

use super::lexer::{Lexer, Token, TokenKind};
use fakedb_core::error::{Error, QueryError, QueryErrorKind, Result};
use fakedb_core::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub distinct: bool,
    pub projection: Vec<SelectItem>,
    /// `None` for `SELECT 1` style queries with no FROM clause.
    pub from: Option<String>,
    pub filter: Option<Expr>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Wildcard,
    Expr { expr: Expr, alias: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expr: Expr,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: String,
    pub columns: Option<Vec<String>>,
    pub rows: Vec<Vec<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: String,
    pub assignments: Vec<(String, Expr)>,
    pub filter: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: String,
    pub filter: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Column(String),
    /// `COUNT(*)` when the argument is `None`.
    Count(Option<Box<Expr>>),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
}

impl Expr {
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expr::Count(_) => true,
            Expr::Literal(_) | Expr::Column(_) => false,
            Expr::Unary { expr, .. } | Expr::IsNull { expr, .. } => expr.contains_aggregate(),
            Expr::Binary { left, right, .. } => {
                left.contains_aggregate() || right.contains_aggregate()
            }
            Expr::InList { expr, list, .. } => {
                expr.contains_aggregate() || list.iter().any(Expr::contains_aggregate)
            }
            Expr::Like { expr, pattern, .. } => {
                expr.contains_aggregate() || pattern.contains_aggregate()
            }
        }
    }
}

/// Words that end an expression or table reference instead of naming an alias.
const RESERVED: &[&str] = &[
    "SELECT", "FROM", "WHERE", "ORDER", "BY", "LIMIT", "OFFSET", "GROUP", "HAVING", "AND", "OR",
    "NOT", "SET", "VALUES", "INTO", "AS", "ASC", "DESC", "IS", "IN", "LIKE", "NULL", "ON", "JOIN",
];

/// Parse a single statement. A trailing `;` is allowed.
pub fn parse(sql: &str) -> Result<Statement> {
    let tokens = Lexer::tokenize(sql)?;
    let mut parser = Parser {
        sql,
        tokens,
        pos: 0,
    };
    let stmt = parser.statement()?;
    parser.eat(&TokenKind::Semicolon);
    parser.expect_eof()?;
    Ok(stmt)
}

struct Parser<'a> {
    sql: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> &Token {
        // tokenize always ends with Eof, and the cursor never passes it
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        &self.tokens[(self.pos + ahead).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Query(QueryError {
            kind: QueryErrorKind::Syntax,
            sql: Some(self.sql.to_string()),
            message: message.into(),
            position: Some(self.peek().offset),
        })
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().is_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", keyword)))
        }
    }

    fn expect_eof(&self) -> Result<()> {
        if self.peek().kind == TokenKind::Eof {
            Ok(())
        } else {
            Err(self.error("unexpected trailing input"))
        }
    }

    fn identifier(&mut self) -> Result<String> {
        match &self.peek().kind {
            TokenKind::QuotedIdent(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            TokenKind::Ident(s) if !is_reserved(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => Err(self.error("expected identifier")),
        }
    }

    /// `name` or `schema.name`; only the last part is kept.
    fn qualified_name(&mut self) -> Result<String> {
        let mut name = self.identifier()?;
        while self.eat(&TokenKind::Dot) {
            name = self.identifier()?;
        }
        Ok(name)
    }

    fn optional_alias(&mut self) -> Result<Option<String>> {
        if self.eat_keyword("AS") {
            return self.identifier().map(Some);
        }
        match &self.peek().kind {
            TokenKind::QuotedIdent(_) => self.identifier().map(Some),
            TokenKind::Ident(s) if !is_reserved(s) => self.identifier().map(Some),
            _ => Ok(None),
        }
    }

    fn statement(&mut self) -> Result<Statement> {
        if self.eat_keyword("SELECT") {
            self.select().map(Statement::Select)
        } else if self.eat_keyword("INSERT") {
            self.insert().map(Statement::Insert)
        } else if self.eat_keyword("UPDATE") {
            self.update().map(Statement::Update)
        } else if self.eat_keyword("DELETE") {
            self.delete().map(Statement::Delete)
        } else {
            Err(Error::Query(QueryError {
                kind: QueryErrorKind::Unsupported,
                sql: Some(self.sql.to_string()),
                message: "only SELECT, INSERT, UPDATE and DELETE are supported".to_string(),
                position: Some(self.peek().offset),
            }))
        }
    }

    fn select(&mut self) -> Result<Select> {
        let distinct = self.eat_keyword("DISTINCT");
        if !distinct {
            self.eat_keyword("ALL");
        }

        let mut projection = Vec::new();
        loop {
            if self.eat(&TokenKind::Star) {
                projection.push(SelectItem::Wildcard);
            } else if matches!(self.peek().kind, TokenKind::Ident(_) | TokenKind::QuotedIdent(_))
                && self.peek_at(1).kind == TokenKind::Dot
                && self.peek_at(2).kind == TokenKind::Star
            {
                // t.*
                self.pos += 3;
                projection.push(SelectItem::Wildcard);
            } else {
                let expr = self.expr()?;
                let alias = self.optional_alias()?;
                projection.push(SelectItem::Expr { expr, alias });
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }

        let from = if self.eat_keyword("FROM") {
            let table = self.qualified_name()?;
            self.optional_alias()?;
            Some(table)
        } else {
            None
        };

        let filter = self.where_clause()?;

        let mut order_by = Vec::new();
        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            loop {
                let expr = self.expr()?;
                let descending = if self.eat_keyword("DESC") {
                    true
                } else {
                    self.eat_keyword("ASC");
                    false
                };
                order_by.push(OrderBy { expr, descending });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }

        let mut limit = None;
        let mut offset = None;
        if self.eat_keyword("LIMIT") {
            let first = self.unsigned()?;
            if self.eat(&TokenKind::Comma) {
                // LIMIT offset, count
                offset = Some(first);
                limit = Some(self.unsigned()?);
            } else {
                limit = Some(first);
            }
        }
        if self.eat_keyword("OFFSET") {
            offset = Some(self.unsigned()?);
        }

        Ok(Select {
            distinct,
            projection,
            from,
            filter,
            order_by,
            limit,
            offset,
        })
    }

    fn unsigned(&mut self) -> Result<u64> {
        match self.peek().kind {
            TokenKind::Integer(n) if n >= 0 => {
                self.advance();
                Ok(n as u64)
            }
            _ => Err(self.error("expected a non-negative integer")),
        }
    }

    fn where_clause(&mut self) -> Result<Option<Expr>> {
        if self.eat_keyword("WHERE") {
            self.expr().map(Some)
        } else {
            Ok(None)
        }
    }

    fn insert(&mut self) -> Result<Insert> {
        self.expect_keyword("INTO")?;
        let table = self.qualified_name()?;

        let columns = if self.eat(&TokenKind::LParen) {
            let mut cols = vec![self.qualified_name()?];
            while self.eat(&TokenKind::Comma) {
                cols.push(self.qualified_name()?);
            }
            self.expect(&TokenKind::RParen, "')' after column list")?;
            Some(cols)
        } else {
            None
        };

        self.expect_keyword("VALUES")?;
        let mut rows = Vec::new();
        loop {
            self.expect(&TokenKind::LParen, "'(' before values")?;
            let mut row = vec![self.expr()?];
            while self.eat(&TokenKind::Comma) {
                row.push(self.expr()?);
            }
            self.expect(&TokenKind::RParen, "')' after values")?;
            rows.push(row);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }

        Ok(Insert {
            table,
            columns,
            rows,
        })
    }

    fn update(&mut self) -> Result<Update> {
        let table = self.qualified_name()?;
        self.expect_keyword("SET")?;
        let mut assignments = Vec::new();
        loop {
            let column = self.qualified_name()?;
            self.expect(&TokenKind::Eq, "'=' in SET clause")?;
            assignments.push((column, self.expr()?));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let filter = self.where_clause()?;
        Ok(Update {
            table,
            assignments,
            filter,
        })
    }

    fn delete(&mut self) -> Result<Delete> {
        self.expect_keyword("FROM")?;
        let table = self.qualified_name()?;
        let filter = self.where_clause()?;
        Ok(Delete { table, filter })
    }

    // Expression grammar, lowest precedence first:
    // OR < AND < NOT < comparison / IS / IN / LIKE < + - < * / < unary - < primary

    fn expr(&mut self) -> Result<Expr> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("OR") {
            let right = self.and_expr()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut left = self.not_expr()?;
        while self.eat_keyword("AND") {
            let right = self.not_expr()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr> {
        if self.eat_keyword("NOT") {
            let expr = self.not_expr()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr> {
        let left = self.additive()?;

        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            return Ok(Expr::IsNull {
                expr: Box::new(left),
                negated,
            });
        }

        let negated = if self.peek().is_keyword("NOT")
            && (self.peek_at(1).is_keyword("IN") || self.peek_at(1).is_keyword("LIKE"))
        {
            self.advance();
            true
        } else {
            false
        };

        if self.eat_keyword("IN") {
            self.expect(&TokenKind::LParen, "'(' after IN")?;
            let mut list = Vec::new();
            if self.peek().kind != TokenKind::RParen {
                list.push(self.expr()?);
                while self.eat(&TokenKind::Comma) {
                    list.push(self.expr()?);
                }
            }
            self.expect(&TokenKind::RParen, "')' after IN list")?;
            return Ok(Expr::InList {
                expr: Box::new(left),
                list,
                negated,
            });
        }

        if self.eat_keyword("LIKE") {
            let pattern = self.additive()?;
            return Ok(Expr::Like {
                expr: Box::new(left),
                pattern: Box::new(pattern),
                negated,
            });
        }

        let op = match self.peek().kind {
            TokenKind::Eq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::NotEq,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::LtEq => BinaryOp::LtEq,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::GtEq => BinaryOp::GtEq,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.additive()?;
        Ok(binary(op, left, right))
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat(&TokenKind::Minus) {
            let expr = self.unary()?;
            return Ok(match expr {
                Expr::Literal(Value::BigInt(v)) => Expr::Literal(Value::BigInt(-v)),
                Expr::Literal(Value::Double(v)) => Expr::Literal(Value::Double(-v)),
                other => Expr::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(other),
                },
            });
        }
        if self.eat(&TokenKind::Plus) {
            return self.unary();
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Integer(v) => {
                self.advance();
                Ok(Expr::Literal(Value::BigInt(v)))
            }
            TokenKind::Float(v) => {
                self.advance();
                Ok(Expr::Literal(Value::Double(v)))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Value::Text(s)))
            }
            TokenKind::Blob(b) => {
                self.advance();
                Ok(Expr::Literal(Value::Bytes(b)))
            }
            TokenKind::Param => Err(Error::Query(QueryError {
                kind: QueryErrorKind::Syntax,
                sql: Some(self.sql.to_string()),
                message: "unbound '?' placeholder".to_string(),
                position: Some(tok.offset),
            })),
            TokenKind::LParen => {
                self.advance();
                let inner = self.expr()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Ident(ref word) if word.eq_ignore_ascii_case("NULL") => {
                self.advance();
                Ok(Expr::Literal(Value::Null))
            }
            TokenKind::Ident(ref word) if word.eq_ignore_ascii_case("TRUE") => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(true)))
            }
            TokenKind::Ident(ref word) if word.eq_ignore_ascii_case("FALSE") => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(false)))
            }
            TokenKind::Ident(ref word)
                if word.eq_ignore_ascii_case("COUNT")
                    && self.peek_at(1).kind == TokenKind::LParen =>
            {
                self.pos += 2;
                let arg = if self.eat(&TokenKind::Star) {
                    None
                } else {
                    Some(Box::new(self.expr()?))
                };
                self.expect(&TokenKind::RParen, "')' after COUNT argument")?;
                Ok(Expr::Count(arg))
            }
            TokenKind::Ident(ref name) if self.peek_at(1).kind == TokenKind::LParen => {
                Err(Error::Query(QueryError {
                    kind: QueryErrorKind::Unsupported,
                    sql: Some(self.sql.to_string()),
                    message: format!("unsupported function {}()", name),
                    position: Some(tok.offset),
                }))
            }
            TokenKind::Ident(_) | TokenKind::QuotedIdent(_) => {
                self.qualified_name().map(Expr::Column)
            }
            _ => Err(self.error("expected expression")),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(word))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str) -> Box<Expr> {
        Box::new(Expr::Column(name.to_string()))
    }

    fn lit(v: impl Into<Value>) -> Box<Expr> {
        Box::new(Expr::Literal(v.into()))
    }

    #[test]
    fn parses_full_select() {
        let stmt = parse(
            "SELECT DISTINCT u.name AS n, COUNT(*) FROM main.users u \
             WHERE age >= 18 AND name LIKE 'a%' ORDER BY name DESC, id LIMIT 10 OFFSET 5;",
        )
        .unwrap();
        let Statement::Select(select) = stmt else {
            panic!("expected SELECT");
        };
        assert!(select.distinct);
        assert_eq!(select.from.as_deref(), Some("users"));
        assert_eq!(
            select.projection[0],
            SelectItem::Expr {
                expr: Expr::Column("name".to_string()),
                alias: Some("n".to_string()),
            }
        );
        assert_eq!(
            select.projection[1],
            SelectItem::Expr {
                expr: Expr::Count(None),
                alias: None,
            }
        );
        assert_eq!(select.order_by.len(), 2);
        assert!(select.order_by[0].descending);
        assert!(!select.order_by[1].descending);
        assert_eq!(select.limit, Some(10));
        assert_eq!(select.offset, Some(5));
        assert!(matches!(
            select.filter,
            Some(Expr::Binary {
                op: BinaryOp::And,
                ..
            })
        ));
    }

    #[test]
    fn mysql_style_limit() {
        let Statement::Select(select) = parse("SELECT * FROM t LIMIT 5, 10").unwrap() else {
            panic!("expected SELECT");
        };
        assert_eq!(select.projection, vec![SelectItem::Wildcard]);
        assert_eq!(select.offset, Some(5));
        assert_eq!(select.limit, Some(10));
    }

    #[test]
    fn precedence_of_and_over_or() {
        let Statement::Delete(delete) = parse("DELETE FROM t WHERE a = 1 OR b = 2 AND c = 3").unwrap()
        else {
            panic!("expected DELETE");
        };
        let Some(Expr::Binary { op, right, .. }) = delete.filter else {
            panic!("expected binary filter");
        };
        assert_eq!(op, BinaryOp::Or);
        assert!(matches!(
            *right,
            Expr::Binary {
                op: BinaryOp::And,
                ..
            }
        ));
    }

    #[test]
    fn parses_insert_and_update() {
        let Statement::Insert(insert) =
            parse("INSERT INTO users (id, name) VALUES (1, 'a'), (2, NULL)").unwrap()
        else {
            panic!("expected INSERT");
        };
        assert_eq!(insert.table, "users");
        assert_eq!(
            insert.columns,
            Some(vec!["id".to_string(), "name".to_string()])
        );
        assert_eq!(insert.rows.len(), 2);
        assert_eq!(insert.rows[1][1], Expr::Literal(Value::Null));

        let Statement::Update(update) =
            parse("UPDATE users SET n = n + 1, name = 'x' WHERE id IN (1, 2)").unwrap()
        else {
            panic!("expected UPDATE");
        };
        assert_eq!(update.assignments.len(), 2);
        assert_eq!(
            update.assignments[0].1,
            Expr::Binary {
                op: BinaryOp::Add,
                left: col("n"),
                right: lit(1i64),
            }
        );
        assert!(matches!(
            update.filter,
            Some(Expr::InList { negated: false, .. })
        ));
    }

    #[test]
    fn negated_predicates() {
        let Statement::Select(select) =
            parse("SELECT * FROM t WHERE a IS NOT NULL AND b NOT IN (1) AND c NOT LIKE 'x'").unwrap()
        else {
            panic!("expected SELECT");
        };
        let text = format!("{:?}", select.filter);
        assert!(text.contains("IsNull"));
        assert!(text.contains("InList"));
        assert!(text.contains("Like"));
        assert_eq!(text.matches("negated: true").count(), 3);
    }

    #[test]
    fn negative_literals_fold() {
        let Statement::Select(select) = parse("SELECT -5, -a FROM t").unwrap() else {
            panic!("expected SELECT");
        };
        assert_eq!(
            select.projection[0],
            SelectItem::Expr {
                expr: Expr::Literal(Value::BigInt(-5)),
                alias: None,
            }
        );
        assert!(matches!(
            &select.projection[1],
            SelectItem::Expr {
                expr: Expr::Unary {
                    op: UnaryOp::Neg,
                    ..
                },
                ..
            }
        ));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse("CREATE TABLE t (a INT)").is_err());
        assert!(parse("SELECT * FROM t WHERE a = ?").is_err());
        assert!(parse("SELECT * FROM t garbage garbage").is_err());
        assert!(parse("SELECT upper(a) FROM t").is_err());
        assert!(parse("INSERT INTO t VALUES 1").is_err());
        assert!(parse("SELECT * FROM t LIMIT -1").is_err());
    }
}
