//! Placeholder substitution for query templates.
//!
//! The fake driver does not keep parameters separate from the SQL: every
//! `?` is replaced by a literal rendering of its argument, and the bound
//! text is what the evaluator, the catcher and callbacks see.

use fakedb_core::{NamedValue, Value};
use regex::Regex;
use std::sync::LazyLock;

/// Leading keyword of a statement, used to dispatch `exec`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Select,
    Insert,
    Update,
    Delete,
    /// Anything else, uppercased (`CREATE`, `PRAGMA`, ...). Empty for blank input.
    Other(String),
}

static LEADING_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:--[^\n]*\n\s*)*\(?\s*([A-Za-z_]+)").expect("valid keyword regex")
});

impl Command {
    /// Classify `sql` by its first keyword.
    pub fn classify(sql: &str) -> Self {
        let keyword = LEADING_KEYWORD
            .captures(sql)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_ascii_uppercase())
            .unwrap_or_default();
        match keyword.as_str() {
            "SELECT" => Command::Select,
            "INSERT" => Command::Insert,
            "UPDATE" => Command::Update,
            "DELETE" => Command::Delete,
            _ => Command::Other(keyword),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Command::Select => "SELECT",
            Command::Insert => "INSERT",
            Command::Update => "UPDATE",
            Command::Delete => "DELETE",
            Command::Other(word) => word,
        }
    }
}

/// Remove every double quote from a template.
pub fn strip_double_quotes(template: &str) -> String {
    template.replace('"', "")
}

/// Number of `?` placeholders outside literals, quoted identifiers and comments.
pub fn count_placeholders(template: &str) -> usize {
    let mut count = 0;
    scan(template, |_| count += 1);
    count
}

/// Substitute the i-th `?` with the literal rendering of `args[i]`.
///
/// Placeholders inside literals, backtick identifiers or `--` comments are
/// left alone, as are placeholders beyond the last argument.
pub fn bind(template: &str, args: &[NamedValue]) -> String {
    let mut out = String::with_capacity(template.len() + args.len() * 8);
    let mut last = 0;
    let mut next = args.iter();
    scan(template, |pos| {
        if let Some(arg) = next.next() {
            out.push_str(&template[last..pos]);
            out.push_str(&render_literal(&arg.value));
            last = pos + 1;
        }
    });
    out.push_str(&template[last..]);
    out
}

/// Split a template into statements on top-level `;`.
///
/// Empty pieces are dropped, so a trailing `;` does not add a statement.
pub fn split_statements(template: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    for (pos, ch) in template.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(ch),
            (None, ';') => {
                pieces.push(&template[start..pos]);
                start = pos + 1;
            }
            (None, _) => {}
        }
    }
    pieces.push(&template[start..]);
    pieces
        .into_iter()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

/// Render a value as a SQL literal.
///
/// Text and timestamps are double-quoted with inner quotes doubled.
pub fn render_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::Int(v) => v.to_string(),
        Value::BigInt(v) => v.to_string(),
        Value::Double(v) => {
            let s = v.to_string();
            if v.is_finite() && !s.contains(['.', 'e', 'E']) {
                format!("{}.0", s)
            } else {
                s
            }
        }
        Value::Text(s) => quote(s),
        Value::Timestamp(v) => quote(&v.to_string()),
        Value::Json(j) => quote(&j.to_string()),
        Value::Bytes(b) => {
            let mut out = String::with_capacity(b.len() * 2 + 3);
            out.push_str("X'");
            for byte in b {
                out.push_str(&format!("{:02x}", byte));
            }
            out.push('\'');
            out
        }
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Call `f` with the byte offset of every `?` outside single-quoted
/// literals, backtick-quoted identifiers and `--` comments.
fn scan(template: &str, mut f: impl FnMut(usize)) {
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'?' => f(i),
            _ => {}
        }
        i += 1;
    }
}
