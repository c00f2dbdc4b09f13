//! Cursor over synthetic result sets.

use crate::sql::ResultSet;
use fakedb_core::error::QueryErrorKind;
use fakedb_core::{ColumnInfo, Error, Result, Row, Rows, Value};
use std::sync::Arc;

struct CursorSet {
    columns: Arc<ColumnInfo>,
    names: Vec<String>,
    rows: Vec<Vec<Value>>,
    row_error: Option<(usize, Error)>,
}

/// Iterates one or more result sets a row at a time.
///
/// The position starts before the first row. When it reaches the injected
/// error position, `next_row` returns that error once and moves on.
pub struct RowsCursor {
    sets: Vec<CursorSet>,
    current: usize,
    /// Index of the row the next call to `next_row` yields.
    pos: usize,
    closed: bool,
}

impl RowsCursor {
    pub fn new(sets: Vec<ResultSet>) -> Self {
        Self::with_errors(sets.into_iter().map(|set| (set, None)).collect())
    }

    /// Result sets paired with an optional `(position, error)` to inject.
    ///
    /// A position past the last row is clamped to the row count, so the
    /// error fires in place of the end of the set.
    pub fn with_errors(sets: Vec<(ResultSet, Option<(usize, Error)>)>) -> Self {
        let sets = sets
            .into_iter()
            .map(|(set, row_error)| CursorSet {
                columns: Arc::new(ColumnInfo::new(set.columns.clone())),
                row_error: row_error.map(|(pos, err)| (pos.min(set.rows.len()), err)),
                names: set.columns,
                rows: set.rows,
            })
            .collect();
        Self {
            sets,
            current: 0,
            pos: 0,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of result sets.
    pub fn result_sets(&self) -> usize {
        self.sets.len()
    }

    /// Drain the remaining rows of every result set.
    pub fn collect_rows(&mut self) -> Result<Vec<Row>> {
        let mut out = Vec::new();
        loop {
            while let Some(row) = self.next_row()? {
                out.push(row);
            }
            if !self.next_result_set()? {
                return Ok(out);
            }
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::query(
                QueryErrorKind::Database,
                None,
                "fake_db_driver: rows cursor has been closed",
            ));
        }
        Ok(())
    }
}

impl Rows for RowsCursor {
    fn columns(&self) -> &[String] {
        self.sets
            .get(self.current)
            .map_or(&[][..], |set| set.names.as_slice())
    }

    fn next_row(&mut self) -> Result<Option<Row>> {
        self.ensure_open()?;
        let Some(set) = self.sets.get(self.current) else {
            return Ok(None);
        };
        if self.pos > set.rows.len() {
            return Ok(None);
        }
        let pos = self.pos;
        self.pos += 1;

        if let Some((err_pos, err)) = &set.row_error {
            if *err_pos == pos {
                tracing::trace!(position = pos, "Injected row error");
                return Err(err.clone());
            }
        }
        Ok(set
            .rows
            .get(pos)
            .map(|values| Row::with_columns(Arc::clone(&set.columns), values.clone())))
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn has_next_result_set(&self) -> bool {
        !self.closed && self.current + 1 < self.sets.len()
    }

    fn next_result_set(&mut self) -> Result<bool> {
        self.ensure_open()?;
        if self.current + 1 >= self.sets.len() {
            return Ok(false);
        }
        self.current += 1;
        self.pos = 0;
        Ok(true)
    }
}

impl std::fmt::Debug for RowsCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowsCursor")
            .field("result_sets", &self.sets.len())
            .field("current", &self.current)
            .field("pos", &self.pos)
            .field("closed", &self.closed)
            .finish()
    }
}
