use super::connection::OdbcConnection;
use super::statement::Statement;
use crate::error::Result;
use crate::native::ColumnDescription;

/// One fetched row; each cell is its text form, `None` for SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    values: Vec<Option<String>>,
}

impl Row {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Cell `index` (0-based); `None` if NULL or out of range.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(Option::as_deref)
    }

    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Option<String>> {
        self.values
    }
}

/// Forward-only cursor over a statement's result set.
///
/// Owns the statement handle and releases it once the rows are exhausted,
/// on [`ResultCursor::close`], or when dropped.
pub struct ResultCursor<'c> {
    conn: &'c OdbcConnection,
    stmt: Option<Statement>,
    columns: Vec<ColumnDescription>,
}

impl<'c> ResultCursor<'c> {
    pub(crate) fn new(
        conn: &'c OdbcConnection,
        stmt: Statement,
        columns: Vec<ColumnDescription>,
    ) -> Self {
        Self {
            conn,
            stmt: Some(stmt),
            columns,
        }
    }

    pub fn columns(&self) -> &[ColumnDescription] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.stmt.is_none()
    }

    pub fn next_row(&mut self) -> Result<Option<Row>> {
        let conn = self.conn;
        if self.stmt.is_none() {
            return Ok(None);
        }
        if let Err(e) = conn.usable_handle("SQLFetch") {
            if let Some(stmt) = self.stmt.take() {
                stmt.discard();
            }
            return Err(e);
        }
        let Some(stmt) = self.stmt.as_ref() else {
            return Ok(None);
        };
        // Statements without a result set (DDL, DML) have nothing to fetch.
        if self.columns.is_empty() {
            self.close_statement()?;
            return Ok(None);
        }

        if !stmt.fetch().map_err(|e| conn.track(e))? {
            self.close_statement()?;
            return Ok(None);
        }

        let mut values = Vec::with_capacity(self.columns.len());
        for column in 1..=self.columns.len() {
            let value = stmt
                .read_text(column as u16)
                .map_err(|e| conn.track(e))?;
            values.push(value);
        }
        Ok(Some(Row { values }))
    }

    /// Releases the statement handle now instead of at exhaustion or drop.
    pub fn close(mut self) -> Result<()> {
        self.close_statement()
    }

    fn close_statement(&mut self) -> Result<()> {
        match self.stmt.take() {
            Some(stmt) => stmt.release(),
            None => Ok(()),
        }
    }
}

impl Iterator for ResultCursor<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_accessors() {
        let row = Row {
            values: vec![Some("orders".to_string()), None],
        };
        assert_eq!(row.len(), 2);
        assert!(!row.is_empty());
        assert_eq!(row.get(0), Some("orders"));
        assert_eq!(row.get(1), None);
        assert_eq!(row.get(5), None);
        assert_eq!(row.into_values(), vec![Some("orders".to_string()), None]);
    }
}
