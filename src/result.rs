use crate::core::{Row, Value};

#[derive(Debug, Clone)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a named column, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value of `column` in `row`, or `Value::Null` when either is missing.
    pub fn get(&self, row: usize, column: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.column_index(column)
            .and_then(|idx| self.rows.get(row).and_then(|r| r.get(idx)))
            .unwrap_or(&NULL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_column_name() {
        let result = QueryResult::new(
            vec!["id".into(), "number".into()],
            vec![vec![Value::Integer(7), Value::Text("FATURA NR.7".into())]],
        );

        assert_eq!(result.row_count(), 1);
        assert_eq!(result.get(0, "id").as_i64(), Some(7));
        assert_eq!(result.get(0, "number").as_str(), Some("FATURA NR.7"));
        assert!(result.get(0, "missing").is_null());
        assert!(result.get(9, "id").is_null());
    }
}
