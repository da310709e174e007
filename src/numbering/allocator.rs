use super::{period_bounds, sequence_of};
use crate::documents::DocumentKind;
use crate::executor::QueryExecutor;
use crate::core::Value;
use crate::store::Connector;

/// A proposed document number: presentation label plus sequence integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextNumber {
    pub label: String,
    pub sequence: i64,
}

/// Computes the next sequence integer for a document family within a
/// calendar-year period.
///
/// The value is derived on every call by scanning the issued numbers of the
/// period and taking `max + 1`; it is never cached, since a cached value
/// would go stale the moment another writer allocates. Two concurrent
/// allocations can still pick the same value; that race is settled at commit
/// time by the conflict resolver.
pub struct SequenceAllocator<'a, C: Connector> {
    executor: &'a QueryExecutor<C>,
}

impl<'a, C: Connector> SequenceAllocator<'a, C> {
    pub fn new(executor: &'a QueryExecutor<C>) -> Self {
        Self { executor }
    }

    /// Next free sequence for `kind` in `year`; `1` for an empty period.
    pub async fn next_in_period(&self, kind: DocumentKind, year: i32) -> NextNumber {
        let (start, end) = period_bounds(year);
        let sql = format!(
            "SELECT number FROM {} WHERE date >= ? AND date <= ?",
            kind.table()
        );
        let rows = self
            .executor
            .query(&sql, &[Value::from(start), Value::from(end)])
            .await;

        let column = rows.column_index("number").unwrap_or(0);
        let max = rows
            .rows
            .iter()
            .filter_map(|row| row.get(column))
            .filter_map(|value| value.as_str())
            .filter_map(|number| sequence_of(kind, number))
            .max()
            .unwrap_or(0);

        NextNumber {
            label: kind.default_label().to_string(),
            sequence: max + 1,
        }
    }
}
