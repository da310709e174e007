use super::{period_bounds, renumber, SequenceAllocator};
use crate::core::{DbError, Result, Value};
use crate::documents::{Document, DocumentKind};
use crate::executor::QueryExecutor;
use crate::store::Connector;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Settles number collisions at commit time.
///
/// Two writers that allocated concurrently can both arrive with the same
/// number for the same year. Invoices resolve by earliest-save-wins: the
/// document with the earlier `saved_at` keeps the contested number and the
/// other is renumbered with a fresh allocation. Offers reject the save
/// outright with [`DbError::NumberTaken`] — the one error of this layer that
/// is meant to reach a user.
pub struct ConflictResolver<'a, C: Connector> {
    executor: &'a QueryExecutor<C>,
}

impl<'a, C: Connector> ConflictResolver<'a, C> {
    pub fn new(executor: &'a QueryExecutor<C>) -> Self {
        Self { executor }
    }

    /// Persist `document`, resolving a number collision if one exists.
    pub async fn resolve_and_save(&self, mut document: Document) -> Result<Document> {
        let year = document.year();
        let (start, end) = period_bounds(year);
        let table = document.kind.table();

        let sql = format!(
            "SELECT id, number, saved_at FROM {table} \
             WHERE number = ? AND date >= ? AND date <= ?"
        );
        let existing = self
            .executor
            .query(
                &sql,
                &[
                    Value::from(document.number.clone()),
                    Value::from(start),
                    Value::from(end),
                ],
            )
            .await;

        if existing.is_empty() {
            return self.insert(document).await;
        }

        if document.kind == DocumentKind::Offer {
            return Err(DbError::NumberTaken {
                number: document.number,
                year,
            });
        }

        let existing_id = existing.get(0, "id").as_i64();
        let existing_number = existing
            .get(0, "number")
            .as_str()
            .unwrap_or(&document.number)
            .to_string();
        let existing_saved_at = existing
            .get(0, "saved_at")
            .as_str()
            .and_then(parse_timestamp);

        // Earlier save keeps the number. A stored row without a timestamp was
        // necessarily accepted first in wall-clock server time, so ties and
        // missing timestamps go against the incoming document.
        let incoming_keeps = match (document.saved_at, existing_saved_at) {
            (Some(incoming), Some(existing)) => incoming < existing,
            _ => false,
        };

        let next = SequenceAllocator::new(self.executor)
            .next_in_period(document.kind, year)
            .await;

        if incoming_keeps {
            let reassigned = renumber(document.kind, &existing_number, next.sequence)
                .unwrap_or_else(|| format!("{}{}", next.label, next.sequence));
            debug!(
                number = %existing_number,
                reassigned = %reassigned,
                "stored document loses contested number"
            );
            // Clearing pdf_path invalidates the cached rendering; it is
            // regenerated lazily with the new number.
            let update = format!("UPDATE {table} SET number = ?, pdf_path = ? WHERE id = ?");
            self.executor
                .write(
                    &update,
                    &[
                        Value::from(reassigned),
                        Value::Null,
                        Value::from(existing_id),
                    ],
                )
                .await;
        } else {
            let reassigned = renumber(document.kind, &document.number, next.sequence)
                .unwrap_or_else(|| format!("{}{}", next.label, next.sequence));
            debug!(
                number = %document.number,
                reassigned = %reassigned,
                "incoming document loses contested number"
            );
            document.number = reassigned;
        }

        self.insert(document).await
    }

    async fn insert(&self, mut document: Document) -> Result<Document> {
        let sql = format!(
            "INSERT INTO {} (number, date, saved_at) VALUES (?, ?, ?)",
            document.kind.table()
        );
        let receipt = self
            .executor
            .write(
                &sql,
                &[
                    Value::from(document.number.clone()),
                    Value::from(document.date),
                    Value::from(document.saved_at),
                ],
            )
            .await;
        document.id = receipt.last_insert_id;
        Ok(document)
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
