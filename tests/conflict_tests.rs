//! ConflictResolver: earliest-save-wins for invoices, hard reject for offers.

mod common;

use chrono::{NaiveDate, TimeZone, Utc};
use common::connected_client;
use faturadb::{DbError, Document, DocumentKind, Value};

fn date(text: &str) -> NaiveDate {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").unwrap()
}

fn invoice(number: &str, day: &str) -> Document {
    Document::new(DocumentKind::Invoice, number, date(day))
}

fn offer(number: &str, day: &str) -> Document {
    Document::new(DocumentKind::Offer, number, date(day))
}

#[tokio::test]
async fn save_without_collision_inserts_and_assigns_id() {
    let (client, _connector) = connected_client().await;

    let saved = client
        .resolve_and_save(
            invoice("FATURA NR.1", "2026-01-10")
                .saved_at(Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap()),
        )
        .await
        .unwrap();

    assert_eq!(saved.id, Some(1));
    assert_eq!(saved.number, "FATURA NR.1");
}

#[tokio::test]
async fn later_saved_incoming_invoice_is_renumbered() {
    let (client, _connector) = connected_client().await;

    let first = client
        .resolve_and_save(
            invoice("FATURA NR.1", "2026-01-10")
                .saved_at(Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap()),
        )
        .await
        .unwrap();

    let second = client
        .resolve_and_save(
            invoice("FATURA NR.1", "2026-01-10")
                .saved_at(Utc.with_ymd_and_hms(2026, 1, 10, 9, 5, 0).unwrap()),
        )
        .await
        .unwrap();

    assert_eq!(second.number, "FATURA NR.2");

    // The earlier save keeps its original number.
    let rows = client
        .query(
            "SELECT number FROM invoices WHERE id = ?",
            &[Value::from(first.id)],
        )
        .await;
    assert_eq!(rows.get(0, "number").as_str(), Some("FATURA NR.1"));
}

#[tokio::test]
async fn earlier_saved_incoming_invoice_displaces_the_stored_one() {
    let (client, _connector) = connected_client().await;

    let stored = client
        .resolve_and_save(
            invoice("FATURA NR.1", "2026-01-10")
                .saved_at(Utc.with_ymd_and_hms(2026, 1, 10, 10, 0, 0).unwrap()),
        )
        .await
        .unwrap();
    // Simulate the cached rendering produced after the first save.
    client
        .executor()
        .write(
            "UPDATE invoices SET pdf_path = ? WHERE id = ?",
            &[Value::from("/cache/fatura-1.pdf"), Value::from(stored.id)],
        )
        .await;

    let incoming = client
        .resolve_and_save(
            invoice("FATURA NR.1", "2026-01-10")
                .saved_at(Utc.with_ymd_and_hms(2026, 1, 10, 8, 0, 0).unwrap()),
        )
        .await
        .unwrap();

    // The incoming document kept the contested number.
    assert_eq!(incoming.number, "FATURA NR.1");

    // The stored row was renumbered in place and its rendering invalidated.
    let rows = client
        .query(
            "SELECT number, pdf_path FROM invoices WHERE id = ?",
            &[Value::from(stored.id)],
        )
        .await;
    assert_eq!(rows.get(0, "number").as_str(), Some("FATURA NR.2"));
    assert!(rows.get(0, "pdf_path").is_null());
}

#[tokio::test]
async fn renumbering_preserves_the_number_suffix() {
    let (client, _connector) = connected_client().await;

    client
        .resolve_and_save(
            invoice("FATURA NR.1/A", "2026-01-10")
                .saved_at(Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap()),
        )
        .await
        .unwrap();

    let second = client
        .resolve_and_save(
            invoice("FATURA NR.1/A", "2026-01-10")
                .saved_at(Utc.with_ymd_and_hms(2026, 1, 10, 9, 5, 0).unwrap()),
        )
        .await
        .unwrap();

    assert_eq!(second.number, "FATURA NR.2/A");
}

#[tokio::test]
async fn equal_timestamps_resolve_against_the_incoming_document() {
    let (client, _connector) = connected_client().await;
    let at = Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap();

    client
        .resolve_and_save(invoice("FATURA NR.1", "2026-01-10").saved_at(at))
        .await
        .unwrap();
    let second = client
        .resolve_and_save(invoice("FATURA NR.1", "2026-01-10").saved_at(at))
        .await
        .unwrap();

    assert_eq!(second.number, "FATURA NR.2");
}

#[tokio::test]
async fn missing_timestamps_resolve_against_the_incoming_document() {
    let (client, _connector) = connected_client().await;

    client
        .resolve_and_save(invoice("FATURA NR.1", "2026-01-10"))
        .await
        .unwrap();
    let second = client
        .resolve_and_save(invoice("FATURA NR.1", "2026-01-10"))
        .await
        .unwrap();

    assert_eq!(second.number, "FATURA NR.2");
}

#[tokio::test]
async fn same_number_in_a_different_year_is_not_a_collision() {
    let (client, _connector) = connected_client().await;

    client
        .resolve_and_save(invoice("FATURA NR.1", "2025-06-01"))
        .await
        .unwrap();
    let saved = client
        .resolve_and_save(invoice("FATURA NR.1", "2026-01-10"))
        .await
        .unwrap();

    assert_eq!(saved.number, "FATURA NR.1");
}

#[tokio::test]
async fn offer_collision_is_rejected_outright() {
    let (client, _connector) = connected_client().await;

    client
        .resolve_and_save(offer("OF-2026-1", "2026-03-01"))
        .await
        .unwrap();

    let err = client
        .resolve_and_save(offer("OF-2026-1", "2026-04-01"))
        .await
        .unwrap_err();

    match err {
        DbError::NumberTaken { number, year } => {
            assert_eq!(number, "OF-2026-1");
            assert_eq!(year, 2026);
        }
        other => panic!("expected NumberTaken, got: {other}"),
    }

    // Nothing was renumbered or inserted.
    let rows = client.query("SELECT number FROM offers", &[]).await;
    assert_eq!(rows.row_count(), 1);
}

#[tokio::test]
async fn end_to_end_invoice_numbering_scenario() {
    let (client, _connector) = connected_client().await;

    // Empty period: first number is 1.
    let next = client
        .allocate_next_number(DocumentKind::Invoice, 2026)
        .await;
    assert_eq!(next.label, "FATURA NR.");
    assert_eq!(next.sequence, 1);

    // First invoice takes it.
    let first = client
        .resolve_and_save(
            invoice("FATURA NR.1", "2026-01-10")
                .saved_at(Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap()),
        )
        .await
        .unwrap();
    let next = client
        .allocate_next_number(DocumentKind::Invoice, 2026)
        .await;
    assert_eq!(next.sequence, 2);

    // A concurrent writer that allocated the same number but saved later is
    // renumbered; the original keeps NR.1.
    let racer = client
        .resolve_and_save(
            invoice("FATURA NR.1", "2026-01-10")
                .saved_at(Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 1).unwrap()),
        )
        .await
        .unwrap();
    assert_eq!(racer.number, "FATURA NR.2");

    let rows = client
        .query(
            "SELECT number FROM invoices WHERE id = ?",
            &[Value::from(first.id)],
        )
        .await;
    assert_eq!(rows.get(0, "number").as_str(), Some("FATURA NR.1"));
}
