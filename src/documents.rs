use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Document family. Families differ in table, number format and conflict
/// policy: invoices renumber on collision, offers reject the save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Invoice,
    Offer,
}

impl DocumentKind {
    pub fn table(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoices",
            DocumentKind::Offer => "offers",
        }
    }

    /// Label presented with a freshly allocated sequence number.
    pub fn default_label(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "FATURA NR.",
            DocumentKind::Offer => "OFERTA",
        }
    }
}

/// An invoice or offer as seen by the persistence layer.
///
/// `number` carries the human-readable document number
/// (`"<LABEL> NR.<int>[/<suffix>]"` for invoices, `"<PREFIX>-<year>-<seq>"`
/// for offers). The numbering period is the calendar year of `date`.
/// `saved_at` is supplied by the writer and is used only as the conflict
/// tiebreak.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Option<i64>,
    pub kind: DocumentKind,
    pub number: String,
    pub date: NaiveDate,
    pub saved_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn new(kind: DocumentKind, number: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: None,
            kind,
            number: number.into(),
            date,
            saved_at: None,
        }
    }

    pub fn saved_at(mut self, at: DateTime<Utc>) -> Self {
        self.saved_at = Some(at);
        self
    }

    /// Numbering period of this document.
    pub fn year(&self) -> i32 {
        self.date.year()
    }
}
