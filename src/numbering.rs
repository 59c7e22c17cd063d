//! Sequential document numbers: one tracker row per document type, formatted with a prefix.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DocumentType {
    SalesOrder,
    PurchaseOrder,
}

impl DocumentType {
    /// Tracker key stored in `order_number_trackers.document_type`.
    pub fn key(self) -> &'static str {
        match self {
            DocumentType::SalesOrder => "SalesOrder",
            DocumentType::PurchaseOrder => "PurchaseOrder",
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            DocumentType::SalesOrder => "SO-",
            DocumentType::PurchaseOrder => "PO-",
        }
    }

    /// Last used number of a tracker that has never allocated.
    pub fn seed(self) -> i64 {
        match self {
            DocumentType::SalesOrder => 1_000_000,
            DocumentType::PurchaseOrder => 2_000_000,
        }
    }

    /// Number handed out by a tracker created on first use.
    pub fn first_number(self) -> i64 {
        self.seed() + 1
    }

    pub fn format(self, number: i64) -> String {
        format!("{}{}", self.prefix(), number)
    }
}

/// Next value for an in-memory tracker; `None` means not yet created.
pub fn next_number(doc: DocumentType, last_used: Option<i64>) -> i64 {
    match last_used {
        Some(n) => n + 1,
        None => doc.first_number(),
    }
}
