//! Order aggregate shared by sales and purchase orders: header, line items and attachments.

use crate::numbering::DocumentType;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OrderKind {
    Sales,
    Purchase,
}

/// Table names for one order kind.
#[derive(Clone, Copy, Debug)]
pub struct OrderTables {
    pub header: &'static str,
    pub items: &'static str,
    pub attachments: &'static str,
}

/// Form field and query parameter names for one order kind.
#[derive(Clone, Copy, Debug)]
pub struct OrderFields {
    pub order_no: &'static str,
    pub party_code: &'static str,
    pub party_name: &'static str,
    pub document_date: &'static str,
    pub reference_number: &'static str,
    pub remarks: &'static str,
    pub items_json: &'static str,
    /// Alternate spelling accepted for the items field.
    pub items: &'static str,
}

const SALES_FIELDS: OrderFields = OrderFields {
    order_no: "salesOrderNo",
    party_code: "customerCode",
    party_name: "customerName",
    document_date: "soDate",
    reference_number: "customerRefNumber",
    remarks: "salesRemarks",
    items_json: "salesItemsJson",
    items: "salesItems",
};

const PURCHASE_FIELDS: OrderFields = OrderFields {
    order_no: "purchaseOrderNo",
    party_code: "vendorCode",
    party_name: "vendorName",
    document_date: "poDate",
    reference_number: "vendorRefNumber",
    remarks: "purchaseRemarks",
    items_json: "purchaseItemsJson",
    items: "purchaseItems",
};

impl OrderKind {
    pub fn document(self) -> DocumentType {
        match self {
            OrderKind::Sales => DocumentType::SalesOrder,
            OrderKind::Purchase => DocumentType::PurchaseOrder,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OrderKind::Sales => "Sales Order",
            OrderKind::Purchase => "Purchase Order",
        }
    }

    pub fn tables(self) -> OrderTables {
        match self {
            OrderKind::Sales => OrderTables {
                header: "sales_orders",
                items: "sales_order_items",
                attachments: "sales_order_attachments",
            },
            OrderKind::Purchase => OrderTables {
                header: "purchase_orders",
                items: "purchase_order_items",
                attachments: "purchase_order_attachments",
            },
        }
    }

    pub fn fields(self) -> &'static OrderFields {
        match self {
            OrderKind::Sales => &SALES_FIELDS,
            OrderKind::Purchase => &PURCHASE_FIELDS,
        }
    }

    /// Directory under the uploads root.
    pub fn upload_folder(self) -> &'static str {
        match self {
            OrderKind::Sales => "sales_orders",
            OrderKind::Purchase => "purchase_orders",
        }
    }

    pub fn route_base(self) -> &'static str {
        match self {
            OrderKind::Sales => "/api/SalesOrders",
            OrderKind::Purchase => "/api/PurchaseOrders",
        }
    }

    /// Only sales orders carry an optimistic-concurrency token.
    pub fn checks_version(self) -> bool {
        matches!(self, OrderKind::Sales)
    }

    /// Sales order headers merge submitted fields; purchase order headers are replaced.
    pub fn merges_header(self) -> bool {
        matches!(self, OrderKind::Sales)
    }

    pub fn download_url(self, attachment_id: Uuid) -> String {
        format!("{}/attachment/{}", self.route_base(), attachment_id)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderHeader {
    /// Linked customer (sales only).
    pub party_id: Option<i64>,
    pub party_code: Option<String>,
    /// Snapshot of the party's name at the time of writing.
    pub party_name: Option<String>,
    pub document_date: Option<DateTime<Utc>>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub reference_number: Option<String>,
    pub ship_to_address: Option<String>,
    pub remarks: Option<String>,
    pub sales_employee: Option<String>,
    pub document_details: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LineItem {
    pub id: Uuid,
    pub product_code: Option<String>,
    pub product_name: Option<String>,
    pub quantity: Decimal,
    pub uom: Option<String>,
    pub price: Decimal,
    pub warehouse_location: Option<String>,
    pub tax_code: Option<String>,
    pub tax_price: Decimal,
    /// Quantity * Price + TaxPrice as sent by the client; not recomputed.
    pub total: Decimal,
}

/// One element of the items JSON carried in the order form.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineItemInput {
    pub product_code: Option<String>,
    pub product_name: Option<String>,
    pub quantity: Decimal,
    pub uom: Option<String>,
    pub price: Decimal,
    pub warehouse_location: Option<String>,
    pub tax_code: Option<String>,
    pub tax_price: Decimal,
    pub total: Decimal,
}

impl LineItemInput {
    /// JSON keys accepted, matched loosely.
    pub const KEYS: &'static [&'static str] = &[
        "productCode",
        "productName",
        "quantity",
        "uom",
        "price",
        "warehouseLocation",
        "taxCode",
        "taxPrice",
        "total",
    ];

    pub fn into_item(self) -> LineItem {
        LineItem {
            id: Uuid::new_v4(),
            product_code: self.product_code,
            product_name: self.product_name,
            quantity: self.quantity,
            uom: self.uom,
            price: self.price,
            warehouse_location: self.warehouse_location,
            tax_code: self.tax_code,
            tax_price: self.tax_price,
            total: self.total,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Attachment {
    pub id: Uuid,
    /// Name the client uploaded.
    pub file_name: String,
    /// Randomized name on disk.
    pub stored_file_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub uploaded_at: DateTime<Utc>,
}

/// An order before its number is allocated.
#[derive(Clone, Debug)]
pub struct OrderDraft {
    pub id: Uuid,
    pub header: OrderHeader,
    pub items: Vec<LineItem>,
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub order_no: String,
    pub header: OrderHeader,
    pub items: Vec<LineItem>,
    pub attachments: Vec<Attachment>,
    pub row_version: i64,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn total(&self) -> Decimal {
        self.items.iter().map(|i| i.total).sum()
    }

    pub fn from_draft(draft: OrderDraft, order_no: String) -> Self {
        Order {
            id: draft.id,
            order_no,
            header: draft.header,
            items: draft.items,
            attachments: draft.attachments,
            row_version: 1,
            created_at: draft.created_at,
            modified_at: Some(draft.created_at),
        }
    }
}

/// Changes persisted by one order update, applied in a single store transaction.
#[derive(Clone, Debug, Default)]
pub struct OrderChanges {
    pub header: OrderHeader,
    /// Replaces every existing item when present.
    pub items: Option<Vec<LineItem>>,
    pub removed_attachments: Vec<Uuid>,
    pub added_attachments: Vec<Attachment>,
    /// Version the caller last saw; `None` skips the check.
    pub expected_version: Option<i64>,
    pub modified_at: DateTime<Utc>,
}

/// Substring filters for order lists (case-insensitive).
#[derive(Clone, Debug, Default)]
pub struct OrderFilter {
    pub order_no: Option<String>,
    pub party_name: Option<String>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        contains_ci(Some(order.order_no.as_str()), self.order_no.as_deref())
            && contains_ci(order.header.party_name.as_deref(), self.party_name.as_deref())
    }
}

fn contains_ci(haystack: Option<&str>, needle: Option<&str>) -> bool {
    match needle {
        None => true,
        Some(n) => haystack
            .map(|h| h.to_lowercase().contains(&n.to_lowercase()))
            .unwrap_or(false),
    }
}

/// Line item as returned by the API.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemView {
    pub id: Uuid,
    pub product_code: Option<String>,
    pub product_name: Option<String>,
    pub quantity: Decimal,
    pub uom: Option<String>,
    pub price: Decimal,
    pub warehouse_location: Option<String>,
    pub tax_code: Option<String>,
    pub tax_price: Decimal,
    pub total: Decimal,
}

impl From<&LineItem> for LineItemView {
    fn from(i: &LineItem) -> Self {
        LineItemView {
            id: i.id,
            product_code: i.product_code.clone(),
            product_name: i.product_name.clone(),
            quantity: i.quantity,
            uom: i.uom.clone(),
            price: i.price,
            warehouse_location: i.warehouse_location.clone(),
            tax_code: i.tax_code.clone(),
            tax_price: i.tax_price,
            total: i.total,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentView {
    pub id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub uploaded_date: DateTime<Utc>,
    pub download_url: String,
}

impl AttachmentView {
    pub fn new(kind: OrderKind, a: &Attachment) -> Self {
        AttachmentView {
            id: a.id,
            file_name: a.file_name.clone(),
            content_type: a.content_type.clone(),
            file_size: a.file_size,
            uploaded_date: a.uploaded_at,
            download_url: kind.download_url(a.id),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesOrderView {
    pub id: Uuid,
    pub sales_order_no: String,
    pub customer_id: Option<i64>,
    pub customer_code: Option<String>,
    pub customer_name: Option<String>,
    #[serde(rename = "soDate")]
    pub so_date: Option<DateTime<Utc>>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub customer_ref_number: Option<String>,
    pub ship_to_address: Option<String>,
    pub sales_remarks: Option<String>,
    pub sales_employee: Option<String>,
    pub document_details: Option<String>,
    pub sales_order_items: Vec<LineItemView>,
    pub attachments: Vec<AttachmentView>,
    pub created_date: DateTime<Utc>,
    pub modified_date: Option<DateTime<Utc>>,
    pub order_total: Decimal,
    pub row_version: i64,
}

impl From<&Order> for SalesOrderView {
    fn from(o: &Order) -> Self {
        let h = &o.header;
        SalesOrderView {
            id: o.id,
            sales_order_no: o.order_no.clone(),
            customer_id: h.party_id,
            customer_code: h.party_code.clone(),
            customer_name: h.party_name.clone(),
            so_date: h.document_date,
            delivery_date: h.delivery_date,
            customer_ref_number: h.reference_number.clone(),
            ship_to_address: h.ship_to_address.clone(),
            sales_remarks: h.remarks.clone(),
            sales_employee: h.sales_employee.clone(),
            document_details: h.document_details.clone(),
            sales_order_items: o.items.iter().map(LineItemView::from).collect(),
            attachments: o
                .attachments
                .iter()
                .map(|a| AttachmentView::new(OrderKind::Sales, a))
                .collect(),
            created_date: o.created_at,
            modified_date: o.modified_at,
            order_total: o.total(),
            row_version: o.row_version,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderView {
    pub id: Uuid,
    pub purchase_order_no: String,
    pub vendor_code: Option<String>,
    pub vendor_name: Option<String>,
    #[serde(rename = "poDate")]
    pub po_date: Option<DateTime<Utc>>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub vendor_ref_number: Option<String>,
    pub ship_to_address: Option<String>,
    pub purchase_remarks: Option<String>,
    pub document_details: Option<String>,
    pub purchase_items: Vec<LineItemView>,
    pub attachments: Vec<AttachmentView>,
    pub created_date: DateTime<Utc>,
    pub modified_date: Option<DateTime<Utc>>,
    pub order_total: Decimal,
}

impl From<&Order> for PurchaseOrderView {
    fn from(o: &Order) -> Self {
        let h = &o.header;
        PurchaseOrderView {
            id: o.id,
            purchase_order_no: o.order_no.clone(),
            vendor_code: h.party_code.clone(),
            vendor_name: h.party_name.clone(),
            po_date: h.document_date,
            delivery_date: h.delivery_date,
            vendor_ref_number: h.reference_number.clone(),
            ship_to_address: h.ship_to_address.clone(),
            purchase_remarks: h.remarks.clone(),
            document_details: h.document_details.clone(),
            purchase_items: o.items.iter().map(LineItemView::from).collect(),
            attachments: o
                .attachments
                .iter()
                .map(|a| AttachmentView::new(OrderKind::Purchase, a))
                .collect(),
            created_date: o.created_at,
            modified_date: o.modified_at,
            order_total: o.total(),
        }
    }
}

/// Row of the purchase order list.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderSummary {
    pub id: Uuid,
    pub purchase_order_no: String,
    pub vendor_code: Option<String>,
    pub vendor_name: Option<String>,
    #[serde(rename = "poDate")]
    pub po_date: Option<DateTime<Utc>>,
    pub purchase_remarks: Option<String>,
    pub order_total: Decimal,
}

impl From<&Order> for PurchaseOrderSummary {
    fn from(o: &Order) -> Self {
        PurchaseOrderSummary {
            id: o.id,
            purchase_order_no: o.order_no.clone(),
            vendor_code: o.header.party_code.clone(),
            vendor_name: o.header.party_name.clone(),
            po_date: o.header.document_date,
            purchase_remarks: o.header.remarks.clone(),
            order_total: o.total(),
        }
    }
}
