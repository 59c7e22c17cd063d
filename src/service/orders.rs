//! Order workflows: create with number allocation, merge or overwrite updates, delete, attachment download.
//! File writes are not transactional with the store; files written for a failed save are removed again.

use super::validation::{integer_digits, max_length, MONEY_INTEGER_DIGITS, QUANTITY_INTEGER_DIGITS};
use crate::attachments::AttachmentStore;
use crate::error::{AppError, FieldErrors};
use crate::extractors::{ItemsField, OrderForm};
use crate::model::{
    row_id, Attachment, LineItem, LineItemInput, Order, OrderChanges, OrderDraft, OrderFilter, OrderHeader,
    OrderKind, CUSTOMER,
};
use crate::store::Store;
use chrono::Utc;
use uuid::Uuid;

/// Form fields shared by both order kinds.
const DELIVERY_DATE: &str = "deliveryDate";
const SHIP_TO_ADDRESS: &str = "shipToAddress";
const SALES_EMPLOYEE: &str = "salesEmployee";
const DOCUMENT_DETAILS: &str = "documentDetails";
const ROW_VERSION: &str = "rowVersion";

pub struct OrderService<'a> {
    store: &'a dyn Store,
    files: &'a AttachmentStore,
}

impl<'a> OrderService<'a> {
    pub fn new(store: &'a dyn Store, files: &'a AttachmentStore) -> Self {
        OrderService { store, files }
    }

    pub async fn list(&self, kind: OrderKind, filter: &OrderFilter) -> Result<Vec<Order>, AppError> {
        self.store.list_orders(kind, filter).await
    }

    pub async fn get(&self, kind: OrderKind, id: Uuid) -> Result<Order, AppError> {
        self.store
            .get_order(kind, id)
            .await?
            .ok_or_else(|| not_found(kind, id))
    }

    pub async fn create(&self, kind: OrderKind, form: OrderForm) -> Result<Order, AppError> {
        let fields = kind.fields();
        let inputs = match form.items(fields)? {
            ItemsField::Missing => {
                return Err(AppError::BadRequest(format!("{} is required", fields.items_json)));
            }
            ItemsField::Items(items) if items.is_empty() => {
                return Err(AppError::BadRequest(format!("{} must contain at least one item", fields.items_json)));
            }
            ItemsField::Items(items) => items,
        };
        let mut header = read_header(kind, &form);
        validate(kind, &header, Some(inputs.as_slice()))?;
        if kind == OrderKind::Sales {
            self.link_customer(&mut header).await?;
        }

        let attachments = self.store_uploads(kind, form.uploads).await?;
        let draft = OrderDraft {
            id: Uuid::new_v4(),
            header,
            items: inputs.into_iter().map(LineItemInput::into_item).collect(),
            attachments,
            created_at: Utc::now(),
        };
        let written = draft.attachments.clone();
        match self.store.create_order(kind, draft).await {
            Ok(order) => {
                tracing::info!(kind = kind.label(), order_no = %order.order_no, id = %order.id, items = order.items.len(), "order created");
                Ok(order)
            }
            Err(e) => {
                self.files.remove_all(kind, &written).await;
                Err(e)
            }
        }
    }

    pub async fn update(&self, kind: OrderKind, id: Uuid, form: OrderForm) -> Result<Order, AppError> {
        let existing = self.get(kind, id).await?;
        let submitted = read_header(kind, &form);
        let items = match form.items(kind.fields())? {
            ItemsField::Missing => None,
            ItemsField::Items(items) => Some(items),
        };
        validate(kind, &submitted, items.as_deref())?;

        let code_supplied = submitted.party_code.is_some();
        let mut header = if kind.merges_header() {
            merge_header(&existing.header, submitted)
        } else {
            submitted
        };
        if kind == OrderKind::Sales {
            if code_supplied {
                self.link_customer(&mut header).await?;
            } else {
                header.party_id = existing.header.party_id;
            }
        }

        let expected_version = if kind.checks_version() {
            Some(form.integer(ROW_VERSION)?.unwrap_or(existing.row_version))
        } else {
            None
        };
        let requested = form.attachment_ids_to_delete();
        let removed: Vec<Attachment> = existing
            .attachments
            .iter()
            .filter(|a| requested.contains(&a.id))
            .cloned()
            .collect();
        if removed.len() < requested.len() {
            tracing::debug!(%id, requested = requested.len(), matched = removed.len(), "ignoring attachment ids not on this order");
        }

        let added = self.store_uploads(kind, form.uploads).await?;
        let changes = OrderChanges {
            header,
            items: items.map(|v| v.into_iter().map(LineItemInput::into_item).collect::<Vec<LineItem>>()),
            removed_attachments: removed.iter().map(|a| a.id).collect(),
            added_attachments: added.clone(),
            expected_version,
            modified_at: Utc::now(),
        };
        match self.store.save_order(kind, id, changes).await {
            Ok(order) => {
                self.files.remove_all(kind, &removed).await;
                tracing::info!(kind = kind.label(), order_no = %order.order_no, %id, version = order.row_version, "order updated");
                Ok(order)
            }
            Err(e) => {
                self.files.remove_all(kind, &added).await;
                Err(e)
            }
        }
    }

    pub async fn delete(&self, kind: OrderKind, id: Uuid) -> Result<(), AppError> {
        let order = self.get(kind, id).await?;
        self.files.remove_all(kind, &order.attachments).await;
        if !self.store.delete_order(kind, id).await? {
            return Err(not_found(kind, id));
        }
        tracing::info!(kind = kind.label(), order_no = %order.order_no, %id, "order deleted");
        Ok(())
    }

    /// Attachment metadata and file contents; `NotFound` when either is missing.
    pub async fn download(&self, kind: OrderKind, attachment_id: Uuid) -> Result<(Attachment, Vec<u8>), AppError> {
        let attachment = self
            .store
            .find_attachment(kind, attachment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("attachment {}", attachment_id)))?;
        match self.files.read(kind, &attachment.stored_file_name).await? {
            Some(bytes) => Ok((attachment, bytes)),
            None => {
                tracing::warn!(id = %attachment_id, stored = %attachment.stored_file_name, "attachment file missing on disk");
                Err(AppError::NotFound(format!("file for attachment {}", attachment_id)))
            }
        }
    }

    /// Link a sales order to the customer with its code; snapshot the name when none was given.
    async fn link_customer(&self, header: &mut OrderHeader) -> Result<(), AppError> {
        let Some(code) = header.party_code.as_deref() else {
            header.party_id = None;
            return Ok(());
        };
        let customer = self.store.find_by_ci(&CUSTOMER, "code", code, None).await?;
        header.party_id = customer.as_ref().and_then(row_id);
        if header.party_name.is_none() {
            header.party_name = customer
                .as_ref()
                .and_then(|c| c.get("name"))
                .and_then(|v| v.as_str())
                .map(String::from);
        }
        Ok(())
    }

    /// Write every upload; on failure remove the ones already written.
    async fn store_uploads(
        &self,
        kind: OrderKind,
        uploads: Vec<crate::attachments::Upload>,
    ) -> Result<Vec<Attachment>, AppError> {
        let mut saved = Vec::with_capacity(uploads.len());
        for upload in uploads {
            match self.files.save(kind, upload).await {
                Ok(a) => saved.push(a),
                Err(e) => {
                    self.files.remove_all(kind, &saved).await;
                    return Err(e);
                }
            }
        }
        Ok(saved)
    }
}

fn not_found(kind: OrderKind, id: Uuid) -> AppError {
    AppError::NotFound(format!("{} with id {}", kind.label(), id))
}

/// Header as submitted. Client-supplied order numbers are never read.
fn read_header(kind: OrderKind, form: &OrderForm) -> OrderHeader {
    let f = kind.fields();
    OrderHeader {
        party_id: None,
        party_code: form.text(f.party_code),
        party_name: form.text(f.party_name),
        document_date: form.date(f.document_date),
        delivery_date: form.date(DELIVERY_DATE),
        reference_number: form.text(f.reference_number),
        ship_to_address: form.text(SHIP_TO_ADDRESS),
        remarks: form.text(f.remarks),
        sales_employee: match kind {
            OrderKind::Sales => form.text(SALES_EMPLOYEE),
            OrderKind::Purchase => None,
        },
        document_details: form.text(DOCUMENT_DETAILS),
    }
}

/// Submitted values win; absent ones keep the stored value.
fn merge_header(existing: &OrderHeader, submitted: OrderHeader) -> OrderHeader {
    OrderHeader {
        party_id: existing.party_id,
        party_code: submitted.party_code.or_else(|| existing.party_code.clone()),
        party_name: submitted.party_name.or_else(|| existing.party_name.clone()),
        document_date: submitted.document_date.or(existing.document_date),
        delivery_date: submitted.delivery_date.or(existing.delivery_date),
        reference_number: submitted.reference_number.or_else(|| existing.reference_number.clone()),
        ship_to_address: submitted.ship_to_address.or_else(|| existing.ship_to_address.clone()),
        remarks: submitted.remarks.or_else(|| existing.remarks.clone()),
        sales_employee: submitted.sales_employee.or_else(|| existing.sales_employee.clone()),
        document_details: submitted.document_details.or_else(|| existing.document_details.clone()),
    }
}

fn validate(kind: OrderKind, header: &OrderHeader, items: Option<&[LineItemInput]>) -> Result<(), AppError> {
    let f = kind.fields();
    let mut errors = FieldErrors::new();
    max_length(&mut errors, f.party_code, header.party_code.as_deref(), 100);
    max_length(&mut errors, f.party_name, header.party_name.as_deref(), 255);
    max_length(&mut errors, f.reference_number, header.reference_number.as_deref(), 100);
    max_length(&mut errors, SHIP_TO_ADDRESS, header.ship_to_address.as_deref(), 500);
    max_length(&mut errors, f.remarks, header.remarks.as_deref(), 1000);
    max_length(&mut errors, SALES_EMPLOYEE, header.sales_employee.as_deref(), 100);
    max_length(&mut errors, DOCUMENT_DETAILS, header.document_details.as_deref(), 500);
    for (i, item) in items.unwrap_or_default().iter().enumerate() {
        let field = |name: &str| format!("{}[{}].{}", f.items_json, i, name);
        max_length(&mut errors, &field("productCode"), item.product_code.as_deref(), 50);
        max_length(&mut errors, &field("productName"), item.product_name.as_deref(), 255);
        max_length(&mut errors, &field("uom"), item.uom.as_deref(), 20);
        max_length(&mut errors, &field("warehouseLocation"), item.warehouse_location.as_deref(), 100);
        max_length(&mut errors, &field("taxCode"), item.tax_code.as_deref(), 50);
        integer_digits(&mut errors, &field("quantity"), item.quantity, QUANTITY_INTEGER_DIGITS);
        integer_digits(&mut errors, &field("price"), item.price, MONEY_INTEGER_DIGITS);
        integer_digits(&mut errors, &field("taxPrice"), item.tax_price, MONEY_INTEGER_DIGITS);
        integer_digits(&mut errors, &field("total"), item.total, MONEY_INTEGER_DIGITS);
    }
    errors.into_result()
}
