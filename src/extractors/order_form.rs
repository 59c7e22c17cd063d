//! Multipart order form: text fields matched loosely by name, file parts collected as uploads.

use crate::attachments::Upload;
use crate::case::canonicalize_keys;
use crate::error::AppError;
use crate::model::{LineItemInput, OrderFields};
use async_trait::async_trait;
use axum::extract::{FromRequest, Multipart, Request};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Part names that carry uploaded files.
const UPLOAD_FIELDS: &[&str] = &["uploadedfiles", "files"];
const FILES_TO_DELETE: &str = "filestodelete";
const FILES_TO_DELETE_JSON: &str = "filestodeletejson";

/// Field key with case and underscores ignored.
fn key(name: &str) -> String {
    name.chars().filter(|c| *c != '_').flat_map(char::to_lowercase).collect()
}

#[derive(Debug, Default)]
pub struct OrderForm {
    fields: HashMap<String, String>,
    pub uploads: Vec<Upload>,
    files_to_delete: Vec<String>,
}

/// Outcome of reading the items field.
#[derive(Debug)]
pub enum ItemsField {
    Missing,
    Items(Vec<LineItemInput>),
}

impl OrderForm {
    /// Record one text part. Later parts with the same name win, except the repeatable delete list.
    pub fn insert_text(&mut self, name: &str, value: String) {
        let k = key(name);
        if k == FILES_TO_DELETE || k == FILES_TO_DELETE_JSON {
            let trimmed = value.trim();
            if trimmed.starts_with('[') {
                if let Ok(ids) = serde_json::from_str::<Vec<String>>(trimmed) {
                    self.files_to_delete.extend(ids);
                    return;
                }
            }
            self.files_to_delete
                .extend(trimmed.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from));
            return;
        }
        self.fields.insert(k, value);
    }

    /// Raw value of a field, if the client sent it.
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.fields.get(&key(name)).map(String::as_str)
    }

    /// Whether the client sent the field at all.
    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(&key(name))
    }

    /// Trimmed value; blank is `None`.
    pub fn text(&self, name: &str) -> Option<String> {
        self.raw(name).map(str::trim).filter(|s| !s.is_empty()).map(String::from)
    }

    /// Lenient date; unparseable values are treated as absent.
    pub fn date(&self, name: &str) -> Option<DateTime<Utc>> {
        self.raw(name).and_then(parse_date)
    }

    /// Integer field; absent or blank is `None`, anything else must parse.
    pub fn integer(&self, name: &str) -> Result<Option<i64>, AppError> {
        let Some(raw) = self.raw(name).map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        raw.parse()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("{} must be an integer, got '{}'", name, raw)))
    }

    /// Attachment ids requested for deletion. Malformed ids are skipped.
    pub fn attachment_ids_to_delete(&self) -> Vec<Uuid> {
        self.files_to_delete.iter().filter_map(|s| Uuid::parse_str(s.trim()).ok()).collect()
    }

    /// Parse the items JSON field of an order kind.
    pub fn items(&self, fields: &OrderFields) -> Result<ItemsField, AppError> {
        let raw = match self.raw(fields.items_json).or_else(|| self.raw(fields.items)) {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => return Ok(ItemsField::Missing),
        };
        let parsed: Value = serde_json::from_str(raw)
            .map_err(|e| AppError::BadRequest(format!("{} is not valid JSON: {}", fields.items_json, e)))?;
        let Value::Array(elements) = parsed else {
            return Err(AppError::BadRequest(format!("{} must be a JSON array", fields.items_json)));
        };
        let mut items = Vec::with_capacity(elements.len());
        for (i, element) in elements.into_iter().enumerate() {
            let Value::Object(mut obj) = element else {
                return Err(AppError::BadRequest(format!("{}[{}] must be an object", fields.items_json, i)));
            };
            canonicalize_keys(&mut obj, LineItemInput::KEYS);
            obj.retain(|_, v| !v.is_null());
            let item: LineItemInput = serde_json::from_value(Value::Object(obj))
                .map_err(|e| AppError::BadRequest(format!("{}[{}]: {}", fields.items_json, i, e)))?;
            items.push(item);
        }
        Ok(ItemsField::Items(items))
    }
}

/// RFC 3339, naive date-time (read as UTC) or plain date.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(n) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(n.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}

fn bad_multipart(e: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(format!("invalid multipart body: {}", e))
}

#[async_trait]
impl<S> FromRequest<S> for OrderForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        let mut form = OrderForm::default();
        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let name = field.name().unwrap_or("").to_string();
            let file_name = field.file_name().map(str::to_string);
            if UPLOAD_FIELDS.contains(&key(&name).as_str()) || file_name.is_some() {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                match file_name.filter(|f| !f.trim().is_empty()) {
                    Some(file_name) if !bytes.is_empty() => {
                        form.uploads.push(Upload { file_name, content_type, bytes })
                    }
                    _ => tracing::debug!(field = %name, "skipping empty file part"),
                }
                continue;
            }
            let value = field.text().await.map_err(bad_multipart)?;
            form.insert_text(&name, value);
        }
        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OrderKind;
    use chrono::{Datelike, Timelike};

    fn form(pairs: &[(&str, &str)]) -> OrderForm {
        let mut f = OrderForm::default();
        for (k, v) in pairs {
            f.insert_text(k, v.to_string());
        }
        f
    }

    #[test]
    fn field_names_match_loosely() {
        let f = form(&[("CustomerCode", " C1 "), ("customer_name", "Acme"), ("SODate", "2024-03-05")]);
        let fields = OrderKind::Sales.fields();
        assert_eq!(f.text(fields.party_code).as_deref(), Some("C1"));
        assert_eq!(f.text(fields.party_name).as_deref(), Some("Acme"));
        let d = f.date(fields.document_date).unwrap();
        assert_eq!((d.year(), d.month(), d.day(), d.hour()), (2024, 3, 5, 0));
        assert!(!f.has("salesRemarks"));
    }

    #[test]
    fn dates_parse_leniently() {
        assert!(parse_date("2024-03-05T10:30:00Z").is_some());
        assert!(parse_date("2024-03-05T10:30:00+05:30").is_some());
        assert_eq!(parse_date("2024-03-05T10:30").map(|d| d.minute()), Some(30));
        assert!(parse_date("2024-03-05T10:30:15.250").is_some());
        assert!(parse_date("05/03/2024").is_none());
        assert!(parse_date("").is_none());
    }

    #[test]
    fn items_accept_any_key_case() {
        let f = form(&[(
            "SalesItemsJson",
            r#"[{"ProductCode":"P1","QUANTITY":2,"price":"10.50","tax_price":1,"Total":22,"uom":null}]"#,
        )]);
        let ItemsField::Items(items) = f.items(OrderKind::Sales.fields()).unwrap() else {
            panic!("items expected");
        };
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_code.as_deref(), Some("P1"));
        assert_eq!(items[0].quantity.to_string(), "2");
        assert_eq!(items[0].price.to_string(), "10.50");
        assert_eq!(items[0].uom, None);
    }

    #[test]
    fn items_missing_invalid_or_not_array() {
        let fields = OrderKind::Purchase.fields();
        assert!(matches!(form(&[]).items(fields).unwrap(), ItemsField::Missing));
        assert!(matches!(form(&[("purchaseItemsJson", "  ")]).items(fields).unwrap(), ItemsField::Missing));
        assert!(matches!(form(&[("purchaseItemsJson", "[{")]).items(fields), Err(AppError::BadRequest(_))));
        assert!(matches!(form(&[("purchaseItemsJson", "{}")]).items(fields), Err(AppError::BadRequest(_))));
        assert!(matches!(form(&[("purchaseItemsJson", "[1]")]).items(fields), Err(AppError::BadRequest(_))));
        let ItemsField::Items(empty) = form(&[("purchaseItems", "[]")]).items(fields).unwrap() else {
            panic!("items expected");
        };
        assert!(empty.is_empty());
    }

    #[test]
    fn files_to_delete_repeated_or_json() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let single = a.to_string();
        let json = format!(r#"["{}","not-a-uuid"]"#, b);
        let f = form(&[("filesToDelete", single.as_str()), ("FilesToDeleteJson", json.as_str())]);
        assert_eq!(f.attachment_ids_to_delete(), vec![a, b]);
        assert!(!f.has("filesToDelete"));
    }

    #[test]
    fn integer_rejects_malformed_values() {
        assert_eq!(form(&[("rowVersion", " 3 ")]).integer("rowVersion").unwrap(), Some(3));
        assert_eq!(form(&[("rowVersion", "")]).integer("rowVersion").unwrap(), None);
        assert_eq!(form(&[]).integer("rowVersion").unwrap(), None);
        for bad in ["1.0", " v1", "AAAAAAAAB9E="] {
            assert!(matches!(form(&[("RowVersion", bad)]).integer("rowVersion"), Err(AppError::BadRequest(_))));
        }
    }
}
