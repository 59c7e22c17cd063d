//! Sales and purchase order handlers, generic over the document kind.

use crate::case::loose_eq;
use crate::error::AppError;
use crate::extractors::OrderForm;
use crate::model::{Order, OrderFilter, OrderKind, PurchaseOrderSummary, PurchaseOrderView, SalesOrderView};
use crate::response::{created, success_many, success_one_ok};
use crate::service::OrderService;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Binds an order kind to its response shapes.
pub trait OrderDocument: Send + Sync + 'static {
    const KIND: OrderKind;
    /// Full order with items and attachments.
    type View: Serialize + for<'a> From<&'a Order> + Send;
    /// List row.
    type Summary: Serialize + for<'a> From<&'a Order> + Send;
}

pub struct SalesOrders;

impl OrderDocument for SalesOrders {
    const KIND: OrderKind = OrderKind::Sales;
    type View = SalesOrderView;
    type Summary = SalesOrderView;
}

pub struct PurchaseOrders;

impl OrderDocument for PurchaseOrders {
    const KIND: OrderKind = OrderKind::Purchase;
    type View = PurchaseOrderView;
    type Summary = PurchaseOrderSummary;
}

fn parse_id(id_str: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id_str.trim()).map_err(|_| AppError::BadRequest(format!("invalid id '{}'", id_str)))
}

fn param(params: &HashMap<String, String>, name: &str) -> Option<String> {
    params
        .iter()
        .find(|(k, _)| loose_eq(k, name))
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// GET /api/<Orders>?<orderNo>&<partyName>
pub async fn list<D: OrderDocument>(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let fields = D::KIND.fields();
    let filter = OrderFilter {
        order_no: param(&params, fields.order_no),
        party_name: param(&params, fields.party_name),
    };
    let orders = OrderService::new(state.store.as_ref(), &state.attachments)
        .list(D::KIND, &filter)
        .await?;
    Ok(success_many(orders.iter().map(D::Summary::from).collect()))
}

/// GET /api/<Orders>/:id
pub async fn read<D: OrderDocument>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id)?;
    let order = OrderService::new(state.store.as_ref(), &state.attachments)
        .get(D::KIND, id)
        .await?;
    Ok(success_one_ok(D::View::from(&order)))
}

/// POST /api/<Orders> (multipart): 201 with Location.
pub async fn create<D: OrderDocument>(State(state): State<AppState>, form: OrderForm) -> Result<Response, AppError> {
    let order = OrderService::new(state.store.as_ref(), &state.attachments)
        .create(D::KIND, form)
        .await?;
    let location = format!("{}/{}", D::KIND.route_base(), order.id);
    Ok(created(location, D::View::from(&order)))
}

/// PUT /api/<Orders>/:id (multipart)
pub async fn update<D: OrderDocument>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    form: OrderForm,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id)?;
    let order = OrderService::new(state.store.as_ref(), &state.attachments)
        .update(D::KIND, id, form)
        .await?;
    Ok(success_one_ok(D::View::from(&order)))
}

/// DELETE /api/<Orders>/:id: 204.
pub async fn delete<D: OrderDocument>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id)?;
    OrderService::new(state.store.as_ref(), &state.attachments)
        .delete(D::KIND, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/<Orders>/attachment/:id: file bytes with the recorded content type and original name.
pub async fn download<D: OrderDocument>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;
    let (attachment, bytes) = OrderService::new(state.store.as_ref(), &state.attachments)
        .download(D::KIND, id)
        .await?;
    let content_type = HeaderValue::from_str(&attachment.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(crate::attachments::DEFAULT_CONTENT_TYPE));
    let disposition = HeaderValue::from_str(&content_disposition(&attachment.file_name))
        .map_err(|e| AppError::Internal(format!("content-disposition: {}", e)))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type), (header::CONTENT_DISPOSITION, disposition)],
        bytes,
    )
        .into_response())
}

/// `attachment` disposition with an ASCII fallback name and the RFC 5987 UTF-8 name.
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' { c } else { '_' })
        .collect();
    let mut encoded = String::new();
    for b in file_name.bytes() {
        if b.is_ascii_alphanumeric() || b"-._~".contains(&b) {
            encoded.push(b as char);
        } else {
            encoded.push_str(&format!("%{:02X}", b));
        }
    }
    format!("attachment; filename=\"{}\"; filename*=UTF-8''{}", fallback, encoded)
}
