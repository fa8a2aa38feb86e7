//! HTTP/JSON routing: terminal preflight extraction, request DTOs
//! (camelCase at the boundary), and the success envelope. Business logic
//! lives in [`crate::facade`], [`crate::finalizer`], [`crate::void_return`].

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use cart_core::tax::TaxMaster;
use cart_core::{CartEvent, Discount, DiscountType, Money};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::TerminalContext;
use crate::error::ApiError;
use crate::facade::CartFacade;
use crate::finalizer::Finalizer;
use crate::void_return::VoidReturnProcessor;
use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/carts", post(create_cart))
        .route("/api/v1/carts/{cart_id}", get(get_cart))
        .route("/api/v1/carts/{cart_id}/cancel", post(cancel_cart))
        .route("/api/v1/carts/{cart_id}/lineItems", post(add_line_item))
        .route("/api/v1/carts/{cart_id}/lineItems/{line_no}/cancel", post(cancel_line))
        .route("/api/v1/carts/{cart_id}/lineItems/{line_no}/quantity", patch(update_quantity))
        .route("/api/v1/carts/{cart_id}/lineItems/{line_no}/unitPrice", patch(update_unit_price))
        .route("/api/v1/carts/{cart_id}/lineItems/{line_no}/discounts", post(add_line_discount))
        .route("/api/v1/carts/{cart_id}/subtotal", post(calc_subtotal))
        .route("/api/v1/carts/{cart_id}/discounts", post(add_cart_discount))
        .route("/api/v1/carts/{cart_id}/payments", post(add_payment))
        .route("/api/v1/carts/{cart_id}/bill", post(bill))
        .route("/api/v1/carts/{cart_id}/resume-item-entry", post(resume_item_entry))
        .route(
            "/api/v1/tenants/{tenant_id}/stores/{store_code}/terminals/{terminal_no}/transactions",
            get(query_transactions),
        )
        .route(
            "/api/v1/tenants/{tenant_id}/stores/{store_code}/terminals/{terminal_no}/transactions/{transaction_no}",
            get(get_transaction),
        )
        .route(
            "/api/v1/tenants/{tenant_id}/stores/{store_code}/terminals/{terminal_no}/transactions/{transaction_no}/void",
            post(void_transaction),
        )
        .route(
            "/api/v1/tenants/{tenant_id}/stores/{store_code}/terminals/{terminal_no}/transactions/{transaction_no}/return",
            post(return_transaction),
        )
        .route(
            "/api/v1/tenants/{tenant_id}/stores/{store_code}/terminals/{terminal_no}/transactions/{transaction_no}/delivery-status",
            post(ack_delivery),
        )
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    envelope(StatusCode::OK, serde_json::json!({"status": "ok"}), "health")
}

// ---------------------------------------------------------------------------
// Success envelope
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SuccessEnvelope<T: Serialize> {
    success: bool,
    code: u16,
    message: String,
    data: T,
    operation: String,
}

fn envelope<T: Serialize>(status: StatusCode, data: T, operation: &str) -> Response {
    let body = SuccessEnvelope { success: true, code: status.as_u16(), message: "ok".into(), data, operation: operation.into() };
    (status, Json(body)).into_response()
}

// ---------------------------------------------------------------------------
// Terminal preflight
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TerminalQuery {
    terminal_id: String,
}

async fn resolve_terminal(state: &AppState, headers: &HeaderMap, query: &TerminalQuery) -> Result<TerminalContext, ApiError> {
    let api_key = headers.get("X-API-Key").and_then(|v| v.to_str().ok()).ok_or(ApiError::InvalidApiKey)?;

    let mut parts = query.terminal_id.splitn(3, '-');
    let (tenant_id, store_code, terminal_no) = match (parts.next(), parts.next(), parts.next()) {
        (Some(t), Some(s), Some(n)) => (t, s, n),
        _ => return Err(ApiError::BadRequest("terminal_id must be {tenant}-{store}-{terminal}".into())),
    };

    state.terminals.preflight(tenant_id, store_code, terminal_no, api_key).await
}

fn business_date_today() -> u32 {
    chrono::Utc::now().format("%Y%m%d").to_string().parse().unwrap_or(19700101)
}

// ---------------------------------------------------------------------------
// Cart lifecycle
// ---------------------------------------------------------------------------

async fn create_cart(State(state): State<Arc<AppState>>, headers: HeaderMap, Query(query): Query<TerminalQuery>) -> Result<Response, ApiError> {
    let ctx = resolve_terminal(&state, &headers, &query).await?;
    let facade = CartFacade::new(state.db.carts(), &state.payments, state.master_data.as_ref());
    let cart = facade.get_or_create(&ctx.tenant_id, &ctx.store_code, &ctx.terminal_no, &ctx.staff, business_date_today()).await?;
    Ok(envelope(StatusCode::CREATED, cart, "createCart"))
}

async fn get_cart(State(state): State<Arc<AppState>>, Path(cart_id): Path<Uuid>) -> Result<Response, ApiError> {
    let facade = CartFacade::new(state.db.carts(), &state.payments, state.master_data.as_ref());
    let cart = facade.apply(&cart_id, CartEvent::GetCart, |_| Ok(())).await?;
    Ok(envelope(StatusCode::OK, cart, "getCart"))
}

async fn cancel_cart(State(state): State<Arc<AppState>>, Path(cart_id): Path<Uuid>) -> Result<Response, ApiError> {
    let facade = CartFacade::new(state.db.carts(), &state.payments, state.master_data.as_ref());
    let cart = facade.apply(&cart_id, CartEvent::CancelCart, |_| Ok(())).await?;
    Ok(envelope(StatusCode::OK, cart, "cancelCart"))
}

// ---------------------------------------------------------------------------
// Line items
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddLineItemRequest {
    item_code: String,
    description: String,
    unit_price: i64,
    quantity_milli: i64,
    tax_code: Option<String>,
}

async fn add_line_item(State(state): State<Arc<AppState>>, Path(cart_id): Path<Uuid>, Json(req): Json<AddLineItemRequest>) -> Result<Response, ApiError> {
    let facade = CartFacade::new(state.db.carts(), &state.payments, state.master_data.as_ref());
    let cart = facade
        .apply(&cart_id, CartEvent::AddItem, |cart| {
            facade.add_item(cart, req.item_code.clone(), req.description.clone(), Money::from_cents(req.unit_price), req.quantity_milli, req.tax_code.clone())
        })
        .await?;
    Ok(envelope(StatusCode::CREATED, cart, "addLineItem"))
}

async fn cancel_line(State(state): State<Arc<AppState>>, Path((cart_id, line_no)): Path<(Uuid, u32)>) -> Result<Response, ApiError> {
    let facade = CartFacade::new(state.db.carts(), &state.payments, state.master_data.as_ref());
    let cart = facade.apply(&cart_id, CartEvent::CancelLine, |cart| facade.cancel_line(cart, line_no)).await?;
    Ok(envelope(StatusCode::OK, cart, "cancelLine"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateQuantityRequest {
    quantity_milli: i64,
}

async fn update_quantity(
    State(state): State<Arc<AppState>>,
    Path((cart_id, line_no)): Path<(Uuid, u32)>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Response, ApiError> {
    let facade = CartFacade::new(state.db.carts(), &state.payments, state.master_data.as_ref());
    let cart = facade.apply(&cart_id, CartEvent::UpdateQty, |cart| facade.update_qty(cart, line_no, req.quantity_milli)).await?;
    Ok(envelope(StatusCode::OK, cart, "updateQuantity"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUnitPriceRequest {
    unit_price: i64,
}

async fn update_unit_price(
    State(state): State<Arc<AppState>>,
    Path((cart_id, line_no)): Path<(Uuid, u32)>,
    Json(req): Json<UpdateUnitPriceRequest>,
) -> Result<Response, ApiError> {
    let facade = CartFacade::new(state.db.carts(), &state.payments, state.master_data.as_ref());
    let cart = facade.apply(&cart_id, CartEvent::UpdatePrice, |cart| facade.update_price(cart, line_no, Money::from_cents(req.unit_price))).await?;
    Ok(envelope(StatusCode::OK, cart, "updateUnitPrice"))
}

#[derive(Deserialize)]
struct DiscountRequest {
    #[serde(rename = "type")]
    kind: String,
    value: i64,
    detail: String,
}

fn discount_from_request(req: DiscountRequest) -> Discount {
    let kind = if req.kind == "percent" { DiscountType::Percent } else { DiscountType::Amount };
    Discount { kind, value: req.value, detail: req.detail, amount_applied: None }
}

async fn add_line_discount(
    State(state): State<Arc<AppState>>,
    Path((cart_id, line_no)): Path<(Uuid, u32)>,
    Json(req): Json<DiscountRequest>,
) -> Result<Response, ApiError> {
    let facade = CartFacade::new(state.db.carts(), &state.payments, state.master_data.as_ref());
    let cart = facade
        .apply(&cart_id, CartEvent::AddLineDiscount, |cart| facade.add_line_discount(cart, line_no, discount_from_request_clone(&req)))
        .await?;
    Ok(envelope(StatusCode::OK, cart, "addLineDiscount"))
}

fn discount_from_request_clone(req: &DiscountRequest) -> Discount {
    discount_from_request(DiscountRequest { kind: req.kind.clone(), value: req.value, detail: req.detail.clone() })
}

async fn add_cart_discount(State(state): State<Arc<AppState>>, Path(cart_id): Path<Uuid>, Json(req): Json<DiscountRequest>) -> Result<Response, ApiError> {
    let facade = CartFacade::new(state.db.carts(), &state.payments, state.master_data.as_ref());
    let cart = facade
        .apply(&cart_id, CartEvent::AddCartDiscount, |cart| {
            facade.add_cart_discount(cart, discount_from_request_clone(&req));
            Ok(())
        })
        .await?;
    Ok(envelope(StatusCode::OK, cart, "addCartDiscount"))
}

// ---------------------------------------------------------------------------
// Subtotal / tax
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaxMasterEntry {
    tax_code: String,
    tax_name: String,
    #[serde(rename = "type")]
    tax_type: String,
    rate_bps: u32,
    #[serde(default)]
    rounding_mode: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalcSubtotalRequest {
    #[serde(default)]
    tax_masters: Vec<TaxMasterEntry>,
}

async fn calc_subtotal(State(state): State<Arc<AppState>>, Path(cart_id): Path<Uuid>, Json(req): Json<CalcSubtotalRequest>) -> Result<Response, ApiError> {
    let facade = CartFacade::new(state.db.carts(), &state.payments, state.master_data.as_ref());

    let masters: BTreeMap<String, TaxMaster> = req
        .tax_masters
        .into_iter()
        .map(|m| {
            let tax_type = match m.tax_type.as_str() {
                "inclusive" => cart_core::TaxType::Inclusive,
                "exempt" => cart_core::TaxType::Exempt,
                _ => cart_core::TaxType::Exclusive,
            };
            let rounding_mode = match m.rounding_mode.as_deref() {
                Some("floor") => cart_core::RoundingMode::Floor,
                Some("ceil") => cart_core::RoundingMode::Ceil,
                _ => cart_core::RoundingMode::RoundHalfUp,
            };
            (m.tax_code.clone(), TaxMaster { tax_code: m.tax_code, tax_name: m.tax_name, tax_type, rate_bps: m.rate_bps, rounding_mode })
        })
        .collect();

    let cart = facade.apply(&cart_id, CartEvent::CalcSubtotal, |cart| facade.calc_subtotal(cart, &masters)).await?;
    Ok(envelope(StatusCode::OK, cart, "calcSubtotal"))
}

// ---------------------------------------------------------------------------
// Payments / bill
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddPaymentRequest {
    payment_code: String,
    amount: i64,
    deposit: i64,
    #[serde(default)]
    detail: Option<String>,
}

async fn add_payment(State(state): State<Arc<AppState>>, Path(cart_id): Path<Uuid>, Json(req): Json<AddPaymentRequest>) -> Result<Response, ApiError> {
    let facade = CartFacade::new(state.db.carts(), &state.payments, state.master_data.as_ref());
    let cart = facade
        .apply(&cart_id, CartEvent::AddPayment, |cart| {
            facade.add_payment(cart, &req.payment_code, Money::from_cents(req.amount), Money::from_cents(req.deposit), req.detail.clone())
        })
        .await?;
    Ok(envelope(StatusCode::OK, cart, "addPayment"))
}

async fn resume_item_entry(State(state): State<Arc<AppState>>, Path(cart_id): Path<Uuid>) -> Result<Response, ApiError> {
    let facade = CartFacade::new(state.db.carts(), &state.payments, state.master_data.as_ref());
    let cart = facade.apply(&cart_id, CartEvent::ResumeItemEntry, |_| Ok(())).await?;
    Ok(envelope(StatusCode::OK, cart, "resumeItemEntry"))
}

async fn bill(State(state): State<Arc<AppState>>, Path(cart_id): Path<Uuid>) -> Result<Response, ApiError> {
    let facade = CartFacade::new(state.db.carts(), &state.payments, state.master_data.as_ref());

    // A repeated BILL against a cart already completed by an earlier call
    // returns the transaction that call produced rather than re-running
    // finalization (idempotent retry keyed on cart_id + transaction_no).
    let existing = facade.load(&cart_id).await?;
    if existing.status == cart_core::CartStatus::Completed {
        let transaction_no = existing.transaction_no.ok_or_else(|| ApiError::BadRequest("cart completed without a recorded transaction".into()))?;
        let transaction = state
            .db
            .transactions()
            .find(&existing.tenant_id, &existing.store_code, &existing.terminal_no, existing.business_date, transaction_no)
            .await?;
        return Ok(envelope(StatusCode::OK, transaction, "bill"));
    }

    // Validate the BILL transition without persisting it: the cart's
    // status must only flip to Completed once the finalizer's counter
    // allocation and transaction insert have both succeeded, so a failure
    // partway through leaves the cart retryable in Paying rather than
    // stranded Completed with no transaction.
    let mut cart = facade.load_for_event(&cart_id, CartEvent::Bill).await?;
    let expected_etag = cart.etag.clone();

    let counters = state.db.counters();
    let transactions = state.db.transactions();
    let finalizer = Finalizer { counters: &counters, transactions: &transactions, publisher: &state.publisher };
    let transaction = finalizer.finalize(&mut cart).await?;

    cart.etag = Uuid::new_v4().to_string();
    state.db.carts().save(&cart, &expected_etag).await?;

    Ok(envelope(StatusCode::OK, transaction, "bill"))
}

// ---------------------------------------------------------------------------
// Void / Return / Ack
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TransactionListPath {
    tenant_id: String,
    store_code: String,
    terminal_no: String,
}

#[derive(Deserialize)]
struct TransactionListQuery {
    business_date: Option<u32>,
    #[serde(default = "default_transaction_list_limit")]
    limit: i64,
}

fn default_transaction_list_limit() -> i64 {
    50
}

async fn query_transactions(
    State(state): State<Arc<AppState>>,
    Path(path): Path<TransactionListPath>,
    Query(query): Query<TransactionListQuery>,
) -> Result<Response, ApiError> {
    let transactions = state
        .db
        .transactions()
        .list_for_terminal(&path.tenant_id, &path.store_code, &path.terminal_no, query.business_date, query.limit)
        .await?;
    Ok(envelope(StatusCode::OK, transactions, "queryTransactions"))
}

#[derive(Deserialize)]
struct TransactionPath {
    tenant_id: String,
    store_code: String,
    terminal_no: String,
    transaction_no: i64,
}

#[derive(Deserialize)]
struct TransactionQuery {
    business_date: u32,
}

async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(path): Path<TransactionPath>,
    Query(query): Query<TransactionQuery>,
) -> Result<Response, ApiError> {
    let transaction = state
        .db
        .transactions()
        .find(&path.tenant_id, &path.store_code, &path.terminal_no, query.business_date, path.transaction_no)
        .await?;
    Ok(envelope(StatusCode::OK, transaction, "getTransaction"))
}

#[derive(Deserialize)]
struct VoidReturnPath {
    tenant_id: String,
    store_code: String,
    terminal_no: String,
    transaction_no: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoidRequest {
    staff: String,
    business_date: u32,
}

async fn void_transaction(State(state): State<Arc<AppState>>, Path(path): Path<VoidReturnPath>, Json(req): Json<VoidRequest>) -> Result<Response, ApiError> {
    let counters = state.db.counters();
    let transactions = state.db.transactions();
    let finalizer = Finalizer { counters: &counters, transactions: &transactions, publisher: &state.publisher };
    let processor = VoidReturnProcessor { transactions: &transactions, finalizer: &finalizer };

    let transaction = processor
        .void(&path.tenant_id, &path.store_code, &path.terminal_no, req.business_date, path.transaction_no, &req.staff)
        .await?;

    Ok(envelope(StatusCode::CREATED, transaction, "voidTransaction"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReturnRequest {
    staff: String,
    business_date: u32,
    lines: Vec<ReturnLine>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReturnLine {
    line_no: u32,
    quantity_milli: i64,
}

/// `path.terminal_no` is the terminal performing the return (any terminal
/// in the same store is allowed); the transaction's originating terminal
/// is resolved from the stored record, not this path.
async fn return_transaction(State(state): State<Arc<AppState>>, Path(path): Path<VoidReturnPath>, Json(req): Json<ReturnRequest>) -> Result<Response, ApiError> {
    let counters = state.db.counters();
    let transactions = state.db.transactions();
    let finalizer = Finalizer { counters: &counters, transactions: &transactions, publisher: &state.publisher };
    let processor = VoidReturnProcessor { transactions: &transactions, finalizer: &finalizer };

    let lines = req.lines.into_iter().map(|l| (l.line_no, l.quantity_milli)).collect();

    let transaction = processor
        .return_transaction(&path.tenant_id, &path.store_code, &path.terminal_no, req.business_date, path.transaction_no, &req.staff, lines)
        .await?;

    Ok(envelope(StatusCode::CREATED, transaction, "returnTransaction"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AckRequest {
    event_id: Uuid,
    service: String,
    status: String,
    #[serde(default)]
    message: Option<String>,
}

async fn ack_delivery(State(state): State<Arc<AppState>>, Json(req): Json<AckRequest>) -> Result<Response, ApiError> {
    let status = match req.status.as_str() {
        "delivered" => cart_core::DeliveryStatus::Delivered,
        _ => cart_core::DeliveryStatus::Failed,
    };

    state.publisher.acknowledge(&req.event_id, &req.service, status, req.message).await?;
    Ok(envelope(StatusCode::OK, serde_json::json!({"acknowledged": true}), "ackDelivery"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_dtos_deserialize_camel_case() {
        let req: AddLineItemRequest = serde_json::from_str(
            r#"{"itemCode": "SKU1", "description": "Widget", "unitPrice": 500, "quantityMilli": 2000, "taxCode": "A"}"#,
        )
        .unwrap();
        assert_eq!(req.item_code, "SKU1");
        assert_eq!(req.quantity_milli, 2000);
        assert_eq!(req.tax_code.as_deref(), Some("A"));
    }

    #[test]
    fn discount_request_maps_type_field_to_kind() {
        let req: DiscountRequest = serde_json::from_str(r#"{"type": "percent", "value": 1000, "detail": "promo"}"#).unwrap();
        let discount = discount_from_request(req);
        assert_eq!(discount.kind, DiscountType::Percent);
        assert_eq!(discount.value, 1000);
        assert!(discount.amount_applied.is_none());
    }

    #[test]
    fn discount_request_defaults_unknown_type_to_amount() {
        let req: DiscountRequest = serde_json::from_str(r#"{"type": "bogus", "value": 250, "detail": ""}"#).unwrap();
        let discount = discount_from_request(req);
        assert_eq!(discount.kind, DiscountType::Amount);
    }

    #[test]
    fn transaction_list_query_defaults_limit_when_absent() {
        let query: TransactionListQuery = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(query.limit, 50);
        assert!(query.business_date.is_none());
    }

    #[test]
    fn terminal_id_splits_into_tenant_store_terminal() {
        let terminal_id = "t1-S001-01".to_string();
        let mut parts = terminal_id.splitn(3, '-');
        let (tenant_id, store_code, terminal_no) = match (parts.next(), parts.next(), parts.next()) {
            (Some(t), Some(s), Some(n)) => (t, s, n),
            _ => panic!("expected three parts"),
        };
        assert_eq!(tenant_id, "t1");
        assert_eq!(store_code, "S001");
        assert_eq!(terminal_no, "01");
    }
}
