use std::sync::Arc;

use axum::{body::Bytes, extract::Path, Extension, Json};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;
use crate::payment::{iso_millis, timestamp_now, Payment, PaymentRequest};
use crate::store::PaymentStore;

#[derive(Clone)]
pub struct AppState {
    pub service_name: Arc<str>,
    pub store: Arc<dyn PaymentStore>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: String,
    now: String,
}

#[derive(Serialize)]
pub struct PongResponse {
    pong: bool,
}

#[derive(Serialize)]
pub struct PaymentListResponse {
    ok: bool,
    count: usize,
    payments: Vec<Payment>,
}

#[derive(Serialize)]
pub struct ClearedResponse {
    ok: bool,
    cleared: bool,
}

#[derive(Serialize)]
pub struct PaymentResponse {
    ok: bool,
    payment: Payment,
}

impl PaymentResponse {
    fn new(payment: Payment) -> Self {
        Self { ok: true, payment }
    }
}

pub async fn health(Extension(state): Extension<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: state.service_name.to_string(),
        now: iso_millis::format(&timestamp_now()),
    })
}

pub async fn ping() -> Json<PongResponse> {
    Json(PongResponse { pong: true })
}

pub async fn list_payments(
    Extension(state): Extension<AppState>,
) -> Result<Json<PaymentListResponse>, ApiError> {
    let payments = state.store.list().await?;
    Ok(Json(PaymentListResponse {
        ok: true,
        count: payments.len(),
        payments,
    }))
}

pub async fn clear_payments(
    Extension(state): Extension<AppState>,
) -> Result<Json<ClearedResponse>, ApiError> {
    let removed = state.store.clear().await?;
    tracing::info!(removed, "cleared payments");
    Ok(Json(ClearedResponse {
        ok: true,
        cleared: true,
    }))
}

pub async fn create_payment(
    Extension(state): Extension<AppState>,
    body: Bytes,
) -> Result<Json<PaymentResponse>, ApiError> {
    let request = parse_request(&body)?;
    let draft = request.validate()?;
    let payment = draft.into_payment(Uuid::new_v4(), timestamp_now());

    state.store.put(payment.clone()).await?;
    tracing::info!(
        id = %payment.id,
        amount = payment.amount,
        currency = %payment.currency,
        "payment captured"
    );
    Ok(Json(PaymentResponse::new(payment)))
}

pub async fn get_payment(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PaymentResponse>, ApiError> {
    // Ids that are not UUIDs can never have been issued.
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::NotFound)?;
    let payment = state.store.get(id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(PaymentResponse::new(payment)))
}

/// An empty body or a JSON value that is not an object counts as a request
/// with every field absent.
fn parse_request(body: &[u8]) -> Result<PaymentRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(PaymentRequest::default());
    }
    let value: Value = serde_json::from_slice(body).map_err(|_| ApiError::MalformedBody)?;
    match value {
        Value::Object(_) => serde_json::from_value(value).map_err(|_| ApiError::MalformedBody),
        _ => Ok(PaymentRequest::default()),
    }
}
