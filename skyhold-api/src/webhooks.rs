use axum::{extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};
use skyhold_order::PaymentNotification;

use crate::error::AppError;
use crate::state::AppState;

pub const CALLBACK_TOKEN_HEADER: &str = "x-callback-token";

/// POST /v1/webhooks/payments
/// Gateway settlement notifications. Any non-2xx answer makes the gateway
/// redeliver, so only transient failures should surface as errors.
pub async fn handle_payment_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PaymentNotification>,
) -> Result<Json<Value>, AppError> {
    tracing::info!(
        "Received notification '{}' for transaction {}",
        payload.transaction_status,
        payload.transaction_id
    );

    let token = headers
        .get(CALLBACK_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = state
        .reconciler
        .process_webhook(&payload, token)
        .await
        .inspect_err(|e| {
            if e.is_transient() {
                tracing::warn!("Notification for {} failed, gateway will redeliver: {}", payload.transaction_id, e);
            } else {
                tracing::info!("Notification for {} rejected: {}", payload.transaction_id, e);
            }
        })?;

    Ok(Json(json!({
        "status": "ok",
        "outcome": outcome,
    })))
}
