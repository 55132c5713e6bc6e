use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use skyhold_core::payment::{ChannelDisplay, Payment, PaymentMethod};
use skyhold_core::PaymentStatus;

use crate::error::AppError;
use crate::middleware::CustomerClaims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    pub order_id: String,
    /// `{"payment_type": "bank_transfer", "bank": "bca"}`, `{"payment_type": "qris"}`, ...
    #[serde(flatten)]
    pub method: PaymentMethod,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub order_id: String,
    pub transaction_id: String,
    pub payment_type: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub expiry_time: DateTime<Utc>,
    pub display: Option<ChannelDisplay>,
}

impl From<Payment> for PaymentResponse {
    fn from(p: Payment) -> Self {
        Self {
            order_id: p.order_id,
            transaction_id: p.transaction_id,
            payment_type: p.payment_method,
            amount: p.amount,
            currency: p.currency,
            status: p.status,
            expiry_time: p.expires_at,
            display: p.display,
        }
    }
}

/// POST /v1/payments
/// Create (or replace) the gateway charge for a pending order
pub async fn initiate_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(payload): Json<InitiatePaymentRequest>,
) -> Result<Json<PaymentResponse>, AppError> {
    let user_id = claims.user_id()?;
    let payment = state
        .reconciler
        .initiate_payment(user_id, &payload.order_id, payload.method)
        .await?;
    Ok(Json(payment.into()))
}
