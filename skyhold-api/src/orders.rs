use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use skyhold_core::BookingStatus;
use skyhold_order::{OrderConfirmation, OrderItem};

use crate::bookings::{with_flights, BookingView};
use crate::error::AppError;
use crate::middleware::CustomerClaims;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub status: BookingStatus,
    pub total_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub bookings: Vec<BookingView>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/orders
/// Reserve seats and create pending bookings for every cart item
pub async fn create_order(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderConfirmation>), AppError> {
    let user_id = claims.user_id()?;
    let confirmation = state.assembler.create_order(user_id, payload.items).await?;
    Ok((StatusCode::CREATED, Json(confirmation)))
}

/// GET /v1/orders/{order_id}
pub async fn get_order(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, AppError> {
    let user_id = claims.user_id()?;
    let bookings = state.bookings.find_by_order_id(&order_id).await?;

    // Someone else's order is reported as missing
    if bookings.is_empty() || bookings.iter().any(|b| b.user_id != user_id) {
        return Err(AppError::NotFoundError(format!("Order not found: {}", order_id)));
    }

    let status = bookings[0].status;
    let expires_at = bookings[0].expires_at;
    let total_amount = bookings.iter().map(|b| b.total_price).sum();
    let bookings = with_flights(state.catalog.as_ref(), bookings).await?;

    Ok(Json(OrderResponse {
        order_id,
        status,
        total_amount,
        expires_at: (status == BookingStatus::Pending).then_some(expires_at),
        bookings,
    }))
}
