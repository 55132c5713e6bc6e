use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use skyhold_core::identity::IdentityService;
use skyhold_core::payment::{ChargeRequest, NewPayment, Payment, PaymentMethod};
use skyhold_core::repository::{BookingRepository, PaymentRepository};
use skyhold_core::{BookingStatus, CoreError, CoreResult, PaymentAdapter, PaymentStatus, UserId};
use std::sync::Arc;
use tracing::{info, warn};

use crate::state_machine::BookingStateMachine;
use crate::webhook::{GatewayEvent, PaymentNotification};

const SUPPORTED_BANKS: &[&str] = &["bca", "bni", "bri", "permata"];

/// What a delivered notification ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// Booking and payment moved to the notified state
    Applied,
    /// Payment was already paid; redelivery ignored
    AlreadySettled,
    /// Money arrived after the booking ended and its seats were released.
    /// Payment marked failed, needs a manual refund.
    RefundRequired,
    /// Negative outcome for a booking that had already ended
    Absorbed,
    /// Status outside the table (pending, challenge, refund...)
    Ignored,
}

pub struct PaymentReconciler {
    state_machine: BookingStateMachine,
    bookings: Arc<dyn BookingRepository>,
    payments: Arc<dyn PaymentRepository>,
    identity: Arc<dyn IdentityService>,
    adapter: Arc<dyn PaymentAdapter>,
    webhook_token: String,
    currency: String,
}

impl PaymentReconciler {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        payments: Arc<dyn PaymentRepository>,
        identity: Arc<dyn IdentityService>,
        adapter: Arc<dyn PaymentAdapter>,
        webhook_token: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            state_machine: BookingStateMachine::new(bookings.clone()),
            bookings,
            payments,
            identity,
            adapter,
            webhook_token: webhook_token.into(),
            currency: currency.into(),
        }
    }

    pub async fn initiate_payment(
        &self,
        user_id: UserId,
        order_id: &str,
        method: PaymentMethod,
    ) -> CoreResult<Payment> {
        self.initiate_payment_at(user_id, order_id, method, Utc::now()).await
    }

    /// Charge the order's total through the gateway and store (or replace)
    /// its single payment row.
    pub async fn initiate_payment_at(
        &self,
        user_id: UserId,
        order_id: &str,
        method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> CoreResult<Payment> {
        if let PaymentMethod::BankTransfer { bank } = &method {
            if !SUPPORTED_BANKS.contains(&bank.to_ascii_lowercase().as_str()) {
                return Err(CoreError::ValidationError(format!("unsupported bank '{}'", bank)));
            }
        }

        let bookings = self.bookings.find_by_order_id(order_id).await?;
        // Foreign orders look exactly like missing ones
        if bookings.is_empty() || bookings.iter().any(|b| b.user_id != user_id) {
            return Err(CoreError::OrderNotFound(order_id.to_string()));
        }

        for booking in &bookings {
            match booking.status {
                BookingStatus::Pending => {}
                BookingStatus::Paid => return Err(CoreError::AlreadyPaid(order_id.to_string())),
                BookingStatus::Cancelled => return Err(CoreError::AlreadyCancelled(order_id.to_string())),
                other => {
                    return Err(CoreError::InvalidTransition {
                        from: other,
                        to: BookingStatus::Paid,
                    })
                }
            }
        }

        let expires_at = bookings
            .iter()
            .map(|b| b.expires_at)
            .min()
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;
        if now >= expires_at {
            return Err(CoreError::BookingExpired(order_id.to_string()));
        }

        let customer = self
            .identity
            .user_by_id(user_id)
            .await?
            .ok_or(CoreError::UserNotFound(user_id))?;

        let amount: Decimal = bookings.iter().map(|b| b.total_price).sum();
        let request = ChargeRequest {
            order_id: order_id.to_string(),
            amount,
            currency: self.currency.clone(),
            method: method.clone(),
            expires_at,
            customer,
        };
        let charge = self.adapter.create_charge(&request).await?;

        let payment = self
            .payments
            .upsert_payment(&NewPayment {
                order_id: order_id.to_string(),
                transaction_id: charge.transaction_id,
                payment_method: method.as_str().to_string(),
                amount,
                currency: self.currency.clone(),
                display: charge.display,
                expires_at,
            })
            .await?;

        info!(
            "Payment {} initiated for order {} via {} ({} {})",
            payment.transaction_id, order_id, payment.payment_method, amount, payment.currency
        );
        Ok(payment)
    }

    /// Apply one gateway notification. Safe to call any number of times for
    /// the same notification; errors returned here make the gateway retry.
    pub async fn process_webhook(
        &self,
        notification: &PaymentNotification,
        token: Option<&str>,
    ) -> CoreResult<WebhookOutcome> {
        let authorized = token
            .map(|t| constant_time_eq::constant_time_eq(t.as_bytes(), self.webhook_token.as_bytes()))
            .unwrap_or(false);
        if !authorized {
            return Err(CoreError::Unauthorized);
        }

        let payment = self
            .payments
            .find_by_transaction_id(&notification.transaction_id)
            .await?
            .ok_or_else(|| CoreError::UnknownTransaction(notification.transaction_id.clone()))?;

        if payment.order_id != notification.order_id {
            warn!(
                "Notification for {} names order {}, stored payment belongs to {}",
                notification.transaction_id, notification.order_id, payment.order_id
            );
        }

        if payment.status == PaymentStatus::Paid {
            info!("Payment {} already settled, ignoring redelivery", payment.transaction_id);
            return Ok(WebhookOutcome::AlreadySettled);
        }

        let event = notification.event();
        let (Some(booking_status), Some(payment_status)) = (event.booking_status(), event.payment_status())
        else {
            info!(
                "Ignoring status '{}' for payment {}",
                notification.transaction_status, payment.transaction_id
            );
            return Ok(WebhookOutcome::Ignored);
        };

        let order_id = payment.order_id.as_str();
        match self.state_machine.transition(order_id, booking_status).await {
            Ok(()) => {
                let paid_at = (event == GatewayEvent::Succeeded).then(Utc::now);
                self.payments.update_status(order_id, payment_status, paid_at).await?;
                Ok(WebhookOutcome::Applied)
            }
            // The booking already ended another way (swept, or denied earlier
            // and delivered out of order). Absorb it so the gateway stops retrying.
            Err(e @ (CoreError::AlreadyCancelled(_) | CoreError::InvalidTransition { .. }))
                if event == GatewayEvent::Succeeded =>
            {
                warn!(
                    "Order {} settled by {} after it ended ({}); marking payment failed for refund",
                    order_id, payment.transaction_id, e
                );
                self.payments.update_status(order_id, PaymentStatus::Failed, None).await?;
                Ok(WebhookOutcome::RefundRequired)
            }
            Err(e @ (CoreError::AlreadyCancelled(_) | CoreError::InvalidTransition { .. })) => {
                info!("Absorbing '{}' for order {}: {}", notification.transaction_status, order_id, e);
                self.payments.update_status(order_id, payment_status, None).await?;
                Ok(WebhookOutcome::Absorbed)
            }
            Err(e) => Err(e),
        }
    }
}
