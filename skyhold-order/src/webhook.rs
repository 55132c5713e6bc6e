use serde::{Deserialize, Serialize};
use skyhold_core::{BookingStatus, PaymentStatus};

/// Settlement notification as posted by the gateway. Only the fields the
/// reconciliation reads are typed; the rest of the body is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentNotification {
    pub transaction_id: String,
    pub order_id: String,
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub gross_amount: Option<String>,
}

/// Gateway vocabulary collapsed into what the booking core acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayEvent {
    Succeeded,
    Expired,
    Failed,
    Unknown,
}

impl GatewayEvent {
    pub fn booking_status(&self) -> Option<BookingStatus> {
        match self {
            GatewayEvent::Succeeded => Some(BookingStatus::Paid),
            GatewayEvent::Expired => Some(BookingStatus::Cancelled),
            GatewayEvent::Failed => Some(BookingStatus::Failed),
            GatewayEvent::Unknown => None,
        }
    }

    pub fn payment_status(&self) -> Option<PaymentStatus> {
        match self {
            GatewayEvent::Succeeded => Some(PaymentStatus::Paid),
            GatewayEvent::Expired => Some(PaymentStatus::Expired),
            GatewayEvent::Failed => Some(PaymentStatus::Failed),
            GatewayEvent::Unknown => None,
        }
    }
}

impl PaymentNotification {
    pub fn event(&self) -> GatewayEvent {
        match self.transaction_status.as_str() {
            "settlement" => GatewayEvent::Succeeded,
            // Card capture only counts once the fraud check accepted it
            "capture" => match self.fraud_status.as_deref() {
                None | Some("accept") => GatewayEvent::Succeeded,
                _ => GatewayEvent::Unknown,
            },
            "expire" | "cancel" => GatewayEvent::Expired,
            "deny" | "failure" => GatewayEvent::Failed,
            _ => GatewayEvent::Unknown,
        }
    }
}
