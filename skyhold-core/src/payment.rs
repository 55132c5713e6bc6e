use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::identity::UserProfile;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Expired,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Expired => "EXPIRED",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PAID" => Ok(PaymentStatus::Paid),
            "EXPIRED" => Ok(PaymentStatus::Expired),
            "FAILED" => Ok(PaymentStatus::Failed),
            other => Err(CoreError::InternalError(format!("unknown payment status '{}'", other))),
        }
    }
}

/// Channel the customer picked on the payment page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "payment_type", rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Virtual account at the given bank (bca, bni, bri, permata)
    BankTransfer { bank: String },
    /// Bill payment with a biller code and bill key
    Echannel,
    Qris,
    Gopay,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer { .. } => "bank_transfer",
            PaymentMethod::Echannel => "echannel",
            PaymentMethod::Qris => "qris",
            PaymentMethod::Gopay => "gopay",
        }
    }
}

/// What the customer needs to complete the payment on their side
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelDisplay {
    VirtualAccount { bank: String, va_number: String },
    Bill { bill_key: String, biller_code: String },
    QrCode { qr_string: String },
    DeepLink { url: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: String,
    /// Gateway-side transaction identifier, the key webhooks refer to
    pub transaction_id: String,
    pub payment_method: String,
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub currency: String,
    pub display: Option<ChannelDisplay>,
    pub paid_at: Option<DateTime<Utc>>,
    /// Mirrors the owning bookings' deadline, never later
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: String,
    pub transaction_id: String,
    pub payment_method: String,
    pub amount: Decimal,
    pub currency: String,
    pub display: Option<ChannelDisplay>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub order_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub method: PaymentMethod,
    pub expires_at: DateTime<Utc>,
    pub customer: UserProfile,
}

#[derive(Debug, Clone)]
pub struct Charge {
    pub transaction_id: String,
    pub display: Option<ChannelDisplay>,
}

#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    /// Create a charge (virtual account, bill, QR, e-wallet) with the provider.
    /// The charge must not outlive `request.expires_at`.
    async fn create_charge(&self, request: &ChargeRequest) -> CoreResult<Charge>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_wire_format() {
        let method: PaymentMethod =
            serde_json::from_str(r#"{"payment_type":"bank_transfer","bank":"bca"}"#).unwrap();
        assert_eq!(method, PaymentMethod::BankTransfer { bank: "bca".to_string() });
        assert_eq!(method.as_str(), "bank_transfer");

        let qris: PaymentMethod = serde_json::from_str(r#"{"payment_type":"qris"}"#).unwrap();
        assert_eq!(qris, PaymentMethod::Qris);
    }

    #[test]
    fn test_unknown_payment_status_is_rejected() {
        assert!("SETTLEMENT".parse::<PaymentStatus>().is_err());
    }
}
