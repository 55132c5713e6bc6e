use async_trait::async_trait;
use rand::Rng;
use skyhold_core::payment::{Charge, ChannelDisplay, ChargeRequest, PaymentAdapter, PaymentMethod};
use skyhold_core::{CoreError, CoreResult};
use tracing::debug;
use uuid::Uuid;

/// Offline gateway: hands out transaction ids and channel data without
/// talking to a provider. Settlement is driven by posting notifications to
/// the webhook endpoint.
#[derive(Debug, Default, Clone)]
pub struct MockPaymentAdapter {
    fail: bool,
}

impl MockPaymentAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every charge fails with `GatewayError`
    pub fn failing() -> Self {
        Self { fail: true }
    }
}

fn digits(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| char::from(b'0' + rng.gen_range(0..10u8))).collect()
}

#[async_trait]
impl PaymentAdapter for MockPaymentAdapter {
    async fn create_charge(&self, request: &ChargeRequest) -> CoreResult<Charge> {
        if self.fail {
            return Err(CoreError::GatewayError("simulated gateway outage".to_string()));
        }

        let transaction_id = format!("mock-{}", Uuid::new_v4().simple());
        let display = match &request.method {
            PaymentMethod::BankTransfer { bank } => ChannelDisplay::VirtualAccount {
                bank: bank.clone(),
                va_number: digits(11),
            },
            PaymentMethod::Echannel => ChannelDisplay::Bill {
                bill_key: digits(12),
                biller_code: "70012".to_string(),
            },
            PaymentMethod::Qris => ChannelDisplay::QrCode {
                qr_string: format!("https://pay.example.com/qris/{}", transaction_id),
            },
            PaymentMethod::Gopay => ChannelDisplay::DeepLink {
                url: format!("gojek://gopay/merchanttransfer?tref={}", transaction_id),
            },
        };

        debug!(
            "Mock charge {} for order {} ({} {}, {})",
            transaction_id,
            request.order_id,
            request.amount,
            request.currency,
            request.method.as_str()
        );

        Ok(Charge {
            transaction_id,
            display: Some(display),
        })
    }
}
