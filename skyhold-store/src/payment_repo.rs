use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use skyhold_core::payment::{ChannelDisplay, NewPayment, Payment};
use skyhold_core::repository::PaymentRepository;
use skyhold_core::{CoreError, CoreResult, PaymentStatus};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::database::storage_error;

const PAYMENT_COLUMNS: &str = "id, order_id, transaction_id, payment_method, payment_status, \
    amount, currency, display, paid_at, expires_at, created_at, updated_at";

pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: i64,
    order_id: String,
    transaction_id: String,
    payment_method: String,
    payment_status: String,
    amount: Decimal,
    currency: String,
    display: Option<Json<ChannelDisplay>>,
    paid_at: Option<DateTime<Utc>>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = CoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            order_id: row.order_id,
            transaction_id: row.transaction_id,
            payment_method: row.payment_method,
            status: row.payment_status.parse()?,
            amount: row.amount,
            currency: row.currency,
            display: row.display.map(|Json(display)| display),
            paid_at: row.paid_at,
            expires_at: row.expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    async fn upsert_payment(&self, payment: &NewPayment) -> CoreResult<Payment> {
        // A settled payment is never replaced; the WHERE on the conflict arm
        // turns that case into zero returned rows.
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            r#"
            INSERT INTO payments (order_id, transaction_id, payment_method, payment_status, amount, currency, display, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (order_id) DO UPDATE
            SET transaction_id = EXCLUDED.transaction_id,
                payment_method = EXCLUDED.payment_method,
                payment_status = EXCLUDED.payment_status,
                amount = EXCLUDED.amount,
                currency = EXCLUDED.currency,
                display = EXCLUDED.display,
                expires_at = EXCLUDED.expires_at,
                paid_at = NULL,
                updated_at = NOW()
            WHERE payments.payment_status <> $9
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(&payment.order_id)
        .bind(&payment.transaction_id)
        .bind(&payment.payment_method)
        .bind(PaymentStatus::Pending.as_str())
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.display.clone().map(Json))
        .bind(payment.expires_at)
        .bind(PaymentStatus::Paid.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        match row {
            Some(row) => row.try_into(),
            None => Err(CoreError::AlreadyPaid(payment.order_id.clone())),
        }
    }

    async fn find_by_order_id(&self, order_id: &str) -> CoreResult<Option<Payment>> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE order_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> CoreResult<Option<Payment>> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE transaction_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.map(Payment::try_from).transpose()
    }

    async fn update_status(
        &self,
        order_id: &str,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET payment_status = $1, paid_at = COALESCE($2, paid_at), updated_at = NOW()
            WHERE order_id = $3
            "#,
        )
        .bind(status.as_str())
        .bind(paid_at)
        .bind(order_id)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::OrderNotFound(order_id.to_string()));
        }

        Ok(())
    }
}
