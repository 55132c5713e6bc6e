use async_trait::async_trait;
use skyhold_core::identity::{IdentityService, UserProfile};
use skyhold_core::{CoreResult, UserId};
use skyhold_shared::Masked;
use sqlx::PgPool;

use crate::database::storage_error;

pub struct PgIdentity {
    pool: PgPool,
}

impl PgIdentity {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityService for PgIdentity {
    async fn user_by_id(&self, id: UserId) -> CoreResult<Option<UserProfile>> {
        let row: Option<(i64, String, String)> =
            sqlx::query_as("SELECT id, full_name, email FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_error)?;

        Ok(row.map(|(id, full_name, email)| UserProfile {
            id,
            full_name,
            email: Masked(email),
        }))
    }
}
