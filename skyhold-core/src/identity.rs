use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use skyhold_shared::Masked;

use crate::booking::UserId;
use crate::CoreResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub full_name: String,
    pub email: Masked<String>,
}

/// Read-only user lookup; registration and login live elsewhere
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn user_by_id(&self, id: UserId) -> CoreResult<Option<UserProfile>>;
}
