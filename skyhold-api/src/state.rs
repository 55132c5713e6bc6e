use skyhold_core::catalog::CatalogService;
use skyhold_core::repository::BookingRepository;
use skyhold_order::{OrderAssembler, PaymentReconciler};
use skyhold_store::RedisClient;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub assembler: Arc<OrderAssembler>,
    pub reconciler: Arc<PaymentReconciler>,
    pub bookings: Arc<dyn BookingRepository>,
    pub catalog: Arc<dyn CatalogService>,
    /// Rate limiting is off when no Redis is configured
    pub redis: Option<Arc<RedisClient>>,
    pub auth: AuthConfig,
}
