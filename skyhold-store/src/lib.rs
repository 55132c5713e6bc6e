pub mod app_config;
pub mod booking_repo;
pub mod catalog_repo;
pub mod database;
mod inventory;
pub mod memory;
pub mod payment_repo;
pub mod redis_repo;
pub mod user_repo;

pub use booking_repo::PgBookingRepository;
pub use catalog_repo::PgCatalog;
pub use database::DbClient;
pub use memory::MemoryStore;
pub use payment_repo::PgPaymentRepository;
pub use redis_repo::RedisClient;
pub use user_repo::PgIdentity;
