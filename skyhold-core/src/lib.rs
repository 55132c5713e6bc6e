pub mod booking;
pub mod catalog;
pub mod identity;
pub mod payment;
pub mod repository;

pub use booking::{
    Booking, BookingDetail, BookingId, BookingStatus, FlightId, NewBooking, NewBookingDetail,
    PassengerType, SeatClass, TripType, UserId,
};
pub use payment::{PaymentAdapter, PaymentStatus};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("User not found: {0}")]
    UserNotFound(UserId),
    #[error("Flight not found: {0}")]
    FlightNotFound(FlightId),
    #[error("Seat class {seat_class} not available on flight {flight_id}")]
    SeatClassUnavailable {
        flight_id: FlightId,
        seat_class: SeatClass,
    },
    #[error("Insufficient inventory on flight {flight_id} class {seat_class}: requested {requested}")]
    InsufficientInventory {
        flight_id: FlightId,
        seat_class: SeatClass,
        requested: i32,
    },
    #[error("Order not found: {0}")]
    OrderNotFound(String),
    /// The booking was cancelled (usually by the expiry sweep) before this
    /// transition arrived. Matched by payment reconciliation.
    #[error("Booking for order {0} already cancelled")]
    AlreadyCancelled(String),
    #[error("Invalid booking transition from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("Order {0} is already paid")]
    AlreadyPaid(String),
    #[error("Order {0} passed its payment deadline")]
    BookingExpired(String),
    #[error("Webhook token rejected")]
    Unauthorized,
    #[error("Unknown gateway transaction: {0}")]
    UnknownTransaction(String),
    #[error("Booking code or ticket number already taken")]
    DuplicateCode,
    #[error("Payment gateway error: {0}")]
    GatewayError(String),
    #[error("Storage error: {0}")]
    StorageError(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl CoreError {
    pub fn storage<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        CoreError::StorageError(err.into())
    }

    /// Infrastructure failures the caller may retry (gateway redelivery,
    /// client retry). Everything else is a definitive answer.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoreError::StorageError(_) | CoreError::GatewayError(_) | CoreError::InternalError(_)
        )
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
