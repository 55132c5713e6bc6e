pub mod assembler;
pub mod codes;
pub mod expiry;
pub mod gateway;
pub mod passenger;
pub mod reconciliation;
pub mod state_machine;
pub mod webhook;

#[cfg(test)]
mod test_support;

pub use assembler::{OrderAssembler, OrderConfirmation, OrderItem, PassengerInput};
pub use expiry::{ExpirySweeper, SweepReport};
pub use gateway::MockPaymentAdapter;
pub use reconciliation::{PaymentReconciler, WebhookOutcome};
pub use state_machine::BookingStateMachine;
pub use webhook::{GatewayEvent, PaymentNotification};
