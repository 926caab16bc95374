//! Order types
//!
//! Line items move through three holders, each keyed by table:
//! - [`OrderDraft`]: mutable draft lines
//! - [`KitchenTicket`]: immutable dispatched batches
//! - [`Bill`]: dispatched lines confirmed for payment

pub mod bill;
pub mod ticket;
pub mod types;

// Re-exports
pub use bill::{Bill, BillLine, BillPayment, PaidLine, PaymentMethod};
pub use ticket::{KitchenTicket, TicketStatus};
pub use types::*;
