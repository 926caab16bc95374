use shared::error::{AppError, ErrorCode};
use shared::message::{EntityKind, SyncOp};
use shared::types::EntityId;
use thiserror::Error;

use super::ledger::OpId;

/// A remote commit that did not go through
///
/// Carries the failed operation so it can be retried or discarded through
/// the pending-operation ledger.
#[derive(Debug, Clone, Error)]
#[error("{op} of {kind} {id} failed: {message}")]
pub struct SyncError {
    pub op_id: OpId,
    pub op: SyncOp,
    pub kind: EntityKind,
    pub id: EntityId,
    pub message: String,
    /// Whether the local change was rolled back
    pub reverted: bool,
}

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Nothing to send or bill for table {0}")]
    EmptyOrder(EntityId),

    #[error("Nothing on the bill for table {0}")]
    EmptyBill(EntityId),

    #[error("Invalid payment: {0}")]
    InvalidPayment(String),

    #[error("Cannot pay {requested} of {unique_id}: only {unpaid} unpaid")]
    Overpayment {
        unique_id: String,
        requested: i32,
        unpaid: i32,
    },

    #[error("Item {0} was already sent to the kitchen")]
    ImmutableItem(String),

    #[error("Table {0} has an open draft, kitchen tickets or bill")]
    TableBusy(EntityId),

    #[error("Invoice number assignment failed: {0}")]
    InvoiceAssignment(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Invalid transition for {kind}: {from} -> {to}")]
    InvalidTransition {
        kind: EntityKind,
        from: String,
        to: String,
    },

    #[error("Deposit cannot move from {from} to {to}")]
    DepositTransition { from: String, to: String },

    #[error("Draft for table {table} changed (expected version {expected}, current {current})")]
    StaleDraft {
        table: EntityId,
        expected: u64,
        current: u64,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn transition(kind: EntityKind, from: impl std::fmt::Debug, to: impl std::fmt::Debug) -> Self {
        StoreError::InvalidTransition {
            kind,
            from: format!("{:?}", from),
            to: format!("{:?}", to),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(msg) => AppError::validation(msg),
            StoreError::Sync(e) => AppError::with_message(ErrorCode::SyncFailed, e.to_string())
                .with_detail("op", e.op.to_string())
                .with_detail("kind", e.kind.as_str())
                .with_detail("id", e.id.to_string())
                .with_detail("opId", e.op_id.to_string())
                .with_detail("reverted", e.reverted),
            StoreError::EmptyOrder(table) => {
                AppError::new(ErrorCode::OrderEmpty).with_detail("tableId", table.to_string())
            }
            StoreError::EmptyBill(table) => {
                AppError::new(ErrorCode::BillEmpty).with_detail("tableId", table.to_string())
            }
            StoreError::InvalidPayment(msg) => AppError::with_message(ErrorCode::PaymentInvalidAmount, msg),
            e @ StoreError::Overpayment { .. } => {
                AppError::with_message(ErrorCode::PaymentExceedsOutstanding, e.to_string())
            }
            StoreError::ImmutableItem(uid) => {
                AppError::new(ErrorCode::ItemImmutable).with_detail("uniqueId", uid)
            }
            StoreError::TableBusy(table) => {
                AppError::new(ErrorCode::TableBusy).with_detail("tableId", table.to_string())
            }
            StoreError::InvoiceAssignment(msg) => {
                AppError::with_message(ErrorCode::InvoiceAssignmentFailed, msg)
            }
            StoreError::NotFound { kind, id } => {
                let code = match kind {
                    EntityKind::Table => ErrorCode::TableNotFound,
                    EntityKind::Reservation => ErrorCode::ReservationNotFound,
                    EntityKind::EventBudget => ErrorCode::EventNotFound,
                    EntityKind::EventMenu => ErrorCode::EventMenuNotFound,
                    EntityKind::KitchenTicket => ErrorCode::TicketNotFound,
                    EntityKind::Draft | EntityKind::Bill => ErrorCode::OrderItemNotFound,
                    EntityKind::VenueInfo => ErrorCode::NotFound,
                };
                AppError::with_message(code, format!("{} not found: {}", kind, id))
                    .with_detail("id", id)
            }
            StoreError::InvalidTransition { kind, from, to } => {
                AppError::new(ErrorCode::InvalidStatusTransition)
                    .with_detail("kind", kind.as_str())
                    .with_detail("from", from)
                    .with_detail("to", to)
            }
            StoreError::DepositTransition { from, to } => AppError::new(ErrorCode::DepositTransitionInvalid)
                .with_detail("from", from)
                .with_detail("to", to),
            e @ StoreError::StaleDraft { .. } => {
                AppError::with_message(ErrorCode::DraftStale, e.to_string())
            }
            StoreError::Internal(msg) => AppError::internal(msg),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
