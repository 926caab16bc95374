//! Unified error codes for the Mesa workspace
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 4xxx: Order errors (drafts, kitchen tickets, bills)
//! - 5xxx: Payment errors
//! - 7xxx: Table errors
//! - 8xxx: Booking errors (reservations, events)
//! - 9xxx: Sync / system errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 4xxx: Order ====================
    /// Draft order is empty
    OrderEmpty = 4001,
    /// Order item not found
    OrderItemNotFound = 4002,
    /// Item was already sent to the kitchen
    ItemImmutable = 4003,
    /// Draft changed since the caller last saw it
    DraftStale = 4004,
    /// Kitchen ticket not found
    TicketNotFound = 4005,
    /// Nothing to bill
    BillEmpty = 4006,

    // ==================== 5xxx: Payment ====================
    /// Payment amount is invalid
    PaymentInvalidAmount = 5001,
    /// Payment exceeds outstanding quantity
    PaymentExceedsOutstanding = 5002,

    // ==================== 7xxx: Table ====================
    /// Table not found
    TableNotFound = 7001,
    /// Table has a draft, open tickets or an open bill
    TableBusy = 7002,

    // ==================== 8xxx: Booking ====================
    /// Reservation not found
    ReservationNotFound = 8001,
    /// Status transition not allowed
    InvalidStatusTransition = 8002,
    /// Event not found
    EventNotFound = 8101,
    /// Deposit status transition not allowed
    DepositTransitionInvalid = 8102,
    /// Invoice number could not be assigned
    InvoiceAssignmentFailed = 8103,
    /// Event menu not found
    EventMenuNotFound = 8104,

    // ==================== 9xxx: System ====================
    /// Internal error
    InternalError = 9001,
    /// Remote store call failed
    SyncFailed = 9002,
    /// Remote store unreachable
    RemoteUnavailable = 9003,
    /// Serialization error
    SerializationError = 9004,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Order
            ErrorCode::OrderEmpty => "Order is empty",
            ErrorCode::OrderItemNotFound => "Order item not found",
            ErrorCode::ItemImmutable => "Item was already sent and cannot be modified",
            ErrorCode::DraftStale => "Draft order changed since it was last read",
            ErrorCode::TicketNotFound => "Kitchen ticket not found",
            ErrorCode::BillEmpty => "Nothing to bill",

            // Payment
            ErrorCode::PaymentInvalidAmount => "Invalid payment amount",
            ErrorCode::PaymentExceedsOutstanding => "Payment exceeds outstanding amount",

            // Table
            ErrorCode::TableNotFound => "Table not found",
            ErrorCode::TableBusy => "Table has an active order, ticket or bill",

            // Booking
            ErrorCode::ReservationNotFound => "Reservation not found",
            ErrorCode::InvalidStatusTransition => "Status transition not allowed",
            ErrorCode::EventNotFound => "Event not found",
            ErrorCode::DepositTransitionInvalid => "Deposit status transition not allowed",
            ErrorCode::InvoiceAssignmentFailed => "Invoice number could not be assigned",
            ErrorCode::EventMenuNotFound => "Event menu not found",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::SyncFailed => "Remote synchronization failed",
            ErrorCode::RemoteUnavailable => "Remote store is unavailable",
            ErrorCode::SerializationError => "Serialization error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),
            7 => Ok(ErrorCode::RequiredField),
            8 => Ok(ErrorCode::ValueOutOfRange),

            // Order
            4001 => Ok(ErrorCode::OrderEmpty),
            4002 => Ok(ErrorCode::OrderItemNotFound),
            4003 => Ok(ErrorCode::ItemImmutable),
            4004 => Ok(ErrorCode::DraftStale),
            4005 => Ok(ErrorCode::TicketNotFound),
            4006 => Ok(ErrorCode::BillEmpty),

            // Payment
            5001 => Ok(ErrorCode::PaymentInvalidAmount),
            5002 => Ok(ErrorCode::PaymentExceedsOutstanding),

            // Table
            7001 => Ok(ErrorCode::TableNotFound),
            7002 => Ok(ErrorCode::TableBusy),

            // Booking
            8001 => Ok(ErrorCode::ReservationNotFound),
            8002 => Ok(ErrorCode::InvalidStatusTransition),
            8101 => Ok(ErrorCode::EventNotFound),
            8102 => Ok(ErrorCode::DepositTransitionInvalid),
            8103 => Ok(ErrorCode::InvoiceAssignmentFailed),
            8104 => Ok(ErrorCode::EventMenuNotFound),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::SyncFailed),
            9003 => Ok(ErrorCode::RemoteUnavailable),
            9004 => Ok(ErrorCode::SerializationError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
