//! Shared types for the Mesa workspace
//!
//! Domain models, order types, error codes and change notices used by both
//! the remote client and the lifecycle engine.

pub mod error;
pub mod message;
pub mod models;
pub mod order;
pub mod types;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::{AppError, AppResult, ErrorCode};
pub use message::{ChangeAction, ChangeNotice, EntityKind, SyncFailure, SyncOp};
pub use types::{EntityId, Timestamp};
