//! Mesa Client - remote store access for the lifecycle engine
//!
//! Wraps create/read/update/delete and change notifications against the
//! shared remote store. Two backends implement [`RemoteStore`]:
//! - [`HttpStore`]: PostgREST-style REST API over reqwest
//! - [`MemoryStore`]: in-process store shared by several terminals in tests
//!
//! [`RemoteSyncClient`] sits on top and speaks entity types, handling the
//! wire naming convention and JSON-encoded sub-structures via [`wire`].

pub mod config;
pub mod error;
pub mod http;
pub mod invoice;
pub mod memory;
pub mod store;
pub mod sync_client;
pub mod wire;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use http::HttpStore;
pub use invoice::{HttpInvoiceCounter, InvoiceCounter, MemoryInvoiceCounter};
pub use memory::MemoryStore;
pub use store::{ChangeSignal, Collection, RemoteStore, Row};
pub use sync_client::RemoteSyncClient;
