//! Venue Info Model

use serde::{Deserialize, Serialize};

/// Venue information (singleton row in `venue_info`)
///
/// Handed to the print collaborator alongside finalized events and deposit
/// receipts so the document carries the venue's fiscal identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    /// Tax identification number (NIF)
    #[serde(default)]
    pub nif: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}
