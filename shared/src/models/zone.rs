//! Zone Model

use serde::{Deserialize, Serialize};

use crate::types::EntityId;

/// Zone (区域：大厅、露台、包厢等)
///
/// Zones are not stored on their own; they are the distinct `zone` names of
/// the table layout, listed in the order their first table was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub name: String,
    pub table_ids: Vec<EntityId>,
}
