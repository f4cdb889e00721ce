//! Cards: derived notification elements whose presence is recomputed from
//! counters on the user, post and chat rows.

mod dynamo;
mod manager;
pub mod specs;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use dynamo::CardDynamo;
pub use manager::CardManager;
pub use specs::CardSpec;

use crate::timestamp;

/// Card row: pk `card/{cardId}`, listed per user through GSI-A1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub partition_key: String,
    pub sort_key: String,
    pub schema_version: u32,
    pub gsi_a1_partition_key: String,
    pub gsi_a1_sort_key: String,
    pub card_id: String,
    pub user_id: String,
    pub title: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}
