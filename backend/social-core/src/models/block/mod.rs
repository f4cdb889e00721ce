//! Blocks between users.

mod dynamo;
mod manager;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use dynamo::BlockDynamo;
pub use manager::BlockManager;

use crate::timestamp;

/// Block row: pk `block/{blockerUserId}/{blockedUserId}`, sk `-`. GSI-A1 lists
/// by blocker, GSI-A2 by blocked user, both sorted by `blockedAt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub partition_key: String,
    pub sort_key: String,
    #[serde(default)]
    pub schema_version: u32,
    pub gsi_a1_partition_key: String,
    pub gsi_a1_sort_key: String,
    pub gsi_a2_partition_key: String,
    pub gsi_a2_sort_key: String,
    pub blocker_user_id: String,
    pub blocked_user_id: String,
    #[serde(with = "timestamp")]
    pub blocked_at: DateTime<Utc>,
}
