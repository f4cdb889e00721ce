//! Follow relationships between users.

mod dynamo;
mod manager;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use dynamo::FollowDynamo;
pub use manager::FollowManager;

use crate::timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FollowStatus {
    Requested,
    Following,
    Denied,
}

impl FollowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowStatus::Requested => "REQUESTED",
            FollowStatus::Following => "FOLLOWING",
            FollowStatus::Denied => "DENIED",
        }
    }
}

/// Follow row: pk `user/{followedUserId}`, sk `follower/{followerUserId}`.
///
/// GSI-A1 lists whom a user follows, GSI-A2 who follows a user, both sorted by
/// `{status}/{followedAt}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Follow {
    pub partition_key: String,
    pub sort_key: String,
    #[serde(default)]
    pub schema_version: u32,
    pub gsi_a1_partition_key: String,
    pub gsi_a1_sort_key: String,
    pub gsi_a2_partition_key: String,
    pub gsi_a2_sort_key: String,
    pub follower_user_id: String,
    pub followed_user_id: String,
    pub follow_status: FollowStatus,
    #[serde(with = "timestamp")]
    pub followed_at: DateTime<Utc>,
}

impl Follow {
    pub fn status(&self) -> FollowStatus {
        self.follow_status
    }

    pub fn is_following(&self) -> bool {
        self.follow_status == FollowStatus::Following
    }
}
