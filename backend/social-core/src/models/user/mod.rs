//! User profiles, their denormalized counters and the derived-state sync.

mod dynamo;
mod manager;
mod sync;
pub mod text_tags;

use chrono::{DateTime, Utc};
use doc_store::{Item, StoreResult};
use serde::{Deserialize, Serialize};

pub use dynamo::UserDynamo;
pub use manager::{UserDetails, UserManager};
pub use text_tags::TextTag;

use crate::timestamp;

/// Minimum number of items in a category before forced disabling applies.
const FORCED_DISABLING_MIN_COUNT: i64 = 5;
/// Share of forcibly removed items, in percent, that disables the user.
const FORCED_DISABLING_MIN_PERCENT: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    #[default]
    Active,
    Disabled,
    Deleting,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "ACTIVE",
            UserStatus::Disabled => "DISABLED",
            UserStatus::Deleting => "DELETING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrivacyStatus {
    #[default]
    Public,
    Private,
}

impl PrivacyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyStatus::Public => "PUBLIC",
            PrivacyStatus::Private => "PRIVATE",
        }
    }
}

/// Category whose abuse counters can force-disable a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcedDisableTrigger {
    ChatMessages,
    Comments,
    Posts,
}

impl ForcedDisableTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForcedDisableTrigger::ChatMessages => "chatMessages",
            ForcedDisableTrigger::Comments => "comments",
            ForcedDisableTrigger::Posts => "posts",
        }
    }
}

/// Denormalized counters. Absent attributes read as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCounters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_deleted_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_forced_deletion_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_archived_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_deleted_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_forced_archiving_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_messages_creation_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_messages_deletion_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_messages_forced_deletion_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follower_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followed_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers_requested_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chats_with_unviewed_messages_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_has_new_comment_activity_count: Option<i64>,
}

/// User profile row: pk `user/{userId}`, sk `profile`, username index on GSI-A1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub partition_key: String,
    pub sort_key: String,
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default)]
    pub gsi_a1_partition_key: String,
    #[serde(default)]
    pub gsi_a1_sort_key: String,
    pub user_id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub privacy_status: PrivacyStatus,
    #[serde(default)]
    pub user_status: UserStatus,
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub signed_up_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub counters: UserCounters,
}

fn forced_disabling_criteria_met(total: i64, forced: i64) -> bool {
    total >= FORCED_DISABLING_MIN_COUNT
        && forced.saturating_mul(100) >= total.saturating_mul(FORCED_DISABLING_MIN_PERCENT)
}

impl User {
    /// Parse a full user image, as read from the table or a change record.
    pub fn from_item(item: &Item) -> StoreResult<Self> {
        super::from_item(item.clone())
    }

    pub fn id(&self) -> &str {
        &self.user_id
    }

    pub fn is_private(&self) -> bool {
        self.privacy_status == PrivacyStatus::Private
    }

    pub fn is_forced_disabling_criteria_met_by_chat_messages(&self) -> bool {
        let c = &self.counters;
        forced_disabling_criteria_met(
            c.chat_messages_creation_count.unwrap_or(0),
            c.chat_messages_forced_deletion_count.unwrap_or(0),
        )
    }

    pub fn is_forced_disabling_criteria_met_by_comments(&self) -> bool {
        let c = &self.counters;
        forced_disabling_criteria_met(
            c.comment_count
                .unwrap_or(0)
                .saturating_add(c.comment_deleted_count.unwrap_or(0)),
            c.comment_forced_deletion_count.unwrap_or(0),
        )
    }

    pub fn is_forced_disabling_criteria_met_by_posts(&self) -> bool {
        let c = &self.counters;
        forced_disabling_criteria_met(
            c.post_count
                .unwrap_or(0)
                .saturating_add(c.post_archived_count.unwrap_or(0))
                .saturating_add(c.post_deleted_count.unwrap_or(0)),
            c.post_forced_archiving_count.unwrap_or(0),
        )
    }

    pub fn is_forced_disabling_criteria_met(&self, trigger: ForcedDisableTrigger) -> bool {
        match trigger {
            ForcedDisableTrigger::ChatMessages => {
                self.is_forced_disabling_criteria_met_by_chat_messages()
            }
            ForcedDisableTrigger::Comments => self.is_forced_disabling_criteria_met_by_comments(),
            ForcedDisableTrigger::Posts => self.is_forced_disabling_criteria_met_by_posts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(counters: serde_json::Value) -> User {
        let mut item = json!({
            "partitionKey": "user/u1",
            "sortKey": "profile",
            "userId": "u1",
            "username": "spock",
        })
        .as_object()
        .cloned()
        .unwrap();
        item.extend(counters.as_object().cloned().unwrap());
        User::from_item(&item).unwrap()
    }

    #[test]
    fn test_defaults_for_minimal_item() {
        let user = user(json!({}));
        assert_eq!(user.user_status, UserStatus::Active);
        assert_eq!(user.privacy_status, PrivacyStatus::Public);
        assert_eq!(user.counters, UserCounters::default());
    }

    #[test]
    fn test_forced_disabling_needs_minimum_count() {
        // 100% forced but only four items
        let user = user(json!({"chatMessagesCreationCount": 4, "chatMessagesForcedDeletionCount": 4}));
        assert!(!user.is_forced_disabling_criteria_met_by_chat_messages());
    }

    #[test]
    fn test_forced_disabling_threshold_is_ten_percent() {
        let at = user(json!({"commentCount": 8, "commentDeletedCount": 2, "commentForcedDeletionCount": 1}));
        assert!(at.is_forced_disabling_criteria_met_by_comments());

        let below = user(json!({"commentCount": 9, "commentDeletedCount": 2, "commentForcedDeletionCount": 1}));
        assert!(!below.is_forced_disabling_criteria_met_by_comments());
    }

    #[test]
    fn test_forced_disabling_with_huge_counters() {
        let user = user(json!({
            "commentCount": i64::MAX,
            "commentDeletedCount": i64::MAX,
            "commentForcedDeletionCount": i64::MAX,
        }));
        assert!(user.is_forced_disabling_criteria_met_by_comments());
    }

    #[test]
    fn test_posts_count_archived_and_deleted() {
        let user = user(json!({
            "postCount": 1,
            "postArchivedCount": 2,
            "postDeletedCount": 2,
            "postForcedArchivingCount": 1,
        }));
        assert!(user.is_forced_disabling_criteria_met(ForcedDisableTrigger::Posts));
        assert!(!user.is_forced_disabling_criteria_met(ForcedDisableTrigger::ChatMessages));
    }
}
