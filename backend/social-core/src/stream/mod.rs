//! Change-stream records for the shared table and their routing to the sync
//! methods.

mod dispatch;

use doc_store::{get_str, Item, PARTITION_KEY, SORT_KEY};
use serde::{Deserialize, Serialize};

pub use dispatch::{DispatchOutcome, SyncHandler, UserSyncDispatcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventName {
    Insert,
    Modify,
    Remove,
}

/// One row change: its key plus the row image before and after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRecord {
    pub event_name: EventName,
    pub keys: Item,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_image: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_image: Option<Item>,
}

impl StreamRecord {
    /// The user id when the record is for a user profile row.
    pub fn user_profile_id(&self) -> Option<&str> {
        if get_str(&self.keys, SORT_KEY) != Some("profile") {
            return None;
        }
        get_str(&self.keys, PARTITION_KEY)?.strip_prefix("user/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_record() {
        let line = json!({
            "eventName": "MODIFY",
            "keys": {"partitionKey": "user/u1", "sortKey": "profile"},
            "oldImage": {"userId": "u1", "username": "spock"},
            "newImage": {"userId": "u1", "username": "spock", "email": "s@real.app"}
        })
        .to_string();
        let record: StreamRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(record.event_name, EventName::Modify);
        assert_eq!(record.user_profile_id(), Some("u1"));
        assert!(record.old_image.is_some());
    }

    #[test]
    fn test_non_profile_rows_are_not_users() {
        let record: StreamRecord = serde_json::from_value(json!({
            "eventName": "INSERT",
            "keys": {"partitionKey": "user/u1", "sortKey": "follower/u2"},
            "newImage": {}
        }))
        .unwrap();
        assert_eq!(record.user_profile_id(), None);

        let record: StreamRecord = serde_json::from_value(json!({
            "eventName": "REMOVE",
            "keys": {"partitionKey": "post/p1", "sortKey": "profile"}
        }))
        .unwrap();
        assert_eq!(record.user_profile_id(), None);
    }
}
