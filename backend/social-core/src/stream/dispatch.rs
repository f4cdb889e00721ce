use doc_store::Item;
use tracing::{debug, error};

use super::{EventName, StreamRecord};
use crate::error::UserError;
use crate::metrics::STREAM_RECORDS_TOTAL;
use crate::models::user::UserManager;

/// A user sync method and the attributes whose change triggers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncHandler {
    RequestedFollowersCard,
    ChatsWithNewMessagesCard,
    UserStatusDueToChatMessages,
    UserStatusDueToComments,
    UserStatusDueToPosts,
    SearchIndex,
    PushEmail,
    PushPhone,
    PushUserStatus,
}

impl SyncHandler {
    pub const ALL: [SyncHandler; 9] = [
        SyncHandler::RequestedFollowersCard,
        SyncHandler::ChatsWithNewMessagesCard,
        SyncHandler::UserStatusDueToChatMessages,
        SyncHandler::UserStatusDueToComments,
        SyncHandler::UserStatusDueToPosts,
        SyncHandler::SearchIndex,
        SyncHandler::PushEmail,
        SyncHandler::PushPhone,
        SyncHandler::PushUserStatus,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SyncHandler::RequestedFollowersCard => "requested_followers_card",
            SyncHandler::ChatsWithNewMessagesCard => "chats_with_new_messages_card",
            SyncHandler::UserStatusDueToChatMessages => "user_status_due_to_chat_messages",
            SyncHandler::UserStatusDueToComments => "user_status_due_to_comments",
            SyncHandler::UserStatusDueToPosts => "user_status_due_to_posts",
            SyncHandler::SearchIndex => "search_index",
            SyncHandler::PushEmail => "push_email",
            SyncHandler::PushPhone => "push_phone",
            SyncHandler::PushUserStatus => "push_user_status",
        }
    }

    pub fn watched_attributes(&self) -> &'static [&'static str] {
        match self {
            SyncHandler::RequestedFollowersCard => &["followersRequestedCount"],
            SyncHandler::ChatsWithNewMessagesCard => &["chatsWithUnviewedMessagesCount"],
            SyncHandler::UserStatusDueToChatMessages => {
                &["chatMessagesCreationCount", "chatMessagesForcedDeletionCount"]
            }
            SyncHandler::UserStatusDueToComments => &[
                "commentCount",
                "commentDeletedCount",
                "commentForcedDeletionCount",
            ],
            SyncHandler::UserStatusDueToPosts => &[
                "postCount",
                "postArchivedCount",
                "postDeletedCount",
                "postForcedArchivingCount",
            ],
            SyncHandler::SearchIndex => &["username", "fullName"],
            SyncHandler::PushEmail => &["email"],
            SyncHandler::PushPhone => &["phoneNumber"],
            SyncHandler::PushUserStatus => &["userStatus"],
        }
    }

    /// Whether any watched attribute differs between the two images.
    pub fn is_triggered_by(&self, old: Option<&Item>, new: Option<&Item>) -> bool {
        self.watched_attributes().iter().any(|attribute| {
            old.and_then(|item| item.get(*attribute)) != new.and_then(|item| item.get(*attribute))
        })
    }

    async fn invoke(
        &self,
        users: &UserManager,
        user_id: &str,
        old: Option<&Item>,
        new: Option<&Item>,
    ) -> Result<(), UserError> {
        match self {
            SyncHandler::RequestedFollowersCard => {
                users.sync_requested_followers_card(user_id, old, new).await
            }
            SyncHandler::ChatsWithNewMessagesCard => {
                users.sync_chats_with_new_messages_card(user_id, old, new).await
            }
            SyncHandler::UserStatusDueToChatMessages => {
                users.sync_user_status_due_to_chat_messages(user_id, old, new).await
            }
            SyncHandler::UserStatusDueToComments => {
                users.sync_user_status_due_to_comments(user_id, old, new).await
            }
            SyncHandler::UserStatusDueToPosts => {
                users.sync_user_status_due_to_posts(user_id, old, new).await
            }
            SyncHandler::SearchIndex => users.sync_search_index(user_id, old, new).await,
            SyncHandler::PushEmail => users.sync_push_email(user_id, old, new).await,
            SyncHandler::PushPhone => users.sync_push_phone(user_id, old, new).await,
            SyncHandler::PushUserStatus => users.sync_push_user_status(user_id, old, new).await,
        }
    }
}

/// What a single record set off.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub invoked: Vec<SyncHandler>,
    pub failed: Vec<SyncHandler>,
}

impl DispatchOutcome {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Routes user profile changes to the sync methods watching the changed
/// attributes. Inserts and removals run every handler.
#[derive(Clone)]
pub struct UserSyncDispatcher {
    user_manager: UserManager,
}

impl UserSyncDispatcher {
    pub fn new(user_manager: UserManager) -> Self {
        Self { user_manager }
    }

    pub async fn dispatch(&self, record: &StreamRecord) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let Some(user_id) = record.user_profile_id() else {
            STREAM_RECORDS_TOTAL.with_label_values(&["skipped"]).inc();
            return outcome;
        };
        let old = record.old_image.as_ref();
        let new = record.new_image.as_ref();

        for handler in SyncHandler::ALL {
            let triggered = match record.event_name {
                EventName::Insert | EventName::Remove => true,
                EventName::Modify => handler.is_triggered_by(old, new),
            };
            if !triggered {
                continue;
            }
            outcome.invoked.push(handler);
            if let Err(err) = handler.invoke(&self.user_manager, user_id, old, new).await {
                error!(
                    user_id = %user_id,
                    handler = handler.name(),
                    error = %err,
                    "User sync handler failed"
                );
                outcome.failed.push(handler);
            }
        }

        let label = if outcome.is_ok() { "ok" } else { "failed" };
        STREAM_RECORDS_TOTAL.with_label_values(&[label]).inc();
        debug!(
            user_id = %user_id,
            invoked = outcome.invoked.len(),
            failed = outcome.failed.len(),
            "Dispatched user record"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: serde_json::Value) -> Item {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_handler_triggers_on_watched_attributes_only() {
        let old = item(json!({"username": "spock", "email": "a@real.app", "commentCount": 1}));
        let new = item(json!({"username": "spock", "email": "b@real.app", "commentCount": 1}));

        let triggered: Vec<_> = SyncHandler::ALL
            .into_iter()
            .filter(|handler| handler.is_triggered_by(Some(&old), Some(&new)))
            .collect();
        assert_eq!(triggered, vec![SyncHandler::PushEmail]);
    }

    #[test]
    fn test_added_attribute_triggers() {
        let old = item(json!({"username": "spock"}));
        let new = item(json!({"username": "spock", "fullName": "Spock"}));
        assert!(SyncHandler::SearchIndex.is_triggered_by(Some(&old), Some(&new)));
        assert!(!SyncHandler::PushPhone.is_triggered_by(Some(&old), Some(&new)));
    }
}
