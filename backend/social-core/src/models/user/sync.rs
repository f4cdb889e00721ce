//! Derived-state sync driven by changes to a user's profile row.
//!
//! Every method takes the user id plus the row image before and after the
//! change (`None` when the row did not or no longer exists) and is idempotent:
//! running it again on the same images repeats the same external call.

use chrono::Utc;
use doc_store::{get_i64, get_str, Item};
use tracing::{debug, warn};

use super::{ForcedDisableTrigger, User, UserManager, UserStatus};
use crate::clients::Channel;
use crate::error::UserError;
use crate::metrics::USER_FORCE_DISABLED_TOTAL;
use crate::models::card::CardSpec;

impl UserManager {
    pub async fn sync_requested_followers_card(
        &self,
        user_id: &str,
        _old: Option<&Item>,
        new: Option<&Item>,
    ) -> Result<(), UserError> {
        let count = new.and_then(|item| get_i64(item, "followersRequestedCount")).unwrap_or(0);
        self.sync_count_card(CardSpec::requested_followers(user_id, count), count)
            .await
    }

    pub async fn sync_chats_with_new_messages_card(
        &self,
        user_id: &str,
        _old: Option<&Item>,
        new: Option<&Item>,
    ) -> Result<(), UserError> {
        let count = new
            .and_then(|item| get_i64(item, "chatsWithUnviewedMessagesCount"))
            .unwrap_or(0);
        self.sync_count_card(CardSpec::chat_activity(user_id, count), count)
            .await
    }

    async fn sync_count_card(&self, spec: CardSpec, count: i64) -> Result<(), UserError> {
        if count > 0 {
            self.card_manager
                .add_or_update_card_by_spec(&spec, Utc::now())
                .await?;
        } else {
            self.card_manager.remove_card_by_spec_if_exists(&spec).await?;
        }
        Ok(())
    }

    pub async fn sync_user_status_due_to_chat_messages(
        &self,
        user_id: &str,
        _old: Option<&Item>,
        new: Option<&Item>,
    ) -> Result<(), UserError> {
        self.sync_user_status_due_to(user_id, new, ForcedDisableTrigger::ChatMessages)
            .await
    }

    pub async fn sync_user_status_due_to_comments(
        &self,
        user_id: &str,
        _old: Option<&Item>,
        new: Option<&Item>,
    ) -> Result<(), UserError> {
        self.sync_user_status_due_to(user_id, new, ForcedDisableTrigger::Comments)
            .await
    }

    pub async fn sync_user_status_due_to_posts(
        &self,
        user_id: &str,
        _old: Option<&Item>,
        new: Option<&Item>,
    ) -> Result<(), UserError> {
        self.sync_user_status_due_to(user_id, new, ForcedDisableTrigger::Posts)
            .await
    }

    async fn sync_user_status_due_to(
        &self,
        user_id: &str,
        new: Option<&Item>,
        trigger: ForcedDisableTrigger,
    ) -> Result<(), UserError> {
        let Some(item) = new else {
            return Ok(());
        };
        let user = User::from_item(item).map_err(|err| UserError::MalformedItem(err.to_string()))?;
        if user.user_status != UserStatus::Active || !user.is_forced_disabling_criteria_met(trigger) {
            return Ok(());
        }

        self.set_user_status(user_id, UserStatus::Disabled).await?;
        USER_FORCE_DISABLED_TOTAL
            .with_label_values(&[trigger.as_str()])
            .inc();
        warn!(
            user_id = %user_id,
            username = %user.username,
            trigger = trigger.as_str(),
            "USER_FORCE_DISABLED: user `{}` with username `{}` disabled due to {}",
            user_id,
            user.username,
            trigger.as_str()
        );
        Ok(())
    }

    pub async fn sync_search_index(
        &self,
        user_id: &str,
        _old: Option<&Item>,
        new: Option<&Item>,
    ) -> Result<(), UserError> {
        let Some(client) = &self.search_client else {
            debug!(user_id = %user_id, "No search client configured, skipping index sync");
            return Ok(());
        };
        match new {
            None => client.delete_user(user_id).await?,
            Some(item) => {
                let username = get_str(item, "username").ok_or_else(|| {
                    UserError::MalformedItem(format!("user `{user_id}` has no username"))
                })?;
                client
                    .put_user(user_id, username, get_str(item, "fullName"))
                    .await?
            }
        }
        Ok(())
    }

    pub async fn sync_push_email(
        &self,
        user_id: &str,
        _old: Option<&Item>,
        new: Option<&Item>,
    ) -> Result<(), UserError> {
        self.sync_push_channel(user_id, new, Channel::Email, "email")
            .await
    }

    pub async fn sync_push_phone(
        &self,
        user_id: &str,
        _old: Option<&Item>,
        new: Option<&Item>,
    ) -> Result<(), UserError> {
        self.sync_push_channel(user_id, new, Channel::Sms, "phoneNumber")
            .await
    }

    async fn sync_push_channel(
        &self,
        user_id: &str,
        new: Option<&Item>,
        channel: Channel,
        attribute: &str,
    ) -> Result<(), UserError> {
        let Some(client) = &self.push_client else {
            debug!(user_id = %user_id, channel = %channel, "No push client configured, skipping endpoint sync");
            return Ok(());
        };
        match new.and_then(|item| get_str(item, attribute)) {
            Some(address) if !address.is_empty() => {
                client.update_user_endpoint(user_id, channel, address).await?
            }
            _ => client.delete_user_endpoint(user_id, channel).await?,
        }
        Ok(())
    }

    pub async fn sync_push_user_status(
        &self,
        user_id: &str,
        _old: Option<&Item>,
        new: Option<&Item>,
    ) -> Result<(), UserError> {
        let Some(client) = &self.push_client else {
            debug!(user_id = %user_id, "No push client configured, skipping status sync");
            return Ok(());
        };
        let Some(item) = new else {
            client.delete_user_endpoints(user_id).await?;
            return Ok(());
        };
        let status = match item.get("userStatus") {
            None => UserStatus::Active,
            Some(value) => match serde_json::from_value::<UserStatus>(value.clone()) {
                Ok(status) => status,
                Err(_) => {
                    warn!(user_id = %user_id, status = %value, "Unrecognized user status, skipping");
                    return Ok(());
                }
            },
        };
        match status {
            UserStatus::Active => client.enable_user_endpoints(user_id).await?,
            UserStatus::Disabled => client.disable_user_endpoints(user_id).await?,
            UserStatus::Deleting => client.delete_user_endpoints(user_id).await?,
        }
        Ok(())
    }
}
