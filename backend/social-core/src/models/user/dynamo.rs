use chrono::{DateTime, Utc};
use doc_store::{
    Condition, Index, PrimaryKey, Query, StoreClient, StoreResult, TransactItem, Update,
    PARTITION_KEY,
};
use tracing::warn;

use super::{PrivacyStatus, User, UserCounters, UserStatus};
use crate::models::{from_item, to_item};

#[derive(Clone)]
pub struct UserDynamo {
    client: StoreClient,
}

impl UserDynamo {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    pub fn pk(user_id: &str) -> PrimaryKey {
        PrimaryKey::new(format!("user/{user_id}"), "profile")
    }

    /// Fails with `ConditionalCheckFailed` if the user id is taken.
    pub async fn add_user(&self, user_id: &str, username: &str, now: DateTime<Utc>) -> StoreResult<User> {
        let key = Self::pk(user_id);
        let user = User {
            partition_key: key.partition_key,
            sort_key: key.sort_key,
            schema_version: 10,
            gsi_a1_partition_key: format!("username/{username}"),
            gsi_a1_sort_key: "-".to_string(),
            user_id: user_id.to_string(),
            username: username.to_string(),
            full_name: None,
            email: None,
            phone_number: None,
            privacy_status: PrivacyStatus::Public,
            user_status: UserStatus::Active,
            signed_up_at: Some(now),
            counters: UserCounters::default(),
        };
        self.client.add_item(to_item(&user)?).await?;
        Ok(user)
    }

    pub async fn get_user(&self, user_id: &str, strongly_consistent: bool) -> StoreResult<Option<User>> {
        self.client
            .get_item(&Self::pk(user_id), strongly_consistent)
            .await?
            .map(from_item)
            .transpose()
    }

    pub async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let query = Query::new(Index::GsiA1, format!("username/{username}")).page_size(1);
        let mut paginator = self.client.paginate(query);
        while let Some(page) = paginator.next_page().await? {
            if let Some(item) = page.into_iter().next() {
                return from_item(item).map(Some);
            }
        }
        Ok(None)
    }

    async fn update_existing(&self, user_id: &str, update: Update) -> StoreResult<User> {
        let item = self
            .client
            .update_item(
                &Self::pk(user_id),
                &update,
                Some(&Condition::exists(PARTITION_KEY)),
            )
            .await?;
        from_item(item)
    }

    pub async fn set_privacy_status(&self, user_id: &str, status: PrivacyStatus) -> StoreResult<User> {
        self.update_existing(user_id, Update::new().set("privacyStatus", status.as_str()))
            .await
    }

    pub async fn set_user_status(&self, user_id: &str, status: UserStatus) -> StoreResult<User> {
        self.update_existing(user_id, Update::new().set("userStatus", status.as_str()))
            .await
    }

    /// Apply an already-built update of profile attributes.
    pub async fn update_details(&self, user_id: &str, update: Update) -> StoreResult<User> {
        self.update_existing(user_id, update).await
    }

    pub fn transact_comment_added(&self, user_id: &str) -> TransactItem {
        TransactItem::update_existing(Self::pk(user_id), Update::new().add("commentCount", 1), None)
    }

    /// With `decrement_comment_count` unset only the deletion tallies move.
    pub fn transact_comment_deleted(
        &self,
        user_id: &str,
        forced: bool,
        decrement_comment_count: bool,
    ) -> TransactItem {
        let mut update = Update::new().add("commentDeletedCount", 1);
        if forced {
            update = update.add("commentForcedDeletionCount", 1);
        }
        if !decrement_comment_count {
            return TransactItem::update_existing(Self::pk(user_id), update, None);
        }
        TransactItem::update_existing(
            Self::pk(user_id),
            update.add("commentCount", -1),
            Some(Condition::greater_than("commentCount", 0)),
        )
    }

    pub fn transact_post_added(&self, user_id: &str) -> TransactItem {
        TransactItem::update_existing(Self::pk(user_id), Update::new().add("postCount", 1), None)
    }

    pub fn transact_post_deleted(&self, user_id: &str) -> TransactItem {
        TransactItem::update_existing(
            Self::pk(user_id),
            Update::new().add("postCount", -1).add("postDeletedCount", 1),
            Some(Condition::greater_than("postCount", 0)),
        )
    }

    /// Returns `None` if the user does not exist.
    pub async fn increment_count(&self, user_id: &str, attribute: &str) -> StoreResult<Option<User>> {
        match self
            .update_existing(user_id, Update::new().add(attribute, 1))
            .await
        {
            Ok(user) => Ok(Some(user)),
            Err(err) if err.is_conditional_check_failed() => {
                warn!(user_id = %user_id, attribute, "Failed to increment count on missing user");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Returns `None` if the user does not exist or the counter is already zero.
    pub async fn decrement_count(&self, user_id: &str, attribute: &str) -> StoreResult<Option<User>> {
        let item = self
            .client
            .update_item(
                &Self::pk(user_id),
                &Update::new().add(attribute, -1),
                Some(&Condition::exists(PARTITION_KEY).and(Condition::greater_than(attribute, 0))),
            )
            .await;
        match item {
            Ok(item) => from_item(item).map(Some),
            Err(err) if err.is_conditional_check_failed() => {
                warn!(user_id = %user_id, attribute, "Failed to decrement count below zero");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_add_and_lookup_by_username() {
        let dynamo = UserDynamo::new(StoreClient::in_memory());
        dynamo.add_user("u1", "spock", now()).await.unwrap();

        let by_name = dynamo.get_user_by_username("spock").await.unwrap().unwrap();
        assert_eq!(by_name.user_id, "u1");
        assert_eq!(by_name.signed_up_at, Some(now()));
        assert!(dynamo.get_user_by_username("kirk").await.unwrap().is_none());
        assert!(dynamo
            .add_user("u1", "other", now())
            .await
            .unwrap_err()
            .is_conditional_check_failed());
    }

    #[tokio::test]
    async fn test_counters_never_go_negative() {
        let dynamo = UserDynamo::new(StoreClient::in_memory());
        dynamo.add_user("u1", "spock", now()).await.unwrap();

        assert!(dynamo.decrement_count("u1", "followerCount").await.unwrap().is_none());
        let user = dynamo.increment_count("u1", "followerCount").await.unwrap().unwrap();
        assert_eq!(user.counters.follower_count, Some(1));
        let user = dynamo.decrement_count("u1", "followerCount").await.unwrap().unwrap();
        assert_eq!(user.counters.follower_count, Some(0));

        assert!(dynamo.increment_count("missing", "followerCount").await.unwrap().is_none());
        assert!(dynamo.get_user("missing", false).await.unwrap().is_none());
    }
}
