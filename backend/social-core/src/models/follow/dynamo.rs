use chrono::{DateTime, Utc};
use doc_store::{get_str, Condition, Index, PrimaryKey, Query, StoreClient, StoreResult, Update};

use super::{Follow, FollowStatus};
use crate::models::{from_item, to_item};
use crate::timestamp;

#[derive(Clone)]
pub struct FollowDynamo {
    client: StoreClient,
}

fn status_sort_key(status: FollowStatus, followed_at: &DateTime<Utc>) -> String {
    format!("{}/{}", status.as_str(), timestamp::format(followed_at))
}

impl FollowDynamo {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    pub fn pk(follower_user_id: &str, followed_user_id: &str) -> PrimaryKey {
        PrimaryKey::new(
            format!("user/{followed_user_id}"),
            format!("follower/{follower_user_id}"),
        )
    }

    pub async fn get_following(
        &self,
        follower_user_id: &str,
        followed_user_id: &str,
    ) -> StoreResult<Option<Follow>> {
        self.client
            .get_item(&Self::pk(follower_user_id, followed_user_id), false)
            .await?
            .map(from_item)
            .transpose()
    }

    /// Fails with `ConditionalCheckFailed` if a row for the pair exists.
    pub async fn add_following(
        &self,
        follower_user_id: &str,
        followed_user_id: &str,
        status: FollowStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<Follow> {
        let key = Self::pk(follower_user_id, followed_user_id);
        let follow = Follow {
            partition_key: key.partition_key,
            sort_key: key.sort_key,
            schema_version: 1,
            gsi_a1_partition_key: format!("follower/{follower_user_id}"),
            gsi_a1_sort_key: status_sort_key(status, &now),
            gsi_a2_partition_key: format!("followed/{followed_user_id}"),
            gsi_a2_sort_key: status_sort_key(status, &now),
            follower_user_id: follower_user_id.to_string(),
            followed_user_id: followed_user_id.to_string(),
            follow_status: status,
            followed_at: now,
        };
        self.client.add_item(to_item(&follow)?).await?;
        Ok(follow)
    }

    /// Move the row to `status`, failing with `ConditionalCheckFailed` if its
    /// status changed since `follow` was read.
    pub async fn update_following_status(&self, follow: &Follow, status: FollowStatus) -> StoreResult<Follow> {
        let sort_key = status_sort_key(status, &follow.followed_at);
        let update = Update::new()
            .set("followStatus", status.as_str())
            .set("gsiA1SortKey", sort_key.clone())
            .set("gsiA2SortKey", sort_key);
        let item = self
            .client
            .update_item(
                &Self::pk(&follow.follower_user_id, &follow.followed_user_id),
                &update,
                Some(&Condition::equals("followStatus", follow.follow_status.as_str())),
            )
            .await?;
        from_item(item)
    }

    pub async fn delete_following(
        &self,
        follower_user_id: &str,
        followed_user_id: &str,
    ) -> StoreResult<Option<Follow>> {
        self.client
            .delete_item(&Self::pk(follower_user_id, followed_user_id), None)
            .await?
            .map(from_item)
            .transpose()
    }

    async fn user_ids(&self, query: Query, attribute: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .client
            .query_all(query)
            .await?
            .iter()
            .filter_map(|item| get_str(item, attribute).map(str::to_string))
            .collect())
    }

    /// Ids of the users following `followed_user_id` with the given status.
    pub async fn follower_user_ids_with_status(
        &self,
        followed_user_id: &str,
        status: FollowStatus,
    ) -> StoreResult<Vec<String>> {
        let query = Query::new(Index::GsiA2, format!("followed/{followed_user_id}"))
            .sort_begins_with(format!("{}/", status.as_str()));
        self.user_ids(query, "followerUserId").await
    }

    /// Ids of the users actively following `followed_user_id`.
    pub async fn follower_user_ids(&self, followed_user_id: &str) -> StoreResult<Vec<String>> {
        self.follower_user_ids_with_status(followed_user_id, FollowStatus::Following)
            .await
    }

    /// Ids of the users `follower_user_id` actively follows.
    pub async fn followed_user_ids(&self, follower_user_id: &str) -> StoreResult<Vec<String>> {
        let query = Query::new(Index::GsiA1, format!("follower/{follower_user_id}"))
            .sort_begins_with(format!("{}/", FollowStatus::Following.as_str()));
        self.user_ids(query, "followedUserId").await
    }
}
