//! View rows: one per (viewed item, viewer), stored under the viewed item's
//! partition with sort key `view/{userId}`.

use chrono::{DateTime, Utc};
use doc_store::{Condition, Index, PrimaryKey, Query, StoreClient, StoreResult, Update, PARTITION_KEY};
use serde::{Deserialize, Serialize};

use super::{from_item, to_item};
use crate::timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewItem {
    pub partition_key: String,
    pub sort_key: String,
    pub schema_version: u32,
    pub user_id: String,
    pub view_count: i64,
    #[serde(with = "timestamp")]
    pub first_viewed_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub last_viewed_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ViewDynamo {
    client: StoreClient,
}

impl ViewDynamo {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    pub fn pk(item_partition_key: &str, user_id: &str) -> PrimaryKey {
        PrimaryKey::new(item_partition_key, format!("view/{user_id}"))
    }

    pub async fn get_view(&self, item_partition_key: &str, user_id: &str) -> StoreResult<Option<ViewItem>> {
        self.client
            .get_item(&Self::pk(item_partition_key, user_id), false)
            .await?
            .map(from_item)
            .transpose()
    }

    /// First view by this user; fails with `ConditionalCheckFailed` if one exists.
    pub async fn add_view(
        &self,
        item_partition_key: &str,
        user_id: &str,
        view_count: i64,
        viewed_at: DateTime<Utc>,
    ) -> StoreResult<ViewItem> {
        let key = Self::pk(item_partition_key, user_id);
        let view = ViewItem {
            partition_key: key.partition_key,
            sort_key: key.sort_key,
            schema_version: 0,
            user_id: user_id.to_string(),
            view_count,
            first_viewed_at: viewed_at,
            last_viewed_at: viewed_at,
        };
        self.client.add_item(to_item(&view)?).await?;
        Ok(view)
    }

    pub async fn increment_view_count(
        &self,
        item_partition_key: &str,
        user_id: &str,
        view_count: i64,
        viewed_at: DateTime<Utc>,
    ) -> StoreResult<ViewItem> {
        let update = Update::new()
            .add("viewCount", view_count)
            .set("lastViewedAt", timestamp::format(&viewed_at));
        let item = self
            .client
            .update_item(
                &Self::pk(item_partition_key, user_id),
                &update,
                Some(&Condition::exists(PARTITION_KEY)),
            )
            .await?;
        from_item(item)
    }

    /// Delete every view recorded on the item. Returns how many were removed.
    pub async fn delete_views(&self, item_partition_key: &str) -> StoreResult<usize> {
        let query = Query::new(Index::Primary, item_partition_key)
            .sort_begins_with("view/")
            .keys_only();
        let keys = self
            .client
            .query_all(query)
            .await?
            .iter()
            .map(PrimaryKey::from_item)
            .collect::<StoreResult<Vec<_>>>()?;
        self.client.batch_delete_items(keys).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_add_increment_and_delete_views() {
        let dynamo = ViewDynamo::new(StoreClient::in_memory());
        let first = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap();

        dynamo.add_view("comment/c1", "u1", 2, first).await.unwrap();
        assert!(dynamo
            .add_view("comment/c1", "u1", 1, second)
            .await
            .unwrap_err()
            .is_conditional_check_failed());

        let view = dynamo
            .increment_view_count("comment/c1", "u1", 3, second)
            .await
            .unwrap();
        assert_eq!(view.view_count, 5);
        assert_eq!(view.first_viewed_at, first);
        assert_eq!(view.last_viewed_at, second);

        dynamo.add_view("comment/c1", "u2", 1, second).await.unwrap();
        assert_eq!(dynamo.delete_views("comment/c1").await.unwrap(), 2);
        assert!(dynamo.get_view("comment/c1", "u1").await.unwrap().is_none());
    }
}
