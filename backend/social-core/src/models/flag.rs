//! Flag rows: one per (flagged item, flagging user), stored under the flagged
//! item's partition with sort key `flag/{userId}`.

use chrono::{DateTime, Utc};
use doc_store::{Condition, Index, PrimaryKey, Query, StoreClient, StoreResult, PARTITION_KEY};
use serde::{Deserialize, Serialize};

use super::{from_item, to_item};
use crate::timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagItem {
    pub partition_key: String,
    pub sort_key: String,
    pub schema_version: u32,
    pub user_id: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct FlagDynamo {
    client: StoreClient,
}

impl FlagDynamo {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    pub fn pk(item_partition_key: &str, user_id: &str) -> PrimaryKey {
        PrimaryKey::new(item_partition_key, format!("flag/{user_id}"))
    }

    pub async fn get_flag(&self, item_partition_key: &str, user_id: &str) -> StoreResult<Option<FlagItem>> {
        self.client
            .get_item(&Self::pk(item_partition_key, user_id), false)
            .await?
            .map(from_item)
            .transpose()
    }

    /// Fails with `ConditionalCheckFailed` if the user already flagged the item.
    pub async fn add_flag(
        &self,
        item_partition_key: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<FlagItem> {
        let key = Self::pk(item_partition_key, user_id);
        let flag = FlagItem {
            partition_key: key.partition_key,
            sort_key: key.sort_key,
            schema_version: 0,
            user_id: user_id.to_string(),
            created_at: now,
        };
        self.client.add_item(to_item(&flag)?).await?;
        Ok(flag)
    }

    /// Fails with `ConditionalCheckFailed` if there is no such flag.
    pub async fn delete_flag(&self, item_partition_key: &str, user_id: &str) -> StoreResult<()> {
        self.client
            .delete_item(
                &Self::pk(item_partition_key, user_id),
                Some(&Condition::exists(PARTITION_KEY)),
            )
            .await?;
        Ok(())
    }

    pub async fn delete_all_on_item(&self, item_partition_key: &str) -> StoreResult<usize> {
        let query = Query::new(Index::Primary, item_partition_key)
            .sort_begins_with("flag/")
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
