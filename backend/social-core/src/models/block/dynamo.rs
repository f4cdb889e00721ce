use chrono::{DateTime, Utc};
use doc_store::{get_str, Index, PrimaryKey, Query, StoreClient, StoreResult};

use super::Block;
use crate::models::{from_item, to_item};
use crate::timestamp;

#[derive(Clone)]
pub struct BlockDynamo {
    client: StoreClient,
}

impl BlockDynamo {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    pub fn pk(blocker_user_id: &str, blocked_user_id: &str) -> PrimaryKey {
        PrimaryKey::new(format!("block/{blocker_user_id}/{blocked_user_id}"), "-")
    }

    pub async fn get_block(&self, blocker_user_id: &str, blocked_user_id: &str) -> StoreResult<Option<Block>> {
        self.client
            .get_item(&Self::pk(blocker_user_id, blocked_user_id), false)
            .await?
            .map(from_item)
            .transpose()
    }

    /// Fails with `ConditionalCheckFailed` if the block already exists.
    pub async fn add_block(
        &self,
        blocker_user_id: &str,
        blocked_user_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Block> {
        let key = Self::pk(blocker_user_id, blocked_user_id);
        let blocked_at = timestamp::format(&now);
        let block = Block {
            partition_key: key.partition_key,
            sort_key: key.sort_key,
            schema_version: 0,
            gsi_a1_partition_key: format!("block/{blocker_user_id}"),
            gsi_a1_sort_key: blocked_at.clone(),
            gsi_a2_partition_key: format!("block/{blocked_user_id}"),
            gsi_a2_sort_key: blocked_at,
            blocker_user_id: blocker_user_id.to_string(),
            blocked_user_id: blocked_user_id.to_string(),
            blocked_at: now,
        };
        self.client.add_item(to_item(&block)?).await?;
        Ok(block)
    }

    pub async fn delete_block(&self, blocker_user_id: &str, blocked_user_id: &str) -> StoreResult<Option<Block>> {
        self.client
            .delete_item(&Self::pk(blocker_user_id, blocked_user_id), None)
            .await?
            .map(from_item)
            .transpose()
    }

    /// Users `blocker_user_id` has blocked, oldest block first.
    pub async fn blocked_user_ids(&self, blocker_user_id: &str) -> StoreResult<Vec<String>> {
        let query = Query::new(Index::GsiA1, format!("block/{blocker_user_id}"));
        Ok(self
            .client
            .query_all(query)
            .await?
            .iter()
            .filter_map(|item| get_str(item, "blockedUserId").map(str::to_string))
            .collect())
    }

    /// Users who have blocked `blocked_user_id`, oldest block first.
    pub async fn blocker_user_ids(&self, blocked_user_id: &str) -> StoreResult<Vec<String>> {
        let query = Query::new(Index::GsiA2, format!("block/{blocked_user_id}"));
        Ok(self
            .client
            .query_all(query)
            .await?
            .iter()
            .filter_map(|item| get_str(item, "blockerUserId").map(str::to_string))
            .collect())
    }
}
