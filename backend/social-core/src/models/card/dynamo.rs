use chrono::{DateTime, Utc};
use doc_store::{Condition, Index, PrimaryKey, Query, StoreClient, StoreResult, Update, PARTITION_KEY};

use super::{Card, CardSpec};
use crate::models::{from_item, to_item};
use crate::timestamp;

#[derive(Clone)]
pub struct CardDynamo {
    client: StoreClient,
}

impl CardDynamo {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    pub fn pk(card_id: &str) -> PrimaryKey {
        PrimaryKey::new(format!("card/{card_id}"), "-")
    }

    pub async fn get_card(&self, card_id: &str) -> StoreResult<Option<Card>> {
        self.client
            .get_item(&Self::pk(card_id), false)
            .await?
            .map(from_item)
            .transpose()
    }

    /// Fails with `ConditionalCheckFailed` if the card already exists.
    pub async fn add_card(&self, spec: &CardSpec, now: DateTime<Utc>) -> StoreResult<Card> {
        let key = Self::pk(&spec.card_id);
        let card = Card {
            partition_key: key.partition_key,
            sort_key: key.sort_key,
            schema_version: 0,
            gsi_a1_partition_key: format!("user/{}", spec.user_id),
            gsi_a1_sort_key: format!("card/{}", timestamp::format(&now)),
            card_id: spec.card_id.clone(),
            user_id: spec.user_id.clone(),
            title: spec.title.clone(),
            action: spec.action.clone(),
            post_id: spec.post_id.clone(),
            created_at: now,
        };
        self.client.add_item(to_item(&card)?).await?;
        Ok(card)
    }

    pub async fn update_title(&self, card_id: &str, title: &str) -> StoreResult<Card> {
        let item = self
            .client
            .update_item(
                &Self::pk(card_id),
                &Update::new().set("title", title),
                Some(&Condition::exists(PARTITION_KEY)),
            )
            .await?;
        from_item(item)
    }

    /// Returns the deleted card, or `None` if there was none.
    pub async fn delete_card(&self, card_id: &str) -> StoreResult<Option<Card>> {
        self.client
            .delete_item(&Self::pk(card_id), None)
            .await?
            .map(from_item)
            .transpose()
    }

    /// The user's cards, oldest first.
    pub async fn list_cards_by_user(&self, user_id: &str) -> StoreResult<Vec<Card>> {
        let query = Query::new(Index::GsiA1, format!("user/{user_id}")).sort_begins_with("card/");
        self.client
            .query_all(query)
            .await?
            .into_iter()
            .map(from_item)
            .collect()
    }
}
