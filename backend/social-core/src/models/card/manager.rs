use chrono::{DateTime, Utc};
use tracing::debug;

use super::{Card, CardDynamo, CardSpec};
use crate::error::CardError;

#[derive(Clone)]
pub struct CardManager {
    dynamo: CardDynamo,
}

impl CardManager {
    pub fn new(dynamo: CardDynamo) -> Self {
        Self { dynamo }
    }

    pub async fn get_card(&self, card_id: &str) -> Result<Option<Card>, CardError> {
        Ok(self.dynamo.get_card(card_id).await?)
    }

    pub async fn list_cards(&self, user_id: &str) -> Result<Vec<Card>, CardError> {
        Ok(self.dynamo.list_cards_by_user(user_id).await?)
    }

    /// Add the card unless it already exists. Returns the new card, if added.
    pub async fn add_card_by_spec_if_dne(
        &self,
        spec: &CardSpec,
        now: DateTime<Utc>,
    ) -> Result<Option<Card>, CardError> {
        match self.dynamo.add_card(spec, now).await {
            Ok(card) => Ok(Some(card)),
            Err(err) if err.is_conditional_check_failed() => {
                debug!(card_id = %spec.card_id, "Card already exists");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Add the card, or bring an existing card's title in line with its `CardSpec`.
    pub async fn add_or_update_card_by_spec(
        &self,
        spec: &CardSpec,
        now: DateTime<Utc>,
    ) -> Result<Card, CardError> {
        if let Some(card) = self.add_card_by_spec_if_dne(spec, now).await? {
            return Ok(card);
        }
        match self.dynamo.get_card(&spec.card_id).await? {
            Some(card) if card.title == spec.title => Ok(card),
            Some(_) => Ok(self.dynamo.update_title(&spec.card_id, &spec.title).await?),
            // removed between the two calls
            None => Err(CardError::CardDoesNotExist(spec.card_id.clone())),
        }
    }

    /// Returns whether a card was removed.
    pub async fn remove_card_by_spec_if_exists(&self, spec: &CardSpec) -> Result<bool, CardError> {
        let removed = self.dynamo.delete_card(&spec.card_id).await?.is_some();
        if removed {
            debug!(card_id = %spec.card_id, "Removed card");
        }
        Ok(removed)
    }
}
