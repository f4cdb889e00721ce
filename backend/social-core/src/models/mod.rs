//! Table accessors, entities and managers for each item type.
//!
//! Every item type lives in the same table. `*Dynamo` types own key layout and
//! single-table access; managers own the business rules.

pub mod block;
pub mod card;
pub mod comment;
pub mod feed;
pub mod flag;
pub mod follow;
pub mod post;
pub mod user;
pub mod view;

use doc_store::{Item, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serialize a typed row into a store item.
pub(crate) fn to_item<T: Serialize>(row: &T) -> StoreResult<Item> {
    match serde_json::to_value(row)? {
        serde_json::Value::Object(item) => Ok(item),
        other => Err(doc_store::StoreError::Validation(format!(
            "row serialized to non-object value: {other}"
        ))),
    }
}

/// Deserialize a store item into a typed row.
pub(crate) fn from_item<T: DeserializeOwned>(item: Item) -> StoreResult<T> {
    Ok(serde_json::from_value(serde_json::Value::Object(item))?)
}
