//! In-process document store.
//!
//! Backs tests and local runs. Semantics follow the hosted service closely
//! enough that the managers behave identically: conditional writes, update on a
//! missing key creating the row, sparse secondary indexes, cursor pagination
//! and all-or-nothing transactions reporting one cancellation reason per item.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use crate::client::{DocumentStore, TransactItem, MAX_BATCH_WRITE_ITEMS, MAX_TRANSACT_ITEMS};
use crate::error::{CancellationReason, StoreError, StoreResult};
use crate::expr::{compare_values, Condition, Update};
use crate::item::{Index, Item, PrimaryKey, PARTITION_KEY, SORT_KEY};
use crate::query::{Query, QueryPage};

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<PrimaryKey, Item>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently stored.
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    fn check(condition: Option<&Condition>, current: Option<&Item>) -> StoreResult<()> {
        match condition {
            Some(condition) if !condition.evaluate(current) => {
                Err(StoreError::ConditionalCheckFailed)
            }
            _ => Ok(()),
        }
    }

    fn updated_row(key: &PrimaryKey, current: Option<&Item>, update: &Update) -> StoreResult<Item> {
        let mut row = current.cloned().unwrap_or_else(|| key.to_item());
        update.apply(&mut row)?;
        if PrimaryKey::from_item(&row)? != *key {
            return Err(StoreError::Validation(
                "update may not modify key attributes".to_string(),
            ));
        }
        Ok(row)
    }

    /// Position of a row within an index: (index sort value, primary key).
    fn index_position(index: Index, item: &Item) -> StoreResult<(Value, PrimaryKey)> {
        let sort_value = item
            .get(index.sort_attribute())
            .cloned()
            .unwrap_or(Value::Null);
        Ok((sort_value, PrimaryKey::from_item(item)?))
    }

    fn compare_positions(a: &(Value, PrimaryKey), b: &(Value, PrimaryKey)) -> Ordering {
        compare_values(&a.0, &b.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    }

    fn cursor_for(index: Index, item: &Item) -> Item {
        let mut cursor = Item::new();
        for attribute in [
            PARTITION_KEY,
            SORT_KEY,
            index.partition_attribute(),
            index.sort_attribute(),
        ] {
            if let Some(value) = item.get(attribute) {
                cursor.insert(attribute.to_string(), value.clone());
            }
        }
        cursor
    }

    fn project(query: &Query, item: &Item) -> Item {
        if !query.keys_only {
            return item.clone();
        }
        item.iter()
            .filter(|(name, _)| name.as_str() == PARTITION_KEY || name.as_str() == SORT_KEY)
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_item(&self, key: &PrimaryKey, _consistent: bool) -> StoreResult<Option<Item>> {
        Ok(self.rows.lock().get(key).cloned())
    }

    async fn put_item(&self, item: Item, condition: Option<&Condition>) -> StoreResult<()> {
        let key = PrimaryKey::from_item(&item)?;
        let mut rows = self.rows.lock();
        Self::check(condition, rows.get(&key))?;
        rows.insert(key, item);
        Ok(())
    }

    async fn update_item(
        &self,
        key: &PrimaryKey,
        update: &Update,
        condition: Option<&Condition>,
    ) -> StoreResult<Item> {
        let mut rows = self.rows.lock();
        let current = rows.get(key);
        Self::check(condition, current)?;
        let row = Self::updated_row(key, current, update)?;
        rows.insert(key.clone(), row.clone());
        Ok(row)
    }

    async fn delete_item(
        &self,
        key: &PrimaryKey,
        condition: Option<&Condition>,
    ) -> StoreResult<Option<Item>> {
        let mut rows = self.rows.lock();
        Self::check(condition, rows.get(key))?;
        Ok(rows.remove(key))
    }

    async fn batch_write(&self, puts: Vec<Item>, deletes: Vec<PrimaryKey>) -> StoreResult<()> {
        if puts.len() + deletes.len() > MAX_BATCH_WRITE_ITEMS {
            return Err(StoreError::Validation(format!(
                "batch write accepts at most {MAX_BATCH_WRITE_ITEMS} requests"
            )));
        }
        let put_keys = puts
            .iter()
            .map(PrimaryKey::from_item)
            .collect::<StoreResult<Vec<_>>>()?;

        let mut rows = self.rows.lock();
        for (key, item) in put_keys.into_iter().zip(puts) {
            rows.insert(key, item);
        }
        for key in deletes {
            rows.remove(&key);
        }
        Ok(())
    }

    async fn query(&self, query: &Query, exclusive_start_key: Option<&Item>) -> StoreResult<QueryPage> {
        let partition_attribute = query.index.partition_attribute();
        let sort_attribute = query.index.sort_attribute();

        let mut matches = {
            let rows = self.rows.lock();
            rows.values()
                .filter(|item| {
                    item.get(partition_attribute).and_then(Value::as_str)
                        == Some(query.partition_value.as_str())
                })
                .filter(|item| match item.get(sort_attribute) {
                    // sparse index: rows without the sort attribute are not indexed
                    None => false,
                    Some(value) => query
                        .sort
                        .as_ref()
                        .map(|sort| sort.matches(value))
                        .unwrap_or(true),
                })
                .map(|item| -> StoreResult<((Value, PrimaryKey), Item)> {
                    Ok((Self::index_position(query.index, item)?, item.clone()))
                })
                .collect::<StoreResult<Vec<_>>>()?
        };

        matches.sort_by(|(a, _), (b, _)| Self::compare_positions(a, b));
        if !query.forward {
            matches.reverse();
        }

        let start = match exclusive_start_key {
            None => 0,
            Some(cursor) => {
                let cursor_position = Self::index_position(query.index, cursor)?;
                matches
                    .iter()
                    .position(|(position, _)| {
                        let ordering = Self::compare_positions(position, &cursor_position);
                        if query.forward {
                            ordering == Ordering::Greater
                        } else {
                            ordering == Ordering::Less
                        }
                    })
                    .unwrap_or(matches.len())
            }
        };

        let remaining = &matches[start..];
        let page: Vec<&Item> = remaining
            .iter()
            .take(query.page_size)
            .map(|(_, item)| item)
            .collect();
        let last_evaluated_key = if remaining.len() > query.page_size {
            page.last().map(|item| Self::cursor_for(query.index, item))
        } else {
            None
        };

        Ok(QueryPage {
            items: page.into_iter().map(|item| Self::project(query, item)).collect(),
            last_evaluated_key,
        })
    }

    async fn transact_write(&self, items: &[TransactItem]) -> StoreResult<()> {
        if items.len() > MAX_TRANSACT_ITEMS {
            return Err(StoreError::Validation(format!(
                "transaction accepts at most {MAX_TRANSACT_ITEMS} items"
            )));
        }
        let keys = items
            .iter()
            .map(TransactItem::key)
            .collect::<StoreResult<Vec<_>>>()?;
        let distinct: HashSet<&PrimaryKey> = keys.iter().collect();
        if distinct.len() != keys.len() {
            return Err(StoreError::Validation(
                "transaction touches the same item more than once".to_string(),
            ));
        }

        let mut rows = self.rows.lock();

        // evaluate every condition against the pre-transaction state
        let mut reasons = Vec::with_capacity(items.len());
        let mut failed = false;
        for (item, key) in items.iter().zip(&keys) {
            let condition = match item {
                TransactItem::Put { condition, .. }
                | TransactItem::Update { condition, .. }
                | TransactItem::Delete { condition, .. } => condition.as_ref(),
                TransactItem::ConditionCheck { condition, .. } => Some(condition),
            };
            match Self::check(condition, rows.get(key)) {
                Ok(()) => reasons.push(CancellationReason::None),
                Err(_) => {
                    failed = true;
                    reasons.push(CancellationReason::ConditionalCheckFailed);
                }
            }
        }
        if failed {
            return Err(StoreError::TransactionCanceled(reasons));
        }

        // stage every write before touching the table so a bad update leaves it intact
        let mut staged: Vec<(PrimaryKey, Option<Item>)> = Vec::with_capacity(items.len());
        for (item, key) in items.iter().zip(keys) {
            match item {
                TransactItem::Put { item, .. } => staged.push((key, Some(item.clone()))),
                TransactItem::Update { update, .. } => {
                    let row = Self::updated_row(&key, rows.get(&key), update)?;
                    staged.push((key, Some(row)));
                }
                TransactItem::Delete { .. } => staged.push((key, None)),
                TransactItem::ConditionCheck { .. } => {}
            }
        }
        for (key, row) in staged {
            match row {
                Some(row) => {
                    rows.insert(key, row);
                }
                None => {
                    rows.remove(&key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Item {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_update_creates_missing_row_without_condition() {
        let store = MemoryStore::new();
        let key = PrimaryKey::new("user/u1", "profile");
        let updated = store
            .update_item(&key, &Update::new().add("commentCount", 1), None)
            .await
            .unwrap();
        assert_eq!(updated.get("commentCount"), Some(&json!(1)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_update_cannot_change_key() {
        let store = MemoryStore::new();
        let key = PrimaryKey::new("user/u1", "profile");
        let result = store
            .update_item(&key, &Update::new().set(SORT_KEY, "other"), None)
            .await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_transaction_reports_reason_per_item() {
        let store = MemoryStore::new();
        store
            .put_item(row(json!({"partitionKey": "a", "sortKey": "-"})), None)
            .await
            .unwrap();

        let items = vec![
            TransactItem::add(row(json!({"partitionKey": "b", "sortKey": "-"}))),
            TransactItem::add(row(json!({"partitionKey": "a", "sortKey": "-", "x": 1}))),
        ];
        let err = store.transact_write(&items).await.unwrap_err();
        match err {
            StoreError::TransactionCanceled(reasons) => assert_eq!(
                reasons,
                vec![
                    CancellationReason::None,
                    CancellationReason::ConditionalCheckFailed
                ]
            ),
            other => panic!("unexpected error: {other}"),
        }
        // nothing was written
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_transaction_rejects_duplicate_keys() {
        let store = MemoryStore::new();
        let key = PrimaryKey::new("a", "-");
        let items = vec![
            TransactItem::Update {
                key: key.clone(),
                update: Update::new().add("n", 1),
                condition: None,
            },
            TransactItem::Delete { key, condition: None },
        ];
        assert!(matches!(
            store.transact_write(&items).await,
            Err(StoreError::Validation(_))
        ));
    }
}
