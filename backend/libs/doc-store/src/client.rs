use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{CancellationReason, StoreError, StoreResult};
use crate::expr::{Condition, Update};
use crate::item::{Item, PrimaryKey, PARTITION_KEY};
use crate::memory::MemoryStore;
use crate::query::{Query, QueryPage};

/// Most write requests a single batch call accepts.
pub const MAX_BATCH_WRITE_ITEMS: usize = 25;

/// Most items a single transaction accepts.
pub const MAX_TRANSACT_ITEMS: usize = 100;

/// One write inside a multi-item transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactItem {
    Put {
        item: Item,
        condition: Option<Condition>,
    },
    Update {
        key: PrimaryKey,
        update: Update,
        condition: Option<Condition>,
    },
    Delete {
        key: PrimaryKey,
        condition: Option<Condition>,
    },
    ConditionCheck {
        key: PrimaryKey,
        condition: Condition,
    },
}

impl TransactItem {
    /// Put that fails if a row with the same key already exists.
    pub fn add(item: Item) -> Self {
        TransactItem::Put {
            item,
            condition: Some(Condition::not_exists(PARTITION_KEY)),
        }
    }

    /// Update that fails if the row does not exist (plus any extra condition).
    pub fn update_existing(key: PrimaryKey, update: Update, condition: Option<Condition>) -> Self {
        let exists = Condition::exists(PARTITION_KEY);
        TransactItem::Update {
            key,
            update,
            condition: Some(match condition {
                Some(extra) => exists.and(extra),
                None => exists,
            }),
        }
    }

    /// Delete that fails if the row does not exist.
    pub fn delete_existing(key: PrimaryKey) -> Self {
        TransactItem::Delete {
            key,
            condition: Some(Condition::exists(PARTITION_KEY)),
        }
    }

    pub fn key(&self) -> StoreResult<PrimaryKey> {
        match self {
            TransactItem::Put { item, .. } => PrimaryKey::from_item(item),
            TransactItem::Update { key, .. }
            | TransactItem::Delete { key, .. }
            | TransactItem::ConditionCheck { key, .. } => Ok(key.clone()),
        }
    }
}

/// Operations every document-store backend provides.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_item(&self, key: &PrimaryKey, consistent: bool) -> StoreResult<Option<Item>>;

    async fn put_item(&self, item: Item, condition: Option<&Condition>) -> StoreResult<()>;

    /// Apply `update` and return the row as it is afterwards. Updating a missing
    /// row creates it unless `condition` prevents it.
    async fn update_item(
        &self,
        key: &PrimaryKey,
        update: &Update,
        condition: Option<&Condition>,
    ) -> StoreResult<Item>;

    /// Delete the row and return its previous image, if any.
    async fn delete_item(
        &self,
        key: &PrimaryKey,
        condition: Option<&Condition>,
    ) -> StoreResult<Option<Item>>;

    /// Unconditional puts and deletes, at most [`MAX_BATCH_WRITE_ITEMS`] in total.
    async fn batch_write(&self, puts: Vec<Item>, deletes: Vec<PrimaryKey>) -> StoreResult<()>;

    async fn query(&self, query: &Query, exclusive_start_key: Option<&Item>) -> StoreResult<QueryPage>;

    /// All-or-nothing write of up to [`MAX_TRANSACT_ITEMS`] items. On failure the
    /// error is [`StoreError::TransactionCanceled`] with one reason per item.
    async fn transact_write(&self, items: &[TransactItem]) -> StoreResult<()>;
}

/// Handle the table accessors share. Cloning is cheap.
#[derive(Clone)]
pub struct StoreClient {
    store: Arc<dyn DocumentStore>,
}

impl StoreClient {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Client over a fresh, empty in-process store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub async fn get_item(
        &self,
        key: &PrimaryKey,
        strongly_consistent: bool,
    ) -> StoreResult<Option<Item>> {
        self.store.get_item(key, strongly_consistent).await
    }

    /// Put a new row; fails with `ConditionalCheckFailed` if the key is taken.
    pub async fn add_item(&self, item: Item) -> StoreResult<Item> {
        self.store
            .put_item(item.clone(), Some(&Condition::not_exists(PARTITION_KEY)))
            .await?;
        Ok(item)
    }

    pub async fn put_item(&self, item: Item, condition: Option<&Condition>) -> StoreResult<()> {
        self.store.put_item(item, condition).await
    }

    pub async fn update_item(
        &self,
        key: &PrimaryKey,
        update: &Update,
        condition: Option<&Condition>,
    ) -> StoreResult<Item> {
        self.store.update_item(key, update, condition).await
    }

    pub async fn delete_item(
        &self,
        key: &PrimaryKey,
        condition: Option<&Condition>,
    ) -> StoreResult<Option<Item>> {
        self.store.delete_item(key, condition).await
    }

    /// Write every item, [`MAX_BATCH_WRITE_ITEMS`] per request. Returns the count.
    pub async fn batch_put_items<I>(&self, items: I) -> StoreResult<usize>
    where
        I: IntoIterator<Item = Item>,
    {
        let mut written = 0;
        let mut chunk = Vec::with_capacity(MAX_BATCH_WRITE_ITEMS);
        for item in items {
            chunk.push(item);
            if chunk.len() == MAX_BATCH_WRITE_ITEMS {
                written += chunk.len();
                self.store.batch_write(std::mem::take(&mut chunk), Vec::new()).await?;
            }
        }
        if !chunk.is_empty() {
            written += chunk.len();
            self.store.batch_write(chunk, Vec::new()).await?;
        }
        debug!(written, "batch put complete");
        Ok(written)
    }

    /// Delete every key, [`MAX_BATCH_WRITE_ITEMS`] per request. Returns the count.
    pub async fn batch_delete_items<I>(&self, keys: I) -> StoreResult<usize>
    where
        I: IntoIterator<Item = PrimaryKey>,
    {
        let mut deleted = 0;
        let mut chunk = Vec::with_capacity(MAX_BATCH_WRITE_ITEMS);
        for key in keys {
            chunk.push(key);
            if chunk.len() == MAX_BATCH_WRITE_ITEMS {
                deleted += chunk.len();
                self.store.batch_write(Vec::new(), std::mem::take(&mut chunk)).await?;
            }
        }
        if !chunk.is_empty() {
            deleted += chunk.len();
            self.store.batch_write(Vec::new(), chunk).await?;
        }
        debug!(deleted, "batch delete complete");
        Ok(deleted)
    }

    /// Run a transaction, mapping a conditional failure of item `i` to
    /// `transact_errors[i]`. Any other failure converts through `From<StoreError>`.
    pub async fn transact_write_items<E>(
        &self,
        transact_items: Vec<TransactItem>,
        transact_errors: Vec<E>,
    ) -> Result<(), E>
    where
        E: From<StoreError>,
    {
        if transact_items.len() != transact_errors.len() {
            return Err(StoreError::Validation(format!(
                "{} transact items but {} mapped errors",
                transact_items.len(),
                transact_errors.len()
            ))
            .into());
        }

        match self.store.transact_write(&transact_items).await {
            Ok(()) => Ok(()),
            Err(StoreError::TransactionCanceled(reasons)) => {
                let mapped = reasons
                    .iter()
                    .position(CancellationReason::is_conditional_check_failed)
                    .and_then(|index| {
                        warn!(index, "transaction item failed its condition");
                        transact_errors.into_iter().nth(index)
                    });
                match mapped {
                    Some(error) => Err(error),
                    None => Err(StoreError::TransactionCanceled(reasons).into()),
                }
            }
            Err(other) => Err(other.into()),
        }
    }

    pub fn paginate(&self, query: Query) -> QueryPaginator {
        QueryPaginator {
            store: Arc::clone(&self.store),
            query,
            cursor: None,
            exhausted: false,
        }
    }

    /// Every row the query matches, all pages.
    pub async fn query_all(&self, query: Query) -> StoreResult<Vec<Item>> {
        self.paginate(query).collect_all().await
    }
}

/// Page-at-a-time iteration over a query; each round trip fetches at most
/// `query.page_size` rows.
pub struct QueryPaginator {
    store: Arc<dyn DocumentStore>,
    query: Query,
    cursor: Option<Item>,
    exhausted: bool,
}

impl QueryPaginator {
    /// The next page, or `None` once the query is exhausted.
    pub async fn next_page(&mut self) -> StoreResult<Option<Vec<Item>>> {
        if self.exhausted {
            return Ok(None);
        }
        let page = self.store.query(&self.query, self.cursor.as_ref()).await?;
        self.cursor = page.last_evaluated_key;
        self.exhausted = self.cursor.is_none();
        Ok(Some(page.items))
    }

    pub async fn collect_all(mut self) -> StoreResult<Vec<Item>> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await? {
            items.extend(page);
        }
        Ok(items)
    }
}
