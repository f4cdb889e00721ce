//! Single-table document store used by the social backend.
//!
//! Rows are JSON attribute maps keyed by `partitionKey`/`sortKey`, with five
//! sparse secondary indexes. [`StoreClient`] is the handle table accessors
//! share; it fronts either the in-process [`MemoryStore`] or, with the
//! `dynamodb` feature, a DynamoDB table.

pub mod client;
pub mod error;
pub mod expr;
pub mod item;
pub mod memory;
pub mod query;

#[cfg(feature = "dynamodb")]
pub mod dynamo;

pub use client::{
    DocumentStore, QueryPaginator, StoreClient, TransactItem, MAX_BATCH_WRITE_ITEMS,
    MAX_TRANSACT_ITEMS,
};
pub use error::{CancellationReason, StoreError, StoreResult};
pub use expr::{Condition, SortCondition, Update, UpdateAction};
pub use item::{get_i64, get_str, Index, Item, PrimaryKey, PARTITION_KEY, SORT_KEY};
pub use memory::MemoryStore;
pub use query::{Query, QueryPage, DEFAULT_PAGE_SIZE};

#[cfg(feature = "dynamodb")]
pub use dynamo::DynamoStore;
