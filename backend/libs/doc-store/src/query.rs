use crate::expr::SortCondition;
use crate::item::{Index, Item};

/// Upper bound on rows fetched per round trip.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Key-condition query against the table or one of its secondary indexes.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub index: Index,
    pub partition_value: String,
    pub sort: Option<SortCondition>,
    /// Ascending by sort value when true.
    pub forward: bool,
    pub page_size: usize,
    /// Project only `partitionKey` and `sortKey`.
    pub keys_only: bool,
}

impl Query {
    pub fn new(index: Index, partition_value: impl Into<String>) -> Self {
        Self {
            index,
            partition_value: partition_value.into(),
            sort: None,
            forward: true,
            page_size: DEFAULT_PAGE_SIZE,
            keys_only: false,
        }
    }

    pub fn with_sort(mut self, sort: SortCondition) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn sort_begins_with(self, prefix: impl Into<String>) -> Self {
        self.with_sort(SortCondition::BeginsWith(prefix.into()))
    }

    pub fn descending(mut self) -> Self {
        self.forward = false;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }
}

/// One page of query results plus the cursor to resume from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub items: Vec<Item>,
    pub last_evaluated_key: Option<Item>,
}
