use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// A stored document: attribute name -> JSON value.
pub type Item = serde_json::Map<String, Value>;

pub const PARTITION_KEY: &str = "partitionKey";
pub const SORT_KEY: &str = "sortKey";

/// Composite primary key of every row in the table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrimaryKey {
    #[serde(rename = "partitionKey")]
    pub partition_key: String,
    #[serde(rename = "sortKey")]
    pub sort_key: String,
}

impl PrimaryKey {
    pub fn new(partition_key: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
        }
    }

    /// Extract the primary key from a full or projected item.
    pub fn from_item(item: &Item) -> StoreResult<Self> {
        let partition_key = item
            .get(PARTITION_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Validation(format!("item is missing `{PARTITION_KEY}`")))?;
        let sort_key = item
            .get(SORT_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Validation(format!("item is missing `{SORT_KEY}`")))?;
        Ok(Self::new(partition_key, sort_key))
    }

    /// The key as a two-attribute item, ready to be merged into a row.
    pub fn to_item(&self) -> Item {
        let mut item = Item::new();
        item.insert(PARTITION_KEY.to_string(), Value::String(self.partition_key.clone()));
        item.insert(SORT_KEY.to_string(), Value::String(self.sort_key.clone()));
        item
    }
}

/// Indexes the table exposes. Secondary indexes are sparse: rows without the
/// index attributes are not part of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Index {
    Primary,
    GsiA1,
    GsiA2,
    GsiA3,
    GsiK1,
    GsiK2,
}

impl Index {
    pub const SECONDARY: [Index; 5] = [
        Index::GsiA1,
        Index::GsiA2,
        Index::GsiA3,
        Index::GsiK1,
        Index::GsiK2,
    ];

    /// Index name as the backing table declares it; `None` for the table itself.
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Index::Primary => None,
            Index::GsiA1 => Some("GSI-A1"),
            Index::GsiA2 => Some("GSI-A2"),
            Index::GsiA3 => Some("GSI-A3"),
            Index::GsiK1 => Some("GSI-K1"),
            Index::GsiK2 => Some("GSI-K2"),
        }
    }

    pub fn partition_attribute(&self) -> &'static str {
        match self {
            Index::Primary => PARTITION_KEY,
            Index::GsiA1 => "gsiA1PartitionKey",
            Index::GsiA2 => "gsiA2PartitionKey",
            Index::GsiA3 => "gsiA3PartitionKey",
            Index::GsiK1 => "gsiK1PartitionKey",
            Index::GsiK2 => "gsiK2PartitionKey",
        }
    }

    pub fn sort_attribute(&self) -> &'static str {
        match self {
            Index::Primary => SORT_KEY,
            Index::GsiA1 => "gsiA1SortKey",
            Index::GsiA2 => "gsiA2SortKey",
            Index::GsiA3 => "gsiA3SortKey",
            Index::GsiK1 => "gsiK1SortKey",
            Index::GsiK2 => "gsiK2SortKey",
        }
    }
}

/// Read a string attribute.
pub fn get_str<'a>(item: &'a Item, attribute: &str) -> Option<&'a str> {
    item.get(attribute).and_then(Value::as_str)
}

/// Read a numeric attribute, treating absence as `None`.
pub fn get_i64(item: &Item, attribute: &str) -> Option<i64> {
    item.get(attribute).and_then(Value::as_i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_key_round_trips_through_item() {
        let key = PrimaryKey::new("post/p1", "-");
        let item = key.to_item();
        assert_eq!(get_str(&item, PARTITION_KEY), Some("post/p1"));
        assert_eq!(PrimaryKey::from_item(&item).unwrap(), key);
    }

    #[test]
    fn test_primary_key_requires_both_attributes() {
        let mut item = Item::new();
        item.insert(PARTITION_KEY.into(), Value::String("a".into()));
        assert!(matches!(
            PrimaryKey::from_item(&item),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_index_attribute_names() {
        assert_eq!(Index::GsiK2.partition_attribute(), "gsiK2PartitionKey");
        assert_eq!(Index::GsiA1.sort_attribute(), "gsiA1SortKey");
        assert_eq!(Index::Primary.name(), None);
        assert_eq!(Index::GsiA3.name(), Some("GSI-A3"));
    }
}
