//! Typed condition, update and sort-key expressions.
//!
//! Backends either evaluate these directly (`MemoryStore`) or render them into
//! the expression language of the remote service (`DynamoStore`).

use serde_json::Value;
use std::cmp::Ordering;

use crate::error::{StoreError, StoreResult};
use crate::item::Item;

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    AttributeExists(String),
    AttributeNotExists(String),
    Equals(String, Value),
    /// Numeric comparison; an absent attribute never satisfies it.
    GreaterThan(String, i64),
    And(Vec<Condition>),
}

impl Condition {
    pub fn exists(attribute: impl Into<String>) -> Self {
        Condition::AttributeExists(attribute.into())
    }

    pub fn not_exists(attribute: impl Into<String>) -> Self {
        Condition::AttributeNotExists(attribute.into())
    }

    pub fn equals(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Equals(attribute.into(), value.into())
    }

    pub fn greater_than(attribute: impl Into<String>, value: i64) -> Self {
        Condition::GreaterThan(attribute.into(), value)
    }

    pub fn and(self, other: Condition) -> Self {
        match self {
            Condition::And(mut conditions) => {
                conditions.push(other);
                Condition::And(conditions)
            }
            first => Condition::And(vec![first, other]),
        }
    }

    /// Evaluate against the current row; `None` means the row does not exist.
    pub fn evaluate(&self, item: Option<&Item>) -> bool {
        let attribute = |name: &str| item.and_then(|item| item.get(name));
        match self {
            Condition::AttributeExists(name) => attribute(name).is_some(),
            Condition::AttributeNotExists(name) => attribute(name).is_none(),
            Condition::Equals(name, expected) => attribute(name) == Some(expected),
            Condition::GreaterThan(name, bound) => attribute(name)
                .and_then(Value::as_i64)
                .map(|value| value > *bound)
                .unwrap_or(false),
            Condition::And(conditions) => conditions.iter().all(|c| c.evaluate(item)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    Set(String, Value),
    Remove(String),
    /// Numeric add; an absent attribute counts as zero.
    Add(String, i64),
}

/// Ordered list of update actions applied to a single row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    actions: Vec<UpdateAction>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.actions
            .push(UpdateAction::Set(attribute.into(), value.into()));
        self
    }

    pub fn remove(mut self, attribute: impl Into<String>) -> Self {
        self.actions.push(UpdateAction::Remove(attribute.into()));
        self
    }

    pub fn add(mut self, attribute: impl Into<String>, delta: i64) -> Self {
        self.actions.push(UpdateAction::Add(attribute.into(), delta));
        self
    }

    pub fn actions(&self) -> &[UpdateAction] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn apply(&self, item: &mut Item) -> StoreResult<()> {
        for action in &self.actions {
            match action {
                UpdateAction::Set(name, value) => {
                    item.insert(name.clone(), value.clone());
                }
                UpdateAction::Remove(name) => {
                    item.remove(name);
                }
                UpdateAction::Add(name, delta) => {
                    let current = match item.get(name) {
                        None => 0,
                        Some(value) => value.as_i64().ok_or_else(|| {
                            StoreError::Validation(format!(
                                "cannot add to non-numeric attribute `{name}`"
                            ))
                        })?,
                    };
                    item.insert(name.clone(), Value::from(current + delta));
                }
            }
        }
        Ok(())
    }
}

/// Condition on the sort attribute of the queried index.
#[derive(Debug, Clone, PartialEq)]
pub enum SortCondition {
    Equals(Value),
    BeginsWith(String),
    /// Inclusive on both ends.
    Between(Value, Value),
}

impl SortCondition {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            SortCondition::Equals(expected) => value == expected,
            SortCondition::BeginsWith(prefix) => value
                .as_str()
                .map(|s| s.starts_with(prefix.as_str()))
                .unwrap_or(false),
            SortCondition::Between(low, high) => {
                matches!(
                    compare_values(value, low),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && matches!(
                    compare_values(value, high),
                    Some(Ordering::Less | Ordering::Equal)
                )
            }
        }
    }
}

/// Ordering used for index sort keys: strings lexically, numbers numerically.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: Value) -> Item {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_conditions_on_missing_row() {
        assert!(Condition::not_exists("partitionKey").evaluate(None));
        assert!(!Condition::exists("partitionKey").evaluate(None));
        assert!(!Condition::greater_than("count", 0).evaluate(None));
    }

    #[test]
    fn test_greater_than_and_equals() {
        let row = item(json!({"count": 1, "status": "ACTIVE"}));
        assert!(Condition::greater_than("count", 0).evaluate(Some(&row)));
        assert!(!Condition::greater_than("count", 1).evaluate(Some(&row)));
        assert!(Condition::equals("status", "ACTIVE")
            .and(Condition::exists("count"))
            .evaluate(Some(&row)));
        assert!(!Condition::equals("status", "DISABLED").evaluate(Some(&row)));
    }

    #[test]
    fn test_update_add_initializes_missing_counter() {
        let mut row = item(json!({"a": 5}));
        Update::new()
            .add("a", -1)
            .add("b", 1)
            .set("c", "x")
            .remove("missing")
            .apply(&mut row)
            .unwrap();
        assert_eq!(row, item(json!({"a": 4, "b": 1, "c": "x"})));
    }

    #[test]
    fn test_update_add_rejects_strings() {
        let mut row = item(json!({"a": "text"}));
        assert!(Update::new().add("a", 1).apply(&mut row).is_err());
    }

    #[test]
    fn test_sort_conditions() {
        assert!(SortCondition::BeginsWith("view/".into()).matches(&json!("view/u1")));
        assert!(!SortCondition::BeginsWith("view/".into()).matches(&json!(3)));
        let between = SortCondition::Between(json!("2020-01-01"), json!("2020-12-31"));
        assert!(between.matches(&json!("2020-06-01")));
        assert!(!between.matches(&json!("2021-01-01")));
    }
}
