//! DynamoDB-backed document store.
//!
//! Renders the typed expressions into DynamoDB expression strings with
//! placeholder names and values, and converts JSON attribute maps to and from
//! `AttributeValue`.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::{
    AttributeValue, ConditionCheck, Delete, DeleteRequest, Put, PutRequest, ReturnValue,
    TransactWriteItem, Update as UpdateRequest, WriteRequest,
};
use aws_sdk_dynamodb::Client;
use serde_json::{Number, Value};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::client::{DocumentStore, TransactItem};
use crate::error::{CancellationReason, StoreError, StoreResult};
use crate::expr::{Condition, SortCondition, Update, UpdateAction};
use crate::item::{Item, PrimaryKey, PARTITION_KEY, SORT_KEY};
use crate::query::{Query, QueryPage};

type AttributeMap = HashMap<String, AttributeValue>;

/// Attempts at flushing unprocessed batch-write requests.
const MAX_BATCH_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct DynamoStore {
    client: Client,
    table_name: String,
}

impl DynamoStore {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Build a client from the default AWS credential/region chain.
    pub async fn from_env(table_name: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let table_name = table_name.into();
        info!(table = %table_name, "Initialized DynamoDB document store");
        Self::new(Client::new(&config), table_name)
    }
}

fn backend_error(err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(err.to_string())
}

pub fn to_attribute_value(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(to_attribute_value).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), to_attribute_value(v)))
                .collect(),
        ),
    }
}

fn parse_number(raw: &str) -> StoreResult<Value> {
    if let Ok(n) = raw.parse::<i64>() {
        return Ok(Value::from(n));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| StoreError::Validation(format!("invalid number attribute `{raw}`")))
}

pub fn from_attribute_value(value: &AttributeValue) -> StoreResult<Value> {
    Ok(match value {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::N(n) => parse_number(n)?,
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::Ss(values) => Value::Array(values.iter().cloned().map(Value::String).collect()),
        AttributeValue::Ns(values) => Value::Array(
            values
                .iter()
                .map(|n| parse_number(n))
                .collect::<StoreResult<Vec<_>>>()?,
        ),
        AttributeValue::L(values) => Value::Array(
            values
                .iter()
                .map(from_attribute_value)
                .collect::<StoreResult<Vec<_>>>()?,
        ),
        AttributeValue::M(map) => Value::Object(from_attribute_map(map)?),
        other => {
            return Err(StoreError::Validation(format!(
                "unsupported attribute value: {other:?}"
            )))
        }
    })
}

fn to_attribute_map(item: &Item) -> AttributeMap {
    item.iter()
        .map(|(k, v)| (k.clone(), to_attribute_value(v)))
        .collect()
}

fn from_attribute_map(map: &AttributeMap) -> StoreResult<Item> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), from_attribute_value(v)?)))
        .collect()
}

fn key_map(key: &PrimaryKey) -> AttributeMap {
    HashMap::from([
        (PARTITION_KEY.to_string(), AttributeValue::S(key.partition_key.clone())),
        (SORT_KEY.to_string(), AttributeValue::S(key.sort_key.clone())),
    ])
}

/// Accumulates placeholder names and values for one request.
#[derive(Default)]
struct ExpressionBuilder {
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl ExpressionBuilder {
    fn name(&mut self, attribute: &str) -> String {
        if let Some((placeholder, _)) = self.names.iter().find(|(_, name)| name.as_str() == attribute) {
            return placeholder.clone();
        }
        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), attribute.to_string());
        placeholder
    }

    fn value(&mut self, value: AttributeValue) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    fn condition(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::AttributeExists(name) => format!("attribute_exists({})", self.name(name)),
            Condition::AttributeNotExists(name) => {
                format!("attribute_not_exists({})", self.name(name))
            }
            Condition::Equals(name, value) => {
                let name = self.name(name);
                format!("{} = {}", name, self.value(to_attribute_value(value)))
            }
            Condition::GreaterThan(name, bound) => {
                let name = self.name(name);
                format!("{} > {}", name, self.value(AttributeValue::N(bound.to_string())))
            }
            Condition::And(conditions) => conditions
                .iter()
                .map(|c| format!("({})", self.condition(c)))
                .collect::<Vec<_>>()
                .join(" AND "),
        }
    }

    fn update(&mut self, update: &Update) -> String {
        let mut set = Vec::new();
        let mut remove = Vec::new();
        let mut add = Vec::new();
        for action in update.actions() {
            match action {
                UpdateAction::Set(name, value) => {
                    let name = self.name(name);
                    set.push(format!("{} = {}", name, self.value(to_attribute_value(value))));
                }
                UpdateAction::Remove(name) => remove.push(self.name(name)),
                UpdateAction::Add(name, delta) => {
                    let name = self.name(name);
                    add.push(format!("{} {}", name, self.value(AttributeValue::N(delta.to_string()))));
                }
            }
        }
        let mut clauses = Vec::new();
        if !set.is_empty() {
            clauses.push(format!("SET {}", set.join(", ")));
        }
        if !remove.is_empty() {
            clauses.push(format!("REMOVE {}", remove.join(", ")));
        }
        if !add.is_empty() {
            clauses.push(format!("ADD {}", add.join(", ")));
        }
        clauses.join(" ")
    }

    fn sort_condition(&mut self, attribute: &str, sort: &SortCondition) -> String {
        let name = self.name(attribute);
        match sort {
            SortCondition::Equals(value) => format!("{} = {}", name, self.value(to_attribute_value(value))),
            SortCondition::BeginsWith(prefix) => format!(
                "begins_with({}, {})",
                name,
                self.value(AttributeValue::S(prefix.clone()))
            ),
            SortCondition::Between(low, high) => {
                let low = self.value(to_attribute_value(low));
                let high = self.value(to_attribute_value(high));
                format!("{} BETWEEN {} AND {}", name, low, high)
            }
        }
    }

    /// DynamoDB rejects empty placeholder maps, so absent means none were used.
    fn into_parts(self) -> (Option<HashMap<String, String>>, Option<AttributeMap>) {
        let names = (!self.names.is_empty()).then_some(self.names);
        let values = (!self.values.is_empty()).then_some(self.values);
        (names, values)
    }
}

fn render_condition(condition: Option<&Condition>) -> (Option<String>, ExpressionBuilder) {
    let mut builder = ExpressionBuilder::default();
    let expression = condition.map(|c| builder.condition(c));
    (expression, builder)
}

impl DynamoStore {
    fn transact_item(&self, item: &TransactItem) -> StoreResult<TransactWriteItem> {
        let transact_item = match item {
            TransactItem::Put { item, condition } => {
                let (expression, builder) = render_condition(condition.as_ref());
                let (names, values) = builder.into_parts();
                let put = Put::builder()
                    .table_name(&self.table_name)
                    .set_item(Some(to_attribute_map(item)))
                    .set_condition_expression(expression)
                    .set_expression_attribute_names(names)
                    .set_expression_attribute_values(values)
                    .build()
                    .map_err(backend_error)?;
                TransactWriteItem::builder().put(put).build()
            }
            TransactItem::Update {
                key,
                update,
                condition,
            } => {
                let mut builder = ExpressionBuilder::default();
                let update_expression = builder.update(update);
                let condition_expression = condition.as_ref().map(|c| builder.condition(c));
                let (names, values) = builder.into_parts();
                let update = UpdateRequest::builder()
                    .table_name(&self.table_name)
                    .set_key(Some(key_map(key)))
                    .update_expression(update_expression)
                    .set_condition_expression(condition_expression)
                    .set_expression_attribute_names(names)
                    .set_expression_attribute_values(values)
                    .build()
                    .map_err(backend_error)?;
                TransactWriteItem::builder().update(update).build()
            }
            TransactItem::Delete { key, condition } => {
                let (expression, builder) = render_condition(condition.as_ref());
                let (names, values) = builder.into_parts();
                let delete = Delete::builder()
                    .table_name(&self.table_name)
                    .set_key(Some(key_map(key)))
                    .set_condition_expression(expression)
                    .set_expression_attribute_names(names)
                    .set_expression_attribute_values(values)
                    .build()
                    .map_err(backend_error)?;
                TransactWriteItem::builder().delete(delete).build()
            }
            TransactItem::ConditionCheck { key, condition } => {
                let mut builder = ExpressionBuilder::default();
                let expression = builder.condition(condition);
                let (names, values) = builder.into_parts();
                let check = ConditionCheck::builder()
                    .table_name(&self.table_name)
                    .set_key(Some(key_map(key)))
                    .condition_expression(expression)
                    .set_expression_attribute_names(names)
                    .set_expression_attribute_values(values)
                    .build()
                    .map_err(backend_error)?;
                TransactWriteItem::builder().condition_check(check).build()
            }
        };
        Ok(transact_item)
    }
}

#[async_trait]
impl DocumentStore for DynamoStore {
    async fn get_item(&self, key: &PrimaryKey, consistent: bool) -> StoreResult<Option<Item>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(key_map(key)))
            .consistent_read(consistent)
            .send()
            .await
            .map_err(backend_error)?;
        output.item().map(from_attribute_map).transpose()
    }

    async fn put_item(&self, item: Item, condition: Option<&Condition>) -> StoreResult<()> {
        let (expression, builder) = render_condition(condition);
        let (names, values) = builder.into_parts();
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(to_attribute_map(&item)))
            .set_condition_expression(expression)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .send()
            .await
            .map_err(|err| match err.into_service_error() {
                PutItemError::ConditionalCheckFailedException(_) => StoreError::ConditionalCheckFailed,
                other => backend_error(other),
            })?;
        Ok(())
    }

    async fn update_item(
        &self,
        key: &PrimaryKey,
        update: &Update,
        condition: Option<&Condition>,
    ) -> StoreResult<Item> {
        let mut builder = ExpressionBuilder::default();
        let update_expression = builder.update(update);
        let condition_expression = condition.map(|c| builder.condition(c));
        let (names, values) = builder.into_parts();
        let output = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(key_map(key)))
            .update_expression(update_expression)
            .set_condition_expression(condition_expression)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(|err| match err.into_service_error() {
                UpdateItemError::ConditionalCheckFailedException(_) => {
                    StoreError::ConditionalCheckFailed
                }
                other => backend_error(other),
            })?;
        match output.attributes() {
            Some(attributes) => from_attribute_map(attributes),
            None => Ok(key.to_item()),
        }
    }

    async fn delete_item(
        &self,
        key: &PrimaryKey,
        condition: Option<&Condition>,
    ) -> StoreResult<Option<Item>> {
        let (expression, builder) = render_condition(condition);
        let (names, values) = builder.into_parts();
        let output = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(key_map(key)))
            .set_condition_expression(expression)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(|err| match err.into_service_error() {
                DeleteItemError::ConditionalCheckFailedException(_) => {
                    StoreError::ConditionalCheckFailed
                }
                other => backend_error(other),
            })?;
        output.attributes().map(from_attribute_map).transpose()
    }

    async fn batch_write(&self, puts: Vec<Item>, deletes: Vec<PrimaryKey>) -> StoreResult<()> {
        let mut requests = Vec::with_capacity(puts.len() + deletes.len());
        for item in &puts {
            let put = PutRequest::builder()
                .set_item(Some(to_attribute_map(item)))
                .build()
                .map_err(backend_error)?;
            requests.push(WriteRequest::builder().put_request(put).build());
        }
        for key in &deletes {
            let delete = DeleteRequest::builder()
                .set_key(Some(key_map(key)))
                .build()
                .map_err(backend_error)?;
            requests.push(WriteRequest::builder().delete_request(delete).build());
        }

        let mut pending = requests;
        for attempt in 1..=MAX_BATCH_ATTEMPTS {
            if pending.is_empty() {
                return Ok(());
            }
            let output = self
                .client
                .batch_write_item()
                .request_items(self.table_name.clone(), pending)
                .send()
                .await
                .map_err(backend_error)?;
            pending = output
                .unprocessed_items()
                .and_then(|unprocessed| unprocessed.get(&self.table_name))
                .cloned()
                .unwrap_or_default();
            if !pending.is_empty() {
                debug!(attempt, remaining = pending.len(), "retrying unprocessed batch writes");
            }
        }
        if pending.is_empty() {
            Ok(())
        } else {
            warn!(remaining = pending.len(), "batch write left unprocessed requests");
            Err(StoreError::Backend(format!(
                "{} batch write requests left unprocessed",
                pending.len()
            )))
        }
    }

    async fn query(&self, query: &Query, exclusive_start_key: Option<&Item>) -> StoreResult<QueryPage> {
        let mut builder = ExpressionBuilder::default();
        let partition_name = builder.name(query.index.partition_attribute());
        let partition_value = builder.value(AttributeValue::S(query.partition_value.clone()));
        let mut key_condition = format!("{} = {}", partition_name, partition_value);
        if let Some(sort) = &query.sort {
            let sort_condition = builder.sort_condition(query.index.sort_attribute(), sort);
            key_condition = format!("{} AND {}", key_condition, sort_condition);
        }
        let projection = query
            .keys_only
            .then(|| format!("{}, {}", builder.name(PARTITION_KEY), builder.name(SORT_KEY)));
        let (names, values) = builder.into_parts();

        let output = self
            .client
            .query()
            .table_name(&self.table_name)
            .set_index_name(query.index.name().map(str::to_string))
            .key_condition_expression(key_condition)
            .set_projection_expression(projection)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .scan_index_forward(query.forward)
            .limit(i32::try_from(query.page_size).unwrap_or(i32::MAX))
            .set_exclusive_start_key(exclusive_start_key.map(to_attribute_map))
            .send()
            .await
            .map_err(backend_error)?;

        let items = output
            .items()
            .iter()
            .map(from_attribute_map)
            .collect::<StoreResult<Vec<_>>>()?;
        let last_evaluated_key = output
            .last_evaluated_key()
            .map(from_attribute_map)
            .transpose()?;
        Ok(QueryPage {
            items,
            last_evaluated_key,
        })
    }

    async fn transact_write(&self, items: &[TransactItem]) -> StoreResult<()> {
        let transact_items = items
            .iter()
            .map(|item| self.transact_item(item))
            .collect::<StoreResult<Vec<_>>>()?;
        self.client
            .transact_write_items()
            .set_transact_items(Some(transact_items))
            .send()
            .await
            .map_err(|err| match err.into_service_error() {
                TransactWriteItemsError::TransactionCanceledException(canceled) => {
                    StoreError::TransactionCanceled(
                        canceled
                            .cancellation_reasons()
                            .iter()
                            .map(|reason| CancellationReason::from_code(reason.code()))
                            .collect(),
                    )
                }
                other => backend_error(other),
            })?;
        Ok(())
    }
}
