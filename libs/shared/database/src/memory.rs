use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::store::{Condition, DocumentStore, Filter, FindOptions, SortOrder, StoreError};

/// Process-local document store. Used for local runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn field<'a>(document: &'a Value, name: &str) -> &'a Value {
    document.get(name).unwrap_or(&Value::Null)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw).ok()
}

/// Orders two JSON scalars. Timestamps compare as instants, not as text.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => Some(x.cmp(y)),
        },
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match compare_values(a, b) {
        Some(ordering) => ordering == Ordering::Equal,
        None => a == b,
    }
}

fn matches_condition(document: &Value, condition: &Condition) -> bool {
    match condition {
        Condition::Eq(name, value) => values_equal(field(document, name), value),
        Condition::Ne(name, value) => !values_equal(field(document, name), value),
        Condition::Gt(name, value) => {
            compare_values(field(document, name), value) == Some(Ordering::Greater)
        }
        Condition::Gte(name, value) => matches!(
            compare_values(field(document, name), value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Condition::Lt(name, value) => {
            compare_values(field(document, name), value) == Some(Ordering::Less)
        }
        Condition::Lte(name, value) => matches!(
            compare_values(field(document, name), value),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Condition::In(name, values) => {
            let current = field(document, name);
            values.iter().any(|value| values_equal(current, value))
        }
        Condition::IsNull(name) => field(document, name).is_null(),
        Condition::NotNull(name) => !field(document, name).is_null(),
        Condition::Contains(name, text) => field(document, name)
            .as_str()
            .map(|s| s.to_lowercase().contains(&text.to_lowercase()))
            .unwrap_or(false),
        Condition::Or(conditions) => conditions.iter().any(|c| matches_condition(document, c)),
    }
}

fn matches(document: &Value, filter: &Filter) -> bool {
    filter.conditions.iter().all(|c| matches_condition(document, c))
}

/// Nulls sort last regardless of direction.
fn compare_for_sort(a: &Value, b: &Value, order: SortOrder) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        _ => {}
    }
    let ordering = compare_values(a, b).unwrap_or(Ordering::Equal);
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

fn document_id(document: &Value) -> Option<&str> {
    document.get("id").and_then(Value::as_str)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read().await;
        let mut found: Vec<Value> = collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| matches(document, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if !options.sort.is_empty() {
            found.sort_by(|a, b| {
                options
                    .sort
                    .iter()
                    .map(|(name, order)| compare_for_sort(field(a, name), field(b, name), *order))
                    .find(|ordering| *ordering != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let offset = options.offset.unwrap_or(0);
        let limit = options.limit.unwrap_or(usize::MAX);
        let page: Vec<Value> = found.into_iter().skip(offset).take(limit).collect();

        debug!("Memory store: {} documents from {}", page.len(), collection);
        Ok(page)
    }

    async fn insert_one(&self, collection: &str, document: Value) -> Result<Value, StoreError> {
        let mut document = match document {
            Value::Object(map) => map,
            _ => return Err(StoreError::Backend("Documents must be JSON objects".to_string())),
        };

        let id = match document.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let id = Uuid::new_v4().to_string();
                document.insert("id".to_string(), Value::String(id.clone()));
                id
            }
        };

        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection.to_string()).or_default();
        if documents.iter().any(|existing| document_id(existing) == Some(id.as_str())) {
            return Err(StoreError::DuplicateId(id));
        }

        let document = Value::Object(document);
        documents.push(document.clone());
        Ok(document)
    }

    async fn replace_one(&self, collection: &str, id: &str, document: Value) -> Result<bool, StoreError> {
        let mut document = match document {
            Value::Object(map) => map,
            _ => return Err(StoreError::Backend("Documents must be JSON objects".to_string())),
        };
        document.insert("id".to_string(), Value::String(id.to_string()));

        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(false);
        };

        match documents.iter_mut().find(|existing| document_id(existing) == Some(id)) {
            Some(existing) => {
                *existing = Value::Object(document);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_one(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<Option<Value>, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(None);
        };

        let Some(existing) = documents.iter_mut().find(|existing| document_id(existing) == Some(id)) else {
            return Ok(None);
        };

        if let Some(map) = existing.as_object_mut() {
            for (key, value) in fields {
                if key != "id" {
                    map.insert(key, value);
                }
            }
        }

        Ok(Some(existing.clone()))
    }

    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(false);
        };

        let before = documents.len();
        documents.retain(|existing| document_id(existing) != Some(id));
        Ok(documents.len() < before)
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let before = documents.len();
        documents.retain(|existing| !matches(existing, filter));
        Ok((before - documents.len()) as u64)
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|documents| documents.iter().filter(|document| matches(document, filter)).count())
            .unwrap_or(0) as u64)
    }
}
