use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document has no string id")]
    MissingId,

    #[error("Duplicate document id: {0}")]
    DuplicateId(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// A single predicate on one field of a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, Value),
    Ne(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    In(String, Vec<Value>),
    IsNull(String),
    NotNull(String),
    /// Case-insensitive substring match on a text field.
    Contains(String, String),
    Or(Vec<Condition>),
}

/// Conjunction of conditions. An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

fn to_value<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: &str) -> Self {
        Self::new().eq("id", id)
    }

    pub fn eq<T: Serialize>(mut self, field: &str, value: T) -> Self {
        self.conditions.push(Condition::Eq(field.to_string(), to_value(value)));
        self
    }

    pub fn ne<T: Serialize>(mut self, field: &str, value: T) -> Self {
        self.conditions.push(Condition::Ne(field.to_string(), to_value(value)));
        self
    }

    pub fn gt<T: Serialize>(mut self, field: &str, value: T) -> Self {
        self.conditions.push(Condition::Gt(field.to_string(), to_value(value)));
        self
    }

    pub fn gte<T: Serialize>(mut self, field: &str, value: T) -> Self {
        self.conditions.push(Condition::Gte(field.to_string(), to_value(value)));
        self
    }

    pub fn lt<T: Serialize>(mut self, field: &str, value: T) -> Self {
        self.conditions.push(Condition::Lt(field.to_string(), to_value(value)));
        self
    }

    pub fn lte<T: Serialize>(mut self, field: &str, value: T) -> Self {
        self.conditions.push(Condition::Lte(field.to_string(), to_value(value)));
        self
    }

    pub fn one_of<T: Serialize>(mut self, field: &str, values: impl IntoIterator<Item = T>) -> Self {
        let values = values.into_iter().map(to_value).collect();
        self.conditions.push(Condition::In(field.to_string(), values));
        self
    }

    pub fn is_null(mut self, field: &str) -> Self {
        self.conditions.push(Condition::IsNull(field.to_string()));
        self
    }

    pub fn not_null(mut self, field: &str) -> Self {
        self.conditions.push(Condition::NotNull(field.to_string()));
        self
    }

    pub fn contains(mut self, field: &str, text: &str) -> Self {
        self.conditions.push(Condition::Contains(field.to_string(), text.to_string()));
        self
    }

    pub fn any_of(mut self, conditions: Vec<Condition>) -> Self {
        if !conditions.is_empty() {
            self.conditions.push(Condition::Or(conditions));
        }
        self
    }

    /// Live documents only: soft-deleted rows carry a `deleted_at` stamp.
    pub fn live(self) -> Self {
        self.is_null("deleted_at")
    }

    pub fn deleted(self) -> Self {
        self.not_null("deleted_at")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Vec<(String, SortOrder)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort_by(mut self, field: &str, order: SortOrder) -> Self {
        self.sort.push((field.to_string(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn page(self, limit: Option<usize>, offset: Option<usize>) -> Self {
        let mut options = self;
        options.limit = limit;
        options.offset = offset;
        options
    }
}

/// Collection-oriented persistence used by every service.
///
/// Documents are JSON objects carrying a string `id` field.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Value>, StoreError>;

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Value>, StoreError> {
        let options = FindOptions::new().limit(1);
        Ok(self.find(collection, filter, &options).await?.into_iter().next())
    }

    async fn insert_one(&self, collection: &str, document: Value) -> Result<Value, StoreError>;

    /// Replaces the whole document. Returns false when no document has that id.
    async fn replace_one(&self, collection: &str, id: &str, document: Value) -> Result<bool, StoreError>;

    /// Sets the given fields on one document and returns the updated document.
    async fn update_one(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<Option<Value>, StoreError>;

    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;
}

/// Builds the field map for [`DocumentStore::update_one`] from a serializable value.
pub fn fields_of<T: Serialize>(value: &T) -> Result<Map<String, Value>, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::Backend("Update payload must be an object".to_string())),
    }
}

/// Deserializes a stored document into its typed model.
pub fn decode<T: DeserializeOwned>(document: Value) -> Result<T, StoreError> {
    Ok(serde_json::from_value(document)?)
}

pub fn decode_all<T: DeserializeOwned>(documents: Vec<Value>) -> Result<Vec<T>, StoreError> {
    documents.into_iter().map(decode).collect()
}

pub fn to_document<T: Serialize>(value: &T) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(value)?)
}
