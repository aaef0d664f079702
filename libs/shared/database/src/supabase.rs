use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::store::{Condition, DocumentStore, Filter, FindOptions, SortOrder, StoreError};

/// Thin PostgREST client for a Supabase project.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_base_url(&config.supabase_url, &config.supabase_service_key)
    }

    pub fn with_base_url(base_url: &str, service_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        }
    }

    fn get_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.service_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.service_key))?,
        );

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers()?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", error_text),
                404 => anyhow!("Resource not found: {}", error_text),
                409 => anyhow!("Conflict: {}", error_text),
                _ => anyhow!("API error ({}): {}", status, error_text),
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

/// [`DocumentStore`] backed by PostgREST tables, one table per collection.
pub struct SupabaseStore {
    client: SupabaseClient,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: SupabaseClient::new(config),
        }
    }

    pub fn from_client(client: SupabaseClient) -> Self {
        Self { client }
    }

    fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Vec<Value>, StoreError> {
        self.client
            .request_with_headers(method, path, body, Some(Self::representation_headers()))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn encode(value: &Value) -> String {
    urlencoding::encode(&render_scalar(value)).into_owned()
}

fn render_list(values: &[Value]) -> String {
    let items: Vec<String> = values
        .iter()
        .map(|value| match value {
            Value::String(s) => format!("\"{}\"", urlencoding::encode(s)),
            other => encode(other),
        })
        .collect();
    format!("({})", items.join(","))
}

/// `(column, operator.value)` for one condition, PostgREST syntax.
fn render_condition(condition: &Condition) -> (String, String) {
    match condition {
        Condition::Eq(name, value) => (name.clone(), format!("eq.{}", encode(value))),
        Condition::Ne(name, value) => (name.clone(), format!("neq.{}", encode(value))),
        Condition::Gt(name, value) => (name.clone(), format!("gt.{}", encode(value))),
        Condition::Gte(name, value) => (name.clone(), format!("gte.{}", encode(value))),
        Condition::Lt(name, value) => (name.clone(), format!("lt.{}", encode(value))),
        Condition::Lte(name, value) => (name.clone(), format!("lte.{}", encode(value))),
        Condition::In(name, values) => (name.clone(), format!("in.{}", render_list(values))),
        Condition::IsNull(name) => (name.clone(), "is.null".to_string()),
        Condition::NotNull(name) => (name.clone(), "not.is.null".to_string()),
        Condition::Contains(name, text) => {
            (name.clone(), format!("ilike.*{}*", urlencoding::encode(text)))
        }
        Condition::Or(conditions) => ("or".to_string(), render_or(conditions)),
    }
}

fn render_or(conditions: &[Condition]) -> String {
    let parts: Vec<String> = conditions
        .iter()
        .map(|condition| match condition {
            Condition::Or(nested) => format!("or{}", render_or(nested)),
            other => {
                let (name, expression) = render_condition(other);
                format!("{}.{}", name, expression)
            }
        })
        .collect();
    format!("({})", parts.join(","))
}

fn render_query(filter: &Filter, options: &FindOptions) -> String {
    let mut parts = vec!["select=*".to_string()];

    for condition in &filter.conditions {
        let (name, expression) = render_condition(condition);
        parts.push(format!("{}={}", name, expression));
    }

    if !options.sort.is_empty() {
        let order: Vec<String> = options
            .sort
            .iter()
            .map(|(name, order)| match order {
                SortOrder::Asc => format!("{}.asc.nullslast", name),
                SortOrder::Desc => format!("{}.desc.nullslast", name),
            })
            .collect();
        parts.push(format!("order={}", order.join(",")));
    }
    if let Some(limit) = options.limit {
        parts.push(format!("limit={}", limit));
    }
    if let Some(offset) = options.offset {
        parts.push(format!("offset={}", offset));
    }

    parts.join("&")
}

fn by_id(id: &str) -> String {
    format!("id=eq.{}", urlencoding::encode(id))
}

#[async_trait]
impl DocumentStore for SupabaseStore {
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Value>, StoreError> {
        let path = format!("/rest/v1/{}?{}", collection, render_query(filter, options));
        self.client
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn insert_one(&self, collection: &str, document: Value) -> Result<Value, StoreError> {
        let path = format!("/rest/v1/{}", collection);
        self.send(Method::POST, &path, Some(document))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend(format!("Insert into {} returned no rows", collection)))
    }

    async fn replace_one(&self, collection: &str, id: &str, document: Value) -> Result<bool, StoreError> {
        let mut document = match document {
            Value::Object(map) => map,
            _ => return Err(StoreError::Backend("Documents must be JSON objects".to_string())),
        };
        document.insert("id".to_string(), Value::String(id.to_string()));

        // PUT upserts in PostgREST, so only replace rows that exist.
        let exists = self.find_one(collection, &Filter::by_id(id)).await?.is_some();
        if !exists {
            return Ok(false);
        }

        let path = format!("/rest/v1/{}?{}", collection, by_id(id));
        let rows = self.send(Method::PUT, &path, Some(Value::Object(document))).await?;
        Ok(!rows.is_empty())
    }

    async fn update_one(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<Option<Value>, StoreError> {
        let path = format!("/rest/v1/{}?{}", collection, by_id(id));
        Ok(self
            .send(Method::PATCH, &path, Some(Value::Object(fields)))
            .await?
            .into_iter()
            .next())
    }

    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let path = format!("/rest/v1/{}?{}", collection, by_id(id));
        Ok(!self.send(Method::DELETE, &path, None).await?.is_empty())
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let path = format!("/rest/v1/{}?{}", collection, render_query(filter, &FindOptions::new()));
        Ok(self.send(Method::DELETE, &path, None).await?.len() as u64)
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let query = render_query(filter, &FindOptions::new()).replacen("select=*", "select=id", 1);
        let path = format!("/rest/v1/{}?{}", collection, query);
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(rows.len() as u64)
    }
}
