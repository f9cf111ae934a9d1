use crate::config::{Config, StoreConfig};
use crate::errors::StoreError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Athletes,
    WeeklyData,
    Users,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Athletes => "athletes",
            Collection::WeeklyData => "weekly_data",
            Collection::Users => "users",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order: Option<(String, Direction)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push((column.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.order = Some((column.to_string(), direction));
        self
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.filters
            .iter()
            .all(|(column, expected)| row.get(column).is_some_and(|actual| values_equal(actual, expected)))
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn query(&self, collection: Collection, query: &Query) -> Result<Vec<Row>, StoreError>;

    async fn insert(&self, collection: Collection, row: Row) -> Result<Row, StoreError>;

    async fn patch(&self, collection: Collection, id: i64, fields: Row) -> Result<Row, StoreError>;

    async fn delete(&self, collection: Collection, id: i64) -> Result<(), StoreError>;
}

pub fn to_row<T: Serialize>(value: &T) -> Result<Row, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(row) => Ok(row),
        _ => Err(StoreError::Serialization(serde::ser::Error::custom(
            "row must serialize to a JSON object",
        ))),
    }
}

pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.to_lowercase().cmp(&b.to_lowercase()),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        // Nulls sort last, as PostgREST does for ascending order.
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

fn row_id(row: &Row) -> Option<i64> {
    row.get("id").and_then(Value::as_i64)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreData {
    #[serde(default)]
    pub tables: BTreeMap<String, Vec<Row>>,
    #[serde(default)]
    pub next_ids: BTreeMap<String, i64>,
}

impl StoreData {
    fn next_id(&mut self, collection: Collection) -> i64 {
        let rows = self.tables.get(collection.as_str());
        let highest = rows
            .into_iter()
            .flatten()
            .filter_map(row_id)
            .max()
            .unwrap_or(0);
        let counter = self.next_ids.entry(collection.as_str().to_string()).or_insert(1);
        let id = (*counter).max(highest + 1);
        *counter = id + 1;
        id
    }
}

/// Without a path the store lives purely in memory.
pub struct JsonStore {
    data_path: Option<PathBuf>,
    data: Mutex<StoreData>,
}

impl JsonStore {
    pub fn in_memory(data: StoreData) -> Self {
        Self {
            data_path: None,
            data: Mutex::new(data),
        }
    }

    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let data = load_data(path).await;
        Ok(Self {
            data_path: Some(path.to_path_buf()),
            data: Mutex::new(data),
        })
    }

    pub async fn snapshot(&self) -> StoreData {
        self.data.lock().await.clone()
    }

    async fn persist(&self, data: &StoreData) -> Result<(), StoreError> {
        match &self.data_path {
            Some(path) => persist_data(path, data).await,
            None => Ok(()),
        }
    }
}

pub async fn load_data(path: &Path) -> StoreData {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(data) => data,
            Err(err) => {
                error!("failed to parse data file: {err}");
                StoreData::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => StoreData::default(),
        Err(err) => {
            error!("failed to read data file: {err}");
            StoreData::default()
        }
    }
}

pub async fn persist_data(path: &Path, data: &StoreData) -> Result<(), StoreError> {
    let payload = serde_json::to_vec_pretty(data)?;
    fs::write(path, payload).await?;
    Ok(())
}

#[async_trait]
impl Store for JsonStore {
    async fn query(&self, collection: Collection, query: &Query) -> Result<Vec<Row>, StoreError> {
        let data = self.data.lock().await;
        let mut rows: Vec<Row> = data
            .tables
            .get(collection.as_str())
            .into_iter()
            .flatten()
            .filter(|row| query.matches(row))
            .cloned()
            .collect();

        if let Some((column, direction)) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(column), b.get(column));
                match direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }
        Ok(rows)
    }

    async fn insert(&self, collection: Collection, mut row: Row) -> Result<Row, StoreError> {
        let mut data = self.data.lock().await;
        let id = data.next_id(collection);
        row.insert("id".to_string(), Value::from(id));
        data.tables
            .entry(collection.as_str().to_string())
            .or_default()
            .push(row.clone());
        self.persist(&data).await?;
        debug!(collection = collection.as_str(), id, "inserted row");
        Ok(row)
    }

    async fn patch(&self, collection: Collection, id: i64, fields: Row) -> Result<Row, StoreError> {
        let mut data = self.data.lock().await;
        let updated = {
            let row = data
                .tables
                .get_mut(collection.as_str())
                .and_then(|rows| rows.iter_mut().find(|row| row_id(row) == Some(id)))
                .ok_or(StoreError::NotFound {
                    collection: collection.as_str(),
                    id,
                })?;
            for (column, value) in fields {
                if column != "id" {
                    row.insert(column, value);
                }
            }
            row.clone()
        };
        self.persist(&data).await?;
        Ok(updated)
    }

    async fn delete(&self, collection: Collection, id: i64) -> Result<(), StoreError> {
        let mut data = self.data.lock().await;
        if let Some(rows) = data.tables.get_mut(collection.as_str()) {
            rows.retain(|row| row_id(row) != Some(id));
        }
        self.persist(&data).await
    }
}

pub struct RestStore {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    fn request(&self, method: reqwest::Method, collection: Collection) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/rest/v1/{}", self.base_url, collection.as_str()))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=representation")
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        error!(status = status.as_u16(), %body, "data store rejected request");
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

fn filter_param(value: &Value) -> String {
    match value {
        Value::String(text) => format!("eq.{text}"),
        other => format!("eq.{other}"),
    }
}

fn id_filter(id: i64) -> [(&'static str, String); 1] {
    [("id", format!("eq.{id}"))]
}

#[async_trait]
impl Store for RestStore {
    async fn query(&self, collection: Collection, query: &Query) -> Result<Vec<Row>, StoreError> {
        let mut params: Vec<(String, String)> = vec![("select".to_string(), "*".to_string())];
        params.extend(
            query
                .filters
                .iter()
                .map(|(column, value)| (column.clone(), filter_param(value))),
        );
        if let Some((column, direction)) = &query.order {
            let suffix = match direction {
                Direction::Asc => "asc",
                Direction::Desc => "desc",
            };
            params.push(("order".to_string(), format!("{column}.{suffix}")));
        }

        let response = self
            .send(self.request(reqwest::Method::GET, collection).query(&params))
            .await?;
        Ok(response.json::<Vec<Row>>().await?)
    }

    async fn insert(&self, collection: Collection, row: Row) -> Result<Row, StoreError> {
        let response = self
            .send(self.request(reqwest::Method::POST, collection).json(&row))
            .await?;
        let mut rows = response.json::<Vec<Row>>().await?;
        if rows.is_empty() {
            return Err(StoreError::EmptyResponse);
        }
        Ok(rows.swap_remove(0))
    }

    async fn patch(&self, collection: Collection, id: i64, fields: Row) -> Result<Row, StoreError> {
        let response = self
            .send(
                self.request(reqwest::Method::PATCH, collection)
                    .query(&id_filter(id))
                    .json(&fields),
            )
            .await?;
        let mut rows = response.json::<Vec<Row>>().await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound {
                collection: collection.as_str(),
                id,
            });
        }
        Ok(rows.swap_remove(0))
    }

    async fn delete(&self, collection: Collection, id: i64) -> Result<(), StoreError> {
        self.send(self.request(reqwest::Method::DELETE, collection).query(&id_filter(id)))
            .await?;
        Ok(())
    }
}

pub async fn open_store(config: &Config) -> Result<Arc<dyn Store>, StoreError> {
    match &config.store {
        StoreConfig::File(path) => {
            info!("using data file {}", path.display());
            Ok(Arc::new(JsonStore::open(path).await?))
        }
        StoreConfig::Rest { base_url, api_key } => {
            info!("using data store at {base_url}");
            Ok(Arc::new(RestStore::new(base_url, api_key, config.request_timeout)?))
        }
    }
}
