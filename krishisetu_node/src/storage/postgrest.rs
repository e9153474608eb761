use super::{Result, Storage, StorageError};
use crate::config::StorageSettings;
use crate::types::{
    NewProduct, NewTransaction, Profile, ProductRecord, TracedProduct, TransactionRecord,
};
use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Product columns plus the transaction log and both parties' profiles
pub const TRACED_SELECT: &str = "*,transactions(*,from_user:profiles!transactions_from_user_id_fkey(email,business_name),to_user:profiles!transactions_to_user_id_fkey(email,business_name))";

const CUSTOM_ID_COLUMN: &str = "quality_metrics->>customProductId";

/// Escapes LIKE metacharacters so the term matches literally.
///
/// PostgREST rewrites every `*` in a pattern to `%` and has no escape for
/// it, so a `*` in the term becomes `_` and matches any single character.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        match c {
            '\\' | '%' | '_' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '*' => escaped.push('_'),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Double-quotes a value inside an `or=(...)` group
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Query string pairs for a PostgREST table request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostgrestQuery {
    params: Vec<(String, String)>,
}

impl PostgrestQuery {
    pub fn select(columns: &str) -> Self {
        Self {
            params: vec![("select".to_string(), columns.to_string())],
        }
    }

    pub fn eq(mut self, column: &str, value: &str) -> Self {
        self.params.push((column.to_string(), format!("eq.{}", value)));
        self
    }

    /// `column ILIKE '%term%'`
    pub fn ilike_contains(mut self, column: &str, term: &str) -> Self {
        self.params
            .push((column.to_string(), format!("ilike.*{}*", escape_like(term))));
        self
    }

    /// Any of `columns` ILIKE `'%term%'`
    pub fn any_ilike_contains(mut self, columns: &[&str], term: &str) -> Self {
        let pattern = quote(&format!("*{}*", escape_like(term)));
        let alternatives: Vec<String> = columns
            .iter()
            .map(|column| format!("{}.ilike.{}", column, pattern))
            .collect();
        self.params
            .push(("or".to_string(), format!("({})", alternatives.join(","))));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.params
            .push(("order".to_string(), format!("{}.{}", column, direction)));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.params.push(("limit".to_string(), n.to_string()));
        self
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

/// Total row count from a `Content-Range` header such as `0-9/42` or `*/42`
fn total_from_content_range(header: &str) -> Option<u64> {
    let (_, total) = header.rsplit_once('/')?;
    total.trim().parse().ok()
}

fn transport_error(err: reqwest::Error) -> StorageError {
    if err.is_connect() || err.is_timeout() {
        StorageError::ConnectionError(err.to_string())
    } else {
        StorageError::ReadError(err.to_string())
    }
}

async fn check_status(response: Response, on_error: fn(String) -> StorageError) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(on_error(format!("{}: {}", status, body)))
}

/// Hosted Postgres reached through its PostgREST interface
#[derive(Debug, Clone)]
pub struct PostgrestStorage {
    /// HTTP client carrying the api key headers
    client: Client,

    /// Project URL without trailing slash
    base_url: String,
}

impl PostgrestStorage {
    pub fn new(settings: &StorageSettings) -> Result<Self> {
        let base_url = settings
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| StorageError::ConnectionError("storage url is not configured".to_string()))?;
        let api_key = settings
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| StorageError::ConnectionError("storage api key is not configured".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(api_key).map_err(|e| StorageError::InvalidData(e.to_string()))?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| StorageError::InvalidData(e.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| StorageError::ConnectionError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn fetch<T: DeserializeOwned>(&self, table: &str, query: &PostgrestQuery) -> Result<Vec<T>> {
        debug!("GET {} {:?}", table, query.params());
        let response = self
            .client
            .get(self.table_url(table))
            .query(query.params())
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response, StorageError::ReadError).await?;
        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| StorageError::InvalidData(e.to_string()))
    }

    async fn fetch_one<T: DeserializeOwned>(&self, table: &str, query: PostgrestQuery) -> Result<Option<T>> {
        let rows = self.fetch(table, &query.limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert<B, T>(&self, table: &str, row: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        debug!("POST {}", table);
        let response = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&[row])
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response, StorageError::WriteError).await?;
        let rows = response
            .json::<Vec<T>>()
            .await
            .map_err(|e| StorageError::InvalidData(e.to_string()))?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StorageError::WriteError(format!("insert into {} returned no rows", table)))
    }
}

#[async_trait]
impl Storage for PostgrestStorage {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        self.fetch_one("profiles", PostgrestQuery::select("*").eq("id", id))
            .await
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<Profile> {
        self.insert("profiles", profile).await
    }

    async fn insert_product(&self, product: &NewProduct) -> Result<ProductRecord> {
        self.insert("products", product).await
    }

    async fn insert_transaction(&self, tx: &NewTransaction) -> Result<TransactionRecord> {
        self.insert("transactions", tx).await
    }

    async fn product_by_id(&self, id: &str) -> Result<Option<TracedProduct>> {
        // the id column is a uuid; anything else would be rejected by the cast
        if Uuid::parse_str(id).is_err() {
            return Ok(None);
        }
        self.fetch_one("products", PostgrestQuery::select(TRACED_SELECT).eq("id", id))
            .await
    }

    async fn product_by_custom_id(&self, custom_id: &str) -> Result<Option<TracedProduct>> {
        let query = PostgrestQuery::select(TRACED_SELECT)
            .eq(CUSTOM_ID_COLUMN, custom_id)
            .order("created_at", false);
        self.fetch_one("products", query).await
    }

    async fn products_matching_name(&self, term: &str, limit: usize) -> Result<Vec<TracedProduct>> {
        let query = PostgrestQuery::select(TRACED_SELECT)
            .ilike_contains("product_name", term)
            .limit(limit);
        self.fetch("products", &query).await
    }

    async fn products_by_farmer(&self, farmer_id: &str) -> Result<Vec<TracedProduct>> {
        let query = PostgrestQuery::select(TRACED_SELECT)
            .eq("farmer_id", farmer_id)
            .order("created_at", false);
        self.fetch("products", &query).await
    }

    async fn search_products(&self, term: &str, limit: usize) -> Result<Vec<TracedProduct>> {
        let query = PostgrestQuery::select(TRACED_SELECT)
            .any_ilike_contains(&["product_name", CUSTOM_ID_COLUMN], term)
            .limit(limit);
        self.fetch("products", &query).await
    }

    async fn count_products(&self) -> Result<u64> {
        let query = PostgrestQuery::select("id").limit(0);
        debug!("GET products {:?} (count)", query.params());
        let response = self
            .client
            .get(self.table_url("products"))
            .query(query.params())
            .header("Prefer", "count=exact")
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response, StorageError::ReadError).await?;
        let content_range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| StorageError::InvalidData("missing Content-Range header".to_string()))?;
        total_from_content_range(content_range).ok_or_else(|| {
            StorageError::InvalidData(format!("no row count in Content-Range `{}`", content_range))
        })
    }

    fn backend_name(&self) -> &'static str {
        "postgrest"
    }
}
