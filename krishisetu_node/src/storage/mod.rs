use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{StorageBackend, StorageSettings};
use crate::types::{NewProduct, NewTransaction, Profile, ProductRecord, TracedProduct, TransactionRecord};

// Storage-specific Result type
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Write error: {0}")]
    WriteError(String),
    #[error("Read error: {0}")]
    ReadError(String),
    #[error("Connection error: {0}")]
    ConnectionError(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Typed queries against the relational store.
///
/// Every product lookup returns the product joined with its transactions
/// and the profiles on both ends of each transaction.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>>;
    async fn insert_profile(&self, profile: &Profile) -> Result<Profile>;
    async fn insert_product(&self, product: &NewProduct) -> Result<ProductRecord>;
    async fn insert_transaction(&self, tx: &NewTransaction) -> Result<TransactionRecord>;

    /// Exact primary key match
    async fn product_by_id(&self, id: &str) -> Result<Option<TracedProduct>>;

    /// Match on `quality_metrics.customProductId`; the most recently
    /// created product wins when several carry the same id
    async fn product_by_custom_id(&self, custom_id: &str) -> Result<Option<TracedProduct>>;

    /// Products whose name contains `term`, ignoring case
    async fn products_matching_name(&self, term: &str, limit: usize) -> Result<Vec<TracedProduct>>;

    /// A farmer's products, newest first
    async fn products_by_farmer(&self, farmer_id: &str) -> Result<Vec<TracedProduct>>;

    /// Products whose name or custom id contains `term`, ignoring case
    async fn search_products(&self, term: &str, limit: usize) -> Result<Vec<TracedProduct>>;

    async fn count_products(&self) -> Result<u64>;

    /// Short backend label for status output
    fn backend_name(&self) -> &'static str;
}

/// Builds the backend selected in the settings
pub fn open(settings: &StorageSettings) -> Result<Arc<dyn Storage>> {
    match settings.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStorage::new())),
        StorageBackend::Postgrest => Ok(Arc::new(PostgrestStorage::new(settings)?)),
    }
}

pub mod memory;
pub mod postgrest;

pub use memory::*;
pub use postgrest::*;
