use super::{Result, Storage, StorageError};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::types::{
    LedgerEntry, NewProduct, NewTransaction, PartyRef, Profile, ProductRecord, TracedProduct,
    TransactionRecord,
};

#[derive(Debug, Default)]
struct Tables {
    profiles: HashMap<String, Profile>,
    products: Vec<ProductRecord>,
    transactions: Vec<TransactionRecord>,
}

impl Tables {
    fn party(&self, user_id: &str) -> Option<PartyRef> {
        self.profiles.get(user_id).map(PartyRef::from)
    }

    fn join(&self, product: &ProductRecord) -> TracedProduct {
        let transactions = self
            .transactions
            .iter()
            .filter(|tx| tx.product_id == product.id)
            .map(|tx| LedgerEntry {
                transaction: tx.clone(),
                from_user: self.party(&tx.from_user_id),
                to_user: self.party(&tx.to_user_id),
            })
            .collect();

        TracedProduct {
            product: product.clone(),
            transactions,
        }
    }

    /// Products newest first; equal timestamps put the later insert first
    fn newest_first(&self) -> impl Iterator<Item = &ProductRecord> {
        let mut products: Vec<&ProductRecord> = self.products.iter().rev().collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        products.into_iter()
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// In-process relational store, used for local runs and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        Ok(self.tables.read().profiles.get(id).cloned())
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<Profile> {
        let mut tables = self.tables.write();
        if tables.profiles.contains_key(&profile.id) {
            return Err(StorageError::WriteError(format!(
                "duplicate key value violates unique constraint: profiles.id = {}",
                profile.id
            )));
        }
        tables.profiles.insert(profile.id.clone(), profile.clone());
        Ok(profile.clone())
    }

    async fn insert_product(&self, product: &NewProduct) -> Result<ProductRecord> {
        let record = product
            .clone()
            .into_record(Uuid::new_v4().to_string(), Utc::now());
        self.tables.write().products.push(record.clone());
        Ok(record)
    }

    async fn insert_transaction(&self, tx: &NewTransaction) -> Result<TransactionRecord> {
        let mut tables = self.tables.write();
        if !tables.products.iter().any(|p| p.id == tx.product_id) {
            return Err(StorageError::WriteError(format!(
                "foreign key violation: product {} does not exist",
                tx.product_id
            )));
        }
        let record = tx.clone().into_record(Uuid::new_v4().to_string(), Utc::now());
        tables.transactions.push(record.clone());
        Ok(record)
    }

    async fn product_by_id(&self, id: &str) -> Result<Option<TracedProduct>> {
        let tables = self.tables.read();
        Ok(tables
            .products
            .iter()
            .find(|p| p.id == id)
            .map(|p| tables.join(p)))
    }

    async fn product_by_custom_id(&self, custom_id: &str) -> Result<Option<TracedProduct>> {
        let tables = self.tables.read();
        let found = tables
            .newest_first()
            .find(|p| p.quality_metrics.custom_product_id.as_deref() == Some(custom_id));
        Ok(found.map(|p| tables.join(p)))
    }

    async fn products_matching_name(&self, term: &str, limit: usize) -> Result<Vec<TracedProduct>> {
        let tables = self.tables.read();
        Ok(tables
            .products
            .iter()
            .filter(|p| contains_ignore_case(&p.product_name, term))
            .take(limit)
            .map(|p| tables.join(p))
            .collect())
    }

    async fn products_by_farmer(&self, farmer_id: &str) -> Result<Vec<TracedProduct>> {
        let tables = self.tables.read();
        Ok(tables
            .newest_first()
            .filter(|p| p.farmer_id == farmer_id)
            .map(|p| tables.join(p))
            .collect())
    }

    async fn search_products(&self, term: &str, limit: usize) -> Result<Vec<TracedProduct>> {
        let tables = self.tables.read();
        Ok(tables
            .products
            .iter()
            .filter(|p| {
                contains_ignore_case(&p.product_name, term)
                    || p
                        .quality_metrics
                        .custom_product_id
                        .as_deref()
                        .map_or(false, |id| contains_ignore_case(id, term))
            })
            .take(limit)
            .map(|p| tables.join(p))
            .collect())
    }

    async fn count_products(&self) -> Result<u64> {
        Ok(self.tables.read().products.len() as u64)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{QualityGrade, QualityMetrics, TransactionType};
    use chrono::NaiveDate;

    fn new_product(name: &str, farmer: &str, custom_id: &str) -> NewProduct {
        NewProduct {
            farmer_id: farmer.to_string(),
            product_name: name.to_string(),
            category: "agricultural".to_string(),
            harvest_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            quality_metrics: QualityMetrics {
                grade: Some(QualityGrade::A),
                quantity: Some(5.0),
                farm_location: None,
                custom_product_id: Some(custom_id.to_string()),
            },
            organic_certifications: serde_json::json!({}),
            qr_code_hash: None,
            description: format!("{} from Cuttack", name),
            batch_number: "batch_1".to_string(),
        }
    }

    fn new_tx(product_id: &str, from: &str, to: &str) -> NewTransaction {
        NewTransaction {
            product_id: product_id.to_string(),
            from_user_id: from.to_string(),
            to_user_id: to.to_string(),
            transaction_type: TransactionType::FarmToDistributor,
            price: 200.0,
            quantity: 5.0,
            transaction_hash: "tx_1_abcdefghi".to_string(),
            location: None,
            notes: None,
            quality_check_passed: true,
        }
    }

    #[tokio::test]
    async fn test_profile_roundtrip_and_duplicate() {
        let storage = MemoryStorage::new();
        let profile = Profile::farmer("f1", "ravi@example.com", Utc::now());

        assert!(storage.get_profile("f1").await.unwrap().is_none());
        storage.insert_profile(&profile).await.unwrap();
        assert_eq!(storage.get_profile("f1").await.unwrap(), Some(profile.clone()));
        assert!(matches!(
            storage.insert_profile(&profile).await,
            Err(StorageError::WriteError(_))
        ));
    }

    #[tokio::test]
    async fn test_join_carries_profiles() {
        let storage = MemoryStorage::new();
        storage
            .insert_profile(&Profile::farmer("f1", "ravi@example.com", Utc::now()))
            .await
            .unwrap();
        let product = storage.insert_product(&new_product("Rice", "f1", "prod_1")).await.unwrap();
        storage.insert_transaction(&new_tx(&product.id, "f1", "f1")).await.unwrap();

        let traced = storage.product_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(traced.transactions.len(), 1);
        let to_user = traced.transactions[0].to_user.as_ref().unwrap();
        assert_eq!(to_user.business_name.as_deref(), Some("ravi Farms"));
    }

    #[tokio::test]
    async fn test_transaction_requires_product() {
        let storage = MemoryStorage::new();
        let result = storage.insert_transaction(&new_tx("missing", "a", "b")).await;
        assert!(matches!(result, Err(StorageError::WriteError(_))));
    }

    #[tokio::test]
    async fn test_custom_id_prefers_newest() {
        let storage = MemoryStorage::new();
        let older = storage.insert_product(&new_product("Rice", "f1", "dup")).await.unwrap();
        let newer = storage.insert_product(&new_product("Wheat", "f1", "dup")).await.unwrap();

        let found = storage.product_by_custom_id("dup").await.unwrap().unwrap();
        assert_eq!(found.product.id, newer.id);
        assert_ne!(found.product.id, older.id);
        assert!(storage.product_by_custom_id("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_name_and_search_matching() {
        let storage = MemoryStorage::new();
        storage.insert_product(&new_product("Basmati Rice", "f1", "prod_a")).await.unwrap();
        storage.insert_product(&new_product("Red Onion", "f2", "prod_b")).await.unwrap();
        storage.insert_product(&new_product("Brown Rice", "f1", "prod_c")).await.unwrap();

        assert_eq!(storage.products_matching_name("RICE", 10).await.unwrap().len(), 2);
        assert_eq!(storage.products_matching_name("rice", 1).await.unwrap().len(), 1);
        assert_eq!(storage.search_products("prod_b", 10).await.unwrap()[0].product.product_name, "Red Onion");
        assert_eq!(storage.search_products("PROD", 2).await.unwrap().len(), 2);
        assert_eq!(storage.products_by_farmer("f1").await.unwrap().len(), 2);
        assert_eq!(storage.count_products().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_farmer_products_newest_first() {
        let storage = MemoryStorage::new();
        storage.insert_product(&new_product("First", "f1", "p1")).await.unwrap();
        storage.insert_product(&new_product("Second", "f1", "p2")).await.unwrap();

        let products = storage.products_by_farmer("f1").await.unwrap();
        assert_eq!(products[0].product.product_name, "Second");
        assert_eq!(products[1].product.product_name, "First");
    }
}
