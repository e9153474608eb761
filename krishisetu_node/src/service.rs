//! Traceability operations over the relational store.
//!
//! Every read and write goes to the store first. When the store fails (or a
//! lookup misses) and fallback is enabled, the operation is answered from
//! the simulated chain instead. Successful registrations are mirrored into
//! the chain so that products stay trackable through a later outage.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

use crate::config::{LedgerConfig, NodeConfig, QrConfig};
use crate::error::TraceError;
use crate::ledger::{self, SimulatedChain, SimulatedProduct};
use crate::pricing::{self, PricedBatch};
use crate::storage::Storage;
use crate::types::{
    FarmerStats, NewProduct, NewTransaction, PartyRef, ProductRecord, ProductView, Profile,
    QualityMetrics, RegisterProductRequest, RegistrationReceipt, TracedProduct, TransactionRecord,
    TransactionType, TransferReceipt, TransferRequest,
};
use crate::validation;

pub type Result<T> = std::result::Result<T, TraceError>;

const CATEGORY: &str = "agricultural";
const REGISTRATION_NOTES: &str = "Product registered by farmer on blockchain";

/// Store health and product counts
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub message: String,
    pub backend: &'static str,
    pub connected: bool,
    pub fallback_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_products_in_db: Option<u64>,
    pub total_products_in_memory: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
    /// Contents of the simulated chain, listed only in fallback mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<ProductView>>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub struct TraceabilityService {
    storage: Arc<dyn Storage>,
    chain: Arc<SimulatedChain>,
    ledger: LedgerConfig,
    qr: QrConfig,
    /// Time of the last successful store round trip
    last_sync: RwLock<Option<DateTime<Utc>>>,
}

impl TraceabilityService {
    pub fn new(storage: Arc<dyn Storage>, config: &NodeConfig) -> Self {
        Self::with_chain(storage, Arc::new(SimulatedChain::new()), config)
    }

    pub fn with_chain(storage: Arc<dyn Storage>, chain: Arc<SimulatedChain>, config: &NodeConfig) -> Self {
        Self {
            storage,
            chain,
            ledger: config.ledger.clone(),
            qr: config.qr.clone(),
            last_sync: RwLock::new(None),
        }
    }

    pub fn chain(&self) -> &Arc<SimulatedChain> {
        &self.chain
    }

    pub fn backend_name(&self) -> &'static str {
        self.storage.backend_name()
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        *self.last_sync.read()
    }

    fn mark_synced(&self) {
        *self.last_sync.write() = Some(Utc::now());
    }

    fn can_fall_back(&self, operation: &str, err: &TraceError) -> bool {
        if self.ledger.fallback_enabled && err.is_recoverable() {
            warn!("{} failed, using simulated chain: {}", operation, err);
            true
        } else {
            false
        }
    }

    fn view_of(&self, traced: TracedProduct) -> ProductView {
        ProductView::from_traced(traced, &self.ledger.default_farm_location)
    }

    /// Returns the stored profile, creating a farmer profile on first use
    pub async fn ensure_farmer_profile(&self, user_id: &str, email: &str) -> Result<Profile> {
        if let Some(profile) = self.storage.get_profile(user_id).await? {
            return Ok(profile);
        }

        info!("Creating farmer profile for {}", user_id);
        let profile = Profile::farmer(user_id, email, Utc::now());
        Ok(self.storage.insert_profile(&profile).await?)
    }

    pub async fn register_product(&self, req: RegisterProductRequest) -> Result<RegistrationReceipt> {
        let req = req.trimmed();
        validation::validate_registration(&req)?;

        let now = Utc::now();
        let custom_id = non_blank(&req.product_id)
            .map(str::to_string)
            .unwrap_or_else(|| ledger::generate_product_id(now));
        let qr_code = non_blank(&req.qr_code)
            .map(str::to_string)
            .unwrap_or_else(|| self.qr.url_for(&custom_id));
        let farm_location = non_blank(&req.farm_location)
            .map(str::to_string)
            .unwrap_or_else(|| self.ledger.default_farm_location.clone());

        match self
            .store_registration(&req, &custom_id, &qr_code, &farm_location, now)
            .await
        {
            Ok((product, tx, farmer)) => {
                self.mark_synced();
                info!(
                    "Registered product {} ({}) for farmer {}",
                    product.id, custom_id, req.farmer_id
                );
                let mut mirrored = SimulatedProduct::registration(
                    &req,
                    product.id.clone(),
                    Some(qr_code),
                    farm_location,
                    now,
                );
                mirrored.view.current_owner =
                    ledger::owner_label(Some(&PartyRef::from(&farmer))).to_string();
                self.chain.record(mirrored);
                Ok(RegistrationReceipt {
                    product_id: product.id,
                    transaction_id: tx.transaction_hash,
                    timestamp: now,
                })
            }
            Err(err) if self.can_fall_back("registerProduct", &err) => {
                self.chain.record(SimulatedProduct::registration(
                    &req,
                    custom_id.clone(),
                    Some(qr_code),
                    farm_location,
                    now,
                ));
                Ok(RegistrationReceipt {
                    product_id: custom_id,
                    transaction_id: ledger::fallback_transaction_id(now),
                    timestamp: now,
                })
            }
            Err(err) => Err(err),
        }
    }

    async fn store_registration(
        &self,
        req: &RegisterProductRequest,
        custom_id: &str,
        qr_code: &str,
        farm_location: &str,
        now: DateTime<Utc>,
    ) -> Result<(ProductRecord, TransactionRecord, Profile)> {
        let farmer_id = req.farmer_id.trim();
        let email = non_blank(&req.farmer_name).unwrap_or(farmer_id);
        let farmer = self.ensure_farmer_profile(farmer_id, email).await?;

        let product_type = req.product_type.trim();
        let new_product = NewProduct {
            farmer_id: farmer_id.to_string(),
            product_name: product_type.to_string(),
            category: CATEGORY.to_string(),
            harvest_date: req.harvest_date.unwrap_or_else(|| now.date_naive()),
            quality_metrics: QualityMetrics {
                grade: Some(req.quality.clone()),
                quantity: Some(req.quantity),
                farm_location: Some(farm_location.to_string()),
                custom_product_id: Some(custom_id.to_string()),
            },
            organic_certifications: serde_json::json!({}),
            qr_code_hash: Some(qr_code.to_string()),
            description: format!("{} from {}", product_type, farm_location),
            batch_number: ledger::batch_number(now),
        };
        let product = self.storage.insert_product(&new_product).await?;

        let initial = NewTransaction {
            product_id: product.id.clone(),
            from_user_id: farmer_id.to_string(),
            to_user_id: farmer_id.to_string(),
            transaction_type: TransactionType::FarmToDistributor,
            price: pricing::calculate_price(&req.quality, req.quantity),
            quantity: req.quantity,
            transaction_hash: ledger::transaction_hash(now),
            location: Some(farm_location.to_string()),
            notes: Some(REGISTRATION_NOTES.to_string()),
            quality_check_passed: true,
        };
        let tx = self.storage.insert_transaction(&initial).await?;

        Ok((product, tx, farmer))
    }

    /// Primary key, then custom product id, then the first product whose
    /// name contains the term
    pub async fn resolve_product(&self, term: &str) -> Result<TracedProduct> {
        let term = validation::validate_required("productId", term)?;

        if let Some(product) = self.storage.product_by_id(term).await? {
            return Ok(product);
        }
        debug!("{} is not a primary key, trying custom product id", term);

        if let Some(product) = self.storage.product_by_custom_id(term).await? {
            return Ok(product);
        }
        debug!("{} is not a custom product id, trying product name", term);

        self.storage
            .products_matching_name(term, 1)
            .await?
            .into_iter()
            .next()
            .ok_or(TraceError::NotFound)
    }

    pub async fn get_product_history(&self, term: &str) -> Result<ProductView> {
        let term = validation::validate_required("productId", term)?;

        match self.resolve_product(term).await {
            Ok(traced) => {
                self.mark_synced();
                debug!("Product {} found in store", traced.product.id);
                Ok(self.view_of(traced))
            }
            Err(err) if self.can_fall_back("getProductHistory", &err) => {
                self.chain.find(term).ok_or(TraceError::NotFound)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn get_farmer_products(&self, farmer_id: &str) -> Result<Vec<ProductView>> {
        let farmer_id = validation::validate_required("farmerId", farmer_id)?;

        match self.storage.products_by_farmer(farmer_id).await {
            Ok(products) => {
                self.mark_synced();
                Ok(products.into_iter().map(|p| self.view_of(p)).collect())
            }
            Err(err) => {
                let err = TraceError::from(err);
                if !self.can_fall_back("getFarmerProducts", &err) {
                    return Err(err);
                }
                Ok(self
                    .chain
                    .by_farmer(farmer_id)
                    .into_iter()
                    .map(|p| p.view)
                    .collect())
            }
        }
    }

    pub async fn search_products(&self, term: &str) -> Result<Vec<ProductView>> {
        let term = validation::validate_required("searchTerm", term)?;
        let limit = self.ledger.search_limit;

        match self.storage.search_products(term, limit).await {
            Ok(products) => {
                self.mark_synced();
                Ok(products.into_iter().map(|p| self.view_of(p)).collect())
            }
            Err(err) => {
                let err = TraceError::from(err);
                if !self.can_fall_back("searchProducts", &err) {
                    return Err(err);
                }
                Ok(self.chain.search(term, limit))
            }
        }
    }

    pub async fn get_farmer_stats(&self, farmer_id: &str) -> Result<FarmerStats> {
        let farmer_id = validation::validate_required("farmerId", farmer_id)?;
        let today = Utc::now().date_naive();

        match self.storage.products_by_farmer(farmer_id).await {
            Ok(products) => {
                self.mark_synced();
                let batches: Vec<PricedBatch> =
                    products.iter().map(|p| PricedBatch::from(&p.product)).collect();
                Ok(pricing::farmer_stats(&batches, today))
            }
            Err(err) => {
                let err = TraceError::from(err);
                if !self.can_fall_back("getFarmerStats", &err) {
                    return Err(err);
                }
                let batches: Vec<PricedBatch> = self
                    .chain
                    .by_farmer(farmer_id)
                    .iter()
                    .map(SimulatedProduct::priced_batch)
                    .collect();
                Ok(pricing::farmer_stats(&batches, today))
            }
        }
    }

    pub async fn transfer_product(&self, req: TransferRequest) -> Result<TransferReceipt> {
        let req = req.trimmed();
        validation::validate_transfer(&req)?;
        let now = Utc::now();

        match self.store_transfer(&req, now).await {
            Ok(receipt) => Ok(receipt),
            Err(err) if self.can_fall_back("transferProduct", &err) => {
                let transaction_id = ledger::fallback_transaction_id(now);
                let view = self
                    .chain
                    .transfer(&req, None, &transaction_id, now)
                    .ok_or(TraceError::NotFound)?;
                Ok(TransferReceipt {
                    product_id: view.product_id,
                    transaction_id,
                    status: view.status,
                    current_owner: view.current_owner,
                    timestamp: now,
                })
            }
            Err(err) => Err(err),
        }
    }

    async fn store_transfer(&self, req: &TransferRequest, now: DateTime<Utc>) -> Result<TransferReceipt> {
        let traced = self.resolve_product(&req.product_id).await?;
        let product = &traced.product;
        let metrics = &product.quality_metrics;

        let quantity = req.quantity.unwrap_or_else(|| metrics.quantity_or_zero());
        let price = req
            .price
            .unwrap_or_else(|| pricing::calculate_price(&metrics.grade_or_default(), quantity));

        let tx = self
            .storage
            .insert_transaction(&NewTransaction {
                product_id: product.id.clone(),
                from_user_id: req.from_user_id.clone(),
                to_user_id: req.to_user_id.clone(),
                transaction_type: req.transaction_type.clone(),
                price,
                quantity,
                transaction_hash: ledger::transaction_hash(now),
                location: req.location.clone(),
                notes: req.notes.clone(),
                quality_check_passed: true,
            })
            .await?;
        self.mark_synced();

        // the transaction is already written; a failed lookup only costs the label
        let receiver = self.storage.get_profile(&tx.to_user_id).await.ok().flatten();
        let party = receiver.as_ref().map(PartyRef::from);
        let current_owner = ledger::owner_label(party.as_ref()).to_string();

        // keep a mirrored copy in step with the store
        let mirrored = TransferRequest {
            product_id: product.id.clone(),
            ..req.clone()
        };
        let _ = self
            .chain
            .transfer(&mirrored, party.as_ref(), &tx.transaction_hash, now);

        info!(
            "Product {} transferred {} -> {} ({})",
            product.id, tx.from_user_id, tx.to_user_id, tx.transaction_type
        );

        Ok(TransferReceipt {
            product_id: product.id.clone(),
            status: ledger::status_of(&tx).to_string(),
            transaction_id: tx.transaction_hash,
            current_owner,
            timestamp: now,
        })
    }

    /// Store health plus product counts; lists the simulated chain when
    /// the store cannot be reached
    pub async fn network_stats(&self) -> NetworkStats {
        let backend = self.storage.backend_name();
        match self.storage.count_products().await {
            Ok(count) => {
                self.mark_synced();
                NetworkStats {
                    message: "Traceability API and database are working".to_string(),
                    backend,
                    connected: true,
                    fallback_mode: false,
                    total_products_in_db: Some(count),
                    total_products_in_memory: self.chain.len(),
                    last_sync: self.last_sync(),
                    products: None,
                }
            }
            Err(err) => {
                warn!("Store unreachable, reporting fallback mode: {}", err);
                NetworkStats {
                    message: "Traceability API is working (fallback mode)".to_string(),
                    backend,
                    connected: false,
                    fallback_mode: true,
                    total_products_in_db: None,
                    total_products_in_memory: self.chain.len(),
                    last_sync: self.last_sync(),
                    products: Some(self.chain.snapshot()),
                }
            }
        }
    }
}
