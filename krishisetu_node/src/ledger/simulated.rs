//! In-memory stand-in for the store.
//!
//! Registrations are mirrored here so that tracking keeps answering while
//! the database is unreachable. Contents live for the process lifetime only.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::history::{action_for, owner_label, transfer_status, DEFAULT_OWNER, STATUS_REGISTERED};
use crate::pricing::{self, PricedBatch};
use crate::types::{
    HistoryEntry, PartyRef, ProductView, QualityGrade, RegisterProductRequest, TransferRequest,
};

/// A product held by the simulated chain
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedProduct {
    pub view: ProductView,
    pub grade: QualityGrade,
    pub quantity_kg: f64,
}

impl SimulatedProduct {
    /// Freshly registered product with a single "Registered" step
    pub fn registration(
        req: &RegisterProductRequest,
        product_id: String,
        qr_code: Option<String>,
        farm_location: String,
        now: DateTime<Utc>,
    ) -> Self {
        let by = req
            .farmer_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(DEFAULT_OWNER)
            .to_string();

        let view = ProductView {
            product_id,
            product_type: req.product_type.clone(),
            quantity: pricing::format_quantity(req.quantity),
            status: STATUS_REGISTERED.to_string(),
            timestamp: now,
            current_owner: DEFAULT_OWNER.to_string(),
            price: pricing::format_rupees(pricing::calculate_price(&req.quality, req.quantity)),
            price_per_kg: pricing::format_per_kg(&req.quality),
            farmer_id: Some(req.farmer_id.clone()),
            farmer_name: req.farmer_name.clone(),
            qr_code,
            farm_location,
            harvest_date: req.harvest_date,
            quality: req.quality.to_string(),
            history: vec![HistoryEntry {
                action: STATUS_REGISTERED.to_string(),
                by,
                timestamp: now,
                details: Some("Product registered on blockchain".to_string()),
                transaction_hash: None,
                location: None,
                quantity: None,
                price: None,
            }],
        };

        Self {
            view,
            grade: req.quality.clone(),
            quantity_kg: req.quantity,
        }
    }

    pub fn priced_batch(&self) -> PricedBatch {
        PricedBatch {
            grade: self.grade.clone(),
            quantity: self.quantity_kg,
            harvest_date: self.view.harvest_date,
        }
    }

    fn matches(&self, term: &str, lowered: &str) -> bool {
        self.view.product_id == term
            || self
                .view
                .qr_code
                .as_deref()
                .map_or(false, |qr| qr.contains(term))
            || self.view.product_type.to_lowercase().contains(lowered)
    }
}

/// Process-wide fallback product list
#[derive(Debug, Default)]
pub struct SimulatedChain {
    products: RwLock<Vec<SimulatedProduct>>,
}

impl SimulatedChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, product: SimulatedProduct) {
        self.products.write().push(product);
    }

    /// First product whose id equals `term`, whose QR code contains it, or
    /// whose type contains it ignoring case.
    pub fn find(&self, term: &str) -> Option<ProductView> {
        let lowered = term.to_lowercase();
        self.products
            .read()
            .iter()
            .find(|p| p.matches(term, &lowered))
            .map(|p| p.view.clone())
    }

    pub fn by_farmer(&self, farmer_id: &str) -> Vec<SimulatedProduct> {
        self.products
            .read()
            .iter()
            .filter(|p| p.view.farmer_id.as_deref() == Some(farmer_id))
            .cloned()
            .collect()
    }

    /// Products whose type or id contains `term`, ignoring case
    pub fn search(&self, term: &str, limit: usize) -> Vec<ProductView> {
        let lowered = term.to_lowercase();
        self.products
            .read()
            .iter()
            .filter(|p| {
                p.view.product_type.to_lowercase().contains(&lowered)
                    || p.view.product_id.to_lowercase().contains(&lowered)
            })
            .take(limit)
            .map(|p| p.view.clone())
            .collect()
    }

    /// Hands the product identified by `req.product_id` to `req.to_user_id`.
    /// Owner and `by` follow the receiver's profile label, else "Farmer".
    /// Returns `None` when no product carries that id.
    pub fn transfer(
        &self,
        req: &TransferRequest,
        receiver: Option<&PartyRef>,
        transaction_id: &str,
        now: DateTime<Utc>,
    ) -> Option<ProductView> {
        let mut products = self.products.write();
        let product = products
            .iter_mut()
            .find(|p| p.view.product_id == req.product_id)?;

        let price = req
            .price
            .unwrap_or_else(|| pricing::calculate_price(&product.grade, product.quantity_kg));

        let owner = owner_label(receiver).to_string();
        product.view.current_owner = owner.clone();
        product.view.status =
            transfer_status(&req.from_user_id, &req.to_user_id, &req.transaction_type).to_string();
        product.view.history.push(HistoryEntry {
            action: action_for(&req.transaction_type).to_string(),
            by: owner,
            timestamp: now,
            details: Some(
                req.notes
                    .clone()
                    .unwrap_or_else(|| format!("Transferred from {} to {}", req.from_user_id, req.to_user_id)),
            ),
            transaction_hash: Some(transaction_id.to_string()),
            location: req.location.clone(),
            quantity: Some(req.quantity.unwrap_or(product.quantity_kg)),
            price: Some(pricing::format_rupees(price)),
        });

        Some(product.view.clone())
    }

    pub fn len(&self) -> usize {
        self.products.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<ProductView> {
        self.products.read().iter().map(|p| p.view.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionType;

    fn request(product_type: &str, farmer: &str) -> RegisterProductRequest {
        RegisterProductRequest {
            farmer_id: farmer.to_string(),
            farmer_name: Some("ravi@example.com".to_string()),
            product_id: None,
            product_type: product_type.to_string(),
            quantity: 10.0,
            quality: QualityGrade::A,
            harvest_date: None,
            farm_location: None,
            qr_code: None,
        }
    }

    fn chain_with(products: &[(&str, &str, &str)]) -> SimulatedChain {
        let chain = SimulatedChain::new();
        for (id, kind, farmer) in products {
            let qr = format!("https://qr.example/?data={}", id);
            chain.record(SimulatedProduct::registration(
                &request(kind, farmer),
                id.to_string(),
                Some(qr),
                "Odisha Farm".to_string(),
                Utc::now(),
            ));
        }
        chain
    }

    #[test]
    fn test_registration_view() {
        let chain = chain_with(&[("prod_1", "Basmati Rice", "f1")]);
        let view = chain.find("prod_1").unwrap();
        assert_eq!(view.status, "Registered");
        assert_eq!(view.current_owner, "Farmer");
        assert_eq!(view.price, "₹400");
        assert_eq!(view.price_per_kg, "₹40/kg");
        assert_eq!(view.history.len(), 1);
        assert_eq!(view.history[0].by, "ravi@example.com");
    }

    #[test]
    fn test_find_strategies() {
        let chain = chain_with(&[("prod_1", "Basmati Rice", "f1"), ("prod_2", "Red Onion", "f2")]);

        assert_eq!(chain.find("prod_2").unwrap().product_type, "Red Onion");
        assert_eq!(chain.find("data=prod_1").unwrap().product_id, "prod_1");
        assert_eq!(chain.find("ONION").unwrap().product_id, "prod_2");
        assert!(chain.find("wheat").is_none());
    }

    #[test]
    fn test_by_farmer_and_search() {
        let chain = chain_with(&[
            ("prod_1", "Basmati Rice", "f1"),
            ("prod_2", "Brown Rice", "f1"),
            ("prod_3", "Red Onion", "f2"),
        ]);

        assert_eq!(chain.by_farmer("f1").len(), 2);
        assert!(chain.by_farmer("nobody").is_empty());
        assert_eq!(chain.search("rice", 10).len(), 2);
        assert_eq!(chain.search("rice", 1).len(), 1);
        assert_eq!(chain.search("PROD_3", 10)[0].product_type, "Red Onion");
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn test_transfer_updates_owner_and_history() {
        let chain = chain_with(&[("prod_1", "Basmati Rice", "f1")]);
        let req = TransferRequest {
            product_id: "prod_1".into(),
            from_user_id: "f1".into(),
            to_user_id: "dist-9".into(),
            transaction_type: TransactionType::FarmToDistributor,
            price: None,
            quantity: None,
            location: Some("Bhubaneswar".into()),
            notes: None,
        };

        let view = chain.transfer(&req, None, "tx_1", Utc::now()).unwrap();
        assert_eq!(view.current_owner, "Farmer");
        assert_eq!(view.status, "With Distributor");
        assert_eq!(view.history.len(), 2);
        assert_eq!(view.history[1].price.as_deref(), Some("₹400"));
        assert_eq!(view.history[1].transaction_hash.as_deref(), Some("tx_1"));
        assert_eq!(chain.find("prod_1").unwrap().status, "With Distributor");
    }

    #[test]
    fn test_transfer_uses_receiver_label_and_registration_status() {
        let chain = chain_with(&[("prod_1", "Basmati Rice", "f1")]);
        let shop = PartyRef {
            email: Some("shop@example.com".into()),
            business_name: Some("Fresh Mart".into()),
        };
        let req = TransferRequest {
            product_id: "prod_1".into(),
            from_user_id: "dist-9".into(),
            to_user_id: "shop-7".into(),
            transaction_type: TransactionType::DistributorToRetailer,
            price: None,
            quantity: None,
            location: None,
            notes: None,
        };
        let view = chain.transfer(&req, Some(&shop), "tx_2", Utc::now()).unwrap();
        assert_eq!(view.current_owner, "Fresh Mart");
        assert_eq!(view.history[1].by, "Fresh Mart");
        assert_eq!(view.status, "With Retailer");

        let self_transfer = TransferRequest {
            from_user_id: "shop-7".into(),
            ..req
        };
        let view = chain.transfer(&self_transfer, Some(&shop), "tx_3", Utc::now()).unwrap();
        assert_eq!(view.status, "Registered");
    }

    #[test]
    fn test_transfer_unknown_product() {
        let chain = SimulatedChain::new();
        let req = TransferRequest {
            product_id: "missing".into(),
            from_user_id: "a".into(),
            to_user_id: "b".into(),
            transaction_type: TransactionType::RetailerToConsumer,
            price: Some(10.0),
            quantity: None,
            location: None,
            notes: None,
        };
        assert!(chain.transfer(&req, None, "tx_1", Utc::now()).is_none());
        assert!(chain.is_empty());
    }
}
