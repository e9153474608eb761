//! Journey reconstruction from a product's transaction log

use crate::pricing;
use crate::types::{
    HistoryEntry, LedgerEntry, PartyRef, ProductView, TracedProduct, TransactionRecord,
    TransactionType,
};

/// Status of a product with no transfers beyond its registration
pub const STATUS_REGISTERED: &str = "Registered";

/// Owner label used when the log names nobody
pub const DEFAULT_OWNER: &str = "Farmer";

/// Human-readable label for a transaction
pub fn action_for(kind: &TransactionType) -> &'static str {
    match kind {
        TransactionType::FarmToDistributor => "Registered on Blockchain",
        TransactionType::DistributorToRetailer => "Transferred to Retailer",
        TransactionType::RetailerToConsumer => "Sold to Consumer",
        TransactionType::Other(_) => "Transaction Processed",
    }
}

/// Where the product sits after a transaction of this kind
pub fn status_after(kind: &TransactionType) -> &'static str {
    match kind {
        TransactionType::FarmToDistributor => "With Distributor",
        TransactionType::DistributorToRetailer => "With Retailer",
        TransactionType::RetailerToConsumer => "Sold to Consumer",
        TransactionType::Other(_) => STATUS_REGISTERED,
    }
}

/// Status right after a hand-over; a farmer-to-farmer registration leaves
/// the product registered
pub fn transfer_status(from_user_id: &str, to_user_id: &str, kind: &TransactionType) -> &'static str {
    if from_user_id == to_user_id {
        STATUS_REGISTERED
    } else {
        status_after(kind)
    }
}

pub fn status_of(tx: &TransactionRecord) -> &'static str {
    transfer_status(&tx.from_user_id, &tx.to_user_id, &tx.transaction_type)
}

/// Receiving party's label, falling back to the farmer
pub fn owner_label(party: Option<&PartyRef>) -> &str {
    party.and_then(|p| p.label()).unwrap_or(DEFAULT_OWNER)
}

/// Status derived from the last entry of a chronologically ordered log
pub fn status_for(entries: &[LedgerEntry]) -> &'static str {
    entries
        .last()
        .map_or(STATUS_REGISTERED, |entry| status_of(&entry.transaction))
}

/// Receiving party of the last entry, falling back to the farmer
pub fn current_owner(entries: &[LedgerEntry]) -> String {
    owner_label(entries.last().and_then(|entry| entry.to_user.as_ref())).to_string()
}

/// Orders a log by transaction time; entries sharing a timestamp keep their
/// log order.
pub fn sort_chronologically(entries: &mut [LedgerEntry]) {
    entries.sort_by_key(|entry| entry.transaction.transaction_time);
}

pub fn history_entries(entries: &[LedgerEntry]) -> Vec<HistoryEntry> {
    entries
        .iter()
        .map(|entry| {
            let tx = &entry.transaction;
            HistoryEntry {
                action: action_for(&tx.transaction_type).to_string(),
                by: owner_label(entry.to_user.as_ref()).to_string(),
                timestamp: tx.transaction_time,
                details: tx.notes.clone(),
                transaction_hash: Some(tx.transaction_hash.clone()),
                location: tx.location.clone(),
                quantity: Some(tx.quantity),
                price: Some(pricing::format_rupees(tx.price)),
            }
        })
        .collect()
}

impl ProductView {
    /// Builds the tracking view of a stored product. Price comes from the
    /// product's grade and quantity; status and owner from its log.
    pub fn from_traced(traced: TracedProduct, default_location: &str) -> Self {
        let TracedProduct {
            product,
            mut transactions,
        } = traced;
        sort_chronologically(&mut transactions);

        let metrics = &product.quality_metrics;
        let grade = metrics.grade_or_default();
        let quantity = metrics.quantity_or_zero();

        ProductView {
            product_id: product.id.clone(),
            product_type: product.product_name.clone(),
            quantity: pricing::format_quantity(quantity),
            status: status_for(&transactions).to_string(),
            timestamp: product.created_at,
            current_owner: current_owner(&transactions),
            price: pricing::format_rupees(pricing::calculate_price(&grade, quantity)),
            price_per_kg: pricing::format_per_kg(&grade),
            farmer_id: Some(product.farmer_id.clone()),
            farmer_name: None,
            qr_code: product.qr_code_hash.clone(),
            farm_location: metrics
                .farm_location
                .clone()
                .unwrap_or_else(|| default_location.to_string()),
            harvest_date: product.harvest_date,
            quality: grade.to_string(),
            history: history_entries(&transactions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PartyRef, ProductRecord, QualityGrade, QualityMetrics};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn entry(
        kind: TransactionType,
        from: &str,
        to: &str,
        at: DateTime<Utc>,
        to_user: Option<PartyRef>,
    ) -> LedgerEntry {
        LedgerEntry {
            transaction: TransactionRecord {
                id: format!("{}-{}", from, to),
                product_id: "p1".into(),
                from_user_id: from.into(),
                to_user_id: to.into(),
                transaction_type: kind,
                price: 480.0,
                quantity: 12.0,
                transaction_hash: format!("tx_{}_abc", at.timestamp_millis()),
                location: Some("Cuttack".into()),
                notes: Some("note".into()),
                quality_check_passed: true,
                transaction_time: at,
            },
            from_user: None,
            to_user,
        }
    }

    fn party(name: &str) -> Option<PartyRef> {
        Some(PartyRef {
            email: Some(format!("{}@example.com", name)),
            business_name: Some(name.to_string()),
        })
    }

    fn product() -> ProductRecord {
        ProductRecord {
            id: "p1".into(),
            farmer_id: "farmer".into(),
            product_name: "Turmeric".into(),
            category: "agricultural".into(),
            harvest_date: None,
            quality_metrics: QualityMetrics {
                grade: Some(QualityGrade::B),
                quantity: Some(12.0),
                farm_location: None,
                custom_product_id: Some("prod_1".into()),
            },
            organic_certifications: serde_json::json!({}),
            qr_code_hash: None,
            description: None,
            batch_number: None,
            created_at: t0(),
        }
    }

    #[test]
    fn test_empty_log() {
        assert_eq!(status_for(&[]), STATUS_REGISTERED);
        assert_eq!(current_owner(&[]), DEFAULT_OWNER);
        assert!(history_entries(&[]).is_empty());
    }

    #[test]
    fn test_registration_only_is_registered() {
        let log = vec![entry(
            TransactionType::FarmToDistributor,
            "farmer",
            "farmer",
            t0(),
            party("ravi Farms"),
        )];
        assert_eq!(status_for(&log), STATUS_REGISTERED);
        assert_eq!(current_owner(&log), "ravi Farms");
        assert_eq!(history_entries(&log)[0].action, "Registered on Blockchain");
    }

    #[test]
    fn test_status_follows_last_transfer() {
        let log = vec![
            entry(TransactionType::FarmToDistributor, "farmer", "farmer", t0(), None),
            entry(
                TransactionType::FarmToDistributor,
                "farmer",
                "dist",
                t0() + Duration::hours(1),
                party("Odisha Logistics"),
            ),
            entry(
                TransactionType::DistributorToRetailer,
                "dist",
                "shop",
                t0() + Duration::hours(2),
                party("Fresh Mart"),
            ),
        ];
        assert_eq!(status_for(&log), "With Retailer");
        assert_eq!(current_owner(&log), "Fresh Mart");
    }

    #[test]
    fn test_equal_timestamps_keep_log_order() {
        let mut log = vec![
            entry(TransactionType::FarmToDistributor, "farmer", "farmer", t0() + Duration::hours(1), party("first")),
            entry(TransactionType::FarmToDistributor, "farmer", "dist", t0(), party("second")),
            entry(TransactionType::DistributorToRetailer, "dist", "shop", t0(), party("third")),
        ];
        sort_chronologically(&mut log);

        let owners: Vec<String> = log.iter().map(|e| current_owner(std::slice::from_ref(e))).collect();
        assert_eq!(owners, vec!["second", "third", "first"]);
    }

    #[test]
    fn test_transfer_status_and_owner_label() {
        let kind = TransactionType::DistributorToRetailer;
        assert_eq!(transfer_status("dist", "dist", &kind), STATUS_REGISTERED);
        assert_eq!(transfer_status("dist", "shop", &kind), "With Retailer");
        assert_eq!(owner_label(None), DEFAULT_OWNER);
        assert_eq!(owner_label(party("Fresh Mart").as_ref()), "Fresh Mart");
    }

    #[test]
    fn test_unknown_type_labels() {
        let kind = TransactionType::Other("audit".into());
        assert_eq!(action_for(&kind), "Transaction Processed");
        assert_eq!(status_after(&kind), STATUS_REGISTERED);
    }

    #[test]
    fn test_owner_falls_back_to_email_then_farmer() {
        let email_only = Some(PartyRef {
            email: Some("shop@example.com".into()),
            business_name: None,
        });
        let log = vec![entry(TransactionType::RetailerToConsumer, "shop", "c", t0(), email_only)];
        assert_eq!(current_owner(&log), "shop@example.com");
        assert_eq!(status_for(&log), "Sold to Consumer");

        let anonymous = vec![entry(TransactionType::RetailerToConsumer, "shop", "c", t0(), None)];
        assert_eq!(current_owner(&anonymous), DEFAULT_OWNER);
        assert_eq!(history_entries(&anonymous)[0].by, DEFAULT_OWNER);
    }

    #[test]
    fn test_view_orders_history_and_derives_price() {
        let traced = TracedProduct {
            product: product(),
            transactions: vec![
                entry(
                    TransactionType::DistributorToRetailer,
                    "dist",
                    "shop",
                    t0() + Duration::hours(3),
                    party("Fresh Mart"),
                ),
                entry(TransactionType::FarmToDistributor, "farmer", "farmer", t0(), party("ravi Farms")),
            ],
        };

        let view = ProductView::from_traced(traced, "Odisha Farm");
        assert_eq!(view.product_id, "p1");
        assert_eq!(view.quantity, "12 kg");
        assert_eq!(view.price, "₹360");
        assert_eq!(view.price_per_kg, "₹30/kg");
        assert_eq!(view.quality, "B");
        assert_eq!(view.farm_location, "Odisha Farm");
        assert_eq!(view.status, "With Retailer");
        assert_eq!(view.current_owner, "Fresh Mart");
        assert_eq!(view.history.len(), 2);
        assert_eq!(view.history[0].by, "ravi Farms");
        assert_eq!(view.history[1].action, "Transferred to Retailer");
        assert_eq!(view.history[1].price.as_deref(), Some("₹480"));
    }

    #[test]
    fn test_view_defaults_missing_metrics() {
        let mut bare = product();
        bare.quality_metrics = QualityMetrics::default();
        let view = ProductView::from_traced(
            TracedProduct {
                product: bare,
                transactions: Vec::new(),
            },
            "Odisha Farm",
        );
        assert_eq!(view.quality, "A");
        assert_eq!(view.quantity, "0 kg");
        assert_eq!(view.price, "₹0");
        assert_eq!(view.current_owner, DEFAULT_OWNER);
    }
}
