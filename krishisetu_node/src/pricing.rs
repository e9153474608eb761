//! Price derivation from quality grade and quantity

use chrono::NaiveDate;

use crate::types::{FarmerStats, ProductRecord, QualityGrade};

/// Currency prefix used on every price label
pub const RUPEE: &str = "₹";

/// Base price in rupees per kg for a grade
pub fn base_price(grade: &QualityGrade) -> u32 {
    match grade {
        QualityGrade::A => 40,
        QualityGrade::B => 30,
        QualityGrade::C => 20,
        QualityGrade::Other(_) => 25,
    }
}

/// Total price of a batch: base price × quantity (kg)
pub fn calculate_price(grade: &QualityGrade, quantity: f64) -> f64 {
    f64::from(base_price(grade)) * quantity
}

/// `"₹480"`; integral amounts print without a fraction
pub fn format_rupees(amount: f64) -> String {
    format!("{}{}", RUPEE, amount)
}

/// `"₹40/kg"`
pub fn format_per_kg(grade: &QualityGrade) -> String {
    format!("{}{}/kg", RUPEE, base_price(grade))
}

/// `"12 kg"`
pub fn format_quantity(quantity: f64) -> String {
    format!("{} kg", quantity)
}

/// Pricing inputs of one product, as needed for dashboard counters
#[derive(Debug, Clone, PartialEq)]
pub struct PricedBatch {
    pub grade: QualityGrade,
    pub quantity: f64,
    pub harvest_date: Option<NaiveDate>,
}

impl From<&ProductRecord> for PricedBatch {
    fn from(product: &ProductRecord) -> Self {
        let metrics = &product.quality_metrics;
        Self {
            grade: metrics.grade_or_default(),
            quantity: metrics.quantity_or_zero(),
            harvest_date: product.harvest_date,
        }
    }
}

/// Revenue is the sum of each batch's derived price. A crop counts as
/// active while its harvest date lies strictly after `today`.
pub fn farmer_stats<'a, I>(batches: I, today: NaiveDate) -> FarmerStats
where
    I: IntoIterator<Item = &'a PricedBatch>,
{
    batches
        .into_iter()
        .fold(FarmerStats::default(), |mut stats, batch| {
            stats.total_products += 1;
            stats.total_revenue += calculate_price(&batch.grade, batch.quantity);
            if batch.harvest_date.map_or(false, |date| date > today) {
                stats.active_crops += 1;
            }
            stats
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_base_prices() {
        assert_eq!(base_price(&QualityGrade::A), 40);
        assert_eq!(base_price(&QualityGrade::B), 30);
        assert_eq!(base_price(&QualityGrade::C), 20);
        assert_eq!(base_price(&QualityGrade::Other("D".into())), 25);
    }

    #[test]
    fn test_labels() {
        assert_eq!(format_rupees(calculate_price(&QualityGrade::A, 12.0)), "₹480");
        assert_eq!(format_rupees(calculate_price(&QualityGrade::B, 2.5)), "₹75");
        assert_eq!(format_rupees(calculate_price(&QualityGrade::C, 0.25)), "₹5");
        assert_eq!(format_rupees(12.5), "₹12.5");
        assert_eq!(format_per_kg(&QualityGrade::C), "₹20/kg");
        assert_eq!(format_quantity(0.0), "0 kg");
        assert_eq!(format_quantity(7.5), "7.5 kg");
    }

    #[test]
    fn test_farmer_stats() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let batches = vec![
            PricedBatch {
                grade: QualityGrade::A,
                quantity: 10.0,
                harvest_date: NaiveDate::from_ymd_opt(2025, 7, 1),
            },
            PricedBatch {
                grade: QualityGrade::C,
                quantity: 5.0,
                harvest_date: Some(today),
            },
            PricedBatch {
                grade: QualityGrade::Other("X".into()),
                quantity: 2.0,
                harvest_date: None,
            },
        ];

        let stats = farmer_stats(&batches, today);
        assert_eq!(stats.total_products, 3);
        assert_eq!(stats.total_revenue, 400.0 + 100.0 + 50.0);
        assert_eq!(stats.active_crops, 1);
    }

    #[test]
    fn test_farmer_stats_empty() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(farmer_stats(&[], today), FarmerStats::default());
    }

    proptest! {
        #[test]
        fn price_scales_linearly_with_quantity(qty in 0u32..100_000, grade in prop_oneof![
            Just(QualityGrade::A),
            Just(QualityGrade::B),
            Just(QualityGrade::C),
            "[D-Z]".prop_map(QualityGrade::Other),
        ]) {
            let single = calculate_price(&grade, 1.0);
            prop_assert_eq!(calculate_price(&grade, f64::from(qty)), single * f64::from(qty));
        }

        #[test]
        fn better_grade_never_costs_less(qty in 0u32..100_000) {
            let q = f64::from(qty);
            prop_assert!(calculate_price(&QualityGrade::A, q) >= calculate_price(&QualityGrade::B, q));
            prop_assert!(calculate_price(&QualityGrade::B, q) >= calculate_price(&QualityGrade::C, q));
        }
    }
}
