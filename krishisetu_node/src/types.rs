//! Traceability data model.
//!
//! Store rows (`Profile`, `ProductRecord`, `TransactionRecord`) serialise in
//! the snake_case shape of the relational schema. Views handed to the
//! dashboards (`ProductView`, `HistoryEntry`, ...) serialise in camelCase.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Participant role in the supply chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Farmer,
    Distributor,
    Retailer,
    Manufacturer,
    Consumer,
    Admin,
}

/// A row of the `profiles` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// User id (shared with the auth provider)
    pub id: String,
    /// Supply chain role
    pub role: Role,
    /// Contact email
    pub email: String,
    /// Display name of the business
    pub business_name: Option<String>,
    /// Whether the profile has been verified
    #[serde(default)]
    pub verified: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Default farmer profile: the business is named after the local part
    /// of the email address.
    pub fn farmer(id: &str, email: &str, created_at: DateTime<Utc>) -> Self {
        let local = email.split('@').next().unwrap_or(email);
        Self {
            id: id.to_string(),
            role: Role::Farmer,
            email: email.to_string(),
            business_name: Some(format!("{} Farms", local)),
            verified: true,
            created_at,
        }
    }
}

/// Quality grade of a harvested batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QualityGrade {
    #[default]
    A,
    B,
    C,
    Other(String),
}

impl QualityGrade {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "A" | "a" => QualityGrade::A,
            "B" | "b" => QualityGrade::B,
            "C" | "c" => QualityGrade::C,
            other => QualityGrade::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            QualityGrade::A => "A",
            QualityGrade::B => "B",
            QualityGrade::C => "C",
            QualityGrade::Other(raw) => raw,
        }
    }
}

impl fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for QualityGrade {
    fn from(raw: String) -> Self {
        QualityGrade::parse(&raw)
    }
}

impl From<QualityGrade> for String {
    fn from(grade: QualityGrade) -> Self {
        grade.as_str().to_string()
    }
}

/// Quality metrics embedded as a JSON object in each product row.
///
/// The farm location and the caller's custom product id ride along here so
/// that products can be found by the id printed on their QR label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<QualityGrade>,
    #[serde(
        default,
        deserialize_with = "de::optional_quantity",
        skip_serializing_if = "Option::is_none"
    )]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farm_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_product_id: Option<String>,
}

impl QualityMetrics {
    /// Grade, defaulting to A when the row carries none
    pub fn grade_or_default(&self) -> QualityGrade {
        self.grade.clone().unwrap_or_default()
    }

    /// Quantity in kg, defaulting to zero
    pub fn quantity_or_zero(&self) -> f64 {
        self.quantity.unwrap_or(0.0)
    }
}

/// A row of the `products` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: String,
    pub farmer_id: String,
    pub product_name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub harvest_date: Option<NaiveDate>,
    #[serde(default)]
    pub quality_metrics: QualityMetrics,
    #[serde(default)]
    pub organic_certifications: serde_json::Value,
    #[serde(default)]
    pub qr_code_hash: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub batch_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for `products`; the store assigns `id` and `created_at`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProduct {
    pub farmer_id: String,
    pub product_name: String,
    pub category: String,
    pub harvest_date: NaiveDate,
    pub quality_metrics: QualityMetrics,
    pub organic_certifications: serde_json::Value,
    pub qr_code_hash: Option<String>,
    pub description: String,
    pub batch_number: String,
}

impl NewProduct {
    pub fn into_record(self, id: String, created_at: DateTime<Utc>) -> ProductRecord {
        ProductRecord {
            id,
            farmer_id: self.farmer_id,
            product_name: self.product_name,
            category: self.category,
            harvest_date: Some(self.harvest_date),
            quality_metrics: self.quality_metrics,
            organic_certifications: self.organic_certifications,
            qr_code_hash: self.qr_code_hash,
            description: Some(self.description),
            batch_number: Some(self.batch_number),
            created_at,
        }
    }
}

/// Kind of custody transfer recorded against a product
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionType {
    FarmToDistributor,
    DistributorToRetailer,
    RetailerToConsumer,
    Other(String),
}

impl TransactionType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "farm_to_distributor" => TransactionType::FarmToDistributor,
            "distributor_to_retailer" => TransactionType::DistributorToRetailer,
            "retailer_to_consumer" => TransactionType::RetailerToConsumer,
            other => TransactionType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TransactionType::FarmToDistributor => "farm_to_distributor",
            TransactionType::DistributorToRetailer => "distributor_to_retailer",
            TransactionType::RetailerToConsumer => "retailer_to_consumer",
            TransactionType::Other(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, TransactionType::Other(_))
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for TransactionType {
    fn from(raw: String) -> Self {
        TransactionType::parse(&raw)
    }
}

impl From<TransactionType> for String {
    fn from(kind: TransactionType) -> Self {
        kind.as_str().to_string()
    }
}

/// A row of the `transactions` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub product_id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub quantity: f64,
    pub transaction_hash: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub quality_check_passed: bool,
    pub transaction_time: DateTime<Utc>,
}

impl TransactionRecord {
    /// The initial transaction written at registration moves the product
    /// from the farmer to the farmer.
    pub fn is_registration(&self) -> bool {
        self.from_user_id == self.to_user_id
    }
}

/// Insert payload for `transactions`; the store assigns `id` and
/// `transaction_time`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTransaction {
    pub product_id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub transaction_type: TransactionType,
    pub price: f64,
    pub quantity: f64,
    pub transaction_hash: String,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub quality_check_passed: bool,
}

impl NewTransaction {
    pub fn into_record(self, id: String, transaction_time: DateTime<Utc>) -> TransactionRecord {
        TransactionRecord {
            id,
            product_id: self.product_id,
            from_user_id: self.from_user_id,
            to_user_id: self.to_user_id,
            transaction_type: self.transaction_type,
            price: self.price,
            quantity: self.quantity,
            transaction_hash: self.transaction_hash,
            location: self.location,
            notes: self.notes,
            quality_check_passed: self.quality_check_passed,
            transaction_time,
        }
    }
}

/// Profile summary joined onto a transaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartyRef {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
}

impl PartyRef {
    /// Business name, else email; blanks count as missing
    pub fn label(&self) -> Option<&str> {
        [self.business_name.as_deref(), self.email.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
    }
}

impl From<&Profile> for PartyRef {
    fn from(profile: &Profile) -> Self {
        Self {
            email: Some(profile.email.clone()),
            business_name: profile.business_name.clone(),
        }
    }
}

/// A transaction together with the profiles on both ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(flatten)]
    pub transaction: TransactionRecord,
    #[serde(default)]
    pub from_user: Option<PartyRef>,
    #[serde(default)]
    pub to_user: Option<PartyRef>,
}

/// A product with its joined transaction log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracedProduct {
    #[serde(flatten)]
    pub product: ProductRecord,
    #[serde(default)]
    pub transactions: Vec<LedgerEntry>,
}

/// One step of a product's journey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub action: String,
    pub by: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
}

/// Product as shown on the tracking page and the dashboards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub product_id: String,
    pub product_type: String,
    /// Quantity label, e.g. `"12 kg"`
    pub quantity: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub current_owner: String,
    /// Total price label, e.g. `"₹480"`
    pub price: String,
    /// Unit price label, e.g. `"₹40/kg"`
    pub price_per_kg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farmer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farmer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    pub farm_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harvest_date: Option<NaiveDate>,
    pub quality: String,
    pub history: Vec<HistoryEntry>,
}

/// Dashboard counters for one farmer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerStats {
    pub total_products: usize,
    pub total_revenue: f64,
    /// Products whose harvest date is still in the future
    pub active_crops: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationReceipt {
    pub product_id: String,
    pub transaction_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub product_id: String,
    pub transaction_id: String,
    pub status: String,
    pub current_owner: String,
    pub timestamp: DateTime<Utc>,
}

/// Registration form submitted by a farmer
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterProductRequest {
    pub farmer_id: String,
    /// Farmer's login email; used to seed the profile
    #[serde(default)]
    pub farmer_name: Option<String>,
    /// Caller-generated tracking id printed on the QR label
    #[serde(default)]
    pub product_id: Option<String>,
    pub product_type: String,
    #[serde(deserialize_with = "de::quantity")]
    pub quantity: f64,
    #[serde(default)]
    pub quality: QualityGrade,
    #[serde(default, deserialize_with = "de::optional_date")]
    pub harvest_date: Option<NaiveDate>,
    #[serde(default)]
    pub farm_location: Option<String>,
    #[serde(default)]
    pub qr_code: Option<String>,
}

fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

fn trim_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl RegisterProductRequest {
    /// Trims identifiers and free text; blank optional fields become `None`
    pub fn trimmed(mut self) -> Self {
        trim_in_place(&mut self.farmer_id);
        trim_in_place(&mut self.product_type);
        self.farmer_name = trim_optional(self.farmer_name);
        self.product_id = self.product_id.map(|id| id.trim().to_string());
        self.farm_location = trim_optional(self.farm_location);
        self.qr_code = trim_optional(self.qr_code);
        self
    }
}

/// Custody hand-over of a product further down the chain
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub product_id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub transaction_type: TransactionType,
    #[serde(default, deserialize_with = "de::optional_quantity")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "de::optional_quantity")]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TransferRequest {
    pub fn trimmed(mut self) -> Self {
        trim_in_place(&mut self.product_id);
        trim_in_place(&mut self.from_user_id);
        trim_in_place(&mut self.to_user_id);
        self.location = trim_optional(self.location);
        self.notes = trim_optional(self.notes);
        self
    }
}

/// Lenient decoders for values typed into dashboard forms
mod de {
    use chrono::NaiveDate;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Value(f64),
        Text(String),
    }

    impl Number {
        fn into_f64<E: Error>(self) -> Result<Option<f64>, E> {
            match self {
                Number::Value(n) => Ok(Some(n)),
                Number::Text(s) if s.trim().is_empty() => Ok(None),
                Number::Text(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| E::custom(format!("`{}` is not a number", s))),
            }
        }
    }

    pub fn quantity<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Number::deserialize(deserializer)?
            .into_f64()?
            .ok_or_else(|| D::Error::custom("quantity is required"))
    }

    pub fn optional_quantity<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Number>::deserialize(deserializer)? {
            Some(raw) => raw.into_f64(),
            None => Ok(None),
        }
    }

    pub fn optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(Some)
                .map_err(D::Error::custom),
        }
    }
}
