//! Request validation for traceability operations

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::{RegisterProductRequest, TransactionType, TransferRequest};

/// Validation error details
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub value: Option<Value>,
}

impl ValidationError {
    pub fn new(field: &str, message: &str, value: Option<Value>) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
            value,
        }
    }
}

/// Trims `value`, rejecting it when nothing is left
pub fn validate_required<'a>(field: &str, value: &'a str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(
            field,
            "must not be empty",
            Some(Value::String(value.to_string())),
        ));
    }
    Ok(trimmed)
}

/// Quantity in kg (must be finite and non-negative)
pub fn validate_quantity(field: &str, quantity: f64) -> Result<(), ValidationError> {
    if !quantity.is_finite() {
        return Err(ValidationError::new(field, "must be a finite number", None));
    }

    if quantity < 0.0 {
        return Err(ValidationError::new(
            field,
            "must not be negative",
            serde_json::Number::from_f64(quantity).map(Value::Number),
        ));
    }

    Ok(())
}

/// Only the three custody hand-overs may be recorded
pub fn validate_transaction_type(kind: &TransactionType) -> Result<(), ValidationError> {
    if !kind.is_known() {
        return Err(ValidationError::new(
            "transactionType",
            "must be one of farm_to_distributor, distributor_to_retailer, retailer_to_consumer",
            Some(Value::String(kind.to_string())),
        ));
    }
    Ok(())
}

pub fn validate_registration(req: &RegisterProductRequest) -> Result<(), ValidationError> {
    validate_required("farmerId", &req.farmer_id)?;
    validate_required("productType", &req.product_type)?;
    validate_quantity("quantity", req.quantity)?;
    if let Some(product_id) = &req.product_id {
        validate_required("productId", product_id)?;
    }
    Ok(())
}

pub fn validate_transfer(req: &TransferRequest) -> Result<(), ValidationError> {
    validate_required("productId", &req.product_id)?;
    validate_required("fromUserId", &req.from_user_id)?;
    validate_required("toUserId", &req.to_user_id)?;
    validate_transaction_type(&req.transaction_type)?;
    if let Some(price) = req.price {
        validate_quantity("price", price)?;
    }
    if let Some(quantity) = req.quantity {
        validate_quantity("quantity", quantity)?;
    }
    Ok(())
}
