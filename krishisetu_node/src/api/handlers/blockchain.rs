use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Json,
};
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::errors::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::types::{FarmerStats, ProductView, RegisterProductRequest, TransferRequest};

/// `{ "action": ..., "data": { ... } }`
#[derive(Debug, Clone, Deserialize)]
pub struct ActionRequest {
    pub action: String,
    #[serde(default)]
    pub data: Value,
}

/// Successful action result: `success: true` plus the action's fields
#[derive(Debug, Serialize)]
pub struct ActionResponse<T> {
    pub success: bool,
    #[serde(flatten)]
    pub body: T,
}

impl<T: Serialize> ActionResponse<T> {
    pub fn ok(body: T) -> Response {
        Json(Self {
            success: true,
            body,
        })
        .into_response()
    }
}

#[derive(Debug, Serialize)]
struct HistoryBody {
    history: ProductView,
}

#[derive(Debug, Serialize)]
struct ProductsBody {
    products: Vec<ProductView>,
}

#[derive(Debug, Serialize)]
struct StatsBody {
    stats: FarmerStats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductIdData {
    product_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FarmerIdData {
    farmer_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchData {
    search_term: String,
}

fn decode<T: DeserializeOwned>(action: &str, data: Value) -> ApiResult<T> {
    serde_json::from_value(data).map_err(|e| ApiError::invalid_payload(action, &e.to_string()))
}

/// POST /api/blockchain
pub async fn dispatch_action(
    State(state): State<AppState>,
    payload: Result<Json<ActionRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(ActionRequest { action, data }) = payload?;
    info!("Traceability API called: {}", action);
    let service = &state.service;

    match action.as_str() {
        "registerProduct" => {
            let req: RegisterProductRequest = decode(&action, data)?;
            let receipt = service.register_product(req).await?;
            Ok(ActionResponse::ok(receipt))
        }
        "getProductHistory" => {
            let ProductIdData { product_id } = decode(&action, data)?;
            let history = service.get_product_history(&product_id).await?;
            Ok(ActionResponse::ok(HistoryBody { history }))
        }
        "getFarmerProducts" => {
            let FarmerIdData { farmer_id } = decode(&action, data)?;
            let products = service.get_farmer_products(&farmer_id).await?;
            Ok(ActionResponse::ok(ProductsBody { products }))
        }
        "searchProducts" => {
            let SearchData { search_term } = decode(&action, data)?;
            let products = service.search_products(&search_term).await?;
            Ok(ActionResponse::ok(ProductsBody { products }))
        }
        "getFarmerStats" => {
            let FarmerIdData { farmer_id } = decode(&action, data)?;
            let stats = service.get_farmer_stats(&farmer_id).await?;
            Ok(ActionResponse::ok(StatsBody { stats }))
        }
        "transferProduct" => {
            let req: TransferRequest = decode(&action, data)?;
            let receipt = service.transfer_product(req).await?;
            Ok(ActionResponse::ok(receipt))
        }
        other => {
            warn!("Unknown action: {}", other);
            Err(ApiError::unknown_action(other))
        }
    }
}
