use axum::{
    extract::{rejection::JsonRejection, State},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::common::{created_response, flexible_i32, json_body, validate_input};
use crate::{
    errors::ServiceError,
    proto::inventory::{
        AddInventoryRecordRequest, GetAllInventoryRequest, InventoryItem, RestockItemRequest,
    },
    AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InventoryItemView {
    pub item_id: i32,
    pub cafe_id: i32,
    pub item_name: String,
    pub cafe_name: String,
    pub stock_quantity: i32,
    /// `YYYY-MM-DD`, absent when the item was never restocked
    pub restock_date: Option<String>,
    pub is_low_stock: bool,
}

impl From<InventoryItem> for InventoryItemView {
    fn from(item: InventoryItem) -> Self {
        Self {
            item_id: item.item_id,
            cafe_id: item.cafe_id,
            item_name: item.item_name,
            cafe_name: item.cafe_name,
            stock_quantity: item.stock_quantity,
            restock_date: Some(item.restock_date).filter(|d| !d.is_empty()),
            is_low_stock: item.is_low_stock,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InventoryListResponse {
    pub items: Vec<InventoryItemView>,
}

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct RestockRequest {
    #[serde(deserialize_with = "flexible_i32")]
    #[validate(range(min = 1))]
    pub item_id: i32,
    #[serde(deserialize_with = "flexible_i32")]
    #[validate(range(min = 1))]
    pub cafe_id: i32,
    #[serde(deserialize_with = "flexible_i32")]
    #[validate(range(min = 1, message = "Restock quantity must be positive"))]
    pub quantity_added: i32,
    /// `YYYY-MM-DD`
    #[validate(length(min = 1))]
    pub restock_date: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RestockResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct AddInventoryRequest {
    #[serde(deserialize_with = "flexible_i32")]
    #[validate(range(min = 1))]
    pub item_id: i32,
    #[serde(deserialize_with = "flexible_i32")]
    #[validate(range(min = 1))]
    pub cafe_id: i32,
    #[serde(deserialize_with = "flexible_i32")]
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,
    #[serde(default)]
    pub restock_date: Option<String>,
}

/// Stock levels for every (item, cafe) pair
#[utoipa::path(
    get,
    path = "/api/inventory/all",
    summary = "List inventory",
    responses(
        (status = 200, description = "All inventory rows ordered by cafe then item", body = InventoryListResponse),
        (status = 503, description = "Inventory service unreachable", body = crate::errors::ErrorResponse),
    ),
    tag = "Inventory"
)]
pub async fn get_all_inventory(
    State(state): State<AppState>,
) -> Result<Json<InventoryListResponse>, ServiceError> {
    let mut client = state.clients.inventory.clone();
    let items = client
        .get_all_inventory(GetAllInventoryRequest {})
        .await
        .map_err(ServiceError::from)?
        .into_inner()
        .items
        .into_iter()
        .map(InventoryItemView::from)
        .collect();

    Ok(Json(InventoryListResponse { items }))
}

#[utoipa::path(
    post,
    path = "/api/inventory/restock",
    summary = "Restock an item",
    description = "Adds stock to an existing (item, cafe) record and stamps the restock date. No record is created when the pair is unknown.",
    request_body = RestockRequest,
    responses(
        (status = 200, description = "Stock added", body = RestockResponse),
        (status = 400, description = "Invalid quantity or date", body = crate::errors::ErrorResponse),
        (status = 404, description = "No inventory record for the pair", body = crate::errors::ErrorResponse),
    ),
    tag = "Inventory"
)]
pub async fn restock_item(
    State(state): State<AppState>,
    payload: Result<Json<RestockRequest>, JsonRejection>,
) -> Result<Json<RestockResponse>, ServiceError> {
    let request = json_body(payload)?;
    validate_input(&request)?;

    let mut client = state.clients.inventory.clone();
    let reply = client
        .restock_item(RestockItemRequest {
            item_id: request.item_id,
            cafe_id: request.cafe_id,
            quantity_added: request.quantity_added,
            restock_date: request.restock_date,
        })
        .await
        .map_err(ServiceError::from)?
        .into_inner();

    if !reply.success {
        return Err(ServiceError::NotFound(reply.message));
    }

    Ok(Json(RestockResponse {
        success: reply.success,
        message: reply.message,
    }))
}

#[utoipa::path(
    post,
    path = "/api/inventory",
    summary = "Create an inventory record",
    request_body = AddInventoryRequest,
    responses(
        (status = 201, description = "Record created", body = InventoryItemView),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown item or cafe", body = crate::errors::ErrorResponse),
        (status = 409, description = "The pair already has a record", body = crate::errors::ErrorResponse),
    ),
    tag = "Inventory"
)]
pub async fn add_inventory_record(
    State(state): State<AppState>,
    payload: Result<Json<AddInventoryRequest>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let request = json_body(payload)?;
    validate_input(&request)?;

    let mut client = state.clients.inventory.clone();
    let record = client
        .add_inventory_record(AddInventoryRecordRequest {
            item_id: request.item_id,
            cafe_id: request.cafe_id,
            stock: request.stock,
            restock_date: request.restock_date.unwrap_or_default(),
        })
        .await
        .map_err(ServiceError::from)?
        .into_inner();

    Ok(created_response(InventoryItemView::from(record)))
}
