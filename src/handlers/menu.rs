use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::common::{created_response, flexible_i32, json_body, query_params, validate_input};
use crate::{
    errors::ServiceError,
    proto::menu::{
        AddMenuItemRequest, DeleteMenuItemRequest, GetMenuItemsRequest, MenuItem,
        UpdateMenuItemRequest,
    },
    AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MenuItemView {
    pub item_id: i32,
    pub name: String,
    pub category: String,
    pub price: f64,
}

impl From<MenuItem> for MenuItemView {
    fn from(item: MenuItem) -> Self {
        Self {
            item_id: item.item_id,
            name: item.name,
            category: item.category,
            price: item.price,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MenuListResponse {
    pub items: Vec<MenuItemView>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MenuSearchQuery {
    /// Case-insensitive substring of the item name
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct MenuItemRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub category: String,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: f64,
}

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateMenuItemBody {
    #[serde(alias = "item_id", deserialize_with = "flexible_i32")]
    #[validate(range(min = 1))]
    pub id: i32,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub category: String,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: f64,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct DeleteMenuItemBody {
    #[serde(alias = "item_id", deserialize_with = "flexible_i32")]
    pub id: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteMenuItemResponse {
    pub success: bool,
    pub message: String,
}

/// Menu items, optionally filtered by name
#[utoipa::path(
    get,
    path = "/menu/items",
    summary = "Search menu",
    params(MenuSearchQuery),
    responses(
        (status = 200, description = "Matching menu items", body = MenuListResponse),
        (status = 503, description = "Menu service unreachable", body = crate::errors::ErrorResponse),
    ),
    tag = "Menu"
)]
pub async fn get_menu_items(
    State(state): State<AppState>,
    query: Result<Query<MenuSearchQuery>, QueryRejection>,
) -> Result<Json<MenuListResponse>, ServiceError> {
    let query = query_params(query)?;

    let mut client = state.clients.menu.clone();
    let items = client
        .get_menu_items(GetMenuItemsRequest {
            search: query.search.unwrap_or_default(),
        })
        .await
        .map_err(ServiceError::from)?
        .into_inner()
        .items
        .into_iter()
        .map(MenuItemView::from)
        .collect();

    Ok(Json(MenuListResponse { items }))
}

#[utoipa::path(
    post,
    path = "/api/menu/add",
    summary = "Add menu item",
    request_body = MenuItemRequest,
    responses(
        (status = 201, description = "Item created", body = MenuItemView),
        (status = 400, description = "Invalid item", body = crate::errors::ErrorResponse),
    ),
    tag = "Menu"
)]
pub async fn add_menu_item(
    State(state): State<AppState>,
    payload: Result<Json<MenuItemRequest>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let request = json_body(payload)?;
    validate_input(&request)?;

    let mut client = state.clients.menu.clone();
    let item = client
        .add_menu_item(AddMenuItemRequest {
            name: request.name,
            category: request.category,
            price: request.price,
        })
        .await
        .map_err(ServiceError::from)?
        .into_inner();

    Ok(created_response(MenuItemView::from(item)))
}

#[utoipa::path(
    put,
    path = "/api/menu/update",
    summary = "Update menu item",
    request_body = UpdateMenuItemBody,
    responses(
        (status = 200, description = "Item updated", body = MenuItemView),
        (status = 400, description = "Invalid item", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown item", body = crate::errors::ErrorResponse),
    ),
    tag = "Menu"
)]
pub async fn update_menu_item(
    State(state): State<AppState>,
    payload: Result<Json<UpdateMenuItemBody>, JsonRejection>,
) -> Result<Json<MenuItemView>, ServiceError> {
    let request = json_body(payload)?;
    validate_input(&request)?;

    let mut client = state.clients.menu.clone();
    let item = client
        .update_menu_item(UpdateMenuItemRequest {
            item_id: request.id,
            name: request.name,
            category: request.category,
            price: request.price,
        })
        .await
        .map_err(ServiceError::from)?
        .into_inner();

    Ok(Json(MenuItemView::from(item)))
}

/// Deletes a menu item. Unknown ids answer 404.
#[utoipa::path(
    delete,
    path = "/api/menu/delete",
    summary = "Delete menu item",
    request_body = DeleteMenuItemBody,
    responses(
        (status = 200, description = "Item deleted", body = DeleteMenuItemResponse),
        (status = 404, description = "Unknown item", body = crate::errors::ErrorResponse),
    ),
    tag = "Menu"
)]
pub async fn delete_menu_item(
    State(state): State<AppState>,
    payload: Result<Json<DeleteMenuItemBody>, JsonRejection>,
) -> Result<Json<DeleteMenuItemResponse>, ServiceError> {
    let request = json_body(payload)?;

    let mut client = state.clients.menu.clone();
    let reply = client
        .delete_menu_item(DeleteMenuItemRequest {
            item_id: request.id,
        })
        .await
        .map_err(ServiceError::from)?
        .into_inner();

    if !reply.success {
        return Err(ServiceError::NotFound(reply.message));
    }

    Ok(Json(DeleteMenuItemResponse {
        success: reply.success,
        message: reply.message,
    }))
}
