use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use super::common::{created_response, flexible_i32, json_body, validate_input};
use crate::{
    errors::ServiceError,
    proto::order::{CreateOrderRequest as CreateOrderRpc, GetOrdersRequest, OrderItem},
    AppState,
};

/// One line of an order as sent by the point of sale
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct OrderLineRequest {
    #[serde(deserialize_with = "flexible_i32")]
    #[validate(range(min = 1))]
    pub item_id: i32,
    #[serde(deserialize_with = "flexible_i32")]
    #[validate(range(min = 1))]
    pub quantity: i32,
    /// Unit price charged, captured on the order line
    #[validate(range(min = 0.0, max = 99999999.99))]
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[serde(deserialize_with = "flexible_i32")]
    #[validate(range(min = 1))]
    pub cafe_id: i32,
    #[validate(length(min = 1, message = "An order needs at least one item"))]
    pub items: Vec<OrderLineRequest>,
}

impl CreateOrderRequest {
    fn check(&self) -> Result<(), ServiceError> {
        validate_input(self)?;
        self.items.iter().try_for_each(validate_input)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderResponse {
    pub success: bool,
    pub message: String,
    pub order_id: i32,
    pub total_price: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderLineView {
    pub item_id: i32,
    pub quantity: i32,
    pub price: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderView {
    pub order_id: i32,
    pub cafe_id: i32,
    pub total_price: f64,
    /// RFC 3339 creation time
    pub created_at: String,
    pub items: Vec<OrderLineView>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderView>,
}

/// Place an order
///
/// Stock is decremented line by line; the first line that cannot be served
/// aborts the whole order with a 409 naming the item.
#[utoipa::path(
    post,
    path = "/orders/create",
    summary = "Create order",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = CreateOrderResponse,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid order payload", body = crate::errors::ErrorResponse),
        (status = 409, description = "Insufficient stock for one of the items", body = crate::errors::ErrorResponse),
        (status = 503, description = "Order or inventory service unreachable", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let request = json_body(payload)?;
    request.check()?;

    let mut client = state.clients.order.clone();
    let reply = client
        .create_order(CreateOrderRpc {
            cafe_id: request.cafe_id,
            items: request
                .items
                .iter()
                .map(|line| OrderItem {
                    item_id: line.item_id,
                    quantity: line.quantity,
                    price: line.price,
                })
                .collect(),
        })
        .await
        .map_err(ServiceError::from)?
        .into_inner();

    info!(
        order_id = reply.order_id,
        cafe_id = request.cafe_id,
        "Order placed through gateway"
    );

    Ok(created_response(CreateOrderResponse {
        success: reply.success,
        message: reply.message,
        order_id: reply.order_id,
        total_price: reply.total_price,
    }))
}

/// List every order of a cafe, newest first, with its lines
#[utoipa::path(
    get,
    path = "/orders/{cafe_id}",
    summary = "List orders for a cafe",
    params(("cafe_id" = i32, Path, description = "Cafe identifier")),
    responses(
        (status = 200, description = "Orders of the cafe (possibly empty)", body = OrderListResponse),
        (status = 400, description = "Malformed cafe id", body = crate::errors::ErrorResponse),
        (status = 503, description = "Order service unreachable", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn get_orders_by_cafe(
    State(state): State<AppState>,
    Path(cafe_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let cafe_id = cafe_id
        .trim()
        .parse::<i32>()
        .map_err(|_| ServiceError::ValidationError(format!("Invalid cafe id '{}'", cafe_id)))?;

    let mut client = state.clients.order.clone();
    let orders = client
        .get_orders_by_cafe(GetOrdersRequest { cafe_id })
        .await
        .map_err(ServiceError::from)?
        .into_inner()
        .orders
        .into_iter()
        .map(|order| OrderView {
            order_id: order.order_id,
            cafe_id: order.cafe_id,
            total_price: order.total_price,
            created_at: order.created_at,
            items: order
                .items
                .into_iter()
                .map(|line| OrderLineView {
                    item_id: line.item_id,
                    quantity: line.quantity,
                    price: line.price,
                })
                .collect(),
        })
        .collect();

    Ok(Json(OrderListResponse { orders }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn string_identifiers_are_accepted() {
        let request: CreateOrderRequest = serde_json::from_str(
            r#"{"cafe_id": "3", "items": [{"item_id": "5", "quantity": 2, "price": 4.5}]}"#,
        )
        .unwrap();
        assert_eq!(request.cafe_id, 3);
        assert_eq!(request.items[0].item_id, 5);
        assert!(request.check().is_ok());
    }

    #[test]
    fn empty_orders_are_rejected() {
        let request = CreateOrderRequest {
            cafe_id: 1,
            items: vec![],
        };
        assert_matches!(request.check(), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn each_line_is_validated() {
        let request = CreateOrderRequest {
            cafe_id: 1,
            items: vec![
                OrderLineRequest {
                    item_id: 1,
                    quantity: 1,
                    price: 2.0,
                },
                OrderLineRequest {
                    item_id: 2,
                    quantity: 0,
                    price: 2.0,
                },
            ],
        };
        assert_matches!(request.check(), Err(ServiceError::ValidationError(msg)) if msg.contains("quantity"));
    }

    #[test]
    fn prices_beyond_the_line_column_are_rejected() {
        let request = CreateOrderRequest {
            cafe_id: 1,
            items: vec![OrderLineRequest {
                item_id: 1,
                quantity: 1_000_000_000,
                price: 1e22,
            }],
        };
        assert_matches!(request.check(), Err(ServiceError::ValidationError(msg)) if msg.contains("price"));
    }
}
