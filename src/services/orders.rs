use crate::{
    db::DbPool,
    entities::{analytics_log, order, order_item},
    errors::ServiceError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc, time::Instant};
use tracing::{error, info, instrument, warn};
use validator::Validate;

/// Stock contract the order workflow depends on.
///
/// `Ok(false)` means the item is missing or short at that cafe; `Err` means
/// the ledger itself could not be reached or failed.
#[async_trait]
pub trait StockLedger: Send + Sync {
    async fn decrement_stock(
        &self,
        item_id: i32,
        cafe_id: i32,
        quantity: i32,
    ) -> Result<bool, ServiceError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewOrderLine {
    #[validate(range(min = 1, message = "Item id must be positive"))]
    pub item_id: i32,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
    /// Unit price captured at order time
    pub price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewOrder {
    #[validate(range(min = 1, message = "Cafe id is required"))]
    pub cafe_id: i32,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<NewOrderLine>,
}

/// Largest unit price an order line column holds, `NUMERIC(10, 2)`.
pub const MAX_UNIT_PRICE: Decimal = dec!(99999999.99);

/// Largest amount the order and analytics total columns hold, `NUMERIC(12, 2)`.
pub const MAX_ORDER_TOTAL: Decimal = dec!(9999999999.99);

fn total_too_large() -> ServiceError {
    ServiceError::ValidationError(format!(
        "Order total cannot exceed {}",
        MAX_ORDER_TOTAL
    ))
}

impl NewOrderLine {
    /// price × quantity, bounded by [`MAX_ORDER_TOTAL`].
    pub fn line_total(&self) -> Result<Decimal, ServiceError> {
        self.price
            .checked_mul(Decimal::from(self.quantity))
            .filter(|total| *total <= MAX_ORDER_TOTAL)
            .ok_or_else(total_too_large)
    }
}

impl NewOrder {
    /// Rejects the request before anything is written.
    pub fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        for line in &self.items {
            line.validate()?;
            if line.price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "Price for item {} cannot be negative",
                    line.item_id
                )));
            }
            if line.price > MAX_UNIT_PRICE {
                return Err(ServiceError::ValidationError(format!(
                    "Price for item {} cannot exceed {}",
                    line.item_id, MAX_UNIT_PRICE
                )));
            }
            if line.price.normalize().scale() > 2 {
                return Err(ServiceError::ValidationError(format!(
                    "Price for item {} has more than two decimal places",
                    line.item_id
                )));
            }
        }
        self.total_price().map(|_| ())
    }

    /// Σ price × quantity over the submitted lines.
    pub fn total_price(&self) -> Result<Decimal, ServiceError> {
        self.items.iter().try_fold(Decimal::ZERO, |acc, line| {
            acc.checked_add(line.line_total()?)
                .filter(|total| *total <= MAX_ORDER_TOTAL)
                .ok_or_else(total_too_large)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreatedOrder {
    pub order_id: i32,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderWithItems {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// Creates orders and decrements stock through a [`StockLedger`].
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    stock: Arc<dyn StockLedger>,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, stock: Arc<dyn StockLedger>) -> Self {
        Self { db_pool, stock }
    }

    /// Persists an order and its items, decrementing stock for each line.
    ///
    /// Lines are processed in input order. The first line that cannot be
    /// covered rolls the whole order back and is reported as
    /// `InsufficientStock`. Stock already removed for earlier lines of the
    /// failed order lives in the ledger's own store and is not restored.
    #[instrument(skip(self, request), fields(cafe_id = request.cafe_id, lines = request.items.len()))]
    pub async fn create_order(&self, request: NewOrder) -> Result<CreatedOrder, ServiceError> {
        request.check()?;

        let start = Instant::now();
        let total_price = request.total_price()?;
        let db = &*self.db_pool;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        match self.write_order(&txn, &request, total_price).await {
            Ok(order_id) => {
                txn.commit().await.map_err(|e| {
                    error!(error = %e, order_id, "Failed to commit order");
                    ServiceError::DatabaseError(e)
                })?;

                counter!("cafe_orders.created", 1);
                histogram!("cafe_orders.create.duration", start.elapsed());
                info!(order_id, total_price = %total_price, "Order created");

                Ok(CreatedOrder {
                    order_id,
                    total_price,
                })
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    error!(error = %rollback_err, "Failed to roll back order transaction");
                }
                counter!("cafe_orders.rejected", 1);
                warn!(error = %e, "Order rejected");
                Err(e)
            }
        }
    }

    async fn write_order(
        &self,
        txn: &DatabaseTransaction,
        request: &NewOrder,
        total_price: Decimal,
    ) -> Result<i32, ServiceError> {
        let now = Utc::now();

        let header = order::ActiveModel {
            cafe_id: Set(request.cafe_id),
            total_price: Set(total_price),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(txn)
        .await?;
        let order_id = header.order_id;

        for line in &request.items {
            let line_total = line.line_total()?;
            order_item::ActiveModel {
                order_id: Set(order_id),
                item_id: Set(line.item_id),
                quantity: Set(line.quantity),
                price: Set(line.price),
                ..Default::default()
            }
            .insert(txn)
            .await?;

            match self
                .stock
                .decrement_stock(line.item_id, request.cafe_id, line.quantity)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    return Err(ServiceError::InsufficientStock {
                        item_id: line.item_id,
                    })
                }
                Err(e) => {
                    error!(error = %e, item_id = line.item_id, "Stock ledger call failed");
                    return Err(match e {
                        ServiceError::ServiceUnavailable(_) => e,
                        other => ServiceError::ServiceUnavailable(format!(
                            "Inventory update failed: {}",
                            other
                        )),
                    });
                }
            }

            self.record_sale(txn, order_id, request.cafe_id, line, line_total, now)
                .await;
        }

        Ok(order_id)
    }

    /// Appends an analytics entry inside a savepoint; failures never abort the order.
    async fn record_sale(
        &self,
        txn: &DatabaseTransaction,
        order_id: i32,
        cafe_id: i32,
        line: &NewOrderLine,
        line_total: Decimal,
        at: DateTime<Utc>,
    ) {
        let savepoint = match txn.begin().await {
            Ok(sp) => sp,
            Err(e) => {
                warn!(error = %e, order_id, "Could not open savepoint for analytics log");
                return;
            }
        };

        let entry = analytics_log::ActiveModel {
            order_id: Set(order_id),
            cafe_id: Set(cafe_id),
            item_id: Set(line.item_id),
            quantity: Set(line.quantity),
            total_price: Set(line_total),
            timestamp: Set(at),
            ..Default::default()
        };

        match entry.insert(&savepoint).await {
            Ok(_) => {
                if let Err(e) = savepoint.commit().await {
                    warn!(error = %e, order_id, "Failed to release analytics savepoint");
                }
            }
            Err(e) => {
                counter!("cafe_orders.analytics_log.failed", 1);
                warn!(error = %e, order_id, item_id = line.item_id, "Failed to write analytics log");
                if let Err(e) = savepoint.rollback().await {
                    warn!(error = %e, order_id, "Failed to roll back analytics savepoint");
                }
            }
        }
    }

    /// Orders of a cafe, newest first, each with its items in insertion order.
    #[instrument(skip(self))]
    pub async fn get_orders_by_cafe(
        &self,
        cafe_id: i32,
    ) -> Result<Vec<OrderWithItems>, ServiceError> {
        let db = &*self.db_pool;

        let orders = order::Entity::find()
            .filter(order::Column::CafeId.eq(cafe_id))
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::OrderId)
            .all(db)
            .await?;

        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<i32> = orders.iter().map(|o| o.order_id).collect();
        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .order_by_asc(order_item::Column::OrderItemId)
            .all(db)
            .await?;

        let mut by_order: HashMap<i32, Vec<order_item::Model>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item);
        }

        Ok(orders
            .into_iter()
            .map(|order| OrderWithItems {
                items: by_order.remove(&order.order_id).unwrap_or_default(),
                order,
            })
            .collect())
    }
}
