use crate::{
    db::DbPool,
    entities::{cafe, inventory, menu_item},
    errors::ServiceError,
    services::orders::StockLedger,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use metrics::counter;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, FromQueryResult, JoinType,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Accepted format for restock dates
pub const RESTOCK_DATE_FORMAT: &str = "%Y-%m-%d";

/// Inventory row joined with the names of its item and cafe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryView {
    pub item_id: i32,
    pub cafe_id: i32,
    pub item_name: String,
    pub cafe_name: String,
    pub stock_quantity: i32,
    pub restock_date: Option<NaiveDate>,
    pub is_low_stock: bool,
}

#[derive(Debug, FromQueryResult)]
struct InventoryRow {
    item_id: i32,
    cafe_id: i32,
    item_name: String,
    cafe_name: String,
    stock_quantity: i32,
    restock_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct NewInventoryRecord {
    pub item_id: i32,
    pub cafe_id: i32,
    pub stock: i32,
    pub restock_date: Option<String>,
}

/// Parses a `YYYY-MM-DD` restock date.
pub fn parse_restock_date(value: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(value.trim(), RESTOCK_DATE_FORMAT).map_err(|_| {
        ServiceError::ValidationError(format!(
            "Invalid restock date '{}', expected YYYY-MM-DD",
            value
        ))
    })
}

/// Owner of the `inventory` table. Every stock mutation goes through here.
#[derive(Clone)]
pub struct InventoryService {
    db_pool: Arc<DbPool>,
    low_stock_threshold: i32,
}

impl InventoryService {
    pub fn new(db_pool: Arc<DbPool>, low_stock_threshold: i32) -> Self {
        Self {
            db_pool,
            low_stock_threshold,
        }
    }

    pub fn is_low_stock(&self, stock: i32) -> bool {
        stock < self.low_stock_threshold
    }

    /// Lists every record with item and cafe names, ordered by cafe then item.
    ///
    /// Read failures are logged and reported as an empty list.
    #[instrument(skip(self))]
    pub async fn get_all_inventory(&self) -> Vec<InventoryView> {
        let db = &*self.db_pool;
        let rows = inventory::Entity::find()
            .select_only()
            .column(inventory::Column::ItemId)
            .column(inventory::Column::CafeId)
            .column_as(menu_item::Column::Name, "item_name")
            .column_as(cafe::Column::Name, "cafe_name")
            .column_as(inventory::Column::Stock, "stock_quantity")
            .column(inventory::Column::RestockDate)
            .join(JoinType::InnerJoin, inventory::Relation::MenuItem.def())
            .join(JoinType::InnerJoin, inventory::Relation::Cafe.def())
            .order_by_asc(cafe::Column::Name)
            .order_by_asc(menu_item::Column::Name)
            .into_model::<InventoryRow>()
            .all(db)
            .await;

        match rows {
            Ok(rows) => rows
                .into_iter()
                .map(|row| InventoryView {
                    is_low_stock: self.is_low_stock(row.stock_quantity),
                    item_id: row.item_id,
                    cafe_id: row.cafe_id,
                    item_name: row.item_name,
                    cafe_name: row.cafe_name,
                    stock_quantity: row.stock_quantity,
                    restock_date: row.restock_date,
                })
                .collect(),
            Err(e) => {
                error!(error = %e, "Failed to load inventory");
                Vec::new()
            }
        }
    }

    /// Removes `quantity` units when at least that many are on hand.
    ///
    /// The check and the subtraction are one conditional UPDATE, so concurrent
    /// callers can never drive stock below zero. `Ok(false)` means the row is
    /// missing or holds too little stock.
    #[instrument(skip(self))]
    pub async fn decrement_stock(
        &self,
        item_id: i32,
        cafe_id: i32,
        quantity: i32,
    ) -> Result<bool, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity ordered must be positive".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let result = inventory::Entity::update_many()
            .col_expr(
                inventory::Column::Stock,
                Expr::col(inventory::Column::Stock).sub(quantity),
            )
            .filter(inventory::Column::ItemId.eq(item_id))
            .filter(inventory::Column::CafeId.eq(cafe_id))
            .filter(inventory::Column::Stock.gte(quantity))
            .exec(db)
            .await
            .map_err(|e| {
                error!(error = %e, item_id, cafe_id, "Stock decrement failed");
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            counter!("cafe_inventory.decrement.rejected", 1);
            warn!(item_id, cafe_id, quantity, "Not enough stock to decrement");
            return Ok(false);
        }

        counter!("cafe_inventory.decrement.applied", 1);
        Ok(true)
    }

    /// Adds stock to an existing record and stamps its restock date.
    ///
    /// Returns `Ok(false)` when no record exists for the pair; none is created.
    #[instrument(skip(self))]
    pub async fn restock(
        &self,
        item_id: i32,
        cafe_id: i32,
        quantity_added: i32,
        restock_date: &str,
    ) -> Result<bool, ServiceError> {
        if quantity_added <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity added must be positive".to_string(),
            ));
        }
        let date = parse_restock_date(restock_date)?;

        let db = &*self.db_pool;
        let result = inventory::Entity::update_many()
            .col_expr(
                inventory::Column::Stock,
                Expr::col(inventory::Column::Stock).add(quantity_added),
            )
            .col_expr(inventory::Column::RestockDate, Expr::value(date))
            .filter(inventory::Column::ItemId.eq(item_id))
            .filter(inventory::Column::CafeId.eq(cafe_id))
            .filter(inventory::Column::Stock.lte(i32::MAX - quantity_added))
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            if let Some(current) = self.get_stock(item_id, cafe_id).await? {
                warn!(item_id, cafe_id, stock = current.stock, quantity_added, "Restock would overflow stock");
                return Err(ServiceError::ValidationError(format!(
                    "Restocking {} would exceed the maximum stock of {}",
                    quantity_added,
                    i32::MAX
                )));
            }
            warn!(item_id, cafe_id, "Restock target not found");
            return Ok(false);
        }

        info!(item_id, cafe_id, quantity_added, %date, "Item restocked");
        Ok(true)
    }

    /// Creates the stock record for an (item, cafe) pair.
    #[instrument(skip(self))]
    pub async fn add_inventory_record(
        &self,
        record: NewInventoryRecord,
    ) -> Result<inventory::Model, ServiceError> {
        if record.stock < 0 {
            return Err(ServiceError::ValidationError(
                "Stock cannot be negative".to_string(),
            ));
        }
        let restock_date = record
            .restock_date
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(parse_restock_date)
            .transpose()?;

        let db = &*self.db_pool;
        let model = inventory::ActiveModel {
            item_id: Set(record.item_id),
            cafe_id: Set(record.cafe_id),
            stock: Set(record.stock),
            restock_date: Set(restock_date),
            ..Default::default()
        };

        let created = model.insert(db).await.map_err(|e| {
            if ServiceError::is_unique_violation(&e) {
                ServiceError::Conflict(format!(
                    "Inventory record for item {} at cafe {} already exists",
                    record.item_id, record.cafe_id
                ))
            } else if ServiceError::is_foreign_key_violation(&e) {
                ServiceError::NotFound(format!(
                    "Menu item {} or cafe {} does not exist",
                    record.item_id, record.cafe_id
                ))
            } else {
                error!(error = %e, "Failed to insert inventory record");
                ServiceError::DatabaseError(e)
            }
        })?;

        info!(
            item_id = created.item_id,
            cafe_id = created.cafe_id,
            stock = created.stock,
            "Inventory record created"
        );
        Ok(created)
    }

    /// Reads the record for one (item, cafe) pair.
    #[instrument(skip(self))]
    pub async fn get_stock(
        &self,
        item_id: i32,
        cafe_id: i32,
    ) -> Result<Option<inventory::Model>, ServiceError> {
        let db = &*self.db_pool;
        let record = inventory::Entity::find()
            .filter(inventory::Column::ItemId.eq(item_id))
            .filter(inventory::Column::CafeId.eq(cafe_id))
            .one(db)
            .await?;
        Ok(record)
    }
}

#[async_trait]
impl StockLedger for InventoryService {
    async fn decrement_stock(
        &self,
        item_id: i32,
        cafe_id: i32,
        quantity: i32,
    ) -> Result<bool, ServiceError> {
        InventoryService::decrement_stock(self, item_id, cafe_id, quantity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn restock_dates_must_be_iso_days() {
        assert_eq!(
            parse_restock_date("2024-03-09").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
        );
        assert_matches!(
            parse_restock_date("09/03/2024"),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            parse_restock_date("2024-02-30"),
            Err(ServiceError::ValidationError(_))
        );
    }
}
