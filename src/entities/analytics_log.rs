use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Denormalized per-line sales record, appended best-effort after each decrement.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "analytics_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub log_id: i32,
    pub order_id: i32,
    pub cafe_id: i32,
    pub item_id: i32,
    pub quantity: i32,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total_price: Decimal,
    pub timestamp: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
