use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Stock of one menu item at one cafe. `(item_id, cafe_id)` is unique.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub inventory_id: i32,
    pub item_id: i32,
    pub cafe_id: i32,
    pub stock: i32,
    pub restock_date: Option<Date>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::menu_item::Entity",
        from = "Column::ItemId",
        to = "super::menu_item::Column::ItemId",
        on_delete = "Cascade"
    )]
    MenuItem,
    #[sea_orm(
        belongs_to = "super::cafe::Entity",
        from = "Column::CafeId",
        to = "super::cafe::Column::CafeId",
        on_delete = "Cascade"
    )]
    Cafe,
}

impl Related<super::menu_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MenuItem.def()
    }
}

impl Related<super::cafe::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cafe.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
