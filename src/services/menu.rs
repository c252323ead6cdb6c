use crate::{
    db::DbPool, entities::menu_item, errors::ServiceError, services::orders::MAX_UNIT_PRICE,
};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct MenuItemInput {
    pub name: String,
    pub category: String,
    pub price: Decimal,
}

impl MenuItemInput {
    fn validate(&self) -> Result<(), ServiceError> {
        if self.name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Menu item name is required".to_string(),
            ));
        }
        if self.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price cannot be negative".to_string(),
            ));
        }
        if self.price > MAX_UNIT_PRICE {
            return Err(ServiceError::ValidationError(format!(
                "Price cannot exceed {}",
                MAX_UNIT_PRICE
            )));
        }
        Ok(())
    }
}

/// Catalogue of items sold across all cafes
#[derive(Clone)]
pub struct MenuService {
    db_pool: Arc<DbPool>,
}

impl MenuService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn add_menu_item(
        &self,
        input: MenuItemInput,
    ) -> Result<menu_item::Model, ServiceError> {
        input.validate()?;

        let created = menu_item::ActiveModel {
            name: Set(input.name.trim().to_string()),
            category: Set(input.category.trim().to_string()),
            price: Set(input.price),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;

        info!(item_id = created.item_id, "Menu item added");
        Ok(created)
    }

    /// Lists items, optionally keeping only names containing `search` (case-insensitive).
    #[instrument(skip(self))]
    pub async fn get_menu_items(
        &self,
        search: Option<&str>,
    ) -> Result<Vec<menu_item::Model>, ServiceError> {
        let mut query = menu_item::Entity::find().order_by_asc(menu_item::Column::ItemId);

        if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", term.to_lowercase());
            query = query.filter(
                Expr::expr(Func::lower(Expr::col(menu_item::Column::Name))).like(pattern),
            );
        }

        Ok(query.all(&*self.db_pool).await?)
    }

    #[instrument(skip(self))]
    pub async fn update_menu_item(
        &self,
        item_id: i32,
        input: MenuItemInput,
    ) -> Result<menu_item::Model, ServiceError> {
        input.validate()?;

        let db = &*self.db_pool;
        let existing = menu_item::Entity::find_by_id(item_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Menu item {} not found", item_id)))?;

        let mut item: menu_item::ActiveModel = existing.into();
        item.name = Set(input.name.trim().to_string());
        item.category = Set(input.category.trim().to_string());
        item.price = Set(input.price);
        let updated = item.update(db).await?;

        info!(item_id, "Menu item updated");
        Ok(updated)
    }

    /// Deletes an item; `false` when it did not exist.
    #[instrument(skip(self))]
    pub async fn delete_menu_item(&self, item_id: i32) -> Result<bool, ServiceError> {
        let result = menu_item::Entity::delete_by_id(item_id)
            .exec(&*self.db_pool)
            .await?;
        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn price_may_be_zero_but_not_negative() {
        let mut input = MenuItemInput {
            name: "Water".into(),
            category: "Drinks".into(),
            price: dec!(0),
        };
        assert!(input.validate().is_ok());

        input.price = dec!(-0.50);
        assert!(input.validate().is_err());
    }

    #[test]
    fn blank_names_are_rejected() {
        let input = MenuItemInput {
            name: "   ".into(),
            category: "Drinks".into(),
            price: dec!(2.50),
        };
        assert!(input.validate().is_err());
    }
}
