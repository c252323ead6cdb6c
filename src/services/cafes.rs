use crate::{db::DbPool, entities::cafe, errors::ServiceError};
use sea_orm::{ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct CafeInput {
    pub name: String,
    pub location: String,
    pub access_code: String,
}

impl CafeInput {
    fn validate(&self) -> Result<(), ServiceError> {
        if self.name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Cafe name is required".to_string(),
            ));
        }
        if self.access_code.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Access code is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Turns a uniqueness failure on `access_code` into the dedicated error.
fn map_write_error(err: DbErr, access_code: &str) -> ServiceError {
    if ServiceError::is_unique_violation(&err) {
        warn!(access_code, "Duplicate cafe access code");
        ServiceError::DuplicateAccessCode(format!(
            "Access code {} is already in use",
            access_code
        ))
    } else {
        error!(error = %err, "Cafe write failed");
        ServiceError::DatabaseError(err)
    }
}

/// Directory of cafes and their access codes
#[derive(Clone)]
pub struct CafeService {
    db_pool: Arc<DbPool>,
}

impl CafeService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_cafe(&self, input: CafeInput) -> Result<cafe::Model, ServiceError> {
        input.validate()?;
        let access_code = input.access_code.trim().to_string();

        let created = cafe::ActiveModel {
            name: Set(input.name.trim().to_string()),
            location: Set(input.location.trim().to_string()),
            access_code: Set(access_code.clone()),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| map_write_error(e, &access_code))?;

        info!(cafe_id = created.cafe_id, "Cafe created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get_all_cafes(&self) -> Result<Vec<cafe::Model>, ServiceError> {
        Ok(cafe::Entity::find()
            .order_by_asc(cafe::Column::CafeId)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self, input))]
    pub async fn update_cafe(
        &self,
        cafe_id: i32,
        input: CafeInput,
    ) -> Result<cafe::Model, ServiceError> {
        input.validate()?;
        let access_code = input.access_code.trim().to_string();

        let db = &*self.db_pool;
        let existing = cafe::Entity::find_by_id(cafe_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cafe {} not found", cafe_id)))?;

        let mut model: cafe::ActiveModel = existing.into();
        model.name = Set(input.name.trim().to_string());
        model.location = Set(input.location.trim().to_string());
        model.access_code = Set(access_code.clone());

        let updated = model
            .update(db)
            .await
            .map_err(|e| map_write_error(e, &access_code))?;

        info!(cafe_id, "Cafe updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_cafe(&self, cafe_id: i32) -> Result<(), ServiceError> {
        let result = cafe::Entity::delete_by_id(cafe_id)
            .exec(&*self.db_pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Cafe {} not found", cafe_id)));
        }
        info!(cafe_id, "Cafe deleted");
        Ok(())
    }

    /// Resolves an access code to its cafe.
    #[instrument(skip(self, access_code))]
    pub async fn verify_cafe_code(&self, access_code: &str) -> Result<cafe::Model, ServiceError> {
        cafe::Entity::find()
            .filter(cafe::Column::AccessCode.eq(access_code.trim()))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid access code".to_string()))
    }
}
