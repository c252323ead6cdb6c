use crate::{db::DbPool, entities::cafe, errors::ServiceError};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;
use tracing::{info, instrument, warn};

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Cafe staff login against the (cafe id, access code) pair
#[derive(Clone)]
pub struct LoginService {
    db_pool: Arc<DbPool>,
}

impl LoginService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Unknown cafe and wrong code fail identically.
    #[instrument(skip(self, access_code))]
    pub async fn authenticate_cafe(
        &self,
        cafe_id: i32,
        access_code: &str,
    ) -> Result<cafe::Model, ServiceError> {
        let found = cafe::Entity::find()
            .filter(cafe::Column::CafeId.eq(cafe_id))
            .filter(cafe::Column::AccessCode.eq(access_code.trim()))
            .one(&*self.db_pool)
            .await?;

        match found {
            Some(cafe) => {
                info!(cafe_id, "Cafe authenticated");
                Ok(cafe)
            }
            None => {
                warn!(cafe_id, "Cafe authentication failed");
                Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()))
            }
        }
    }

    /// Cafes for the login picker, ordered by name.
    #[instrument(skip(self))]
    pub async fn list_cafes(&self) -> Result<Vec<cafe::Model>, ServiceError> {
        Ok(cafe::Entity::find()
            .order_by_asc(cafe::Column::Name)
            .order_by_asc(cafe::Column::CafeId)
            .all(&*self.db_pool)
            .await?)
    }
}
