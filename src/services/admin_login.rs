use crate::{db::DbPool, entities::admin, errors::ServiceError};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use sea_orm::{ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Hashes a password into an argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::HashError(e.to_string()))
}

/// Checks a password against a stored PHC string. Malformed hashes never verify.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::ValidationError(format!(
            "{} cannot be empty",
            field
        )));
    }
    Ok(())
}

fn map_username_conflict(err: DbErr, username: &str) -> ServiceError {
    if ServiceError::is_unique_violation(&err) {
        ServiceError::Conflict(format!("Username {} is already taken", username))
    } else {
        error!(error = %err, "Admin write failed");
        ServiceError::DatabaseError(err)
    }
}

#[derive(Clone)]
pub struct AdminLoginService {
    db_pool: Arc<DbPool>,
}

impl AdminLoginService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, password))]
    pub async fn create_admin(
        &self,
        username: &str,
        password: &str,
    ) -> Result<admin::Model, ServiceError> {
        require_non_empty(username, "Username")?;
        require_non_empty(password, "Password")?;
        let username = username.trim();

        let created = admin::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(hash_password(password)?),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| map_username_conflict(e, username))?;

        info!(admin_id = created.admin_id, "Admin created");
        Ok(created)
    }

    /// Unknown username and wrong password fail identically.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<admin::Model, ServiceError> {
        let found = admin::Entity::find()
            .filter(admin::Column::Username.eq(username.trim()))
            .one(&*self.db_pool)
            .await?;

        match found {
            Some(admin) if verify_password(password, &admin.password_hash) => {
                info!(admin_id = admin.admin_id, "Admin logged in");
                Ok(admin)
            }
            _ => {
                warn!("Admin login failed");
                Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()))
            }
        }
    }

    /// Changes the username and/or password of an admin.
    #[instrument(skip(self, new_password))]
    pub async fn update_admin_info(
        &self,
        admin_id: i32,
        new_username: Option<&str>,
        new_password: Option<&str>,
    ) -> Result<admin::Model, ServiceError> {
        if new_username.is_none() && new_password.is_none() {
            return Err(ServiceError::ValidationError(
                "Nothing to update".to_string(),
            ));
        }
        if let Some(username) = new_username {
            require_non_empty(username, "Username")?;
        }
        if let Some(password) = new_password {
            require_non_empty(password, "Password")?;
        }

        let db = &*self.db_pool;
        let existing = admin::Entity::find_by_id(admin_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Admin {} not found", admin_id)))?;

        let mut model: admin::ActiveModel = existing.into();
        if let Some(username) = new_username {
            model.username = Set(username.trim().to_string());
        }
        if let Some(password) = new_password {
            model.password_hash = Set(hash_password(password)?);
        }

        let updated = model
            .update(db)
            .await
            .map_err(|e| map_username_conflict(e, new_username.unwrap_or_default()))?;

        info!(admin_id, "Admin info updated");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_and_are_salted() {
        let first = hash_password("s3cret").unwrap();
        let second = hash_password("s3cret").unwrap();

        assert!(first.starts_with("$argon2"));
        assert_ne!(first, second);
        assert!(verify_password("s3cret", &first));
        assert!(!verify_password("wrong", &first));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }
}
