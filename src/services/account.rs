use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use crate::database::gateway::{sql_timestamp, Database, DatabaseError};
use crate::database::models::{SessionUser, User};
use crate::security::{validate_email, validate_password, Sanitizer};
use crate::services::ServiceError;

/// Registration and credential verification against the users table.
#[derive(Clone)]
pub struct AccountService {
    db: Database,
    sanitizer: Sanitizer,
    bcrypt_cost: u32,
}

impl AccountService {
    pub fn new(db: Database, sanitizer: Sanitizer, bcrypt_cost: u32) -> Self {
        Self {
            db,
            sanitizer,
            bcrypt_cost,
        }
    }

    /// Copy of the service whose audit events carry the caller's address.
    pub fn for_origin(&self, origin: impl Into<String>) -> Self {
        Self {
            db: self.db.clone(),
            sanitizer: self.sanitizer.for_origin(origin),
            bcrypt_cost: self.bcrypt_cost,
        }
    }

    /// Create an account. All validation complaints are collected before the
    /// store is touched; a duplicate email surfaces as a conflict.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<i64, ServiceError> {
        let email = self.sanitizer.sanitize_email(email, "email");
        let password = self.sanitizer.sanitize_password(password, "password");
        let name = self.sanitizer.sanitize(name, "name");

        let mut errors = Vec::new();
        if email.is_empty() {
            errors.push("Email is required".to_string());
        } else if !validate_email(&email) {
            errors.push("Invalid email format".to_string());
        }
        if password.is_empty() {
            errors.push("Password is required".to_string());
        } else if !validate_password(&password) {
            errors.push(
                "Password must be at least 8 characters and contain letters and digits"
                    .to_string(),
            );
        }
        if name.is_empty() {
            errors.push("Name is required".to_string());
        }
        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors));
        }

        let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(self.db.pool())
            .await
            .map_err(DatabaseError::from)?;
        if existing.is_some() {
            return Err(ServiceError::conflict("A user with this email already exists"));
        }

        let hash = bcrypt::hash(&password, self.bcrypt_cost)
            .map_err(|e| ServiceError::Internal(format!("password hashing failed: {e}")))?;

        let result = self
            .db
            .execute(
                "INSERT INTO users (email, password, name, created_at) VALUES (?, ?, ?, ?)",
                &[
                    json!(email),
                    json!(hash),
                    json!(name),
                    json!(sql_timestamp(&Utc::now())),
                ],
            )
            .await
            .map_err(|err| match &err {
                // The store-level uniqueness constraint is the backstop for
                // a concurrent registration racing the pre-check
                DatabaseError::Sqlx(sqlx::Error::Database(db_err))
                    if db_err.is_unique_violation() =>
                {
                    ServiceError::conflict("A user with this email already exists")
                }
                _ => ServiceError::Database(err),
            })?;

        let user_id = result.last_insert_rowid();
        info!(user_id, email = %email, "user registered");
        Ok(user_id)
    }

    /// Verify credentials. An unknown email and a wrong password produce the
    /// same `None`, so accounts cannot be enumerated from the outcome.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<SessionUser>, ServiceError> {
        let email = email.trim();

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(self.db.pool())
            .await
            .map_err(DatabaseError::from)?;

        let Some(user) = user else {
            warn!(email = %email, "failed login attempt");
            return Ok(None);
        };

        if bcrypt::verify(password, &user.password).unwrap_or(false) {
            info!(user_id = user.id, "user authenticated");
            Ok(Some(SessionUser::from(&user)))
        } else {
            warn!(email = %email, "failed login attempt");
            Ok(None)
        }
    }
}
