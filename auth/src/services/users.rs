use anyhow::anyhow;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AuthError;
use crate::services::security::SecurityService;
use fieldscan_models::auth::{SignupRequest, User};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, first_name, last_name, phone_number, \
     created_at, updated_at, last_login_at";

/// User store operations. Uniqueness of email and username is enforced by
/// the database constraints; violations surface as `DuplicateAccount`.
pub struct UserService {
    pool: PgPool,
    security: Arc<SecurityService>,
}

impl UserService {
    pub fn new(pool: PgPool, security: Arc<SecurityService>) -> Self {
        Self { pool, security }
    }

    pub async fn create_user(&self, request: &SignupRequest) -> Result<User, AuthError> {
        let password_hash = self
            .security
            .hash_password(&request.password)
            .map_err(|e| AuthError::Unexpected(anyhow!("failed to hash password: {}", e)))?;

        self.insert_user(
            &request.username,
            &request.email,
            &password_hash,
            request.first_name.as_deref(),
            request.last_name.as_deref(),
            request.phone_number.as_deref(),
        )
        .await
    }

    async fn insert_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
        phone_number: Option<&str>,
    ) -> Result<User, AuthError> {
        let now = Utc::now();

        let result = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (
                id, username, email, password_hash, first_name, last_name, phone_number,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(first_name)
        .bind(last_name)
        .bind(phone_number)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => {
                tracing::info!(user_id = %user.id, email = %user.email, "created user");
                Ok(user)
            }
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23505") => {
                Err(AuthError::DuplicateAccount(
                    "An account with this email or username already exists".to_string(),
                ))
            }
            Err(e) => Err(AuthError::Unexpected(anyhow!("failed to create user: {}", e))),
        }
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Unexpected(anyhow!("failed to look up user by username: {}", e)))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Unexpected(anyhow!("failed to look up user by email: {}", e)))
    }

    pub async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, AuthError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Unexpected(anyhow!("failed to look up user by id: {}", e)))
    }

    /// Credential check for login. Unknown usernames and wrong passwords are
    /// indistinguishable to the caller.
    pub async fn verify_password(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let user = self
            .find_by_username(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let matches = self
            .security
            .verify_password(password, &user.password_hash)
            .map_err(|e| AuthError::Unexpected(anyhow!("password verification failed: {}", e)))?;

        if !matches {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    pub async fn update_password(&self, user_id: Uuid, new_password_hash: &str) -> Result<(), AuthError> {
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3")
            .bind(new_password_hash)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Unexpected(anyhow!("failed to update password: {}", e)))?;

        Ok(())
    }

    pub async fn update_last_login(&self, user_id: Uuid) -> Result<(), AuthError> {
        sqlx::query("UPDATE users SET last_login_at = $1, updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Unexpected(anyhow!("failed to update last login: {}", e)))?;

        Ok(())
    }

    /// Resolves a federated login to an account: the existing user for this
    /// email, or a freshly provisioned one with a placeholder password.
    /// Returns the user and whether it was created by this call.
    ///
    /// Two concurrent first logins for the same email can both miss the
    /// lookup; the loser of the insert race hits the unique constraint and
    /// resolves by re-fetching.
    pub async fn get_or_create_by_email(
        &self,
        email: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<(User, bool), AuthError> {
        if let Some(user) = self.find_by_email(email).await? {
            return Ok((user, false));
        }

        let placeholder = SecurityService::generate_placeholder_password();
        let password_hash = self
            .security
            .hash_password(&placeholder)
            .map_err(|e| AuthError::Unexpected(anyhow!("failed to hash placeholder password: {}", e)))?;

        match self
            .insert_user(email, email, &password_hash, first_name, last_name, None)
            .await
        {
            Ok(user) => Ok((user, true)),
            Err(AuthError::DuplicateAccount(_)) => {
                // Lost the provisioning race; the row exists now.
                self.find_by_email(email)
                    .await?
                    .map(|user| (user, false))
                    .ok_or_else(|| {
                        AuthError::Unexpected(anyhow!(
                            "user for {} vanished after unique-constraint violation",
                            email
                        ))
                    })
            }
            Err(e) => Err(e),
        }
    }
}
