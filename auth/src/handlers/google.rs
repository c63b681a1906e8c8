use actix_web::{web, HttpResponse};
use sqlx::PgPool;

use crate::error::AuthError;
use crate::services::google::{token_debug, GoogleVerifier, GoogleVerifyError};
use crate::services::{SecurityService, UserService};
use anyhow::anyhow;
use fieldscan_models::auth::{GoogleAuthRequest, GoogleAuthResponse, UserProfile};

/// Federated sign-in/sign-up. Serves both /google/login/ and /google/signup/:
/// the flows are identical because an unknown verified email is provisioned
/// just in time.
pub async fn google_auth(
    request: web::Json<GoogleAuthRequest>,
    pool: web::Data<PgPool>,
    security: web::Data<SecurityService>,
    verifier: web::Data<GoogleVerifier>,
) -> Result<HttpResponse, AuthError> {
    tracing::info!("received Google authentication request");

    let id_token = request
        .id_token
        .as_deref()
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            tracing::warn!("no ID token provided in request");
            AuthError::MissingInput("No ID token provided".to_string())
        })?;

    let claims = match verifier.verify(id_token).await {
        Ok(claims) => claims,
        Err(GoogleVerifyError::Invalid(reason)) => {
            tracing::warn!(token = %token_debug(id_token), %reason, "token verification failed");
            return Err(AuthError::InvalidToken);
        }
        Err(GoogleVerifyError::Transport(err)) => {
            return Err(AuthError::Unexpected(anyhow!(
                "identity provider unreachable: {}",
                err
            )));
        }
    };

    tracing::info!(email = %claims.email, "token verified");

    let users = UserService::new(pool.get_ref().clone(), security.clone().into_inner());

    let (user, created) = users
        .get_or_create_by_email(
            &claims.email,
            claims.given_name.as_deref(),
            claims.family_name.as_deref(),
        )
        .await?;

    if created {
        tracing::info!(user_id = %user.id, email = %user.email, "provisioned user from federated login");
    } else if let Err(err) = users.update_last_login(user.id).await {
        tracing::warn!(user_id = %user.id, "failed to update last login: {}", err);
    }

    let (token, _expires_at) = security
        .generate_token(&user)
        .map_err(|e| AuthError::Unexpected(anyhow!("failed to sign session token: {}", e)))?;

    let message = if created {
        "User created"
    } else {
        "Login successful"
    };

    Ok(HttpResponse::Ok().json(GoogleAuthResponse {
        token,
        user: UserProfile::from(user),
        message: message.to_string(),
    }))
}
