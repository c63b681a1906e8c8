use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::AuthError;
use crate::services::{SecurityService, UserService};
use anyhow::anyhow;
use fieldscan_middleware::auth::{extract_claims_from_request, extract_token_from_request};
use fieldscan_models::auth::{
    AuthResponse, ChangePasswordRequest, LoginRequest, SignupRequest, UserProfile,
};

fn user_service(pool: &web::Data<PgPool>, security: &web::Data<SecurityService>) -> UserService {
    UserService::new(pool.get_ref().clone(), security.clone().into_inner())
}

pub async fn login(
    request: web::Json<LoginRequest>,
    pool: web::Data<PgPool>,
    security: web::Data<SecurityService>,
) -> Result<HttpResponse, AuthError> {
    request
        .validate()
        .map_err(|e| AuthError::MissingInput(e.to_string()))?;

    let users = user_service(&pool, &security);

    let user = match users.verify_password(&request.username, &request.password).await {
        Ok(user) => user,
        Err(err) => {
            tracing::warn!(username = %request.username, "login rejected");
            return Err(err);
        }
    };

    if let Err(err) = users.update_last_login(user.id).await {
        tracing::warn!(user_id = %user.id, "failed to update last login: {}", err);
    }

    let (token, expires_at) = security
        .generate_token(&user)
        .map_err(|e| AuthError::Unexpected(anyhow!("failed to sign session token: {}", e)))?;

    tracing::info!(user_id = %user.id, "login successful");

    Ok(HttpResponse::Ok().json(AuthResponse {
        user: UserProfile::from(user),
        token,
        expires_at,
    }))
}

pub async fn signup(
    request: web::Json<SignupRequest>,
    pool: web::Data<PgPool>,
    security: web::Data<SecurityService>,
) -> Result<HttpResponse, AuthError> {
    request
        .validate()
        .map_err(|e| AuthError::MissingInput(e.to_string()))?;

    let users = user_service(&pool, &security);

    let user = match users.create_user(&request).await {
        Ok(user) => user,
        Err(err) => {
            tracing::warn!(email = %request.email, "signup rejected: {}", err);
            return Err(err);
        }
    };

    let (token, expires_at) = security
        .generate_token(&user)
        .map_err(|e| AuthError::Unexpected(anyhow!("failed to sign session token: {}", e)))?;

    Ok(HttpResponse::Created().json(AuthResponse {
        user: UserProfile::from(user),
        token,
        expires_at,
    }))
}

pub async fn get_user_info(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    security: web::Data<SecurityService>,
) -> Result<HttpResponse, AuthError> {
    let claims = extract_claims_from_request(&req).ok_or(AuthError::Unauthorized)?;

    let user_id: Uuid = claims.sub.parse().map_err(|_| {
        tracing::warn!("session token carries a malformed user id");
        AuthError::InvalidToken
    })?;

    let users = user_service(&pool, &security);
    let user = users.find_by_id(user_id).await?.ok_or_else(|| {
        tracing::warn!(user_id = %user_id, "token references a missing user");
        AuthError::NotFound
    })?;

    Ok(HttpResponse::Ok().json(UserProfile::from(user)))
}

pub async fn change_password(
    req: HttpRequest,
    request: web::Json<ChangePasswordRequest>,
    pool: web::Data<PgPool>,
    security: web::Data<SecurityService>,
) -> Result<HttpResponse, AuthError> {
    request
        .validate()
        .map_err(|e| AuthError::MissingInput(e.to_string()))?;

    let claims = extract_claims_from_request(&req).ok_or(AuthError::Unauthorized)?;
    let user_id: Uuid = claims.sub.parse().map_err(|_| AuthError::InvalidToken)?;

    let users = user_service(&pool, &security);
    let user = users.find_by_id(user_id).await?.ok_or(AuthError::NotFound)?;

    let old_matches = security
        .verify_password(&request.old_password, &user.password_hash)
        .map_err(|e| AuthError::Unexpected(anyhow!("password verification failed: {}", e)))?;

    if !old_matches {
        tracing::warn!(user_id = %user.id, "password change rejected: old password mismatch");
        return Err(AuthError::InvalidCredentials);
    }

    let new_hash = security
        .hash_password(&request.new_password)
        .map_err(|e| AuthError::Unexpected(anyhow!("failed to hash password: {}", e)))?;

    users.update_password(user.id, &new_hash).await?;

    tracing::info!(user_id = %user.id, "password changed");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Password changed successfully",
        "success": true
    })))
}

/// Session tokens are stateless, so there is nothing to revoke server-side;
/// the client discards its copy and we acknowledge.
pub async fn logout(
    req: HttpRequest,
    security: web::Data<SecurityService>,
) -> Result<HttpResponse, AuthError> {
    match extract_token_from_request(&req).and_then(|token| security.verify_token(&token).ok()) {
        Some(claims) => tracing::info!(user_id = %claims.sub, "user logged out"),
        None => tracing::info!("logout acknowledged for anonymous client"),
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Logged out successfully"
    })))
}

pub async fn get_user(
    path: web::Path<Uuid>,
    pool: web::Data<PgPool>,
    security: web::Data<SecurityService>,
) -> Result<HttpResponse, AuthError> {
    let user_id = path.into_inner();

    let users = user_service(&pool, &security);
    let user = users.find_by_id(user_id).await?.ok_or_else(|| {
        tracing::debug!(user_id = %user_id, "user lookup missed");
        AuthError::NotFound
    })?;

    Ok(HttpResponse::Ok().json(UserProfile::from(user)))
}
