use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, Rng};

use fieldscan_models::auth::{Claims, User, TOKEN_ISSUER};

/// Password hashing and session-token issuance. Built once at startup from
/// the resolved configuration and shared across requests.
pub struct SecurityService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: chrono::Duration,
    argon2: Argon2<'static>,
}

impl SecurityService {
    pub fn new(secret: &str, token_ttl_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_ttl: chrono::Duration::hours(token_ttl_hours),
            argon2: Argon2::default(),
        }
    }

    pub fn hash_password(&self, password: &str) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = self.argon2.hash_password(password.as_bytes(), &salt)?;
        Ok(password_hash.to_string())
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
        let parsed_hash = PasswordHash::new(hash)?;
        match self.argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Issues a session token for the user, returning the token and its
    /// expiry timestamp.
    pub fn generate_token(&self, user: &User) -> Result<(String, DateTime<Utc>), jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let expires_at = now + self.token_ttl;

        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
            iss: TOKEN_ISSUER.to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok((token, expires_at))
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[TOKEN_ISSUER]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(token_data.claims)
    }

    /// Random password for accounts provisioned through federated login.
    /// Hashed like any other password and never communicated to anyone.
    pub fn generate_placeholder_password() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(20)
            .map(char::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn test_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: "scout".to_string(),
            email: "scout@example.com".to_string(),
            password_hash: String::new(),
            first_name: None,
            last_name: None,
            phone_number: None,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    #[test]
    fn hash_then_verify_roundtrip() {
        let service = SecurityService::new("secret", 24);
        let hash = service.hash_password("correct horse").unwrap();
        assert!(service.verify_password("correct horse", &hash).unwrap());
        assert!(!service.verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn token_roundtrip_carries_identity() {
        let service = SecurityService::new("secret", 24);
        let user = test_user();
        let (token, expires_at) = service.generate_token(&user).unwrap();
        assert!(expires_at > Utc::now());

        let claims = service.verify_token(&token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.username, user.username);
        assert_eq!(claims.iss, TOKEN_ISSUER);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let issuer = SecurityService::new("secret-a", 24);
        let verifier = SecurityService::new("secret-b", 24);
        let (token, _) = issuer.generate_token(&test_user()).unwrap();
        assert!(verifier.verify_token(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        // Expiry two hours in the past, beyond the default leeway.
        let service = SecurityService::new("secret", -2);
        let (token, _) = service.generate_token(&test_user()).unwrap();
        assert!(service.verify_token(&token).is_err());
    }

    #[test]
    fn placeholder_passwords_are_long_and_distinct() {
        let a = SecurityService::generate_placeholder_password();
        let b = SecurityService::generate_placeholder_password();
        assert_eq!(a.len(), 20);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
