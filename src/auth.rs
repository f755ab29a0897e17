//! JWT issuing/verification and password digests.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::core::db::Role;

/// Lifetime of an access token unless the caller asks for another one.
pub const ACCESS_TOKEN_SECS: i64 = 900;
pub const REFRESH_TOKEN_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenUser {
    pub username: String,
    pub role: Role,
    #[serde(rename = "userId")]
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user: TokenUser,
    pub exp: i64,
    /// Makes two tokens issued in the same second distinct.
    pub jti: String,
}

/// HS256 secrets for access and refresh tokens.
#[derive(Clone)]
pub struct TokenKeys {
    token_secret: Vec<u8>,
    refresh_secret: Vec<u8>,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys").finish_non_exhaustive()
    }
}

impl TokenKeys {
    pub fn new(token_secret: impl AsRef<[u8]>, refresh_secret: impl AsRef<[u8]>) -> Self {
        Self {
            token_secret: token_secret.as_ref().to_vec(),
            refresh_secret: refresh_secret.as_ref().to_vec(),
        }
    }

    pub fn issue_token(&self, user: &TokenUser, expires_in_secs: i64) -> anyhow::Result<String> {
        sign(user, expires_in_secs, &self.token_secret)
    }

    pub fn issue_refresh_token(&self, user: &TokenUser) -> anyhow::Result<String> {
        sign(user, REFRESH_TOKEN_SECS, &self.refresh_secret)
    }

    pub fn verify_token(&self, token: &str) -> anyhow::Result<TokenUser> {
        verify(token, &self.token_secret)
    }

    pub fn verify_refresh_token(&self, token: &str) -> anyhow::Result<TokenUser> {
        verify(token, &self.refresh_secret)
    }
}

fn sign(user: &TokenUser, expires_in_secs: i64, secret: &[u8]) -> anyhow::Result<String> {
    let claims = Claims {
        user: user.clone(),
        exp: OffsetDateTime::now_utc().unix_timestamp() + expires_in_secs,
        jti: Uuid::new_v4().simple().to_string(),
    };
    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )?)
}

fn verify(token: &str, secret: &[u8]) -> anyhow::Result<TokenUser> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims.user)
}

/// Salted SHA-256 digest in the form `salt$hex`.
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("{}${}", salt, digest(&salt, password))
}

pub fn verify_password(stored: &str, candidate: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, expected)) => digest(salt, candidate) == expected,
        None => false,
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}
