use std::future::Future;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginTokens {
    pub token: String,
    pub refresh_token: String,
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedTokens {
    pub token: String,
    pub refresh_token: String,
}

pub trait AuthRepository {
    fn are_tokens_present(&self) -> impl Future<Output = anyhow::Result<bool>>;
    fn save_tokens(
        &self,
        token: &str,
        refresh_token: &str,
    ) -> impl Future<Output = anyhow::Result<()>>;
    /// `Ok(None)` when the credentials do not match any account.
    fn login(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = anyhow::Result<Option<LoginTokens>>>;
}
