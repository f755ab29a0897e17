use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::core::db::model::{Role, next_id};

/// Account as returned by the store; the password digest never leaves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub surname: String,
    pub role: Role,
    #[serde(skip)]
    pub(crate) _guard: (),
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.name, self.surname)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    #[serde(default = "next_id")]
    pub id: i64,
    pub username: String,
    pub name: String,
    pub surname: String,
    pub role: Role,
    /// Plain text; hashed by the store before it is written.
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

pub trait UserRepository {
    fn get_users(&self) -> impl Future<Output = anyhow::Result<Vec<User>>>;
    fn get_user(&self, id: i64) -> impl Future<Output = anyhow::Result<Option<User>>>;
    fn create_user(&self, user: &NewUser) -> impl Future<Output = anyhow::Result<User>>;
    fn update_user(
        &self,
        id: i64,
        update: &UserUpdate,
    ) -> impl Future<Output = anyhow::Result<Option<User>>>;
    fn delete_user(&self, id: i64) -> impl Future<Output = anyhow::Result<bool>>;
}

/// Accounts created by `taskboard seed` on an empty board.
pub fn default_users() -> Vec<NewUser> {
    [
        (1, "admin", "Admin", "Admin", Role::Admin),
        (2, "anowak", "Adam", "Nowak", Role::Developer),
        (3, "pkowalski", "Paweł", "Kowalski", Role::Devops),
    ]
    .into_iter()
    .map(|(id, username, name, surname, role)| NewUser {
        id,
        username: username.to_string(),
        name: name.to_string(),
        surname: surname.to_string(),
        role,
        password: "admin".to_string(),
    })
    .collect()
}
