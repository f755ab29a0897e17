use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::core::db::model::next_id;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: String,
    #[serde(skip)]
    pub(crate) _guard: (),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    #[serde(default = "next_id")]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl NewProject {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: next_id(),
            name: name.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

pub trait ProjectRepository {
    fn get_projects(&self) -> impl Future<Output = anyhow::Result<Vec<Project>>>;
    fn get_project(&self, id: i64) -> impl Future<Output = anyhow::Result<Option<Project>>>;
    fn create_project(&self, project: &NewProject) -> impl Future<Output = anyhow::Result<Project>>;
    fn update_project(
        &self,
        id: i64,
        update: &ProjectUpdate,
    ) -> impl Future<Output = anyhow::Result<Option<Project>>>;
    fn delete_project(&self, id: i64) -> impl Future<Output = anyhow::Result<bool>>;
}
