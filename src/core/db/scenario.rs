use std::future::Future;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::core::db::model::{Priority, Status, double_option, next_id, now};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub priority: Priority,
    pub project_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub creation_date: OffsetDateTime,
    pub status: Status,
    pub owner_id: Option<i64>,
    #[serde(skip)]
    pub(crate) _guard: (),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewScenario {
    #[serde(default = "next_id")]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub priority: Priority,
    pub project_id: i64,
    #[serde(default = "now", with = "time::serde::rfc3339")]
    pub creation_date: OffsetDateTime,
    #[serde(default = "default_status")]
    pub status: Status,
    #[serde(default)]
    pub owner_id: Option<i64>,
}

fn default_status() -> Status {
    Status::Todo
}

impl NewScenario {
    pub fn new(
        project_id: i64,
        name: impl Into<String>,
        description: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            id: next_id(),
            name: name.into(),
            description: description.into(),
            priority,
            project_id,
            creation_date: now(),
            status: Status::Todo,
            owner_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub owner_id: Option<Option<i64>>,
}

pub trait ScenarioRepository {
    fn get_scenarios(&self) -> impl Future<Output = anyhow::Result<Vec<Scenario>>>;
    fn get_scenario(&self, id: i64) -> impl Future<Output = anyhow::Result<Option<Scenario>>>;
    fn get_scenarios_by_project_id(
        &self,
        project_id: i64,
    ) -> impl Future<Output = anyhow::Result<Vec<Scenario>>>;
    fn create_scenario(
        &self,
        scenario: &NewScenario,
    ) -> impl Future<Output = anyhow::Result<Scenario>>;
    fn update_scenario(
        &self,
        id: i64,
        update: &ScenarioUpdate,
    ) -> impl Future<Output = anyhow::Result<Option<Scenario>>>;
    fn delete_scenario(&self, id: i64) -> impl Future<Output = anyhow::Result<bool>>;
    /// Returns the number of removed scenarios.
    fn delete_scenarios_by_project_id(
        &self,
        project_id: i64,
    ) -> impl Future<Output = anyhow::Result<u64>>;
}
