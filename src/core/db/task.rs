use std::future::Future;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::core::db::model::{Priority, Status, double_option, next_id, now};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub scenario_id: i64,
    /// `None` while the task is unassigned.
    pub owner_id: Option<i64>,
    pub name: String,
    pub description: String,
    pub priority: Priority,
    pub status: Status,
    /// Estimate in hours.
    pub estimated_time: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub creation_date: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    #[serde(skip)]
    pub(crate) _guard: (),
}

impl Task {
    pub fn is_assigned(&self) -> bool {
        self.owner_id.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[serde(default = "next_id")]
    pub id: i64,
    pub scenario_id: i64,
    #[serde(default)]
    pub owner_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub priority: Priority,
    #[serde(default)]
    pub estimated_time: f64,
    #[serde(default = "now", with = "time::serde::rfc3339")]
    pub creation_date: OffsetDateTime,
}

impl NewTask {
    pub fn new(
        scenario_id: i64,
        name: impl Into<String>,
        description: impl Into<String>,
        priority: Priority,
        estimated_time: f64,
    ) -> Self {
        Self {
            id: next_id(),
            scenario_id,
            owner_id: None,
            name: name.into(),
            description: description.into(),
            priority,
            estimated_time,
            creation_date: now(),
        }
    }

    pub fn with_owner(mut self, owner_id: i64) -> Self {
        self.owner_id = Some(owner_id);
        self
    }
}

/// Partial task update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<i64>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub owner_id: Option<Option<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<f64>,
    #[serde(
        default,
        deserialize_with = "deserialize_date_update",
        serialize_with = "serialize_date_update",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_date: Option<Option<OffsetDateTime>>,
    #[serde(
        default,
        deserialize_with = "deserialize_date_update",
        serialize_with = "serialize_date_update",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_date: Option<Option<OffsetDateTime>>,
}

fn deserialize_date_update<'de, D>(
    deserializer: D,
) -> Result<Option<Option<OffsetDateTime>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    time::serde::rfc3339::option::deserialize(deserializer).map(Some)
}

fn serialize_date_update<S>(
    value: &Option<Option<OffsetDateTime>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    time::serde::rfc3339::option::serialize(&(*value).flatten(), serializer)
}

pub trait TaskRepository {
    fn get_tasks(&self) -> impl Future<Output = anyhow::Result<Vec<Task>>>;
    fn get_task(&self, id: i64) -> impl Future<Output = anyhow::Result<Option<Task>>>;
    fn get_tasks_by_scenario_id(
        &self,
        scenario_id: i64,
    ) -> impl Future<Output = anyhow::Result<Vec<Task>>>;
    fn create_task(&self, task: &NewTask) -> impl Future<Output = anyhow::Result<Task>>;
    fn update_task(
        &self,
        id: i64,
        update: &TaskUpdate,
    ) -> impl Future<Output = anyhow::Result<Option<Task>>>;
    fn delete_task(&self, id: i64) -> impl Future<Output = anyhow::Result<bool>>;
    /// Returns the number of removed tasks.
    fn delete_tasks_by_scenario_id(
        &self,
        scenario_id: i64,
    ) -> impl Future<Output = anyhow::Result<u64>>;
}
