use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    database::{Document, Kind},
    libs::dser::{deser_empty_to_none, deserialize_datetime, deserialize_opt_datetime},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    Call,
    Email,
    Meeting,
    #[serde(rename = "Follow-up")]
    FollowUp,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskStatus {
    #[default]
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Cancelled,
}

/// 任务关联的对象，只是弱引用，不做级联
///
/// On the wire this is the pair `relatedTo` / `relatedId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "relatedTo", content = "relatedId")]
pub enum Related {
    Lead(String),
    Customer(String),
    Deal(String),
}

impl Related {
    pub fn id(&self) -> &str {
        match self {
            Related::Lead(id) | Related::Customer(id) | Related::Deal(id) => id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: TaskType,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(deserialize_with = "deserialize_datetime")]
    pub due_date: DateTime<Utc>,
    #[serde(flatten)]
    pub related: Related,
    pub assigned_to: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Task {
    const KIND: Kind = Kind::Task;
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<TaskType>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default, deserialize_with = "deserialize_opt_datetime")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub related: Option<Related>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    pub assigned_to: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<TaskType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(
        default,
        deserialize_with = "deserialize_opt_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub related: Option<Related>,
    #[serde(
        default,
        deserialize_with = "deser_empty_to_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_to: Option<String>,
}
