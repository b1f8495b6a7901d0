use crate::types::enums::DiffSide;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Comment {
    pub id: u32,
    pub start_line: u32,
    pub end_line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<DiffSide>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resolution_note: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolution_lines: Vec<u32>,
    #[serde(default)]
    pub carried_forward: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NewComment {
    pub start_line: u32,
    pub end_line: u32,
    #[serde(default)]
    pub side: Option<DiffSide>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UpdateComment {
    pub body: String,
}
