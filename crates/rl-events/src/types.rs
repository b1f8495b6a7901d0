use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EventRecord {
    pub id: String,
    pub at: DateTime<Utc>,
    pub body: ReviewEvent,
}

impl EventRecord {
    pub fn new(body: ReviewEvent) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            at: Utc::now(),
            body,
        }
    }

    /// Name used for the SSE `event:` field.
    pub fn kind(&self) -> &'static str {
        match self.body {
            ReviewEvent::EditDetected { .. } => "edit-detected",
            ReviewEvent::StateChanged { .. } => "state-changed",
            ReviewEvent::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ReviewEvent {
    EditDetected { pending_edits: u32 },
    StateChanged { review_round: u32 },
    Shutdown,
}
