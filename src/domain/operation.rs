use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStage {
    Collect,
    Standardize,
    Dedup,
    Photos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Running,
    Succeeded,
    Failed,
    Retrying,
}

/// An audit row recording one attempt at one pipeline stage for one
/// entity, modeled on the teacher's dead-letter item lifecycle but kept
/// append-only rather than mutated in place, since every stage here is
/// meant to be independently replayable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    pub stage: OperationStage,
    pub status: OperationStatus,

    /// The job or entity this attempt applies to (collection job id, raw
    /// business id, business id, or photo id depending on stage).
    pub entity_id: Uuid,

    pub attempt: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Correlates this attempt back to the HTTP request or scheduler tick
    /// that triggered it, for tracing across the event bus.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Operation {
    pub fn start(stage: OperationStage, entity_id: Uuid, attempt: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            stage,
            status: OperationStatus::Running,
            entity_id,
            attempt,
            error_message: None,
            request_id: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn succeed(mut self) -> Self {
        self.status = OperationStatus::Succeeded;
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.status = OperationStatus::Failed;
        self.error_message = Some(message.into());
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}
