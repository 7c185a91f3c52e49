use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::source::CollectionJobKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub kind: CollectionJobKind,
    pub status: JobStatus,
    pub attempt: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub run_after: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(kind: CollectionJobKind, max_attempts: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind,
            status: JobStatus::Pending,
            attempt: 0,
            max_attempts,
            last_error: None,
            run_after: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Staggers a bulk batch of jobs so they don't all become ready in the
    /// same instant and overwhelm the worker pool's rate limiter.
    pub fn with_stagger(mut self, offset_millis: i64) -> Self {
        self.run_after = self.run_after + chrono::Duration::milliseconds(offset_millis);
        self
    }
}
