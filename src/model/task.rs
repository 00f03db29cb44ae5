use serde::{Deserialize, Serialize};

/// What a planned task is about; used to find it again when its status changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    SymptomAnalysis,
    MedicationReview,
    LiteratureSearch,
    ConfirmatoryTests,
    Escalation,
    AlertReview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub task: TaskKind,
    pub content: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
}

impl Todo {
    pub fn pending(task: TaskKind, content: impl Into<String>, priority: TaskPriority) -> Self {
        Self {
            task,
            content: content.into(),
            status: TaskStatus::Pending,
            priority,
        }
    }
}
