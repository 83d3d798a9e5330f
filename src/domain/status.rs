use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskStatus {
    #[default]
    Planned,
    ToDo,
    InProgress,
    InReview,
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Planned,
        TaskStatus::ToDo,
        TaskStatus::InProgress,
        TaskStatus::InReview,
        TaskStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Planned => "planned",
            TaskStatus::ToDo => "toDo",
            TaskStatus::InProgress => "inProgress",
            TaskStatus::InReview => "inReview",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Planned => "Planned",
            TaskStatus::ToDo => "To do",
            TaskStatus::InProgress => "In progress",
            TaskStatus::InReview => "In review",
            TaskStatus::Completed => "Completed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed)
    }

    /// Statuses counted as "active" work on the summary card.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            TaskStatus::ToDo | TaskStatus::InProgress | TaskStatus::InReview
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ParseTaskStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        // Older clients stored the localized labels verbatim.
        let legacy = match trimmed {
            "Planlandı" => Some(TaskStatus::Planned),
            "Yapılacak" => Some(TaskStatus::ToDo),
            "Çalışmada" => Some(TaskStatus::InProgress),
            "Kontrol" => Some(TaskStatus::InReview),
            "Tamamlandı" => Some(TaskStatus::Completed),
            _ => None,
        };
        if let Some(status) = legacy {
            return Ok(status);
        }

        let normalized = trimmed.to_ascii_lowercase().replace(['-', '_', ' '], "");
        let status = match normalized.as_str() {
            "planned" => TaskStatus::Planned,
            "todo" => TaskStatus::ToDo,
            "inprogress" => TaskStatus::InProgress,
            "inreview" | "review" => TaskStatus::InReview,
            "completed" | "done" => TaskStatus::Completed,
            _ => {
                return Err(ParseTaskStatusError {
                    value: value.to_string(),
                });
            }
        };

        Ok(status)
    }
}

impl Serialize for TaskStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        TaskStatus::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid task status '{value}': expected one of {}", expected_statuses())]
pub struct ParseTaskStatusError {
    value: String,
}

fn expected_statuses() -> String {
    TaskStatus::ALL
        .iter()
        .map(|status| status.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
