use thiserror::Error;

use super::status::TaskStatus;
use super::task::LocalTask;

/// A workflow precondition that blocked a status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GuardViolation {
    #[error("media required")]
    MediaRequired,
    #[error("signature required")]
    SignatureRequired,
    #[error("checklist incomplete")]
    ChecklistIncomplete,
}

impl GuardViolation {
    pub fn user_message(self) -> &'static str {
        match self {
            GuardViolation::MediaRequired => {
                "Upload at least one photo before moving the task to review."
            }
            GuardViolation::SignatureRequired => {
                "A customer signature is required to complete the task."
            }
            GuardViolation::ChecklistIncomplete => {
                "Finish every checklist item before completing the task."
            }
        }
    }
}

pub fn has_media(task: &LocalTask) -> bool {
    !task.media_urls.is_empty()
}

pub fn has_signature(task: &LocalTask) -> bool {
    task.has_signature()
}

/// An empty checklist counts as complete.
pub fn checklist_complete(task: &LocalTask) -> bool {
    task.checklist.iter().all(|item| item.is_completed)
}

/// Entry guards for `next`. Only `inReview` and `completed` are guarded;
/// every other edge is unconditional.
pub fn check_transition(task: &LocalTask, next: TaskStatus) -> Result<(), GuardViolation> {
    match next {
        TaskStatus::InReview if !has_media(task) => Err(GuardViolation::MediaRequired),
        TaskStatus::Completed if !has_signature(task) => Err(GuardViolation::SignatureRequired),
        TaskStatus::Completed if !checklist_complete(task) => {
            Err(GuardViolation::ChecklistIncomplete)
        }
        _ => Ok(()),
    }
}
