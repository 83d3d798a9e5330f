pub mod guards;
pub mod sla;
pub mod status;
pub mod task;
pub mod user;

pub use guards::GuardViolation;
pub use sla::SlaStatus;
pub use status::{ParseTaskStatusError, TaskStatus};
pub use task::{ChecklistItem, LocalTask, NewTask, Task};
pub use user::{Role, User};
