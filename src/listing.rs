use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::domain::{LocalTask, SlaStatus, TaskStatus, User};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskListFilter {
    pub status: Option<TaskStatus>,
    pub assignee: Option<String>,
    pub sla: Option<SlaStatus>,
    /// Restricts the list to what this user may see.
    pub visible_to: Option<User>,
}

impl TaskListFilter {
    /// Admins see every task; everyone else only the tasks assigned to them.
    pub fn for_user(user: &User) -> Self {
        Self {
            visible_to: Some(user.clone()),
            ..Self::default()
        }
    }
}

/// Reference point for SLA classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaWindow {
    pub now: OffsetDateTime,
    pub due_soon: Duration,
}

impl SlaWindow {
    pub fn classify(&self, task: &LocalTask) -> SlaStatus {
        SlaStatus::classify(task.status, task.sla_date, self.now, self.due_soon)
    }
}

/// Filters `tasks`, keeping their order.
pub fn apply_filters(
    tasks: Vec<LocalTask>,
    filter: &TaskListFilter,
    window: &SlaWindow,
) -> Vec<LocalTask> {
    let assignee = normalize_scalar(filter.assignee.as_deref());
    tasks
        .into_iter()
        .filter(|task| matches_filter(task, filter, assignee.as_deref(), window))
        .collect()
}

fn matches_filter(
    task: &LocalTask,
    filter: &TaskListFilter,
    assignee: Option<&str>,
    window: &SlaWindow,
) -> bool {
    if let Some(user) = filter.visible_to.as_ref() {
        if !user.is_admin() && !user.is_assignee(&task.assigned_to) {
            return false;
        }
    }

    if filter.status.is_some_and(|status| status != task.status) {
        return false;
    }

    if let Some(expected) = assignee {
        if task.assigned_to.trim().to_lowercase() != expected {
            return false;
        }
    }

    if let Some(expected) = filter.sla {
        return window.classify(task) == expected;
    }

    true
}

fn normalize_scalar(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Dashboard counters.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct TaskSummary {
    pub total: usize,
    /// Planned, not started.
    pub pending: usize,
    /// To do, in progress or in review.
    pub active: usize,
    pub completed: usize,
}

impl TaskSummary {
    pub fn from_tasks(tasks: &[LocalTask]) -> Self {
        tasks.iter().fold(Self::default(), |mut summary, task| {
            summary.total += 1;
            match task.status {
                TaskStatus::Planned => summary.pending += 1,
                TaskStatus::ToDo | TaskStatus::InProgress | TaskStatus::InReview => {
                    summary.active += 1
                }
                TaskStatus::Completed => summary.completed += 1,
            }
            summary
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{apply_filters, SlaWindow, TaskListFilter, TaskSummary};
    use crate::domain::{LocalTask, Role, SlaStatus, TaskStatus, User};
    use crate::testing::{at, local_task};
    use time::Duration;

    const NOW: i64 = 1_700_000_000;

    fn window() -> SlaWindow {
        SlaWindow {
            now: at(NOW),
            due_soon: Duration::hours(24),
        }
    }

    fn task(id: &str, status: TaskStatus, assigned_to: &str, sla_hours: i64) -> LocalTask {
        let mut task = local_task(id, at(NOW - 86_400));
        task.status = status;
        task.assigned_to = assigned_to.to_string();
        task.sla_date = at(NOW + sla_hours * 3_600);
        task
    }

    fn ids(tasks: &[LocalTask]) -> Vec<&str> {
        tasks.iter().map(|task| task.id.as_str()).collect()
    }

    fn user(role: Role) -> User {
        User {
            id: "u-1".to_string(),
            email: "ayse@example.com".to_string(),
            role,
            full_name: Some("Ayşe Yılmaz".to_string()),
        }
    }

    fn sample() -> Vec<LocalTask> {
        vec![
            task("T-1", TaskStatus::Planned, "Ayşe Yılmaz", 72),
            task("T-2", TaskStatus::InProgress, "mehmet@example.com", 5),
            task("T-3", TaskStatus::Completed, "ayse@example.com", -5),
            task("T-4", TaskStatus::ToDo, "Mehmet Kaya", -1),
        ]
    }

    #[test]
    fn empty_filter_keeps_everything_in_order() {
        let filtered = apply_filters(sample(), &TaskListFilter::default(), &window());
        assert_eq!(ids(&filtered), vec!["T-1", "T-2", "T-3", "T-4"]);
    }

    #[test]
    fn filters_by_status() {
        let filter = TaskListFilter {
            status: Some(TaskStatus::InProgress),
            ..TaskListFilter::default()
        };
        assert_eq!(ids(&apply_filters(sample(), &filter, &window())), vec!["T-2"]);
    }

    #[test]
    fn filters_by_assignee_case_insensitive() {
        let filter = TaskListFilter {
            assignee: Some(" MEHMET kaya ".to_string()),
            ..TaskListFilter::default()
        };
        assert_eq!(ids(&apply_filters(sample(), &filter, &window())), vec!["T-4"]);
    }

    #[test]
    fn filters_by_sla_state() {
        let overdue = TaskListFilter {
            sla: Some(SlaStatus::Overdue),
            ..TaskListFilter::default()
        };
        assert_eq!(ids(&apply_filters(sample(), &overdue, &window())), vec!["T-4"]);

        let due_soon = TaskListFilter {
            sla: Some(SlaStatus::DueSoon),
            ..TaskListFilter::default()
        };
        assert_eq!(ids(&apply_filters(sample(), &due_soon, &window())), vec!["T-2"]);
    }

    #[test]
    fn technicians_only_see_their_tasks() {
        let filter = TaskListFilter::for_user(&user(Role::Technician));
        assert_eq!(
            ids(&apply_filters(sample(), &filter, &window())),
            vec!["T-1", "T-3"]
        );

        let admin = TaskListFilter::for_user(&user(Role::Admin));
        assert_eq!(apply_filters(sample(), &admin, &window()).len(), 4);
    }

    #[test]
    fn summary_groups_statuses() {
        let mut tasks = sample();
        tasks.push(task("T-5", TaskStatus::InReview, "x", 10));
        assert_eq!(
            TaskSummary::from_tasks(&tasks),
            TaskSummary {
                total: 5,
                pending: 1,
                active: 3,
                completed: 1,
            }
        );
    }
}
