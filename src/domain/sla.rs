use std::str::FromStr;

use time::{Duration, OffsetDateTime};

use super::status::TaskStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlaStatus {
    OnTime,
    DueSoon,
    Overdue,
}

impl SlaStatus {
    /// Completed tasks never raise a warning.
    pub fn classify(
        status: TaskStatus,
        sla_date: OffsetDateTime,
        now: OffsetDateTime,
        due_soon: Duration,
    ) -> Self {
        if status == TaskStatus::Completed {
            return SlaStatus::OnTime;
        }
        if sla_date <= now {
            return SlaStatus::Overdue;
        }
        if sla_date - now <= due_soon {
            return SlaStatus::DueSoon;
        }
        SlaStatus::OnTime
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SlaStatus::OnTime => "on_time",
            SlaStatus::DueSoon => "due_soon",
            SlaStatus::Overdue => "overdue",
        }
    }
}

impl FromStr for SlaStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "on_time" | "ontime" => Ok(SlaStatus::OnTime),
            "due_soon" | "duesoon" => Ok(SlaStatus::DueSoon),
            "overdue" => Ok(SlaStatus::Overdue),
            other => Err(format!(
                "unknown SLA status '{other}': expected on_time, due_soon or overdue"
            )),
        }
    }
}

/// Countdown shown next to due-soon and overdue tasks, e.g. `"3h 05m"`.
pub fn countdown_text(
    status: TaskStatus,
    sla_date: OffsetDateTime,
    now: OffsetDateTime,
    due_soon: Duration,
) -> Option<String> {
    match SlaStatus::classify(status, sla_date, now, due_soon) {
        SlaStatus::OnTime => None,
        SlaStatus::DueSoon => Some(hours_and_minutes(sla_date - now)),
        SlaStatus::Overdue => Some(format!("overdue {}", hours_and_minutes(now - sla_date))),
    }
}

/// When the deadline reminder should fire: `lead` before the SLA date.
pub fn reminder_fire_at(sla_date: OffsetDateTime, lead: Duration) -> OffsetDateTime {
    sla_date - lead
}

fn hours_and_minutes(interval: Duration) -> String {
    let minutes = interval.whole_minutes().max(0);
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::{countdown_text, reminder_fire_at, SlaStatus};
    use crate::domain::status::TaskStatus;
    use std::str::FromStr;
    use time::{Duration, OffsetDateTime};

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    #[test]
    fn classifies_relative_to_due_soon_threshold() {
        let day = Duration::hours(24);
        assert_eq!(
            SlaStatus::classify(TaskStatus::ToDo, now() + Duration::hours(30), now(), day),
            SlaStatus::OnTime
        );
        assert_eq!(
            SlaStatus::classify(TaskStatus::ToDo, now() + Duration::hours(24), now(), day),
            SlaStatus::DueSoon
        );
        assert_eq!(
            SlaStatus::classify(TaskStatus::ToDo, now(), now(), day),
            SlaStatus::Overdue
        );
    }

    #[test]
    fn completed_tasks_are_never_flagged() {
        assert_eq!(
            SlaStatus::classify(
                TaskStatus::Completed,
                now() - Duration::hours(5),
                now(),
                Duration::hours(24)
            ),
            SlaStatus::OnTime
        );
        assert!(countdown_text(
            TaskStatus::Completed,
            now() - Duration::hours(5),
            now(),
            Duration::hours(24)
        )
        .is_none());
    }

    #[test]
    fn countdown_formats_remaining_and_overdue_time() {
        let day = Duration::hours(24);
        let soon = now() + Duration::minutes(185);
        assert_eq!(
            countdown_text(TaskStatus::InProgress, soon, now(), day).as_deref(),
            Some("3h 05m")
        );

        let late = now() - Duration::minutes(65);
        assert_eq!(
            countdown_text(TaskStatus::InProgress, late, now(), day).as_deref(),
            Some("overdue 1h 05m")
        );

        let far = now() + Duration::hours(48);
        assert!(countdown_text(TaskStatus::InProgress, far, now(), day).is_none());
    }

    #[test]
    fn reminder_fires_one_lead_before_deadline() {
        let sla = now() + Duration::hours(2);
        assert_eq!(
            reminder_fire_at(sla, Duration::hours(1)),
            now() + Duration::hours(1)
        );
    }

    #[test]
    fn parses_filter_names() {
        assert_eq!(SlaStatus::from_str("due-soon"), Ok(SlaStatus::DueSoon));
        assert_eq!(SlaStatus::from_str("OVERDUE"), Ok(SlaStatus::Overdue));
        assert_eq!(SlaStatus::from_str("on time"), Ok(SlaStatus::OnTime));
        assert!(SlaStatus::from_str("late").is_err());
    }
}
