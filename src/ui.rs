use std::io::{self, IsTerminal};

use crate::app::TaskView;
use crate::clock::format_rfc3339;
use crate::domain::TaskStatus;
use crate::listing::{TaskListFilter, TaskSummary};
use crate::notify::ReminderRequest;
use crate::sync::SyncSummary;

pub fn print_task_list(tasks: &[TaskView], filter: &TaskListFilter) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Tasks"));
    if let Some(summary) = filter_summary(filter) {
        println!("{}", palette.dim(&format!("filters: {summary}")));
    }

    if tasks.is_empty() {
        println!("{}", palette.dim("no tasks matched"));
        return;
    }

    for task in tasks {
        println!("{}", format_task_row(task, &palette));
    }
    println!("{}", palette.dim(&format!("{} task(s)", tasks.len())));
}

pub fn print_task_detail(task: &TaskView) {
    let palette = Palette::auto();
    println!(
        "{} {} {}",
        palette.id(&task.id),
        palette.status(task.status),
        task.title
    );
    println!("{}", task.description);
    println!("assigned to: {}", task.assigned_to);
    println!(
        "sla:         {} {}",
        format_rfc3339(task.sla_date),
        palette.sla(&task.sla, task.countdown.as_deref())
    );
    println!("created:     {}", format_rfc3339(task.created_at));
    for (label, value) in [
        ("location:   ", task.location.as_deref()),
        ("priority:   ", task.priority.as_deref()),
        ("category:   ", task.category.as_deref()),
    ] {
        if let Some(value) = value {
            println!("{label} {value}");
        }
    }
    println!(
        "signature:   {}",
        if task.has_signature { "captured" } else { "missing" }
    );

    if task.media_urls.is_empty() {
        println!("media:       {}", palette.dim("none"));
    } else {
        println!("media:");
        for url in &task.media_urls {
            println!("  {url}");
        }
    }

    if task.checklist.is_empty() {
        println!("checklist:   {}", palette.dim("empty"));
    } else {
        let (done, total) = task.checklist_progress();
        println!("checklist:   {done}/{total}");
        for (index, item) in task.checklist.iter().enumerate() {
            let mark = if item.is_completed { "x" } else { " " };
            println!(
                "  {}. [{mark}] {} {}",
                index + 1,
                item.text,
                palette.dim(&item.id)
            );
        }
    }
}

pub fn print_summary(summary: &TaskSummary, last_sync_at: Option<&str>) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Summary"));
    println!("total:     {}", summary.total);
    println!("pending:   {}", summary.pending);
    println!("active:    {}", summary.active);
    println!("completed: {}", summary.completed);
    if let Some(at) = last_sync_at {
        println!("{}", palette.dim(&format!("last sync: {at}")));
    }
}

pub fn print_reminders(reminders: &[ReminderRequest]) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Reminders"));
    if reminders.is_empty() {
        println!("{}", palette.dim("no reminders scheduled"));
        return;
    }
    for reminder in reminders {
        println!(
            "{} {} {}",
            format_rfc3339(reminder.fire_at),
            palette.id(&reminder.id),
            reminder.body
        );
    }
}

pub fn print_sync_summary(summary: &SyncSummary) {
    println!(
        "synced: received={} inserted={} updated={} skipped={} failed={}",
        summary.received, summary.inserted, summary.updated, summary.skipped, summary.failed
    );
}

fn format_task_row(task: &TaskView, palette: &Palette) -> String {
    let mut line = format!(
        "{} {} {} {}",
        palette.id(&task.id),
        palette.status(task.status),
        task.title,
        palette.assignee(&format!("@{}", task.assigned_to))
    );

    let sla = palette.sla(&task.sla, task.countdown.as_deref());
    if !sla.is_empty() {
        line.push(' ');
        line.push_str(&sla);
    }

    if !task.checklist.is_empty() {
        let (done, total) = task.checklist_progress();
        line.push(' ');
        line.push_str(&palette.dim(&format!("☑ {done}/{total}")));
    }

    line
}

fn filter_summary(filter: &TaskListFilter) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(status) = filter.status {
        parts.push(format!("status={status}"));
    }
    if let Some(assignee) = filter.assignee.as_deref().and_then(non_empty) {
        parts.push(format!("assignee={assignee}"));
    }
    if let Some(sla) = filter.sla {
        parts.push(format!("sla={}", sla.as_str()));
    }
    if let Some(user) = filter.visible_to.as_ref() {
        parts.push(format!("user={}", user.email));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn non_empty(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

struct Palette {
    enabled: bool,
}

impl Palette {
    fn auto() -> Self {
        let enabled = std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();
        Self { enabled }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn heading(&self, text: &str) -> String {
        self.paint("1;36", text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }

    fn id(&self, text: &str) -> String {
        self.paint("1;94", text)
    }

    fn status(&self, status: TaskStatus) -> String {
        let upper = status.as_str().to_ascii_uppercase();
        self.paint(status_color_code(status), &format!("[{upper}]"))
    }

    fn assignee(&self, text: &str) -> String {
        self.paint("90", text)
    }

    /// On-time tasks render nothing.
    fn sla(&self, sla: &str, countdown: Option<&str>) -> String {
        let code = match sla {
            "overdue" => "1;31",
            "due_soon" => "33",
            _ => return String::new(),
        };
        let text = match countdown {
            Some(countdown) => format!("({countdown})"),
            None => format!("({sla})"),
        };
        self.paint(code, &text)
    }
}

fn status_color_code(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Planned => "34",
        TaskStatus::ToDo => "36",
        TaskStatus::InProgress => "33",
        TaskStatus::InReview => "35",
        TaskStatus::Completed => "32",
    }
}
