use std::path::PathBuf;
use std::str::FromStr;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args, Parser, Subcommand};
use time::OffsetDateTime;

use crate::clock::parse_rfc3339;
use crate::domain::{SlaStatus, TaskStatus};

fn cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightGreen.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::BrightMagenta.on_default())
}

#[derive(Debug, Parser)]
#[command(name = "taskflow")]
#[command(bin_name = "taskflow")]
#[command(version)]
#[command(about = "Field task tracking with SLA deadlines, evidence and a synced local cache")]
#[command(styles = cli_styles())]
pub struct Cli {
    #[arg(
        short = 'c',
        long,
        env = "TASKFLOW_CONFIG",
        help = "TOML config file layered over the built-in defaults."
    )]
    pub config: Option<PathBuf>,

    #[arg(
        short = 'd',
        long,
        env = "TASKFLOW_DB_PATH",
        help = "Path to the local SQLite cache (overrides storage.db_path)."
    )]
    pub db: Option<PathBuf>,

    #[arg(
        short = 'C',
        long,
        env = "TASKFLOW_ROOT",
        default_value = ".",
        help = "Data root that relative storage paths resolve against."
    )]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Create a new task.")]
    New(NewArgs),
    #[command(about = "List tasks, newest first.")]
    Ls(ListArgs),
    #[command(about = "Show one task.")]
    Show(ShowArgs),
    #[command(about = "Move a task to another status, enforcing evidence guards.")]
    Status(StatusArgs),
    #[command(about = "Attach the customer signature image.")]
    Sign(SignArgs),
    #[command(about = "Remove the customer signature.")]
    Unsign(TaskIdArgs),
    #[command(about = "Manage task photos.")]
    Media(MediaArgs),
    #[command(about = "Manage checklist items.")]
    Check(CheckArgs),
    #[command(about = "Delete a task with its signature, media and reminder.")]
    Rm(TaskIdArgs),
    #[command(about = "Pull the remote collection into the local cache.")]
    Sync(JsonArgs),
    #[command(about = "Show task counts by stage.")]
    Summary(JsonArgs),
    #[command(about = "List scheduled deadline reminders.")]
    Reminders(JsonArgs),
}

#[derive(Debug, Args)]
#[command(about = "Create a new task.")]
pub struct NewArgs {
    #[arg(help = "Task title.")]
    pub title: String,

    #[arg(short = 'd', long = "desc", help = "Work description.")]
    pub description: String,

    #[arg(short = 'a', long = "assignee", help = "Technician full name or email.")]
    pub assigned_to: String,

    #[arg(
        short = 's',
        long,
        value_parser = parse_rfc3339,
        conflicts_with = "due_in_hours",
        required_unless_present = "due_in_hours",
        help = "SLA deadline as RFC3339, e.g. 2026-05-01T17:00:00Z."
    )]
    pub sla: Option<OffsetDateTime>,

    #[arg(long = "due-in", help = "SLA deadline as hours from now.")]
    pub due_in_hours: Option<i64>,

    #[arg(short = 'l', long, help = "Site or address.")]
    pub location: Option<String>,

    #[arg(short = 'p', long, help = "Priority label.")]
    pub priority: Option<String>,

    #[arg(long, help = "Category label.")]
    pub category: Option<String>,

    #[arg(long, help = "Print the created task as JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "List tasks.")]
pub struct ListArgs {
    #[arg(
        short = 's',
        long,
        value_parser = TaskStatus::from_str,
        help = "Only tasks in this status (planned, toDo, inProgress, inReview, completed)."
    )]
    pub status: Option<TaskStatus>,

    #[arg(short = 'a', long, help = "Only tasks assigned to this name or email.")]
    pub assignee: Option<String>,

    #[arg(
        long,
        value_parser = SlaStatus::from_str,
        help = "Only tasks in this SLA state (on_time, due_soon, overdue)."
    )]
    pub sla: Option<SlaStatus>,

    #[arg(long, help = "Print JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "Show one task.")]
pub struct ShowArgs {
    #[arg(help = "Task id or unique id prefix.")]
    pub id: String,

    #[arg(long, help = "Print JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "Change task status.")]
pub struct StatusArgs {
    #[arg(help = "Task id or unique id prefix.")]
    pub id: String,

    #[arg(value_parser = TaskStatus::from_str, help = "Target status.")]
    pub status: TaskStatus,
}

#[derive(Debug, Args)]
#[command(about = "Attach a signature.")]
pub struct SignArgs {
    #[arg(help = "Task id or unique id prefix.")]
    pub id: String,

    #[arg(help = "PNG image of the signature.")]
    pub image: PathBuf,
}

#[derive(Debug, Args)]
pub struct TaskIdArgs {
    #[arg(help = "Task id or unique id prefix.")]
    pub id: String,
}

#[derive(Debug, Args)]
pub struct JsonArgs {
    #[arg(long, help = "Print JSON output.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct MediaArgs {
    #[command(subcommand)]
    pub command: MediaSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum MediaSubcommands {
    #[command(about = "Upload one or more photos.")]
    Add(MediaAddArgs),
    #[command(about = "Delete one photo by its URL.")]
    Rm(MediaRmArgs),
}

#[derive(Debug, Args)]
pub struct MediaAddArgs {
    #[arg(help = "Task id or unique id prefix.")]
    pub id: String,

    #[arg(required = true, help = "JPEG files to upload.")]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Args)]
pub struct MediaRmArgs {
    #[arg(help = "Task id or unique id prefix.")]
    pub id: String,

    #[arg(help = "Media URL as shown by `taskflow show`.")]
    pub url: String,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    #[command(subcommand)]
    pub command: CheckSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum CheckSubcommands {
    #[command(about = "Append a checklist item.")]
    Add(CheckAddArgs),
    #[command(about = "Remove a checklist item.")]
    Rm(CheckItemArgs),
    #[command(about = "Mark a checklist item completed.")]
    Done(CheckItemArgs),
    #[command(about = "Mark a checklist item open again.")]
    Undo(CheckItemArgs),
}

#[derive(Debug, Args)]
pub struct CheckAddArgs {
    #[arg(help = "Task id or unique id prefix.")]
    pub id: String,

    #[arg(help = "Item text.")]
    pub text: String,
}

#[derive(Debug, Args)]
pub struct CheckItemArgs {
    #[arg(help = "Task id or unique id prefix.")]
    pub id: String,

    #[arg(help = "Item id, or its 1-based position in the checklist.")]
    pub item: String,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
