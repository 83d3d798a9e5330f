use clap::Parser;
use time::Duration;

use taskflow::app::{App, AppError};
use taskflow::cli::{CheckSubcommands, Cli, Commands, MediaSubcommands, NewArgs};
use taskflow::clock::{Clock, SystemClock};
use taskflow::config::TaskFlowConfig;
use taskflow::domain::NewTask;
use taskflow::listing::TaskListFilter;
use taskflow::{logging, ui};

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = TaskFlowConfig::load(cli.config.as_deref())?;
    logging::init(&config.logging.filter);

    let app = App::open(&config, &cli.root, cli.db.as_deref())?;
    let synced = app.sync()?;

    match cli.command {
        Commands::New(args) => {
            let json = args.json;
            let task = app.create_task(new_task_fields(args)?)?;
            if json {
                print_json(&task)?;
            } else {
                println!("created {} {}", task.id, task.title);
            }
        }
        Commands::Ls(args) => {
            let filter = TaskListFilter {
                status: args.status,
                assignee: args.assignee,
                sla: args.sla,
                visible_to: None,
            };
            let tasks = app.list_tasks(&filter)?;
            if args.json {
                print_json(&tasks)?;
            } else {
                ui::print_task_list(&tasks, &filter);
            }
        }
        Commands::Show(args) => {
            let task = app.show_task(&args.id)?;
            if args.json {
                print_json(&task)?;
            } else {
                ui::print_task_detail(&task);
            }
        }
        Commands::Status(args) => {
            let change = app.set_status(&args.id, args.status)?;
            println!("updated {} -> {}", change.task.id, change.task.status);
            if let Some(path) = change.report_path {
                println!("report: {}", path.display());
            }
        }
        Commands::Sign(args) => {
            let url = app.sign(&args.id, &args.image)?;
            println!("signed {}: {}", args.id, url);
        }
        Commands::Unsign(args) => {
            app.unsign(&args.id)?;
            println!("removed signature from {}", args.id);
        }
        Commands::Media(args) => run_media(&app, args.command)?,
        Commands::Check(args) => run_check(&app, args.command)?,
        Commands::Rm(args) => {
            let id = app.delete_task(&args.id)?;
            println!("deleted {id}");
        }
        Commands::Sync(args) => {
            if args.json {
                print_json(&synced)?;
            } else {
                ui::print_sync_summary(&synced);
            }
        }
        Commands::Summary(args) => {
            let summary = app.summary()?;
            if args.json {
                print_json(&summary)?;
            } else {
                ui::print_summary(&summary, app.last_sync_at()?.as_deref());
            }
        }
        Commands::Reminders(args) => {
            let reminders = app.reminders()?;
            if args.json {
                print_json(&reminders)?;
            } else {
                ui::print_reminders(&reminders);
            }
        }
    }

    Ok(())
}

fn new_task_fields(args: NewArgs) -> Result<NewTask, AppError> {
    let sla_date = match (args.sla, args.due_in_hours) {
        (Some(sla), _) => sla,
        (None, Some(hours)) => SystemClock.now() + Duration::hours(hours),
        (None, None) => {
            return Err(AppError::InvalidArgument(
                "an SLA deadline is required (--sla or --due-in)".to_string(),
            ))
        }
    };
    let mut fields = NewTask::new(args.title, args.description, args.assigned_to, sla_date);
    fields.location = args.location;
    fields.priority = args.priority;
    fields.category = args.category;
    Ok(fields)
}

fn run_media(app: &App, command: MediaSubcommands) -> Result<(), AppError> {
    match command {
        MediaSubcommands::Add(args) => {
            let upload = app.add_media(&args.id, &args.files)?;
            for url in &upload.uploaded {
                println!("uploaded {url}");
            }
            if upload.failed > 0 {
                println!("{} upload(s) failed", upload.failed);
            }
            println!("{} photo(s) on {}", upload.media_urls.len(), args.id);
        }
        MediaSubcommands::Rm(args) => {
            let remaining = app.remove_media(&args.id, &args.url)?;
            println!("removed media; {} photo(s) remaining", remaining.len());
        }
    }
    Ok(())
}

fn run_check(app: &App, command: CheckSubcommands) -> Result<(), AppError> {
    match command {
        CheckSubcommands::Add(args) => {
            let item = app.add_checklist_item(&args.id, &args.text)?;
            println!("added checklist item {} {}", item.id, item.text);
        }
        CheckSubcommands::Rm(args) => {
            app.remove_checklist_item(&args.id, &args.item)?;
            println!("removed checklist item {}", args.item);
        }
        CheckSubcommands::Done(args) => {
            app.set_checklist_item_completed(&args.id, &args.item, true)?;
            println!("completed checklist item {}", args.item);
        }
        CheckSubcommands::Undo(args) => {
            app.set_checklist_item_completed(&args.id, &args.item, false)?;
            println!("reopened checklist item {}", args.item);
        }
    }
    Ok(())
}
