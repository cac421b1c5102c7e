use clap::Parser;
use clap::error::ErrorKind;
use std::path::PathBuf;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use taskboard_cli::cli::{Cli, Command, UserCommand, collect_overrides};
use taskboard_core::broadcast::ChannelBroadcaster;
use taskboard_core::config::{Config, load_config_with_fallback, merge_overrides};
use taskboard_core::error::AppError;
use taskboard_core::model::{ResolvedLogEntry, ResolvedTask, TaskDraft, TaskPatch, User};
use taskboard_core::storage::JsonStore;
use taskboard_core::storage::json_store::{STORE_ENV_VAR, default_store_path};
use taskboard_core::task_api::TaskCoordinator;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LOG_ENV_VAR: &str = "TASKBOARD_LOG";

type Board = TaskCoordinator<JsonStore, ChannelBroadcaster>;

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "title")]
    title: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "priority")]
    priority: String,
    #[tabled(rename = "assignee")]
    assignee: String,
    #[tabled(rename = "updated")]
    updated_at: String,
}

#[derive(Tabled)]
struct UserRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "email")]
    email: String,
}

#[derive(Tabled)]
struct LogRow {
    #[tabled(rename = "when")]
    created_at: String,
    #[tabled(rename = "who")]
    user: String,
    #[tabled(rename = "action")]
    action: String,
    #[tabled(rename = "task")]
    task: String,
}

fn timestamp(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}

fn assignee_label(task: &ResolvedTask) -> String {
    task.assigned_user
        .as_ref()
        .map(|user| user.name.clone())
        .unwrap_or_else(|| "-".to_string())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    let rendered =
        serde_json::to_string(value).map_err(|err| AppError::invalid_data(err.to_string()))?;
    println!("{rendered}");
    Ok(())
}

fn print_table<R: Tabled>(rows: Vec<R>, empty: &str) {
    if rows.is_empty() {
        println!("{empty}");
        return;
    }
    let mut table = Table::new(rows);
    table.with(Style::psql());
    println!("{table}");
}

fn print_task_plain(task: &ResolvedTask) {
    println!("id:          {}", task.id);
    println!("title:       {}", task.title);
    println!(
        "description: {}",
        task.description.as_deref().unwrap_or("-")
    );
    println!("status:      {}", task.status);
    println!("priority:    {}", task.priority);
    println!("assignee:    {}", assignee_label(task));
    println!("created:     {}", timestamp(task.created_at));
    println!("updated:     {}", timestamp(task.updated_at));
}

fn print_tasks_plain(tasks: &[ResolvedTask]) {
    let rows = tasks
        .iter()
        .map(|task| TaskRow {
            id: task.id.clone(),
            title: task.title.clone(),
            status: task.status.to_string(),
            priority: task.priority.to_string(),
            assignee: assignee_label(task),
            updated_at: timestamp(task.updated_at),
        })
        .collect();
    print_table::<TaskRow>(rows, "No tasks.");
}

fn print_users_plain(users: &[User]) {
    let rows = users
        .iter()
        .map(|user| UserRow {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
        })
        .collect();
    print_table::<UserRow>(rows, "No users.");
}

fn print_log_plain(entries: &[ResolvedLogEntry]) {
    let rows = entries
        .iter()
        .map(|entry| LogRow {
            created_at: timestamp(entry.created_at),
            user: entry
                .user
                .as_ref()
                .map(|user| user.name.clone())
                .unwrap_or_else(|| "-".to_string()),
            action: entry.action.clone(),
            task: entry
                .task
                .as_ref()
                .map(|task| task.title.clone())
                .or_else(|| entry.task_id.clone())
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    print_table::<LogRow>(rows, "No activity.");
}

fn store_path(config: &Config) -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(STORE_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }
    match config.store_path.as_ref() {
        Some(path) => Ok(path.clone()),
        None => default_store_path(),
    }
}

fn require_actor(actor: Option<&str>) -> Result<&str, AppError> {
    actor
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::invalid_input("acting user is required (use --as USER_ID)"))
}

fn run_command(board: &Board, cli: &Cli, config: &Config) -> Result<(), AppError> {
    let actor = cli.actor.as_deref().or(config.actor.as_deref());

    match &cli.command {
        Command::User { user } => match user {
            UserCommand::Add { name, email } => {
                let user = board.register_user(name, email)?;
                if cli.json {
                    print_json(&user)?;
                } else {
                    println!("Registered user: {} ({})", user.name, user.id);
                }
            }
            UserCommand::List => {
                let users = board.list_users()?;
                if cli.json {
                    print_json(&users)?;
                } else {
                    print_users_plain(&users);
                }
            }
        },
        Command::Add {
            title,
            description,
            assign,
            status,
            priority,
        } => {
            let title = match title {
                Some(value) if !value.trim().is_empty() => value.clone(),
                _ => return Err(AppError::invalid_input("title is required")),
            };
            let draft = TaskDraft {
                title,
                description: description.clone(),
                assigned_user: assign.clone(),
                status: *status,
                priority: *priority,
            };

            let task = board.create_task(require_actor(actor)?, draft)?;
            if cli.json {
                print_json(&task)?;
            } else {
                println!("Created task: {} ({})", task.title, task.id);
            }
        }
        Command::List => {
            let tasks = board.list_tasks()?;
            if cli.json {
                print_json(&tasks)?;
            } else {
                print_tasks_plain(&tasks);
            }
        }
        Command::Show { id } => {
            let task = board.get_task(id)?;
            if cli.json {
                print_json(&task)?;
            } else {
                print_task_plain(&task);
            }
        }
        Command::Update {
            id,
            title,
            description,
            clear_description,
            assign,
            unassign,
            status,
            priority,
            guard,
        } => {
            let patch = TaskPatch {
                title: title.clone(),
                description: if *clear_description {
                    Some(None)
                } else {
                    description.clone().map(Some)
                },
                assigned_user: if *unassign {
                    Some(None)
                } else {
                    assign.clone().map(Some)
                },
                status: *status,
                priority: *priority,
            };

            let task = board.update_task(require_actor(actor)?, id, patch, &guard.to_guard()?)?;
            if cli.json {
                print_json(&task)?;
            } else {
                println!(
                    "Updated task: {} ({}) at {}",
                    task.title,
                    task.id,
                    timestamp(task.updated_at)
                );
            }
        }
        Command::Delete { id, guard } => {
            let deletion = board.delete_task(require_actor(actor)?, id, &guard.to_guard()?)?;
            if cli.json {
                print_json(&deletion)?;
            } else {
                println!("Deleted task: {}", deletion.id);
            }
        }
        Command::SmartAssign { id, guard } => {
            let task = board.smart_assign(require_actor(actor)?, id, &guard.to_guard()?)?;
            if cli.json {
                print_json(&task)?;
            } else {
                println!(
                    "Assigned task: {} ({}) to {}",
                    task.title,
                    task.id,
                    assignee_label(&task)
                );
            }
        }
        Command::Log { limit } => {
            let entries = board.recent_activity(limit.unwrap_or(config.recent_log_limit()))?;
            if cli.json {
                print_json(&entries)?;
            } else {
                print_log_plain(&entries);
            }
        }
    }

    Ok(())
}

fn run(cli: &Cli, config: &Config) -> Result<(), AppError> {
    let broadcaster = ChannelBroadcaster::default();
    let mut events = broadcaster.subscribe();
    let board = TaskCoordinator::new(JsonStore::open(store_path(config)?), broadcaster);

    run_command(&board, cli, config)?;

    if cli.events {
        while let Ok(event) = events.try_recv() {
            print_json(&*event)?;
        }
    }

    Ok(())
}

fn report_error(err: &AppError, json: bool) {
    eprintln!("ERROR: {err}");
    if let Some(current) = err.conflict_state() {
        if json {
            let body = serde_json::json!({
                "message": err.message(),
                "serverTask": current,
            });
            println!("{body}");
        } else {
            eprintln!("Current server state:");
            eprintln!(
                "  {} | {} | {} | {} | updated {}",
                current.title,
                current.status,
                current.priority,
                assignee_label(current),
                timestamp(current.updated_at)
            );
            eprintln!("Re-run with --since {} or --force to overwrite.", timestamp(current.updated_at));
        }
    }
}

fn init_tracing(config: &Config) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| EnvFilter::new(config.log_level())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            let rendered = err.to_string();
            let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
            let message = first_line.strip_prefix("error: ").unwrap_or(first_line);
            eprintln!("ERROR: {}", AppError::invalid_input(message));
            std::process::exit(1);
        }
    };

    let overrides = match collect_overrides(&cli.config_override) {
        Ok(overrides) => overrides,
        Err(err) => {
            eprintln!("ERROR: {err}");
            std::process::exit(1);
        }
    };
    let loaded = load_config_with_fallback();
    let config = merge_overrides(&loaded.config, &overrides);

    init_tracing(&config);
    if let Some(err) = loaded.error {
        warn!(error = %err, "ignoring unreadable config file");
    }

    if let Err(err) = run(&cli, &config) {
        report_error(&err, cli.json);
        std::process::exit(1);
    }
}
