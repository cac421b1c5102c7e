use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use taskboard_core::config::ConfigOverrides;
use taskboard_core::error::AppError;
use taskboard_core::fingerprint::{ConcurrencyGuard, parse_fingerprint};
use taskboard_core::model::{TaskPriority, TaskStatus};

#[derive(Parser, Debug)]
#[command(name = "taskboard", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Id of the user performing the change
    #[arg(long = "as", value_name = "USER_ID", env = "TASKBOARD_ACTOR", global = true)]
    pub actor: Option<String>,

    /// Print the board events the command produced, one JSON object per line
    #[arg(long, global = true)]
    pub events: bool,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage board members
    ///
    /// Example: taskboard user add "Ada" ada@example.com
    User {
        #[command(subcommand)]
        user: UserCommand,
    },
    /// Create a task
    ///
    /// Example: taskboard add "Write spec" --priority high
    Add {
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Assignee user id (defaults to the acting user)
        #[arg(long = "assign", value_name = "USER_ID")]
        assign: Option<String>,
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        priority: Option<TaskPriority>,
    },
    /// List every task on the board
    List,
    /// Show details of a task
    ///
    /// Example: taskboard show 7c0e...
    Show { id: String },
    /// Change some fields of a task, leaving the rest untouched
    ///
    /// Example: taskboard update 7c0e... --status done --since 2025-12-20T10:00:00.250Z
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,
        #[arg(long)]
        clear_description: bool,
        #[arg(long = "assign", value_name = "USER_ID", conflicts_with = "unassign")]
        assign: Option<String>,
        #[arg(long)]
        unassign: bool,
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        priority: Option<TaskPriority>,
        #[command(flatten)]
        guard: GuardArgs,
    },
    /// Delete a task
    ///
    /// Example: taskboard delete 7c0e... --since 1766224800250
    Delete {
        id: String,
        #[command(flatten)]
        guard: GuardArgs,
    },
    /// Assign a task to the member with the fewest open tasks
    ///
    /// Example: taskboard smart-assign 7c0e...
    SmartAssign {
        id: String,
        #[command(flatten)]
        guard: GuardArgs,
    },
    /// Show recent activity, newest first
    ///
    /// Example: taskboard log --limit 5
    Log {
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Register a member
    Add { name: String, email: String },
    /// List members in roster order
    List,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GuardArgs {
    /// The task's updatedAt as you last saw it (RFC3339 or epoch milliseconds)
    #[arg(long = "since", value_name = "UPDATED_AT")]
    pub since: Option<String>,

    /// Apply the change even if the task moved on since you looked
    #[arg(long)]
    pub force: bool,
}

impl GuardArgs {
    pub fn to_guard(&self) -> Result<ConcurrencyGuard, AppError> {
        let client_updated_at = self.since.as_deref().map(parse_fingerprint).transpose()?;
        Ok(ConcurrencyGuard {
            client_updated_at,
            force: self.force,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    StorePath,
    Actor,
    LogLevel,
    RecentLogLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let value = value_raw.trim().to_string();
    let field =
        canonicalize_flag_name(key_raw).ok_or_else(|| "override key cannot be empty".to_string())?;

    let target = match field.as_str() {
        "store_path" | "store" => ConfigOverrideTarget::StorePath,
        "actor" => ConfigOverrideTarget::Actor,
        "log_level" => ConfigOverrideTarget::LogLevel,
        "recent_log_limit" => ConfigOverrideTarget::RecentLogLimit,
        other => return Err(format!("unknown config field '{other}'")),
    };

    if value.is_empty() {
        return Err(format!("{field} override requires a value"));
    }

    Ok(ParsedConfigOverride { target, value })
}

pub fn collect_overrides(raw: &[String]) -> Result<ConfigOverrides, AppError> {
    let mut overrides = ConfigOverrides::default();

    for entry in raw {
        let parsed = parse_config_override(entry).map_err(AppError::invalid_input)?;
        match parsed.target {
            ConfigOverrideTarget::StorePath => {
                overrides.store_path = Some(PathBuf::from(parsed.value));
            }
            ConfigOverrideTarget::Actor => overrides.actor = Some(parsed.value),
            ConfigOverrideTarget::LogLevel => overrides.log_level = Some(parsed.value),
            ConfigOverrideTarget::RecentLogLimit => {
                let limit = parsed.value.parse::<usize>().map_err(|_| {
                    AppError::invalid_input("recent_log_limit must be a positive number")
                })?;
                overrides.recent_log_limit = Some(limit);
            }
        }
    }

    Ok(overrides)
}

fn canonicalize_flag_name(name: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
