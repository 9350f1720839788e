//! CLI command implementations
//!
//! Every command except `init` follows the same boot sequence:
//! 1. Configuration load
//! 2. Store open (log replay)
//! 3. Clock resume from the newest stored timestamp
//! 4. Command execution
//!
//! Results are printed as one JSON object on stdout.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::{Config, StorageMode};
use crate::model::{EntityId, EntityKind, VersionId};
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::protocol::{Clock, EngineContext, SystemClock};
use crate::service::{FileStores, Services};

use super::args::{Cli, Command, CommentAction, PostAction, VersionTarget};
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    run_command(Cli::parse_args())
}

/// Run the appropriate command based on CLI args
pub fn run_command(cli: Cli) -> CliResult<()> {
    match cli.command {
        Command::Init { data_dir } => {
            let data = init(&cli.config, &data_dir)?;
            write_response(data)
        }
        command => {
            let config = Config::load(&cli.config)?;
            Logger::set_enabled(config.log_enabled);
            log_event_with_fields(
                Event::ConfigLoaded,
                &[("path", &cli.config.display().to_string())],
            );

            let services = boot(&config)?;
            let data = execute(&services, command)?;
            let failure = verify_failure(&data);
            write_response(data)?;
            match failure {
                Some(reason) => Err(CliError::verify_failed(reason)),
                None => Ok(()),
            }
        }
    }
}

/// Write a default configuration (unless one exists) and create the data
/// directory it names.
pub fn init(config_path: &Path, data_dir: &Path) -> CliResult<Value> {
    let config = if config_path.exists() {
        Config::load(config_path)?
    } else {
        let config = Config::new(data_dir.display().to_string());
        config.save(config_path)?;
        config
    };

    if config.storage == StorageMode::File {
        let data = config.data_path();
        if is_initialized(data) {
            return Err(CliError::already_initialized(data.display()));
        }
        fs::create_dir_all(data).map_err(|e| {
            CliError::io_error(format!("Failed to create directory {}: {}", data.display(), e))
        })?;
    }

    Ok(json!({
        "initialized": true,
        "config": config_path.display().to_string(),
        "data_dir": config.data_dir,
    }))
}

fn is_initialized(data_dir: &Path) -> bool {
    [EntityKind::Post, EntityKind::Comment]
        .iter()
        .any(|kind| data_dir.join(kind.log_file_name()).exists())
}

/// Open the stores named by `config` and wire the services.
pub fn boot(config: &Config) -> CliResult<Services> {
    match config.storage {
        StorageMode::Memory => Ok(Services::in_memory(context(config, None))),
        StorageMode::File => {
            let data_dir = config.data_path();
            if !data_dir.is_dir() {
                return Err(CliError::not_initialized(data_dir.display()));
            }
            let stores = FileStores::open(data_dir)?;
            let floor = stores.newest_timestamp()?;
            Ok(Services::durable(stores, context(config, floor)))
        }
    }
}

fn context(config: &Config, floor: Option<DateTime<Utc>>) -> EngineContext {
    let clock: Arc<dyn Clock> = match floor {
        Some(floor) => Arc::new(SystemClock::resuming_after(floor)),
        None => Arc::new(SystemClock::new()),
    };
    EngineContext::new(clock, config.actor_provider())
        .with_retry(config.retry_policy())
        .with_tombstone_policy(config.tombstone_policy)
}

/// Execute one non-init command and return its JSON result.
pub fn execute(services: &Services, command: Command) -> CliResult<Value> {
    match command {
        Command::Init { .. } => Err(CliError::config_error("init runs before boot")),
        Command::Post { action } => post(services, action),
        Command::Comment { action } => comment(services, action),
        Command::Version { target } => match target {
            VersionTarget::Post { version } => {
                to_json(&services.posts.find_version(VersionId::new(version))?)
            }
            VersionTarget::Comment { version } => {
                to_json(&services.comments.find_version(VersionId::new(version))?)
            }
        },
        Command::Verify => {
            let reports = services.verify()?;
            let ok = reports.iter().all(|r| r.is_ok());
            Ok(json!({ "ok": ok, "reports": reports }))
        }
    }
}

fn post(services: &Services, action: PostAction) -> CliResult<Value> {
    let posts = &services.posts;
    match action {
        PostAction::Create { content } => to_json(&posts.create(content)?),
        PostAction::Edit { id, content } => to_json(&posts.edit(EntityId::new(id), content)?),
        PostAction::Delete { id } => to_json(&posts.delete(EntityId::new(id))?),
        PostAction::Restore { id } => to_json(&posts.restore(EntityId::new(id))?),
        PostAction::Attach { id, comment_id } => {
            to_json(&posts.attach_comment(EntityId::new(id), EntityId::new(comment_id))?)
        }
        PostAction::Show { id } => to_json(&posts.find_one(EntityId::new(id))?),
        PostAction::List { include_deleted } => {
            if include_deleted {
                to_json(&posts.find_all_including_deleted()?)
            } else {
                to_json(&posts.find_all()?)
            }
        }
        PostAction::History { id } => to_json(&posts.find_all_versions(EntityId::new(id))?),
    }
}

fn comment(services: &Services, action: CommentAction) -> CliResult<Value> {
    let comments = &services.comments;
    match action {
        CommentAction::Create { content } => to_json(&comments.create(content)?),
        CommentAction::Edit { id, content } => to_json(&comments.edit(EntityId::new(id), content)?),
        CommentAction::Delete { id } => to_json(&comments.delete(EntityId::new(id))?),
        CommentAction::Restore { id } => to_json(&comments.restore(EntityId::new(id))?),
        CommentAction::Show { id } => to_json(&comments.find_one(EntityId::new(id))?),
        CommentAction::List { include_deleted } => {
            if include_deleted {
                to_json(&comments.find_all_including_deleted()?)
            } else {
                to_json(&comments.find_all()?)
            }
        }
        CommentAction::History { id } => to_json(&comments.find_all_versions(EntityId::new(id))?),
    }
}

fn to_json<T: Serialize>(value: &T) -> CliResult<Value> {
    Ok(serde_json::to_value(value)?)
}

fn verify_failure(data: &Value) -> Option<String> {
    if data.get("ok") != Some(&Value::Bool(false)) {
        return None;
    }
    data["reports"]
        .as_array()?
        .iter()
        .find_map(|r| r["violation"].as_str().map(str::to_string))
}
