// # copydogd - sync state operator tool
//
// Thin integration layer over copydog-core. It owns configuration loading,
// logging setup and the runtime; every state change goes through
// `copydog_core::Storage`.
//
// ## Commands
//
// - `status` (default): print the last read time of each service
// - `flush`: delete all sync state
// - `map-status <redmine_status_id> <trello_list_id>`: link a status and a list
// - `check`: validate configuration and store connectivity
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Store
// - `COPYDOG_STORE_TYPE`: Type of store (memory, file, redis)
// - `COPYDOG_STORE_PATH`: Path to the store file (for file store)
// - `COPYDOG_REDIS_URL`: Connection URL (for redis store)
//
// ### Clients
// - `COPYDOG_TRELLO_BOARD_ID`: Board new cards are created on
// - `COPYDOG_TRELLO_DEFAULT_LIST_ID`: List for unmapped statuses (optional)
// - `COPYDOG_REDMINE_PROJECT_ID`: Project new issues are created in
// - `COPYDOG_REDMINE_DEFAULT_STATUS_ID`: Status for unmapped lists (optional)
//
// ### Logging
// - `COPYDOG_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export COPYDOG_STORE_TYPE=file
// export COPYDOG_STORE_PATH=/var/lib/copydog/state.json
// export COPYDOG_TRELLO_BOARD_ID=5f1a2b
// export COPYDOG_REDMINE_PROJECT_ID=7
//
// copydogd map-status 1 5f1a2b-todo
// copydogd status
// ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use copydog_core::config::{ClientsConfig, RedmineClientConfig, TrelloClientConfig};
use copydog_core::{CopydogConfig, Mapper, Service, Storage, StoreConfig};
use std::env;
use std::process::ExitCode;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy)]
enum CopydogExitCode {
    /// Command completed
    Success = 0,
    /// Configuration error or bad arguments
    ConfigError = 1,
    /// Store or runtime failure
    RuntimeError = 2,
}

impl From<CopydogExitCode> for ExitCode {
    fn from(code: CopydogExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Operator tool for the copydog sync state store
#[derive(Parser, Debug)]
#[command(name = "copydogd")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Print the last read time of each service (default)
    Status,

    /// Delete all sync state
    Flush,

    /// Link a Redmine status and a Trello list in both directions
    MapStatus {
        /// Redmine status id
        redmine_status_id: String,

        /// Trello list id
        trello_list_id: String,
    },

    /// Validate configuration and store connectivity
    Check,
}

/// Environment configuration
struct Config {
    store_type: String,
    store_path: Option<String>,
    redis_url: Option<String>,
    trello_board_id: Option<String>,
    trello_default_list_id: Option<String>,
    redmine_project_id: Option<String>,
    redmine_default_status_id: Option<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        Self {
            store_type: env::var("COPYDOG_STORE_TYPE").unwrap_or_else(|_| "file".to_string()),
            store_path: env::var("COPYDOG_STORE_PATH").ok(),
            redis_url: env::var("COPYDOG_REDIS_URL").ok(),
            trello_board_id: env::var("COPYDOG_TRELLO_BOARD_ID").ok(),
            trello_default_list_id: env::var("COPYDOG_TRELLO_DEFAULT_LIST_ID").ok(),
            redmine_project_id: env::var("COPYDOG_REDMINE_PROJECT_ID").ok(),
            redmine_default_status_id: env::var("COPYDOG_REDMINE_DEFAULT_STATUS_ID").ok(),
            log_level: env::var("COPYDOG_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// Build the core configuration, checking store settings
    fn to_core(&self) -> Result<CopydogConfig> {
        let store = match self.store_type.as_str() {
            "memory" => StoreConfig::Memory,
            "file" => StoreConfig::File {
                path: self.store_path.clone().context(
                    "COPYDOG_STORE_PATH is required when COPYDOG_STORE_TYPE=file. \
                    Set it via: export COPYDOG_STORE_PATH=/var/lib/copydog/state.json",
                )?,
            },
            "redis" => StoreConfig::Redis {
                url: self.redis_url.clone().context(
                    "COPYDOG_REDIS_URL is required when COPYDOG_STORE_TYPE=redis. \
                    Set it via: export COPYDOG_REDIS_URL=redis://127.0.0.1:6379/0",
                )?,
            },
            other => anyhow::bail!(
                "COPYDOG_STORE_TYPE '{}' is not supported. \
                Supported types: memory, file, redis",
                other
            ),
        };
        store.validate()?;

        Ok(CopydogConfig {
            store,
            clients: ClientsConfig {
                redmine: RedmineClientConfig {
                    project_id: self.redmine_project_id.clone(),
                    default_status_id: self.redmine_default_status_id.clone(),
                },
                trello: TrelloClientConfig {
                    board_id: self.trello_board_id.clone(),
                    default_list_id: self.trello_default_list_id.clone(),
                },
            },
        })
    }

    fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            other => anyhow::bail!(
                "COPYDOG_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                other
            ),
        }
    }
}

fn main() -> ExitCode {
    let command = match Cli::try_parse() {
        Ok(cli) => cli.command.unwrap_or(Command::Status),
        Err(e) => {
            let _ = e.print();
            // --help and --version also arrive here
            return if e.use_stderr() {
                CopydogExitCode::ConfigError.into()
            } else {
                CopydogExitCode::Success.into()
            };
        }
    };

    let env_config = Config::from_env();
    let (config, log_level) = match env_config.to_core().and_then(|core| {
        let level = env_config.log_level()?;
        Ok((core, level))
    }) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return CopydogExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return CopydogExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return CopydogExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        match run(command, config).await {
            Ok(()) => CopydogExitCode::Success,
            Err(e) => {
                error!("{:#}", e);
                match e.downcast_ref::<copydog_core::Error>() {
                    Some(copydog_core::Error::MissingConfig(_) | copydog_core::Error::Config(_)) => {
                        CopydogExitCode::ConfigError
                    }
                    _ => CopydogExitCode::RuntimeError,
                }
            }
        }
    })
    .into()
}

/// Execute one command against the configured store
async fn run(command: Command, config: CopydogConfig) -> Result<()> {
    info!("Opening {} store", config.store.type_name());
    let storage = Storage::open(&config.store).await?;

    match command {
        Command::Status => {
            for service in Service::ALL {
                match storage.get_last_time_read(service).await? {
                    Some(time) => println!("{}: last read {}", service, time.to_rfc3339()),
                    None => println!("{}: never read", service),
                }
            }
        }
        Command::Flush => {
            let removed = storage.flush().await?;
            println!("Removed {} keys", removed);
        }
        Command::MapStatus {
            redmine_status_id,
            trello_list_id,
        } => {
            storage
                .set_list_or_status_id(&redmine_status_id, &trello_list_id)
                .await?;
            println!(
                "Mapped redmine status {} <-> trello list {}",
                redmine_status_id, trello_list_id
            );
        }
        Command::Check => {
            let mapper = Mapper::from_config(storage.clone(), &config)?;
            storage.get_last_time_read(Service::Redmine).await?;
            println!(
                "Configuration OK: board {}, project {}",
                mapper.config().trello_board_id,
                mapper.config().redmine_project_id
            );
        }
    }

    Ok(())
}
