//! batsd - command-line client for a batsd metrics server.
//!
//! Reads connection settings from the config file, lets flags override
//! them, runs one query and prints the result to stdout.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use batsd_client::config::loader::ConfigLoader;
use batsd_client::config::{default, xdg};
use batsd_client::{logging, Client, ClientConfig};
use chrono::{DateTime, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};

/// Query a batsd metrics server
#[derive(Parser)]
#[command(name = "batsd")]
#[command(version, about = "Query a batsd metrics server")]
struct Cli {
    /// Configuration file (default: $XDG_CONFIG_HOME/batsd/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<String>,

    /// Server host
    #[arg(long, global = true)]
    host: Option<String>,

    /// Server port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Per-command timeout in milliseconds
    #[arg(
        long = "timeout",
        global = true,
        value_name = "MS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout_ms: Option<u64>,

    /// Retries after the first try
    #[arg(long, global = true, value_name = "N")]
    max_attempts: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands for the batsd CLI
#[derive(Subcommand)]
enum Commands {
    /// Check that the server answers
    Ping,
    /// List metric keys (timers expanded)
    Available,
    /// Print timestamp and value of each datapoint
    Stats(RangeArgs),
    /// Print the value of each datapoint
    Values(RangeArgs),
    /// Print the timestamp of each datapoint
    Timestamps(RangeArgs),
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Metric and time range for the range queries.
#[derive(Args, Debug)]
struct RangeArgs {
    /// Metric key, e.g. `gauges:cpu`
    metric: String,

    /// How far back to start, e.g. `15m`, `2h`, `1day`
    #[arg(
        long,
        value_parser = humantime::parse_duration,
        default_value = "1h",
        conflicts_with = "start"
    )]
    since: Duration,

    /// Start of the range in epoch seconds
    #[arg(long, value_name = "EPOCH")]
    start: Option<i64>,

    /// End of the range in epoch seconds (default: now)
    #[arg(long, value_name = "EPOCH")]
    end: Option<i64>,

    /// Print JSON instead of plain text
    #[arg(long)]
    json: bool,
}

impl RangeArgs {
    /// Resolves `(start, end)` relative to `now`.
    fn window(
        &self,
        now: DateTime<Utc>,
    ) -> Result<(DateTime<Utc>, Option<DateTime<Utc>>), String> {
        let start = match self.start {
            Some(secs) => epoch(secs)?,
            None => chrono::Duration::from_std(self.since)
                .ok()
                .and_then(|since| now.checked_sub_signed(since))
                .ok_or_else(|| format!("--since {:?} is out of range", self.since))?,
        };
        let end = self.end.map(epoch).transpose()?;
        Ok((start, end))
    }
}

/// Actions for the `config` subcommand.
#[derive(Subcommand)]
enum ConfigAction {
    /// Create default configuration file
    Init {
        /// Overwrite existing configuration (creates backup)
        #[arg(long)]
        force: bool,
    },
    /// Show configuration file path
    Path,
    /// Validate configuration file
    Validate,
}

impl Cli {
    fn config_path(&self) -> Option<PathBuf> {
        self.config.as_deref().map(xdg::expand_tilde)
    }

    /// Applies flag overrides on top of the file's `[server]` table.
    fn client_config(&self, mut base: ClientConfig) -> ClientConfig {
        if let Some(host) = &self.host {
            base.host = host.clone();
        }
        if let Some(port) = self.port {
            base.port = port;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            base.timeout_ms = timeout_ms;
        }
        if let Some(max_attempts) = self.max_attempts {
            base.max_attempts = max_attempts;
        }
        base
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config_path();

    if let Commands::Config { action } = &cli.command {
        return run_config_command(action, config_path.as_deref());
    }

    let config = match ConfigLoader::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(config.log.level.as_directive());

    let client_config = cli.client_config(config.server);
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run_query(&cli.command, client_config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("Error: {e}");
            let mut source = std::error::Error::source(&*e);
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

async fn run_query(command: &Commands, config: ClientConfig) -> Result<(), BoxError> {
    let mut client = Client::connect(config).await?;

    match command {
        Commands::Ping => println!("{}", client.ping().await?),
        Commands::Available => {
            for key in client.available().await? {
                println!("{key}");
            }
        }
        Commands::Stats(range) => {
            let (start, end) = range.window(Utc::now())?;
            let samples = client.stats(&range.metric, start, end).await?;
            if range.json {
                println!("{}", serde_json::to_string_pretty(&samples)?);
            } else {
                for sample in samples {
                    println!("{}\t{}", sample.timestamp.timestamp(), sample.value);
                }
            }
        }
        Commands::Values(range) => {
            let (start, end) = range.window(Utc::now())?;
            let values = client.values(&range.metric, start, end).await?;
            if range.json {
                println!("{}", serde_json::to_string(&values)?);
            } else {
                for value in values {
                    println!("{value}");
                }
            }
        }
        Commands::Timestamps(range) => {
            let (start, end) = range.window(Utc::now())?;
            let timestamps: Vec<i64> = client
                .timestamps(&range.metric, start, end)
                .await?
                .into_iter()
                .map(|t| t.timestamp())
                .collect();
            if range.json {
                println!("{}", serde_json::to_string(&timestamps)?);
            } else {
                for timestamp in timestamps {
                    println!("{timestamp}");
                }
            }
        }
        Commands::Config { .. } => {
            return Err("config commands do not query the server".into());
        }
    }
    Ok(())
}

fn run_config_command(action: &ConfigAction, path: Option<&Path>) -> ExitCode {
    let result = match action {
        ConfigAction::Init { force } => {
            let created = match path {
                Some(path) => {
                    default::create_default_config_at(path, *force).map(|()| path.to_path_buf())
                }
                None => default::create_default_config(*force),
            };
            created.map(|path| println!("Created configuration at {}", path.display()))
        }
        ConfigAction::Path => {
            let path = path.map(Path::to_path_buf).unwrap_or_else(xdg::config_path);
            println!("{}", path.display());
            Ok(())
        }
        ConfigAction::Validate => ConfigLoader::load(path).map(|config| {
            println!("Configuration is valid");
            println!("{config:#?}");
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Config error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn epoch(secs: i64) -> Result<DateTime<Utc>, String> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| format!("{secs} is not a valid epoch timestamp"))
}
