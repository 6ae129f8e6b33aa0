use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use directories::ProjectDirs;
use clap::Parser;
use std::fs;
use tracing::{info, warn};
use toml;

/// Tuning knobs of the study scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Largest number of card ids fetched into a queue at once
    pub queue_limit: usize,
    /// Cap applied to counts shown in the deck list
    pub report_limit: usize,
    /// Upper bound of the random factor applied to learning delays
    pub learn_jitter: f64,
    /// Bury siblings when a card is answered instead of when it is shown
    pub bury_siblings_on_answer: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_limit: 50,
            report_limit: 1000,
            learn_jitter: 1.25,
            bury_siblings_on_answer: true,
        }
    }
}

/// Optional overrides for [`SchedulerConfig`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfigUpdate {
    #[serde(default)]
    pub queue_limit: Option<usize>,
    #[serde(default)]
    pub report_limit: Option<usize>,
    #[serde(default)]
    pub learn_jitter: Option<f64>,
    #[serde(default)]
    pub bury_siblings_on_answer: Option<bool>,
}

impl SchedulerConfig {
    pub fn apply_update(self, update: SchedulerConfigUpdate) -> Self {
        Self {
            queue_limit: update.queue_limit.unwrap_or(self.queue_limit),
            report_limit: update.report_limit.unwrap_or(self.report_limit),
            learn_jitter: update.learn_jitter.unwrap_or(self.learn_jitter),
            bury_siblings_on_answer: update.bury_siblings_on_answer.unwrap_or(self.bury_siblings_on_answer),
        }
    }

    /// Clamps values the scheduler cannot work with
    pub fn sanitized(mut self) -> Self {
        self.queue_limit = self.queue_limit.max(1);
        self.report_limit = self.report_limit.max(1);
        if !self.learn_jitter.is_finite() || self.learn_jitter < 1.0 {
            self.learn_jitter = 1.0;
        }
        self
    }
}

/// Configuration for the engram server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// URL for the database connection
    pub database_url: String,
    /// Address the HTTP server binds to
    pub listen_addr: String,
    /// Directory for rolling log files; no file logging when unset
    pub log_dir: Option<String>,
    /// Emit console logs as JSON lines
    pub json_logs: bool,
    pub scheduler: SchedulerConfig,
}

/// Update structure for Config with all fields optional
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigUpdate {
    /// Optional update for database URL
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub listen_addr: Option<String>,
    #[serde(default)]
    pub log_dir: Option<String>,
    #[serde(default)]
    pub json_logs: Option<bool>,
    /// Optional `[scheduler]` table
    #[serde(default)]
    pub scheduler: Option<SchedulerConfigUpdate>,
}

/// Command line arguments for the server
#[derive(Parser, Debug)]
#[clap(name = "engram", about = "A spaced repetition study server")]
pub struct CliArgs {
    /// Database URL
    #[clap(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Address to listen on, e.g. 127.0.0.1:3000
    #[clap(long, env = "ENGRAM_LISTEN_ADDR")]
    pub listen_addr: Option<String>,

    /// Directory for log files
    #[clap(long, env = "ENGRAM_LOG_DIR")]
    pub log_dir: Option<String>,

    /// Log as JSON lines
    #[clap(long, env = "ENGRAM_JSON_LOGS")]
    pub json_logs: Option<bool>,

    /// Bury siblings when a card is shown rather than when it is answered
    #[clap(long, env = "ENGRAM_BURY_ON_SHOW", default_value_t = false)]
    pub bury_on_show: bool,

    /// Debug mode
    #[clap(long, env = "ENGRAM_DEBUG", default_value_t = false)]
    pub debug: bool,
}

impl Config {
    /// Applies a config update to the current configuration
    pub fn apply_update(self, update: ConfigUpdate) -> Self {
        let scheduler = match update.scheduler {
            Some(scheduler) => self.scheduler.apply_update(scheduler),
            None => self.scheduler,
        };
        Self {
            database_url: update.database_url.unwrap_or(self.database_url),
            listen_addr: update.listen_addr.unwrap_or(self.listen_addr),
            log_dir: update.log_dir.or(self.log_dir),
            json_logs: update.json_logs.unwrap_or(self.json_logs),
            scheduler: scheduler.sanitized(),
        }
    }
}

/// Returns the base (default) configuration
pub fn base_config(config_path: Option<PathBuf>) -> Config {

    let database_url = config_path.as_ref().map_or("engram.db".to_string(), |path| path.join("engram.db").to_string_lossy().to_string());
    let log_dir = config_path.map(|path| path.join("logs").to_string_lossy().to_string());

    Config {
        database_url,
        listen_addr: "127.0.0.1:3000".to_string(),
        log_dir,
        json_logs: false,
        scheduler: SchedulerConfig::default(),
    }
}

/// Loads configuration from a TOML file
pub fn config_from_file(config_path: Option<PathBuf>) -> Result<ConfigUpdate, String> {
    let Some(config_path) = config_path else {
        return Ok(ConfigUpdate::default());
    };

    if !config_path.exists() {
        info!("Config file not found at {:?}, using defaults", config_path);
        return Ok(ConfigUpdate::default());
    }

    match fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str::<ConfigUpdate>(&content) {
            Ok(config) => {
                info!("Loaded configuration from {:?}", config_path);
                Ok(config)
            },
            Err(e) => {
                warn!("Failed to parse config file: {}", e);
                Err(format!("Failed to parse config file: {}", e))
            }
        },
        Err(e) => {
            warn!("Failed to read config file: {}", e);
            Err(format!("Failed to read config file: {}", e))
        }
    }
}

/// Loads configuration from command line arguments
pub fn config_from_args(args: CliArgs) -> ConfigUpdate {
    let scheduler = args.bury_on_show.then(|| SchedulerConfigUpdate {
        bury_siblings_on_answer: Some(false),
        ..SchedulerConfigUpdate::default()
    });
    ConfigUpdate {
        database_url: args.database_url,
        listen_addr: args.listen_addr,
        log_dir: args.log_dir,
        json_logs: args.json_logs,
        scheduler,
    }
}

/// The per-user configuration directory, if the platform has one
pub fn get_config_dir_path() -> Option<PathBuf> {
    match ProjectDirs::from("org", "engram", "engram") {
        Some(proj_dirs) => Some(PathBuf::from(proj_dirs.config_dir())),
        None => {
            warn!("Could not determine XDG config directory, skipping config file");
            None
        }
    }
}

/// Gets the complete configuration by combining defaults with
/// values from config file, environment variables, and command line arguments
/// in order of increasing precedence
pub fn get_config(args: CliArgs) -> Config {
    let config_path = get_config_dir_path().and_then(|path| {
        if !path.exists() {
            info!("Config path not found at {:?}, using defaults", path);
            None
        } else {
            Some(path)
        }
    });

    let base = base_config(config_path.clone());
    let config_file = config_path.map(|path| path.join("config.toml"));

    // Apply updates in order of increasing precedence
    let config = base
        .apply_update(config_from_file(config_file).unwrap_or_default())
        .apply_update(config_from_args(args));

    info!("Final configuration: database_url={}, listen_addr={}, queue_limit={}, report_limit={}",
          config.database_url, config.listen_addr, config.scheduler.queue_limit, config.scheduler.report_limit);

    config
}
