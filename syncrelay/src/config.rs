//! Relay configuration, layered from four sources.
//!
//! Each setting takes the first value found in: command-line flags,
//! environment variables (through clap's `env` support), the TOML file at
//! `~/.config/syncrelay/config.toml` (or `--config`), and built-in defaults.
//!
//! ```toml
//! [server]
//! bind_addr = "127.0.0.1:9000"
//! max_message_size = 65536
//! unknown_session = "create"   # or "ignore"
//!
//! [log]
//! level = "debug"
//! file = "/var/log/syncrelay.log"
//! ```

use std::path::{Path, PathBuf};

use syncrelay_proto::message::MAX_MESSAGE_SIZE;

use crate::router::UnknownSessionPolicy;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:9000";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors that can occur when loading relay configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file exists but could not be read, or an explicit
    /// `--config` path is missing.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has an unknown value.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

/// On-disk config. Every key is optional so a file can set just one thing.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    server: ServerSection,
    log: LogSection,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ServerSection {
    bind_addr: Option<String>,
    max_message_size: Option<usize>,
    unknown_session: Option<UnknownSessionPolicy>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LogSection {
    level: Option<String>,
    file: Option<PathBuf>,
}

/// Command-line flags for the relay binary.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "SyncRelay session state relay")]
pub struct RelayCliArgs {
    /// Address to listen on.
    #[arg(short, long, env = "SYNCRELAY_ADDR")]
    pub bind: Option<String>,

    /// Config file to read instead of `~/.config/syncrelay/config.toml`.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Inbound frames larger than this many bytes are dropped.
    #[arg(long)]
    pub max_message_size: Option<usize>,

    /// What to do with a join or action naming an unknown session.
    #[arg(long, value_enum)]
    pub unknown_session: Option<UnknownSessionPolicy>,

    /// Log filter, e.g. `debug` or `syncrelay=trace`. `RUST_LOG` wins if set.
    #[arg(long, env = "SYNCRELAY_LOG")]
    pub log_level: Option<String>,

    /// Write logs to this file instead of stderr.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Settings the relay runs with after all layers are merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Listen address, e.g. `0.0.0.0:9000`.
    pub bind_addr: String,
    /// Largest accepted inbound frame, in bytes.
    pub max_message_size: usize,
    /// Handling of `join`/`action` for sessions that do not exist.
    pub unknown_session: UnknownSessionPolicy,
    /// Log filter directive.
    pub log_level: String,
    /// Log destination; `None` means stderr.
    pub log_file: Option<PathBuf>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_message_size: MAX_MESSAGE_SIZE,
            unknown_session: UnknownSessionPolicy::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_file: None,
        }
    }
}

impl RelayConfig {
    /// Reads the config file and merges it under the command-line flags.
    ///
    /// A missing file at the default location counts as empty. A missing
    /// file named with `--config` is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(cli: &RelayCliArgs) -> Result<Self, ConfigError> {
        let file = match cli.config.as_deref() {
            Some(path) => read_file(path)?,
            None => read_default_file()?,
        };
        Ok(Self::merge(cli, file))
    }

    fn merge(cli: &RelayCliArgs, file: FileConfig) -> Self {
        let FileConfig { server, log } = file;
        let mut config = Self::default();

        if let Some(addr) = cli.bind.clone().or(server.bind_addr) {
            config.bind_addr = addr;
        }
        if let Some(size) = cli.max_message_size.or(server.max_message_size) {
            config.max_message_size = size;
        }
        if let Some(policy) = cli.unknown_session.or(server.unknown_session) {
            config.unknown_session = policy;
        }
        if let Some(level) = cli.log_level.clone().or(log.level) {
            config.log_level = level;
        }
        config.log_file = cli.log_file.clone().or(log.file);

        config
    }
}

fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&contents)?)
}

fn read_default_file() -> Result<FileConfig, ConfigError> {
    let Some(dir) = dirs::config_dir() else {
        return Ok(FileConfig::default());
    };
    let path = dir.join("syncrelay").join("config.toml");
    match read_file(&path) {
        Err(ConfigError::ReadFile { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            Ok(FileConfig::default())
        }
        other => other,
    }
}
