//! Server configuration: defaults plus the one-directive-per-line
//! config file.
//!
//! Lines are whitespace-tokenized; `#` starts a comment. Any unknown
//! directive or wrong argument count is fatal with a line-numbered
//! diagnostic — a server running with half a config is worse than one
//! that refuses to start.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use cinder_core::{default_save_rules, SaveRule};
use thiserror::Error;

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 6379;
/// Default client idle timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
/// Default number of logical databases.
pub const DEFAULT_DATABASES: usize = 16;

/// Log verbosity, as named by the `loglevel` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Notice,
    Warning,
}

impl LogLevel {
    /// The `tracing` level filter this verbosity maps to.
    pub fn as_tracing(self) -> tracing::Level {
        match self {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Notice => tracing::Level::INFO,
            LogLevel::Warning => tracing::Level::WARN,
        }
    }
}

/// Complete server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Listen address; the default binds every interface.
    pub bind: String,
    /// Client idle timeout in seconds.
    pub timeout: u64,
    pub save_rules: Vec<SaveRule>,
    pub log_level: LogLevel,
    /// `None` logs to stdout.
    pub log_file: Option<PathBuf>,
    /// Number of logical databases.
    pub databases: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: "0.0.0.0".to_string(),
            timeout: DEFAULT_TIMEOUT_SECS,
            save_rules: default_save_rules(),
            log_level: LogLevel::Notice,
            log_file: None,
            databases: DEFAULT_DATABASES,
        }
    }
}

/// A fatal problem with the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't open config file: {0}")]
    Io(#[from] io::Error),

    /// A bad directive, with the line it came from.
    #[error("error in config file at line {line}: {message}")]
    Directive { line: usize, message: String },
}

fn bad(line: usize, message: impl Into<String>) -> ConfigError {
    ConfigError::Directive {
        line,
        message: message.into(),
    }
}

impl Config {
    /// Parses a config file, applying directives over the defaults.
    ///
    /// `dir` takes effect immediately (the process chdirs), so the
    /// snapshot file lands where the operator pointed.
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        let text = fs::read_to_string(path)?;

        // the first `save` directive replaces the default rules
        let mut saw_save = false;

        for (lineno, raw) in text.lines().enumerate() {
            let lineno = lineno + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let args: Vec<&str> = line.split_whitespace().collect();
            match (args[0], args.len()) {
                ("timeout", 2) => {
                    config.timeout = args[1]
                        .parse()
                        .ok()
                        .filter(|&t| t >= 1)
                        .ok_or_else(|| bad(lineno, "invalid timeout value"))?;
                }
                ("port", 2) => {
                    config.port = args[1]
                        .parse()
                        .ok()
                        .filter(|&p| p >= 1)
                        .ok_or_else(|| bad(lineno, "invalid port"))?;
                }
                ("bind", 2) => {
                    config.bind = args[1].to_string();
                }
                ("save", 3) => {
                    let seconds: u64 = args[1]
                        .parse()
                        .ok()
                        .filter(|&s| s >= 1)
                        .ok_or_else(|| bad(lineno, "invalid save parameters"))?;
                    let changes: u64 = args[2]
                        .parse()
                        .map_err(|_| bad(lineno, "invalid save parameters"))?;
                    if !saw_save {
                        config.save_rules.clear();
                        saw_save = true;
                    }
                    config.save_rules.push(SaveRule::new(seconds, changes));
                }
                ("dir", 2) => {
                    std::env::set_current_dir(args[1])
                        .map_err(|e| bad(lineno, format!("can't chdir to '{}': {e}", args[1])))?;
                }
                ("loglevel", 2) => {
                    config.log_level = match args[1] {
                        "debug" => LogLevel::Debug,
                        "notice" => LogLevel::Notice,
                        "warning" => LogLevel::Warning,
                        _ => {
                            return Err(bad(
                                lineno,
                                "invalid log level, must be one of debug, notice, warning",
                            ))
                        }
                    };
                }
                ("logfile", 2) => {
                    config.log_file = if args[1] == "stdout" {
                        None
                    } else {
                        let path = PathBuf::from(args[1]);
                        // prove we can append now; failing later, with
                        // logging already wired to the file, helps nobody
                        fs::OpenOptions::new()
                            .create(true)
                            .append(true)
                            .open(&path)
                            .map_err(|e| bad(lineno, format!("can't open the log file: {e}")))?;
                        Some(path)
                    };
                }
                ("databases", 2) => {
                    config.databases = args[1]
                        .parse()
                        .ok()
                        .filter(|&n| n >= 1)
                        .ok_or_else(|| bad(lineno, "invalid number of databases"))?;
                }
                _ => {
                    return Err(bad(
                        lineno,
                        "bad directive or wrong number of arguments",
                    ))
                }
            }
        }

        Ok(config)
    }
}
