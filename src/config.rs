use crate::adapter::NatsSettings;
use crate::domain::{LabelValue, Labels};
use crate::error::DriverLogError;
use crate::logger::is_subject_token;
use clap::{Parser, ValueEnum};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Emits one log entry, or every line of stdin, for a conveyor driver run.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = "nats://localhost:4222")]
    pub nats_url: String,

    /// Run identifier (a random UUID is used when absent)
    #[arg(long, env = "CONVEYOR_RUN_ID")]
    pub run_id: Option<String>,

    /// Driver name, used as the last live subject token
    #[arg(long = "driver", env = "CONVEYOR_DRIVER_NAME")]
    pub driver_name: String,

    /// Pipeline the entries belong to
    #[arg(long, env = "CONVEYOR_PIPELINE")]
    pub pipeline: Option<String>,

    /// Client connection name reported to the server
    #[arg(long, env = "NATS_CONNECTION_NAME")]
    pub connection_name: Option<String>,

    /// Connect timeout in seconds
    #[arg(long, env = "NATS_CONNECT_TIMEOUT_SECS", default_value = "5")]
    pub connect_timeout_secs: u64,

    /// Log level for the tool's own diagnostics
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Label attached to every entry, as key=value (repeatable)
    #[arg(long = "label", value_name = "KEY=VALUE", value_parser = parse_label)]
    pub labels: Vec<(String, String)>,

    /// Forward stdin line by line
    #[arg(long)]
    pub stdin: bool,

    /// Message to emit
    pub message: Option<String>,
}

impl Config {
    pub fn validate(&self) -> Result<(), DriverLogError> {
        if self.nats_url.trim().is_empty() {
            return Err(DriverLogError::Config("NATS URL must not be empty".to_string()));
        }

        if let Some(run_id) = &self.run_id
            && !is_subject_token(run_id)
        {
            return Err(DriverLogError::Config(format!(
                "Run id '{run_id}' is not a valid subject token"
            )));
        }

        if !is_subject_token(&self.driver_name) {
            return Err(DriverLogError::Config(format!(
                "Driver name '{}' is not a valid subject token",
                self.driver_name
            )));
        }

        if self.connect_timeout_secs == 0 {
            return Err(DriverLogError::Config(
                "Connect timeout must be greater than 0".to_string(),
            ));
        }

        if self.message.is_none() && !self.stdin {
            return Err(DriverLogError::Config(
                "Nothing to emit: pass a message or --stdin".to_string(),
            ));
        }

        Ok(())
    }

    pub fn nats_settings(&self) -> NatsSettings {
        NatsSettings {
            url: self.nats_url.clone(),
            connection_name: self.connection_name.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    /// `--label` values with their types inferred.
    pub fn labels(&self) -> Labels {
        self.labels
            .iter()
            .map(|(key, raw)| (key.clone(), LabelValue::infer(raw)))
            .collect()
    }
}

fn parse_label(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("label key is empty in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
