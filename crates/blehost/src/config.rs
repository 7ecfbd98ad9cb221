//! Host configuration and logging setup

use crate::address::BdAddr;
use crate::error::{Error, Result};
use log::LevelFilter;

/// Whether logging is on when `InitOptions::logging` is left unset
pub const DEFAULT_LOGGING_ENABLED: bool = false;

/// Level applied to every target when logging is enabled and no override
/// names it
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Level override for one log target, e.g. `blehost::session`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    pub name: String,
    pub level: LevelFilter,
}

impl LoggerConfig {
    pub fn new(name: impl Into<String>, level: LevelFilter) -> Self {
        Self {
            name: name.into(),
            level,
        }
    }

    /// Builds an override from a textual level (`"off"`, `"error"` ...
    /// `"trace"`, case-insensitive).
    pub fn parse(name: &str, level: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::Logging("empty logger name".into()));
        }
        let level = level
            .parse::<LevelFilter>()
            .map_err(|_| Error::Logging(format!("unknown level '{}' for {}", level, name)))?;
        Ok(Self::new(name, level))
    }
}

/// Options accepted by `Host::init`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitOptions {
    /// Turns logging on or off; `None` keeps `DEFAULT_LOGGING_ENABLED`
    pub logging: Option<bool>,
    pub loggers: Vec<LoggerConfig>,
}

impl InitOptions {
    pub fn logging_enabled(&self) -> bool {
        self.logging.unwrap_or(DEFAULT_LOGGING_ENABLED)
    }

    /// Most verbose level any target may log at under these options
    pub fn max_level(&self) -> LevelFilter {
        if !self.logging_enabled() {
            return LevelFilter::Off;
        }
        self.loggers
            .iter()
            .map(|logger| logger.level)
            .fold(DEFAULT_LOG_LEVEL, Ord::max)
    }

    /// Installs `env_logger` with these options. When a logger is already
    /// installed only the global maximum level is adjusted.
    pub fn apply(&self) {
        let mut builder = env_logger::Builder::new();
        if self.logging_enabled() {
            builder.filter_level(DEFAULT_LOG_LEVEL);
            for logger in &self.loggers {
                builder.filter_module(&logger.name, logger.level);
            }
        } else {
            builder.filter_level(LevelFilter::Off);
        }

        if builder.try_init().is_err() {
            log::set_max_level(self.max_level());
        }
    }
}

/// Host settings fixed at construction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostConfig {
    /// Static random address used when the controller has no public
    /// address. Generated when unset.
    pub static_address: Option<BdAddr>,
    /// Wipe all bonding records during `Host::init`
    pub clear_bondings: bool,
}
