//! Configuration for the FBFUSE master controller.
//!
//! Built-in defaults, an optional TOML file and `FBFUSE_*` environment
//! variables are layered with figment and translated to
//! `fbfuse_core::MasterConfig` plus the control server's listen address.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fbfuse_core::{AddressRange, BeamDefaults, MasterConfig};

const ENV_PREFIX: &str = "FBFUSE_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("configuration file not found: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub controller: ControllerSection,
}

/// Where the control server listens.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    5000
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllerSection {
    /// Skip every worker RPC.
    pub dummy: bool,
    pub max_channels: u32,
    pub groups_per_worker: u32,
    /// Output multicast block, e.g. `spead://239.11.1.0+255:7147`.
    pub multicast_range: String,
    pub worker_timeout_secs: u64,
    pub authority_timeout_secs: u64,
    pub target_poll_interval_ms: u64,
    pub sb_id: String,
    pub beam_defaults: BeamDefaultsSection,
}

impl Default for ControllerSection {
    fn default() -> Self {
        let core = MasterConfig::default();
        Self {
            dummy: core.dummy,
            max_channels: core.max_channels,
            groups_per_worker: core.groups_per_worker,
            multicast_range: core.multicast_range.to_string(),
            worker_timeout_secs: core.worker_timeout.as_secs(),
            authority_timeout_secs: core.authority_timeout.as_secs(),
            target_poll_interval_ms: millis(core.target_poll_interval),
            sb_id: core.sb_id,
            beam_defaults: BeamDefaultsSection::from(&core.beam_defaults),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BeamDefaultsSection {
    pub coherent_nbeams: u32,
    pub coherent_tscrunch: u32,
    pub coherent_fscrunch: u32,
    pub coherent_granularity: u32,
    pub incoherent_tscrunch: u32,
    pub incoherent_fscrunch: u32,
}

impl Default for BeamDefaultsSection {
    fn default() -> Self {
        Self::from(&BeamDefaults::default())
    }
}

impl From<&BeamDefaults> for BeamDefaultsSection {
    fn from(d: &BeamDefaults) -> Self {
        Self {
            coherent_nbeams: d.coherent_nbeams,
            coherent_tscrunch: d.coherent_tscrunch,
            coherent_fscrunch: d.coherent_fscrunch,
            coherent_granularity: d.coherent_granularity,
            incoherent_tscrunch: d.incoherent_tscrunch,
            incoherent_fscrunch: d.incoherent_fscrunch,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the default config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "mpifr", "fbfuse").map_or_else(
        || PathBuf::from("fbfuse.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the configuration.
///
/// With `path` the file must exist; without it the platform default is
/// used when present. Environment variables win over both, with `__`
/// separating sections (`FBFUSE_CONTROLLER__DUMMY=true`).
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let file = match path {
        Some(p) if !p.is_file() => {
            return Err(ConfigError::MissingFile {
                path: p.to_path_buf(),
            });
        }
        Some(p) => p.to_path_buf(),
        None => config_path(),
    };

    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&file))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;
    Ok(config)
}

impl Config {
    /// `host:port` for the control server.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate and translate to the core controller configuration.
    pub fn master_config(&self) -> Result<MasterConfig, ConfigError> {
        let c = &self.controller;

        if self.server.host.trim().is_empty() {
            return Err(invalid("server.host", "must not be empty"));
        }
        let multicast_range: AddressRange = c
            .multicast_range
            .parse()
            .map_err(|e| invalid("controller.multicast_range", format!("{e}")))?;
        if !multicast_range.is_multicast() {
            return Err(invalid(
                "controller.multicast_range",
                format!("{multicast_range} is not a multicast block"),
            ));
        }
        if c.max_channels == 0 {
            return Err(invalid("controller.max_channels", "must be positive"));
        }
        if c.groups_per_worker == 0 {
            return Err(invalid("controller.groups_per_worker", "must be positive"));
        }
        for (field, secs) in [
            ("controller.worker_timeout_secs", c.worker_timeout_secs),
            ("controller.authority_timeout_secs", c.authority_timeout_secs),
            ("controller.target_poll_interval_ms", c.target_poll_interval_ms),
        ] {
            if secs == 0 {
                return Err(invalid(field, "must be positive"));
            }
        }

        let b = &c.beam_defaults;
        for (field, value) in [
            ("controller.beam_defaults.coherent_nbeams", b.coherent_nbeams),
            ("controller.beam_defaults.coherent_tscrunch", b.coherent_tscrunch),
            ("controller.beam_defaults.coherent_fscrunch", b.coherent_fscrunch),
            ("controller.beam_defaults.coherent_granularity", b.coherent_granularity),
            ("controller.beam_defaults.incoherent_tscrunch", b.incoherent_tscrunch),
            ("controller.beam_defaults.incoherent_fscrunch", b.incoherent_fscrunch),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be positive"));
            }
        }

        Ok(MasterConfig {
            dummy: c.dummy,
            max_channels: c.max_channels,
            groups_per_worker: c.groups_per_worker,
            multicast_range,
            worker_timeout: Duration::from_secs(c.worker_timeout_secs),
            authority_timeout: Duration::from_secs(c.authority_timeout_secs),
            target_poll_interval: Duration::from_millis(c.target_poll_interval_ms),
            sb_id: c.sb_id.clone(),
            beam_defaults: BeamDefaults {
                coherent_nbeams: b.coherent_nbeams,
                coherent_tscrunch: b.coherent_tscrunch,
                coherent_fscrunch: b.coherent_fscrunch,
                coherent_granularity: b.coherent_granularity,
                incoherent_tscrunch: b.incoherent_tscrunch,
                incoherent_fscrunch: b.incoherent_fscrunch,
            },
        })
    }
}
