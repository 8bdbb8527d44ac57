//! Configuration options

use anyhow::{Context, Result};
use colored::Colorize;
use directories::{BaseDirs, ProjectDirs};
use once_cell::sync::Lazy;
use serde::{de, Deserialize, Serialize};
use std::{
    env,
    fs,
    path::{Path, PathBuf},
};

/// Configuration file name
const CONFIG_FILE: &str = "xdpy.yml";

/// Environment variables that force synchronous request processing
const SYNCHRONIZE_VARS: [&str; 2] = ["XDPY_SYNCHRONIZE", "SYNCHRONIZE"];

/// Environment variable carrying the startup notification id
const STARTUP_ID_VAR: &str = "DESKTOP_STARTUP_ID";

// =============== DisplaySettings ================ [[[

/// Settings consumed when opening a display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Display to connect to, `$DISPLAY` when unset
    pub display: Option<String>,

    /// Round trip after every request
    pub synchronize: bool,

    /// Use this scale for every window instead of the desktop setting
    #[serde(alias = "window-scale")]
    pub fixed_window_scale: Option<i32>,

    /// Use XSync counters when the server supports them
    #[serde(alias = "use-sync")]
    pub use_sync: bool,

    /// Use the XKB extension when the server supports it
    #[serde(alias = "use-xkb")]
    pub use_xkb: bool,

    /// Program name, written to `WM_CLASS`
    #[serde(alias = "program-name")]
    pub program_name: String,

    /// Program class, written to `WM_CLASS`
    #[serde(alias = "program-class")]
    pub program_class: String,

    /// Session management id, written to `SM_CLIENT_ID`
    #[serde(alias = "sm-client-id")]
    pub sm_client_id: Option<String>,

    /// Running in a sandbox with its own pid namespace; `_NET_WM_PID` is not
    /// written
    pub sandboxed: bool,

    /// Startup notification id
    #[serde(alias = "startup-id")]
    pub startup_id: Option<String>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            display:            None,
            synchronize:        false,
            fixed_window_scale: None,
            use_sync:           true,
            use_xkb:            true,
            program_name:       String::from(env!("CARGO_PKG_NAME")),
            program_class:      String::from("Xdpy"),
            sm_client_id:       None,
            sandboxed:          false,
            startup_id:         None,
        }
    }
}

impl DisplaySettings {
    /// Apply overrides from the environment
    #[must_use]
    pub fn with_env(mut self) -> Self {
        if SYNCHRONIZE_VARS.iter().any(|v| env::var_os(v).is_some()) {
            log::debug!("synchronous mode requested by the environment");
            self.synchronize = true;
        }
        if let Some(id) = env::var(STARTUP_ID_VAR).ok().filter(|id| !id.is_empty()) {
            self.startup_id = Some(id);
        }
        self
    }
}

// ]]] === DisplaySettings ===

// ================= LogSettings ================== [[[

/// Settings for the log backend of the binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Whether logs should be written to a file
    #[serde(alias = "log-to-file")]
    pub log_to_file: bool,

    /// The directory to write the log to
    #[serde(alias = "log-dir", deserialize_with = "deserialize_shellexpand")]
    pub log_dir: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            log_to_file: false,
            log_dir:     None,
        }
    }
}

// ]]] === LogSettings ===

// ==================== Config ==================== [[[

/// The configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Display settings
    #[serde(flatten)]
    pub display: DisplaySettings,

    /// Logging
    #[serde(flatten)]
    pub logging: LogSettings,
}

impl Config {
    /// Load the configuration file from a given path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("{}: {}", "Configuration path".bright_blue(), path.display());

        let file = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: '{}'", path.display()))?;
        Self::from_yaml(&file)
            .with_context(|| format!("failed to deserialize config file: '{}'", path.display()))
    }

    /// Parse a configuration
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).context("invalid configuration")
    }

    /// Load the default configuration file, falling back to the defaults if
    /// there is none
    pub fn load_default() -> Result<Self> {
        let path = match PROJECT_DIRS.as_ref() {
            Some(dirs) => dirs.config_dir().join(CONFIG_FILE),
            None => {
                log::warn!("could not determine the configuration directory");
                return Ok(Self::default());
            },
        };

        if path.is_file() {
            Self::load(path)
        } else {
            log::debug!("no configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}

// ]]] === Config ===

// ================ Project Dirs ================== [[[

/// The base [`XdpyDirs`]
pub static PROJECT_DIRS: Lazy<Option<XdpyDirs>> = Lazy::new(XdpyDirs::new);

/// Project directories relevant to `xdpy`
#[derive(Debug, Clone)]
pub struct XdpyDirs {
    /// User's `$XDG_CONFIG_HOME/xdpy` directory
    config_dir: PathBuf,
    /// User's `$XDG_DATA_HOME/xdpy` directory
    data_dir:   PathBuf,
}

impl XdpyDirs {
    /// Create a new [`XdpyDirs`]
    fn new() -> Option<Self> {
        Some(Self {
            config_dir: Self::get_dir("XDPY_CONFIG_DIR", "XDG_CONFIG_HOME", ".config")
                .or_else(|| get_project_dirs().map(|p| p.config_dir().to_path_buf()))?,
            data_dir:   Self::get_dir("XDPY_DATA_DIR", "XDG_DATA_HOME", ".local/share")
                .or_else(|| get_project_dirs().map(|p| p.data_dir().to_path_buf()))?,
        })
    }

    /// Resolve a directory from a custom variable, then the XDG variable,
    /// then `$HOME/<join>`
    fn get_dir(env_var: &str, var: &str, join: &str) -> Option<PathBuf> {
        env::var_os(env_var)
            .map(PathBuf::from)
            .filter(|p| p.is_absolute())
            .or_else(|| {
                env::var_os(var)
                    .map(PathBuf::from)
                    .filter(|p| p.is_absolute())
                    .or_else(|| BaseDirs::new().map(|p| p.home_dir().join(join)))
                    .map(|p| p.join(env!("CARGO_PKG_NAME")))
            })
    }

    /// Get configuration directory
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get local data directory
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// Get all user project directories
fn get_project_dirs() -> Option<ProjectDirs> {
    log::trace!("determining project default folders");
    ProjectDirs::from("com", "xdpy", "xdpy")
}

// ]]] === Project Dirs ===

/// [`Deserialize`] a path that may contain shell variables or `~`
#[allow(single_use_lifetimes)]
fn deserialize_shellexpand<'de, D>(d: D) -> Result<Option<PathBuf>, D::Error>
where
    D: de::Deserializer<'de>,
{
    let value = PathBuf::deserialize(d)?;

    let value = PathBuf::from(
        shellexpand::full(&value.to_string_lossy())
            .map_err(|e| {
                de::Error::invalid_value(
                    de::Unexpected::Str(value.to_string_lossy().as_ref()),
                    &e.to_string().as_str(),
                )
            })?
            .to_string(),
    );

    Ok(Some(value))
}
