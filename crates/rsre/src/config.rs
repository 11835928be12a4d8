use std::fs;
use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{HostError, Result};

/// Application name used for config, data and startup script paths.
pub const APP_NAME: &str = "rsre";

/// File name of the per-user startup script in the home directory.
pub const STARTUP_SCRIPT_NAME: &str = ".rsrerc";

/// Limits applied to the embedded engine. Zero means unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineLimits {
    /// Maximum number of operations a single evaluation may perform.
    pub max_operations: u64,
    /// Maximum call stack depth.
    pub max_call_levels: usize,
    /// Maximum expression nesting depth.
    pub max_expr_depth: usize,
    /// Maximum expression nesting depth inside functions.
    pub max_function_expr_depth: usize,
    /// Maximum size of any string value.
    pub max_string_size: usize,
    /// Maximum size of any array.
    pub max_array_size: usize,
    /// Maximum size of any map.
    pub max_map_size: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_operations: 0,
            max_call_levels: 64,
            max_expr_depth: 64,
            max_function_expr_depth: 32,
            max_string_size: 0,
            max_array_size: 0,
            max_map_size: 0,
        }
    }
}

/// Configuration for a script host instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Directory that relative script paths are resolved against
    #[serde(default = "default_asset_root")]
    pub asset_root: PathBuf,

    /// Startup script to load on construction (default: ~/.rsrerc)
    #[serde(default)]
    pub startup_script: Option<PathBuf>,

    /// Whether the startup script is loaded at all (default: true)
    #[serde(default = "default_load_startup_script")]
    pub load_startup_script: bool,

    /// Arguments exposed as `process::argv` (default: the process arguments)
    #[serde(default)]
    pub argv: Option<Vec<String>>,

    /// Engine limits
    #[serde(default)]
    pub limits: EngineLimits,
}

fn default_asset_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_load_startup_script() -> bool {
    true
}

impl Default for HostConfig {
    fn default() -> Self {
        Self::new(default_asset_root())
    }
}

impl HostConfig {
    /// Create a config with defaults for the given asset root.
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        Self {
            asset_root: asset_root.into(),
            startup_script: None,
            load_startup_script: true,
            argv: None,
            limits: EngineLimits::default(),
        }
    }

    /// Skip loading any startup script.
    pub fn without_startup_script(mut self) -> Self {
        self.load_startup_script = false;
        self
    }

    /// Load the given startup script instead of the per-user default.
    pub fn with_startup_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.startup_script = Some(path.into());
        self.load_startup_script = true;
        self
    }

    /// Set the arguments exposed as `process::argv`.
    pub fn with_argv(mut self, argv: Vec<String>) -> Self {
        self.argv = Some(argv);
        self
    }

    /// Set the engine limits.
    pub fn with_limits(mut self, limits: EngineLimits) -> Self {
        self.limits = limits;
        self
    }

    /// The startup script to load, if loading is enabled.
    pub fn startup_script_path(&self) -> Option<PathBuf> {
        if !self.load_startup_script {
            return None;
        }
        self.startup_script.clone().or_else(default_startup_script)
    }

    /// Default location of the config file (e.g. ~/.config/rsre/config.toml).
    pub fn config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load the config from the default location, falling back to defaults
    /// when no config file exists.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                debug!(target: "scripting", "No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load the config from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| HostError::io(path, e))?;
        let config = Self::from_toml(&content)?;
        info!(target: "scripting", "Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse a config from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| HostError::Config(e.to_string()))
    }

    /// Resolve a script path against the asset root unless it is absolute.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        resolve_path(&self.asset_root, path)
    }
}

/// Join `path` onto `root` unless `path` is already absolute.
pub fn resolve_path(root: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Per-project directories for config and data.
pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

/// The per-user startup script path (~/.rsrerc).
pub fn default_startup_script() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.home_dir().join(STARTUP_SCRIPT_NAME))
}
