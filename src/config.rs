//! Configuration management for RailYard
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (railyard.toml)
//! - Environment variables (RAILYARD__*)
//!
//! ## Example config file (railyard.toml):
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 3000
//! static_dir = "frontend"
//!
//! [executor]
//! output_dir = "output"
//! timeout_secs = 180
//! shell = "bash"
//!
//! [generator]
//! rails_command = "rails"
//! skip_test = true
//! setup_database = true
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RailyardConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Script execution settings
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Script generation settings
    #[serde(default)]
    pub generator: GeneratorConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory of static frontend assets served at `/`
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

/// Executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Where generated apps end up
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Wall-clock limit for one build script
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Interpreter the build script is handed to
    #[serde(default = "default_shell")]
    pub shell: String,
}

/// Script builder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Command used for `rails new` (e.g. `rails` or a wrapper script)
    #[serde(default = "default_rails_command")]
    pub rails_command: String,

    /// Pass `--skip-test` to `rails new`
    #[serde(default = "default_true")]
    pub skip_test: bool,

    /// Run `db:create` and `db:migrate` at the end of the script
    #[serde(default = "default_true")]
    pub setup_database: bool,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("frontend")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_timeout_secs() -> u64 {
    180
}

fn default_shell() -> String {
    "bash".to_string()
}

fn default_rails_command() -> String {
    "rails".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            timeout_secs: default_timeout_secs(),
            shell: default_shell(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            rails_command: default_rails_command(),
            skip_test: true,
            setup_database: true,
        }
    }
}

impl ExecutorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Output directory resolved against the current directory
    pub fn output_path(&self) -> PathBuf {
        if self.output_dir.is_absolute() {
            self.output_dir.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.output_dir)
        }
    }
}

impl ServerConfig {
    /// `host:port` for binding
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl RailyardConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = [
            "railyard.toml",
            ".railyard.toml",
            "config/railyard.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "railyard", "railyard") {
            let xdg_config = config_dir.config_dir().join("railyard.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (RAILYARD__SERVER__PORT=4000)
        builder = builder.add_source(
            Environment::with_prefix("RAILYARD")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
