//! Client configuration
//!
//! Settings are resolved in priority order:
//! 1. Command-line arguments (applied by the caller)
//! 2. Environment variables (`SCIDASH_*`)
//! 3. TOML config file (explicit path, else `<config_dir>/scidash/config.toml`)
//! 4. Built-in defaults
//!
//! A missing default config file is not an error; a missing or broken
//! explicit config file is. Validation runs once every layer is applied,
//! when the client is created.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Placeholder substituted with the upload file name
const FILENAME_SLOT: &str = "{filename}";

/// Connection settings for the SciDash service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Service root, without a trailing slash
    pub base_url: String,
    /// Login path appended to `base_url`
    pub auth_url: String,
    /// Upload path template appended to `base_url`; must contain `{filename}`
    pub upload_url: String,
    /// File name of the uploaded multipart part
    pub file_name: String,
    /// Per-request timeout in seconds; unset means wait for the server
    pub timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            auth_url: "/api/login/".to_string(),
            upload_url: "/api/upload/{filename}".to_string(),
            file_name: "score.json".to_string(),
            timeout_secs: None,
        }
    }
}

impl ClientConfig {
    /// Parse a TOML document; absent keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
    }

    /// Load a TOML config file
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_toml_str(&content)
    }

    /// Resolve file, environment and defaults.
    ///
    /// The result is not validated; command-line overrides still apply on top.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match explicit_path {
            Some(path) => Self::load_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load_file(&path)?,
                _ => {
                    warn!("No config file found, using built-in defaults");
                    Self::default()
                }
            },
        };

        config.apply_env();
        Ok(config)
    }

    /// Override settings from `SCIDASH_*` environment variables
    pub fn apply_env(&mut self) {
        let overrides: [(&str, &mut String); 4] = [
            ("SCIDASH_BASE_URL", &mut self.base_url),
            ("SCIDASH_AUTH_URL", &mut self.auth_url),
            ("SCIDASH_UPLOAD_URL", &mut self.upload_url),
            ("SCIDASH_FILE_NAME", &mut self.file_name),
        ];

        for (name, slot) in overrides {
            if let Ok(value) = std::env::var(name) {
                debug!(variable = name, "Config overridden from environment");
                *slot = value;
            }
        }
    }

    /// Check the settings a client cannot work without
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(Error::Config("base_url is empty".to_string()));
        }
        if self.base_url.ends_with('/') {
            return Err(Error::Config("Remove last slash from base_url".to_string()));
        }
        if !self.upload_url.contains(FILENAME_SLOT) {
            return Err(Error::Config(format!(
                "upload_url must contain {}: {}",
                FILENAME_SLOT, self.upload_url
            )));
        }
        if self.file_name.is_empty() {
            return Err(Error::Config("file_name is empty".to_string()));
        }
        Ok(())
    }

    /// Full login URL
    pub fn auth_endpoint(&self) -> String {
        format!("{}{}", self.base_url, self.auth_url)
    }

    /// Full upload URL with the file name filled in
    pub fn upload_endpoint(&self) -> String {
        format!(
            "{}{}",
            self.base_url,
            self.upload_url.replace(FILENAME_SLOT, &self.file_name)
        )
    }
}

/// Default config file location for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("scidash").join("config.toml"))
}

/// Host metadata recorded with every upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub build_info: String,
    pub hostname: Option<String>,
}

impl ClientOptions {
    pub fn with_build_info(mut self, build_info: impl Into<String>) -> Self {
        self.build_info = build_info.into();
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            build_info: default_build_info(),
            hostname: None,
        }
    }
}

/// Platform descriptor, e.g. `linux-x86_64/unix`
pub fn default_build_info() -> String {
    format!(
        "{}-{}/{}",
        std::env::consts::OS,
        std::env::consts::ARCH,
        std::env::consts::FAMILY
    )
}
