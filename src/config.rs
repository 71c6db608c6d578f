//! Viewer configuration.
//!
//! Handles loading, validating, and layering `canvas-viewer.toml`. Every key
//! is optional; a missing file means stock defaults.
//!
//! ## Precedence
//!
//! ```text
//! stock defaults  <  canvas-viewer.toml  <  CANVAS_BASE_DOMAIN  <  CLI flags
//! ```
//!
//! `CANVAS_BASE_DOMAIN` and `--canvas-base-domain` both take a comma-separated
//! list and replace `links.internal_domains` wholesale.
//!
//! ## Configuration Options
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 5001               # First port to try
//! port_search = 50          # How many ports to probe from `port`
//! skip_ports = [5000]       # Never bind these
//!
//! [links]
//! internal_domains = ["https://*.instructure.com"]
//!
//! [export]
//! courses_dir = "courses"
//! output_dir = "public"
//! ```
//!
//! Unknown keys are rejected so typos surface immediately:
//!
//! ```toml
//! [server]
//! prot = 8080  # Error: unknown field `prot`
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "canvas-viewer.toml";

/// Environment variable overriding `links.internal_domains`.
pub const BASE_DOMAIN_ENV: &str = "CANVAS_BASE_DOMAIN";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    /// Interactive viewer bind settings.
    pub server: ServerConfig,
    /// External link classification.
    pub links: LinksConfig,
    /// Static export locations.
    pub export: ExportConfig,
}

impl ViewerConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port must be non-zero".into()));
        }
        if self.server.port_search == 0 {
            return Err(ConfigError::Validation(
                "server.port_search must be at least 1".into(),
            ));
        }
        if self.links.internal_domains.iter().any(|d| d.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "links.internal_domains entries must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Replace the internal domains with a comma-separated override, if one
    /// is given. Blank overrides are ignored.
    pub fn override_domains(&mut self, list: Option<&str>) {
        if let Some(list) = list {
            let domains = parse_domain_list(list);
            if !domains.is_empty() {
                self.links.internal_domains = domains;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of consecutive ports to probe, starting at `port`.
    pub port_search: u16,
    pub skip_ports: Vec<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5001,
            port_search: 50,
            skip_ports: vec![5000],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinksConfig {
    /// Hosts considered part of the institution. `*.` prefixes match any
    /// subdomain.
    pub internal_domains: Vec<String>,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            internal_domains: vec!["https://*.instructure.com".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Directory of course exports (folders and `.zip`/`.imscc` archives).
    pub courses_dir: String,
    /// Where the static site is written. Recreated on every run.
    pub output_dir: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            courses_dir: "courses".to_string(),
            output_dir: "public".to_string(),
        }
    }
}

/// Split `a.edu, *.b.edu` into trimmed, non-empty entries.
pub fn parse_domain_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from)
        .collect()
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ViewerConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. `Ok(None)` if it does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<ViewerConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ViewerConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path` over stock defaults.
pub fn load_config(path: &Path) -> Result<ViewerConfig, ConfigError> {
    resolve_config(load_raw_config(path)?)
}

/// Returns a fully-commented stock `canvas-viewer.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Canvas Viewer Configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# The file is read from ./canvas-viewer.toml unless --config points elsewhere.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Interactive viewer
# ---------------------------------------------------------------------------
[server]
host = "127.0.0.1"

# First port to try. If it is taken, the next `port_search` ports are probed.
port = 5001
port_search = 50

# Ports that are never used, even when free.
skip_ports = [5000]

# ---------------------------------------------------------------------------
# External links
# ---------------------------------------------------------------------------
[links]
# Hosts that belong to your institution. Links to them are not reported as
# external. "*.example.edu" matches example.edu and every subdomain; a plain
# host also matches its "www." variant.
# Overridden by CANVAS_BASE_DOMAIN or --canvas-base-domain (comma-separated).
internal_domains = ["https://*.instructure.com"]

# ---------------------------------------------------------------------------
# Static export
# ---------------------------------------------------------------------------
[export]
# Course exports: folders with imsmanifest.xml, or .zip/.imscc archives
# (unpacked next to themselves on first run).
courses_dir = "courses"

# Output root. Deleted and recreated on every export.
output_dir = "public"
"##
}
