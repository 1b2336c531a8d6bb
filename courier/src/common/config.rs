/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use std::fmt;
use std::path::Path;
use std::time::Duration;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Which side of a process link this bus sits on.
///
/// Supplied by the caller, never inferred from the running process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusRole {
    /// The process that attaches worker peers.
    #[default]
    Coordinator,
    /// A process attached to a coordinator.
    Worker,
}

impl fmt::Display for BusRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coordinator => f.write_str("coordinator"),
            Self::Worker => f.write_str("worker"),
        }
    }
}

/// Configuration for a Courier bus.
///
/// Loaded from TOML in XDG-compliant locations, with every field defaulted:
///
/// ```toml
/// role = "worker"
///
/// [timeouts]
/// request_timeout_ms = 15000
///
/// [limits]
/// max_frame_size = 16777216
/// outbound_buffer = 256
///
/// [defaults]
/// reply_infix = ":reply:"
/// reply_suffix_len = 16
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Role of the process owning the bus.
    pub role: BusRole,
    /// Timeout configuration
    pub timeouts: TimeoutConfig,
    /// Limits and capacity configuration
    pub limits: LimitsConfig,
    /// Default values configuration
    pub defaults: DefaultsConfig,
}

/// Timeout-related configuration values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for waiting dispatches that do not set their own, in milliseconds
    pub request_timeout_ms: u64,
}

/// Limits and capacity configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest link frame a stream transport reads or writes, in bytes
    pub max_frame_size: usize,
    /// Envelopes a stream transport queues before `send` starts failing
    pub outbound_buffer: usize,
}

/// Default configuration values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Text placed between the origin channel and the random suffix of a return channel
    pub reply_infix: String,
    /// Length of the random return-channel suffix
    pub reply_suffix_len: usize,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 15_000,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024,
            outbound_buffer: 256,
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            reply_infix: ":reply:".to_string(),
            reply_suffix_len: 16,
        }
    }
}

impl BusConfig {
    /// Convert the default request timeout to a `Duration`
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.request_timeout_ms)
    }

    /// Returns a copy of this configuration with `role` replaced.
    #[must_use]
    pub fn with_role(mut self, role: BusRole) -> Self {
        self.role = role;
        self
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML error if the text is malformed or a field has the wrong type.
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    /// Loads configuration from an explicit file, falling back to defaults.
    ///
    /// Read and parse failures are logged and yield the default configuration.
    pub fn load_from(path: &Path) -> Self {
        info!("Loading configuration from: {}", path.display());
        match std::fs::read_to_string(path) {
            Ok(config_str) => match Self::from_toml_str(&config_str) {
                Ok(config) => {
                    info!("Successfully loaded configuration");
                    config
                }
                Err(e) => {
                    error!("Failed to parse configuration file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                error!("Failed to read configuration file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load configuration from XDG-compliant locations
    ///
    /// Looks for `courier/config.toml` under `$XDG_CONFIG_HOME` (then the XDG
    /// fallbacks). If no file is found, or it cannot be read or parsed, the
    /// default configuration is returned.
    pub fn load() -> Self {
        let xdg_dirs = match xdg::BaseDirectories::with_prefix("courier") {
            Ok(dirs) => dirs,
            Err(e) => {
                error!("Failed to initialize XDG directories: {}", e);
                return Self::default();
            }
        };

        match xdg_dirs.find_config_file("config.toml") {
            Some(path) => Self::load_from(&path),
            None => {
                info!("No configuration file found, using defaults");
                Self::default()
            }
        }
    }
}

lazy_static! {
    /// Global configuration instance loaded from XDG-compliant locations
    pub static ref CONFIG: BusConfig = BusConfig::load();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = BusConfig::default();
        assert_eq!(config.role, BusRole::Coordinator);
        assert_eq!(config.request_timeout(), Duration::from_millis(15_000));
        assert_eq!(config.limits.max_frame_size, 16 * 1024 * 1024);
        assert_eq!(config.defaults.reply_infix, ":reply:");
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config = BusConfig::from_toml_str(
            r#"
            role = "worker"

            [timeouts]
            request_timeout_ms = 250
            "#,
        )
        .expect("valid toml");
        assert_eq!(config.role, BusRole::Worker);
        assert_eq!(config.request_timeout(), Duration::from_millis(250));
        assert_eq!(config.limits, LimitsConfig::default());
        assert_eq!(config.defaults, DefaultsConfig::default());
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(BusConfig::from_toml_str(r#"role = "renderer""#).is_err());
    }
}
