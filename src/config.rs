use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tracing::{info, warn};

use crate::export::ExportConfig;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub planner: PlannerConfig,
    pub export: ExportConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            planner: PlannerConfig::from_env(),
            export: export_config_from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;

    fn from_env() -> Self {
        let host_value =
            env_string("BOX_PLANNER_API_HOST").unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, effective_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                warn!(
                    "⚠️ Could not parse BOX_PLANNER_API_HOST ('{}'): {}. Using {}.",
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (
                    IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = match env_string("BOX_PLANNER_API_PORT") {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    warn!(
                        "⚠️ BOX_PLANNER_API_PORT must not be 0. Using {}.",
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    warn!(
                        "⚠️ Could not parse BOX_PLANNER_API_PORT ('{}'): {}. Using {}.",
                        raw,
                        err,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host: effective_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    /// Checks whether the hostname matches the default value.
    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

/// Limits applied to planning requests.
#[derive(Copy, Clone, Debug)]
pub struct PlannerConfig {
    /// Largest count accepted for any single size.
    ///
    /// Bounds the search state space, which grows with the product of all four counts.
    /// At 20 a request explores at most 21^4 states (well under a second in release builds).
    pub max_units_per_size: u32,
}

impl PlannerConfig {
    /// Upper bound on the distinct search states a request within the limit can reach.
    pub fn max_search_states(&self) -> u64 {
        u64::from(self.max_units_per_size + 1).pow(4)
    }
}

impl PlannerConfig {
    pub const DEFAULT_MAX_UNITS_PER_SIZE: u32 = 20;
    const MAX_UNITS_VAR: &'static str = "BOX_PLANNER_MAX_UNITS_PER_SIZE";

    fn from_env() -> Self {
        let max_units_per_size = load_u32_with_warning(
            Self::MAX_UNITS_VAR,
            Self::DEFAULT_MAX_UNITS_PER_SIZE,
            |value| value >= 1,
            "must be at least 1",
            "Warning: Raised unit limits may make large requests slow and memory hungry",
        );
        Self { max_units_per_size }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_units_per_size: Self::DEFAULT_MAX_UNITS_PER_SIZE,
        }
    }
}

const CSV_DELIMITER_VAR: &str = "BOX_PLANNER_CSV_DELIMITER";
const CSV_HEADER_VAR: &str = "BOX_PLANNER_CSV_HEADER";

fn export_config_from_env() -> ExportConfig {
    let delimiter = env_string(CSV_DELIMITER_VAR)
        .and_then(|raw| parse_delimiter(&raw, CSV_DELIMITER_VAR))
        .unwrap_or(ExportConfig::DEFAULT_DELIMITER);

    let include_header = env_string(CSV_HEADER_VAR)
        .and_then(|raw| parse_bool(&raw, CSV_HEADER_VAR))
        .unwrap_or(ExportConfig::DEFAULT_INCLUDE_HEADER);

    ExportConfig::builder()
        .delimiter(delimiter)
        .include_header(include_header)
        .build()
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(
                "⚠️ Access to {} failed: {}. Using default value.",
                name, err
            );
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            warn!(
                "⚠️ Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name, other
            );
            None
        }
    }
}

/// Accepts exactly one character that can separate cells (`\t` is written as a literal tab or `\t`).
fn parse_delimiter(raw: &str, var_name: &str) -> Option<char> {
    let candidate = if raw == "\\t" { "\t" } else { raw };
    let mut chars = candidate.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) if !matches!(ch, '"' | '\r' | '\n') => Some(ch),
        _ => {
            warn!(
                "⚠️ {} must be a single character other than a quote or line break ('{}'). Using default value.",
                var_name, raw
            );
            None
        }
    }
}

fn load_u32_with_warning(
    var_name: &str,
    default: u32,
    validator: impl Fn(u32) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> u32 {
    match env_string(var_name) {
        Some(raw) => match raw.parse::<u32>() {
            Ok(value) => {
                if !validator(value) {
                    warn!(
                        "⚠️ {} contains invalid value '{}': {}. Using {}.",
                        var_name, raw, invalid_hint, default
                    );
                    default
                } else {
                    if value > default {
                        info!("⚠️ {} ({} = {}).", warning, var_name, value);
                    }
                    value
                }
            }
            Err(err) => {
                warn!(
                    "⚠️ Could not parse {} ('{}') as number: {}. Using {}.",
                    var_name, raw, err, default
                );
                default
            }
        },
        None => default,
    }
}
