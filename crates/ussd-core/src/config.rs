use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, UssdError};
use crate::types::{Dialect, Language};

/// Top-level configuration for the USSD gateway.
///
/// Loaded from `~/.ussd-gateway/config.toml` by default. Every section is
/// optional in the file and falls back to the deployment defaults below.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UssdConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub party: PartyConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl UssdConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: UssdConfig = toml::from_str(&content)?;
        config.check()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the engine cannot run with.
    pub fn check(&self) -> Result<()> {
        if self.gateway.delimiter.is_empty() {
            return Err(UssdError::Config("gateway.delimiter must not be empty".into()));
        }
        if self.session.max_invalid_attempts == 0 {
            return Err(UssdError::Config(
                "session.max_invalid_attempts must be at least 1".into(),
            ));
        }
        if self.session.max_menu_items == 0 {
            return Err(UssdError::Config(
                "session.max_menu_items must be at least 1".into(),
            ));
        }
        if self.session.languages.is_empty() {
            return Err(UssdError::Config("session.languages must not be empty".into()));
        }
        if self.validation.min_age > self.validation.max_age {
            return Err(UssdError::Config(format!(
                "validation.min_age ({}) exceeds validation.max_age ({})",
                self.validation.min_age, self.validation.max_age
            )));
        }
        Ok(())
    }
}

/// General process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory holding the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Bind address for the HTTP listener.
    pub host: String,
    /// HTTP listener port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.ussd-gateway/data".to_string(),
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            port: 57023,
        }
    }
}

/// Telecom gateway integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Wire convention spoken by the connected gateway.
    pub dialect: Dialect,
    /// Separator between steps in the accumulated text.
    pub delimiter: String,
    /// Dialled service code, e.g. `*388*3#`.
    pub service_code: String,
    /// Maximum characters a single prompt may carry on the handset.
    pub max_response_chars: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Json,
            delimiter: "*".to_string(),
            service_code: "*388*3#".to_string(),
            max_response_chars: 160,
        }
    }
}

/// Party branding and membership terms shown in prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyConfig {
    /// Short name used in greetings.
    pub name: String,
    /// Full registered name.
    pub full_name: String,
    /// Annual membership fee as displayed to callers.
    pub membership_fee: String,
    /// Prefix for allocated membership numbers.
    pub membership_prefix: String,
}

impl Default for PartyConfig {
    fn default() -> Self {
        Self {
            name: "ADD".to_string(),
            full_name: "Alliance for Democracy & Development".to_string(),
            membership_fee: "K25".to_string(),
            membership_prefix: "PM".to_string(),
        }
    }
}

/// Session engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Consecutive invalid inputs tolerated at one node before the session
    /// is terminated on the following request.
    pub max_invalid_attempts: u32,
    /// Language used until the caller picks one.
    pub default_language: Language,
    /// Languages offered in the language menu, in menu order.
    pub languages: Vec<Language>,
    /// Maximum numbered entries in a geography menu.
    pub max_menu_items: usize,
    /// Lifetime of memoised geography lookups.
    pub geography_cache_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_invalid_attempts: 3,
            default_language: Language::English,
            languages: vec![Language::English, Language::Bemba, Language::Nyanja],
            max_menu_items: 10,
            geography_cache_secs: 300,
        }
    }
}

/// Field validation rules. These encode national formats and are kept
/// configurable per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Regular expression for the national registration card number.
    pub national_id_pattern: String,
    /// Minimum age in whole years at registration.
    pub min_age: u32,
    /// Maximum plausible age in whole years.
    pub max_age: u32,
    /// Maximum characters in a single name field.
    pub name_max_len: usize,
    /// Country calling code without `+`.
    pub phone_country_code: String,
    /// Digits after the country code (or trunk `0`).
    pub phone_subscriber_digits: usize,
    /// Accepted two-digit mobile network prefixes.
    pub mobile_prefixes: Vec<String>,
    /// Regular expression for membership numbers entered by callers.
    pub membership_number_pattern: String,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            national_id_pattern: r"^\d{6}/\d{2}/\d$".to_string(),
            min_age: 18,
            max_age: 120,
            name_max_len: 40,
            phone_country_code: "260".to_string(),
            phone_subscriber_digits: 9,
            mobile_prefixes: ["95", "96", "97", "98", "75", "76", "77"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            membership_number_pattern: r"^[A-Za-z]{2,4}\d{4,10}$".to_string(),
        }
    }
}

/// Request and abuse limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Global gateway requests per second.
    pub requests_per_sec: u64,
    /// Fresh sessions one phone may open inside the abuse window.
    pub max_sessions_per_phone: u32,
    /// Abuse window length.
    pub abuse_window_secs: u64,
    /// Capacity of the delivery-callback queue.
    pub callback_queue: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            requests_per_sec: 200,
            max_sessions_per_phone: 20,
            abuse_window_secs: 3600,
            callback_queue: 256,
        }
    }
}
