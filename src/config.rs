//! # Bot Configuration Module
//!
//! Runtime settings read from the environment, with the defaults the bot
//! falls back to when a variable is absent.

use std::collections::HashMap;
use std::net::SocketAddr;

use teloxide::types::ChatId;

// Defaults
pub const DEFAULT_RENEWAL_WINDOW_DAYS: i64 = 7;
pub const DEFAULT_INVENTORY_PAGE_SIZE: usize = 10;
pub const DEFAULT_PAYMENTS_LIMIT: i64 = 20;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Settings shared by every handler
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Default window for `/renovaciones`, in days
    pub renewal_window_days: i64,
    /// Inventory entries per page
    pub inventory_page_size: usize,
    /// Payments shown by "Pagos"
    pub payments_limit: i64,
    /// Chats allowed to use the bot; empty means everyone
    pub admin_chat_ids: Vec<ChatId>,
    /// Amount recorded on a renewal payment, per platform
    pub platform_prices: HashMap<String, i64>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            renewal_window_days: DEFAULT_RENEWAL_WINDOW_DAYS,
            inventory_page_size: DEFAULT_INVENTORY_PAGE_SIZE,
            payments_limit: DEFAULT_PAYMENTS_LIMIT,
            admin_chat_ids: Vec::new(),
            platform_prices: HashMap::new(),
        }
    }
}

impl BotConfig {
    pub fn is_allowed(&self, chat_id: ChatId) -> bool {
        self.admin_chat_ids.is_empty() || self.admin_chat_ids.contains(&chat_id)
    }

    pub fn price_for(&self, platform: &str) -> Option<i64> {
        self.platform_prices.get(platform).copied()
    }
}

/// Process-level settings: credentials, listener address and logging
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bot_token: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub health_addr: SocketAddr,
    pub log_format: LogFormat,
    pub bot: BotConfig,
}

impl AppConfig {
    /// Build the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = lookup("TELEGRAM_BOT_TOKEN")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN"))?;
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingEnvVar("DATABASE_URL"))?;

        let health_addr = match lookup("HEALTH_ADDR") {
            Some(addr) => addr
                .parse()
                .map_err(|_| ConfigError::InvalidValue("HEALTH_ADDR", addr))?,
            None => {
                let port = parse_or("PORT", lookup("PORT"), DEFAULT_HTTP_PORT)?;
                SocketAddr::from(([0, 0, 0, 0], port))
            }
        };

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::to_lowercase) {
            None => LogFormat::Pretty,
            Some(ref v) if v == "pretty" => LogFormat::Pretty,
            Some(ref v) if v == "json" => LogFormat::Json,
            Some(v) => return Err(ConfigError::InvalidValue("LOG_FORMAT", v)),
        };

        let renewal_window_days = parse_or(
            "RENEWAL_WINDOW_DAYS",
            lookup("RENEWAL_WINDOW_DAYS"),
            DEFAULT_RENEWAL_WINDOW_DAYS,
        )?;
        if renewal_window_days < 0 {
            return Err(ConfigError::InvalidValue(
                "RENEWAL_WINDOW_DAYS",
                renewal_window_days.to_string(),
            ));
        }

        let inventory_page_size = parse_or(
            "INVENTORY_PAGE_SIZE",
            lookup("INVENTORY_PAGE_SIZE"),
            DEFAULT_INVENTORY_PAGE_SIZE,
        )?;
        if inventory_page_size == 0 {
            return Err(ConfigError::InvalidValue("INVENTORY_PAGE_SIZE", "0".to_string()));
        }

        let bot = BotConfig {
            renewal_window_days,
            inventory_page_size,
            payments_limit: parse_or(
                "PAYMENTS_LIMIT",
                lookup("PAYMENTS_LIMIT"),
                DEFAULT_PAYMENTS_LIMIT,
            )?,
            admin_chat_ids: parse_chat_ids(lookup("ADMIN_CHAT_IDS").as_deref().unwrap_or(""))?,
            platform_prices: parse_prices(lookup("PLATFORM_PRICES").as_deref().unwrap_or(""))?,
        };

        Ok(Self {
            bot_token,
            database_url,
            db_max_connections: parse_or(
                "DB_MAX_CONNECTIONS",
                lookup("DB_MAX_CONNECTIONS"),
                DEFAULT_DB_MAX_CONNECTIONS,
            )?,
            health_addr,
            log_format,
            bot,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
    }
}

/// `123,-100456` → chat ids
fn parse_chat_ids(raw: &str) -> Result<Vec<ChatId>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map(ChatId)
                .map_err(|_| ConfigError::InvalidValue("ADMIN_CHAT_IDS", s.to_string()))
        })
        .collect()
}

/// `disney=3500,netflix=4500` → price table keyed by lower-case platform
fn parse_prices(raw: &str) -> Result<HashMap<String, i64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let invalid = || ConfigError::InvalidValue("PLATFORM_PRICES", pair.to_string());
            let (platform, amount) = pair.split_once('=').ok_or_else(invalid)?;
            let amount = amount.trim().parse::<i64>().map_err(|_| invalid())?;
            Ok((platform.trim().to_lowercase(), amount))
        })
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("TELEGRAM_BOT_TOKEN", "123:abc"),
        ("DATABASE_URL", "postgres://localhost/slots"),
    ];

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&REQUIRED)).unwrap();
        assert_eq!(config.bot.renewal_window_days, 7);
        assert_eq!(config.bot.inventory_page_size, 10);
        assert_eq!(config.health_addr.port(), 8080);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.bot.is_allowed(ChatId(42)));
    }

    #[test]
    fn test_missing_token() {
        let err = AppConfig::from_lookup(lookup_from(&[("DATABASE_URL", "x")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN")));
    }

    #[test]
    fn test_overrides() {
        const VARS: [(&str, &str); 7] = [
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("DATABASE_URL", "postgres://localhost/slots"),
            ("PORT", "9000"),
            ("RENEWAL_WINDOW_DAYS", "3"),
            ("ADMIN_CHAT_IDS", "1, 2"),
            ("PLATFORM_PRICES", "Disney=3500,netflix=4500"),
            ("LOG_FORMAT", "JSON"),
        ];
        let config = AppConfig::from_lookup(lookup_from(&VARS)).unwrap();
        assert_eq!(config.health_addr.port(), 9000);
        assert_eq!(config.bot.renewal_window_days, 3);
        assert!(config.bot.is_allowed(ChatId(2)));
        assert!(!config.bot.is_allowed(ChatId(3)));
        assert_eq!(config.bot.price_for("disney"), Some(3500));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_price() {
        const VARS: [(&str, &str); 3] = [
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("DATABASE_URL", "postgres://localhost/slots"),
            ("PLATFORM_PRICES", "disney"),
        ];
        assert!(AppConfig::from_lookup(lookup_from(&VARS)).is_err());
    }
}
