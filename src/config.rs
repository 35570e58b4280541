//! Environment-supplied configuration.

use std::fmt;
use std::path::PathBuf;

use teloxide::types::UserId;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// A required variable is not set.
    Missing { name: &'static str },
    /// A variable is set but does not validate.
    Invalid { name: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { name } => write!(f, "required variable {name} is not set"),
            Self::Invalid { name, reason } => write!(f, "invalid value for {name}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug)]
pub struct Config {
    pub bot_token: String,
    pub bwh_api_key: String,
    pub bwh_veid: u64,
    /// The single user this bot serves. Everyone else is rejected.
    pub allowed_user_id: UserId,
    /// Externally reachable base URL, used to register the webhook.
    pub public_url: String,
    pub bind_addr: String,
    /// Directory for state files (logs, reminder store).
    pub data_dir: PathBuf,
    /// Reminder capability flag. Off by default.
    pub reminders_enabled: bool,
    pub sweep_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Tests pass closures over maps.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = required(&lookup, "BOT_TOKEN")?;
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = bot_token.split(':').collect();
        if token_parts.len() != 2
            || token_parts[0].parse::<u64>().is_err()
            || token_parts[1].is_empty()
        {
            return Err(ConfigError::Invalid {
                name: "BOT_TOKEN",
                reason: "expected format: 123456789:ABCdefGHI...".to_string(),
            });
        }

        let bwh_api_key = required(&lookup, "BWH_API_KEY")?;

        let bwh_veid = required(&lookup, "BWH_VEID")?
            .parse::<u64>()
            .map_err(|e| ConfigError::Invalid {
                name: "BWH_VEID",
                reason: e.to_string(),
            })?;

        let allowed_user_id = required(&lookup, "ALLOWED_USER_ID")?
            .parse::<u64>()
            .map(UserId)
            .map_err(|e| ConfigError::Invalid {
                name: "ALLOWED_USER_ID",
                reason: e.to_string(),
            })?;

        let public_url = required(&lookup, "PUBLIC_URL")?;
        if !public_url.starts_with("http://") && !public_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                name: "PUBLIC_URL",
                reason: "must start with http:// or https://".to_string(),
            });
        }

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let data_dir = lookup("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let reminders_enabled = match lookup("REMINDERS_ENABLED").as_deref() {
            None | Some("") | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "REMINDERS_ENABLED",
                    reason: format!("expected 0/1/true/false, got '{other}'"),
                });
            }
        };

        let sweep_interval_secs = match lookup("REMINDER_SWEEP_SECS") {
            None => 60,
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                Ok(_) => {
                    return Err(ConfigError::Invalid {
                        name: "REMINDER_SWEEP_SECS",
                        reason: "must be positive".to_string(),
                    });
                }
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        name: "REMINDER_SWEEP_SECS",
                        reason: e.to_string(),
                    });
                }
            },
        };

        Ok(Self {
            bot_token,
            bwh_api_key,
            bwh_veid,
            allowed_user_id,
            public_url,
            bind_addr,
            data_dir,
            reminders_enabled,
            sweep_interval_secs,
        })
    }
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::Missing { name }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("BOT_TOKEN", "123456789:ABCdefGHIjklMNOpqrsTUVwxyz"),
            ("BWH_API_KEY", "private_abc123"),
            ("BWH_VEID", "1234567"),
            ("ALLOWED_USER_ID", "987654321"),
            ("PUBLIC_URL", "https://bot.example.com"),
        ])
    }

    fn load(vars: HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn test_valid_config_with_defaults() {
        let config = load(base_vars()).expect("should load valid config");
        assert_eq!(config.allowed_user_id, UserId(987654321));
        assert_eq!(config.bwh_veid, 1234567);
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert!(!config.reminders_enabled);
        assert_eq!(config.sweep_interval_secs, 60);
    }

    #[test]
    fn test_missing_token() {
        let mut vars = base_vars();
        vars.remove("BOT_TOKEN");
        let err = load(vars).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { name: "BOT_TOKEN" }));
    }

    #[test]
    fn test_invalid_token_format() {
        let mut vars = base_vars();
        vars.insert("BOT_TOKEN", "no-colon-here");
        assert!(matches!(
            load(vars).unwrap_err(),
            ConfigError::Invalid { name: "BOT_TOKEN", .. }
        ));

        let mut vars = base_vars();
        vars.insert("BOT_TOKEN", "notanumber:ABCdef");
        assert!(matches!(
            load(vars).unwrap_err(),
            ConfigError::Invalid { name: "BOT_TOKEN", .. }
        ));

        let mut vars = base_vars();
        vars.insert("BOT_TOKEN", "123456789:");
        assert!(load(vars).is_err());
    }

    #[test]
    fn test_allowed_user_id_must_be_numeric() {
        let mut vars = base_vars();
        vars.insert("ALLOWED_USER_ID", "alice");
        assert!(matches!(
            load(vars).unwrap_err(),
            ConfigError::Invalid { name: "ALLOWED_USER_ID", .. }
        ));
    }

    #[test]
    fn test_veid_must_be_numeric() {
        let mut vars = base_vars();
        vars.insert("BWH_VEID", "veid-1");
        assert!(matches!(
            load(vars).unwrap_err(),
            ConfigError::Invalid { name: "BWH_VEID", .. }
        ));
    }

    #[test]
    fn test_public_url_must_be_http() {
        let mut vars = base_vars();
        vars.insert("PUBLIC_URL", "bot.example.com");
        assert!(matches!(
            load(vars).unwrap_err(),
            ConfigError::Invalid { name: "PUBLIC_URL", .. }
        ));
    }

    #[test]
    fn test_reminder_flag_parsing() {
        let mut vars = base_vars();
        vars.insert("REMINDERS_ENABLED", "1");
        assert!(load(vars).unwrap().reminders_enabled);

        let mut vars = base_vars();
        vars.insert("REMINDERS_ENABLED", "false");
        assert!(!load(vars).unwrap().reminders_enabled);

        let mut vars = base_vars();
        vars.insert("REMINDERS_ENABLED", "maybe");
        assert!(load(vars).is_err());
    }

    #[test]
    fn test_sweep_interval_validation() {
        let mut vars = base_vars();
        vars.insert("REMINDER_SWEEP_SECS", "30");
        assert_eq!(load(vars).unwrap().sweep_interval_secs, 30);

        let mut vars = base_vars();
        vars.insert("REMINDER_SWEEP_SECS", "0");
        assert!(load(vars).is_err());
    }
}
