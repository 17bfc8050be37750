use chrono::NaiveTime;
use teloxide::types::UserId;
use url::Url;

use crate::utils::parse_recipient;
use teloxide::types::Recipient;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub gemini: GeminiConfig,
    pub membership: MembershipConfig,
    pub admin: AdminConfig,
    pub website: WebsiteConfig,
    pub moderation: ModerationConfig,
    pub database: DatabaseConfig,
    pub digest: DigestConfig,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig(pub String);

#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
}

/// The two chats a user must have joined before gated features unlock.
/// Both are configured as public `@name` handles so join links can be derived.
#[derive(Clone, Debug)]
pub struct MembershipConfig {
    pub channel: String,
    pub group: String,
    pub channel_url: Url,
    pub group_url: Url,
}

#[derive(Clone, Debug)]
pub struct AdminConfig {
    pub allowlist: Vec<UserId>,
}

impl AdminConfig {
    pub fn is_allowlisted(&self, user_id: UserId) -> bool {
        self.allowlist.contains(&user_id)
    }
}

#[derive(Clone, Debug)]
pub struct WebsiteConfig {
    pub url: Url,
}

#[derive(Clone, Debug)]
pub struct ModerationConfig {
    /// Chat that receives pending submissions with moderation buttons.
    pub chat: Recipient,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Clone, Debug)]
pub struct DigestConfig {
    /// Local wall-clock time at which the daily motivation goes out.
    pub send_time: NaiveTime,
}

const DEFAULT_DATABASE_PATH: &str = "bot.db";
const DEFAULT_DIGEST_TIME: &str = "08:00";
const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&|key| std::env::var(key).ok())
    }

    pub fn from_source(source: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let require = |key: &'static str| source(key).ok_or(ConfigError::Missing(key));

        let channel = require_chat_handle("CHANNEL_ID", require("CHANNEL_ID")?)?;
        let group = require_chat_handle("GROUP_ID", require("GROUP_ID")?)?;

        let allowlist = require("ADMIN_IDS")?
            .split(',')
            .map(|id| {
                id.trim()
                    .parse::<u64>()
                    .map(UserId)
                    .map_err(|_| ConfigError::Invalid("ADMIN_IDS", id.trim().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if allowlist.is_empty() {
            return Err(ConfigError::Invalid("ADMIN_IDS", "empty allowlist".to_string()));
        }

        let website_url = require("WEBSITE_URL")?;
        let website_url =
            Url::parse(&website_url).map_err(|_| ConfigError::Invalid("WEBSITE_URL", website_url))?;

        let moderation_chat = require("MOTIVATION_GROUP_ID")?;
        let moderation_chat = parse_recipient(&moderation_chat)
            .ok_or_else(|| ConfigError::Invalid("MOTIVATION_GROUP_ID", moderation_chat.clone()))?;

        let send_time = source("DAILY_DIGEST_TIME").unwrap_or_else(|| DEFAULT_DIGEST_TIME.to_string());
        let send_time = NaiveTime::parse_from_str(&send_time, "%H:%M")
            .map_err(|_| ConfigError::Invalid("DAILY_DIGEST_TIME", send_time.clone()))?;

        let config = AppConfig {
            telegram: TelegramConfig(require("TELEGRAM_BOT_TOKEN")?),
            gemini: GeminiConfig {
                api_key: require("GEMINI_API_KEY")?,
                model: source("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            },
            membership: MembershipConfig {
                channel_url: join_url(&channel)?,
                group_url: join_url(&group)?,
                channel,
                group,
            },
            admin: AdminConfig { allowlist },
            website: WebsiteConfig { url: website_url },
            moderation: ModerationConfig { chat: moderation_chat },
            database: DatabaseConfig {
                path: source("DATABASE_PATH").unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
            },
            digest: DigestConfig { send_time },
        };

        Ok(config)
    }
}

fn require_chat_handle(key: &'static str, value: String) -> Result<String, ConfigError> {
    if value.starts_with('@') && value.len() > 1 {
        Ok(value)
    } else {
        Err(ConfigError::Invalid(key, value))
    }
}

fn join_url(handle: &str) -> Result<Url, ConfigError> {
    let url = format!("https://t.me/{}", handle.trim_start_matches('@'));
    Url::parse(&url).map_err(|_| ConfigError::Invalid("CHANNEL_ID/GROUP_ID", handle.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn full_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("GEMINI_API_KEY", "key"),
            ("CHANNEL_ID", "@my_channel"),
            ("GROUP_ID", "@my_group"),
            ("WEBSITE_URL", "https://example.com"),
            ("ADMIN_IDS", "1001, 1002"),
            ("MOTIVATION_GROUP_ID", "-1001234567890"),
        ])
    }

    fn build(env: &HashMap<&'static str, &'static str>) -> Result<AppConfig, ConfigError> {
        AppConfig::from_source(&|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn builds_from_complete_environment() {
        let config = build(&full_env()).expect("config should build");
        assert_eq!(config.membership.channel, "@my_channel");
        assert_eq!(config.membership.channel_url.as_str(), "https://t.me/my_channel");
        assert_eq!(config.admin.allowlist, vec![UserId(1001), UserId(1002)]);
        assert_eq!(config.database.path, "bot.db");
        assert_eq!(config.digest.send_time, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert!(config.admin.is_allowlisted(UserId(1001)));
        assert!(!config.admin.is_allowlisted(UserId(9999)));
    }

    #[test]
    fn every_required_variable_is_fatal_when_absent() {
        for key in [
            "TELEGRAM_BOT_TOKEN",
            "GEMINI_API_KEY",
            "CHANNEL_ID",
            "GROUP_ID",
            "WEBSITE_URL",
            "ADMIN_IDS",
            "MOTIVATION_GROUP_ID",
        ] {
            let mut env = full_env();
            env.remove(key);
            assert!(matches!(build(&env), Err(ConfigError::Missing(missing)) if missing == key));
        }
    }

    #[test]
    fn rejects_malformed_admin_ids() {
        let mut env = full_env();
        env.insert("ADMIN_IDS", "1001,not-a-number");
        assert!(matches!(build(&env), Err(ConfigError::Invalid("ADMIN_IDS", _))));
    }

    #[test]
    fn rejects_chat_ids_without_public_handle() {
        let mut env = full_env();
        env.insert("CHANNEL_ID", "-100500");
        assert!(matches!(build(&env), Err(ConfigError::Invalid("CHANNEL_ID", _))));
    }

    #[test]
    fn digest_time_is_parsed() {
        let mut env = full_env();
        env.insert("DAILY_DIGEST_TIME", "21:30");
        let config = build(&env).unwrap();
        assert_eq!(config.digest.send_time, NaiveTime::from_hms_opt(21, 30, 0).unwrap());

        env.insert("DAILY_DIGEST_TIME", "quarter past nine");
        assert!(matches!(build(&env), Err(ConfigError::Invalid("DAILY_DIGEST_TIME", _))));
    }
}
