use std::time::Duration;

use serde::Deserialize;

/// Default long-polling endpoint of the review service.
pub const DEFAULT_REVIEW_API_URL: &str = "https://dvmn.org/api/long_polling/";

/// Default base URL of the Telegram Bot API.
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// How long the review service holds a long-poll request open, in seconds.
pub const SERVER_HOLD_SECS: u64 = 90;

/// Default client-side long-poll timeout in seconds.
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 95;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Review service API token, the bare value from the profile page.
    /// A leading `Token ` is tolerated and stripped by the client.
    pub devman_token: String,

    /// Telegram bot token
    pub telegram_bot_token: String,

    /// Long-polling endpoint
    pub review_api_url: String,

    /// Telegram Bot API base URL
    pub telegram_api_url: String,

    /// Client-side timeout for one long-poll request in seconds (default: 95).
    /// Must exceed [`SERVER_HOLD_SECS`], otherwise every poll times out early.
    pub poll_timeout_secs: u64,

    /// Mirror warnings and errors into the notification chat (default: true)
    pub forward_alerts: bool,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let poll_timeout_secs: u64 = match var("POLL_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("POLL_TIMEOUT_SECS must be a valid u64"))?,
            None => DEFAULT_POLL_TIMEOUT_SECS,
        };
        if poll_timeout_secs <= SERVER_HOLD_SECS {
            anyhow::bail!(
                "POLL_TIMEOUT_SECS must be greater than {SERVER_HOLD_SECS}, got {poll_timeout_secs}"
            );
        }

        Ok(Self {
            devman_token: var("DEVMAN_TOKEN")
                .ok_or_else(|| anyhow::anyhow!("DEVMAN_TOKEN environment variable is required"))?,
            telegram_bot_token: var("TG_TOKEN")
                .ok_or_else(|| anyhow::anyhow!("TG_TOKEN environment variable is required"))?,
            review_api_url: var("DEVMAN_API_URL")
                .unwrap_or_else(|| DEFAULT_REVIEW_API_URL.to_string()),
            telegram_api_url: var("TELEGRAM_API_URL")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
            poll_timeout_secs,
            forward_alerts: parse_bool(&var("FORWARD_ALERTS").unwrap_or_else(|| "true".to_string()))
                .ok_or_else(|| anyhow::anyhow!("FORWARD_ALERTS must be true or false"))?,
        })
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Fixed cool-down delays applied after a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Connection failures, non-401 HTTP errors and anything unrecognized (default: 10s)
    pub unknown_delay: Duration,
    /// Bodies that fail to parse (default: 5s)
    pub malformed_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            unknown_delay: Duration::from_secs(10),
            malformed_delay: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_vars(|key| vars.get(key).cloned())
    }

    const TOKENS: [(&str, &str); 2] = [("DEVMAN_TOKEN", "dvmn"), ("TG_TOKEN", "tg")];

    fn with_tokens(extra: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
        let mut vars = TOKENS.to_vec();
        vars.extend_from_slice(extra);
        vars
    }

    #[test]
    fn test_defaults() {
        let config = load(&TOKENS).unwrap();
        assert_eq!(config.devman_token, "dvmn");
        assert_eq!(config.telegram_bot_token, "tg");
        assert_eq!(config.review_api_url, DEFAULT_REVIEW_API_URL);
        assert_eq!(config.telegram_api_url, DEFAULT_TELEGRAM_API_URL);
        assert_eq!(config.poll_timeout(), Duration::from_secs(95));
        assert!(config.forward_alerts);
    }

    #[test]
    fn test_poll_timeout_must_exceed_server_hold() {
        for bad in ["0", "30", "90"] {
            let err = load(&with_tokens(&[("POLL_TIMEOUT_SECS", bad)])).unwrap_err();
            assert!(err.to_string().contains("POLL_TIMEOUT_SECS"), "{bad}: {err}");
        }
        let config = load(&with_tokens(&[("POLL_TIMEOUT_SECS", "91")])).unwrap();
        assert_eq!(config.poll_timeout_secs, 91);
    }

    #[test]
    fn test_poll_timeout_not_a_number() {
        assert!(load(&with_tokens(&[("POLL_TIMEOUT_SECS", "soon")])).is_err());
    }

    #[test]
    fn test_missing_tokens() {
        let err = load(&[("TG_TOKEN", "tg")]).unwrap_err();
        assert!(err.to_string().contains("DEVMAN_TOKEN"));
        let err = load(&[("DEVMAN_TOKEN", "dvmn")]).unwrap_err();
        assert!(err.to_string().contains("TG_TOKEN"));
    }

    #[test]
    fn test_forward_alerts() {
        let config = load(&with_tokens(&[("FORWARD_ALERTS", "off")])).unwrap();
        assert!(!config.forward_alerts);
        let err = load(&with_tokens(&[("FORWARD_ALERTS", "sometimes")])).unwrap_err();
        assert!(err.to_string().contains("FORWARD_ALERTS"));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.unknown_delay, Duration::from_secs(10));
        assert_eq!(policy.malformed_delay, Duration::from_secs(5));
    }
}
