use std::{net::SocketAddr, time::Duration};

use crate::error::Error;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:37373";
pub const DEFAULT_FROM_ADDRESS: &str = "no-reply@localhost";
pub const DEFAULT_FROM_NAME: &str = "Overnight Developers";
pub const DEFAULT_SIGNUP_SUBJECT: &str = "Thanks for signing up";
const DEFAULT_MAIL_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub mail: MailConfig,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub from_address: String,
    pub from_name: String,
    pub signup_subject: String,
    /// Mail API endpoint; `None` keeps delivery on the logging transport.
    pub api_url: Option<String>,
    #[cfg_attr(not(feature = "mail_http"), allow(dead_code))]
    pub api_token: String,
    #[cfg_attr(not(feature = "mail_http"), allow(dead_code))]
    pub timeout: Duration,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .trim()
            .parse::<SocketAddr>()
            .map_err(|err| Error::Config(format!("BIND_ADDR={bind_raw}: {err}")))?;

        let timeout_ms = match get("MAIL_TIMEOUT_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|err| Error::Config(format!("MAIL_TIMEOUT_MS={raw}: {err}")))?,
            None => DEFAULT_MAIL_TIMEOUT_MS,
        };

        Ok(Config {
            bind_addr,
            mail: MailConfig {
                from_address: get("MAIL_FROM_ADDRESS")
                    .unwrap_or_else(|| DEFAULT_FROM_ADDRESS.to_string()),
                from_name: get("MAIL_FROM_NAME").unwrap_or_else(|| DEFAULT_FROM_NAME.to_string()),
                signup_subject: get("MAIL_SIGNUP_SUBJECT")
                    .unwrap_or_else(|| DEFAULT_SIGNUP_SUBJECT.to_string()),
                api_url: get("MAIL_API_URL"),
                api_token: get("MAIL_API_TOKEN").unwrap_or_default(),
                timeout: Duration::from_millis(timeout_ms),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR.parse().unwrap());
        assert_eq!(config.mail.from_name, "Overnight Developers");
        assert_eq!(config.mail.signup_subject, "Thanks for signing up");
        assert_eq!(config.mail.api_url, None);
        assert_eq!(config.mail.timeout, Duration::from_millis(10_000));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config =
            Config::from_lookup(lookup_from(&[("MAIL_FROM_NAME", "  "), ("MAIL_API_URL", "")]))
                .unwrap();
        assert_eq!(config.mail.from_name, DEFAULT_FROM_NAME);
        assert!(config.mail.api_url.is_none());
    }

    #[test]
    fn overrides_are_read() {
        let config = Config::from_lookup(lookup_from(&[
            ("BIND_ADDR", "0.0.0.0:8080"),
            ("MAIL_API_URL", "https://mail.test/email"),
            ("MAIL_API_TOKEN", "secret"),
            ("MAIL_TIMEOUT_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.mail.api_url.as_deref(), Some("https://mail.test/email"));
        assert_eq!(config.mail.api_token, "secret");
        assert_eq!(config.mail.timeout, Duration::from_millis(250));
    }

    #[test]
    fn bad_bind_addr_is_a_config_error() {
        let err = Config::from_lookup(lookup_from(&[("BIND_ADDR", "not-an-addr")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn bad_timeout_is_a_config_error() {
        let err = Config::from_lookup(lookup_from(&[("MAIL_TIMEOUT_MS", "soon")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
