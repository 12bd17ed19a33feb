use std::time::Duration;

use serde::Deserialize;

use crate::{Result, WebhookHttpError};

/// Configures timeouts, retry behavior and the TLS trust policy.
///
/// All durations are milliseconds. The struct deserializes from a config
/// section where every field is optional:
///
/// ```toml
/// connection_timeout_ms = 5000
/// socket_timeout_ms = 5000
/// max_tries = 3
/// retry_interval_ms = 1000
/// insecure_tls = true
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct HttpClientOptions {
    /// Connect timeout in milliseconds. Also bounds the wait for a pooled
    /// connection slot.
    pub connection_timeout_ms: u64,
    /// Socket (read) timeout in milliseconds.
    pub socket_timeout_ms: u64,
    /// Maximum number of attempts per delivery, the first one included.
    pub max_tries: u32,
    /// Fixed wait between attempts in milliseconds.
    pub retry_interval_ms: u64,
    /// Installs [`InsecureTrustPolicy`](crate::InsecureTrustPolicy): any
    /// certificate and any hostname are accepted on HTTPS targets.
    pub insecure_tls: bool,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            connection_timeout_ms: 5_000,
            socket_timeout_ms: 5_000,
            max_tries: 5,
            retry_interval_ms: 1_000,
            insecure_tls: false,
        }
    }
}

impl HttpClientOptions {
    /// Reads options from the environment, keeping defaults for unset
    /// variables.
    ///
    /// Reads:
    /// - `WEBHOOK_CONNECTION_TIMEOUT_MS`
    /// - `WEBHOOK_SOCKET_TIMEOUT_MS`
    /// - `WEBHOOK_MAX_TRIES`
    /// - `WEBHOOK_RETRY_INTERVAL_MS`
    /// - `WEBHOOK_INSECURE_TLS` (`true`/`false`)
    ///
    /// Returns [`WebhookHttpError::Config`] if a variable is set but cannot be
    /// parsed, or if the result fails [`HttpClientOptions::validate`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let options = Self {
            connection_timeout_ms: parse_var(
                &lookup,
                "WEBHOOK_CONNECTION_TIMEOUT_MS",
                defaults.connection_timeout_ms,
            )?,
            socket_timeout_ms: parse_var(
                &lookup,
                "WEBHOOK_SOCKET_TIMEOUT_MS",
                defaults.socket_timeout_ms,
            )?,
            max_tries: parse_var(&lookup, "WEBHOOK_MAX_TRIES", defaults.max_tries)?,
            retry_interval_ms: parse_var(
                &lookup,
                "WEBHOOK_RETRY_INTERVAL_MS",
                defaults.retry_interval_ms,
            )?,
            insecure_tls: parse_var(&lookup, "WEBHOOK_INSECURE_TLS", defaults.insecure_tls)?,
        };
        options.validate()?;
        Ok(options)
    }

    /// Rejects zero connect and socket timeouts.
    ///
    /// A zero `max_tries` is accepted and behaves like a single attempt.
    pub fn validate(&self) -> Result<()> {
        if self.connection_timeout_ms == 0 {
            return Err(WebhookHttpError::Config(
                "connection_timeout_ms must be greater than zero".to_owned(),
            ));
        }
        if self.socket_timeout_ms == 0 {
            return Err(WebhookHttpError::Config(
                "socket_timeout_ms must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    /// Upper bound on waiting for a connection slot. Reuses the connect
    /// timeout.
    pub fn connection_request_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|err| WebhookHttpError::Config(format!("invalid {key} '{raw}': {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::HttpClientOptions;
    use crate::WebhookHttpError;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_are_secure_and_match_plugin_defaults() {
        let options = HttpClientOptions::default();
        assert_eq!(options.connection_timeout_ms, 5_000);
        assert_eq!(options.socket_timeout_ms, 5_000);
        assert_eq!(options.max_tries, 5);
        assert_eq!(options.retry_interval_ms, 1_000);
        assert!(!options.insecure_tls);
    }

    #[test]
    fn acquisition_timeout_reuses_connect_timeout() {
        let options = HttpClientOptions {
            connection_timeout_ms: 1_234,
            socket_timeout_ms: 9_000,
            ..HttpClientOptions::default()
        };
        assert_eq!(options.connect_timeout(), Duration::from_millis(1_234));
        assert_eq!(options.connection_request_timeout(), Duration::from_millis(1_234));
        assert_eq!(options.socket_timeout(), Duration::from_millis(9_000));
    }

    #[test]
    fn env_overrides_only_set_variables() {
        let options = HttpClientOptions::from_lookup(lookup_from(&[
            ("WEBHOOK_MAX_TRIES", "3"),
            ("WEBHOOK_INSECURE_TLS", "true"),
            ("WEBHOOK_SOCKET_TIMEOUT_MS", " "),
        ]))
        .expect("options must parse");

        assert_eq!(options.max_tries, 3);
        assert!(options.insecure_tls);
        assert_eq!(options.socket_timeout_ms, 5_000);
        assert_eq!(options.retry_interval_ms, 1_000);
    }

    #[test]
    fn env_rejects_unparsable_value() {
        let err = HttpClientOptions::from_lookup(lookup_from(&[(
            "WEBHOOK_RETRY_INTERVAL_MS",
            "soon",
        )]))
        .expect_err("must fail");

        match err {
            WebhookHttpError::Config(message) => {
                assert!(message.contains("WEBHOOK_RETRY_INTERVAL_MS"))
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_zero_timeouts() {
        let options = HttpClientOptions {
            connection_timeout_ms: 0,
            ..HttpClientOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(WebhookHttpError::Config(_))
        ));

        let options = HttpClientOptions {
            socket_timeout_ms: 0,
            ..HttpClientOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn deserializes_partial_section_with_defaults() {
        let options: HttpClientOptions = toml::from_str(
            "
            max_tries = 3
            insecure_tls = true
            ",
        )
        .expect("toml must parse");

        assert_eq!(options.max_tries, 3);
        assert!(options.insecure_tls);
        assert_eq!(options.connection_timeout_ms, 5_000);
    }
}
