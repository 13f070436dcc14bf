use std::env;

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Queue settings shared by the worker and the CLI, read from the environment
#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    pub redis_url: String,
    /// How long results and statuses live in Redis
    pub result_ttl_seconds: u64,
    /// BLPOP timeout; bounds how long shutdown can take to be noticed
    pub pop_timeout_seconds: f64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            result_ttl_seconds: 86400,
            pop_timeout_seconds: 5.0,
        }
    }
}

impl QueueConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            redis_url: lookup("REDIS_URL").unwrap_or(defaults.redis_url),
            result_ttl_seconds: lookup("RESULT_TTL_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.result_ttl_seconds),
            pop_timeout_seconds: lookup("QUEUE_POP_TIMEOUT_SECONDS")
                .and_then(|v| v.parse().ok())
                .filter(|v: &f64| *v > 0.0)
                .unwrap_or(defaults.pop_timeout_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_without_env() {
        let config = QueueConfig::from_lookup(|_| None);
        assert_eq!(config, QueueConfig::default());
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let vars: HashMap<&str, &str> = [
            ("REDIS_URL", "redis://queue:6380"),
            ("RESULT_TTL_SECONDS", "60"),
            ("QUEUE_POP_TIMEOUT_SECONDS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = QueueConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.redis_url, "redis://queue:6380");
        assert_eq!(config.result_ttl_seconds, 60);
        assert_eq!(config.pop_timeout_seconds, 5.0);
    }
}
