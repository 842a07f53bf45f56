use std::env;

use thiserror::Error;

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    api: ApiSettings,
    telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub(crate) struct ApiSettings {
    pub(crate) base_url: String,
    pub(crate) bearer_token: Option<String>,
    pub(crate) timeout_seconds: u64,
    pub(crate) connect_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let base_url = env_or_default("EXAMHALL_API_BASE_URL", "http://localhost:8000/api/v1")
            .trim_end_matches('/')
            .to_string();
        let bearer_token = env_optional("EXAMHALL_API_TOKEN");
        let timeout_seconds = parse_u64(
            "EXAMHALL_API_TIMEOUT_SECONDS",
            env_or_default("EXAMHALL_API_TIMEOUT_SECONDS", "30"),
        )?;
        let connect_timeout_seconds = parse_u64(
            "EXAMHALL_API_CONNECT_TIMEOUT_SECONDS",
            env_or_default("EXAMHALL_API_CONNECT_TIMEOUT_SECONDS", "10"),
        )?;

        let log_level = env_or_default("EXAMHALL_LOG_LEVEL", "info");
        let json = env_optional("EXAMHALL_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            api: ApiSettings { base_url, bearer_token, timeout_seconds, connect_timeout_seconds },
            telemetry: TelemetrySettings { log_level, json },
        };

        settings.validate()?;

        Ok(settings)
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "EXAMHALL_API_BASE_URL",
                value: String::from("<empty>"),
            });
        }
        if self.api.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAMHALL_API_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }
        if self.api.connect_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAMHALL_API_CONNECT_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_variants() {
        assert!(parse_bool("1"));
        assert!(parse_bool("true"));
        assert!(parse_bool("YES"));
        assert!(parse_bool("on"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn parse_u64_rejects_garbage() {
        assert!(parse_u64("FIELD", "30".to_string()).is_ok());
        let err = parse_u64("FIELD", "thirty".to_string()).expect_err("non-numeric");
        assert_eq!(err.to_string(), "invalid value for FIELD: thirty");
    }
}
