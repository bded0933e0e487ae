use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Vendor credentials are optional; the endpoints that need them answer 503 until set.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub api_prefix: String,
    pub cors_origins: Vec<String>,
    pub tavus: TavusConfig,
    pub livekit: LiveKitConfig,
    pub ws_heartbeat_secs: u64,
    /// Externally reachable base URL, used to build the vendor webhook callback.
    pub public_base_url: Option<String>,
    pub jobs_file: Option<PathBuf>,
    pub end_session_on_disconnect: bool,
}

#[derive(Debug, Clone)]
pub struct TavusConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub persona_id: Option<String>,
    pub replica_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LiveKitConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub token_ttl_secs: u64,
}

impl LiveKitConfig {
    pub fn is_configured(&self) -> bool {
        self.url.is_some() && self.api_key.is_some() && self.api_secret.is_some()
    }
}

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:3001";

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Config {
            port: parse_or(&get, "PORT", 8000)?,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            api_prefix: normalize_prefix(&get("API_PREFIX").unwrap_or_else(|| "/api".to_string())),
            cors_origins: split_list(&get("CORS_ORIGINS").unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string())),
            tavus: TavusConfig {
                api_key: get("TAVUS_API_KEY"),
                api_url: get("TAVUS_API_URL")
                    .unwrap_or_else(|| "https://api.tavus.io".to_string())
                    .trim_end_matches('/')
                    .to_string(),
                persona_id: get("TAVUS_PERSONA_ID"),
                replica_id: get("TAVUS_REPLICA_ID"),
            },
            livekit: LiveKitConfig {
                url: get("LIVEKIT_URL"),
                api_key: get("LIVEKIT_API_KEY"),
                api_secret: get("LIVEKIT_API_SECRET"),
                token_ttl_secs: parse_or(&get, "LIVEKIT_TOKEN_TTL_SECS", 3600)?,
            },
            ws_heartbeat_secs: parse_or(&get, "WS_HEARTBEAT_INTERVAL", 30)?,
            public_base_url: get("PUBLIC_BASE_URL").map(|u| u.trim_end_matches('/').to_string()),
            jobs_file: get("JOBS_FILE").map(PathBuf::from),
            end_session_on_disconnect: parse_bool_or(&get, "END_SESSION_ON_DISCONNECT", true)?,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

fn parse_bool_or<G>(get: &G, key: &str, default: bool) -> Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => anyhow::bail!("{key} must be a boolean, got '{v}'"),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.cors_origins.len(), 2);
        assert_eq!(config.tavus.api_url, "https://api.tavus.io");
        assert_eq!(config.livekit.token_ttl_secs, 3600);
        assert_eq!(config.ws_heartbeat_secs, 30);
        assert!(config.end_session_on_disconnect);
        assert!(!config.livekit.is_configured());
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_empty_values_count_as_unset() {
        let config = config_from(&[("TAVUS_API_KEY", "  "), ("PORT", "")]).unwrap();
        assert!(config.tavus.api_key.is_none());
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn test_prefix_is_normalized() {
        assert_eq!(config_from(&[("API_PREFIX", "v2/")]).unwrap().api_prefix, "/v2");
        assert_eq!(config_from(&[("API_PREFIX", "/")]).unwrap().api_prefix, "");
    }

    #[test]
    fn test_bool_parsing() {
        let config = config_from(&[("END_SESSION_ON_DISCONNECT", "off")]).unwrap();
        assert!(!config.end_session_on_disconnect);
        assert!(config_from(&[("END_SESSION_ON_DISCONNECT", "maybe")]).is_err());
    }

    #[test]
    fn test_cors_list_is_split_and_trimmed() {
        let config = config_from(&[("CORS_ORIGINS", "https://a.dev, https://b.dev ,")]).unwrap();
        assert_eq!(config.cors_origins, vec!["https://a.dev", "https://b.dev"]);
    }
}
