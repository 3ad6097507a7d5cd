//! Application configuration. Backend credentials, cache and refresh timings, paths.

use serde::Deserialize;

/// Seconds a cached table stays fresh before it is fetched again.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 30;

/// Seconds between dashboard refreshes in watch mode.
pub const DEFAULT_REFRESH_SECS: u64 = 60;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Project URL of the hosted backend (e.g. https://xyz.supabase.co). Read from CRM_BACKEND_URL.
    #[serde(default)]
    pub backend_url: Option<String>,

    /// Public (anon) API key sent as `apikey`. Read from CRM_BACKEND_KEY.
    #[serde(default)]
    pub backend_key: Option<String>,

    /// User access token (JWT) from the hosted auth provider. Falls back to the API key.
    /// Read from CRM_ACCESS_TOKEN.
    #[serde(default)]
    pub access_token: Option<String>,

    /// JSON snapshot used instead of the backend when no backend is configured. Read from CRM_SNAPSHOT_PATH.
    #[serde(default)]
    pub snapshot_path: Option<String>,

    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,

    #[serde(default)]
    pub refresh_secs: Option<u64>,

    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Directory for CSV exports. Read from CRM_EXPORT_DIR.
    #[serde(default)]
    pub export_dir: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        c = c.add_source(config::Environment::with_prefix("CRM"));
        if let Ok(path) = std::env::var("CRM_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        let mut cfg: Self = c.build()?.try_deserialize()?;
        // SUPABASE_URL / SUPABASE_ANON_KEY are read directly so an existing frontend .env works as-is
        if cfg.backend_url.is_none() {
            cfg.backend_url = std::env::var("SUPABASE_URL").ok();
        }
        if cfg.backend_key.is_none() {
            cfg.backend_key = std::env::var("SUPABASE_ANON_KEY").ok();
        }
        Ok(cfg)
    }

    pub fn cache_ttl_secs_or_default(&self) -> u64 {
        self.cache_ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS)
    }

    /// Never below one second so the watcher cannot spin.
    pub fn refresh_secs_or_default(&self) -> u64 {
        self.refresh_secs.unwrap_or(DEFAULT_REFRESH_SECS).max(1)
    }

    pub fn request_timeout_secs_or_default(&self) -> u64 {
        self.request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
    }

    pub fn export_dir_or_default(&self) -> String {
        self.export_dir
            .clone()
            .unwrap_or_else(|| "./exports".to_string())
    }

    pub fn snapshot_path_or_default(&self) -> String {
        self.snapshot_path
            .clone()
            .unwrap_or_else(|| "./data/snapshot.json".to_string())
    }

    /// Bearer token for requests: the user's access token, else the API key.
    pub fn bearer_token(&self) -> Option<String> {
        self.access_token.clone().or_else(|| self.backend_key.clone())
    }

    /// True when both the backend URL and API key are set.
    pub fn is_backend_configured(&self) -> bool {
        self.backend_url.as_deref().is_some_and(|u| !u.trim().is_empty())
            && self.backend_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.cache_ttl_secs_or_default(), DEFAULT_CACHE_TTL_SECS);
        assert_eq!(cfg.refresh_secs_or_default(), DEFAULT_REFRESH_SECS);
        assert_eq!(cfg.request_timeout_secs_or_default(), DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(cfg.export_dir_or_default(), "./exports");
        assert!(!cfg.is_backend_configured());
        assert!(cfg.bearer_token().is_none());
    }

    #[test]
    fn refresh_is_never_zero() {
        let cfg = AppConfig {
            refresh_secs: Some(0),
            ..Default::default()
        };
        assert_eq!(cfg.refresh_secs_or_default(), 1);
    }

    #[test]
    fn access_token_takes_precedence_over_key() {
        let mut cfg = AppConfig {
            backend_url: Some("https://example.supabase.co".into()),
            backend_key: Some("anon".into()),
            ..Default::default()
        };
        assert!(cfg.is_backend_configured());
        assert_eq!(cfg.bearer_token().as_deref(), Some("anon"));
        cfg.access_token = Some("jwt".into());
        assert_eq!(cfg.bearer_token().as_deref(), Some("jwt"));
    }
}
