use anyhow::{Context, Result};

pub const DEFAULT_GRAPH_API_BASE: &str = "https://graph.facebook.com/v21.0";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Fixed path the platform redirects to after the user authorizes the app.
pub const OAUTH_CALLBACK_PATH: &str = "/api/instagram/oauth/callback";

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub facebook_app_id: String,
    pub facebook_app_secret: String,
    pub meta_verify_token: String,
    pub gemini_api_key: String,
    /// Public origin of the PWA, e.g. `https://app.rawbot.io` (no trailing slash).
    pub app_base_url: String,
    /// Internal endpoint that receives a copy of every webhook delivery.
    pub webhook_relay_url: Option<String>,
    pub graph_api_base: String,
    pub gemini_api_base: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            facebook_app_id: require_env("FACEBOOK_APP_ID")?,
            facebook_app_secret: require_env("FACEBOOK_APP_SECRET")?,
            meta_verify_token: require_env("META_VERIFY_TOKEN")?,
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            app_base_url: trim_base(require_env("APP_BASE_URL")?),
            webhook_relay_url: optional_env("WEBHOOK_RELAY_URL"),
            graph_api_base: trim_base(
                optional_env("GRAPH_API_BASE").unwrap_or_else(|| DEFAULT_GRAPH_API_BASE.to_string()),
            ),
            gemini_api_base: trim_base(
                optional_env("GEMINI_API_BASE")
                    .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string()),
            ),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// The redirect URI registered with the platform. Must match byte-for-byte
    /// in both the authorization dialog and the code exchange.
    pub fn oauth_redirect_uri(&self) -> String {
        format!("{}{}", self.app_base_url, OAUTH_CALLBACK_PATH)
    }

    /// Where the browser lands after a successful account link.
    pub fn oauth_success_url(&self) -> String {
        format!("{}?success=true", self.app_base_url)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/rawbot_test".to_string(),
        facebook_app_id: "app-123".to_string(),
        facebook_app_secret: "shh-secret".to_string(),
        meta_verify_token: "verify-me".to_string(),
        gemini_api_key: "gemini-key".to_string(),
        app_base_url: "https://app.rawbot.test".to_string(),
        webhook_relay_url: None,
        graph_api_base: DEFAULT_GRAPH_API_BASE.to_string(),
        gemini_api_base: DEFAULT_GEMINI_API_BASE.to_string(),
        port: 8080,
        rust_log: "debug".to_string(),
    }
}
