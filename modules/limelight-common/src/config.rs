use std::env;

use graph_client::GraphSettings;
use tracing::info;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Meta app registration
    pub app_id: String,
    pub app_secret: String,
    pub graph_api_url: String,
    pub graph_dialog_url: String,
    pub redirect_uri: String,
    pub oauth_scopes: String,

    // Link flow
    pub state_secret: String,
    pub link_success_url: String,

    /// Static development token, last resort of the resolver chain.
    /// Never logged.
    pub fallback_token: Option<String>,

    // Snapshot scheduler
    pub snapshot_interval_hours: u64,

    // Reply drafting collaborator
    pub drafter_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            app_id: required_env("META_APP_ID"),
            app_secret: required_env("META_APP_SECRET"),
            graph_api_url: env::var("META_GRAPH_URL")
                .unwrap_or_else(|_| graph_client::DEFAULT_API_URL.to_string()),
            graph_dialog_url: env::var("META_DIALOG_URL")
                .unwrap_or_else(|_| graph_client::DEFAULT_DIALOG_URL.to_string()),
            redirect_uri: required_env("META_REDIRECT_URI"),
            oauth_scopes: env::var("META_SCOPES")
                .unwrap_or_else(|_| "pages_show_list,instagram_basic".to_string()),
            state_secret: required_env("LINK_STATE_SECRET"),
            link_success_url: env::var("LINK_SUCCESS_URL")
                .unwrap_or_else(|_| "http://localhost:5173/account?linked=1".to_string()),
            fallback_token: env::var("META_FALLBACK_TOKEN").ok().filter(|t| !t.is_empty()),
            snapshot_interval_hours: env::var("SNAPSHOT_INTERVAL_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .expect("SNAPSHOT_INTERVAL_HOURS must be a number"),
            drafter_url: env::var("REPLY_DRAFTER_URL").ok().filter(|u| !u.is_empty()),
        }
    }

    pub fn graph_settings(&self) -> GraphSettings {
        GraphSettings {
            api_url: self.graph_api_url.trim_end_matches('/').to_string(),
            dialog_url: self.graph_dialog_url.trim_end_matches('/').to_string(),
            app_id: self.app_id.clone(),
            app_secret: self.app_secret.clone(),
            redirect_uri: self.redirect_uri.clone(),
        }
    }

    /// Log the non-secret settings at startup.
    pub fn log_redacted(&self) {
        info!(
            graph_api_url = %self.graph_api_url,
            redirect_uri = %self.redirect_uri,
            scopes = %self.oauth_scopes,
            snapshot_interval_hours = self.snapshot_interval_hours,
            fallback_token = self.fallback_token.is_some(),
            drafter = self.drafter_url.is_some(),
            "Configuration loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
