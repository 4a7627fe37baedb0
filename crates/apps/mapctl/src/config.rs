use std::env;
use std::time::Duration;

use catalog::{CatalogConfig, DEFAULT_RADIUS, DEFAULT_REFRESH_INTERVAL};

pub const DEFAULT_MAP_SERVICE_URL: &str = "https://api.immersal.com";
pub const DEFAULT_PARSE_SERVER_URL: &str = "http://localhost:1337/parse";

/// Settings read from the environment.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub map_service_url: String,
    pub map_token: String,
    pub radius: f64,
    pub load_public_maps: bool,
    pub parse_server_url: String,
    pub parse_app_id: String,
    pub parse_rest_key: String,
    /// Defaults to the server URL with a `ws` scheme.
    pub parse_live_url: Option<String>,
    pub http_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        Self {
            map_service_url: string("MAP_SERVICE_URL", DEFAULT_MAP_SERVICE_URL),
            map_token: string("MAP_TOKEN", ""),
            radius: parse_or(lookup("MAP_RADIUS"), DEFAULT_RADIUS),
            load_public_maps: lookup("LOAD_PUBLIC_MAPS").map(|v| parse_bool(&v)).unwrap_or(false),
            parse_server_url: string("PARSE_SERVER_URL", DEFAULT_PARSE_SERVER_URL),
            parse_app_id: string("PARSE_APP_ID", ""),
            parse_rest_key: string("PARSE_REST_KEY", ""),
            parse_live_url: lookup("PARSE_LIVE_URL").filter(|v| !v.trim().is_empty()),
            http_timeout: Duration::from_secs(parse_or(lookup("HTTP_TIMEOUT_SECS"), 30)),
        }
    }

    pub fn catalog_config(&self) -> CatalogConfig {
        CatalogConfig {
            radius: self.radius,
            include_public: self.load_public_maps,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }

    pub fn live_url(&self) -> String {
        if let Some(url) = &self.parse_live_url {
            return url.clone();
        }
        let server = self.parse_server_url.trim_end_matches('/');
        if let Some(rest) = server.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = server.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            server.to_string()
        }
    }

    pub fn http_client(&self) -> Result<reqwest::Client, String> {
        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .build()
            .map_err(|e| format!("http client: {e}"))
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
