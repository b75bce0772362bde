use crate::error::{Result, ScanError};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://www.dns-shop.ru";
pub const DEFAULT_API_URL: &str = "https://restapi.dns-shop.ru";
/// Vladivostok.
pub const DEFAULT_CITY_ID: &str = "30b7c1ea-03fb-11dc-95ee-00151716f9f5";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 6.0; Nexus 5 Build/MRA58N) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Mobile Safari/537.36";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the storefront.
///
/// The CSRF pair is a per-session artifact of the storefront, so it is never
/// baked in here; callers supply it from the environment.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_url: String,
    pub city_id: String,
    pub user_agent: String,
    pub csrf_token: Option<String>,
    pub csrf_cookie: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            city_id: DEFAULT_CITY_ID.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            csrf_token: None,
            csrf_cookie: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Point both the storefront and the menu API at one origin.
    /// Handy for tests against a local mock server.
    pub fn for_origin(origin: &str) -> Self {
        Self {
            base_url: origin.to_string(),
            api_url: origin.to_string(),
            ..Self::default()
        }
    }

    pub fn with_csrf(mut self, token: impl Into<String>, cookie: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self.csrf_cookie = Some(cookie.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("base_url", &self.base_url), ("api_url", &self.api_url)] {
            let parsed = Url::parse(value)
                .map_err(|e| ScanError::InvalidConfig(format!("{name} '{value}': {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ScanError::InvalidConfig(format!(
                    "{name} '{value}' must be an http(s) URL"
                )));
            }
        }

        uuid::Uuid::parse_str(&self.city_id).map_err(|e| {
            ScanError::InvalidConfig(format!("city_id '{}' is not a UUID: {e}", self.city_id))
        })?;

        if self.timeout_secs == 0 {
            return Err(ScanError::InvalidConfig(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn has_csrf(&self) -> bool {
        self.csrf_token.is_some() && self.csrf_cookie.is_some()
    }
}
