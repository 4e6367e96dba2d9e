//! Process configuration, read once from the environment at startup

use crate::llm::GEMINI_BASE_URL;
use crate::locale::EmergencyContacts;
use crate::reveal::{Pacing, DEFAULT_TYPING_DELAY};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server-side key; when absent the page asks the user for one
    pub api_key: Option<String>,
    pub port: u16,
    pub model: String,
    pub base_url: String,
    /// Upper bound on a single model call
    pub request_timeout: Duration,
    /// Idle time after which a session and its transcript are dropped
    pub session_ttl: Duration,
    pub pacing: Pacing,
    pub contacts: EmergencyContacts,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            port: DEFAULT_PORT,
            model: DEFAULT_MODEL.to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            session_ttl: DEFAULT_SESSION_TTL,
            pacing: Pacing::default(),
            contacts: EmergencyContacts::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. Blank values count as unset;
    /// unparsable numbers fall back to the default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let request_timeout = parse_or(&get, "SOS_CALMA_REQUEST_TIMEOUT_SECS")
            .map_or(defaults.request_timeout, Duration::from_secs);
        let session_ttl = parse_or(&get, "SOS_CALMA_SESSION_TTL_SECS")
            .map_or(defaults.session_ttl, Duration::from_secs);
        let typing_delay = parse_or(&get, "SOS_CALMA_TYPING_DELAY_MS")
            .map_or(DEFAULT_TYPING_DELAY, Duration::from_millis);

        let contacts = EmergencyContacts {
            emergency_number: get("SOS_CALMA_EMERGENCY_NUMBER")
                .unwrap_or(defaults.contacts.emergency_number),
            helpline_name: get("SOS_CALMA_HELPLINE_NAME")
                .unwrap_or(defaults.contacts.helpline_name),
            helpline_number: get("SOS_CALMA_HELPLINE_NUMBER")
                .unwrap_or(defaults.contacts.helpline_number),
        };

        Self {
            api_key: get("GOOGLE_API_KEY"),
            port: parse_or(&get, "SOS_CALMA_PORT").unwrap_or(defaults.port),
            model: get("SOS_CALMA_MODEL").unwrap_or(defaults.model),
            base_url: get("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            request_timeout,
            session_ttl,
            pacing: Pacing {
                per_chunk: typing_delay,
            },
            contacts,
        }
    }

    pub fn has_server_key(&self) -> bool {
        self.api_key.is_some()
    }
}

fn parse_or<T: std::str::FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = get(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable setting");
            None
        }
    }
}
