//! HTTP API for SOS Calma
//!
//! Serves the page and the small JSON/SSE API it drives.

mod assets;
mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::config::AppConfig;
use crate::driver::{ConversationDriver, DriverError, DriverOptions};
use crate::llm::Connector;
use crate::locale::PageText;
use crate::runtime::SessionManager;
use crate::session::Turn;
use crate::system_prompt::build_system_prompt;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub connector: Arc<dyn Connector>,
    pub config: Arc<AppConfig>,
    pub page: Arc<PageText>,
    driver_options: Arc<DriverOptions>,
}

impl AppState {
    pub fn new(config: AppConfig, connector: Arc<dyn Connector>) -> Self {
        let driver_options = DriverOptions {
            system_prompt: build_system_prompt(&config.contacts.as_pairs()),
            timeout: config.request_timeout,
            pacing: config.pacing,
        };
        Self {
            sessions: Arc::new(SessionManager::new()),
            connector,
            page: Arc::new(PageText::italian(&config.contacts)),
            config: Arc::new(config),
            driver_options: Arc::new(driver_options),
        }
    }

    /// Seed a driver with `transcript`. The server's own key wins over one
    /// typed into the page.
    pub fn driver(
        &self,
        page_key: Option<&str>,
        transcript: &[Turn],
    ) -> Result<ConversationDriver, DriverError> {
        let api_key = self.config.api_key.as_deref().or(page_key);
        ConversationDriver::initialize(
            self.connector.as_ref(),
            api_key,
            transcript,
            &self.driver_options,
        )
    }
}
