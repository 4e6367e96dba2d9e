//! API request and response types

use crate::grounding::GroundingStep;
use crate::locale::{EmergencyContacts, PageText};
use crate::session::{Session, Turn};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of requests that may reach the model
#[derive(Debug, Default, Deserialize)]
pub struct KeyRequest {
    /// Key typed into the page; ignored when the server has its own
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Request to send a chat message
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Everything the page needs before the first session call
#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub page: PageText,
    pub contacts: EmergencyContacts,
    pub needs_api_key: bool,
    pub typing_delay_ms: u64,
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct SessionCreatedResponse {
    pub session_id: String,
}

/// Progress through the grounding exercise, as tracked locally
#[derive(Debug, Serialize)]
pub struct StepInfo {
    pub step: GroundingStep,
    pub label: Option<&'static str>,
    pub index: usize,
    pub count: usize,
    pub things_to_name: Option<u8>,
    pub complete: bool,
}

impl StepInfo {
    pub fn of(step: GroundingStep) -> Self {
        Self {
            step,
            label: step.label(),
            index: GroundingStep::ALL
                .iter()
                .position(|s| *s == step)
                .unwrap_or_default(),
            count: GroundingStep::ALL.len(),
            things_to_name: step.things_to_name(),
            complete: step.is_complete(),
        }
    }
}

/// Session with its transcript
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub messages: Vec<Turn>,
    pub first_run_pending: bool,
    pub progress: StepInfo,
    pub created_at: DateTime<Utc>,
}

impl SessionResponse {
    pub fn of(session: &Session) -> Self {
        Self {
            session_id: session.id().to_string(),
            messages: session.all().to_vec(),
            first_run_pending: session.first_run_pending(),
            progress: StepInfo::of(session.step()),
            created_at: session.created_at(),
        }
    }
}

/// Response for the opening turn; `message` is absent once the opening has
/// already happened
#[derive(Debug, Serialize)]
pub struct OpeningResponse {
    pub message: Option<Turn>,
    pub progress: StepInfo,
}

/// Response for cancel action
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub ok: bool,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, kind: Option<&'static str>) -> Self {
        Self {
            error: message.into(),
            kind,
        }
    }
}
