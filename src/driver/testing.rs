//! Mock implementations for testing
//!
//! These mocks let the driver and the HTTP layer run without a network.

use crate::llm::{Connector, LlmError, LlmRequest, LlmResponse, LlmService};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// Mock LLM Service
// ============================================================================

/// Mock LLM service that returns queued responses
pub struct MockLlmService {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    /// Record of all requests made
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmService {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }
}

#[async_trait]
impl LlmService for MockLlmService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.next(request)
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}

// ============================================================================
// Delayed Mock LLM Service (for timeout and cancellation testing)
// ============================================================================

/// Mock LLM service that sleeps before answering
pub struct DelayedMockLlmService {
    inner: MockLlmService,
    delay: Duration,
    /// Notified when a request starts (for test synchronization)
    pub request_started: Arc<Notify>,
}

impl DelayedMockLlmService {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MockLlmService::new(),
            delay,
            request_started: Arc::new(Notify::new()),
        }
    }

    pub fn queue_response(&self, response: LlmResponse) {
        self.inner.queue_response(response);
    }
}

#[async_trait]
impl LlmService for DelayedMockLlmService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        // notify_one keeps a permit if nobody is waiting yet
        self.request_started.notify_one();
        tokio::time::sleep(self.delay).await;
        self.inner.next(request)
    }

    fn model_id(&self) -> &str {
        "mock-model-delayed"
    }
}

// ============================================================================
// Mock Connector
// ============================================================================

/// Hands out one shared service and records the keys it was given
pub struct MockConnector<S = MockLlmService> {
    service: Arc<S>,
    keys: Mutex<Vec<String>>,
}

impl<S: LlmService + 'static> MockConnector<S> {
    pub fn new(service: S) -> Self {
        Self {
            service: Arc::new(service),
            keys: Mutex::new(Vec::new()),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn connect_count(&self) -> usize {
        self.keys.lock().unwrap().len()
    }

    pub fn last_key(&self) -> Option<String> {
        self.keys.lock().unwrap().last().cloned()
    }
}

impl<S: LlmService + 'static> Connector for MockConnector<S> {
    fn connect(&self, api_key: &str) -> Result<Arc<dyn LlmService>, LlmError> {
        self.keys.lock().unwrap().push(api_key.to_string());
        let service: Arc<dyn LlmService> = self.service.clone();
        Ok(service)
    }
}
