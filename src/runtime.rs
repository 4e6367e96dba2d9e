//! Registry of live sessions
//!
//! Each browser session gets its own `Session` behind its own lock; nothing
//! is shared between sessions. The lock is held for the whole of one driver
//! call, which keeps at most one model request in flight per session.
//!
//! Sessions end when the page deletes them or after sitting idle past the
//! configured TTL; a background sweep evicts the idle ones.

use crate::session::Session;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Upper bound on how often the idle sweep runs
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Handle to interact with one session
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<Mutex<Session>>,
    /// Token for the call currently in flight
    cancel: Arc<StdMutex<CancellationToken>>,
    last_active: Arc<StdMutex<Instant>>,
}

impl SessionHandle {
    fn new(session: Session) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            cancel: Arc::new(StdMutex::new(CancellationToken::new())),
            last_active: Arc::new(StdMutex::new(Instant::now())),
        }
    }

    fn touch(&self) {
        *self
            .last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    /// A driver call holds the session lock
    fn is_busy(&self) -> bool {
        self.session.try_lock().is_err()
    }

    /// Exclusive access for a driver call, or `None` if one is running
    pub fn try_begin(&self) -> Option<(OwnedMutexGuard<Session>, CancellationToken)> {
        let guard = Arc::clone(&self.session).try_lock_owned().ok()?;
        let token = CancellationToken::new();
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = token.clone();
        Some((guard, token))
    }

    /// Read access; waits for any running call to finish
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, Session> {
        self.session.lock().await
    }

    /// Cancel the call in flight, if any
    pub fn cancel(&self) {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }
}

/// Manager for all sessions
#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new, empty session
    pub async fn create(&self) -> (String, SessionHandle) {
        let id = uuid::Uuid::new_v4().to_string();
        let handle = SessionHandle::new(Session::new(id.clone()));
        let mut sessions = self.sessions.write().await;
        sessions.insert(id.clone(), handle.clone());
        tracing::info!(session = %id, active = sessions.len(), "Session created");
        (id, handle)
    }

    /// Look up a session and mark it active
    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        let handle = self.sessions.read().await.get(id).cloned()?;
        handle.touch();
        Some(handle)
    }

    /// End a session. Its transcript is dropped once the last in-flight
    /// call holding it finishes.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id);
        if let Some(handle) = &removed {
            handle.cancel();
            tracing::info!(session = %id, "Session ended");
        }
        removed.is_some()
    }

    /// End every session untouched for at least `ttl`. Sessions with a call
    /// in flight are kept. Returns how many were evicted.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let idle: Vec<String> = self
            .sessions
            .read()
            .await
            .iter()
            .filter(|(_, handle)| handle.idle_for() >= ttl && !handle.is_busy())
            .map(|(id, _)| id.clone())
            .collect();

        let mut evicted = 0;
        for id in idle {
            if self.remove(&id).await {
                evicted += 1;
            }
        }
        if evicted > 0 {
            tracing::info!(evicted, ttl_secs = ttl.as_secs(), "Evicted idle sessions");
        }
        evicted
    }

    /// Run `evict_idle` periodically for the life of the process
    pub fn spawn_idle_sweep(self: Arc<Self>, ttl: Duration) -> JoinHandle<()> {
        let period = ttl.min(SWEEP_INTERVAL).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.evict_idle(ttl).await;
            }
        })
    }
}
