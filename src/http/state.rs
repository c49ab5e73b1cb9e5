use crate::session::{InterviewSession, SessionServices};
use crate::transcription::{NatsRecognizer, TranscriptionFeed};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

/// Per-session defaults applied when a request leaves them out
#[derive(Debug, Clone)]
pub struct SessionDefaults {
    pub duration: Duration,
    pub affect_interval: Duration,
    /// How long a finished interview stays in memory
    pub retention: Duration,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(30 * 60),
            affect_interval: Duration::from_secs(1),
            retention: Duration::from_secs(60 * 60),
        }
    }
}

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Interview sessions (session_id → session), kept for
    /// `defaults.retention` after they end so feedback stays readable
    pub sessions: Arc<RwLock<HashMap<String, Arc<InterviewSession>>>>,

    /// Capabilities shared by every session
    pub services: SessionServices,

    pub defaults: SessionDefaults,

    /// NATS server for live transcription; sessions run without it when unset
    pub nats_url: Option<String>,
}

impl AppState {
    pub fn new(services: SessionServices, defaults: SessionDefaults, nats_url: Option<String>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            services,
            defaults,
            nats_url,
        }
    }

    pub async fn session(&self, session_id: &str) -> Option<Arc<InterviewSession>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Forget `session` once it has been finished for `defaults.retention`
    ///
    /// Only call this for a session that has begun; an idle one never
    /// completes.
    pub fn evict_when_finished(&self, session: &Arc<InterviewSession>) {
        let sessions = Arc::clone(&self.sessions);
        let session = Arc::clone(session);
        let retention = self.defaults.retention;

        tokio::spawn(async move {
            session.wait_for_completion().await;
            tokio::time::sleep(retention).await;

            let mut sessions = sessions.write().await;
            let current = sessions
                .get(session.id())
                .is_some_and(|s| Arc::ptr_eq(s, &session));
            if current {
                sessions.remove(session.id());
                info!("Evicted finished interview {}", session.id());
            }
        });
    }

    /// Transcription feed for a new session
    pub async fn transcription_feed(&self, session_id: &str) -> TranscriptionFeed {
        match self.nats_url {
            Some(ref url) => NatsRecognizer::feed(url, session_id.to_string()).await,
            None => TranscriptionFeed::unsupported(),
        }
    }
}
