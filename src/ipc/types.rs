use serde::Deserialize;

use crate::remote::RemoteBackend;
use crate::store::EntityStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub backend: Option<Box<dyn RemoteBackend>>,
    pub session: SessionState,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            backend: None,
            session: SessionState::Unauthenticated,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Session lifecycle. Only authentication transitions move between states;
/// entity mutations happen strictly inside Ready and leave it.
pub enum SessionState {
    Unauthenticated,
    /// Credential accepted, bulk fetch in flight. Held only across that
    /// fetch inside a login/restore call.
    Restoring,
    /// The mirror exists exactly as long as the session does.
    Ready { token: String, store: EntityStore },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Restoring => "restoring",
            Self::Ready { .. } => "ready",
        }
    }
}
