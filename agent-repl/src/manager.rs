//! Registry of live execution sessions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use agent_config::{RuntimeConfig, SessionConfig};
use agent_primitives::SessionId;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{SessionError, SessionResult};
use crate::interpreter::InterpreterFactory;
use crate::python::PythonFactory;
use crate::session::ExecutionSession;

/// Creates, tracks and disposes execution sessions.
///
/// Sessions are independent: each owns its own interpreter and namespace.
pub struct SessionManager {
    factory: Arc<dyn InterpreterFactory>,
    config: SessionConfig,
    sessions: RwLock<HashMap<SessionId, Arc<ExecutionSession>>>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Creates a manager spawning interpreters from `factory`.
    #[must_use]
    pub fn new(factory: Arc<dyn InterpreterFactory>, config: SessionConfig) -> Self {
        Self {
            factory,
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a manager backed by `python3` child processes.
    #[must_use]
    pub fn python(config: &RuntimeConfig) -> Self {
        Self::new(
            Arc::new(PythonFactory::new(config.interpreter().clone())),
            config.session().clone(),
        )
    }

    /// Starts a new session with an empty namespace.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Interpreter`] when the interpreter fails to start.
    pub async fn create(&self) -> SessionResult<Arc<ExecutionSession>> {
        let session =
            Arc::new(ExecutionSession::spawn(self.factory.as_ref(), self.config.clone()).await?);
        let mut guard = self.sessions.write().await;
        guard.insert(session.id(), Arc::clone(&session));
        info!(session_id = %session.id(), live = guard.len(), "session registered");
        Ok(session)
    }

    /// Returns the live session registered under `id`.
    pub async fn get(&self, id: SessionId) -> Option<Arc<ExecutionSession>> {
        let guard = self.sessions.read().await;
        guard.get(&id).cloned()
    }

    /// Identifiers of every live session.
    pub async fn ids(&self) -> Vec<SessionId> {
        let guard = self.sessions.read().await;
        guard.keys().copied().collect()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns `true` when no session is live.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Unregisters and closes the session registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] for unknown ids and propagates close
    /// failures.
    pub async fn dispose(&self, id: SessionId) -> SessionResult<()> {
        let session = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or(SessionError::NotFound { id })?;
        session.close().await
    }

    /// Closes every live session, returning how many were closed cleanly.
    pub async fn dispose_all(&self) -> usize {
        let sessions: Vec<_> = self.sessions.write().await.drain().collect();
        let mut closed = 0;
        for (id, session) in sessions {
            match session.close().await {
                Ok(()) => closed += 1,
                Err(err) => warn!(session_id = %id, error = %err, "session failed to close"),
            }
        }
        closed
    }
}
