//! Lifecycle state machine for execution sessions.

use agent_primitives::SessionId;
use thiserror::Error;
use tracing::trace;

/// States a session can occupy during its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Session constructed but its interpreter is not confirmed alive yet.
    Created,
    /// Interpreter is idle and accepts fragments.
    Ready,
    /// A fragment is running.
    Executing,
    /// Session torn down; the namespace is gone.
    Disposed,
}

impl SessionState {
    /// Returns `true` when the session accepts new work.
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns `true` once the session has been disposed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Disposed)
    }
}

/// Events that trigger lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Interpreter answered its startup handshake.
    Start,
    /// A fragment was submitted.
    Begin,
    /// The fragment finished, successfully or not.
    Finish,
    /// The session is being torn down.
    Dispose,
}

/// Lifecycle state manager.
#[derive(Debug, Clone, Copy)]
pub struct Lifecycle {
    session_id: SessionId,
    state: SessionState,
}

impl Lifecycle {
    /// Constructs a lifecycle controller for the given session.
    #[must_use]
    pub const fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            state: SessionState::Created,
        }
    }

    /// Returns the owning session identifier.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Applies a lifecycle event, returning the resulting state.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] when the supplied event is not
    /// allowed from the current state.
    pub fn transition(&mut self, event: SessionEvent) -> LifecycleResult<SessionState> {
        let next = match (self.state, event) {
            (SessionState::Created, SessionEvent::Start)
            | (SessionState::Executing, SessionEvent::Finish) => Some(SessionState::Ready),
            (SessionState::Ready, SessionEvent::Begin) => Some(SessionState::Executing),
            (SessionState::Ready | SessionState::Disposed, SessionEvent::Dispose) => {
                Some(SessionState::Disposed)
            }
            _ => None,
        };

        let Some(next_state) = next else {
            return Err(LifecycleError::InvalidTransition {
                session_id: self.session_id,
                from: self.state,
                event,
            });
        };

        if next_state != self.state {
            trace!(
                session_id = %self.session_id,
                ?self.state,
                ?next_state,
                ?event,
                "session lifecycle transition"
            );
            self.state = next_state;
        }

        Ok(self.state)
    }
}

/// Errors emitted by the lifecycle controller.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    /// Transition was not permitted from the current state.
    #[error("invalid lifecycle transition from {from:?} via {event:?} for session {session_id}")]
    InvalidTransition {
        /// Identifier of the session whose transition failed.
        session_id: SessionId,
        /// State prior to the attempted transition.
        from: SessionState,
        /// Event that triggered the failure.
        event: SessionEvent,
    },
}

/// Result alias used for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> Lifecycle {
        let mut lifecycle = Lifecycle::new(SessionId::generate());
        lifecycle.transition(SessionEvent::Start).unwrap();
        lifecycle
    }

    #[test]
    fn start_then_run_cycle() {
        let mut lifecycle = Lifecycle::new(SessionId::generate());
        assert_eq!(lifecycle.state(), SessionState::Created);

        lifecycle.transition(SessionEvent::Start).unwrap();
        assert!(lifecycle.state().is_ready());
        lifecycle.transition(SessionEvent::Begin).unwrap();
        assert_eq!(lifecycle.state(), SessionState::Executing);
        lifecycle.transition(SessionEvent::Finish).unwrap();
        assert!(lifecycle.state().is_ready());
    }

    #[test]
    fn dispose_only_from_ready() {
        let mut lifecycle = started();
        lifecycle.transition(SessionEvent::Begin).unwrap();

        let err = lifecycle
            .transition(SessionEvent::Dispose)
            .expect_err("dispose while executing should fail");
        assert!(matches!(
            err,
            LifecycleError::InvalidTransition {
                from: SessionState::Executing,
                ..
            }
        ));

        lifecycle.transition(SessionEvent::Finish).unwrap();
        lifecycle.transition(SessionEvent::Dispose).unwrap();
        assert!(lifecycle.state().is_terminal());
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut lifecycle = started();
        lifecycle.transition(SessionEvent::Dispose).unwrap();
        lifecycle.transition(SessionEvent::Dispose).unwrap();
        assert_eq!(lifecycle.state(), SessionState::Disposed);
    }

    #[test]
    fn disposed_sessions_reject_work() {
        let mut lifecycle = started();
        lifecycle.transition(SessionEvent::Dispose).unwrap();

        let err = lifecycle
            .transition(SessionEvent::Begin)
            .expect_err("begin after dispose should fail");
        assert!(matches!(
            err,
            LifecycleError::InvalidTransition {
                from: SessionState::Disposed,
                event: SessionEvent::Begin,
                ..
            }
        ));
    }
}
