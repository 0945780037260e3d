//! Tracks the single current session and fences out stale events.

use serde::Serialize;
use std::fmt;
use tracing::debug;

use super::state::{InvalidTransition, Phase, QuerySession, Question, SessionEvent, SessionSnapshot};

/// Identity of a submitted question. Later submissions get larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of routing an event to the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The current session accepted the event and is now in this phase.
    Applied(Phase),
    /// The event belongs to a session that has been superseded.
    Stale,
    /// The current session does not accept this event in its phase.
    Rejected(InvalidTransition),
}

/// Owns the current session. Submitting a question replaces it wholesale.
#[derive(Debug, Default)]
pub struct SessionTracker {
    next_id: u64,
    current: Option<(SessionId, QuerySession)>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a session for `question`, discarding whatever the previous one
    /// had produced.
    pub fn submit(&mut self, question: Question) -> SessionId {
        self.next_id += 1;
        let id = SessionId(self.next_id);
        let session = QuerySession::for_question(question);
        debug!("Session {} starts in {}", id, session.phase);
        self.current = Some((id, session));
        id
    }

    /// Applies `event` if it belongs to the current session.
    pub fn apply(&mut self, id: SessionId, event: SessionEvent) -> ApplyOutcome {
        match &mut self.current {
            Some((current, session)) if *current == id => match session.apply(event) {
                Ok(phase) => ApplyOutcome::Applied(phase),
                Err(rejected) => ApplyOutcome::Rejected(rejected),
            },
            _ => ApplyOutcome::Stale,
        }
    }

    pub fn current_id(&self) -> Option<SessionId> {
        self.current.as_ref().map(|(id, _)| *id)
    }

    /// The session for `id`, if it is still the current one.
    pub fn session(&self, id: SessionId) -> Option<&QuerySession> {
        match &self.current {
            Some((current, session)) if *current == id => Some(session),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.current
            .as_ref()
            .map(|(id, session)| session.snapshot(*id))
    }
}
