//! Session-change event fan-out.

use crate::types::Session;
use tokio::sync::broadcast;
use tracing::debug;

/// Capacity of the session-event channel. Slow subscribers that fall more
/// than this far behind observe a `Lagged` error and resubscribe.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Event tag delivered with every session-change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Fired once at boot with whatever session the store restored
    InitialSession,
    /// A sign-in (password or OAuth completion) produced a session
    SignedIn,
    /// The session was destroyed
    SignedOut,
    /// The access token was refreshed
    TokenRefreshed,
}

/// A session-change notification: event tag plus the session payload.
#[derive(Debug, Clone)]
pub struct SessionChange {
    pub event: SessionEvent,
    pub session: Option<Session>,
}

/// Broadcast fan-out for session changes. Cloning shares the channel.
#[derive(Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionChange>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribe to session changes. Each receiver sees every event emitted
    /// after the call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.sender.subscribe()
    }

    /// Emit a session change. Emitting with no subscribers is not an error.
    pub fn emit(&self, event: SessionEvent, session: Option<Session>) {
        debug!(?event, has_session = session.is_some(), "Session event");
        let _ = self.sender.send(SessionChange { event, session });
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
