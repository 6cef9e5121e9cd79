//! Typed broadcast bus for auth-adjacent modules.
//!
//! Replaces ad hoc string-named events: the billing module's dependency on
//! auth completion is a visible subscription on a typed channel.

use tokio::sync::broadcast;

const BUS_CHANNEL_CAPACITY: usize = 16;

/// Broadcasts emitted by the auth provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthBroadcast {
    /// Subscription/billing state should be refreshed; fired after every
    /// successful profile load.
    SubscriptionRefresh,
}

/// Broadcast channel for [`AuthBroadcast`] values. Cloning shares the
/// channel.
#[derive(Clone)]
pub struct AuthBus {
    sender: broadcast::Sender<AuthBroadcast>,
}

impl AuthBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthBroadcast> {
        self.sender.subscribe()
    }

    /// Emitting with no subscribers is not an error.
    pub fn emit(&self, broadcast: AuthBroadcast) {
        let _ = self.sender.send(broadcast);
    }
}

impl Default for AuthBus {
    fn default() -> Self {
        Self::new()
    }
}
