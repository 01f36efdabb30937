//! In-process domain events
//!
//! Repositories publish a [`UserEvent`] after each committed mutation. The
//! [`EventBus`] hands the event to every attached listener on its own task and
//! returns immediately; listener failures and panics are logged and otherwise
//! ignored.

use async_trait::async_trait;
use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::models::{User, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Created => write!(f, "user.created"),
            EventKind::Updated => write!(f, "user.updated"),
            EventKind::Deleted => write!(f, "user.deleted"),
        }
    }
}

/// A committed mutation. Deletions carry only the identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEvent {
    Created(User),
    Updated(User),
    Deleted { id: UserId },
}

impl UserEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            UserEvent::Created(_) => EventKind::Created,
            UserEvent::Updated(_) => EventKind::Updated,
            UserEvent::Deleted { .. } => EventKind::Deleted,
        }
    }

    pub fn user_id(&self) -> UserId {
        match self {
            UserEvent::Created(user) | UserEvent::Updated(user) => user.id,
            UserEvent::Deleted { id } => *id,
        }
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ListenerError(pub String);

/// Receives user events. Each call runs on its own task.
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    async fn on_event(&self, event: &UserEvent) -> Result<(), ListenerError>;
}

/// Handle returned by [`EventBus::attach`], used to detach the listener again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Registry = Vec<(ListenerId, Arc<dyn EventListener>)>;

/// Listener registry with fire-and-forget dispatch.
///
/// Cloning is cheap and every clone shares the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<RwLock<Registry>>,
    next_id: Arc<AtomicU64>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let name = listener.name().to_string();

        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));

        debug!(listener = %name, "Event listener attached");
        id
    }

    /// Returns `false` if the listener was not attached
    pub fn detach(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Dispatch `event` to the listeners attached right now, one task each.
    ///
    /// Never waits for a listener. Returns how many listeners the event was
    /// handed to; outside a Tokio runtime nothing is dispatched.
    pub fn publish(&self, event: UserEvent) -> usize {
        let snapshot: Vec<Arc<dyn EventListener>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        if snapshot.is_empty() {
            return 0;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(kind = %event.kind(), "No async runtime available, dropping event");
            return 0;
        };

        let event = Arc::new(event);
        let dispatched = snapshot.len();

        for listener in snapshot {
            let event = Arc::clone(&event);
            runtime.spawn(async move {
                let outcome = AssertUnwindSafe(listener.on_event(&event))
                    .catch_unwind()
                    .await;

                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(
                        listener = listener.name(),
                        kind = %event.kind(),
                        error = %e,
                        "Event listener failed"
                    ),
                    Err(_) => warn!(
                        listener = listener.name(),
                        kind = %event.kind(),
                        "Event listener panicked"
                    ),
                }
            });
        }

        dispatched
    }
}

/// Logs every event
#[derive(Debug, Default)]
pub struct AuditLogListener;

#[async_trait]
impl EventListener for AuditLogListener {
    fn name(&self) -> &str {
        "audit_log"
    }

    async fn on_event(&self, event: &UserEvent) -> Result<(), ListenerError> {
        match event {
            UserEvent::Created(user) => info!(
                event = %event.kind(),
                user_id = user.id,
                username = %user.username,
                email = %user.email,
                "User created"
            ),
            UserEvent::Updated(user) => info!(
                event = %event.kind(),
                user_id = user.id,
                username = %user.username,
                "User updated"
            ),
            UserEvent::Deleted { id } => info!(event = %event.kind(), user_id = id, "User deleted"),
        }
        Ok(())
    }
}

/// Sends a welcome notice on sign-up and a change notice on update.
///
/// Delivery is a log line; no mail transport is wired in.
#[derive(Debug, Default)]
pub struct WelcomeNotifier;

#[async_trait]
impl EventListener for WelcomeNotifier {
    fn name(&self) -> &str {
        "welcome_notifier"
    }

    async fn on_event(&self, event: &UserEvent) -> Result<(), ListenerError> {
        match event {
            UserEvent::Created(user) => {
                info!(to = %user.email, "Welcome notification sent")
            }
            UserEvent::Updated(user) => {
                info!(to = %user.email, "Account update notification sent")
            }
            UserEvent::Deleted { .. } => {}
        }
        Ok(())
    }
}

/// Forwards every event into an unbounded channel
#[derive(Debug)]
pub struct ChannelListener {
    sender: mpsc::UnboundedSender<UserEvent>,
}

impl ChannelListener {
    pub fn new(sender: mpsc::UnboundedSender<UserEvent>) -> Self {
        Self { sender }
    }

    /// Build a listener together with the receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UserEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

#[async_trait]
impl EventListener for ChannelListener {
    fn name(&self) -> &str {
        "channel"
    }

    async fn on_event(&self, event: &UserEvent) -> Result<(), ListenerError> {
        self.sender
            .send(event.clone())
            .map_err(|_| ListenerError("receiver dropped".to_string()))
    }
}
