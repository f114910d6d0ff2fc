//! Connection registry — document sessions and their live members.
//!
//! DESIGN
//! ======
//! The registry is the only owner of the connection → session mapping.
//! Sessions are created implicitly by the first bind and discarded when the
//! last member unbinds. Each member carries the sender half of its
//! connection's outbound channel, so fan-out never touches sockets directly.
//!
//! CONCURRENCY
//! ===========
//! One `RwLock` guards both maps. Every operation acquires it once, does
//! in-memory work only, and releases it; nothing awaits while holding it.
//! Fan-out runs under the read lock, so a connection that has been unbound
//! can never be a sender or receiver of a broadcast that starts afterwards.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{RwLock, mpsc};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};
use uuid::Uuid;

use crate::frame::Frame;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("connection {connection_id} is already bound to document {bound_to}; cannot bind to {requested}")]
    AlreadyBound { connection_id: Uuid, bound_to: String, requested: String },
}

impl crate::frame::ErrorCode for RegistryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadyBound { .. } => "E_ALREADY_BOUND",
        }
    }
}

/// A connection bound to a document session.
#[derive(Debug, Clone)]
pub struct Member {
    pub connection_id: Uuid,
    pub document_id: String,
    pub user_id: String,
    pub name: String,
    pub color: String,
    /// Outbound channel of the member's connection.
    pub tx: mpsc::Sender<Frame>,
}

/// Public view of a member, without its transport handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub connection_id: Uuid,
    pub user_id: String,
    pub name: String,
    pub color: String,
}

impl From<&Member> for Participant {
    fn from(member: &Member) -> Self {
        Self {
            connection_id: member.connection_id,
            user_id: member.user_id.clone(),
            name: member.name.clone(),
            color: member.color.clone(),
        }
    }
}

#[derive(Default)]
struct Session {
    members: HashMap<Uuid, Member>,
}

#[derive(Default)]
struct RegistryInner {
    /// `connection_id` -> `document_id`.
    connections: HashMap<Uuid, String>,
    /// `document_id` -> live session.
    sessions: HashMap<String, Session>,
}

/// Thread-safe registry of document sessions.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

// =============================================================================
// MEMBERSHIP
// =============================================================================

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a connection to a document session.
    ///
    /// Binding again to the same document is a no-op that returns the
    /// existing member unchanged, including its original color.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyBound`] if the connection is bound to
    /// a different document. The existing binding is left as is.
    pub async fn bind(&self, member: Member) -> Result<Member, RegistryError> {
        let mut inner = self.inner.write().await;

        if let Some(bound_to) = inner.connections.get(&member.connection_id) {
            if *bound_to != member.document_id {
                return Err(RegistryError::AlreadyBound {
                    connection_id: member.connection_id,
                    bound_to: bound_to.clone(),
                    requested: member.document_id,
                });
            }
            let existing = inner
                .sessions
                .get(bound_to)
                .and_then(|session| session.members.get(&member.connection_id))
                .cloned();
            if let Some(existing) = existing {
                return Ok(existing);
            }
        }

        let connection_id = member.connection_id;
        let document_id = member.document_id.clone();
        inner.connections.insert(connection_id, document_id.clone());
        let session = inner.sessions.entry(document_id.clone()).or_default();
        session.members.insert(connection_id, member.clone());

        info!(%document_id, %connection_id, user_id = %member.user_id, members = session.members.len(), "connection bound");
        Ok(member)
    }

    /// Remove a connection from its session. Idempotent.
    ///
    /// Returns the removed member, or `None` if the connection was not bound.
    /// The session is discarded when its last member leaves.
    pub async fn unbind(&self, connection_id: Uuid) -> Option<Member> {
        let mut inner = self.inner.write().await;
        let document_id = inner.connections.remove(&connection_id)?;

        let session = inner.sessions.get_mut(&document_id)?;
        let removed = session.members.remove(&connection_id);
        let remaining = session.members.len();
        info!(%document_id, %connection_id, remaining, "connection unbound");

        if remaining == 0 {
            inner.sessions.remove(&document_id);
            info!(%document_id, "session discarded");
        }
        removed
    }

    /// Connection IDs currently bound to a document. Empty for unknown documents.
    pub async fn members_of(&self, document_id: &str) -> HashSet<Uuid> {
        let inner = self.inner.read().await;
        inner
            .sessions
            .get(document_id)
            .map(|session| session.members.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Look up the binding of a connection.
    pub async fn member(&self, connection_id: Uuid) -> Option<Member> {
        let inner = self.inner.read().await;
        let document_id = inner.connections.get(&connection_id)?;
        inner
            .sessions
            .get(document_id)
            .and_then(|session| session.members.get(&connection_id))
            .cloned()
    }

    /// Identities and colors of a document's members, ordered by name.
    pub async fn participants(&self, document_id: &str) -> Vec<Participant> {
        let inner = self.inner.read().await;
        let Some(session) = inner.sessions.get(document_id) else {
            return Vec::new();
        };
        let mut list: Vec<Participant> = session.members.values().map(Participant::from).collect();
        list.sort_by(|a, b| a.name.cmp(&b.name).then(a.connection_id.cmp(&b.connection_id)));
        list
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    /// Number of bound connections across all sessions.
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }
}

// =============================================================================
// FAN-OUT
// =============================================================================

impl ConnectionRegistry {
    /// Build a frame from the sender's binding and hand it to every other
    /// member of the sender's session.
    ///
    /// Returns `None` if the sender is not bound, otherwise the number of
    /// receivers that accepted the frame. A receiver whose channel is full
    /// or closed misses this frame; the others are unaffected.
    pub async fn fan_out_from(&self, connection_id: Uuid, build: impl FnOnce(&Member) -> Frame) -> Option<usize> {
        let inner = self.inner.read().await;
        let document_id = inner.connections.get(&connection_id)?;
        let session = inner.sessions.get(document_id)?;
        let sender = session.members.get(&connection_id)?;

        let frame = build(sender);
        Some(deliver(session, &frame, Some(connection_id)))
    }

    /// Hand a frame to every member of a document, optionally excluding one.
    pub async fn broadcast(&self, document_id: &str, frame: &Frame, exclude: Option<Uuid>) -> usize {
        let inner = self.inner.read().await;
        let Some(session) = inner.sessions.get(document_id) else {
            return 0;
        };
        deliver(session, frame, exclude)
    }
}

fn deliver(session: &Session, frame: &Frame, exclude: Option<Uuid>) -> usize {
    let mut delivered = 0;
    for (connection_id, member) in &session.members {
        if exclude == Some(*connection_id) {
            continue;
        }
        match member.tx.try_send(frame.clone()) {
            Ok(()) => delivered += 1,
            Err(TrySendError::Full(_)) => {
                debug!(%connection_id, syscall = %frame.syscall, "outbound channel full; frame dropped");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(%connection_id, syscall = %frame.syscall, "outbound channel closed; frame dropped");
            }
        }
    }
    delivered
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
