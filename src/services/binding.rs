//! Session binding — per-connection lifecycle against the registry.
//!
//! LIFECYCLE
//! =========
//! `Unbound → Bound → Closed`, or `Unbound → Closed` for a connection that
//! never joined. There is no way back from `Closed`; a reconnect gets a new
//! connection ID and a new binding.
//!
//! The WS handler binds at upgrade time when the handshake names a document,
//! otherwise on the first `session:join` frame. On close, remaining members
//! of the document are told via `session:part`.

use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::frame::{Data, ErrorCode, Frame, SESSION_PART};
use crate::services::palette;
use crate::services::registry::{Member, RegistryError};
use crate::state::AppState;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    #[error("connection {0} is closed")]
    Closed(Uuid),
    #[error("document_id must not be empty")]
    EmptyDocument,
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ErrorCode for BindingError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Closed(_) => "E_CONNECTION_CLOSED",
            Self::EmptyDocument => "E_INVALID_DOCUMENT",
            Self::Registry(e) => e.error_code(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Unbound,
    Bound { document_id: String },
    Closed,
}

/// Identity and transport handle of one connection, plus where it is in its
/// lifecycle.
pub struct SessionBinding {
    connection_id: Uuid,
    user_id: String,
    name: String,
    tx: mpsc::Sender<Frame>,
    phase: Phase,
}

// =============================================================================
// BINDING
// =============================================================================

impl SessionBinding {
    #[must_use]
    pub fn new(connection_id: Uuid, user_id: impl Into<String>, name: impl Into<String>, tx: mpsc::Sender<Frame>) -> Self {
        Self { connection_id, user_id: user_id.into(), name: name.into(), tx, phase: Phase::Unbound }
    }

    #[must_use]
    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    #[must_use]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    #[must_use]
    pub fn document_id(&self) -> Option<&str> {
        match &self.phase {
            Phase::Bound { document_id } => Some(document_id),
            _ => None,
        }
    }

    /// Bind this connection to a document, assigning it a palette color.
    ///
    /// Binding again to the current document returns the existing member.
    ///
    /// # Errors
    ///
    /// - [`BindingError::Closed`] once the connection has closed.
    /// - [`BindingError::EmptyDocument`] for a blank document ID.
    /// - [`BindingError::Registry`] when already bound to another document.
    pub async fn bind(&mut self, state: &AppState, document_id: &str) -> Result<Member, BindingError> {
        if self.phase == Phase::Closed {
            return Err(BindingError::Closed(self.connection_id));
        }
        let document_id = document_id.trim();
        if document_id.is_empty() {
            return Err(BindingError::EmptyDocument);
        }

        let member = state
            .registry
            .bind(Member {
                connection_id: self.connection_id,
                document_id: document_id.to_owned(),
                user_id: self.user_id.clone(),
                name: self.name.clone(),
                color: palette::pick_color().to_owned(),
                tx: self.tx.clone(),
            })
            .await?;

        self.phase = Phase::Bound { document_id: member.document_id.clone() };
        Ok(member)
    }

    /// Tear down the binding. Idempotent.
    ///
    /// Unbinds from the registry and tells the remaining members of the
    /// document that this connection left. Returns the removed member, if
    /// the connection was bound.
    pub async fn close(&mut self, state: &AppState) -> Option<Member> {
        if self.phase == Phase::Closed {
            return None;
        }
        self.phase = Phase::Closed;

        let member = state.registry.unbind(self.connection_id).await?;

        let mut data = Data::new();
        data.insert("id".into(), serde_json::json!(member.user_id));
        data.insert("connection_id".into(), serde_json::json!(member.connection_id));
        let part = Frame::request(SESSION_PART, data).with_document_id(member.document_id.clone());
        let notified = state
            .registry
            .broadcast(&member.document_id, &part, Some(self.connection_id))
            .await;

        info!(connection_id = %self.connection_id, document_id = %member.document_id, notified, "session binding closed");
        Some(member)
    }
}

#[cfg(test)]
#[path = "binding_test.rs"]
mod tests;
