//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the connection registry (the only shared mutable resource) and
//! the loaded relay configuration.

use std::sync::Arc;

use crate::config::RelayConfig;
use crate::services::registry::ConnectionRegistry;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub registry: ConnectionRegistry,
    pub config: Arc<RelayConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        Self { registry: ConnectionRegistry::new(), config: Arc::new(config) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use crate::frame::Frame;
    use crate::services::registry::Member;

    /// Create a test `AppState` with default configuration.
    #[must_use]
    pub fn test_app_state() -> AppState {
        AppState::new(RelayConfig::default())
    }

    /// Bind a fresh connection to `document_id` and return its ID and the
    /// receiving end of its outbound channel.
    pub async fn bind_member(state: &AppState, document_id: &str, name: &str) -> (Uuid, mpsc::Receiver<Frame>) {
        let connection_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(32);
        state
            .registry
            .bind(Member {
                connection_id,
                document_id: document_id.into(),
                user_id: format!("user-{name}"),
                name: name.into(),
                color: "#14b8a6".into(),
                tx,
            })
            .await
            .expect("fresh connection should bind");
        (connection_id, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_state_has_empty_registry() {
        let state = test_helpers::test_app_state();
        assert_eq!(state.registry.session_count().await, 0);
        assert_eq!(state.registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn clones_share_the_registry() {
        let state = test_helpers::test_app_state();
        let clone = state.clone();
        let (conn, _rx) = test_helpers::bind_member(&state, "doc1", "ada").await;
        assert!(clone.registry.members_of("doc1").await.contains(&conn));
    }
}
