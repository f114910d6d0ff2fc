//! Presence service — ephemeral pointer broadcast.
//!
//! DESIGN
//! ======
//! Pointer positions are purely ephemeral: fanned out to document peers and
//! immediately forgotten. No persistence, no state storage, no coalescing.
//! The sender's identity and color come from its binding, never from the
//! inbound payload.
//!
//! Delivery is at-most-once per receiver. A newer position supersedes any
//! dropped one, so loss under load is acceptable.

use serde::Serialize;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::frame::{Data, Frame, POINTER_REMOTE};
use crate::services::registry::Member;
use crate::state::AppState;

/// One cursor position, built per broadcast and then dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointerEvent {
    /// User ID of the sender.
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub name: String,
    pub color: String,
}

impl PointerEvent {
    #[must_use]
    pub fn from_member(member: &Member, x: f64, y: f64) -> Self {
        Self { id: member.user_id.clone(), x, y, name: member.name.clone(), color: member.color.clone() }
    }

    /// Render as a `pointer:remote` frame scoped to the sender's document.
    #[must_use]
    pub fn to_frame(&self, connection_id: Uuid, document_id: &str) -> Frame {
        let mut data = Data::new();
        data.insert("id".into(), serde_json::json!(self.id));
        data.insert("connection_id".into(), serde_json::json!(connection_id));
        data.insert("x".into(), serde_json::json!(self.x));
        data.insert("y".into(), serde_json::json!(self.y));
        data.insert("name".into(), serde_json::json!(self.name));
        data.insert("color".into(), serde_json::json!(self.color));

        Frame::request(POINTER_REMOTE, data)
            .with_document_id(document_id)
            .with_from(self.id.clone())
    }
}

/// Relay a pointer move from one connection to its document peers.
///
/// A move from a connection that is not bound (not yet joined, or already
/// closed) is dropped without error. Returns the number of peers that
/// accepted the event.
pub async fn on_pointer_move(state: &AppState, connection_id: Uuid, x: f64, y: f64) -> usize {
    let fanned_out = state
        .registry
        .fan_out_from(connection_id, |sender| {
            PointerEvent::from_member(sender, x, y).to_frame(connection_id, &sender.document_id)
        })
        .await;

    if let Some(delivered) = fanned_out {
        trace!(%connection_id, delivered, "pointer relayed");
        delivered
    } else {
        debug!(%connection_id, "pointer move from unbound connection dropped");
        0
    }
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
