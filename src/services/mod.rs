//! Domain services used by the websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own membership and fan-out so route handlers can stay
//! focused on protocol translation.

pub mod binding;
pub mod palette;
pub mod presence;
pub mod registry;
