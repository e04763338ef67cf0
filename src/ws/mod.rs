//! WebSocket participant sessions

pub mod handler;
pub mod protocol;
pub mod session;
