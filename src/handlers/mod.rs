//! HTTP and WebSocket request handlers
//!
//! This module organizes all API handlers into logical groups:
//! - `api` - Health check and prompt endpoints
//! - `hints` - Reply suggestions for live sessions
//! - `realtime` - Tutoring WebSocket sessions bridged to the upstream API
//! - `sessions` - Stored session creation and detail

pub mod api;
pub mod hints;
pub mod realtime;
pub mod sessions;

// Re-export commonly used handlers for convenient access
pub use realtime::{chat_handler, demo_chat_handler, guest_chat_handler};
