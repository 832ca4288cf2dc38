//! Chat server transport
//!
//! Handles the WebSocket connection to the chat server, including:
//! - Connection establishment with auto-reconnect
//! - Inbound chat frame decoding
//! - Outbound reply delivery

mod client;

pub use client::*;
