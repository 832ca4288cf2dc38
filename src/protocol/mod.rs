//! Chat wire protocol
//!
//! Defines the JSON frames exchanged with the chat server: inbound chat posts
//! and outbound replies.

mod messages;

pub use messages::*;
