//! Core types for the Submissions Hub.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod conversation;
pub mod email;
pub mod role;

pub use conversation::ConversationId;
pub use email::{Email, EmailError};
pub use role::Role;
