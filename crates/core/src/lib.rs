//! Submissions Hub Core - Shared types and pure logic.
//!
//! This crate provides the pieces used across all Submissions Hub components:
//! - `portal` - HTTP backend for the staff portal
//! - `cli` - Operator tools for checking the access policy
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no global state. Everything here is deterministic for a given
//! input, which keeps it trivially testable and usable anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for emails, roles and conversation ids
//! - [`access`] - The access gate (admin allowlist + allowed email domains)
//! - [`chat`] - Conversation history and the actions the workflow engine may request
//! - [`relay`] - Normalization of loosely shaped workflow webhook replies

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod access;
pub mod chat;
pub mod relay;
pub mod types;

pub use access::{AccessDecision, AccessPolicy, AccessReason};
pub use chat::{ActionKind, ChatAction, HistoryEntry, Sender};
pub use relay::{NormalizedReply, normalize_reply};
pub use types::*;
