//! Submissions Hub portal library.
//!
//! This crate provides the portal as a library so the router can be built
//! and exercised in integration tests without binding a socket.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
