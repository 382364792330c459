//! Domain models for the portal.

pub mod session;

pub use session::{CurrentUser, keys as session_keys};
