//! Clients for the external services the portal talks to.

pub mod identity;
pub mod relay;

pub use identity::{AuthSession, AuthUser, IdentityClient, IdentityError, OtpType, PkceVerifier};
pub use relay::{ChatTurn, Envelope, RelayClient, RelayError, RequestContext, StopRequest};
