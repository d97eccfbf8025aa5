//! Caller identity for the status page. Display only, never used to
//! authorize anything.

use async_trait::async_trait;
use serde::Serialize;
use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallerProfile {
    pub login_name: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_pic_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("identity lookup: {0}")]
pub struct IdentityError(pub String);

/// Resolve a remote address to a human. `Ok(None)` means "don't know",
/// which is not an error.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    async fn whois(&self, peer: SocketAddr) -> Result<Option<CallerProfile>, IdentityError>;
}

/// Default lookup: nobody is ever identified.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIdentity;

#[async_trait]
impl IdentityLookup for NoIdentity {
    async fn whois(&self, _peer: SocketAddr) -> Result<Option<CallerProfile>, IdentityError> {
        Ok(None)
    }
}
