//! Identity resolution.
//!
//! Every request gets an identity: the authenticated principal when the
//! credential is valid, the normalized client address otherwise. There is no
//! failure path, so rate limiting applies uniformly to anonymous traffic.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderMap;
use serde::Serialize;

use crate::security::access_control::{Authenticator, Principal};
use crate::security::headers::client_address;

/// Key against which rate limits and audit entries are attributed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    User { id: String, role: String },
    Address { ip: String },
}

impl Identity {
    pub fn address(ip: impl Into<String>) -> Self {
        Identity::Address { ip: ip.into() }
    }

    pub fn user(id: impl Into<String>, role: impl Into<String>) -> Self {
        Identity::User {
            id: id.into(),
            role: role.into(),
        }
    }

    /// Stable string key, `user:<id>` or `addr:<ip>`.
    pub fn key(&self) -> String {
        self.to_string()
    }

    pub fn role(&self) -> Option<&str> {
        match self {
            Identity::User { role, .. } => Some(role),
            Identity::Address { .. } => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::User { .. })
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::User { id, .. } => write!(f, "user:{id}"),
            Identity::Address { ip } => write!(f, "addr:{ip}"),
        }
    }
}

impl From<Principal> for Identity {
    fn from(p: Principal) -> Self {
        Identity::User {
            id: p.user_id,
            role: p.role,
        }
    }
}

/// Derives an [`Identity`] from request headers and the socket peer.
#[derive(Clone)]
pub struct IdentityResolver {
    authenticator: Arc<dyn Authenticator>,
    trust_forwarded_for: bool,
}

impl IdentityResolver {
    pub fn new(authenticator: Arc<dyn Authenticator>, trust_forwarded_for: bool) -> Self {
        Self {
            authenticator,
            trust_forwarded_for,
        }
    }

    pub fn resolve(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> Identity {
        match self.authenticator.authenticate(headers) {
            Some(principal) => principal.into(),
            None => Identity::address(client_address(headers, peer, self.trust_forwarded_for)),
        }
    }
}
