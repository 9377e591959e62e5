//! Principal resolution from API tokens.
//!
//! Authentication is a collaborator: the guard asks "who is this?" and never
//! fails a request here. An unknown or malformed token is simply anonymous.

use std::collections::HashMap;

use axum::http::{header, HeaderMap};
use serde::Serialize;

use crate::config::TokenConfig;

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Principal {
    pub user_id: String,
    pub role: String,
}

/// Resolves the authenticated principal of a request, if any.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap) -> Option<Principal>;
}

/// Authenticator backed by a fixed token table.
#[derive(Debug, Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenAuthenticator {
    pub fn from_config(tokens: &[TokenConfig]) -> Self {
        let tokens = tokens
            .iter()
            .map(|t| {
                (
                    t.token.clone(),
                    Principal {
                        user_id: t.user_id.clone(),
                        role: t.role.clone(),
                    },
                )
            })
            .collect();
        Self { tokens }
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> Option<Principal> {
        let token = api_token(headers)?;
        self.tokens.get(token).cloned()
    }
}

/// Extract the credential from `Authorization: Token <key>` or `Bearer <key>`.
pub fn api_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer") {
        let token = token.trim();
        (!token.is_empty()).then_some(token)
    } else {
        None
    }
}
