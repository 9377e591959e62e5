//! Extractors and access checks for domain handlers.

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use serde_json::Value;

use crate::error::ApiError;
use crate::pipeline::identity::Identity;
use crate::validation::{FieldError, Submission, ValidationReport};

/// A JSON object body. Anything else is a validation failure on `body`.
#[derive(Debug, Clone)]
pub struct Payload(pub Submission);

impl<S> FromRequest<S> for Payload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(ApiError::internal)?;

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(Payload(map)),
            Ok(_) => Err(body_error("not_an_object", "Request body must be a JSON object.")),
            Err(_) => Err(body_error("invalid_json", "Request body is not valid JSON.")),
        }
    }
}

pub(crate) fn body_error(code: &str, message: &str) -> ApiError {
    let mut report = ValidationReport::new();
    report.push(FieldError::new("body", code, message));
    ApiError::Validation(report)
}

/// The caller's user id and role, or 401.
pub fn require_authenticated(identity: &Identity) -> Result<(&str, &str), ApiError> {
    match identity {
        Identity::User { id, role } => Ok((id, role)),
        Identity::Address { .. } => Err(ApiError::AuthenticationRequired),
    }
}

/// 401 for anonymous callers, 403 when the role is not in `allowed`.
pub fn require_role<'a>(identity: &'a Identity, allowed: &[&str]) -> Result<&'a str, ApiError> {
    let (id, role) = require_authenticated(identity)?;
    if allowed.contains(&role) {
        Ok(id)
    } else {
        Err(ApiError::PermissionDenied(format!("role '{role}' may not access this resource")))
    }
}
