//! Handing rejections to the ingress layer.
//!
//! Stages and handlers never render error bodies themselves. Returning an
//! [`ApiError`] yields a placeholder response tagged with a [`Rejection`]
//! extension; the ingress layer swaps it for the normalized envelope once it
//! has the request context at hand.

use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;

/// Response extension carrying the error a stage or handler ended with.
#[derive(Debug, Clone)]
pub struct Rejection(pub ApiError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response.extensions_mut().insert(Rejection(self));
        response
    }
}

/// `CatchPanicLayer` hook. The panic payload becomes internal fault detail.
pub fn panic_to_rejection(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };
    ApiError::internal(format!("handler panicked: {detail}")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_api_error_tags_response() {
        let response = ApiError::AuthenticationRequired.into_response();
        let rejection = response.extensions().get::<Rejection>().unwrap();
        assert_eq!(rejection.0.code(), ErrorCode::AuthenticationRequired);
    }

    #[test]
    fn test_panic_message_kept_as_detail() {
        let response = panic_to_rejection(Box::new("boom"));
        match &response.extensions().get::<Rejection>().unwrap().0 {
            ApiError::Internal(detail) => assert_eq!(detail, "handler panicked: boom"),
            other => panic!("unexpected rejection {other:?}"),
        }
    }
}
