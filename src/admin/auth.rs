use axum::{extract::Request, middleware::Next, response::Response, Extension};

use crate::error::ApiError;
use crate::http::extract::require_role;
use crate::http::request::SharedContext;

/// 401 for anonymous callers, 403 for any role other than `admin`.
pub async fn admin_auth_middleware(
    Extension(ctx): Extension<SharedContext>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    require_role(ctx.identity(), &["admin"])?;
    Ok(next.run(request).await)
}
