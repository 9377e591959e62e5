//! `POST /api/auth/register`

use std::sync::{Arc, LazyLock};

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::domain::directory::{NewUser, UserRecord};
use crate::error::ApiError;
use crate::http::extract::Payload;
use crate::http::server::AppState;
use crate::pipeline::GuardPolicy;
use crate::validation::field::as_text;
use crate::validation::{BusinessRule, EntityRule, FieldRule, PasswordPolicy, ValidationPlan};

static REGISTRATION: LazyLock<ValidationPlan> = LazyLock::new(|| {
    ValidationPlan::new()
        .field("username", [FieldRule::Required, FieldRule::Username])
        .field("email", [FieldRule::Required, FieldRule::Email])
        .field("password", [FieldRule::Required, FieldRule::Password(PasswordPolicy::default())])
        .field("password_confirm", [FieldRule::Required])
        .field("phone", [FieldRule::Phone])
        .entity(EntityRule::matches("password", "password_confirm"))
        .business(BusinessRule::unique("users", "username"))
        .business(BusinessRule::unique("users", "email"))
});

pub async fn register(
    State(state): State<AppState>,
    Extension(policy): Extension<Arc<GuardPolicy>>,
    Payload(data): Payload,
) -> Result<(StatusCode, Json<UserRecord>), ApiError> {
    policy.validation().validate(&REGISTRATION, &data).await?.into_result()?;

    let text = |name: &str| data.get(name).and_then(as_text).map(|t| t.trim().to_string());
    let user = NewUser {
        username: text("username").unwrap_or_default(),
        email: text("email").unwrap_or_default(),
        phone: text("phone").filter(|p| !p.is_empty()),
    };

    let record = state.directory.register_user(user)?;
    tracing::info!(user_id = record.id, username = %record.username, "User registered");
    Ok((StatusCode::CREATED, Json(record)))
}
