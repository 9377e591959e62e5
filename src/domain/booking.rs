//! `POST /api/bookings`

use std::sync::{Arc, LazyLock};

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{NaiveDate, Utc};
use regex::Regex;

use crate::domain::directory::BookingRecord;
use crate::error::ApiError;
use crate::http::extract::{require_role, Payload};
use crate::http::request::SharedContext;
use crate::http::server::AppState;
use crate::pipeline::GuardPolicy;
use crate::validation::field::{as_text, parse_date, parse_time};
use crate::validation::{BusinessRule, EntityRule, FieldRule, Reservation, Submission, ValidationPlan};

const MIN_BOOKING_MINUTES: i64 = 30;

static PITCH_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("pitch id pattern compiles"));

static BOOKING: LazyLock<ValidationPlan> = LazyLock::new(|| {
    ValidationPlan::new()
        .field(
            "pitch_id",
            [
                FieldRule::Required,
                FieldRule::pattern(PITCH_ID.clone(), "Enter a valid pitch identifier."),
            ],
        )
        .field("date", [FieldRule::Required, FieldRule::Date])
        .field("start_time", [FieldRule::Required, FieldRule::Time])
        .field("end_time", [FieldRule::Required, FieldRule::Time])
        .field("notes", [FieldRule::length(0, 500)])
        .entity(EntityRule::time_order("start_time", "end_time", MIN_BOOKING_MINUTES))
        .business(BusinessRule::no_reservation_conflict("pitch_id", "date", "start_time", "end_time"))
});

pub async fn create_booking(
    State(state): State<AppState>,
    Extension(policy): Extension<Arc<GuardPolicy>>,
    Extension(ctx): Extension<SharedContext>,
    Payload(data): Payload,
) -> Result<(StatusCode, Json<BookingRecord>), ApiError> {
    let user_id = require_role(ctx.identity(), &["player", "admin"])?;

    policy.validation().validate(&BOOKING, &data).await?.into_result()?;

    let slot = reservation(&data)
        .ok_or_else(|| ApiError::internal("validated booking did not parse"))?;
    ensure_not_in_past(slot.date, Utc::now().date_naive())?;

    let record = state.directory.add_reservation(user_id, slot)?;
    tracing::info!(
        booking_id = record.id,
        user_id = %record.user_id,
        pitch_id = %record.pitch_id,
        "Booking created"
    );
    Ok((StatusCode::CREATED, Json(record)))
}

fn reservation(data: &Submission) -> Option<Reservation> {
    let text = |name: &str| data.get(name).and_then(as_text).map(|t| t.into_owned());
    Some(Reservation {
        resource_id: text("pitch_id")?,
        date: parse_date(&text("date")?)?,
        start: parse_time(&text("start_time")?)?,
        end: parse_time(&text("end_time")?)?,
    })
}

fn ensure_not_in_past(date: NaiveDate, today: NaiveDate) -> Result<(), ApiError> {
    if date < today {
        return Err(ApiError::business_rule(
            "booking_in_past",
            "Bookings cannot be made for dates in the past.",
        ));
    }
    Ok(())
}
