//! Business-rule checks.
//!
//! These need persisted state, reached only through the [`Lookup`] seam. The
//! engine owns no storage and bounds every lookup with a timeout.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde_json::{Map, Value};

use crate::validation::field::{as_text, parse_date, parse_time};
use crate::validation::FieldError;

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("lookup backend failed: {0}")]
    Backend(String),
}

/// A proposed reservation of one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub resource_id: String,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Reservation {
    pub fn overlaps(&self, other: &Reservation) -> bool {
        self.resource_id == other.resource_id
            && self.date == other.date
            && self.start < other.end
            && other.start < self.end
    }
}

/// Read access to domain state, supplied by the persistence collaborator.
#[async_trait]
pub trait Lookup: Send + Sync {
    /// Whether `value` is already taken for `field` within `scope` (e.g. users).
    async fn value_exists(&self, scope: &str, field: &str, value: &str) -> Result<bool, LookupError>;

    async fn reservation_conflicts(&self, reservation: &Reservation) -> Result<bool, LookupError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusinessRule {
    /// Case-insensitive uniqueness of `field` within `scope`.
    Unique { scope: String, field: String },
    /// The proposed slot must not overlap an existing reservation. Reported
    /// against `start`.
    NoReservationConflict {
        resource: String,
        date: String,
        start: String,
        end: String,
    },
}

impl BusinessRule {
    pub fn unique(scope: impl Into<String>, field: impl Into<String>) -> Self {
        BusinessRule::Unique {
            scope: scope.into(),
            field: field.into(),
        }
    }

    pub fn no_reservation_conflict(
        resource: impl Into<String>,
        date: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        BusinessRule::NoReservationConflict {
            resource: resource.into(),
            date: date.into(),
            start: start.into(),
            end: end.into(),
        }
    }

    pub fn target(&self) -> &str {
        match self {
            BusinessRule::Unique { field, .. } => field.as_str(),
            BusinessRule::NoReservationConflict { start, .. } => start.as_str(),
        }
    }

    pub fn inputs(&self) -> Vec<&str> {
        match self {
            BusinessRule::Unique { field, .. } => vec![field.as_str()],
            BusinessRule::NoReservationConflict {
                resource,
                date,
                start,
                end,
            } => vec![resource.as_str(), date.as_str(), start.as_str(), end.as_str()],
        }
    }

    /// Inputs that are missing or malformed skip the check.
    pub async fn check(
        &self,
        data: &Map<String, Value>,
        lookup: &dyn Lookup,
    ) -> Result<Option<FieldError>, LookupError> {
        match self {
            BusinessRule::Unique { scope, field } => {
                let Some(value) = data.get(field).and_then(as_text) else {
                    return Ok(None);
                };
                let taken = lookup.value_exists(scope, field, &value.to_lowercase()).await?;
                Ok(taken.then(|| {
                    FieldError::new(field, "already_exists", format!("This {field} is already taken."))
                }))
            }
            BusinessRule::NoReservationConflict {
                resource,
                date,
                start,
                end,
            } => {
                let text = |name: &str| data.get(name).and_then(as_text).map(|t| t.into_owned());
                let reservation = (|| {
                    Some(Reservation {
                        resource_id: text(resource)?,
                        date: parse_date(&text(date)?)?,
                        start: parse_time(&text(start)?)?,
                        end: parse_time(&text(end)?)?,
                    })
                })();
                let Some(reservation) = reservation else {
                    return Ok(None);
                };
                let conflict = lookup.reservation_conflicts(&reservation).await?;
                Ok(conflict.then(|| {
                    FieldError::new(
                        start,
                        "reservation_conflict",
                        "This time slot overlaps an existing reservation.",
                    )
                }))
            }
        }
    }
}
