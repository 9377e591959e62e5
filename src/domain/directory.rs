//! In-process user and reservation store.
//!
//! Serves as the [`Lookup`] collaborator for business rules and as the write
//! side of the reference handlers. Writes re-check uniqueness and overlap
//! under the lock, so a race that slips past validation still fails cleanly.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::error::ApiError;
use crate::validation::{Lookup, LookupError, Reservation};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingRecord {
    pub id: u64,
    pub user_id: String,
    pub pitch_id: String,
    pub date: chrono::NaiveDate,
    pub start_time: chrono::NaiveTime,
    pub end_time: chrono::NaiveTime,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("{0} is already registered")]
    Duplicate(&'static str),

    #[error("slot overlaps an existing booking")]
    Conflict,
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Duplicate(field) => {
                ApiError::business_rule("unique_account", format!("This {field} is already taken."))
            }
            DirectoryError::Conflict => ApiError::business_rule(
                "no_double_booking",
                "This time slot was booked by someone else.",
            ),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    next_id: AtomicU64,
    users: RwLock<Vec<UserRecord>>,
    bookings: RwLock<Vec<BookingRecord>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Usernames and emails are stored lowercased.
    pub fn register_user(&self, user: NewUser) -> Result<UserRecord, DirectoryError> {
        let username = user.username.trim().to_lowercase();
        let email = user.email.trim().to_lowercase();

        let mut users = self.users.write();
        if users.iter().any(|u| u.username == username) {
            return Err(DirectoryError::Duplicate("username"));
        }
        if users.iter().any(|u| u.email == email) {
            return Err(DirectoryError::Duplicate("email"));
        }

        let record = UserRecord {
            id: self.allocate_id(),
            username,
            email,
            phone: user.phone,
            role: "player".to_string(),
            created_at: Utc::now(),
        };
        users.push(record.clone());
        Ok(record)
    }

    pub fn add_reservation(&self, user_id: &str, slot: Reservation) -> Result<BookingRecord, DirectoryError> {
        let mut bookings = self.bookings.write();
        if bookings.iter().any(|b| as_reservation(b).overlaps(&slot)) {
            return Err(DirectoryError::Conflict);
        }

        let record = BookingRecord {
            id: self.allocate_id(),
            user_id: user_id.to_string(),
            pitch_id: slot.resource_id,
            date: slot.date,
            start_time: slot.start,
            end_time: slot.end,
            created_at: Utc::now(),
        };
        bookings.push(record.clone());
        Ok(record)
    }

    pub fn user_count(&self) -> usize {
        self.users.read().len()
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.read().len()
    }
}

fn as_reservation(booking: &BookingRecord) -> Reservation {
    Reservation {
        resource_id: booking.pitch_id.clone(),
        date: booking.date,
        start: booking.start_time,
        end: booking.end_time,
    }
}

#[async_trait]
impl Lookup for InMemoryDirectory {
    async fn value_exists(&self, scope: &str, field: &str, value: &str) -> Result<bool, LookupError> {
        let users = self.users.read();
        match (scope, field) {
            ("users", "username") => Ok(users.iter().any(|u| u.username == value)),
            ("users", "email") => Ok(users.iter().any(|u| u.email == value)),
            _ => Err(LookupError::Backend(format!("no index for {scope}.{field}"))),
        }
    }

    async fn reservation_conflicts(&self, reservation: &Reservation) -> Result<bool, LookupError> {
        Ok(self
            .bookings
            .read()
            .iter()
            .any(|b| as_reservation(b).overlaps(reservation)))
    }
}
