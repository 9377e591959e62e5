//! Cross-field checks on one submitted entity.

use serde_json::{Map, Value};

use crate::validation::field::{as_text, is_blank, parse_time};
use crate::validation::FieldError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRule {
    /// `confirm` must equal `field`. Reported against `confirm`.
    Matches { field: String, confirm: String },
    /// `end` must follow `start` by at least `min_minutes`. Reported against `end`.
    TimeOrder {
        start: String,
        end: String,
        min_minutes: i64,
    },
}

impl EntityRule {
    pub fn matches(field: impl Into<String>, confirm: impl Into<String>) -> Self {
        EntityRule::Matches {
            field: field.into(),
            confirm: confirm.into(),
        }
    }

    pub fn time_order(start: impl Into<String>, end: impl Into<String>, min_minutes: i64) -> Self {
        EntityRule::TimeOrder {
            start: start.into(),
            end: end.into(),
            min_minutes,
        }
    }

    /// Field the error is attributed to.
    pub fn target(&self) -> &str {
        match self {
            EntityRule::Matches { confirm, .. } => confirm.as_str(),
            EntityRule::TimeOrder { end, .. } => end.as_str(),
        }
    }

    /// Every field the rule reads.
    pub fn inputs(&self) -> [&str; 2] {
        match self {
            EntityRule::Matches { field, confirm } => [field.as_str(), confirm.as_str()],
            EntityRule::TimeOrder { start, end, .. } => [start.as_str(), end.as_str()],
        }
    }

    /// Missing or unparseable inputs are left to the field layer.
    pub fn check(&self, data: &Map<String, Value>) -> Option<FieldError> {
        match self {
            EntityRule::Matches { field, confirm } => {
                let (a, b) = (data.get(field), data.get(confirm));
                if is_blank(a) || is_blank(b) {
                    return None;
                }
                let same = a.and_then(as_text) == b.and_then(as_text);
                (!same).then(|| {
                    FieldError::new(confirm, "mismatch", format!("Must match the {field} field."))
                })
            }
            EntityRule::TimeOrder {
                start,
                end,
                min_minutes,
            } => {
                let parse = |name: &str| data.get(name).and_then(as_text).and_then(|t| parse_time(&t));
                let (from, to) = (parse(start)?, parse(end)?);
                if to <= from {
                    return Some(FieldError::new(
                        end,
                        "end_before_start",
                        "End time must be after start time.",
                    ));
                }
                let minutes = (to - from).num_minutes();
                (minutes < *min_minutes).then(|| {
                    FieldError::new(
                        end,
                        "duration_too_short",
                        format!("Must be at least {min_minutes} minutes after the start time."),
                    )
                })
            }
        }
    }
}
