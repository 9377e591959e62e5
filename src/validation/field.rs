//! Field-level validators.
//!
//! Pure functions over one submitted value. Each yields at most one
//! [`FieldError`]. Absent or blank values only fail [`FieldRule::Required`];
//! every other rule treats them as "not provided" and passes.

use std::borrow::Cow;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use regex::{Regex, RegexSet};
use serde_json::Value;

use crate::validation::FieldError;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("email pattern compiles")
});

static USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{3,30}$").expect("username pattern compiles"));

static SPECIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[!@#$%^&*()_+\-=\[\]{};:'"\\|,.<>/?]"#).expect("special character pattern compiles")
});

static WEAK_PASSWORD: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"123456|654321|111111|000000",
        r"qwerty|asdf|zxcv",
        r"password|admin|letmein|welcome",
    ])
    .expect("weak password patterns compile")
});

const MAX_EMAIL_LEN: usize = 254;

/// Requirements for [`FieldRule::Password`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_upper: bool,
    pub require_lower: bool,
    pub require_digit: bool,
    pub require_special: bool,
    pub reject_weak_patterns: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_upper: true,
            require_lower: true,
            require_digit: true,
            require_special: true,
            reject_weak_patterns: true,
        }
    }
}

/// A single-value rule with its options.
#[derive(Debug, Clone)]
pub enum FieldRule {
    Required,
    Email,
    /// Character count bounds, after trimming.
    Length { min: usize, max: usize },
    /// Whole-value pattern with a caller-supplied message.
    Pattern { regex: Regex, message: String },
    /// Inclusive numeric bounds. Numeric strings are accepted.
    Range { min: f64, max: f64 },
    Password(PasswordPolicy),
    Username,
    /// 7 to 15 digits once separators are stripped.
    Phone,
    /// `YYYY-MM-DD`.
    Date,
    /// `HH:MM`, 24-hour.
    Time,
    Choice(Vec<String>),
}

impl FieldRule {
    pub fn length(min: usize, max: usize) -> Self {
        FieldRule::Length { min, max }
    }

    pub fn range(min: f64, max: f64) -> Self {
        FieldRule::Range { min, max }
    }

    pub fn pattern(regex: Regex, message: impl Into<String>) -> Self {
        FieldRule::Pattern {
            regex,
            message: message.into(),
        }
    }

    pub fn choice<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldRule::Choice(options.into_iter().map(Into::into).collect())
    }

    pub fn check(&self, field: &str, value: Option<&Value>) -> Option<FieldError> {
        if let FieldRule::Required = self {
            return is_blank(value).then(|| FieldError::required(field));
        }

        let value = value.filter(|v| !is_blank(Some(*v)))?;

        if let FieldRule::Range { min, max } = self {
            return check_range(field, value, *min, *max);
        }

        let Some(text) = as_text(value) else {
            return Some(FieldError::new(field, "invalid_type", "Expected a text value."));
        };

        match self {
            FieldRule::Required | FieldRule::Range { .. } => None,
            FieldRule::Email => check_email(field, &text),
            FieldRule::Length { min, max } => check_length(field, &text, *min, *max),
            FieldRule::Pattern { regex, message } => {
                (!regex.is_match(&text)).then(|| FieldError::new(field, "invalid_format", message.clone()))
            }
            FieldRule::Password(policy) => check_password(field, &text, policy),
            FieldRule::Username => (!USERNAME.is_match(&text)).then(|| {
                FieldError::new(
                    field,
                    "invalid_username",
                    "Username must be 3-30 characters long and contain only letters, numbers, and underscores.",
                )
            }),
            FieldRule::Phone => check_phone(field, &text),
            FieldRule::Date => parse_date(&text)
                .is_none()
                .then(|| FieldError::new(field, "invalid_date", "Enter a valid date (YYYY-MM-DD).")),
            FieldRule::Time => parse_time(&text)
                .is_none()
                .then(|| FieldError::new(field, "invalid_time", "Enter a valid time (HH:MM).")),
            FieldRule::Choice(options) => (!options.iter().any(|o| o == text.as_ref())).then(|| {
                FieldError::new(
                    field,
                    "invalid_choice",
                    format!("Select one of: {}.", options.join(", ")),
                )
            }),
        }
    }
}

/// Missing, null and whitespace-only strings count as not provided.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Scalar values rendered as text; arrays and objects have no text form.
pub fn as_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(Cow::Borrowed(s.trim())),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        _ => None,
    }
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

pub fn parse_time(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M").ok()
}

fn check_email(field: &str, text: &str) -> Option<FieldError> {
    (text.len() > MAX_EMAIL_LEN || !EMAIL.is_match(text))
        .then(|| FieldError::new(field, "invalid_email", "Enter a valid email address."))
}

fn check_length(field: &str, text: &str, min: usize, max: usize) -> Option<FieldError> {
    let len = text.chars().count();
    if len < min {
        Some(FieldError::new(
            field,
            "too_short",
            format!("Must be at least {min} characters long."),
        ))
    } else if len > max {
        Some(FieldError::new(
            field,
            "too_long",
            format!("Must be at most {max} characters long."),
        ))
    } else {
        None
    }
}

fn check_range(field: &str, value: &Value, min: f64, max: f64) -> Option<FieldError> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        None => Some(FieldError::new(field, "invalid_number", "Enter a valid number.")),
        Some(n) if n < min || n > max => Some(FieldError::new(
            field,
            "out_of_range",
            format!("Must be between {min} and {max}."),
        )),
        Some(_) => None,
    }
}

fn check_phone(field: &str, text: &str) -> Option<FieldError> {
    let allowed = text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')' | '.'));
    let digits = text.chars().filter(char::is_ascii_digit).count();
    (!allowed || !(7..=15).contains(&digits))
        .then(|| FieldError::new(field, "invalid_phone", "Invalid phone number format."))
}

fn check_password(field: &str, text: &str, policy: &PasswordPolicy) -> Option<FieldError> {
    let fail = |message: String| Some(FieldError::new(field, "weak_password", message));

    if text.chars().count() < policy.min_length {
        return fail(format!(
            "Password must be at least {} characters long.",
            policy.min_length
        ));
    }
    if policy.require_upper && !text.chars().any(|c| c.is_ascii_uppercase()) {
        return fail("Password must contain at least one uppercase letter (A-Z).".into());
    }
    if policy.require_lower && !text.chars().any(|c| c.is_ascii_lowercase()) {
        return fail("Password must contain at least one lowercase letter (a-z).".into());
    }
    if policy.require_digit && !text.chars().any(|c| c.is_ascii_digit()) {
        return fail("Password must contain at least one number (0-9).".into());
    }
    if policy.require_special && !SPECIAL.is_match(text) {
        return fail("Password must contain at least one special character (!@#$%^&* etc.).".into());
    }
    if policy.reject_weak_patterns {
        let lower = text.to_lowercase();
        if WEAK_PASSWORD.is_match(&lower) || has_triple_repeat(&lower) {
            return fail(
                "Password contains common weak patterns. Please choose a stronger password.".into(),
            );
        }
    }
    None
}

fn has_triple_repeat(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    chars.windows(3).any(|w| w[0] == w[1] && w[1] == w[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn code(rule: &FieldRule, value: Value) -> Option<String> {
        rule.check("f", Some(&value)).map(|e| e.code)
    }

    #[test]
    fn test_required() {
        assert_eq!(FieldRule::Required.check("email", None).unwrap().message, "This field is required.");
        assert!(FieldRule::Required.check("email", Some(&json!("  "))).is_some());
        assert!(FieldRule::Required.check("email", Some(&json!(null))).is_some());
        assert!(FieldRule::Required.check("email", Some(&json!(0))).is_none());
    }

    #[test]
    fn test_optional_rules_skip_blank_values() {
        assert!(FieldRule::Email.check("email", None).is_none());
        assert!(FieldRule::Email.check("email", Some(&json!(""))).is_none());
    }

    #[test]
    fn test_email() {
        assert_eq!(code(&FieldRule::Email, json!("ana@example.com")), None);
        assert_eq!(code(&FieldRule::Email, json!("ana@")).as_deref(), Some("invalid_email"));
        assert_eq!(code(&FieldRule::Email, json!("ana@localhost")).as_deref(), Some("invalid_email"));
        assert_eq!(code(&FieldRule::Email, json!(["a@b.c"])).as_deref(), Some("invalid_type"));
    }

    #[test]
    fn test_length_counts_characters() {
        let rule = FieldRule::length(2, 4);
        assert_eq!(code(&rule, json!("ñañ")), None);
        assert_eq!(code(&rule, json!("a")).as_deref(), Some("too_short"));
        assert_eq!(code(&rule, json!("abcde")).as_deref(), Some("too_long"));
    }

    #[test]
    fn test_range_accepts_numeric_strings() {
        let rule = FieldRule::range(1.0, 5.0);
        assert_eq!(code(&rule, json!(3)), None);
        assert_eq!(code(&rule, json!("4.5")), None);
        assert_eq!(code(&rule, json!(6)).as_deref(), Some("out_of_range"));
        assert_eq!(code(&rule, json!("many")).as_deref(), Some("invalid_number"));
    }

    #[test]
    fn test_password_policy() {
        let rule = FieldRule::Password(PasswordPolicy::default());
        assert_eq!(code(&rule, json!("Str0ng!Pitch")), None);
        let short = rule.check("password", Some(&json!("Ab1!"))).unwrap();
        assert_eq!(short.message, "Password must be at least 8 characters long.");
        assert!(rule.check("password", Some(&json!("nouppercase1!"))).is_some());
        assert!(rule.check("password", Some(&json!("NoSpecial123"))).is_some());
        assert!(rule.check("password", Some(&json!("Qwerty!Field9"))).is_some());
        assert!(rule.check("password", Some(&json!("Paaa!ssw9X"))).is_some());
    }

    #[test]
    fn test_username_phone_date_time_choice() {
        assert_eq!(code(&FieldRule::Username, json!("striker_9")), None);
        assert!(code(&FieldRule::Username, json!("no spaces")).is_some());
        assert_eq!(code(&FieldRule::Phone, json!("+234 (801) 555-0199")), None);
        assert!(code(&FieldRule::Phone, json!("12345")).is_some());
        assert!(code(&FieldRule::Phone, json!("call me")).is_some());
        assert_eq!(code(&FieldRule::Date, json!("2026-02-28")), None);
        assert!(code(&FieldRule::Date, json!("2026-02-30")).is_some());
        assert_eq!(code(&FieldRule::Time, json!("18:30")), None);
        assert!(code(&FieldRule::Time, json!("25:00")).is_some());
        let surface = FieldRule::choice(["grass", "turf"]);
        assert_eq!(code(&surface, json!("turf")), None);
        assert_eq!(code(&surface, json!("sand")).as_deref(), Some("invalid_choice"));
    }
}
