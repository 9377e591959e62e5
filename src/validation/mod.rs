//! Validation engine.
//!
//! # Data Flow
//! ```text
//! Submission (JSON object)
//!     → field.rs     per-field rules, first failure per field wins
//!     → entity.rs    cross-field rules, skipped for fields that already failed
//!     → business.rs  lookups through the injected Lookup, same skip rule
//!     → ValidationReport (empty = valid)
//! ```
//!
//! Every layer runs to completion so the caller sees all problems at once.
//! A lookup fault is not a validation result: it surfaces as [`LookupError`]
//! and becomes an internal error.

pub mod business;
pub mod entity;
pub mod field;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

pub use business::{BusinessRule, Lookup, LookupError, Reservation};
pub use entity::EntityRule;
pub use field::{FieldRule, PasswordPolicy};

/// A submitted entity: the top-level JSON object of a request body.
pub type Submission = Map<String, Value>;

/// One validation failure attributable to a single named field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn required(field: impl Into<String>) -> Self {
        Self::new(field, "required", "This field is required.")
    }
}

/// Ordered, growable list of [`FieldError`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    errors: Vec<FieldError>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn has_error_for(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// The failing field when exactly one field failed.
    pub fn sole_field(&self) -> Option<&str> {
        let fields: BTreeSet<&str> = self.errors.iter().map(|e| e.field.as_str()).collect();
        match fields.len() {
            1 => fields.into_iter().next(),
            _ => None,
        }
    }

    /// `"<field>: <message>"` per error, in report order.
    pub fn details(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect()
    }

    /// An empty report is the only success.
    pub fn into_result(self) -> Result<(), ValidationReport> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// The typed set of checks for one entity.
#[derive(Debug, Clone, Default)]
pub struct ValidationPlan {
    fields: Vec<(String, Vec<FieldRule>)>,
    entity: Vec<EntityRule>,
    business: Vec<BusinessRule>,
}

impl ValidationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, rules: impl IntoIterator<Item = FieldRule>) -> Self {
        self.fields.push((name.into(), rules.into_iter().collect()));
        self
    }

    pub fn entity(mut self, rule: EntityRule) -> Self {
        self.entity.push(rule);
        self
    }

    pub fn business(mut self, rule: BusinessRule) -> Self {
        self.business.push(rule);
        self
    }

    /// Field and entity layers. No I/O.
    pub fn check_local(&self, data: &Submission) -> ValidationReport {
        let mut report = ValidationReport::new();

        for (name, rules) in &self.fields {
            let value = data.get(name);
            if let Some(error) = rules.iter().find_map(|rule| rule.check(name, value)) {
                report.push(error);
            }
        }

        for rule in &self.entity {
            if blocked(&report, rule.target(), rule.inputs()) {
                continue;
            }
            if let Some(error) = rule.check(data) {
                report.push(error);
            }
        }

        report
    }
}

fn blocked<'a>(report: &ValidationReport, target: &str, inputs: impl IntoIterator<Item = &'a str>) -> bool {
    report.has_error_for(target) || inputs.into_iter().any(|f| report.has_error_for(f))
}

/// Runs [`ValidationPlan`]s against the lookup collaborator.
#[derive(Clone)]
pub struct ValidationEngine {
    lookup: Arc<dyn Lookup>,
    lookup_timeout: Duration,
}

impl ValidationEngine {
    pub fn new(lookup: Arc<dyn Lookup>, lookup_timeout: Duration) -> Self {
        Self {
            lookup,
            lookup_timeout,
        }
    }

    pub async fn validate(&self, plan: &ValidationPlan, data: &Submission) -> Result<ValidationReport, LookupError> {
        let mut report = plan.check_local(data);

        for rule in &plan.business {
            if blocked(&report, rule.target(), rule.inputs()) {
                continue;
            }
            let outcome = tokio::time::timeout(self.lookup_timeout, rule.check(data, self.lookup.as_ref()))
                .await
                .map_err(|_| LookupError::Timeout(self.lookup_timeout))??;
            if let Some(error) = outcome {
                report.push(error);
            }
        }

        if !report.is_empty() {
            tracing::debug!(
                errors = report.len(),
                fields = ?report.errors().iter().map(|e| e.field.as_str()).collect::<Vec<_>>(),
                "Validation failed"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Taken(&'static str);

    #[async_trait]
    impl Lookup for Taken {
        async fn value_exists(&self, _scope: &str, _field: &str, value: &str) -> Result<bool, LookupError> {
            Ok(value == self.0)
        }

        async fn reservation_conflicts(&self, _r: &Reservation) -> Result<bool, LookupError> {
            Ok(false)
        }
    }

    struct Stalled;

    #[async_trait]
    impl Lookup for Stalled {
        async fn value_exists(&self, _: &str, _: &str, _: &str) -> Result<bool, LookupError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(false)
        }

        async fn reservation_conflicts(&self, _r: &Reservation) -> Result<bool, LookupError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(false)
        }
    }

    fn registration() -> ValidationPlan {
        ValidationPlan::new()
            .field("username", [FieldRule::Required, FieldRule::Username])
            .field("email", [FieldRule::Required, FieldRule::Email])
            .field("password", [FieldRule::Required, FieldRule::Password(PasswordPolicy::default())])
            .field("password_confirm", [FieldRule::Required])
            .entity(EntityRule::matches("password", "password_confirm"))
            .business(BusinessRule::unique("users", "username"))
    }

    fn submission(value: Value) -> Submission {
        value.as_object().cloned().unwrap()
    }

    fn engine(lookup: impl Lookup + 'static) -> ValidationEngine {
        ValidationEngine::new(Arc::new(lookup), Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_three_invalid_fields_yield_three_errors() {
        let data = submission(json!({
            "username": "a b",
            "email": "nope",
            "password": "short",
            "password_confirm": "short",
        }));
        let report = engine(Taken("")).validate(&registration(), &data).await.unwrap();

        let fields: Vec<_> = report.errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["username", "email", "password"]);
        assert_eq!(report.sole_field(), None);
    }

    #[tokio::test]
    async fn test_one_error_per_field() {
        let data = submission(json!({
            "username": "striker",
            "password": "Str0ng!Pitch",
            "password_confirm": "Str0ng!Pitch",
        }));
        let report = engine(Taken("")).validate(&registration(), &data).await.unwrap();
        assert_eq!(report.errors(), &[FieldError::required("email")]);
        assert_eq!(report.sole_field(), Some("email"));
        assert_eq!(report.details(), vec!["email: This field is required."]);
    }

    #[tokio::test]
    async fn test_business_rule_reports_duplicate() {
        let data = submission(json!({
            "username": "Striker",
            "email": "s@example.com",
            "password": "Str0ng!Pitch",
            "password_confirm": "Str0ng!Pitch",
        }));
        let report = engine(Taken("striker")).validate(&registration(), &data).await.unwrap();
        assert_eq!(report.sole_field(), Some("username"));
        assert_eq!(report.errors()[0].code, "already_exists");
    }

    #[tokio::test]
    async fn test_failed_field_skips_later_layers() {
        // The username is malformed, so the uniqueness lookup never runs.
        let data = submission(json!({"username": "a", "password": "x", "password_confirm": "y"}));
        let report = engine(Stalled).validate(&registration(), &data).await.unwrap();
        assert!(report.has_error_for("username"));
        assert!(!report.has_error_for("password_confirm"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_lookup_times_out() {
        let data = submission(json!({
            "username": "striker",
            "email": "s@example.com",
            "password": "Str0ng!Pitch",
            "password_confirm": "Str0ng!Pitch",
        }));
        let err = engine(Stalled).validate(&registration(), &data).await.unwrap_err();
        assert!(matches!(err, LookupError::Timeout(_)));
    }

    #[test]
    fn test_into_result() {
        assert!(ValidationReport::new().into_result().is_ok());
        let mut report = ValidationReport::new();
        report.push(FieldError::required("email"));
        assert_eq!(report.clone().into_result(), Err(report));
    }
}
