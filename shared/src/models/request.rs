//! Analysis request submitted from the dashboard form

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::validation::{validate_period_name, validate_period_range, validate_source_path};

/// Everything a background analysis needs, validated before a worker starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AnalysisRequest {
    #[validate(length(min = 1), custom = "period_name")]
    pub period_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[validate(custom = "source_path")]
    pub profit_path: String,
    #[validate(custom = "source_path")]
    pub discount_path: String,
}

impl AnalysisRequest {
    /// Field rules plus the cross-field date order, as one human-readable message
    pub fn check(&self) -> Result<(), String> {
        self.validate().map_err(|errors| {
            let mut fields: Vec<String> = errors
                .field_errors()
                .into_iter()
                .map(|(field, errs)| {
                    let reason = errs
                        .first()
                        .and_then(|e| e.message.as_ref())
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "invalid".to_string());
                    format!("{}: {}", field, reason)
                })
                .collect();
            fields.sort();
            fields.join("; ")
        })?;
        validate_period_range(self.start_date, self.end_date).map_err(str::to_string)
    }
}

fn period_name(value: &str) -> Result<(), ValidationError> {
    validate_period_name(value).map_err(|msg| {
        let mut err = ValidationError::new("period_name");
        err.message = Some(msg.into());
        err
    })
}

fn source_path(value: &str) -> Result<(), ValidationError> {
    validate_source_path(value).map_err(|msg| {
        let mut err = ValidationError::new("source_path");
        err.message = Some(msg.into());
        err
    })
}
