//! Form validation shared by every write path.
//!
//! Forms are checked field by field before any store call; the first
//! failing rule wins and is reported with the field it belongs to.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

static TIME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").unwrap());

/// A rejected form field with a message fit for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Trimmed value, or an error naming the field when blank.
pub fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "Please fill in all required fields"));
    }
    Ok(trimmed.to_string())
}

/// Like `required`, for optional form inputs that must be present here.
pub fn required_opt(
    field: &'static str,
    value: Option<&str>,
) -> Result<String, ValidationError> {
    required(field, value.unwrap_or_default())
}

pub fn email(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = required(field, value)?;
    if !EMAIL_PATTERN.is_match(&value) {
        return Err(ValidationError::new(field, "Please enter a valid email address"));
    }
    Ok(value)
}

pub fn new_password(password: &str, confirm: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::new("password", "Please fill in all required fields"));
    }
    if password != confirm {
        return Err(ValidationError::new("confirm_password", "Passwords do not match"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::new(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    Ok(())
}

/// A time of day written as zero-padded "HH:MM".
pub fn time_of_day(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if !TIME_PATTERN.is_match(value) {
        return Err(ValidationError::new(field, "Time must be in HH:MM format"));
    }
    Ok(value.to_string())
}

/// Drops blank entries, then requires at least one well-formed time.
pub fn dose_times(values: &[String]) -> Result<Vec<String>, ValidationError> {
    let times = values
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| time_of_day("times", t))
        .collect::<Result<Vec<_>, _>>()?;
    if times.is_empty() {
        return Err(ValidationError::new("times", "Add at least one dose time"));
    }
    Ok(times)
}

pub fn date_range(start: NaiveDate, end: NaiveDate) -> Result<(), ValidationError> {
    if start > end {
        return Err(ValidationError::new("end_date", "End date must not be before start date"));
    }
    Ok(())
}

pub fn non_negative(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::new(field, "Must be a non-negative number"));
    }
    Ok(value)
}

/// Splits a comma-separated input into trimmed, non-empty items.
pub fn split_list(input: &str) -> Vec<String> {
    clean_list(input.split(','))
}

/// Trims items and drops empties.
pub fn clean_list<'a>(items: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    items
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// A list field as submitted: either a JSON array or one comma-separated
/// string, the way the forms collect conditions and allergies.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(untagged)]
pub enum ListInput {
    Items(Vec<String>),
    Text(String),
}

impl Default for ListInput {
    fn default() -> Self {
        Self::Items(Vec::new())
    }
}

impl ListInput {
    pub fn cleaned(&self) -> Vec<String> {
        match self {
            Self::Items(items) => clean_list(items.iter().map(String::as_str)),
            Self::Text(text) => split_list(text),
        }
    }
}

/// Blank optional text becomes `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Case-insensitive substring match used by the list search boxes.
/// An empty term matches everything.
pub fn matches_search(term: &str, haystacks: &[&str]) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    haystacks.iter().any(|h| h.to_lowercase().contains(&term))
}
