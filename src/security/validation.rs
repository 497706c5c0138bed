//! Field-level checks shared by every entity's input parsing.
//!
//! Each check returns a [`FieldIssue`] naming the offending attribute, which
//! lifts into [`CrmError::InvalidValue`] through `?`.

use crate::core::error::CrmError;
use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldIssue {
    #[error("a value is required")]
    Missing { field: String },
    #[error("at most {limit} characters allowed, got {len}")]
    Overflow { field: String, limit: usize, len: usize },
    #[error("expected a value from {low} to {high}")]
    OutOfBounds { field: String, low: String, high: String },
    #[error("'{0}' is not a valid email address")]
    Email(String),
    #[error("'{0}' is not a valid phone number")]
    Phone(String),
}

impl FieldIssue {
    pub fn attribute(&self) -> &str {
        match self {
            Self::Missing { field } | Self::Overflow { field, .. } | Self::OutOfBounds { field, .. } => {
                field
            }
            Self::Email(_) => "email",
            Self::Phone(_) => "phone",
        }
    }
}

impl From<FieldIssue> for CrmError {
    fn from(issue: FieldIssue) -> Self {
        CrmError::invalid(issue.attribute(), issue.to_string())
    }
}

// local@domain.tld, one dot at least in the domain part.
static MAILBOX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w.+'-]+@[[:alnum:]]([[:alnum:]-]*[[:alnum:]])?(\.[[:alnum:]]([[:alnum:]-]*[[:alnum:]])?)+$")
        .expect("mailbox pattern")
});

static DIALABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?\d[\d .()-]*\d$").expect("phone pattern"));

const MIN_PHONE_DIGITS: usize = 6;
const MAX_MAILBOX_LEN: usize = 254;

/// Trims `value` and rejects it when nothing is left.
pub fn validate_required<'a>(value: &'a str, field: &str) -> Result<&'a str, FieldIssue> {
    match value.trim() {
        "" => Err(FieldIssue::Missing {
            field: field.to_owned(),
        }),
        kept => Ok(kept),
    }
}

/// Counts characters, not bytes.
pub fn validate_length(value: &str, field: &str, limit: usize) -> Result<(), FieldIssue> {
    let len = value.chars().count();
    (len <= limit).then_some(()).ok_or_else(|| FieldIssue::Overflow {
        field: field.to_owned(),
        limit,
        len,
    })
}

pub fn validate_email(candidate: &str) -> Result<(), FieldIssue> {
    if candidate.len() <= MAX_MAILBOX_LEN && MAILBOX.is_match(candidate) {
        Ok(())
    } else {
        Err(FieldIssue::Email(candidate.to_owned()))
    }
}

pub fn validate_phone(candidate: &str) -> Result<(), FieldIssue> {
    let digits = candidate.bytes().filter(u8::is_ascii_digit).count();
    if digits >= MIN_PHONE_DIGITS && DIALABLE.is_match(candidate) {
        Ok(())
    } else {
        Err(FieldIssue::Phone(candidate.to_owned()))
    }
}

/// Inclusive on both ends.
pub fn validate_range<T>(value: &T, field: &str, low: &T, high: &T) -> Result<(), FieldIssue>
where
    T: PartialOrd + std::fmt::Display,
{
    if (low..=high).contains(&value) {
        return Ok(());
    }
    Err(FieldIssue::OutOfBounds {
        field: field.to_owned(),
        low: low.to_string(),
        high: high.to_string(),
    })
}
