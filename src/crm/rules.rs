//! Raw string to typed value coercion shared by create and update paths.

use super::fields::{FieldRule, FieldSpec, EMAIL_MAX, PHONE_MAX};
use crate::core::error::{CrmError, CrmResult};
use crate::core::shared::models::Amount;
use crate::security::rbac::Department;
use crate::security::validation::{
    validate_email, validate_length, validate_phone, validate_range, validate_required,
};
use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use std::str::FromStr;
use std::sync::LazyLock;

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

pub static MAX_AMOUNT: LazyLock<BigDecimal> =
    LazyLock::new(|| BigDecimal::from_str("99999999.99").expect("Invalid amount ceiling"));

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i32),
    Amount(Amount),
    Boolean(bool),
    Timestamp(NaiveDateTime),
    /// Blank input on a nullable column: store NULL.
    Cleared,
}

pub fn coerce(field: &FieldSpec, raw: &str) -> CrmResult<FieldValue> {
    let name = field.name;
    match field.rule {
        FieldRule::Fixed => Err(CrmError::ImmutableAttribute(name.to_string())),
        FieldRule::Name { max } => parse_name(raw, name, max).map(FieldValue::Text),
        FieldRule::OptionalText { max } => match optional(Some(raw)) {
            None => Ok(FieldValue::Cleared),
            Some(value) => {
                validate_length(value, name, max)?;
                Ok(FieldValue::Text(value.to_string()))
            }
        },
        FieldRule::Email => parse_email(raw).map(FieldValue::Text),
        FieldRule::Phone => parse_phone(raw).map(FieldValue::Text),
        FieldRule::RoleId => parse_role(raw).map(|d| FieldValue::Integer(d.id())),
        FieldRule::Amount => parse_amount(raw, name).map(FieldValue::Amount),
        FieldRule::YesNo => parse_yes_no(raw, name).map(FieldValue::Boolean),
        FieldRule::Timestamp => parse_timestamp(raw, name).map(FieldValue::Timestamp),
        FieldRule::Attendees => parse_attendees(raw).map(FieldValue::Integer),
    }
}

pub fn parse_name(raw: &str, field: &str, max: usize) -> CrmResult<String> {
    let value = validate_required(raw, field)?;
    validate_length(value, field, max)?;
    Ok(value.to_string())
}

pub fn parse_email(raw: &str) -> CrmResult<String> {
    let value = validate_required(raw, "email")?;
    validate_length(value, "email", EMAIL_MAX)?;
    validate_email(value)?;
    Ok(value.to_lowercase())
}

pub fn parse_phone(raw: &str) -> CrmResult<String> {
    let value = raw.trim();
    validate_length(value, "phone", PHONE_MAX)?;
    validate_phone(value)?;
    Ok(value.to_string())
}

pub fn parse_role(raw: &str) -> CrmResult<Department> {
    let id: i32 = raw
        .trim()
        .parse()
        .map_err(|_| CrmError::invalid("role_id", format!("'{raw}' is not a number")))?;
    validate_range(&id, "role_id", &1, &3)?;
    Department::from_id(id).ok_or_else(|| CrmError::invalid("role_id", format!("unknown role {id}")))
}

/// Non-negative, at most two decimals, capped at 99,999,999.99.
pub fn parse_amount(raw: &str, field: &str) -> CrmResult<Amount> {
    let value = BigDecimal::from_str(raw.trim())
        .map_err(|_| CrmError::invalid(field, format!("'{raw}' is not a decimal number")))?;
    if value < BigDecimal::from(0) {
        return Err(CrmError::invalid(field, "must not be negative"));
    }
    let (_, scale) = value.normalized().as_bigint_and_exponent();
    if scale > 2 {
        return Err(CrmError::invalid(field, "at most two decimal places"));
    }
    if value > *MAX_AMOUNT {
        return Err(CrmError::invalid(
            field,
            format!("must not exceed {}", *MAX_AMOUNT),
        ));
    }
    Ok(Amount(value))
}

pub fn parse_yes_no(raw: &str, field: &str) -> CrmResult<bool> {
    match raw.trim().to_lowercase().as_str() {
        "oui" | "o" | "yes" | "y" | "1" | "true" => Ok(true),
        "non" | "n" | "no" | "0" | "false" => Ok(false),
        other => Err(CrmError::invalid(
            field,
            format!("'{other}' is not one of oui/o/yes/y/1/true or non/n/no/0/false"),
        )),
    }
}

pub fn parse_timestamp(raw: &str, field: &str) -> CrmResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| {
        CrmError::invalid(field, format!("'{raw}' does not match YYYY-MM-DD HH:MM"))
    })
}

pub fn parse_attendees(raw: &str) -> CrmResult<i32> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| CrmError::invalid("attendees", format!("'{raw}' is not a whole number")))?;
    if value < 0 {
        return Err(CrmError::invalid("attendees", "must not be negative"));
    }
    i32::try_from(value).map_err(|_| CrmError::invalid("attendees", "is too large"))
}

/// Blank optional input means "not provided".
pub fn optional(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

pub fn ensure_chronology(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> CrmResult<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if end <= start {
            return Err(CrmError::invalid(
                "end_date",
                format!(
                    "must be after start_date ({})",
                    start.format(DATE_FORMAT)
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::fields::{CONTRACT, EMPLOYEE, EVENT};

    #[test]
    fn test_amount_parsing() {
        assert_eq!(
            parse_amount("1500", "total_amount").expect("valid"),
            Amount::from(1500)
        );
        assert!(parse_amount("12.345", "total_amount").is_err());
        assert!(parse_amount("-1", "total_amount").is_err());
        assert!(parse_amount("abc", "total_amount").is_err());
        assert!(parse_amount("99999999.99", "total_amount").is_ok());
        assert!(parse_amount("100000000", "total_amount").is_err());
        assert!(parse_amount("0", "remaining_amount").is_ok());
    }

    #[test]
    fn test_yes_no_vocabulary() {
        for token in ["oui", "O", "yes", "Y", "1", "True"] {
            assert!(parse_yes_no(token, "signed").expect(token));
        }
        for token in ["non", "n", "NO", "0", "false"] {
            assert!(!parse_yes_no(token, "signed").expect(token));
        }
        assert!(parse_yes_no("maybe", "signed").is_err());
        assert!(parse_yes_no("", "signed").is_err());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(parse_role("3").expect("valid"), Department::Management);
        assert!(parse_role("4").is_err());
        assert!(parse_role("0").is_err());
        assert!(parse_role("admin").is_err());
    }

    #[test]
    fn test_timestamp_parsing() {
        let parsed = parse_timestamp("2024-06-21 20:30", "start_date").expect("valid");
        assert_eq!(parsed.format(DATE_FORMAT).to_string(), "2024-06-21 20:30");
        assert!(parse_timestamp("21/06/2024 20:30", "start_date").is_err());
    }

    #[test]
    fn test_attendees() {
        assert_eq!(parse_attendees("0").expect("valid"), 0);
        assert_eq!(parse_attendees(" 250 ").expect("valid"), 250);
        assert!(parse_attendees("-3").is_err());
        assert!(parse_attendees("1.5").is_err());
    }

    #[test]
    fn test_chronology() {
        let start = parse_timestamp("2024-06-21 20:00", "start_date").ok();
        let end = parse_timestamp("2024-06-21 19:00", "end_date").ok();
        assert!(ensure_chronology(start, end).is_err());
        assert!(ensure_chronology(start, start).is_err());
        assert!(ensure_chronology(end, start).is_ok());
        assert!(ensure_chronology(None, end).is_ok());
    }

    #[test]
    fn test_coerce_dispatches_on_rule() {
        let email = EMPLOYEE.updatable("email").expect("field");
        assert_eq!(
            coerce(email, " Alice@Example.com ").expect("valid"),
            FieldValue::Text("alice@example.com".into())
        );
        let signed = CONTRACT.updatable("signed").expect("field");
        assert_eq!(coerce(signed, "oui").expect("valid"), FieldValue::Boolean(true));
        let notes = EVENT.updatable("notes").expect("field");
        assert!(coerce(notes, &"x".repeat(256)).is_err());
        assert_eq!(coerce(notes, " \t ").expect("blank"), FieldValue::Cleared);
        let name = EVENT.updatable("name").expect("field");
        assert!(matches!(
            coerce(name, "   "),
            Err(CrmError::InvalidValue { .. })
        ));
    }
}
