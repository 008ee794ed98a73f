// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use regex::Regex;
use std::sync::LazyLock;
use time::Date;
use time::macros::format_description;

use crate::model::{FieldValue, FormRecord};
use crate::steps::{FieldKind, FieldSpec, FormDefinition};

pub const DATE_LAYOUT: &str = "YYYY-MM-DD";
pub const POSTAL_CODE_LEN: usize = 5;
pub const PHONE_DIGITS: usize = 10;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    Required,
    InvalidEmail,
    InvalidPhone,
    InvalidPostalCode,
    InvalidDate,
    PastDate,
    InvalidChoice,
    MissingContact,
    ConsentRequired,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Required => f.write_str("This field is required"),
            Self::InvalidEmail => f.write_str("Please enter a valid email address"),
            Self::InvalidPhone => f.write_str("Please enter a valid 10-digit phone number"),
            Self::InvalidPostalCode => f.write_str("Please enter a valid 5-digit ZIP code"),
            Self::InvalidDate => write!(f, "Please enter a date as {DATE_LAYOUT}"),
            Self::PastDate => f.write_str("Please choose a date that is today or later"),
            Self::InvalidChoice => f.write_str("Please choose one of the listed options"),
            Self::MissingContact => f.write_str("Please provide an email address or phone number"),
            Self::ConsentRequired => {
                f.write_str("Please agree to be contacted so we can send your quote")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub error: ValidationError,
}

impl FieldError {
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

pub fn is_valid_email(input: &str) -> bool {
    EMAIL_PATTERN.is_match(input.trim())
}

/// Reduces phone input to its 10 national digits, dropping a leading `1`
/// country code.
pub fn normalize_phone(input: &str) -> Option<String> {
    let digits = phone_digits(input);
    (digits.len() == PHONE_DIGITS).then_some(digits)
}

/// Live mask applied as digits are typed: `(512) 555-1234`.
pub fn mask_phone(input: &str) -> String {
    let mut digits = phone_digits(input);
    digits.truncate(PHONE_DIGITS);
    match digits.len() {
        0 => String::new(),
        1..=3 => format!("({digits}"),
        4..=6 => format!("({}) {}", &digits[..3], &digits[3..]),
        _ => format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]),
    }
}

fn phone_digits(input: &str) -> String {
    let digits: String = input.chars().filter(char::is_ascii_digit).collect();
    match digits.strip_prefix('1') {
        Some(rest) if digits.len() == PHONE_DIGITS + 1 => rest.to_owned(),
        _ => digits,
    }
}

pub fn is_valid_postal_code(input: &str) -> bool {
    let trimmed = input.trim();
    trimmed.len() == POSTAL_CODE_LEN && trimmed.bytes().all(|byte| byte.is_ascii_digit())
}

pub fn parse_date(input: &str) -> ValidationResult<Date> {
    Date::parse(input.trim(), &format_description!("[year]-[month]-[day]"))
        .map_err(|_| ValidationError::InvalidDate)
}

/// Calendar-date comparison only; `today` is supplied by the caller's clock.
pub fn validate_move_date(input: &str, today: Date) -> ValidationResult<Date> {
    let date = parse_date(input)?;
    if date < today {
        return Err(ValidationError::PastDate);
    }
    Ok(date)
}

pub fn format_date(value: Date) -> String {
    value
        .format(&format_description!("[year]-[month]-[day]"))
        .unwrap_or_default()
}

/// Checks one field in isolation. Blank email/phone pass here; the
/// email-or-phone rule is [`validate_contact`].
pub fn validate_field(
    spec: &FieldSpec,
    value: Option<&FieldValue>,
    today: Date,
) -> ValidationResult<()> {
    let blank = value.is_none_or(FieldValue::is_blank);
    if blank {
        if !spec.required {
            return Ok(());
        }
        return Err(match spec.kind {
            FieldKind::Consent => ValidationError::ConsentRequired,
            _ => ValidationError::Required,
        });
    }

    let Some(value) = value else {
        return Ok(());
    };
    match spec.kind {
        FieldKind::Email if !is_valid_email(value.as_text()) => {
            Err(ValidationError::InvalidEmail)
        }
        FieldKind::Phone if normalize_phone(value.as_text()).is_none() => {
            Err(ValidationError::InvalidPhone)
        }
        FieldKind::PostalCode if !is_valid_postal_code(value.as_text()) => {
            Err(ValidationError::InvalidPostalCode)
        }
        FieldKind::Date => validate_move_date(value.as_text(), today).map(|_| ()),
        FieldKind::Choice if !spec.options.is_empty() => {
            if spec.options.contains(&value.as_text()) {
                Ok(())
            } else {
                Err(ValidationError::InvalidChoice)
            }
        }
        FieldKind::Checkboxes => {
            if value
                .as_many()
                .iter()
                .all(|option| spec.options.contains(&option.as_str()))
            {
                Ok(())
            } else {
                Err(ValidationError::InvalidChoice)
            }
        }
        _ => Ok(()),
    }
}

pub fn validate_contact(definition: &FormDefinition, record: &FormRecord) -> ValidationResult<()> {
    if !definition.has_contact_rule() {
        return Ok(());
    }
    let any_present = definition
        .contact_fields()
        .into_iter()
        .any(|name| !record.is_blank(name));
    if any_present {
        Ok(())
    } else {
        Err(ValidationError::MissingContact)
    }
}

/// Errors for one step in document order; contact fields share one message
/// when both are blank.
pub fn validate_step(
    definition: &FormDefinition,
    step: usize,
    record: &FormRecord,
    today: Date,
) -> Vec<FieldError> {
    let Some(step) = definition.step(step) else {
        return Vec::new();
    };
    let contact = validate_contact(definition, record);

    step.fields
        .iter()
        .filter_map(|spec| {
            let result = match validate_field(spec, record.get(spec.name), today) {
                Ok(()) if spec.is_contact() => contact,
                other => other,
            };
            result.err().map(|error| FieldError {
                field: spec.name,
                error,
            })
        })
        .collect()
}

/// Full-record validation over steps `0..=through`.
pub fn validate_through(
    definition: &FormDefinition,
    through: usize,
    record: &FormRecord,
    today: Date,
) -> Vec<FieldError> {
    (0..=through.min(definition.last_step()))
        .flat_map(|step| validate_step(definition, step, record, today))
        .collect()
}

/// Toggles `option` in a checkbox group, keeping the group's "none" option
/// exclusive of its siblings. Selection stays in declaration order.
pub fn toggle_option(spec: &FieldSpec, selected: &[String], option: &str) -> Vec<String> {
    if !spec.options.contains(&option) {
        return selected.to_vec();
    }

    let mut next: Vec<String> = if selected.iter().any(|value| value == option) {
        selected
            .iter()
            .filter(|value| value.as_str() != option)
            .cloned()
            .collect()
    } else if spec.none_option == Some(option) {
        vec![option.to_owned()]
    } else {
        let mut kept: Vec<String> = selected
            .iter()
            .filter(|value| Some(value.as_str()) != spec.none_option)
            .cloned()
            .collect();
        kept.push(option.to_owned());
        kept
    };

    next.sort_by_key(|value| {
        spec.options
            .iter()
            .position(|candidate| candidate == value)
            .unwrap_or(usize::MAX)
    });
    next
}

#[cfg(test)]
mod tests {
    use super::{
        ValidationError, is_valid_email, is_valid_postal_code, mask_phone, normalize_phone,
        toggle_option, validate_field, validate_move_date, validate_step,
    };
    use crate::model::{FieldValue, FormRecord};
    use crate::steps::{FormDefinition, fields};
    use time::{Date, Month};

    fn today() -> Date {
        Date::from_calendar_date(2026, Month::March, 10).expect("valid date")
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
    }

    #[test]
    fn email_pattern_accepts_common_addresses() {
        assert!(is_valid_email("jane@example.com"));
        assert!(is_valid_email(" jane.doe+move@mail.example.co "));
        assert!(!is_valid_email("jane@example"));
        assert!(!is_valid_email("jane example@x.com"));
        assert!(!is_valid_email("@example.com"));
    }

    #[test]
    fn phone_normalizes_to_ten_digits() {
        assert_eq!(normalize_phone("(512) 555-1234").as_deref(), Some("5125551234"));
        assert_eq!(normalize_phone("+1 512 555 1234").as_deref(), Some("5125551234"));
        assert_eq!(normalize_phone("555-1234"), None);
    }

    #[test]
    fn phone_mask_formats_progressively() {
        assert_eq!(mask_phone(""), "");
        assert_eq!(mask_phone("512"), "(512");
        assert_eq!(mask_phone("51255"), "(512) 55");
        assert_eq!(mask_phone("5125551234"), "(512) 555-1234");
        assert_eq!(mask_phone("(512) 555-12345"), "(512) 555-1234");
        assert_eq!(mask_phone("(512"), "(512");
    }

    #[test]
    fn postal_code_requires_five_digits() {
        assert!(is_valid_postal_code("78701"));
        assert!(!is_valid_postal_code("789"));
        assert!(!is_valid_postal_code("7870a"));
        assert!(!is_valid_postal_code("787011"));
    }

    #[test]
    fn move_date_compares_calendar_days_only() {
        assert!(validate_move_date("2026-03-10", today()).is_ok());
        assert!(validate_move_date("2026-04-01", today()).is_ok());
        assert_eq!(
            validate_move_date("2026-03-09", today()),
            Err(ValidationError::PastDate)
        );
        assert_eq!(
            validate_move_date("03/20/2026", today()),
            Err(ValidationError::InvalidDate)
        );
    }

    #[test]
    fn short_zip_reports_five_digit_message() {
        let spec = FormDefinition::QUOTE
            .field(fields::FROM_ZIP)
            .expect("zip field");
        let error = validate_field(spec, Some(&FieldValue::Text("789".to_owned())), today())
            .expect_err("three digits should fail");
        assert!(error.to_string().contains("5-digit ZIP"));
    }

    #[test]
    fn contact_rule_accepts_email_only_or_phone_only() {
        let definition = FormDefinition::QUOTE;
        let mut email_only = FormRecord::new();
        email_only.set(fields::NAME, FieldValue::Text("Jane Doe".to_owned()));
        email_only.set(fields::EMAIL, FieldValue::Text("jane@example.com".to_owned()));
        assert!(validate_step(&definition, 0, &email_only, today()).is_empty());

        let mut phone_only = FormRecord::new();
        phone_only.set(fields::NAME, FieldValue::Text("Jane Doe".to_owned()));
        phone_only.set(fields::PHONE, FieldValue::Text("(512) 555-1234".to_owned()));
        assert!(validate_step(&definition, 0, &phone_only, today()).is_empty());
    }

    #[test]
    fn contact_rule_marks_both_fields_with_shared_message() {
        let mut record = FormRecord::new();
        record.set(fields::NAME, FieldValue::Text("Jane Doe".to_owned()));

        let errors = validate_step(&FormDefinition::QUOTE, 0, &record, today());
        let fields_in_error: Vec<&str> = errors.iter().map(|error| error.field).collect();
        assert_eq!(fields_in_error, vec![fields::EMAIL, fields::PHONE]);
        assert!(
            errors
                .iter()
                .all(|error| error.error == ValidationError::MissingContact)
        );
    }

    #[test]
    fn malformed_email_is_reported_even_when_phone_present() {
        let mut record = FormRecord::new();
        record.set(fields::NAME, FieldValue::Text("Jane Doe".to_owned()));
        record.set(fields::EMAIL, FieldValue::Text("jane@".to_owned()));
        record.set(fields::PHONE, FieldValue::Text("5125551234".to_owned()));

        let errors = validate_step(&FormDefinition::QUOTE, 0, &record, today());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, fields::EMAIL);
        assert_eq!(errors[0].error, ValidationError::InvalidEmail);
    }

    #[test]
    fn unchecked_consent_is_required() {
        let spec = FormDefinition::QUOTE
            .field(fields::CONSENT)
            .expect("consent field");
        assert_eq!(
            validate_field(spec, Some(&FieldValue::Flag(false)), today()),
            Err(ValidationError::ConsentRequired)
        );
    }

    #[test]
    fn none_option_clears_siblings_and_siblings_clear_none() {
        let spec = FormDefinition::QUOTE
            .field(fields::SPECIAL_ITEMS)
            .expect("special items field");

        let selected = toggle_option(spec, &strings(&["piano", "safe"]), "none");
        assert_eq!(selected, strings(&["none"]));

        let selected = toggle_option(spec, &selected, "artwork");
        assert_eq!(selected, strings(&["artwork"]));

        let selected = toggle_option(spec, &selected, "piano");
        assert_eq!(selected, strings(&["piano", "artwork"]));

        let selected = toggle_option(spec, &selected, "piano");
        assert_eq!(selected, strings(&["artwork"]));
    }

    #[test]
    fn toggle_ignores_undeclared_options() {
        let spec = FormDefinition::QUOTE
            .field(fields::SPECIAL_ITEMS)
            .expect("special items field");
        let selected = toggle_option(spec, &strings(&["piano"]), "aquarium");
        assert_eq!(selected, strings(&["piano"]));
    }
}
