//! Sanity checks for stored check records.
//!
//! Records are written by the API layer and read back here as loose JSON.
//! A record is only handed to the probe when every required field is
//! present and well formed; `state` and `lastChecked` legitimately start
//! out unset and are defaulted instead of rejected.

use serde_json::{Map, Value};
use thiserror::Error;

use super::types::{Check, CheckMethod, CheckState, Protocol};

pub const ID_LENGTH: usize = 20;
pub const PHONE_LENGTH: usize = 10;
pub const MIN_TIMEOUT_SECONDS: u64 = 1;
pub const MAX_TIMEOUT_SECONDS: u64 = 5;

const KNOWN_FIELDS: [&str; 9] = [
    "id",
    "userPhone",
    "protocol",
    "url",
    "method",
    "successCodes",
    "timeoutSeconds",
    "state",
    "lastChecked",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid check data: record is not an object")]
    NotAnObject,

    #[error("invalid check data: bad or missing {}", .0.join(", "))]
    InvalidFields(Vec<&'static str>),
}

/// Validate a stored record and normalize it into a [`Check`]
pub fn validate_check_data(record: &Value) -> Result<Check, ValidationError> {
    let fields = record.as_object().ok_or(ValidationError::NotAnObject)?;
    let mut invalid = Vec::new();

    let id = required("id", trimmed_with_length(fields.get("id"), ID_LENGTH), &mut invalid);
    let user_phone = required(
        "userPhone",
        trimmed_with_length(fields.get("userPhone"), PHONE_LENGTH),
        &mut invalid,
    );
    let protocol = required(
        "protocol",
        fields.get("protocol").and_then(Value::as_str).and_then(Protocol::parse),
        &mut invalid,
    );
    let url = required("url", non_empty_trimmed(fields.get("url")), &mut invalid);
    let method = required(
        "method",
        fields.get("method").and_then(Value::as_str).and_then(CheckMethod::parse),
        &mut invalid,
    );
    let success_codes =
        required("successCodes", success_codes(fields.get("successCodes")), &mut invalid);
    let timeout_seconds =
        required("timeoutSeconds", timeout_seconds(fields.get("timeoutSeconds")), &mut invalid);

    let (
        Some(id),
        Some(user_phone),
        Some(protocol),
        Some(url),
        Some(method),
        Some(success_codes),
        Some(timeout_seconds),
    ) = (id, user_phone, protocol, url, method, success_codes, timeout_seconds)
    else {
        return Err(ValidationError::InvalidFields(invalid));
    };

    Ok(Check {
        id,
        user_phone,
        protocol,
        url,
        method,
        success_codes,
        timeout_seconds,
        state: state(fields.get("state")),
        last_checked: last_checked(fields.get("lastChecked")),
        extra: extra_fields(fields),
    })
}

fn required<T>(name: &'static str, value: Option<T>, invalid: &mut Vec<&'static str>) -> Option<T> {
    if value.is_none() {
        invalid.push(name);
    }
    value
}

fn trimmed_with_length(value: Option<&Value>, length: usize) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| s.chars().count() == length)
        .map(str::to_owned)
}

fn non_empty_trimmed(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned)
}

/// Non-empty array of status codes
fn success_codes(value: Option<&Value>) -> Option<Vec<u16>> {
    let codes = value?.as_array()?;
    if codes.is_empty() {
        return None;
    }

    codes.iter().map(|code| code.as_u64().and_then(|c| u16::try_from(c).ok())).collect()
}

/// Whole number of seconds in the allowed range. `2.0` is accepted, `2.5` is not.
fn timeout_seconds(value: Option<&Value>) -> Option<u64> {
    let seconds = value?.as_f64()?;
    if seconds.fract() != 0.0 {
        return None;
    }

    let range = MIN_TIMEOUT_SECONDS as f64..=MAX_TIMEOUT_SECONDS as f64;
    range.contains(&seconds).then_some(seconds as u64)
}

fn state(value: Option<&Value>) -> CheckState {
    match value.and_then(Value::as_str) {
        Some("up") => CheckState::Up,
        _ => CheckState::Down,
    }
}

fn last_checked(value: Option<&Value>) -> Option<i64> {
    let value = value?;
    let millis = value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))?;
    (millis > 0).then_some(millis)
}

fn extra_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .filter(|(key, _)| !KNOWN_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_record() -> Value {
        json!({
            "id": "abcdefghij0123456789",
            "userPhone": "5551234567",
            "protocol": "http",
            "url": "example.com/health",
            "method": "get",
            "successCodes": [200, 201],
            "timeoutSeconds": 3
        })
    }

    fn with(field: &str, value: Value) -> Value {
        let mut record = valid_record();
        record[field] = value;
        record
    }

    fn without(field: &str) -> Value {
        let mut record = valid_record();
        record.as_object_mut().unwrap().remove(field);
        record
    }

    #[test]
    fn test_valid_record_defaults_state_and_last_checked() {
        let check = validate_check_data(&valid_record()).unwrap();
        assert_eq!(check.id, "abcdefghij0123456789");
        assert_eq!(check.protocol, Protocol::Http);
        assert_eq!(check.method, CheckMethod::Get);
        assert_eq!(check.success_codes, vec![200, 201]);
        assert_eq!(check.timeout_seconds, 3);
        assert_eq!(check.state, CheckState::Down);
        assert_eq!(check.last_checked, None);
        assert!(check.extra.is_empty());
    }

    #[test]
    fn test_trims_string_fields() {
        let mut record = with("id", json!("  abcdefghij0123456789 "));
        record["userPhone"] = json!(" 5551234567 ");
        record["url"] = json!("  example.com  ");

        let check = validate_check_data(&record).unwrap();
        assert_eq!(check.id, "abcdefghij0123456789");
        assert_eq!(check.user_phone, "5551234567");
        assert_eq!(check.url, "example.com");
    }

    #[test]
    fn test_keeps_state_and_last_checked_when_valid() {
        let mut record = with("state", json!("up"));
        record["lastChecked"] = json!(1_700_000_000_000_i64);

        let check = validate_check_data(&record).unwrap();
        assert_eq!(check.state, CheckState::Up);
        assert_eq!(check.last_checked, Some(1_700_000_000_000));
    }

    #[test]
    fn test_bad_optional_fields_are_normalized_not_rejected() {
        let mut record = with("state", json!("sideways"));
        record["lastChecked"] = json!(false);

        let check = validate_check_data(&record).unwrap();
        assert_eq!(check.state, CheckState::Down);
        assert_eq!(check.last_checked, None);

        let check = validate_check_data(&with("lastChecked", json!(0))).unwrap();
        assert_eq!(check.last_checked, None);
    }

    #[test]
    fn test_unknown_fields_are_preserved() {
        let check = validate_check_data(&with("label", json!("homepage"))).unwrap();
        assert_eq!(check.extra.get("label"), Some(&json!("homepage")));
    }

    #[test]
    fn test_rejects_missing_required_fields() {
        for field in
            ["id", "userPhone", "protocol", "url", "method", "successCodes", "timeoutSeconds"]
        {
            let result = validate_check_data(&without(field));
            assert_eq!(
                result,
                Err(ValidationError::InvalidFields(vec![field])),
                "missing {field} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_malformed_required_fields() {
        let cases = [
            ("id", json!("too-short")),
            ("id", json!(12345678901234567890_u64)),
            ("userPhone", json!("555123456")),
            ("protocol", json!("ftp")),
            ("protocol", json!("HTTP")),
            ("url", json!("   ")),
            ("method", json!("patch")),
            ("successCodes", json!([])),
            ("successCodes", json!("200")),
            ("successCodes", json!([200, "201"])),
            ("successCodes", json!([70000])),
            ("timeoutSeconds", json!(0)),
            ("timeoutSeconds", json!(6)),
            ("timeoutSeconds", json!(2.5)),
            ("timeoutSeconds", json!("3")),
        ];

        for (field, value) in cases {
            let result = validate_check_data(&with(field, value.clone()));
            assert!(result.is_err(), "{field} = {value} should be rejected");
        }
    }

    #[test]
    fn test_timeout_bounds_are_inclusive() {
        for seconds in [1, 5] {
            let check = validate_check_data(&with("timeoutSeconds", json!(seconds))).unwrap();
            assert_eq!(check.timeout_seconds, seconds);
        }
        assert_eq!(
            validate_check_data(&with("timeoutSeconds", json!(4.0))).unwrap().timeout_seconds,
            4
        );
    }

    #[test]
    fn test_reports_every_invalid_field() {
        let record = json!({ "id": "abcdefghij0123456789", "protocol": "gopher" });
        let Err(ValidationError::InvalidFields(fields)) = validate_check_data(&record) else {
            panic!("expected field errors");
        };
        assert_eq!(
            fields,
            vec!["userPhone", "protocol", "url", "method", "successCodes", "timeoutSeconds"]
        );
    }

    #[test]
    fn test_rejects_non_objects() {
        assert_eq!(validate_check_data(&json!(null)), Err(ValidationError::NotAnObject));
        assert_eq!(validate_check_data(&json!([1, 2])), Err(ValidationError::NotAnObject));
    }
}
