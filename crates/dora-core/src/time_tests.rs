//! Tests for timestamp conversion and duration formatting.

use super::*;

// ============================================================================
// to_unix_millis
// ============================================================================

#[test]
fn test_to_unix_millis_rfc3339_utc() {
    assert_eq!(
        to_unix_millis("2021-12-06T16:22:44Z").unwrap(),
        "1638807764000"
    );
}

#[test]
fn test_to_unix_millis_with_colon_offset() {
    // Bitbucket style
    assert_eq!(
        to_unix_millis("2021-12-06T16:22:44+00:00").unwrap(),
        "1638807764000"
    );
    assert_eq!(
        to_unix_millis("2021-12-06T17:22:44+01:00").unwrap(),
        "1638807764000"
    );
}

#[test]
fn test_to_unix_millis_with_compact_offset_and_fraction() {
    // Jira style
    assert_eq!(
        to_unix_millis("2022-03-28T18:06:28.000+0200").unwrap(),
        "1648483588000"
    );
}

#[test]
fn test_to_unix_millis_without_offset_is_utc() {
    assert_eq!(
        to_unix_millis("2021-12-06T16:22:44").unwrap(),
        "1638807764000"
    );
    assert_eq!(
        to_unix_millis("2021-12-06 16:22:44").unwrap(),
        "1638807764000"
    );
}

#[test]
fn test_to_unix_millis_plain_date() {
    assert_eq!(to_unix_millis("2024-01-01").unwrap(), "1704067200000");
}

#[test]
fn test_to_unix_millis_numeric_values() {
    assert_eq!(to_unix_millis("1638807764").unwrap(), "1638807764000");
    assert_eq!(to_unix_millis("1638807764000").unwrap(), "1638807764000");
}

#[test]
fn test_to_unix_millis_empty_is_missing_time() {
    let result = to_unix_millis("   ");
    assert!(
        matches!(result, Err(ValidationError::MissingTime { .. })),
        "expected MissingTime, got: {:?}",
        result
    );
}

#[test]
fn test_to_unix_millis_garbage_is_invalid_time() {
    let result = to_unix_millis("next tuesday");
    assert!(matches!(result, Err(ValidationError::InvalidTime { .. })));
}

// ============================================================================
// diff_seconds
// ============================================================================

#[test]
fn test_diff_seconds_basic() {
    assert_eq!(diff_seconds(1_000_000, 1_005_000), 5);
    assert_eq!(diff_seconds(0, 1_999), 1);
}

#[test]
fn test_diff_seconds_same_value_is_zero() {
    for value in [0_i64, 1, 999, 1_638_807_764_000] {
        assert_eq!(diff_seconds(value, value), 0);
    }
}

#[test]
fn test_diff_seconds_is_antisymmetric() {
    let samples = [0_i64, 1, 999, 1_000, 1_500, 86_400_000, 1_638_807_764_321];
    for a in samples {
        for b in samples {
            assert_eq!(
                diff_seconds(a, b),
                -diff_seconds(b, a),
                "antisymmetry failed for ({}, {})",
                a,
                b
            );
        }
    }
}

#[test]
fn test_diff_seconds_negative_when_swapped() {
    assert_eq!(diff_seconds(10_000, 4_000), -6);
}

// ============================================================================
// prettify
// ============================================================================

#[test]
fn test_prettify_known_values() {
    assert_eq!(prettify(0), "00:00:00:00");
    assert_eq!(prettify(86_400), "01:00:00:00");
    assert_eq!(prettify(3_661), "00:01:01:01");
    assert_eq!(prettify(3_723), "00:01:02:03");
}

#[test]
fn test_prettify_day_field_grows() {
    assert_eq!(prettify(123 * 86_400 + 59), "123:00:00:59");
}

// ============================================================================
// helpers
// ============================================================================

#[test]
fn test_parse_millis() {
    assert_eq!(parse_millis("1638807764000"), Some(1_638_807_764_000));
    assert_eq!(parse_millis(""), None);
    assert_eq!(parse_millis("UNKNOWN"), None);
}

#[test]
fn test_local_date_stamp_shape() {
    let stamp = local_date_stamp();
    assert_eq!(stamp.len(), 8);
    assert!(stamp.chars().all(|c| c.is_ascii_digit()));
}
