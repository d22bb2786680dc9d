//! # Query Parameters
//!
//! Raw query strings for the metrics and last-deployment endpoints, and their
//! validation into [`MetricsRequest`] values.
//!
//! A metrics query names a repo plus either an explicit calendar range
//! (`from` and `to`, both `YYYYMMDD`) or `last=N` days. Only completed days
//! are measurable, so the range must end before today. An optional `offset`
//! (whole hours, -12 to 12) moves day boundaries from UTC into the caller's
//! timezone.

use crate::errors::RequestError;
use chrono::{Days, NaiveDate, NaiveTime};
use dora_core::{MetricKind, MetricSelection, MetricsRequest, TimeWindow};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

const DATE_PATTERN: &str = r"^\d{8}$";

static DATE_REGEX: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
const MAX_OFFSET_HOURS: i64 = 12;
const MILLIS_PER_HOUR: i64 = 3_600_000;
const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;

/// Query string of `GET /metrics`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsQuery {
    pub repo: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub last: Option<String>,
    pub offset: Option<String>,
    /// Comma-separated metric names; all metrics when absent
    pub metrics: Option<String>,
}

impl MetricsQuery {
    /// Validate the query against the current calendar day.
    ///
    /// # Errors
    ///
    /// - [`RequestError::MissingRequiredInputParams`] without `repo`, or
    ///   without either range style
    /// - [`RequestError::TooManyInputParams`] when both `from`/`to` and `last`
    ///   are given
    /// - [`RequestError::InvalidInputParam`] for malformed dates, offsets,
    ///   day counts or metric names
    /// - [`RequestError::OutOfRangeQuery`] when the range is reversed, reaches
    ///   today, or spans more than `max_range_days`
    pub fn into_request(
        self,
        today: NaiveDate,
        max_range_days: i64,
    ) -> Result<MetricsRequest, RequestError> {
        let repo = required_repo(self.repo)?;

        let (first_day, last_day) = match (present(self.from), present(self.to), present(self.last))
        {
            (Some(_), _, Some(_)) | (_, Some(_), Some(_)) => {
                return Err(RequestError::TooManyInputParams {
                    message: "use either from/to or last, not both".to_string(),
                })
            }
            (Some(from), Some(to), None) => (parse_day("from", &from)?, parse_day("to", &to)?),
            (None, None, Some(last)) => last_days(&last, today, max_range_days)?,
            (None, None, None) => {
                return Err(RequestError::MissingRequiredInputParams {
                    params: "from and to, or last".to_string(),
                })
            }
            _ => {
                return Err(RequestError::MissingRequiredInputParams {
                    params: "from and to".to_string(),
                })
            }
        };

        check_range(first_day, last_day, today, max_range_days)?;

        let offset = parse_offset(self.offset.as_deref())?;
        let window = TimeWindow::from_millis(
            day_start_millis(first_day, offset),
            day_start_millis(last_day, offset) + MILLIS_PER_DAY - 1,
        );
        let selection = parse_selection(self.metrics.as_deref())?;

        Ok(MetricsRequest::new(repo, window).with_selection(selection))
    }
}

/// Query string of `GET /lastdeployment`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LastDeploymentQuery {
    pub repo: Option<String>,
}

impl LastDeploymentQuery {
    /// # Errors
    ///
    /// Returns [`RequestError::MissingRequiredInputParams`] without `repo`.
    pub fn into_repo(self) -> Result<String, RequestError> {
        required_repo(self.repo)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Blank parameters count as absent
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required_repo(repo: Option<String>) -> Result<String, RequestError> {
    present(repo).ok_or_else(|| RequestError::MissingRequiredInputParams {
        params: "repo".to_string(),
    })
}

fn invalid(param: &str, value: &str) -> RequestError {
    RequestError::InvalidInputParam {
        param: param.to_string(),
        value: value.to_string(),
    }
}

fn parse_day(param: &str, value: &str) -> Result<NaiveDate, RequestError> {
    let pattern = DATE_REGEX
        .get_or_init(|| Regex::new(DATE_PATTERN))
        .as_ref()
        .map_err(|_| invalid(param, value))?;
    if !pattern.is_match(value) {
        return Err(invalid(param, value));
    }

    NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| invalid(param, value))
}

/// The `count` full days ending yesterday
fn last_days(
    count: &str,
    today: NaiveDate,
    max_range_days: i64,
) -> Result<(NaiveDate, NaiveDate), RequestError> {
    let days: u64 = count
        .parse()
        .ok()
        .filter(|days| *days >= 1)
        .ok_or_else(|| invalid("last", count))?;

    if days > max_range_days.max(0) as u64 {
        return Err(RequestError::OutOfRangeQuery {
            message: format!("last={} exceeds the {} day limit", days, max_range_days),
        });
    }

    let out_of_calendar = || RequestError::OutOfRangeQuery {
        message: format!("last={} reaches before the calendar start", days),
    };
    let first = today
        .checked_sub_days(Days::new(days))
        .ok_or_else(out_of_calendar)?;
    let last = today
        .checked_sub_days(Days::new(1))
        .ok_or_else(out_of_calendar)?;

    Ok((first, last))
}

fn check_range(
    first: NaiveDate,
    last: NaiveDate,
    today: NaiveDate,
    max_range_days: i64,
) -> Result<(), RequestError> {
    if first > last {
        return Err(RequestError::OutOfRangeQuery {
            message: format!("from {} is after to {}", first, last),
        });
    }

    if last >= today {
        return Err(RequestError::OutOfRangeQuery {
            message: format!("to {} must be before today ({})", last, today),
        });
    }

    let span = last.signed_duration_since(first).num_days() + 1;
    if span > max_range_days {
        return Err(RequestError::OutOfRangeQuery {
            message: format!(
                "{} days requested, at most {} allowed",
                span, max_range_days
            ),
        });
    }

    Ok(())
}

fn parse_offset(offset: Option<&str>) -> Result<i64, RequestError> {
    let Some(raw) = offset.map(str::trim).filter(|o| !o.is_empty()) else {
        return Ok(0);
    };

    raw.parse::<i64>()
        .ok()
        .filter(|hours| (-MAX_OFFSET_HOURS..=MAX_OFFSET_HOURS).contains(hours))
        .ok_or_else(|| invalid("offset", raw))
}

/// Midnight of `day` in a timezone `offset_hours` east of UTC, as Unix ms
fn day_start_millis(day: NaiveDate, offset_hours: i64) -> i64 {
    day.and_time(NaiveTime::MIN).and_utc().timestamp_millis() - offset_hours * MILLIS_PER_HOUR
}

fn parse_selection(metrics: Option<&str>) -> Result<MetricSelection, RequestError> {
    let Some(raw) = metrics else {
        return Ok(MetricSelection::all());
    };

    let kinds = raw
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| MetricKind::from_name(name).ok_or_else(|| invalid("metrics", name)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MetricSelection::only(kinds))
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
