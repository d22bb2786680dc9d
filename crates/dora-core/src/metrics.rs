//! # DORA Metrics Engine
//!
//! Pure computation of the four DORA metrics over records that the repository
//! has already scoped to one repo and time window:
//!
//! - **Deployment frequency**: deployments per day in the window
//! - **Lead time for changes**: commit-to-deploy duration (lower-biased median)
//! - **Change failure rate**: incidents per deployment
//! - **Time to restore services**: mean incident duration
//!
//! Durations are reported as `DD:HH:MM:SS`, ratios with two decimals.

use crate::{time, Change, Deployment, Incident};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

/// Seconds in a day
const SECONDS_PER_DAY: i64 = 86_400;

/// Zero duration as printed by [`time::prettify`]
pub const ZERO_DURATION: &str = "00:00:00:00";

// ============================================================================
// Query types
// ============================================================================

/// Inclusive window of Unix-millisecond timestamps
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    from: String,
    to: String,
}

impl TimeWindow {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Window between two millisecond instants
    pub fn from_millis(from: i64, to: i64) -> Self {
        Self::new(from.to_string(), to.to_string())
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    /// Cache key for this window, `"{from}_{to}"`
    pub fn range_key(&self) -> String {
        format!("{}_{}", self.from, self.to)
    }

    /// Whether a millisecond timestamp string lies inside the window.
    ///
    /// Unparseable timestamps (including the `UNKNOWN` sentinel) are outside
    /// every window.
    pub fn contains(&self, millis: &str) -> bool {
        match (
            time::parse_millis(millis),
            time::parse_millis(&self.from),
            time::parse_millis(&self.to),
        ) {
            (Some(at), Some(from), Some(to)) => from <= at && at <= to,
            _ => false,
        }
    }

    /// Length of the window in whole days, rounded up, at least one
    pub fn days_in_scope(&self) -> i64 {
        let seconds = match (
            time::parse_millis(&self.from),
            time::parse_millis(&self.to),
        ) {
            (Some(from), Some(to)) => time::diff_seconds(from, to),
            _ => 0,
        };

        let days = if seconds > 0 {
            (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
        } else {
            0
        };
        days.max(1)
    }
}

/// One of the four DORA metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricKind {
    DeploymentFrequency,
    LeadTimeForChanges,
    ChangeFailureRate,
    TimeToRestoreServices,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::DeploymentFrequency,
        MetricKind::LeadTimeForChanges,
        MetricKind::ChangeFailureRate,
        MetricKind::TimeToRestoreServices,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeploymentFrequency => "deploymentFrequency",
            Self::LeadTimeForChanges => "leadTimeForChanges",
            Self::ChangeFailureRate => "changeFailureRate",
            Self::TimeToRestoreServices => "timeToRestoreServices",
        }
    }

    /// Look up a metric by its camelCase name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subset of metrics a caller asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSelection {
    kinds: BTreeSet<MetricKind>,
}

impl MetricSelection {
    /// Every metric
    pub fn all() -> Self {
        Self {
            kinds: MetricKind::ALL.into_iter().collect(),
        }
    }

    /// Only the given metrics; an empty list selects everything
    pub fn only(kinds: impl IntoIterator<Item = MetricKind>) -> Self {
        let kinds: BTreeSet<_> = kinds.into_iter().collect();
        if kinds.is_empty() {
            Self::all()
        } else {
            Self { kinds }
        }
    }

    pub fn contains(&self, kind: MetricKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn is_all(&self) -> bool {
        self.kinds.len() == MetricKind::ALL.len()
    }
}

impl Default for MetricSelection {
    fn default() -> Self {
        Self::all()
    }
}

// ============================================================================
// Result types
// ============================================================================

/// Computed metrics for one repo and window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub repo: String,
    pub period: TimeWindow,
    pub total: Totals,
    pub metrics: MetricValues,
}

/// Record counts inside the window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub deployment_count: usize,
    pub incident_count: usize,
    pub changes_count: usize,
}

/// Metric values; unrequested metrics are `None` and omitted when serialized
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricValues {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_time_for_changes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_failure_rate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_restore_services: Option<String>,
}

// ============================================================================
// Engine
// ============================================================================

/// Computes DORA metrics over one repo's records
///
/// The records must already be scoped to `window`. "Now", used for incidents
/// that are still open, is captured once at construction so that every
/// metric in a run sees the same instant.
#[derive(Debug, Clone)]
pub struct MetricsEngine<'a> {
    changes: &'a [Change],
    deployments: &'a [Deployment],
    incidents: &'a [Incident],
    window: &'a TimeWindow,
    now_millis: i64,
}

impl<'a> MetricsEngine<'a> {
    pub fn new(
        changes: &'a [Change],
        deployments: &'a [Deployment],
        incidents: &'a [Incident],
        window: &'a TimeWindow,
    ) -> Self {
        Self {
            changes,
            deployments,
            incidents,
            window,
            now_millis: time::now_millis(),
        }
    }

    /// Override the instant used for unresolved incidents
    pub fn with_now(mut self, now_millis: i64) -> Self {
        self.now_millis = now_millis;
        self
    }

    /// Deployments per day, two decimals.
    pub fn deployment_frequency(&self) -> String {
        let days = self.window.days_in_scope();
        format!("{:.2}", self.deployments.len() as f64 / days as f64)
    }

    /// Lower-biased median of commit-to-deploy durations, as `DD:HH:MM:SS`.
    ///
    /// Deployments whose `changeSha` matches no change contribute zero, as do
    /// deployments recorded before their own change.
    pub fn lead_time_for_changes(&self) -> String {
        let mut durations: Vec<u64> = self
            .deployments
            .iter()
            .map(|deployment| self.lead_time(deployment))
            .collect();
        durations.sort_unstable();

        let n = durations.len();
        let index = if n >= 2 { n / 2 - 1 } else { 0 };
        let median = durations.get(index).copied().unwrap_or(0);

        time::prettify(median)
    }

    fn lead_time(&self, deployment: &Deployment) -> u64 {
        let Some(change) = self
            .changes
            .iter()
            .find(|change| change.id() == deployment.change_sha())
        else {
            return 0;
        };

        let (Some(committed), Some(deployed)) = (
            time::parse_millis(change.time_created()),
            time::parse_millis(deployment.time_created()),
        ) else {
            warn!(
                change = %change.id(),
                deployment = %deployment.id(),
                "Unparseable timestamp; lead time counted as zero"
            );
            return 0;
        };

        if committed > deployed {
            warn!(
                change = %change.id(),
                deployment = %deployment.id(),
                "Change created after its deployment; lead time counted as zero"
            );
            return 0;
        }

        time::diff_seconds(committed, deployed).unsigned_abs()
    }

    /// Incidents per deployment, two decimals; `0.00` when either count is zero.
    pub fn change_failure_rate(&self) -> String {
        let incidents = self.incidents.len();
        let deployments = self.deployments.len();

        if incidents == 0 || deployments == 0 {
            return "0.00".to_string();
        }
        format!("{:.2}", incidents as f64 / deployments as f64)
    }

    /// Mean incident duration, as `DD:HH:MM:SS`.
    ///
    /// Open incidents last until "now". Incidents resolved before they were
    /// created are skipped entirely.
    pub fn time_to_restore_services(&self) -> String {
        let (total, counted) = self
            .incidents
            .iter()
            .filter_map(|incident| self.restore_duration(incident))
            .fold((0u64, 0u64), |(total, count), secs| (total + secs, count + 1));

        if counted == 0 {
            return ZERO_DURATION.to_string();
        }
        time::prettify(total / counted)
    }

    fn restore_duration(&self, incident: &Incident) -> Option<u64> {
        let created = time::parse_millis(incident.time_created());
        let resolved = if incident.is_resolved() {
            time::parse_millis(incident.time_resolved())
        } else {
            Some(self.now_millis)
        };

        let (Some(created), Some(resolved)) = (created, resolved) else {
            warn!(incident = %incident.id(), "Unparseable incident timestamp; skipped");
            return None;
        };

        if created > resolved {
            warn!(
                incident = %incident.id(),
                "Incident resolved before it was created; skipped"
            );
            return None;
        }

        Some(time::diff_seconds(created, resolved).unsigned_abs())
    }

    /// Compute the selected metrics.
    pub fn compute(&self, repo: &str, selection: &MetricSelection) -> Metrics {
        Metrics {
            repo: repo.to_string(),
            period: self.window.clone(),
            total: Totals {
                deployment_count: self.deployments.len(),
                incident_count: self.incidents.len(),
                changes_count: self.changes.len(),
            },
            metrics: MetricValues {
                deployment_frequency: selected(selection, MetricKind::DeploymentFrequency, || {
                    self.deployment_frequency()
                }),
                lead_time_for_changes: selected(selection, MetricKind::LeadTimeForChanges, || {
                    self.lead_time_for_changes()
                }),
                change_failure_rate: selected(selection, MetricKind::ChangeFailureRate, || {
                    self.change_failure_rate()
                }),
                time_to_restore_services: selected(
                    selection,
                    MetricKind::TimeToRestoreServices,
                    || self.time_to_restore_services(),
                ),
            },
        }
    }
}

/// Run `compute` only for requested metrics
fn selected(
    selection: &MetricSelection,
    kind: MetricKind,
    compute: impl FnOnce() -> String,
) -> Option<String> {
    selection.contains(kind).then(compute)
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
