//! Report derivation from the aggregate store.
//!
//! Reporting is a pure read: the store snapshot is normalized (legacy bare
//! numbers become records) and folded into a [`Report`]. Missing or empty
//! data produces defined defaults, never an error.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::SiteRecord;
use crate::site::SiteKey;
use crate::store::{SiteStore, Snapshot, StoreError};

/// Maximum allowed time per site, in milliseconds.
pub type LimitTable = BTreeMap<SiteKey, u64>;

/// Classification configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A site was listed as both productive and distracting.
    #[error("site listed as both productive and distracting: {0}")]
    OverlappingSite(SiteKey),
}

/// How a site counts toward the productivity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Productive,
    Distracting,
    Neutral,
}

/// Disjoint productive and distracting site lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    productive: BTreeSet<SiteKey>,
    distracting: BTreeSet<SiteKey>,
}

impl Classification {
    pub fn new(
        productive: impl IntoIterator<Item = SiteKey>,
        distracting: impl IntoIterator<Item = SiteKey>,
    ) -> Result<Self, ConfigError> {
        let productive: BTreeSet<_> = productive.into_iter().collect();
        let distracting: BTreeSet<_> = distracting.into_iter().collect();
        if let Some(site) = productive.intersection(&distracting).next() {
            return Err(ConfigError::OverlappingSite(site.clone()));
        }
        Ok(Self {
            productive,
            distracting,
        })
    }

    pub fn category(&self, site: &SiteKey) -> Category {
        if self.productive.contains(site) {
            Category::Productive
        } else if self.distracting.contains(site) {
            Category::Distracting
        } else {
            Category::Neutral
        }
    }
}

/// The site with the most accumulated time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MostUsed {
    pub site: SiteKey,
    pub time_ms: u64,
}

/// A site whose time strictly exceeds its configured limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverLimit {
    pub site: SiteKey,
    pub time_ms: u64,
    pub limit_ms: u64,
}

/// One row of the per-site breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteSummary {
    pub site: SiteKey,
    #[serde(flatten)]
    pub record: SiteRecord,
    pub category: Category,
    /// Share of total time, rounded to a whole percent.
    pub share_percent: u8,
}

/// Summary metrics for presentation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub total_time_ms: u64,
    pub focus_time_ms: u64,
    pub distract_time_ms: u64,
    pub productivity_score: u8,
    pub most_used: Option<MostUsed>,
    pub over_limit: Vec<OverLimit>,
    /// Sites ordered by time descending, then hostname ascending.
    pub sites: Vec<SiteSummary>,
}

/// `round(part / whole * 100)` with halves rounded up, clamped to 100.
/// Returns 0 for an empty whole.
fn percent(part: u64, whole: u64) -> u8 {
    if whole == 0 {
        return 0;
    }
    let whole = u128::from(whole);
    let scaled = (u128::from(part) * 100 + whole / 2) / whole;
    u8::try_from(scaled.min(100)).unwrap_or(100)
}

/// Time descending, then hostname ascending.
fn by_usage(a: (&SiteKey, u64), b: (&SiteKey, u64)) -> Ordering {
    b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0))
}

/// Derives the report for a store snapshot.
pub fn compute_report(
    snapshot: &Snapshot,
    classification: &Classification,
    limits: &LimitTable,
) -> Report {
    let records: Vec<(&SiteKey, SiteRecord)> = snapshot
        .iter()
        .map(|(site, value)| (site, value.normalize()))
        .collect();

    let mut report = Report::default();
    for (site, record) in &records {
        report.total_time_ms = report.total_time_ms.saturating_add(record.time);
        match classification.category(site) {
            Category::Productive => {
                report.focus_time_ms = report.focus_time_ms.saturating_add(record.time);
            }
            Category::Distracting => {
                report.distract_time_ms = report.distract_time_ms.saturating_add(record.time);
            }
            Category::Neutral => {}
        }
    }
    report.productivity_score = percent(report.focus_time_ms, report.total_time_ms);

    report.most_used = records
        .iter()
        .min_by(|a, b| by_usage((a.0, a.1.time), (b.0, b.1.time)))
        .map(|(site, record)| MostUsed {
            site: (*site).clone(),
            time_ms: record.time,
        });

    report.over_limit = records
        .iter()
        .filter_map(|(site, record)| {
            let limit_ms = *limits.get(*site)?;
            (record.time > limit_ms).then(|| OverLimit {
                site: (*site).clone(),
                time_ms: record.time,
                limit_ms,
            })
        })
        .collect();

    let mut sites: Vec<SiteSummary> = records
        .iter()
        .map(|(site, record)| SiteSummary {
            site: (*site).clone(),
            record: *record,
            category: classification.category(site),
            share_percent: percent(record.time, report.total_time_ms),
        })
        .collect();
    sites.sort_by(|a, b| by_usage((&a.site, a.record.time), (&b.site, b.record.time)));
    report.sites = sites;

    report
}

/// Computes reports against fixed classification and limit configuration.
#[derive(Debug, Clone, Default)]
pub struct MetricsEngine {
    classification: Classification,
    limits: LimitTable,
}

impl MetricsEngine {
    pub const fn new(classification: Classification, limits: LimitTable) -> Self {
        Self {
            classification,
            limits,
        }
    }

    /// Derives the report for an already captured snapshot.
    pub fn report_from(&self, snapshot: &Snapshot) -> Report {
        compute_report(snapshot, &self.classification, &self.limits)
    }

    /// Snapshots `store` and derives the report. The store is not modified.
    pub async fn report<S: SiteStore>(&self, store: &S) -> Result<Report, StoreError> {
        let snapshot = store.snapshot().await?;
        Ok(self.report_from(&snapshot))
    }
}
