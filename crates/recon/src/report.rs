//! Read-side summaries for dashboards and exported reports. Everything here
//! is recomputed from manifests/cycles on demand.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::NetworkThresholds;
use crate::model::{Manifest, ManifestStatus, PendencyType, StatusLevel, TransferCycle};
use crate::status::global_status;

// ---------------------------------------------------------------------------
// Cycle summaries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct NetworkSummary {
    pub total_cycles: usize,
    pub concluded: usize,
    pub pending: usize,
    pub pending_origin: usize,
    pub pending_destination: usize,
    pub divergence: usize,
    pub status: StatusLevel,
    pub status_label: String,
    /// Mean aging of pending cycles, rounded to whole hours.
    pub avg_pending_aging_hours: i64,
}

pub fn network_summary(cycles: &[TransferCycle], thresholds: &NetworkThresholds) -> NetworkSummary {
    let mut summary = NetworkSummary {
        total_cycles: cycles.len(),
        concluded: 0,
        pending: 0,
        pending_origin: 0,
        pending_destination: 0,
        divergence: 0,
        status: StatusLevel::NoData,
        status_label: String::new(),
        avg_pending_aging_hours: 0,
    };

    let mut aging_sum = 0i64;
    for c in cycles {
        match c.pendency {
            PendencyType::Complete => {
                summary.concluded += 1;
                continue;
            }
            PendencyType::PendingOrigin => summary.pending_origin += 1,
            PendencyType::PendingDestination => summary.pending_destination += 1,
            PendencyType::Divergence => summary.divergence += 1,
        }
        summary.pending += 1;
        aging_sum += c.aging_hours;
    }
    if summary.pending > 0 {
        summary.avg_pending_aging_hours =
            (aging_sum as f64 / summary.pending as f64).round() as i64;
    }

    let status = global_status(cycles, thresholds);
    summary.status = status.level;
    summary.status_label = status.label;
    summary
}

/// Pending cycles, divergences first, then oldest first.
pub fn pending_worklist(cycles: &[TransferCycle]) -> Vec<&TransferCycle> {
    let mut pending: Vec<&TransferCycle> = cycles.iter().filter(|c| c.pending).collect();
    pending.sort_by(|a, b| {
        let a_div = a.pendency == PendencyType::Divergence;
        let b_div = b.pendency == PendencyType::Divergence;
        b_div
            .cmp(&a_div)
            .then_with(|| b.aging_hours.cmp(&a.aging_hours))
            .then_with(|| a.key().cmp(&b.key()))
    });
    pending
}

// ---------------------------------------------------------------------------
// Manifest summaries
// ---------------------------------------------------------------------------

/// Pending manifests by days open: `0-1`, `2-3`, `4-7`, `8+`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AgingBuckets {
    pub up_to_1: usize,
    pub from_2_to_3: usize,
    pub from_4_to_7: usize,
    pub over_7: usize,
}

impl AgingBuckets {
    fn record(&mut self, days_open: i64) {
        match days_open {
            i64::MIN..=1 => self.up_to_1 += 1,
            2..=3 => self.from_2_to_3 += 1,
            4..=7 => self.from_4_to_7 += 1,
            _ => self.over_7 += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestOverview {
    pub total: usize,
    pub pending: usize,
    pub reconciled: usize,
    pub divergent: usize,
    pub oldest_pending_days: i64,
    pub aging: AgingBuckets,
    /// (origin branch, pending manifests), descending, at most ten entries.
    pub pending_by_origin: Vec<(String, usize)>,
}

const TOP_ORIGINS: usize = 10;

/// "Pending" here means anything not reconciled, divergent manifests included.
pub fn manifest_overview(manifests: &[Manifest]) -> ManifestOverview {
    let mut overview = ManifestOverview {
        total: manifests.len(),
        pending: 0,
        reconciled: 0,
        divergent: 0,
        oldest_pending_days: 0,
        aging: AgingBuckets::default(),
        pending_by_origin: Vec::new(),
    };
    let mut by_origin: HashMap<&str, usize> = HashMap::new();

    for m in manifests {
        match m.status {
            ManifestStatus::Reconciled => {
                overview.reconciled += 1;
                continue;
            }
            ManifestStatus::Divergent => overview.divergent += 1,
            ManifestStatus::Pending => {}
        }
        overview.pending += 1;
        overview.oldest_pending_days = overview.oldest_pending_days.max(m.days_open);
        overview.aging.record(m.days_open);
        *by_origin.entry(m.origin_branch.as_str()).or_default() += 1;
    }

    let mut ranked: Vec<(String, usize)> = by_origin
        .into_iter()
        .map(|(branch, n)| (branch.to_string(), n))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(TOP_ORIGINS);
    overview.pending_by_origin = ranked;
    overview
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Reconciled,
    Divergent,
}

impl StatusFilter {
    fn accepts(self, status: ManifestStatus) -> bool {
        match self {
            Self::All => true,
            Self::Pending => status == ManifestStatus::Pending,
            Self::Reconciled => status == ManifestStatus::Reconciled,
            Self::Divergent => status == ManifestStatus::Divergent,
        }
    }
}

/// Filter by status and free-text search, pending first then oldest first.
pub fn filter_manifests<'a>(
    manifests: &'a [Manifest],
    filter: StatusFilter,
    search: &str,
) -> Vec<&'a Manifest> {
    let needle = search.trim().to_lowercase();
    let mut hits: Vec<&Manifest> = manifests
        .iter()
        .filter(|m| filter.accepts(m.status))
        .filter(|m| needle.is_empty() || matches_search(m, &needle))
        .collect();

    hits.sort_by(|a, b| {
        let a_open = a.status != ManifestStatus::Reconciled;
        let b_open = b.status != ManifestStatus::Reconciled;
        b_open
            .cmp(&a_open)
            .then_with(|| b.days_open.cmp(&a.days_open))
    });
    hits
}

fn matches_search(m: &Manifest, needle: &str) -> bool {
    [
        &m.shipment_id,
        &m.driver,
        &m.origin_branch,
        &m.destination_branch,
        &m.vehicle,
        &m.cargo_label,
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(needle))
}
