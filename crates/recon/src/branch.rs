use std::collections::BTreeMap;

use crate::config::HealthWeights;
use crate::model::{BranchStats, PendencyType, StabilityTier, TransferCycle};

#[derive(Default)]
struct Tally {
    total: usize,
    completed: usize,
    pending_origin: usize,
    pending_destination: usize,
    divergence: usize,
    aging_sum: i64,
    aging_max: i64,
}

impl Tally {
    fn pending(&self) -> usize {
        self.pending_origin + self.pending_destination + self.divergence
    }
}

/// Roll cycles up per origin branch. Aging and penalties only consider
/// pending cycles; complete cycles count toward totals.
///
/// Sorted worst-first (ascending health score, then branch name).
pub fn branch_stats(cycles: &[TransferCycle], weights: &HealthWeights) -> Vec<BranchStats> {
    let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();

    for c in cycles {
        let t = tallies.entry(c.origin_branch.as_str()).or_default();
        t.total += 1;
        match c.pendency {
            PendencyType::Complete => {
                t.completed += 1;
                continue;
            }
            PendencyType::PendingOrigin => t.pending_origin += 1,
            PendencyType::PendingDestination => t.pending_destination += 1,
            PendencyType::Divergence => t.divergence += 1,
        }
        t.aging_sum += c.aging_hours;
        t.aging_max = t.aging_max.max(c.aging_hours);
    }

    let mut stats: Vec<BranchStats> = tallies
        .into_iter()
        .map(|(branch, t)| {
            let pending = t.pending();
            let avg_aging_hours = if pending == 0 {
                0.0
            } else {
                t.aging_sum as f64 / pending as f64
            };
            let health_score = health_score(pending, t.divergence, avg_aging_hours, weights);
            BranchStats {
                branch: branch.to_string(),
                total_cycles: t.total,
                completed: t.completed,
                pending,
                pending_origin: t.pending_origin,
                pending_destination: t.pending_destination,
                divergence: t.divergence,
                avg_aging_hours,
                max_aging_hours: t.aging_max,
                health_score,
                tier: stability_tier(health_score, weights),
            }
        })
        .collect();

    stats.sort_by(|a, b| {
        a.health_score
            .cmp(&b.health_score)
            .then_with(|| a.branch.cmp(&b.branch))
    });
    stats
}

/// `100 - 2*pending - 5*divergence - 0.5*avg_aging`, clamped to 0..=100 and rounded.
pub fn health_score(
    pending: usize,
    divergence: usize,
    avg_aging_hours: f64,
    weights: &HealthWeights,
) -> u8 {
    let raw = 100.0
        - weights.pending_weight * pending as f64
        - weights.divergence_weight * divergence as f64
        - weights.aging_weight * avg_aging_hours;
    if raw.is_nan() {
        return 0;
    }
    raw.clamp(0.0, 100.0).round() as u8
}

pub fn stability_tier(score: u8, weights: &HealthWeights) -> StabilityTier {
    if score < weights.critical_below {
        StabilityTier::Critical
    } else if score < weights.attention_below {
        StabilityTier::Attention
    } else {
        StabilityTier::Stable
    }
}
