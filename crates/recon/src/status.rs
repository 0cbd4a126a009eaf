use crate::config::NetworkThresholds;
use crate::model::{NetworkStatus, PendencyType, StatusLevel, TransferCycle};

/// Network-wide status from the share of pending cycles.
///
/// An aged divergence (strictly older than `divergence_aging_hours`) forces
/// `Critical` regardless of the pending rate.
pub fn global_status(cycles: &[TransferCycle], thresholds: &NetworkThresholds) -> NetworkStatus {
    if cycles.is_empty() {
        return NetworkStatus {
            level: StatusLevel::NoData,
            label: "No Data".into(),
            description: "No transfer cycles imported yet".into(),
            pending_rate: None,
        };
    }

    let pending = cycles.iter().filter(|c| c.pending).count();
    let rate = pending as f64 / cycles.len() as f64 * 100.0;
    let aged_divergences = cycles
        .iter()
        .filter(|c| {
            c.pendency == PendencyType::Divergence
                && c.aging_hours > thresholds.divergence_aging_hours
        })
        .count();

    let (level, label, description) = if rate > thresholds.critical_rate || aged_divergences > 0 {
        let description = if aged_divergences > 0 {
            format!(
                "{rate:.1}% of cycles pending; {aged_divergences} divergence(s) open longer than {}h",
                thresholds.divergence_aging_hours
            )
        } else {
            format!("{rate:.1}% of cycles pending")
        };
        (StatusLevel::Critical, "Critical", description)
    } else if rate > thresholds.attention_rate {
        (
            StatusLevel::Attention,
            "Attention",
            format!("{rate:.1}% of cycles pending"),
        )
    } else {
        (
            StatusLevel::Stable,
            "Stable",
            format!("{rate:.1}% of cycles pending"),
        )
    };

    NetworkStatus {
        level,
        label: label.into(),
        description,
        pending_rate: Some(rate),
    }
}

/// Coarse 0..=100 share of concluded cycles. Unrelated to branch health.
pub fn completion_score(cycles: &[TransferCycle]) -> u8 {
    if cycles.is_empty() {
        return 0;
    }
    let concluded = cycles.iter().filter(|c| !c.pending).count();
    (concluded as f64 / cycles.len() as f64 * 100.0).round() as u8
}
