//! Transfer-cycle derivation: pairs loading and unloading legs per
//! (origin branch, shipment) and classifies why the cycle is still open.
//!
//! Recomputed from the full manifest collection on every read; nothing here
//! is persisted.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::config::{EngineConfig, LegKeywords, PriorityThresholds};
use crate::model::{
    CycleKey, LegType, Manifest, ManifestStatus, PendencyType, Priority, TransferCycle,
};
use crate::normalize::FALLBACK_TEXT;

/// Classify a raw leg label by keyword. Unloading keywords are checked first.
pub fn classify_leg(raw: &str, keywords: &LegKeywords) -> LegType {
    let label = raw.trim().to_uppercase();
    if label.is_empty() {
        return LegType::Unclassified;
    }
    let hit = |list: &[String]| {
        list.iter()
            .any(|k| !k.trim().is_empty() && label.contains(&k.trim().to_uppercase()))
    };
    if hit(&keywords.unloading) {
        LegType::Unloading
    } else if hit(&keywords.loading) {
        LegType::Loading
    } else {
        LegType::Unclassified
    }
}

#[derive(Default)]
struct LegSlots<'a> {
    loading: Option<&'a Manifest>,
    unloading: Option<&'a Manifest>,
    unclassified: Option<&'a Manifest>,
}

/// Build one cycle per distinct (origin branch, shipment id).
///
/// Result does not depend on input order: manifests are visited in key order
/// and, when two legs compete for one slot, the more severe status wins
/// (ties go to the smaller key). Unclassified legs only fill an empty
/// loading slot after every classified leg has been placed.
pub fn derive_cycles(
    manifests: &[Manifest],
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Vec<TransferCycle> {
    let mut sorted: Vec<&Manifest> = manifests.iter().collect();
    sorted.sort_by_key(|m| m.key());

    let mut groups: BTreeMap<CycleKey, LegSlots> = BTreeMap::new();
    for m in sorted {
        let key = CycleKey {
            origin_branch: m.origin_branch.clone(),
            shipment_id: m.shipment_id.clone(),
        };
        let slots = groups.entry(key).or_default();
        let slot = match classify_leg(&m.leg_type_raw, &config.legs) {
            LegType::Loading => &mut slots.loading,
            LegType::Unloading => &mut slots.unloading,
            LegType::Unclassified => &mut slots.unclassified,
        };
        place(slot, m);
    }

    groups
        .into_iter()
        .filter_map(|(key, slots)| {
            let loading = slots.loading.or(slots.unclassified);
            if slots.loading.is_some() && slots.unclassified.is_some() {
                log::debug!(
                    "cycle {}/{}: unclassified leg '{}' ignored for pairing",
                    key.origin_branch,
                    key.shipment_id,
                    slots.unclassified.map(|m| m.leg_type_raw.as_str()).unwrap_or_default()
                );
            }
            build_cycle(key, loading, slots.unloading, now, &config.priority)
        })
        .collect()
}

fn place<'a>(slot: &mut Option<&'a Manifest>, candidate: &'a Manifest) {
    match *slot {
        Some(current) if severity(candidate.status) > severity(current.status) => {
            log::debug!(
                "leg '{}' of {} replaces less severe duplicate '{}'",
                candidate.leg_type_raw,
                candidate.shipment_id,
                current.leg_type_raw
            );
            *slot = Some(candidate);
        }
        Some(current) => {
            log::debug!(
                "duplicate leg '{}' of {} ignored in favour of '{}'",
                candidate.leg_type_raw,
                candidate.shipment_id,
                current.leg_type_raw
            );
        }
        None => *slot = Some(candidate),
    }
}

fn severity(status: ManifestStatus) -> u8 {
    match status {
        ManifestStatus::Reconciled => 0,
        ManifestStatus::Pending => 1,
        ManifestStatus::Divergent => 2,
    }
}

fn build_cycle(
    key: CycleKey,
    loading: Option<&Manifest>,
    unloading: Option<&Manifest>,
    now: DateTime<Utc>,
    thresholds: &PriorityThresholds,
) -> Option<TransferCycle> {
    let anchor = loading.or(unloading)?;
    let created_at = anchor.created_at;
    let aging_hours = (now - created_at).num_hours().max(0);

    let pendency = classify_pendency(loading.map(|m| m.status), unloading.map(|m| m.status));
    let destination_branch = [loading, unloading]
        .into_iter()
        .flatten()
        .map(|m| m.destination_branch.as_str())
        .find(|d| *d != FALLBACK_TEXT)
        .unwrap_or(FALLBACK_TEXT)
        .to_string();

    Some(TransferCycle {
        origin_branch: key.origin_branch,
        shipment_id: key.shipment_id,
        destination_branch,
        created_at,
        aging_hours,
        total_invoices: loading.map(|m| m.aggregate_invoice_count).unwrap_or(0),
        total_volume: loading.map(|m| m.aggregate_volume).unwrap_or(0.0),
        total_weight: loading.map(|m| m.aggregate_weight).unwrap_or(0.0),
        pendency,
        pending: pendency != PendencyType::Complete,
        priority: priority_for(pendency, aging_hours, thresholds),
        loading: loading.cloned(),
        unloading: unloading.cloned(),
    })
}

/// Fixed hierarchy, first match wins:
/// divergence on either leg, then an unconfirmed origin, then an
/// unconfirmed destination. A missing unloading leg is never complete.
pub fn classify_pendency(
    loading: Option<ManifestStatus>,
    unloading: Option<ManifestStatus>,
) -> PendencyType {
    if loading == Some(ManifestStatus::Divergent) || unloading == Some(ManifestStatus::Divergent) {
        PendencyType::Divergence
    } else if loading != Some(ManifestStatus::Reconciled) {
        PendencyType::PendingOrigin
    } else if unloading != Some(ManifestStatus::Reconciled) {
        PendencyType::PendingDestination
    } else {
        PendencyType::Complete
    }
}

/// Sorting/alerting tier. Does not feed back into classification.
pub fn priority_for(
    pendency: PendencyType,
    aging_hours: i64,
    thresholds: &PriorityThresholds,
) -> Priority {
    match pendency {
        PendencyType::Divergence => Priority::High,
        PendencyType::Complete => Priority::Low,
        _ if aging_hours >= thresholds.high_aging_hours => Priority::High,
        PendencyType::PendingDestination if aging_hours >= thresholds.medium_aging_hours => {
            Priority::Medium
        }
        _ => Priority::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn leg(shipment: &str, raw: &str, status: ManifestStatus) -> Manifest {
        Manifest {
            shipment_id: shipment.into(),
            leg_type_raw: raw.into(),
            leg_type: classify_leg(raw, &LegKeywords::default()),
            cargo_label: FALLBACK_TEXT.into(),
            origin_branch: "SPO".into(),
            destination_branch: "RIO".into(),
            vehicle: FALLBACK_TEXT.into(),
            driver: FALLBACK_TEXT.into(),
            created_at: t0(),
            aggregate_invoice_count: 3,
            aggregate_volume: 12.0,
            aggregate_weight: 120.0,
            status,
            days_open: 0,
            last_updated_at: t0(),
            row_count: 3,
            import_id: None,
        }
    }

    fn one_cycle(manifests: &[Manifest], hours: i64) -> TransferCycle {
        let cycles = derive_cycles(manifests, t0() + Duration::hours(hours), &EngineConfig::default());
        assert_eq!(cycles.len(), 1);
        cycles.into_iter().next().unwrap()
    }

    #[test]
    fn leg_keywords() {
        let kw = LegKeywords::default();
        assert_eq!(classify_leg("CARREGAMENTO", &kw), LegType::Loading);
        assert_eq!(classify_leg("carga", &kw), LegType::Loading);
        assert_eq!(classify_leg("Descarga", &kw), LegType::Unloading);
        assert_eq!(classify_leg("UNLOADING", &kw), LegType::Unloading);
        assert_eq!(classify_leg("Entrada CD", &kw), LegType::Unloading);
        assert_eq!(classify_leg("Transbordo", &kw), LegType::Unclassified);
        assert_eq!(classify_leg("", &kw), LegType::Unclassified);
    }

    #[test]
    fn hierarchy_table() {
        use ManifestStatus::*;
        use PendencyType as P;
        assert_eq!(classify_pendency(Some(Divergent), Some(Reconciled)), P::Divergence);
        assert_eq!(classify_pendency(Some(Reconciled), Some(Divergent)), P::Divergence);
        assert_eq!(classify_pendency(None, Some(Divergent)), P::Divergence);
        assert_eq!(classify_pendency(None, Some(Reconciled)), P::PendingOrigin);
        assert_eq!(classify_pendency(Some(Pending), Some(Reconciled)), P::PendingOrigin);
        assert_eq!(classify_pendency(Some(Pending), None), P::PendingOrigin);
        assert_eq!(classify_pendency(Some(Reconciled), None), P::PendingDestination);
        assert_eq!(classify_pendency(Some(Reconciled), Some(Pending)), P::PendingDestination);
        assert_eq!(classify_pendency(Some(Reconciled), Some(Reconciled)), P::Complete);
    }

    #[test]
    fn divergent_loading_beats_reconciled_unloading_in_any_order() {
        let a = leg("R1", "CARREGAMENTO", ManifestStatus::Divergent);
        let b = leg("R1", "DESCARGA", ManifestStatus::Reconciled);
        let forward = one_cycle(&[a.clone(), b.clone()], 1);
        let backward = one_cycle(&[b, a], 1);
        assert_eq!(forward.pendency, PendencyType::Divergence);
        assert_eq!(backward.pendency, PendencyType::Divergence);
    }

    #[test]
    fn missing_loading_is_pending_origin() {
        let c = one_cycle(&[leg("R1", "DESCARGA", ManifestStatus::Reconciled)], 5);
        assert_eq!(c.pendency, PendencyType::PendingOrigin);
        assert!(c.pending);
        assert!(c.loading.is_none());
        assert_eq!(c.total_invoices, 0);
        assert_eq!(c.total_volume, 0.0);
    }

    #[test]
    fn complete_cycle() {
        let c = one_cycle(
            &[
                leg("R1", "CARREGAMENTO", ManifestStatus::Reconciled),
                leg("R1", "DESCARGA", ManifestStatus::Reconciled),
            ],
            100,
        );
        assert_eq!(c.pendency, PendencyType::Complete);
        assert!(!c.pending);
        assert_eq!(c.priority, Priority::Low);
        assert_eq!(c.total_invoices, 3);
        assert_eq!(c.total_weight, 120.0);
    }

    #[test]
    fn aging_floors_hours_from_loading_leg() {
        let mut load = leg("R1", "CARGA", ManifestStatus::Pending);
        load.created_at = t0() - Duration::minutes(90);
        let mut unload = leg("R1", "DESCARGA", ManifestStatus::Pending);
        unload.created_at = t0() - Duration::hours(10);
        let c = one_cycle(&[load, unload], 0);
        assert_eq!(c.aging_hours, 1);
        assert_eq!(c.created_at, t0() - Duration::minutes(90));
    }

    #[test]
    fn unloading_anchors_when_loading_absent() {
        let mut unload = leg("R1", "DESCARGA", ManifestStatus::Pending);
        unload.created_at = t0() - Duration::hours(30);
        let c = one_cycle(&[unload], 0);
        assert_eq!(c.aging_hours, 30);
    }

    #[test]
    fn priority_tiers() {
        let th = PriorityThresholds::default();
        assert_eq!(priority_for(PendencyType::Divergence, 1, &th), Priority::High);
        assert_eq!(priority_for(PendencyType::PendingOrigin, 48, &th), Priority::High);
        assert_eq!(priority_for(PendencyType::PendingOrigin, 30, &th), Priority::Low);
        assert_eq!(priority_for(PendencyType::PendingDestination, 24, &th), Priority::Medium);
        assert_eq!(priority_for(PendencyType::PendingDestination, 23, &th), Priority::Low);
        assert_eq!(priority_for(PendencyType::PendingDestination, 60, &th), Priority::High);
        assert_eq!(priority_for(PendencyType::Complete, 500, &th), Priority::Low);
    }

    #[test]
    fn unclassified_fills_empty_loading_slot_only() {
        let c = one_cycle(
            &[
                leg("R1", "TRANSBORDO", ManifestStatus::Reconciled),
                leg("R1", "DESCARGA", ManifestStatus::Pending),
            ],
            1,
        );
        assert_eq!(c.loading.as_ref().map(|m| m.leg_type_raw.as_str()), Some("TRANSBORDO"));
        assert_eq!(c.pendency, PendencyType::PendingDestination);

        let c = one_cycle(
            &[
                leg("R1", "TRANSBORDO", ManifestStatus::Divergent),
                leg("R1", "CARGA", ManifestStatus::Reconciled),
                leg("R1", "DESCARGA", ManifestStatus::Reconciled),
            ],
            1,
        );
        assert_eq!(c.loading.as_ref().map(|m| m.leg_type_raw.as_str()), Some("CARGA"));
        assert_eq!(c.pendency, PendencyType::Complete);
    }

    #[test]
    fn duplicate_legs_keep_most_severe() {
        let c = one_cycle(
            &[
                leg("R1", "CARGA", ManifestStatus::Reconciled),
                leg("R1", "Carregamento", ManifestStatus::Divergent),
                leg("R1", "DESCARGA", ManifestStatus::Reconciled),
            ],
            1,
        );
        assert_eq!(c.pendency, PendencyType::Divergence);
    }

    #[test]
    fn cycles_are_per_origin_and_shipment() {
        let mut other_origin = leg("R1", "CARGA", ManifestStatus::Pending);
        other_origin.origin_branch = "CWB".into();
        let cycles = derive_cycles(
            &[
                leg("R1", "CARGA", ManifestStatus::Pending),
                leg("R2", "CARGA", ManifestStatus::Pending),
                other_origin,
            ],
            t0(),
            &EngineConfig::default(),
        );
        let keys: Vec<_> = cycles
            .iter()
            .map(|c| format!("{}/{}", c.origin_branch, c.shipment_id))
            .collect();
        assert_eq!(keys, vec!["CWB/R1", "SPO/R1", "SPO/R2"]);
    }

    #[test]
    fn empty_collection_has_no_cycles() {
        assert!(derive_cycles(&[], t0(), &EngineConfig::default()).is_empty());
    }
}
