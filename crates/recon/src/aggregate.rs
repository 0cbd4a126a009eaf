use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use crate::config::{EngineConfig, StatusTokens};
use crate::cycle::classify_leg;
use crate::model::{Manifest, ManifestKey, ManifestStatus, NormalizedRow};
use crate::normalize::FALLBACK_TEXT;

/// Batch-level context stamped onto every manifest built from one file.
#[derive(Debug, Clone)]
pub struct BatchContext {
    pub import_id: String,
    /// Creation-date fallback and the reference point for `days_open`.
    pub processed_at: DateTime<Utc>,
}

/// Group rows by (origin_branch, shipment_id, leg_type_raw) and build one
/// manifest per group. Output is ordered by key.
///
/// The raw leg label stays in the key so that differently-labelled legs of
/// one shipment never collapse onto each other here; pairing into cycles
/// happens later, on the whole collection.
pub fn aggregate_manifests(
    rows: &[NormalizedRow],
    batch: &BatchContext,
    config: &EngineConfig,
) -> Vec<Manifest> {
    let mut groups: BTreeMap<ManifestKey, Vec<&NormalizedRow>> = BTreeMap::new();

    for row in rows {
        let key = ManifestKey {
            origin_branch: row.origin_branch.clone(),
            shipment_id: row.shipment_id.clone(),
            leg_type_raw: row.leg_type_raw.clone(),
        };
        groups.entry(key).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|(key, group)| build_manifest(key, &group, batch, config))
        .collect()
}

fn build_manifest(
    key: ManifestKey,
    group: &[&NormalizedRow],
    batch: &BatchContext,
    config: &EngineConfig,
) -> Manifest {
    let invoices: HashSet<&str> = group
        .iter()
        .filter_map(|r| r.invoice_id.as_deref())
        .collect();

    let created_at = group
        .iter()
        .find_map(|r| r.created_at)
        .unwrap_or(batch.processed_at);

    Manifest {
        leg_type: classify_leg(&key.leg_type_raw, &config.legs),
        cargo_label: first_known(group, |r| &r.cargo_label),
        destination_branch: first_known(group, |r| &r.destination_branch),
        vehicle: first_known(group, |r| &r.vehicle),
        driver: first_known(group, |r| &r.driver),
        created_at,
        aggregate_invoice_count: invoices.len(),
        aggregate_volume: finite_sum(group.iter().map(|r| r.volume), "volume", &key),
        aggregate_weight: finite_sum(group.iter().map(|r| r.weight), "weight", &key),
        status: group_status(group, &config.tokens),
        days_open: (batch.processed_at - created_at).num_days().max(0),
        last_updated_at: Utc::now(),
        row_count: group.len(),
        import_id: Some(batch.import_id.clone()),
        shipment_id: key.shipment_id,
        leg_type_raw: key.leg_type_raw,
        origin_branch: key.origin_branch,
    }
}

/// Sum that stays serializable. An overflowing total is stored as 0, the
/// same value an unparsable cell gets.
fn finite_sum(values: impl Iterator<Item = f64>, field: &str, key: &ManifestKey) -> f64 {
    let total: f64 = values.sum();
    if total.is_finite() {
        total
    } else {
        log::warn!(
            "{field} total for {}/{} is not finite, stored as 0",
            key.origin_branch,
            key.shipment_id
        );
        0.0
    }
}

/// First value in the group that is not the fallback placeholder.
fn first_known<F>(group: &[&NormalizedRow], field: F) -> String
where
    F: Fn(&NormalizedRow) -> &String,
{
    group
        .iter()
        .map(|r| field(r))
        .find(|v| v.as_str() != FALLBACK_TEXT)
        .cloned()
        .unwrap_or_else(|| FALLBACK_TEXT.to_string())
}

/// Divergent beats Pending beats Reconciled.
pub fn group_status(group: &[&NormalizedRow], tokens: &StatusTokens) -> ManifestStatus {
    if group.iter().any(|r| is_divergent(r, tokens)) {
        ManifestStatus::Divergent
    } else if group.iter().any(|r| is_incomplete(r, tokens)) {
        ManifestStatus::Pending
    } else {
        ManifestStatus::Reconciled
    }
}

/// Divergence tokens match whole words of the status. A status carrying a
/// negated phrase ("SEM DIVERGÊNCIA") is never divergent.
pub fn is_divergent(row: &NormalizedRow, tokens: &StatusTokens) -> bool {
    let words = status_words(&row.line_status);
    if tokens.no_divergence.iter().any(|t| contains_phrase(&words, t)) {
        return false;
    }
    tokens.divergence.iter().any(|t| contains_phrase(&words, t))
}

fn status_words(status: &str) -> Vec<String> {
    status
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_uppercase())
        .collect()
}

/// True when the token's words appear contiguously in `words`.
fn contains_phrase(words: &[String], token: &str) -> bool {
    let phrase = status_words(token);
    !phrase.is_empty() && words.windows(phrase.len()).any(|w| w == phrase.as_slice())
}

/// A row is incomplete unless its status is a completion token and it
/// carries both a completion date and a non-blank operator.
pub fn is_incomplete(row: &NormalizedRow, tokens: &StatusTokens) -> bool {
    let status_done = tokens.completion.iter().any(|t| *t == row.line_status);
    let has_operator = row
        .completion_operator
        .as_deref()
        .is_some_and(|op| !op.trim().is_empty());
    !status_done || row.completion_date.is_none() || !has_operator
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LegType;
    use chrono::TimeZone;

    fn ctx() -> BatchContext {
        BatchContext {
            import_id: "batch-1".into(),
            processed_at: Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap(),
        }
    }

    fn row(shipment: &str, leg: &str, invoice: Option<&str>, status: &str) -> NormalizedRow {
        NormalizedRow {
            shipment_id: shipment.into(),
            origin_branch: "SPO".into(),
            destination_branch: FALLBACK_TEXT.into(),
            leg_type_raw: leg.into(),
            cargo_label: FALLBACK_TEXT.into(),
            vehicle: FALLBACK_TEXT.into(),
            driver: FALLBACK_TEXT.into(),
            invoice_id: invoice.map(String::from),
            volume: 1.0,
            weight: 10.0,
            created_at: None,
            completion_date: None,
            completion_operator: None,
            line_status: status.into(),
        }
    }

    fn completed(mut r: NormalizedRow) -> NormalizedRow {
        r.completion_date = Some(Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap());
        r.completion_operator = Some("Ana".into());
        r
    }

    #[test]
    fn distinct_invoice_counting() {
        let rows = vec![
            row("R1", "CARREGAMENTO", Some("A"), "PENDENTE"),
            row("R1", "CARREGAMENTO", Some("A"), "PENDENTE"),
            row("R1", "CARREGAMENTO", Some("B"), "PENDENTE"),
        ];
        let manifests = aggregate_manifests(&rows, &ctx(), &EngineConfig::default());
        assert_eq!(manifests.len(), 1);
        let m = &manifests[0];
        assert_eq!(m.aggregate_invoice_count, 2);
        assert_eq!(m.row_count, 3);
        assert_eq!(m.aggregate_volume, 3.0);
        assert_eq!(m.aggregate_weight, 30.0);
        assert_eq!(m.leg_type, LegType::Loading);
        assert_eq!(m.import_id.as_deref(), Some("batch-1"));
    }

    #[test]
    fn zero_invoices_still_builds_manifest() {
        let rows = vec![row("R1", "DESCARGA", None, "")];
        let manifests = aggregate_manifests(&rows, &ctx(), &EngineConfig::default());
        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].aggregate_invoice_count, 0);
        assert_eq!(manifests[0].status, ManifestStatus::Pending);
    }

    #[test]
    fn raw_leg_labels_stay_separate() {
        let rows = vec![
            row("R1", "CARREGAMENTO", Some("A"), ""),
            row("R1", "Carregamento", Some("A"), ""),
            row("R1", "DESCARGA", Some("A"), ""),
        ];
        let manifests = aggregate_manifests(&rows, &ctx(), &EngineConfig::default());
        assert_eq!(manifests.len(), 3);
    }

    #[test]
    fn divergent_row_wins_over_everything() {
        let rows = vec![
            completed(row("R1", "CARGA", Some("A"), "CONFERIDO")),
            row("R1", "CARGA", Some("B"), "COM DIVERGENCIA"),
            row("R1", "CARGA", Some("C"), "PENDENTE"),
        ];
        let m = &aggregate_manifests(&rows, &ctx(), &EngineConfig::default())[0];
        assert_eq!(m.status, ManifestStatus::Divergent);
    }

    #[test]
    fn negated_divergence_is_not_divergent() {
        let tokens = StatusTokens::default();
        for status in ["SEM DIVERGÊNCIA", "SEM DIVERGENCIA", "NÃO DIVERGENTE", "OK - SEM DIVERGENCIAS"] {
            assert!(!is_divergent(&row("R1", "CARGA", None, status), &tokens), "{status}");
        }
        for status in ["DIVERGENTE", "COM DIVERGÊNCIA", "DIVERGENCIAS: 2 VOLUMES"] {
            assert!(is_divergent(&row("R1", "CARGA", None, status), &tokens), "{status}");
        }
    }

    #[test]
    fn divergence_tokens_match_whole_words() {
        let tokens = StatusTokens::default();
        assert!(!is_divergent(&row("R1", "CARGA", None, "CONVERGENTE"), &tokens));
        assert!(!is_divergent(&row("R1", "CARGA", None, "DIVERGENTES_ZERO"), &tokens));
        assert!(is_divergent(&row("R1", "CARGA", None, "PENDENTE/DIVERGENTE"), &tokens));
    }

    #[test]
    fn negated_status_with_completion_is_reconciled() {
        let mut tokens = StatusTokens::default();
        tokens.completion.push("SEM DIVERGÊNCIA".into());
        let r = completed(row("R1", "CARGA", None, "SEM DIVERGÊNCIA"));
        assert_eq!(group_status(&[&r], &tokens), ManifestStatus::Reconciled);
    }

    #[test]
    fn overflowing_sums_are_zeroed() {
        let mut a = row("R1", "CARGA", None, "");
        a.volume = f64::MAX;
        a.weight = 2.5;
        let mut b = row("R1", "CARGA", None, "");
        b.volume = f64::MAX;
        b.weight = 2.5;
        let m = &aggregate_manifests(&[a, b], &ctx(), &EngineConfig::default())[0];
        assert_eq!(m.aggregate_volume, 0.0);
        assert_eq!(m.aggregate_weight, 5.0);

        let blob = serde_json::to_string(&[m.clone()]).unwrap();
        assert_eq!(crate::merge::decode_manifests(&blob).len(), 1);
    }

    #[test]
    fn reconciled_needs_status_date_and_operator() {
        let tokens = StatusTokens::default();

        let ok = completed(row("R1", "CARGA", None, "CONFERIDO"));
        assert!(!is_incomplete(&ok, &tokens));

        let mut no_date = ok.clone();
        no_date.completion_date = None;
        assert!(is_incomplete(&no_date, &tokens));

        let mut blank_operator = ok.clone();
        blank_operator.completion_operator = Some("   ".into());
        assert!(is_incomplete(&blank_operator, &tokens));

        let mut wrong_status = ok.clone();
        wrong_status.line_status = "EM ANDAMENTO".into();
        assert!(is_incomplete(&wrong_status, &tokens));

        let rows = vec![ok.clone(), ok];
        let m = &aggregate_manifests(&rows, &ctx(), &EngineConfig::default())[0];
        assert_eq!(m.status, ManifestStatus::Reconciled);
    }

    #[test]
    fn created_at_falls_back_to_batch_time() {
        let rows = vec![row("R1", "CARGA", None, "")];
        let m = &aggregate_manifests(&rows, &ctx(), &EngineConfig::default())[0];
        assert_eq!(m.created_at, ctx().processed_at);
        assert_eq!(m.days_open, 0);
    }

    #[test]
    fn created_at_from_first_dated_row() {
        let mut first = row("R1", "CARGA", None, "");
        first.created_at = None;
        let mut second = row("R1", "CARGA", None, "");
        second.created_at = Some(Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap());
        let mut third = row("R1", "CARGA", None, "");
        third.created_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());

        let m = &aggregate_manifests(&[first, second, third], &ctx(), &EngineConfig::default())[0];
        assert_eq!(m.created_at, Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap());
        assert_eq!(m.days_open, 5);
    }

    #[test]
    fn future_creation_clamps_days_open() {
        let mut r = row("R1", "CARGA", None, "");
        r.created_at = Some(Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap());
        let m = &aggregate_manifests(&[r], &ctx(), &EngineConfig::default())[0];
        assert_eq!(m.days_open, 0);
    }

    #[test]
    fn descriptive_fields_skip_fallbacks() {
        let a = row("R1", "CARGA", None, "");
        let mut b = row("R1", "CARGA", None, "");
        b.driver = "Bruno".into();
        b.destination_branch = "RIO".into();
        let m = &aggregate_manifests(&[a, b], &ctx(), &EngineConfig::default())[0];
        assert_eq!(m.driver, "Bruno");
        assert_eq!(m.destination_branch, "RIO");
        assert_eq!(m.vehicle, FALLBACK_TEXT);
    }

    #[test]
    fn reaggregation_is_idempotent_apart_from_timestamp() {
        let rows = vec![
            completed(row("R1", "CARGA", Some("A"), "CONFERIDO")),
            row("R1", "DESCARGA", Some("A"), "PENDENTE"),
            row("R2", "CARGA", Some("B"), "DIVERGENTE"),
        ];
        let config = EngineConfig::default();
        let mut first = aggregate_manifests(&rows, &ctx(), &config);
        let mut second = aggregate_manifests(&rows, &ctx(), &config);
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        for m in first.iter_mut().chain(second.iter_mut()) {
            m.last_updated_at = epoch;
        }
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
