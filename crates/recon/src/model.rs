use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A single loosely-typed cell as handed over by a spreadsheet reader.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDateTime),
}

impl RawValue {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// One spreadsheet row keyed by its (inconsistently named) column headers.
///
/// Lookups are case-insensitive and ignore surrounding whitespace, so
/// `" Filial Origem"` and `"filial origem"` address the same cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    cells: BTreeMap<String, RawValue>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, header: &str, value: impl Into<RawValue>) {
        self.cells.insert(header_key(header), value.into());
    }

    pub fn with(mut self, header: &str, value: impl Into<RawValue>) -> Self {
        self.insert(header, value);
        self
    }

    pub fn get(&self, header: &str) -> Option<&RawValue> {
        self.cells.get(&header_key(header))
    }

    /// Normalized header names present in this row.
    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(|k| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.cells.values().all(RawValue::is_empty)
    }
}

pub(crate) fn header_key(header: &str) -> String {
    header.trim().to_lowercase()
}

/// Typed intermediate record produced by the row normalizer.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub shipment_id: String,
    pub origin_branch: String,
    pub destination_branch: String,
    pub leg_type_raw: String,
    pub cargo_label: String,
    pub vehicle: String,
    pub driver: String,
    pub invoice_id: Option<String>,
    pub volume: f64,
    pub weight: f64,
    pub created_at: Option<DateTime<Utc>>,
    pub completion_date: Option<DateTime<Utc>>,
    pub completion_operator: Option<String>,
    /// Upper-cased for token comparison.
    pub line_status: String,
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Leg identity. Stable across re-imports of the same spreadsheet content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ManifestKey {
    pub origin_branch: String,
    pub shipment_id: String,
    pub leg_type_raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegType {
    Loading,
    Unloading,
    Unclassified,
}

impl std::fmt::Display for LegType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::Unloading => write!(f, "unloading"),
            Self::Unclassified => write!(f, "unclassified"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestStatus {
    Pending,
    Reconciled,
    Divergent,
}

impl std::fmt::Display for ManifestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Reconciled => write!(f, "reconciled"),
            Self::Divergent => write!(f, "divergent"),
        }
    }
}

/// Aggregated record for one shipment leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub shipment_id: String,
    pub leg_type_raw: String,
    pub leg_type: LegType,
    pub cargo_label: String,
    pub origin_branch: String,
    pub destination_branch: String,
    pub vehicle: String,
    pub driver: String,
    pub created_at: DateTime<Utc>,
    /// Distinct invoice identifiers, not line count.
    pub aggregate_invoice_count: usize,
    pub aggregate_volume: f64,
    pub aggregate_weight: f64,
    pub status: ManifestStatus,
    pub days_open: i64,
    pub last_updated_at: DateTime<Utc>,
    pub row_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_id: Option<String>,
}

impl Manifest {
    pub fn key(&self) -> ManifestKey {
        ManifestKey {
            origin_branch: self.origin_branch.clone(),
            shipment_id: self.shipment_id.clone(),
            leg_type_raw: self.leg_type_raw.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Transfer cycles
// ---------------------------------------------------------------------------

/// Cycle identity: one shipment leaving one branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CycleKey {
    pub origin_branch: String,
    pub shipment_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendencyType {
    Divergence,
    PendingOrigin,
    PendingDestination,
    Complete,
}

impl std::fmt::Display for PendencyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Divergence => write!(f, "divergence"),
            Self::PendingOrigin => write!(f, "pending_origin"),
            Self::PendingDestination => write!(f, "pending_destination"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Paired loading/unloading view of one shipment. Derived, never persisted.
///
/// The legs are snapshots of the manifests found by key lookup; the cycle
/// does not own the manifest lifecycle.
#[derive(Debug, Clone, Serialize)]
pub struct TransferCycle {
    pub origin_branch: String,
    pub shipment_id: String,
    pub destination_branch: String,
    pub loading: Option<Manifest>,
    pub unloading: Option<Manifest>,
    pub created_at: DateTime<Utc>,
    pub aging_hours: i64,
    pub total_invoices: usize,
    pub total_volume: f64,
    pub total_weight: f64,
    pub pendency: PendencyType,
    pub pending: bool,
    pub priority: Priority,
}

impl TransferCycle {
    pub fn key(&self) -> CycleKey {
        CycleKey {
            origin_branch: self.origin_branch.clone(),
            shipment_id: self.shipment_id.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Branch + network health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityTier {
    Stable,
    Attention,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchStats {
    pub branch: String,
    pub total_cycles: usize,
    pub completed: usize,
    pub pending: usize,
    pub pending_origin: usize,
    pub pending_destination: usize,
    pub divergence: usize,
    pub avg_aging_hours: f64,
    pub max_aging_hours: i64,
    pub health_score: u8,
    pub tier: StabilityTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    NoData,
    Stable,
    Attention,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkStatus {
    pub level: StatusLevel,
    pub label: String,
    pub description: String,
    /// `None` when there are no cycles.
    pub pending_rate: Option<f64>,
}

// ---------------------------------------------------------------------------
// Import bookkeeping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Upsert by manifest key, keep everything else.
    #[default]
    Accumulate,
    /// Discard the existing collection.
    Replace,
}

/// One imported file. Used for orphan detection and batch deletion only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBatch {
    pub id: String,
    pub file_name: String,
    pub timestamp: DateTime<Utc>,
    pub record_count: usize,
    #[serde(default)]
    pub manifest_count: usize,
}

/// Opaque scope for persisted collections.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case_and_padding() {
        let row = RawRow::new().with(" Filial Origem ", "SPO");
        assert_eq!(row.get("filial origem"), Some(&RawValue::Text("SPO".into())));
        assert_eq!(row.get("FILIAL ORIGEM"), Some(&RawValue::Text("SPO".into())));
        assert!(row.get("Filial Destino").is_none());
    }

    #[test]
    fn blank_row_is_empty() {
        let row = RawRow::new().with("A", "  ").with("B", RawValue::Empty);
        assert!(row.is_empty());
        let row = row.with("C", 0.0);
        assert!(!row.is_empty());
    }

    #[test]
    fn manifest_serializes_origin_branch_in_camel_case() {
        let now = chrono::Utc::now();
        let m = Manifest {
            shipment_id: "R1".into(),
            leg_type_raw: "CARREGAMENTO".into(),
            leg_type: LegType::Loading,
            cargo_label: "N/A".into(),
            origin_branch: "SPO".into(),
            destination_branch: "RIO".into(),
            vehicle: "N/A".into(),
            driver: "N/A".into(),
            created_at: now,
            aggregate_invoice_count: 0,
            aggregate_volume: 0.0,
            aggregate_weight: 0.0,
            status: ManifestStatus::Pending,
            days_open: 0,
            last_updated_at: now,
            row_count: 1,
            import_id: None,
        };
        let value = serde_json::to_value(&m).unwrap();
        assert_eq!(value["originBranch"], "SPO");
        assert_eq!(value["status"], "pending");
        assert!(value.get("importId").is_none());
    }
}
