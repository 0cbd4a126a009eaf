use chrono::{DateTime, Duration, TimeZone, Utc};

use logicheck_recon::config::EngineConfig;
use logicheck_recon::import::{run_import, ImportFile, ImportOutcome};
use logicheck_recon::model::{ImportMode, PendencyType, Priority, RawRow, WorkspaceId};
use logicheck_recon::store::{MemoryStore, load_manifests};
use logicheck_recon::{branch_stats, derive_cycles, get_manifests, global_status, StatusLevel};

fn imported_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

fn manifest_row(shipment: &str, leg: &str, invoice: &str, status: &str) -> RawRow {
    RawRow::new()
        .with("Filial Origem", "SPO")
        .with("Filial Destino", "RIO")
        .with("Romaneio", shipment)
        .with("Tipo", leg)
        .with("NF", invoice)
        .with("Status", status)
}

fn confirmed(row: RawRow) -> RawRow {
    row.with("Conferencia data", "2024-01-01")
        .with("Conferido por", "Ana")
}

fn import(
    store: &mut MemoryStore,
    ws: &WorkspaceId,
    rows: Vec<RawRow>,
    mode: ImportMode,
) -> ImportOutcome {
    run_import(
        store,
        ws,
        vec![ImportFile::new("romaneios.xlsx", rows)],
        mode,
        &EngineConfig::default(),
        imported_at(),
    )
    .unwrap()
    .outcome
}

// -------------------------------------------------------------------------
// End to end
// -------------------------------------------------------------------------

#[test]
fn loading_confirmed_unloading_open_is_pending_destination() {
    let mut store = MemoryStore::new();
    let ws = WorkspaceId::new("ws-1");
    let config = EngineConfig::default();

    let outcome = import(
        &mut store,
        &ws,
        vec![
            confirmed(manifest_row("R1", "CARREGAMENTO", "NF1", "CONFERIDO")),
            manifest_row("R1", "DESCARGA", "NF1", "PENDENTE"),
        ],
        ImportMode::Accumulate,
    );
    assert_eq!(
        outcome,
        ImportOutcome::Imported {
            manifests: 2,
            stored: 2
        }
    );

    // no creation date column: the cycle ages from the import time
    let now = imported_at() + Duration::hours(30);
    let manifests = get_manifests(&store, &ws).unwrap();
    let cycles = derive_cycles(&manifests, now, &config);
    assert_eq!(cycles.len(), 1);

    let cycle = &cycles[0];
    assert_eq!(cycle.pendency, PendencyType::PendingDestination);
    assert!(cycle.pending);
    assert_eq!(cycle.aging_hours, 30);
    assert_eq!(cycle.priority, Priority::Medium);
    assert_eq!(cycle.destination_branch, "RIO");
    assert_eq!(cycle.total_invoices, 1);

    let stats = branch_stats(&cycles, &config.health);
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].pending_destination, 1);
    // 100 - 2 - 0 - 15
    assert_eq!(stats[0].health_score, 83);

    let status = global_status(&cycles, &config.network);
    assert_eq!(status.level, StatusLevel::Critical);
    assert_eq!(status.pending_rate, Some(100.0));
}

#[test]
fn young_pending_destination_is_low_priority() {
    let mut store = MemoryStore::new();
    let ws = WorkspaceId::new("ws-1");
    import(
        &mut store,
        &ws,
        vec![
            confirmed(manifest_row("R1", "CARREGAMENTO", "NF1", "CONFERIDO")),
            manifest_row("R1", "DESCARGA", "NF1", "PENDENTE"),
        ],
        ImportMode::Accumulate,
    );
    let manifests = get_manifests(&store, &ws).unwrap();
    let cycles = derive_cycles(
        &manifests,
        imported_at() + Duration::hours(5),
        &EngineConfig::default(),
    );
    assert_eq!(cycles[0].aging_hours, 5);
    assert_eq!(cycles[0].priority, Priority::Low);
}

#[test]
fn fresh_divergence_is_high_priority() {
    let mut store = MemoryStore::new();
    let ws = WorkspaceId::new("ws-1");
    import(
        &mut store,
        &ws,
        vec![
            manifest_row("R9", "CARREGAMENTO", "NF1", "COM DIVERGENCIA"),
            confirmed(manifest_row("R9", "DESCARGA", "NF1", "CONFERIDO")),
        ],
        ImportMode::Accumulate,
    );
    let manifests = get_manifests(&store, &ws).unwrap();
    let cycles = derive_cycles(
        &manifests,
        imported_at() + Duration::hours(1),
        &EngineConfig::default(),
    );
    assert_eq!(cycles[0].pendency, PendencyType::Divergence);
    assert_eq!(cycles[0].priority, Priority::High);
}

// -------------------------------------------------------------------------
// Merge semantics through the store
// -------------------------------------------------------------------------

#[test]
fn replace_import_wipes_prior_manifests() {
    let mut store = MemoryStore::new();
    let ws = WorkspaceId::new("ws-1");
    import(
        &mut store,
        &ws,
        vec![
            manifest_row("R1", "CARREGAMENTO", "NF1", "PENDENTE"),
            manifest_row("R2", "CARREGAMENTO", "NF2", "PENDENTE"),
        ],
        ImportMode::Accumulate,
    );
    import(
        &mut store,
        &ws,
        vec![manifest_row("R3", "CARREGAMENTO", "NF3", "PENDENTE")],
        ImportMode::Replace,
    );

    let manifests = get_manifests(&store, &ws).unwrap();
    assert_eq!(manifests.len(), 1);
    assert_eq!(manifests[0].shipment_id, "R3");
}

#[test]
fn accumulate_import_overwrites_without_inheriting_fields() {
    let mut store = MemoryStore::new();
    let ws = WorkspaceId::new("ws-1");
    import(
        &mut store,
        &ws,
        vec![manifest_row("R1", "CARREGAMENTO", "NF1", "PENDENTE")
            .with("Volumes", "40")
            .with("Motorista", "Ana")],
        ImportMode::Accumulate,
    );
    import(
        &mut store,
        &ws,
        vec![
            manifest_row("R1", "CARREGAMENTO", "NF1", "PENDENTE"),
            manifest_row("R2", "CARREGAMENTO", "NF2", "PENDENTE"),
        ],
        ImportMode::Accumulate,
    );

    let manifests = get_manifests(&store, &ws).unwrap();
    assert_eq!(manifests.len(), 2);
    let r1 = manifests.iter().find(|m| m.shipment_id == "R1").unwrap();
    assert_eq!(r1.aggregate_volume, 0.0);
    assert_eq!(r1.driver, "N/A");
}

#[test]
fn legacy_blob_is_migrated_on_next_import() {
    use logicheck_recon::store::{manifests_key, KeyValueStore};

    let mut store = MemoryStore::new();
    let ws = WorkspaceId::new("ws-1");
    store
        .put(
            &manifests_key(&ws),
            r#"[{"id":"old","veiculo":"ABC","filial":"SPO"}]"#.to_string(),
        )
        .unwrap();
    assert!(load_manifests(&store, &ws).unwrap().is_empty());

    import(
        &mut store,
        &ws,
        vec![manifest_row("R1", "CARREGAMENTO", "NF1", "PENDENTE")],
        ImportMode::Accumulate,
    );
    let manifests = get_manifests(&store, &ws).unwrap();
    assert_eq!(manifests.len(), 1);
    assert_eq!(manifests[0].origin_branch, "SPO");
}

#[test]
fn rows_without_shipment_id_are_dropped_silently() {
    let mut store = MemoryStore::new();
    let ws = WorkspaceId::new("ws-1");
    let footer = RawRow::new()
        .with("Filial Origem", "TOTAL")
        .with("Romaneio", "")
        .with("Volumes", "120");
    let outcome = import(
        &mut store,
        &ws,
        vec![manifest_row("R1", "CARREGAMENTO", "NF1", "PENDENTE"), footer],
        ImportMode::Accumulate,
    );
    assert_eq!(
        outcome,
        ImportOutcome::Imported {
            manifests: 1,
            stored: 1
        }
    );
}
