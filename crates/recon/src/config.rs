use serde::Deserialize;

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Engine tuning: column aliases, status vocabularies and every threshold
/// used by classification and scoring. All sections are optional in TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub aliases: ColumnAliases,
    pub tokens: StatusTokens,
    pub legs: LegKeywords,
    pub priority: PriorityThresholds,
    pub health: HealthWeights,
    pub network: NetworkThresholds,
}

// ---------------------------------------------------------------------------
// Column aliases
// ---------------------------------------------------------------------------

/// Header aliases per logical field, tried in order. Matching is
/// case-insensitive; the first alias with a non-empty cell wins.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColumnAliases {
    pub shipment_id: Vec<String>,
    pub origin_branch: Vec<String>,
    pub destination_branch: Vec<String>,
    pub leg_type: Vec<String>,
    pub cargo_label: Vec<String>,
    pub vehicle: Vec<String>,
    pub driver: Vec<String>,
    pub invoice_id: Vec<String>,
    pub volume: Vec<String>,
    pub weight: Vec<String>,
    pub created_at: Vec<String>,
    pub completion_date: Vec<String>,
    pub completion_operator: Vec<String>,
    pub line_status: Vec<String>,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for ColumnAliases {
    fn default() -> Self {
        Self {
            shipment_id: names(&[
                "Romaneio",
                "Nº Romaneio",
                "Numero Romaneio",
                "Número Romaneio",
                "Manifesto",
                "ID Transferencia",
                "Shipment",
                "Shipment ID",
                "shipmentId",
            ]),
            origin_branch: names(&[
                "Filial Origem",
                "Filial",
                "Origem",
                "Origin Branch",
                "Origin",
                "originBranch",
            ]),
            destination_branch: names(&[
                "Filial Destino",
                "Destino",
                "Destination Branch",
                "Destination",
                "destinationBranch",
            ]),
            leg_type: names(&["Tipo", "Tipo Romaneio", "Operação", "Operacao", "Leg Type", "legType"]),
            cargo_label: names(&["Carga", "Cargo", "cargoLabel"]),
            vehicle: names(&["Veículo", "Veiculo", "Placa", "Vehicle"]),
            driver: names(&["Motorista", "Driver"]),
            invoice_id: names(&["NF", "Nota Fiscal", "Número NF", "Numero NF", "Invoice", "invoice"]),
            volume: names(&["Volumes", "Volume", "Qtd Volumes"]),
            weight: names(&["Peso", "Peso (kg)", "Weight"]),
            created_at: names(&[
                "Data Criação",
                "Data Criacao",
                "Data Emissão",
                "Data Emissao",
                "Created At",
                "createdAt",
            ]),
            completion_date: names(&[
                "Conferencia data",
                "Data Conferência",
                "Data Conferencia",
                "Completion Date",
                "confDate",
            ]),
            completion_operator: names(&["Conferido por", "Conferente", "Completion Operator", "confUser"]),
            line_status: names(&["Status", "Situação", "Situacao", "Line Status"]),
        }
    }
}

// ---------------------------------------------------------------------------
// Vocabularies
// ---------------------------------------------------------------------------

/// Line-status vocabularies, compared against the upper-cased status cell.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusTokens {
    /// Exact matches meaning the line was checked off.
    pub completion: Vec<String>,
    /// Whole-word matches flagging a divergent line.
    pub divergence: Vec<String>,
    /// Negated phrases ("no divergence"). Checked before `divergence`.
    pub no_divergence: Vec<String>,
}

impl Default for StatusTokens {
    fn default() -> Self {
        Self {
            completion: names(&[
                "CONFERIDO",
                "CONCLUIDO",
                "CONCLUÍDO",
                "FINALIZADO",
                "COMPLETED",
                "RECONCILED",
            ]),
            divergence: names(&[
                "DIVERGENTE",
                "DIVERGENCIA",
                "DIVERGÊNCIA",
                "DIVERGENCIAS",
                "DIVERGÊNCIAS",
                "DIVERGENT",
            ]),
            no_divergence: names(&[
                "SEM DIVERGENCIA",
                "SEM DIVERGÊNCIA",
                "SEM DIVERGENCIAS",
                "SEM DIVERGÊNCIAS",
                "NÃO DIVERGENTE",
                "NAO DIVERGENTE",
                "NO DIVERGENCE",
                "NOT DIVERGENT",
            ]),
        }
    }
}

/// Keywords classifying raw leg labels. Unloading is checked first because
/// several unloading words contain a loading word ("DESCARGA" / "CARGA").
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LegKeywords {
    pub loading: Vec<String>,
    pub unloading: Vec<String>,
}

impl Default for LegKeywords {
    fn default() -> Self {
        Self {
            loading: names(&[
                "CARREGAMENTO",
                "CARGA",
                "SAIDA",
                "SAÍDA",
                "EXPEDICAO",
                "EXPEDIÇÃO",
                "LOADING",
                "DEPARTURE",
            ]),
            unloading: names(&[
                "DESCARGA",
                "DESCARREGAMENTO",
                "CHEGADA",
                "ENTRADA",
                "RECEBIMENTO",
                "UNLOADING",
                "ARRIVAL",
                "ENTRY",
            ]),
        }
    }
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PriorityThresholds {
    pub high_aging_hours: i64,
    pub medium_aging_hours: i64,
}

impl Default for PriorityThresholds {
    fn default() -> Self {
        Self {
            high_aging_hours: 48,
            medium_aging_hours: 24,
        }
    }
}

/// `score = 100 - pending_weight*pending - divergence_weight*divergence - aging_weight*avg_aging`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HealthWeights {
    pub pending_weight: f64,
    pub divergence_weight: f64,
    pub aging_weight: f64,
    pub critical_below: u8,
    pub attention_below: u8,
}

impl Default for HealthWeights {
    fn default() -> Self {
        Self {
            pending_weight: 2.0,
            divergence_weight: 5.0,
            aging_weight: 0.5,
            critical_below: 60,
            attention_below: 80,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkThresholds {
    /// Pending rate (percent) above which the network is critical.
    pub critical_rate: f64,
    /// Pending rate (percent) above which the network needs attention.
    pub attention_rate: f64,
    /// A divergence older than this makes the network critical regardless of rate.
    pub divergence_aging_hours: i64,
}

impl Default for NetworkThresholds {
    fn default() -> Self {
        Self {
            critical_rate: 35.0,
            attention_rate: 20.0,
            divergence_aging_hours: 48,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl EngineConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: EngineConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.aliases.shipment_id.is_empty() {
            return Err(ReconError::ConfigValidation(
                "aliases.shipment_id must not be empty".into(),
            ));
        }
        if self.aliases.origin_branch.is_empty() {
            return Err(ReconError::ConfigValidation(
                "aliases.origin_branch must not be empty".into(),
            ));
        }
        if self.legs.loading.is_empty() || self.legs.unloading.is_empty() {
            return Err(ReconError::ConfigValidation(
                "legs.loading and legs.unloading must both list at least one keyword".into(),
            ));
        }
        if self.priority.medium_aging_hours > self.priority.high_aging_hours {
            return Err(ReconError::ConfigValidation(format!(
                "priority.medium_aging_hours ({}) exceeds priority.high_aging_hours ({})",
                self.priority.medium_aging_hours, self.priority.high_aging_hours
            )));
        }
        if self.health.critical_below > self.health.attention_below {
            return Err(ReconError::ConfigValidation(format!(
                "health.critical_below ({}) exceeds health.attention_below ({})",
                self.health.critical_below, self.health.attention_below
            )));
        }
        if self.network.attention_rate > self.network.critical_rate {
            return Err(ReconError::ConfigValidation(format!(
                "network.attention_rate ({}) exceeds network.critical_rate ({})",
                self.network.attention_rate, self.network.critical_rate
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
