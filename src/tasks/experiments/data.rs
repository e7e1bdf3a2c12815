//! Turns the CSV logs written by the benchmark runners into tidy tables with
//! one row per bar (or bar group) of the final chart.

use crate::tasks::experiments::baselines::{
    DENSITY_ORDER, LATENCY_ORDER, SandboxBaseline, density_label, latency_label, order_rank,
};
use anyhow::Result;
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, error, info};
use serde::Deserialize;
use std::{collections::BTreeMap, fmt, path::Path};

/// Operation tags the latency runner writes in its OP_TYPE column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpType {
    PreSetup,
    SetupSandbox,
    FirstExecution,
    Execution,
    /// Any other tag, e.g. COLD_START_EXECUTION
    Other(String),
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpType::PreSetup => write!(f, "PRESETUP"),
            OpType::SetupSandbox => write!(f, "SETUP_SANDBOX"),
            OpType::FirstExecution => write!(f, "FIRST_EXECUTION"),
            OpType::Execution => write!(f, "EXECUTION"),
            OpType::Other(tag) => write!(f, "{tag}"),
        }
    }
}

impl OpType {
    pub const HEADER_TAG: &'static str = "OP_TYPE";

    pub fn from_tag(tag: &str) -> OpType {
        match tag {
            "PRESETUP" => OpType::PreSetup,
            "SETUP_SANDBOX" => OpType::SetupSandbox,
            "FIRST_EXECUTION" => OpType::FirstExecution,
            "EXECUTION" => OpType::Execution,
            other => OpType::Other(other.to_string()),
        }
    }
}

/// One line of a latency log: `SYSTEM,OP_TYPE,LATENCY_MICROSECONDS`.
#[derive(Clone, Debug, PartialEq)]
pub struct BenchmarkRow {
    pub system: String,
    pub op: OpType,
    pub latency_us: u64,
}

/// Ordered rows of a chart: a display label and the values behind its bar.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TidyTable {
    pub rows: Vec<(String, Vec<f64>)>,
}

impl TidyTable {
    pub fn labels(&self) -> Vec<&str> {
        self.rows.iter().map(|(label, _)| label.as_str()).collect()
    }

    pub fn means(&self) -> Vec<f64> {
        self.rows.iter().map(|(_, values)| mean(values)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Stable sort by position in `order`; unknown labels keep their
    /// relative order at the end.
    fn sort_by_order(&mut self, order: &[SandboxBaseline]) {
        self.rows
            .sort_by_key(|(label, _)| order_rank(order, label));
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = mean(values);
    let var = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

fn open_reader(csv_file: &Path, has_headers: bool) -> Result<csv::Reader<std::fs::File>> {
    ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .trim(Trim::All)
        .from_path(csv_file)
        .map_err(|e| {
            let reason = format!(
                "error opening csv file (path={}, error={e})",
                csv_file.display()
            );
            error!("{reason}");
            anyhow::anyhow!(reason)
        })
}

fn require_columns(csv_file: &Path, headers: &StringRecord, required: &[&str]) -> Result<()> {
    let missing: Vec<&str> = required
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .copied()
        .collect();
    if !missing.is_empty() {
        let reason = format!(
            "csv file must contain columns {} (path={}, missing={})",
            required.join(", "),
            csv_file.display(),
            missing.join(", ")
        );
        error!("{reason}");
        anyhow::bail!(reason);
    }

    Ok(())
}

/// Reads a latency log row by row. A `SYSTEM,OP_TYPE,...` header on the first
/// line is skipped, every other row is kept, whatever its tag. `line` numbers
/// in errors are 1-based.
pub fn read_latency_rows(csv_file: &Path) -> Result<Vec<BenchmarkRow>> {
    let mut reader = open_reader(csv_file, false)?;
    let mut rows = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 1;
        let record = result.map_err(|e| {
            let reason = format!(
                "error reading csv record (path={}, line={line}, error={e})",
                csv_file.display()
            );
            error!("{reason}");
            anyhow::anyhow!(reason)
        })?;
        if record.len() < 3 {
            let reason = format!(
                "malformed latency row, expected SYSTEM,OP_TYPE,LATENCY_MICROSECONDS (path={}, line={line})",
                csv_file.display()
            );
            error!("{reason}");
            anyhow::bail!(reason);
        }

        if line == 1 && &record[1] == OpType::HEADER_TAG {
            debug!("skipping header row (path={})", csv_file.display());
            continue;
        }

        let op = OpType::from_tag(&record[1]);
        let latency_us: u64 = record[2].parse().map_err(|e| {
            let reason = format!(
                "error parsing latency value (path={}, line={line}, value={}, error={e})",
                csv_file.display(),
                &record[2]
            );
            error!("{reason}");
            anyhow::anyhow!(reason)
        })?;

        rows.push(BenchmarkRow {
            system: record[0].to_string(),
            op,
            latency_us,
        });
    }

    Ok(rows)
}

/// Progress through one PRESETUP -> SETUP_SANDBOX -> FIRST_EXECUTION triple.
#[derive(Debug)]
enum ColdStartState {
    Idle,
    SawPreSetup { system: String, presetup: u64 },
    SawSetup { system: String, presetup: u64, setup: u64 },
}

/// Sums each system instance's cold-start phases. The three rows of a triple
/// must be adjacent and share the system name: any other row in between
/// (including a new PRESETUP or an unrelated tag), or a phase out of order,
/// fails the whole aggregation. Rows outside a triple that are not phases are
/// ignored.
pub fn cold_start_samples(rows: &[BenchmarkRow]) -> Result<Vec<(String, u64)>> {
    let mut samples = Vec::new();
    let mut state = ColdStartState::Idle;

    for (pos, row) in rows.iter().enumerate() {
        state = match (state, &row.op) {
            (ColdStartState::Idle, OpType::PreSetup) => ColdStartState::SawPreSetup {
                system: row.system.clone(),
                presetup: row.latency_us,
            },
            (ColdStartState::Idle, OpType::Execution | OpType::Other(_)) => ColdStartState::Idle,
            (ColdStartState::SawPreSetup { system, presetup }, OpType::SetupSandbox)
                if system == row.system =>
            {
                ColdStartState::SawSetup {
                    system,
                    presetup,
                    setup: row.latency_us,
                }
            }
            (
                ColdStartState::SawSetup {
                    system,
                    presetup,
                    setup,
                },
                OpType::FirstExecution,
            ) if system == row.system => {
                let Some(total) = presetup
                    .checked_add(setup)
                    .and_then(|sum| sum.checked_add(row.latency_us))
                else {
                    let reason = format!(
                        "cold start latency overflows (row={pos}, system={system}, presetup={presetup}, setup={setup}, first_execution={})",
                        row.latency_us
                    );
                    error!("{reason}");
                    anyhow::bail!(reason);
                };
                debug!("cold start sample (system={system}, total_us={total})");
                samples.push((system, total));
                ColdStartState::Idle
            }
            (state, op) => {
                let expected = match &state {
                    ColdStartState::Idle => "PRESETUP or EXECUTION".to_string(),
                    ColdStartState::SawPreSetup { system, .. } => {
                        format!("{system},{}", OpType::SetupSandbox)
                    }
                    ColdStartState::SawSetup { system, .. } => {
                        format!("{system},{}", OpType::FirstExecution)
                    }
                };
                let reason = format!(
                    "out-of-order cold start row (row={pos}, found={},{op}, expected={expected})",
                    row.system
                );
                error!("{reason}");
                anyhow::bail!(reason);
            }
        };
    }

    if let ColdStartState::SawPreSetup { system, .. } | ColdStartState::SawSetup { system, .. } =
        &state
    {
        let reason = format!("incomplete cold start sequence at end of input (system={system})");
        error!("{reason}");
        anyhow::bail!(reason);
    }

    Ok(samples)
}

/// Mean cold-start latency per system, in display order.
pub fn cold_start_table(rows: &[BenchmarkRow]) -> Result<TidyTable> {
    let mut grouped = BTreeMap::<String, Vec<f64>>::new();
    for (system, total) in cold_start_samples(rows)? {
        grouped
            .entry(latency_label(&system))
            .or_default()
            .push(total as f64);
    }

    let mut table = TidyTable {
        rows: grouped
            .into_iter()
            .map(|(label, values)| (label, vec![mean(&values)]))
            .collect(),
    };
    table.sort_by_order(&LATENCY_ORDER);

    for (label, values) in &table.rows {
        info!(
            "cold start latency: {} = {:.1} us",
            label.replace('\n', " "),
            values[0]
        );
    }

    Ok(table)
}

/// Every EXECUTION sample, grouped under its system's label in display order.
/// Averaging is left to the chart.
pub fn warm_start_table(rows: &[BenchmarkRow]) -> TidyTable {
    let mut table = TidyTable::default();
    for row in rows.iter().filter(|row| row.op == OpType::Execution) {
        let label = latency_label(&row.system);
        match table.rows.iter_mut().find(|(l, _)| *l == label) {
            Some((_, values)) => values.push(row.latency_us as f64),
            None => table.rows.push((label, vec![row.latency_us as f64])),
        }
    }
    table.sort_by_order(&LATENCY_ORDER);

    table
}

/// One line of a density log.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DensityRecord {
    #[serde(rename = "SYSTEM")]
    pub system: String,
    #[serde(rename = "INITIAL_MEM")]
    pub initial_mem: f64,
    #[serde(rename = "FINAL_MEM")]
    pub final_mem: f64,
    #[serde(rename = "MAX_INSTANCES")]
    pub max_instances: f64,
}

impl DensityRecord {
    /// Memory (MB) each instance took, on average.
    pub fn avg_mem_per_instance(&self) -> f64 {
        (self.initial_mem - self.final_mem) / self.max_instances
    }
}

pub const DENSITY_COLUMNS: [&str; 4] = ["SYSTEM", "INITIAL_MEM", "FINAL_MEM", "MAX_INSTANCES"];

pub fn read_density_records(csv_file: &Path) -> Result<Vec<DensityRecord>> {
    let mut reader = open_reader(csv_file, true)?;
    let headers = reader.headers()?.clone();
    require_columns(csv_file, &headers, &DENSITY_COLUMNS)?;

    let mut records = Vec::new();
    for result in reader.deserialize() {
        let record: DensityRecord = result.map_err(|e| {
            let reason = format!(
                "error parsing density record (path={}, error={e})",
                csv_file.display()
            );
            error!("{reason}");
            anyhow::anyhow!(reason)
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Max instances per system, in display order and with density labels.
pub fn density_table(records: &[DensityRecord]) -> TidyTable {
    let mut sorted: Vec<&DensityRecord> = records.iter().collect();
    sorted.sort_by_key(|record| order_rank(&DENSITY_ORDER, &record.system));

    let mut table = TidyTable::default();
    for record in sorted {
        let label = density_label(&record.system);
        info!(
            "Average memory usage for {}: {} MB",
            label.replace('\n', " "),
            record.avg_mem_per_instance()
        );
        table.rows.push((label, vec![record.max_instances]));
    }

    table
}

/// Mean latency per (system, op type), for the grouped breakdown chart.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BreakdownTable {
    pub systems: Vec<String>,
    pub op_types: Vec<String>,
    /// `values[system_idx][op_idx]`, `None` when a system never reported
    /// that op type.
    pub values: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct BreakdownRecord {
    #[serde(rename = "SYSTEM")]
    system: String,
    #[serde(rename = "OP_TYPE")]
    op_type: String,
    #[serde(rename = "LATENCY_MICROSECONDS")]
    latency_us: f64,
}

pub const LATENCY_COLUMNS: [&str; 3] = ["SYSTEM", "OP_TYPE", "LATENCY_MICROSECONDS"];

/// Reads a headed latency log and averages every (system, op type) pair,
/// keeping systems and op types in first-seen order.
pub fn latency_breakdown_table(csv_file: &Path) -> Result<BreakdownTable> {
    let mut reader = open_reader(csv_file, true)?;
    let headers = reader.headers()?.clone();
    require_columns(csv_file, &headers, &LATENCY_COLUMNS)?;

    let mut systems = Vec::<String>::new();
    let mut op_types = Vec::<String>::new();
    let mut samples = BTreeMap::<(usize, usize), Vec<f64>>::new();

    for result in reader.deserialize() {
        let record: BreakdownRecord = result.map_err(|e| {
            let reason = format!(
                "error parsing latency record (path={}, error={e})",
                csv_file.display()
            );
            error!("{reason}");
            anyhow::anyhow!(reason)
        })?;

        let system_idx = index_or_push(&mut systems, record.system);
        let op_idx = index_or_push(&mut op_types, record.op_type);
        samples
            .entry((system_idx, op_idx))
            .or_default()
            .push(record.latency_us);
    }

    let mut values = vec![vec![None; op_types.len()]; systems.len()];
    for ((system_idx, op_idx), samples) in samples {
        values[system_idx][op_idx] = Some(mean(&samples));
    }

    Ok(BreakdownTable {
        systems,
        op_types,
        values,
    })
}

fn index_or_push(items: &mut Vec<String>, item: String) -> usize {
    match items.iter().position(|i| *i == item) {
        Some(idx) => idx,
        None => {
            items.push(item);
            items.len() - 1
        }
    }
}
