//! Result persistence: per-scheme CSV tables and a JSON report

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use csv::Writer;
use san_core::{NodeId, RedistributionRecord, TickSample};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::simulator::{SimulationConfig, SimulationResult};

/// File name of a scheme's round table
pub fn rounds_file_name(scheme: u8) -> String {
    format!("results_scheme{scheme}.csv")
}

/// File name of a scheme's per-tick timeline
pub fn timeline_file_name(scheme: u8) -> String {
    format!("scheme_{scheme}_timeseries.csv")
}

/// Write one row per redistribution round.
///
/// Columns: `Redistribution_Index, t_trigger, Threshold`, the switch loads before
/// and after, `R_before, R_after, IR`. An undefined IR is written as an empty cell.
pub fn write_rounds<W: Write>(
    writer: W,
    switches: &[NodeId],
    records: &[RedistributionRecord],
) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);

    let mut header = vec![
        "Redistribution_Index".to_string(),
        "t_trigger".to_string(),
        "Threshold".to_string(),
    ];
    header.extend(switches.iter().map(|sw| format!("{sw}_before")));
    header.extend(switches.iter().map(|sw| format!("{sw}_after")));
    header.extend(["R_before", "R_after", "IR"].map(String::from));
    wtr.write_record(&header)?;

    for record in records {
        let mut row = vec![
            record.round.to_string(),
            record.time.to_string(),
            record.threshold.to_string(),
        ];
        row.extend(switches.iter().map(|sw| load_cell(record.loads_before.get(sw))));
        row.extend(switches.iter().map(|sw| load_cell(record.loads_after.get(sw))));
        row.push(record.system_reliability_before.to_string());
        row.push(record.system_reliability_after.to_string());
        row.push(record.improvement_ratio.map(|ir| ir.to_string()).unwrap_or_default());
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write one row per tick: `Time, Threshold`, switch loads, `R_sys`
pub fn write_timeline<W: Write>(writer: W, switches: &[NodeId], samples: &[TickSample]) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);

    let mut header = vec!["Time".to_string(), "Threshold".to_string()];
    header.extend(switches.iter().cloned());
    header.push("R_sys".to_string());
    wtr.write_record(&header)?;

    for sample in samples {
        let mut row = vec![sample.time.to_string(), sample.threshold.to_string()];
        row.extend(switches.iter().map(|sw| load_cell(sample.loads.get(sw))));
        row.push(sample.system_reliability.map(|r| r.to_string()).unwrap_or_default());
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

fn load_cell(load: Option<&f64>) -> String {
    load.map(|l| l.to_string()).unwrap_or_default()
}

/// Write both CSV tables of every result into `dir`, returning the written paths
pub fn export_csv(dir: &Path, switches: &[NodeId], results: &[SimulationResult]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(results.len() * 2);
    for result in results {
        let scheme = result.scheme.number();

        let rounds_path = dir.join(rounds_file_name(scheme));
        write_rounds(fs::File::create(&rounds_path)?, switches, &result.records)?;

        let timeline_path = dir.join(timeline_file_name(scheme));
        write_timeline(fs::File::create(&timeline_path)?, switches, &result.timeline)?;

        info!(
            scheme,
            rounds = %rounds_path.display(),
            timeline = %timeline_path.display(),
            "exported scheme results"
        );
        written.push(rounds_path);
        written.push(timeline_path);
    }
    Ok(written)
}

/// JSON report of a comparison run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub generated_at: DateTime<Utc>,
    pub config: SimulationConfig,
    pub results: Vec<SimulationResult>,
}

impl SimulationReport {
    pub fn new(config: SimulationConfig, results: Vec<SimulationResult>) -> Self {
        SimulationReport {
            generated_at: Utc::now(),
            config,
            results,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!(path = %path.display(), "report written");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
