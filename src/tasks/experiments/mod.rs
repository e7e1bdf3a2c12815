use crate::tasks::experiments::data::{
    cold_start_table, density_table, latency_breakdown_table, read_density_records,
    read_latency_rows, warm_start_table,
};
use anyhow::Result;
use clap::ValueEnum;
use log::{error, info};
use std::{
    fmt,
    path::{Path, PathBuf},
};

pub mod baselines;
pub mod color;
pub mod data;
pub mod figure;
pub mod plot;

/// Charts that can be drawn from the benchmark runners' CSV logs.
#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum Chart {
    /// Mean cold-start latency (PRESETUP + SETUP_SANDBOX + FIRST_EXECUTION)
    ColdStart,
    /// Warm-start latency of every EXECUTION sample
    WarmStart,
    /// Mean latency of every op type, grouped by system
    Latency,
    /// Max number of concurrent instances per system
    Density,
}

impl Chart {
    pub const COLD_START_NAME: &'static str = "cold-start";
    pub const WARM_START_NAME: &'static str = "warm-start";
    pub const LATENCY_NAME: &'static str = "latency";
    pub const DENSITY_NAME: &'static str = "density";

    /// Name of the PDF written when a save directory is given.
    pub fn file_name(&self) -> &'static str {
        match self {
            Chart::ColdStart => "cold_start_latency.pdf",
            Chart::WarmStart => "warm_start_latency.pdf",
            Chart::Latency => "latency_breakdown.pdf",
            Chart::Density => "density_plot.pdf",
        }
    }

    /// Reads `csv_file` and renders the chart as an SVG document.
    pub fn render(&self, csv_file: &Path) -> Result<String> {
        let svg = match self {
            Chart::ColdStart => {
                let table = cold_start_table(&read_latency_rows(csv_file)?)?;
                self.check_not_empty(csv_file, table.is_empty())?;
                plot::render_cold_start(&table)?
            }
            Chart::WarmStart => {
                let table = warm_start_table(&read_latency_rows(csv_file)?);
                self.check_not_empty(csv_file, table.is_empty())?;
                plot::render_warm_start(&table)?
            }
            Chart::Latency => {
                let table = latency_breakdown_table(csv_file)?;
                self.check_not_empty(csv_file, table.systems.is_empty())?;
                plot::render_latency_breakdown(&table)?
            }
            Chart::Density => {
                let table = density_table(&read_density_records(csv_file)?);
                self.check_not_empty(csv_file, table.is_empty())?;
                plot::render_density(&table)?
            }
        };

        Ok(svg)
    }

    fn check_not_empty(&self, csv_file: &Path, is_empty: bool) -> Result<()> {
        if is_empty {
            let reason = format!(
                "no data to plot (chart={self}, path={})",
                csv_file.display()
            );
            error!("{reason}");
            anyhow::bail!(reason);
        }

        Ok(())
    }
}

impl fmt::Display for Chart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chart::ColdStart => write!(f, "{}", Self::COLD_START_NAME),
            Chart::WarmStart => write!(f, "{}", Self::WARM_START_NAME),
            Chart::Latency => write!(f, "{}", Self::LATENCY_NAME),
            Chart::Density => write!(f, "{}", Self::DENSITY_NAME),
        }
    }
}

/// Renders `chart` from `csv_file` and writes it as a PDF into `save_dir`, or
/// opens it when no directory is given. Nothing is written if the CSV cannot
/// be turned into a table.
pub fn plot(chart: &Chart, csv_file: &Path, save_dir: Option<&Path>) -> Result<PathBuf> {
    info!("plotting {chart} chart from {}", csv_file.display());
    let svg = chart.render(csv_file)?;

    figure::save_or_show(&svg, save_dir, chart.file_name())
}
