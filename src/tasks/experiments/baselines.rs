use crate::tasks::experiments::color::get_color_from_label;
use anyhow::Result;
use clap::ValueEnum;
use plotters::prelude::RGBColor;
use std::{fmt, str::FromStr};

/// Sandboxing backends under evaluation. The `Display` form is the tag used
/// in `eval_config.json` files.
#[derive(Clone, Debug, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SandboxBaseline {
    Process,
    Unikraft,
    Firecracker,
    FirecrackerSnapshot,
    Hyperlight,
}

impl fmt::Display for SandboxBaseline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SandboxBaseline::Process => write!(f, "process"),
            SandboxBaseline::Unikraft => write!(f, "unikraft"),
            SandboxBaseline::Firecracker => write!(f, "firecracker"),
            SandboxBaseline::FirecrackerSnapshot => write!(f, "firecracker-snapshot"),
            SandboxBaseline::Hyperlight => write!(f, "hyperlight"),
        }
    }
}

impl FromStr for SandboxBaseline {
    type Err = ();

    fn from_str(input: &str) -> Result<SandboxBaseline, Self::Err> {
        match input {
            "process" => Ok(SandboxBaseline::Process),
            "unikraft" => Ok(SandboxBaseline::Unikraft),
            "firecracker" => Ok(SandboxBaseline::Firecracker),
            "firecracker-snapshot" => Ok(SandboxBaseline::FirecrackerSnapshot),
            "hyperlight" => Ok(SandboxBaseline::Hyperlight),
            _ => Err(()),
        }
    }
}

impl SandboxBaseline {
    pub fn iter_variants() -> std::slice::Iter<'static, SandboxBaseline> {
        static VARIANTS: [SandboxBaseline; 5] = [
            SandboxBaseline::Process,
            SandboxBaseline::Unikraft,
            SandboxBaseline::Firecracker,
            SandboxBaseline::FirecrackerSnapshot,
            SandboxBaseline::Hyperlight,
        ];
        VARIANTS.iter()
    }

    /// Name the benchmark runners print in the SYSTEM column of their CSVs.
    pub fn system_name(&self) -> &'static str {
        match self {
            SandboxBaseline::Process => "Process",
            SandboxBaseline::Unikraft => "Unikraft",
            SandboxBaseline::Firecracker => "Firecracker",
            SandboxBaseline::FirecrackerSnapshot => "Firecracker-Snapshot",
            SandboxBaseline::Hyperlight => "Hyperlight",
        }
    }

    pub fn from_system_name(name: &str) -> Option<SandboxBaseline> {
        Self::iter_variants()
            .find(|baseline| baseline.system_name() == name)
            .cloned()
    }

    /// Resolves either a raw system name or one of its chart labels.
    pub fn from_label(label: &str) -> Option<SandboxBaseline> {
        Self::iter_variants()
            .find(|baseline| {
                let name = baseline.system_name();
                name == label || latency_label(name) == label || density_label(name) == label
            })
            .cloned()
    }

    /// Stem of the JSON file holding this backend's config, e.g.
    /// `firecracker_snapshot_config`.
    pub fn config_file_stem(&self) -> String {
        format!("{}_config", self.to_string().replace('-', "_"))
    }

    pub fn get_color(&self) -> Result<RGBColor> {
        match self {
            SandboxBaseline::Unikraft => get_color_from_label("blue"),
            SandboxBaseline::Firecracker => get_color_from_label("orange"),
            SandboxBaseline::FirecrackerSnapshot => get_color_from_label("green"),
            SandboxBaseline::Hyperlight => get_color_from_label("red"),
            SandboxBaseline::Process => get_color_from_label("purple"),
        }
    }
}

/// Display order of the latency charts.
pub const LATENCY_ORDER: [SandboxBaseline; 5] = [
    SandboxBaseline::Unikraft,
    SandboxBaseline::Firecracker,
    SandboxBaseline::FirecrackerSnapshot,
    SandboxBaseline::Hyperlight,
    SandboxBaseline::Process,
];

/// Display order of the density chart. There is no snapshot-based density
/// evaluation.
pub const DENSITY_ORDER: [SandboxBaseline; 4] = [
    SandboxBaseline::Unikraft,
    SandboxBaseline::Firecracker,
    SandboxBaseline::Hyperlight,
    SandboxBaseline::Process,
];

/// Label a system gets in the latency charts.
pub fn latency_label(system: &str) -> String {
    match SandboxBaseline::from_system_name(system) {
        Some(SandboxBaseline::FirecrackerSnapshot) => "Firecracker\nSnapshot".to_string(),
        _ => system.to_string(),
    }
}

/// Label a system gets in the density chart.
pub fn density_label(system: &str) -> String {
    match SandboxBaseline::from_system_name(system) {
        Some(SandboxBaseline::Unikraft) => "Unikraft\n+ QEMU".to_string(),
        _ => system.to_string(),
    }
}

/// Position of a label (or raw system name) in a display order. Unknown
/// systems sort after every known one.
pub fn order_rank(order: &[SandboxBaseline], label: &str) -> usize {
    SandboxBaseline::from_label(label)
        .and_then(|baseline| order.iter().position(|o| *o == baseline))
        .unwrap_or(order.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for baseline in SandboxBaseline::iter_variants() {
            let tag = baseline.to_string();
            assert_eq!(tag.parse::<SandboxBaseline>(), Ok(baseline.clone()));
        }
        assert!("qemu".parse::<SandboxBaseline>().is_err());
    }

    #[test]
    fn test_config_file_stem() {
        assert_eq!(
            SandboxBaseline::FirecrackerSnapshot.config_file_stem(),
            "firecracker_snapshot_config"
        );
        assert_eq!(SandboxBaseline::Process.config_file_stem(), "process_config");
    }

    #[test]
    fn test_labels() {
        assert_eq!(latency_label("Firecracker-Snapshot"), "Firecracker\nSnapshot");
        assert_eq!(latency_label("Unikraft"), "Unikraft");
        assert_eq!(density_label("Unikraft"), "Unikraft\n+ QEMU");
        assert_eq!(density_label("Firecracker-Snapshot"), "Firecracker-Snapshot");
    }

    #[test]
    fn test_from_label() {
        assert_eq!(
            SandboxBaseline::from_label("Firecracker\nSnapshot"),
            Some(SandboxBaseline::FirecrackerSnapshot)
        );
        assert_eq!(
            SandboxBaseline::from_label("Unikraft\n+ QEMU"),
            Some(SandboxBaseline::Unikraft)
        );
        assert_eq!(SandboxBaseline::from_label("Gvisor"), None);
    }

    #[test]
    fn test_order_rank() {
        assert_eq!(order_rank(&LATENCY_ORDER, "Unikraft"), 0);
        assert_eq!(order_rank(&LATENCY_ORDER, "Firecracker\nSnapshot"), 2);
        assert_eq!(order_rank(&LATENCY_ORDER, "Process"), 4);
        assert_eq!(order_rank(&LATENCY_ORDER, "Gvisor"), 5);
        assert_eq!(order_rank(&DENSITY_ORDER, "Unikraft\n+ QEMU"), 0);
        assert_eq!(order_rank(&DENSITY_ORDER, "Firecracker-Snapshot"), 4);
    }
}
