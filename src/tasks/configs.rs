use crate::{env::Env, tasks::experiments::baselines::SandboxBaseline};
use anyhow::Result;
use log::{debug, error, info};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::ser::PrettyFormatter;
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

static GUEST_PORT: u16 = 8080;
static LISTEN_IP: &str = "127.0.0.1";
static OUTPUT_DIR: &str = "/tmp";
static UNIKRAFT_MEMORY: &str = "128Mi";
static FIRECRACKER_SOCKET_PREFIX: &str = "/tmp/firecracker";

/// Evaluations a set of configs is generated for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvalType {
    Latency,
    Density,
}

impl fmt::Display for EvalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalType::Latency => write!(f, "latency"),
            EvalType::Density => write!(f, "density"),
        }
    }
}

impl EvalType {
    pub fn iter_variants() -> std::slice::Iter<'static, EvalType> {
        static VARIANTS: [EvalType; 2] = [EvalType::Latency, EvalType::Density];
        VARIANTS.iter()
    }

    pub fn config_dir(&self, base_dir: &Path) -> PathBuf {
        match self {
            EvalType::Latency => Env::latency_eval_root(base_dir),
            EvalType::Density => Env::density_eval_root(base_dir),
        }
    }

    /// Backends taking part in each evaluation, in the order they are listed
    /// in the `eval_config.json` file.
    pub fn baselines(&self) -> &'static [SandboxBaseline] {
        match self {
            EvalType::Latency => &[
                SandboxBaseline::Process,
                SandboxBaseline::Unikraft,
                SandboxBaseline::Hyperlight,
                SandboxBaseline::FirecrackerSnapshot,
                SandboxBaseline::Firecracker,
            ],
            EvalType::Density => &[
                SandboxBaseline::Unikraft,
                SandboxBaseline::Firecracker,
                SandboxBaseline::Process,
                SandboxBaseline::Hyperlight,
            ],
        }
    }

    /// Order in which the backend config files are written to disk.
    fn write_order(&self) -> &'static [SandboxBaseline] {
        match self {
            EvalType::Latency => &[
                SandboxBaseline::Unikraft,
                SandboxBaseline::Process,
                SandboxBaseline::Hyperlight,
                SandboxBaseline::FirecrackerSnapshot,
                SandboxBaseline::Firecracker,
            ],
            EvalType::Density => &[
                SandboxBaseline::Unikraft,
                SandboxBaseline::Process,
                SandboxBaseline::Hyperlight,
                SandboxBaseline::Firecracker,
            ],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnikraftConfig {
    pub guest_port: u16,
    pub host_port: u16,
    pub run_dir: String,
    pub memory: String,
    pub output_dir: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessConfig {
    pub ip: String,
    pub port: u16,
    pub binary_path: String,
    pub output_dir: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HyperlightConfig {
    pub guest_binary: String,
    pub host_binary: String,
    pub listen_ip: String,
    pub listen_port: u16,
    pub output_dir: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FirecrackerSnapshotConfig {
    pub firecracker_binary_dir: String,
    pub start_snapshot_script: String,
    pub firecracker_socket_prefix: String,
    pub snapshot_file: String,
    pub mem_file: String,
    pub network_setup_file: String,
    pub network_cleanup_file: String,
    pub output_dir: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FirecrackerConfig {
    pub firecracker_binary_dir: String,
    pub firecracker_socket_prefix: String,
    pub config_file_template: String,
    pub network_setup_file: String,
    pub network_cleanup_file: String,
}

/// Launch parameters for one backend under test.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BackendConfig {
    Process(ProcessConfig),
    Unikraft(UnikraftConfig),
    Firecracker(FirecrackerConfig),
    FirecrackerSnapshot(FirecrackerSnapshotConfig),
    Hyperlight(HyperlightConfig),
}

impl BackendConfig {
    /// Config for `baseline` with every path rooted at `base_dir`. The same
    /// parameters are used for the latency and density evaluations.
    pub fn new(baseline: &SandboxBaseline, base_dir: &Path) -> BackendConfig {
        let fc_dir = Env::firecracker_scripts_root(base_dir);
        let fc_path = |file: &str| fc_dir.join(file).display().to_string();

        match baseline {
            SandboxBaseline::Unikraft => BackendConfig::Unikraft(UnikraftConfig {
                guest_port: GUEST_PORT,
                host_port: GUEST_PORT,
                run_dir: base_dir.display().to_string(),
                memory: UNIKRAFT_MEMORY.to_string(),
                output_dir: OUTPUT_DIR.to_string(),
            }),
            SandboxBaseline::Process => BackendConfig::Process(ProcessConfig {
                ip: LISTEN_IP.to_string(),
                port: GUEST_PORT,
                binary_path: Env::bin_root(base_dir)
                    .join("rust-http-echo")
                    .display()
                    .to_string(),
                output_dir: OUTPUT_DIR.to_string(),
            }),
            SandboxBaseline::Hyperlight => BackendConfig::Hyperlight(HyperlightConfig {
                guest_binary: Env::bin_root(base_dir)
                    .join("hyperlight-guest-nanvix")
                    .display()
                    .to_string(),
                host_binary: Env::bin_root(base_dir)
                    .join("hyperlight-host-nanvix")
                    .display()
                    .to_string(),
                listen_ip: LISTEN_IP.to_string(),
                listen_port: GUEST_PORT,
                output_dir: OUTPUT_DIR.to_string(),
            }),
            SandboxBaseline::FirecrackerSnapshot => {
                BackendConfig::FirecrackerSnapshot(FirecrackerSnapshotConfig {
                    firecracker_binary_dir: fc_path("output"),
                    start_snapshot_script: fc_path("start_snapshot.sh"),
                    firecracker_socket_prefix: FIRECRACKER_SOCKET_PREFIX.to_string(),
                    snapshot_file: "/tmp/snapshot_file".to_string(),
                    mem_file: "/tmp/mem_file".to_string(),
                    network_setup_file: fc_path("setup_network.sh"),
                    network_cleanup_file: fc_path("clean_network.sh"),
                    output_dir: OUTPUT_DIR.to_string(),
                })
            }
            SandboxBaseline::Firecracker => BackendConfig::Firecracker(FirecrackerConfig {
                firecracker_binary_dir: fc_path("output"),
                firecracker_socket_prefix: FIRECRACKER_SOCKET_PREFIX.to_string(),
                config_file_template: fc_dir
                    .join("output")
                    .join("vm_config_template.json")
                    .display()
                    .to_string(),
                network_setup_file: fc_path("setup_network.sh"),
                network_cleanup_file: fc_path("clean_network.sh"),
            }),
        }
    }

    pub fn baseline(&self) -> SandboxBaseline {
        match self {
            BackendConfig::Process(_) => SandboxBaseline::Process,
            BackendConfig::Unikraft(_) => SandboxBaseline::Unikraft,
            BackendConfig::Firecracker(_) => SandboxBaseline::Firecracker,
            BackendConfig::FirecrackerSnapshot(_) => SandboxBaseline::FirecrackerSnapshot,
            BackendConfig::Hyperlight(_) => SandboxBaseline::Hyperlight,
        }
    }

    /// Parses a config file, picking the struct from the baseline it was
    /// listed under.
    pub fn from_file(baseline: &SandboxBaseline, path: &Path) -> Result<BackendConfig> {
        Ok(match baseline {
            SandboxBaseline::Process => BackendConfig::Process(read_json(path)?),
            SandboxBaseline::Unikraft => BackendConfig::Unikraft(read_json(path)?),
            SandboxBaseline::Firecracker => BackendConfig::Firecracker(read_json(path)?),
            SandboxBaseline::FirecrackerSnapshot => {
                BackendConfig::FirecrackerSnapshot(read_json(path)?)
            }
            SandboxBaseline::Hyperlight => BackendConfig::Hyperlight(read_json(path)?),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvalEntry {
    pub type_of_eval: String,
    pub config_location: String,
}

/// List of backend configs taking part in one evaluation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    pub evals: Vec<EvalEntry>,
}

impl EvalConfig {
    pub const FILE_NAME: &'static str = "eval_config.json";

    pub fn new(eval: &EvalType, base_dir: &Path) -> EvalConfig {
        let config_dir = eval.config_dir(base_dir);
        EvalConfig {
            evals: eval
                .baselines()
                .iter()
                .map(|baseline| EvalEntry {
                    type_of_eval: baseline.to_string(),
                    config_location: config_dir
                        .join(format!("{}.json", baseline.config_file_stem()))
                        .display()
                        .to_string(),
                })
                .collect(),
        }
    }
}

fn to_json_string<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;

    Ok(String::from_utf8(buf)?)
}

fn save_json_to_file<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let contents = to_json_string(value)?;
    fs::write(path, contents).map_err(|e| {
        let reason = format!(
            "error writing config file (path={}, error={e:?})",
            path.display()
        );
        error!("{reason}");
        anyhow::anyhow!(reason)
    })?;
    debug!("wrote config file: {}", path.display());

    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path).map_err(|e| {
        let reason = format!(
            "error reading config file (path={}, error={e:?})",
            path.display()
        );
        error!("{reason}");
        anyhow::anyhow!(reason)
    })?;

    serde_json::from_str(&contents).map_err(|e| {
        let reason = format!(
            "error parsing config file (path={}, error={e})",
            path.display()
        );
        error!("{reason}");
        anyhow::anyhow!(reason)
    })
}

fn make_directory(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| {
        let reason = format!(
            "error creating directory (path={}, error={e:?})",
            dir.display()
        );
        error!("{reason}");
        anyhow::anyhow!(reason)
    })
}

/// Generated configs are read by the runners from any working directory, so
/// every path written into them is absolute.
fn absolute_base_dir(base_dir: &Path) -> Result<PathBuf> {
    std::path::absolute(base_dir).map_err(|e| {
        let reason = format!(
            "error resolving base directory (path={}, error={e:?})",
            base_dir.display()
        );
        error!("{reason}");
        anyhow::anyhow!(reason)
    })
}

#[derive(Debug)]
pub struct Configs {}

impl Configs {
    fn generate_eval_configs(eval: &EvalType, base_dir: &Path) -> Result<Vec<PathBuf>> {
        let config_dir = eval.config_dir(base_dir);
        make_directory(&config_dir)?;

        let mut written = Vec::new();
        for baseline in eval.write_order() {
            let path = config_dir.join(format!("{}.json", baseline.config_file_stem()));
            save_json_to_file(&BackendConfig::new(baseline, base_dir), &path)?;
            written.push(path);
        }

        let path = config_dir.join(EvalConfig::FILE_NAME);
        save_json_to_file(&EvalConfig::new(eval, base_dir), &path)?;
        written.push(path);

        info!(
            "generated {eval} eval configs at: {}",
            config_dir.display()
        );
        Ok(written)
    }

    /// Writes the backend configs and the `eval_config.json` file for every
    /// evaluation under `<base_dir>/config`. Returns the paths written.
    pub fn generate(base_dir: &Path) -> Result<Vec<PathBuf>> {
        let base_dir = absolute_base_dir(base_dir)?;
        let mut written = Vec::new();
        for eval in EvalType::iter_variants() {
            written.extend(Self::generate_eval_configs(eval, &base_dir)?);
        }

        Ok(written)
    }

    /// Loads the `eval_config.json` of an evaluation and every backend config
    /// it lists.
    pub fn load(eval: &EvalType, base_dir: &Path) -> Result<Vec<BackendConfig>> {
        let eval_config_path = eval.config_dir(base_dir).join(EvalConfig::FILE_NAME);
        let eval_config: EvalConfig = read_json(&eval_config_path)?;

        let mut configs = Vec::new();
        for entry in &eval_config.evals {
            let baseline: SandboxBaseline = entry.type_of_eval.parse().map_err(|_| {
                let reason = format!(
                    "unrecognized eval type (path={}, type_of_eval={})",
                    eval_config_path.display(),
                    entry.type_of_eval
                );
                error!("{reason}");
                anyhow::anyhow!(reason)
            })?;

            let config_path = Path::new(&entry.config_location);
            if !config_path.exists() {
                let reason = format!(
                    "config file listed in eval config does not exist (eval={eval}, path={})",
                    config_path.display()
                );
                error!("{reason}");
                anyhow::bail!(reason);
            }

            configs.push(BackendConfig::from_file(&baseline, config_path)?);
        }

        Ok(configs)
    }

    /// Loads every evaluation's configs, failing on the first one that is
    /// missing or malformed.
    pub fn check(base_dir: &Path) -> Result<()> {
        let base_dir = absolute_base_dir(base_dir)?;
        for eval in EvalType::iter_variants() {
            let configs = Self::load(eval, &base_dir)?;
            let names: Vec<String> = configs.iter().map(|c| c.baseline().to_string()).collect();
            info!("{eval} eval configs are valid: {}", names.join(", "));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unikraft_config_json() {
        let config = BackendConfig::new(&SandboxBaseline::Unikraft, Path::new("/code"));
        let json = to_json_string(&config).unwrap();

        assert_eq!(
            json,
            "{\n    \"guest_port\": 8080,\n    \"host_port\": 8080,\n    \"run_dir\": \"/code\",\n    \"memory\": \"128Mi\",\n    \"output_dir\": \"/tmp\"\n}"
        );
    }

    #[test]
    fn test_firecracker_paths() {
        let config = BackendConfig::new(&SandboxBaseline::Firecracker, Path::new("/code"));
        match config {
            BackendConfig::Firecracker(fc) => {
                assert_eq!(fc.firecracker_binary_dir, "/code/scripts/firecracker/output");
                assert_eq!(
                    fc.config_file_template,
                    "/code/scripts/firecracker/output/vm_config_template.json"
                );
                assert_eq!(
                    fc.network_cleanup_file,
                    "/code/scripts/firecracker/clean_network.sh"
                );
            }
            other => panic!("unexpected config: {other:?}"),
        }
    }

    #[test]
    fn test_eval_config_order() {
        let latency = EvalConfig::new(&EvalType::Latency, Path::new("/code"));
        let tags: Vec<&str> = latency
            .evals
            .iter()
            .map(|e| e.type_of_eval.as_str())
            .collect();
        assert_eq!(
            tags,
            vec![
                "process",
                "unikraft",
                "hyperlight",
                "firecracker-snapshot",
                "firecracker"
            ]
        );
        assert_eq!(
            latency.evals[3].config_location,
            "/code/config/latency_eval/firecracker_snapshot_config.json"
        );

        let density = EvalConfig::new(&EvalType::Density, Path::new("/code"));
        let tags: Vec<&str> = density
            .evals
            .iter()
            .map(|e| e.type_of_eval.as_str())
            .collect();
        assert_eq!(tags, vec!["unikraft", "firecracker", "process", "hyperlight"]);
    }

    #[test]
    fn test_relative_base_dir_is_made_absolute() {
        let base_dir = absolute_base_dir(Path::new("rel")).unwrap();
        assert!(base_dir.is_absolute());
        assert!(base_dir.ends_with("rel"));

        let base_dir = absolute_base_dir(Path::new("/code")).unwrap();
        assert_eq!(base_dir, Path::new("/code"));
    }

    #[test]
    fn test_config_baseline_matches() {
        for baseline in SandboxBaseline::iter_variants() {
            let config = BackendConfig::new(baseline, Path::new("/code"));
            assert_eq!(&config.baseline(), baseline);
        }
    }
}
