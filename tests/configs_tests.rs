use anyhow::Result;
use sbcli::tasks::{
    configs::{BackendConfig, Configs, EvalConfig, EvalType},
    experiments::baselines::SandboxBaseline,
};
use std::{collections::BTreeMap, env, fs, path::Path};
use tempfile::{Builder, tempdir};

// ===============================================================================================
// Helper Functions
// ===============================================================================================

fn read_config_tree(base_dir: &Path) -> Result<BTreeMap<String, String>> {
    let mut contents = BTreeMap::new();
    for eval in EvalType::iter_variants() {
        for entry in fs::read_dir(eval.config_dir(base_dir))? {
            let path = entry?.path();
            contents.insert(path.display().to_string(), fs::read_to_string(&path)?);
        }
    }

    Ok(contents)
}

fn read_eval_config(eval: &EvalType, base_dir: &Path) -> Result<EvalConfig> {
    let path = eval.config_dir(base_dir).join(EvalConfig::FILE_NAME);
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

// ===============================================================================================
// Tests
// ===============================================================================================

#[test]
fn test_generate_writes_expected_files() -> Result<()> {
    let temp_dir = tempdir()?;
    let base_dir = temp_dir.path();

    let written = Configs::generate(base_dir)?;
    assert_eq!(written.len(), 11);

    let latency_dir = base_dir.join("config").join("latency_eval");
    for file in [
        "unikraft_config.json",
        "process_config.json",
        "hyperlight_config.json",
        "firecracker_snapshot_config.json",
        "firecracker_config.json",
        "eval_config.json",
    ] {
        assert!(latency_dir.join(file).exists(), "missing {file}");
    }

    let density_dir = base_dir.join("config").join("density_eval");
    assert!(!density_dir.join("firecracker_snapshot_config.json").exists());
    assert_eq!(fs::read_dir(&density_dir)?.count(), 5);

    Ok(())
}

#[test]
fn test_generate_is_idempotent() -> Result<()> {
    let temp_dir = tempdir()?;
    let base_dir = temp_dir.path();

    Configs::generate(base_dir)?;
    let first = read_config_tree(base_dir)?;
    Configs::generate(base_dir)?;
    let second = read_config_tree(base_dir)?;

    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_eval_config_paths_exist() -> Result<()> {
    let temp_dir = tempdir()?;
    let base_dir = temp_dir.path();
    Configs::generate(base_dir)?;

    for eval in EvalType::iter_variants() {
        let eval_config = read_eval_config(eval, base_dir)?;
        assert_eq!(eval_config.evals.len(), eval.baselines().len());
        for entry in &eval_config.evals {
            assert!(
                Path::new(&entry.config_location).exists(),
                "{} does not exist",
                entry.config_location
            );
        }
    }

    Ok(())
}

#[test]
fn test_process_config_contents() -> Result<()> {
    let temp_dir = tempdir()?;
    let base_dir = temp_dir.path();
    Configs::generate(base_dir)?;

    let path = EvalType::Latency
        .config_dir(base_dir)
        .join("process_config.json");
    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(path)?)?;

    assert_eq!(value["ip"], "127.0.0.1");
    assert_eq!(value["port"], 8080);
    assert_eq!(value["output_dir"], "/tmp");
    assert_eq!(
        value["binary_path"],
        base_dir.join("bin").join("rust-http-echo").display().to_string()
    );

    Ok(())
}

#[test]
fn test_load_round_trips_generated_configs() -> Result<()> {
    let temp_dir = tempdir()?;
    let base_dir = temp_dir.path();
    Configs::generate(base_dir)?;

    let configs = Configs::load(&EvalType::Latency, base_dir)?;
    let baselines: Vec<SandboxBaseline> = configs.iter().map(BackendConfig::baseline).collect();
    assert_eq!(baselines, EvalType::Latency.baselines().to_vec());
    assert_eq!(
        configs[1],
        BackendConfig::new(&SandboxBaseline::Unikraft, base_dir)
    );

    Configs::check(base_dir)?;
    Ok(())
}

#[test]
fn test_check_fails_on_missing_config() -> Result<()> {
    let temp_dir = tempdir()?;
    let base_dir = temp_dir.path();
    Configs::generate(base_dir)?;

    fs::remove_file(
        EvalType::Density
            .config_dir(base_dir)
            .join("hyperlight_config.json"),
    )?;

    assert!(Configs::check(base_dir).is_err());
    Ok(())
}

#[test]
fn test_check_fails_on_mismatched_config() -> Result<()> {
    let temp_dir = tempdir()?;
    let base_dir = temp_dir.path();
    Configs::generate(base_dir)?;

    // A process config where the unikraft one is expected
    let latency_dir = EvalType::Latency.config_dir(base_dir);
    fs::copy(
        latency_dir.join("process_config.json"),
        latency_dir.join("unikraft_config.json"),
    )?;

    assert!(Configs::load(&EvalType::Latency, base_dir).is_err());
    Ok(())
}

#[test]
fn test_generate_with_relative_base_dir_writes_absolute_paths() -> Result<()> {
    let temp_dir = Builder::new()
        .prefix("sbcli-configs-")
        .tempdir_in(env::current_dir()?)?;
    let dir_name = temp_dir
        .path()
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("temp dir has no name"))?;
    let base_dir = Path::new(dir_name);
    assert!(base_dir.is_relative());

    Configs::generate(base_dir)?;

    let eval_config = read_eval_config(&EvalType::Latency, temp_dir.path())?;
    for entry in &eval_config.evals {
        let config_location = Path::new(&entry.config_location);
        assert!(config_location.is_absolute(), "{} is relative", entry.config_location);
        assert!(config_location.starts_with(temp_dir.path()));
    }

    let path = EvalType::Latency
        .config_dir(temp_dir.path())
        .join("unikraft_config.json");
    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    assert_eq!(value["run_dir"], temp_dir.path().display().to_string());

    Configs::check(base_dir)?;
    Ok(())
}

#[test]
fn test_check_fails_without_configs() {
    let temp_dir = tempdir().unwrap();
    assert!(Configs::check(temp_dir.path()).is_err());
}
