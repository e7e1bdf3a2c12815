use std::path::{Path, PathBuf};

pub struct Env {}

impl Env {
    pub const SYS_NAME: &'static str = "sbcli";

    pub fn proj_root() -> PathBuf {
        env!("SBCLI_ROOT_DIR").into()
    }

    pub fn config_root(base_dir: &Path) -> PathBuf {
        let mut path = base_dir.to_path_buf();
        path.push("config");
        path
    }

    pub fn latency_eval_root(base_dir: &Path) -> PathBuf {
        let mut path = Self::config_root(base_dir);
        path.push("latency_eval");
        path
    }

    pub fn density_eval_root(base_dir: &Path) -> PathBuf {
        let mut path = Self::config_root(base_dir);
        path.push("density_eval");
        path
    }

    pub fn bin_root(base_dir: &Path) -> PathBuf {
        let mut path = base_dir.to_path_buf();
        path.push("bin");
        path
    }

    pub fn firecracker_scripts_root(base_dir: &Path) -> PathBuf {
        let mut path = base_dir.to_path_buf();
        path.push("scripts");
        path.push("firecracker");
        path
    }
}
