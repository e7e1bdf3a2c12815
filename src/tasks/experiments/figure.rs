use crate::env::Env;
use anyhow::Result;
use log::{error, info};
use std::{
    env, fs,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};
use svg2pdf::{ConversionOptions, PageOptions, usvg};

/// Converts a rendered SVG chart into a single-page PDF document.
pub fn svg_to_pdf(svg: &str) -> Result<Vec<u8>> {
    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &options).map_err(|e| {
        let reason = format!("error parsing rendered svg (error={e:?})");
        error!("{reason}");
        anyhow::anyhow!(reason)
    })?;

    svg2pdf::to_pdf(&tree, ConversionOptions::default(), PageOptions::default()).map_err(|e| {
        let reason = format!("error converting svg to pdf (error={e:?})");
        error!("{reason}");
        anyhow::anyhow!(reason)
    })
}

/// Writes the chart as `<save_dir>/<file_name>`, creating the directory if
/// needed.
pub fn save_pdf(svg: &str, save_dir: &Path, file_name: &str) -> Result<PathBuf> {
    fs::create_dir_all(save_dir).map_err(|e| {
        let reason = format!(
            "error creating plot directory (path={}, error={e:?})",
            save_dir.display()
        );
        error!("{reason}");
        anyhow::anyhow!(reason)
    })?;

    let pdf = svg_to_pdf(svg)?;
    let save_path = save_dir.join(file_name);
    fs::write(&save_path, pdf).map_err(|e| {
        let reason = format!(
            "error writing figure (path={}, error={e:?})",
            save_path.display()
        );
        error!("{reason}");
        anyhow::anyhow!(reason)
    })?;
    info!("Figure saved to {}", save_path.display());

    Ok(save_path)
}

/// Opens the chart in the platform's default viewer. The SVG is kept in the
/// temp dir so the viewer can outlive this process.
pub fn show(svg: &str, file_name: &str) -> Result<PathBuf> {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("figure");
    let svg_path = env::temp_dir().join(format!("{}-{stem}.svg", Env::SYS_NAME));
    fs::write(&svg_path, svg).map_err(|e| {
        let reason = format!(
            "error writing figure (path={}, error={e:?})",
            svg_path.display()
        );
        error!("{reason}");
        anyhow::anyhow!(reason)
    })?;

    let opener = if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    Command::new(opener)
        .arg(&svg_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| {
            let reason = format!(
                "error opening figure (opener={opener}, path={}, error={e:?})",
                svg_path.display()
            );
            error!("{reason}");
            anyhow::anyhow!(reason)
        })?;
    info!("Figure opened from {}", svg_path.display());

    Ok(svg_path)
}

/// Saves the chart when a directory is given, shows it otherwise.
pub fn save_or_show(svg: &str, save_dir: Option<&Path>, file_name: &str) -> Result<PathBuf> {
    match save_dir {
        Some(dir) => save_pdf(svg, dir, file_name),
        None => show(svg, file_name),
    }
}
