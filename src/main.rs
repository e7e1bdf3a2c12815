use clap::{Parser, Subcommand};
use env_logger::Builder;
use sbcli::{
    env::Env,
    tasks::{
        configs::Configs,
        experiments::{self, Chart},
    },
};
use std::path::PathBuf;

#[derive(Parser)]
struct Cli {
    // The name of the task to execute
    #[clap(subcommand)]
    task: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate or check the JSON configs of the latency and density evals
    Configs {
        #[command(subcommand)]
        configs_command: ConfigsCommand,
    },
    /// Plot a chart from a benchmark CSV log
    Plot {
        /// Chart to draw
        chart: Chart,
        /// Path to the CSV file written by the benchmark runner
        csv_file: PathBuf,
        /// Directory to save the PDF figure in. If omitted, the figure is
        /// opened in the default viewer instead.
        save_path: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigsCommand {
    /// Write every backend config and eval_config.json under <BASE_DIR>/config
    Generate {
        /// Base directory of the generated paths (defaults to the project
        /// root)
        #[arg(long)]
        base_dir: Option<PathBuf>,
    },
    /// Load every eval_config.json and the backend configs it lists
    Check {
        /// Base directory the configs were generated for (defaults to the
        /// project root)
        #[arg(long)]
        base_dir: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize the logger.
    let env = env_logger::Env::default().filter_or("RUST_LOG", "info");
    let mut builder = Builder::from_env(env);
    builder.init();

    let cli = Cli::parse();
    match &cli.task {
        Command::Configs { configs_command } => match configs_command {
            ConfigsCommand::Generate { base_dir } => {
                let base_dir = base_dir.clone().unwrap_or_else(Env::proj_root);
                Configs::generate(&base_dir)?;
            }
            ConfigsCommand::Check { base_dir } => {
                let base_dir = base_dir.clone().unwrap_or_else(Env::proj_root);
                Configs::check(&base_dir)?;
            }
        },
        Command::Plot {
            chart,
            csv_file,
            save_path,
        } => {
            experiments::plot(chart, csv_file, save_path.as_deref())?;
        }
    }

    Ok(())
}
