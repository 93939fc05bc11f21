use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use gui_bridge::bridge::GuiBridge;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "RF scan explorer workflow driver")]
struct Args {
    /// Generate and ingest one batch of synthetic scans, then analyze the newest
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long, default_value_t = 200)]
    scans: usize,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Persist the store to this JSON-lines journal
    #[arg(long)]
    journal: Option<PathBuf>,
    /// Append the offline summary as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,
    /// Serve the HTTP bridge until Ctrl+C
    #[arg(long, default_value_t = false)]
    serve: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut workflow_config = if let Some(path) = args.workflow {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::from_args(args.scans, args.seed, None)
    };
    if args.journal.is_some() {
        workflow_config.store.journal_path = args.journal;
    }

    let runner = Runner::new(workflow_config.clone())?;
    let gui_bridge = GuiBridge::new(runner.service());

    if args.offline {
        let result = runner.execute(Utc::now())?;

        println!(
            "Offline run -> ingested {} of {} scans ({} duplicates, {} purged), markers {}",
            result.scans_ingested,
            result.scans_generated,
            result.duplicates,
            result.purged,
            result.markers.len()
        );
        for analysis in &result.analyses {
            println!("  {} [{}]: {}", analysis.preset_name, analysis.kind, analysis.summary);
        }
        gui_bridge.publish_status("Offline workflow results ready.");

        if let Some(report_path) = args.report {
            if let Some(parent) = report_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            let line = serde_json::to_string(&result).context("encoding workflow report")?;
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&report_path)
                .with_context(|| format!("opening report {}", report_path.display()))?;
            writeln!(file, "{line}")?;
        }
    }
    if args.serve {
        gui_bridge.spawn(workflow_config.bind_address)?;
        gui_bridge.publish_status("HTTP bridge running (Ctrl+C to stop)...");
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}
