use anyhow::{Context, Result};
use clap::Parser;
use microgrid_mpc::{cli, config, controller, peak_trigger, runtime, telemetry};
use cli::Args;
use config::Config;
use peak_trigger::estimate_annual_savings;
use telemetry::init_tracing;
use tracing::{error, info, warn};

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    runtime::block_on_with_grace(run(args), runtime::SHUTDOWN_GRACE).context("starting tokio runtime")?
}

async fn run(args: Args) -> Result<()> {
    let configs = args
        .configs
        .iter()
        .map(|path| Config::load_from(path))
        .collect::<Result<Vec<_>>>()?;
    info!(runs = configs.len(), "starting microgrid dispatch simulation");

    let results = tokio::select! {
        results = controller::run_all(configs) => results,
        _ = telemetry::shutdown_signal() => {
            warn!("interrupted before all runs completed");
            anyhow::bail!("interrupted");
        }
    };

    let mut failed = 0usize;
    for (name, result) in &results {
        match result {
            Ok(log) => {
                let summary = log.summary();
                info!(
                    run = %name,
                    run_id = %log.run_id(),
                    hours = summary.hours,
                    override_hours = summary.override_hours,
                    energy_cost = summary.energy_cost,
                    peak_import_kw = summary.peak_import_kw,
                    estimated_ici_savings = estimate_annual_savings(summary.override_discharge_kw),
                    "run finished"
                );
                if args.json_summary {
                    let json = serde_json::to_string(&summary).context("serialising run summary")?;
                    println!("{json}");
                }
            }
            Err(e) => {
                failed += 1;
                error!(run = %name, error = %format!("{e:#}"), "run failed");
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} runs failed", results.len());
    }
    Ok(())
}
