use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::{Collaborators, ControlLoop, LoopSettings};
use crate::config::Config;
use crate::domain::{ActionLog, BatteryState};
use crate::forecast::{SyntheticSystemDemand, WeatherDrivenForecaster};
use crate::optimizer::{DispatchStrategy, MilpDispatchOptimizer};

/// Wires the configured synthetic collaborators and the MILP optimizer into a loop.
pub fn build_control_loop(cfg: &Config) -> Result<ControlLoop> {
    let spec = Arc::new(cfg.system_specification());
    let prices = Arc::new(cfg.price_schedule()?);
    let trigger = cfg.peak_trigger_monitor()?;

    let optimizer: Arc<dyn DispatchStrategy> =
        Arc::new(MilpDispatchOptimizer::new(spec.clone(), prices, cfg.optimizer_settings()));
    let forecaster: Arc<WeatherDrivenForecaster> = Arc::new(cfg.forecast.clone());
    let demand = Arc::new(SyntheticSystemDemand::new(cfg.demand.clone())?);

    // Synthetic weather runs one horizon past the end so every window is full length.
    let weather_hours = cfg.simulation.total_hours + cfg.simulation.horizon_hours - 1;
    let weather = cfg.weather.generate(cfg.simulation.start, weather_hours);
    let initial = BatteryState::at_fraction(cfg.battery.initial_soc_fraction, &spec)
        .context("initial battery state")?;
    let settings = LoopSettings {
        horizon_hours: cfg.simulation.horizon_hours,
        total_hours: cfg.simulation.total_hours,
        solve_timeout: cfg.solve_timeout(),
    };

    let control = ControlLoop::new(
        spec,
        Collaborators {
            optimizer,
            forecaster,
            demand,
        },
        trigger,
        weather,
        initial,
        settings,
    )?;
    Ok(control)
}

/// Runs one configuration to completion and exports the log if an output path is set.
pub async fn run_simulation(cfg: Config) -> Result<ActionLog> {
    let name = cfg.run_name();
    let control = build_control_loop(&cfg)?;
    let relaxed = cfg.override_floor_relaxed();
    info!(
        run = %name,
        run_id = %control.run_id(),
        solver = control.solver_name(),
        "simulation configured"
    );
    if relaxed {
        warn!(
            run = %name,
            min_discharge_fraction = cfg.optimizer.override_min_discharge_fraction,
            "override discharge floor relaxed, only the import cap binds during peaks"
        );
    }

    let log = control.run().await.with_context(|| format!("run '{name}' aborted"))?;
    info!(
        run = %name,
        hours = log.len(),
        override_hours = log.summary().override_hours,
        override_floor_relaxed = relaxed,
        "simulation finished"
    );

    if let Some(path) = &cfg.simulation.output_csv {
        log.export_csv(path)
            .with_context(|| format!("writing action log to {}", path.display()))?;
        info!(run = %name, path = %path.display(), rows = log.len(), "action log exported");
    }
    Ok(log)
}

/// Runs independent configurations concurrently, one task each.
///
/// Results come back in the order the configurations were given.
pub async fn run_all(configs: Vec<Config>) -> Vec<(String, Result<ActionLog>)> {
    let names: Vec<String> = configs.iter().map(Config::run_name).collect();
    let mut results: Vec<Option<Result<ActionLog>>> = names.iter().map(|_| None).collect();

    let mut set = JoinSet::new();
    for (idx, cfg) in configs.into_iter().enumerate() {
        set.spawn(async move { (idx, run_simulation(cfg).await) });
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, result)) => results[idx] = Some(result),
            Err(e) => warn!(error = %e, "simulation task failed to complete"),
        }
    }

    names
        .into_iter()
        .zip(results)
        .map(|(name, result)| {
            let result = result.unwrap_or_else(|| Err(anyhow::anyhow!("simulation task for '{name}' did not complete")));
            (name, result)
        })
        .collect()
}
