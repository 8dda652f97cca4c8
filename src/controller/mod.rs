//! Receding-horizon control loop.
//!
//! Every simulated hour the loop forecasts the next window, asks the peak
//! trigger whether the system is near a coincident peak, solves the window
//! and commits only the first hour of the plan. The battery state carried
//! into the next hour is the SOC that committed hour ends at.

pub mod runner;

use std::sync::Arc;
use std::time::Duration;

use chrono::Timelike;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::domain::{ActionLog, ActionRecord, BatteryError, BatteryState, SystemSpecification, WeatherSample};
use crate::forecast::{LoadSolarForecaster, SystemDemandForecaster};
use crate::optimizer::{DispatchError, DispatchOutcome, DispatchRequest, DispatchStrategy};
use crate::peak_trigger::{estimate_annual_savings, PeakTriggerMonitor};

pub use runner::{build_control_loop, run_all, run_simulation};

/// Solver noise allowed on the SOC bounds when committing a step (kWh).
pub const SOC_TOLERANCE_KWH: f64 = 1e-3;
/// Power below which a battery flow counts as zero when logging the mode (kW).
pub const MODE_TOLERANCE_KW: f64 = 1e-3;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Weather data covers {available} hours, run needs {required}")]
    InsufficientWeather { available: usize, required: usize },
    #[error("Horizon must cover at least one hour")]
    ZeroHorizon,
    #[error("Run already completed all {total_hours} hours")]
    Completed { total_hours: usize },
    #[error("Load/solar forecast for hour {hour} failed")]
    Forecast { hour: usize, source: anyhow::Error },
    #[error("System demand forecast for hour {hour} failed")]
    Demand { hour: usize, source: anyhow::Error },
    #[error("Dispatch for hour {hour} failed")]
    Dispatch { hour: usize, source: DispatchError },
    #[error("Solver task for hour {hour} did not complete: {message}")]
    SolverTask { hour: usize, message: String },
    #[error("Battery update for hour {hour} failed")]
    Battery { hour: usize, source: BatteryError },
}

impl ControlError {
    /// Hour at which the run stopped, when the failure belongs to one.
    pub fn hour(&self) -> Option<usize> {
        match self {
            ControlError::Forecast { hour, .. }
            | ControlError::Demand { hour, .. }
            | ControlError::Dispatch { hour, .. }
            | ControlError::SolverTask { hour, .. }
            | ControlError::Battery { hour, .. } => Some(*hour),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSettings {
    pub horizon_hours: usize,
    pub total_hours: usize,
    /// Wall-clock bound on a single horizon solve
    pub solve_timeout: Duration,
}

/// Forecasting and optimisation services the loop calls each hour.
#[derive(Clone)]
pub struct Collaborators {
    pub optimizer: Arc<dyn DispatchStrategy>,
    pub forecaster: Arc<dyn LoadSolarForecaster>,
    pub demand: Arc<dyn SystemDemandForecaster>,
}

pub struct ControlLoop {
    spec: Arc<SystemSpecification>,
    collaborators: Collaborators,
    trigger: PeakTriggerMonitor,
    weather: Vec<WeatherSample>,
    settings: LoopSettings,
    battery: BatteryState,
    log: ActionLog,
    hour: usize,
}

impl ControlLoop {
    pub fn new(
        spec: Arc<SystemSpecification>,
        collaborators: Collaborators,
        trigger: PeakTriggerMonitor,
        weather: Vec<WeatherSample>,
        initial: BatteryState,
        settings: LoopSettings,
    ) -> Result<Self, ControlError> {
        if settings.horizon_hours == 0 {
            return Err(ControlError::ZeroHorizon);
        }
        if weather.len() < settings.total_hours {
            return Err(ControlError::InsufficientWeather {
                available: weather.len(),
                required: settings.total_hours,
            });
        }
        Ok(Self {
            spec,
            collaborators,
            trigger,
            weather,
            settings,
            battery: initial,
            log: ActionLog::with_capacity(Uuid::new_v4(), settings.total_hours),
            hour: 0,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.log.run_id()
    }

    pub fn solver_name(&self) -> &'static str {
        self.collaborators.optimizer.name()
    }

    pub fn battery(&self) -> BatteryState {
        self.battery
    }

    pub fn log(&self) -> &ActionLog {
        &self.log
    }

    /// Index of the next hour to commit.
    pub fn hour(&self) -> usize {
        self.hour
    }

    pub fn is_finished(&self) -> bool {
        self.hour >= self.settings.total_hours
    }

    /// Runs every remaining hour and hands back the action log.
    ///
    /// The first failed hour aborts the run; hours committed before it are
    /// dropped with the loop.
    pub async fn run(mut self) -> Result<ActionLog, ControlError> {
        let span = info_span!("control_run", run_id = %self.log.run_id());
        async move {
            info!(
                total_hours = self.settings.total_hours,
                horizon_hours = self.settings.horizon_hours,
                initial_soc_kwh = self.battery.soc_kwh(),
                threshold_mw = self.trigger.threshold_mw(),
                "run started"
            );
            while !self.is_finished() {
                if let Err(e) = self.step().await {
                    error!(error = %e, cause = ?std::error::Error::source(&e), hour = self.hour, "run aborted");
                    return Err(e);
                }
            }

            let summary = self.log.summary();
            info!(
                hours = summary.hours,
                override_hours = summary.override_hours,
                energy_cost = summary.energy_cost,
                grid_import_kwh = summary.grid_import_kwh,
                peak_import_kw = summary.peak_import_kw,
                battery_throughput_kwh = summary.battery_throughput_kwh,
                final_soc_kwh = summary.final_soc_kwh,
                estimated_ici_savings = estimate_annual_savings(summary.override_discharge_kw),
                "run completed"
            );
            Ok(self.log)
        }
        .instrument(span)
        .await
    }

    /// Plans from the current hour, commits the first planned hour and advances.
    pub async fn step(&mut self) -> Result<ActionRecord, ControlError> {
        let hour = self.hour;
        if self.is_finished() {
            return Err(ControlError::Completed {
                total_hours: self.settings.total_hours,
            });
        }

        // Near the end of the weather data the window shrinks to what remains.
        let end = (hour + self.settings.horizon_hours).min(self.weather.len());
        let window = &self.weather[hour..end];
        let hour_of_day = window[0].timestamp.hour() as usize;

        let forecast = self
            .collaborators
            .forecaster
            .predict(window)
            .await
            .map_err(|source| ControlError::Forecast { hour, source })?;
        let demand_mw = self
            .collaborators
            .demand
            .demand_mw(hour, hour_of_day)
            .await
            .map_err(|source| ControlError::Demand { hour, source })?;

        let override_active = self.trigger.check_trigger(demand_mw);
        if override_active {
            warn!(
                hour,
                demand_mw,
                threshold_mw = self.trigger.threshold_mw(),
                "peak trigger fired, forcing discharge"
            );
        }

        let (load_kw, solar_kw) = forecast.into_parts();
        let request = DispatchRequest {
            load_kw,
            solar_kw,
            initial_soc_kwh: self.battery.soc_kwh(),
            horizon_hours: window.len(),
            override_active,
            start_hour_of_day: hour_of_day,
        };
        let outcome = self.solve_bounded(hour, request).await?;
        let step = *outcome.plan.first().ok_or_else(|| ControlError::Dispatch {
            hour,
            source: DispatchError::Solver("solver returned an empty plan".to_string()),
        })?;
        debug!(hour, plan_hours = outcome.plan.len(), total_cost = outcome.total_cost, "plan received");

        self.battery
            .commit(outcome.next_soc_kwh, &self.spec, SOC_TOLERANCE_KWH)
            .map_err(|source| ControlError::Battery { hour, source })?;

        let record = ActionRecord {
            hour_index: hour,
            load_kw: step.load_kw,
            solar_kw: step.solar_kw,
            grid_import_kw: step.grid_import_kw,
            battery_soc_kwh: self.battery.soc_kwh(),
            battery_charge_kw: step.charge_kw,
            battery_discharge_kw: step.discharge_kw,
            reactive_kvar: step.reactive_kvar,
            price_per_kwh: step.price_per_kwh,
            override_triggered: override_active,
            system_demand_mw: demand_mw,
        };
        self.log.append(record.clone());
        self.hour += 1;

        info!(
            hour,
            hour_of_day,
            soc_kwh = record.battery_soc_kwh,
            grid_import_kw = record.grid_import_kw,
            mode = %step.mode(MODE_TOLERANCE_KW),
            override_active,
            "hour committed"
        );
        Ok(record)
    }

    async fn solve_bounded(&self, hour: usize, request: DispatchRequest) -> Result<DispatchOutcome, ControlError> {
        let optimizer = Arc::clone(&self.collaborators.optimizer);
        let limit = self.settings.solve_timeout;
        let task = tokio::task::spawn_blocking(move || optimizer.dispatch(&request));
        match tokio::time::timeout(limit, task).await {
            Ok(Ok(result)) => result.map_err(|source| ControlError::Dispatch { hour, source }),
            Ok(Err(join_err)) => Err(ControlError::SolverTask {
                hour,
                message: join_err.to_string(),
            }),
            Err(_) => Err(ControlError::Dispatch {
                hour,
                source: DispatchError::Timeout {
                    seconds: limit.as_secs(),
                },
            }),
        }
    }
}
