use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{BatteryMode, ForecastError};

/// Reasons a horizon solve produced no plan.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    #[error("Malformed forecast: {0}")]
    MalformedForecast(#[from] ForecastError),
    #[error("Initial SOC {soc_kwh} kWh outside 0..={capacity_kwh} kWh")]
    InvalidBatteryState { soc_kwh: f64, capacity_kwh: f64 },
    #[error("Dispatch problem is infeasible (override active: {override_active})")]
    Infeasible { override_active: bool },
    #[error("Dispatch problem is unbounded")]
    Unbounded,
    #[error("Solver failed: {0}")]
    Solver(String),
    #[error("Solver exceeded its {seconds}s time limit")]
    Timeout { seconds: u64 },
}

/// Inputs for one horizon solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub load_kw: Vec<f64>,
    pub solar_kw: Vec<f64>,
    pub initial_soc_kwh: f64,
    pub horizon_hours: usize,
    /// Force peak-avoidance discharge at the start of the horizon
    pub override_active: bool,
    /// Hour of day of the first plan step, used for tariff lookup
    pub start_hour_of_day: usize,
}

/// Decisions for one hour of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DispatchStep {
    pub load_kw: f64,
    pub solar_kw: f64,
    pub grid_import_kw: f64,
    pub charge_kw: f64,
    pub discharge_kw: f64,
    /// SOC at the end of the hour (kWh)
    pub soc_kwh: f64,
    pub reactive_kvar: f64,
    pub price_per_kwh: f64,
}

impl DispatchStep {
    pub fn mode(&self, tolerance_kw: f64) -> BatteryMode {
        BatteryMode::from_powers(self.charge_kw, self.discharge_kw, tolerance_kw)
    }
}

/// Hour-by-hour schedule over the horizon. Only the first step is ever executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchPlan {
    pub initial_soc_kwh: f64,
    pub steps: Vec<DispatchStep>,
}

impl DispatchPlan {
    pub fn first(&self) -> Option<&DispatchStep> {
        self.steps.first()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Result of a successful solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub plan: DispatchPlan,
    /// Objective value: energy cost plus wear minus reactive revenue
    pub total_cost: f64,
    /// SOC at the end of plan hour 0, carried into the next iteration
    pub next_soc_kwh: f64,
}

/// A solver-backed horizon optimizer.
///
/// Implementations block until the solve finishes; callers that need a time
/// bound run them on a blocking thread.
#[cfg_attr(test, mockall::automock)]
pub trait DispatchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchOutcome, DispatchError>;
}
