//! MILP (Mixed-Integer Linear Programming) dispatch optimizer
//!
//! Solves one horizon window of the microgrid dispatch problem with `good_lp`.
//! Per hour the model decides grid import, battery charge and discharge, state
//! of charge, a charge/discharge exclusivity binary and inverter reactive power.
//!
//! The formulation considers:
//! - Time-of-use energy prices
//! - Battery wear cost on every kWh charged or discharged
//! - Ancillary-service revenue for reactive power injection
//! - Active power balance at the bus
//! - Inverter apparent power rating (linearised as P + |Q| <= S)
//! - Charge/discharge exclusivity via big-M
//! - Peak-avoidance override at the start of the horizon
//! - Cycle closure: the horizon ends at the SOC it started from
//!
//! The linear capability curve is conservative against P² + Q² <= S² and
//! loses accuracy at high reactive fractions. Under ties (for example when
//! efficiency losses make several schedules cost the same) the returned plan
//! is whichever optimum the solver lands on.

use std::sync::Arc;

use good_lp::{
    constraint, microlp, variable, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel,
};
use tracing::debug;

use super::{
    validate_request, DispatchError, DispatchOutcome, DispatchPlan, DispatchRequest, DispatchStep,
    DispatchStrategy, OptimizerSettings, BIG_M_FACTOR,
};
use crate::domain::{PriceSchedule, SystemSpecification};

/// Exact horizon optimizer backed by the pure-Rust `microlp` MILP solver.
pub struct MilpDispatchOptimizer {
    spec: Arc<SystemSpecification>,
    prices: Arc<PriceSchedule>,
    settings: OptimizerSettings,
}

impl MilpDispatchOptimizer {
    pub fn new(spec: Arc<SystemSpecification>, prices: Arc<PriceSchedule>, settings: OptimizerSettings) -> Self {
        Self {
            spec,
            prices,
            settings,
        }
    }

    fn big_m(&self) -> f64 {
        // Stays strictly positive so a battery with zero power limits is still a
        // well-posed model.
        (BIG_M_FACTOR * self.spec.max_battery_power_kw()).max(BIG_M_FACTOR)
    }

    /// Builds and solves the horizon problem described by `request`.
    pub fn solve(&self, request: &DispatchRequest) -> Result<DispatchOutcome, DispatchError> {
        validate_request(request, &self.spec)?;

        let spec = &*self.spec;
        let horizon = request.horizon_hours;
        let load = &request.load_kw[..horizon];
        let solar = &request.solar_kw[..horizon];
        let initial_soc = request.initial_soc_kwh;
        let prices: Vec<f64> = (0..horizon)
            .map(|t| self.prices.price_at(request.start_hour_of_day + t))
            .collect();

        let eff_charge = spec.charge_efficiency;
        let eff_discharge = spec.discharge_efficiency;
        let kva = spec.inverter_kva;
        let big_m = self.big_m();
        let policy = self.settings.override_policy;
        let override_hours = if request.override_active {
            policy.window_hours.min(horizon)
        } else {
            0
        };

        debug!(
            horizon,
            initial_soc_kwh = initial_soc,
            override_hours,
            start_hour_of_day = request.start_hour_of_day,
            "building dispatch model"
        );

        let mut problem = ProblemVariables::new();
        let grid_import = problem.add_vector(variable().min(0.0), horizon);
        let charge = problem.add_vector(variable().min(0.0).max(spec.max_charge_kw), horizon);
        let discharge = problem.add_vector(variable().min(0.0).max(spec.max_discharge_kw), horizon);
        let soc = problem.add_vector(variable().min(0.0).max(spec.battery_capacity_kwh), horizon);
        let is_charging = problem.add_vector(variable().binary(), horizon);
        let reactive = problem.add_vector(variable().min(-kva).max(kva), horizon);

        let revenue_rate = self.settings.reactive_revenue_per_kvarh;
        let objective = (0..horizon)
            .map(|t| {
                prices[t] * grid_import[t] + spec.degradation_cost_per_kwh * (charge[t] + discharge[t])
                    - revenue_rate * reactive[t]
            })
            .sum::<Expression>();

        let mut model = problem.minimise(objective).using(microlp);

        for t in 0..horizon {
            // Active power balance at the bus
            model = model.with(constraint!(
                grid_import[t] + eff_discharge * discharge[t] - charge[t] == load[t] - solar[t]
            ));

            // Inverter capability, both signs of reactive power
            model = model.with(constraint!(charge[t] + discharge[t] + reactive[t] <= kva));
            model = model.with(constraint!(charge[t] + discharge[t] - reactive[t] <= kva));

            // SOC recursion
            if t == 0 {
                model = model.with(constraint!(
                    soc[0] - eff_charge * charge[0] + discharge[0] == initial_soc
                ));
            } else {
                model = model.with(constraint!(
                    soc[t] - soc[t - 1] - eff_charge * charge[t] + discharge[t] == 0.0
                ));
            }

            // Charge and discharge never overlap
            model = model.with(constraint!(charge[t] - big_m * is_charging[t] <= 0.0));
            model = model.with(constraint!(discharge[t] + big_m * is_charging[t] <= big_m));

            if t < override_hours {
                let min_discharge = policy.min_discharge_fraction * spec.max_discharge_kw;
                model = model.with(constraint!(discharge[t] >= min_discharge));
                model = model.with(constraint!(grid_import[t] <= policy.max_grid_import_kw));
            }
        }

        // Cycle closure
        model = model.with(constraint!(soc[horizon - 1] == initial_soc));

        let solution = model.solve().map_err(|e| match e {
            ResolutionError::Infeasible => DispatchError::Infeasible {
                override_active: request.override_active,
            },
            ResolutionError::Unbounded => DispatchError::Unbounded,
            other => DispatchError::Solver(other.to_string()),
        })?;

        let steps: Vec<DispatchStep> = (0..horizon)
            .map(|t| DispatchStep {
                load_kw: load[t],
                solar_kw: solar[t],
                grid_import_kw: solution.value(grid_import[t]),
                charge_kw: solution.value(charge[t]),
                discharge_kw: solution.value(discharge[t]),
                soc_kwh: solution.value(soc[t]),
                reactive_kvar: solution.value(reactive[t]),
                price_per_kwh: prices[t],
            })
            .collect();

        let total_cost = steps
            .iter()
            .map(|s| {
                s.grid_import_kw * s.price_per_kwh
                    + spec.degradation_cost_per_kwh * (s.charge_kw + s.discharge_kw)
                    - revenue_rate * s.reactive_kvar
            })
            .sum();
        let next_soc_kwh = steps[0].soc_kwh;

        debug!(total_cost, next_soc_kwh, "dispatch model solved");

        Ok(DispatchOutcome {
            plan: DispatchPlan {
                initial_soc_kwh: initial_soc,
                steps,
            },
            total_cost,
            next_soc_kwh,
        })
    }
}

impl DispatchStrategy for MilpDispatchOptimizer {
    fn name(&self) -> &'static str {
        "milp"
    }

    fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchOutcome, DispatchError> {
        self.solve(request)
    }
}
