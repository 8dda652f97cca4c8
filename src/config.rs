use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use validator::Validate;

use crate::domain::{PriceSchedule, SystemSpecification, TouBand};
use crate::forecast::{SyntheticDemandConfig, SyntheticWeather, WeatherDrivenForecaster};
use crate::optimizer::{OptimizerSettings, OverridePolicy};
use crate::peak_trigger::PeakTriggerMonitor;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "MPC__";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    pub battery: BatteryConfig,
    pub inverter: InverterConfig,
    pub tariff: TariffConfig,
    #[validate(nested)]
    pub peak_trigger: PeakTriggerConfig,
    #[serde(default)]
    #[validate(nested)]
    pub optimizer: OptimizerConfig,
    #[validate(nested)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    #[validate(nested)]
    pub forecast: WeatherDrivenForecaster,
    #[serde(default)]
    pub weather: SyntheticWeather,
    #[serde(default)]
    #[validate(nested)]
    pub demand: SyntheticDemandConfig,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BatteryConfig {
    pub capacity_kwh: f64,
    pub max_charge_kw: f64,
    pub max_discharge_kw: f64,
    pub charge_efficiency: f64,
    pub discharge_efficiency: f64,
    pub degradation_cost_per_kwh: f64,
    /// Starting SOC as a fraction of capacity
    #[serde(default = "default_initial_soc_fraction")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub initial_soc_fraction: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InverterConfig {
    pub rating_kva: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TariffConfig {
    pub off_peak: f64,
    pub mid_peak: f64,
    pub on_peak: f64,
    #[serde(default = "TouBand::default_bands")]
    pub bands: Vec<TouBand>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PeakTriggerConfig {
    #[validate(length(min = 1))]
    pub historical_peaks_mw: Vec<f64>,
    #[serde(default = "default_threshold_factor")]
    #[validate(range(exclusive_min = 0.0))]
    pub threshold_factor: f64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct OptimizerConfig {
    #[validate(range(min = 0.0))]
    pub reactive_revenue_per_kvarh: f64,
    #[validate(range(min = 1))]
    pub override_window_hours: usize,
    #[validate(range(min = 0.0, max = 1.0))]
    pub override_min_discharge_fraction: f64,
    #[validate(range(min = 0.0))]
    pub override_max_grid_import_kw: f64,
    #[validate(range(min = 1))]
    pub solve_timeout_seconds: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        let settings = OptimizerSettings::default();
        Self {
            reactive_revenue_per_kvarh: settings.reactive_revenue_per_kvarh,
            override_window_hours: settings.override_policy.window_hours,
            override_min_discharge_fraction: settings.override_policy.min_discharge_fraction,
            override_max_grid_import_kw: settings.override_policy.max_grid_import_kw,
            solve_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SimulationConfig {
    /// Label used in logs when several runs execute together
    #[serde(default)]
    pub name: Option<String>,
    #[validate(range(min = 1))]
    pub horizon_hours: usize,
    #[validate(range(min = 1))]
    pub total_hours: usize,
    pub start: NaiveDateTime,
    #[serde(default)]
    pub output_csv: Option<PathBuf>,
}

fn default_initial_soc_fraction() -> f64 {
    0.5
}

fn default_threshold_factor() -> f64 {
    0.95
}

impl Config {
    /// Loads a TOML file overlaid with `MPC__` environment variables.
    pub fn load_from(path: &Path) -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(figment).with_context(|| format!("loading config from {}", path.display()))
    }

    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Self::from_figment(Figment::from(Toml::string(toml)))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Config = figment.extract()?;
        cfg.check()?;
        Ok(cfg)
    }

    /// Field-level rules plus the checks that need the assembled domain types.
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        self.system_specification().validate()?;
        self.price_schedule()?;
        self.peak_trigger_monitor()?;
        Ok(())
    }

    pub fn system_specification(&self) -> SystemSpecification {
        SystemSpecification {
            battery_capacity_kwh: self.battery.capacity_kwh,
            max_charge_kw: self.battery.max_charge_kw,
            max_discharge_kw: self.battery.max_discharge_kw,
            charge_efficiency: self.battery.charge_efficiency,
            discharge_efficiency: self.battery.discharge_efficiency,
            degradation_cost_per_kwh: self.battery.degradation_cost_per_kwh,
            inverter_kva: self.inverter.rating_kva,
        }
    }

    pub fn price_schedule(&self) -> Result<PriceSchedule> {
        let t = &self.tariff;
        Ok(PriceSchedule::new(t.off_peak, t.mid_peak, t.on_peak, &t.bands)?)
    }

    pub fn peak_trigger_monitor(&self) -> Result<PeakTriggerMonitor> {
        Ok(PeakTriggerMonitor::new(
            &self.peak_trigger.historical_peaks_mw,
            self.peak_trigger.threshold_factor,
        )?)
    }

    pub fn optimizer_settings(&self) -> OptimizerSettings {
        OptimizerSettings {
            reactive_revenue_per_kvarh: self.optimizer.reactive_revenue_per_kvarh,
            override_policy: OverridePolicy {
                window_hours: self.optimizer.override_window_hours,
                min_discharge_fraction: self.optimizer.override_min_discharge_fraction,
                max_grid_import_kw: self.optimizer.override_max_grid_import_kw,
            },
        }
    }

    pub fn solve_timeout(&self) -> Duration {
        Duration::from_secs(self.optimizer.solve_timeout_seconds)
    }

    pub fn run_name(&self) -> String {
        self.simulation.name.clone().unwrap_or_else(|| "default".to_string())
    }

    /// True when the override's discharge floor is below the standard 95 %
    /// of max discharge, leaving the import cap to enforce peak avoidance.
    pub fn override_floor_relaxed(&self) -> bool {
        self.optimizer.override_min_discharge_fraction < OverridePolicy::default().min_discharge_fraction
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub const MINIMAL: &str = r#"
        [battery]
        capacity_kwh = 1000.0
        max_charge_kw = 250.0
        max_discharge_kw = 250.0
        charge_efficiency = 0.95
        discharge_efficiency = 0.95
        degradation_cost_per_kwh = 0.5

        [inverter]
        rating_kva = 600.0

        [tariff]
        off_peak = 7.4
        mid_peak = 10.2
        on_peak = 15.1

        [peak_trigger]
        historical_peaks_mw = [18000.0, 17500.0, 19000.0]

        [simulation]
        horizon_hours = 6
        total_hours = 12
        start = "2025-07-01T00:00:00"

        [demand]
        random_seed = 3
    "#;
}
