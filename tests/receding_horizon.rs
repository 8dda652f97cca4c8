use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate};
use figment::providers::{Format, Serialized, Toml};
use figment::Figment;
use microgrid_mpc::config::Config;
use microgrid_mpc::controller::{build_control_loop, Collaborators, ControlLoop, LoopSettings};
use microgrid_mpc::domain::{BatteryState, ForecastWindow, PriceSchedule, SystemSpecification, WeatherSample};
use microgrid_mpc::forecast::{LoadSolarForecaster, SystemDemandForecaster};
use microgrid_mpc::optimizer::{MilpDispatchOptimizer, OptimizerSettings, OverridePolicy};
use microgrid_mpc::peak_trigger::PeakTriggerMonitor;

const EPS: f64 = 1e-3;

struct FlatSite {
    load_kw: f64,
    solar_kw: f64,
}

#[async_trait]
impl LoadSolarForecaster for FlatSite {
    async fn predict(&self, weather: &[WeatherSample]) -> anyhow::Result<ForecastWindow> {
        Ok(ForecastWindow::new(
            vec![self.load_kw; weather.len()],
            vec![self.solar_kw; weather.len()],
        )?)
    }
}

struct Demand(Vec<f64>);

#[async_trait]
impl SystemDemandForecaster for Demand {
    async fn demand_mw(&self, hour_index: usize, _hour_of_day: usize) -> anyhow::Result<f64> {
        Ok(self.0.get(hour_index).copied().unwrap_or(12_000.0))
    }
}

fn weather(hours: usize) -> Vec<WeatherSample> {
    let start = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    (0..hours)
        .map(|h| WeatherSample {
            timestamp: start + ChronoDuration::hours(h as i64),
            temp_c: 28.0,
            humidity_percent: 60.0,
            cloudiness: 0.1,
        })
        .collect()
}

fn site(capacity_kwh: f64, max_power_kw: f64) -> SystemSpecification {
    SystemSpecification {
        battery_capacity_kwh: capacity_kwh,
        max_charge_kw: max_power_kw,
        max_discharge_kw: max_power_kw,
        charge_efficiency: 0.95,
        discharge_efficiency: 0.95,
        degradation_cost_per_kwh: 0.5,
        inverter_kva: 2.5 * max_power_kw,
    }
}

fn control_loop(
    spec: SystemSpecification,
    settings: OptimizerSettings,
    load_kw: f64,
    demand_mw: Vec<f64>,
    horizon_hours: usize,
    total_hours: usize,
) -> ControlLoop {
    let spec = Arc::new(spec);
    let optimizer = MilpDispatchOptimizer::new(spec.clone(), Arc::new(PriceSchedule::flat(10.0)), settings);
    let initial = BatteryState::at_fraction(0.5, &spec).unwrap();
    ControlLoop::new(
        spec,
        Collaborators {
            optimizer: Arc::new(optimizer),
            forecaster: Arc::new(FlatSite { load_kw, solar_kw: 0.0 }),
            demand: Arc::new(Demand(demand_mw)),
        },
        PeakTriggerMonitor::new(&[18_000.0, 17_500.0, 19_000.0], 0.95).unwrap(),
        weather(total_hours + horizon_hours - 1),
        initial,
        LoopSettings {
            horizon_hours,
            total_hours,
            solve_timeout: Duration::from_secs(60),
        },
    )
    .unwrap()
}

#[tokio::test]
async fn flat_price_week_slice_imports_load_and_never_cycles() {
    let control = control_loop(site(1000.0, 250.0), OptimizerSettings::default(), 1000.0, vec![], 6, 8);
    let log = control.run().await.unwrap();

    assert_eq!(log.len(), 8);
    for record in log.records() {
        assert!((record.grid_import_kw - 1000.0).abs() < EPS);
        assert!(record.battery_charge_kw < EPS);
        assert!(record.battery_discharge_kw < EPS);
        assert!((record.battery_soc_kwh - 500.0).abs() < EPS);
        assert_eq!(record.price_per_kwh, 10.0);
    }
}

#[tokio::test]
async fn peak_hour_discharges_battery_and_caps_import() {
    let settings = OptimizerSettings {
        reactive_revenue_per_kvarh: 0.0,
        override_policy: OverridePolicy {
            window_hours: 2,
            ..OverridePolicy::default()
        },
    };
    let demand = vec![20_000.0, 12_000.0, 12_000.0, 12_000.0];
    let control = control_loop(site(500.0, 100.0), settings, 100.0, demand, 6, 4);
    let log = control.run().await.unwrap();

    let first = &log.records()[0];
    assert!(first.override_triggered);
    assert_eq!(first.system_demand_mw, 20_000.0);
    assert!(first.battery_discharge_kw >= 95.0 - EPS);
    assert!(first.grid_import_kw <= 10.0 + EPS);
    assert!((first.battery_soc_kwh - (250.0 - first.battery_discharge_kw)).abs() < EPS);

    assert!(log.records()[1..].iter().all(|r| !r.override_triggered));
    assert!(log
        .records()
        .iter()
        .all(|r| (-EPS..=500.0 + EPS).contains(&r.battery_soc_kwh)));
    assert_eq!(log.summary().override_hours, 1);
}

#[tokio::test]
async fn action_log_csv_has_one_row_per_hour() {
    let control = control_loop(site(1000.0, 250.0), OptimizerSettings::default(), 600.0, vec![], 4, 5);
    let log = control.run().await.unwrap();

    let mut buf = Vec::new();
    log.write_csv(&mut buf).unwrap();
    let mut reader = csv::Reader::from_reader(buf.as_slice());
    let headers = reader.headers().unwrap().clone();
    assert_eq!(headers.get(0), Some("hour_index"));
    assert_eq!(headers.get(10), Some("system_demand_mw"));

    let hours: Vec<usize> = reader
        .records()
        .map(|row| row.unwrap()[0].parse().unwrap())
        .collect();
    assert_eq!(hours, vec![0, 1, 2, 3, 4]);
}

#[test]
fn bundled_config_is_valid() {
    let cfg = Config::load_from(Path::new("config/default.toml")).unwrap();
    assert_eq!(cfg.simulation.total_hours, 168);
    assert_eq!(cfg.simulation.horizon_hours, 24);
    assert_eq!(cfg.battery.initial_soc_fraction, 0.5);
}

#[tokio::test]
async fn bundled_config_night_hours_run() {
    let figment = Figment::new()
        .merge(Toml::file("config/default.toml"))
        .merge(Serialized::default("simulation.total_hours", 4))
        .merge(Serialized::default("simulation.horizon_hours", 12));
    let cfg = Config::from_figment(figment).unwrap();
    let capacity = cfg.battery.capacity_kwh;

    let log = build_control_loop(&cfg).unwrap().run().await.unwrap();
    assert_eq!(log.len(), 4);
    assert!(log.records().iter().all(|r| !r.override_triggered));
    assert!(log
        .records()
        .iter()
        .all(|r| (-EPS..=capacity + EPS).contains(&r.battery_soc_kwh)));
}
