//! Committed hourly actions: the output artifact of a control-loop run.
//!
//! Column names and order are part of the contract with reporting and
//! visualisation consumers, which index records by name.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One committed hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub hour_index: usize,
    pub load_kw: f64,
    pub solar_kw: f64,
    pub grid_import_kw: f64,
    pub battery_soc_kwh: f64,
    pub battery_charge_kw: f64,
    pub battery_discharge_kw: f64,
    pub reactive_kvar: f64,
    pub price_per_kwh: f64,
    pub override_triggered: bool,
    pub system_demand_mw: f64,
}

/// Aggregate figures over a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub hours: usize,
    pub override_hours: usize,
    pub energy_cost: f64,
    pub grid_import_kwh: f64,
    pub peak_import_kw: f64,
    pub battery_throughput_kwh: f64,
    /// Mean discharge over override hours, the peak reduction delivered (kW)
    pub override_discharge_kw: f64,
    pub final_soc_kwh: Option<f64>,
}

/// Append-only log of committed actions, owned by the control loop.
#[derive(Debug, Clone, Serialize)]
pub struct ActionLog {
    run_id: Uuid,
    records: Vec<ActionRecord>,
}

impl ActionLog {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            records: Vec::new(),
        }
    }

    pub fn with_capacity(run_id: Uuid, hours: usize) -> Self {
        Self {
            run_id,
            records: Vec::with_capacity(hours),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub(crate) fn append(&mut self, record: ActionRecord) {
        debug_assert_eq!(record.hour_index, self.records.len());
        self.records.push(record);
    }

    pub fn records(&self) -> &[ActionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&ActionRecord> {
        self.records.last()
    }

    pub fn summary(&self) -> RunSummary {
        let override_hours = self.records.iter().filter(|r| r.override_triggered).count();
        let override_discharge_kwh: f64 = self
            .records
            .iter()
            .filter(|r| r.override_triggered)
            .map(|r| r.battery_discharge_kw)
            .sum();
        RunSummary {
            hours: self.records.len(),
            override_hours,
            energy_cost: self.records.iter().map(|r| r.grid_import_kw * r.price_per_kwh).sum(),
            grid_import_kwh: self.records.iter().map(|r| r.grid_import_kw).sum(),
            peak_import_kw: self
                .records
                .iter()
                .map(|r| OrderedFloat(r.grid_import_kw))
                .max()
                .map_or(0.0, |peak| peak.0),
            battery_throughput_kwh: self
                .records
                .iter()
                .map(|r| r.battery_charge_kw + r.battery_discharge_kw)
                .sum(),
            override_discharge_kw: if override_hours == 0 {
                0.0
            } else {
                override_discharge_kwh / override_hours as f64
            },
            final_soc_kwh: self.records.last().map(|r| r.battery_soc_kwh),
        }
    }

    /// Writes the log as CSV, one header row then one row per committed hour.
    pub fn write_csv(&self, writer: impl Write) -> io::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for record in &self.records {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn export_csv(&self, path: &Path) -> io::Result<()> {
        let file = File::create(path)?;
        self.write_csv(io::BufWriter::new(file))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
