use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

use super::SystemSpecification;

/// Battery-specific errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BatteryError {
    #[error("State of charge {soc_kwh} kWh outside 0..={capacity_kwh} kWh")]
    SocOutOfBounds { soc_kwh: f64, capacity_kwh: f64 },
}

/// Battery operating mode for one hour of a plan
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BatteryMode {
    Charging,
    Discharging,
    Idle,
}

impl BatteryMode {
    /// Classify an hour by its charge and discharge power, ignoring solver noise
    /// below `tolerance_kw`.
    pub fn from_powers(charge_kw: f64, discharge_kw: f64, tolerance_kw: f64) -> Self {
        if charge_kw > tolerance_kw {
            BatteryMode::Charging
        } else if discharge_kw > tolerance_kw {
            BatteryMode::Discharging
        } else {
            BatteryMode::Idle
        }
    }
}

/// State of charge carried from one control-loop iteration to the next.
///
/// The model is assumed to track the physical battery exactly, so the next
/// state is the optimizer's hour-0 SOC rather than a sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryState {
    soc_kwh: f64,
}

impl BatteryState {
    pub fn new(soc_kwh: f64, spec: &SystemSpecification) -> Result<Self, BatteryError> {
        if !spec.accepts_soc(soc_kwh) {
            return Err(BatteryError::SocOutOfBounds {
                soc_kwh,
                capacity_kwh: spec.battery_capacity_kwh,
            });
        }
        Ok(Self { soc_kwh })
    }

    /// Starting state at `fraction` of usable capacity.
    pub fn at_fraction(fraction: f64, spec: &SystemSpecification) -> Result<Self, BatteryError> {
        Self::new(spec.battery_capacity_kwh * fraction, spec)
    }

    pub fn soc_kwh(&self) -> f64 {
        self.soc_kwh
    }

    pub fn soc_percent(&self, spec: &SystemSpecification) -> f64 {
        self.soc_kwh / spec.battery_capacity_kwh * 100.0
    }

    /// Move to the SOC the committed hour ends at. Values within solver
    /// tolerance of the bounds are clamped back onto them.
    pub fn commit(&mut self, next_soc_kwh: f64, spec: &SystemSpecification, tolerance_kwh: f64) -> Result<(), BatteryError> {
        let capacity = spec.battery_capacity_kwh;
        let clamped = if next_soc_kwh < 0.0 && next_soc_kwh >= -tolerance_kwh {
            0.0
        } else if next_soc_kwh > capacity && next_soc_kwh <= capacity + tolerance_kwh {
            capacity
        } else {
            next_soc_kwh
        };
        *self = Self::new(clamped, spec)?;
        Ok(())
    }
}
