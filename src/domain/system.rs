use serde::{Deserialize, Serialize};
use validator::Validate;

/// Physical and economic parameters of the battery and inverter.
///
/// Built once from configuration and shared read-only between the control loop
/// and the optimizer for the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SystemSpecification {
    /// Usable battery capacity (kWh)
    #[validate(range(exclusive_min = 0.0))]
    pub battery_capacity_kwh: f64,
    /// Maximum charging power (kW)
    #[validate(range(min = 0.0))]
    pub max_charge_kw: f64,
    /// Maximum discharging power (kW)
    #[validate(range(min = 0.0))]
    pub max_discharge_kw: f64,
    /// Fraction of charging energy stored (0-1]
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub charge_efficiency: f64,
    /// Fraction of discharged energy delivered to the bus (0-1]
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub discharge_efficiency: f64,
    /// Wear cost per kWh charged or discharged (currency/kWh)
    #[validate(range(min = 0.0))]
    pub degradation_cost_per_kwh: f64,
    /// Inverter apparent power rating (kVA)
    #[validate(range(exclusive_min = 0.0))]
    pub inverter_kva: f64,
}

impl SystemSpecification {
    /// Largest active power the battery can move in either direction.
    pub fn max_battery_power_kw(&self) -> f64 {
        self.max_charge_kw.max(self.max_discharge_kw)
    }

    /// Whether `soc_kwh` is a physically reachable state of charge.
    pub fn accepts_soc(&self, soc_kwh: f64) -> bool {
        soc_kwh.is_finite() && (0.0..=self.battery_capacity_kwh).contains(&soc_kwh)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::SystemSpecification;

    pub fn spec(capacity_kwh: f64, max_power_kw: f64) -> SystemSpecification {
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_specification_passes() {
        let spec = fixtures::spec(1000.0, 250.0);
        assert!(spec.validate().is_ok());
        assert_eq!(spec.max_battery_power_kw(), 250.0);
    }

    #[test]
    fn test_efficiency_above_one_rejected() {
        let mut spec = fixtures::spec(1000.0, 250.0);
        spec.charge_efficiency = 1.2;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let spec = fixtures::spec(0.0, 250.0);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_soc_bounds() {
        let spec = fixtures::spec(500.0, 100.0);
        assert!(spec.accepts_soc(0.0));
        assert!(spec.accepts_soc(500.0));
        assert!(!spec.accepts_soc(-0.1));
        assert!(!spec.accepts_soc(500.1));
        assert!(!spec.accepts_soc(f64::NAN));
    }
}
