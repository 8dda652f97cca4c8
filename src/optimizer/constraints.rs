use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{DispatchError, DispatchRequest};
use crate::domain::forecast::check_finite;
use crate::domain::{ForecastError, SystemSpecification};

/// Exclusivity big-M relative to the largest battery power limit.
pub const BIG_M_FACTOR: f64 = 10.0;

/// Peak-avoidance override applied at the start of the horizon while the
/// trigger is active.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct OverridePolicy {
    /// Number of leading horizon hours the override binds
    #[validate(range(min = 1))]
    pub window_hours: usize,
    /// Minimum discharge as a fraction of max discharge power
    #[validate(range(min = 0.0, max = 1.0))]
    pub min_discharge_fraction: f64,
    /// Grid import ceiling while the override binds (kW)
    #[validate(range(min = 0.0))]
    pub max_grid_import_kw: f64,
}

impl Default for OverridePolicy {
    fn default() -> Self {
        Self {
            window_hours: 6,
            min_discharge_fraction: 0.95,
            max_grid_import_kw: 10.0,
        }
    }
}

/// Tunables of the dispatch formulation that are not physical properties.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct OptimizerSettings {
    /// Ancillary-service revenue per kVAR of reactive injection per hour
    #[validate(range(min = 0.0))]
    pub reactive_revenue_per_kvarh: f64,
    #[validate(nested)]
    pub override_policy: OverridePolicy,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            reactive_revenue_per_kvarh: 0.05,
            override_policy: OverridePolicy::default(),
        }
    }
}

/// Rejects requests the formulation cannot represent, before any model is built.
pub fn validate_request(request: &DispatchRequest, spec: &SystemSpecification) -> Result<(), DispatchError> {
    let horizon = request.horizon_hours;
    if horizon == 0 {
        return Err(ForecastError::Empty.into());
    }
    if request.load_kw.len() != request.solar_kw.len() {
        return Err(ForecastError::LengthMismatch {
            load: request.load_kw.len(),
            solar: request.solar_kw.len(),
        }
        .into());
    }
    if request.load_kw.len() < horizon {
        return Err(ForecastError::TooShort {
            available: request.load_kw.len(),
            required: horizon,
        }
        .into());
    }
    check_finite("load", &request.load_kw[..horizon])?;
    check_finite("solar", &request.solar_kw[..horizon])?;

    if !spec.accepts_soc(request.initial_soc_kwh) {
        return Err(DispatchError::InvalidBatteryState {
            soc_kwh: request.initial_soc_kwh,
            capacity_kwh: spec.battery_capacity_kwh,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::system::fixtures;

    fn request(load: Vec<f64>, solar: Vec<f64>, horizon: usize, soc: f64) -> DispatchRequest {
        DispatchRequest {
            load_kw: load,
            solar_kw: solar,
            initial_soc_kwh: soc,
            horizon_hours: horizon,
            override_active: false,
            start_hour_of_day: 0,
        }
    }

    #[test]
    fn test_default_override_policy() {
        let policy = OverridePolicy::default();
        assert_eq!(policy.window_hours, 6);
        assert_eq!(policy.min_discharge_fraction, 0.95);
        assert_eq!(policy.max_grid_import_kw, 10.0);
        assert!(OptimizerSettings::default().validate().is_ok());
    }

    #[test]
    fn test_zero_window_invalid() {
        let mut settings = OptimizerSettings::default();
        settings.override_policy.window_hours = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_mismatched_forecast_rejected() {
        let spec = fixtures::spec(1000.0, 250.0);
        let err = validate_request(&request(vec![1.0; 3], vec![0.0; 2], 2, 500.0), &spec).unwrap_err();
        assert_eq!(
            err,
            DispatchError::MalformedForecast(ForecastError::LengthMismatch { load: 3, solar: 2 })
        );
    }

    #[test]
    fn test_short_forecast_rejected() {
        let spec = fixtures::spec(1000.0, 250.0);
        let err = validate_request(&request(vec![1.0; 3], vec![0.0; 3], 4, 500.0), &spec).unwrap_err();
        assert_eq!(
            err,
            DispatchError::MalformedForecast(ForecastError::TooShort {
                available: 3,
                required: 4
            })
        );
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let spec = fixtures::spec(1000.0, 250.0);
        assert!(validate_request(&request(vec![], vec![], 0, 500.0), &spec).is_err());
    }

    #[test]
    fn test_soc_outside_capacity_rejected() {
        let spec = fixtures::spec(1000.0, 250.0);
        let err = validate_request(&request(vec![1.0; 2], vec![0.0; 2], 2, 1200.0), &spec).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidBatteryState { .. }));
    }

    #[test]
    fn test_longer_forecast_accepted() {
        let spec = fixtures::spec(1000.0, 250.0);
        assert!(validate_request(&request(vec![1.0; 5], vec![0.0; 5], 3, 0.0), &spec).is_ok());
    }
}
