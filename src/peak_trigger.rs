//! ICI / Global Adjustment peak avoidance trigger.
//!
//! Class A customers are billed on their share of the system-wide demand
//! during the top peak hours of the year. When the system demand forecast for
//! the current hour comes close to the smallest of the historical peaks, the
//! controller stops minimising energy cost and discharges instead.

use ordered_float::OrderedFloat;
use serde::Serialize;
use thiserror::Error;

/// Avoided Global Adjustment charge per MW of peak reduction per year.
pub const SAVINGS_PER_MW: f64 = 500_000.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PeakTriggerError {
    #[error("Historical peak list is empty")]
    NoHistoricalPeaks,
    #[error("Historical peak {0} MW is not a finite positive value")]
    InvalidPeak(f64),
    #[error("Threshold factor {0} must be a finite positive value")]
    InvalidFactor(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeakTriggerMonitor {
    critical_peak_mw: f64,
    threshold_mw: f64,
}

impl PeakTriggerMonitor {
    /// Threshold is the smallest historical peak scaled by `threshold_factor`.
    pub fn new(historical_peaks_mw: &[f64], threshold_factor: f64) -> Result<Self, PeakTriggerError> {
        if !threshold_factor.is_finite() || threshold_factor <= 0.0 {
            return Err(PeakTriggerError::InvalidFactor(threshold_factor));
        }
        if let Some(bad) = historical_peaks_mw.iter().find(|p| !p.is_finite() || **p <= 0.0) {
            return Err(PeakTriggerError::InvalidPeak(*bad));
        }
        let critical_peak_mw = historical_peaks_mw
            .iter()
            .copied()
            .map(OrderedFloat)
            .min()
            .ok_or(PeakTriggerError::NoHistoricalPeaks)?
            .0;

        Ok(Self {
            critical_peak_mw,
            threshold_mw: critical_peak_mw * threshold_factor,
        })
    }

    pub fn critical_peak_mw(&self) -> f64 {
        self.critical_peak_mw
    }

    pub fn threshold_mw(&self) -> f64 {
        self.threshold_mw
    }

    /// True when the cost optimum must give way to peak avoidance.
    pub fn check_trigger(&self, demand_forecast_mw: f64) -> bool {
        demand_forecast_mw > self.threshold_mw
    }
}

/// Annual avoided Global Adjustment cost for a given peak reduction.
pub fn estimate_annual_savings(peak_reduction_kw: f64) -> f64 {
    peak_reduction_kw / 1000.0 * SAVINGS_PER_MW
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ontario() -> PeakTriggerMonitor {
        PeakTriggerMonitor::new(&[18_000.0, 17_500.0, 19_000.0], 0.95).unwrap()
    }

    #[test]
    fn test_threshold_from_smallest_peak() {
        let monitor = ontario();
        assert_eq!(monitor.critical_peak_mw(), 17_500.0);
        assert!((monitor.threshold_mw() - 16_625.0).abs() < 1e-9);
    }

    #[rstest]
    #[case(16_700.0, true)]
    #[case(16_000.0, false)]
    #[case(25_000.0, true)]
    fn test_check_trigger(#[case] demand_mw: f64, #[case] expected: bool) {
        assert_eq!(ontario().check_trigger(demand_mw), expected);
    }

    #[test]
    fn test_empty_history_rejected() {
        assert_eq!(PeakTriggerMonitor::new(&[], 0.95), Err(PeakTriggerError::NoHistoricalPeaks));
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        assert!(matches!(
            PeakTriggerMonitor::new(&[18_000.0, f64::NAN], 0.95),
            Err(PeakTriggerError::InvalidPeak(p)) if p.is_nan()
        ));
        assert_eq!(
            PeakTriggerMonitor::new(&[-5.0], 0.95),
            Err(PeakTriggerError::InvalidPeak(-5.0))
        );
        assert_eq!(
            PeakTriggerMonitor::new(&[18_000.0], 0.0),
            Err(PeakTriggerError::InvalidFactor(0.0))
        );
    }

    #[test]
    fn test_savings_estimate() {
        assert_eq!(estimate_annual_savings(1000.0), 500_000.0);
        assert_eq!(estimate_annual_savings(250.0), 125_000.0);
    }
}
