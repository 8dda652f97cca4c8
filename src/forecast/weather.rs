//! Synthetic hourly weather for simulation runs.
//!
//! Produces a hot summer stretch: temperature and humidity follow `cycles`
//! sine periods over the run with a slow warming drift; cloud cover changes
//! once per day.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::WeatherSample;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticWeather {
    pub base_temp_c: f64,
    pub temp_amplitude_c: f64,
    /// Warming from the first to the last hour of the run
    pub temp_drift_c: f64,
    pub base_humidity_percent: f64,
    pub humidity_amplitude_percent: f64,
    /// Number of sine periods over the run
    pub cycles: f64,
}

impl Default for SyntheticWeather {
    fn default() -> Self {
        Self {
            base_temp_c: 20.0,
            temp_amplitude_c: 10.0,
            temp_drift_c: 5.0,
            base_humidity_percent: 50.0,
            humidity_amplitude_percent: 20.0,
            cycles: 7.0,
        }
    }
}

impl SyntheticWeather {
    pub fn generate(&self, start: NaiveDateTime, hours: usize) -> Vec<WeatherSample> {
        let days = hours.div_ceil(24);
        (0..hours)
            .map(|i| {
                let progress = linspace_fraction(i, hours);
                let phase = (2.0 * std::f64::consts::PI * self.cycles * progress).sin();
                let day_phase = 2.0 * std::f64::consts::PI * self.cycles * linspace_fraction(i / 24, days);
                WeatherSample {
                    timestamp: start + Duration::hours(i as i64),
                    temp_c: self.base_temp_c + self.temp_amplitude_c * phase + self.temp_drift_c * progress,
                    humidity_percent: self.base_humidity_percent + self.humidity_amplitude_percent * phase,
                    cloudiness: day_phase.sin().abs(),
                }
            })
            .collect()
    }
}

/// Position of `i` in `0..n` mapped onto `[0, 1]`, endpoints included.
fn linspace_fraction(i: usize, n: usize) -> f64 {
    if n <= 1 {
        0.0
    } else {
        i as f64 / (n - 1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 7, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn test_generates_hourly_samples() {
        let weather = SyntheticWeather::default().generate(start(), 168);
        assert_eq!(weather.len(), 168);
        assert_eq!(weather[25].timestamp.hour(), 1);
        assert_eq!(weather[167].timestamp, start() + Duration::hours(167));
    }

    #[test]
    fn test_drift_and_bounds() {
        let gen = SyntheticWeather::default();
        let weather = gen.generate(start(), 168);
        assert!((weather[0].temp_c - 20.0).abs() < 1e-9);
        assert!((weather[167].temp_c - 25.0).abs() < 1e-6);
        assert!(weather.iter().all(|w| (0.0..=1.0).contains(&w.cloudiness)));
        assert!(weather.iter().all(|w| w.temp_c >= 10.0 && w.temp_c <= 35.0));
    }

    #[test]
    fn test_cloudiness_constant_within_day() {
        let weather = SyntheticWeather::default().generate(start(), 48);
        assert!(weather[24..48].iter().all(|w| w.cloudiness == weather[24].cloudiness));
    }

    #[test]
    fn test_single_hour_run() {
        let weather = SyntheticWeather::default().generate(start(), 1);
        assert_eq!(weather.len(), 1);
    }
}
