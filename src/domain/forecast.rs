use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForecastError {
    #[error("Forecast window is empty")]
    Empty,
    #[error("Load forecast has {load} hours but solar forecast has {solar}")]
    LengthMismatch { load: usize, solar: usize },
    #[error("Forecast covers {available} hours, horizon needs {required}")]
    TooShort { available: usize, required: usize },
    #[error("Non-finite {series} forecast value at hour {hour}")]
    NonFinite { series: &'static str, hour: usize },
}

/// One hour of weather observations or forecast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    pub timestamp: NaiveDateTime,
    pub temp_c: f64,
    pub humidity_percent: f64,
    /// Cloud cover fraction (0 = clear sky, 1 = overcast)
    pub cloudiness: f64,
}

/// Load and solar forecast for consecutive hours, starting at the current hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastWindow {
    load_kw: Vec<f64>,
    solar_kw: Vec<f64>,
}

impl ForecastWindow {
    pub fn new(load_kw: Vec<f64>, solar_kw: Vec<f64>) -> Result<Self, ForecastError> {
        if load_kw.len() != solar_kw.len() {
            return Err(ForecastError::LengthMismatch {
                load: load_kw.len(),
                solar: solar_kw.len(),
            });
        }
        if load_kw.is_empty() {
            return Err(ForecastError::Empty);
        }
        check_finite("load", &load_kw)?;
        check_finite("solar", &solar_kw)?;
        Ok(Self { load_kw, solar_kw })
    }

    pub fn len(&self) -> usize {
        self.load_kw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.load_kw.is_empty()
    }

    pub fn into_parts(self) -> (Vec<f64>, Vec<f64>) {
        (self.load_kw, self.solar_kw)
    }
}

pub(crate) fn check_finite(series: &'static str, values: &[f64]) -> Result<(), ForecastError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(hour) => Err(ForecastError::NonFinite { series, hour }),
        None => Ok(()),
    }
}
