use anyhow::Result;
use async_trait::async_trait;
use chrono::Timelike;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::{ForecastWindow, WeatherSample};

/// Maps a window of weather to site load and solar production, one value per hour.
#[async_trait]
pub trait LoadSolarForecaster: Send + Sync {
    async fn predict(&self, weather: &[WeatherSample]) -> Result<ForecastWindow>;
}

/// Closed-form stand-in for a trained load/solar model.
///
/// Load follows a daily sine swing plus a cooling term proportional to
/// temperature. Solar is a half-sine between sunrise and sunset scaled by
/// clear-sky fraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct WeatherDrivenForecaster {
    pub base_load_kw: f64,
    pub daily_swing_kw: f64,
    /// Extra load per degree Celsius (kW/°C)
    pub temp_coefficient_kw: f64,
    #[validate(range(min = 0.0))]
    pub solar_peak_kw: f64,
    #[validate(range(min = 0.0, max = 24.0))]
    pub sunrise_hour: f64,
    #[validate(range(min = 0.0, max = 24.0))]
    pub sunset_hour: f64,
}

impl Default for WeatherDrivenForecaster {
    fn default() -> Self {
        Self {
            base_load_kw: 4000.0,
            daily_swing_kw: 2000.0,
            temp_coefficient_kw: 200.0,
            solar_peak_kw: 2000.0,
            sunrise_hour: 6.0,
            sunset_hour: 20.0,
        }
    }
}

impl WeatherDrivenForecaster {
    pub fn load_kw(&self, sample: &WeatherSample) -> f64 {
        let hour = f64::from(sample.timestamp.hour());
        (self.base_load_kw + self.daily_swing_kw * ((hour - 6.0) / 4.0).sin() + self.temp_coefficient_kw * sample.temp_c)
            .max(0.0)
    }

    pub fn solar_kw(&self, sample: &WeatherSample) -> f64 {
        let hour = f64::from(sample.timestamp.hour());
        if hour < self.sunrise_hour || hour > self.sunset_hour {
            return 0.0;
        }
        let day_len = (self.sunset_hour - self.sunrise_hour).max(0.01);
        let x = (hour - self.sunrise_hour) / day_len;
        let clear_sky = (1.0 - sample.cloudiness).clamp(0.0, 1.0);
        (std::f64::consts::PI * x).sin().max(0.0) * self.solar_peak_kw * clear_sky
    }
}

#[async_trait]
impl LoadSolarForecaster for WeatherDrivenForecaster {
    async fn predict(&self, weather: &[WeatherSample]) -> Result<ForecastWindow> {
        let load = weather.iter().map(|w| self.load_kw(w)).collect();
        let solar = weather.iter().map(|w| self.solar_kw(w)).collect();
        Ok(ForecastWindow::new(load, solar)?)
    }
}
