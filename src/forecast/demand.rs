use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Province-wide demand forecast (MW) for a simulated hour.
#[async_trait]
pub trait SystemDemandForecaster: Send + Sync {
    async fn demand_mw(&self, hour_index: usize, hour_of_day: usize) -> Result<f64>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SyntheticDemandConfig {
    #[validate(range(min = 0.0))]
    pub base_mw: f64,
    pub daily_swing_mw: f64,
    /// Mean extra demand between 12:00 and 18:00 (heatwave afternoon)
    pub afternoon_spike_mw: f64,
    #[validate(range(min = 0.0))]
    pub afternoon_spike_std_mw: f64,
    #[validate(range(min = 0.0))]
    pub noise_std_mw: f64,
    /// Random seed for reproducibility (None = random)
    pub random_seed: Option<u64>,
}

impl Default for SyntheticDemandConfig {
    fn default() -> Self {
        Self {
            base_mw: 15_000.0,
            daily_swing_mw: 5_000.0,
            afternoon_spike_mw: 7_000.0,
            afternoon_spike_std_mw: 1_000.0,
            noise_std_mw: 500.0,
            random_seed: None,
        }
    }
}

/// Heatwave-shaped system demand with a noisy afternoon peak.
pub struct SyntheticSystemDemand {
    config: SyntheticDemandConfig,
    spike: Normal<f64>,
    noise: Normal<f64>,
    rng: Mutex<StdRng>,
}

impl SyntheticSystemDemand {
    pub fn new(config: SyntheticDemandConfig) -> Result<Self> {
        config.validate().context("invalid synthetic demand config")?;
        let spike = Normal::new(config.afternoon_spike_mw, config.afternoon_spike_std_mw)
            .context("invalid afternoon spike distribution")?;
        let noise = Normal::new(0.0, config.noise_std_mw).context("invalid demand noise distribution")?;
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            config,
            spike,
            noise,
            rng: Mutex::new(rng),
        })
    }

    fn sample(&self, hour_of_day: usize) -> f64 {
        let hour = hour_of_day % 24;
        let mut demand = self.config.base_mw + self.config.daily_swing_mw * ((hour as f64 - 8.0) / 4.0).sin();
        let mut rng = self.rng.lock();
        if (12..=18).contains(&hour) {
            demand += self.spike.sample(&mut *rng);
        }
        (demand + self.noise.sample(&mut *rng)).max(0.0)
    }
}

#[async_trait]
impl SystemDemandForecaster for SyntheticSystemDemand {
    async fn demand_mw(&self, _hour_index: usize, hour_of_day: usize) -> Result<f64> {
        Ok(self.sample(hour_of_day))
    }
}
