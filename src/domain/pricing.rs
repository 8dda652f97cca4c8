use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TariffError {
    #[error("TOU band {start}..{end} is outside 0..24 or empty")]
    InvalidBand { start: u32, end: u32 },
    #[error("Tariff price for {0} is not finite")]
    NonFinitePrice(TariffTier),
}

/// Time-of-use tariff tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TariffTier {
    OffPeak,
    MidPeak,
    OnPeak,
}

/// Hour band `[start_hour, end_hour)` billed at `tier`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouBand {
    pub tier: TariffTier,
    pub start_hour: u32,
    pub end_hour: u32,
}

impl TouBand {
    pub const fn new(tier: TariffTier, start_hour: u32, end_hour: u32) -> Self {
        Self {
            tier,
            start_hour,
            end_hour,
        }
    }

    /// Ontario-style summer bands: mid-peak mornings and evenings, on-peak midday.
    pub fn default_bands() -> Vec<TouBand> {
        vec![
            TouBand::new(TariffTier::MidPeak, 7, 11),
            TouBand::new(TariffTier::OnPeak, 11, 17),
            TouBand::new(TariffTier::MidPeak, 17, 19),
        ]
    }
}

/// Hour-of-day to tariff lookup. Hours not covered by any band are off-peak.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSchedule {
    tiers: [TariffTier; 24],
    off_peak: f64,
    mid_peak: f64,
    on_peak: f64,
}

impl PriceSchedule {
    pub fn new(off_peak: f64, mid_peak: f64, on_peak: f64, bands: &[TouBand]) -> Result<Self, TariffError> {
        for (tier, price) in [
            (TariffTier::OffPeak, off_peak),
            (TariffTier::MidPeak, mid_peak),
            (TariffTier::OnPeak, on_peak),
        ] {
            if !price.is_finite() {
                return Err(TariffError::NonFinitePrice(tier));
            }
        }

        let mut tiers = [TariffTier::OffPeak; 24];
        for band in bands {
            if band.start_hour >= band.end_hour || band.end_hour > 24 {
                return Err(TariffError::InvalidBand {
                    start: band.start_hour,
                    end: band.end_hour,
                });
            }
            for hour in band.start_hour..band.end_hour {
                tiers[hour as usize] = band.tier;
            }
        }

        Ok(Self {
            tiers,
            off_peak,
            mid_peak,
            on_peak,
        })
    }

    /// Same price for every hour of the day.
    pub fn flat(price: f64) -> Self {
        Self {
            tiers: [TariffTier::OffPeak; 24],
            off_peak: price,
            mid_peak: price,
            on_peak: price,
        }
    }

    /// Tier in effect at `hour` (taken modulo 24).
    pub fn tier_at(&self, hour: usize) -> TariffTier {
        self.tiers[hour % 24]
    }

    /// Energy price (currency/kWh) at `hour` (taken modulo 24).
    pub fn price_at(&self, hour: usize) -> f64 {
        match self.tier_at(hour) {
            TariffTier::OffPeak => self.off_peak,
            TariffTier::MidPeak => self.mid_peak,
            TariffTier::OnPeak => self.on_peak,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ontario() -> PriceSchedule {
        PriceSchedule::new(7.4, 10.2, 15.1, &TouBand::default_bands()).unwrap()
    }

    #[rstest]
    #[case(0, TariffTier::OffPeak)]
    #[case(6, TariffTier::OffPeak)]
    #[case(7, TariffTier::MidPeak)]
    #[case(10, TariffTier::MidPeak)]
    #[case(11, TariffTier::OnPeak)]
    #[case(16, TariffTier::OnPeak)]
    #[case(17, TariffTier::MidPeak)]
    #[case(19, TariffTier::OffPeak)]
    #[case(23, TariffTier::OffPeak)]
    fn test_default_bands(#[case] hour: usize, #[case] tier: TariffTier) {
        assert_eq!(ontario().tier_at(hour), tier);
    }

    #[test]
    fn test_hour_wraps_around_day() {
        let prices = ontario();
        assert_eq!(prices.price_at(24 + 12), 15.1);
        assert_eq!(prices.price_at(48 + 3), 7.4);
    }

    #[test]
    fn test_invalid_band_rejected() {
        let bands = [TouBand::new(TariffTier::OnPeak, 20, 25)];
        assert_eq!(
            PriceSchedule::new(1.0, 2.0, 3.0, &bands),
            Err(TariffError::InvalidBand { start: 20, end: 25 })
        );
    }

    #[test]
    fn test_tier_parses_from_config_string() {
        assert_eq!("on_peak".parse::<TariffTier>().unwrap(), TariffTier::OnPeak);
        assert_eq!(TariffTier::MidPeak.to_string(), "mid_peak");
    }

    #[test]
    fn test_flat_schedule() {
        let prices = PriceSchedule::flat(10.0);
        assert!((0..24).all(|h| prices.price_at(h) == 10.0));
    }
}
