//! Run parameters and their defaults.

use std::time::Duration;

use rand::Rng;

use crate::error::ConfigError;

/// Inclusive range a truck draws each leg's travel time from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TravelTiming {
    pub min: Duration,
    pub max: Duration,
}

impl TravelTiming {
    #[cfg(test)]
    pub fn fixed(duration: Duration) -> Self {
        Self {
            min: duration,
            max: duration,
        }
    }

    /// Draw one leg's travel time.
    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let min = u64::try_from(self.min.as_micros()).unwrap_or(u64::MAX);
        let max = u64::try_from(self.max.as_micros()).unwrap_or(u64::MAX);
        Duration::from_micros(rand::thread_rng().gen_range(min..=max))
    }
}

impl Default for TravelTiming {
    fn default() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::from_millis(200),
        }
    }
}

/// Per-block handling time at a warehouse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServiceTiming {
    pub load_per_block: Duration,
    pub unload_per_block: Duration,
}

impl ServiceTiming {
    #[cfg(test)]
    pub const INSTANT: Self = Self {
        load_per_block: Duration::ZERO,
        unload_per_block: Duration::ZERO,
    };

    pub fn load(&self, blocks: usize) -> Duration {
        self.load_per_block.saturating_mul(u32::try_from(blocks).unwrap_or(u32::MAX))
    }

    pub fn unload(&self, blocks: usize) -> Duration {
        self.unload_per_block.saturating_mul(u32::try_from(blocks).unwrap_or(u32::MAX))
    }
}

impl Default for ServiceTiming {
    // Unloading is ten times slower per block than loading.
    fn default() -> Self {
        Self {
            load_per_block: Duration::from_micros(10),
            unload_per_block: Duration::from_micros(100),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimConfig {
    pub trucks: usize,
    pub capacity: usize,
    pub blocks: usize,
    /// Times each truck runs the source -> destination route.
    pub laps: usize,
    pub travel: TravelTiming,
    pub service: ServiceTiming,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            trucks: 10,
            capacity: 1000,
            blocks: 10_000,
            laps: 1,
            travel: TravelTiming::default(),
            service: ServiceTiming::default(),
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trucks == 0 {
            return Err(ConfigError::NoTrucks);
        }
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.laps == 0 {
            return Err(ConfigError::NoLaps);
        }
        if self.travel.min > self.travel.max {
            return Err(ConfigError::InvertedTravel {
                min_ms: u64::try_from(self.travel.min.as_millis()).unwrap_or(u64::MAX),
                max_ms: u64::try_from(self.travel.max.as_millis()).unwrap_or(u64::MAX),
            });
        }
        // An empty pickup at the source would send that truck to load from
        // the destination's stock. Every pickup but the last must come up full.
        let pickups = self.trucks.saturating_mul(self.laps);
        if self.blocks <= (pickups - 1).saturating_mul(self.capacity) {
            return Err(ConfigError::IdleTrucks {
                blocks: self.blocks,
                pickups,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Blocks the fleet can move in one run.
    pub fn fleet_throughput(&self) -> usize {
        self.trucks
            .saturating_mul(self.capacity)
            .saturating_mul(self.laps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_scenario() {
        let config = SimConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.fleet_throughput(), config.blocks);
    }

    #[test]
    fn rejects_degenerate_fleets() {
        let mut config = SimConfig {
            trucks: 0,
            ..SimConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoTrucks));
        config.trucks = 1;
        config.capacity = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroCapacity));
        config.capacity = 1;
        config.laps = 0;
        assert_eq!(config.validate(), Err(ConfigError::NoLaps));
    }

    #[test]
    fn rejects_fleets_that_would_pick_up_nothing() {
        let mut config = SimConfig {
            trucks: 3,
            capacity: 10,
            blocks: 15,
            ..SimConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::IdleTrucks {
                blocks: 15,
                pickups: 3,
                capacity: 10,
            })
        );
        // A short last pickup is fine, and so is a fleet too small to finish.
        config.blocks = 21;
        assert_eq!(config.validate(), Ok(()));
        config.blocks = 500;
        assert_eq!(config.validate(), Ok(()));
        config.laps = 2;
        config.blocks = 50;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::IdleTrucks { pickups: 6, .. })
        ));
    }

    #[test]
    fn rejects_inverted_travel_range() {
        let config = SimConfig {
            travel: TravelTiming {
                min: Duration::from_millis(50),
                max: Duration::from_millis(10),
            },
            ..SimConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedTravel { min_ms: 50, max_ms: 10 })
        ));
    }

    #[test]
    fn travel_samples_stay_in_range() {
        let travel = TravelTiming {
            min: Duration::from_millis(3),
            max: Duration::from_millis(7),
        };
        for _ in 0..200 {
            let leg = travel.sample();
            assert!(leg >= travel.min && leg <= travel.max);
        }
        let fixed = TravelTiming::fixed(Duration::from_millis(4));
        assert_eq!(fixed.sample(), Duration::from_millis(4));
    }

    #[test]
    fn huge_travel_range_saturates_instead_of_wrapping() {
        let travel = TravelTiming {
            min: Duration::from_secs(u64::MAX / 2),
            max: Duration::from_secs(u64::MAX),
        };
        // Both bounds exceed u64 microseconds and clamp to the same value.
        assert_eq!(travel.sample(), Duration::from_micros(u64::MAX));

        let travel = TravelTiming {
            min: Duration::from_secs(1),
            max: Duration::from_secs(u64::MAX),
        };
        for _ in 0..50 {
            assert!(travel.sample() >= travel.min);
        }
    }

    #[test]
    fn service_time_scales_with_blocks() {
        let timing = ServiceTiming::default();
        assert_eq!(timing.load(3), Duration::from_micros(30));
        assert_eq!(timing.unload(3), Duration::from_micros(300));
        assert_eq!(ServiceTiming::INSTANT.unload(1000), Duration::ZERO);
    }
}
