//! Pruning retention policy.
//!
//! A strategy name from configuration is resolved into concrete retention
//! parameters once at startup. Unknown names and unusable custom values are
//! reported to the caller, never replaced by a default.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use strata_core::{AppOptions, PruningError};

/// Option name of the strategy.
pub const FLAG_PRUNING: &str = "pruning";
/// Option name of the custom keep-recent count.
pub const FLAG_PRUNING_KEEP_RECENT: &str = "pruning-keep-recent";
/// Option name of the custom interval.
pub const FLAG_PRUNING_INTERVAL: &str = "pruning-interval";
/// Option name of the start height.
pub const FLAG_PRUNING_START_HEIGHT: &str = "pruning-start-height";

const DEFAULT_KEEP_RECENT: u64 = 362_880;
const DEFAULT_INTERVAL: u64 = 10;
const EVERYTHING_KEEP_RECENT: u64 = 2;
const EVERYTHING_INTERVAL: u64 = 10;

/// Named retention strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PruningStrategy {
    /// Keep a long window of recent versions.
    #[default]
    Default,
    /// Keep every version.
    Nothing,
    /// Keep only the last two versions.
    Everything,
    /// Operator-supplied window and interval.
    Custom,
}

impl PruningStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Nothing => "nothing",
            Self::Everything => "everything",
            Self::Custom => "custom",
        }
    }
}

impl FromStr for PruningStrategy {
    type Err = PruningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "nothing" => Ok(Self::Nothing),
            "everything" => Ok(Self::Everything),
            "custom" => Ok(Self::Custom),
            _ => Err(PruningError::UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for PruningStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved retention parameters handed to the storage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruningOptions {
    pub strategy: PruningStrategy,
    /// Number of recent versions kept besides the working set.
    pub keep_recent: u64,
    /// Heights between pruning passes. Zero disables pruning.
    pub interval: u64,
    /// First height at which pruning is tracked.
    pub start_height: u64,
}

impl Default for PruningOptions {
    fn default() -> Self {
        Self::from_strategy(PruningStrategy::Default)
    }
}

impl PruningOptions {
    /// Fixed parameters for a strategy. `Custom` starts at zero and must be
    /// filled in by the caller.
    pub fn from_strategy(strategy: PruningStrategy) -> Self {
        let (keep_recent, interval) = match strategy {
            PruningStrategy::Default => (DEFAULT_KEEP_RECENT, DEFAULT_INTERVAL),
            PruningStrategy::Everything => (EVERYTHING_KEEP_RECENT, EVERYTHING_INTERVAL),
            PruningStrategy::Nothing | PruningStrategy::Custom => (0, 0),
        };
        Self {
            strategy,
            keep_recent,
            interval,
            start_height: 0,
        }
    }

    /// Custom options with the given window and interval.
    pub fn custom(keep_recent: u64, interval: u64) -> Self {
        Self {
            strategy: PruningStrategy::Custom,
            keep_recent,
            interval,
            start_height: 0,
        }
    }

    /// Resolve a strategy name and its custom values.
    ///
    /// `keep_recent` and `interval` only apply to `custom`; `start_height` is
    /// attached for every strategy.
    pub fn resolve(
        strategy_name: &str,
        keep_recent: u64,
        interval: u64,
        start_height: u64,
    ) -> Result<Self, PruningError> {
        let strategy: PruningStrategy = strategy_name.parse()?;

        let mut options = match strategy {
            PruningStrategy::Custom => {
                let options = Self::custom(keep_recent, interval);
                options.validate()?;
                options
            }
            fixed => Self::from_strategy(fixed),
        };
        options.start_height = start_height;

        info!(
            "Resolved pruning strategy {}: keep_recent={} interval={} start_height={}",
            options.strategy, options.keep_recent, options.interval, options.start_height
        );
        Ok(options)
    }

    /// Resolve options from application configuration.
    ///
    /// An absent `pruning` option means `default`. Any value that is present,
    /// including an empty string, must name a strategy.
    pub fn from_app_options(opts: &dyn AppOptions) -> Result<Self, strata_core::Error> {
        let strategy = opts
            .get_string(FLAG_PRUNING)?
            .unwrap_or_else(|| PruningStrategy::Default.as_str().to_string());
        let keep_recent = opts.get_u64(FLAG_PRUNING_KEEP_RECENT)?;
        let interval = opts.get_u64(FLAG_PRUNING_INTERVAL)?;
        let start_height = opts.get_u64(FLAG_PRUNING_START_HEIGHT)?.unwrap_or(0);

        let options = Self::resolve(
            &strategy,
            keep_recent.unwrap_or(0),
            interval.unwrap_or(0),
            start_height,
        )?;

        if options.strategy != PruningStrategy::Custom
            && (keep_recent.is_some() || interval.is_some())
        {
            warn!(
                "Ignoring {} and {} for pruning strategy {}",
                FLAG_PRUNING_KEEP_RECENT, FLAG_PRUNING_INTERVAL, options.strategy
            );
        }
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), PruningError> {
        if self.strategy == PruningStrategy::Custom && self.interval == 0 {
            return Err(PruningError::InvalidOptions(
                "pruning interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The highest version that may be dropped after committing `height`.
    pub fn pruning_height(&self, height: u64) -> Option<u64> {
        if self.strategy == PruningStrategy::Nothing || self.interval == 0 {
            return None;
        }
        if height < self.start_height || height % self.interval != 0 {
            return None;
        }
        if height <= self.keep_recent {
            return None;
        }
        Some(height - self.keep_recent - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{ConfigValue, OptionMap};

    #[test]
    fn test_custom_zero_interval_is_rejected() {
        assert!(matches!(
            PruningOptions::resolve("CUSTOM", 0, 0, 0),
            Err(PruningError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_custom_values_are_kept() {
        let options = PruningOptions::resolve("custom", 100, 10, 0).unwrap();
        assert_eq!(options.strategy, PruningStrategy::Custom);
        assert_eq!(options.keep_recent, 100);
        assert_eq!(options.interval, 10);
        assert_eq!(options.start_height, 0);

        // keeping nothing besides the working set is allowed
        assert!(PruningOptions::resolve("custom", 0, 1, 0).is_ok());
    }

    #[test]
    fn test_unknown_strategy_names_input() {
        assert_eq!(
            PruningOptions::resolve("bogus", 0, 0, 0),
            Err(PruningError::UnknownStrategy("bogus".to_string()))
        );
    }

    #[test]
    fn test_fixed_strategies() {
        let default = PruningOptions::resolve("Default", 5, 5, 0).unwrap();
        assert_eq!((default.keep_recent, default.interval), (362_880, 10));
        assert_eq!(default, PruningOptions::default());

        let everything = PruningOptions::resolve("everything", 0, 0, 0).unwrap();
        assert_eq!((everything.keep_recent, everything.interval), (2, 10));

        let nothing = PruningOptions::resolve("NOTHING", 0, 0, 50).unwrap();
        assert_eq!((nothing.keep_recent, nothing.interval), (0, 0));
        assert_eq!(nothing.start_height, 50);
    }

    #[test]
    fn test_from_app_options() {
        let mut opts = OptionMap::new();
        assert_eq!(
            PruningOptions::from_app_options(&opts).unwrap(),
            PruningOptions::default()
        );

        opts.set(FLAG_PRUNING, "custom");
        opts.set(FLAG_PRUNING_KEEP_RECENT, ConfigValue::from(100u64));
        opts.set(FLAG_PRUNING_INTERVAL, "10");
        opts.set(FLAG_PRUNING_START_HEIGHT, ConfigValue::from(7u64));
        let options = PruningOptions::from_app_options(&opts).unwrap();
        assert_eq!(options, {
            let mut expected = PruningOptions::custom(100, 10);
            expected.start_height = 7;
            expected
        });

        opts.set(FLAG_PRUNING_INTERVAL, "ten");
        assert!(matches!(
            PruningOptions::from_app_options(&opts),
            Err(strata_core::Error::Config(_))
        ));

        opts.set(FLAG_PRUNING_INTERVAL, ConfigValue::from(0u64));
        assert!(matches!(
            PruningOptions::from_app_options(&opts),
            Err(strata_core::Error::Pruning(PruningError::InvalidOptions(_)))
        ));
    }

    #[test]
    fn test_present_strategy_is_never_defaulted() {
        for given in ["", "   ", " custom "] {
            let mut opts = OptionMap::new();
            opts.set(FLAG_PRUNING, given);
            opts.set(FLAG_PRUNING_INTERVAL, ConfigValue::from(10u64));
            match PruningOptions::from_app_options(&opts) {
                Err(strata_core::Error::Pruning(PruningError::UnknownStrategy(name))) => {
                    assert_eq!(name, given)
                }
                other => panic!("{:?} resolved to {:?}", given, other),
            }
        }

        let mut opts = OptionMap::new();
        opts.set(FLAG_PRUNING, ConfigValue::Null);
        assert_eq!(
            PruningOptions::from_app_options(&opts).unwrap(),
            PruningOptions::default()
        );
    }

    #[test]
    fn test_pruning_height() {
        let everything = PruningOptions::from_strategy(PruningStrategy::Everything);
        assert_eq!(everything.pruning_height(10), Some(7));
        assert_eq!(everything.pruning_height(11), None);
        assert_eq!(everything.pruning_height(0), None);

        let nothing = PruningOptions::from_strategy(PruningStrategy::Nothing);
        assert_eq!(nothing.pruning_height(100), None);

        let mut custom = PruningOptions::custom(100, 50);
        custom.start_height = 200;
        assert_eq!(custom.pruning_height(100), None);
        assert_eq!(custom.pruning_height(150), None);
        assert_eq!(custom.pruning_height(200), Some(99));
    }

    #[test]
    fn test_serializes_lowercase_strategy() {
        let json = serde_json::to_value(PruningOptions::custom(1, 2)).unwrap();
        assert_eq!(json["strategy"], "custom");
        assert_eq!(json["interval"], 2);
    }
}
