//! This module implements code for configuring a layout-generation operation, independent of the
//! words being laid out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "serde")]
use serde_derive::{Deserialize, Serialize};

/// How many backtracks each attempt gets by default before giving up.
pub const DEFAULT_MAX_BACKTRACKS: usize = 500;

/// How many independent attempts we make by default.
pub const DEFAULT_ATTEMPTS: usize = 4;

/// Settings for `generate_layout`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LayoutConfig {
    /// The largest width or height the layout may have, if any.
    pub max_extent: Option<usize>,

    /// How many backtracks the first attempt may make; later attempts get a bit more (see
    /// `RETRY_GROWTH_FACTOR`).
    pub max_backtracks: usize,

    /// An optional wall-clock budget shared by all attempts, and by every retry that
    /// `generate_layout` and `generate_compact_layout` make.
    pub timeout: Option<Duration>,

    /// How many independent attempts to make. Attempt `n` uses the seed `seed + n`.
    pub attempts: usize,

    /// Whether to run attempts on separate threads.
    pub parallel: bool,

    /// If a successful attempt's density (filled cells / bounding-box area) reaches this value,
    /// stop the remaining attempts early.
    pub quality_threshold: Option<f32>,

    /// The base seed for the attempts' word-order and tie-break shuffling.
    pub seed: u64,

    /// If a required word can't be placed by any attempt, drop it (and report a warning) instead
    /// of failing the whole generation.
    pub skip_unplaceable_required: bool,

    /// An optional atomic flag that can be set to signal that generation should be canceled.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub abort: Option<Arc<AtomicBool>>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            max_extent: None,
            max_backtracks: DEFAULT_MAX_BACKTRACKS,
            timeout: None,
            attempts: DEFAULT_ATTEMPTS,
            parallel: true,
            quality_threshold: None,
            seed: 0,
            skip_unplaceable_required: false,
            abort: None,
        }
    }
}

impl LayoutConfig {
    /// Has the caller asked us to stop?
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.abort
            .as_ref()
            .is_some_and(|abort| abort.load(Ordering::Relaxed))
    }

    /// When a search started at `start` has to stop, if there's a timeout.
    #[must_use]
    pub fn deadline_from(&self, start: Instant) -> Option<Instant> {
        self.timeout.map(|timeout| start + timeout)
    }

    /// The seed used by the attempt with the given index.
    #[must_use]
    pub fn attempt_seed(&self, attempt_idx: usize) -> u64 {
        self.seed.wrapping_add(attempt_idx as u64)
    }

    /// A copy of this config with a different maximum extent.
    #[must_use]
    pub fn with_max_extent(&self, max_extent: Option<usize>) -> LayoutConfig {
        LayoutConfig {
            max_extent,
            ..self.clone()
        }
    }
}

#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::LayoutConfig;
    use std::time::Duration;

    #[test]
    fn test_config_round_trips_without_abort_flag() {
        let config = LayoutConfig {
            max_extent: Some(12),
            timeout: Some(Duration::from_millis(250)),
            ..LayoutConfig::default()
        };

        let json = serde_json::to_string(&config).unwrap();
        let parsed: LayoutConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.max_extent, Some(12));
        assert_eq!(parsed.timeout, Some(Duration::from_millis(250)));
        assert!(parsed.abort.is_none());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let parsed: LayoutConfig = serde_json::from_str(r#"{"attempts": 2}"#).unwrap();

        assert_eq!(parsed.attempts, 2);
        assert_eq!(parsed.max_backtracks, 500);
        assert!(parsed.parallel);
    }
}
