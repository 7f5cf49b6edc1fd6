//! World clock for the simulation.
//!
//! The clock is the single source of truth for temporal state: one tick
//! is one in-world month. Year and month-of-year are derived from the
//! tick counter and configuration -- never stored independently. All
//! temporal arithmetic is checked; the counter cannot silently wrap.

use crate::config::TimeConfig;

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,

    /// Invalid time configuration (e.g. zero months per year).
    #[error("invalid time configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// World clock tracking the simulation's temporal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldClock {
    /// Current tick number (0-indexed).
    tick: u64,

    /// Number of months in a year (from configuration).
    months_per_year: u64,
}

impl WorldClock {
    /// Create a new world clock from a time configuration.
    ///
    /// The clock starts at tick 0. `months_per_year` must be at least 1.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if the configuration is invalid.
    pub fn new(config: &TimeConfig) -> Result<Self, ClockError> {
        if config.months_per_year == 0 {
            return Err(ClockError::InvalidConfig {
                reason: "months_per_year must be at least 1".to_owned(),
            });
        }
        Ok(Self {
            tick: 0,
            months_per_year: config.months_per_year,
        })
    }

    /// Create a clock from explicit parts (state restoration, tests).
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `months_per_year` is 0.
    pub fn from_parts(tick: u64, months_per_year: u64) -> Result<Self, ClockError> {
        if months_per_year == 0 {
            return Err(ClockError::InvalidConfig {
                reason: "months_per_year must be at least 1".to_owned(),
            });
        }
        Ok(Self {
            tick,
            months_per_year,
        })
    }

    /// Advance the clock by one tick. Returns the new tick number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the counter would exceed
    /// `u64::MAX`.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        Ok(self.tick)
    }

    /// Return the current tick number.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Return the configured number of months per year.
    pub const fn months_per_year(&self) -> u64 {
        self.months_per_year
    }

    /// The current year, counted from year 0.
    pub fn year(&self) -> u64 {
        self.tick.checked_div(self.months_per_year).unwrap_or(0)
    }

    /// The month within the current year, 1-based.
    pub fn month_of_year(&self) -> u64 {
        self.tick
            .checked_rem(self.months_per_year)
            .unwrap_or(0)
            .saturating_add(1)
    }

    /// Whether this tick begins a new year.
    pub fn is_year_turn(&self) -> bool {
        self.tick.checked_rem(self.months_per_year) == Some(0)
    }
}
