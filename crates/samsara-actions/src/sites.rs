//! Shared gathering-site state.
//!
//! Sites like the herb hollow "open" on an interval: once gathered from,
//! a site stays closed until enough ticks pass. The ledger is owned by the
//! world state and passed into actions by reference, so independent
//! simulation instances never share state through the action types.

use std::collections::BTreeMap;

/// Last-opened bookkeeping for named gathering sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteLedger {
    /// Tick each site was last opened at.
    last_opened: BTreeMap<String, u64>,
    /// Ticks a site stays closed after being opened.
    reopen_interval: u64,
}

impl SiteLedger {
    /// Create a ledger with the given reopen interval.
    pub const fn new(reopen_interval: u64) -> Self {
        Self {
            last_opened: BTreeMap::new(),
            reopen_interval,
        }
    }

    /// Whether `site` is open at `now`. A site never opened before is open.
    pub fn is_open(&self, site: &str, now: u64) -> bool {
        self.ticks_until_open(site, now) == 0
    }

    /// Ticks until `site` reopens. Zero means open now.
    pub fn ticks_until_open(&self, site: &str, now: u64) -> u64 {
        match self.last_opened.get(site) {
            None => 0,
            Some(&last) => self
                .reopen_interval
                .saturating_sub(now.saturating_sub(last)),
        }
    }

    /// Record that `site` was opened at `now`, closing it for the interval.
    pub fn mark_opened(&mut self, site: &str, now: u64) {
        self.last_opened.insert(site.to_owned(), now);
    }
}

impl Default for SiteLedger {
    fn default() -> Self {
        Self::new(3)
    }
}
