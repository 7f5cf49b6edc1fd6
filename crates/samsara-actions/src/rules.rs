//! Pure rule collaborators consumed by actions and scheduler phases.
//!
//! Every function here is a pure mapping from inputs (and an injected RNG)
//! to outputs -- no world state is read or written. Actions and the
//! scheduler own all side effects; these functions own the numbers.

use rand::Rng;

// ---------------------------------------------------------------------------
// Progression
// ---------------------------------------------------------------------------

/// Strength rank width: crossing a multiple of this is a breakthrough.
const RANK_WIDTH: u64 = 100;

/// Strength gained by one completed training retreat.
pub fn training_gain(strength: u64, rng: &mut impl Rng) -> u64 {
    // Gains slow down as strength grows; the roll keeps retreats uneven.
    let base = 6_u64.saturating_sub((strength / 200).min(4));
    base.saturating_add(rng.random_range(0..=3))
}

/// Whether raising strength from `before` to `after` crossed a rank.
pub const fn is_breakthrough(before: u64, after: u64) -> bool {
    before / RANK_WIDTH < after / RANK_WIDTH
}

// ---------------------------------------------------------------------------
// Hunting
// ---------------------------------------------------------------------------

/// Outcome of one hunt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HuntOutcome {
    /// Coins' worth of game brought back.
    pub loot_coins: u64,
    /// Vitality lost to the quarry (non-negative).
    pub injury: i64,
    /// Whether the kill was notable enough to remember.
    pub prize: bool,
}

/// Resolve a hunt for a hunter of the given strength.
pub fn hunt_outcome(strength: u64, rng: &mut impl Rng) -> HuntOutcome {
    let roll: u64 = rng.random_range(0..100);
    let skill = (strength / 4).min(40);
    if roll < 10 {
        // The quarry wins the exchange.
        HuntOutcome {
            loot_coins: 0,
            injury: rng.random_range(5..=15),
            prize: false,
        }
    } else if roll.saturating_add(skill) >= 95 {
        HuntOutcome {
            loot_coins: 30_u64.saturating_add(strength / 2),
            injury: 0,
            prize: true,
        }
    } else {
        HuntOutcome {
            loot_coins: 5_u64.saturating_add(roll / 10),
            injury: rng.random_range(0..=3),
            prize: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Gathering
// ---------------------------------------------------------------------------

/// Herbs gathered from an open site.
pub fn forage_yield(rng: &mut impl Rng) -> u64 {
    rng.random_range(2..=5)
}

// ---------------------------------------------------------------------------
// Passive effects
// ---------------------------------------------------------------------------

/// Vitality regained per tick of quiet living.
pub const fn regeneration(max_vitality: i64) -> i64 {
    let twentieth = max_vitality / 20;
    if twentieth > 1 { twentieth } else { 1 }
}

/// A fortune or misfortune visited on an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fortune {
    /// Vitality change (negative for misfortune).
    pub vitality_delta: i64,
    /// Coin change applied with saturation at zero.
    pub coin_delta: i64,
    /// What happened.
    pub text: &'static str,
    /// Whether the stroke is worth remembering long-term.
    pub major: bool,
}

/// Fortune table, weighted toward small strokes.
const FORTUNES: [Fortune; 4] = [
    Fortune {
        vitality_delta: 0,
        coin_delta: 12,
        text: "found a forgotten purse on the road",
        major: false,
    },
    Fortune {
        vitality_delta: -8,
        coin_delta: 0,
        text: "caught a lingering fever",
        major: false,
    },
    Fortune {
        vitality_delta: 10,
        coin_delta: 25,
        text: "was rewarded by a grateful traveler",
        major: true,
    },
    Fortune {
        vitality_delta: -20,
        coin_delta: -15,
        text: "was waylaid by bandits",
        major: true,
    },
];

/// Roll for a random stroke of fortune. `chance_pct` is the per-tick
/// probability in percent; most ticks return `None`.
pub fn fortune_roll(chance_pct: u8, rng: &mut impl Rng) -> Option<Fortune> {
    if rng.random_range(0..100_u8) >= chance_pct {
        return None;
    }
    let index = rng.random_range(0..FORTUNES.len());
    FORTUNES.get(index).copied()
}

// ---------------------------------------------------------------------------
// Births and mortality
// ---------------------------------------------------------------------------

/// Whether a spoused pair conceives this tick.
pub fn birth_due(chance_pct: u8, rng: &mut impl Rng) -> bool {
    rng.random_range(0..100_u8) < chance_pct
}

/// Old-age mortality roll. Always false before the lifespan bound; the
/// chance grows each month lived past it.
pub fn old_age_death(age_months: u64, lifespan_months: u64, rng: &mut impl Rng) -> bool {
    if age_months < lifespan_months {
        return false;
    }
    let overage = age_months.saturating_sub(lifespan_months);
    let chance = 5_u64.saturating_add(overage.saturating_mul(2)).min(90);
    rng.random_range(0..100_u64) < chance
}
