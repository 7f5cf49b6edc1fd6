//! Bounded simulation loop.
//!
//! Wraps the single-tick [`run_tick`] function with termination
//! conditions: an optional tick budget and extinction of the living
//! population.
//!
//! [`run_tick`]: crate::tick::run_tick

use tracing::info;

use samsara_store::EventManager;

use crate::tick::{self, TickError, TickProviders, TickSummary, WorldState};

/// Errors that can occur during a simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick execution failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },
}

/// Why the simulation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationEndReason {
    /// The configured tick budget was exhausted.
    MaxTicksReached,
    /// No living actors remain.
    Extinction,
}

/// Result of a bounded simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// Why the simulation ended.
    pub end_reason: SimulationEndReason,
    /// The last tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
    /// Total number of ticks executed.
    pub total_ticks: u64,
}

/// Run the simulation until the tick budget is spent or the world is
/// empty.
///
/// # Errors
///
/// Returns [`RunnerError`] if a tick fails unrecoverably.
pub async fn run_simulation(
    state: &mut WorldState,
    providers: TickProviders<'_>,
    events: &EventManager,
    max_ticks: Option<u64>,
) -> Result<SimulationResult, RunnerError> {
    let mut total_ticks: u64 = 0;
    let mut final_summary: Option<TickSummary> = None;

    info!(?max_ticks, actors = state.living.len(), "Simulation starting");

    loop {
        if let Some(budget) = max_ticks {
            if total_ticks >= budget {
                info!(total_ticks, "Tick budget exhausted");
                return Ok(SimulationResult {
                    end_reason: SimulationEndReason::MaxTicksReached,
                    final_summary,
                    total_ticks,
                });
            }
        }
        if state.living.is_empty() {
            info!(total_ticks, "All actors dead -- extinction");
            return Ok(SimulationResult {
                end_reason: SimulationEndReason::Extinction,
                final_summary,
                total_ticks,
            });
        }

        let summary = tick::run_tick(state, providers, events).await?;
        total_ticks = total_ticks.saturating_add(1);
        final_summary = Some(summary);
    }
}
