//! Simulation engine binary.
//!
//! Wires the kernel together and runs a bounded simulation:
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `samsara-config.yaml` (or `SAMSARA_CONFIG`)
//! 3. Select the event store backend (`PostgreSQL` when configured,
//!    in-memory otherwise)
//! 4. Seed the founding actors
//! 5. Run the simulation loop until the tick budget or extinction
//! 6. Log the result
//!
//! The decision, narrative, and relation backends are external services
//! in production; this binary wires in the built-in stubs so the world
//! can be exercised end-to-end without them.

use std::path::PathBuf;

use rand::Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use samsara_actions::narrative::PlainNarrative;
use samsara_core::config::SimulationConfig;
use samsara_core::decision::StubDecisionProvider;
use samsara_core::relation::StubRelationResolver;
use samsara_core::runner;
use samsara_core::tick::{TickProviders, WorldState};
use samsara_store::{EventManager, PostgresEventStore, PostgresPool};
use samsara_types::ActorState;

/// Names drawn for founding actors.
const FOUNDER_NAMES: [&str; 10] = [
    "Wen", "Sparrow", "Bai", "Jin", "Mo", "Lan", "Yun", "Hui", "Shan", "Ping",
];

/// Application entry point.
///
/// # Errors
///
/// Returns an error if initialization or the simulation itself fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .with_target(true)
        .init();

    info!(
        world = config.world.name,
        seed = config.world.seed,
        founders = config.world.founders,
        "samsara-engine starting"
    );

    let events = make_event_manager(&config).await?;
    info!(backend = events.backend(), "Event store ready");

    let mut state = WorldState::new(&config)?;
    seed_founders(&mut state, config.world.founders, config.population.lifespan_months);
    info!(actors = state.living.len(), "Founding population seeded");

    let decision = StubDecisionProvider::new();
    let relations = StubRelationResolver::new();
    let providers = TickProviders {
        decision: &decision,
        narrative: &PlainNarrative,
        relations: &relations,
    };

    let result =
        runner::run_simulation(&mut state, providers, &events, config.simulation.max_ticks)
            .await?;

    let total_events = events.count().await.unwrap_or(0);
    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        actors_alive = state.living.len(),
        total_events,
        "Simulation ended"
    );
    Ok(())
}

/// Load configuration from `SAMSARA_CONFIG` or the default path, falling
/// back to built-in defaults when no file exists.
fn load_config() -> anyhow::Result<SimulationConfig> {
    let path = std::env::var("SAMSARA_CONFIG")
        .map_or_else(|_| PathBuf::from("samsara-config.yaml"), PathBuf::from);
    if path.exists() {
        Ok(SimulationConfig::from_file(&path)?)
    } else {
        Ok(SimulationConfig::default())
    }
}

/// Build the event manager: durable when a database is configured,
/// in-memory otherwise.
async fn make_event_manager(config: &SimulationConfig) -> anyhow::Result<EventManager> {
    match &config.infrastructure.postgres_url {
        Some(url) => {
            let pool = PostgresPool::connect_url(url).await?;
            pool.run_migrations().await?;
            Ok(EventManager::postgres(PostgresEventStore::new(
                pool.pool().clone(),
            )))
        }
        None => Ok(EventManager::in_memory()),
    }
}

/// Spawn the founding actors, pairing some of them as spouses so the
/// world can grow.
fn seed_founders(state: &mut WorldState, founders: u32, lifespan_months: u64) {
    let mut spawned = Vec::new();
    for index in 0..founders as usize {
        let name = FOUNDER_NAMES
            .get(index % FOUNDER_NAMES.len())
            .copied()
            .unwrap_or("Nameless");
        let mut actor = ActorState::new(name, lifespan_months);
        // Founders start in their prime, with some spread.
        actor.age_months = 240_u64.saturating_add(state.rng.random_range(0..120));
        spawned.push(state.spawn(actor));
    }

    // Pair neighbors: the first two form a couple, and so on.
    for pair in spawned.chunks(2) {
        if let [a, b] = pair {
            if let Some(actor) = state.living.get_mut(a) {
                actor.spouse = Some(*b);
            }
            if let Some(actor) = state.living.get_mut(b) {
                actor.spouse = Some(*a);
            }
        }
    }
}
