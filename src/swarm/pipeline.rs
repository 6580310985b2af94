use super::controls::SwarmControls;
use super::engine::{TickParams, TickStats, UpdateEngine};
use super::store::{AgentSnapshot, AgentStore};
use crate::config::SwarmConfig;
use crate::error::SwarmResult;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Ticks between progress log lines.
const REPORT_EVERY: u64 = 100;

/// Top-level owner of a running swarm: engine, live controls and the RNG used
/// for seeding and interactive edits.
pub struct Simulation {
    engine: UpdateEngine,
    controls: Arc<SwarmControls>,
    rng: StdRng,
    last_stats: TickStats,
    busy: Duration,
}

impl Simulation {
    pub fn new(config: SwarmConfig) -> SwarmResult<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let store = AgentStore::seeded(&config, &mut rng);
        let controls = Arc::new(SwarmControls::new(TickParams::from_config(&config)));
        let engine = UpdateEngine::new(config, store)?;
        Ok(Simulation {
            engine,
            controls,
            rng,
            last_stats: TickStats::default(),
            busy: Duration::ZERO,
        })
    }

    /// Handle for changing α, β and pause while the simulation runs.
    pub fn controls(&self) -> Arc<SwarmControls> {
        Arc::clone(&self.controls)
    }

    pub fn engine(&self) -> &UpdateEngine {
        &self.engine
    }

    pub fn config(&self) -> &SwarmConfig {
        self.engine.config()
    }

    /// Advance one tick with the tunables as they are right now.
    pub fn step(&mut self) -> &TickStats {
        let params = self.controls.sample();
        let start = Instant::now();
        self.last_stats = self.engine.tick(&params);
        self.busy += start.elapsed();

        let done = self.engine.tick_count();
        if done % REPORT_EVERY == 0 {
            info!(
                "[Swarm] Tick {}: {} agents, mean {:.2} neighbours, {} dropped, {:?}/tick",
                done,
                self.engine.store().len(),
                self.last_stats.mean_neighbors,
                self.last_stats.dropped,
                self.busy / REPORT_EVERY as u32
            );
            self.busy = Duration::ZERO;
        }
        &self.last_stats
    }

    /// Run `ticks` steps back to back.
    pub fn run(&mut self, ticks: u64) -> &TickStats {
        for _ in 0..ticks {
            self.step();
        }
        &self.last_stats
    }

    pub fn last_stats(&self) -> &TickStats {
        &self.last_stats
    }

    pub fn tick_count(&self) -> u64 {
        self.engine.tick_count()
    }

    /// Read-only view of the agents, valid until the next step.
    pub fn snapshot(&self) -> AgentSnapshot<'_> {
        self.engine.snapshot()
    }

    /// Pull `count` random agents onto `centre`.
    pub fn seed_cluster(&mut self, centre: (f32, f32), count: usize) {
        let bounds = *self.engine.bounds();
        let rng = &mut self.rng;
        self.engine.store_mut().seed_cluster(&bounds, centre, count, rng);
        info!(
            "[Swarm] seeded cluster of {} at ({:.1}, {:.1})",
            count, centre.0, centre.1
        );
    }

    /// Agents within `radius` of a point, at most `limit`.
    pub fn select_within(&self, point: (f32, f32), radius: f32, limit: usize) -> Vec<u32> {
        self.engine.select_within(point, radius, limit)
    }
}
