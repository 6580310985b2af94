//! Update Engine
//!
//! Advances the swarm one tick at a time:
//!
//! 1. **Rebuild**: agents split by index range; each worker re-checks its
//!    positions and inserts them into the shared grid (atomic slot claim).
//!    Skipped on ticks between `grid_refresh_interval` rebuilds.
//! 2. **Update**: cells split by cell range; each worker gathers a cell's 3×3
//!    neighbourhood into its own scratch buffer and computes the new heading
//!    and neighbour count of the agents in that cell. Positions are read-only,
//!    results land in a slot-aligned buffer owned by the cell range.
//! 3. **Apply**: agents split by index range; results are copied from their
//!    slot and, unless paused, positions advance by γ and wrap.
//!
//! Every agent writes only through its own partition in each phase, so the
//! result is independent of the thread count whenever no bucket overflows.

use super::grid::{SpatialIndex, NO_SLOT};
use super::scheduler::WorkScheduler;
use super::store::{AgentSnapshot, AgentStore};
use super::toroid::{repair_coord, wrap_coord, WorldBounds};
use super::trig::Trig;
use crate::config::SwarmConfig;
use crate::error::{SwarmError, SwarmResult};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

const DEG_TO_RAD: f32 = PI / 180.0;

/// Tunables for one tick. Sampled once before the tick starts, never mid-tick.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TickParams {
    /// Constant turn in degrees (α).
    pub alpha: f32,
    /// Turn per neighbour in degrees (β).
    pub beta: f32,
    /// Freeze positions; headings and neighbour counts still update.
    pub paused: bool,
}

impl TickParams {
    pub fn from_config(config: &SwarmConfig) -> Self {
        TickParams {
            alpha: config.alpha,
            beta: config.beta,
            paused: false,
        }
    }
}

/// Neighbour tally on either side of an agent's heading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Hemispheres {
    pub right: u32,
    pub left: u32,
}

impl Hemispheres {
    #[inline(always)]
    pub fn total(&self) -> u32 {
        self.right + self.left
    }

    /// sign(R − L) where a tie counts as +1.
    #[inline(always)]
    pub fn turn_sign(&self) -> f32 {
        if self.right >= self.left {
            1.0
        } else {
            -1.0
        }
    }
}

/// Count neighbours within the interaction radius on each side of the
/// heading given by (`sin`, `cos`). Coincident neighbours are ignored.
#[inline]
pub fn classify(
    pos: (f32, f32),
    sin: f32,
    cos: f32,
    xs: &[f32],
    ys: &[f32],
    bounds: &WorldBounds,
    radius_sq: f32,
) -> Hemispheres {
    let mut tally = Hemispheres::default();
    for (&nx, &ny) in xs.iter().zip(ys) {
        let (dx, dy) = bounds.displacement(pos, (nx, ny));
        let dist_sq = dx * dx + dy * dy;
        if dist_sq > 0.0 && dist_sq < radius_sq {
            if dx * sin - dy * cos < 0.0 {
                tally.right += 1;
            } else {
                tally.left += 1;
            }
        }
    }
    tally
}

/// θ' = θ + (α + β·N·sign(R − L))·π/180
#[inline]
pub fn turn(heading: f32, tally: Hemispheres, params: &TickParams) -> f32 {
    let degrees = params.alpha + params.beta * tally.total() as f32 * tally.turn_sign();
    heading + degrees * DEG_TO_RAD
}

/// Statistics of one tick, for logs and UI overlays.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TickStats {
    pub tick: u64,
    pub rebuilt: bool,
    /// Insertions rejected by full buckets in the current grid.
    pub dropped: usize,
    pub max_occupancy: usize,
    pub mean_neighbors: f32,
    pub max_neighbors: u32,
    /// Positions found out of bounds and forced back in.
    pub repaired: usize,
    pub elapsed_us: u64,
}

/// Per-worker neighbourhood buffers, allocated once.
struct NeighborScratch {
    indices: Vec<u32>,
    xs: Vec<f32>,
    ys: Vec<f32>,
}

impl NeighborScratch {
    fn with_capacity(n: usize) -> Self {
        NeighborScratch {
            indices: Vec::with_capacity(n),
            xs: Vec::with_capacity(n),
            ys: Vec::with_capacity(n),
        }
    }

    fn gather(&mut self, index: &SpatialIndex, cx: u32, cy: u32, x: &[f32], y: &[f32]) {
        index.query_neighborhood(cx, cy, &mut self.indices);
        self.xs.clear();
        self.ys.clear();
        for &i in &self.indices {
            self.xs.push(x[i as usize]);
            self.ys.push(y[i as usize]);
        }
    }
}

pub struct UpdateEngine {
    config: SwarmConfig,
    bounds: WorldBounds,
    radius_sq: f32,
    store: AgentStore,
    index: SpatialIndex,
    scheduler: WorkScheduler,
    trig: Trig,
    scratch: Vec<NeighborScratch>,
    /// Slot of each agent in the current grid, or `NO_SLOT` if dropped.
    agent_slot: Vec<u32>,
    /// Update-phase results, laid out like the grid slots.
    slot_heading: Vec<f32>,
    slot_count: Vec<u32>,
    index_fresh: bool,
    moves_since_rebuild: u32,
    overflow_reported: bool,
    tick: u64,
}

impl UpdateEngine {
    /// Seed a store from `config.seed` and build an engine around it.
    pub fn seeded(config: SwarmConfig) -> SwarmResult<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let store = AgentStore::seeded(&config, &mut rng);
        Self::new(config, store)
    }

    pub fn new(config: SwarmConfig, store: AgentStore) -> SwarmResult<Self> {
        config.validate()?;
        if store.len() != config.population {
            return Err(SwarmError::config(format!(
                "store holds {} agents but population is {}",
                store.len(),
                config.population
            )));
        }

        let bounds = WorldBounds::new(config.world_width, config.world_height);
        let layout = config.grid_layout();
        let index = SpatialIndex::new(layout, bounds, config.cell_capacity);
        let scheduler = WorkScheduler::new(config.threads)?;
        let slots = layout.cell_count() * config.cell_capacity;
        let scratch = (0..scheduler.thread_count())
            .map(|_| NeighborScratch::with_capacity(9 * config.cell_capacity))
            .collect();

        info!(
            "🌐 [Engine] {} agents on {}x{} torus, {}x{} cells of {:.2}x{:.2} (capacity {}), {} workers",
            store.len(),
            bounds.width,
            bounds.height,
            layout.cells_x,
            layout.cells_y,
            layout.cell_width,
            layout.cell_height,
            config.cell_capacity,
            scheduler.thread_count()
        );

        Ok(UpdateEngine {
            radius_sq: config.interaction_radius * config.interaction_radius,
            trig: Trig::from_mode(config.trig),
            agent_slot: vec![NO_SLOT; store.len()],
            slot_heading: vec![0.0; slots],
            slot_count: vec![0; slots],
            config,
            bounds,
            store,
            index,
            scheduler,
            scratch,
            index_fresh: false,
            moves_since_rebuild: 0,
            overflow_reported: false,
            tick: 0,
        })
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    pub fn bounds(&self) -> &WorldBounds {
        &self.bounds
    }

    pub fn store(&self) -> &AgentStore {
        &self.store
    }

    /// Mutable access for collaborators that move agents between ticks.
    /// The grid is rebuilt on the next tick regardless of the refresh interval.
    pub fn store_mut(&mut self) -> &mut AgentStore {
        self.index_fresh = false;
        &mut self.store
    }

    pub fn snapshot(&self) -> AgentSnapshot<'_> {
        self.store.snapshot()
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn thread_count(&self) -> usize {
        self.scheduler.thread_count()
    }

    /// Ticks completed so far.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn invalidate_index(&mut self) {
        self.index_fresh = false;
    }

    /// Agents within `radius` of a point, at most `limit`.
    pub fn select_within(&self, point: (f32, f32), radius: f32, limit: usize) -> Vec<u32> {
        let x = &self.store.x;
        let y = &self.store.y;
        if self.index_fresh {
            let slack = self.config.step_length * self.moves_since_rebuild as f32;
            return self.index.query_radius(x, y, point, radius, slack, limit);
        }
        let point = self.bounds.wrap(point.0, point.1);
        let radius_sq = radius * radius;
        (0..self.store.len())
            .filter(|&i| self.bounds.distance_sq(point, (x[i], y[i])) < radius_sq)
            .map(|i| i as u32)
            .take(limit)
            .collect()
    }

    /// Run one tick with the given tunables.
    pub fn tick(&mut self, params: &TickParams) -> TickStats {
        let start = Instant::now();
        let interval = u64::from(self.config.grid_refresh_interval);
        let rebuilt = !self.index_fresh || self.tick % interval == 0;

        let mut repaired = 0;
        if rebuilt {
            repaired += self.rebuild();
        }
        self.update_headings(params);
        repaired += self.apply(params);
        if !params.paused {
            self.moves_since_rebuild += 1;
        }

        if repaired > 0 {
            warn!(
                "[Engine] tick {}: {} agent positions left the world and were re-wrapped",
                self.tick, repaired
            );
        }

        let stats = self.collect_stats(rebuilt, repaired, start);
        if stats.dropped > 0 && !self.overflow_reported {
            warn!(
                "[Engine] tick {}: {} agents dropped by full cells (capacity {}); raise cell_capacity if this persists",
                self.tick, stats.dropped, self.config.cell_capacity
            );
        }
        self.overflow_reported = stats.dropped > 0;
        debug!(
            tick = stats.tick,
            rebuilt = stats.rebuilt,
            dropped = stats.dropped,
            max_occupancy = stats.max_occupancy,
            mean_neighbors = stats.mean_neighbors,
            elapsed_us = stats.elapsed_us,
            "tick complete"
        );

        self.tick += 1;
        stats
    }

    /// Clear the grid and insert every agent. Returns positions repaired.
    fn rebuild(&mut self) -> usize {
        let UpdateEngine {
            store,
            index,
            scheduler,
            agent_slot,
            bounds,
            ..
        } = self;
        index.clear();

        let index: &SpatialIndex = index;
        let bounds = *bounds;
        let chunk = scheduler.chunk_len(store.len());
        let repaired = AtomicUsize::new(0);
        let repaired_ref = &repaired;

        scheduler.scope(|s| {
            let parts = store
                .x
                .chunks_mut(chunk)
                .zip(store.y.chunks_mut(chunk))
                .zip(agent_slot.chunks_mut(chunk))
                .enumerate();
            for (c, ((xs, ys), slots)) in parts {
                s.spawn(move |_| {
                    let base = c * chunk;
                    let mut fixed = 0;
                    for k in 0..xs.len() {
                        let (x, bad_x) = repair_coord(xs[k], bounds.width);
                        let (y, bad_y) = repair_coord(ys[k], bounds.height);
                        if bad_x || bad_y {
                            xs[k] = x;
                            ys[k] = y;
                            fixed += 1;
                        }
                        slots[k] = index.insert(x, y, (base + k) as u32).unwrap_or(NO_SLOT);
                    }
                    if fixed > 0 {
                        repaired_ref.fetch_add(fixed, Ordering::Relaxed);
                    }
                });
            }
        });

        self.index_fresh = true;
        self.moves_since_rebuild = 0;
        repaired.into_inner()
    }

    /// Compute each bucketed agent's next heading and neighbour count.
    fn update_headings(&mut self, params: &TickParams) {
        let UpdateEngine {
            store,
            index,
            scheduler,
            trig,
            scratch,
            slot_heading,
            slot_count,
            bounds,
            radius_sq,
            config,
            ..
        } = self;

        let index: &SpatialIndex = index;
        let trig: &Trig = trig;
        let bounds = *bounds;
        let radius_sq = *radius_sq;
        let wrap_heading = config.wrap_heading;
        let params = *params;
        let (x, y, heading) = (&store.x[..], &store.y[..], &store.heading[..]);

        let cap = index.capacity();
        let cells = index.cell_count();
        let cells_per_task = scheduler.chunk_len(cells);

        scheduler.scope(|s| {
            let parts = slot_heading
                .chunks_mut(cells_per_task * cap)
                .zip(slot_count.chunks_mut(cells_per_task * cap))
                .zip(scratch.iter_mut())
                .enumerate();
            for (task, ((out_heading, out_count), scratch)) in parts {
                s.spawn(move |_| {
                    let first = task * cells_per_task;
                    let last = (first + cells_per_task).min(cells);
                    for cell in first..last {
                        let live = index.occupancy(cell);
                        if live == 0 {
                            continue;
                        }
                        let (cx, cy) = index.cell_coords(cell);
                        scratch.gather(index, cx, cy, x, y);

                        let base = (cell - first) * cap;
                        for k in 0..live {
                            let a = index.agent_at(cell, k) as usize;
                            let (sin, cos) = trig.sin_cos(heading[a]);
                            let tally = classify(
                                (x[a], y[a]),
                                sin,
                                cos,
                                &scratch.xs,
                                &scratch.ys,
                                &bounds,
                                radius_sq,
                            );
                            let next = turn(heading[a], tally, &params);
                            out_heading[base + k] = if wrap_heading {
                                wrap_coord(next, TAU)
                            } else {
                                next
                            };
                            out_count[base + k] = tally.total();
                        }
                    }
                });
            }
        });
    }

    /// Copy results back to agents and advance positions. Returns positions repaired.
    fn apply(&mut self, params: &TickParams) -> usize {
        let UpdateEngine {
            store,
            scheduler,
            trig,
            agent_slot,
            slot_heading,
            slot_count,
            bounds,
            config,
            ..
        } = self;

        let trig: &Trig = trig;
        let bounds = *bounds;
        let step = config.step_length;
        let paused = params.paused;
        let (slot_heading, slot_count) = (&slot_heading[..], &slot_count[..]);
        let chunk = scheduler.chunk_len(store.len());
        let repaired = AtomicUsize::new(0);
        let repaired_ref = &repaired;

        scheduler.scope(|s| {
            let parts = store
                .x
                .chunks_mut(chunk)
                .zip(store.y.chunks_mut(chunk))
                .zip(store.heading.chunks_mut(chunk))
                .zip(store.neighbor_count.chunks_mut(chunk))
                .zip(agent_slot.chunks(chunk));
            for ((((xs, ys), hs), ns), slots) in parts {
                s.spawn(move |_| {
                    let mut fixed = 0;
                    for k in 0..xs.len() {
                        let slot = slots[k];
                        if slot != NO_SLOT {
                            hs[k] = slot_heading[slot as usize];
                            ns[k] = slot_count[slot as usize];
                        }
                        if paused {
                            continue;
                        }
                        let (sin, cos) = trig.sin_cos(hs[k]);
                        let (x, bad_x) =
                            repair_coord(wrap_coord(xs[k] + step * cos, bounds.width), bounds.width);
                        let (y, bad_y) =
                            repair_coord(wrap_coord(ys[k] + step * sin, bounds.height), bounds.height);
                        xs[k] = x;
                        ys[k] = y;
                        if bad_x || bad_y {
                            fixed += 1;
                        }
                    }
                    if fixed > 0 {
                        repaired_ref.fetch_add(fixed, Ordering::Relaxed);
                    }
                });
            }
        });

        repaired.into_inner()
    }

    fn collect_stats(&self, rebuilt: bool, repaired: usize, start: Instant) -> TickStats {
        let counts = &self.store.neighbor_count;
        let total: u64 = counts.iter().map(|&c| u64::from(c)).sum();
        TickStats {
            tick: self.tick,
            rebuilt,
            dropped: self.index.dropped(),
            max_occupancy: self.index.max_occupancy(),
            mean_neighbors: total as f32 / counts.len().max(1) as f32,
            max_neighbors: counts.iter().copied().max().unwrap_or(0),
            repaired,
            elapsed_us: start.elapsed().as_micros() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(alpha: f32, beta: f32) -> TickParams {
        TickParams {
            alpha,
            beta,
            paused: false,
        }
    }

    #[test]
    fn side_follows_cross_product_sign() {
        let bounds = WorldBounds::new(100.0, 100.0);
        // Heading 0 (+x): d.x·0 − d.y·1 is negative only for d.y > 0.
        let (sin, cos) = 0.0f32.sin_cos();
        let above = classify((50.0, 50.0), sin, cos, &[50.0], &[55.0], &bounds, 100.0);
        assert_eq!(above, Hemispheres { right: 1, left: 0 });
        let below = classify((50.0, 50.0), sin, cos, &[50.0], &[45.0], &bounds, 100.0);
        assert_eq!(below, Hemispheres { right: 0, left: 1 });
        // Dead ahead has a zero cross product and counts as left.
        let ahead = classify((50.0, 50.0), sin, cos, &[56.0], &[50.0], &bounds, 100.0);
        assert_eq!(ahead, Hemispheres { right: 0, left: 1 });
    }

    #[test]
    fn classification_matches_cross_product_for_rotated_heading() {
        let bounds = WorldBounds::new(200.0, 200.0);
        let theta = 2.0f32;
        let (sin, cos) = theta.sin_cos();
        let neighbours = [(103.0, 101.0), (96.0, 104.0), (100.0, 92.0), (108.0, 97.0)];
        for (nx, ny) in neighbours {
            let (dx, dy) = (nx - 100.0, ny - 100.0);
            let expect_right = dx * sin - dy * cos < 0.0;
            let tally = classify((100.0, 100.0), sin, cos, &[nx], &[ny], &bounds, 400.0);
            assert_eq!(tally.right == 1, expect_right, "neighbour ({nx}, {ny})");
            assert_eq!(tally.total(), 1);
        }
    }

    #[test]
    fn classification_ignores_coincident_and_distant() {
        let bounds = WorldBounds::new(100.0, 100.0);
        let tally = classify(
            (10.0, 10.0),
            0.0,
            1.0,
            &[10.0, 30.0, 12.0],
            &[10.0, 10.0, 10.0],
            &bounds,
            25.0,
        );
        assert_eq!(tally.total(), 1);
    }

    #[test]
    fn classification_wraps_across_edges() {
        let bounds = WorldBounds::new(100.0, 100.0);
        let tally = classify((1.0, 50.0), 0.0, 1.0, &[99.0], &[52.0], &bounds, 25.0);
        assert_eq!(tally, Hemispheres { right: 1, left: 0 });
    }

    #[test]
    fn tie_turns_positive() {
        let tie = Hemispheres { right: 2, left: 2 };
        assert_eq!(tie.turn_sign(), 1.0);
        assert_eq!(Hemispheres::default().turn_sign(), 1.0);
        assert_eq!(Hemispheres { right: 1, left: 3 }.turn_sign(), -1.0);

        let next = turn(0.0, tie, &params(10.0, 5.0));
        assert!((next - 30.0f32.to_radians()).abs() < 1e-6);
        let next = turn(0.0, Hemispheres { right: 1, left: 3 }, &params(10.0, 5.0));
        assert!((next - (-10.0f32).to_radians()).abs() < 1e-6);
    }

    #[test]
    fn store_size_must_match_population() {
        let config = SwarmConfig {
            population: 10,
            threads: 1,
            ..SwarmConfig::default()
        };
        let err = UpdateEngine::new(config, AgentStore::new(9)).err().unwrap();
        assert!(matches!(err, SwarmError::InvalidConfig(_)));
    }

    #[test]
    fn paused_tick_updates_headings_but_not_positions() {
        let config = SwarmConfig {
            population: 400,
            world_width: 100.0,
            world_height: 100.0,
            interaction_radius: 10.0,
            threads: 2,
            ..SwarmConfig::default()
        };
        let mut engine = UpdateEngine::seeded(config).unwrap();
        let x0 = engine.store().x.clone();
        let h0 = engine.store().heading.clone();

        let stats = engine.tick(&TickParams {
            alpha: 180.0,
            beta: 17.0,
            paused: true,
        });
        assert!(stats.rebuilt);
        assert_eq!(engine.store().x, x0);
        assert_ne!(engine.store().heading, h0);
        assert!(engine.store().neighbor_count.iter().any(|&n| n > 0));
    }

    #[test]
    fn refresh_interval_skips_rebuilds() {
        let config = SwarmConfig {
            population: 200,
            world_width: 100.0,
            world_height: 100.0,
            interaction_radius: 10.0,
            threads: 2,
            grid_refresh_interval: 3,
            ..SwarmConfig::default()
        };
        let mut engine = UpdateEngine::seeded(config.clone()).unwrap();
        let p = TickParams::from_config(&config);
        let rebuilt: Vec<bool> = (0..7).map(|_| engine.tick(&p).rebuilt).collect();
        assert_eq!(rebuilt, vec![true, false, false, true, false, false, true]);

        engine.invalidate_index();
        assert!(engine.tick(&p).rebuilt);
    }

    #[test]
    fn select_within_finds_agents_near_point() {
        let config = SwarmConfig {
            population: 3,
            world_width: 100.0,
            world_height: 100.0,
            interaction_radius: 10.0,
            threads: 1,
            ..SwarmConfig::default()
        };
        let store = AgentStore::from_parts(
            vec![2.0, 97.0, 50.0],
            vec![50.0, 50.0, 50.0],
            vec![0.0; 3],
        )
        .unwrap();
        let mut engine = UpdateEngine::new(config, store).unwrap();

        let mut before = engine.select_within((0.0, 50.0), 5.0, 10);
        before.sort_unstable();
        assert_eq!(before, vec![0, 1]);

        engine.tick(&TickParams {
            alpha: 0.0,
            beta: 0.0,
            paused: true,
        });
        let mut after = engine.select_within((0.0, 50.0), 5.0, 10);
        after.sort_unstable();
        assert_eq!(after, vec![0, 1]);
        assert_eq!(engine.select_within((50.0, 50.0), 1.0, 10), vec![2]);
    }
}
