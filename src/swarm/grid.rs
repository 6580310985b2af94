// grid.rs — Bucketed uniform grid over the torus.
//
// Cell size >= interaction radius → an agent only needs its 3×3 neighbourhood.
// Buckets have a fixed capacity; inserts past it are dropped, never grown.
// Slots are claimed atomically so workers can insert concurrently.

use super::toroid::WorldBounds;
use std::sync::atomic::{AtomicU32, Ordering};

/// Marks an agent that did not get a bucket slot on the last rebuild.
pub const NO_SLOT: u32 = u32::MAX;

/// Grid dimensions and the real (stretched) cell size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridLayout {
    pub cells_x: u32,
    pub cells_y: u32,
    pub cell_width: f32,
    pub cell_height: f32,
}

impl GridLayout {
    pub fn new(cells_x: u32, cells_y: u32, world_width: f32, world_height: f32) -> Self {
        GridLayout {
            cells_x,
            cells_y,
            cell_width: world_width / cells_x as f32,
            cell_height: world_height / cells_y as f32,
        }
    }

    pub fn cell_count(&self) -> usize {
        self.cells_x as usize * self.cells_y as usize
    }
}

/// Spatial grid. Rebuild (clear + insert all) before neighbourhood queries.
pub struct SpatialIndex {
    layout: GridLayout,
    bounds: WorldBounds,
    capacity: u32,
    inv_cell_w: f32,
    inv_cell_h: f32,
    /// Slots claimed per cell. May exceed `capacity`; readers clamp.
    counts: Vec<AtomicU32>,
    /// `[cells * capacity]` agent indices, cell-major.
    slots: Vec<AtomicU32>,
}

impl SpatialIndex {
    pub fn new(layout: GridLayout, bounds: WorldBounds, capacity: usize) -> Self {
        let cells = layout.cell_count();
        SpatialIndex {
            layout,
            bounds,
            capacity: capacity as u32,
            inv_cell_w: 1.0 / layout.cell_width,
            inv_cell_h: 1.0 / layout.cell_height,
            counts: (0..cells).map(|_| AtomicU32::new(0)).collect(),
            slots: (0..cells * capacity).map(|_| AtomicU32::new(NO_SLOT)).collect(),
        }
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    pub fn cell_count(&self) -> usize {
        self.counts.len()
    }

    /// Reset every bucket. O(cells); slot contents are left stale but unreachable.
    pub fn clear(&mut self) {
        self.counts.iter_mut().for_each(|c| *c.get_mut() = 0);
    }

    /// Cell coordinates of a point, clipped to the grid extents.
    #[inline(always)]
    pub fn cell_of(&self, x: f32, y: f32) -> (u32, u32) {
        let cx = ((x * self.inv_cell_w).floor().max(0.0) as u32).min(self.layout.cells_x - 1);
        let cy = ((y * self.inv_cell_h).floor().max(0.0) as u32).min(self.layout.cells_y - 1);
        (cx, cy)
    }

    #[inline(always)]
    pub fn cell_index(&self, cx: u32, cy: u32) -> usize {
        cx as usize + cy as usize * self.layout.cells_x as usize
    }

    #[inline(always)]
    pub fn cell_coords(&self, cell: usize) -> (u32, u32) {
        let w = self.layout.cells_x as usize;
        ((cell % w) as u32, (cell / w) as u32)
    }

    /// Append `agent` to the bucket containing (x, y).
    ///
    /// Returns the global slot it landed in, or `None` when the bucket is full
    /// and the agent was dropped for this rebuild.
    #[inline]
    pub fn insert(&self, x: f32, y: f32, agent: u32) -> Option<u32> {
        let (cx, cy) = self.cell_of(x, y);
        let cell = self.cell_index(cx, cy);
        let claimed = self.counts[cell].fetch_add(1, Ordering::Relaxed);
        if claimed >= self.capacity {
            return None;
        }
        let slot = cell * self.capacity as usize + claimed as usize;
        self.slots[slot].store(agent, Ordering::Relaxed);
        Some(slot as u32)
    }

    /// Live agents in a bucket (never more than capacity).
    #[inline(always)]
    pub fn occupancy(&self, cell: usize) -> usize {
        self.counts[cell].load(Ordering::Relaxed).min(self.capacity) as usize
    }

    /// Agent stored at position `k` of a bucket; `k < occupancy(cell)`.
    #[inline(always)]
    pub fn agent_at(&self, cell: usize, k: usize) -> u32 {
        self.slots[cell * self.capacity as usize + k].load(Ordering::Relaxed)
    }

    pub fn cell_contents(&self, cell: usize) -> impl Iterator<Item = u32> + '_ {
        (0..self.occupancy(cell)).map(move |k| self.agent_at(cell, k))
    }

    /// Insertions rejected by full buckets since the last `clear`.
    pub fn dropped(&self) -> usize {
        self.counts
            .iter()
            .map(|c| c.load(Ordering::Relaxed).saturating_sub(self.capacity) as usize)
            .sum()
    }

    pub fn max_occupancy(&self) -> usize {
        (0..self.cell_count())
            .map(|cell| self.occupancy(cell))
            .max()
            .unwrap_or(0)
    }

    /// Copy every agent index of the 3×3 neighbourhood of (cx, cy) into `out`.
    ///
    /// Border cells wrap with modulo; interior cells use direct addition. On a
    /// grid axis with fewer than three cells each distinct cell is visited once.
    pub fn query_neighborhood(&self, cx: u32, cy: u32, out: &mut Vec<u32>) -> usize {
        out.clear();
        let (xs, nx) = neighbor_span(cx, self.layout.cells_x);
        let (ys, ny) = neighbor_span(cy, self.layout.cells_y);
        for &ncy in &ys[..ny] {
            for &ncx in &xs[..nx] {
                let cell = self.cell_index(ncx, ncy);
                let base = cell * self.capacity as usize;
                let live = self.occupancy(cell);
                out.extend(
                    self.slots[base..base + live]
                        .iter()
                        .map(|s| s.load(Ordering::Relaxed)),
                );
            }
        }
        out.len()
    }

    /// Agents within `radius` (minimum-image) of a point, at most `limit`.
    ///
    /// Scans as many rings of cells as `radius + slack` requires, so it also
    /// works for radii larger than a cell. `slack` covers agents that moved
    /// since the grid was last rebuilt.
    pub fn query_radius(
        &self,
        x: &[f32],
        y: &[f32],
        point: (f32, f32),
        radius: f32,
        slack: f32,
        limit: usize,
    ) -> Vec<u32> {
        let mut found = Vec::new();
        if limit == 0 || radius.is_nan() || radius <= 0.0 {
            return found;
        }
        let point = self.bounds.wrap(point.0, point.1);
        let (cx, cy) = self.cell_of(point.0, point.1);
        let reach = radius + slack.max(0.0);
        let reach_x = (reach * self.inv_cell_w).ceil() as u32;
        let reach_y = (reach * self.inv_cell_h).ceil() as u32;
        let radius_sq = radius * radius;

        for ncy in ring_span(cy, reach_y, self.layout.cells_y) {
            for ncx in ring_span(cx, reach_x, self.layout.cells_x) {
                for agent in self.cell_contents(self.cell_index(ncx, ncy)) {
                    let a = agent as usize;
                    if self.bounds.distance_sq(point, (x[a], y[a])) < radius_sq {
                        found.push(agent);
                        if found.len() >= limit {
                            return found;
                        }
                    }
                }
            }
        }
        found
    }
}

/// The distinct neighbour coordinates of `c` on an axis of `n` cells.
#[inline(always)]
fn neighbor_span(c: u32, n: u32) -> ([u32; 3], usize) {
    match n {
        1 => ([0, 0, 0], 1),
        2 => ([0, 1, 0], 2),
        _ if c == 0 => ([n - 1, 0, 1], 3),
        _ if c == n - 1 => ([c - 1, c, 0], 3),
        _ => ([c - 1, c, c + 1], 3),
    }
}

/// Coordinates within `reach` of `c`, wrapped, each at most once.
fn ring_span(c: u32, reach: u32, n: u32) -> Vec<u32> {
    let width = reach as u64 * 2 + 1;
    if width >= n as u64 {
        return (0..n).collect();
    }
    (0..width as u32)
        .map(|k| ((c as u64 + n as u64 - reach as u64 + k as u64) % n as u64) as u32)
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
