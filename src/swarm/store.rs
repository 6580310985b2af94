//! Agent Store
//!
//! Struct-of-Arrays state for a fixed population. Index = identity; agents are
//! never created or destroyed during a run.

use super::toroid::WorldBounds;
use crate::config::{SeedLayout, SwarmConfig};
use rand::Rng;
use std::f32::consts::TAU;

pub struct AgentStore {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    /// Radians. Wrapped into [0, 2π) each tick unless disabled in config.
    pub heading: Vec<f32>,
    /// Neighbours seen on the last update; read by renderers only.
    pub neighbor_count: Vec<u32>,
}

/// Read-only view handed to rendering collaborators after a tick.
#[derive(Clone, Copy)]
pub struct AgentSnapshot<'a> {
    pub x: &'a [f32],
    pub y: &'a [f32],
    pub heading: &'a [f32],
    pub neighbor_count: &'a [u32],
}

impl AgentSnapshot<'_> {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn position(&self, idx: usize) -> Option<(f32, f32)> {
        Some((*self.x.get(idx)?, *self.y.get(idx)?))
    }
}

impl AgentStore {
    /// All agents at the origin with heading 0.
    pub fn new(n_agents: usize) -> Self {
        AgentStore {
            x: vec![0.0; n_agents],
            y: vec![0.0; n_agents],
            heading: vec![0.0; n_agents],
            neighbor_count: vec![0; n_agents],
        }
    }

    /// Build from explicit positions and headings (all three of equal length).
    pub fn from_parts(x: Vec<f32>, y: Vec<f32>, heading: Vec<f32>) -> Option<Self> {
        if x.len() != y.len() || x.len() != heading.len() {
            return None;
        }
        let n = x.len();
        Some(AgentStore {
            x,
            y,
            heading,
            neighbor_count: vec![0; n],
        })
    }

    /// Population laid out per `config.layout`, random headings, plus the
    /// optional start-up cluster at the world centre.
    pub fn seeded<R: Rng + ?Sized>(config: &SwarmConfig, rng: &mut R) -> Self {
        let bounds = WorldBounds::new(config.world_width, config.world_height);
        let mut store = AgentStore::new(config.population);
        match config.layout {
            SeedLayout::Random => store.randomize_positions(&bounds, rng),
            SeedLayout::Grid { noise } => store.grid_positions(&bounds, noise, rng),
        }
        store.randomize_headings(rng);
        if config.initial_cluster > 0 {
            let centre = (bounds.width * 0.5, bounds.height * 0.5);
            store.seed_cluster(&bounds, centre, config.initial_cluster, rng);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn snapshot(&self) -> AgentSnapshot<'_> {
        AgentSnapshot {
            x: &self.x,
            y: &self.y,
            heading: &self.heading,
            neighbor_count: &self.neighbor_count,
        }
    }

    pub fn randomize_positions<R: Rng + ?Sized>(&mut self, bounds: &WorldBounds, rng: &mut R) {
        for (x, y) in self.x.iter_mut().zip(self.y.iter_mut()) {
            *x = rng.gen_range(0.0..bounds.width);
            *y = rng.gen_range(0.0..bounds.height);
        }
    }

    /// Nearly square lattice covering the world, each point jittered by up to
    /// `noise` per axis and wrapped back in.
    pub fn grid_positions<R: Rng + ?Sized>(
        &mut self,
        bounds: &WorldBounds,
        noise: f32,
        rng: &mut R,
    ) {
        let n = self.len();
        if n == 0 {
            return;
        }
        let cols = ((n as f32 * (bounds.width / bounds.height)).sqrt() as usize).clamp(1, n);
        let rows = n.div_ceil(cols);
        let spacing_x = bounds.width / cols as f32;
        let spacing_y = bounds.height / rows as f32;

        for i in 0..n {
            let (row, col) = (i / cols, i % cols);
            let jx = if noise > 0.0 { rng.gen_range(-noise..=noise) } else { 0.0 };
            let jy = if noise > 0.0 { rng.gen_range(-noise..=noise) } else { 0.0 };
            let (x, y) = bounds.wrap(col as f32 * spacing_x + jx, row as f32 * spacing_y + jy);
            self.x[i] = x;
            self.y[i] = y;
        }
    }

    pub fn randomize_headings<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for h in self.heading.iter_mut() {
            *h = rng.gen_range(0.0..TAU);
        }
    }

    /// Pull `count` randomly picked agents onto one point. Picks may repeat, so
    /// fewer than `count` distinct agents can move.
    pub fn seed_cluster<R: Rng + ?Sized>(
        &mut self,
        bounds: &WorldBounds,
        centre: (f32, f32),
        count: usize,
        rng: &mut R,
    ) {
        let n = self.len();
        if n == 0 {
            return;
        }
        let (cx, cy) = bounds.wrap(centre.0, centre.1);
        for _ in 0..count {
            let idx = rng.gen_range(0..n);
            self.x[idx] = cx;
            self.y[idx] = cy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn seeded_store_is_in_bounds_and_reproducible() {
        let config = SwarmConfig {
            population: 2_000,
            ..SwarmConfig::default()
        };
        let a = AgentStore::seeded(&config, &mut StdRng::seed_from_u64(7));
        let b = AgentStore::seeded(&config, &mut StdRng::seed_from_u64(7));
        let bounds = WorldBounds::new(config.world_width, config.world_height);

        assert_eq!(a.len(), 2_000);
        assert_eq!(a.x, b.x);
        assert_eq!(a.heading, b.heading);
        for i in 0..a.len() {
            assert!(bounds.contains(a.x[i], a.y[i]));
            assert!((0.0..TAU).contains(&a.heading[i]));
        }
    }

    #[test]
    fn grid_layout_without_noise_is_evenly_spaced() {
        let bounds = WorldBounds::new(100.0, 100.0);
        let mut store = AgentStore::new(16);
        store.grid_positions(&bounds, 0.0, &mut StdRng::seed_from_u64(1));
        assert_eq!((store.x[0], store.y[0]), (0.0, 0.0));
        assert_eq!((store.x[1], store.y[1]), (25.0, 0.0));
        assert_eq!((store.x[5], store.y[5]), (25.0, 25.0));
        assert_eq!((store.x[15], store.y[15]), (75.0, 75.0));
    }

    #[test]
    fn grid_layout_with_noise_stays_in_bounds() {
        let bounds = WorldBounds::new(300.0, 120.0);
        let mut store = AgentStore::new(1_001);
        store.grid_positions(&bounds, 125.0, &mut StdRng::seed_from_u64(3));
        for i in 0..store.len() {
            assert!(bounds.contains(store.x[i], store.y[i]));
        }
    }

    #[test]
    fn cluster_moves_agents_onto_centre() {
        let bounds = WorldBounds::new(100.0, 100.0);
        let mut rng = StdRng::seed_from_u64(11);
        let mut store = AgentStore::new(50);
        store.randomize_positions(&bounds, &mut rng);
        store.seed_cluster(&bounds, (140.0, 50.0), 10, &mut rng);

        let at_centre = (0..store.len())
            .filter(|&i| store.x[i] == 40.0 && store.y[i] == 50.0)
            .count();
        assert!((1..=10).contains(&at_centre), "got {at_centre}");
    }

    #[test]
    fn from_parts_rejects_ragged_columns() {
        assert!(AgentStore::from_parts(vec![1.0], vec![1.0, 2.0], vec![0.0]).is_none());
        let store = AgentStore::from_parts(vec![1.0], vec![2.0], vec![0.5]).unwrap();
        assert_eq!(store.snapshot().position(0), Some((1.0, 2.0)));
    }
}
