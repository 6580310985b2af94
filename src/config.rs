//! Swarm configuration
//!
//! One value object consumed once at construction. Defaults follow the classic
//! primordial particle settings (α = 180°, β = 17°, 30k agents on 1800×1000).

use crate::error::{SwarmError, SwarmResult};
use crate::swarm::grid::GridLayout;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How agents are placed when the store is first created.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeedLayout {
    /// Uniform random positions over the whole world.
    Random,
    /// Nearly square lattice, each point jittered by up to `noise` per axis.
    Grid { noise: f32 },
}

/// Source of `sin`/`cos` for headings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrigMode {
    Direct,
    /// Angle-quantized lookup table with `size` entries (power of two).
    Table { size: usize },
}

/// Construction-time parameters of a swarm.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    pub population: usize,
    pub world_width: f32,
    pub world_height: f32,
    /// Neighbours closer than this radius drive the turning rule.
    pub interaction_radius: f32,
    /// Desired cell edge; `None` uses the interaction radius.
    pub cell_size: Option<f32>,
    /// Distance travelled per tick (γ).
    pub step_length: f32,
    /// Constant turn per tick in degrees (α). Initial value of the live tunable.
    pub alpha: f32,
    /// Turn per neighbour in degrees (β). Initial value of the live tunable.
    pub beta: f32,
    /// Maximum agents per bucket; further insertions are dropped.
    pub cell_capacity: usize,
    pub threads: usize,
    /// Rebuild the grid every K ticks.
    pub grid_refresh_interval: u32,
    /// Wrap headings into [0, 2π) every tick.
    pub wrap_heading: bool,
    pub trig: TrigMode,
    pub seed: u64,
    pub layout: SeedLayout,
    /// Agents pulled onto the world centre at start-up to nucleate a cluster.
    pub initial_cluster: usize,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        let radius = 12.0 * 0.18;
        SwarmConfig {
            population: 30_000,
            world_width: 1800.0,
            world_height: 1000.0,
            interaction_radius: radius * 5.0,
            cell_size: None,
            step_length: radius * 0.67,
            alpha: 180.0,
            beta: 17.0,
            cell_capacity: 30,
            threads: default_threads(),
            grid_refresh_interval: 1,
            wrap_heading: true,
            trig: TrigMode::Direct,
            seed: 0x5eed,
            layout: SeedLayout::Random,
            initial_cluster: 0,
        }
    }
}

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(8)
}

fn positive(name: &str, value: f32) -> SwarmResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SwarmError::config(format!(
            "{name} must be a positive finite number, got {value}"
        )))
    }
}

impl SwarmConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> SwarmResult<Self> {
        let config: SwarmConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> SwarmResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Effective desired cell edge before it is stretched to tile the world.
    pub fn desired_cell_size(&self) -> f32 {
        self.cell_size.unwrap_or(self.interaction_radius)
    }

    /// Grid dimensions: as many whole cells of at least the desired size as fit.
    pub fn grid_layout(&self) -> GridLayout {
        let desired = self.desired_cell_size();
        let cells_x = ((self.world_width / desired).floor() as u32).max(1);
        let cells_y = ((self.world_height / desired).floor() as u32).max(1);
        GridLayout::new(cells_x, cells_y, self.world_width, self.world_height)
    }

    /// Reject configurations that would break the grid or engine invariants.
    pub fn validate(&self) -> SwarmResult<()> {
        if self.population == 0 {
            return Err(SwarmError::config("population must be at least one agent"));
        }
        if self.population > u32::MAX as usize {
            return Err(SwarmError::config(format!(
                "population {} exceeds the agent index range",
                self.population
            )));
        }
        positive("world_width", self.world_width)?;
        positive("world_height", self.world_height)?;
        positive("interaction_radius", self.interaction_radius)?;
        positive("cell_size", self.desired_cell_size())?;

        if self.desired_cell_size() < self.interaction_radius {
            return Err(SwarmError::config(format!(
                "cell size {} is smaller than interaction radius {}",
                self.desired_cell_size(),
                self.interaction_radius
            )));
        }
        if !self.step_length.is_finite() || self.step_length < 0.0 {
            return Err(SwarmError::config(format!(
                "step_length must be finite and non-negative, got {}",
                self.step_length
            )));
        }
        if !self.alpha.is_finite() || !self.beta.is_finite() {
            return Err(SwarmError::config("alpha and beta must be finite"));
        }
        if self.cell_capacity == 0 {
            return Err(SwarmError::config("cell_capacity must be at least one"));
        }
        if self.cell_capacity > (u32::MAX / 9) as usize {
            return Err(SwarmError::config(format!(
                "cell_capacity {} overflows the neighbour count",
                self.cell_capacity
            )));
        }
        if self.threads == 0 {
            return Err(SwarmError::config("threads must be at least one"));
        }
        if self.grid_refresh_interval == 0 {
            return Err(SwarmError::config("grid_refresh_interval must be at least one tick"));
        }

        let layout = self.grid_layout();
        let slots = layout
            .cell_count()
            .checked_mul(self.cell_capacity)
            .filter(|&slots| slots < u32::MAX as usize);
        if slots.is_none() {
            return Err(SwarmError::config(format!(
                "{}x{} cells with capacity {} exceed the slot index range",
                layout.cells_x, layout.cells_y, self.cell_capacity
            )));
        }

        match self.trig {
            TrigMode::Table { size } if size < 4 || !size.is_power_of_two() => {
                return Err(SwarmError::config(format!(
                    "trig table size must be a power of two >= 4, got {size}"
                )));
            }
            _ => {}
        }
        if let SeedLayout::Grid { noise } = self.layout {
            if !noise.is_finite() || noise < 0.0 {
                return Err(SwarmError::config(format!(
                    "grid seeding noise must be finite and non-negative, got {noise}"
                )));
            }
        }
        if self.initial_cluster > self.population {
            return Err(SwarmError::config(format!(
                "initial_cluster {} exceeds population {}",
                self.initial_cluster, self.population
            )));
        }
        Ok(())
    }
}
