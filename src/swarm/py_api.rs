use super::pipeline::Simulation;
use crate::config::SwarmConfig;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

#[pyclass]
pub struct PySwarm {
    sim: Simulation,
}

#[pymethods]
impl PySwarm {
    /// Build a swarm from keyword overrides of the default configuration, or
    /// from a JSON document when `config_json` is given.
    #[new]
    #[pyo3(signature = (population=30_000, width=1800.0, height=1000.0, threads=None, seed=0x5eed, config_json=None))]
    pub fn new(
        population: usize,
        width: f32,
        height: f32,
        threads: Option<usize>,
        seed: u64,
        config_json: Option<&str>,
    ) -> PyResult<Self> {
        let config = match config_json {
            Some(json) => SwarmConfig::from_json_str(json),
            None => {
                let mut config = SwarmConfig {
                    population,
                    world_width: width,
                    world_height: height,
                    seed,
                    ..SwarmConfig::default()
                };
                if let Some(threads) = threads {
                    config.threads = threads;
                }
                Ok(config)
            }
        }
        .map_err(|e| PyValueError::new_err(e.to_string()))?;

        let sim = Simulation::new(config).map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(Self { sim })
    }

    /// Advance the swarm by `ticks` ticks.
    #[pyo3(signature = (ticks=1))]
    pub fn tick(&mut self, ticks: u64) {
        self.sim.run(ticks);
    }

    pub fn set_alpha(&self, alpha: f32) {
        self.sim.controls().set_alpha(alpha);
    }

    pub fn set_beta(&self, beta: f32) {
        self.sim.controls().set_beta(beta);
    }

    pub fn set_paused(&self, paused: bool) {
        self.sim.controls().set_paused(paused);
    }

    pub fn toggle_pause(&self) -> bool {
        self.sim.controls().toggle_pause()
    }

    pub fn seed_cluster(&mut self, x: f32, y: f32, count: usize) {
        self.sim.seed_cluster((x, y), count);
    }

    #[pyo3(signature = (x, y, radius, limit=1000))]
    pub fn select_within(&self, x: f32, y: f32, radius: f32, limit: usize) -> Vec<u32> {
        self.sim.select_within((x, y), radius, limit)
    }

    /// Flat copies of the agent columns: (x, y, heading, neighbour_count).
    pub fn state(&self) -> (Vec<f32>, Vec<f32>, Vec<f32>, Vec<u32>) {
        let snap = self.sim.snapshot();
        (
            snap.x.to_vec(),
            snap.y.to_vec(),
            snap.heading.to_vec(),
            snap.neighbor_count.to_vec(),
        )
    }

    /// Statistics of the most recent tick.
    pub fn stats(&self, py: Python<'_>) -> PyResult<PyObject> {
        let stats = self.sim.last_stats();
        let dict = PyDict::new_bound(py);
        dict.set_item("tick", self.sim.tick_count())?;
        dict.set_item("rebuilt", stats.rebuilt)?;
        dict.set_item("dropped", stats.dropped)?;
        dict.set_item("max_occupancy", stats.max_occupancy)?;
        dict.set_item("mean_neighbors", stats.mean_neighbors)?;
        dict.set_item("max_neighbors", stats.max_neighbors)?;
        dict.set_item("elapsed_us", stats.elapsed_us)?;
        Ok(dict.into())
    }

    pub fn __len__(&self) -> usize {
        self.sim.snapshot().len()
    }
}
