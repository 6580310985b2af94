//! Primordial Swarm Core v0.3.0 - Parallel Primordial Particle Simulation
//!
//! Simulates hundreds of thousands to millions of self-propelled agents on a
//! toroidal plane. Every tick each agent counts its neighbours on either side
//! of its heading, turns by `α + β·N·sign(R − L)` degrees and steps forward.
//! Clusters, spores and cell-like structures emerge from that one rule.

pub mod config;
pub mod error;
pub mod swarm;

#[cfg(feature = "python")]
use pyo3::prelude::*;

pub use config::{SeedLayout, SwarmConfig, TrigMode};
pub use error::{SwarmError, SwarmResult};
pub use swarm::{AgentSnapshot, AgentStore, Simulation, SwarmControls, TickParams, TickStats, UpdateEngine};

/// Initialize tracing for the library.
#[cfg_attr(feature = "python", pyfunction)]
#[cfg_attr(feature = "python", pyo3(signature = (level=None)))]
pub fn setup_logging(level: Option<String>) {
    let filter = level.unwrap_or_else(|| "info".to_string());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Python module initialization
#[cfg(feature = "python")]
#[pymodule]
fn primordial_swarm_core(_py: Python, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<swarm::py_api::PySwarm>()?;
    m.add_function(wrap_pyfunction!(setup_logging, m)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_setup_is_idempotent() {
        setup_logging(Some("debug".to_string()));
        setup_logging(None);
    }

    #[test]
    fn default_simulation_runs() {
        let config = SwarmConfig {
            population: 1_000,
            threads: 2,
            ..SwarmConfig::default()
        };
        let mut sim = Simulation::new(config).unwrap();
        let stats = sim.run(3).clone();
        assert_eq!(stats.tick, 2);
        assert_eq!(sim.snapshot().len(), 1_000);
    }
}
