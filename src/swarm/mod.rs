//! Swarm Engine
//!
//! Primordial particle swarm on a torus: struct-of-arrays agent state, a
//! bucketed uniform grid for neighbour queries, and a tick engine that runs
//! each phase across a fixed worker pool.

pub mod controls;
pub mod engine;
pub mod grid;
pub mod pipeline;
pub mod scheduler;
pub mod store;
pub mod toroid;
pub mod trig;

#[cfg(feature = "python")]
pub mod py_api;


pub use controls::SwarmControls;
pub use engine::{classify, turn, Hemispheres, TickParams, TickStats, UpdateEngine};
pub use grid::{GridLayout, SpatialIndex, NO_SLOT};
pub use pipeline::Simulation;
pub use scheduler::WorkScheduler;
pub use store::{AgentSnapshot, AgentStore};
pub use toroid::WorldBounds;
pub use trig::{AngleTable, Trig};
