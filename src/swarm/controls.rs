//! Live tunables (α, β, pause) shared between the simulation loop and
//! whatever drives it (UI, Python, a script).
//!
//! Writers may change values at any time; the loop samples them once per tick,
//! so a tick never sees a mix of old and new values.

use super::engine::TickParams;
use parking_lot::RwLock;
use tracing::debug;

#[derive(Debug)]
pub struct SwarmControls {
    params: RwLock<TickParams>,
}

impl SwarmControls {
    pub fn new(initial: TickParams) -> Self {
        SwarmControls {
            params: RwLock::new(initial),
        }
    }

    /// Copy of the current values. Called once before every tick.
    pub fn sample(&self) -> TickParams {
        *self.params.read()
    }

    pub fn set_alpha(&self, alpha: f32) {
        if !alpha.is_finite() {
            return;
        }
        self.params.write().alpha = alpha;
        debug!("[Controls] alpha = {}", alpha);
    }

    pub fn set_beta(&self, beta: f32) {
        if !beta.is_finite() {
            return;
        }
        self.params.write().beta = beta;
        debug!("[Controls] beta = {}", beta);
    }

    pub fn set_paused(&self, paused: bool) {
        self.params.write().paused = paused;
    }

    /// Flip the pause flag and return the new state.
    pub fn toggle_pause(&self) -> bool {
        let mut params = self.params.write();
        params.paused = !params.paused;
        params.paused
    }

    pub fn is_paused(&self) -> bool {
        self.params.read().paused
    }
}
