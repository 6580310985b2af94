//! Heading trigonometry: direct calls or an angle-quantized lookup table.

use crate::config::TrigMode;
use std::f32::consts::TAU;

/// Precomputed sin/cos over one turn. The index of an angle is
/// `floor(angle / 2π · size) mod size`, so every real angle hits a bin.
#[derive(Clone, Debug)]
pub struct AngleTable {
    sin: Box<[f32]>,
    cos: Box<[f32]>,
    mask: i64,
    scale: f32,
}

impl AngleTable {
    /// `size` must be a power of two; configuration validation guarantees it.
    pub fn new(size: usize) -> Self {
        debug_assert!(size.is_power_of_two());
        let (sin, cos): (Vec<f32>, Vec<f32>) = (0..size)
            .map(|i| (i as f32 / size as f32 * TAU).sin_cos())
            .unzip();
        AngleTable {
            sin: sin.into_boxed_slice(),
            cos: cos.into_boxed_slice(),
            mask: size as i64 - 1,
            scale: size as f32 / TAU,
        }
    }

    pub fn size(&self) -> usize {
        self.sin.len()
    }

    /// Angular width of one bin; lookups are within this of the exact angle.
    pub fn resolution(&self) -> f32 {
        TAU / self.size() as f32
    }

    #[inline(always)]
    pub fn sin_cos(&self, angle: f32) -> (f32, f32) {
        let idx = ((angle * self.scale).floor() as i64 & self.mask) as usize;
        (self.sin[idx], self.cos[idx])
    }
}

#[derive(Clone, Debug)]
pub enum Trig {
    Direct,
    Table(AngleTable),
}

impl Trig {
    pub fn from_mode(mode: TrigMode) -> Self {
        match mode {
            TrigMode::Direct => Trig::Direct,
            TrigMode::Table { size } => Trig::Table(AngleTable::new(size)),
        }
    }

    #[inline(always)]
    pub fn sin_cos(&self, angle: f32) -> (f32, f32) {
        match self {
            Trig::Direct => angle.sin_cos(),
            Trig::Table(table) => table.sin_cos(angle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_agrees_with_direct_within_resolution() {
        let table = AngleTable::new(256);
        let tol = table.resolution();
        for step in -2000..2000 {
            let angle = step as f32 * 0.0137;
            let (s, c) = table.sin_cos(angle);
            assert!((s - angle.sin()).abs() <= tol, "sin mismatch at {angle}");
            assert!((c - angle.cos()).abs() <= tol, "cos mismatch at {angle}");
        }
    }

    #[test]
    fn table_bins_wrap_negative_angles() {
        let table = AngleTable::new(64);
        let (s_neg, c_neg) = table.sin_cos(-0.2 * TAU);
        let (s_pos, c_pos) = table.sin_cos(0.8 * TAU);
        assert_eq!((s_neg, c_neg), (s_pos, c_pos));
    }

    #[test]
    fn direct_mode_is_exact() {
        let trig = Trig::from_mode(TrigMode::Direct);
        assert_eq!(trig.sin_cos(1.25), 1.25f32.sin_cos());
    }
}
