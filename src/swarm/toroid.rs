//! Toroidal geometry helpers.
//!
//! The world is the half-open rectangle [0, width) × [0, height) with opposite
//! edges identified. Distances use the minimum-image convention.

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldBounds {
    pub width: f32,
    pub height: f32,
    half_width: f32,
    half_height: f32,
}

impl WorldBounds {
    pub fn new(width: f32, height: f32) -> Self {
        WorldBounds {
            width,
            height,
            half_width: width * 0.5,
            half_height: height * 0.5,
        }
    }

    #[inline]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        (0.0..self.width).contains(&x) && (0.0..self.height).contains(&y)
    }

    #[inline]
    pub fn wrap(&self, x: f32, y: f32) -> (f32, f32) {
        (wrap_coord(x, self.width), wrap_coord(y, self.height))
    }

    /// Minimum-image displacement from `from` to `to`.
    #[inline(always)]
    pub fn displacement(&self, from: (f32, f32), to: (f32, f32)) -> (f32, f32) {
        (
            min_image(to.0 - from.0, self.width, self.half_width),
            min_image(to.1 - from.1, self.height, self.half_height),
        )
    }

    #[inline(always)]
    pub fn distance_sq(&self, a: (f32, f32), b: (f32, f32)) -> f32 {
        let (dx, dy) = self.displacement(a, b);
        dx * dx + dy * dy
    }
}

/// Pick the shorter of the two wraparound candidates for one axis.
/// Inputs are differences of in-bounds coordinates, so |delta| < dim.
#[inline(always)]
pub fn min_image(delta: f32, dim: f32, half: f32) -> f32 {
    if delta.abs() > half {
        delta - dim.copysign(delta)
    } else {
        delta
    }
}

/// Floor-based wrap into [0, dim). In-range values are returned untouched.
///
/// The dimension is added before the second modulo so negative inputs land
/// on the far edge instead of keeping their sign; a rounded sum equal to `dim`
/// folds back to zero. NaN passes through and is caught by [`repair_coord`].
#[inline]
pub fn wrap_coord(value: f32, dim: f32) -> f32 {
    if (0.0..dim).contains(&value) {
        return value;
    }
    (value % dim + dim) % dim
}

/// Force a coordinate into [0, dim), returning whether it had to be fixed.
/// Used after the wrap step, where any out-of-range value is a bug signal.
#[inline]
pub fn repair_coord(value: f32, dim: f32) -> (f32, bool) {
    if (0.0..dim).contains(&value) {
        return (value, false);
    }
    if !value.is_finite() {
        return (0.0, true);
    }
    let wrapped = wrap_coord(value, dim);
    if (0.0..dim).contains(&wrapped) {
        (wrapped, true)
    } else {
        (0.0, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_handles_negative_and_overflowing_values() {
        assert_eq!(wrap_coord(-1.0, 100.0), 99.0);
        assert_eq!(wrap_coord(100.0, 100.0), 0.0);
        assert_eq!(wrap_coord(250.0, 100.0), 50.0);
        assert_eq!(wrap_coord(-250.0, 100.0), 50.0);
        assert_eq!(wrap_coord(42.5, 100.0), 42.5);
    }

    #[test]
    fn wrap_of_tiny_negative_stays_below_dim() {
        let wrapped = wrap_coord(-1e-9, 100.0);
        assert!((0.0..100.0).contains(&wrapped), "got {wrapped}");
    }

    #[test]
    fn min_image_takes_short_way_round() {
        let bounds = WorldBounds::new(100.0, 50.0);
        assert_eq!(bounds.displacement((95.0, 10.0), (5.0, 10.0)), (10.0, 0.0));
        assert_eq!(bounds.displacement((5.0, 45.0), (5.0, 2.0)), (0.0, 7.0));
        assert_eq!(bounds.displacement((10.0, 10.0), (20.0, 30.0)), (10.0, 20.0));
    }

    #[test]
    fn distance_is_symmetric() {
        let bounds = WorldBounds::new(100.0, 100.0);
        let pairs = [
            ((1.0, 1.0), (99.0, 99.0)),
            ((10.0, 80.0), (60.5, 20.25)),
            ((49.9, 0.0), (0.0, 50.1)),
        ];
        for (a, b) in pairs {
            assert_eq!(bounds.distance_sq(a, b), bounds.distance_sq(b, a));
        }
    }

    #[test]
    fn repair_flags_nan_and_out_of_range() {
        assert_eq!(repair_coord(5.0, 10.0), (5.0, false));
        assert_eq!(repair_coord(f32::NAN, 10.0), (0.0, true));
        assert_eq!(repair_coord(-2.0, 10.0), (8.0, true));
    }
}
