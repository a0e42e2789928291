//! Precomputed unit vectors for whole-degree orientations.
//!
//! Built once when the world is constructed and shared read-only by every
//! cell worker through an `Arc`.

/// Number of distinct orientations.
pub const DEGREES: usize = 360;

/// Cosine and sine of every whole degree in `[0, 360)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrigTable {
    cos: [f32; DEGREES],
    sin: [f32; DEGREES],
}

impl TrigTable {
    /// Compute the table. Values are evaluated in `f64` and rounded once.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn new() -> Self {
        Self {
            cos: core::array::from_fn(|deg| (deg as f64).to_radians().cos() as f32),
            sin: core::array::from_fn(|deg| (deg as f64).to_radians().sin() as f32),
        }
    }

    /// `(cos, sin)` of an orientation. Values past 359 wrap.
    pub fn unit(&self, orientation: u16) -> (f32, f32) {
        let idx = usize::from(orientation).rem_euclid(DEGREES);
        let cos = self.cos.get(idx).copied().unwrap_or(1.0);
        let sin = self.sin.get(idx).copied().unwrap_or(0.0);
        (cos, sin)
    }
}

impl Default for TrigTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Map any whole-degree angle into `[0, 360)`.
pub fn normalize_orientation(degrees: i32) -> u16 {
    let wrapped = degrees.rem_euclid(360);
    u16::try_from(wrapped).unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::float_cmp, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    const HALF_SQRT3: f32 = 0.866_025_4;

    #[test]
    fn cosine_at_notable_angles() {
        let table = TrigTable::new();
        let cases = [
            (0, 1.0),
            (30, HALF_SQRT3),
            (60, 0.5),
            (90, 0.0),
            (120, -0.5),
            (150, -HALF_SQRT3),
            (180, -1.0),
            (210, -HALF_SQRT3),
            (240, -0.5),
            (270, 0.0),
            (300, 0.5),
            (330, HALF_SQRT3),
        ];
        for (deg, want) in cases {
            let (cos, _) = table.unit(deg);
            assert!((cos - want).abs() < 1e-6, "cos({deg}) = {cos}");
        }
    }

    #[test]
    fn sine_at_notable_angles() {
        let table = TrigTable::new();
        let cases = [
            (0, 0.0),
            (30, 0.5),
            (60, HALF_SQRT3),
            (90, 1.0),
            (120, HALF_SQRT3),
            (150, 0.5),
            (180, 0.0),
            (210, -0.5),
            (240, -HALF_SQRT3),
            (270, -1.0),
            (300, -HALF_SQRT3),
            (330, -0.5),
        ];
        for (deg, want) in cases {
            let (_, sin) = table.unit(deg);
            assert!((sin - want).abs() < 1e-6, "sin({deg}) = {sin}");
        }
    }

    #[test]
    fn unit_wraps_large_orientations() {
        let table = TrigTable::new();
        assert_eq!(table.unit(450), table.unit(90));
    }

    #[test]
    fn normalize_orientation_cases() {
        let cases = [
            (0, 0),
            (15, 15),
            (179, 179),
            (180, 180),
            (359, 359),
            (360, 0),
            (720, 0),
            (-360, 0),
            (-1, 359),
        ];
        for (input, want) in cases {
            assert_eq!(normalize_orientation(input), want, "input {input}");
        }
    }
}
