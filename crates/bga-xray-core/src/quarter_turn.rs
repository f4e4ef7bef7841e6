use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Integer 2×2 rotation by a multiple of 90° in image axes (x right, y down).
///
/// `(x', y') = (a*x + b*y, c*x + d*y)`. Reflections are excluded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarterTurn {
    pub a: i32,
    pub b: i32,
    pub c: i32,
    pub d: i32,
}

impl QuarterTurn {
    pub const IDENTITY: QuarterTurn = QuarterTurn {
        a: 1,
        b: 0,
        c: 0,
        d: 1,
    };

    /// Rotation angle in degrees (0, 90, 180 or 270).
    pub fn degrees(&self) -> u16 {
        match (self.a, self.c) {
            (1, 0) => 0,
            (0, 1) => 90,
            (-1, 0) => 180,
            _ => 270,
        }
    }

    /// Rotate `p` about `center`.
    #[inline]
    pub fn rotate_about(&self, p: Point2<f32>, center: Point2<f32>) -> Point2<f32> {
        let dx = p.x - center.x;
        let dy = p.y - center.y;
        Point2::new(
            center.x + self.a as f32 * dx + self.b as f32 * dy,
            center.y + self.c as f32 * dx + self.d as f32 * dy,
        )
    }
}

/// The 4 proper rotations of the square lattice, in search order.
pub const QUARTER_TURNS: [QuarterTurn; 4] = [
    // 0°
    QuarterTurn {
        a: 1,
        b: 0,
        c: 0,
        d: 1,
    },
    // 90°
    QuarterTurn {
        a: 0,
        b: -1,
        c: 1,
        d: 0,
    },
    // 180°
    QuarterTurn {
        a: -1,
        b: 0,
        c: 0,
        d: -1,
    },
    // 270°
    QuarterTurn {
        a: 0,
        b: 1,
        c: -1,
        d: 0,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_quarter_turns_compose_to_identity() {
        let center = Point2::new(10.0f32, 5.0);
        let p = Point2::new(13.0f32, 9.0);
        let mut q = p;
        for _ in 0..4 {
            q = QUARTER_TURNS[1].rotate_about(q, center);
        }
        assert!((q - p).norm() < 1e-5);
    }

    #[test]
    fn degrees_are_reported_in_search_order() {
        let degs: Vec<u16> = QUARTER_TURNS.iter().map(|t| t.degrees()).collect();
        assert_eq!(degs, vec![0, 90, 180, 270]);
        assert_eq!(QuarterTurn::IDENTITY, QUARTER_TURNS[0]);
    }

    #[test]
    fn ninety_degrees_maps_x_axis_to_y_axis() {
        let q = QUARTER_TURNS[1].rotate_about(Point2::new(1.0, 0.0), Point2::origin());
        assert_eq!(q, Point2::new(0.0, 1.0));
    }
}
