//! Closed-polygon measurements used to filter contour candidates.

use nalgebra::Point2;

/// Integer bounding box `[min, max]` (inclusive) of a point set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl BoundingBox {
    pub fn of(points: &[Point2<f32>]) -> Option<Self> {
        let first = points.first()?;
        let mut bb = BoundingBox {
            min_x: first.x.floor() as i64,
            min_y: first.y.floor() as i64,
            max_x: first.x.floor() as i64,
            max_y: first.y.floor() as i64,
        };
        for p in &points[1..] {
            bb.min_x = bb.min_x.min(p.x.floor() as i64);
            bb.min_y = bb.min_y.min(p.y.floor() as i64);
            bb.max_x = bb.max_x.max(p.x.floor() as i64);
            bb.max_y = bb.max_y.max(p.y.floor() as i64);
        }
        Some(bb)
    }

    /// True when the box comes within `margin` pixels of the edges of a `width x height` frame.
    pub fn touches_border(&self, width: usize, height: usize, margin: i64) -> bool {
        let right = self.max_x + 1;
        let bottom = self.max_y + 1;
        self.min_x <= margin
            || self.min_y <= margin
            || right >= width as i64 - margin
            || bottom >= height as i64 - margin
    }
}

/// Absolute shoelace area.
pub fn polygon_area(points: &[Point2<f32>]) -> f64 {
    signed_area(points).abs()
}

fn signed_area(points: &[Point2<f32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let n = points.len();
    let mut acc = 0.0f64;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        acc += a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64;
    }
    0.5 * acc
}

/// Length of the closed polyline through `points`.
pub fn polygon_perimeter(points: &[Point2<f32>]) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }
    let mut acc = 0.0f64;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        let dx = (b.x - a.x) as f64;
        let dy = (b.y - a.y) as f64;
        acc += (dx * dx + dy * dy).sqrt();
    }
    acc
}

/// Centroid from first-order area moments. `None` for zero-area polygons.
pub fn polygon_centroid(points: &[Point2<f32>]) -> Option<Point2<f32>> {
    let m00 = signed_area(points);
    if m00.abs() < 1e-12 {
        return None;
    }
    let n = points.len();
    let mut m10 = 0.0f64;
    let mut m01 = 0.0f64;
    for i in 0..n {
        let (x0, y0) = (points[i].x as f64, points[i].y as f64);
        let j = (i + 1) % n;
        let (x1, y1) = (points[j].x as f64, points[j].y as f64);
        let cross = x0 * y1 - x1 * y0;
        m10 += (x0 + x1) * cross;
        m01 += (y0 + y1) * cross;
    }
    let k = 1.0 / (6.0 * m00);
    Some(Point2::new((m10 * k) as f32, (m01 * k) as f32))
}

/// `4π·area / perimeter²`; 1.0 for a perfect disc. `None` when the perimeter is zero.
pub fn circularity(area: f64, perimeter: f64) -> Option<f64> {
    if perimeter <= 0.0 {
        return None;
    }
    Some(4.0 * std::f64::consts::PI * area / (perimeter * perimeter))
}

/// Douglas–Peucker simplification of a closed contour.
///
/// The contour is split at its first point and the point farthest from it, and
/// each half is simplified as an open polyline.
pub fn simplify_closed(points: &[Point2<f32>], epsilon: f32) -> Vec<Point2<f32>> {
    if points.len() <= 3 {
        return points.to_vec();
    }
    let origin = points[0];
    let far = points
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            let da = (*a - origin).norm_squared();
            let db = (*b - origin).norm_squared();
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0);
    if far == 0 {
        return vec![origin];
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[far] = true;
    mark_douglas_peucker(points, 0, far, epsilon, &mut keep);

    // Second half wraps back to the origin.
    let mut tail: Vec<Point2<f32>> = points[far..].to_vec();
    tail.push(origin);
    let mut keep_tail = vec![false; tail.len()];
    let last = tail.len() - 1;
    mark_douglas_peucker(&tail, 0, last, epsilon, &mut keep_tail);
    for (k, flag) in keep_tail.iter().enumerate().take(last).skip(1) {
        if *flag {
            keep[far + k] = true;
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

fn mark_douglas_peucker(
    points: &[Point2<f32>],
    first: usize,
    last: usize,
    epsilon: f32,
    keep: &mut [bool],
) {
    let mut stack = vec![(first, last)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }
        let a = points[start];
        let b = points[end];
        let mut max_d = 0.0f32;
        let mut max_i = start;
        for (i, p) in points.iter().enumerate().take(end).skip(start + 1) {
            let d = distance_to_segment(*p, a, b);
            if d > max_d {
                max_d = d;
                max_i = i;
            }
        }
        if max_d > epsilon {
            keep[max_i] = true;
            stack.push((start, max_i));
            stack.push((max_i, end));
        }
    }
}

fn distance_to_segment(p: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f32 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 < 1e-12 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(side: f32) -> Vec<Point2<f32>> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(side, 0.0),
            Point2::new(side, side),
            Point2::new(0.0, side),
        ]
    }

    #[test]
    fn square_measurements() {
        let sq = square(10.0);
        assert_relative_eq!(polygon_area(&sq), 100.0);
        assert_relative_eq!(polygon_perimeter(&sq), 40.0);
        let c = polygon_centroid(&sq).expect("centroid");
        assert_relative_eq!(c.x, 5.0, epsilon = 1e-5);
        assert_relative_eq!(c.y, 5.0, epsilon = 1e-5);
        let circ = circularity(100.0, 40.0).expect("circularity");
        assert_relative_eq!(circ, std::f64::consts::PI / 4.0, epsilon = 1e-9);
    }

    #[test]
    fn degenerate_polygons_have_no_centroid() {
        let line = vec![Point2::new(0.0, 0.0), Point2::new(5.0, 0.0)];
        assert_eq!(polygon_area(&line), 0.0);
        assert!(polygon_centroid(&line).is_none());
        assert!(circularity(0.0, 0.0).is_none());
    }

    #[test]
    fn simplify_drops_collinear_points() {
        let mut pts = Vec::new();
        for i in 0..10 {
            pts.push(Point2::new(i as f32, 0.0));
        }
        for i in 0..10 {
            pts.push(Point2::new(10.0, i as f32));
        }
        for i in 0..10 {
            pts.push(Point2::new(10.0 - i as f32, 10.0));
        }
        for i in 0..10 {
            pts.push(Point2::new(0.0, 10.0 - i as f32));
        }
        let simplified = simplify_closed(&pts, 0.5);
        assert_eq!(simplified.len(), 4);
        assert_relative_eq!(polygon_area(&simplified), 100.0, epsilon = 1e-6);
    }

    #[test]
    fn border_touch_uses_margin() {
        let bb = BoundingBox {
            min_x: 2,
            min_y: 2,
            max_x: 7,
            max_y: 7,
        };
        assert!(!bb.touches_border(12, 12, 1));
        assert!(bb.touches_border(9, 12, 1));
    }
}
