//! Position along a route as a function of progress.

use er_core::GeoPoint;

/// A route polyline with cumulative great-circle distances.
///
/// Progress maps to distance travelled, not to node count: at progress 0.5
/// the vehicle is halfway along the route by length.  A route whose points
/// all coincide has zero length; it falls back to treating every segment as
/// equally long.
#[derive(Clone, Debug, PartialEq)]
pub struct RoutePath {
    points:     Vec<GeoPoint>,
    /// `cumulative_km[i]` = length from `points[0]` to `points[i]`.
    cumulative_km: Vec<f64>,
}

impl RoutePath {
    /// `None` if `points` is empty.
    pub fn new(points: Vec<GeoPoint>) -> Option<Self> {
        let first = *points.first()?;
        let mut cumulative_km = Vec::with_capacity(points.len());
        let mut total = 0.0;
        let mut prev = first;
        for &p in &points {
            total += prev.distance_km(p);
            cumulative_km.push(total);
            prev = p;
        }
        Some(Self { points, cumulative_km })
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn length_km(&self) -> f64 {
        self.cumulative_km.last().copied().unwrap_or(0.0)
    }

    pub fn start(&self) -> GeoPoint {
        self.points[0]
    }

    pub fn end(&self) -> GeoPoint {
        self.points[self.points.len() - 1]
    }

    /// Point at fractional `progress` (clamped to `[0, 1]`) along the route.
    pub fn position_at(&self, progress: f64) -> GeoPoint {
        let progress = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
        let n = self.points.len();
        if n == 1 {
            return self.points[0];
        }

        let total = self.length_km();
        if total <= 0.0 {
            // Equal-length segments.
            let f = progress * (n - 1) as f64;
            let i = (f.floor() as usize).min(n - 2);
            return self.points[i].lerp(self.points[i + 1], f - i as f64);
        }

        let target = progress * total;
        // First point at or beyond the target distance.
        let hi = self.cumulative_km.partition_point(|&c| c < target);
        if hi == 0 {
            return self.points[0];
        }
        if hi >= n {
            return self.end();
        }
        let lo = hi - 1;
        let seg = self.cumulative_km[hi] - self.cumulative_km[lo];
        self.points[lo].lerp(self.points[hi], (target - self.cumulative_km[lo]) / seg)
    }
}
