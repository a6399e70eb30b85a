use crate::{Point, Polarity};
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Point2;

/// Closest and second-closest detected point to a query position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClosestPoints {
    pub index: usize,
    pub sqr_distance: f64,
    /// `None` when the set holds a single point.
    pub second_sqr_distance: Option<f64>,
}

impl ClosestPoints {
    /// `true` if the runner-up is at least `ratio` times farther away than the closest point.
    #[inline]
    pub fn is_unique(&self, ratio: f64) -> bool {
        match self.second_sqr_distance {
            Some(second) => second > ratio * ratio * self.sqr_distance,
            None => true,
        }
    }
}

/// Detected points with a KD-tree over their image positions.
pub struct PointSet {
    points: Vec<Point>,
    tree: KdTree<f32, 2>,
}

impl std::fmt::Debug for PointSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointSet")
            .field("points", &self.points.len())
            .finish()
    }
}

impl PointSet {
    pub fn new(points: Vec<Point>) -> Self {
        let coords = points
            .iter()
            .map(|p| [p.observation.x as f32, p.observation.y as f32])
            .collect::<Vec<_>>();
        let tree: KdTree<f32, 2> = (&coords).into();
        Self { points, tree }
    }

    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Point> {
        self.points.get(index)
    }

    /// Up to `k` nearest points as `(index, squared distance)`, closest first.
    ///
    /// Distances are recomputed in `f64`; equal distances keep index order.
    pub fn nearest_n(&self, query: Point2<f64>, k: usize) -> Vec<(usize, f64)> {
        if self.points.is_empty() || k == 0 {
            return Vec::new();
        }
        let q = [query.x as f32, query.y as f32];
        let mut out: Vec<(usize, f64)> = self
            .tree
            .nearest_n::<SquaredEuclidean>(&q, k)
            .into_iter()
            .map(|nn| {
                let index = nn.item as usize;
                (index, (self.points[index].observation - query).norm_squared())
            })
            .collect();
        out.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        out
    }

    pub fn closest_points(&self, query: Point2<f64>) -> Option<ClosestPoints> {
        let nn = self.nearest_n(query, 2);
        let &(index, sqr_distance) = nn.first()?;
        Some(ClosestPoints {
            index,
            sqr_distance,
            second_sqr_distance: nn.get(1).map(|&(_, d)| d),
        })
    }

    /// Closest point, optionally restricted to one polarity, within `max_sqr_distance`.
    pub fn closest_point(
        &self,
        query: Point2<f64>,
        polarity: Option<Polarity>,
        max_sqr_distance: f64,
    ) -> Option<usize> {
        let k = if polarity.is_some() { 8 } else { 1 };
        let mut k = k.min(self.points.len());
        loop {
            let nn = self.nearest_n(query, k);
            for &(index, d2) in &nn {
                if d2 > max_sqr_distance {
                    return None;
                }
                if polarity.map_or(true, |p| self.points[index].polarity == p) {
                    return Some(index);
                }
            }
            if k >= self.points.len() {
                return None;
            }
            k = (k * 4).min(self.points.len());
        }
    }

    /// Closest point within `max_distance` that is unique by `uniqueness_ratio`.
    pub fn unique_match(
        &self,
        query: Point2<f64>,
        max_distance: f64,
        uniqueness_ratio: f64,
    ) -> Option<usize> {
        let closest = self.closest_points(query)?;
        (closest.sqr_distance <= max_distance * max_distance && closest.is_unique(uniqueness_ratio))
            .then_some(closest.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(x: f64, y: f64) -> Point {
        Point::new(Point2::new(x, y), Polarity::Dark, 4, 1.0)
    }

    #[test]
    fn unique_match_needs_a_clear_winner() {
        let set = PointSet::new(vec![dot(0.0, 0.0), dot(10.0, 0.0), dot(11.0, 0.0)]);

        assert_eq!(set.unique_match(Point2::new(0.5, 0.0), 2.0, 2.0), Some(0));
        // Two candidates at similar distance.
        assert_eq!(set.unique_match(Point2::new(10.5, 0.0), 2.0, 2.0), None);
        // Too far from everything.
        assert_eq!(set.unique_match(Point2::new(5.0, 5.0), 2.0, 2.0), None);
    }

    #[test]
    fn nearest_points_are_sorted() {
        let set = PointSet::new(vec![dot(5.0, 0.0), dot(1.0, 0.0), dot(3.0, 0.0)]);
        let nn = set.nearest_n(Point2::new(0.0, 0.0), 3);
        let order: Vec<usize> = nn.iter().map(|&(i, _)| i).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert!((nn[0].1 - 1.0).abs() < 1e-12);

        let closest = set.closest_points(Point2::new(0.0, 0.0)).expect("closest");
        assert_eq!(closest.second_sqr_distance, Some(9.0));
        assert!(closest.is_unique(2.0));
    }

    #[test]
    fn closest_point_filters_by_polarity() {
        let mut bright = dot(2.0, 0.0);
        bright.polarity = Polarity::Bright;
        let set = PointSet::new(vec![dot(1.0, 0.0), bright]);
        let q = Point2::new(2.1, 0.0);

        assert_eq!(set.closest_point(q, None, 1.0), Some(1));
        assert_eq!(set.closest_point(q, Some(Polarity::Dark), 4.0), Some(0));
        assert_eq!(set.closest_point(q, Some(Polarity::Dark), 1.0), None);
    }

    #[test]
    fn empty_set_has_no_matches() {
        let set = PointSet::new(Vec::new());
        assert!(set.is_empty());
        assert!(set.closest_points(Point2::new(0.0, 0.0)).is_none());
    }
}
