use nalgebra::{Point3, Vector3};

/// Arithmetic mean of a set of points (unweighted center of mass).
///
/// Returns `None` for an empty set.
pub fn centroid<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Option<Point3<f64>> {
    let (sum, count) = points
        .into_iter()
        .fold((Vector3::zeros(), 0usize), |(acc, n), p| (acc + p.coords, n + 1));

    if count == 0 {
        None
    } else {
        Some(Point3::from(sum / count as f64))
    }
}
