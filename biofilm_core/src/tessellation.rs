//! Tessellation-based neighbour counts.
//!
//! Two agents are neighbours when their Voronoi cells share a ridge, which is
//! exactly when they are joined by an edge of the Delaunay triangulation. The
//! neighbour count of an agent is therefore its Delaunay vertex degree.

use crate::error::SimError;
use crate::geometry::Position;
use spade::{DelaunayTriangulation, Point2, Triangulation};

/// Counts adjacent agents for every point, index-aligned with `points`.
///
/// One or two agents always get a count of 1. Every count is at least 1;
/// agents stacked on the same coordinates share one tessellation site.
pub fn neighbour_counts(points: &[Position]) -> Result<Vec<u32>, SimError> {
    if points.len() < 3 {
        return Ok(vec![1; points.len()]);
    }

    let mut triangulation: DelaunayTriangulation<Point2<f64>> = DelaunayTriangulation::new();
    let mut sites = Vec::with_capacity(points.len());

    for p in points {
        let handle = triangulation
            .insert(Point2::new(p.x, p.y))
            .map_err(|e| SimError::geometry(format!("cannot tessellate ({}, {}): {:?}", p.x, p.y, e)))?;
        sites.push(handle.index());
    }

    let mut degree = vec![0u32; triangulation.num_vertices()];
    for edge in triangulation.undirected_edges() {
        for vertex in edge.vertices() {
            degree[vertex.fix().index()] += 1;
        }
    }

    Ok(sites.into_iter().map(|site| degree[site].max(1)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector2;

    #[test]
    fn test_small_populations() {
        assert!(neighbour_counts(&[]).unwrap().is_empty());
        assert_eq!(neighbour_counts(&[Vector2::new(1.0, 1.0)]).unwrap(), vec![1]);
        assert_eq!(
            neighbour_counts(&[Vector2::new(1.0, 1.0), Vector2::new(5.0, 5.0)]).unwrap(),
            vec![1, 1]
        );
    }

    #[test]
    fn test_triangle_everyone_adjacent() {
        let points = [
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(0.5, 1.0),
        ];
        assert_eq!(neighbour_counts(&points).unwrap(), vec![2, 2, 2]);
    }

    #[test]
    fn test_center_of_square_touches_all_corners() {
        let points = [
            Vector2::new(0.0, 0.0),
            Vector2::new(2.0, 0.0),
            Vector2::new(2.0, 2.0),
            Vector2::new(0.0, 2.0),
            Vector2::new(1.0, 1.0),
        ];
        let counts = neighbour_counts(&points).unwrap();

        assert_eq!(counts[4], 4);
        // corners: two hull edges plus the spoke to the center
        assert!(counts[..4].iter().all(|&c| c == 3));
    }

    #[test]
    fn test_collinear_chain() {
        let points = [
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(2.0, 0.0),
            Vector2::new(3.0, 0.0),
        ];
        assert_eq!(neighbour_counts(&points).unwrap(), vec![1, 2, 2, 1]);
    }

    #[test]
    fn test_stacked_agents_share_a_site() {
        let points = [
            Vector2::new(0.0, 0.0),
            Vector2::new(0.0, 0.0),
            Vector2::new(0.0, 0.0),
        ];
        assert_eq!(neighbour_counts(&points).unwrap(), vec![1, 1, 1]);
    }

    #[test]
    fn test_non_finite_rejected() {
        let points = [
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(f64::NAN, 1.0),
        ];
        assert!(neighbour_counts(&points).is_err());
    }
}
