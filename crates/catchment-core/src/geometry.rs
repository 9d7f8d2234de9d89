//! Planar polygon helpers used by the raster overlay.
//!
//! Cell coverage is computed by clipping each polygon ring against the
//! axis-aligned cell rectangle (Sutherland–Hodgman) and taking the shoelace
//! area of the result. The clip window is convex, so the clipped area is
//! exact for any simple ring, concave or not.
use geo::{Coord, LineString, MultiPolygon, Polygon, Rect};

/// Signed shoelace area of a closed or open vertex sequence.
fn shoelace(points: &[Coord<f64>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    sum * 0.5
}

#[derive(Clone, Copy)]
enum Edge {
    Left(f64),
    Right(f64),
    Bottom(f64),
    Top(f64),
}

impl Edge {
    fn inside(self, p: Coord<f64>) -> bool {
        match self {
            Edge::Left(x) => p.x >= x,
            Edge::Right(x) => p.x <= x,
            Edge::Bottom(y) => p.y >= y,
            Edge::Top(y) => p.y <= y,
        }
    }

    fn intersect(self, a: Coord<f64>, b: Coord<f64>) -> Coord<f64> {
        match self {
            Edge::Left(x) | Edge::Right(x) => {
                let t = (x - a.x) / (b.x - a.x);
                Coord { x, y: a.y + t * (b.y - a.y) }
            }
            Edge::Bottom(y) | Edge::Top(y) => {
                let t = (y - a.y) / (b.y - a.y);
                Coord { x: a.x + t * (b.x - a.x), y }
            }
        }
    }
}

fn clip_ring(ring: &LineString<f64>, rect: &Rect<f64>) -> Vec<Coord<f64>> {
    let mut output: Vec<Coord<f64>> = ring.0.clone();
    if output.len() > 1 && output.first() == output.last() {
        output.pop();
    }
    let (min, max) = (rect.min(), rect.max());
    for edge in [Edge::Left(min.x), Edge::Right(max.x), Edge::Bottom(min.y), Edge::Top(max.y)] {
        if output.is_empty() {
            break;
        }
        let input = std::mem::take(&mut output);
        let mut prev = input[input.len() - 1];
        for &cur in &input {
            match (edge.inside(prev), edge.inside(cur)) {
                (true, true) => output.push(cur),
                (true, false) => output.push(edge.intersect(prev, cur)),
                (false, true) => {
                    output.push(edge.intersect(prev, cur));
                    output.push(cur);
                }
                (false, false) => {}
            }
            prev = cur;
        }
    }
    output
}

/// Area of `ring` lying inside `rect`.
pub fn ring_area_in_rect(ring: &LineString<f64>, rect: &Rect<f64>) -> f64 {
    shoelace(&clip_ring(ring, rect)).abs()
}

/// Area of `polygon` (exterior minus holes) lying inside `rect`.
pub fn polygon_area_in_rect(polygon: &Polygon<f64>, rect: &Rect<f64>) -> f64 {
    let outer = ring_area_in_rect(polygon.exterior(), rect);
    let holes: f64 = polygon
        .interiors()
        .iter()
        .map(|h| ring_area_in_rect(h, rect))
        .sum();
    (outer - holes).max(0.0)
}

/// Area of `boundary` lying inside `rect`.
pub fn area_in_rect(boundary: &MultiPolygon<f64>, rect: &Rect<f64>) -> f64 {
    boundary.0.iter().map(|p| polygon_area_in_rect(p, rect)).sum()
}

/// Every ring edge of a multipolygon as a pair of endpoints.
pub fn ring_edges(boundary: &MultiPolygon<f64>) -> impl Iterator<Item = (Coord<f64>, Coord<f64>)> + '_ {
    boundary
        .0
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors().iter()))
        .flat_map(|ring| ring.lines().map(|l| (l.start, l.end)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{coord, polygon};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Rect<f64> {
        Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 })
    }

    #[test]
    fn fully_inside_cell_counts_whole_cell() {
        let p = polygon![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0), (x: 100.0, y: 100.0), (x: 0.0, y: 100.0)];
        assert_relative_eq!(polygon_area_in_rect(&p, &rect(25.0, 25.0, 50.0, 50.0)), 625.0);
    }

    #[test]
    fn half_covered_cell_counts_half() {
        // Diagonal through the unit cell.
        let p = polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 0.0, y: 10.0)];
        let a = polygon_area_in_rect(&p, &rect(0.0, 0.0, 10.0, 10.0));
        assert_relative_eq!(a, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn disjoint_cell_has_no_area() {
        let p = polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)];
        assert_eq!(polygon_area_in_rect(&p, &rect(20.0, 20.0, 30.0, 30.0)), 0.0);
    }

    #[test]
    fn concave_ring_clips_exactly() {
        // U shape: 30x30 square with a 10x20 notch cut from the top middle.
        let p = polygon![
            (x: 0.0, y: 0.0), (x: 30.0, y: 0.0), (x: 30.0, y: 30.0), (x: 20.0, y: 30.0),
            (x: 20.0, y: 10.0), (x: 10.0, y: 10.0), (x: 10.0, y: 30.0), (x: 0.0, y: 30.0)
        ];
        // Cell straddling the notch: rows 10..30 of columns 5..25.
        let a = polygon_area_in_rect(&p, &rect(5.0, 10.0, 25.0, 30.0));
        // Two 5x20 strips either side of the notch.
        assert_relative_eq!(a, 200.0, epsilon = 1e-9);
    }

    #[test]
    fn holes_are_subtracted() {
        let p = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (20.0, 0.0), (20.0, 20.0), (0.0, 20.0), (0.0, 0.0)]),
            vec![LineString::from(vec![(5.0, 5.0), (15.0, 5.0), (15.0, 15.0), (5.0, 15.0), (5.0, 5.0)])],
        );
        assert_relative_eq!(polygon_area_in_rect(&p, &rect(0.0, 0.0, 20.0, 20.0)), 300.0);
        assert_relative_eq!(polygon_area_in_rect(&p, &rect(5.0, 5.0, 15.0, 15.0)), 0.0);
    }

    #[test]
    fn ring_edges_cover_exterior_and_holes() {
        let p = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (20.0, 0.0), (20.0, 20.0), (0.0, 0.0)]),
            vec![LineString::from(vec![(5.0, 2.0), (6.0, 2.0), (6.0, 3.0), (5.0, 2.0)])],
        );
        let mp = MultiPolygon::new(vec![p]);
        assert_eq!(ring_edges(&mp).count(), 6);
    }
}
