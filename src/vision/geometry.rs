//! Polygon geometry for box extraction
//!
//! Minimum-area rectangles via rotating calipers over the convex hull, polygon
//! area, and adaptive expansion of detected quadrilaterals.

use crate::config::ExpansionConfig;

/// A point in pixel space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Cross product of (b - a) x (c - a); positive for a counter-clockwise turn
fn cross(a: &Point, b: &Point, c: &Point) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Absolute polygon area using the shoelace formula
pub fn polygon_area(points: &[Point]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }

    let n = points.len();
    let twice_area: f32 = (0..n)
        .map(|i| {
            let j = (i + 1) % n;
            points[i].x * points[j].y - points[j].x * points[i].y
        })
        .sum();

    twice_area.abs() / 2.0
}

/// Convex hull using Andrew's monotone chain, counter-clockwise without repeats
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    sorted.dedup();

    if sorted.len() < 3 {
        return sorted;
    }

    let mut lower: Vec<Point> = Vec::with_capacity(sorted.len());
    for p in &sorted {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<Point> = Vec::with_capacity(sorted.len());
    for p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(*p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Corners of the minimum-area enclosing rectangle of a point set
///
/// Degenerate inputs (fewer than three hull points) fall back to the
/// axis-aligned bounding rectangle. Returns `None` for an empty input.
pub fn min_area_rect(points: &[Point]) -> Option<[Point; 4]> {
    let hull = convex_hull(points);
    if hull.is_empty() {
        return None;
    }

    if hull.len() < 3 {
        let (min_x, min_y, max_x, max_y) = bounds(&hull);
        return Some([
            Point::new(min_x, min_y),
            Point::new(max_x, min_y),
            Point::new(max_x, max_y),
            Point::new(min_x, max_y),
        ]);
    }

    let mut best: Option<(f32, [Point; 4])> = None;
    let n = hull.len();

    for i in 0..n {
        let origin = hull[i];
        let next = hull[(i + 1) % n];

        let edge_x = next.x - origin.x;
        let edge_y = next.y - origin.y;
        let edge_len = edge_x.hypot(edge_y);
        if edge_len < f32::EPSILON {
            continue;
        }

        // Unit vectors along the edge and perpendicular to it
        let (ux, uy) = (edge_x / edge_len, edge_y / edge_len);
        let (vx, vy) = (-uy, ux);

        let mut min_u = f32::MAX;
        let mut max_u = f32::MIN;
        let mut min_v = f32::MAX;
        let mut max_v = f32::MIN;

        for p in &hull {
            let dx = p.x - origin.x;
            let dy = p.y - origin.y;
            let proj_u = dx * ux + dy * uy;
            let proj_v = dx * vx + dy * vy;
            min_u = min_u.min(proj_u);
            max_u = max_u.max(proj_u);
            min_v = min_v.min(proj_v);
            max_v = max_v.max(proj_v);
        }

        let area = (max_u - min_u) * (max_v - min_v);
        if best.as_ref().is_some_and(|(best_area, _)| *best_area <= area) {
            continue;
        }

        let corner = |u: f32, v: f32| Point::new(origin.x + u * ux + v * vx, origin.y + u * uy + v * vy);
        best = Some((
            area,
            [
                corner(min_u, min_v),
                corner(max_u, min_v),
                corner(max_u, max_v),
                corner(min_u, max_v),
            ],
        ));
    }

    best.map(|(_, rect)| rect)
}

/// Axis-aligned bounds `(min_x, min_y, max_x, max_y)` of a point set
pub fn bounds(points: &[Point]) -> (f32, f32, f32, f32) {
    points.iter().fold(
        (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        |(min_x, min_y, max_x, max_y), p| (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y)),
    )
}

/// Expand a polygon outward from its centroid by a size-proportional, clamped pad
///
/// Per axis, `pad = clamp(size * ratio, min_pad, max_pad)` and every corner
/// vector from the centroid is scaled by `(size + 2 * pad) / size`. Sizes below
/// one pixel are treated as one pixel. Coordinates are rounded to integers.
pub fn expand_polygon_adaptive(polygon: &[Point], params: &ExpansionConfig) -> Vec<(i32, i32)> {
    if polygon.is_empty() {
        return Vec::new();
    }

    let (scale_x, scale_y) = expansion_scale(polygon, params);
    scale_polygon(polygon, scale_x, scale_y)
        .into_iter()
        .map(|p| (p.x.round() as i32, p.y.round() as i32))
        .collect()
}

/// Per-axis scale factors used by [`expand_polygon_adaptive`]
pub fn expansion_scale(polygon: &[Point], params: &ExpansionConfig) -> (f32, f32) {
    let (min_x, min_y, max_x, max_y) = bounds(polygon);
    let width = (max_x - min_x).max(1.0);
    let height = (max_y - min_y).max(1.0);

    let pad_w = (width * params.ratio_w).clamp(params.min_pad_w, params.max_pad_w);
    let pad_h = (height * params.ratio_h).clamp(params.min_pad_h, params.max_pad_h);

    ((width + 2.0 * pad_w) / width, (height + 2.0 * pad_h) / height)
}

/// Scale every point's offset from the centroid by the given factors
pub fn scale_polygon(polygon: &[Point], scale_x: f32, scale_y: f32) -> Vec<Point> {
    let n = polygon.len() as f32;
    let cx = polygon.iter().map(|p| p.x).sum::<f32>() / n;
    let cy = polygon.iter().map(|p| p.y).sum::<f32>() / n;

    polygon
        .iter()
        .map(|p| Point::new(cx + (p.x - cx) * scale_x, cy + (p.y - cy) * scale_y))
        .collect()
}
