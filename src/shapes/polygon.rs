use super::point::Point;
use super::rect::Rect;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polygon {
    pub points: Vec<Point>,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Convex hull of `points` in counter-clockwise order (y up), without
    /// repeated or collinear vertices. Monotone chain.
    pub fn convex_hull(points: &[Point]) -> Self {
        let mut sorted = points.to_vec();
        sorted.sort();
        sorted.dedup();

        if sorted.len() < 3 {
            return Self::new(sorted);
        }

        let mut lower: Vec<Point> = Vec::with_capacity(sorted.len());
        for p in sorted.iter() {
            while lower.len() >= 2 && lower[lower.len() - 2].cross(lower[lower.len() - 1], *p) <= 0
            {
                lower.pop();
            }
            lower.push(*p);
        }

        let mut upper: Vec<Point> = Vec::with_capacity(sorted.len());
        for p in sorted.iter().rev() {
            while upper.len() >= 2 && upper[upper.len() - 2].cross(upper[upper.len() - 1], *p) <= 0
            {
                upper.pop();
            }
            upper.push(*p);
        }

        lower.pop();
        upper.pop();
        lower.extend(upper);

        Self::new(lower)
    }

    /// Fewer than three vertices, or all of them on one line.
    pub fn is_degenerate(&self) -> bool {
        self.points.len() < 3
    }

    pub fn bounds(&self, width: u32, height: u32) -> Option<Rect> {
        Rect::bounding(&self.points, width, height)
    }

    pub fn contains_point(&self, point: Point) -> bool {
        let n = self.points.len();
        if n < 3 {
            return false;
        }

        // Hull winding is consistent, so the point is inside when it is on
        // the same side of every edge.
        let mut sign = 0i128;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            let c = a.cross(b, point);
            if c == 0 {
                continue;
            }
            if sign == 0 {
                sign = c.signum();
            } else if sign != c.signum() {
                return false;
            }
        }

        true
    }

    /// Part of a convex polygon inside the box spanning `left..=right` and
    /// `top..=bottom`. Cut points are rounded to the pixel grid.
    pub fn clip(&self, left: i32, top: i32, right: i32, bottom: i32) -> Self {
        let (l, t, r, b) = (left as f64, top as f64, right as f64, bottom as f64);
        let mut ring: Vec<(f64, f64)> = self
            .points
            .iter()
            .map(|p| (p.x as f64, p.y as f64))
            .collect();

        ring = clip_side(&ring, |p| p.0 >= l, |p, q| cut_at_x(p, q, l));
        ring = clip_side(&ring, |p| p.0 <= r, |p, q| cut_at_x(p, q, r));
        ring = clip_side(&ring, |p| p.1 >= t, |p, q| cut_at_y(p, q, t));
        ring = clip_side(&ring, |p| p.1 <= b, |p, q| cut_at_y(p, q, b));

        let mut points: Vec<Point> = Vec::with_capacity(ring.len());
        for (x, y) in ring {
            let p = Point::new(x.round() as i32, y.round() as i32);
            if points.last() != Some(&p) {
                points.push(p);
            }
        }
        while points.len() > 1 && points.first() == points.last() {
            points.pop();
        }

        Self::new(points)
    }

    pub fn to_imageproc(&self) -> Vec<imageproc::point::Point<i32>> {
        self.points.iter().map(|p| (*p).into()).collect()
    }
}

// One Sutherland-Hodgman pass against a single box side.
fn clip_side(
    ring: &[(f64, f64)],
    inside: impl Fn((f64, f64)) -> bool,
    cut: impl Fn((f64, f64), (f64, f64)) -> (f64, f64),
) -> Vec<(f64, f64)> {
    let mut out = Vec::with_capacity(ring.len() + 1);
    for (i, &cur) in ring.iter().enumerate() {
        let prev = ring[(i + ring.len() - 1) % ring.len()];
        match (inside(prev), inside(cur)) {
            (true, true) => out.push(cur),
            (true, false) => out.push(cut(prev, cur)),
            (false, true) => {
                out.push(cut(prev, cur));
                out.push(cur);
            }
            (false, false) => {}
        }
    }
    out
}

fn cut_at_x(p: (f64, f64), q: (f64, f64), x: f64) -> (f64, f64) {
    let t = (x - p.0) / (q.0 - p.0);
    (x, p.1 + t * (q.1 - p.1))
}

fn cut_at_y(p: (f64, f64), q: (f64, f64), y: f64) -> (f64, f64) {
    let t = (y - p.1) / (q.1 - p.1);
    (p.0 + t * (q.0 - p.0), y)
}
