use serde::{Deserialize, Serialize};

/// Pixel coordinate of a landmark. Signed since landmark oracles may place
/// points slightly outside the frame when a face touches its edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Point {
        Point { x, y }
    }

    // z component of (a - self) x (b - self). Wide enough for any two i32
    // differences multiplied together.
    pub fn cross(&self, a: Point, b: Point) -> i128 {
        let ax = a.x as i128 - self.x as i128;
        let ay = a.y as i128 - self.y as i128;
        let bx = b.x as i128 - self.x as i128;
        let by = b.y as i128 - self.y as i128;

        ax * by - ay * bx
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Point {
        Point { x, y }
    }
}

impl From<Point> for imageproc::point::Point<i32> {
    fn from(p: Point) -> Self {
        imageproc::point::Point::new(p.x, p.y)
    }
}
