use super::point::Point;

/// Pixel rectangle anchored at its top-left corner. `right()` and `bottom()`
/// are exclusive.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn from_tl(x: u32, y: u32, w: u32, h: u32) -> Rect {
        Rect { x, y, w, h }
    }

    /// Smallest rect holding every point, clipped to a `width`x`height`
    /// frame. `None` when no point lands inside the frame.
    pub fn bounding(points: &[Point], width: u32, height: u32) -> Option<Rect> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        let left = min_x.max(0);
        let top = min_y.max(0);
        let right = max_x.saturating_add(1).min(width as i32);
        let bottom = max_y.saturating_add(1).min(height as i32);
        if left >= right || top >= bottom {
            return None;
        }

        Some(Rect::from_tl(
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        ))
    }

    pub fn left(&self) -> u32 {
        self.x
    }
    pub fn right(&self) -> u32 {
        self.x + self.w
    }
    pub fn top(&self) -> u32 {
        self.y
    }
    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }
    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.left().min(other.left());
        let top = self.top().min(other.top());
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());

        Rect::from_tl(left, top, right - left, bottom - top)
    }

    /// Grow by `by` pixels on each side without leaving a `width`x`height` frame.
    pub fn pad(&self, by: u32, width: u32, height: u32) -> Rect {
        let left = self.left().saturating_sub(by);
        let top = self.top().saturating_sub(by);
        let right = (self.right() + by).min(width);
        let bottom = (self.bottom() + by).min(height);

        Rect::from_tl(left, top, right - left, bottom - top)
    }
}
