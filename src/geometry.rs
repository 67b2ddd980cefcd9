use serde::Serialize;

/// Position in layout units, one unit per pixel of a 1000x700 window.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn top_center(&self) -> Point {
        Point::new(self.x + self.w / 2.0, self.y)
    }

    pub fn bottom_center(&self) -> Point {
        Point::new(self.x + self.w / 2.0, self.y + self.h)
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    /// Smallest rect containing both.
    pub fn union(&self, o: &Rect) -> Rect {
        let x = self.x.min(o.x);
        let y = self.y.min(o.y);
        Rect::new(x, y, self.right().max(o.right()) - x, self.bottom().max(o.bottom()) - y)
    }

    pub fn inflate(&self, by: f32) -> Rect {
        Rect::new(self.x - by, self.y - by, self.w + 2.0 * by, self.h + 2.0 * by)
    }
}

/// Down from `a`, across at the vertical midpoint, down into `b`.
pub fn elbow_path(a: Point, b: Point) -> Vec<Point> {
    let mid = (a.y + b.y) / 2.0;
    vec![a, Point::new(a.x, mid), Point::new(b.x, mid), b]
}
