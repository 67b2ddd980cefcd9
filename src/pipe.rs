use crate::geometry::{elbow_path, Point};
use crate::tank::Tank;

/// Directed conduit between two neighbouring tanks. Holds no liquid; the
/// flowing flag is a per-tick display signal.
#[derive(Clone, Debug)]
pub struct Pipe {
    source: usize,
    destination: usize,
    path: Vec<Point>,
    flowing: bool,
}

impl Pipe {
    pub fn connect(source: usize, from: &Tank, destination: usize, to: &Tank) -> Self {
        Self {
            source,
            destination,
            path: elbow_path(from.bottom_center(), to.top_center()),
            flowing: false,
        }
    }

    pub fn source(&self) -> usize {
        self.source
    }

    pub fn destination(&self) -> usize {
        self.destination
    }

    pub fn path(&self) -> &[Point] {
        &self.path
    }

    pub fn is_flowing(&self) -> bool {
        self.flowing
    }

    pub fn set_flowing(&mut self, flowing: bool) {
        self.flowing = flowing;
    }
}
