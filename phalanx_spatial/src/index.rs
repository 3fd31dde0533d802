use crate::bounds::{Aabb2, Aabb3, Circle, Sphere};
use cgmath::{Point2, Point3};

/// Projection from an element to its 2D position. Implement this for
/// whatever the containers should store; bare points implement it already,
/// and so do references to anything that implements it, for callers indexing
/// elements that live elsewhere.
pub trait Position2 {
    fn position(&self) -> Point2<f32>;
}

/// Projection from an element to its 3D position.
pub trait Position3 {
    fn position(&self) -> Point3<f32>;
}

impl Position2 for Point2<f32> {
    fn position(&self) -> Point2<f32> {
        *self
    }
}

impl Position3 for Point3<f32> {
    fn position(&self) -> Point3<f32> {
        *self
    }
}

impl<'a, P: Position2 + ?Sized> Position2 for &'a P {
    fn position(&self) -> Point2<f32> {
        (**self).position()
    }
}

impl<'a, P: Position3 + ?Sized> Position3 for &'a P {
    fn position(&self) -> Point3<f32> {
        (**self).position()
    }
}

/// Contract shared by every 2D spatial container.
///
/// Elements are stored by value. Queries append matching borrows to `out`
/// without clearing it; the borrows stay valid until the next structural
/// mutation (`insert`, `clear`, `rebuild`), which the borrow checker
/// enforces. An element matches a range exactly when its position lies
/// inside it, boundaries included.
pub trait SpatialIndex2<T: Position2 + Clone> {
    /// Number of successfully inserted elements.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns false only when the container has declared bounds and the
    /// element lies outside them.
    fn insert(&mut self, element: T) -> bool;

    /// Remove every element, keeping the configuration.
    fn clear(&mut self);

    fn query_box<'a>(&'a self, range: &Aabb2, out: &mut Vec<&'a T>);

    fn query_ball<'a>(&'a self, range: &Circle, out: &mut Vec<&'a T>);

    fn query_all<'a>(&'a self, out: &mut Vec<&'a T>);

    /// Copy every element into `out`, appending.
    fn elements(&self, out: &mut Vec<T>);

    /// Snapshot all elements, clear, and reinsert them. Containers whose
    /// layout cannot degrade override this with something cheaper.
    fn rebuild(&mut self) {
        let mut snapshot = Vec::with_capacity(self.len());
        self.elements(&mut snapshot);
        self.clear();
        for element in snapshot {
            self.insert(element);
        }
    }
}

/// Contract shared by every 3D spatial container. Mirrors [`SpatialIndex2`].
pub trait SpatialIndex3<T: Position3 + Clone> {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&mut self, element: T) -> bool;

    fn clear(&mut self);

    fn query_box<'a>(&'a self, range: &Aabb3, out: &mut Vec<&'a T>);

    fn query_ball<'a>(&'a self, range: &Sphere, out: &mut Vec<&'a T>);

    fn query_all<'a>(&'a self, out: &mut Vec<&'a T>);

    fn elements(&self, out: &mut Vec<T>);

    fn rebuild(&mut self) {
        let mut snapshot = Vec::with_capacity(self.len());
        self.elements(&mut snapshot);
        self.clear();
        for element in snapshot {
            self.insert(element);
        }
    }
}
