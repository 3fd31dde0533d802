use crate::bounds::{Aabb2, Aabb3, Circle, Sphere};
use crate::index::{Position2, Position3, SpatialIndex2, SpatialIndex3};

/// Contiguous, unstructured baseline container. Every query is a scan with a
/// per-element containment test; `insert` always succeeds and `rebuild` has
/// nothing to do. Implements both the 2D and the 3D contract, depending on
/// what the element can project.
#[derive(Clone, Debug)]
pub struct Linear<T> {
    elements: Vec<T>,
}

impl<T> Linear<T> {
    pub fn new() -> Linear<T> {
        Linear {
            elements: Vec::new(),
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.elements
    }
}

impl<T> Default for Linear<T> {
    fn default() -> Linear<T> {
        Linear::new()
    }
}

impl<T> From<Vec<T>> for Linear<T> {
    fn from(elements: Vec<T>) -> Linear<T> {
        Linear { elements }
    }
}

impl<T> From<Linear<T>> for Vec<T> {
    fn from(linear: Linear<T>) -> Vec<T> {
        linear.elements
    }
}

impl<T: Position2 + Clone> SpatialIndex2<T> for Linear<T> {
    fn len(&self) -> usize {
        self.elements.len()
    }

    fn insert(&mut self, element: T) -> bool {
        self.elements.push(element);
        true
    }

    fn clear(&mut self) {
        self.elements.clear();
    }

    fn query_box<'a>(&'a self, range: &Aabb2, out: &mut Vec<&'a T>) {
        out.extend(
            self.elements
                .iter()
                .filter(|element| range.contains(element.position())),
        );
    }

    fn query_ball<'a>(&'a self, range: &Circle, out: &mut Vec<&'a T>) {
        out.extend(
            self.elements
                .iter()
                .filter(|element| range.contains(element.position())),
        );
    }

    fn query_all<'a>(&'a self, out: &mut Vec<&'a T>) {
        out.reserve(self.elements.len());
        out.extend(self.elements.iter());
    }

    fn elements(&self, out: &mut Vec<T>) {
        out.reserve(self.elements.len());
        out.extend(self.elements.iter().cloned());
    }

    fn rebuild(&mut self) {}
}

impl<T: Position3 + Clone> SpatialIndex3<T> for Linear<T> {
    fn len(&self) -> usize {
        self.elements.len()
    }

    fn insert(&mut self, element: T) -> bool {
        self.elements.push(element);
        true
    }

    fn clear(&mut self) {
        self.elements.clear();
    }

    fn query_box<'a>(&'a self, range: &Aabb3, out: &mut Vec<&'a T>) {
        out.extend(
            self.elements
                .iter()
                .filter(|element| range.contains(element.position())),
        );
    }

    fn query_ball<'a>(&'a self, range: &Sphere, out: &mut Vec<&'a T>) {
        out.extend(
            self.elements
                .iter()
                .filter(|element| range.contains(element.position())),
        );
    }

    fn query_all<'a>(&'a self, out: &mut Vec<&'a T>) {
        out.reserve(self.elements.len());
        out.extend(self.elements.iter());
    }

    fn elements(&self, out: &mut Vec<T>) {
        out.reserve(self.elements.len());
        out.extend(self.elements.iter().cloned());
    }

    fn rebuild(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Point2;

    fn p2(x: f32, y: f32) -> Point2<f32> {
        Point2::new(x, y)
    }

    #[test]
    fn conversions_round_trip() {
        let linear = Linear::from(vec![p2(1.0, 2.0), p2(3.0, 4.0)]);
        assert_eq!(SpatialIndex2::len(&linear), 2);
        let back: Vec<Point2<f32>> = linear.into();
        assert_eq!(back.len(), 2);
    }

    #[test]
    fn queries_scan_every_element() {
        let mut linear = Linear::new();
        SpatialIndex2::insert(&mut linear, p2(0.0, 0.0));
        SpatialIndex2::insert(&mut linear, p2(5.0, 5.0));

        let mut found = Vec::new();
        SpatialIndex2::query_ball(&linear, &Circle::new(p2(0.0, 0.0), 1.0), &mut found);
        assert_eq!(found.len(), 1);

        found.clear();
        SpatialIndex2::query_box(
            &linear,
            &Aabb2::new(p2(-1.0, -1.0), p2(6.0, 6.0)),
            &mut found,
        );
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn rebuild_is_a_no_op() {
        let mut linear = Linear::from(vec![p2(1.0, 1.0)]);
        SpatialIndex2::rebuild(&mut linear);
        assert_eq!(linear.as_slice(), &[p2(1.0, 1.0)]);
    }
}
