use crate::bounds::{Aabb2, Circle};
use crate::index::{Position2, SpatialIndex2};
use cgmath::Point2;
use smallvec::SmallVec;

/// Quadtree with a compile-time per-node capacity.
///
/// A node keeps up to `CAP` elements inline, with no heap allocation for
/// leaves. When a full node receives another element it subdivides about its
/// center into four children and pushes the new element down; the elements
/// already in the node stay where they are. Children own their quadrants
/// exclusively.
#[derive(Clone, Debug)]
pub struct Quadtree<T, const CAP: usize> {
    bounds: Aabb2,
    elements: SmallVec<[T; CAP]>,
    children: Option<Box<[Quadtree<T, CAP>; 4]>>,
}

impl<T, const CAP: usize> Quadtree<T, CAP> {
    const VALID_CAPACITY: () = assert!(CAP >= 1 && CAP <= 255, "node capacity must be 1..=255");

    pub fn new(bounds: Aabb2) -> Quadtree<T, CAP> {
        let () = Self::VALID_CAPACITY;
        Quadtree {
            bounds,
            elements: SmallVec::new(),
            children: None,
        }
    }

    pub fn bounds(&self) -> Aabb2 {
        self.bounds
    }

    /// Longest root-to-leaf chain; 1 while the root has not subdivided.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, level)) = stack.pop() {
            depth = depth.max(level);
            if let Some(children) = &node.children {
                for child in children.iter() {
                    stack.push((child, level + 1));
                }
            }
        }
        depth
    }

    /// Child index for a point relative to the node center: bit 0 selects
    /// the high-x half, bit 1 the high-y half.
    fn quadrant(center: Point2<f32>, p: Point2<f32>) -> usize {
        (p.x >= center.x) as usize | (((p.y >= center.y) as usize) << 1)
    }

    fn subdivide(&mut self) -> &mut [Quadtree<T, CAP>; 4] {
        let bounds = self.bounds;
        let children = self.children.get_or_insert_with(|| {
            let center = bounds.center();
            Box::new([
                Quadtree::new(Aabb2::new(bounds.min, center)),
                Quadtree::new(Aabb2::new(
                    Point2::new(center.x, bounds.min.y),
                    Point2::new(bounds.max.x, center.y),
                )),
                Quadtree::new(Aabb2::new(
                    Point2::new(bounds.min.x, center.y),
                    Point2::new(center.x, bounds.max.y),
                )),
                Quadtree::new(Aabb2::new(center, bounds.max)),
            ])
        });
        &mut **children
    }
}

impl<T: Position2 + Clone, const CAP: usize> SpatialIndex2<T> for Quadtree<T, CAP> {
    fn len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += node.elements.len();
            if let Some(children) = &node.children {
                stack.extend(children.iter());
            }
        }
        count
    }

    fn insert(&mut self, element: T) -> bool {
        let p = element.position();
        if !self.bounds.contains(p) {
            return false;
        }
        let mut node = self;
        loop {
            if node.elements.len() < CAP {
                node.elements.push(element);
                return true;
            }
            let center = node.bounds.center();
            node = &mut node.subdivide()[Self::quadrant(center, p)];
        }
    }

    fn clear(&mut self) {
        self.elements.clear();
        self.children = None;
    }

    fn query_box<'a>(&'a self, range: &Aabb2, out: &mut Vec<&'a T>) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if !node.bounds.overlaps(range) {
                continue;
            }
            for element in &node.elements {
                if range.contains(element.position()) {
                    out.push(element);
                }
            }
            if let Some(children) = &node.children {
                stack.extend(children.iter());
            }
        }
    }

    fn query_ball<'a>(&'a self, range: &Circle, out: &mut Vec<&'a T>) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if !range.overlaps_box(&node.bounds) {
                continue;
            }
            for element in &node.elements {
                if range.contains(element.position()) {
                    out.push(element);
                }
            }
            if let Some(children) = &node.children {
                stack.extend(children.iter());
            }
        }
    }

    fn query_all<'a>(&'a self, out: &mut Vec<&'a T>) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.reserve(node.elements.len());
            out.extend(node.elements.iter());
            if let Some(children) = &node.children {
                stack.extend(children.iter());
            }
        }
    }

    fn elements(&self, out: &mut Vec<T>) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.reserve(node.elements.len());
            out.extend(node.elements.iter().cloned());
            if let Some(children) = &node.children {
                stack.extend(children.iter());
            }
        }
    }
}
