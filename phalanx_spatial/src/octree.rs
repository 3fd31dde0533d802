use crate::bounds::{Aabb3, Sphere};
use crate::index::{Position3, SpatialIndex3};
use cgmath::Point3;
use smallvec::SmallVec;

/// Octree with a compile-time per-node capacity. The 3D sibling of
/// [`Quadtree`](crate::Quadtree): full nodes subdivide about their center
/// into eight octants and push new elements down, keeping the resident
/// elements in place.
#[derive(Clone, Debug)]
pub struct Octree<T, const CAP: usize> {
    bounds: Aabb3,
    elements: SmallVec<[T; CAP]>,
    children: Option<Box<[Octree<T, CAP>; 8]>>,
}

fn octant_bounds(bounds: &Aabb3, center: Point3<f32>, octant: usize) -> Aabb3 {
    let min = Point3::new(
        if octant & 1 == 0 { bounds.min.x } else { center.x },
        if octant & 2 == 0 { bounds.min.y } else { center.y },
        if octant & 4 == 0 { bounds.min.z } else { center.z },
    );
    let max = Point3::new(
        if octant & 1 == 0 { center.x } else { bounds.max.x },
        if octant & 2 == 0 { center.y } else { bounds.max.y },
        if octant & 4 == 0 { center.z } else { bounds.max.z },
    );
    Aabb3 { min, max }
}

impl<T, const CAP: usize> Octree<T, CAP> {
    const VALID_CAPACITY: () = assert!(CAP >= 1 && CAP <= 255, "node capacity must be 1..=255");

    pub fn new(bounds: Aabb3) -> Octree<T, CAP> {
        let () = Self::VALID_CAPACITY;
        Octree {
            bounds,
            elements: SmallVec::new(),
            children: None,
        }
    }

    pub fn bounds(&self) -> Aabb3 {
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
    /// the high-x half, bit 1 the high-y half, bit 2 the high-z half.
    fn octant(center: Point3<f32>, p: Point3<f32>) -> usize {
        (p.x >= center.x) as usize
            | (((p.y >= center.y) as usize) << 1)
            | (((p.z >= center.z) as usize) << 2)
    }

    fn subdivide(&mut self) -> &mut [Octree<T, CAP>; 8] {
        let bounds = self.bounds;
        let children = self.children.get_or_insert_with(|| {
            let center = bounds.center();
            Box::new(
                [0, 1, 2, 3, 4, 5, 6, 7]
                    .map(|octant| Octree::new(octant_bounds(&bounds, center, octant))),
            )
        });
        &mut **children
    }
}

impl<T: Position3 + Clone, const CAP: usize> SpatialIndex3<T> for Octree<T, CAP> {
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
            node = &mut node.subdivide()[Self::octant(center, p)];
        }
    }

    fn clear(&mut self) {
        self.elements.clear();
        self.children = None;
    }

    fn query_box<'a>(&'a self, range: &Aabb3, out: &mut Vec<&'a T>) {
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

    fn query_ball<'a>(&'a self, range: &Sphere, out: &mut Vec<&'a T>) {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn p3(x: f32, y: f32, z: f32) -> Point3<f32> {
        Point3::new(x, y, z)
    }

    fn unit_tree() -> Octree<Point3<f32>, 2> {
        Octree::new(Aabb3::new(p3(0.0, 0.0, 0.0), p3(1.0, 1.0, 1.0)))
    }

    #[test]
    fn octants_partition_the_bounds() {
        let bounds = Aabb3::new(p3(0.0, 0.0, 0.0), p3(2.0, 2.0, 2.0));
        let center = bounds.center();
        for octant in 0..8 {
            let child = octant_bounds(&bounds, center, octant);
            assert_eq!(child.diagonal(), cgmath::Vector3::new(1.0, 1.0, 1.0));
            assert!(bounds.contains(child.min));
            assert!(bounds.contains(child.max));
        }
        assert_eq!(octant_bounds(&bounds, center, 0).min, bounds.min);
        assert_eq!(octant_bounds(&bounds, center, 7).max, bounds.max);
    }

    #[test]
    fn insert_rejects_points_outside_the_root() {
        let mut tree = unit_tree();
        assert!(!tree.insert(p3(0.5, 0.5, -0.1)));
        assert!(tree.insert(p3(0.5, 0.5, 0.5)));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn overflow_subdivides_into_octants() {
        let mut tree = unit_tree();
        for i in 0..2 {
            for j in 0..2 {
                for k in 0..2 {
                    let p = p3(
                        0.25 + 0.5 * i as f32,
                        0.25 + 0.5 * j as f32,
                        0.25 + 0.5 * k as f32,
                    );
                    assert!(tree.insert(p));
                }
            }
        }
        assert_eq!(tree.len(), 8);
        assert!(tree.depth() > 1);

        let mut found = Vec::new();
        tree.query_box(
            &Aabb3::new(p3(0.0, 0.0, 0.0), p3(0.5, 0.5, 0.5)),
            &mut found,
        );
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn ball_queries_match_containment() {
        let mut tree = unit_tree();
        tree.insert(p3(0.5, 0.5, 0.5));
        tree.insert(p3(0.5, 0.5, 0.9));
        tree.insert(p3(0.1, 0.1, 0.1));

        let mut found = Vec::new();
        tree.query_ball(&Sphere::new(p3(0.5, 0.5, 0.5), 0.45), &mut found);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn rebuild_keeps_size_and_contents() {
        let mut tree = unit_tree();
        for i in 0..20 {
            tree.insert(p3(
                (i % 4) as f32 * 0.25 + 0.1,
                (i % 5) as f32 * 0.2 + 0.05,
                (i % 2) as f32 * 0.5 + 0.2,
            ));
        }
        let before = tree.len();
        tree.rebuild();
        assert_eq!(tree.len(), before);
    }
}
