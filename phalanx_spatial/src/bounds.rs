use cgmath::{MetricSpace, Point2, Point3, Vector2, Vector3};

/// 2D axis-aligned bounding box. Containment is inclusive on every face, so
/// a point on the boundary belongs to the box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb2 {
    pub min: Point2<f32>,
    pub max: Point2<f32>,
}

impl Aabb2 {
    /// Build a box from two corner points in any order.
    pub fn new(p1: Point2<f32>, p2: Point2<f32>) -> Aabb2 {
        Aabb2 {
            min: Point2::new(p1.x.min(p2.x), p1.y.min(p2.y)),
            max: Point2::new(p1.x.max(p2.x), p1.y.max(p2.y)),
        }
    }

    /// Vector from the minimum corner to the maximum corner.
    pub fn diagonal(&self) -> Vector2<f32> {
        self.max - self.min
    }

    pub fn center(&self) -> Point2<f32> {
        self.min + self.diagonal() * 0.5
    }

    pub fn contains(&self, p: Point2<f32>) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn overlaps(&self, other: &Aabb2) -> bool {
        self.max.x >= other.min.x
            && self.min.x <= other.max.x
            && self.max.y >= other.min.y
            && self.min.y <= other.max.y
    }
}

/// 3D axis-aligned bounding box, inclusive on every face.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb3 {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb3 {
    pub fn new(p1: Point3<f32>, p2: Point3<f32>) -> Aabb3 {
        Aabb3 {
            min: Point3::new(p1.x.min(p2.x), p1.y.min(p2.y), p1.z.min(p2.z)),
            max: Point3::new(p1.x.max(p2.x), p1.y.max(p2.y), p1.z.max(p2.z)),
        }
    }

    pub fn diagonal(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn center(&self) -> Point3<f32> {
        self.min + self.diagonal() * 0.5
    }

    pub fn contains(&self, p: Point3<f32>) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    pub fn overlaps(&self, other: &Aabb3) -> bool {
        self.max.x >= other.min.x
            && self.min.x <= other.max.x
            && self.max.y >= other.min.y
            && self.min.y <= other.max.y
            && self.max.z >= other.min.z
            && self.min.z <= other.max.z
    }
}

/// A circle query range: all points within `radius` of `center`, boundary
/// included.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Circle {
    pub center: Point2<f32>,
    pub radius: f32,
}

impl Circle {
    pub fn new(center: Point2<f32>, radius: f32) -> Circle {
        Circle { center, radius }
    }

    /// The tightest box enclosing the circle.
    pub fn bounds(&self) -> Aabb2 {
        let r = Vector2::new(self.radius, self.radius);
        Aabb2::new(self.center - r, self.center + r)
    }

    pub fn contains(&self, p: Point2<f32>) -> bool {
        p.distance2(self.center) <= self.radius * self.radius
    }

    /// Whether any point of the box lies within the circle. Clamping the
    /// center onto the box finds the nearest such point, which also covers a
    /// circle entirely inside the box.
    pub fn overlaps_box(&self, b: &Aabb2) -> bool {
        let nearest = Point2::new(
            self.center.x.max(b.min.x).min(b.max.x),
            self.center.y.max(b.min.y).min(b.max.y),
        );
        self.contains(nearest)
    }
}

/// A sphere query range, boundary included.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere {
    pub center: Point3<f32>,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Point3<f32>, radius: f32) -> Sphere {
        Sphere { center, radius }
    }

    pub fn bounds(&self) -> Aabb3 {
        let r = Vector3::new(self.radius, self.radius, self.radius);
        Aabb3::new(self.center - r, self.center + r)
    }

    pub fn contains(&self, p: Point3<f32>) -> bool {
        p.distance2(self.center) <= self.radius * self.radius
    }

    pub fn overlaps_box(&self, b: &Aabb3) -> bool {
        let nearest = Point3::new(
            self.center.x.max(b.min.x).min(b.max.x),
            self.center.y.max(b.min.y).min(b.max.y),
            self.center.z.max(b.min.z).min(b.max.z),
        );
        self.contains(nearest)
    }
}
