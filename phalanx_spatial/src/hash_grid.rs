use crate::bounds::{Aabb2, Aabb3, Circle, Sphere};
use crate::index::{Position2, Position3, SpatialIndex2, SpatialIndex3};
use crate::SpatialError;
use bit_set::BitSet;
use cgmath::{Point2, Point3, Vector2, Vector3};
use itertools::iproduct;

// Cell hashing constants, one odd prime-ish multiplier per axis.
const HASH_X: i32 = 92_837_111;
const HASH_Y: i32 = 689_287_499;
const HASH_Z: i32 = 1_900_534_178;

/// 2D hash grid: an unbounded tiling of fixed-size cells mapped onto a fixed
/// number of buckets.
///
/// Unlike [`Grid2`](crate::Grid2) there are no declared bounds, so `insert`
/// always succeeds; the price is that distant cells can share a bucket and
/// queries have to filter the union of the candidate buckets.
pub struct HashGrid2<T> {
    cell_size: Vector2<f32>,
    buckets: Vec<Vec<T>>,
}

impl<T> HashGrid2<T> {
    /// Fails when any axis of the cell size is not positive or when no
    /// buckets are requested.
    pub fn new(cell_size: Vector2<f32>, n_buckets: usize) -> Result<HashGrid2<T>, SpatialError> {
        if cell_size.x <= 0.0 || cell_size.y <= 0.0 {
            return Err(SpatialError::InvalidCellSize);
        }
        if n_buckets < 1 {
            return Err(SpatialError::InvalidBucketCount);
        }
        let mut buckets = Vec::new();
        buckets.resize_with(n_buckets, Vec::new);
        Ok(HashGrid2 { cell_size, buckets })
    }

    pub fn cell_size(&self) -> Vector2<f32> {
        self.cell_size
    }

    fn cell_of(&self, p: Point2<f32>) -> Vector2<i32> {
        Vector2::new(
            (p.x / self.cell_size.x).floor() as i32,
            (p.y / self.cell_size.y).floor() as i32,
        )
    }

    fn bucket_index(&self, cell: Vector2<i32>) -> usize {
        let hash = (cell.x.wrapping_mul(HASH_X) ^ cell.y.wrapping_mul(HASH_Y)).unsigned_abs();
        hash as usize % self.buckets.len()
    }

    fn cell_bounds(&self, x: i32, y: i32) -> Aabb2 {
        Aabb2::new(
            Point2::new(x as f32 * self.cell_size.x, y as f32 * self.cell_size.y),
            Point2::new(
                (x + 1) as f32 * self.cell_size.x,
                (y + 1) as f32 * self.cell_size.y,
            ),
        )
    }
}

impl<T: Position2 + Clone> SpatialIndex2<T> for HashGrid2<T> {
    fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    fn insert(&mut self, element: T) -> bool {
        let cell = self.cell_of(element.position());
        let index = self.bucket_index(cell);
        self.buckets[index].push(element);
        true
    }

    fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }

    fn query_box<'a>(&'a self, range: &Aabb2, out: &mut Vec<&'a T>) {
        // Several cells can land in one bucket; visit each bucket once.
        let mut candidates = BitSet::with_capacity(self.buckets.len());
        let start = self.cell_of(range.min);
        let end = self.cell_of(range.max);
        for (y, x) in iproduct!(start.y..=end.y, start.x..=end.x) {
            candidates.insert(self.bucket_index(Vector2::new(x, y)));
        }

        for index in candidates.iter() {
            for element in &self.buckets[index] {
                if range.contains(element.position()) {
                    out.push(element);
                }
            }
        }
    }

    fn query_ball<'a>(&'a self, range: &Circle, out: &mut Vec<&'a T>) {
        let mut candidates = BitSet::with_capacity(self.buckets.len());
        let enclosing = range.bounds();
        let start = self.cell_of(enclosing.min);
        let end = self.cell_of(enclosing.max);
        for (y, x) in iproduct!(start.y..=end.y, start.x..=end.x) {
            if range.overlaps_box(&self.cell_bounds(x, y)) {
                candidates.insert(self.bucket_index(Vector2::new(x, y)));
            }
        }

        for index in candidates.iter() {
            for element in &self.buckets[index] {
                if range.contains(element.position()) {
                    out.push(element);
                }
            }
        }
    }

    fn query_all<'a>(&'a self, out: &mut Vec<&'a T>) {
        for bucket in &self.buckets {
            out.reserve(bucket.len());
            out.extend(bucket.iter());
        }
    }

    fn elements(&self, out: &mut Vec<T>) {
        for bucket in &self.buckets {
            out.reserve(bucket.len());
            out.extend(bucket.iter().cloned());
        }
    }
}

/// 3D hash grid. The 3D sibling of [`HashGrid2`].
pub struct HashGrid3<T> {
    cell_size: Vector3<f32>,
    buckets: Vec<Vec<T>>,
}

impl<T> HashGrid3<T> {
    pub fn new(cell_size: Vector3<f32>, n_buckets: usize) -> Result<HashGrid3<T>, SpatialError> {
        if cell_size.x <= 0.0 || cell_size.y <= 0.0 || cell_size.z <= 0.0 {
            return Err(SpatialError::InvalidCellSize);
        }
        if n_buckets < 1 {
            return Err(SpatialError::InvalidBucketCount);
        }
        let mut buckets = Vec::new();
        buckets.resize_with(n_buckets, Vec::new);
        Ok(HashGrid3 { cell_size, buckets })
    }

    pub fn cell_size(&self) -> Vector3<f32> {
        self.cell_size
    }

    fn cell_of(&self, p: Point3<f32>) -> Vector3<i32> {
        Vector3::new(
            (p.x / self.cell_size.x).floor() as i32,
            (p.y / self.cell_size.y).floor() as i32,
            (p.z / self.cell_size.z).floor() as i32,
        )
    }

    fn bucket_index(&self, cell: Vector3<i32>) -> usize {
        let hash = (cell.x.wrapping_mul(HASH_X)
            ^ cell.y.wrapping_mul(HASH_Y)
            ^ cell.z.wrapping_mul(HASH_Z))
        .unsigned_abs();
        hash as usize % self.buckets.len()
    }

    fn cell_bounds(&self, x: i32, y: i32, z: i32) -> Aabb3 {
        Aabb3::new(
            Point3::new(
                x as f32 * self.cell_size.x,
                y as f32 * self.cell_size.y,
                z as f32 * self.cell_size.z,
            ),
            Point3::new(
                (x + 1) as f32 * self.cell_size.x,
                (y + 1) as f32 * self.cell_size.y,
                (z + 1) as f32 * self.cell_size.z,
            ),
        )
    }
}

impl<T: Position3 + Clone> SpatialIndex3<T> for HashGrid3<T> {
    fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    fn insert(&mut self, element: T) -> bool {
        let cell = self.cell_of(element.position());
        let index = self.bucket_index(cell);
        self.buckets[index].push(element);
        true
    }

    fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }

    fn query_box<'a>(&'a self, range: &Aabb3, out: &mut Vec<&'a T>) {
        let mut candidates = BitSet::with_capacity(self.buckets.len());
        let start = self.cell_of(range.min);
        let end = self.cell_of(range.max);
        for (z, y, x) in iproduct!(start.z..=end.z, start.y..=end.y, start.x..=end.x) {
            candidates.insert(self.bucket_index(Vector3::new(x, y, z)));
        }

        for index in candidates.iter() {
            for element in &self.buckets[index] {
                if range.contains(element.position()) {
                    out.push(element);
                }
            }
        }
    }

    fn query_ball<'a>(&'a self, range: &Sphere, out: &mut Vec<&'a T>) {
        let mut candidates = BitSet::with_capacity(self.buckets.len());
        let enclosing = range.bounds();
        let start = self.cell_of(enclosing.min);
        let end = self.cell_of(enclosing.max);
        for (z, y, x) in iproduct!(start.z..=end.z, start.y..=end.y, start.x..=end.x) {
            if range.overlaps_box(&self.cell_bounds(x, y, z)) {
                candidates.insert(self.bucket_index(Vector3::new(x, y, z)));
            }
        }

        for index in candidates.iter() {
            for element in &self.buckets[index] {
                if range.contains(element.position()) {
                    out.push(element);
                }
            }
        }
    }

    fn query_all<'a>(&'a self, out: &mut Vec<&'a T>) {
        for bucket in &self.buckets {
            out.reserve(bucket.len());
            out.extend(bucket.iter());
        }
    }

    fn elements(&self, out: &mut Vec<T>) {
        for bucket in &self.buckets {
            out.reserve(bucket.len());
            out.extend(bucket.iter().cloned());
        }
    }
}
