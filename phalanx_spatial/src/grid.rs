use crate::bounds::{Aabb2, Aabb3, Circle, Sphere};
use crate::index::{Position2, Position3, SpatialIndex2, SpatialIndex3};
use crate::SpatialError;
use cgmath::{Vector2, Vector3};
use itertools::iproduct;

fn clamp_cell(cell: f32, resolution: i32) -> i32 {
    (cell.floor() as i32).max(0).min(resolution - 1)
}

/// Uniform 2D grid over fixed bounds.
///
/// The bounds are divided into `resolution.x * resolution.y` cells, each
/// owning a growable list of elements. Inserting costs one cell lookup;
/// queries visit only the cells their range can touch.
pub struct Grid2<T> {
    bounds: Aabb2,
    resolution: Vector2<i32>,
    cell_ratio: Vector2<f32>,
    cells: Vec<Vec<T>>,
}

impl<T> Grid2<T> {
    /// Fails when any axis of the resolution is below 1.
    pub fn new(bounds: Aabb2, resolution: Vector2<i32>) -> Result<Grid2<T>, SpatialError> {
        if resolution.x < 1 || resolution.y < 1 {
            return Err(SpatialError::InvalidResolution);
        }
        let diagonal = bounds.diagonal();
        let cell_ratio = Vector2::new(
            resolution.x as f32 / diagonal.x,
            resolution.y as f32 / diagonal.y,
        );
        let mut cells = Vec::new();
        cells.resize_with(resolution.x as usize * resolution.y as usize, Vec::new);
        Ok(Grid2 {
            bounds,
            resolution,
            cell_ratio,
            cells,
        })
    }

    pub fn bounds(&self) -> Aabb2 {
        self.bounds
    }

    pub fn resolution(&self) -> Vector2<i32> {
        self.resolution
    }

    fn cell_index(&self, x: i32, y: i32) -> usize {
        y as usize * self.resolution.x as usize + x as usize
    }

    /// Cell coordinates covered by a query box, clamped to the grid.
    fn cell_range(&self, range: &Aabb2) -> (Vector2<i32>, Vector2<i32>) {
        let lo = range.min - self.bounds.min;
        let hi = range.max - self.bounds.min;
        let start = Vector2::new(
            clamp_cell(lo.x * self.cell_ratio.x, self.resolution.x),
            clamp_cell(lo.y * self.cell_ratio.y, self.resolution.y),
        );
        let end = Vector2::new(
            clamp_cell(hi.x * self.cell_ratio.x, self.resolution.x),
            clamp_cell(hi.y * self.cell_ratio.y, self.resolution.y),
        );
        (start, end)
    }

    fn cell_bounds(&self, x: i32, y: i32) -> Aabb2 {
        Aabb2::new(
            self.bounds.min
                + Vector2::new(x as f32 / self.cell_ratio.x, y as f32 / self.cell_ratio.y),
            self.bounds.min
                + Vector2::new(
                    (x + 1) as f32 / self.cell_ratio.x,
                    (y + 1) as f32 / self.cell_ratio.y,
                ),
        )
    }
}

impl<T: Position2 + Clone> SpatialIndex2<T> for Grid2<T> {
    fn len(&self) -> usize {
        self.cells.iter().map(Vec::len).sum()
    }

    fn insert(&mut self, element: T) -> bool {
        let p = element.position();
        if !self.bounds.contains(p) {
            return false;
        }
        let offset = p - self.bounds.min;
        let x = clamp_cell(offset.x * self.cell_ratio.x, self.resolution.x);
        let y = clamp_cell(offset.y * self.cell_ratio.y, self.resolution.y);
        let index = self.cell_index(x, y);
        self.cells[index].push(element);
        true
    }

    fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
    }

    fn query_box<'a>(&'a self, range: &Aabb2, out: &mut Vec<&'a T>) {
        let (start, end) = self.cell_range(range);
        for (y, x) in iproduct!(start.y..=end.y, start.x..=end.x) {
            for element in &self.cells[self.cell_index(x, y)] {
                if range.contains(element.position()) {
                    out.push(element);
                }
            }
        }
    }

    fn query_ball<'a>(&'a self, range: &Circle, out: &mut Vec<&'a T>) {
        let (start, end) = self.cell_range(&range.bounds());
        for (y, x) in iproduct!(start.y..=end.y, start.x..=end.x) {
            if !range.overlaps_box(&self.cell_bounds(x, y)) {
                continue;
            }
            for element in &self.cells[self.cell_index(x, y)] {
                if range.contains(element.position()) {
                    out.push(element);
                }
            }
        }
    }

    fn query_all<'a>(&'a self, out: &mut Vec<&'a T>) {
        for cell in &self.cells {
            out.reserve(cell.len());
            out.extend(cell.iter());
        }
    }

    fn elements(&self, out: &mut Vec<T>) {
        for cell in &self.cells {
            out.reserve(cell.len());
            out.extend(cell.iter().cloned());
        }
    }
}

/// Uniform 3D grid over fixed bounds. The 3D sibling of [`Grid2`].
pub struct Grid3<T> {
    bounds: Aabb3,
    resolution: Vector3<i32>,
    cell_ratio: Vector3<f32>,
    cells: Vec<Vec<T>>,
}

impl<T> Grid3<T> {
    pub fn new(bounds: Aabb3, resolution: Vector3<i32>) -> Result<Grid3<T>, SpatialError> {
        if resolution.x < 1 || resolution.y < 1 || resolution.z < 1 {
            return Err(SpatialError::InvalidResolution);
        }
        let diagonal = bounds.diagonal();
        let cell_ratio = Vector3::new(
            resolution.x as f32 / diagonal.x,
            resolution.y as f32 / diagonal.y,
            resolution.z as f32 / diagonal.z,
        );
        let mut cells = Vec::new();
        cells.resize_with(
            resolution.x as usize * resolution.y as usize * resolution.z as usize,
            Vec::new,
        );
        Ok(Grid3 {
            bounds,
            resolution,
            cell_ratio,
            cells,
        })
    }

    pub fn bounds(&self) -> Aabb3 {
        self.bounds
    }

    pub fn resolution(&self) -> Vector3<i32> {
        self.resolution
    }

    fn cell_index(&self, x: i32, y: i32, z: i32) -> usize {
        (z as usize * self.resolution.y as usize + y as usize) * self.resolution.x as usize
            + x as usize
    }

    fn cell_range(&self, range: &Aabb3) -> (Vector3<i32>, Vector3<i32>) {
        let lo = range.min - self.bounds.min;
        let hi = range.max - self.bounds.min;
        let start = Vector3::new(
            clamp_cell(lo.x * self.cell_ratio.x, self.resolution.x),
            clamp_cell(lo.y * self.cell_ratio.y, self.resolution.y),
            clamp_cell(lo.z * self.cell_ratio.z, self.resolution.z),
        );
        let end = Vector3::new(
            clamp_cell(hi.x * self.cell_ratio.x, self.resolution.x),
            clamp_cell(hi.y * self.cell_ratio.y, self.resolution.y),
            clamp_cell(hi.z * self.cell_ratio.z, self.resolution.z),
        );
        (start, end)
    }

    fn cell_bounds(&self, x: i32, y: i32, z: i32) -> Aabb3 {
        Aabb3::new(
            self.bounds.min
                + Vector3::new(
                    x as f32 / self.cell_ratio.x,
                    y as f32 / self.cell_ratio.y,
                    z as f32 / self.cell_ratio.z,
                ),
            self.bounds.min
                + Vector3::new(
                    (x + 1) as f32 / self.cell_ratio.x,
                    (y + 1) as f32 / self.cell_ratio.y,
                    (z + 1) as f32 / self.cell_ratio.z,
                ),
        )
    }
}

impl<T: Position3 + Clone> SpatialIndex3<T> for Grid3<T> {
    fn len(&self) -> usize {
        self.cells.iter().map(Vec::len).sum()
    }

    fn insert(&mut self, element: T) -> bool {
        let p = element.position();
        if !self.bounds.contains(p) {
            return false;
        }
        let offset = p - self.bounds.min;
        let x = clamp_cell(offset.x * self.cell_ratio.x, self.resolution.x);
        let y = clamp_cell(offset.y * self.cell_ratio.y, self.resolution.y);
        let z = clamp_cell(offset.z * self.cell_ratio.z, self.resolution.z);
        let index = self.cell_index(x, y, z);
        self.cells[index].push(element);
        true
    }

    fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
    }

    fn query_box<'a>(&'a self, range: &Aabb3, out: &mut Vec<&'a T>) {
        let (start, end) = self.cell_range(range);
        for (z, y, x) in iproduct!(start.z..=end.z, start.y..=end.y, start.x..=end.x) {
            for element in &self.cells[self.cell_index(x, y, z)] {
                if range.contains(element.position()) {
                    out.push(element);
                }
            }
        }
    }

    fn query_ball<'a>(&'a self, range: &Sphere, out: &mut Vec<&'a T>) {
        let (start, end) = self.cell_range(&range.bounds());
        for (z, y, x) in iproduct!(start.z..=end.z, start.y..=end.y, start.x..=end.x) {
            if !range.overlaps_box(&self.cell_bounds(x, y, z)) {
                continue;
            }
            for element in &self.cells[self.cell_index(x, y, z)] {
                if range.contains(element.position()) {
                    out.push(element);
                }
            }
        }
    }

    fn query_all<'a>(&'a self, out: &mut Vec<&'a T>) {
        for cell in &self.cells {
            out.reserve(cell.len());
            out.extend(cell.iter());
        }
    }

    fn elements(&self, out: &mut Vec<T>) {
        for cell in &self.cells {
            out.reserve(cell.len());
            out.extend(cell.iter().cloned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Point2, Point3};

    fn p2(x: f32, y: f32) -> Point2<f32> {
        Point2::new(x, y)
    }

    fn unit_grid() -> Grid2<Point2<f32>> {
        Grid2::new(
            Aabb2::new(p2(-1.0, -1.0), p2(1.0, 1.0)),
            Vector2::new(4, 4),
        )
        .unwrap()
    }

    #[test]
    fn construction_rejects_degenerate_resolutions() {
        let bounds = Aabb2::new(p2(0.0, 0.0), p2(1.0, 1.0));
        assert_eq!(
            Grid2::<Point2<f32>>::new(bounds, Vector2::new(0, 4)).err(),
            Some(SpatialError::InvalidResolution)
        );
        assert!(Grid2::<Point2<f32>>::new(bounds, Vector2::new(1, 1)).is_ok());
    }

    #[test]
    fn insert_rejects_points_outside_the_bounds() {
        let mut grid = unit_grid();
        assert!(grid.insert(p2(0.5, 0.5)));
        assert!(!grid.insert(p2(1.5, 0.0)));
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn the_maximum_corner_lands_in_the_last_cell() {
        let mut grid = unit_grid();
        assert!(grid.insert(p2(1.0, 1.0)));
        assert_eq!(grid.len(), 1);

        let mut found = Vec::new();
        grid.query_box(&Aabb2::new(p2(0.9, 0.9), p2(1.0, 1.0)), &mut found);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn box_queries_filter_by_containment() {
        let mut grid = unit_grid();
        grid.insert(p2(0.1, 0.1));
        grid.insert(p2(0.2, 0.2));
        grid.insert(p2(-0.5, -0.5));

        let mut found = Vec::new();
        grid.query_box(&Aabb2::new(p2(0.0, 0.0), p2(1.0, 1.0)), &mut found);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn ball_queries_prune_but_do_not_lose_elements() {
        let mut grid = unit_grid();
        grid.insert(p2(0.0, 0.0));
        grid.insert(p2(0.3, 0.0));
        grid.insert(p2(0.9, 0.9));

        let mut found = Vec::new();
        grid.query_ball(&Circle::new(p2(0.0, 0.0), 0.35), &mut found);
        let mut positions: Vec<_> = found.iter().map(|p| (p.x, p.y)).collect();
        positions.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(positions, vec![(0.0, 0.0), (0.3, 0.0)]);
    }

    #[test]
    fn queries_append_to_the_output() {
        let mut grid = unit_grid();
        grid.insert(p2(0.0, 0.0));

        let mut found = Vec::new();
        grid.query_all(&mut found);
        grid.query_all(&mut found);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn clear_keeps_the_configuration() {
        let mut grid = unit_grid();
        grid.insert(p2(0.0, 0.0));
        grid.clear();
        assert_eq!(grid.len(), 0);
        assert_eq!(grid.resolution(), Vector2::new(4, 4));
        assert!(grid.insert(p2(0.0, 0.0)));
    }

    #[test]
    fn grid3_round_trips_elements() {
        let mut grid = Grid3::new(
            Aabb3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)),
            Vector3::new(2, 2, 2),
        )
        .unwrap();
        for i in 0..8 {
            let p = Point3::new(
                0.25 + 0.5 * (i & 1) as f32,
                0.25 + 0.5 * ((i >> 1) & 1) as f32,
                0.25 + 0.5 * ((i >> 2) & 1) as f32,
            );
            assert!(grid.insert(p));
        }
        assert_eq!(grid.len(), 8);

        let mut found = Vec::new();
        grid.query_ball(&Sphere::new(Point3::new(0.25, 0.25, 0.25), 0.1), &mut found);
        assert_eq!(found.len(), 1);

        grid.rebuild();
        assert_eq!(grid.len(), 8);
    }
}
