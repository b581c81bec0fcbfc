//! Geometry primitives: vertices, triangles, meshes and bounding boxes

use nalgebra::{Matrix4, Point3, Vector3};

/// A 3D vertex with position and normal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
}

impl Vertex {
    pub fn new(x: f32, y: f32, z: f32, nx: f32, ny: f32, nz: f32) -> Self {
        Self {
            position: Point3::new(x, y, z),
            normal: Vector3::new(nx, ny, nz),
        }
    }
}

/// A triangle face defined by three vertices sharing one facet normal
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    pub vertices: [Vertex; 3],
}

impl Triangle {
    pub fn new(v0: Vertex, v1: Vertex, v2: Vertex) -> Self {
        Self {
            vertices: [v0, v1, v2],
        }
    }

    /// Face normal from the winding order, or `None` for a zero-area face
    pub fn calculate_normal(&self) -> Option<Vector3<f32>> {
        let v0 = self.vertices[0].position;
        let v1 = self.vertices[1].position;
        let v2 = self.vertices[2].position;

        (v1 - v0).cross(&(v2 - v0)).try_normalize(1e-12)
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Self { min, max }
    }

    /// Smallest box enclosing every point, `None` when the iterator is empty
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point3<f32>>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut bounds = Self::new(first, first);
        for p in points {
            bounds.expand(&p);
        }
        Some(bounds)
    }

    pub fn expand(&mut self, p: &Point3<f32>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn max_extent(&self) -> f32 {
        self.size().max()
    }

    pub fn is_finite(&self) -> bool {
        self.min.iter().chain(self.max.iter()).all(|c| c.is_finite())
    }

    /// The eight corners, in no particular order
    pub fn corners(&self) -> [Point3<f32>; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point3::new(a.x, a.y, a.z),
            Point3::new(b.x, a.y, a.z),
            Point3::new(a.x, b.y, a.z),
            Point3::new(b.x, b.y, a.z),
            Point3::new(a.x, a.y, b.z),
            Point3::new(b.x, a.y, b.z),
            Point3::new(a.x, b.y, b.z),
            Point3::new(b.x, b.y, b.z),
        ]
    }
}

/// A 3D mesh composed of triangles
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            triangles: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            triangles: Vec::with_capacity(capacity),
        }
    }

    pub fn add_triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = Point3<f32>> + '_ {
        self.triangles
            .iter()
            .flat_map(|t| t.vertices.iter().map(|v| v.position))
    }

    /// Bounding box of the untransformed geometry
    pub fn bounding_box(&self) -> Option<Aabb> {
        Aabb::from_points(self.positions())
    }

    /// Bounding box of the geometry after applying `model`, computed per vertex
    pub fn transformed_bounding_box(&self, model: &Matrix4<f32>) -> Option<Aabb> {
        Aabb::from_points(self.positions().map(|p| model.transform_point(&p)))
    }

    /// Shift every vertex by `offset`; normals are unaffected
    pub fn translate(&mut self, offset: &Vector3<f32>) {
        for triangle in &mut self.triangles {
            for vertex in &mut triangle.vertices {
                vertex.position += offset;
            }
        }
    }

    /// Axis-aligned box with the given extents, centered on the origin
    pub fn cuboid(size_x: f32, size_y: f32, size_z: f32) -> Self {
        let (hx, hy, hz) = (size_x / 2.0, size_y / 2.0, size_z / 2.0);
        let mut mesh = Self::with_capacity(12);
        let mut quad = |n: [f32; 3], c: [[f32; 3]; 4]| {
            let v = |p: [f32; 3]| Vertex::new(p[0], p[1], p[2], n[0], n[1], n[2]);
            mesh.add_triangle(Triangle::new(v(c[0]), v(c[1]), v(c[2])));
            mesh.add_triangle(Triangle::new(v(c[0]), v(c[2]), v(c[3])));
        };

        // Front / back
        quad([0.0, 0.0, 1.0], [[-hx, -hy, hz], [hx, -hy, hz], [hx, hy, hz], [-hx, hy, hz]]);
        quad([0.0, 0.0, -1.0], [[-hx, -hy, -hz], [-hx, hy, -hz], [hx, hy, -hz], [hx, -hy, -hz]]);
        // Top / bottom
        quad([0.0, 1.0, 0.0], [[-hx, hy, -hz], [-hx, hy, hz], [hx, hy, hz], [hx, hy, -hz]]);
        quad([0.0, -1.0, 0.0], [[-hx, -hy, -hz], [hx, -hy, -hz], [hx, -hy, hz], [-hx, -hy, hz]]);
        // Right / left
        quad([1.0, 0.0, 0.0], [[hx, -hy, -hz], [hx, hy, -hz], [hx, hy, hz], [hx, -hy, hz]]);
        quad([-1.0, 0.0, 0.0], [[-hx, -hy, -hz], [-hx, -hy, hz], [-hx, hy, hz], [-hx, hy, -hz]]);

        mesh
    }

    /// Create a simple cube mesh for testing
    pub fn cube(size: f32) -> Self {
        Self::cuboid(size, size, size)
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cuboid_bounds() {
        let mesh = Mesh::cuboid(2.0, 4.0, 6.0);
        assert_eq!(mesh.triangles.len(), 12);

        let bounds = mesh.bounding_box().unwrap();
        assert_relative_eq!(bounds.size(), Vector3::new(2.0, 4.0, 6.0));
        assert_relative_eq!(bounds.center(), Point3::origin());
        assert_relative_eq!(bounds.max_extent(), 6.0);
    }

    #[test]
    fn test_empty_mesh_has_no_bounds() {
        assert!(Mesh::new().bounding_box().is_none());
    }

    #[test]
    fn test_translate_moves_bounds() {
        let mut mesh = Mesh::cube(2.0);
        mesh.translate(&Vector3::new(1.0, 2.0, 3.0));
        let bounds = mesh.bounding_box().unwrap();
        assert_relative_eq!(bounds.center(), Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_transformed_bounds_follow_scale() {
        let mesh = Mesh::cube(2.0);
        let model = Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 2.0, 3.0));
        let bounds = mesh.transformed_bounding_box(&model).unwrap();
        assert_relative_eq!(bounds.size(), Vector3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn test_face_normal() {
        let tri = Triangle::new(
            Vertex::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0),
            Vertex::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0),
            Vertex::new(0.0, 1.0, 0.0, 0.0, 0.0, 0.0),
        );
        assert_relative_eq!(tri.calculate_normal().unwrap(), Vector3::z());

        let sliver = Triangle::new(tri.vertices[0], tri.vertices[0], tri.vertices[1]);
        assert!(sliver.calculate_normal().is_none());
    }

    #[test]
    fn test_corners_span_the_box() {
        let bounds = Aabb::new(Point3::new(-1.0, -2.0, -3.0), Point3::new(1.0, 2.0, 3.0));
        let corners = bounds.corners();
        assert_eq!(Aabb::from_points(corners), Some(bounds));
        assert!(corners.contains(&Point3::new(1.0, -2.0, 3.0)));
    }
}
