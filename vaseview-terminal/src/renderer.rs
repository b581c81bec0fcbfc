//! ASCII rasterizer for terminal rendering

use crossterm::{
    cursor,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    QueueableCommand,
};
use nalgebra::{Matrix4, Point3, Vector3};
use std::io::Write;
use vaseview_core::config::LightingConfig;
use vaseview_core::projection::{project_to_screen, ScreenPoint};
use vaseview_core::surface::{BindingId, GeometryId, MaterialId, ResourcePool};
use vaseview_core::transform::Transform;
use vaseview_core::{FrameDesc, Material, Mesh, RenderSurface, Rgb, SurfaceError, Triangle, Vertex};

/// Character luminosity ramp for shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &['.', ':', '-', '=', '+', '*', '#', '%', '@'];

struct Binding {
    geometry: GeometryId,
    material: MaterialId,
}

/// Light setup for one frame, directions pointing towards the lights
struct Lights {
    ambient: f32,
    key: (Vector3<f32>, f32),
    back: (Vector3<f32>, f32),
}

impl Lights {
    fn new(config: &LightingConfig) -> Self {
        let dir = |d: [f32; 3]| Vector3::from(d).try_normalize(f32::EPSILON).unwrap_or_else(Vector3::z);
        Self {
            ambient: config.ambient,
            key: (dir(config.key_direction), config.key_intensity),
            back: (dir(config.back_direction), config.back_intensity),
        }
    }

    /// Directional contribution in `[0, 1]`, ambient excluded
    fn shade(&self, normal: &Vector3<f32>) -> f32 {
        let (key_dir, key) = self.key;
        let (back_dir, back) = self.back;
        let total = key + back;
        if total <= 0.0 {
            return 0.0;
        }
        (key * normal.dot(&key_dir).max(0.0) + back * normal.dot(&back_dir).max(0.0)) / total
    }

    fn intensity(&self, shade: f32) -> f32 {
        self.ambient + shade * (self.key.1 + self.back.1)
    }
}

/// ASCII renderer that converts 3D meshes to terminal characters.
///
/// Sizes are in pixels where one terminal cell is one pixel wide and two
/// tall, so the camera aspect matches what the terminal shows.
pub struct AsciiRenderer {
    width: usize,
    height: usize,
    depth_buffer: Vec<f32>,
    char_buffer: Vec<char>,
    color_buffer: Vec<Rgb>,
    background: Rgb,
    geometries: ResourcePool<Mesh>,
    materials: ResourcePool<Material>,
    bindings: ResourcePool<Binding>,
    released: bool,
}

impl AsciiRenderer {
    /// A renderer for a terminal of `columns` x `rows` cells
    pub fn new(columns: usize, rows: usize) -> Self {
        let size = columns * rows;
        Self {
            width: columns,
            height: rows,
            depth_buffer: vec![f32::INFINITY; size],
            char_buffer: vec![' '; size],
            color_buffer: vec![Rgb::new(0, 0, 0); size],
            background: LightingConfig::default().background,
            geometries: ResourcePool::new(GeometryId::KIND),
            materials: ResourcePool::new(MaterialId::KIND),
            bindings: ResourcePool::new(BindingId::KIND),
            released: false,
        }
    }

    pub fn columns(&self) -> usize {
        self.width
    }

    pub fn rows(&self) -> usize {
        self.height
    }

    /// Character at a cell, `None` outside the grid
    pub fn cell(&self, column: usize, row: usize) -> Option<(char, Rgb)> {
        if column >= self.width || row >= self.height {
            return None;
        }
        let idx = row * self.width + column;
        Some((self.char_buffer[idx], self.color_buffer[idx]))
    }

    /// Number of cells covered by geometry in the last frame
    pub fn covered_cells(&self) -> usize {
        self.depth_buffer.iter().filter(|d| d.is_finite()).count()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn clear(&mut self) {
        self.depth_buffer.fill(f32::INFINITY);
        self.char_buffer.fill(' ');
        self.color_buffer.fill(self.background);
    }

    fn render_mesh(
        &mut self,
        mesh: &Mesh,
        model: &Matrix4<f32>,
        (view, projection): (&Matrix4<f32>, &Matrix4<f32>),
        eye: &Point3<f32>,
        color: Rgb,
        lights: &Lights,
    ) {
        let mvp = Transform::mvp_matrix(model, view, projection);
        for triangle in &mesh.triangles {
            self.render_triangle(triangle, model, &mvp, eye, color, lights);
        }
    }

    fn render_triangle(
        &mut self,
        triangle: &Triangle,
        model: &Matrix4<f32>,
        mvp: &Matrix4<f32>,
        eye: &Point3<f32>,
        color: Rgb,
        lights: &Lights,
    ) {
        let pixel_height = (self.height * 2) as u32;
        let mut screen = [ScreenPoint {
            x: 0.0,
            y: 0.0,
            depth: 0.0,
        }; 3];
        for (slot, vertex) in screen.iter_mut().zip(&triangle.vertices) {
            match project_to_screen(mvp, &vertex.position, self.width as u32, pixel_height) {
                Some(point) => *slot = point,
                None => return, // Triangle is clipped
            }
        }

        // Face normal in world space, turned towards the camera
        let world = Triangle {
            vertices: triangle.vertices.map(|v| Vertex {
                position: model.transform_point(&v.position),
                ..v
            }),
        };
        let Some(mut normal) = world.calculate_normal() else {
            return;
        };
        if normal.dot(&(*eye - world.vertices[0].position)) < 0.0 {
            normal = -normal;
        }

        let shade = lights.shade(&normal);
        let char_index = ((shade * (LUMINOSITY_RAMP.len() - 1) as f32).round() as usize)
            .min(LUMINOSITY_RAMP.len() - 1);
        let lit = color.to_f32().map(|c| c * lights.intensity(shade));

        self.rasterize_triangle(&screen, LUMINOSITY_RAMP[char_index], Rgb::from_f32(lit));
    }

    fn rasterize_triangle(&mut self, coords: &[ScreenPoint; 3], character: char, color: Rgb) {
        // Pixel rows to cell rows
        let cells = (*coords).map(|p| (p.x, p.y / 2.0, p.depth));
        let (v0, v1, v2) = (cells[0], cells[1], cells[2]);

        // Bounding box
        let min_x = v0.0.min(v1.0).min(v2.0).floor() as i32;
        let max_x = v0.0.max(v1.0).max(v2.0).ceil() as i32;
        let min_y = v0.1.min(v1.1).min(v2.1).floor() as i32;
        let max_y = v0.1.max(v1.1).max(v2.1).ceil() as i32;

        // Clip to screen bounds
        let min_x = min_x.max(0);
        let max_x = max_x.min(self.width as i32 - 1);
        let min_y = min_y.max(0);
        let max_y = max_y.min(self.height as i32 - 1);

        // Scanline rasterization
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;

                // Barycentric coordinates
                if let Some((w0, w1, w2)) = barycentric(
                    (v0.0, v0.1),
                    (v1.0, v1.1),
                    (v2.0, v2.1),
                    (px, py),
                ) {
                    if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                        // Interpolate depth
                        let depth = w0 * v0.2 + w1 * v1.2 + w2 * v2.2;

                        let idx = y as usize * self.width + x as usize;
                        if depth < self.depth_buffer[idx] {
                            self.depth_buffer[idx] = depth;
                            self.char_buffer[idx] = character;
                            self.color_buffer[idx] = color;
                        }
                    }
                }
            }
        }
    }

    /// Queue the last frame to `writer`, one terminal row per buffer row
    pub fn draw<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.queue(SetBackgroundColor(to_color(self.background)))?;
        let mut current = None;
        for y in 0..self.height {
            writer.queue(cursor::MoveTo(0, y as u16))?;
            for x in 0..self.width {
                let idx = y * self.width + x;
                let color = self.color_buffer[idx];
                if current != Some(color) {
                    writer.queue(SetForegroundColor(to_color(color)))?;
                    current = Some(color);
                }
                writer.queue(Print(self.char_buffer[idx]))?;
            }
        }
        writer.queue(ResetColor)?;
        Ok(())
    }

    fn ensure_live(&self) -> Result<(), SurfaceError> {
        if self.released {
            Err(SurfaceError::Released)
        } else {
            Ok(())
        }
    }
}

impl RenderSurface for AsciiRenderer {
    fn size(&self) -> (u32, u32) {
        (self.width as u32, (self.height * 2) as u32)
    }

    /// `width` and `height` are pixels; odd heights round down to whole cells
    fn resize(&mut self, width: u32, height: u32) {
        self.width = width as usize;
        self.height = height as usize / 2;
        let size = self.width * self.height;
        self.depth_buffer = vec![f32::INFINITY; size];
        self.char_buffer = vec![' '; size];
        self.color_buffer = vec![self.background; size];
    }

    fn create_geometry(&mut self, mesh: &Mesh) -> Result<GeometryId, SurfaceError> {
        self.ensure_live()?;
        Ok(GeometryId(self.geometries.insert(mesh.clone())))
    }

    fn release_geometry(&mut self, id: GeometryId) -> Result<(), SurfaceError> {
        self.geometries.remove(id.0).map(drop)
    }

    fn create_material(&mut self, material: &Material) -> Result<MaterialId, SurfaceError> {
        self.ensure_live()?;
        Ok(MaterialId(self.materials.insert(*material)))
    }

    fn update_material(&mut self, id: MaterialId, material: &Material) -> Result<(), SurfaceError> {
        *self.materials.get_mut(id.0)? = *material;
        Ok(())
    }

    fn release_material(&mut self, id: MaterialId) -> Result<(), SurfaceError> {
        self.materials.remove(id.0).map(drop)
    }

    fn create_binding(
        &mut self,
        geometry: GeometryId,
        material: MaterialId,
    ) -> Result<BindingId, SurfaceError> {
        self.ensure_live()?;
        self.geometries.get(geometry.0)?;
        self.materials.get(material.0)?;
        Ok(BindingId(self.bindings.insert(Binding { geometry, material })))
    }

    fn release_binding(&mut self, id: BindingId) -> Result<(), SurfaceError> {
        self.bindings.remove(id.0).map(drop)
    }

    fn render(&mut self, frame: &FrameDesc<'_>) -> Result<(), SurfaceError> {
        self.ensure_live()?;
        self.background = frame.lighting.background;
        self.clear();

        let lights = Lights::new(frame.lighting);
        let eye = frame.camera.position;
        // Resources are taken out while drawing so the buffers can be borrowed mutably
        let geometries = std::mem::replace(&mut self.geometries, ResourcePool::new(GeometryId::KIND));
        let result = frame.draws.iter().try_for_each(|draw| {
            let binding = self.bindings.get(draw.binding.0)?;
            if binding.geometry != draw.geometry || binding.material != draw.material {
                return Err(SurfaceError::Device("draw does not match its binding".to_string()));
            }
            let color = self.materials.get(draw.material.0)?.color;
            let mesh = geometries.get(draw.geometry.0)?;
            let matrices = (&frame.view, &frame.projection);
            self.render_mesh(mesh, &draw.model, matrices, &eye, color, &lights);
            Ok(())
        });
        self.geometries = geometries;
        result
    }

    fn release(&mut self) {
        self.released = true;
        self.bindings.clear();
        self.materials.clear();
        self.geometries.clear();
    }
}

fn to_color(rgb: Rgb) -> Color {
    Color::Rgb {
        r: rgb.r,
        g: rgb.g,
        b: rgb.b,
    }
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(
    v0: (f32, f32),
    v1: (f32, f32),
    v2: (f32, f32),
    p: (f32, f32),
) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-6 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::time::Instant;
    use vaseview_core::stl::write_binary_stl;
    use vaseview_core::surface::DrawCall;
    use vaseview_core::{Camera, MemoryMeshStore, Stage, TickOutcome};

    #[test]
    fn test_barycentric_inside_and_degenerate() {
        let (w0, w1, w2) = barycentric((0.0, 0.0), (4.0, 0.0), (0.0, 4.0), (1.0, 1.0)).unwrap();
        assert_relative_eq!(w0 + w1 + w2, 1.0);
        assert!(w0 > 0.0 && w1 > 0.0 && w2 > 0.0);
        assert!(barycentric((0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (1.0, 1.0)).is_none());
    }

    #[test]
    fn test_size_is_in_half_cells() {
        let mut renderer = AsciiRenderer::new(80, 24);
        assert_eq!(renderer.size(), (80, 48));
        renderer.resize(100, 61);
        assert_eq!((renderer.columns(), renderer.rows()), (100, 30));
    }

    #[test]
    fn test_stage_renders_centered_vase() {
        let store = MemoryMeshStore::new().with("vase.stl", write_binary_stl(&Mesh::cuboid(6.0, 6.0, 12.0)));
        let mut stage = Stage::with_defaults(store);
        let color = Rgb::from_hex(0xf14a4a);
        let id = stage
            .mount(AsciiRenderer::new(60, 30), "vase.stl", 15.0, 15.0, color)
            .unwrap();

        assert_eq!(stage.tick(id, Instant::now()), TickOutcome::Rendered);
        let renderer = stage.surface(id).unwrap();
        assert!(renderer.covered_cells() > 0);

        // The framed mesh covers the middle of the screen
        let (c, lit) = renderer.cell(30, 15).unwrap();
        assert!(LUMINOSITY_RAMP.contains(&c));
        assert_ne!(lit, renderer.background);

        let mut out = Vec::new();
        renderer.draw(&mut out).unwrap();
        assert!(!out.is_empty());

        let renderer = stage.teardown(id).unwrap();
        assert!(renderer.is_released());
        assert_eq!(renderer.geometries.live(), 0);
    }

    #[test]
    fn test_render_after_release_fails() {
        let mut renderer = AsciiRenderer::new(10, 10);
        renderer.release();
        let camera = Camera::default();
        let lighting = LightingConfig::default();
        let frame = FrameDesc {
            camera: &camera,
            view: camera.view_matrix(),
            projection: camera.projection_matrix(),
            draws: &[],
            lighting: &lighting,
        };
        assert_eq!(renderer.render(&frame), Err(SurfaceError::Released));
    }

    #[test]
    fn test_render_projects_with_frame_matrices() {
        let mut renderer = AsciiRenderer::new(40, 20);
        let geometry = renderer.create_geometry(&Mesh::cube(4.0)).unwrap();
        let material = renderer
            .create_material(&Material::new(Rgb::from_hex(0x99db99)))
            .unwrap();
        let binding = renderer.create_binding(geometry, material).unwrap();
        let draws = [DrawCall {
            geometry,
            material,
            binding,
            model: Matrix4::identity(),
        }];

        let mut camera = Camera::new(40, 40);
        camera.position = Point3::new(0.0, 0.0, 8.0);
        let lighting = LightingConfig::default();
        let (view, projection) = camera.matrices().unwrap();
        let mut frame = FrameDesc {
            camera: &camera,
            view,
            projection,
            draws: &draws,
            lighting: &lighting,
        };
        renderer.render(&frame).unwrap();
        assert!(renderer.covered_cells() > 0);

        // Same camera, but the frame looks away from the cube
        let away = Point3::new(0.0, 0.0, 80.0);
        frame.view = Matrix4::look_at_rh(&camera.position, &away, &camera.up);
        renderer.render(&frame).unwrap();
        assert_eq!(renderer.covered_cells(), 0);
    }
}
