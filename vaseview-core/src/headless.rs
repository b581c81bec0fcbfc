//! Off-screen surface that keeps full resource bookkeeping but draws nothing.
//! Used by tests and headless hosts that need to inspect what a viewport
//! allocated and submitted.

use nalgebra::Matrix4;

use crate::color::Rgb;
use crate::error::SurfaceError;
use crate::geometry::Mesh;
use crate::surface::{
    BindingId, FrameDesc, GeometryId, Material, MaterialId, RenderSurface, ResourcePool,
};

struct Binding {
    geometry: GeometryId,
    material: MaterialId,
}

/// Summary of the most recent successful frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    pub draws: usize,
    pub triangles: usize,
    pub models: Vec<Matrix4<f32>>,
    pub colors: Vec<Rgb>,
}

pub struct HeadlessSurface {
    width: u32,
    height: u32,
    geometries: ResourcePool<usize>,
    materials: ResourcePool<Material>,
    bindings: ResourcePool<Binding>,
    released: bool,
    release_calls: usize,
    frames: usize,
    pending_failures: usize,
    last_frame: Option<FrameStats>,
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            geometries: ResourcePool::new(GeometryId::KIND),
            materials: ResourcePool::new(MaterialId::KIND),
            bindings: ResourcePool::new(BindingId::KIND),
            released: false,
            release_calls: 0,
            frames: 0,
            pending_failures: 0,
            last_frame: None,
        }
    }

    /// Make the next `count` renders fail as if the device were lost
    pub fn fail_next_frames(&mut self, count: usize) {
        self.pending_failures = count;
    }

    pub fn live_geometries(&self) -> usize {
        self.geometries.live()
    }

    pub fn live_materials(&self) -> usize {
        self.materials.live()
    }

    pub fn live_bindings(&self) -> usize {
        self.bindings.live()
    }

    /// Total geometry, material and binding allocations over the surface lifetime
    pub fn allocations(&self) -> usize {
        self.geometries.allocated() + self.materials.allocated() + self.bindings.allocated()
    }

    pub fn releases(&self) -> usize {
        self.geometries.released() + self.materials.released() + self.bindings.released()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls
    }

    pub fn frames_rendered(&self) -> usize {
        self.frames
    }

    pub fn last_frame(&self) -> Option<&FrameStats> {
        self.last_frame.as_ref()
    }

    pub fn material_color(&self, id: MaterialId) -> Option<Rgb> {
        self.materials.get(id.0).ok().map(|m| m.color)
    }

    fn ensure_live(&self) -> Result<(), SurfaceError> {
        if self.released {
            Err(SurfaceError::Released)
        } else {
            Ok(())
        }
    }
}

impl RenderSurface for HeadlessSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn create_geometry(&mut self, mesh: &Mesh) -> Result<GeometryId, SurfaceError> {
        self.ensure_live()?;
        Ok(GeometryId(self.geometries.insert(mesh.triangles.len())))
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
        if self.pending_failures > 0 {
            self.pending_failures -= 1;
            return Err(SurfaceError::Device("injected frame failure".to_string()));
        }

        let mut stats = FrameStats::default();
        for draw in frame.draws {
            let binding = self.bindings.get(draw.binding.0)?;
            if binding.geometry != draw.geometry || binding.material != draw.material {
                return Err(SurfaceError::Device("draw does not match its binding".to_string()));
            }
            stats.triangles += *self.geometries.get(draw.geometry.0)?;
            stats.colors.push(self.materials.get(draw.material.0)?.color);
            stats.models.push(draw.model);
            stats.draws += 1;
        }

        self.frames += 1;
        self.last_frame = Some(stats);
        Ok(())
    }

    fn release(&mut self) {
        self.release_calls += 1;
        self.released = true;
        // Anything still bound goes with the surface
        self.bindings.clear();
        self.materials.clear();
        self.geometries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LightingConfig;
    use crate::projection::Camera;

    use crate::surface::DrawCall;

    fn frame<'a>(
        camera: &'a Camera,
        draws: &'a [DrawCall],
        lighting: &'a LightingConfig,
    ) -> FrameDesc<'a> {
        FrameDesc {
            camera,
            view: camera.view_matrix(),
            projection: camera.projection_matrix(),
            draws,
            lighting,
        }
    }

    #[test]
    fn test_render_rejects_released_handles() {
        let mut surface = HeadlessSurface::new(64, 64);
        let geometry = surface.create_geometry(&Mesh::cube(1.0)).unwrap();
        let material = surface.create_material(&Material::new(Rgb::new(1, 2, 3))).unwrap();
        let binding = surface.create_binding(geometry, material).unwrap();
        let draws = [DrawCall {
            geometry,
            material,
            binding,
            model: Matrix4::identity(),
        }];
        let camera = Camera::default();
        let lighting = LightingConfig::default();

        surface.render(&frame(&camera, &draws, &lighting)).unwrap();
        assert_eq!(surface.last_frame().unwrap().triangles, 12);

        surface.release_geometry(geometry).unwrap();
        assert!(surface.render(&frame(&camera, &draws, &lighting)).is_err());
        assert_eq!(surface.frames_rendered(), 1);
    }

    #[test]
    fn test_injected_failures_are_transient() {
        let mut surface = HeadlessSurface::new(64, 64);
        let camera = Camera::default();
        let lighting = LightingConfig::default();
        surface.fail_next_frames(1);
        assert!(surface.render(&frame(&camera, &[], &lighting)).is_err());
        assert!(surface.render(&frame(&camera, &[], &lighting)).is_ok());
    }

    #[test]
    fn test_release_drops_everything() {
        let mut surface = HeadlessSurface::new(64, 64);
        surface.create_geometry(&Mesh::cube(1.0)).unwrap();
        surface.release();
        assert_eq!(surface.live_geometries(), 0);
        assert!(surface.create_geometry(&Mesh::cube(1.0)).is_err());
    }
}
