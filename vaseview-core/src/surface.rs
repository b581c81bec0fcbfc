//! The drawable surface a host hands to a viewport, and the GPU-style
//! resources allocated on it.

use nalgebra::Matrix4;

use crate::arena::{Arena, Handle};
use crate::color::Rgb;
use crate::config::LightingConfig;
use crate::error::SurfaceError;
use crate::geometry::Mesh;
use crate::projection::Camera;

/// Raw index/generation pair identifying a surface resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub index: u32,
    pub generation: u32,
}

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub ResourceKey);

        impl $name {
            pub const KIND: &'static str = $kind;
        }
    };
}

resource_id!(
    /// Vertex buffer holding an uploaded mesh
    GeometryId,
    "geometry"
);
resource_id!(MaterialId, "material");
resource_id!(
    /// Per-instance binding of geometry and material to the surface
    BindingId,
    "binding"
);

/// Surface material: a flat color lit by the scene lights
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub color: Rgb,
}

impl Material {
    pub fn new(color: Rgb) -> Self {
        Self { color }
    }
}

/// One mesh to draw this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCall {
    pub geometry: GeometryId,
    pub material: MaterialId,
    pub binding: BindingId,
    pub model: Matrix4<f32>,
}

/// Everything a surface needs to render one frame
#[derive(Debug, Clone, Copy)]
pub struct FrameDesc<'a> {
    pub camera: &'a Camera,
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub draws: &'a [DrawCall],
    pub lighting: &'a LightingConfig,
}

/// A drawable surface plus its resource allocator.
///
/// All calls happen on the thread that owns the viewport.
pub trait RenderSurface {
    /// Pixel dimensions of the draw surface
    fn size(&self) -> (u32, u32);

    fn resize(&mut self, width: u32, height: u32);

    fn create_geometry(&mut self, mesh: &Mesh) -> Result<GeometryId, SurfaceError>;

    fn release_geometry(&mut self, id: GeometryId) -> Result<(), SurfaceError>;

    fn create_material(&mut self, material: &Material) -> Result<MaterialId, SurfaceError>;

    fn update_material(&mut self, id: MaterialId, material: &Material) -> Result<(), SurfaceError>;

    fn release_material(&mut self, id: MaterialId) -> Result<(), SurfaceError>;

    fn create_binding(
        &mut self,
        geometry: GeometryId,
        material: MaterialId,
    ) -> Result<BindingId, SurfaceError>;

    fn release_binding(&mut self, id: BindingId) -> Result<(), SurfaceError>;

    fn render(&mut self, frame: &FrameDesc<'_>) -> Result<(), SurfaceError>;

    /// Drop the surface itself; called once at teardown
    fn release(&mut self);
}

/// Typed storage for one kind of surface resource
pub struct ResourcePool<T> {
    kind: &'static str,
    items: Arena<T>,
    allocated: usize,
    released: usize,
}

impl<T> ResourcePool<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            items: Arena::new(),
            allocated: 0,
            released: 0,
        }
    }

    pub fn insert(&mut self, value: T) -> ResourceKey {
        let handle = self.items.insert(value);
        self.allocated += 1;
        ResourceKey {
            index: handle.index(),
            generation: handle.generation(),
        }
    }

    pub fn get(&self, key: ResourceKey) -> Result<&T, SurfaceError> {
        self.items
            .get(Handle::from_raw(key.index, key.generation))
            .ok_or_else(|| self.unknown(key))
    }

    pub fn get_mut(&mut self, key: ResourceKey) -> Result<&mut T, SurfaceError> {
        let err = self.unknown(key);
        self.items
            .get_mut(Handle::from_raw(key.index, key.generation))
            .ok_or(err)
    }

    pub fn remove(&mut self, key: ResourceKey) -> Result<T, SurfaceError> {
        let value = self
            .items
            .remove(Handle::from_raw(key.index, key.generation))
            .ok_or_else(|| self.unknown(key))?;
        self.released += 1;
        Ok(value)
    }

    /// Release everything still alive, returning how many were dropped
    pub fn clear(&mut self) -> usize {
        let handles = self.items.handles();
        let count = handles.len();
        for handle in handles {
            self.items.remove(handle);
        }
        self.released += count;
        count
    }

    pub fn live(&self) -> usize {
        self.items.len()
    }

    pub fn allocated(&self) -> usize {
        self.allocated
    }

    pub fn released(&self) -> usize {
        self.released
    }

    fn unknown(&self, key: ResourceKey) -> SurfaceError {
        SurfaceError::UnknownHandle {
            kind: self.kind,
            index: key.index,
            generation: key.generation,
        }
    }
}
