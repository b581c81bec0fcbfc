//! Lifecycle of the surface resources behind the active mesh.
//!
//! An instance owns a geometry buffer, a material and a surface binding, and
//! is visible once it has a node in the viewport's scene graph. Disposal
//! releases them in a fixed order and every step runs at most once.

use nalgebra::{Matrix4, Vector3};
use tracing::{debug, warn};

use crate::arena::{Arena, Handle};
use crate::error::SurfaceError;
use crate::geometry::Aabb;
use crate::loader::MeshAsset;
use crate::surface::{BindingId, DrawCall, GeometryId, Material, MaterialId, RenderSurface};
use crate::transform::{ModelTransform, ReferenceDimensions};

/// A drawable entry in the scene graph
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneNode {
    pub geometry: GeometryId,
    pub material: MaterialId,
    pub binding: BindingId,
    pub model: Matrix4<f32>,
}

pub type NodeId = Handle<SceneNode>;

/// Per-viewport scene graph
#[derive(Default)]
pub struct SceneGraph {
    nodes: Arena<SceneNode>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, node: SceneNode) -> NodeId {
        self.nodes.insert(node)
    }

    pub fn detach(&mut self, id: NodeId) -> Option<SceneNode> {
        self.nodes.remove(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    pub fn set_model(&mut self, id: NodeId, model: Matrix4<f32>) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.model = model;
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn draw_calls(&self) -> Vec<DrawCall> {
        self.nodes
            .iter()
            .map(|(_, node)| DrawCall {
                geometry: node.geometry,
                material: node.material,
                binding: node.binding,
                model: node.model,
            })
            .collect()
    }
}

/// Which disposal steps actually released something
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisposeReport {
    pub geometry: bool,
    pub material: bool,
    pub node: bool,
    pub binding: bool,
}

impl DisposeReport {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// A centered mesh asset with live surface resources
#[derive(Debug)]
pub struct MeshInstance {
    asset: MeshAsset,
    transform: ModelTransform,
    geometry: Option<GeometryId>,
    material: Option<MaterialId>,
    node: Option<NodeId>,
    binding: Option<BindingId>,
}

impl MeshInstance {
    /// Allocate the instance's resources without making it visible.
    ///
    /// On failure anything already allocated is released again.
    pub fn create<B>(
        surface: &mut B,
        asset: MeshAsset,
        transform: ModelTransform,
        material: &Material,
    ) -> Result<Self, SurfaceError>
    where
        B: RenderSurface + ?Sized,
    {
        let geometry = surface.create_geometry(asset.mesh())?;
        let material = match surface.create_material(material) {
            Ok(id) => id,
            Err(err) => {
                release_logged(GeometryId::KIND, surface.release_geometry(geometry));
                return Err(err);
            }
        };
        let binding = match surface.create_binding(geometry, material) {
            Ok(id) => id,
            Err(err) => {
                release_logged(GeometryId::KIND, surface.release_geometry(geometry));
                release_logged(MaterialId::KIND, surface.release_material(material));
                return Err(err);
            }
        };

        debug!(path = asset.path(), "allocated instance resources");
        Ok(Self {
            asset,
            transform,
            geometry: Some(geometry),
            material: Some(material),
            node: None,
            binding: Some(binding),
        })
    }

    pub fn path(&self) -> &str {
        self.asset.path()
    }

    pub fn asset(&self) -> &MeshAsset {
        &self.asset
    }

    pub fn reference(&self) -> ReferenceDimensions {
        self.asset.reference()
    }

    pub fn transform(&self) -> &ModelTransform {
        &self.transform
    }

    pub fn scale(&self) -> Vector3<f32> {
        self.transform.scale
    }

    pub fn geometry(&self) -> Option<GeometryId> {
        self.geometry
    }

    pub fn material(&self) -> Option<MaterialId> {
        self.material
    }

    pub fn binding(&self) -> Option<BindingId> {
        self.binding
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn is_visible(&self) -> bool {
        self.node.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.geometry.is_none() && self.material.is_none() && self.node.is_none() && self.binding.is_none()
    }

    /// Current world-space bounds, after scale and realignment
    pub fn world_bounds(&self) -> Option<Aabb> {
        self.transform.world_bounds(self.asset.mesh())
    }

    /// Replace the scale; the realignment set at creation stays as is
    pub fn set_scale(&mut self, scale: Vector3<f32>, graph: &mut SceneGraph) {
        self.transform.scale = scale;
        if let Some(node) = self.node {
            graph.set_model(node, self.transform.matrix());
        }
    }

    pub fn set_material<B>(&mut self, surface: &mut B, material: &Material) -> Result<(), SurfaceError>
    where
        B: RenderSurface + ?Sized,
    {
        match self.material {
            Some(id) => surface.update_material(id, material),
            None => Ok(()),
        }
    }

    fn show(&mut self, graph: &mut SceneGraph) {
        if self.node.is_some() {
            return;
        }
        if let (Some(geometry), Some(material), Some(binding)) =
            (self.geometry, self.material, self.binding)
        {
            self.node = Some(graph.attach(SceneNode {
                geometry,
                material,
                binding,
                model: self.transform.matrix(),
            }));
        }
    }

    /// Release geometry, then material, then the scene node, then the surface binding.
    ///
    /// Release failures are logged and the resource is considered gone.
    pub fn dispose<B>(&mut self, surface: &mut B, graph: &mut SceneGraph) -> DisposeReport
    where
        B: RenderSurface + ?Sized,
    {
        let mut report = DisposeReport::default();

        if let Some(id) = self.geometry.take() {
            release_logged(GeometryId::KIND, surface.release_geometry(id));
            report.geometry = true;
        }
        if let Some(id) = self.material.take() {
            release_logged(MaterialId::KIND, surface.release_material(id));
            report.material = true;
        }
        if let Some(id) = self.node.take() {
            if graph.detach(id).is_none() {
                warn!(node = ?id, "scene node already detached");
            }
            report.node = true;
        }
        if let Some(id) = self.binding.take() {
            release_logged(BindingId::KIND, surface.release_binding(id));
            report.binding = true;
        }

        if !report.is_noop() {
            debug!(path = self.asset.path(), "disposed instance resources");
        }
        report
    }
}

impl Drop for MeshInstance {
    fn drop(&mut self) {
        if !self.is_disposed() {
            warn!(path = self.asset.path(), "mesh instance dropped with live surface resources");
        }
    }
}

/// Make `next` the active instance: the previous one is fully disposed before
/// `next` enters the scene graph.
pub fn swap_instance<B>(
    active: &mut Option<MeshInstance>,
    mut next: MeshInstance,
    surface: &mut B,
    graph: &mut SceneGraph,
) where
    B: RenderSurface + ?Sized,
{
    if let Some(mut previous) = active.take() {
        previous.dispose(surface, graph);
    }
    next.show(graph);
    *active = Some(next);
}

fn release_logged(kind: &'static str, result: Result<(), SurfaceError>) {
    if let Err(err) = result {
        warn!(kind, error = %err, "release failed, treating resource as released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::geometry::Mesh;
    use crate::headless::HeadlessSurface;

    fn asset(path: &str, size: f32) -> MeshAsset {
        MeshAsset::from_mesh(path, Mesh::cube(size)).unwrap()
    }

    fn material() -> Material {
        Material::new(Rgb::from_hex(0xf14a4a))
    }

    #[test]
    fn test_create_is_invisible_until_swapped_in() {
        let mut surface = HeadlessSurface::new(10, 10);
        let mut graph = SceneGraph::new();
        let instance =
            MeshInstance::create(&mut surface, asset("a", 1.0), ModelTransform::realigned(), &material())
                .unwrap();
        assert!(!instance.is_visible());
        assert!(graph.is_empty());
        assert_eq!(surface.allocations(), 3);

        let mut active = None;
        swap_instance(&mut active, instance, &mut surface, &mut graph);
        assert_eq!(graph.len(), 1);
        assert!(active.as_ref().unwrap().is_visible());

        active.as_mut().unwrap().dispose(&mut surface, &mut graph);
    }

    #[test]
    fn test_swap_disposes_previous_before_showing_next() {
        let mut surface = HeadlessSurface::new(10, 10);
        let mut graph = SceneGraph::new();
        let mut active = None;

        let a = MeshInstance::create(&mut surface, asset("a", 1.0), ModelTransform::realigned(), &material())
            .unwrap();
        swap_instance(&mut active, a, &mut surface, &mut graph);
        let b = MeshInstance::create(&mut surface, asset("b", 2.0), ModelTransform::realigned(), &material())
            .unwrap();
        swap_instance(&mut active, b, &mut surface, &mut graph);

        assert_eq!(graph.len(), 1);
        assert_eq!(surface.live_geometries(), 1);
        assert_eq!(surface.live_materials(), 1);
        assert_eq!(surface.live_bindings(), 1);
        assert_eq!(active.as_ref().unwrap().path(), "b");

        active.as_mut().unwrap().dispose(&mut surface, &mut graph);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut surface = HeadlessSurface::new(10, 10);
        let mut graph = SceneGraph::new();
        let mut active = None;
        let a = MeshInstance::create(&mut surface, asset("a", 1.0), ModelTransform::realigned(), &material())
            .unwrap();
        swap_instance(&mut active, a, &mut surface, &mut graph);

        let mut instance = active.take().unwrap();
        let first = instance.dispose(&mut surface, &mut graph);
        assert_eq!(
            first,
            DisposeReport {
                geometry: true,
                material: true,
                node: true,
                binding: true
            }
        );
        assert!(instance.dispose(&mut surface, &mut graph).is_noop());
        assert_eq!(surface.releases(), 3);
        assert!(graph.is_empty());
        assert!(instance.is_disposed());
    }

    #[test]
    fn test_failed_create_releases_partial_allocations() {
        let mut surface = HeadlessSurface::new(10, 10);
        surface.release();
        let result =
            MeshInstance::create(&mut surface, asset("a", 1.0), ModelTransform::realigned(), &material());
        assert!(result.is_err());
        assert_eq!(surface.live_geometries(), 0);
    }

    #[test]
    fn test_set_scale_updates_node_model() {
        let mut surface = HeadlessSurface::new(10, 10);
        let mut graph = SceneGraph::new();
        let mut active = None;
        let a = MeshInstance::create(&mut surface, asset("a", 1.0), ModelTransform::realigned(), &material())
            .unwrap();
        swap_instance(&mut active, a, &mut surface, &mut graph);

        let instance = active.as_mut().unwrap();
        instance.set_scale(Vector3::new(2.0, 2.0, 3.0), &mut graph);
        let node = graph.get(instance.node().unwrap()).unwrap();
        assert_eq!(node.model, instance.transform().matrix());
        let size = instance.world_bounds().unwrap().size();
        assert!((size.y - 3.0).abs() < 1e-5);

        instance.dispose(&mut surface, &mut graph);
    }
}
