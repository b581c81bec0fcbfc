//! Per-viewport state: the scene record owned by one viewport and the
//! operations that mutate it on the render thread.

use std::ops::RangeInclusive;
use std::time::Instant;

use nalgebra::Vector3;
use tracing::{debug, info, warn};

use crate::color::Rgb;
use crate::config::{LightingConfig, ViewerConfig};
use crate::controls::OrbitControls;
use crate::error::{DegenerateGeometry, FrameError, Result, SurfaceError, ViewerError};
use crate::framing::{self, Framing};
use crate::loader::{LoadSlot, MeshAsset};
use crate::projection::{aspect_ratio, Camera};
use crate::resources::{swap_instance, MeshInstance, SceneGraph};
use crate::scheduler::FrameLoop;
use crate::surface::{FrameDesc, Material, RenderSurface};
use crate::transform::{scale_for, ModelTransform};

/// Accepted range for both physical dimensions
pub const DIMENSION_RANGE: RangeInclusive<f32> = 5.0..=25.0;

/// What the host asked to see
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewParameters {
    pub height: f32,
    pub width: f32,
    pub color: Rgb,
}

impl ViewParameters {
    pub fn new(height: f32, width: f32, color: Rgb) -> Result<Self> {
        validate_dimensions(height, width)?;
        Ok(Self {
            height,
            width,
            color,
        })
    }
}

impl Default for ViewParameters {
    fn default() -> Self {
        Self {
            height: 15.0,
            width: 15.0,
            color: Rgb::from_hex(0xf14a4a),
        }
    }
}

pub fn validate_dimensions(height: f32, width: f32) -> Result<()> {
    if DIMENSION_RANGE.contains(&height) && DIMENSION_RANGE.contains(&width) {
        Ok(())
    } else {
        Err(ViewerError::InvalidDimensions {
            height,
            width,
            min: *DIMENSION_RANGE.start(),
            max: *DIMENSION_RANGE.end(),
        })
    }
}

/// Result of a dimension change
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleOutcome {
    /// The active mesh now has this scale
    Applied(Vector3<f32>),
    /// No mesh attached yet; the dimensions apply at the next attach
    Deferred,
    /// The active mesh cannot be scaled; its previous transform stays
    Degenerate(DegenerateGeometry),
}

/// Everything one viewport renders from
pub struct SceneState<B> {
    pub(crate) surface: B,
    pub(crate) graph: SceneGraph,
    pub(crate) camera: Camera,
    pub(crate) controls: OrbitControls,
    pub(crate) params: ViewParameters,
    pub(crate) instance: Option<MeshInstance>,
    backoff: f32,
}

impl<B: RenderSurface> SceneState<B> {
    pub fn new(surface: B, params: ViewParameters, config: &ViewerConfig) -> Self {
        let (width, height) = surface.size();
        let mut camera = Camera::new(width, height);
        camera.fov = config.camera.fov_radians();
        camera.near = config.camera.near;
        camera.far = config.camera.far;
        let distance = (camera.position - camera.target).norm();

        Self {
            surface,
            graph: SceneGraph::new(),
            camera,
            controls: OrbitControls::new(&config.controls, distance),
            params,
            instance: None,
            backoff: config.camera.backoff,
        }
    }

    pub fn surface(&self) -> &B {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut B {
        &mut self.surface
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn controls(&self) -> &OrbitControls {
        &self.controls
    }

    pub fn params(&self) -> &ViewParameters {
        &self.params
    }

    pub fn instance(&self) -> Option<&MeshInstance> {
        self.instance.as_ref()
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    /// Scale for the current dimensions, or unit scale when the mesh is degenerate
    fn transform_for(&self, asset: &MeshAsset) -> ModelTransform {
        let transform = ModelTransform::realigned();
        match scale_for(self.params.height, self.params.width, asset.reference()) {
            Ok(scale) => transform.with_scale(scale),
            Err(degenerate) => {
                warn!(path = asset.path(), %degenerate, "attaching without dimension scaling");
                transform
            }
        }
    }

    /// Attach a freshly loaded asset, replacing the active instance.
    ///
    /// Transform and framing are computed first; the old instance is disposed
    /// only once the new one has its resources.
    pub fn attach(&mut self, asset: MeshAsset) -> std::result::Result<(), SurfaceError> {
        let transform = self.transform_for(&asset);
        let framing = transform
            .world_bounds(asset.mesh())
            .ok_or(FrameError::DegenerateBounds)
            .and_then(|bounds| {
                framing::reframe(&bounds, self.camera.fov, self.camera.aspect, self.backoff)
            });

        let material = Material::new(self.params.color);
        let path = asset.path().to_string();
        let next = MeshInstance::create(&mut self.surface, asset, transform, &material)?;
        swap_instance(&mut self.instance, next, &mut self.surface, &mut self.graph);

        match framing {
            Ok(framing) => self.apply_framing(framing),
            Err(err) => warn!(%path, error = %err, "could not frame new mesh, keeping camera"),
        }
        info!(%path, scale = ?transform.scale, "mesh attached");
        Ok(())
    }

    /// Recompute the active instance's scale from `height` and `width`
    pub fn set_dimensions(&mut self, height: f32, width: f32) -> Result<ScaleOutcome> {
        validate_dimensions(height, width)?;
        self.params.height = height;
        self.params.width = width;

        let Some(instance) = self.instance.as_mut() else {
            debug!(height, width, "no mesh attached, dimensions deferred");
            return Ok(ScaleOutcome::Deferred);
        };

        let scale = match scale_for(height, width, instance.reference()) {
            Ok(scale) => scale,
            Err(degenerate) => {
                warn!(path = instance.path(), %degenerate, "skipping scale update");
                return Ok(ScaleOutcome::Degenerate(degenerate));
            }
        };
        instance.set_scale(scale, &mut self.graph);

        if let Err(err) = self.reframe() {
            warn!(error = %err, "could not reframe after scale change, keeping camera");
        }
        Ok(ScaleOutcome::Applied(scale))
    }

    /// Recolor the active material; parameters only change once the surface accepted it
    pub fn set_color(&mut self, color: Rgb) -> Result<()> {
        if let Some(instance) = self.instance.as_mut() {
            instance.set_material(&mut self.surface, &Material::new(color))?;
        }
        self.params.color = color;
        Ok(())
    }

    /// Point the camera at the active instance's current bounds
    pub fn reframe(&mut self) -> std::result::Result<(), FrameError> {
        let bounds = self
            .instance
            .as_ref()
            .and_then(MeshInstance::world_bounds)
            .ok_or(FrameError::DegenerateBounds)?;
        let framing =
            framing::reframe(&bounds, self.camera.fov, self.camera.aspect, self.backoff)?;
        self.apply_framing(framing);
        Ok(())
    }

    fn apply_framing(&mut self, framing: Framing) {
        self.camera.target = framing.target;
        self.controls.reset(framing.distance);
        self.camera.position = self.controls.eye(&self.camera.target);
        // Keep the whole orbit sphere inside the far plane
        self.camera.far = self.camera.far.max(framing.distance * 4.0);
        debug!(target = ?framing.target, distance = framing.distance, "camera reframed");
    }

    /// Resize the draw surface and fix up the aspect ratio; nothing else changes
    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface.resize(width, height);
        match aspect_ratio(width, height) {
            Some(aspect) => self.camera.aspect = aspect,
            None => debug!(width, height, "zero-sized surface, keeping aspect"),
        }
    }

    /// Advance controls, rebuild matrices and draw
    pub fn render(&mut self, lighting: &LightingConfig) -> std::result::Result<(), FrameError> {
        self.camera.position = self.controls.update(&self.camera.target);
        let (view, projection) = self.camera.matrices()?;
        let draws = self.graph.draw_calls();
        self.surface.render(&FrameDesc {
            camera: &self.camera,
            view,
            projection,
            draws: &draws,
            lighting,
        })?;
        Ok(())
    }

    /// Dispose the active instance and release the surface
    fn release(&mut self) {
        if let Some(mut instance) = self.instance.take() {
            instance.dispose(&mut self.surface, &mut self.graph);
        }
        self.surface.release();
    }
}

/// A mounted viewport: scene state, its load slot and its frame loop
pub struct Viewport<B> {
    pub(crate) scene: SceneState<B>,
    pub(crate) loads: LoadSlot,
    pub(crate) frames: FrameLoop,
    pub(crate) active_path: Option<String>,
}

impl<B: RenderSurface> Viewport<B> {
    pub fn new(scene: SceneState<B>, config: &ViewerConfig, now: Instant) -> Self {
        Self {
            scene,
            loads: LoadSlot::new(),
            frames: FrameLoop::start(now, config.frame.interval()),
            active_path: None,
        }
    }

    pub fn scene(&self) -> &SceneState<B> {
        &self.scene
    }

    pub fn frames(&self) -> &FrameLoop {
        &self.frames
    }

    pub fn is_loading(&self) -> bool {
        self.loads.is_loading()
    }

    /// Path of the attached mesh, if any
    pub fn active_path(&self) -> Option<&str> {
        self.active_path.as_deref()
    }

    /// Stop the frame loop, drop pending loads and release every resource.
    /// Returns the surface to the host.
    pub(crate) fn teardown(mut self) -> B {
        self.frames.cancel();
        self.loads.clear();
        self.scene.release();
        self.scene.surface
    }
}
