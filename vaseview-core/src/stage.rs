//! The viewer contract: mounted viewports addressed by handle.
//!
//! A `Stage` owns every viewport's state in an arena. Hosts hold only
//! [`ViewportId`]s, which go stale on teardown.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::arena::{Arena, Handle};
use crate::color::Rgb;
use crate::config::ViewerConfig;
use crate::error::{Result, ViewerError};
use crate::loader::{LoadOutcome, LoadRequest};
use crate::projection::Camera;
use crate::resources::MeshInstance;
use crate::scheduler::TickOutcome;
use crate::store::MeshStore;
use crate::surface::RenderSurface;
use crate::viewport::{ScaleOutcome, SceneState, ViewParameters, Viewport};

/// Host-side handle for a mounted viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewportId {
    index: u32,
    generation: u32,
}

impl ViewportId {
    fn from_handle<T>(handle: Handle<T>) -> Self {
        Self {
            index: handle.index(),
            generation: handle.generation(),
        }
    }

    fn handle<T>(self) -> Handle<T> {
        Handle::from_raw(self.index, self.generation)
    }
}

/// Reported to the host when a load settles
#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent {
    /// The mesh is attached and visible
    Attached { path: String },
    /// The load or the attach failed; the previous mesh is still shown
    Failed { path: String, error: ViewerError },
    /// A superseded load resolved and was dropped
    Discarded { path: String },
}

type Listener = Box<dyn FnMut(ViewportId, &LoadEvent)>;

pub struct Stage<S, B> {
    store: S,
    config: ViewerConfig,
    viewports: Arena<Viewport<B>>,
    listener: Option<Listener>,
}

impl<S: MeshStore, B: RenderSurface> Stage<S, B> {
    pub fn new(store: S, config: ViewerConfig) -> Self {
        Self {
            store,
            config,
            viewports: Arena::new(),
            listener: None,
        }
    }

    pub fn with_defaults(store: S) -> Self {
        Self::new(store, ViewerConfig::default())
    }

    /// Register a callback for settled loads, replacing any previous one
    pub fn on_load_event<F>(&mut self, listener: F)
    where
        F: FnMut(ViewportId, &LoadEvent) + 'static,
    {
        self.listener = Some(Box::new(listener));
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.viewports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewports.is_empty()
    }

    /// Create a viewport on `surface`, start its frame loop and begin loading `model_path`
    pub fn mount(
        &mut self,
        surface: B,
        model_path: &str,
        height: f32,
        width: f32,
        color: Rgb,
    ) -> Result<ViewportId> {
        let params = ViewParameters::new(height, width, color)?;
        let scene = SceneState::new(surface, params, &self.config);
        let mut viewport = Viewport::new(scene, &self.config, Instant::now());
        viewport.loads.request(&self.store, model_path);

        let id = ViewportId::from_handle(self.viewports.insert(viewport));
        info!(viewport = ?id, model = model_path, height, width, %color, "viewport mounted");
        Ok(id)
    }

    fn viewport_mut(&mut self, id: ViewportId) -> Result<&mut Viewport<B>> {
        self.viewports
            .get_mut(id.handle())
            .ok_or(ViewerError::UnknownViewport)
    }

    pub fn viewport(&self, id: ViewportId) -> Result<&Viewport<B>> {
        self.viewports.get(id.handle()).ok_or(ViewerError::UnknownViewport)
    }

    /// Request a different mesh. If a load is already in flight the new path
    /// is queued and the older result is dropped when it arrives.
    pub fn set_model(&mut self, id: ViewportId, path: &str) -> Result<LoadRequest> {
        let Self {
            store, viewports, ..
        } = self;
        let viewport = viewports
            .get_mut(id.handle())
            .ok_or(ViewerError::UnknownViewport)?;
        let request = viewport.loads.request(&*store, path);
        debug!(viewport = ?id, path, ?request, "model requested");
        Ok(request)
    }

    pub fn set_dimensions(&mut self, id: ViewportId, height: f32, width: f32) -> Result<ScaleOutcome> {
        self.viewport_mut(id)?.scene.set_dimensions(height, width)
    }

    pub fn set_color(&mut self, id: ViewportId, color: Rgb) -> Result<()> {
        self.viewport_mut(id)?.scene.set_color(color)
    }

    pub fn on_resize(&mut self, id: ViewportId, width: u32, height: u32) -> Result<()> {
        self.viewport_mut(id)?.scene.resize(width, height);
        Ok(())
    }

    /// Returns whether a drag started
    pub fn pointer_down(&mut self, id: ViewportId, x: f32, y: f32) -> Result<bool> {
        let scene = &mut self.viewport_mut(id)?.scene;
        let (width, height) = scene.surface.size();
        Ok(scene.controls.pointer_down(x, y, width, height))
    }

    pub fn pointer_move(&mut self, id: ViewportId, x: f32, y: f32) -> Result<()> {
        let scene = &mut self.viewport_mut(id)?.scene;
        let (_, height) = scene.surface.size();
        scene.controls.pointer_move(x, y, height);
        Ok(())
    }

    pub fn pointer_up(&mut self, id: ViewportId) -> Result<()> {
        self.viewport_mut(id)?.scene.controls.pointer_up();
        Ok(())
    }

    pub fn pointer_leave(&mut self, id: ViewportId) -> Result<()> {
        self.viewport_mut(id)?.scene.controls.pointer_leave();
        Ok(())
    }

    pub fn scroll(&mut self, id: ViewportId, delta: f32) -> Result<()> {
        self.viewport_mut(id)?.scene.controls.scroll(delta);
        Ok(())
    }

    /// Settle any resolved load without rendering
    pub fn poll_loads(&mut self, id: ViewportId) -> Result<()> {
        let Self {
            store,
            viewports,
            listener,
            ..
        } = self;
        let viewport = viewports
            .get_mut(id.handle())
            .ok_or(ViewerError::UnknownViewport)?;
        settle_loads(&*store, listener, id, viewport);
        Ok(())
    }

    /// Run one frame: settle loads, advance controls and render.
    ///
    /// A stale or torn-down handle yields [`TickOutcome::Cancelled`].
    pub fn tick(&mut self, id: ViewportId, now: Instant) -> TickOutcome {
        let Self {
            store,
            config,
            viewports,
            listener,
        } = self;
        let Some(viewport) = viewports.get_mut(id.handle()) else {
            return TickOutcome::Cancelled;
        };
        if !viewport.frames.is_running() {
            return TickOutcome::Cancelled;
        }

        settle_loads(&*store, listener, id, viewport);

        let scene = &mut viewport.scene;
        viewport.frames.run_tick(now, || scene.render(&config.lighting))
    }

    /// Whether `id` is still running and its next frame is due at `now`
    pub fn is_frame_due(&self, id: ViewportId, now: Instant) -> bool {
        self.viewports
            .get(id.handle())
            .is_some_and(|viewport| viewport.frames.is_due(now))
    }

    /// Earliest instant any running viewport wants its next frame
    pub fn next_frame_due(&self) -> Option<Instant> {
        self.viewports
            .iter()
            .filter_map(|(_, viewport)| viewport.frames.next_due())
            .min()
    }

    /// Stop the viewport's loop, release everything it owns and hand the
    /// surface back. The id is stale afterwards.
    pub fn teardown(&mut self, id: ViewportId) -> Result<B> {
        let viewport = self
            .viewports
            .remove(id.handle())
            .ok_or(ViewerError::UnknownViewport)?;
        let frames = viewport.frames.frames();
        let surface = viewport.teardown();
        info!(viewport = ?id, frames, "viewport torn down");
        Ok(surface)
    }

    pub fn surface(&self, id: ViewportId) -> Result<&B> {
        Ok(self.viewport(id)?.scene.surface())
    }

    pub fn surface_mut(&mut self, id: ViewportId) -> Result<&mut B> {
        Ok(self.viewport_mut(id)?.scene.surface_mut())
    }

    pub fn camera(&self, id: ViewportId) -> Result<&Camera> {
        Ok(self.viewport(id)?.scene.camera())
    }

    pub fn params(&self, id: ViewportId) -> Result<&ViewParameters> {
        Ok(self.viewport(id)?.scene.params())
    }

    pub fn instance(&self, id: ViewportId) -> Result<Option<&MeshInstance>> {
        Ok(self.viewport(id)?.scene.instance())
    }
}

/// Drain every resolved load into the viewport, reporting each to the listener
fn settle_loads<S, B>(
    store: &S,
    listener: &mut Option<Listener>,
    id: ViewportId,
    viewport: &mut Viewport<B>,
) where
    S: MeshStore,
    B: RenderSurface,
{
    while let Some(outcome) = viewport.loads.poll(store) {
        let event = match outcome {
            LoadOutcome::Loaded(asset) => {
                let path = asset.path().to_string();
                match viewport.scene.attach(asset) {
                    Ok(()) => {
                        viewport.active_path = Some(path.clone());
                        LoadEvent::Attached { path }
                    }
                    Err(err) => {
                        warn!(viewport = ?id, %path, error = %err, "could not attach mesh");
                        LoadEvent::Failed {
                            path,
                            error: err.into(),
                        }
                    }
                }
            }
            LoadOutcome::Failed(err) => {
                warn!(viewport = ?id, error = %err, "mesh load failed, keeping current mesh");
                LoadEvent::Failed {
                    path: err.path().to_string(),
                    error: err.into(),
                }
            }
            LoadOutcome::Discarded { path } => {
                debug!(viewport = ?id, %path, "discarded superseded load");
                LoadEvent::Discarded { path }
            }
        };

        if let Some(listener) = listener.as_mut() {
            listener(id, &event);
        }
    }
}
