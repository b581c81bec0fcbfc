//! Mesh loading: fetch, parse and center an asset, one load in flight per viewport

use std::task::{Context, Poll};

use futures::future::{FutureExt, LocalBoxFuture};
use futures::task::noop_waker_ref;
use nalgebra::Point3;
use tracing::debug;

use crate::error::LoadError;
use crate::geometry::{Aabb, Mesh};
use crate::stl::{self, StlError};
use crate::store::MeshStore;
use crate::transform::ReferenceDimensions;

/// Parsed geometry, translated so its bounding-box center is the origin
#[derive(Debug, Clone, PartialEq)]
pub struct MeshAsset {
    path: String,
    mesh: Mesh,
    source_center: Point3<f32>,
    bounds: Aabb,
    reference: ReferenceDimensions,
}

impl MeshAsset {
    /// Center `mesh` on the origin and capture its reference dimensions
    pub fn from_mesh(path: impl Into<String>, mut mesh: Mesh) -> Result<Self, StlError> {
        let source_bounds = mesh.bounding_box().ok_or(StlError::Empty)?;
        let source_center = source_bounds.center();
        mesh.translate(&-source_center.coords);

        let bounds = mesh.bounding_box().ok_or(StlError::Empty)?;
        Ok(Self {
            path: path.into(),
            reference: ReferenceDimensions::from_bounds(&bounds),
            mesh,
            source_center,
            bounds,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Where the bounding-box center sat before centering
    pub fn source_center(&self) -> Point3<f32> {
        self.source_center
    }

    /// Bounds of the centered geometry
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn reference(&self) -> ReferenceDimensions {
        self.reference
    }
}

/// Fetch `path` from `store`, then parse and center it
pub fn load_mesh<S>(store: &S, path: &str) -> LocalBoxFuture<'static, Result<MeshAsset, LoadError>>
where
    S: MeshStore + ?Sized,
{
    let fetch = store.fetch_mesh(path);
    let path = path.to_string();
    async move {
        let bytes = fetch.await?;
        let mesh = stl::parse_stl(&bytes).map_err(|source| LoadError::Parse {
            path: path.clone(),
            source,
        })?;
        debug!(%path, triangles = mesh.triangles.len(), "parsed mesh");
        MeshAsset::from_mesh(path.clone(), mesh).map_err(|source| LoadError::Parse { path, source })
    }
    .boxed_local()
}

/// Result of a `set_model`-style request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadRequest {
    /// A fetch for the path has started
    Started,
    /// Another load is in flight; this path will be fetched once it resolves
    Queued,
}

/// A load that has resolved and is still wanted, or one that was dropped
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(MeshAsset),
    Failed(LoadError),
    /// Resolved after a newer request superseded it; nothing was attached
    Discarded { path: String },
}

struct InFlight {
    path: String,
    future: LocalBoxFuture<'static, Result<MeshAsset, LoadError>>,
}

/// At most one in-flight load plus the most recently requested path
#[derive(Default)]
pub struct LoadSlot {
    in_flight: Option<InFlight>,
    desired: Option<String>,
}

impl LoadSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight_path(&self) -> Option<&str> {
        self.in_flight.as_ref().map(|f| f.path.as_str())
    }

    /// The path the viewport should end up showing, if not yet attached
    pub fn desired_path(&self) -> Option<&str> {
        self.desired.as_deref()
    }

    pub fn request<S>(&mut self, store: &S, path: &str) -> LoadRequest
    where
        S: MeshStore + ?Sized,
    {
        self.desired = Some(path.to_string());
        if self.in_flight.is_some() {
            debug!(path, "load in flight, queueing request");
            return LoadRequest::Queued;
        }
        self.start(store, path);
        LoadRequest::Started
    }

    fn start<S>(&mut self, store: &S, path: &str)
    where
        S: MeshStore + ?Sized,
    {
        debug!(path, "starting mesh load");
        self.in_flight = Some(InFlight {
            path: path.to_string(),
            future: load_mesh(store, path),
        });
    }

    /// Poll the in-flight load once without blocking
    pub fn poll<S>(&mut self, store: &S) -> Option<LoadOutcome>
    where
        S: MeshStore + ?Sized,
    {
        let in_flight = self.in_flight.as_mut()?;
        let mut cx = Context::from_waker(noop_waker_ref());
        let result = match in_flight.future.poll_unpin(&mut cx) {
            Poll::Pending => return None,
            Poll::Ready(result) => result,
        };

        let path = self.in_flight.take().map(|f| f.path).unwrap_or_default();
        if self.desired.as_deref() == Some(path.as_str()) {
            self.desired = None;
            return Some(match result {
                Ok(asset) => LoadOutcome::Loaded(asset),
                Err(err) => LoadOutcome::Failed(err),
            });
        }

        // Superseded while in flight: drop it and fetch what is wanted now
        if let Some(next) = self.desired.clone() {
            self.start(store, &next);
        }
        Some(LoadOutcome::Discarded { path })
    }

    /// Forget any pending work; the underlying I/O is not interrupted
    pub fn clear(&mut self) {
        self.in_flight = None;
        self.desired = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stl::write_binary_stl;
    use crate::store::MemoryMeshStore;
    use approx::assert_relative_eq;
    use futures::channel::oneshot;
    use futures::executor::block_on;
    use nalgebra::Vector3;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Store whose fetches resolve only when the test says so
    #[derive(Default)]
    struct GatedStore {
        gates: RefCell<HashMap<String, oneshot::Sender<Result<Vec<u8>, LoadError>>>>,
    }

    impl GatedStore {
        fn open(&self, path: &str, bytes: Vec<u8>) {
            let tx = self.gates.borrow_mut().remove(path).unwrap();
            tx.send(Ok(bytes)).unwrap();
        }
    }

    impl MeshStore for GatedStore {
        fn fetch_mesh(&self, path: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, LoadError>> {
            let (tx, rx) = oneshot::channel();
            self.gates.borrow_mut().insert(path.to_string(), tx);
            async move { rx.await.unwrap() }.boxed_local()
        }
    }

    fn offset_cube() -> Mesh {
        let mut mesh = Mesh::cuboid(4.0, 4.0, 10.0);
        mesh.translate(&Vector3::new(5.0, -3.0, 20.0));
        mesh
    }

    #[test]
    fn test_asset_is_centered() {
        let asset = MeshAsset::from_mesh("vase1", offset_cube()).unwrap();
        assert_relative_eq!(asset.bounds().center(), Point3::origin(), epsilon = 1e-5);
        assert_relative_eq!(asset.source_center(), Point3::new(5.0, -3.0, 20.0), epsilon = 1e-5);
        assert_relative_eq!(asset.reference().width, 4.0, epsilon = 1e-5);
        assert_relative_eq!(asset.reference().height, 10.0, epsilon = 1e-5);
    }

    #[test]
    fn test_load_mesh_errors() {
        let store = MemoryMeshStore::new().with("bad.stl", b"solid x\nfacet\n".to_vec());
        assert!(matches!(
            block_on(load_mesh(&store, "bad.stl")),
            Err(LoadError::Parse { .. })
        ));
        assert!(matches!(
            block_on(load_mesh(&store, "nope.stl")),
            Err(LoadError::NotFound { .. })
        ));
    }

    #[test]
    fn test_load_mesh_ok() {
        let store = MemoryMeshStore::new().with("a.stl", write_binary_stl(&offset_cube()));
        let asset = block_on(load_mesh(&store, "a.stl")).unwrap();
        assert_eq!(asset.path(), "a.stl");
        assert_eq!(asset.mesh().triangles.len(), 12);
    }

    #[test]
    fn test_superseded_result_is_discarded() {
        let store = GatedStore::default();
        let mut slot = LoadSlot::new();

        assert_eq!(slot.request(&store, "a.stl"), LoadRequest::Started);
        assert_eq!(slot.request(&store, "b.stl"), LoadRequest::Queued);
        assert!(slot.poll(&store).is_none());
        assert_eq!(slot.in_flight_path(), Some("a.stl"));

        store.open("a.stl", write_binary_stl(&Mesh::cube(1.0)));
        match slot.poll(&store) {
            Some(LoadOutcome::Discarded { path }) => assert_eq!(path, "a.stl"),
            other => panic!("expected discard, got {other:?}"),
        }
        // The newer request is now the one in flight
        assert_eq!(slot.in_flight_path(), Some("b.stl"));

        store.open("b.stl", write_binary_stl(&Mesh::cube(2.0)));
        match slot.poll(&store) {
            Some(LoadOutcome::Loaded(asset)) => assert_eq!(asset.path(), "b.stl"),
            other => panic!("expected load, got {other:?}"),
        }
        assert!(!slot.is_loading());
        assert!(slot.desired_path().is_none());
    }

    #[test]
    fn test_rerequesting_in_flight_path_keeps_result() {
        let store = GatedStore::default();
        let mut slot = LoadSlot::new();
        slot.request(&store, "a.stl");
        slot.request(&store, "b.stl");
        slot.request(&store, "a.stl");

        store.open("a.stl", write_binary_stl(&Mesh::cube(1.0)));
        assert!(matches!(slot.poll(&store), Some(LoadOutcome::Loaded(_))));
        assert!(!slot.is_loading());
    }
}
