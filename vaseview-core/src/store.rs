//! Mesh asset stores: where raw mesh bytes come from

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;

use futures::channel::oneshot;
use futures::future::{self, FutureExt, LocalBoxFuture};
use tracing::debug;

use crate::error::LoadError;

/// Source of raw mesh bytes, addressed by model path.
///
/// The returned future is polled on the render thread and must not block it.
pub trait MeshStore {
    fn fetch_mesh(&self, path: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, LoadError>>;
}

/// Reads mesh files below a root directory on a short-lived helper thread
#[derive(Debug, Clone)]
pub struct FsMeshStore {
    root: PathBuf,
}

impl FsMeshStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn read_file(full: &Path, path: &str) -> Result<Vec<u8>, LoadError> {
    std::fs::read(full).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => LoadError::NotFound {
            path: path.to_string(),
        },
        _ => LoadError::Unavailable {
            path: path.to_string(),
            reason: err.to_string(),
        },
    })
}

impl MeshStore for FsMeshStore {
    fn fetch_mesh(&self, path: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, LoadError>> {
        let full = self.root.join(path);
        let owned = path.to_string();
        let (tx, rx) = oneshot::channel();

        debug!(path = %full.display(), "fetching mesh");
        let worker_path = owned.clone();
        let spawned = thread::Builder::new()
            .name("mesh-fetch".to_string())
            .spawn(move || {
                // The receiver may be gone if the viewport was torn down
                let _ = tx.send(read_file(&full, &worker_path));
            });

        if let Err(err) = spawned {
            return future::ready(Err(LoadError::Unavailable {
                path: owned,
                reason: err.to_string(),
            }))
            .boxed_local();
        }

        async move {
            rx.await.unwrap_or_else(|_| {
                Err(LoadError::Unavailable {
                    path: owned,
                    reason: "fetch thread exited without a result".to_string(),
                })
            })
        }
        .boxed_local()
    }
}

/// In-memory store; resolves on first poll
#[derive(Debug, Clone, Default)]
pub struct MemoryMeshStore {
    meshes: HashMap<String, Vec<u8>>,
}

impl MemoryMeshStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: Vec<u8>) {
        self.meshes.insert(path.into(), bytes);
    }

    pub fn with(mut self, path: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(path, bytes);
        self
    }
}

impl MeshStore for MemoryMeshStore {
    fn fetch_mesh(&self, path: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, LoadError>> {
        let result = self
            .meshes
            .get(path)
            .cloned()
            .ok_or_else(|| LoadError::NotFound {
                path: path.to_string(),
            });
        future::ready(result).boxed_local()
    }
}
