//! Vaseview Core Library - parametric mesh viewer logic
//!
//! This library loads STL meshes, scales them to physical height and width,
//! keeps the camera framed on them and manages the render-surface resources
//! behind each mounted viewport. Drawing itself is delegated to a
//! [`RenderSurface`] implementation supplied by the host.

pub mod arena;
pub mod color;
pub mod config;
pub mod controls;
pub mod error;
pub mod framing;
pub mod geometry;
pub mod headless;
pub mod loader;
pub mod projection;
pub mod resources;
pub mod scheduler;
pub mod stage;
pub mod stl;
pub mod store;
pub mod surface;
pub mod transform;
pub mod viewport;

// Re-export commonly used types
pub use color::Rgb;
pub use config::{ConfigError, ViewerConfig};
pub use error::{FrameError, LoadError, Result, SurfaceError, ViewerError};
pub use geometry::{Aabb, Mesh, Triangle, Vertex};
pub use headless::HeadlessSurface;
pub use loader::{LoadRequest, MeshAsset};
pub use projection::Camera;
pub use scheduler::TickOutcome;
pub use stage::{LoadEvent, Stage, ViewportId};
pub use store::{FsMeshStore, MemoryMeshStore, MeshStore};
pub use surface::{DrawCall, FrameDesc, Material, RenderSurface};
pub use transform::{ModelTransform, ReferenceDimensions};
pub use viewport::{ScaleOutcome, ViewParameters};
