//! Error types shared across the viewer core

use thiserror::Error;

use crate::stl::StlError;

/// Why a mesh load was aborted. The previously attached mesh stays on screen.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LoadError {
    #[error("mesh asset not found: {path}")]
    NotFound { path: String },

    #[error("failed to parse mesh asset {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: StlError,
    },

    #[error("mesh store failed to deliver {path}: {reason}")]
    Unavailable { path: String, reason: String },
}

impl LoadError {
    pub fn path(&self) -> &str {
        match self {
            LoadError::NotFound { path }
            | LoadError::Parse { path, .. }
            | LoadError::Unavailable { path, .. } => path,
        }
    }
}

/// Failures reported by a [`crate::surface::RenderSurface`]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SurfaceError {
    #[error("unknown or released {kind} handle {index}:{generation}")]
    UnknownHandle {
        kind: &'static str,
        index: u32,
        generation: u32,
    },

    #[error("render surface has been released")]
    Released,

    #[error("render surface device error: {0}")]
    Device(String),
}

/// A frame or camera update that had to be skipped
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    #[error("field of view {0} rad is outside (0, pi)")]
    DegenerateFov(f32),

    #[error("bounding box is empty, zero-sized or non-finite")]
    DegenerateBounds,

    #[error("aspect ratio {0} is not positive and finite")]
    DegenerateAspect(f32),

    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// Reference width or height captured at attach time is unusable for scaling
#[derive(Debug, Error, Clone, Copy, PartialEq)]
#[error("degenerate geometry: reference width {width}, reference height {height}")]
pub struct DegenerateGeometry {
    pub width: f32,
    pub height: f32,
}

/// Errors returned by the public viewer contract
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ViewerError {
    #[error("viewport handle is stale or was never mounted")]
    UnknownViewport,

    #[error("dimensions height={height}, width={width} must be finite and within [{min}, {max}]")]
    InvalidDimensions {
        height: f32,
        width: f32,
        min: f32,
        max: f32,
    },

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

pub type Result<T, E = ViewerError> = std::result::Result<T, E>;
