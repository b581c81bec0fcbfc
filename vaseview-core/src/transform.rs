//! Model transforms: display realignment and dimension-driven non-uniform scale

use nalgebra::{Matrix4, Rotation3, Vector3};

use crate::error::DegenerateGeometry;
use crate::geometry::{Aabb, Mesh};

/// Transform builder for 3D transformations
pub struct Transform;

impl Transform {
    /// Create a scale matrix
    pub fn scale_matrix(sx: f32, sy: f32, sz: f32) -> Matrix4<f32> {
        Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz))
    }

    /// Create a model-view-projection matrix
    pub fn mvp_matrix(
        model: &Matrix4<f32>,
        view: &Matrix4<f32>,
        projection: &Matrix4<f32>,
    ) -> Matrix4<f32> {
        projection * view * model
    }
}

/// Width and height of the centered authored geometry, captured once at load.
///
/// Meshes are authored Z-up: height is the Z extent, width the mean of the
/// X and Y extents (the footprint of a turned object like a vase).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceDimensions {
    pub width: f32,
    pub height: f32,
}

impl ReferenceDimensions {
    pub fn from_bounds(bounds: &Aabb) -> Self {
        let size = bounds.size();
        Self {
            width: (size.x + size.y) / 2.0,
            height: size.z,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0)
    }
}

/// Scale vector `(width/W0, width/W0, height/H0)` in authored axes.
pub fn scale_for(
    height: f32,
    width: f32,
    reference: ReferenceDimensions,
) -> Result<Vector3<f32>, DegenerateGeometry> {
    let degenerate = DegenerateGeometry {
        width: reference.width,
        height: reference.height,
    };
    if reference.is_degenerate() {
        return Err(degenerate);
    }

    let horizontal = width / reference.width;
    let vertical = height / reference.height;
    let scale = Vector3::new(horizontal, horizontal, vertical);
    // Tiny references can still overflow
    if scale.iter().all(|s| s.is_finite() && *s > 0.0) {
        Ok(scale)
    } else {
        Err(degenerate)
    }
}

/// The transform applied to an attached mesh: scale first, then the fixed realignment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelTransform {
    pub realign: Rotation3<f32>,
    pub scale: Vector3<f32>,
}

impl ModelTransform {
    /// Authored +Z becomes display +Y (a -90 degree turn about X)
    pub fn realigned() -> Self {
        Self {
            realign: Rotation3::from_axis_angle(&Vector3::x_axis(), -std::f32::consts::FRAC_PI_2),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn with_scale(mut self, scale: Vector3<f32>) -> Self {
        self.scale = scale;
        self
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        self.realign.to_homogeneous() * Transform::scale_matrix(self.scale.x, self.scale.y, self.scale.z)
    }

    /// World-space bounds of `mesh` under this transform
    pub fn world_bounds(&self, mesh: &Mesh) -> Option<Aabb> {
        mesh.transformed_bounding_box(&self.matrix())
    }
}

impl Default for ModelTransform {
    fn default() -> Self {
        Self::realigned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    fn vase_like() -> Mesh {
        // 6 wide, 6 deep, 12 tall when authored Z-up
        Mesh::cuboid(6.0, 6.0, 12.0)
    }

    #[test]
    fn test_reference_dimensions_use_footprint_mean() {
        let bounds = Mesh::cuboid(4.0, 6.0, 10.0).bounding_box().unwrap();
        let reference = ReferenceDimensions::from_bounds(&bounds);
        assert_relative_eq!(reference.width, 5.0);
        assert_relative_eq!(reference.height, 10.0);
        assert!(!reference.is_degenerate());
    }

    #[test]
    fn test_scale_for() {
        let reference = ReferenceDimensions {
            width: 6.0,
            height: 12.0,
        };
        let scale = scale_for(15.0, 15.0, reference).unwrap();
        assert_relative_eq!(scale, Vector3::new(2.5, 2.5, 1.25));
    }

    #[test]
    fn test_scale_for_degenerate() {
        for reference in [
            ReferenceDimensions { width: 0.0, height: 1.0 },
            ReferenceDimensions { width: 1.0, height: 0.0 },
            ReferenceDimensions { width: f32::NAN, height: 1.0 },
            ReferenceDimensions { width: 1.0, height: f32::INFINITY },
        ] {
            assert!(scale_for(10.0, 10.0, reference).is_err());
        }
        let tiny = ReferenceDimensions { width: 1e-45, height: 1.0 };
        assert!(scale_for(10.0, 10.0, tiny).is_err());
    }

    #[test]
    fn test_realignment_maps_authored_up_to_display_up() {
        let transform = ModelTransform::realigned();
        let up = transform.matrix().transform_point(&Point3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(up, Point3::new(0.0, 1.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_world_bounds_match_requested_dimensions() {
        let mesh = vase_like();
        let reference = ReferenceDimensions::from_bounds(&mesh.bounding_box().unwrap());
        let scale = scale_for(20.0, 8.0, reference).unwrap();
        let bounds = ModelTransform::realigned()
            .with_scale(scale)
            .world_bounds(&mesh)
            .unwrap();
        let size = bounds.size();
        assert_relative_eq!(size.y, 20.0, epsilon = 1e-4);
        assert_relative_eq!(size.x, 8.0, epsilon = 1e-4);
        assert_relative_eq!(size.z, 8.0, epsilon = 1e-4);
    }

    #[test]
    fn test_mvp_applies_model_first() {
        let model = Transform::scale_matrix(2.0, 3.0, 4.0);
        let view = Matrix4::new_translation(&Vector3::new(1.0, 0.0, 0.0));
        let p = Transform::mvp_matrix(&model, &view, &Matrix4::identity())
            .transform_point(&Point3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(p, Point3::new(3.0, 3.0, 4.0));
    }
}
