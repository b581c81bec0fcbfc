//! Camera and projection utilities

use nalgebra::{Matrix4, Point3, Vector3, Vector4};

use crate::error::FrameError;

/// Camera configuration for 3D rendering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    /// Vertical field of view in radians
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

/// A point projected into pixel space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
    /// Normalized device depth in `[-1, 1]`, smaller is nearer
    pub depth: f32,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            position: Point3::new(0.0, 0.0, 40.0),
            target: Point3::new(0.0, 0.0, 0.0),
            up: Vector3::new(0.0, 1.0, 0.0),
            fov: 75f32.to_radians(),
            aspect: aspect_ratio(width, height).unwrap_or(1.0),
            near: 0.1,
            far: 1000.0,
        }
    }

    /// Create the view matrix (camera transformation)
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, &self.target, &self.up)
    }

    /// Create the perspective projection matrix
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        Matrix4::new_perspective(self.aspect, self.fov, self.near, self.far)
    }

    /// View and projection, rejecting camera states that would produce NaNs
    pub fn matrices(&self) -> Result<(Matrix4<f32>, Matrix4<f32>), FrameError> {
        if !(self.fov > 0.0 && self.fov < std::f32::consts::PI) {
            return Err(FrameError::DegenerateFov(self.fov));
        }
        if !(self.aspect.is_finite() && self.aspect > 0.0) {
            return Err(FrameError::DegenerateAspect(self.aspect));
        }
        let eye = self.position - self.target;
        if !(eye.norm() > f32::EPSILON) || eye.cross(&self.up).norm() <= f32::EPSILON {
            return Err(FrameError::DegenerateBounds);
        }
        Ok((self.view_matrix(), self.projection_matrix()))
    }
}

/// Project a model-space point through a combined model-view-projection
/// matrix into normalized device coordinates
pub fn project_to_ndc(mvp: &Matrix4<f32>, point: &Point3<f32>) -> Option<Point3<f32>> {
    let clip: Vector4<f32> = mvp * point.to_homogeneous();

    // Behind the eye or on the eye plane
    if clip.w <= 1e-6 {
        return None;
    }
    Some(Point3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w))
}

/// Project a 3D point to 2D screen space, `None` outside the view volume
pub fn project_to_screen(
    mvp: &Matrix4<f32>,
    point: &Point3<f32>,
    width: u32,
    height: u32,
) -> Option<ScreenPoint> {
    let ndc = project_to_ndc(mvp, point)?;

    // Clip test
    if ndc.x < -1.0 || ndc.x > 1.0 || ndc.y < -1.0 || ndc.y > 1.0 || ndc.z < -1.0 || ndc.z > 1.0 {
        return None;
    }

    // Convert to screen space
    Some(ScreenPoint {
        x: (ndc.x + 1.0) * 0.5 * width as f32,
        y: (1.0 - ndc.y) * 0.5 * height as f32,
        depth: ndc.z,
    })
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

/// `width / height`, or `None` when either side is zero
pub fn aspect_ratio(width: u32, height: u32) -> Option<f32> {
    if width == 0 || height == 0 {
        None
    } else {
        Some(width as f32 / height as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_camera_creation() {
        let camera = Camera::new(800, 600);
        assert_eq!(camera.fov, 75f32.to_radians());
        assert!((camera.aspect - 800.0 / 600.0).abs() < 1e-6);
    }

    #[test]
    fn test_view_matrix() {
        let camera = Camera::new(800, 600);
        let view = camera.view_matrix();
        // View matrix should be non-zero
        assert!(view.norm() > 0.0);
    }

    fn view_projection(camera: &Camera) -> Matrix4<f32> {
        let (view, projection) = camera.matrices().unwrap();
        projection * view
    }

    #[test]
    fn test_target_projects_to_screen_center() {
        let camera = Camera::new(800, 600);
        let p = project_to_screen(&view_projection(&camera), &camera.target, 800, 600).unwrap();
        assert_relative_eq!(p.x, 400.0, epsilon = 1e-3);
        assert_relative_eq!(p.y, 300.0, epsilon = 1e-3);
    }

    #[test]
    fn test_point_behind_camera_is_clipped() {
        let camera = Camera::new(800, 600);
        let behind = Point3::new(0.0, 0.0, 80.0);
        let vp = view_projection(&camera);
        assert!(project_to_ndc(&vp, &behind).is_none());
        assert!(project_to_screen(&vp, &Point3::new(500.0, 0.0, 0.0), 800, 600).is_none());
    }

    #[test]
    fn test_matrices_reject_degenerate_state() {
        let mut camera = Camera::default();
        camera.fov = 0.0;
        assert_eq!(camera.matrices().unwrap_err(), FrameError::DegenerateFov(0.0));

        let mut camera = Camera::default();
        camera.position = camera.target;
        assert_eq!(camera.matrices().unwrap_err(), FrameError::DegenerateBounds);

        assert!(Camera::default().matrices().is_ok());
    }

    #[test]
    fn test_aspect_ratio() {
        assert_eq!(aspect_ratio(0, 10), None);
        assert_eq!(aspect_ratio(20, 10), Some(2.0));
    }
}
