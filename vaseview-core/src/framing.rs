//! Camera auto-framing: keep the orbit target on the geometry and back the
//! camera off far enough that the whole bounding box stays in view.

use nalgebra::{Point3, Vector3};

use crate::error::FrameError;
use crate::geometry::Aabb;

/// Direction from the target towards the camera when framing
pub fn forward_axis() -> Vector3<f32> {
    Vector3::z()
}

/// Where the camera should look and how far it should sit from the target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Framing {
    pub target: Point3<f32>,
    pub distance: f32,
}

impl Framing {
    pub fn eye(&self) -> Point3<f32> {
        self.target + forward_axis() * self.distance
    }
}

/// `distance = (max_extent / 2) / tan(fov / 2) * backoff`, targeting the box center.
///
/// `fov` is vertical; on a portrait viewport the narrower horizontal
/// half-angle is used instead. The box fits whenever
/// `backoff >= 1 + tan(fov / 2)`.
pub fn reframe(bounds: &Aabb, fov: f32, aspect: f32, backoff: f32) -> Result<Framing, FrameError> {
    if !(fov > 0.0 && fov < std::f32::consts::PI) {
        return Err(FrameError::DegenerateFov(fov));
    }
    if !(aspect > 0.0 && aspect.is_finite()) {
        return Err(FrameError::DegenerateAspect(aspect));
    }
    if !bounds.is_finite() {
        return Err(FrameError::DegenerateBounds);
    }
    let extent = bounds.max_extent();
    if !(extent > 0.0) {
        return Err(FrameError::DegenerateBounds);
    }

    let half_tan = (fov / 2.0).tan() * aspect.min(1.0);
    let distance = (extent / 2.0) / half_tan * backoff;
    if !(distance.is_finite() && distance > 0.0) {
        return Err(FrameError::DegenerateBounds);
    }

    Ok(Framing {
        target: bounds.center(),
        distance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::{project_to_ndc, Camera};
    use approx::assert_relative_eq;

    fn camera_for(framing: &Framing, fov: f32, width: u32, height: u32) -> Camera {
        let mut camera = Camera::new(width, height);
        camera.fov = fov;
        camera.target = framing.target;
        camera.position = framing.eye();
        camera
    }

    #[test]
    fn test_distance_formula() {
        let bounds = Aabb::new(Point3::new(-1.0, -2.0, -3.0), Point3::new(1.0, 2.0, 3.0));
        let fov = 90f32.to_radians();
        let framing = reframe(&bounds, fov, 1.0, 2.0).unwrap();
        // (6 / 2) / tan(45deg) * 2
        assert_relative_eq!(framing.distance, 6.0, epsilon = 1e-5);
        assert_relative_eq!(framing.target, Point3::origin());
    }

    #[test]
    fn test_target_is_box_center() {
        let bounds = Aabb::new(Point3::new(2.0, 4.0, -6.0), Point3::new(4.0, 10.0, -2.0));
        let framing = reframe(&bounds, 1.0, 1.0, 2.0).unwrap();
        assert_relative_eq!(framing.target, Point3::new(3.0, 7.0, -4.0));
    }

    #[test]
    fn test_box_corners_inside_frustum() {
        let boxes = [
            Aabb::new(Point3::new(-7.5, -10.0, -7.5), Point3::new(7.5, 10.0, 7.5)),
            Aabb::new(Point3::new(-12.5, -2.5, -12.5), Point3::new(12.5, 2.5, 12.5)),
            Aabb::new(Point3::new(1.0, 1.0, 1.0), Point3::new(6.0, 26.0, 6.0)),
        ];
        let sizes = [(800, 800), (1600, 400), (300, 600), (100, 900)];
        for fov_degrees in [30.0f32, 45.0, 60.0, 75.0] {
            let fov = fov_degrees.to_radians();
            for &(width, height) in &sizes {
                let aspect = width as f32 / height as f32;
                for bounds in &boxes {
                    let framing = reframe(bounds, fov, aspect, 2.0).unwrap();
                    let camera = camera_for(&framing, fov, width, height);
                    let (view, projection) = camera.matrices().unwrap();
                    for corner in bounds.corners() {
                        let ndc = project_to_ndc(&(projection * view), &corner).unwrap();
                        assert!(
                            ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0,
                            "{fov_degrees} {width}x{height} {ndc:?}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_portrait_backs_off_further() {
        let bounds = Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let fov = 60f32.to_radians();
        let square = reframe(&bounds, fov, 1.0, 2.0).unwrap();
        let wide = reframe(&bounds, fov, 2.0, 2.0).unwrap();
        let portrait = reframe(&bounds, fov, 0.5, 2.0).unwrap();
        assert_relative_eq!(wide.distance, square.distance);
        assert_relative_eq!(portrait.distance, square.distance * 2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_degenerate_inputs() {
        let unit = Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        assert_eq!(reframe(&unit, 0.0, 1.0, 2.0), Err(FrameError::DegenerateFov(0.0)));
        assert!(matches!(
            reframe(&unit, std::f32::consts::PI, 1.0, 2.0),
            Err(FrameError::DegenerateFov(_))
        ));
        assert_eq!(reframe(&unit, 1.0, 0.0, 2.0), Err(FrameError::DegenerateAspect(0.0)));

        let point = Aabb::new(Point3::origin(), Point3::origin());
        assert_eq!(reframe(&point, 1.0, 1.0, 2.0), Err(FrameError::DegenerateBounds));

        let nan = Aabb::new(Point3::new(f32::NAN, 0.0, 0.0), Point3::origin());
        assert_eq!(reframe(&nan, 1.0, 1.0, 2.0), Err(FrameError::DegenerateBounds));
    }
}
