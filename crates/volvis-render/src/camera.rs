//! Camera and per-pixel ray generation.
//!
//! The camera lives in voxel space: the volume occupies the box `[0, dims]`.

use glam::{Mat4, Vec3};

/// Camera projection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionMode {
    /// Perspective projection.
    #[default]
    Perspective,
    /// Orthographic projection.
    Orthographic,
}

/// A ray with a unit direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Creates a ray, normalizing `direction`.
    #[must_use]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Point at parameter `t`.
    #[must_use]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Entry and exit parameters of the ray against an axis-aligned box, clipped to `t >= 0`.
    ///
    /// Returns `None` when the ray misses the box or the box lies behind the origin.
    #[must_use]
    pub fn intersect_box(&self, min: Vec3, max: Vec3) -> Option<(f32, f32)> {
        let inv = self.direction.recip();
        let t0 = (min - self.origin) * inv;
        let t1 = (max - self.origin) * inv;
        // NaN from 0 * inf on a face-parallel axis drops out of min/max
        let near = t0.min(t1).max_element().max(0.0);
        let far = t0.max(t1).min_element();
        (near <= far && far.is_finite()).then_some((near, far))
    }
}

/// A 3D camera for viewing the volume.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera position in voxel space.
    pub position: Vec3,
    /// Point the camera is looking at.
    pub target: Vec3,
    /// Up vector.
    pub up: Vec3,
    /// Field of view in radians.
    pub fov: f32,
    /// Aspect ratio (width / height).
    pub aspect_ratio: f32,
    /// Near clipping plane.
    pub near: f32,
    /// Far clipping plane.
    pub far: f32,
    /// Projection mode.
    pub projection_mode: ProjectionMode,
    /// Half height of the view (used when `projection_mode` is Orthographic).
    pub ortho_scale: f32,
}

impl Camera {
    /// Creates a new camera with default settings.
    #[must_use]
    pub fn new(aspect_ratio: f32) -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov: std::f32::consts::FRAC_PI_4, // 45 degrees
            aspect_ratio,
            near: 0.01,
            far: 1000.0,
            projection_mode: ProjectionMode::Perspective,
            ortho_scale: 1.0,
        }
    }

    /// Creates a camera framing the box `[0, dims]`.
    #[must_use]
    pub fn framing(dims: Vec3, aspect_ratio: f32) -> Self {
        let mut camera = Self::new(aspect_ratio);
        camera.look_at_box(Vec3::ZERO, dims);
        camera
    }

    /// Sets the aspect ratio.
    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
    }

    /// Returns the view matrix.
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Returns the projection matrix.
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection_mode {
            ProjectionMode::Perspective => {
                Mat4::perspective_rh(self.fov, self.aspect_ratio, self.near, self.far)
            }
            ProjectionMode::Orthographic => {
                let half_height = self.ortho_scale;
                let half_width = half_height * self.aspect_ratio;
                let dist = (self.position - self.target).length();
                let ortho_depth = (dist + self.far).max(self.ortho_scale * 100.0);
                Mat4::orthographic_rh(
                    -half_width,
                    half_width,
                    -half_height,
                    half_height,
                    -ortho_depth,
                    ortho_depth,
                )
            }
        }
    }

    /// Returns the combined view-projection matrix.
    #[must_use]
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Returns the camera's forward direction.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize()
    }

    /// Returns the camera's right direction.
    #[must_use]
    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize()
    }

    /// Returns the up direction orthogonal to forward and right.
    #[must_use]
    pub fn true_up(&self) -> Vec3 {
        self.right().cross(self.forward())
    }

    /// Ray through the centre of pixel `(x, y)` of a `width` x `height` image.
    ///
    /// Pixel rows run top to bottom.
    #[must_use]
    pub fn ray_for_pixel(&self, x: u32, y: u32, width: u32, height: u32) -> Ray {
        let ndc_x = (x as f32 + 0.5) / width.max(1) as f32 * 2.0 - 1.0;
        let ndc_y = 1.0 - (y as f32 + 0.5) / height.max(1) as f32 * 2.0;
        let forward = self.forward();
        let right = self.right();
        let up = self.true_up();

        match self.projection_mode {
            ProjectionMode::Perspective => {
                let tan = (self.fov * 0.5).tan();
                let direction =
                    forward + right * (ndc_x * tan * self.aspect_ratio) + up * (ndc_y * tan);
                Ray::new(self.position, direction)
            }
            ProjectionMode::Orthographic => {
                let origin = self.position
                    + right * (ndc_x * self.ortho_scale * self.aspect_ratio)
                    + up * (ndc_y * self.ortho_scale);
                Ray::new(origin, forward)
            }
        }
    }

    /// Orbits the camera around the target.
    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        let radius = (self.position - self.target).length();
        let mut theta = (self.position.x - self.target.x).atan2(self.position.z - self.target.z);
        let mut phi = ((self.position.y - self.target.y) / radius).acos();

        theta -= delta_x;
        phi = (phi - delta_y).clamp(0.01, std::f32::consts::PI - 0.01);

        self.position = self.target
            + Vec3::new(
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
                radius * phi.sin() * theta.cos(),
            );
    }

    /// Pans the camera.
    pub fn pan(&mut self, delta_x: f32, delta_y: f32) {
        let offset = self.right() * delta_x + self.up * delta_y;
        self.position += offset;
        self.target += offset;
    }

    /// Zooms the camera (moves toward/away from target for perspective,
    /// adjusts `ortho_scale` for orthographic).
    pub fn zoom(&mut self, delta: f32) {
        match self.projection_mode {
            ProjectionMode::Perspective => {
                let direction = self.forward();
                let distance = (self.position - self.target).length();
                let new_distance = (distance - delta).max(0.1);
                self.position = self.target - direction * new_distance;
            }
            ProjectionMode::Orthographic => {
                let zoom_factor = 1.0 - delta * 0.4;
                self.ortho_scale = (self.ortho_scale * zoom_factor).clamp(0.01, 1000.0);
            }
        }
    }

    /// Resets the camera to look at the given bounding box.
    pub fn look_at_box(&mut self, min: Vec3, max: Vec3) {
        let center = (min + max) * 0.5;
        let size = (max - min).length();
        let extents = max - min;

        self.target = center;
        self.position = center + Vec3::new(0.0, 0.0, size * 1.5);
        self.near = size * 0.001;
        self.far = size * 100.0;

        let half_height = extents.y.max(extents.x / self.aspect_ratio) * 0.6;
        self.ortho_scale = half_height.max(0.1);
    }

    /// Sets the projection mode.
    pub fn set_projection_mode(&mut self, mode: ProjectionMode) {
        self.projection_mode = mode;
    }

    /// Sets the field of view in radians.
    pub fn set_fov(&mut self, fov: f32) {
        self.fov = fov.clamp(0.1, std::f32::consts::PI - 0.1);
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_defaults() {
        let camera = Camera::default();
        assert_eq!(camera.projection_mode, ProjectionMode::Perspective);
        assert_eq!(camera.aspect_ratio, 1.0);
    }

    #[test]
    fn test_framing_centres_the_box() {
        let camera = Camera::framing(Vec3::new(10.0, 20.0, 30.0), 1.0);
        assert_eq!(camera.target, Vec3::new(5.0, 10.0, 15.0));
        assert!(camera.position.z > 30.0);
    }

    #[test]
    fn test_centre_ray_hits_target() {
        let camera = Camera::framing(Vec3::splat(16.0), 1.0);
        let ray = camera.ray_for_pixel(50, 50, 101, 101);
        assert!((ray.direction - camera.forward()).length() < 1e-5);
        let (near, far) = ray.intersect_box(Vec3::ZERO, Vec3::splat(16.0)).unwrap();
        assert!((far - near - 16.0).abs() < 1e-3);
    }

    #[test]
    fn test_corner_rays_diverge_in_perspective() {
        let camera = Camera::framing(Vec3::splat(16.0), 1.0);
        let left = camera.ray_for_pixel(0, 50, 101, 101);
        let right = camera.ray_for_pixel(100, 50, 101, 101);
        assert!(left.direction.x < 0.0);
        assert!(right.direction.x > 0.0);
        assert_eq!(left.origin, right.origin);
    }

    #[test]
    fn test_orthographic_rays_are_parallel() {
        let mut camera = Camera::framing(Vec3::splat(16.0), 1.0);
        camera.set_projection_mode(ProjectionMode::Orthographic);
        let a = camera.ray_for_pixel(0, 0, 10, 10);
        let b = camera.ray_for_pixel(9, 9, 10, 10);
        assert_eq!(a.direction, b.direction);
        assert!(a.origin.x < b.origin.x);
        assert!(a.origin.y > b.origin.y);
    }

    #[test]
    fn test_intersect_box_miss_and_inside() {
        let ray = Ray::new(Vec3::new(-5.0, 20.0, 0.5), Vec3::X);
        assert_eq!(ray.intersect_box(Vec3::ZERO, Vec3::ONE), None);

        let inside = Ray::new(Vec3::splat(0.5), Vec3::Z);
        let (near, far) = inside.intersect_box(Vec3::ZERO, Vec3::ONE).unwrap();
        assert_eq!(near, 0.0);
        assert!((far - 0.5).abs() < 1e-6);

        let behind = Ray::new(Vec3::new(0.5, 0.5, 3.0), Vec3::Z);
        assert_eq!(behind.intersect_box(Vec3::ZERO, Vec3::ONE), None);
    }

    #[test]
    fn test_projection_mode_orthographic() {
        let mut camera = Camera::new(1.0);
        camera.projection_mode = ProjectionMode::Orthographic;
        camera.ortho_scale = 5.0;
        let proj = camera.projection_matrix();
        assert!((proj.w_axis.w - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_orbit_keeps_distance() {
        let mut camera = Camera::framing(Vec3::splat(8.0), 1.0);
        let before = camera.position.distance(camera.target);
        camera.orbit(0.7, 0.3);
        let after = camera.position.distance(camera.target);
        assert!((before - after).abs() < 1e-3);
    }

    #[test]
    fn test_zoom_perspective() {
        let mut camera = Camera::new(1.0);
        camera.position = Vec3::new(0.0, 0.0, 5.0);
        camera.target = Vec3::ZERO;

        let initial_distance = camera.position.distance(camera.target);
        camera.zoom(1.0);
        assert!(camera.position.distance(camera.target) < initial_distance);
    }

    #[test]
    fn test_zoom_orthographic() {
        let mut camera = Camera::new(1.0);
        camera.projection_mode = ProjectionMode::Orthographic;
        camera.ortho_scale = 5.0;
        camera.zoom(1.0);
        assert!(camera.ortho_scale < 5.0);
    }
}
