use glam::{vec2, UVec2, Vec3};
use meshtracer_shared::FrameUniforms;

/// Ray representation for raytracing
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Create a new ray; a zero direction stays zero and never hits anything
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Create ray from screen coordinates, pixel (0, 0) is the top-left corner
    pub fn from_screen_coordinates(pixel_coords: UVec2, uniforms: &FrameUniforms) -> Self {
        let width = uniforms.resolution[0].max(1) as f32;
        let height = uniforms.resolution[1].max(1) as f32;
        let uv = vec2(
            (pixel_coords.x as f32 + 0.5) / width,
            (pixel_coords.y as f32 + 0.5) / height,
        );

        let aspect_ratio = width / height;
        let fov_scale = (uniforms.camera.fov.to_radians() * 0.5).tan();
        let camera_x = (uv.x * 2.0 - 1.0) * aspect_ratio * fov_scale;
        let camera_y = (1.0 - uv.y * 2.0) * fov_scale;

        let forward = Vec3::from_array(uniforms.camera.direction).normalize_or_zero();
        let right = forward.cross(Vec3::from_array(uniforms.camera.up)).normalize_or_zero();
        let true_up = right.cross(forward);

        Self::new(
            Vec3::from_array(uniforms.camera.position),
            forward + right * camera_x + true_up * camera_y,
        )
    }

    /// Get point along ray at parameter t
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    pub fn is_degenerate(&self) -> bool {
        self.direction.length_squared() <= 0.0
    }
}
