use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Configuration constants for the raytracer
pub struct RaytracerConfig;

impl RaytracerConfig {
    /// Side length of every texture array layer
    pub const TEXTURE_SIZE: u32 = 512;
    pub const TEXTURE_BYTES_PER_PIXEL: u32 = 4;
    /// Offset applied along the normal before tracing a secondary ray
    pub const RAY_EPSILON: f32 = 0.0001;
    pub const MIN_RAY_DISTANCE: f32 = 0.00001;
    /// Triangles whose Möller-Trumbore determinant falls below this are treated as degenerate
    pub const DEGENERATE_EPSILON: f32 = 1e-10;
    /// Hit distance mapped to black in depth display mode
    pub const DEPTH_FAR: f32 = 256.0;
    pub const BACKGROUND: [f32; 3] = [0.0, 0.0, 0.0];
    /// Work-group size reported by the software device
    pub const CPU_MAX_GROUP_SIZE: u32 = 256;

    pub const PERFORMANCE_STATS_INTERVAL: u64 = 60; // frames
    pub const MILLISECONDS_PER_SECOND: f32 = 1000.0;
}

/// Camera configuration for raytracing
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Camera {
    pub position: [f32; 3],
    pub fov: f32, // vertical field of view in degrees
    pub direction: [f32; 3],
    pub _padding0: f32,
    pub up: [f32; 3],
    pub _padding1: f32,
}

/// Per-dispatch uniform block
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct FrameUniforms {
    pub camera: Camera,
    pub resolution: [u32; 2],
    pub num_lights: u32,
    pub num_meshes: u32,
    pub num_bvh_nodes: u32,
    pub num_materials: u32,
    pub _padding: [u32; 2],
}

/// Vertex position, stored with vec3 stride
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Vertex {
    pub position: [f32; 3],
    pub _padding: f32,
}

/// Per-vertex shading attributes, parallel to the vertex array
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct VertexAttributes {
    pub normal: [f32; 3],
    pub _padding0: f32,
    pub texcoord: [f32; 2],
    pub _padding1: [f32; 2],
}

/// Triangle indices local to a mesh's base vertex
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct TriangleIndices {
    pub indices: [u32; 3],
    pub _padding: u32,
}

/// Placement of a stored mesh in the scene
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct MeshInstance {
    pub orientation: [f32; 4], // quaternion, xyzw
    pub position: [f32; 3],
    pub triangle_count: u32,
    pub scale: [f32; 3],
    pub material_id: u32,
    pub base_vertex: u32,  // first vertex of the mesh in the vertex array
    pub base_index: u32,   // first triangle of the mesh in the index array
    pub _padding: [u32; 2],
}

/// Axis-Aligned Bounding Box for BVH
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Aabb {
    pub min: [f32; 3],      // Minimum bounds
    pub _padding0: f32,     // Padding for alignment
    pub max: [f32; 3],      // Maximum bounds
    pub _padding1: f32,     // Padding for alignment
}

/// One BVH node per mesh instance, bounds in the instance's local space
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct BvhNode {
    pub bounds: Aabb,
    pub position: [f32; 3], // copy of the instance position
    pub mesh: u32,          // index of the mesh instance
    pub scale: [f32; 3],    // copy of the instance scale
    pub _padding: u32,
}

/// Point light with a falloff radius
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Light {
    pub color: [f32; 3],
    pub radius: f32,
    pub location: [f32; 3],
    pub _padding: f32,
}

/// Surface material: inline color or texture layer, plus specular parameters
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Material {
    pub color: [f32; 3],
    pub diffuse: u32, // texture array layer, NO_TEXTURE for the inline color
    pub fresnel_zero: f32,
    pub roughness: f32,
    pub wrap: u32,
    pub filter: u32,
}

/// How texture coordinates outside [0, 1] are resolved
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum WrapMode {
    #[default]
    Clamp = 0,
    Repeat = 1,
}

/// Texel filtering used for diffuse maps
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum FilterMode {
    Nearest = 0,
    #[default]
    Bilinear = 1,
}

/// What the tracer writes for a hit pixel
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum DisplayMode {
    #[default]
    Shaded = 0,
    Unlit = 1,
    Normals = 2,
    Texcoords = 3,
    Depth = 4,
}

/// Options that select the compiled program variant
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub display: DisplayMode,
    pub shadows: bool,
}

/// Helper for square work-group tiling
pub struct TileHelper;

impl Camera {
    /// Create a new camera looking down `direction`
    pub fn new(position: Vec3, direction: Vec3, up: Vec3, fov: f32) -> Self {
        Self {
            position: position.to_array(),
            fov,
            direction: direction.normalize_or_zero().to_array(),
            _padding0: 0.0,
            up: up.to_array(),
            _padding1: 0.0,
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y, 60.0)
    }
}

impl Vertex {
    pub fn new(position: Vec3) -> Self {
        Self {
            position: position.to_array(),
            _padding: 0.0,
        }
    }
}

impl VertexAttributes {
    pub fn new(normal: Vec3, texcoord: [f32; 2]) -> Self {
        Self {
            normal: normal.to_array(),
            _padding0: 0.0,
            texcoord,
            _padding1: [0.0; 2],
        }
    }
}

impl TriangleIndices {
    pub fn new(indices: [u32; 3]) -> Self {
        Self { indices, _padding: 0 }
    }
}

impl MeshInstance {
    /// Create an instance; the orientation is normalized
    pub fn new(
        orientation: Quat,
        position: Vec3,
        scale: Vec3,
        material_id: u32,
        triangle_count: u32,
        base_vertex: u32,
        base_index: u32,
    ) -> Self {
        let orientation = if orientation.length_squared() > 0.0 {
            orientation.normalize()
        } else {
            Quat::IDENTITY
        };
        Self {
            orientation: orientation.to_array(),
            position: position.to_array(),
            triangle_count,
            scale: scale.to_array(),
            material_id,
            base_vertex,
            base_index,
            _padding: [0; 2],
        }
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_array(self.orientation)
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.orientation = rotation.normalize().to_array();
    }
}

impl Aabb {
    /// Create a new AABB
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.to_array(),
            _padding0: 0.0,
            max: max.to_array(),
            _padding1: 0.0,
        }
    }

    /// Create an empty AABB that any point grows
    pub fn empty() -> Self {
        Self::new(Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY))
    }

    /// Smallest box containing every point, or an empty box for no points
    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        points.into_iter().fold(Self::empty(), |bounds, point| bounds.grow(point))
    }

    pub fn min_corner(&self) -> Vec3 {
        Vec3::from_array(self.min)
    }

    pub fn max_corner(&self) -> Vec3 {
        Vec3::from_array(self.max)
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.min[axis] > self.max[axis])
    }

    /// Expand to include a point
    pub fn grow(&self, point: Vec3) -> Self {
        Self::new(self.min_corner().min(point), self.max_corner().max(point))
    }
}

impl BvhNode {
    /// Create a node covering the instance at `mesh`
    pub fn new(bounds: Aabb, instance: &MeshInstance, mesh: u32) -> Self {
        Self {
            bounds,
            position: instance.position,
            mesh,
            scale: instance.scale,
            _padding: 0,
        }
    }
}

impl Light {
    pub fn new(color: Vec3, location: Vec3, radius: f32) -> Self {
        Self {
            color: color.to_array(),
            radius,
            location: location.to_array(),
            _padding: 0.0,
        }
    }
}

impl Material {
    pub const NO_TEXTURE: u32 = u32::MAX;

    /// Material with a constant diffuse color
    pub fn with_color(color: Vec3, fresnel0: f32, roughness: f32) -> Self {
        Self {
            color: color.to_array(),
            diffuse: Self::NO_TEXTURE,
            fresnel_zero: fresnel0,
            roughness,
            wrap: WrapMode::default() as u32,
            filter: FilterMode::default() as u32,
        }
    }

    /// Material sampling its diffuse color from a texture array layer
    pub fn with_texture(layer: u32, fresnel0: f32, roughness: f32, wrap: WrapMode, filter: FilterMode) -> Self {
        Self {
            color: [1.0; 3],
            diffuse: layer,
            fresnel_zero: fresnel0,
            roughness,
            wrap: wrap as u32,
            filter: filter as u32,
        }
    }

    pub fn is_textured(&self) -> bool {
        self.diffuse != Self::NO_TEXTURE
    }
}

impl WrapMode {
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => Self::Repeat,
            _ => Self::Clamp,
        }
    }
}

impl FilterMode {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => Self::Nearest,
            _ => Self::Bilinear,
        }
    }
}

impl DisplayMode {
    pub const ALL: [DisplayMode; 5] = [
        DisplayMode::Shaded,
        DisplayMode::Unlit,
        DisplayMode::Normals,
        DisplayMode::Texcoords,
        DisplayMode::Depth,
    ];

    pub const fn from_u32(value: u32) -> Self {
        match value {
            1 => Self::Unlit,
            2 => Self::Normals,
            3 => Self::Texcoords,
            4 => Self::Depth,
            _ => Self::Shaded,
        }
    }

    /// Shader define that enables this mode's code path
    pub fn define(self) -> &'static str {
        match self {
            Self::Shaded => "DISPLAY_SHADED",
            Self::Unlit => "DISPLAY_UNLIT",
            Self::Normals => "DISPLAY_NORMALS",
            Self::Texcoords => "DISPLAY_TEXCOORDS",
            Self::Depth => "DISPLAY_DEPTH",
        }
    }
}

impl RenderOptions {
    pub fn new(display: DisplayMode, shadows: bool) -> Self {
        Self { display, shadows }
    }

    /// Every display mode and shadow combination
    pub fn variants() -> impl Iterator<Item = RenderOptions> {
        DisplayMode::ALL
            .into_iter()
            .flat_map(|display| [true, false].into_iter().map(move |shadows| Self::new(display, shadows)))
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::new(DisplayMode::Shaded, true)
    }
}

impl TileHelper {
    /// Square tile side for a device group limit: floor(sqrt(max_group_size)), at least 1
    pub fn group_side(max_group_size: u32) -> u32 {
        let mut side = (max_group_size as f64).sqrt() as u32;
        while side > 0 && side.saturating_mul(side) > max_group_size {
            side -= 1;
        }
        while (side + 1).saturating_mul(side + 1) <= max_group_size {
            side += 1;
        }
        side.max(1)
    }

    /// Number of groups needed to cover the surface
    pub fn group_count(width: u32, height: u32, side: u32) -> (u32, u32) {
        let side = side.max(1);
        (width.div_ceil(side), height.div_ceil(side))
    }
}
