use std::collections::HashMap;

use glam::{Quat, Vec3};
use image::RgbaImage;
use log::{debug, info};
use meshtracer_shader::SceneAccessor;
use meshtracer_shared::{
    BvhNode, Camera, FilterMode, FrameUniforms, Light, Material, MeshInstance, WrapMode,
};
use serde::{Deserialize, Serialize};

use crate::bvh::BvhBuilder;
use crate::error::TracerError;
use crate::geometry::{GeometryStore, MeshData, MeshHandle};
use crate::texture::TextureArray;

/// Camera placement in a scene description
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraDesc {
    pub position: [f32; 3],
    pub direction: [f32; 3],
    pub up: [f32; 3],
    pub fov: f32, // degrees, vertical
}

/// Time-driven motion applied by `Scene::update`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Animation {
    /// Sinusoidal offset from the base position
    Oscillate {
        amplitude: [f32; 3],
        frequency: f32, // Hz
        #[serde(default)]
        phase: f32,
    },
    /// Rotation about an axis, on top of the base orientation
    Spin { axis: [f32; 3], speed: f32 }, // radians per second
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightDesc {
    pub color: [f32; 3],
    pub location: [f32; 3],
    pub radius: f32,
    pub animation: Option<Animation>,
}

/// Inline color or a texture reference resolved through the `AssetSource`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiffuseDesc {
    Color([f32; 3]),
    Texture(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialDesc {
    pub diffuse: DiffuseDesc,
    pub fresnel0: f32,
    pub roughness: f32,
    pub wrap: WrapMode,
    pub filter: FilterMode,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshDesc {
    pub mesh: String,
    pub material: u32,
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default = "unit_scale")]
    pub scale: [f32; 3],
    /// Quaternion, xyzw
    #[serde(default = "identity_orientation")]
    pub orientation: [f32; 4],
    #[serde(default)]
    pub animation: Option<Animation>,
}

/// Declarative scene document, already parsed into plain data
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDescription {
    pub camera: CameraDesc,
    pub lights: Vec<LightDesc>,
    pub materials: Vec<MaterialDesc>,
    pub meshes: Vec<MeshDesc>,
}

/// Resolves mesh and texture references of a scene description
pub trait AssetSource {
    fn mesh(&mut self, name: &str) -> Result<MeshData, TracerError>;
    fn texture(&mut self, name: &str) -> Result<RgbaImage, TracerError>;
}

/// Asset source over meshes and images registered up front
#[derive(Clone, Debug, Default)]
pub struct InMemoryAssets {
    meshes: HashMap<String, MeshData>,
    textures: HashMap<String, RgbaImage>,
}

/// Device buffers whose content changed since the last upload
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DirtyFlags {
    pub lights: bool,
    /// Mesh instances and their BVH nodes
    pub instances: bool,
}

/// Element counts of every scene buffer; fixed once a scene is loaded
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SceneShape {
    pub lights: usize,
    pub instances: usize,
    pub vertices: usize,
    pub triangles: usize,
    pub materials: usize,
    pub texture_layers: u32,
}

#[derive(Clone, Debug)]
struct Animated {
    index: usize,
    base_position: Vec3,
    base_rotation: Quat,
    animation: Animation,
}

/// Geometry, materials, lights and instances of one loaded scene
pub struct Scene {
    pub camera: Camera,
    geometry: GeometryStore,
    textures: TextureArray,
    materials: Vec<Material>,
    lights: Vec<Light>,
    instances: Vec<MeshInstance>,
    bvh: Vec<BvhNode>,
    animated_lights: Vec<Animated>,
    animated_instances: Vec<Animated>,
    dirty: DirtyFlags,
}

fn unit_scale() -> [f32; 3] {
    [1.0; 3]
}

fn identity_orientation() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

impl Default for CameraDesc {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            direction: [0.0, 0.0, -1.0],
            up: [0.0, 1.0, 0.0],
            fov: 60.0,
        }
    }
}

impl From<&CameraDesc> for Camera {
    fn from(desc: &CameraDesc) -> Self {
        Camera::new(
            Vec3::from_array(desc.position),
            Vec3::from_array(desc.direction),
            Vec3::from_array(desc.up),
            desc.fov,
        )
    }
}

impl Default for LightDesc {
    fn default() -> Self {
        Self {
            color: [1.0; 3],
            location: [0.0; 3],
            radius: 0.0,
            animation: None,
        }
    }
}

impl Default for MaterialDesc {
    fn default() -> Self {
        Self {
            diffuse: DiffuseDesc::Color([0.8; 3]),
            fresnel0: 0.04,
            roughness: 0.5,
            wrap: WrapMode::default(),
            filter: FilterMode::default(),
        }
    }
}

impl Animation {
    /// Offset from the base position at `time` seconds
    pub fn offset(&self, time: f32) -> Vec3 {
        match self {
            Self::Oscillate {
                amplitude,
                frequency,
                phase,
            } => Vec3::from_array(*amplitude) * (std::f32::consts::TAU * frequency * time + phase).sin(),
            Self::Spin { .. } => Vec3::ZERO,
        }
    }

    /// Rotation applied after the base orientation at `time` seconds
    pub fn rotation(&self, time: f32) -> Quat {
        match self {
            Self::Spin { axis, speed } => {
                let axis = Vec3::from_array(*axis).normalize_or_zero();
                if axis == Vec3::ZERO {
                    Quat::IDENTITY
                } else {
                    Quat::from_axis_angle(axis, speed * time)
                }
            }
            Self::Oscillate { .. } => Quat::IDENTITY,
        }
    }
}

impl InMemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mesh(mut self, name: impl Into<String>, mesh: MeshData) -> Self {
        self.meshes.insert(name.into(), mesh);
        self
    }

    pub fn with_texture(mut self, name: impl Into<String>, image: RgbaImage) -> Self {
        self.textures.insert(name.into(), image);
        self
    }
}

impl AssetSource for InMemoryAssets {
    fn mesh(&mut self, name: &str) -> Result<MeshData, TracerError> {
        self.meshes
            .get(name)
            .cloned()
            .ok_or_else(|| TracerError::MissingAsset(name.to_string()))
    }

    fn texture(&mut self, name: &str) -> Result<RgbaImage, TracerError> {
        self.textures
            .get(name)
            .cloned()
            .ok_or_else(|| TracerError::MissingAsset(name.to_string()))
    }
}

impl DirtyFlags {
    pub fn any(&self) -> bool {
        self.lights || self.instances
    }
}

impl Scene {
    /// Build a scene from its description. Each referenced mesh and texture
    /// is resolved once and shared by every instance or material using it.
    pub fn load(desc: &SceneDescription, assets: &mut impl AssetSource) -> Result<Self, TracerError> {
        let mut textures = TextureArray::new();
        let mut texture_layers: HashMap<&str, u32> = HashMap::new();
        let mut materials = Vec::with_capacity(desc.materials.len());
        for material in &desc.materials {
            let material = match &material.diffuse {
                DiffuseDesc::Color(color) => {
                    Material::with_color(Vec3::from_array(*color), material.fresnel0, material.roughness)
                }
                DiffuseDesc::Texture(name) => {
                    let layer = match texture_layers.get(name.as_str()) {
                        Some(layer) => *layer,
                        None => {
                            let layer = textures.push_image(name, &assets.texture(name)?)?;
                            texture_layers.insert(name, layer);
                            layer
                        }
                    };
                    Material::with_texture(layer, material.fresnel0, material.roughness, material.wrap, material.filter)
                }
            };
            materials.push(material);
        }

        let mut lights = Vec::with_capacity(desc.lights.len());
        let mut animated_lights = Vec::new();
        for (index, light) in desc.lights.iter().enumerate() {
            let location = Vec3::from_array(light.location);
            lights.push(Light::new(Vec3::from_array(light.color), location, light.radius));
            match &light.animation {
                Some(Animation::Spin { .. }) => {
                    return Err(TracerError::InvalidScene(format!("light {index} cannot spin")));
                }
                Some(animation) => animated_lights.push(Animated {
                    index,
                    base_position: location,
                    base_rotation: Quat::IDENTITY,
                    animation: animation.clone(),
                }),
                None => {}
            }
        }

        let mut geometry = GeometryStore::new();
        let mut mesh_handles: HashMap<&str, MeshHandle> = HashMap::new();
        let mut instances = Vec::with_capacity(desc.meshes.len());
        let mut local_bounds = Vec::with_capacity(desc.meshes.len());
        let mut animated_instances = Vec::new();
        for (index, mesh) in desc.meshes.iter().enumerate() {
            if mesh.material as usize >= materials.len() {
                return Err(TracerError::InvalidScene(format!(
                    "mesh instance {index} uses material {} but only {} are defined",
                    mesh.material,
                    materials.len()
                )));
            }
            let handle = match mesh_handles.get(mesh.mesh.as_str()) {
                Some(handle) => *handle,
                None => {
                    let handle = geometry.add_mesh(&assets.mesh(&mesh.mesh)?);
                    mesh_handles.insert(&mesh.mesh, handle);
                    handle
                }
            };
            let range = geometry
                .mesh(handle)
                .copied()
                .ok_or_else(|| TracerError::MissingAsset(mesh.mesh.clone()))?;

            let position = Vec3::from_array(mesh.position);
            let instance = MeshInstance::new(
                Quat::from_array(mesh.orientation),
                position,
                Vec3::from_array(mesh.scale),
                mesh.material,
                range.triangle_count,
                range.base_vertex,
                range.base_index,
            );
            if let Some(animation) = &mesh.animation {
                animated_instances.push(Animated {
                    index,
                    base_position: position,
                    base_rotation: instance.rotation(),
                    animation: animation.clone(),
                });
            }
            instances.push(instance);
            local_bounds.push(range.bounds);
        }

        let bvh = BvhBuilder::build(&instances, &local_bounds);

        info!(
            "Loaded scene: {} meshes ({} triangles), {} instances, {} materials, {} texture layers, {} lights",
            geometry.mesh_count(),
            geometry.triangle_count(),
            instances.len(),
            materials.len(),
            textures.layer_count(),
            lights.len()
        );

        Ok(Self {
            camera: Camera::from(&desc.camera),
            geometry,
            textures,
            materials,
            lights,
            instances,
            bvh,
            animated_lights,
            animated_instances,
            dirty: DirtyFlags::default(),
        })
    }

    /// Advance animated lights and instances to `time` seconds.
    /// Only the buffers touched by an animation are marked dirty.
    pub fn update(&mut self, time: f32) {
        for animated in &self.animated_lights {
            if let Some(light) = self.lights.get_mut(animated.index) {
                light.location = (animated.base_position + animated.animation.offset(time)).to_array();
                self.dirty.lights = true;
            }
        }

        for animated in &self.animated_instances {
            if let Some(instance) = self.instances.get_mut(animated.index) {
                instance.position = (animated.base_position + animated.animation.offset(time)).to_array();
                instance.set_rotation(animated.base_rotation * animated.animation.rotation(time));
                self.dirty.instances = true;
            }
        }

        if self.dirty.instances {
            BvhBuilder::refit(&self.instances, &mut self.bvh);
        }
        if self.dirty.any() {
            debug!("Scene update at {time:.3}s: {:?}", self.dirty);
        }
    }

    pub fn shape(&self) -> SceneShape {
        SceneShape {
            lights: self.lights.len(),
            instances: self.instances.len(),
            vertices: self.geometry.vertices().len(),
            triangles: self.geometry.triangle_count(),
            materials: self.materials.len(),
            texture_layers: self.textures.layer_count(),
        }
    }

    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = DirtyFlags::default();
    }

    /// Uniform block for a dispatch over a `width` x `height` surface
    pub fn uniforms(&self, width: u32, height: u32) -> FrameUniforms {
        FrameUniforms {
            camera: self.camera,
            resolution: [width, height],
            num_lights: self.lights.len() as u32,
            num_meshes: self.instances.len() as u32,
            num_bvh_nodes: self.bvh.len() as u32,
            num_materials: self.materials.len() as u32,
            _padding: [0; 2],
        }
    }

    /// Borrow every scene buffer the way the kernel reads them
    pub fn accessor(&self) -> SceneAccessor<'_> {
        SceneAccessor {
            lights: &self.lights,
            vertices: self.geometry.vertices(),
            attributes: self.geometry.attributes(),
            indices: self.geometry.indices(),
            meshes: &self.instances,
            bvh: &self.bvh,
            materials: &self.materials,
            textures: self.textures.layers(),
        }
    }

    pub fn geometry(&self) -> &GeometryStore {
        &self.geometry
    }

    pub fn textures(&self) -> &TextureArray {
        &self.textures
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn instances(&self) -> &[MeshInstance] {
        &self.instances
    }

    pub fn bvh(&self) -> &[BvhNode] {
        &self.bvh
    }
}
