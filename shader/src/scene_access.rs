use glam::Vec3;
use meshtracer_shared::{BvhNode, Light, Material, MeshInstance, TriangleIndices, Vertex, VertexAttributes};

/// Read-only view of the diffuse texture array: `layers` RGBA8 images of `size` x `size`
#[derive(Clone, Copy, Debug)]
pub struct TextureLayers<'a> {
    pub data: &'a [u8],
    pub size: u32,
    pub layers: u32,
}

impl<'a> TextureLayers<'a> {
    pub fn empty() -> Self {
        Self {
            data: &[],
            size: 0,
            layers: 0,
        }
    }

    /// Texel at integer coordinates in a layer, channels in [0, 1]
    pub fn texel(&self, layer: u32, x: u32, y: u32) -> Vec3 {
        let size = self.size as usize;
        let offset = ((layer as usize * size + y as usize) * size + x as usize) * 4;
        match self.data.get(offset..offset + 3) {
            Some(rgb) => Vec3::new(rgb[0] as f32, rgb[1] as f32, rgb[2] as f32) / 255.0,
            None => Vec3::ZERO,
        }
    }
}

/// Provides access to the scene buffers bound to one dispatch
#[derive(Clone, Copy, Debug)]
pub struct SceneAccessor<'a> {
    pub lights: &'a [Light],
    pub vertices: &'a [Vertex],
    pub attributes: &'a [VertexAttributes],
    pub indices: &'a [TriangleIndices],
    pub meshes: &'a [MeshInstance],
    pub bvh: &'a [BvhNode],
    pub materials: &'a [Material],
    pub textures: TextureLayers<'a>,
}

impl<'a> SceneAccessor<'a> {
    /// Get number of lights in the scene
    pub fn light_count(&self) -> u32 {
        self.lights.len() as u32
    }

    /// Get number of BVH nodes
    pub fn bvh_node_count(&self) -> u32 {
        self.bvh.len() as u32
    }

    pub fn light(&self, index: u32) -> Option<&'a Light> {
        self.lights.get(index as usize)
    }

    pub fn bvh_node(&self, index: u32) -> Option<&'a BvhNode> {
        self.bvh.get(index as usize)
    }

    pub fn mesh(&self, index: u32) -> Option<&'a MeshInstance> {
        self.meshes.get(index as usize)
    }

    /// Material for an id; unknown ids fall back to the default material
    pub fn material(&self, id: u32) -> Material {
        self.materials
            .get(id as usize)
            .copied()
            .unwrap_or_else(|| Material::with_color(Vec3::splat(0.5), 0.04, 1.0))
    }

    /// Get vertex position
    pub fn vertex_position(&self, index: u32) -> Option<Vec3> {
        self.vertices.get(index as usize).map(|vertex| Vec3::from_array(vertex.position))
    }

    pub fn vertex_attributes(&self, index: u32) -> Option<&'a VertexAttributes> {
        self.attributes.get(index as usize)
    }

    /// Absolute vertex indices of a triangle of an instance
    pub fn triangle_vertices(&self, instance: &MeshInstance, triangle: u32) -> Option<[u32; 3]> {
        let indices = self.indices.get((instance.base_index + triangle) as usize)?;
        Some(indices.indices.map(|index| index + instance.base_vertex))
    }
}
