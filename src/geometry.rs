use glam::{Vec2, Vec3};
use log::debug;
use meshtracer_shared::{Aabb, TriangleIndices, Vertex, VertexAttributes};

use crate::error::TracerError;

/// Mesh content as produced by an external mesh loader.
/// Only built through `MeshData::new` or the procedural shapes, so every
/// vertex has exactly one normal and one texcoord.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshData {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    texcoords: Vec<Vec2>,
    triangles: Vec<[u32; 3]>,
    bounds: Aabb,
}

/// Location of one mesh inside the geometry store
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MeshRange {
    pub base_vertex: u32,
    pub base_index: u32,
    pub vertex_count: u32,
    pub triangle_count: u32,
    pub bounds: Aabb,
}

/// Handle of a stored mesh
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub usize);

/// Vertex, attribute and index arrays shared by every mesh of a scene
#[derive(Clone, Debug, Default)]
pub struct GeometryStore {
    vertices: Vec<Vertex>,
    attributes: Vec<VertexAttributes>,
    indices: Vec<TriangleIndices>,
    meshes: Vec<MeshRange>,
}

impl MeshData {
    /// Validate loader output and compute its bounds.
    /// Normals and texcoords may be empty; they are then zero-filled.
    pub fn new(
        name: &str,
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        texcoords: Vec<Vec2>,
        triangles: Vec<[u32; 3]>,
    ) -> Result<Self, TracerError> {
        let invalid = |reason: String| TracerError::InvalidMesh {
            name: name.to_string(),
            reason,
        };

        let vertex_count = positions.len();
        if vertex_count == 0 || triangles.is_empty() {
            return Err(invalid("mesh has no triangles".to_string()));
        }
        if !normals.is_empty() && normals.len() != vertex_count {
            return Err(invalid(format!("{} normals for {} vertices", normals.len(), vertex_count)));
        }
        if !texcoords.is_empty() && texcoords.len() != vertex_count {
            return Err(invalid(format!("{} texcoords for {} vertices", texcoords.len(), vertex_count)));
        }
        if let Some(index) = triangles.iter().flatten().find(|&&index| index as usize >= vertex_count) {
            return Err(invalid(format!("index {index} out of range for {vertex_count} vertices")));
        }
        if positions.iter().any(|p| !p.is_finite()) {
            return Err(invalid("non-finite vertex position".to_string()));
        }

        let normals = if normals.is_empty() { vec![Vec3::ZERO; vertex_count] } else { normals };
        let texcoords = if texcoords.is_empty() { vec![Vec2::ZERO; vertex_count] } else { texcoords };
        let bounds = Aabb::from_points(positions.iter().copied());

        Ok(Self {
            positions,
            normals,
            texcoords,
            triangles,
            bounds,
        })
    }

    /// Unit quad in the XZ plane centered at the origin, facing +Y
    pub fn quad() -> Self {
        let positions = vec![
            Vec3::new(-0.5, 0.0, -0.5),
            Vec3::new(0.5, 0.0, -0.5),
            Vec3::new(0.5, 0.0, 0.5),
            Vec3::new(-0.5, 0.0, 0.5),
        ];
        let texcoords = vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)];
        let bounds = Aabb::from_points(positions.iter().copied());
        Self {
            positions,
            normals: vec![Vec3::Y; 4],
            texcoords,
            triangles: vec![[0, 2, 1], [0, 3, 2]],
            bounds,
        }
    }

    /// Unit cube centered at the origin with flat-shaded faces
    pub fn cube() -> Self {
        let faces = [
            (Vec3::X, Vec3::Y),
            (Vec3::NEG_X, Vec3::Y),
            (Vec3::Y, Vec3::Z),
            (Vec3::NEG_Y, Vec3::Z),
            (Vec3::Z, Vec3::Y),
            (Vec3::NEG_Z, Vec3::Y),
        ];
        let mut positions = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut texcoords = Vec::with_capacity(24);
        let mut triangles = Vec::with_capacity(12);
        for (normal, up) in faces {
            let right = up.cross(normal);
            let base = positions.len() as u32;
            for (u, v) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
                positions.push(normal * 0.5 + right * u + up * v);
                normals.push(normal);
                texcoords.push(Vec2::new(u + 0.5, 0.5 - v));
            }
            triangles.push([base, base + 1, base + 2]);
            triangles.push([base, base + 2, base + 3]);
        }
        let bounds = Aabb::from_points(positions.iter().copied());
        Self {
            positions,
            normals,
            texcoords,
            triangles,
            bounds,
        }
    }
}

impl GeometryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mesh and return its handle
    pub fn add_mesh(&mut self, mesh: &MeshData) -> MeshHandle {
        let range = MeshRange {
            base_vertex: self.vertices.len() as u32,
            base_index: self.indices.len() as u32,
            vertex_count: mesh.positions.len() as u32,
            triangle_count: mesh.triangles.len() as u32,
            bounds: mesh.bounds,
        };

        self.vertices.extend(mesh.positions.iter().map(|p| Vertex::new(*p)));
        self.attributes.extend(
            mesh.normals
                .iter()
                .zip(&mesh.texcoords)
                .map(|(normal, texcoord)| VertexAttributes::new(*normal, texcoord.to_array())),
        );
        self.indices.extend(mesh.triangles.iter().map(|t| TriangleIndices::new(*t)));
        self.meshes.push(range);

        debug!(
            "Stored mesh {}: {} vertices, {} triangles",
            self.meshes.len() - 1,
            range.vertex_count,
            range.triangle_count
        );
        MeshHandle(self.meshes.len() - 1)
    }

    pub fn mesh(&self, handle: MeshHandle) -> Option<&MeshRange> {
        self.meshes.get(handle.0)
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn attributes(&self) -> &[VertexAttributes] {
        &self.attributes
    }

    pub fn indices(&self) -> &[TriangleIndices] {
        &self.indices
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle(name: &str, offset: Vec3) -> MeshData {
        MeshData::new(
            name,
            vec![offset, offset + Vec3::X, offset + Vec3::Y],
            vec![],
            vec![],
            vec![[0, 1, 2]],
        )
        .expect("valid triangle")
    }

    #[test]
    fn test_bounds_follow_vertex_extents() {
        let mesh = triangle("offset", Vec3::new(5.0, 5.0, 5.0));
        assert_eq!(mesh.bounds.min, [5.0, 5.0, 5.0]);
        assert_eq!(mesh.bounds.max, [6.0, 6.0, 5.0]);
        assert_eq!(mesh.normals, vec![Vec3::ZERO; 3]);
    }

    #[test]
    fn test_invalid_meshes_are_rejected() {
        let out_of_range = MeshData::new("bad", vec![Vec3::ZERO; 3], vec![], vec![], vec![[0, 1, 3]]);
        assert!(matches!(out_of_range, Err(TracerError::InvalidMesh { .. })));

        let mismatched = MeshData::new("bad", vec![Vec3::ZERO; 3], vec![Vec3::Y], vec![], vec![[0, 1, 2]]);
        assert!(matches!(mismatched, Err(TracerError::InvalidMesh { .. })));

        let empty = MeshData::new("empty", vec![], vec![], vec![], vec![]);
        assert!(matches!(empty, Err(TracerError::InvalidMesh { .. })));
    }

    #[test]
    fn test_meshes_get_consecutive_ranges() {
        let mut store = GeometryStore::new();
        let first = store.add_mesh(&triangle("a", Vec3::ZERO));
        let second = store.add_mesh(&MeshData::quad());

        let range = store.mesh(second).expect("second mesh");
        assert_eq!(range.base_vertex, 3);
        assert_eq!(range.base_index, 1);
        assert_eq!(range.triangle_count, 2);
        assert_eq!(store.mesh(first).map(|r| r.triangle_count), Some(1));
        assert_eq!(store.vertices().len(), store.attributes().len());
        assert_eq!(store.triangle_count(), 3);
        // indices stay local to the mesh
        assert_eq!(store.indices()[1].indices, [0, 2, 1]);
    }

    #[test]
    fn test_loader_mesh_without_attributes_stays_aligned() {
        let mut store = GeometryStore::new();
        store.add_mesh(&MeshData::quad());
        let bare = MeshData::new("bare", vec![Vec3::ZERO, Vec3::X, Vec3::Z], vec![], vec![], vec![[0, 1, 2]])
            .expect("positions alone are enough");
        let handle = store.add_mesh(&bare);
        store.add_mesh(&MeshData::cube());

        assert_eq!(store.vertices().len(), store.attributes().len());
        let range = store.mesh(handle).expect("bare mesh");
        assert_eq!(range.base_vertex, 4);
        assert_eq!(store.attributes()[4].normal, [0.0; 3]);
        // the cube after it still reads its own normals
        assert_eq!(store.attributes()[7].normal, Vec3::X.to_array());
    }

    #[test]
    fn test_cube_is_closed_and_centered() {
        let cube = MeshData::cube();
        assert_eq!(cube.triangles.len(), 12);
        assert_eq!(cube.bounds.min, [-0.5; 3]);
        assert_eq!(cube.bounds.max, [0.5; 3]);
        for ([a, b, c], normal) in cube.triangles.iter().map(|t| (t.map(|i| cube.positions[i as usize]), cube.normals[t[0] as usize])) {
            assert!((b - a).cross(c - a).dot(normal) > 0.0);
        }
    }
}
