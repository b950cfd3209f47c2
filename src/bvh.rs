use log::debug;
use meshtracer_shared::{Aabb, BvhNode, MeshInstance};

/// Builds the instance-level BVH: one node per mesh instance, in instance order
pub struct BvhBuilder;

impl BvhBuilder {
    /// Build nodes from instances and the local bounds of the mesh each one places.
    /// `local_bounds[i]` belongs to `instances[i]`.
    pub fn build(instances: &[MeshInstance], local_bounds: &[Aabb]) -> Vec<BvhNode> {
        debug_assert_eq!(instances.len(), local_bounds.len());

        let nodes: Vec<BvhNode> = instances
            .iter()
            .zip(local_bounds)
            .enumerate()
            .map(|(index, (instance, bounds))| BvhNode::new(*bounds, instance, index as u32))
            .collect();

        debug!("Built BVH with {} nodes", nodes.len());
        nodes
    }

    /// Copy instance position and scale into their nodes after animation.
    /// Bounds and node order never change.
    pub fn refit(instances: &[MeshInstance], nodes: &mut [BvhNode]) {
        for node in nodes.iter_mut() {
            if let Some(instance) = instances.get(node.mesh as usize) {
                node.position = instance.position;
                node.scale = instance.scale;
            }
        }
    }
}
