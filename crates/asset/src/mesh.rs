//! CPU-side mesh representation used by loaders.

use bytemuck::{Pod, Zeroable};
use corelib::bounds::BoundingBox;
use corelib::{CoreResult, VERTEX_STRIDE};

/// Interleaved vertex: position + texcoord, five tightly packed floats.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

const _: () = assert!(std::mem::size_of::<MeshVertex>() == VERTEX_STRIDE * 4);

impl MeshVertex {
    pub fn new(position: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, uv }
    }
}

/// Indexed triangle mesh with tightly-packed vertices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(vertices: Vec<MeshVertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Returns `true` if both vertex and index buffers are non-empty.
    pub fn is_valid(&self) -> bool {
        !self.vertices.is_empty() && !self.indices.is_empty()
    }

    /// Flat `[x y z u v]*` view of the vertex buffer.
    pub fn interleaved(&self) -> &[f32] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn bounding_box(&self) -> CoreResult<BoundingBox> {
        BoundingBox::from_interleaved(self.interleaved())
    }
}
