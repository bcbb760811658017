//! Axis-aligned bounding boxes over interleaved vertex buffers and their
//! line-list wireframes.

use crate::{CoreError, CoreResult, VERTEX_STRIDE, Vec3};

/// Corner pairs of a box's edge graph, in `corners()` numbering.
const BOX_EDGES: [(usize, usize); 12] = [
    // bottom (z = min)
    (0, 1),
    (1, 3),
    (3, 2),
    (2, 0),
    // top (z = max)
    (4, 5),
    (5, 7),
    (7, 6),
    (6, 4),
    // vertical
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// Number of line-list records in [`BoundingBox::wireframe`].
pub const WIREFRAME_VERTEX_COUNT: usize = BOX_EDGES.len() * 2;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Fold min/max over the positions of a `[x y z u v]*` buffer, starting
    /// from the first vertex. Texcoords are skipped.
    pub fn from_interleaved(vertices: &[f32]) -> CoreResult<Self> {
        if vertices.is_empty() {
            return Err(CoreError::EmptyVertexBuffer);
        }
        if vertices.len() % VERTEX_STRIDE != 0 {
            return Err(CoreError::MisalignedVertexBuffer {
                len: vertices.len(),
            });
        }
        let positions = vertices
            .chunks_exact(VERTEX_STRIDE)
            .map(|v| Vec3::new(v[0], v[1], v[2]));
        Self::from_points(positions).ok_or(CoreError::EmptyVertexBuffer)
    }

    /// Bounding box of a point set; `None` when the set is empty.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::new(first, first), |b, p| {
            Self::new(b.min.min(p), b.max.max(p))
        }))
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// The 8 corners; corner `i` takes x from `max` iff bit 0 is set, y iff
    /// bit 1, z iff bit 2.
    pub fn corners(&self) -> [Vec3; 8] {
        std::array::from_fn(|i| {
            Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            )
        })
    }

    /// 12 segments as 24 line-list records in the shared vertex layout
    /// (texcoord fixed at 0,0).
    pub fn wireframe(&self) -> Vec<[f32; VERTEX_STRIDE]> {
        let corners = self.corners();
        BOX_EDGES
            .iter()
            .flat_map(|&(a, b)| [corners[a], corners[b]])
            .map(|p| [p.x, p.y, p.z, 0.0, 0.0])
            .collect()
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }
}
