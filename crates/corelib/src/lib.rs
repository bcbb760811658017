//! Core types: math re-exports, errors, bounding volumes, camera, picking and
//! the interactive scene state. Renderer-agnostic.

use thiserror::Error;

pub use glam::{Mat4, UVec2, Vec2, Vec3};

pub mod bounds;
pub mod camera;
pub mod gizmo;
pub mod pick;
pub mod scene;
pub mod transform;

/// Floats per interleaved vertex: position xyz + texcoord uv.
pub const VERTEX_STRIDE: usize = 5;

#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("vertex buffer is empty")]
    EmptyVertexBuffer,
    #[error("vertex buffer length {len} is not a multiple of the {VERTEX_STRIDE}-float stride")]
    MisalignedVertexBuffer { len: usize },
}

pub type CoreResult<T> = Result<T, CoreError>;
