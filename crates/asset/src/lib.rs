//! Asset loading/parsers (meshes, materials, textures).
//! OBJ subset -> deduplicated interleaved vertex buffer + triangle indices,
//! MTL subset -> named material records, image files -> RGBA8 textures.

pub mod mesh;
pub mod mtl;
pub mod obj;
pub mod texture;
