//! Startup loading: meshes, materials, textures and the data derived from
//! them. Every failure here is logged and degrades one object; none of them
//! stops the viewer.

use std::path::Path;

use asset::mesh::MeshData;
use asset::mtl::MaterialLibrary;
use asset::obj::{ObjLoadOptions, load_obj_from_path};
use asset::texture::TextureData;
use corelib::VERTEX_STRIDE;
use corelib::bounds::BoundingBox;
use corelib::scene::ObjectId;

use crate::ViewerConfig;

/// Everything the viewer needs for one object after loading.
#[derive(Debug)]
pub struct LoadedObject {
    pub id: ObjectId,
    pub mesh: MeshData,
    pub color: [f32; 3],
    pub texture: Option<TextureData>,
    pub bounds: Option<BoundingBox>,
    pub wireframe: Vec<[f32; VERTEX_STRIDE]>,
}

/// Load both objects through one session-wide material library.
/// A missing object is returned as `None`.
pub fn load_scene_objects(config: &ViewerConfig) -> [Option<LoadedObject>; 2] {
    let mut materials = MaterialLibrary::new();

    let cube = load_object(ObjectId::Cube, &config.cube_path, None, &mut materials);
    let piggy = load_object(
        ObjectId::PiggyBank,
        &config.piggy_path,
        config.piggy_texture.as_deref(),
        &mut materials,
    );

    log::info!("Session material library: {} materials", materials.len());
    [cube, piggy]
}

/// Load one mesh. `texture_override` is tried first, then the active
/// material's `map_Kd`.
pub fn load_object(
    id: ObjectId,
    path: &Path,
    texture_override: Option<&Path>,
    materials: &mut MaterialLibrary,
) -> Option<LoadedObject> {
    let mesh = match load_obj_from_path(path, materials, ObjLoadOptions::default()) {
        Ok(mesh) => mesh,
        Err(e) => {
            log::error!("{:?}: {:#}", id, e);
            return None;
        }
    };

    let bounds = match mesh.data.bounding_box() {
        Ok(b) => Some(b),
        Err(e) => {
            log::warn!("{:?}: no bounding box ({}); object will not be pickable", id, e);
            None
        }
    };
    let wireframe = bounds.map(|b| b.wireframe()).unwrap_or_default();

    let texture = load_texture(id, texture_override)
        .or_else(|| load_texture(id, mesh.diffuse_texture.as_deref()));
    if texture.is_none() && (texture_override.is_some() || mesh.diffuse_texture.is_some()) {
        log::warn!("{:?}: no usable texture; using flat color", id);
    }

    log::info!(
        "{:?}: {} vertices, {} triangles, color {:?}, textured={}",
        id,
        mesh.data.vertices.len(),
        mesh.data.triangle_count(),
        mesh.color,
        texture.is_some()
    );

    Some(LoadedObject {
        id,
        mesh: mesh.data,
        color: mesh.color,
        texture,
        bounds,
        wireframe,
    })
}

fn load_texture(id: ObjectId, path: Option<&Path>) -> Option<TextureData> {
    match TextureData::load(path?) {
        Ok(t) => Some(t),
        Err(e) => {
            log::warn!("{:?}: {:#}", id, e);
            None
        }
    }
}
