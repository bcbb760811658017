use std::fs;

use asset::mtl::MaterialLibrary;
use asset::obj::{ObjLoadOptions, load_obj_from_path};
use asset::texture::TextureData;
use corelib::bounds::BoundingBox;

const CUBE_OBJ: &str = "\
# unit cube
mtllib cube.mtl
o Cube
v -1 -1 -1
v  1 -1 -1
v  1  1 -1
v -1  1 -1
v -1 -1  1
v  1 -1  1
v  1  1  1
v -1  1  1
vt 0 0
vt 1 0
vt 1 1
vt 0 1
usemtl Orange
f 1/1 2/2 3/3 4/4
f 5/1 6/2 7/3 8/4
f 1/1 2/2 6/3 5/4
f 2/1 3/2 7/3 6/4
f 3/1 4/2 8/3 7/4
f 4/1 1/2 5/3 8/4
";

const CUBE_MTL: &str = "\
newmtl Orange
Ka 0.1 0.1 0.1
Kd 1.0 0.5 0.0
map_Kd cube_skin.png
";

#[test]
fn mesh_and_library_load_from_a_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("cube.obj"), CUBE_OBJ).unwrap();
    fs::write(dir.path().join("cube.mtl"), CUBE_MTL).unwrap();
    image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]))
        .save(dir.path().join("cube_skin.png"))
        .unwrap();

    let mut materials = MaterialLibrary::new();
    let mesh = load_obj_from_path(
        dir.path().join("cube.obj"),
        &mut materials,
        ObjLoadOptions {
            compute_center: true,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(materials.len(), 1);
    assert_eq!(mesh.color, [1.0, 0.5, 0.0]);
    assert_eq!(mesh.stats.positions, 8);
    assert_eq!(mesh.stats.texcoords, 4);
    assert_eq!(mesh.data.triangle_count(), 12);

    let n = mesh.data.vertices.len() as u32;
    assert!(mesh.data.indices.iter().all(|&i| i < n));

    let bounds = mesh.data.bounding_box().unwrap();
    assert_eq!(bounds, BoundingBox::new(corelib::Vec3::splat(-1.0), corelib::Vec3::ONE));
    assert_eq!(mesh.center_offset, Some(corelib::Vec3::ZERO));
    assert_eq!(bounds.wireframe().len(), 24);

    let texture_path = mesh.diffuse_texture.expect("map_Kd path");
    assert_eq!(texture_path, dir.path().join("cube_skin.png"));
    let texture = TextureData::load(&texture_path).unwrap();
    assert!(texture.is_valid());
    assert_eq!(&texture.data[..4], &[10, 20, 30, 255]);
}

#[test]
fn session_library_accumulates_across_meshes() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.mtl"), "newmtl A\nKd 1 0 0\n").unwrap();
    fs::write(dir.path().join("b.mtl"), "newmtl B\nKd 0 1 0\n").unwrap();
    fs::write(dir.path().join("a.obj"), "mtllib a.mtl\nusemtl A\n").unwrap();
    fs::write(dir.path().join("b.obj"), "mtllib b.mtl\nusemtl A\n").unwrap();

    let mut materials = MaterialLibrary::new();
    load_obj_from_path(dir.path().join("a.obj"), &mut materials, ObjLoadOptions::default())
        .unwrap();
    // b.obj only ships B but can still use A from the earlier load.
    let b = load_obj_from_path(dir.path().join("b.obj"), &mut materials, ObjLoadOptions::default())
        .unwrap();
    assert_eq!(materials.len(), 2);
    assert_eq!(b.color, [1.0, 0.0, 0.0]);
    assert!(!b.data.is_valid());
}

#[test]
fn non_utf8_bytes_in_comments_do_not_abort_loading() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("m.mtl"), b"# mat\xe9riau\nnewmtl Red\nKd 1 0 0\n").unwrap();
    fs::write(
        dir.path().join("m.obj"),
        b"# Cr\xe9\xe9 par Blender\nmtllib m.mtl\nusemtl Red\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n",
    )
    .unwrap();

    let mut materials = MaterialLibrary::new();
    let mesh = load_obj_from_path(dir.path().join("m.obj"), &mut materials, ObjLoadOptions::default())
        .unwrap();
    assert_eq!(mesh.data.triangle_count(), 1);
    assert_eq!(mesh.data.vertices.len(), 3);
    assert_eq!(mesh.color, [1.0, 0.0, 0.0]);

    let library = asset::mtl::load_mtl_from_path(dir.path().join("m.mtl")).unwrap();
    assert_eq!(library.get("Red").map(|m| m.diffuse), Some([1.0, 0.0, 0.0]));
}
