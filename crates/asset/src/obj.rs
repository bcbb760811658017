//! OBJ subset parser: `v`, `vt`, `f`, `mtllib`, `usemtl`.
//!
//! The source is buffered once and walked twice. The first pass collects
//! positions/texcoords and resolves materials; the second builds faces, so
//! faces may reference vertices declared further down the file.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use corelib::{Vec3, bounds::BoundingBox};

use crate::mesh::{MeshData, MeshVertex};
use crate::mtl::{self, Material, MaterialLibrary};

#[derive(Clone, Debug, Default)]
pub struct ObjLoadOptions {
    /// Also return the midpoint of the raw position bounds.
    pub compute_center: bool,
    /// Directory that relative `mtllib`/`map_Kd` paths resolve against.
    /// Defaults to the OBJ file's directory when loading from a path.
    pub base_dir: Option<PathBuf>,
}

/// Counters gathered while parsing, for logging and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObjStats {
    pub positions: usize,
    pub texcoords: usize,
    pub faces: usize,
    pub rejected_faces: usize,
}

/// Parsed mesh plus the appearance selected by its last resolvable `usemtl`.
#[derive(Clone, Debug)]
pub struct ObjMesh {
    pub data: MeshData,
    /// Diffuse color of the active material, or the library default.
    pub color: [f32; 3],
    /// Diffuse texture of the active material, resolved against `base_dir`.
    pub diffuse_texture: Option<PathBuf>,
    pub center_offset: Option<Vec3>,
    pub stats: ObjStats,
}

/// Deduplication key: zero-based position index plus optional texcoord
/// index (`None` when the corner has no usable texcoord).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct VertexKey {
    pub position: u32,
    pub texcoord: Option<u32>,
}

/// Load an OBJ mesh from a file path, merging any referenced material
/// libraries into `materials`.
pub fn load_obj_from_path(
    path: impl AsRef<Path>,
    materials: &mut MaterialLibrary,
    options: ObjLoadOptions,
) -> Result<ObjMesh> {
    let path = path.as_ref();
    let bytes =
        fs::read(path).with_context(|| format!("Failed to open OBJ file: {}", path.display()))?;
    // Not guaranteed UTF-8; stray bytes in comments and names are replaced.
    let contents = String::from_utf8_lossy(&bytes);
    log::info!("Loading OBJ file: {}", path.display());

    let base_dir = options
        .base_dir
        .clone()
        .or_else(|| path.parent().map(Path::to_path_buf));
    parse_obj(&contents, materials, options.compute_center, base_dir.as_deref())
}

/// Parse OBJ text held in memory.
pub fn load_obj_from_str(
    contents: &str,
    materials: &mut MaterialLibrary,
    options: ObjLoadOptions,
) -> Result<ObjMesh> {
    parse_obj(
        contents,
        materials,
        options.compute_center,
        options.base_dir.as_deref(),
    )
}

fn parse_obj(
    contents: &str,
    materials: &mut MaterialLibrary,
    compute_center: bool,
    base_dir: Option<&Path>,
) -> Result<ObjMesh> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut texcoords: Vec<[f32; 2]> = Vec::new();
    let mut color = Material::DEFAULT_DIFFUSE;
    let mut diffuse_texture: Option<PathBuf> = None;

    // Pass 1: vertex data and materials.
    for (line_no, line) in contents.lines().enumerate() {
        let trimmed = line.trim_start();
        let Some(tag) = trimmed.split_whitespace().next() else {
            continue;
        };
        let rest = trimmed[tag.len()..].trim();

        match tag {
            "v" => match parse_floats::<3>(rest) {
                Some(p) => positions.push(p),
                None => log::warn!("Skipping malformed vertex on line {}: '{}'", line_no + 1, line),
            },
            "vt" => match parse_floats::<2>(rest) {
                Some(t) => texcoords.push(t),
                None => log::warn!(
                    "Skipping malformed texcoord on line {}: '{}'",
                    line_no + 1,
                    line
                ),
            },
            "mtllib" => {
                let mtl_path = resolve_relative(base_dir, rest);
                log::info!("Found MTL reference: {}", mtl_path.display());
                match mtl::load_mtl_from_path(&mtl_path) {
                    Ok(library) => materials.merge(library),
                    Err(err) => log::warn!("{:#}; continuing without it", err),
                }
            }
            "usemtl" => match materials.get(rest) {
                Some(material) if !rest.is_empty() => {
                    color = material.diffuse;
                    diffuse_texture = material
                        .diffuse_texture
                        .as_deref()
                        .map(|t| resolve_relative(base_dir, t));
                    log::info!(
                        "Using material {}: color ({:.3}, {:.3}, {:.3})",
                        rest,
                        color[0],
                        color[1],
                        color[2]
                    );
                }
                _ => log::warn!("usemtl '{}' not found; keeping current color", rest),
            },
            _ => {}
        }
    }

    log::info!(
        "Loaded {} vertices, {} texture coordinates",
        positions.len(),
        texcoords.len()
    );

    // Pass 2: faces.
    let mut unique: HashMap<VertexKey, u32> = HashMap::new();
    let mut vertices: Vec<MeshVertex> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();
    let mut stats = ObjStats {
        positions: positions.len(),
        texcoords: texcoords.len(),
        ..Default::default()
    };

    for (line_no, line) in contents.lines().enumerate() {
        let trimmed = line.trim_start();
        let mut parts = trimmed.split_whitespace();
        if parts.next() != Some("f") {
            continue;
        }

        let mut face: Vec<u32> = Vec::new();
        let mut rejected = false;
        for token in parts {
            let (pos, tex) = split_corner(token);

            let Some(pi) = resolve_index(pos, positions.len()) else {
                log::warn!(
                    "Invalid vertex index '{}' (max: {}) in face line {}: '{}'",
                    pos,
                    positions.len(),
                    line_no + 1,
                    line
                );
                rejected = true;
                break;
            };

            let ti = tex.and_then(|t| {
                let resolved = resolve_index(t, texcoords.len());
                if resolved.is_none() {
                    log::warn!(
                        "Invalid texture coordinate index '{}' (max: {}) in face line {}",
                        t,
                        texcoords.len(),
                        line_no + 1
                    );
                }
                resolved
            });

            let key = VertexKey {
                position: pi,
                texcoord: ti,
            };
            let index = match unique.get(&key) {
                Some(&idx) => idx,
                None => {
                    let position = positions[pi as usize];
                    let uv = ti.map_or([0.0, 0.0], |i| texcoords[i as usize]);
                    let idx = u32::try_from(vertices.len())
                        .map_err(|_| anyhow!("Too many vertices in OBJ (>{})", u32::MAX))?;
                    vertices.push(MeshVertex::new(position, uv));
                    unique.insert(key, idx);
                    idx
                }
            };
            face.push(index);
        }

        if rejected {
            stats.rejected_faces += 1;
            continue;
        }
        if triangulate_fan(&face, &mut indices) {
            stats.faces += 1;
        }
    }

    let center_offset = if compute_center {
        BoundingBox::from_points(positions.iter().copied().map(Vec3::from)).map(|b| {
            log::info!("Bounding box: min {:?}, max {:?}", b.min, b.max);
            b.center()
        })
    } else {
        None
    };

    let data = MeshData::new(vertices, indices);
    log::info!(
        "OBJ loaded: {} unique vertices (pos+tex), {} triangles, {} indices, {} faces rejected",
        data.vertices.len(),
        data.triangle_count(),
        data.indices.len(),
        stats.rejected_faces
    );

    Ok(ObjMesh {
        data,
        color,
        diffuse_texture,
        center_offset,
        stats,
    })
}

/// Fan-triangulate a polygon: (0, i, i+1) for every i in 1..n-1.
/// Polygons with fewer than 3 corners emit nothing and return `false`.
pub fn triangulate_fan(face: &[u32], out: &mut Vec<u32>) -> bool {
    if face.len() < 3 {
        return false;
    }
    for i in 1..face.len() - 1 {
        out.extend_from_slice(&[face[0], face[i], face[i + 1]]);
    }
    true
}

/// Split `p`, `p/t`, `p/t/n` or `p//n` into position and texcoord parts.
/// An empty texcoord part counts as absent; the normal is discarded.
fn split_corner(token: &str) -> (&str, Option<&str>) {
    match token.split_once('/') {
        None => (token, None),
        Some((pos, rest)) => {
            let tex = rest.split_once('/').map_or(rest, |(t, _)| t);
            (pos, (!tex.is_empty()).then_some(tex))
        }
    }
}

/// 1-based index token -> 0-based index, if it lies in `[1, len]`.
fn resolve_index(token: &str, len: usize) -> Option<u32> {
    let raw = token.parse::<i64>().ok()?;
    if raw < 1 || raw as u64 > len as u64 {
        return None;
    }
    u32::try_from(raw - 1).ok()
}

fn parse_floats<const N: usize>(rest: &str) -> Option<[f32; N]> {
    let mut parts = rest.split_whitespace();
    let mut out = [0.0f32; N];
    for slot in &mut out {
        *slot = parts.next()?.parse().ok()?;
    }
    Some(out)
}

fn resolve_relative(base_dir: Option<&Path>, file: &str) -> PathBuf {
    let path = Path::new(file);
    match base_dir {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(src: &str) -> ObjMesh {
        let mut materials = MaterialLibrary::new();
        load_obj_from_str(src, &mut materials, ObjLoadOptions::default()).expect("parse")
    }

    fn assert_indices_in_range(mesh: &ObjMesh) {
        let n = mesh.data.vertices.len() as u32;
        assert!(mesh.data.indices.iter().all(|&i| i < n));
        assert_eq!(mesh.data.indices.len() % 3, 0);
    }

    const UNIT_CUBE: &str = r#"
        v -1 -1 -1
        v  1 -1 -1
        v  1  1 -1
        v -1  1 -1
        v -1 -1  1
        v  1 -1  1
        v  1  1  1
        v -1  1  1
        f 1 2 3 4
        f 5 6 7 8
        f 1 2 6 5
        f 2 3 7 6
        f 3 4 8 7
        f 4 1 5 8
    "#;

    #[test]
    fn parse_simple_triangle() {
        let src = r#"
            v 0.0 0.0 0.0
            v 1.0 0.0 0.0
            v 0.0 1.0 0.0
            vn 0.0 0.0 1.0
            vt 0.0 0.0
            vt 1.0 0.0
            vt 0.0 1.0
            f 1/1/1 2/2/1 3/3/1
        "#;
        let mesh = load(src);
        assert_eq!(mesh.data.vertices.len(), 3);
        assert_eq!(mesh.data.indices, vec![0, 1, 2]);
        assert_eq!(mesh.data.vertices[1].uv, [1.0, 0.0]);
        assert!(mesh.data.is_valid());
    }

    #[test]
    fn unit_cube_without_texcoords_shares_corners() {
        let mesh = load(UNIT_CUBE);
        assert_eq!(mesh.data.vertices.len(), 8);
        assert_eq!(mesh.data.triangle_count(), 12);
        assert_eq!(mesh.data.indices.len(), 36);
        assert!(mesh.data.vertices.iter().all(|v| v.uv == [0.0, 0.0]));
        assert_eq!(mesh.color, Material::DEFAULT_DIFFUSE);
        assert_indices_in_range(&mesh);
    }

    #[test]
    fn out_of_range_texcoord_only_drops_that_corner() {
        let src = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nvt 0.25 0.5\nvt 0.75 1\nf 1/1 2/2 3/3 4/4\n";
        let mesh = load(src);
        let v = &mesh.data.vertices;
        assert_eq!(v.len(), 4);
        assert_eq!(v[0].uv, [0.25, 0.5]);
        assert_eq!(v[1].uv, [0.75, 1.0]);
        assert_eq!(v[2].uv, [0.0, 0.0]);
        assert_eq!(v[3].uv, [0.0, 0.0]);
        assert_eq!(mesh.data.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.stats.rejected_faces, 0);
    }

    #[test]
    fn out_of_range_position_rejects_the_whole_face() {
        let src = "v 0 0 0\nv 1 0 0\nv 1 1 0\nf 1 2 9\nf 0 1 2\nf 1 2 3\n";
        let mesh = load(src);
        assert_eq!(mesh.stats.rejected_faces, 2);
        assert_eq!(mesh.stats.faces, 1);
        // Corners resolved before the bad index keep their slots.
        assert_eq!(mesh.data.vertices.len(), 3);
        assert_eq!(mesh.data.indices, vec![0, 1, 2]);
        assert_indices_in_range(&mesh);
    }

    #[test]
    fn repeated_keys_map_to_one_slot() {
        let src = "v 0 0 0\nv 1 0 0\nv 1 1 0\nvt 0 0\nvt 1 1\n\
                   f 1/1 2/1 3/1\nf 3/1 2/1 1/1\nf 1/2 2/1 3/1\n";
        let mesh = load(src);
        // (1,1) (2,1) (3,1) (1,2)
        assert_eq!(mesh.data.vertices.len(), 4);
        assert_eq!(mesh.data.indices, vec![0, 1, 2, 2, 1, 0, 3, 1, 2]);
    }

    #[test]
    fn texcoord_absent_and_present_are_distinct_keys() {
        let src = "v 0 0 0\nv 1 0 0\nv 1 1 0\nvt 0 0\nf 1 2 3\nf 1/1 2 3\n";
        let mesh = load(src);
        assert_eq!(mesh.data.vertices.len(), 4);
        assert_eq!(mesh.data.indices, vec![0, 1, 2, 3, 1, 2]);
    }

    #[test]
    fn ngon_fans_from_first_corner() {
        let src = "v 0 0 0\nv 1 0 0\nv 2 1 0\nv 1 2 0\nv 0 1 0\nv -1 1 0\nf 1 2 3 4 5 6\n";
        let mesh = load(src);
        assert_eq!(mesh.data.triangle_count(), 4);
        assert_eq!(
            mesh.data.indices,
            vec![0, 1, 2, 0, 2, 3, 0, 3, 4, 0, 4, 5]
        );
    }

    #[test]
    fn degenerate_faces_emit_nothing() {
        let mut out = Vec::new();
        assert!(!triangulate_fan(&[0, 1], &mut out));
        assert!(out.is_empty());
        let mesh = load("v 0 0 0\nv 1 0 0\nf 1 2\n");
        assert!(mesh.data.indices.is_empty());
    }

    #[test]
    fn corner_formats() {
        assert_eq!(split_corner("7"), ("7", None));
        assert_eq!(split_corner("7/3"), ("7", Some("3")));
        assert_eq!(split_corner("7/3/2"), ("7", Some("3")));
        assert_eq!(split_corner("7//2"), ("7", None));
        assert_eq!(split_corner("7/"), ("7", None));
    }

    #[test]
    fn faces_may_reference_later_vertices() {
        let src = "f 1 2 3\nv 0 0 0\nv 1 0 0\nv 0 1 0\n";
        let mesh = load(src);
        assert_eq!(mesh.data.indices, vec![0, 1, 2]);
    }

    #[test]
    fn malformed_vertex_lines_are_skipped() {
        let src = "v 0 0 0\nv 1 nope 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = load(src);
        assert_eq!(mesh.stats.positions, 3);
        assert_eq!(mesh.data.vertices[2].position, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn usemtl_resolves_color_and_texture() {
        let mut materials = mtl::load_mtl_from_str(
            "newmtl Red\nKd 1 0 0\nnewmtl Skin\nKd 1 1 1\nmap_Kd skin.png\n",
        );
        let opts = ObjLoadOptions {
            base_dir: Some(PathBuf::from("assets")),
            ..Default::default()
        };
        let mesh = load_obj_from_str("usemtl Red\n", &mut materials, opts.clone()).unwrap();
        assert_eq!(mesh.color, [1.0, 0.0, 0.0]);
        assert!(mesh.diffuse_texture.is_none());

        let mesh = load_obj_from_str("usemtl Skin\n", &mut materials, opts).unwrap();
        assert_eq!(mesh.diffuse_texture, Some(PathBuf::from("assets").join("skin.png")));
    }

    #[test]
    fn unknown_usemtl_keeps_previous_color() {
        let mut materials = mtl::load_mtl_from_str("newmtl Blue\nKd 0 0 1\n");
        let opts = ObjLoadOptions::default();
        let mesh = load_obj_from_str("usemtl Nope\n", &mut materials, opts.clone()).unwrap();
        assert_eq!(mesh.color, Material::DEFAULT_DIFFUSE);
        let mesh =
            load_obj_from_str("usemtl Blue\nusemtl Nope\n", &mut materials, opts).unwrap();
        assert_eq!(mesh.color, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn missing_mtllib_is_not_fatal() {
        let mut materials = MaterialLibrary::new();
        let src = "mtllib missing-library.mtl\nusemtl Any\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = load_obj_from_str(src, &mut materials, ObjLoadOptions::default()).unwrap();
        assert!(materials.is_empty());
        assert_eq!(mesh.data.indices.len(), 3);
    }

    #[test]
    fn center_offset_uses_raw_positions() {
        let mut materials = MaterialLibrary::new();
        // Vertex 4 is never referenced by a face but still counts.
        let src = "v 0 0 0\nv 2 0 0\nv 0 2 0\nv 10 10 10\nf 1 2 3\n";
        let opts = ObjLoadOptions {
            compute_center: true,
            ..Default::default()
        };
        let mesh = load_obj_from_str(src, &mut materials, opts).unwrap();
        assert_eq!(mesh.center_offset, Some(Vec3::new(5.0, 5.0, 5.0)));
        assert_eq!(load(src).center_offset, None);
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut materials = MaterialLibrary::new();
        let err = load_obj_from_path("no/such/mesh.obj", &mut materials, ObjLoadOptions::default())
            .unwrap_err();
        assert!(format!("{err:#}").contains("Failed to open OBJ file"));
    }
}
