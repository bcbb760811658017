//! Minimal MTL parser: `newmtl`, `Ka`, `Kd`, `Ks`, `Ns`, `map_Kd`.

use std::{collections::HashMap, fs, path::Path};

use anyhow::{Context, Result};

/// Named surface description from a material library.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub ambient: [f32; 3],
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    pub shininess: f32,
    /// `map_Kd` path exactly as written in the library.
    pub diffuse_texture: Option<String>,
}

impl Material {
    pub const DEFAULT_DIFFUSE: [f32; 3] = [0.8, 0.8, 0.8];

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ambient: [0.0; 3],
            diffuse: Self::DEFAULT_DIFFUSE,
            specular: [0.0; 3],
            shininess: 50.0,
            diffuse_texture: None,
        }
    }
}

/// Name -> material map. Redeclaring a name replaces the earlier record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialLibrary {
    materials: HashMap<String, Material>,
}

impl MaterialLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Material> {
        self.materials.get(name)
    }

    pub fn insert(&mut self, material: Material) {
        self.materials.insert(material.name.clone(), material);
    }

    /// Merge `other` into `self`; entries from `other` win on name clashes.
    pub fn merge(&mut self, other: MaterialLibrary) {
        self.materials.extend(other.materials);
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

/// Load a material library from a file path.
pub fn load_mtl_from_path(path: impl AsRef<Path>) -> Result<MaterialLibrary> {
    let path = path.as_ref();
    let bytes =
        fs::read(path).with_context(|| format!("Failed to open MTL file: {}", path.display()))?;
    let contents = String::from_utf8_lossy(&bytes);
    log::info!("Loading MTL file: {}", path.display());
    Ok(load_mtl_from_str(&contents))
}

/// Parse MTL text. Never fails: malformed fields are skipped with a warning.
pub fn load_mtl_from_str(contents: &str) -> MaterialLibrary {
    let mut library = MaterialLibrary::new();
    let mut current: Option<Material> = None;
    let mut declared = 0usize;

    for (line_no, line) in contents.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };

        if tag == "newmtl" {
            if let Some(done) = current.take() {
                library.insert(done);
            }
            let name = parts.next().unwrap_or_default();
            log::debug!("Found material: {}", name);
            current = Some(Material::new(name));
            declared += 1;
            continue;
        }

        // Everything else needs an active material.
        let Some(material) = current.as_mut() else {
            continue;
        };

        match tag {
            "Ka" | "Kd" | "Ks" => match parse_rgb(&mut parts) {
                Some(rgb) => {
                    let slot = match tag {
                        "Ka" => &mut material.ambient,
                        "Kd" => &mut material.diffuse,
                        _ => &mut material.specular,
                    };
                    *slot = rgb;
                }
                None => log::warn!(
                    "Malformed {} on MTL line {} for material {}: '{}'",
                    tag,
                    line_no + 1,
                    material.name,
                    trimmed
                ),
            },
            "Ns" => match parts.next().and_then(|v| v.parse::<f32>().ok()) {
                Some(ns) => material.shininess = ns,
                None => log::warn!("Malformed Ns on MTL line {}: '{}'", line_no + 1, trimmed),
            },
            "map_Kd" => {
                let texture = parts.next().unwrap_or_default().to_owned();
                log::debug!("Material {} texture: {}", material.name, texture);
                material.diffuse_texture = Some(texture);
            }
            _ => {
                // Ignore other directives (Ke/Ni/d/illum/etc.)
            }
        }
    }

    if let Some(done) = current.take() {
        library.insert(done);
    }

    log::info!("MTL parsed: {} materials declared", declared);
    library
}

fn parse_rgb<'a>(parts: &mut impl Iterator<Item = &'a str>) -> Option<[f32; 3]> {
    let r = parts.next()?.parse::<f32>().ok()?;
    let g = parts.next()?.parse::<f32>().ok()?;
    let b = parts.next()?.parse::<f32>().ok()?;
    Some([r, g, b])
}
