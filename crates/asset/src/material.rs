//! Material library parser (`newmtl`, `Ka/Kd/Ks`, `Ns/Ni/d`, `map_Kd`,
//! `map_Bump`).

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    error::{Diagnostic, DiagnosticKind, ParseError},
    options::{parse_f32, parse_map_args, parse_vec3, required},
    texture::{FallbackTexture, TextureMap},
};

/// Bump strength used when `map_Bump` carries no `-bm` option.
pub const DEFAULT_BUMP_STRENGTH: f32 = 1.0;

/// One named material. Colors stay `None` until the file sets them.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub ambient: Option<[f32; 3]>,
    pub diffuse: Option<[f32; 3]>,
    pub specular: Option<[f32; 3]>,
    pub specular_exponent: Option<f32>,
    pub optical_density: Option<f32>,
    pub opacity: f32,
    pub diffuse_map: TextureMap,
    pub bump_map: TextureMap,
    pub bump_strength: f32,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ambient: None,
            diffuse: None,
            specular: None,
            specular_exponent: None,
            optical_density: None,
            opacity: 1.0,
            diffuse_map: TextureMap::fallback(FallbackTexture::White),
            bump_map: TextureMap::fallback(FallbackTexture::Black),
            bump_strength: DEFAULT_BUMP_STRENGTH,
        }
    }
}

/// Materials of one library file, keyed by name.
#[derive(Clone, Debug, Default)]
pub struct MaterialTable {
    materials: HashMap<String, Arc<Material>>,
    diagnostics: Vec<Diagnostic>,
}

impl MaterialTable {
    pub fn get(&self, name: &str) -> Option<&Arc<Material>> {
        self.materials.get(name)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Material names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.materials.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Move the diagnostics out, leaving the table's list empty.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn insert(&mut self, material: Material) {
        if self.materials.contains_key(&material.name) {
            log::debug!("material '{}' redefined, keeping the later one", material.name);
        }
        self.materials
            .insert(material.name.clone(), Arc::new(material));
    }
}

/// Parse a material library whose texture paths are relative to the
/// current directory.
pub fn parse_materials(text: &str) -> Result<MaterialTable, ParseError> {
    parse_materials_in(text, Path::new(""))
}

/// Parse a material library, resolving texture paths against `base_dir`
/// (the directory the library file lives in).
pub fn parse_materials_in(text: &str, base_dir: &Path) -> Result<MaterialTable, ParseError> {
    let mut table = MaterialTable::default();
    let mut current: Option<Material> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut tokens = trimmed.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };

        if keyword == "newmtl" {
            if let Some(done) = current.take() {
                table.insert(done);
            }
            let name = required(tokens.next(), keyword, "material name", line)?;
            current = Some(Material::new(name));
            continue;
        }

        if !is_property(keyword) {
            table.diagnostics.push(Diagnostic::report(
                line,
                DiagnosticKind::IgnoredDirective(keyword.to_owned()),
            ));
            continue;
        }

        let Some(mat) = current.as_mut() else {
            return Err(ParseError::PropertyBeforeMaterial {
                directive: keyword.to_owned(),
                line,
            });
        };

        match keyword {
            "Ka" => mat.ambient = Some(parse_vec3(&mut tokens, keyword, line)?),
            "Kd" => mat.diffuse = Some(parse_vec3(&mut tokens, keyword, line)?),
            "Ks" => mat.specular = Some(parse_vec3(&mut tokens, keyword, line)?),
            "Ns" => mat.specular_exponent = Some(parse_f32(tokens.next(), keyword, "value", line)?),
            "Ni" => mat.optical_density = Some(parse_f32(tokens.next(), keyword, "value", line)?),
            "d" => mat.opacity = parse_f32(tokens.next(), keyword, "value", line)?,
            "illum" => {
                let mode = required(tokens.next(), keyword, "mode", line)?;
                if mode.parse::<u32>().is_err() {
                    return Err(ParseError::InvalidNumber {
                        token: mode.to_owned(),
                        line,
                    });
                }
            }
            "map_Kd" => {
                let mut args = parse_map_args(tokens, keyword, line)?;
                if args.bump_strength.is_some() {
                    args.diagnostics.push(Diagnostic::report(
                        line,
                        DiagnosticKind::IgnoredOption("-bm".to_owned()),
                    ));
                }
                mat.diffuse_map = TextureMap::file(resolve(base_dir, &args.path), args.scale);
                table.diagnostics.append(&mut args.diagnostics);
            }
            "map_Bump" | "bump" => {
                let mut args = parse_map_args(tokens, keyword, line)?;
                mat.bump_map = TextureMap::file(resolve(base_dir, &args.path), args.scale);
                mat.bump_strength = args.bump_strength.unwrap_or(DEFAULT_BUMP_STRENGTH);
                table.diagnostics.append(&mut args.diagnostics);
            }
            _ => unreachable!("is_property covers every arm"),
        }
    }

    if let Some(done) = current.take() {
        table.insert(done);
    }

    log::debug!("parsed {} materials", table.len());
    Ok(table)
}

/// Read and parse a material library file.
pub fn load_materials(path: impl AsRef<Path>) -> Result<MaterialTable, ParseError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ParseError::UnresolvedInclude {
        path: path.to_path_buf(),
        source,
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    parse_materials_in(&text, base).map_err(|source| ParseError::Material {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

fn is_property(keyword: &str) -> bool {
    matches!(
        keyword,
        "Ka" | "Kd" | "Ks" | "Ns" | "Ni" | "d" | "illum" | "map_Kd" | "map_Bump" | "bump"
    )
}

fn resolve(base_dir: &Path, path: &str) -> PathBuf {
    base_dir.join(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::TextureRef;

    const HULL: &str = r#"
        # Blender MTL File
        newmtl hull
        Ns 96.078431
        Ka 1.000000 1.000000 1.000000
        Kd 0.640000 0.640000 0.640000
        Ks 0.500000 0.500000 0.500000
        Ni 1.000000
        d 0.5
        illum 2
        map_Kd hull diffuse.png
        map_Bump -s 2 2 1 -bm 0.3 hull_n.png

        newmtl glow
        Kd 0 0.5 1
    "#;

    #[test]
    fn parses_properties() {
        let table = parse_materials_in(HULL, Path::new("ships/admonisher")).unwrap();
        assert_eq!(table.names(), ["glow", "hull"]);

        let hull = table.get("hull").unwrap();
        assert_eq!(hull.ambient, Some([1.0, 1.0, 1.0]));
        assert_eq!(hull.diffuse, Some([0.64, 0.64, 0.64]));
        assert_eq!(hull.specular, Some([0.5, 0.5, 0.5]));
        assert_eq!(hull.specular_exponent, Some(96.078431));
        assert_eq!(hull.optical_density, Some(1.0));
        assert_eq!(hull.opacity, 0.5);
        assert_eq!(
            hull.diffuse_map.source,
            TextureRef::File(PathBuf::from("ships/admonisher/hull diffuse.png"))
        );
        assert_eq!(hull.bump_map.scale, [2.0, 2.0, 1.0]);
        assert_eq!(hull.bump_strength, 0.3);
    }

    #[test]
    fn unset_fields_keep_defaults() {
        let table = parse_materials(HULL).unwrap();
        let glow = table.get("glow").unwrap();
        assert_eq!(glow.ambient, None);
        assert_eq!(glow.specular, None);
        assert_eq!(glow.specular_exponent, None);
        assert_eq!(glow.opacity, 1.0);
        assert_eq!(glow.bump_strength, DEFAULT_BUMP_STRENGTH);
        assert_eq!(
            glow.diffuse_map.source,
            TextureRef::Fallback(FallbackTexture::White)
        );
        assert_eq!(
            glow.bump_map.source,
            TextureRef::Fallback(FallbackTexture::Black)
        );
    }

    #[test]
    fn illum_does_not_touch_opacity() {
        let table = parse_materials("newmtl m\nillum 2\n").unwrap();
        assert_eq!(table.get("m").unwrap().opacity, 1.0);
    }

    #[test]
    fn bump_map_without_strength_uses_default() {
        let table = parse_materials("newmtl m\nbump plates.png\n").unwrap();
        let m = table.get("m").unwrap();
        assert!(!m.bump_map.is_fallback());
        assert_eq!(m.bump_strength, DEFAULT_BUMP_STRENGTH);
    }

    #[test]
    fn property_before_newmtl() {
        let err = parse_materials("# header\nKd 1 0 0\n").unwrap_err();
        assert!(matches!(
            err,
            ParseError::PropertyBeforeMaterial { ref directive, line: 2 } if directive == "Kd"
        ));
    }

    #[test]
    fn invalid_number_reports_line() {
        let err = parse_materials("newmtl m\n\nKd 1 zero 0\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber { line: 3, .. }));
    }

    #[test]
    fn unknown_directives_are_diagnostics() {
        let table = parse_materials("Ke 0 0 0\nnewmtl m\nmap_Ks spec.png\n").unwrap();
        assert_eq!(table.len(), 1);
        let kinds: Vec<_> = table.diagnostics().iter().map(|d| (d.line, d.kind.clone())).collect();
        assert_eq!(
            kinds,
            [
                (1, DiagnosticKind::IgnoredDirective("Ke".into())),
                (3, DiagnosticKind::IgnoredDirective("map_Ks".into())),
            ]
        );
    }

    #[test]
    fn bump_strength_on_diffuse_map_is_ignored() {
        let mut table = parse_materials("newmtl m\nmap_Kd -bm 0.5 hull.png\n").unwrap();
        assert_eq!(table.get("m").unwrap().bump_strength, DEFAULT_BUMP_STRENGTH);
        let taken = table.take_diagnostics();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].line, 2);
        assert_eq!(taken[0].kind, DiagnosticKind::IgnoredOption("-bm".into()));
        assert!(table.diagnostics().is_empty());
    }

    #[test]
    fn library_errors_name_the_library() {
        let path = std::env::temp_dir().join(format!("asset-bad-{}.mtl", std::process::id()));
        fs::write(&path, "newmtl m\n\nKd 1 x 0\n").unwrap();
        let err = load_materials(&path).unwrap_err();
        fs::remove_file(&path).ok();

        match err {
            ParseError::Material { path: p, source } => {
                assert_eq!(p, path);
                assert!(matches!(*source, ParseError::InvalidNumber { line: 3, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn later_definition_wins() {
        let table = parse_materials("newmtl m\nd 0.2\nnewmtl m\nd 0.7\n").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("m").unwrap().opacity, 0.7);
    }

    #[test]
    fn missing_library_is_unresolved_include() {
        let err = load_materials("/no/such/dir/ship.mtl").unwrap_err();
        assert!(matches!(err, ParseError::UnresolvedInclude { .. }));
    }
}
