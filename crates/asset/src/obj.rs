//! Ship geometry parser. Faces are emitted flat (one record per corner) into
//! the "body" or "engine" sub-object, split into runs per `usemtl`.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    error::{AttributeKind, Diagnostic, DiagnosticKind, LoadError, ParseError},
    material::{MaterialTable, load_materials},
    mesh::{CompositeModel, DrawRange, MeshVertex, PackedGeometry, SubObjectName},
    options::{parse_vec2, parse_vec3, required, rest_joined},
};

/// Load a model from a file path. `mtllib` paths resolve relative to the
/// model's directory.
pub fn load_model(path: impl AsRef<Path>) -> Result<CompositeModel, LoadError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let base: PathBuf = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let model = parse_mesh(&text, |lib| load_materials(base.join(lib))).map_err(|source| {
        LoadError::Parse {
            path: path.to_path_buf(),
            source,
        }
    })?;

    log::info!(
        "Loaded {}: body {} triangles, engine {} triangles, radius {:.3}",
        path.display(),
        model.body.triangle_count(),
        model.engine.triangle_count(),
        model.bounding_radius()
    );
    Ok(model)
}

/// Parse a ship model. `resolve_mtllib` is called with the argument of each
/// `mtllib` directive and returns the table that becomes active.
pub fn parse_mesh<F>(text: &str, mut resolve_mtllib: F) -> Result<CompositeModel, ParseError>
where
    F: FnMut(&str) -> Result<MaterialTable, ParseError>,
{
    let mut ctx = MeshContext::default();

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

        match keyword {
            "mtllib" => {
                let lib = required(rest_joined(tokens).as_deref(), keyword, "library path", line)?
                    .to_owned();
                log::debug!("line {line}: loading material library '{lib}'");
                let mut table = resolve_mtllib(&lib)?;
                ctx.diagnostics
                    .extend(table.take_diagnostics().into_iter().map(|mut d| {
                        d.library = Some(lib.clone());
                        d
                    }));
                ctx.materials = Some(table);
            }
            "o" => {
                let name = required(rest_joined(tokens).as_deref(), keyword, "object name", line)?
                    .to_owned();
                ctx.select_object(&name, line);
            }
            "usemtl" => {
                let name = required(tokens.next(), keyword, "material name", line)?;
                ctx.use_material(name, line)?;
            }
            "v" => ctx.positions.push(parse_vec3(&mut tokens, keyword, line)?),
            "vt" => ctx.texcoords.push(parse_vec2(&mut tokens, keyword, line)?),
            "vn" => ctx.normals.push(parse_vec3(&mut tokens, keyword, line)?),
            "f" => ctx.push_face(tokens, line)?,
            // Smoothing groups, polylines and groups carry nothing we draw.
            "s" | "l" | "g" => {}
            _ => ctx.diagnostics.push(Diagnostic::report(
                line,
                DiagnosticKind::IgnoredDirective(keyword.to_owned()),
            )),
        }
    }

    ctx.finish()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    /// Geometry of objects other than body/engine is dropped.
    Ignored,
    Object(SubObjectName),
}

#[derive(Debug, Default)]
struct SubObjectBuilder {
    vertices: Vec<MeshVertex>,
    ranges: Vec<DrawRange>,
}

impl SubObjectBuilder {
    fn finish(self, name: SubObjectName, radius: f32) -> Result<PackedGeometry, ParseError> {
        if self.vertices.is_empty() {
            return Err(ParseError::MissingSubObject {
                name: name.as_str(),
            });
        }
        for r in &self.ranges {
            log::debug!(
                "{name}: material '{}' vertices {}..{}",
                r.material.name,
                r.start,
                r.start + r.count
            );
        }
        Ok(PackedGeometry::new(self.vertices, self.ranges, radius)?)
    }
}

/// Per-call parser state.
struct MeshContext {
    positions: Vec<[f32; 3]>,
    texcoords: Vec<[f32; 2]>,
    normals: Vec<[f32; 3]>,
    materials: Option<MaterialTable>,
    target: Target,
    body: SubObjectBuilder,
    engine: SubObjectBuilder,
    diagnostics: Vec<Diagnostic>,
}

impl Default for MeshContext {
    fn default() -> Self {
        Self {
            positions: Vec::new(),
            texcoords: Vec::new(),
            normals: Vec::new(),
            materials: None,
            target: Target::Ignored,
            body: SubObjectBuilder::default(),
            engine: SubObjectBuilder::default(),
            diagnostics: Vec::new(),
        }
    }
}

impl MeshContext {
    fn current(&mut self) -> Option<&mut SubObjectBuilder> {
        match self.target {
            Target::Ignored => None,
            Target::Object(SubObjectName::Body) => Some(&mut self.body),
            Target::Object(SubObjectName::Engine) => Some(&mut self.engine),
        }
    }

    fn select_object(&mut self, name: &str, line: usize) {
        self.target = match SubObjectName::from_object_name(name) {
            Some(sub) => Target::Object(sub),
            None => {
                self.diagnostics.push(Diagnostic::report(
                    line,
                    DiagnosticKind::IgnoredObject(name.to_owned()),
                ));
                Target::Ignored
            }
        };
    }

    fn use_material(&mut self, name: &str, line: usize) -> Result<(), ParseError> {
        if self.target == Target::Ignored {
            return Ok(());
        }
        let material = self
            .materials
            .as_ref()
            .and_then(|t| t.get(name))
            .map(Arc::clone)
            .ok_or_else(|| ParseError::UnknownMaterial {
                name: name.to_owned(),
                line,
            })?;

        if let Some(sub) = self.current() {
            let start = vertex_offset(sub.vertices.len(), line)?;
            sub.ranges.push(DrawRange {
                material,
                start,
                count: 0,
            });
        }
        Ok(())
    }

    fn push_face<'a, I>(&mut self, tokens: I, line: usize) -> Result<(), ParseError>
    where
        I: Iterator<Item = &'a str>,
    {
        if self.target == Target::Ignored {
            return Ok(());
        }

        let corners: Vec<&str> = tokens.collect();
        if corners.len() != 3 {
            return Err(ParseError::UnsupportedPolygon {
                corners: corners.len(),
                line,
            });
        }

        let has_material = self.current().is_some_and(|sub| !sub.ranges.is_empty());
        if !has_material {
            return Err(ParseError::FaceBeforeMaterial { line });
        }

        let face = [
            self.corner(corners[0], line)?,
            self.corner(corners[1], line)?,
            self.corner(corners[2], line)?,
        ];

        if let Some(sub) = self.current() {
            vertex_offset(sub.vertices.len() + face.len(), line)?;
            sub.vertices.extend_from_slice(&face);
            if let Some(last) = sub.ranges.last_mut() {
                last.count += 3;
            }
        }
        Ok(())
    }

    /// Resolve one `v`, `v/t`, `v//n` or `v/t/n` corner.
    fn corner(&self, token: &str, line: usize) -> Result<MeshVertex, ParseError> {
        let mut parts = token.split('/');
        let v = parts.next().unwrap_or_default();
        let vt = parts.next();
        let vn = parts.next();
        if parts.next().is_some() {
            return Err(ParseError::InvalidNumber {
                token: token.to_owned(),
                line,
            });
        }

        let pi = parse_index(v, line)?;
        let position = lookup(&self.positions, pi, AttributeKind::Position, line)?;

        let uv = match parse_optional_index(vt, line)? {
            Some(i) => lookup(&self.texcoords, i, AttributeKind::TexCoord, line)?,
            None => [0.0, 0.0],
        };
        let normal = match parse_optional_index(vn, line)? {
            Some(i) => lookup(&self.normals, i, AttributeKind::Normal, line)?,
            None => [0.0, 0.0, 0.0],
        };

        Ok(MeshVertex::new(position, uv, normal))
    }

    fn finish(self) -> Result<CompositeModel, ParseError> {
        let radius = self
            .positions
            .iter()
            .flatten()
            .map(|c| c.abs())
            .fold(0.0_f32, f32::max);

        let body = self.body.finish(SubObjectName::Body, radius)?;
        let engine = self.engine.finish(SubObjectName::Engine, radius)?;

        Ok(CompositeModel {
            body,
            engine,
            diagnostics: self.diagnostics,
        })
    }
}

/// Draw ranges address vertices with `u32`.
fn vertex_offset(len: usize, line: usize) -> Result<u32, ParseError> {
    u32::try_from(len).map_err(|_| ParseError::TooManyVertices { line })
}

fn parse_index(token: &str, line: usize) -> Result<i64, ParseError> {
    token.parse::<i64>().map_err(|_| ParseError::InvalidNumber {
        token: token.to_owned(),
        line,
    })
}

/// Texcoord/normal slot: empty or `0` means "not given".
fn parse_optional_index(token: Option<&str>, line: usize) -> Result<Option<i64>, ParseError> {
    match token {
        None | Some("") => Ok(None),
        Some(t) => match parse_index(t, line)? {
            0 => Ok(None),
            i => Ok(Some(i)),
        },
    }
}

fn lookup<T: Copy>(pool: &[T], index: i64, kind: AttributeKind, line: usize) -> Result<T, ParseError> {
    usize::try_from(index)
        .ok()
        .and_then(|i| i.checked_sub(1))
        .and_then(|i| pool.get(i).copied())
        .ok_or(ParseError::IndexOutOfRange {
            kind,
            index,
            len: pool.len(),
            line,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::parse_materials;

    const MTL: &str = "newmtl m\nKd 1 0 0\nnewmtl n\nKd 0 1 0\n";

    fn parse(src: &str) -> Result<CompositeModel, ParseError> {
        parse_mesh(src, |_| parse_materials(MTL))
    }

    const TRIANGLE_POOLS: &str = "
        mtllib ship.mtl
        v 0 0 0
        v 1 0 0
        v 0 2 0
        vt 0 0
        vt 1 0
        vt 0 1
        vn 0 0 1
    ";

    fn ship(body: &str, engine: &str) -> String {
        format!("{TRIANGLE_POOLS}\no body\n{body}\no engine\n{engine}\n")
    }

    #[test]
    fn single_triangle_body_without_engine() {
        let src = format!("{TRIANGLE_POOLS}\no body\nusemtl m\nf 1/1/1 2/2/1 3/3/1\n");
        let err = parse(&src).unwrap_err();
        assert!(matches!(err, ParseError::MissingSubObject { name: "engine" }));
    }

    #[test]
    fn single_triangle_layout() {
        let src = ship("usemtl m\nf 1/1/1 2/2/1 3/3/1", "usemtl n\nf 3/3/1 2/2/1 1/1/1");
        let model = parse(&src).unwrap();

        let body = &model.body;
        assert_eq!(body.as_floats().len(), 24);
        assert_eq!(
            &body.as_floats()[8..16],
            &[1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]
        );
        assert_eq!(body.ranges().len(), 1);
        let r = &body.ranges()[0];
        assert_eq!((r.material.name.as_str(), r.start, r.count), ("m", 0, 3));
        assert_eq!(r.material.diffuse, Some([1.0, 0.0, 0.0]));

        assert_eq!(model.engine.ranges()[0].material.name, "n");
    }

    #[test]
    fn missing_texcoord_defaults_to_zero() {
        let src = ship("usemtl m\nf 1//1 2//1 3//1", "usemtl m\nf 1/2/1 2/2/1 3/2/1");
        let model = parse(&src).unwrap();
        for v in model.body.vertices() {
            assert_eq!(v.uv, [0.0, 0.0]);
            assert_eq!(v.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn missing_normal_defaults_to_zero() {
        let src = ship("usemtl m\nf 1/1 2/2 3/3", "usemtl m\nf 1 2 3");
        let model = parse(&src).unwrap();
        assert!(model.body.vertices().iter().all(|v| v.normal == [0.0; 3]));
        let e = model.engine.vertices();
        assert!(e.iter().all(|v| v.uv == [0.0; 2] && v.normal == [0.0; 3]));
        assert_eq!(e[2].position, [0.0, 2.0, 0.0]);
    }

    #[test]
    fn zero_index_slots_mean_absent() {
        let src = ship("usemtl m\nf 1/0/0 2/0/0 3/0/0", "usemtl m\nf 1 2 3");
        let model = parse(&src).unwrap();
        assert!(model.body.vertices().iter().all(|v| v.uv == [0.0; 2]));
    }

    #[test]
    fn face_before_usemtl() {
        let src = ship("f 1 2 3", "usemtl m\nf 1 2 3");
        let err = parse(&src).unwrap_err();
        assert!(matches!(err, ParseError::FaceBeforeMaterial { line: 12 }));
    }

    #[test]
    fn unknown_material() {
        let src = ship("usemtl hull", "usemtl m\nf 1 2 3");
        let err = parse(&src).unwrap_err();
        assert!(matches!(err, ParseError::UnknownMaterial { ref name, .. } if name == "hull"));
    }

    #[test]
    fn usemtl_without_library_is_unknown() {
        let err = parse_mesh("o body\nusemtl m\n", |_| parse_materials(MTL)).unwrap_err();
        assert!(matches!(err, ParseError::UnknownMaterial { line: 2, .. }));
    }

    #[test]
    fn consecutive_usemtl_leaves_empty_range() {
        let src = ship("usemtl n\nusemtl m\nf 1 2 3\nf 1 2 3", "usemtl m\nf 1 2 3");
        let model = parse(&src).unwrap();
        let ranges: Vec<_> = model
            .body
            .ranges()
            .iter()
            .map(|r| (r.material.name.clone(), r.start, r.count))
            .collect();
        assert_eq!(ranges, [("n".to_owned(), 0, 0), ("m".to_owned(), 0, 6)]);
    }

    #[test]
    fn ranges_partition_buffer() {
        let src = ship(
            "usemtl m\nf 1 2 3\nusemtl n\nf 1 2 3\nf 2 3 1\nusemtl m\nf 3 2 1",
            "usemtl n\nf 1 2 3",
        );
        let model = parse(&src).unwrap();
        for (_, g) in model.iter() {
            let total: u32 = g.ranges().iter().map(|r| r.count).sum();
            assert_eq!(g.as_floats().len() % 8, 0);
            assert_eq!(g.as_floats().len(), 8 * total as usize);
            let mut next = 0;
            for r in g.ranges() {
                assert_eq!(r.start, next);
                next += r.count;
            }
        }
        let starts: Vec<u32> = model.body.ranges().iter().map(|r| r.start).collect();
        assert_eq!(starts, [0, 3, 9]);
    }

    #[test]
    fn reparse_is_identical() {
        let src = ship("usemtl m\nf 1/1/1 2/2/1 3/3/1\nusemtl n\nf 3 2 1", "usemtl n\nf 1 2 3");
        let a = parse(&src).unwrap();
        let b = parse(&src).unwrap();
        assert_eq!(a.body.as_bytes(), b.body.as_bytes());
        assert_eq!(a.body.ranges(), b.body.ranges());
        assert_eq!(a.engine, b.engine);
    }

    #[test]
    fn other_objects_are_ignored() {
        let src = format!(
            "{TRIANGLE_POOLS}\nusemtl nope\nf 9 9 9\no turret\nusemtl nope\nf 1 2 3 4\n\
             o body\nusemtl m\nf 1 2 3\no engine\nusemtl m\nf 1 2 3\n"
        );
        let model = parse(&src).unwrap();
        assert_eq!(model.body.vertex_count(), 3);
        assert!(model.diagnostics.iter().any(|d| d.kind
            == DiagnosticKind::IgnoredObject("turret".into())));
    }

    #[test]
    fn quads_are_rejected() {
        let src = format!("{TRIANGLE_POOLS}\nv 1 1 0\n") + &ship("usemtl m\nf 1 2 3 4", "");
        let err = parse(&src).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedPolygon { corners: 4, .. }));
    }

    #[test]
    fn index_out_of_range() {
        let err = parse(&ship("usemtl m\nf 1 2 4", "")).unwrap_err();
        assert!(matches!(
            err,
            ParseError::IndexOutOfRange { kind: AttributeKind::Position, index: 4, len: 3, .. }
        ));

        let err = parse(&ship("usemtl m\nf 1/1/2 2/2/1 3/3/1", "")).unwrap_err();
        assert!(matches!(
            err,
            ParseError::IndexOutOfRange { kind: AttributeKind::Normal, index: 2, .. }
        ));
    }

    #[test]
    fn negative_and_zero_positions_are_rejected() {
        let err = parse(&ship("usemtl m\nf -1 -2 -3", "")).unwrap_err();
        assert!(matches!(err, ParseError::IndexOutOfRange { index: -1, .. }));

        let err = parse(&ship("usemtl m\nf 0 1 2", "")).unwrap_err();
        assert!(matches!(err, ParseError::IndexOutOfRange { index: 0, .. }));
    }

    #[test]
    fn malformed_corner_is_invalid_number() {
        let err = parse(&ship("usemtl m\nf 1/a/1 2 3", "")).unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber { ref token, .. } if token == "a"));

        let err = parse(&ship("usemtl m\nf 1/1/1/1 2 3", "")).unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber { .. }));
    }

    #[test]
    fn bounding_radius_is_max_abs_coordinate() {
        let src = format!("v -7.5 0 0\n{}", ship("usemtl m\nf 2 3 4", "usemtl m\nf 2 3 4"));
        let model = parse(&src).unwrap();
        assert_eq!(model.bounding_radius(), 7.5);
        assert_eq!(model.body.bounding_radius(), model.engine.bounding_radius());
    }

    #[test]
    fn later_mtllib_replaces_table() {
        let mut calls = 0;
        let src = "mtllib a.mtl\nmtllib b.mtl\nv 0 0 0\no body\nusemtl m\nf 1 1 1\n";
        let err = parse_mesh(src, |lib| {
            calls += 1;
            match lib {
                "a.mtl" => parse_materials("newmtl m\n"),
                _ => parse_materials("newmtl other\n"),
            }
        })
        .unwrap_err();
        assert_eq!(calls, 2);
        assert!(matches!(err, ParseError::UnknownMaterial { line: 5, .. }));
    }

    #[test]
    fn unknown_directives_are_tolerated() {
        let src = ship("usemtl m\nf 1 2 3", "usemtl m\nf 1 2 3") + "cstype bezier\ns off\nl 1 2\n";
        let model = parse(&src).unwrap();
        assert_eq!(model.diagnostics.len(), 1);
        assert_eq!(
            model.diagnostics[0].kind,
            DiagnosticKind::IgnoredDirective("cstype".into())
        );
    }

    #[test]
    fn resolver_errors_propagate() {
        let err = parse_mesh("mtllib gone.mtl\n", |lib| load_materials(lib)).unwrap_err();
        assert!(matches!(err, ParseError::UnresolvedInclude { .. }));
    }

    #[test]
    fn library_diagnostics_reach_the_model() {
        let src = ship("usemtl m\nf 1 2 3", "usemtl m\nf 1 2 3");
        let model = parse_mesh(&src, |_| {
            parse_materials("newmtl m\nKe 0 0 0\nmap_Kd -clamp on hull.png\n")
        })
        .unwrap();

        let kinds: Vec<_> = model.diagnostics.iter().map(|d| &d.kind).collect();
        assert_eq!(
            kinds,
            [
                &DiagnosticKind::IgnoredDirective("Ke".into()),
                &DiagnosticKind::IgnoredOption("-clamp".into()),
            ]
        );
        assert!(
            model
                .diagnostics
                .iter()
                .all(|d| d.library.as_deref() == Some("ship.mtl"))
        );
        assert_eq!(model.diagnostics[0].line, 2);
    }

    #[test]
    fn extra_vertex_components_are_ignored() {
        let src = "mtllib ship.mtl\nv 1 2 3 1\nv 4 5 6 1\nv 7 8 9 1\nvt 0.5 0.25 0\n\
                   o body\nusemtl m\nf 1/1 2/1 3/1\no engine\nusemtl m\nf 3 2 1\n";
        let model = parse(src).unwrap();
        let v = &model.body.vertices()[0];
        assert_eq!(v.position, [1.0, 2.0, 3.0]);
        assert_eq!(v.uv, [0.5, 0.25]);
        assert_eq!(model.body.vertices()[2].position, [7.0, 8.0, 9.0]);
        assert!(model.diagnostics.is_empty());
    }

    #[test]
    fn vertex_offsets_must_fit_u32() {
        assert_eq!(vertex_offset(0, 1).unwrap(), 0);
        assert_eq!(vertex_offset(u32::MAX as usize, 1).unwrap(), u32::MAX);
        let err = vertex_offset(u32::MAX as usize + 1, 7).unwrap_err();
        assert!(matches!(err, ParseError::TooManyVertices { line: 7 }));
    }
}
