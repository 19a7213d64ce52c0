//! Error and diagnostic types shared by the material and mesh parsers.

use std::{fmt, io, path::PathBuf};

use thiserror::Error;

use crate::mesh::GeometryError;

/// Fatal error raised while parsing a material library or a mesh file.
///
/// Line numbers are 1-based. Any of these aborts the whole parse call.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: '{directive}' before any 'newmtl'")]
    PropertyBeforeMaterial { directive: String, line: usize },

    #[error("line {line}: invalid number '{token}'")]
    InvalidNumber { token: String, line: usize },

    #[error("line {line}: '{directive}' is missing {what}")]
    MissingArgument {
        directive: String,
        what: &'static str,
        line: usize,
    },

    #[error("line {line}: unknown material '{name}'")]
    UnknownMaterial { name: String, line: usize },

    #[error("line {line}: {kind} index {index} out of range (have {len})")]
    IndexOutOfRange {
        kind: AttributeKind,
        index: i64,
        len: usize,
        line: usize,
    },

    #[error("line {line}: face has {corners} corners, only triangles are supported")]
    UnsupportedPolygon { corners: usize, line: usize },

    #[error("line {line}: face before any 'usemtl'")]
    FaceBeforeMaterial { line: usize },

    #[error("object '{name}' is missing or has no geometry")]
    MissingSubObject { name: &'static str },

    #[error("cannot read material library {}", path.display())]
    UnresolvedInclude {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("in material library {}", path.display())]
    Material {
        path: PathBuf,
        #[source]
        source: Box<ParseError>,
    },

    #[error("line {line}: more than {} vertices in one object", u32::MAX)]
    TooManyVertices { line: usize },

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Failure to load a model or library from disk.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

/// Which attribute pool a face index points into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeKind {
    Position,
    TexCoord,
    Normal,
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttributeKind::Position => "position",
            AttributeKind::TexCoord => "texcoord",
            AttributeKind::Normal => "normal",
        })
    }
}

/// Non-fatal condition noticed while parsing. Parsing continues.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub kind: DiagnosticKind,
    /// Material library the line belongs to, `None` for the model itself.
    pub library: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Unsupported directive keyword.
    IgnoredDirective(String),
    /// `o` with a name other than "body" or "engine".
    IgnoredObject(String),
    /// Texture map option that is understood but not used.
    IgnoredOption(String),
}

impl Diagnostic {
    /// Build a diagnostic and report it through the `log` facade.
    pub(crate) fn report(line: usize, kind: DiagnosticKind) -> Self {
        let d = Self {
            line,
            kind,
            library: None,
        };
        log::warn!("{d}");
        d
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(lib) = &self.library {
            write!(f, "{lib}: ")?;
        }
        match &self.kind {
            DiagnosticKind::IgnoredDirective(k) => {
                write!(f, "line {}: ignoring directive '{}'", self.line, k)
            }
            DiagnosticKind::IgnoredObject(name) => {
                write!(f, "line {}: ignoring object '{}'", self.line, name)
            }
            DiagnosticKind::IgnoredOption(opt) => {
                write!(f, "line {}: ignoring texture option '{}'", self.line, opt)
            }
        }
    }
}
