//! Ship asset loading: material libraries, geometry, textures.
//! Produces GPU-ready interleaved geometry split into per-material runs.

pub mod error;
pub mod material;
pub mod mesh;
pub mod obj;
pub mod options;
pub mod texture;

pub use error::{AttributeKind, Diagnostic, DiagnosticKind, LoadError, ParseError};
pub use material::{Material, MaterialTable, load_materials, parse_materials, parse_materials_in};
pub use mesh::{
    CompositeModel, DrawRange, FLOATS_PER_VERTEX, GeometryError, MeshVertex, PackedGeometry,
    SubObjectName, VERTEX_STRIDE,
};
pub use obj::{load_model, parse_mesh};
pub use texture::{FallbackTexture, TextureData, TextureError, TextureMap, TextureRef};
