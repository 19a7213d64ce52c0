//! Packed, upload-ready geometry produced by the mesh parser.

use std::{fmt, ops::Range, sync::Arc};

use bytemuck::{Pod, Zeroable};
use thiserror::Error;

use crate::{error::Diagnostic, material::Material};

/// Floats per interleaved record: position(3) + texcoord(2) + normal(3).
pub const FLOATS_PER_VERTEX: usize = 8;

/// Byte stride of one record.
pub const VERTEX_STRIDE: usize = FLOATS_PER_VERTEX * std::mem::size_of::<f32>();

/// One emitted face corner, laid out exactly as uploaded.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
}

impl MeshVertex {
    pub fn new(position: [f32; 3], uv: [f32; 2], normal: [f32; 3]) -> Self {
        Self {
            position,
            uv,
            normal,
        }
    }
}

/// A run of vertices drawn with one material.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawRange {
    pub material: Arc<Material>,
    /// First vertex of the run.
    pub start: u32,
    /// Number of vertices, always a multiple of 3.
    pub count: u32,
}

impl DrawRange {
    pub fn vertices(&self) -> Range<u32> {
        self.start..self.start + self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Draw ranges that do not partition the vertex buffer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("draw range {index} starts at {start}, expected {expected}")]
    Gap {
        index: usize,
        start: u32,
        expected: u32,
    },
    #[error("draw ranges cover {covered} vertices but the buffer holds {vertices}")]
    CountMismatch { covered: u64, vertices: usize },
}

/// Interleaved vertex buffer of one sub-object plus its material runs.
#[derive(Clone, Debug, PartialEq)]
pub struct PackedGeometry {
    vertices: Vec<MeshVertex>,
    ranges: Vec<DrawRange>,
    bounding_radius: f32,
}

impl PackedGeometry {
    /// Freeze a buffer and its ranges. Fails if the ranges do not cover the
    /// buffer contiguously and exactly once.
    pub fn new(
        vertices: Vec<MeshVertex>,
        ranges: Vec<DrawRange>,
        bounding_radius: f32,
    ) -> Result<Self, GeometryError> {
        let geometry = Self {
            vertices,
            ranges,
            bounding_radius,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Check that ranges tile the vertex buffer in order.
    pub fn validate(&self) -> Result<(), GeometryError> {
        let mut expected: u64 = 0;
        for (index, range) in self.ranges.iter().enumerate() {
            if u64::from(range.start) != expected {
                return Err(GeometryError::Gap {
                    index,
                    start: range.start,
                    expected: expected as u32,
                });
            }
            expected += u64::from(range.count);
        }
        if expected != self.vertices.len() as u64 {
            return Err(GeometryError::CountMismatch {
                covered: expected,
                vertices: self.vertices.len(),
            });
        }
        Ok(())
    }

    pub fn vertices(&self) -> &[MeshVertex] {
        &self.vertices
    }

    /// The buffer as a flat float slice, 8 floats per vertex.
    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// The buffer as raw bytes for direct upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn ranges(&self) -> &[DrawRange] {
        &self.ranges
    }

    pub fn bounding_radius(&self) -> f32 {
        self.bounding_radius
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }
}

/// The two sub-objects a ship model is made of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubObjectName {
    Body,
    Engine,
}

impl SubObjectName {
    pub const ALL: [SubObjectName; 2] = [SubObjectName::Body, SubObjectName::Engine];

    /// Exact, case-sensitive match against an `o` directive name.
    pub fn from_object_name(name: &str) -> Option<Self> {
        match name {
            "body" => Some(SubObjectName::Body),
            "engine" => Some(SubObjectName::Engine),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubObjectName::Body => "body",
            SubObjectName::Engine => "engine",
        }
    }
}

impl fmt::Display for SubObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ship: body and engine geometry drawn together.
#[derive(Clone, Debug)]
pub struct CompositeModel {
    pub body: PackedGeometry,
    pub engine: PackedGeometry,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompositeModel {
    pub fn get(&self, name: SubObjectName) -> &PackedGeometry {
        match name {
            SubObjectName::Body => &self.body,
            SubObjectName::Engine => &self.engine,
        }
    }

    /// Sub-objects in draw order (body first).
    pub fn iter(&self) -> impl Iterator<Item = (SubObjectName, &PackedGeometry)> {
        SubObjectName::ALL.into_iter().map(move |n| (n, self.get(n)))
    }

    /// Shared radius of the source file's position pool.
    pub fn bounding_radius(&self) -> f32 {
        self.body.bounding_radius()
    }
}
