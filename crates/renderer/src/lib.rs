//! Renderer-facing contract for ship models: vertex layout, uniform blocks,
//! one-time geometry upload and per-frame draw planning.
//! wgpu = 23.x

use std::ops::Range;
use std::sync::Arc;

use asset::{CompositeModel, Material, PackedGeometry, SubObjectName, VERTEX_STRIDE};
use bytemuck::{Pod, Zeroable};
use corelib::{Mat4, ViewTransform};
use wgpu::{BufferUsages, Device, VertexBufferLayout, VertexStepMode, util::DeviceExt};

/// Layout of [`asset::MeshVertex`]: position, texcoord, normal.
pub const VERTEX_LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
    array_stride: VERTEX_STRIDE as u64,
    step_mode: VertexStepMode::Vertex,
    attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2, 2 => Float32x3],
};

/// Per-material uniform block (16-byte aligned).
///
/// Colors carry `w = 1.0` when the material sets them and are all zero
/// otherwise, so the shader can tell "unset" from black.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MaterialUniform {
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub opacity: f32,
    pub bump_strength: f32,
    pub _pad: [f32; 2],
}

fn color_slot(c: Option<[f32; 3]>) -> [f32; 4] {
    match c {
        Some([r, g, b]) => [r, g, b, 1.0],
        None => [0.0; 4],
    }
}

impl From<&Material> for MaterialUniform {
    fn from(m: &Material) -> Self {
        Self {
            ambient: color_slot(m.ambient),
            diffuse: color_slot(m.diffuse),
            opacity: m.opacity,
            bump_strength: m.bump_strength,
            _pad: [0.0; 2],
        }
    }
}

/// View UBO.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ViewUniform {
    pub trans: [[f32; 4]; 4],
}

impl ViewUniform {
    pub fn new(view: &ViewTransform, bounding_radius: f32) -> Self {
        Self::from_matrix(view.matrix(bounding_radius))
    }

    pub fn from_matrix(m: Mat4) -> Self {
        Self {
            trans: m.to_cols_array_2d(),
        }
    }
}

/// One draw call: a material and the vertices drawn with it.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCall<'a> {
    pub material: &'a Arc<Material>,
    pub vertices: Range<u32>,
}

/// Draw calls for one sub-object in buffer order. Empty ranges (two
/// `usemtl` in a row) produce no call.
pub fn plan_draws(geometry: &PackedGeometry) -> Vec<DrawCall<'_>> {
    geometry
        .ranges()
        .iter()
        .filter(|r| !r.is_empty())
        .map(|r| DrawCall {
            material: &r.material,
            vertices: r.vertices(),
        })
        .collect()
}

/// Whatever executes draws. Implemented by the backend; the program,
/// pipeline and bound buffers all live behind `self`.
pub trait DrawTarget {
    type Error;

    fn set_view(&mut self, view: &ViewUniform) -> Result<(), Self::Error>;

    fn bind_geometry(
        &mut self,
        name: SubObjectName,
        geometry: &PackedGeometry,
    ) -> Result<(), Self::Error>;

    fn bind_material(
        &mut self,
        material: &Material,
        uniform: &MaterialUniform,
    ) -> Result<(), Self::Error>;

    fn draw(&mut self, vertices: Range<u32>) -> Result<(), Self::Error>;
}

/// Draw body then engine. Returns the number of draw calls issued.
pub fn draw_model<T: DrawTarget>(
    target: &mut T,
    model: &CompositeModel,
    view: &ViewTransform,
) -> Result<usize, T::Error> {
    target.set_view(&ViewUniform::new(view, model.bounding_radius()))?;

    let mut issued = 0;
    for (name, geometry) in model.iter() {
        target.bind_geometry(name, geometry)?;
        for call in plan_draws(geometry) {
            let material: &Material = call.material;
            target.bind_material(material, &MaterialUniform::from(material))?;
            target.draw(call.vertices)?;
            issued += 1;
        }
    }
    log::trace!("issued {issued} draw calls");
    Ok(issued)
}

/// Geometry uploaded to the GPU once after parsing.
pub struct GpuGeometry {
    pub buffer: wgpu::Buffer,
    pub vertex_count: u32,
}

/// Upload one sub-object's interleaved vertices as a vertex buffer.
pub fn upload_geometry(device: &Device, name: SubObjectName, geometry: &PackedGeometry) -> GpuGeometry {
    let label = format!("{name} VB");
    let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&label),
        contents: geometry.as_bytes(),
        usage: BufferUsages::VERTEX,
    });
    log::debug!("uploaded {} ({} bytes)", label, geometry.as_bytes().len());
    GpuGeometry {
        buffer,
        vertex_count: geometry.vertex_count() as u32,
    }
}
