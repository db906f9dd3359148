// SPDX-License-Identifier: GPL-3.0-only

//! Static quad geometry for the preview pass

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

/// One quad vertex: position plus texture coordinate, fixed stride
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 3],
    pub tex_coord: [f32; 2],
}

impl QuadVertex {
    const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x3, // position
        1 => Float32x2  // tex_coord
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Unit quad covering clip space; texture V grows downward to match the
/// top-left origin of camera frames
pub const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex {
        position: [-1.0, -1.0, 0.0],
        tex_coord: [0.0, 1.0],
    },
    QuadVertex {
        position: [1.0, -1.0, 0.0],
        tex_coord: [1.0, 1.0],
    },
    QuadVertex {
        position: [1.0, 1.0, 0.0],
        tex_coord: [1.0, 0.0],
    },
    QuadVertex {
        position: [-1.0, 1.0, 0.0],
        tex_coord: [0.0, 0.0],
    },
];

/// Two triangles sharing the 0-2 diagonal
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

/// GPU-resident quad buffers, uploaded once per renderer lifetime
pub(crate) struct GeometryBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

impl GeometryBuffers {
    /// Upload the fixed quad geometry; the data is immutable afterwards
    pub fn upload(device: &wgpu::Device) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("viewfinder quad vbo"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("viewfinder quad ibo"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex,
            index,
            index_count: QUAD_INDICES.len() as u32,
        }
    }

    /// Bind the vertex and index buffers on a render pass
    pub fn bind<'a>(&'a self, rpass: &mut wgpu::RenderPass<'a>) {
        rpass.set_vertex_buffer(0, self.vertex.slice(..));
        rpass.set_index_buffer(self.index.slice(..), wgpu::IndexFormat::Uint16);
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}
