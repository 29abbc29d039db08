//! Quad geometry and vertex layout
//!
//! Defines the vertex format consumed by the graphics pipeline and the fixed
//! quad mesh (four vertices, two triangles) supplied once at startup.

use ash::vk;
use bytemuck::{Pod, Zeroable};

/// A vertex with 2D position, RGB color, and texture coordinates
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Position in normalized device space
    pub pos: [f32; 2],
    /// Vertex color, interpolated across the triangle
    pub color: [f32; 3],
    /// Texture coordinate
    pub tex_coord: [f32; 2],
}

impl Vertex {
    /// Vertex input binding description (single interleaved buffer)
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(std::mem::size_of::<Self>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build()
    }

    /// Attribute descriptions for position, color, and texture coordinate
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(0)
                .format(vk::Format::R32G32_SFLOAT)
                .offset(0)
                .build(),
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(1)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(std::mem::size_of::<[f32; 2]>() as u32)
                .build(),
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(2)
                .format(vk::Format::R32G32_SFLOAT)
                .offset(std::mem::size_of::<[f32; 5]>() as u32)
                .build(),
        ]
    }
}

/// The quad's four corners with distinct colors and a full texture mapping
pub const QUAD_VERTICES: [Vertex; 4] = [
    Vertex { pos: [-0.5, -0.5], color: [1.0, 0.0, 0.0], tex_coord: [1.0, 0.0] },
    Vertex { pos: [0.5, -0.5], color: [0.0, 1.0, 0.0], tex_coord: [0.0, 0.0] },
    Vertex { pos: [0.5, 0.5], color: [0.0, 0.0, 1.0], tex_coord: [0.0, 1.0] },
    Vertex { pos: [-0.5, 0.5], color: [1.0, 1.0, 1.0], tex_coord: [1.0, 1.0] },
];

/// Two counter-clockwise triangles covering the quad
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_stride_matches_attribute_offsets() {
        let binding = Vertex::binding_description();
        assert_eq!(binding.stride as usize, std::mem::size_of::<Vertex>());

        let attrs = Vertex::attribute_descriptions();
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[1].offset, 8);
        assert_eq!(attrs[2].offset, 20);
    }

    #[test]
    fn test_quad_indices_reference_valid_vertices() {
        for &index in &QUAD_INDICES {
            assert!((index as usize) < QUAD_VERTICES.len());
        }
    }
}
