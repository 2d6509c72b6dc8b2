// Copyright (c) 2019-present Dmitry Stepanov and Fyrox Engine contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! OpenGL-backed graphics server.

use crate::{ImageAccess, ImageFormat, PrimitiveTopology, ShaderKind, TextureTarget, TransformFeedbackMode};

pub mod server;

pub use server::GlGraphicsServer;

pub(crate) trait ToGlConstant {
    fn into_gl(self) -> u32;
}

impl ToGlConstant for ShaderKind {
    fn into_gl(self) -> u32 {
        match self {
            Self::Vertex => glow::VERTEX_SHADER,
            Self::TessellationControl => glow::TESS_CONTROL_SHADER,
            Self::TessellationEvaluation => glow::TESS_EVALUATION_SHADER,
            Self::Geometry => glow::GEOMETRY_SHADER,
            Self::Fragment => glow::FRAGMENT_SHADER,
            Self::Compute => glow::COMPUTE_SHADER,
        }
    }
}

impl ToGlConstant for PrimitiveTopology {
    fn into_gl(self) -> u32 {
        match self {
            Self::Points => glow::POINTS,
            Self::Lines => glow::LINES,
            Self::LinesAdjacency => glow::LINES_ADJACENCY,
            Self::Triangles => glow::TRIANGLES,
            Self::TrianglesAdjacency => glow::TRIANGLES_ADJACENCY,
            Self::Patches => glow::PATCHES,
        }
    }
}

impl ToGlConstant for TransformFeedbackMode {
    fn into_gl(self) -> u32 {
        match self {
            Self::Interleaved => glow::INTERLEAVED_ATTRIBS,
            Self::Separate => glow::SEPARATE_ATTRIBS,
        }
    }
}

impl ToGlConstant for TextureTarget {
    fn into_gl(self) -> u32 {
        match self {
            Self::Texture1D => glow::TEXTURE_1D,
            Self::Texture2D => glow::TEXTURE_2D,
            Self::Texture3D => glow::TEXTURE_3D,
            Self::CubeMap => glow::TEXTURE_CUBE_MAP,
        }
    }
}

impl ToGlConstant for ImageAccess {
    fn into_gl(self) -> u32 {
        match self {
            Self::Read => glow::READ_ONLY,
            Self::Write => glow::WRITE_ONLY,
            Self::ReadWrite => glow::READ_WRITE,
        }
    }
}

impl ToGlConstant for ImageFormat {
    fn into_gl(self) -> u32 {
        match self {
            Self::R32F => glow::R32F,
            Self::R32UI => glow::R32UI,
            Self::R32I => glow::R32I,
            Self::RG16F => glow::RG16F,
            Self::RGBA8 => glow::RGBA8,
            Self::RGBA16F => glow::RGBA16F,
            Self::RGBA32F => glow::RGBA32F,
        }
    }
}

pub(crate) fn topology_from_gl(value: u32) -> PrimitiveTopology {
    match value {
        glow::POINTS => PrimitiveTopology::Points,
        glow::LINES => PrimitiveTopology::Lines,
        glow::LINES_ADJACENCY => PrimitiveTopology::LinesAdjacency,
        glow::TRIANGLES_ADJACENCY => PrimitiveTopology::TrianglesAdjacency,
        glow::PATCHES => PrimitiveTopology::Patches,
        _ => PrimitiveTopology::Triangles,
    }
}
