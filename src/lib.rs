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

//! Shader program abstraction for OpenGL-class graphics APIs.
//!
//! The central type is [`gpu_program::ShaderProgram`]: it accumulates shader
//! stage sources through [`gpu_program::ShaderProgramBuilder`], compiles and
//! links them into a single program object, caches uniform locations, and
//! exposes typed setters for uniform values, texture samplers and image
//! textures. Programs can also derive transform matrices automatically, see
//! [`auto_matrix::AutoMatrix`].
//!
//! All graphics API access goes through the [`server::GraphicsServer`] trait.
//! [`gl::GlGraphicsServer`] implements it on top of a caller-supplied
//! [`glow::Context`]; [`dummy::DummyGraphicsServer`] is a headless
//! implementation for tests and CI machines without a GPU. Creating a window
//! and a current GL context is the responsibility of the host application.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString, VariantNames};

pub mod auto_matrix;
pub mod draw;
pub mod dummy;
pub mod error;
pub mod gl;
pub mod gpu_program;
pub mod server;

/// A single programmable pipeline stage.
#[derive(
    Copy,
    Clone,
    PartialOrd,
    PartialEq,
    Ord,
    Eq,
    Hash,
    Debug,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumString,
    VariantNames,
)]
pub enum ShaderKind {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
    Compute,
}

impl ShaderKind {
    /// Total amount of pipeline stages.
    pub const COUNT: usize = 6;

    /// All stages in pipeline order.
    pub const ALL: [ShaderKind; Self::COUNT] = [
        ShaderKind::Vertex,
        ShaderKind::TessellationControl,
        ShaderKind::TessellationEvaluation,
        ShaderKind::Geometry,
        ShaderKind::Fragment,
        ShaderKind::Compute,
    ];
}

/// Primitive topology a program expects to be fed with.
#[derive(
    Copy,
    Clone,
    PartialOrd,
    PartialEq,
    Ord,
    Eq,
    Hash,
    Debug,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumString,
    VariantNames,
)]
pub enum PrimitiveTopology {
    Points,
    Lines,
    LinesAdjacency,
    Triangles,
    TrianglesAdjacency,
    Patches,
}

impl Default for PrimitiveTopology {
    fn default() -> Self {
        Self::Triangles
    }
}

/// Layout of captured transform feedback varyings in the target buffers.
#[derive(
    Copy,
    Clone,
    PartialOrd,
    PartialEq,
    Ord,
    Eq,
    Hash,
    Debug,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumString,
    VariantNames,
)]
pub enum TransformFeedbackMode {
    /// All varyings are written into a single buffer.
    Interleaved,
    /// Each varying is written into its own buffer.
    Separate,
}

impl Default for TransformFeedbackMode {
    fn default() -> Self {
        Self::Interleaved
    }
}

/// Texture binding target of a sampler uniform.
#[derive(
    Copy,
    Clone,
    PartialOrd,
    PartialEq,
    Ord,
    Eq,
    Hash,
    Debug,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumString,
    VariantNames,
)]
pub enum TextureTarget {
    Texture1D,
    Texture2D,
    Texture3D,
    CubeMap,
}

impl Default for TextureTarget {
    fn default() -> Self {
        Self::Texture2D
    }
}

/// Access policy for an image texture binding.
#[derive(
    Copy,
    Clone,
    PartialOrd,
    PartialEq,
    Ord,
    Eq,
    Hash,
    Debug,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumString,
    VariantNames,
)]
pub enum ImageAccess {
    Read,
    Write,
    ReadWrite,
}

/// Internal format of an image texture binding.
#[derive(
    Copy,
    Clone,
    PartialOrd,
    PartialEq,
    Ord,
    Eq,
    Hash,
    Debug,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumString,
    VariantNames,
)]
pub enum ImageFormat {
    R32F,
    R32UI,
    R32I,
    RG16F,
    RGBA8,
    RGBA16F,
    RGBA32F,
}
