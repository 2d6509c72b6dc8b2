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

#![warn(missing_docs)]

//! Graphics server is an abstraction layer over the graphics API entry points
//! consumed by [`crate::gpu_program::ShaderProgram`]. Keeping the seam at this
//! granularity allows the caching and bookkeeping logic to run unchanged on
//! top of a real GL context ([`crate::gl::GlGraphicsServer`]) or a headless
//! one ([`crate::dummy::DummyGraphicsServer`]).

use crate::{
    error::FrameworkError, ImageAccess, ImageFormat, PrimitiveTopology, ShaderKind, TextureTarget,
    TransformFeedbackMode,
};
use nalgebra::{Matrix3, Matrix4, Vector2, Vector3, Vector4};
use std::fmt::Debug;

/// An active vertex attribute reported by program introspection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveAttribute {
    /// Attribute name as spelled in the shader source.
    pub name: String,
    /// Attribute slot the attribute was assigned to.
    pub location: u32,
}

/// Abstraction over the graphics API entry points needed to compile, link,
/// introspect and feed a shader program. The API context behind an
/// implementation is assumed to be current on the calling thread for the whole
/// lifetime of the server; all calls are immediate and single-threaded.
pub trait GraphicsServer: 'static {
    /// Opaque shader-stage object handle.
    type Shader: Copy + PartialEq + Debug;
    /// Opaque program object handle.
    type Program: Copy + PartialEq + Debug;
    /// Opaque texture object handle.
    type Texture: Copy + PartialEq + Debug;
    /// Opaque vertex array object handle.
    type VertexArray: Copy + PartialEq + Debug;
    /// Opaque uniform location handle.
    type UniformLocation: Clone + PartialEq + Debug;

    /// Creates a new shader-stage object of the given kind.
    fn create_shader(&self, kind: ShaderKind) -> Result<Self::Shader, FrameworkError>;

    /// Replaces the source code of the shader-stage object.
    fn shader_source(&self, shader: Self::Shader, source: &str);

    /// Compiles the shader-stage object.
    fn compile_shader(&self, shader: Self::Shader);

    /// Returns `true` if the last compilation of the shader succeeded.
    fn shader_compile_status(&self, shader: Self::Shader) -> bool;

    /// Returns the info log of the last compilation of the shader.
    fn shader_info_log(&self, shader: Self::Shader) -> String;

    /// Deletes the shader-stage object.
    fn delete_shader(&self, shader: Self::Shader);

    /// Creates a new, empty program object.
    fn create_program(&self) -> Result<Self::Program, FrameworkError>;

    /// Attaches a compiled shader-stage object to the program.
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader);

    /// Detaches a shader-stage object from the program.
    fn detach_shader(&self, program: Self::Program, shader: Self::Shader);

    /// Binds a fragment output variable to a color location. Must be called
    /// before linking to take effect.
    fn bind_frag_data_location(&self, program: Self::Program, color_location: u32, name: &str);

    /// Declares the varyings captured during transform feedback and the
    /// buffer layout to capture them with. Must be called before linking.
    fn transform_feedback_varyings(
        &self,
        program: Self::Program,
        varyings: &[&str],
        mode: TransformFeedbackMode,
    );

    /// Links the program from its attached shader-stage objects.
    fn link_program(&self, program: Self::Program);

    /// Returns `true` if the last link of the program succeeded.
    fn program_link_status(&self, program: Self::Program) -> bool;

    /// Returns the info log of the last link of the program.
    fn program_info_log(&self, program: Self::Program) -> String;

    /// Deletes the program object.
    fn delete_program(&self, program: Self::Program);

    /// Makes the program current (or clears the current program with `None`).
    /// Implementations are expected to elide redundant binds.
    fn set_program(&self, program: Option<Self::Program>);

    /// Queries the location of a uniform, `None` if there is no such active
    /// uniform in the linked program.
    fn uniform_location(&self, program: Self::Program, name: &str)
        -> Option<Self::UniformLocation>;

    /// Lists the active vertex attributes of the linked program.
    fn active_attributes(&self, program: Self::Program) -> Vec<ActiveAttribute>;

    /// Returns the output patch vertex count declared by the program's
    /// tessellation control stage. Only meaningful for programs that were
    /// linked with tessellation stages.
    fn patch_vertex_count(&self, program: Self::Program) -> i32;

    /// Returns the input topology declared by the program's geometry stage.
    /// Only meaningful for programs that were linked with a geometry stage.
    fn geometry_input_topology(&self, program: Self::Program) -> PrimitiveTopology;

    /// Writes a signed integer uniform on the currently bound program.
    fn set_uniform_i32(&self, location: &Self::UniformLocation, value: i32);

    /// Writes an unsigned integer uniform on the currently bound program.
    fn set_uniform_u32(&self, location: &Self::UniformLocation, value: u32);

    /// Writes a float uniform on the currently bound program.
    fn set_uniform_f32(&self, location: &Self::UniformLocation, value: f32);

    /// Writes a two-component vector uniform on the currently bound program.
    fn set_uniform_vector2(&self, location: &Self::UniformLocation, value: &Vector2<f32>);

    /// Writes a three-component vector uniform on the currently bound program.
    fn set_uniform_vector3(&self, location: &Self::UniformLocation, value: &Vector3<f32>);

    /// Writes a four-component vector uniform on the currently bound program.
    fn set_uniform_vector4(&self, location: &Self::UniformLocation, value: &Vector4<f32>);

    /// Writes a 3x3 matrix uniform on the currently bound program.
    fn set_uniform_matrix3(&self, location: &Self::UniformLocation, value: &Matrix3<f32>);

    /// Writes a 4x4 matrix uniform on the currently bound program.
    fn set_uniform_matrix4(&self, location: &Self::UniformLocation, value: &Matrix4<f32>);

    /// Binds a texture to the given texture unit (or unbinds with `None`).
    /// Implementations are expected to elide redundant binds.
    fn set_texture(&self, unit: u32, target: TextureTarget, texture: Option<Self::Texture>);

    /// Binds a level of a texture to an image unit for shader image
    /// load/store access.
    #[allow(clippy::too_many_arguments)]
    fn bind_image_texture(
        &self,
        unit: u32,
        texture: Self::Texture,
        level: i32,
        layered: bool,
        layer: i32,
        access: ImageAccess,
        format: ImageFormat,
    );

    /// Binds a vertex array object (or unbinds the current one with `None`).
    fn bind_vertex_array(&self, vertex_array: Option<Self::VertexArray>);

    /// Sets the amount of vertices per patch consumed by the tessellation
    /// primitive assembler.
    fn set_patch_vertices(&self, count: i32);

    /// Draws indexed geometry from the currently bound vertex array object.
    fn draw_elements(&self, topology: PrimitiveTopology, element_count: u32);
}
