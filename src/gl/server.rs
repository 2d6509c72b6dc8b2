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

use crate::{
    error::FrameworkError,
    gl::{topology_from_gl, ToGlConstant},
    server::{ActiveAttribute, GraphicsServer},
    ImageAccess, ImageFormat, PrimitiveTopology, ShaderKind, TextureTarget, TransformFeedbackMode,
};
use glow::HasContext;
use nalgebra::{Matrix3, Matrix4, Vector2, Vector3, Vector4};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Copy, Clone)]
struct TextureBinding {
    target: u32,
    texture: Option<glow::Texture>,
}

#[derive(Copy, Clone)]
struct TextureUnit {
    bindings: [TextureBinding; 4],
}

impl Default for TextureUnit {
    fn default() -> Self {
        Self {
            bindings: [
                TextureBinding {
                    target: glow::TEXTURE_1D,
                    texture: None,
                },
                TextureBinding {
                    target: glow::TEXTURE_2D,
                    texture: None,
                },
                TextureBinding {
                    target: glow::TEXTURE_3D,
                    texture: None,
                },
                TextureBinding {
                    target: glow::TEXTURE_CUBE_MAP,
                    texture: None,
                },
            ],
        }
    }
}

#[derive(Default)]
struct TextureUnitsStorage {
    active_unit: u32,
    units: [TextureUnit; 32],
}

struct InnerState {
    program: Option<glow::Program>,
    texture_units_storage: TextureUnitsStorage,
    vao: Option<glow::VertexArray>,
    patch_vertices: i32,
}

impl Default for InnerState {
    fn default() -> Self {
        Self {
            program: None,
            texture_units_storage: Default::default(),
            vao: None,
            patch_vertices: 3,
        }
    }
}

/// [`GraphicsServer`] implementation on top of a [`glow::Context`].
///
/// The context must already be current on the calling thread and stay current
/// for the server's whole lifetime; creating a window and a context is the
/// host application's job. The server shadows the binding state it manages
/// (current program, texture units, vertex array, patch vertex count) and
/// elides redundant state changes.
pub struct GlGraphicsServer {
    pub gl: glow::Context,
    state: RefCell<InnerState>,
}

impl GlGraphicsServer {
    /// Wraps an existing, current GL context.
    pub fn new(gl: glow::Context) -> Rc<Self> {
        Rc::new(Self {
            gl,
            state: RefCell::new(InnerState::default()),
        })
    }
}

impl GraphicsServer for GlGraphicsServer {
    type Shader = glow::Shader;
    type Program = glow::Program;
    type Texture = glow::Texture;
    type VertexArray = glow::VertexArray;
    type UniformLocation = glow::UniformLocation;

    fn create_shader(&self, kind: ShaderKind) -> Result<Self::Shader, FrameworkError> {
        unsafe { Ok(self.gl.create_shader(kind.into_gl())?) }
    }

    fn shader_source(&self, shader: Self::Shader, source: &str) {
        unsafe {
            self.gl.shader_source(shader, source);
        }
    }

    fn compile_shader(&self, shader: Self::Shader) {
        unsafe {
            self.gl.compile_shader(shader);
        }
    }

    fn shader_compile_status(&self, shader: Self::Shader) -> bool {
        unsafe { self.gl.get_shader_compile_status(shader) }
    }

    fn shader_info_log(&self, shader: Self::Shader) -> String {
        unsafe { self.gl.get_shader_info_log(shader) }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        unsafe {
            self.gl.delete_shader(shader);
        }
    }

    fn create_program(&self) -> Result<Self::Program, FrameworkError> {
        unsafe { Ok(self.gl.create_program()?) }
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe {
            self.gl.attach_shader(program, shader);
        }
    }

    fn detach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe {
            self.gl.detach_shader(program, shader);
        }
    }

    fn bind_frag_data_location(&self, program: Self::Program, color_location: u32, name: &str) {
        unsafe {
            self.gl.bind_frag_data_location(program, color_location, name);
        }
    }

    fn transform_feedback_varyings(
        &self,
        program: Self::Program,
        varyings: &[&str],
        mode: TransformFeedbackMode,
    ) {
        unsafe {
            self.gl
                .transform_feedback_varyings(program, varyings, mode.into_gl());
        }
    }

    fn link_program(&self, program: Self::Program) {
        unsafe {
            self.gl.link_program(program);
        }
    }

    fn program_link_status(&self, program: Self::Program) -> bool {
        unsafe { self.gl.get_program_link_status(program) }
    }

    fn program_info_log(&self, program: Self::Program) -> String {
        unsafe { self.gl.get_program_info_log(program) }
    }

    fn delete_program(&self, program: Self::Program) {
        let mut state = self.state.borrow_mut();
        if state.program == Some(program) {
            state.program = None;
        }
        unsafe {
            self.gl.delete_program(program);
        }
    }

    fn set_program(&self, program: Option<Self::Program>) {
        let mut state = self.state.borrow_mut();
        if state.program != program {
            state.program = program;
            unsafe {
                self.gl.use_program(state.program);
            }
        }
    }

    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        unsafe { self.gl.get_uniform_location(program, name) }
    }

    fn active_attributes(&self, program: Self::Program) -> Vec<ActiveAttribute> {
        unsafe {
            let count = self.gl.get_active_attributes(program);
            let mut attributes = Vec::with_capacity(count as usize);
            for index in 0..count {
                if let Some(info) = self.gl.get_active_attribute(program, index) {
                    if let Some(location) = self.gl.get_attrib_location(program, &info.name) {
                        attributes.push(ActiveAttribute {
                            name: info.name,
                            location,
                        });
                    }
                }
            }
            attributes
        }
    }

    fn patch_vertex_count(&self, program: Self::Program) -> i32 {
        unsafe {
            self.gl
                .get_program_parameter_i32(program, glow::TESS_CONTROL_OUTPUT_VERTICES)
        }
    }

    fn geometry_input_topology(&self, program: Self::Program) -> PrimitiveTopology {
        unsafe {
            topology_from_gl(
                self.gl
                    .get_program_parameter_i32(program, glow::GEOMETRY_INPUT_TYPE)
                    as u32,
            )
        }
    }

    fn set_uniform_i32(&self, location: &Self::UniformLocation, value: i32) {
        unsafe {
            self.gl.uniform_1_i32(Some(location), value);
        }
    }

    fn set_uniform_u32(&self, location: &Self::UniformLocation, value: u32) {
        unsafe {
            self.gl.uniform_1_u32(Some(location), value);
        }
    }

    fn set_uniform_f32(&self, location: &Self::UniformLocation, value: f32) {
        unsafe {
            self.gl.uniform_1_f32(Some(location), value);
        }
    }

    fn set_uniform_vector2(&self, location: &Self::UniformLocation, value: &Vector2<f32>) {
        unsafe {
            self.gl.uniform_2_f32(Some(location), value.x, value.y);
        }
    }

    fn set_uniform_vector3(&self, location: &Self::UniformLocation, value: &Vector3<f32>) {
        unsafe {
            self.gl
                .uniform_3_f32(Some(location), value.x, value.y, value.z);
        }
    }

    fn set_uniform_vector4(&self, location: &Self::UniformLocation, value: &Vector4<f32>) {
        unsafe {
            self.gl
                .uniform_4_f32(Some(location), value.x, value.y, value.z, value.w);
        }
    }

    fn set_uniform_matrix3(&self, location: &Self::UniformLocation, value: &Matrix3<f32>) {
        unsafe {
            self.gl
                .uniform_matrix_3_f32_slice(Some(location), false, value.as_slice());
        }
    }

    fn set_uniform_matrix4(&self, location: &Self::UniformLocation, value: &Matrix4<f32>) {
        unsafe {
            self.gl
                .uniform_matrix_4_f32_slice(Some(location), false, value.as_slice());
        }
    }

    fn set_texture(&self, unit: u32, target: TextureTarget, texture: Option<Self::Texture>) {
        unsafe fn bind_texture(
            gl: &glow::Context,
            target: u32,
            texture: Option<glow::Texture>,
            unit_index: u32,
            active_unit: &mut u32,
        ) {
            if *active_unit != unit_index {
                *active_unit = unit_index;
                gl.active_texture(glow::TEXTURE0 + unit_index);
            }
            gl.bind_texture(target, texture);
        }

        let target = target.into_gl();
        let unit_index = unit;
        unsafe {
            let mut state = self.state.borrow_mut();
            let storage = &mut state.texture_units_storage;
            let active_unit = &mut storage.active_unit;
            let unit = &mut storage.units[unit_index as usize];
            for binding in unit.bindings.iter_mut() {
                if binding.target == target {
                    if binding.texture != texture {
                        binding.texture = texture;
                        bind_texture(&self.gl, binding.target, texture, unit_index, active_unit);
                    }
                } else if binding.texture.is_some() {
                    binding.texture = None;
                    bind_texture(&self.gl, binding.target, None, unit_index, active_unit);
                }
            }
        }
    }

    fn bind_image_texture(
        &self,
        unit: u32,
        texture: Self::Texture,
        level: i32,
        layered: bool,
        layer: i32,
        access: ImageAccess,
        format: ImageFormat,
    ) {
        unsafe {
            self.gl.bind_image_texture(
                unit,
                Some(texture),
                level,
                layered,
                layer,
                access.into_gl(),
                format.into_gl(),
            );
        }
    }

    fn bind_vertex_array(&self, vertex_array: Option<Self::VertexArray>) {
        let mut state = self.state.borrow_mut();
        if state.vao != vertex_array {
            state.vao = vertex_array;
            unsafe {
                self.gl.bind_vertex_array(state.vao);
            }
        }
    }

    fn set_patch_vertices(&self, count: i32) {
        let mut state = self.state.borrow_mut();
        if state.patch_vertices != count {
            state.patch_vertices = count;
            unsafe {
                self.gl.patch_parameter_i32(glow::PATCH_VERTICES, count);
            }
        }
    }

    fn draw_elements(&self, topology: PrimitiveTopology, element_count: u32) {
        unsafe {
            self.gl.draw_elements(
                topology.into_gl(),
                element_count as i32,
                glow::UNSIGNED_INT,
                0,
            );
        }
    }
}
