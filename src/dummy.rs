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

//! Dummy graphics server for testing and development.
//!
//! This server doesn't perform actual GPU operations but provides a valid
//! [`GraphicsServer`] implementation for exercising programs without a GPU
//! or a current GL context. Tests script what the "driver" reports (active
//! uniforms and attributes, patch vertex count, compile/link failures) and
//! inspect what the wrapper did (recorded calls, uniform writes, query and
//! object-lifetime counters).

use crate::{
    error::FrameworkError,
    server::{ActiveAttribute, GraphicsServer},
    ImageAccess, ImageFormat, PrimitiveTopology, ShaderKind, TextureTarget, TransformFeedbackMode,
};
use fxhash::{FxHashMap, FxHashSet};
use nalgebra::{Matrix3, Matrix4, Vector2, Vector3, Vector4};
use std::cell::{Cell, RefCell};

/// A state-changing call recorded by the dummy server, in issue order.
/// Redundant program binds are elided the way a real server elides them, so
/// the log shows actual binding transitions.
#[derive(Clone, Debug, PartialEq)]
pub enum DummyCall {
    SetProgram(Option<u32>),
    BindFragDataLocation {
        location: u32,
        name: String,
    },
    TransformFeedbackVaryings {
        varyings: Vec<String>,
        mode: TransformFeedbackMode,
    },
    LinkProgram(u32),
    SetTexture {
        unit: u32,
        target: TextureTarget,
        texture: Option<u32>,
    },
    BindImageTexture {
        unit: u32,
        texture: u32,
        access: ImageAccess,
        format: ImageFormat,
    },
    BindVertexArray(Option<u32>),
    SetPatchVertices(i32),
    DrawElements(PrimitiveTopology, u32),
}

/// A uniform write recorded by the dummy server.
#[derive(Clone, Debug, PartialEq)]
pub enum UniformWrite {
    I32(i32),
    U32(u32),
    F32(f32),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
    Vector4([f32; 4]),
    Matrix3([f32; 9]),
    Matrix4([f32; 16]),
}

/// Headless [`GraphicsServer`] implementation.
pub struct DummyGraphicsServer {
    next_shader: Cell<u32>,
    next_program: Cell<u32>,
    shader_kinds: RefCell<FxHashMap<u32, ShaderKind>>,
    live_shaders: RefCell<FxHashSet<u32>>,
    live_programs: RefCell<FxHashSet<u32>>,
    deleted_programs: RefCell<Vec<u32>>,
    current_program: Cell<Option<u32>>,
    uniforms: RefCell<FxHashMap<String, u32>>,
    attributes: RefCell<Vec<ActiveAttribute>>,
    patch_vertex_count: Cell<i32>,
    geometry_input: Cell<PrimitiveTopology>,
    failing_stages: RefCell<FxHashMap<ShaderKind, String>>,
    link_failure: RefCell<Option<String>>,
    location_queries: Cell<usize>,
    calls: RefCell<Vec<DummyCall>>,
    uniform_writes: RefCell<Vec<(u32, UniformWrite)>>,
}

impl Default for DummyGraphicsServer {
    fn default() -> Self {
        Self {
            next_shader: Cell::new(1),
            next_program: Cell::new(1),
            shader_kinds: Default::default(),
            live_shaders: Default::default(),
            live_programs: Default::default(),
            deleted_programs: Default::default(),
            current_program: Cell::new(None),
            uniforms: Default::default(),
            attributes: Default::default(),
            patch_vertex_count: Cell::new(3),
            geometry_input: Cell::new(PrimitiveTopology::Triangles),
            failing_stages: Default::default(),
            link_failure: RefCell::new(None),
            location_queries: Cell::new(0),
            calls: Default::default(),
            uniform_writes: Default::default(),
        }
    }
}

impl DummyGraphicsServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an active uniform every linked program will report.
    pub fn add_uniform(&self, name: &str, location: u32) {
        self.uniforms.borrow_mut().insert(name.to_owned(), location);
    }

    /// Declares an active vertex attribute every linked program will report.
    pub fn add_attribute(&self, name: &str, location: u32) {
        self.attributes.borrow_mut().push(ActiveAttribute {
            name: name.to_owned(),
            location,
        });
    }

    /// Sets the patch vertex count reported for tessellation programs.
    pub fn set_patch_vertex_count(&self, count: i32) {
        self.patch_vertex_count.set(count);
    }

    /// Sets the input topology reported for geometry programs.
    pub fn set_geometry_input(&self, topology: PrimitiveTopology) {
        self.geometry_input.set(topology);
    }

    /// Makes compilation of the given stage fail with the given info log.
    pub fn fail_compilation(&self, kind: ShaderKind, message: &str) {
        self.failing_stages
            .borrow_mut()
            .insert(kind, message.to_owned());
    }

    /// Makes every link fail with the given info log.
    pub fn fail_linking(&self, message: &str) {
        *self.link_failure.borrow_mut() = Some(message.to_owned());
    }

    /// Amount of uniform location queries issued so far.
    pub fn location_query_count(&self) -> usize {
        self.location_queries.get()
    }

    /// Amount of shader-stage objects that are created but not yet deleted.
    pub fn live_shaders(&self) -> usize {
        self.live_shaders.borrow().len()
    }

    /// Amount of program objects that are created but not yet deleted.
    pub fn live_programs(&self) -> usize {
        self.live_programs.borrow().len()
    }

    /// Program objects deleted so far, in deletion order.
    pub fn deleted_programs(&self) -> Vec<u32> {
        self.deleted_programs.borrow().clone()
    }

    /// Recorded state-changing calls, in issue order.
    pub fn calls(&self) -> Vec<DummyCall> {
        self.calls.borrow().clone()
    }

    /// Recorded uniform writes as `(location, value)` pairs, in issue order.
    pub fn uniform_writes(&self) -> Vec<(u32, UniformWrite)> {
        self.uniform_writes.borrow().clone()
    }

    /// Clears the recorded calls and uniform writes.
    pub fn clear_log(&self) {
        self.calls.borrow_mut().clear();
        self.uniform_writes.borrow_mut().clear();
    }

    fn record(&self, call: DummyCall) {
        log::trace!("DummyGraphicsServer: {:?}", call);
        self.calls.borrow_mut().push(call);
    }

    fn write(&self, location: &u32, value: UniformWrite) {
        self.uniform_writes.borrow_mut().push((*location, value));
    }
}

impl GraphicsServer for DummyGraphicsServer {
    type Shader = u32;
    type Program = u32;
    type Texture = u32;
    type VertexArray = u32;
    type UniformLocation = u32;

    fn create_shader(&self, kind: ShaderKind) -> Result<Self::Shader, FrameworkError> {
        let shader = self.next_shader.get();
        self.next_shader.set(shader + 1);
        self.shader_kinds.borrow_mut().insert(shader, kind);
        self.live_shaders.borrow_mut().insert(shader);
        Ok(shader)
    }

    fn shader_source(&self, _shader: Self::Shader, _source: &str) {}

    fn compile_shader(&self, _shader: Self::Shader) {}

    fn shader_compile_status(&self, shader: Self::Shader) -> bool {
        let kinds = self.shader_kinds.borrow();
        match kinds.get(&shader) {
            Some(kind) => !self.failing_stages.borrow().contains_key(kind),
            None => false,
        }
    }

    fn shader_info_log(&self, shader: Self::Shader) -> String {
        let kinds = self.shader_kinds.borrow();
        kinds
            .get(&shader)
            .and_then(|kind| self.failing_stages.borrow().get(kind).cloned())
            .unwrap_or_default()
    }

    fn delete_shader(&self, shader: Self::Shader) {
        self.live_shaders.borrow_mut().remove(&shader);
    }

    fn create_program(&self) -> Result<Self::Program, FrameworkError> {
        let program = self.next_program.get();
        self.next_program.set(program + 1);
        self.live_programs.borrow_mut().insert(program);
        Ok(program)
    }

    fn attach_shader(&self, _program: Self::Program, _shader: Self::Shader) {}

    fn detach_shader(&self, _program: Self::Program, _shader: Self::Shader) {}

    fn bind_frag_data_location(&self, _program: Self::Program, color_location: u32, name: &str) {
        self.record(DummyCall::BindFragDataLocation {
            location: color_location,
            name: name.to_owned(),
        });
    }

    fn transform_feedback_varyings(
        &self,
        _program: Self::Program,
        varyings: &[&str],
        mode: TransformFeedbackMode,
    ) {
        self.record(DummyCall::TransformFeedbackVaryings {
            varyings: varyings.iter().map(|v| (*v).to_owned()).collect(),
            mode,
        });
    }

    fn link_program(&self, program: Self::Program) {
        self.record(DummyCall::LinkProgram(program));
    }

    fn program_link_status(&self, _program: Self::Program) -> bool {
        self.link_failure.borrow().is_none()
    }

    fn program_info_log(&self, _program: Self::Program) -> String {
        self.link_failure.borrow().clone().unwrap_or_default()
    }

    fn delete_program(&self, program: Self::Program) {
        self.live_programs.borrow_mut().remove(&program);
        self.deleted_programs.borrow_mut().push(program);
        if self.current_program.get() == Some(program) {
            self.current_program.set(None);
        }
    }

    fn set_program(&self, program: Option<Self::Program>) {
        if self.current_program.get() != program {
            self.current_program.set(program);
            self.record(DummyCall::SetProgram(program));
        }
    }

    fn uniform_location(
        &self,
        _program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        self.location_queries.set(self.location_queries.get() + 1);
        self.uniforms.borrow().get(name).copied()
    }

    fn active_attributes(&self, _program: Self::Program) -> Vec<ActiveAttribute> {
        self.attributes.borrow().clone()
    }

    fn patch_vertex_count(&self, _program: Self::Program) -> i32 {
        self.patch_vertex_count.get()
    }

    fn geometry_input_topology(&self, _program: Self::Program) -> PrimitiveTopology {
        self.geometry_input.get()
    }

    fn set_uniform_i32(&self, location: &Self::UniformLocation, value: i32) {
        self.write(location, UniformWrite::I32(value));
    }

    fn set_uniform_u32(&self, location: &Self::UniformLocation, value: u32) {
        self.write(location, UniformWrite::U32(value));
    }

    fn set_uniform_f32(&self, location: &Self::UniformLocation, value: f32) {
        self.write(location, UniformWrite::F32(value));
    }

    fn set_uniform_vector2(&self, location: &Self::UniformLocation, value: &Vector2<f32>) {
        self.write(location, UniformWrite::Vector2([value.x, value.y]));
    }

    fn set_uniform_vector3(&self, location: &Self::UniformLocation, value: &Vector3<f32>) {
        self.write(location, UniformWrite::Vector3([value.x, value.y, value.z]));
    }

    fn set_uniform_vector4(&self, location: &Self::UniformLocation, value: &Vector4<f32>) {
        self.write(
            location,
            UniformWrite::Vector4([value.x, value.y, value.z, value.w]),
        );
    }

    fn set_uniform_matrix3(&self, location: &Self::UniformLocation, value: &Matrix3<f32>) {
        let mut data = [0.0; 9];
        data.copy_from_slice(value.as_slice());
        self.write(location, UniformWrite::Matrix3(data));
    }

    fn set_uniform_matrix4(&self, location: &Self::UniformLocation, value: &Matrix4<f32>) {
        let mut data = [0.0; 16];
        data.copy_from_slice(value.as_slice());
        self.write(location, UniformWrite::Matrix4(data));
    }

    fn set_texture(&self, unit: u32, target: TextureTarget, texture: Option<Self::Texture>) {
        self.record(DummyCall::SetTexture {
            unit,
            target,
            texture,
        });
    }

    fn bind_image_texture(
        &self,
        unit: u32,
        texture: Self::Texture,
        _level: i32,
        _layered: bool,
        _layer: i32,
        access: ImageAccess,
        format: ImageFormat,
    ) {
        self.record(DummyCall::BindImageTexture {
            unit,
            texture,
            access,
            format,
        });
    }

    fn bind_vertex_array(&self, vertex_array: Option<Self::VertexArray>) {
        self.record(DummyCall::BindVertexArray(vertex_array));
    }

    fn set_patch_vertices(&self, count: i32) {
        self.record(DummyCall::SetPatchVertices(count));
    }

    fn draw_elements(&self, topology: PrimitiveTopology, element_count: u32) {
        self.record(DummyCall::DrawElements(topology, element_count));
    }
}
