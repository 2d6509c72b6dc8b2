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

//! Shader program wrapper: source accumulation, compilation and linking,
//! uniform location caching with optional/required/mandatory lookup modes,
//! typed uniform setters and automatic matrix refresh.

use crate::{
    auto_matrix::{AutoMatrix, MatrixCache, MatrixSources},
    error::FrameworkError,
    server::GraphicsServer,
    ImageAccess, ImageFormat, PrimitiveTopology, ShaderKind, TextureTarget, TransformFeedbackMode,
};
use fxhash::FxHashMap;
use nalgebra::{Matrix3, Matrix4, Vector2, Vector3, Vector4};
use std::{
    cell::RefCell,
    marker::PhantomData,
    path::Path,
    rc::{Rc, Weak},
};

/// A value that can be written into a uniform slot through
/// [`ShaderProgram::set_uniform`] and the by-name setter family.
pub enum UniformValue<S: GraphicsServer> {
    Bool(bool),
    Int(i32),
    UInt(u32),
    Float(f32),
    Vector2(Vector2<f32>),
    Vector3(Vector3<f32>),
    Vector4(Vector4<f32>),
    Matrix3(Matrix3<f32>),
    Matrix4(Matrix4<f32>),
    /// Binds the texture to the given texture unit and points the sampler
    /// uniform at that unit.
    Sampler {
        unit: u32,
        target: TextureTarget,
        texture: S::Texture,
    },
    /// Binds a level of the texture to the given image unit for shader image
    /// load/store access and points the uniform at that unit.
    ImageTexture {
        unit: u32,
        texture: S::Texture,
        level: i32,
        layered: bool,
        layer: i32,
        access: ImageAccess,
        format: ImageFormat,
    },
}

macro_rules! impl_from_for_uniform_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl<S: GraphicsServer> From<$ty> for UniformValue<S> {
            fn from(value: $ty) -> Self {
                Self::$variant(value)
            }
        })*
    };
}

impl_from_for_uniform_value! {
    bool => Bool,
    i32 => Int,
    u32 => UInt,
    f32 => Float,
    Vector2<f32> => Vector2,
    Vector3<f32> => Vector3,
    Vector4<f32> => Vector4,
    Matrix3<f32> => Matrix3,
    Matrix4<f32> => Matrix4,
}

/// A fragment shader output bound to a color location, used for multiple
/// render target setups.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentOutput {
    pub location: u32,
    pub name: String,
}

impl FragmentOutput {
    pub fn new(location: u32, name: impl Into<String>) -> Self {
        Self {
            location,
            name: name.into(),
        }
    }
}

fn read_source(path: &Path) -> Result<String, FrameworkError> {
    std::fs::read_to_string(path).map_err(|error| FrameworkError::ShaderSourceFileError {
        path: path.to_path_buf(),
        error,
    })
}

fn create_shader<S: GraphicsServer>(
    server: &S,
    name: String,
    kind: ShaderKind,
    source: &str,
) -> Result<S::Shader, FrameworkError> {
    let shader = server.create_shader(kind)?;
    server.shader_source(shader, source);
    server.compile_shader(shader);

    let status = server.shader_compile_status(shader);
    let compilation_message = server.shader_info_log(shader);

    if !status {
        log::error!("Failed to compile {} shader: {}", name, compilation_message);
        server.delete_shader(shader);
        Err(FrameworkError::ShaderCompilationFailed {
            shader_name: name,
            error_message: compilation_message,
        })
    } else {
        if compilation_message.is_empty()
            || compilation_message.chars().all(|c| c.is_whitespace())
        {
            log::info!("Shader {} compiled successfully!", name);
        } else {
            log::info!(
                "Shader {} compiled successfully!\nAdditional info: {}",
                name,
                compilation_message
            );
        }
        Ok(shader)
    }
}

/// Accumulates per-stage shader sources and link-time configuration, then
/// builds a [`ShaderProgram`] in a single call. Setting a source for a stage
/// that already has one overwrites the previous source; nothing is validated
/// until [`Self::build`].
pub struct ShaderProgramBuilder {
    name: String,
    sources: [Option<String>; ShaderKind::COUNT],
    fragment_outputs: Vec<FragmentOutput>,
    transform_feedback: Option<(Vec<String>, TransformFeedbackMode)>,
    auto_matrices: Vec<(String, AutoMatrix)>,
}

impl ShaderProgramBuilder {
    /// Starts a new builder. The name is used in diagnostics only.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: Default::default(),
            fragment_outputs: Default::default(),
            transform_feedback: None,
            auto_matrices: Default::default(),
        }
    }

    fn with_source(mut self, kind: ShaderKind, source: impl Into<String>) -> Self {
        self.sources[kind as usize] = Some(source.into());
        self
    }

    pub fn with_vertex_source(self, source: impl Into<String>) -> Self {
        self.with_source(ShaderKind::Vertex, source)
    }

    pub fn with_tess_control_source(self, source: impl Into<String>) -> Self {
        self.with_source(ShaderKind::TessellationControl, source)
    }

    pub fn with_tess_eval_source(self, source: impl Into<String>) -> Self {
        self.with_source(ShaderKind::TessellationEvaluation, source)
    }

    pub fn with_geometry_source(self, source: impl Into<String>) -> Self {
        self.with_source(ShaderKind::Geometry, source)
    }

    /// Sets the fragment stage source along with its output bindings. The
    /// bindings are applied before linking and preserved as program metadata.
    pub fn with_fragment_source(
        mut self,
        source: impl Into<String>,
        outputs: Vec<FragmentOutput>,
    ) -> Self {
        self.fragment_outputs = outputs;
        self.with_source(ShaderKind::Fragment, source)
    }

    pub fn with_compute_source(self, source: impl Into<String>) -> Self {
        self.with_source(ShaderKind::Compute, source)
    }

    pub fn with_vertex_source_from_file(self, path: impl AsRef<Path>) -> Result<Self, FrameworkError> {
        Ok(self.with_source(ShaderKind::Vertex, read_source(path.as_ref())?))
    }

    pub fn with_tess_control_source_from_file(
        self,
        path: impl AsRef<Path>,
    ) -> Result<Self, FrameworkError> {
        Ok(self.with_source(ShaderKind::TessellationControl, read_source(path.as_ref())?))
    }

    pub fn with_tess_eval_source_from_file(
        self,
        path: impl AsRef<Path>,
    ) -> Result<Self, FrameworkError> {
        Ok(self.with_source(ShaderKind::TessellationEvaluation, read_source(path.as_ref())?))
    }

    pub fn with_geometry_source_from_file(
        self,
        path: impl AsRef<Path>,
    ) -> Result<Self, FrameworkError> {
        Ok(self.with_source(ShaderKind::Geometry, read_source(path.as_ref())?))
    }

    pub fn with_fragment_source_from_file(
        self,
        path: impl AsRef<Path>,
        outputs: Vec<FragmentOutput>,
    ) -> Result<Self, FrameworkError> {
        let source = read_source(path.as_ref())?;
        Ok(self.with_fragment_source(source, outputs))
    }

    pub fn with_compute_source_from_file(
        self,
        path: impl AsRef<Path>,
    ) -> Result<Self, FrameworkError> {
        Ok(self.with_source(ShaderKind::Compute, read_source(path.as_ref())?))
    }

    /// Declares the varyings to capture during transform feedback and the
    /// buffer mode to capture them with. Applied before linking.
    pub fn with_transform_feedback_varyings(
        mut self,
        varyings: &[&str],
        mode: TransformFeedbackMode,
    ) -> Self {
        self.transform_feedback = Some((
            varyings.iter().map(|v| (*v).to_owned()).collect(),
            mode,
        ));
        self
    }

    /// Declares that the named uniform should receive an automatically
    /// derived matrix on every [`ShaderProgram::set_auto_matrices`] call.
    pub fn with_auto_matrix(mut self, uniform_name: impl Into<String>, flags: AutoMatrix) -> Self {
        self.auto_matrices.push((uniform_name.into(), flags));
        self
    }

    /// Compiles every supplied stage, links them into a program object and
    /// introspects the result. Stage objects are detached and released after
    /// a successful link; the accumulated sources are discarded either way.
    pub fn build<S: GraphicsServer>(
        self,
        server: &Rc<S>,
    ) -> Result<ShaderProgram<S>, FrameworkError> {
        if self.sources.iter().all(Option::is_none) {
            return Err(FrameworkError::Custom(format!(
                "Shader program {} has no source code attached",
                self.name
            )));
        }

        let mut shaders = Vec::new();
        for kind in ShaderKind::ALL {
            let Some(source) = self.sources[kind as usize].as_deref() else {
                continue;
            };
            let shader_name = format!("{}_{}Shader", self.name, kind.as_ref());
            match create_shader(server.as_ref(), shader_name, kind, source) {
                Ok(shader) => shaders.push(shader),
                Err(error) => {
                    for shader in shaders {
                        server.delete_shader(shader);
                    }
                    return Err(error);
                }
            }
        }

        let program = match server.create_program() {
            Ok(program) => program,
            Err(error) => {
                for shader in shaders {
                    server.delete_shader(shader);
                }
                return Err(error);
            }
        };

        for &shader in &shaders {
            server.attach_shader(program, shader);
        }
        for output in &self.fragment_outputs {
            server.bind_frag_data_location(program, output.location, &output.name);
        }
        if let Some((varyings, mode)) = &self.transform_feedback {
            let names = varyings.iter().map(String::as_str).collect::<Vec<_>>();
            server.transform_feedback_varyings(program, &names, *mode);
        }

        server.link_program(program);
        let status = server.program_link_status(program);
        let link_message = server.program_info_log(program);

        // The stage objects are not needed once the program is linked (or
        // failed to link).
        for &shader in &shaders {
            server.detach_shader(program, shader);
            server.delete_shader(shader);
        }

        if !status {
            log::error!("Failed to link {} shader: {}", self.name, link_message);
            server.delete_program(program);
            return Err(FrameworkError::ShaderLinkingFailed {
                shader_name: self.name,
                error_message: link_message,
            });
        }

        if link_message.is_empty() || link_message.chars().all(|c| c.is_whitespace()) {
            log::info!("Shader {} linked successfully!", self.name);
        } else {
            log::info!(
                "Shader {} linked successfully!\nAdditional info: {}",
                self.name,
                link_message
            );
        }

        let mut vertex_attribute_mask = 0u32;
        for attribute in server.active_attributes(program) {
            if attribute.location < u32::BITS {
                vertex_attribute_mask |= 1 << attribute.location;
            }
        }

        let has_tessellation = self.sources[ShaderKind::TessellationControl as usize].is_some()
            || self.sources[ShaderKind::TessellationEvaluation as usize].is_some();
        let has_geometry = self.sources[ShaderKind::Geometry as usize].is_some();
        let patch_vertices = if has_tessellation {
            server.patch_vertex_count(program)
        } else {
            0
        };
        let topology = if has_tessellation {
            PrimitiveTopology::Patches
        } else if has_geometry {
            server.geometry_input_topology(program)
        } else {
            PrimitiveTopology::Triangles
        };

        let mut shader_program = ShaderProgram {
            server: Rc::downgrade(server),
            name: self.name,
            program: Some(program),
            uniform_locations: Default::default(),
            fragment_outputs: self.fragment_outputs,
            vertex_attribute_mask,
            has_tessellation,
            has_geometry,
            patch_vertices,
            topology,
            auto_matrix_bindings: Default::default(),
            auto_normal_bindings: Default::default(),
            matrix_cache: RefCell::new(MatrixCache::default()),
            thread_mark: PhantomData,
        };

        for (uniform_name, flags) in &self.auto_matrices {
            // Required lookup: a missing uniform was most likely optimized
            // out by the driver, which is survivable.
            if let Some(location) = shader_program.uniform_location(uniform_name) {
                if flags.is_normal() {
                    shader_program.auto_normal_bindings.push((location, *flags));
                } else {
                    shader_program.auto_matrix_bindings.push((location, *flags));
                }
            }
        }

        Ok(shader_program)
    }
}

/// An owning wrapper around a linked program object.
///
/// The handle is exclusively owned: the type cannot be cloned, moving it
/// transfers ownership, and dropping it releases the program object. The
/// wrapper is only usable between a successful
/// [`ShaderProgramBuilder::build`] and [`Self::destroy`] (or drop).
pub struct ShaderProgram<S: GraphicsServer> {
    server: Weak<S>,
    name: String,
    program: Option<S::Program>,
    // Force compiler to not implement Send and Sync, because OpenGL is not thread-safe.
    thread_mark: PhantomData<*const u8>,
    uniform_locations: RefCell<FxHashMap<String, Option<S::UniformLocation>>>,
    fragment_outputs: Vec<FragmentOutput>,
    vertex_attribute_mask: u32,
    has_tessellation: bool,
    has_geometry: bool,
    patch_vertices: i32,
    topology: PrimitiveTopology,
    auto_matrix_bindings: Vec<(S::UniformLocation, AutoMatrix)>,
    auto_normal_bindings: Vec<(S::UniformLocation, AutoMatrix)>,
    matrix_cache: RefCell<MatrixCache>,
}

impl<S: GraphicsServer> ShaderProgram<S> {
    /// Name given to the program at construction, used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying program object, `None` once destroyed.
    pub fn handle(&self) -> Option<S::Program> {
        self.program
    }

    /// Bitmask of the vertex attribute slots the program actually uses.
    pub fn vertex_attribute_mask(&self) -> u32 {
        self.vertex_attribute_mask
    }

    /// Whether the program was linked with tessellation stages.
    pub fn has_tessellation_shaders(&self) -> bool {
        self.has_tessellation
    }

    /// Whether the program was linked with a geometry stage.
    pub fn has_geometry_shader(&self) -> bool {
        self.has_geometry
    }

    /// Output patch vertex count of the tessellation control stage, zero for
    /// programs without tessellation.
    pub fn patch_vertices(&self) -> i32 {
        self.patch_vertices
    }

    /// Primitive topology the program expects to be fed with.
    pub fn primitive_topology(&self) -> PrimitiveTopology {
        self.topology
    }

    /// Overrides the topology derived at build time.
    pub fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        self.topology = topology;
    }

    /// Fragment output bindings supplied at build time, in declaration order.
    pub fn fragment_outputs(&self) -> &[FragmentOutput] {
        &self.fragment_outputs
    }

    pub(crate) fn server(&self) -> Option<Rc<S>> {
        self.server.upgrade()
    }

    fn lookup_uniform_location(
        &self,
        name: &str,
        warn_if_missing: bool,
    ) -> Option<S::UniformLocation> {
        let mut locations = self.uniform_locations.borrow_mut();
        if let Some(cached_location) = locations.get(name) {
            return cached_location.clone();
        }
        let program = self.program?;
        let server = self.server.upgrade().unwrap();
        let location = server.uniform_location(program, name);
        if location.is_none() && warn_if_missing {
            log::warn!(
                "There is no such shader uniform: {} in program {}",
                name,
                self.name
            );
        }
        locations.insert(name.to_owned(), location.clone());
        location
    }

    /// Whether the linked program has an active uniform with the given name.
    pub fn has_uniform(&self, name: &str) -> bool {
        self.lookup_uniform_location(name, false).is_some()
    }

    /// Resolves a uniform location, tolerating absence silently.
    pub fn optional_uniform_location(&self, name: &str) -> Option<S::UniformLocation> {
        self.lookup_uniform_location(name, false)
    }

    /// Resolves a uniform location; absence yields `None` and is logged once.
    pub fn uniform_location(&self, name: &str) -> Option<S::UniformLocation> {
        self.lookup_uniform_location(name, true)
    }

    /// Resolves a uniform location, treating absence as a configuration
    /// error: the shader source and the calling code disagree on the name.
    pub fn mandatory_uniform_location(
        &self,
        name: &str,
    ) -> Result<S::UniformLocation, FrameworkError> {
        self.lookup_uniform_location(name, false)
            .ok_or_else(|| FrameworkError::UnableToFindShaderUniform(name.to_owned()))
    }

    /// Warms the location cache for a batch of names, tolerating absences.
    pub fn query_optional_uniform_locations(&self, names: &[&str]) {
        for name in names {
            self.optional_uniform_location(name);
        }
    }

    /// Warms the location cache for a batch of names, logging absences.
    pub fn query_uniform_locations(&self, names: &[&str]) {
        for name in names {
            self.uniform_location(name);
        }
    }

    /// Warms the location cache for a batch of names, failing on the first
    /// absence.
    pub fn query_mandatory_uniform_locations(&self, names: &[&str]) -> Result<(), FrameworkError> {
        for name in names {
            self.mandatory_uniform_location(name)?;
        }
        Ok(())
    }

    /// Makes the program current.
    pub fn bind(&self) {
        if let Some(program) = self.program {
            self.server.upgrade().unwrap().set_program(Some(program));
        }
    }

    /// Writes a value to the given uniform location. The program is made
    /// current first, so the write can never land in a foreign program.
    pub fn set_uniform(&self, location: &S::UniformLocation, value: impl Into<UniformValue<S>>) {
        let Some(program) = self.program else {
            return;
        };
        let server = self.server.upgrade().unwrap();
        server.set_program(Some(program));
        match value.into() {
            UniformValue::Bool(v) => {
                server.set_uniform_i32(location, v as i32);
            }
            UniformValue::Int(v) => server.set_uniform_i32(location, v),
            UniformValue::UInt(v) => server.set_uniform_u32(location, v),
            UniformValue::Float(v) => server.set_uniform_f32(location, v),
            UniformValue::Vector2(v) => server.set_uniform_vector2(location, &v),
            UniformValue::Vector3(v) => server.set_uniform_vector3(location, &v),
            UniformValue::Vector4(v) => server.set_uniform_vector4(location, &v),
            UniformValue::Matrix3(v) => server.set_uniform_matrix3(location, &v),
            UniformValue::Matrix4(v) => server.set_uniform_matrix4(location, &v),
            UniformValue::Sampler {
                unit,
                target,
                texture,
            } => {
                server.set_texture(unit, target, Some(texture));
                server.set_uniform_i32(location, unit as i32);
            }
            UniformValue::ImageTexture {
                unit,
                texture,
                level,
                layered,
                layer,
                access,
                format,
            } => {
                server.bind_image_texture(unit, texture, level, layered, layer, access, format);
                server.set_uniform_i32(location, unit as i32);
            }
        }
    }

    /// Resolves the name through the required lookup path and writes the
    /// value if the uniform exists.
    pub fn set_named_uniform(&self, name: &str, value: impl Into<UniformValue<S>>) {
        if let Some(location) = self.uniform_location(name) {
            self.set_uniform(&location, value);
        }
    }

    /// Writes the value if the uniform exists, silently doing nothing
    /// otherwise.
    pub fn set_optional_uniform(&self, name: &str, value: impl Into<UniformValue<S>>) {
        if let Some(location) = self.optional_uniform_location(name) {
            self.set_uniform(&location, value);
        }
    }

    /// Writes the value, failing loudly when the uniform is absent.
    pub fn set_mandatory_uniform(
        &self,
        name: &str,
        value: impl Into<UniformValue<S>>,
    ) -> Result<(), FrameworkError> {
        let location = self.mandatory_uniform_location(name)?;
        self.set_uniform(&location, value);
        Ok(())
    }

    /// Refreshes every uniform declared through
    /// [`ShaderProgramBuilder::with_auto_matrix`] from the four base
    /// matrices. Each declared derivation is computed at most once per call,
    /// no matter how many uniforms subscribe to it.
    pub fn set_auto_matrices(
        &self,
        transformation: &Matrix4<f32>,
        model: &Matrix4<f32>,
        view: &Matrix4<f32>,
        projection: &Matrix4<f32>,
    ) {
        if self.auto_matrix_bindings.is_empty() && self.auto_normal_bindings.is_empty() {
            return;
        }

        let sources = MatrixSources {
            transformation: *transformation,
            model: *model,
            view: *view,
            projection: *projection,
        };

        let mut cache = self.matrix_cache.borrow_mut();
        cache.begin_refresh();
        for (location, flags) in &self.auto_matrix_bindings {
            let matrix = cache.matrix(*flags, &sources);
            self.set_uniform(location, matrix);
        }
        for (location, flags) in &self.auto_normal_bindings {
            let matrix = cache.normal_matrix(*flags, &sources);
            self.set_uniform(location, matrix);
        }
    }

    /// Releases the underlying program object. Idempotent; every other
    /// operation on a destroyed wrapper is a no-op (or reports absence).
    pub fn destroy(&mut self) {
        if let Some(program) = self.program.take() {
            if let Some(server) = self.server.upgrade() {
                server.delete_program(program);
            }
            self.uniform_locations.borrow_mut().clear();
            self.auto_matrix_bindings.clear();
            self.auto_normal_bindings.clear();
        }
    }
}

impl<S: GraphicsServer> Drop for ShaderProgram<S> {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dummy::{DummyCall, DummyGraphicsServer, UniformWrite};
    use crate::PrimitiveTopology;
    use nalgebra::Vector3;
    use std::rc::Rc;

    const VS: &str = "void main() { gl_Position = vec4(0.0); }";
    const FS: &str = "void main() {}";

    fn build_simple(server: &Rc<DummyGraphicsServer>) -> ShaderProgram<DummyGraphicsServer> {
        ShaderProgramBuilder::new("Test")
            .with_vertex_source(VS)
            .with_fragment_source(FS, Vec::new())
            .build(server)
            .unwrap()
    }

    #[test]
    fn absent_uniform_lookup_modes() {
        let server = Rc::new(DummyGraphicsServer::default());
        let program = build_simple(&server);

        assert!(program.optional_uniform_location("missing").is_none());
        assert!(program.uniform_location("missing").is_none());
        assert!(!program.has_uniform("missing"));
        assert!(matches!(
            program.mandatory_uniform_location("missing"),
            Err(FrameworkError::UnableToFindShaderUniform(name)) if name == "missing"
        ));
    }

    #[test]
    fn uniform_location_is_queried_once() {
        let server = Rc::new(DummyGraphicsServer::default());
        server.add_uniform("u_color", 7);
        let program = build_simple(&server);

        let first = program.uniform_location("u_color").unwrap();
        let second = program.uniform_location("u_color").unwrap();
        assert_eq!(first, second);
        assert_eq!(server.location_query_count(), 1);
    }

    #[test]
    fn absent_uniform_is_negatively_cached() {
        let server = Rc::new(DummyGraphicsServer::default());
        let program = build_simple(&server);

        assert!(program.optional_uniform_location("missing").is_none());
        assert!(program.uniform_location("missing").is_none());
        assert!(program.mandatory_uniform_location("missing").is_err());
        assert_eq!(server.location_query_count(), 1);
    }

    #[test]
    fn batch_queries_warm_the_cache() {
        let server = Rc::new(DummyGraphicsServer::default());
        server.add_uniform("u_a", 0);
        server.add_uniform("u_b", 1);
        let program = build_simple(&server);

        program.query_uniform_locations(&["u_a", "u_b"]);
        assert_eq!(server.location_query_count(), 2);
        assert!(program.has_uniform("u_a"));
        assert!(program.has_uniform("u_b"));
        assert_eq!(server.location_query_count(), 2);

        assert!(program
            .query_mandatory_uniform_locations(&["u_a", "u_missing"])
            .is_err());
    }

    #[test]
    fn plain_program_reports_no_tessellation() {
        let server = Rc::new(DummyGraphicsServer::default());
        let program = build_simple(&server);

        assert!(!program.has_tessellation_shaders());
        assert!(!program.has_geometry_shader());
        assert_eq!(program.patch_vertices(), 0);
        assert_eq!(program.primitive_topology(), PrimitiveTopology::Triangles);
    }

    #[test]
    fn tessellation_program_reports_patch_metadata() {
        let server = Rc::new(DummyGraphicsServer::default());
        server.set_patch_vertex_count(4);
        let program = ShaderProgramBuilder::new("Tess")
            .with_vertex_source(VS)
            .with_tess_control_source("layout(vertices = 4) out; void main() {}")
            .with_tess_eval_source("layout(quads) in; void main() {}")
            .with_fragment_source(FS, Vec::new())
            .build(&server)
            .unwrap();

        assert!(program.has_tessellation_shaders());
        assert_eq!(program.patch_vertices(), 4);
        assert_eq!(program.primitive_topology(), PrimitiveTopology::Patches);
    }

    #[test]
    fn geometry_program_reports_input_topology() {
        let server = Rc::new(DummyGraphicsServer::default());
        server.set_geometry_input(PrimitiveTopology::LinesAdjacency);
        let program = ShaderProgramBuilder::new("Geom")
            .with_vertex_source(VS)
            .with_geometry_source("layout(lines_adjacency) in; void main() {}")
            .with_fragment_source(FS, Vec::new())
            .build(&server)
            .unwrap();

        assert!(program.has_geometry_shader());
        assert_eq!(
            program.primitive_topology(),
            PrimitiveTopology::LinesAdjacency
        );
    }

    #[test]
    fn vertex_attribute_mask_reflects_active_attributes() {
        let server = Rc::new(DummyGraphicsServer::default());
        server.add_attribute("a_position", 0);
        server.add_attribute("a_normal", 2);
        let program = build_simple(&server);

        assert_eq!(program.vertex_attribute_mask(), 0b101);
    }

    #[test]
    fn fragment_outputs_are_preserved() {
        let server = Rc::new(DummyGraphicsServer::default());
        let outputs = vec![
            FragmentOutput::new(0, "out_color"),
            FragmentOutput::new(1, "out_normal"),
        ];
        let program = ShaderProgramBuilder::new("Mrt")
            .with_vertex_source(VS)
            .with_fragment_source(FS, outputs.clone())
            .build(&server)
            .unwrap();

        assert_eq!(program.fragment_outputs(), outputs.as_slice());
        let calls = server.calls();
        assert!(calls.contains(&DummyCall::BindFragDataLocation {
            location: 0,
            name: "out_color".to_owned()
        }));
        assert!(calls.contains(&DummyCall::BindFragDataLocation {
            location: 1,
            name: "out_normal".to_owned()
        }));
    }

    #[test]
    fn transform_feedback_varyings_are_applied_before_linking() {
        let server = Rc::new(DummyGraphicsServer::default());
        let _program = ShaderProgramBuilder::new("Feedback")
            .with_vertex_source(VS)
            .with_transform_feedback_varyings(
                &["out_position", "out_velocity"],
                TransformFeedbackMode::Separate,
            )
            .build(&server)
            .unwrap();

        let calls = server.calls();
        let varyings_at = calls
            .iter()
            .position(|call| {
                matches!(
                    call,
                    DummyCall::TransformFeedbackVaryings { varyings, mode }
                        if varyings == &["out_position".to_owned(), "out_velocity".to_owned()]
                            && *mode == TransformFeedbackMode::Separate
                )
            })
            .unwrap();
        let link_at = calls
            .iter()
            .position(|call| matches!(call, DummyCall::LinkProgram(_)))
            .unwrap();
        assert!(varyings_at < link_at);
    }

    #[test]
    fn compile_failure_aborts_the_build() {
        let server = Rc::new(DummyGraphicsServer::default());
        server.fail_compilation(ShaderKind::Fragment, "0:1: syntax error");
        let result = ShaderProgramBuilder::new("Broken")
            .with_vertex_source(VS)
            .with_fragment_source(FS, Vec::new())
            .build(&server);

        match result {
            Err(FrameworkError::ShaderCompilationFailed {
                shader_name,
                error_message,
            }) => {
                assert_eq!(shader_name, "Broken_FragmentShader");
                assert_eq!(error_message, "0:1: syntax error");
            }
            _ => panic!("expected a compilation failure"),
        }
        // The already-compiled vertex stage must not leak.
        assert_eq!(server.live_shaders(), 0);
        assert_eq!(server.live_programs(), 0);
    }

    #[test]
    fn link_failure_aborts_the_build() {
        let server = Rc::new(DummyGraphicsServer::default());
        server.fail_linking("unresolved symbol");
        let result = ShaderProgramBuilder::new("Unlinked")
            .with_vertex_source(VS)
            .with_fragment_source(FS, Vec::new())
            .build(&server);

        match result {
            Err(FrameworkError::ShaderLinkingFailed {
                shader_name,
                error_message,
            }) => {
                assert_eq!(shader_name, "Unlinked");
                assert_eq!(error_message, "unresolved symbol");
            }
            _ => panic!("expected a linking failure"),
        }
        assert_eq!(server.live_shaders(), 0);
        assert_eq!(server.live_programs(), 0);
    }

    #[test]
    fn build_without_sources_is_rejected() {
        let server = Rc::new(DummyGraphicsServer::default());
        assert!(matches!(
            ShaderProgramBuilder::new("Empty").build(&server),
            Err(FrameworkError::Custom(_))
        ));
    }

    #[test]
    fn missing_source_file_reports_the_path() {
        let result = ShaderProgramBuilder::new("FromFile")
            .with_vertex_source_from_file("/nonexistent/shader.vert");
        match result {
            Err(FrameworkError::ShaderSourceFileError { path, .. }) => {
                assert_eq!(path, Path::new("/nonexistent/shader.vert"));
            }
            _ => panic!("expected a file error"),
        }
    }

    #[test]
    fn source_file_is_loaded() {
        let path = std::env::temp_dir().join("lumen_graphics_test.vert");
        std::fs::write(&path, VS).unwrap();

        let server = Rc::new(DummyGraphicsServer::default());
        let program = ShaderProgramBuilder::new("FromFile")
            .with_vertex_source_from_file(&path)
            .unwrap()
            .with_fragment_source(FS, Vec::new())
            .build(&server)
            .unwrap();
        assert!(program.handle().is_some());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn stage_objects_are_released_after_linking() {
        let server = Rc::new(DummyGraphicsServer::default());
        let _program = build_simple(&server);
        assert_eq!(server.live_shaders(), 0);
        assert_eq!(server.live_programs(), 1);
    }

    #[test]
    fn setter_binds_the_program_and_writes() {
        let server = Rc::new(DummyGraphicsServer::default());
        server.add_uniform("u_time", 3);
        let program = build_simple(&server);
        let handle = program.handle().unwrap();

        program.set_named_uniform("u_time", 0.25f32);
        assert!(server
            .calls()
            .contains(&DummyCall::SetProgram(Some(handle))));
        assert_eq!(server.uniform_writes(), vec![(3, UniformWrite::F32(0.25))]);
    }

    #[test]
    fn optional_setter_is_silent_on_absence() {
        let server = Rc::new(DummyGraphicsServer::default());
        let program = build_simple(&server);

        program.set_optional_uniform("missing", 1.0f32);
        assert!(server.uniform_writes().is_empty());
    }

    #[test]
    fn mandatory_setter_fails_on_absence() {
        let server = Rc::new(DummyGraphicsServer::default());
        let program = build_simple(&server);

        assert!(program.set_mandatory_uniform("missing", 1.0f32).is_err());
        assert!(server.uniform_writes().is_empty());
    }

    #[test]
    fn sampler_setter_binds_texture_and_unit() {
        let server = Rc::new(DummyGraphicsServer::default());
        server.add_uniform("u_diffuse", 5);
        let program = build_simple(&server);

        program.set_named_uniform(
            "u_diffuse",
            UniformValue::Sampler {
                unit: 2,
                target: TextureTarget::Texture2D,
                texture: 9,
            },
        );
        assert!(server.calls().contains(&DummyCall::SetTexture {
            unit: 2,
            target: TextureTarget::Texture2D,
            texture: Some(9),
        }));
        assert_eq!(server.uniform_writes(), vec![(5, UniformWrite::I32(2))]);
    }

    #[test]
    fn image_texture_setter_binds_image_and_unit() {
        let server = Rc::new(DummyGraphicsServer::default());
        server.add_uniform("u_output", 1);
        let program = ShaderProgramBuilder::new("Compute")
            .with_compute_source("layout(local_size_x = 8) in; void main() {}")
            .build(&server)
            .unwrap();

        program.set_named_uniform(
            "u_output",
            UniformValue::ImageTexture {
                unit: 0,
                texture: 4,
                level: 0,
                layered: false,
                layer: 0,
                access: ImageAccess::Write,
                format: ImageFormat::RGBA32F,
            },
        );
        assert!(server.calls().contains(&DummyCall::BindImageTexture {
            unit: 0,
            texture: 4,
            access: ImageAccess::Write,
            format: ImageFormat::RGBA32F,
        }));
        assert_eq!(server.uniform_writes(), vec![(1, UniformWrite::I32(0))]);
    }

    #[test]
    fn auto_matrices_share_one_derivation_per_refresh() {
        let server = Rc::new(DummyGraphicsServer::default());
        server.add_uniform("u_mvp", 0);
        server.add_uniform("u_normal_a", 1);
        server.add_uniform("u_normal_b", 2);

        let mv = AutoMatrix::MODEL | AutoMatrix::VIEW;
        let program = ShaderProgramBuilder::new("Lit")
            .with_vertex_source(VS)
            .with_fragment_source(FS, Vec::new())
            .with_auto_matrix(
                "u_mvp",
                AutoMatrix::PROJECTION | AutoMatrix::VIEW | AutoMatrix::MODEL,
            )
            .with_auto_matrix("u_normal_a", mv | AutoMatrix::NORMAL)
            .with_auto_matrix("u_normal_b", mv | AutoMatrix::NORMAL)
            .build(&server)
            .unwrap();

        let transformation = Matrix4::identity();
        let model = Matrix4::new_nonuniform_scaling(&Vector3::new(2.0, 3.0, 4.0));
        let view = Matrix4::new_translation(&Vector3::new(0.0, 0.0, -10.0));
        let projection = Matrix4::new_scaling(0.5);
        program.set_auto_matrices(&transformation, &model, &view, &projection);

        let writes = server.uniform_writes();
        assert_eq!(writes.len(), 3);

        let mvp = projection * view * model;
        let mut expected_mvp = [0.0f32; 16];
        expected_mvp.copy_from_slice(mvp.as_slice());
        assert_eq!(writes[0], (0, UniformWrite::Matrix4(expected_mvp)));

        let normal = (view * model)
            .fixed_view::<3, 3>(0, 0)
            .into_owned()
            .try_inverse()
            .unwrap()
            .transpose();
        let mut expected_normal = [0.0f32; 9];
        expected_normal.copy_from_slice(normal.as_slice());
        assert_eq!(writes[1], (1, UniformWrite::Matrix3(expected_normal)));
        // Both subscribers received the identical cached derivation.
        assert_eq!(writes[2], (2, UniformWrite::Matrix3(expected_normal)));
    }

    #[test]
    fn declared_auto_matrix_with_missing_uniform_is_skipped() {
        let server = Rc::new(DummyGraphicsServer::default());
        let program = ShaderProgramBuilder::new("Lit")
            .with_vertex_source(VS)
            .with_fragment_source(FS, Vec::new())
            .with_auto_matrix("u_gone", AutoMatrix::MODEL)
            .build(&server)
            .unwrap();

        program.set_auto_matrices(
            &Matrix4::identity(),
            &Matrix4::identity(),
            &Matrix4::identity(),
            &Matrix4::identity(),
        );
        assert!(server.uniform_writes().is_empty());
    }

    #[test]
    fn destroy_releases_the_program_exactly_once() {
        let server = Rc::new(DummyGraphicsServer::default());
        let mut program = build_simple(&server);
        let handle = program.handle().unwrap();

        program.destroy();
        assert!(program.handle().is_none());
        program.destroy();
        drop(program);

        assert_eq!(server.deleted_programs(), vec![handle]);
        assert_eq!(server.live_programs(), 0);
    }

    #[test]
    fn destroyed_program_ignores_writes_and_lookups() {
        let server = Rc::new(DummyGraphicsServer::default());
        server.add_uniform("u_time", 3);
        let mut program = build_simple(&server);
        program.destroy();

        assert!(program.uniform_location("u_time").is_none());
        program.set_named_uniform("u_time", 1.0f32);
        assert!(server.uniform_writes().is_empty());
    }

    #[test]
    fn drop_releases_the_program() {
        let server = Rc::new(DummyGraphicsServer::default());
        let program = build_simple(&server);
        let handle = program.handle().unwrap();
        drop(program);
        assert_eq!(server.deleted_programs(), vec![handle]);
    }
}
