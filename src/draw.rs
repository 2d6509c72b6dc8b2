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

//! Free functions for drawing meshes with a shader program.
//!
//! Mesh and vertex array representations live in the host application; they
//! enter this module through the minimal [`Drawable`] trait. Every helper
//! makes the program current, configures the patch vertex count when the
//! program tessellates, and issues indexed draws with the topology the
//! program was introspected with.

use crate::{gpu_program::ShaderProgram, server::GraphicsServer, PrimitiveTopology};

/// Anything that can be drawn: a vertex array object plus the amount of
/// indices to pull from its element buffer.
pub trait Drawable<S: GraphicsServer> {
    /// Vertex array object to source vertices and indices from.
    fn vertex_array(&self) -> S::VertexArray;
    /// Amount of indices to draw.
    fn element_count(&self) -> u32;
}

fn prepare<S: GraphicsServer>(program: &ShaderProgram<S>) -> Option<std::rc::Rc<S>> {
    program.handle()?;
    let server = program.server()?;
    program.bind();
    if program.primitive_topology() == PrimitiveTopology::Patches && program.patch_vertices() > 0 {
        server.set_patch_vertices(program.patch_vertices());
    }
    Some(server)
}

/// Draws indexed geometry from the given vertex array object with the given
/// program.
pub fn draw_vertex_array<S: GraphicsServer>(
    program: &ShaderProgram<S>,
    vertex_array: S::VertexArray,
    element_count: u32,
) {
    let Some(server) = prepare(program) else {
        return;
    };
    server.bind_vertex_array(Some(vertex_array));
    server.draw_elements(program.primitive_topology(), element_count);
}

/// Draws a single mesh with the given program.
pub fn draw_mesh<S: GraphicsServer, D: Drawable<S>>(program: &ShaderProgram<S>, mesh: &D) {
    draw_vertex_array(program, mesh.vertex_array(), mesh.element_count());
}

/// Draws a batch of meshes with the given program. The program is made
/// current once for the whole batch.
pub fn draw_meshes<S: GraphicsServer, D: Drawable<S>>(program: &ShaderProgram<S>, meshes: &[D]) {
    let Some(server) = prepare(program) else {
        return;
    };
    for mesh in meshes {
        server.bind_vertex_array(Some(mesh.vertex_array()));
        server.draw_elements(program.primitive_topology(), mesh.element_count());
    }
}

/// Draws a batch of meshes, invoking the callback before each draw so the
/// caller can refresh per-mesh uniforms.
pub fn draw_meshes_with<S, D, F>(program: &ShaderProgram<S>, meshes: &[D], mut set_uniforms: F)
where
    S: GraphicsServer,
    D: Drawable<S>,
    F: FnMut(&ShaderProgram<S>, &D),
{
    let Some(server) = prepare(program) else {
        return;
    };
    for mesh in meshes {
        set_uniforms(program, mesh);
        server.bind_vertex_array(Some(mesh.vertex_array()));
        server.draw_elements(program.primitive_topology(), mesh.element_count());
    }
}

/// Unbinds the currently bound vertex array object.
pub fn unbind_vertex_array<S: GraphicsServer>(server: &S) {
    server.bind_vertex_array(None);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dummy::{DummyCall, DummyGraphicsServer, UniformWrite};
    use crate::gpu_program::ShaderProgramBuilder;
    use std::rc::Rc;

    struct TestMesh {
        vertex_array: u32,
        element_count: u32,
    }

    impl Drawable<DummyGraphicsServer> for TestMesh {
        fn vertex_array(&self) -> u32 {
            self.vertex_array
        }

        fn element_count(&self) -> u32 {
            self.element_count
        }
    }

    fn build_simple(server: &Rc<DummyGraphicsServer>) -> ShaderProgram<DummyGraphicsServer> {
        ShaderProgramBuilder::new("Draw")
            .with_vertex_source("void main() {}")
            .with_fragment_source("void main() {}", Vec::new())
            .build(server)
            .unwrap()
    }

    #[test]
    fn draws_bind_the_program_and_the_vertex_array() {
        let server = Rc::new(DummyGraphicsServer::default());
        let program = build_simple(&server);
        let handle = program.handle().unwrap();
        server.clear_log();

        draw_vertex_array(&program, 5, 12);

        assert_eq!(
            server.calls(),
            vec![
                DummyCall::SetProgram(Some(handle)),
                DummyCall::BindVertexArray(Some(5)),
                DummyCall::DrawElements(crate::PrimitiveTopology::Triangles, 12),
            ]
        );
    }

    #[test]
    fn tessellating_programs_configure_patch_vertices() {
        let server = Rc::new(DummyGraphicsServer::default());
        server.set_patch_vertex_count(16);
        let program = ShaderProgramBuilder::new("Terrain")
            .with_vertex_source("void main() {}")
            .with_tess_control_source("layout(vertices = 16) out; void main() {}")
            .with_tess_eval_source("layout(quads) in; void main() {}")
            .with_fragment_source("void main() {}", Vec::new())
            .build(&server)
            .unwrap();
        server.clear_log();

        let mesh = TestMesh {
            vertex_array: 2,
            element_count: 64,
        };
        draw_mesh(&program, &mesh);

        let calls = server.calls();
        let patch_at = calls
            .iter()
            .position(|call| *call == DummyCall::SetPatchVertices(16))
            .unwrap();
        let draw_at = calls
            .iter()
            .position(|call| {
                *call == DummyCall::DrawElements(crate::PrimitiveTopology::Patches, 64)
            })
            .unwrap();
        assert!(patch_at < draw_at);
    }

    #[test]
    fn batch_draw_iterates_every_mesh() {
        let server = Rc::new(DummyGraphicsServer::default());
        let program = build_simple(&server);
        server.clear_log();

        let meshes = [
            TestMesh {
                vertex_array: 1,
                element_count: 3,
            },
            TestMesh {
                vertex_array: 2,
                element_count: 6,
            },
        ];
        draw_meshes(&program, &meshes);

        let calls = server.calls();
        assert!(calls.contains(&DummyCall::BindVertexArray(Some(1))));
        assert!(calls.contains(&DummyCall::BindVertexArray(Some(2))));
        assert_eq!(
            calls
                .iter()
                .filter(|call| matches!(call, DummyCall::DrawElements(..)))
                .count(),
            2
        );
    }

    #[test]
    fn batch_draw_refreshes_uniforms_per_mesh() {
        let server = Rc::new(DummyGraphicsServer::default());
        server.add_uniform("u_index", 4);
        let program = build_simple(&server);
        server.clear_log();

        let meshes = [
            TestMesh {
                vertex_array: 1,
                element_count: 3,
            },
            TestMesh {
                vertex_array: 2,
                element_count: 6,
            },
        ];
        draw_meshes_with(&program, &meshes, |program, mesh| {
            program.set_named_uniform("u_index", mesh.vertex_array as i32);
        });

        assert_eq!(
            server.uniform_writes(),
            vec![(4, UniformWrite::I32(1)), (4, UniformWrite::I32(2))]
        );
    }

    #[test]
    fn destroyed_program_draws_nothing() {
        let server = Rc::new(DummyGraphicsServer::default());
        let mut program = build_simple(&server);
        program.destroy();
        server.clear_log();

        draw_vertex_array(&program, 5, 12);
        assert!(server.calls().is_empty());
    }

    #[test]
    fn unbind_clears_the_vertex_array_binding() {
        let server = DummyGraphicsServer::default();
        unbind_vertex_array(&server);
        assert_eq!(server.calls(), vec![DummyCall::BindVertexArray(None)]);
    }
}
