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

//! Automatically derived matrix uniforms.
//!
//! A program can declare, per uniform, which combination of the four base
//! matrices (local transformation, model, view, projection) it wants to
//! receive, see [`crate::gpu_program::ShaderProgramBuilder::with_auto_matrix`].
//! Each refresh recomputes every declared combination at most once, so two
//! uniforms subscribed to the same derivation share a single computation.

use bitflags::bitflags;
use nalgebra::{Matrix3, Matrix4};

bitflags! {
    /// Selects which base matrices participate in a derived matrix uniform.
    ///
    /// The selected matrices are multiplied in fixed order
    /// `projection * view * model * transformation` (right-to-left application
    /// to a vertex). [`AutoMatrix::NORMAL`] requests the inverse-transpose 3x3
    /// of that product instead of the product itself.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct AutoMatrix: u8 {
        const TRANSFORMATION = 0b0000_0001;
        const MODEL = 0b0000_0010;
        const VIEW = 0b0000_0100;
        const PROJECTION = 0b0000_1000;
        const NORMAL = 0b0001_0000;
    }
}

impl AutoMatrix {
    /// Index of the cache slot the combination is stored in.
    pub(crate) fn slot(self) -> usize {
        (self.bits() & 0b1111) as usize
    }

    /// Whether the derivation yields a normal (inverse-transpose 3x3) matrix.
    pub fn is_normal(self) -> bool {
        self.contains(Self::NORMAL)
    }
}

/// Amount of cache slots; one per combination of the four base matrices.
pub(crate) const SLOT_COUNT: usize = 16;

/// The four base matrices supplied to a refresh.
#[derive(Clone, Copy)]
pub(crate) struct MatrixSources {
    pub transformation: Matrix4<f32>,
    pub model: Matrix4<f32>,
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
}

#[derive(Clone, Copy)]
struct Slot {
    matrix: Matrix4<f32>,
    computed: bool,
}

#[derive(Clone, Copy)]
struct NormalSlot {
    matrix: Matrix3<f32>,
    computed: bool,
}

/// Fixed-capacity cache of derived matrices, addressed by the low four bits
/// of [`AutoMatrix`]. The `computed` flags are reset at the start of each
/// refresh; within one refresh every requested derivation is computed at most
/// once.
pub(crate) struct MatrixCache {
    slots: [Slot; SLOT_COUNT],
    normal_slots: [NormalSlot; SLOT_COUNT],
}

impl Default for MatrixCache {
    fn default() -> Self {
        Self {
            slots: [Slot {
                matrix: Matrix4::identity(),
                computed: false,
            }; SLOT_COUNT],
            normal_slots: [NormalSlot {
                matrix: Matrix3::identity(),
                computed: false,
            }; SLOT_COUNT],
        }
    }
}

fn combination(flags: AutoMatrix, sources: &MatrixSources) -> Matrix4<f32> {
    let mut matrix = Matrix4::identity();
    if flags.contains(AutoMatrix::PROJECTION) {
        matrix *= sources.projection;
    }
    if flags.contains(AutoMatrix::VIEW) {
        matrix *= sources.view;
    }
    if flags.contains(AutoMatrix::MODEL) {
        matrix *= sources.model;
    }
    if flags.contains(AutoMatrix::TRANSFORMATION) {
        matrix *= sources.transformation;
    }
    matrix
}

impl MatrixCache {
    /// Invalidates every slot for a new refresh.
    pub fn begin_refresh(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.computed = false;
        }
        for slot in self.normal_slots.iter_mut() {
            slot.computed = false;
        }
    }

    /// Returns the 4x4 product for the given combination, computing it only
    /// if it was not yet computed since the last [`Self::begin_refresh`].
    pub fn matrix(&mut self, flags: AutoMatrix, sources: &MatrixSources) -> Matrix4<f32> {
        let slot = &mut self.slots[flags.slot()];
        if !slot.computed {
            slot.matrix = combination(flags, sources);
            slot.computed = true;
        }
        slot.matrix
    }

    /// Returns the inverse-transpose 3x3 of the given combination's product.
    /// A singular product falls back to the identity.
    pub fn normal_matrix(&mut self, flags: AutoMatrix, sources: &MatrixSources) -> Matrix3<f32> {
        let index = flags.slot();
        if !self.normal_slots[index].computed {
            let product = self.matrix(flags, sources);
            let linear = product.fixed_view::<3, 3>(0, 0).into_owned();
            let slot = &mut self.normal_slots[index];
            slot.matrix = linear
                .try_inverse()
                .map(|inverse| inverse.transpose())
                .unwrap_or_else(Matrix3::identity);
            slot.computed = true;
        }
        self.normal_slots[index].matrix
    }
}
