// SPDX-License-Identifier: CEPL-1.0
use std::hash::{Hash, Hasher};

use bytemuck::{Pod, Zeroable};
use prism_math::Mat4;

/// Interleaved layout consumed by the pipeline at binding 0:
/// location 0 = position, 1 = color, 2 = texcoord.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub color: [f32; 3],
    pub tex_coord: [f32; 2],
}

impl Vertex {
    pub const WHITE: [f32; 3] = [1.0, 1.0, 1.0];

    pub const fn new(pos: [f32; 3], color: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            pos,
            color,
            tex_coord,
        }
    }

    fn bits(&self) -> [u32; 8] {
        [
            key(self.pos[0]),
            key(self.pos[1]),
            key(self.pos[2]),
            key(self.color[0]),
            key(self.color[1]),
            key(self.color[2]),
            key(self.tex_coord[0]),
            key(self.tex_coord[1]),
        ]
    }
}

/// Bit pattern with the sign of zero dropped, so `-0.0` and `0.0` are one vertex.
fn key(x: f32) -> u32 {
    if x == 0.0 {
        0
    } else {
        x.to_bits()
    }
}

// Equality and hashing share `key` so the dedup map stays consistent.
impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Vertex {}

impl Hash for Vertex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

/// Per-drawable, per-slot uniform block (binding 0, vertex stage).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct UniformBlock {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
}

impl UniformBlock {
    pub fn new(model: Mat4, view: Mat4, proj: Mat4) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
        }
    }
}
