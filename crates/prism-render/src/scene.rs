// SPDX-License-Identifier: CEPL-1.0
use prism_math::{Camera, Placement};

use crate::{MeshData, RenderError, TextureData};

/// One entry of the ordered draw list: which mesh, which texture, where.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawableDesc {
    pub mesh: usize,
    pub texture: usize,
    pub placement: Placement,
}

/// Everything the renderer uploads at init. Meshes and textures may be shared
/// between drawables; drawables are drawn in order.
#[derive(Clone, Debug, Default)]
pub struct SceneDesc {
    pub meshes: Vec<MeshData>,
    pub textures: Vec<TextureData>,
    pub drawables: Vec<DrawableDesc>,
    pub camera: Camera,
}

impl SceneDesc {
    pub fn validate(&self) -> Result<(), RenderError> {
        for mesh in &self.meshes {
            mesh.validate()?;
        }
        for (i, d) in self.drawables.iter().enumerate() {
            if d.mesh >= self.meshes.len() {
                return Err(RenderError::UnknownAsset {
                    drawable: i,
                    kind: "mesh",
                    index: d.mesh,
                });
            }
            if d.texture >= self.textures.len() {
                return Err(RenderError::UnknownAsset {
                    drawable: i,
                    kind: "texture",
                    index: d.texture,
                });
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PresentPreference {
    /// Mailbox when offered, FIFO otherwise.
    #[default]
    Mailbox,
    Fifo,
}

/// SPIR-V for the single fixed pipeline.
#[derive(Clone, Debug, Default)]
pub struct ShaderBytes {
    pub vertex: Vec<u8>,
    pub fragment: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct RenderSettings {
    pub validation: bool,
    pub present: PresentPreference,
    pub clear_color: [f32; 4],
    pub shaders: ShaderBytes,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            validation: cfg!(debug_assertions),
            present: PresentPreference::default(),
            clear_color: crate::ClearValues::default().color,
            shaders: ShaderBytes::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vertex;

    fn tri() -> MeshData {
        MeshData::from_triangle_soup(&[
            Vertex::new([0.0, 0.0, 0.0], [1.0; 3], [0.0, 0.0]),
            Vertex::new([1.0, 0.0, 0.0], [1.0; 3], [1.0, 0.0]),
            Vertex::new([0.0, 1.0, 0.0], [1.0; 3], [0.0, 1.0]),
        ])
    }

    fn px() -> TextureData {
        TextureData::new(1, 1, vec![255; 4]).unwrap()
    }

    fn drawable(mesh: usize, texture: usize) -> DrawableDesc {
        DrawableDesc {
            mesh,
            texture,
            placement: Placement::default(),
        }
    }

    #[test]
    fn empty_scene_is_valid() {
        assert!(SceneDesc::default().validate().is_ok());
    }

    #[test]
    fn shared_assets_are_valid() {
        let scene = SceneDesc {
            meshes: vec![tri()],
            textures: vec![px()],
            drawables: vec![drawable(0, 0), drawable(0, 0)],
            ..Default::default()
        };
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn dangling_texture_index_is_reported() {
        let scene = SceneDesc {
            meshes: vec![tri()],
            textures: vec![px()],
            drawables: vec![drawable(0, 0), drawable(0, 3)],
            ..Default::default()
        };
        assert_eq!(
            scene.validate(),
            Err(RenderError::UnknownAsset {
                drawable: 1,
                kind: "texture",
                index: 3
            })
        );
    }

    #[test]
    fn empty_mesh_is_rejected() {
        let scene = SceneDesc {
            meshes: vec![MeshData::default()],
            ..Default::default()
        };
        assert_eq!(scene.validate(), Err(RenderError::EmptyMesh));
    }

    #[test]
    fn default_clear_color_is_opaque_black() {
        assert_eq!(RenderSettings::default().clear_color, [0.0, 0.0, 0.0, 1.0]);
    }
}
