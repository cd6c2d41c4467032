// SPDX-License-Identifier: CEPL-1.0
//! Disk loaders feeding the renderer: OBJ meshes, RGBA8 textures, SPIR-V blobs.
use std::path::{Path, PathBuf};

use prism_render::{RenderError, TextureData, Vertex};
use thiserror::Error;
use tracing::debug;

const SPIRV_MAGIC: u32 = 0x0723_0203;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("cannot read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot decode image {path}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("cannot parse model {path}")]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },
    #[error("model {0} contains no triangles")]
    NoGeometry(PathBuf),
    #[error("{path} is not a SPIR-V module")]
    NotSpirv { path: PathBuf },
    #[error("{path} is not usable")]
    Invalid {
        path: PathBuf,
        #[source]
        source: RenderError,
    },
}

/// Decodes any supported image format into tightly packed RGBA8.
pub fn load_texture(path: impl AsRef<Path>) -> Result<TextureData, AssetError> {
    let path = path.as_ref();
    let rgba = image::open(path)
        .map_err(|source| AssetError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .into_rgba8();
    let (width, height) = rgba.dimensions();
    debug!("decoded {} ({width}x{height})", path.display());
    TextureData::new(width, height, rgba.into_raw()).map_err(|source| AssetError::Invalid {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads every shape in an OBJ file as one flat triangle list.
///
/// Vertex color is white. The V texture coordinate is flipped (`1 - v`) since
/// OBJ puts the origin at the bottom-left and the sampler at the top-left.
/// Faces without texture coordinates get `(0, 0)`.
pub fn load_mesh(path: impl AsRef<Path>) -> Result<Vec<Vertex>, AssetError> {
    let path = path.as_ref();
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|source| AssetError::Obj {
        path: path.to_path_buf(),
        source,
    })?;

    let mut soup = Vec::new();
    for model in &models {
        let mesh = &model.mesh;
        for &index in &mesh.indices {
            let i = index as usize;
            let pos = [
                mesh.positions[3 * i],
                mesh.positions[3 * i + 1],
                mesh.positions[3 * i + 2],
            ];
            let uv = match mesh.texcoords.get(2 * i..2 * i + 2) {
                Some(&[u, v]) => [u, 1.0 - v],
                _ => [0.0, 0.0],
            };
            soup.push(Vertex::new(pos, Vertex::WHITE, uv));
        }
    }

    if soup.is_empty() {
        return Err(AssetError::NoGeometry(path.to_path_buf()));
    }
    debug!(
        "parsed {} ({} shapes, {} face-vertices)",
        path.display(),
        models.len(),
        soup.len()
    );
    Ok(soup)
}

/// Reads a compiled shader. Only the framing is checked here (length and magic
/// number); the driver validates the module itself.
pub fn load_shader_bytes(path: impl AsRef<Path>) -> Result<Vec<u8>, AssetError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let magic = bytes
        .get(..4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]));
    if bytes.len() % 4 != 0 || magic != Some(SPIRV_MAGIC) {
        return Err(AssetError::NotSpirv {
            path: path.to_path_buf(),
        });
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_render::MeshData;
    use std::fs;

    const QUAD_OBJ: &str = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1 2/2 3/3 4/4
";

    #[test]
    fn missing_texture_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_texture(dir.path().join("nope.png")).unwrap_err();
        assert!(matches!(err, AssetError::Image { .. }));
    }

    #[test]
    fn png_decodes_to_rgba8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tex.png");
        let mut img = image::RgbaImage::new(4, 2);
        img.put_pixel(1, 0, image::Rgba([10, 20, 30, 255]));
        img.save(&path).unwrap();

        let tex = load_texture(&path).unwrap();
        assert_eq!((tex.width(), tex.height()), (4, 2));
        assert_eq!(tex.pixels().len(), 4 * 2 * 4);
        assert_eq!(&tex.pixels()[4..8], &[10, 20, 30, 255]);
        assert_eq!(tex.mip_levels(), 3);
    }

    #[test]
    fn rgb_ppm_gains_opaque_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tex.ppm");
        fs::write(&path, "P3\n2 1\n255\n255 0 0  0 0 255\n").unwrap();

        let tex = load_texture(&path).unwrap();
        assert_eq!(tex.pixels(), &[255, 0, 0, 255, 0, 0, 255, 255]);
    }

    #[test]
    fn quad_triangulates_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quad.obj");
        fs::write(&path, QUAD_OBJ).unwrap();

        let soup = load_mesh(&path).unwrap();
        assert_eq!(soup.len(), 6);
        assert!(soup.iter().all(|v| v.color == Vertex::WHITE));

        let mesh = MeshData::from_triangle_soup(&soup);
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.index_count(), 6);
    }

    #[test]
    fn texture_v_is_flipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quad.obj");
        fs::write(&path, QUAD_OBJ).unwrap();

        let soup = load_mesh(&path).unwrap();
        let origin = soup
            .iter()
            .find(|v| v.pos == [0.0, 0.0, 0.0])
            .unwrap();
        assert_eq!(origin.tex_coord, [0.0, 1.0]);
    }

    #[test]
    fn untextured_faces_get_zero_uv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.obj");
        fs::write(&path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();

        let soup = load_mesh(&path).unwrap();
        assert_eq!(soup.len(), 3);
        assert!(soup.iter().all(|v| v.tex_coord == [0.0, 0.0]));
    }

    #[test]
    fn empty_model_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.obj");
        fs::write(&path, "# nothing\n").unwrap();
        assert!(matches!(load_mesh(&path), Err(AssetError::NoGeometry(_))));
    }

    #[test]
    fn shader_magic_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("ok.spv");
        let bad = dir.path().join("bad.spv");
        let mut words = SPIRV_MAGIC.to_le_bytes().to_vec();
        words.extend_from_slice(&[0, 0, 1, 0]);
        fs::write(&good, &words).unwrap();
        fs::write(&bad, b"#version 450\n").unwrap();

        assert_eq!(load_shader_bytes(&good).unwrap(), words);
        assert!(matches!(
            load_shader_bytes(&bad),
            Err(AssetError::NotSpirv { .. })
        ));
        assert!(matches!(
            load_shader_bytes(dir.path().join("none.spv")),
            Err(AssetError::Io { .. })
        ));
    }
}
