// SPDX-License-Identifier: CEPL-1.0
//! Turns the `[[drawable]]` list into a `SceneDesc`, loading every distinct
//! model and texture once.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use prism_assets::{load_mesh, load_shader_bytes, load_texture};
use prism_render::{DrawableDesc, MeshData, RenderSettings, SceneDesc, TextureData};
use tracing::info;

use crate::config::AppCfg;

/// Relative paths live under the asset root.
pub fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Index of `path` in `items`, loading it on first use.
fn intern<T>(
    seen: &mut HashMap<PathBuf, usize>,
    items: &mut Vec<T>,
    path: PathBuf,
    load: impl FnOnce(&Path) -> Result<T>,
) -> Result<usize> {
    if let Some(&index) = seen.get(&path) {
        return Ok(index);
    }
    items.push(load(&path)?);
    let index = items.len() - 1;
    seen.insert(path, index);
    Ok(index)
}

pub fn assemble_scene(cfg: &AppCfg, root: &Path) -> Result<SceneDesc> {
    let mut scene = SceneDesc {
        camera: cfg.camera.camera(),
        ..SceneDesc::default()
    };
    let mut mesh_index = HashMap::new();
    let mut texture_index = HashMap::new();

    for (i, d) in cfg.drawables.iter().enumerate() {
        let mesh = intern(
            &mut mesh_index,
            &mut scene.meshes,
            resolve(root, &d.model),
            |path| {
                let soup = load_mesh(path)?;
                let mesh = MeshData::from_triangle_soup(&soup);
                info!(
                    "model {}: {} vertices, {} indices",
                    path.display(),
                    mesh.vertices.len(),
                    mesh.indices.len()
                );
                Ok(mesh)
            },
        )
        .with_context(|| format!("drawable #{i}: model"))?;

        let texture = intern(
            &mut texture_index,
            &mut scene.textures,
            resolve(root, &d.texture),
            |path| -> Result<TextureData> {
                let texture = load_texture(path)?;
                info!(
                    "texture {}: {}x{}, {} mips",
                    path.display(),
                    texture.width(),
                    texture.height(),
                    texture.mip_levels()
                );
                Ok(texture)
            },
        )
        .with_context(|| format!("drawable #{i}: texture"))?;

        scene.drawables.push(DrawableDesc {
            mesh,
            texture,
            placement: d.placement(),
        });
    }

    if scene.drawables.is_empty() {
        info!("no drawables configured; clearing only");
    }
    Ok(scene)
}

/// Renderer settings from config, shader overrides loaded from disk.
pub fn render_settings(cfg: &AppCfg, root: &Path) -> Result<RenderSettings> {
    let mut shaders = prism_render_vk::builtin_shaders();
    if let Some(path) = &cfg.shaders.vertex {
        let path = resolve(root, path);
        shaders.vertex = load_shader_bytes(&path).context("vertex shader override")?;
        info!("vertex shader: {}", path.display());
    }
    if let Some(path) = &cfg.shaders.fragment {
        let path = resolve(root, path);
        shaders.fragment = load_shader_bytes(&path).context("fragment shader override")?;
        info!("fragment shader: {}", path.display());
    }

    let defaults = RenderSettings::default();
    Ok(RenderSettings {
        validation: cfg.render.validation.unwrap_or(defaults.validation),
        present: cfg.render.present_mode.into(),
        clear_color: cfg.render.clear_color,
        shaders,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_cfg;
    use prism_core::describe_chain;
    use std::fs;

    const QUAD: &str = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
                        vt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\n\
                        f 1/1 2/2 3/3 4/4\n";
    const RED: &str = "P3\n1 1\n255\n255 0 0\n";

    fn asset_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("quad.obj"), QUAD).unwrap();
        fs::write(dir.path().join("red.ppm"), RED).unwrap();
        dir
    }

    #[test]
    fn relative_paths_join_the_root() {
        let root = Path::new("/srv/assets");
        assert_eq!(
            resolve(root, Path::new("models/cube.obj")),
            PathBuf::from("/srv/assets/models/cube.obj")
        );
        assert_eq!(resolve(root, Path::new("/abs.obj")), PathBuf::from("/abs.obj"));
    }

    #[test]
    fn no_drawables_gives_an_empty_scene() {
        let dir = tempfile::tempdir().unwrap();
        let scene = assemble_scene(&AppCfg::default(), dir.path()).unwrap();
        assert!(scene.meshes.is_empty());
        assert!(scene.textures.is_empty());
        assert!(scene.drawables.is_empty());
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn shared_assets_load_once() {
        let dir = asset_dir();
        let cfg = parse_cfg(
            r#"
            [[drawable]]
            model = "quad.obj"
            texture = "red.ppm"

            [[drawable]]
            model = "quad.obj"
            texture = "red.ppm"
            translation = [2.0, 0.0, 0.0]
            "#,
        )
        .unwrap();
        let scene = assemble_scene(&cfg, dir.path()).unwrap();
        assert_eq!(scene.meshes.len(), 1);
        assert_eq!(scene.textures.len(), 1);
        assert_eq!(scene.drawables.len(), 2);
        assert_eq!(scene.meshes[0].vertices.len(), 4);
        assert_eq!(scene.meshes[0].indices.len(), 6);
        assert_eq!(scene.textures[0].pixels(), &[255, 0, 0, 255]);
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn missing_texture_names_the_drawable() {
        let dir = asset_dir();
        let cfg = parse_cfg(
            r#"
            [[drawable]]
            model = "quad.obj"
            texture = "absent.png"
            "#,
        )
        .unwrap();
        let err = assemble_scene(&cfg, dir.path()).unwrap_err();
        assert!(describe_chain(&err).starts_with("drawable #0: texture"));
    }

    #[test]
    fn settings_follow_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = parse_cfg(
            r#"
            [render]
            clear_color = [0.1, 0.2, 0.3, 1.0]
            present_mode = "fifo"
            validation = false
            "#,
        )
        .unwrap();
        let settings = render_settings(&cfg, dir.path()).unwrap();
        assert!(!settings.validation);
        assert_eq!(settings.present, prism_render::PresentPreference::Fifo);
        assert_eq!(settings.clear_color, [0.1, 0.2, 0.3, 1.0]);
        assert!(!settings.shaders.vertex.is_empty());
    }

    #[test]
    fn bad_shader_override_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.spv"), [1u8, 2, 3]).unwrap();
        let cfg = parse_cfg("[shaders]\nvertex = \"bad.spv\"\n").unwrap();
        assert!(render_settings(&cfg, dir.path()).is_err());
    }
}
