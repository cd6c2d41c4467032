// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use prism_math::{Camera, Motion, Placement, Vec3};
use prism_render::PresentPreference;
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Deserialize, Default)]
pub struct AppCfg {
    #[serde(default)]
    pub window: WindowCfg,
    #[serde(default)]
    pub render: RenderCfg,
    #[serde(default)]
    pub camera: CameraCfg,
    #[serde(default)]
    pub shaders: ShaderCfg,
    #[serde(default, rename = "drawable")]
    pub drawables: Vec<DrawableCfg>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WindowCfg {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            title: default_title(),
            width: default_width(),
            height: default_height(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RenderCfg {
    #[serde(default = "default_clear")]
    pub clear_color: [f32; 4],
    #[serde(default)]
    pub present_mode: PresentModeCfg,
    /// Unset means "debug builds only".
    #[serde(default)]
    pub validation: Option<bool>,
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            clear_color: default_clear(),
            present_mode: PresentModeCfg::Mailbox,
            validation: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeCfg {
    #[default]
    Mailbox,
    Fifo,
}

impl From<PresentModeCfg> for PresentPreference {
    fn from(mode: PresentModeCfg) -> Self {
        match mode {
            PresentModeCfg::Mailbox => PresentPreference::Mailbox,
            PresentModeCfg::Fifo => PresentPreference::Fifo,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct CameraCfg {
    #[serde(default = "default_eye")]
    pub eye: [f32; 3],
    #[serde(default)]
    pub target: [f32; 3],
    #[serde(default = "default_up")]
    pub up: [f32; 3],
    #[serde(default = "default_fov")]
    pub fov_degrees: f32,
    #[serde(default = "default_near")]
    pub near: f32,
    #[serde(default = "default_far")]
    pub far: f32,
}

impl Default for CameraCfg {
    fn default() -> Self {
        CameraCfg {
            eye: default_eye(),
            target: [0.0; 3],
            up: default_up(),
            fov_degrees: default_fov(),
            near: default_near(),
            far: default_far(),
        }
    }
}

impl CameraCfg {
    pub fn camera(&self) -> Camera {
        Camera {
            eye: Vec3::from_array(self.eye),
            target: Vec3::from_array(self.target),
            up: Vec3::from_array(self.up),
            fov_y_degrees: self.fov_degrees,
            near: self.near,
            far: self.far,
        }
    }
}

/// Optional SPIR-V overrides; the built-in shaders fill whatever is left unset.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ShaderCfg {
    #[serde(default)]
    pub vertex: Option<PathBuf>,
    #[serde(default)]
    pub fragment: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DrawableCfg {
    pub model: PathBuf,
    pub texture: PathBuf,
    #[serde(default)]
    pub translation: [f32; 3],
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],
    #[serde(default)]
    pub motion: MotionCfg,
}

impl DrawableCfg {
    pub fn placement(&self) -> Placement {
        Placement {
            translation: Vec3::from_array(self.translation),
            scale: Vec3::from_array(self.scale),
            motion: self.motion.into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MotionCfg {
    #[default]
    Static,
    Spin {
        #[serde(default = "default_up")]
        axis: [f32; 3],
        #[serde(default = "default_spin")]
        degrees_per_second: f32,
    },
}

impl From<MotionCfg> for Motion {
    fn from(m: MotionCfg) -> Self {
        match m {
            MotionCfg::Static => Motion::Static,
            MotionCfg::Spin {
                axis,
                degrees_per_second,
            } => Motion::Spin {
                axis: Vec3::from_array(axis),
                degrees_per_second,
            },
        }
    }
}

fn default_title() -> String {
    "prism".to_owned()
}
fn default_width() -> u32 {
    800
}
fn default_height() -> u32 {
    600
}
fn default_clear() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}
fn default_eye() -> [f32; 3] {
    [2.0, 2.0, 2.0]
}
fn default_up() -> [f32; 3] {
    [0.0, 0.0, 1.0]
}
fn default_fov() -> f32 {
    45.0
}
fn default_near() -> f32 {
    0.1
}
fn default_far() -> f32 {
    10.0
}
fn default_scale() -> [f32; 3] {
    [1.0; 3]
}
fn default_spin() -> f32 {
    90.0
}

/// Reads the config file. A missing or malformed file falls back to defaults.
pub fn load_cfg(path: &Path) -> AppCfg {
    match fs::read_to_string(path) {
        Ok(s) => parse_cfg(&s).unwrap_or_else(|e| {
            warn!("{}: {e}; using defaults", path.display());
            AppCfg::default()
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("{} not found; using defaults", path.display());
            AppCfg::default()
        }
        Err(e) => {
            warn!("{}: {e}; using defaults", path.display());
            AppCfg::default()
        }
    }
}

pub fn parse_cfg(s: &str) -> Result<AppCfg, toml::de::Error> {
    toml::from_str::<AppCfg>(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let cfg = parse_cfg("").unwrap();
        assert_eq!(cfg.window.width, 800);
        assert_eq!(cfg.window.height, 600);
        assert_eq!(cfg.render.clear_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(cfg.render.present_mode, PresentModeCfg::Mailbox);
        assert_eq!(cfg.render.validation, None);
        assert_eq!(cfg.camera.camera(), Camera::default());
        assert!(cfg.drawables.is_empty());
    }

    #[test]
    fn drawables_parse_with_motion() {
        let cfg = parse_cfg(
            r#"
            [render]
            present_mode = "fifo"
            validation = true

            [[drawable]]
            model = "models/cube.obj"
            texture = "textures/checker.ppm"

            [[drawable]]
            model = "models/cube.obj"
            texture = "textures/checker.ppm"
            translation = [1.5, 0.0, 0.0]
            scale = [0.5, 0.5, 0.5]
            motion = { kind = "spin", axis = [0.0, 1.0, 0.0], degrees_per_second = 45.0 }
            "#,
        )
        .unwrap();
        assert_eq!(cfg.render.present_mode, PresentModeCfg::Fifo);
        assert_eq!(cfg.render.validation, Some(true));
        assert_eq!(cfg.drawables.len(), 2);
        assert_eq!(cfg.drawables[0].placement(), Placement::default());

        let spun = cfg.drawables[1].placement();
        assert_eq!(spun.translation, Vec3::new(1.5, 0.0, 0.0));
        assert_eq!(
            spun.motion,
            Motion::Spin {
                axis: Vec3::Y,
                degrees_per_second: 45.0
            }
        );
    }

    #[test]
    fn spin_defaults_to_z_axis() {
        let cfg = parse_cfg(
            r#"
            [[drawable]]
            model = "m.obj"
            texture = "t.png"
            motion = { kind = "spin" }
            "#,
        )
        .unwrap();
        assert_eq!(
            cfg.drawables[0].motion,
            MotionCfg::Spin {
                axis: [0.0, 0.0, 1.0],
                degrees_per_second: 90.0
            }
        );
    }

    #[test]
    fn drawable_without_texture_is_rejected() {
        assert!(parse_cfg("[[drawable]]\nmodel = \"m.obj\"\n").is_err());
    }

    #[test]
    fn missing_or_broken_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let missing = load_cfg(&dir.path().join("nope.toml"));
        assert!(missing.drawables.is_empty());

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "[window\nwidth = ").unwrap();
        assert_eq!(load_cfg(&broken).window.width, 800);
    }
}
