// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

mod error;
pub mod frame;
pub mod mesh;
pub mod scene;
pub mod swapchain;
pub mod texture;
pub mod vertex;

pub use error::RenderError;
pub use frame::{ClearValues, FrameCursor, FrameStatus, MAX_FRAMES_IN_FLIGHT};
pub use mesh::MeshData;
pub use scene::{DrawableDesc, PresentPreference, RenderSettings, SceneDesc, ShaderBytes};
pub use swapchain::{Rebuild, SwapchainLifecycle, SwapchainState};
pub use texture::TextureData;
pub use vertex::{UniformBlock, Vertex};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

pub trait Renderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        scene: &SceneDesc,
        settings: &RenderSettings,
    ) -> Result<Self>
    where
        Self: Sized;

    /// Records the new drawable size; the swapchain is rebuilt after the next present.
    fn resize(&mut self, size: RenderSize) -> Result<()>;
    fn render(&mut self, seconds: f32) -> Result<FrameStatus>;
}
