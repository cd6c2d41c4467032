// SPDX-License-Identifier: CEPL-1.0
use thiserror::Error;

/// Fatal conditions raised by the render pipeline.
///
/// Stale swapchains are not errors; they surface as `FrameStatus::Recreated`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("no memory type matches filter {type_filter:#x} with the requested properties")]
    NoSuitableMemoryType { type_filter: u32 },
    #[error("no physical device offers graphics + present queues and VK_KHR_swapchain")]
    NoSuitableDevice,
    #[error("validation layer {0} requested but not installed")]
    ValidationUnavailable(String),
    #[error("no depth format in the candidate list supports optimal-tiling depth attachments")]
    NoDepthFormat,
    #[error("texture format does not support linear blitting, mipmaps cannot be generated")]
    BlitUnsupported,
    #[error("texture has zero area ({width}x{height})")]
    EmptyTexture { width: u32, height: u32 },
    #[error("texture pixel buffer holds {actual} bytes, expected {expected}")]
    TextureSizeMismatch { expected: usize, actual: usize },
    #[error("mesh has no vertices")]
    EmptyMesh,
    #[error("drawable {drawable} references missing {kind} #{index}")]
    UnknownAsset {
        drawable: usize,
        kind: &'static str,
        index: usize,
    },
    #[error("descriptor pool provisioned for {capacity} sets, {requested} requested")]
    DescriptorPoolExhausted { capacity: u32, requested: u32 },
    #[error("frame slot {0} reused before its fence was waited")]
    SlotStillInFlight(usize),
    #[error("shader bytecode is not valid SPIR-V")]
    InvalidShader,
}
