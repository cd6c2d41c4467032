// SPDX-License-Identifier: CEPL-1.0
use crate::RenderError;

/// Decoded RGBA8 pixels, row-major, no padding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureData {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl TextureData {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::EmptyTexture { width, height });
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(RenderError::TextureSizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn mip_levels(&self) -> u32 {
        mip_levels(self.width, self.height)
    }
}

/// `floor(log2(max(w, h))) + 1`; a 0-sized edge counts as 1.
pub fn mip_levels(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    u32::BITS - largest.leading_zeros()
}

/// Extent of every level in the chain, halving and clamping each edge at 1.
pub fn mip_extents(width: u32, height: u32) -> Vec<(u32, u32)> {
    let mut extents = Vec::with_capacity(mip_levels(width, height) as usize);
    let (mut w, mut h) = (width.max(1), height.max(1));
    for _ in 0..mip_levels(width, height) {
        extents.push((w, h));
        w = (w / 2).max(1);
        h = (h / 2).max(1);
    }
    extents
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_levels_match_log2_formula() {
        assert_eq!(mip_levels(512, 256), 10);
        assert_eq!(mip_levels(1, 1), 1);
        assert_eq!(mip_levels(2, 1), 2);
        assert_eq!(mip_levels(3, 3), 2);
        assert_eq!(mip_levels(1024, 1024), 11);
        for (w, h) in [(7u32, 5u32), (640, 480), (4096, 1), (1, 300)] {
            let expected = (w.max(h) as f64).log2().floor() as u32 + 1;
            assert_eq!(mip_levels(w, h), expected, "{w}x{h}");
        }
    }

    #[test]
    fn mip_chain_ends_at_one_by_one() {
        let chain = mip_extents(512, 256);
        assert_eq!(chain.len(), mip_levels(512, 256) as usize);
        assert_eq!(chain[0], (512, 256));
        assert_eq!(chain[1], (256, 128));
        assert_eq!(chain[8], (2, 1));
        assert_eq!(*chain.last().unwrap(), (1, 1));
    }

    #[test]
    fn zero_area_texture_is_rejected() {
        assert_eq!(
            TextureData::new(0, 4, vec![]),
            Err(RenderError::EmptyTexture {
                width: 0,
                height: 4
            })
        );
    }

    #[test]
    fn short_pixel_buffer_is_rejected() {
        let err = TextureData::new(2, 2, vec![0; 15]).unwrap_err();
        assert_eq!(
            err,
            RenderError::TextureSizeMismatch {
                expected: 16,
                actual: 15
            }
        );
    }
}
