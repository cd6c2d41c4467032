// SPDX-License-Identifier: CEPL-1.0
use crate::RenderError;

pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Outcome of one `Renderer::render` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    /// The swapchain was stale; it was rebuilt and this frame was dropped or its
    /// present was followed by a rebuild.
    Recreated,
    /// Nothing was drawn (zero-sized drawable, rebuild deferred).
    Skipped,
}

/// Values the render pass clears its attachments to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearValues {
    pub color: [f32; 4],
    pub depth: f32,
    pub stencil: u32,
}

impl Default for ClearValues {
    fn default() -> Self {
        Self {
            color: [0.0, 0.0, 0.0, 1.0],
            depth: 1.0,
            stencil: 0,
        }
    }
}

/// Round-robin over the frame-in-flight slots.
///
/// Mirrors the fence protocol: a slot goes pending on submit and only returns
/// to idle once its fence has been waited (`retire`). Submitting into a pending
/// slot is refused, which keeps at most `MAX_FRAMES_IN_FLIGHT` submissions
/// outstanding.
#[derive(Clone, Debug, Default)]
pub struct FrameCursor {
    current: usize,
    pending: [bool; MAX_FRAMES_IN_FLIGHT],
}

impl FrameCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// The current slot's fence has signaled.
    pub fn retire(&mut self) {
        self.pending[self.current] = false;
    }

    /// Every slot's fence has signaled (device idle).
    pub fn retire_all(&mut self) {
        self.pending = [false; MAX_FRAMES_IN_FLIGHT];
    }

    pub fn submit(&mut self) -> Result<(), RenderError> {
        if self.pending[self.current] {
            return Err(RenderError::SlotStillInFlight(self.current));
        }
        self.pending[self.current] = true;
        Ok(())
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1) % MAX_FRAMES_IN_FLIGHT;
    }

    pub fn in_flight(&self) -> usize {
        self.pending.iter().filter(|p| **p).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_slot_zero() {
        assert_eq!(FrameCursor::new().current(), 0);
    }

    #[test]
    fn default_clear_is_opaque_black_and_far_depth() {
        let clear = ClearValues::default();
        assert_eq!(clear.color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(clear.depth, 1.0);
        assert_eq!(clear.stencil, 0);
    }

    #[test]
    fn slots_rotate_modulo_n() {
        let mut cursor = FrameCursor::new();
        let seen: Vec<usize> = (0..5)
            .map(|_| {
                let slot = cursor.current();
                cursor.advance();
                slot
            })
            .collect();
        assert_eq!(seen, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn reusing_a_slot_without_waiting_is_refused() {
        let mut cursor = FrameCursor::new();
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            cursor.submit().unwrap();
            cursor.advance();
        }
        assert_eq!(cursor.in_flight(), MAX_FRAMES_IN_FLIGHT);
        assert_eq!(cursor.submit(), Err(RenderError::SlotStillInFlight(0)));
        assert_eq!(cursor.in_flight(), MAX_FRAMES_IN_FLIGHT);
        cursor.retire();
        assert_eq!(cursor.in_flight(), MAX_FRAMES_IN_FLIGHT - 1);
        assert!(cursor.submit().is_ok());
    }

    #[test]
    fn skipped_frame_keeps_the_slot() {
        let mut cursor = FrameCursor::new();
        cursor.retire();
        // acquire reported out-of-date: no submit, no advance
        assert_eq!(cursor.current(), 0);
        assert_eq!(cursor.in_flight(), 0);
        cursor.retire_all();
        assert_eq!(cursor.in_flight(), 0);
    }
}
