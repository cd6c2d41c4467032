// SPDX-License-Identifier: CEPL-1.0
use crate::RenderSize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapchainState {
    Uninitialized,
    Ready,
    /// Out of date, suboptimal or resized: must be rebuilt before the next present.
    Stale,
}

/// What a rebuild request should do right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rebuild {
    /// Swapchain is current; nothing to do.
    NotNeeded,
    /// The drawable is zero-sized. Nothing may be destroyed yet.
    Defer,
    Proceed(RenderSize),
}

/// Backend-agnostic swapchain state machine:
/// `Uninitialized -> Ready -> Stale -> (rebuild) -> Ready`.
#[derive(Clone, Debug)]
pub struct SwapchainLifecycle {
    state: SwapchainState,
    drawable: RenderSize,
}

impl SwapchainLifecycle {
    pub fn new(drawable: RenderSize) -> Self {
        Self {
            state: SwapchainState::Uninitialized,
            drawable,
        }
    }

    pub fn state(&self) -> SwapchainState {
        self.state
    }

    pub fn drawable(&self) -> RenderSize {
        self.drawable
    }

    pub fn created(&mut self) {
        self.state = SwapchainState::Ready;
    }

    /// External resize. Marks the chain stale only when the size really changed.
    pub fn resized(&mut self, size: RenderSize) {
        if size != self.drawable {
            self.drawable = size;
            self.invalidate();
        }
    }

    pub fn invalidate(&mut self) {
        if self.state == SwapchainState::Ready {
            self.state = SwapchainState::Stale;
        }
    }

    pub fn is_stale(&self) -> bool {
        self.state == SwapchainState::Stale
    }

    pub fn plan(&self) -> Rebuild {
        match self.state {
            SwapchainState::Ready => Rebuild::NotNeeded,
            _ if self.drawable.is_zero() => Rebuild::Defer,
            _ => Rebuild::Proceed(self.drawable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const fn size(width: u32, height: u32) -> RenderSize {
        RenderSize { width, height }
    }

    #[test]
    fn fresh_lifecycle_wants_a_build() {
        let lc = SwapchainLifecycle::new(size(800, 600));
        assert_eq!(lc.state(), SwapchainState::Uninitialized);
        assert_eq!(lc.plan(), Rebuild::Proceed(size(800, 600)));
    }

    #[test]
    fn ready_chain_needs_nothing() {
        let mut lc = SwapchainLifecycle::new(size(800, 600));
        lc.created();
        assert_eq!(lc.plan(), Rebuild::NotNeeded);
        lc.resized(size(800, 600));
        assert_eq!(lc.plan(), Rebuild::NotNeeded);
    }

    #[test]
    fn minimize_then_restore_defers_until_nonzero() {
        let mut lc = SwapchainLifecycle::new(size(1024, 768));
        lc.created();

        lc.resized(size(0, 0));
        assert!(lc.is_stale());
        assert_eq!(lc.plan(), Rebuild::Defer);
        // still deferred on every retry while minimized
        assert_eq!(lc.plan(), Rebuild::Defer);

        lc.resized(size(800, 600));
        assert_eq!(lc.plan(), Rebuild::Proceed(size(800, 600)));
        lc.created();
        assert_eq!(lc.state(), SwapchainState::Ready);
    }

    #[test]
    fn out_of_date_without_resize_rebuilds_at_current_size() {
        let mut lc = SwapchainLifecycle::new(size(640, 480));
        lc.created();
        lc.invalidate();
        assert_eq!(lc.plan(), Rebuild::Proceed(size(640, 480)));
    }

    #[test]
    fn one_zero_edge_is_enough_to_defer() {
        let mut lc = SwapchainLifecycle::new(size(640, 480));
        lc.created();
        lc.resized(size(640, 0));
        assert_eq!(lc.plan(), Rebuild::Defer);
    }
}
