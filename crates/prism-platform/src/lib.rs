// SPDX-License-Identifier: CEPL-1.0
//! Window/input glue. The renderer only needs a drawable size and a quit bit.
pub use winit;

use prism_render::RenderSize;
use tracing::debug;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::keyboard::{Key, NamedKey};
use winit::window::Window;

/// Current drawable size in physical pixels. Zero while minimized on most platforms.
pub fn drawable_size(window: &Window) -> RenderSize {
    let size = window.inner_size();
    RenderSize {
        width: size.width,
        height: size.height,
    }
}

/// True when the event asks the application to shut down.
pub fn quit_requested(event: &WindowEvent) -> bool {
    let quit = match event {
        WindowEvent::CloseRequested => true,
        WindowEvent::KeyboardInput { event, .. } => is_escape_press(event),
        _ => false,
    };
    if quit {
        debug!("quit requested by {event:?}");
    }
    quit
}

fn is_escape_press(event: &KeyEvent) -> bool {
    event.state == ElementState::Pressed && event.logical_key == Key::Named(NamedKey::Escape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalSize;

    #[test]
    fn close_request_quits() {
        assert!(quit_requested(&WindowEvent::CloseRequested));
    }

    #[test]
    fn resize_does_not_quit() {
        assert!(!quit_requested(&WindowEvent::Resized(PhysicalSize::new(0, 0))));
        assert!(!quit_requested(&WindowEvent::Focused(false)));
    }
}
