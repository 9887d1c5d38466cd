// SPDX-License-Identifier: CEPL-1.0
pub use winit;

use std::time::Duration;
use tracing::info;
use winit::{
    dpi::LogicalSize,
    window::{Window, WindowAttributes},
};

/// Attributes for the game window; `width`/`height` are logical pixels.
pub fn window_attributes(title: &str, width: u32, height: u32) -> WindowAttributes {
    Window::default_attributes()
        .with_title(title)
        .with_inner_size(LogicalSize::new(width, height))
}

/// Drawable size of the window in physical pixels.
pub fn drawable_size(window: &Window) -> (u32, u32) {
    let size = window.inner_size();
    (size.width, size.height)
}

/// Gives the window manager time to map the window before the graphics
/// stack asks for a surface. No synchronization is implied.
pub fn settle(delay: Duration) {
    if delay.is_zero() {
        return;
    }
    info!("sleeping {} ms for the window to settle", delay.as_millis());
    std::thread::sleep(delay);
}
