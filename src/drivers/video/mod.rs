//! Vídeo: framebuffer GOP + console de texto.

pub mod console;
pub mod font;
pub mod framebuffer;

use crate::core::handoff::BootInfo;

/// Inicializa framebuffer e console de texto a partir do boot info.
pub fn init(boot_info: &BootInfo) {
    framebuffer::init(
        boot_info.framebuffer_base,
        boot_info.horizontal_resolution,
        boot_info.vertical_resolution,
        boot_info.pixels_per_scan_line,
    );
    console::init();
}
