//! Interface de handoff (Bootloader UEFI -> Kernel).
//!
//! O bootloader carrega `/kernel.bin` da ESP, sai dos Boot Services e
//! salta para a entrada do kernel passando um ponteiro para esta
//! estrutura. O framebuffer é GOP 32bpp XRGB8888.

/// Registro de boot produzido pelo bootloader (ABI fixa).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BootInfo {
    /// Endereço físico (= virtual, identity) do framebuffer.
    pub framebuffer_base: u64,
    /// Largura visível em pixels.
    pub horizontal_resolution: u32,
    /// Altura visível em pixels.
    pub vertical_resolution: u32,
    /// Pixels por linha de scan (stride; >= largura).
    pub pixels_per_scan_line: u32,
}

impl BootInfo {
    /// Validação mínima: o framebuffer precisa existir e ter geometria
    /// não-nula. Se isto falhar não dá para confiar em mais nada.
    pub fn is_sane(&self) -> bool {
        self.framebuffer_base != 0
            && self.horizontal_resolution > 0
            && self.vertical_resolution > 0
            && self.pixels_per_scan_line >= self.horizontal_resolution
    }
}
