//! Framebuffer linear 32bpp XRGB8888 (GOP).

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

static BASE: AtomicU64 = AtomicU64::new(0);
static WIDTH: AtomicU32 = AtomicU32::new(0);
static HEIGHT: AtomicU32 = AtomicU32::new(0);
static STRIDE: AtomicU32 = AtomicU32::new(0);

pub fn init(base: u64, width: u32, height: u32, stride: u32) {
    BASE.store(base, Ordering::Relaxed);
    WIDTH.store(width, Ordering::Relaxed);
    HEIGHT.store(height, Ordering::Relaxed);
    STRIDE.store(stride, Ordering::Relaxed);
}

pub fn is_ready() -> bool {
    BASE.load(Ordering::Relaxed) != 0
}

pub fn width() -> u32 {
    WIDTH.load(Ordering::Relaxed)
}

pub fn height() -> u32 {
    HEIGHT.load(Ordering::Relaxed)
}

#[inline]
pub fn put_pixel(x: u32, y: u32, color: u32) {
    let base = BASE.load(Ordering::Relaxed);
    if base == 0 || x >= WIDTH.load(Ordering::Relaxed) || y >= HEIGHT.load(Ordering::Relaxed) {
        return;
    }
    let stride = STRIDE.load(Ordering::Relaxed);
    // SAFETY: dentro da geometria reportada pelo bootloader
    unsafe {
        let ptr = (base as *mut u32).add((y * stride + x) as usize);
        core::ptr::write_volatile(ptr, color);
    }
}

/// Preenche a tela inteira com uma cor.
pub fn clear(color: u32) {
    let base = BASE.load(Ordering::Relaxed);
    if base == 0 {
        return;
    }
    let stride = STRIDE.load(Ordering::Relaxed);
    let height = HEIGHT.load(Ordering::Relaxed);
    // SAFETY: região do framebuffer inteira
    unsafe {
        let ptr = base as *mut u32;
        for i in 0..(stride * height) as usize {
            core::ptr::write_volatile(ptr.add(i), color);
        }
    }
}

/// Rola a tela `lines` pixels para cima, limpando a faixa inferior.
pub fn scroll_up(lines: u32, fill: u32) {
    let base = BASE.load(Ordering::Relaxed);
    if base == 0 {
        return;
    }
    let stride = STRIDE.load(Ordering::Relaxed) as usize;
    let height = HEIGHT.load(Ordering::Relaxed);
    if lines >= height {
        clear(fill);
        return;
    }

    // SAFETY: cópia dentro da região do framebuffer
    unsafe {
        let ptr = base as *mut u32;
        let move_rows = (height - lines) as usize;
        for y in 0..move_rows {
            let src = ptr.add((y + lines as usize) * stride);
            let dst = ptr.add(y * stride);
            core::ptr::copy(src, dst, stride);
        }
        for y in move_rows..height as usize {
            let row = ptr.add(y * stride);
            for x in 0..stride {
                core::ptr::write_volatile(row.add(x), fill);
            }
        }
    }
}
