//! Console de texto sobre o framebuffer.
//!
//! Grade de células 8x8 com rolagem por linha de texto. O printk
//! espelha aqui e na serial.

use super::{font, framebuffer};
use crate::sync::Spinlock;
use core::fmt;

const FG_COLOR: u32 = 0x00D0_D0D0;
const BG_COLOR: u32 = 0x0010_1018;

struct Console {
    col: u32,
    row: u32,
    cols: u32,
    rows: u32,
    ready: bool,
}

static CONSOLE: Spinlock<Console> = Spinlock::new(Console {
    col: 0,
    row: 0,
    cols: 0,
    rows: 0,
    ready: false,
});

impl Console {
    fn putc(&mut self, c: u8) {
        if !self.ready {
            return;
        }
        match c {
            b'\n' => {
                self.col = 0;
                self.row += 1;
            }
            b'\r' => self.col = 0,
            0x08 => {
                // backspace: apaga a célula anterior
                if self.col > 0 {
                    self.col -= 1;
                    self.draw_glyph(self.col, self.row, b' ');
                }
            }
            _ => {
                self.draw_glyph(self.col, self.row, c);
                self.col += 1;
                if self.col >= self.cols {
                    self.col = 0;
                    self.row += 1;
                }
            }
        }

        if self.row >= self.rows {
            framebuffer::scroll_up(font::GLYPH_HEIGHT, BG_COLOR);
            self.row = self.rows - 1;
        }
    }

    fn draw_glyph(&self, col: u32, row: u32, c: u8) {
        let glyph = font::glyph(c);
        let px = col * font::GLYPH_WIDTH;
        let py = row * font::GLYPH_HEIGHT;
        for (dy, bits) in glyph.iter().enumerate() {
            for dx in 0..8u32 {
                let color = if bits & (1 << dx) != 0 { FG_COLOR } else { BG_COLOR };
                framebuffer::put_pixel(px + dx, py + dy as u32, color);
            }
        }
    }

    fn write_str_internal(&mut self, s: &str) {
        // sequências ANSI do logger são filtradas (só a serial as entende)
        let mut in_escape = false;
        for b in s.bytes() {
            if in_escape {
                if b == b'm' {
                    in_escape = false;
                }
                continue;
            }
            if b == 0x1B {
                in_escape = true;
                continue;
            }
            self.putc(b);
        }
    }
}

impl fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_str_internal(s);
        Ok(())
    }
}

/// Inicializa o console (framebuffer já configurado).
pub fn init() {
    let mut con = CONSOLE.lock();
    con.cols = framebuffer::width() / font::GLYPH_WIDTH;
    con.rows = framebuffer::height() / font::GLYPH_HEIGHT;
    con.ready = framebuffer::is_ready() && con.cols > 0 && con.rows > 0;
    if con.ready {
        framebuffer::clear(BG_COLOR);
    }
}

/// Limpa a tela e volta o cursor para a origem.
pub fn clear() {
    let mut con = CONSOLE.lock();
    if con.ready {
        framebuffer::clear(BG_COLOR);
        con.col = 0;
        con.row = 0;
    }
}

/// Escreve argumentos formatados (usado pelo printk).
pub fn write_args(args: fmt::Arguments) {
    if let Some(mut con) = CONSOLE.try_lock() {
        let _ = fmt::write(&mut *con, args);
    }
}
