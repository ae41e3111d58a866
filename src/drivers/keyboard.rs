//! Teclado PS/2 (scancode set 1).
//!
//! O IRQ1 empurra bytes decodificados para um ring; `getchar` bloqueia
//! drenando o ring (sti/hlt entre tentativas). Produtor em contexto de
//! interrupção e consumidor em task: o ring usa `spin::Mutex`.

use crate::arch::traits::CpuOps;
use spin::Mutex;

const BUFFER_SIZE: usize = 256;

struct KeyBuffer {
    data: [u8; BUFFER_SIZE],
    head: usize,
    tail: usize,
}

impl KeyBuffer {
    const fn new() -> Self {
        Self {
            data: [0; BUFFER_SIZE],
            head: 0,
            tail: 0,
        }
    }

    fn push(&mut self, byte: u8) {
        let next = (self.head + 1) % BUFFER_SIZE;
        if next == self.tail {
            return; // cheio: descarta o mais novo
        }
        self.data[self.head] = byte;
        self.head = next;
    }

    fn pop(&mut self) -> Option<u8> {
        if self.head == self.tail {
            return None;
        }
        let b = self.data[self.tail];
        self.tail = (self.tail + 1) % BUFFER_SIZE;
        Some(b)
    }
}

static BUFFER: Mutex<KeyBuffer> = Mutex::new(KeyBuffer::new());

/// Estado de shift (scancodes 0x2A/0x36).
static SHIFT: core::sync::atomic::AtomicBool = core::sync::atomic::AtomicBool::new(false);

/// Mapa scancode set 1 -> ASCII (sem shift).
const KEYMAP: [u8; 0x3A] = [
    0, 27, b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'0', b'-', b'=', 8, b'\t',
    b'q', b'w', b'e', b'r', b't', b'y', b'u', b'i', b'o', b'p', b'[', b']', b'\n', 0, b'a', b's',
    b'd', b'f', b'g', b'h', b'j', b'k', b'l', b';', b'\'', b'`', 0, b'\\', b'z', b'x', b'c', b'v',
    b'b', b'n', b'm', b',', b'.', b'/', 0, b'*', 0, b' ',
];

/// Mapa com shift.
const KEYMAP_SHIFT: [u8; 0x3A] = [
    0, 27, b'!', b'@', b'#', b'$', b'%', b'^', b'&', b'*', b'(', b')', b'_', b'+', 8, b'\t',
    b'Q', b'W', b'E', b'R', b'T', b'Y', b'U', b'I', b'O', b'P', b'{', b'}', b'\n', 0, b'A', b'S',
    b'D', b'F', b'G', b'H', b'J', b'K', b'L', b':', b'"', b'~', 0, b'|', b'Z', b'X', b'C', b'V',
    b'B', b'N', b'M', b'<', b'>', b'?', 0, b'*', 0, b' ',
];

/// Processa um scancode cru vindo do IRQ1.
pub fn handle_scancode(sc: u8) {
    use core::sync::atomic::Ordering;

    match sc {
        0x2A | 0x36 => {
            SHIFT.store(true, Ordering::Relaxed);
            return;
        }
        0xAA | 0xB6 => {
            SHIFT.store(false, Ordering::Relaxed);
            return;
        }
        _ => {}
    }

    if sc & 0x80 != 0 {
        return; // key release
    }

    let idx = sc as usize;
    if idx >= KEYMAP.len() {
        return;
    }

    let ch = if SHIFT.load(Ordering::Relaxed) {
        KEYMAP_SHIFT[idx]
    } else {
        KEYMAP[idx]
    };
    if ch != 0 {
        BUFFER.lock().push(ch);
    }
}

/// Tenta ler um byte sem bloquear.
pub fn try_getchar() -> Option<u8> {
    BUFFER.lock().pop()
}

/// Lê um byte, bloqueando até haver entrada.
///
/// Ponto de suspensão observável pelo userspace: `read(0, ...)` chega
/// aqui e a task fica em sti/hlt até o IRQ1 produzir bytes.
pub fn getchar() -> u8 {
    loop {
        if let Some(b) = try_getchar() {
            return b;
        }
        crate::arch::Cpu::enable_interrupts();
        crate::arch::Cpu::halt();
    }
}

/// Habilita o IRQ1 no PIC.
pub fn init() {
    crate::drivers::pic::unmask(1);
}
