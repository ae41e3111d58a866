//! Interface de syscalls com o userspace.
//!
//! Duas portas de entrada — o gate 128 (`int 0x80`) e a instrução
//! `syscall` — convergem no dispatcher único de `dispatch.rs` com o
//! mesmo frame canônico. Convenção Linux-style: número em RAX, args em
//! RDI/RSI/RDX/R10/R8/R9, retorno em RAX, erros como errno negado.

pub mod dispatch;
pub mod error;
pub mod fs;
pub mod memory;
pub mod numbers;
pub mod process;
pub mod usercopy;

/// Habilita a instrução `syscall` (MSRs). O gate 128 já vem da IDT.
pub fn init() {
    // SAFETY: chamado uma vez no boot
    unsafe {
        crate::arch::x86_64::syscall::init();
    }
}
