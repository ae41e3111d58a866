//! Ember — Binário Principal.
//!
//! Responsabilidade:
//! 1. Configurar o ambiente de execução "naked" (Assembly).
//! 2. Inicializar a stack do kernel.
//! 3. Habilitar SSE.
//! 4. Saltar para `core::entry::kernel_main` (da biblioteca `ember`).

#![no_std]
#![no_main]

use ember::core as kernel_core;

extern crate alloc;

// Stack do kernel (64 KB).
#[repr(align(16))]
struct KernelStack([u8; 64 * 1024]);

#[no_mangle]
static KERNEL_STACK: KernelStack = KernelStack([0; 64 * 1024]);

/// Ponto de entrada Naked.
/// Configura o Stack Pointer (RSP) e habilita SSE antes de chamar o código
/// Rust. Forçado para `.text._start` para que o linker script o coloque no
/// início da imagem.
#[unsafe(naked)]
#[no_mangle]
#[link_section = ".text._start"]
pub extern "C" fn _start(_boot_info_addr: u64) -> ! {
    core::arch::naked_asm!(
        // 1. Salvar argumento (boot_info) em R15 (callee-saved)
        "mov r15, rdi",
        // 2. Configurar Stack Pointer (RSP)
        "lea rax, [rip + {stack}]",
        "lea rsp, [rax + {stack_size}]",
        // 3. Zerar RBP (frame pointer)
        "xor rbp, rbp",
        // 4. Habilitar SSE (CR0.EM=0, CR0.MP=1, CR4.OSFXSR|OSXMMEXCPT)
        "mov rax, cr0",
        "and ax, 0xFFFB",
        "or ax, 0x2",
        "mov cr0, rax",
        "mov rax, cr4",
        "or ax, 0x600",
        "mov cr4, rax",
        // 5. Alinhamento de 16 bytes exigido pela System V ABI
        "and rsp, -16",
        // 6. Restaurar argumento e chamar kernel_main
        "mov rdi, r15",
        "call {kernel_main}",
        // 7. Trap (nunca deveria retornar)
        "2:",
        "cli",
        "hlt",
        "jmp 2b",
        stack = sym KERNEL_STACK,
        stack_size = const 64 * 1024,
        kernel_main = sym kernel_core::entry::kernel_main,
    );
}
