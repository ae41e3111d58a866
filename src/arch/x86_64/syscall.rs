//! Entrada da instrução `syscall` (x86-64).
//!
//! Configura os MSRs (EFER.SCE, STAR, LSTAR, SFMASK) e fornece o stub em
//! assembly que constrói o mesmo [`ContextFrame`] canônico dos gates da
//! IDT antes de chamar o dispatcher único de syscalls.
//!
//! STAR: o par de bases é escolhido para que `sysretq` retorne ao
//! segmento de código 64-bit do usuário — base de SYSRET = 0x1B, logo
//! CS = 0x1B + 16 = 0x2B e SS = 0x1B + 8 = 0x23 (ver layout da GDT).

use super::cpu::wrmsr;

const MSR_EFER: u32 = 0xC000_0080;
const MSR_STAR: u32 = 0xC000_0081;
const MSR_LSTAR: u32 = 0xC000_0082;
const MSR_SFMASK: u32 = 0xC000_0084;

const EFER_SCE: u64 = 1;

// RFLAGS mascarados na entrada: IF | TF | DF
const SFMASK_BITS: u64 = 0x200 | 0x100 | 0x400;

/// Stack do kernel usada pela entrada `syscall` (trocada por task).
#[no_mangle]
static mut SYSCALL_KERNEL_RSP: u64 = 0;

/// Scratch para o RSP de usuário durante a entrada (single-CPU).
#[no_mangle]
static mut SYSCALL_USER_RSP: u64 = 0;

/// Define a stack de kernel usada pela próxima entrada `syscall`.
pub fn set_kernel_rsp(rsp: u64) {
    unsafe {
        core::ptr::write_volatile(core::ptr::addr_of_mut!(SYSCALL_KERNEL_RSP), rsp);
    }
}

core::arch::global_asm!(
    r#"
.global syscall_entry_asm
syscall_entry_asm:
    // RCX = RIP de retorno, R11 = RFLAGS (salvos pela CPU)
    mov [rip + SYSCALL_USER_RSP], rsp
    mov rsp, [rip + SYSCALL_KERNEL_RSP]

    // Reconstruir o frame canônico (mesmo layout do iretq frame)
    push 0x23                          // SS do usuário
    push qword ptr [rip + SYSCALL_USER_RSP] // RSP do usuário
    push r11                           // RFLAGS
    push 0x2B                          // CS do usuário
    push rcx                           // RIP de retorno
    push 0                             // error code falso
    push 128                           // "vetor" de syscall
    push rbp
    push r15
    push r14
    push r13
    push r12
    push r11
    push r10
    push r9
    push r8
    push rdi
    push rsi
    push rdx
    push rcx
    push rbx
    push rax

    mov rdi, rsp
    call syscall_frame_entry

    pop rax
    pop rbx
    pop rcx
    pop rdx
    pop rsi
    pop rdi
    pop r8
    pop r9
    pop r10
    pop r11
    pop r12
    pop r13
    pop r14
    pop r15
    pop rbp
    add rsp, 16        // vetor + error code

    // Restaurar estado para sysretq: RCX=RIP, R11=RFLAGS
    pop rcx            // RIP
    add rsp, 8         // CS (implícito no sysret)
    pop r11            // RFLAGS
    pop rsp            // RSP do usuário (SS implícito)
    sysretq
"#
);

extern "C" {
    fn syscall_entry_asm();
}

/// Entrada Rust chamada pelo stub `syscall` com o frame canônico.
#[no_mangle]
extern "C" fn syscall_frame_entry(frame: *mut super::idt::ContextFrame) {
    // SAFETY: o stub acabou de construir o frame nesta stack
    let frame = unsafe { &mut *frame };
    crate::syscall::dispatch::handle_trap(frame);
}

/// Habilita a instrução `syscall` e aponta LSTAR para o stub.
///
/// # Safety
/// Escreve MSRs globais da CPU. Chamar uma única vez no boot.
pub unsafe fn init() {
    crate::kdebug!("(Syscall) Configurando MSRs...");

    let efer = super::cpu::rdmsr(MSR_EFER);
    wrmsr(MSR_EFER, efer | EFER_SCE);

    // STAR: [63:48] base SYSRET (0x1B -> CS=0x2B/SS=0x23),
    //       [47:32] base SYSCALL (0x08 -> CS=0x08/SS=0x10)
    let star: u64 = (0x1Bu64 << 48) | (0x08u64 << 32);
    wrmsr(MSR_STAR, star);

    wrmsr(MSR_LSTAR, syscall_entry_asm as usize as u64);
    wrmsr(MSR_SFMASK, SFMASK_BITS);

    crate::kinfo!("(Syscall) MSRs configurados (LSTAR/STAR/SFMASK)");
}
